//! The [Machine] is the handle to the dabble core: it owns the heap and exposes the pair
//! primitives. The codec, the environment and the evaluator extend it in their own modules.

use crate::heap::Heap;
use crate::value::{Kind, Value};

/// Default bound on nested evaluations before an evaluation gives up with an error.
pub const DEFAULT_MAX_DEPTH: usize = 2048;

/// Evaluator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub max_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

#[derive(Debug, Default)]
pub struct Machine {
    pub(crate) heap: Heap,
    pub(crate) config: Config,
    pub(crate) depth: usize,
}

/// The truthy value returned by predicates.
pub fn truth(condition: bool) -> Value {
    if condition {
        Value::make_number(1)
    } else {
        Value::nil()
    }
}

impl Machine {
    pub fn new() -> Machine {
        Machine::default()
    }

    pub fn with_config(config: Config) -> Machine {
        Machine {
            config,
            ..Machine::default()
        }
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn cons(&mut self, car: Value, cdr: Value) -> Value {
        let address = self.heap.alloc_pair(car, cdr);
        Value::from_parts(crate::value::Tag::Cons, address.0)
    }

    /// The first slot of a pair. Anything that isn't a pair has NIL as car.
    pub fn car(&self, value: Value) -> Value {
        match value.kind() {
            Kind::Cons(address) => self.heap.cell(address).car,
            _ => Value::nil(),
        }
    }

    /// The second slot of a pair. Anything that isn't a pair has NIL as cdr.
    pub fn cdr(&self, value: Value) -> Value {
        match value.kind() {
            Kind::Cons(address) => self.heap.cell(address).cdr,
            _ => Value::nil(),
        }
    }

    pub fn atom(&self, value: Value) -> Value {
        truth(!matches!(value.kind(), Kind::Cons(_)))
    }

    /// Identity comparison: immediates compare by value, heap values by address.
    pub fn eq(&self, a: Value, b: Value) -> Value {
        truth(a.to_bits() == b.to_bits())
    }

    /// Builds a proper list out of a slice.
    pub fn list(&mut self, items: &[Value]) -> Value {
        items
            .iter()
            .rev()
            .fold(Value::nil(), |tail, head| self.cons(*head, tail))
    }

    /// Collects the elements of a proper list, `None` if the list ends in something other than
    /// NIL.
    pub fn list_to_vec(&self, list: Value) -> Option<Vec<Value>> {
        let mut items = Vec::new();
        let mut current = list;

        loop {
            match current.kind() {
                Kind::Nil => return Some(items),
                Kind::Cons(address) => {
                    let cell = self.heap.cell(address);
                    items.push(cell.car);
                    current = cell.cdr;
                }
                _ => return None,
            }
        }
    }
}
