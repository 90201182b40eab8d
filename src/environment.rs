//! An environment is the context in which an expression is evaluated. It's an immutable list of
//! `(symbol . value)` bindings living in the heap: extending it conses a new binding on the front
//! and leaves the old list untouched, so closures can hold on to the environment they were created
//! in.

use crate::builtins::Builtin;
use crate::error::EvalError;
use crate::machine::Machine;
use crate::value::{Kind, Tag, Value};

impl Machine {
    /// Returns a new environment where `symbol` is bound to `value`, shadowing any older binding
    /// with the same name.
    pub fn extend(&mut self, symbol: Value, value: Value, env: Value) -> Value {
        let binding = self.cons(symbol, value);
        self.cons(binding, env)
    }

    /// Finds the most recent binding of `symbol`, or an ERROR value when there is none.
    pub fn lookup(&mut self, symbol: Value, env: Value) -> Value {
        match self.find(symbol, env) {
            Some(value) => value,
            None => {
                let name = self.display(symbol).to_string();
                self.raise(EvalError::UnboundSymbol(name))
            }
        }
    }

    /// Scans the environment head to tail comparing names. Entries that are not pairs are skipped.
    pub fn find(&self, symbol: Value, env: Value) -> Option<Value> {
        let mut current = env;

        while let Kind::Cons(address) = current.kind() {
            let cell = self.heap.cell(address);
            let binding = cell.car;
            current = cell.cdr;

            if let Kind::Cons(binding) = binding.kind() {
                let binding = self.heap.cell(binding);
                if !self.symbol_equal(binding.car, symbol).is_nil() {
                    return Some(binding.cdr);
                }
            }
        }

        None
    }

    /// An environment binding every builtin name to its BUILTIN value, and `t` to itself.
    pub fn builtin_environment(&mut self) -> Value {
        let t = self.encode_chain(b"t").retag(Tag::Symbol);
        let mut env = self.extend(t, t, Value::nil());

        for builtin in Builtin::ALL {
            let symbol = self
                .encode_chain(builtin.name().as_bytes())
                .retag(Tag::Symbol);
            env = self.extend(symbol, builtin.to_value(), env);
        }

        log::debug!("seeded environment with {} builtins", Builtin::ALL.len());
        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extend_prepends_a_binding() {
        let mut machine = Machine::new();
        let x = machine.symbol("x").unwrap();
        let env = machine.extend(x, Value::make_number(1), Value::nil());

        let binding = machine.car(env);
        assert_eq!(machine.car(binding), x);
        assert_eq!(machine.cdr(binding), Value::make_number(1));
        assert_eq!(machine.cdr(env), Value::nil());
    }

    #[test]
    fn newest_binding_shadows() {
        let mut machine = Machine::new();
        let s = machine.symbol("s").unwrap();
        let older = machine.extend(s, Value::make_number(2), Value::nil());
        let newer = machine.extend(s, Value::make_number(1), older);

        let again = machine.symbol("s").unwrap();
        assert_eq!(machine.lookup(again, newer), Value::make_number(1));
        assert_eq!(machine.lookup(again, older), Value::make_number(2));
    }

    #[test]
    fn unbound_symbols_are_errors() {
        let mut machine = Machine::new();
        let a = machine.symbol("a").unwrap();
        let env = machine.extend(a, Value::make_number(1), Value::nil());

        let missing = machine.symbol("missing").unwrap();
        let result = machine.lookup(missing, env);
        assert!(result.is_error());
        assert_eq!(
            machine.error_text(result).as_deref(),
            Some("unbound symbol 'missing'")
        );
    }

    #[test]
    fn builtins_are_bound_by_name() {
        let mut machine = Machine::new();
        let env = machine.builtin_environment();

        for builtin in Builtin::ALL {
            let symbol = machine.symbol(builtin.name()).unwrap();
            assert_eq!(machine.lookup(symbol, env), builtin.to_value());
        }
    }

    #[test]
    fn t_evaluates_to_itself() {
        let mut machine = Machine::new();
        let env = machine.builtin_environment();
        let t = machine.symbol("t").unwrap();

        let value = machine.lookup(t, env);
        assert_eq!(machine.symbol_equal(value, t), Value::make_number(1));
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_lookup_finds_latest(names in proptest::collection::vec("[a-d]{1,2}", 1..12)) {
            let mut machine = Machine::new();
            let mut env = Value::nil();
            for (index, name) in names.iter().enumerate() {
                let symbol = machine.symbol(name).unwrap();
                env = machine.extend(symbol, Value::make_number(index as i32), env);
            }

            for name in &names {
                let latest = names.iter().rposition(|other| other == name).unwrap();
                let symbol = machine.symbol(name).unwrap();
                prop_assert_eq!(machine.lookup(symbol, env), Value::make_number(latest as i32));
            }
        }
    }
}
