//! The fixed table of primitive operators. A BUILTIN value carries an index into this table.

use std::fmt::Display;

use crate::error::EvalError;
use crate::machine::Machine;
use crate::value::{Kind, Tag, Value};

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Cons = 0,
    Car = 1,
    Cdr = 2,
    Atom = 3,
    Eq = 4,
    Error = 5,
    Apply = 6,
}

impl Builtin {
    /// Every builtin, in table order.
    pub const ALL: [Builtin; 7] = [
        Builtin::Cons,
        Builtin::Car,
        Builtin::Cdr,
        Builtin::Atom,
        Builtin::Eq,
        Builtin::Error,
        Builtin::Apply,
    ];

    pub fn id(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Cons => "cons",
            Builtin::Car => "car",
            Builtin::Cdr => "cdr",
            Builtin::Atom => "atom",
            Builtin::Eq => "eq",
            Builtin::Error => "error",
            Builtin::Apply => "apply",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Builtin::Cons | Builtin::Eq | Builtin::Apply => 2,
            Builtin::Car | Builtin::Cdr | Builtin::Atom | Builtin::Error => 1,
        }
    }

    pub fn to_value(self) -> Value {
        Value::make_builtin(self.id())
    }

    /// Looks an id up in the table.
    pub fn from_id(id: u32) -> Result<Builtin, EvalError> {
        Builtin::ALL
            .get(id as usize)
            .copied()
            .ok_or(EvalError::UnknownBuiltin(id))
    }
}

impl Display for Builtin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Machine {
    /// Applies a builtin to already evaluated operands. The `Err` side is an ERROR value.
    pub(crate) fn apply_builtin(
        &mut self,
        builtin: Builtin,
        args: &[Value],
    ) -> Result<Value, Value> {
        if args.len() != builtin.arity() {
            let error = EvalError::WrongArity(builtin.arity(), args.len());
            return Err(self.raise(error));
        }

        match builtin {
            Builtin::Cons => Ok(self.cons(args[0], args[1])),
            Builtin::Car => self.assert_list(args[0]).map(|list| self.car(list)),
            Builtin::Cdr => self.assert_list(args[0]).map(|list| self.cdr(list)),
            Builtin::Atom => Ok(self.atom(args[0])),
            Builtin::Eq => Ok(self.eq(args[0], args[1])),
            Builtin::Error => Err(self.user_error(args[0])),
            Builtin::Apply => self.apply_to_list(args[0], args[1]),
        }
    }

    fn assert_list(&mut self, value: Value) -> Result<Value, Value> {
        match value.kind() {
            Kind::Nil | Kind::Cons(_) => Ok(value),
            _ => {
                let value = self.display(value).to_string();
                Err(self.raise(EvalError::ExpectedList(value)))
            }
        }
    }

    /// An ERROR whose message is the name of the `reason` symbol.
    fn user_error(&mut self, reason: Value) -> Value {
        if reason.get_type() != Tag::Symbol {
            let reason = self.display(reason).to_string();
            return self.raise(EvalError::NonSymbolError(reason));
        }

        // The chain of a symbol is already a valid message.
        self.symbol_chain(reason).retag(Tag::Error)
    }
}
