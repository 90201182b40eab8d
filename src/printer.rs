//! Renders values back to text. Rendering needs the heap to follow pairs and byte chains, so a
//! value is displayed through a [Printer] borrowed from the [Machine].

use std::fmt::Display;

use crate::builtins::Builtin;
use crate::machine::Machine;
use crate::value::{Kind, Value};

pub struct Printer<'a> {
    machine: &'a Machine,
    value: Value,
}

impl Machine {
    pub fn display(&self, value: Value) -> Printer<'_> {
        Printer {
            machine: self,
            value,
        }
    }
}

/// Pending rendering work. Lists are walked with an explicit stack, so the depth of a value is
/// only limited by memory.
enum Frame {
    Value(Value),
    /// The tail of a list whose first element was already written.
    Rest(Value),
    Close,
}

impl Printer<'_> {
    fn chain(&self, f: &mut std::fmt::Formatter<'_>, chain: Value) -> std::fmt::Result {
        let bytes = self.machine.decode_chain(chain);
        write!(f, "{}", String::from_utf8_lossy(&bytes))
    }
}

impl Display for Printer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let machine = self.machine;
        let mut stack = vec![Frame::Value(self.value)];

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Value(value) => match value.kind() {
                    Kind::Nil => write!(f, "nil")?,
                    Kind::Number(number) => write!(f, "{number}")?,
                    Kind::Symbol(_) => self.chain(f, machine.symbol_chain(value))?,
                    Kind::Cons(_) => {
                        write!(f, "(")?;
                        stack.push(Frame::Rest(machine.cdr(value)));
                        stack.push(Frame::Value(machine.car(value)));
                    }
                    Kind::Lambda(_) => write!(f, "#<lambda>")?,
                    Kind::Macro(_) => write!(f, "#<macro>")?,
                    Kind::Error(_) => {
                        write!(f, "#<error: ")?;
                        self.chain(f, machine.error_message(value))?;
                        write!(f, ">")?;
                    }
                    Kind::Builtin(id) => match Builtin::from_id(id) {
                        Ok(builtin) => write!(f, "#<builtin:{builtin}>")?,
                        Err(_) => write!(f, "#<builtin:{id}>")?,
                    },
                    Kind::Bytes(bytes) => {
                        write!(f, "#<bytes:")?;
                        for byte in bytes.as_slice() {
                            write!(f, "{byte:02x}")?;
                        }
                        write!(f, ">")?;
                    }
                },
                Frame::Rest(rest) => match rest.kind() {
                    Kind::Nil => write!(f, ")")?,
                    Kind::Cons(_) => {
                        write!(f, " ")?;
                        stack.push(Frame::Rest(machine.cdr(rest)));
                        stack.push(Frame::Value(machine.car(rest)));
                    }
                    _ => {
                        write!(f, " . ")?;
                        stack.push(Frame::Close);
                        stack.push(Frame::Value(rest));
                    }
                },
                Frame::Close => write!(f, ")")?,
            }
        }

        Ok(())
    }
}
