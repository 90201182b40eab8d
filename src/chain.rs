//! Byte chains carry variable-length data inside the fixed-width value system. A chain is a proper
//! list whose elements are BYTES values; reading the fragments in order yields the encoded bytes.
//! Symbols and errors both point at a chain: a SYMBOL or ERROR payload is the address of the first
//! pair of its chain.

use thiserror::Error;

use crate::machine::{truth, Machine};
use crate::value::{Kind, Tag, Value};

/// Errors raised when wrapping a chain as a symbol or an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("a byte chain cannot be empty")]
    Empty,

    #[error("a byte chain must be a proper list")]
    Improper,

    #[error("a byte chain can only hold bytes, found a {0}")]
    NotBytes(Tag),
}

/// Iterator over the bytes of a chain. Elements that are not BYTES values contribute nothing.
pub struct ChainBytes<'a> {
    machine: &'a Machine,
    rest: Value,
    fragment: [u8; 4],
    len: usize,
    position: usize,
}

impl Iterator for ChainBytes<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        while self.position == self.len {
            let Kind::Cons(address) = self.rest.kind() else {
                return None;
            };

            let cell = self.machine.heap.cell(address);
            self.rest = cell.cdr;
            self.position = 0;
            self.len = 0;

            if let Some(bytes) = cell.car.bytes() {
                let slice = bytes.as_slice();
                self.len = slice.len();
                self.fragment[..self.len].copy_from_slice(slice);
            }
        }

        let byte = self.fragment[self.position];
        self.position += 1;
        Some(byte)
    }
}

impl Machine {
    /// Encodes bytes greedily in fragments of four, with a shorter last fragment, so the chain has
    /// `ceil(len / 4)` elements.
    pub fn encode_chain(&mut self, bytes: &[u8]) -> Value {
        let fragments = bytes
            .chunks(4)
            .filter_map(Value::make_bytes)
            .collect::<Vec<_>>();

        self.list(&fragments)
    }

    pub fn chain_bytes(&self, chain: Value) -> ChainBytes<'_> {
        ChainBytes {
            machine: self,
            rest: chain,
            fragment: [0; 4],
            len: 0,
            position: 0,
        }
    }

    pub fn decode_chain(&self, chain: Value) -> Vec<u8> {
        self.chain_bytes(chain).collect()
    }

    fn check_chain(&self, chain: Value) -> Result<(), ChainError> {
        if chain.is_nil() {
            return Err(ChainError::Empty);
        }

        let mut current = chain;
        loop {
            match current.kind() {
                Kind::Nil => return Ok(()),
                Kind::Cons(address) => {
                    let cell = self.heap.cell(address);
                    let tag = cell.car.get_type();
                    if !tag.is_bytes() {
                        return Err(ChainError::NotBytes(tag));
                    }
                    current = cell.cdr;
                }
                _ => return Err(ChainError::Improper),
            }
        }
    }

    pub fn make_symbol(&self, chain: Value) -> Result<Value, ChainError> {
        self.check_chain(chain)?;
        Ok(chain.retag(Tag::Symbol))
    }

    pub fn make_error(&self, chain: Value) -> Result<Value, ChainError> {
        self.check_chain(chain)?;
        Ok(chain.retag(Tag::Error))
    }

    /// Builds a symbol out of its name.
    pub fn symbol(&mut self, name: &str) -> Result<Value, ChainError> {
        let chain = self.encode_chain(name.as_bytes());
        self.make_symbol(chain)
    }

    /// Builds an error value carrying `message`.
    pub fn error(&mut self, message: &str) -> Value {
        let message = if message.is_empty() { "error" } else { message };
        self.encode_chain(message.as_bytes()).retag(Tag::Error)
    }

    /// The chain holding the message of an ERROR value, NIL for anything else.
    pub fn error_message(&self, value: Value) -> Value {
        match value.kind() {
            Kind::Error(_) => value.retag(Tag::Cons),
            _ => Value::nil(),
        }
    }

    /// The chain naming a SYMBOL value, NIL for anything else.
    pub fn symbol_chain(&self, value: Value) -> Value {
        match value.kind() {
            Kind::Symbol(_) => value.retag(Tag::Cons),
            _ => Value::nil(),
        }
    }

    pub fn symbol_name(&self, value: Value) -> Option<String> {
        match value.kind() {
            Kind::Symbol(_) => {
                let bytes = self.decode_chain(self.symbol_chain(value));
                Some(String::from_utf8_lossy(&bytes).into_owned())
            }
            _ => None,
        }
    }

    pub fn error_text(&self, value: Value) -> Option<String> {
        match value.kind() {
            Kind::Error(_) => {
                let bytes = self.decode_chain(self.error_message(value));
                Some(String::from_utf8_lossy(&bytes).into_owned())
            }
            _ => None,
        }
    }

    /// Whether a symbol is spelled exactly as `name`.
    pub fn symbol_is(&self, value: Value, name: &[u8]) -> bool {
        matches!(value.kind(), Kind::Symbol(_))
            && self
                .chain_bytes(self.symbol_chain(value))
                .eq(name.iter().copied())
    }

    /// Name comparison of two symbols. Unlike [Machine::eq], two symbols allocated separately are
    /// equal here when they are spelled the same.
    pub fn symbol_equal(&self, a: Value, b: Value) -> Value {
        match (a.kind(), b.kind()) {
            (Kind::Symbol(x), Kind::Symbol(y)) if x == y => truth(true),
            (Kind::Symbol(_), Kind::Symbol(_)) => truth(
                self.chain_bytes(self.symbol_chain(a))
                    .eq(self.chain_bytes(self.symbol_chain(b))),
            ),
            _ => Value::nil(),
        }
    }
}
