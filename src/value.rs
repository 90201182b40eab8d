//! This module describes the values that the dabble machine manipulates. A [Value] is a single 64
//! bit word: the upper byte holds a [Tag], bits 32 to 55 are reserved and always zero, and the
//! lower 32 bits hold a payload whose meaning depends on the tag.
//!
//! The packed word is only the boundary representation. Everything that needs to branch on the
//! type of a value goes through [Value::kind], which classifies the word into a [Kind].

use std::fmt::{Debug, Display};

use thiserror::Error;

pub const TAG_SHIFT: u64 = 56;

pub const PAYLOAD_MASK: u64 = 0x0000_0000_FFFF_FFFF;

pub const RESERVED_MASK: u64 = 0x00FF_FFFF_0000_0000;

/// Size in bytes of one heap cell, and therefore the distance between two addresses.
pub const CELL_SIZE: u32 = 16;

/// The type discriminator stored in the upper byte of a [Value].
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tag {
    Nil = 0x00,
    Number = 0x01,
    Symbol = 0x02,
    Cons = 0x03,
    Lambda = 0x04,
    Macro = 0x05,
    Error = 0x06,
    Builtin = 0x07,
    Bytes1 = 0x08,
    Bytes2 = 0x09,
    Bytes3 = 0x0A,
    Bytes4 = 0x0B,
}

impl Tag {
    /// Whether values with this tag carry a heap address as payload.
    pub fn is_addressed(self) -> bool {
        matches!(
            self,
            Tag::Symbol | Tag::Cons | Tag::Lambda | Tag::Macro | Tag::Error
        )
    }

    pub fn is_bytes(self) -> bool {
        matches!(self, Tag::Bytes1 | Tag::Bytes2 | Tag::Bytes3 | Tag::Bytes4)
    }

    /// Decodes the upper byte of a word.
    pub fn from_byte(tag: u8) -> Result<Tag, ValueError> {
        Ok(match tag {
            0x00 => Tag::Nil,
            0x01 => Tag::Number,
            0x02 => Tag::Symbol,
            0x03 => Tag::Cons,
            0x04 => Tag::Lambda,
            0x05 => Tag::Macro,
            0x06 => Tag::Error,
            0x07 => Tag::Builtin,
            0x08 => Tag::Bytes1,
            0x09 => Tag::Bytes2,
            0x0A => Tag::Bytes3,
            0x0B => Tag::Bytes4,
            _ => return Err(ValueError::UnknownTag(tag)),
        })
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Tag::Nil => "nil",
            Tag::Number => "number",
            Tag::Symbol => "symbol",
            Tag::Cons => "cons",
            Tag::Lambda => "lambda",
            Tag::Macro => "macro",
            Tag::Error => "error",
            Tag::Builtin => "builtin",
            Tag::Bytes1 => "bytes1",
            Tag::Bytes2 => "bytes2",
            Tag::Bytes3 => "bytes3",
            Tag::Bytes4 => "bytes4",
        };
        write!(f, "{name}")
    }
}

/// Errors raised when a raw word is turned back into a [Value].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    #[error("unknown type tag 0x{0:02x}")]
    UnknownTag(u8),

    #[error("reserved bits are set in 0x{0:016x}")]
    ReservedBits(u64),
}

/// A heap address. Addresses are byte offsets, so they are always a multiple of [CELL_SIZE].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub u32);

impl Address {
    /// The slot of the cell this address points to.
    pub fn index(self) -> usize {
        (self.0 / CELL_SIZE) as usize
    }
}

impl Debug for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Up to four raw bytes packed little-endian in a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bytes {
    len: u8,
    raw: [u8; 4],
}

impl Bytes {
    pub fn as_slice(&self) -> &[u8] {
        &self.raw[..self.len as usize]
    }
}

/// The classified form of a [Value].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Nil,
    Number(i32),
    Symbol(Address),
    Cons(Address),
    Lambda(Address),
    Macro(Address),
    Error(Address),
    Builtin(u32),
    Bytes(Bytes),
}

/// A tagged 64 bit word. Values are plain data: they are copied freely and never mutated.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Value(u64);

impl Value {
    pub const NIL: Value = Value(0);

    /// Packs a tag and a payload. The reserved bits are left zero.
    #[inline(always)]
    pub(crate) const fn from_parts(tag: Tag, payload: u32) -> Value {
        Value(((tag as u64) << TAG_SHIFT) | payload as u64)
    }

    /// Checks a raw word coming from outside of the machine.
    pub fn from_bits(bits: u64) -> Result<Value, ValueError> {
        Tag::from_byte((bits >> TAG_SHIFT) as u8)?;

        if bits & RESERVED_MASK != 0 {
            return Err(ValueError::ReservedBits(bits));
        }

        Ok(Value(bits))
    }

    #[inline(always)]
    pub fn to_bits(self) -> u64 {
        self.0
    }

    #[inline(always)]
    pub fn nil() -> Value {
        Value::NIL
    }

    #[inline(always)]
    pub fn make_number(number: i32) -> Value {
        Value::from_parts(Tag::Number, number as u32)
    }

    pub fn make_bytes1(byte: u8) -> Value {
        Value::from_parts(Tag::Bytes1, byte as u32)
    }

    pub fn make_bytes2(bytes: [u8; 2]) -> Value {
        Value::from_parts(Tag::Bytes2, u16::from_le_bytes(bytes) as u32)
    }

    pub fn make_bytes3(bytes: [u8; 3]) -> Value {
        let [a, b, c] = bytes;
        Value::from_parts(Tag::Bytes3, u32::from_le_bytes([a, b, c, 0]))
    }

    pub fn make_bytes4(bytes: [u8; 4]) -> Value {
        Value::from_parts(Tag::Bytes4, u32::from_le_bytes(bytes))
    }

    /// Packs one to four bytes in a single immediate value, `None` for any other length.
    pub fn make_bytes(bytes: &[u8]) -> Option<Value> {
        match *bytes {
            [a] => Some(Value::make_bytes1(a)),
            [a, b] => Some(Value::make_bytes2([a, b])),
            [a, b, c] => Some(Value::make_bytes3([a, b, c])),
            [a, b, c, d] => Some(Value::make_bytes4([a, b, c, d])),
            _ => None,
        }
    }

    pub fn make_builtin(id: u32) -> Value {
        Value::from_parts(Tag::Builtin, id)
    }

    #[inline(always)]
    pub fn get_type(self) -> Tag {
        match Tag::from_byte((self.0 >> TAG_SHIFT) as u8) {
            Ok(tag) => tag,
            // Every constructor and `from_bits` only produce known tags.
            Err(_) => unreachable!("value 0x{:016x} carries an unknown tag", self.0),
        }
    }

    #[inline(always)]
    pub fn get_value(self) -> u32 {
        (self.0 & PAYLOAD_MASK) as u32
    }

    #[inline(always)]
    pub fn is_nil(self) -> bool {
        self.get_type() == Tag::Nil
    }

    pub fn is_error(self) -> bool {
        self.get_type() == Tag::Error
    }

    /// Number of bytes carried by a BYTES value.
    pub fn get_byte_count(self) -> Option<u8> {
        match self.get_type() {
            Tag::Bytes1 => Some(1),
            Tag::Bytes2 => Some(2),
            Tag::Bytes3 => Some(3),
            Tag::Bytes4 => Some(4),
            _ => None,
        }
    }

    pub fn bytes(self) -> Option<Bytes> {
        let len = self.get_byte_count()?;
        Some(Bytes {
            len,
            raw: self.get_value().to_le_bytes(),
        })
    }

    pub fn address(self) -> Option<Address> {
        if self.get_type().is_addressed() {
            Some(Address(self.get_value()))
        } else {
            None
        }
    }

    pub fn kind(self) -> Kind {
        let payload = self.get_value();
        match self.get_type() {
            Tag::Nil => Kind::Nil,
            Tag::Number => Kind::Number(payload as i32),
            Tag::Symbol => Kind::Symbol(Address(payload)),
            Tag::Cons => Kind::Cons(Address(payload)),
            Tag::Lambda => Kind::Lambda(Address(payload)),
            Tag::Macro => Kind::Macro(Address(payload)),
            Tag::Error => Kind::Error(Address(payload)),
            Tag::Builtin => Kind::Builtin(payload),
            Tag::Bytes1 | Tag::Bytes2 | Tag::Bytes3 | Tag::Bytes4 => match self.bytes() {
                Some(bytes) => Kind::Bytes(bytes),
                None => unreachable!(),
            },
        }
    }

    /// Re-tags a value while keeping its payload. Used to view a symbol or error as the chain it
    /// points to, and to wrap a closure record.
    pub(crate) fn retag(self, tag: Tag) -> Value {
        Value::from_parts(tag, self.get_value())
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind() {
            Kind::Nil => write!(f, "Nil"),
            Kind::Number(n) => write!(f, "Number({n})"),
            Kind::Symbol(addr) => write!(f, "Symbol({addr:?})"),
            Kind::Cons(addr) => write!(f, "Cons({addr:?})"),
            Kind::Lambda(addr) => write!(f, "Lambda({addr:?})"),
            Kind::Macro(addr) => write!(f, "Macro({addr:?})"),
            Kind::Error(addr) => write!(f, "Error({addr:?})"),
            Kind::Builtin(id) => write!(f, "Builtin({id})"),
            Kind::Bytes(bytes) => write!(f, "Bytes({:?})", bytes.as_slice()),
        }
    }
}
