//! Dabble is a tiny lisp running on a virtual machine made of 64 bit tagged words. Every value is a
//! single word, pairs live in an append-only heap, and names and error messages are byte chains
//! stored in that same heap. Nothing is ever freed.
//!
//! The core is the [Machine]: value construction, the pair primitives, the byte chain codec, the
//! environment and the evaluator. The [reader] and the [printer] are thin translators between text
//! and values that only use the operations of the machine, and [library] binds lisp sources to
//! names before a session starts.
//!
//! # Supported Syntax
//!
//! ```lisp
//! (quote <value>)                 ; or '<value>
//! (if <condition> <then> <else>)  ; only nil is false
//! (label <name> <value> <body>)
//! (lambda (<name>*) <body>)
//! (macro (<name>*) <body>)        ; expands, then evaluates in the caller
//! (cons <car> <cdr>)
//! (car <pair>)
//! (cdr <pair>)
//! (atom <value>)
//! (eq <a> <b>)
//! (error <symbol>)                ; raises an error named by the symbol
//! (apply <function> <list>)
//! ```

pub mod builtins;
pub mod chain;
pub mod environment;
pub mod error;
pub mod eval;
pub mod heap;
pub mod library;
pub mod machine;
pub mod printer;
pub mod reader;
pub mod value;

pub use builtins::Builtin;
pub use chain::ChainError;
pub use error::EvalError;
pub use library::LibraryError;
pub use machine::{Config, Machine};
pub use reader::{read, ReadError};
pub use value::{Address, Kind, Tag, Value, ValueError};
