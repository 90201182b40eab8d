//! Libraries are lisp sources whose value is bound to a name before a session starts. A library is
//! evaluated in the environment built so far, so it can use the builtins and every library loaded
//! before it.

use miette::Diagnostic;
use thiserror::Error;

use crate::chain::ChainError;
use crate::machine::Machine;
use crate::reader::{read, ReadError};
use crate::value::Value;

#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum LibraryError {
    #[error("library name '{name}' is not a valid symbol: {reason}")]
    #[diagnostic(code(dabble::library::invalid_name))]
    InvalidName { name: String, reason: ChainError },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Read(#[from] ReadError),

    #[error("library '{name}' failed: {message}")]
    #[diagnostic(code(dabble::library::failed))]
    Failed { name: String, message: String },
}

impl Machine {
    /// Evaluates every expression of `source` in `env` and binds the value of the last one to
    /// `name`, returning the extended environment. An empty library binds NIL.
    pub fn load_library(
        &mut self,
        env: Value,
        name: &str,
        source: &str,
    ) -> Result<Value, LibraryError> {
        let symbol = self
            .symbol(name)
            .map_err(|reason| LibraryError::InvalidName {
                name: name.into(),
                reason,
            })?;

        let mut value = Value::nil();
        for expr in read(self, source)? {
            value = self.eval(expr, env);

            if let Some(message) = self.error_text(value) {
                return Err(LibraryError::Failed {
                    name: name.into(),
                    message,
                });
            }
        }

        log::debug!("loaded library {name}");
        Ok(self.extend(symbol, value, env))
    }
}
