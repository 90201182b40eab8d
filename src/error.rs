/// Conditions detected while evaluating. They never leave the machine as Rust errors: the
/// evaluator encodes their message into an ERROR value.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("unbound symbol '{0}'")]
    UnboundSymbol(String),

    #[error("cannot call as function '{0}'")]
    NotCallable(String),

    #[error("wrong arity, expected {0} arguments, got {1}")]
    WrongArity(usize, usize),

    #[error("unknown builtin #{0}")]
    UnknownBuiltin(u32),

    #[error("malformed {0}: expected {1} arguments, got {2}")]
    MalformedForm(&'static str, usize, usize),

    #[error("expected an identifier but got '{0}'")]
    ExpectedIdentifier(String),

    #[error("expected a list but got '{0}'")]
    ExpectedList(String),

    #[error("apply non function '{0}'")]
    ApplyNonFunction(String),

    #[error("apply to non list '{0}'")]
    ApplyNonList(String),

    #[error("non-symbol error '{0}'")]
    NonSymbolError(String),

    #[error("recursion depth exceeded ({0} nested evaluations)")]
    DepthExceeded(usize),
}
