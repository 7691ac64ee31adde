use thiserror::Error;

/// Errors raised while compiling or evaluating a path expression.
///
/// `Clone` so that components holding a failed expression can replay the same
/// error on every subsequent call (sticky-fault contract).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum XPathError {
    #[error("invalid path expression: {0}")]
    Parse(String),
    #[error("path evaluation failed: {0}")]
    Eval(String),
    #[error("expression matched more than one node")]
    AmbiguousMatch,
}
