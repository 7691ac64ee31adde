use remold_xpath::XPathError;
use thiserror::Error;

/// Terminal reader failures. `Clone` so a reader can keep returning the same
/// error once it has faulted (sticky-fault contract).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReaderError {
    #[error("{input}:{line}: malformed input: {message}")]
    Malformed { input: String, line: u64, message: String },
    #[error("{input}:{line}: undeclared namespace prefix '{prefix}'")]
    UndeclaredNamespace { input: String, line: u64, prefix: String },
    #[error("{input}: invalid record path: {source}")]
    InvalidPath {
        input: String,
        #[source]
        source: XPathError,
    },
    #[error("{input}:{line}: record path evaluation failed: {source}")]
    Query {
        input: String,
        line: u64,
        #[source]
        source: XPathError,
    },
}

/// Failure while loading the declaration tree from schema JSON.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid schema header: {source}")]
    Header {
        #[source]
        source: serde_json::Error,
    },
    #[error("transform section is not a JSON object")]
    NotAnObject,
    #[error("missing reserved '{key}' entry naming the root declaration")]
    MissingRoot { key: &'static str },
    #[error("root declaration '{name}' is not defined")]
    UnknownRoot { name: String },
    #[error("{fqdn}: more than one declaration kind given")]
    MultipleKinds { fqdn: String },
    #[error("{fqdn}: 'xpath' and 'xpath_dynamic' are mutually exclusive")]
    ConflictingPaths { fqdn: String },
    #[error("{fqdn}: unknown result type '{value}'")]
    UnknownResultType { fqdn: String, value: String },
    #[error("{fqdn}: invalid declaration: {source}")]
    Invalid {
        fqdn: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Record-level (continuable) transform failures, qualified with the fully
/// qualified dotted name of the originating declaration.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("{fqdn}: external property '{name}' not found")]
    MissingExternal { fqdn: String, name: String },
    #[error("{fqdn}: ambiguous field: path {path:?} matched more than one node")]
    AmbiguousField { fqdn: String, path: String },
    #[error("{fqdn}: cannot convert {value:?} to {target}")]
    Conversion { fqdn: String, value: String, target: &'static str },
    #[error("{fqdn}: unknown function '{name}'")]
    UnknownFunction { fqdn: String, name: String },
    #[error("{fqdn}: function '{name}' failed: {message}")]
    Function { fqdn: String, name: String, message: String },
    #[error("{fqdn}: template '{name}' is not defined")]
    UnknownTemplate { fqdn: String, name: String },
    #[error("{fqdn}: template recursion limit exceeded")]
    TemplateDepth { fqdn: String },
    #[error("{fqdn}: {source}")]
    Path {
        fqdn: String,
        #[source]
        source: XPathError,
    },
}

/// Top-level error split: reader faults are terminal, record faults are
/// continuable (the caller may keep requesting records).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Reader(#[from] ReaderError),
    #[error("record transform failed: {0}")]
    Record(#[from] TransformError),
}

impl EngineError {
    pub fn is_continuable(&self) -> bool {
        matches!(self, EngineError::Record(_))
    }
}
