//! Streaming transformation of semi-structured documents into JSON.
//!
//! An input document (XML or JSON) is read incrementally into a canonical
//! arena tree; record subtrees are detected against a schema-supplied path
//! expression, handed to the declaration interpreter, and released again so
//! memory stays bounded by one record regardless of document size.
//!
//! Entry point is [`DocumentSession`]: construct it from an input source and
//! a loaded [`DocumentSchema`], then pull transformed values with
//! [`DocumentSession::next_value`] until it returns `None`.

pub mod cursor;
pub mod decl;
pub mod error;
pub mod functions;
pub mod reader;
pub mod session;
pub mod transform;
pub mod tree;

pub use cursor::TreeCursor;
pub use decl::{Decl, DeclKind, DeclSet, ResultType, ROOT_KEY};
pub use error::{EngineError, ReaderError, SchemaError, TransformError};
pub use functions::{FunctionCtx, FunctionError, FunctionRegistry, TransformFn};
pub use reader::{JsonReader, RecordReader, XmlReader};
pub use session::{DocumentSchema, DocumentSession, InputFormat, SchemaHeader};
pub use transform::Transformer;
pub use tree::{FormatDetail, JsonFlags, NodeArena, NodeData, NodeId};
