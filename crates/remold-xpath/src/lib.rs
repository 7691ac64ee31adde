//! XPath 1.0-subset engine evaluated over a generic [`DocumentCursor`].
//!
//! The crate is storage-agnostic: anything that can expose a node tree
//! through the cursor contract in [`model`] can be queried. Expressions are
//! parsed once into an AST ([`query::CompiledPath`]) and shared freely;
//! [`query::PathCache`] bounds the cost of repeated compilation.

pub mod error;
pub mod evaluator;
pub mod functions;
pub mod model;
pub mod parser;
pub mod query;
pub mod runtime;
pub mod simple_node;
pub mod xdm;

pub use error::XPathError;
pub use evaluator::evaluate;
pub use model::{DocumentCursor, NodeKind, QName, move_to_root};
pub use parser::parse_xpath;
pub use query::{CompiledPath, PathCache};
pub use runtime::StaticContext;
pub use xdm::{AtomicValue, XdmItem, XdmSequence};
