//! Streaming readers: incremental tree construction with record-boundary
//! detection and bounded memory.
//!
//! Both format readers drive the same state machine (`StreamState`): a node
//! becomes a *candidate* the moment its structural position is fixed (entry),
//! judged against the record path with its trailing predicate stripped; it
//! becomes the delivered *target* only when it completes and the full record
//! path, predicate included, still selects it. Near-misses are removed from
//! the tree so memory stays bounded by one record's subtree.

mod json;
mod stream;
mod xml;

pub use json::JsonReader;
pub use xml::XmlReader;

use crate::error::ReaderError;
use crate::tree::{NodeArena, NodeId};

/// Pull interface shared by the format readers.
pub trait RecordReader {
    /// Advance to the next record. Returns `Ok(None)` at end of input. After
    /// a terminal error every subsequent call returns that same error.
    ///
    /// The subtree of a previously returned record is implicitly released on
    /// the next call unless [`RecordReader::release`] already did so.
    fn read(&mut self) -> Result<Option<NodeId>, ReaderError>;

    /// Explicitly release the subtree of the last delivered record.
    fn release(&mut self);

    /// The tree being built. The delivered record's subtree is stable until
    /// released.
    fn arena(&self) -> &NodeArena;

    /// Approximate 1-based source line, for diagnostics only.
    fn line(&self) -> u64;
}
