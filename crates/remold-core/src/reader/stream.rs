use remold_xpath::{CompiledPath, PathCache, XPathError};

use crate::cursor::TreeCursor;
use crate::error::ReaderError;
use crate::tree::{NodeArena, NodeId};

/// Record-detection state shared by the format readers.
///
/// Exactly one candidate is tracked at a time; structurally matching nodes
/// that open while a candidate is pending are ignored until it resolves.
pub(crate) struct StreamState {
    arena: NodeArena,
    current: NodeId,
    candidate: Option<NodeId>,
    pending_target: Option<NodeId>,
    /// Full record path, used as the final filter on completion.
    full_path: CompiledPath,
    /// Record path with its trailing predicate stripped, used for candidate
    /// detection on entry.
    stripped_path: CompiledPath,
    input: String,
    pub line: u64,
}

impl StreamState {
    pub fn new(input: &str, record_path: &str, cache: &PathCache) -> Result<Self, ReaderError> {
        let full_path = cache
            .get(record_path)
            .map_err(|source| ReaderError::InvalidPath { input: input.to_string(), source })?;
        let stripped_path = full_path.without_trailing_predicates();
        let arena = NodeArena::new();
        let current = arena.root();
        Ok(Self {
            arena,
            current,
            candidate: None,
            pending_target: None,
            full_path,
            stripped_path,
            input: input.to_string(),
            line: 1,
        })
    }

    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut NodeArena {
        &mut self.arena
    }

    pub fn current(&self) -> NodeId {
        self.current
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn root(&self) -> NodeId {
        self.arena.root()
    }

    /// Whether a stream candidate is currently tracked, i.e. the insertion
    /// point is inside a potential record subtree.
    pub fn has_candidate(&self) -> bool {
        self.candidate.is_some()
    }

    /// Remove the previously delivered record's subtree, if still present.
    pub fn release_pending(&mut self) {
        if let Some(target) = self.pending_target.take() {
            self.arena.remove_subtree(target);
        }
    }

    /// Append `node` under the current insertion point without descending
    /// (attributes, text).
    pub fn append(&mut self, node: NodeId) {
        self.arena.add_child(self.current, node);
    }

    /// Append `node` and make it the new insertion point, then consider it as
    /// a stream candidate: its structural position is fixed on entry.
    pub fn open(&mut self, node: NodeId) -> Result<(), ReaderError> {
        self.arena.add_child(self.current, node);
        self.current = node;
        self.consider_candidate(node)
    }

    fn consider_candidate(&mut self, node: NodeId) -> Result<(), ReaderError> {
        if self.candidate.is_some() {
            return Ok(());
        }
        let selected = {
            let root = TreeCursor::new(&self.arena, self.arena.root());
            let target = TreeCursor::new(&self.arena, node);
            self.stripped_path.selects(&root, &target).map_err(|e| self.query_error(e))?
        };
        if selected {
            tracing::trace!(line = self.line, "stream candidate detected");
            self.candidate = Some(node);
        }
        Ok(())
    }

    /// Close the current node (ascend). When the closing node is the tracked
    /// candidate, the full record path decides whether it is delivered as a
    /// target or discarded to reclaim memory.
    pub fn close(&mut self) -> Result<Option<NodeId>, ReaderError> {
        let completed = self.current;
        if let Some(parent) = self.arena.get(completed).and_then(crate::tree::NodeData::parent) {
            self.current = parent;
        }
        if self.candidate != Some(completed) {
            return Ok(None);
        }
        self.candidate = None;
        let confirmed = {
            let root = TreeCursor::new(&self.arena, self.arena.root());
            let target = TreeCursor::new(&self.arena, completed);
            self.full_path.selects(&root, &target).map_err(|e| self.query_error(e))?
        };
        if confirmed {
            tracing::debug!(line = self.line, "record target resolved");
            self.pending_target = Some(completed);
            Ok(Some(completed))
        } else {
            // Structural match that failed the predicate: reclaim its memory
            // so a later sibling can become the next candidate.
            tracing::trace!(line = self.line, "stream candidate discarded");
            self.arena.remove_subtree(completed);
            Ok(None)
        }
    }

    fn query_error(&self, source: XPathError) -> ReaderError {
        ReaderError::Query { input: self.input.clone(), line: self.line, source }
    }

    pub fn malformed(&self, message: impl Into<String>) -> ReaderError {
        ReaderError::Malformed { input: self.input.clone(), line: self.line, message: message.into() }
    }
}
