use core::fmt;

/// Node classification shared by every input format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Element,
    Attribute,
    Text,
}

/// Qualified name of an element or attribute node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
    pub ns_uri: Option<String>,
}

impl QName {
    pub fn local(local: impl Into<String>) -> Self {
        Self { prefix: None, local: local.into(), ns_uri: None }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(p) => write!(f, "{}:{}", p, self.local),
            None => write!(f, "{}", self.local),
        }
    }
}

/// Cursor contract the evaluator walks a document tree through.
///
/// A cursor addresses exactly one node. Every `move_to_*` operation returns
/// `true` and repositions the cursor, or returns `false` and leaves it where
/// it was. Attribute nodes form a separate pseudo-axis: `move_to_first_child`
/// never lands on an attribute, and attributes are only reachable through
/// `move_to_first_attribute`/`move_to_next_attribute`.
pub trait DocumentCursor: Clone + PartialEq + fmt::Debug {
    fn kind(&self) -> NodeKind;
    /// Name of the addressed node (elements and attributes; `None` otherwise).
    fn name(&self) -> Option<QName>;
    /// Concatenated descendant text, skipping attribute subtrees. For
    /// attribute and text nodes this is the literal payload.
    fn string_value(&self) -> String;

    fn move_to_parent(&mut self) -> bool;
    fn move_to_first_child(&mut self) -> bool;
    fn move_to_next_sibling(&mut self) -> bool;
    fn move_to_previous_sibling(&mut self) -> bool;
    fn move_to_first_sibling(&mut self) -> bool;
    fn move_to_first_attribute(&mut self) -> bool;
    fn move_to_next_attribute(&mut self) -> bool;
}

/// Position the cursor on the tree root by walking the parent chain.
pub fn move_to_root<C: DocumentCursor>(cursor: &mut C) {
    while cursor.move_to_parent() {}
}
