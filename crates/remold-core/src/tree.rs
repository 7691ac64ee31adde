//! Canonical document tree: arena storage with generation-tagged handles.
//!
//! Nodes live in a contiguous slot vector and reference each other through
//! [`NodeId`] handles. Releasing a subtree recycles its slots; the generation
//! tag on every handle rejects use of a handle whose slot has since been
//! reused.

use bitflags::bitflags;
use remold_xpath::{NodeKind, QName};

bitflags! {
    /// JSON semantics carried by a node in addition to its [`NodeKind`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct JsonFlags: u16 {
        const ROOT = 1 << 0;
        const OBJECT = 1 << 1;
        const ARRAY = 1 << 2;
        const PROPERTY = 1 << 3;
        const VALUE_STRING = 1 << 4;
        const VALUE_NUMBER = 1 << 5;
        const VALUE_BOOLEAN = 1 << 6;
        const VALUE_NULL = 1 << 7;
    }
}

/// Format detail not common to all input formats. At most one variant is
/// active per node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FormatDetail {
    #[default]
    None,
    Xml {
        prefix: Option<String>,
        ns_uri: Option<String>,
    },
    Json(JsonFlags),
}

/// Generation-tagged handle into a [`NodeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
pub struct NodeData {
    kind: NodeKind,
    /// Tag/field name for Element and Attribute nodes, literal text for Text
    /// nodes, empty for the Document node.
    data: String,
    detail: FormatDetail,
    parent: Option<NodeId>,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
    prev_sibling: Option<NodeId>,
    next_sibling: Option<NodeId>,
}

impl NodeData {
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn detail(&self) -> &FormatDetail {
        &self.detail
    }

    pub fn json_flags(&self) -> JsonFlags {
        match self.detail {
            FormatDetail::Json(flags) => flags,
            _ => JsonFlags::empty(),
        }
    }

    /// Qualified name for Element/Attribute nodes.
    pub fn qname(&self) -> Option<QName> {
        match self.kind {
            NodeKind::Element | NodeKind::Attribute => match &self.detail {
                FormatDetail::Xml { prefix, ns_uri } => Some(QName {
                    prefix: prefix.clone(),
                    local: self.data.clone(),
                    ns_uri: ns_uri.clone(),
                }),
                _ => Some(QName::local(self.data.clone())),
            },
            _ => None,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn first_child(&self) -> Option<NodeId> {
        self.first_child
    }

    pub fn last_child(&self) -> Option<NodeId> {
        self.last_child
    }

    pub fn prev_sibling(&self) -> Option<NodeId> {
        self.prev_sibling
    }

    pub fn next_sibling(&self) -> Option<NodeId> {
        self.next_sibling
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    data: Option<NodeData>,
}

/// Arena-backed mutable tree. One Document root exists for the arena's whole
/// lifetime; every other node is created by a reader and eventually recycled
/// through [`NodeArena::remove_subtree`].
#[derive(Debug)]
pub struct NodeArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
}

impl NodeArena {
    pub fn new() -> Self {
        let mut arena = Self { slots: Vec::new(), free: Vec::new(), root: NodeId { index: 0, generation: 0 } };
        let root = arena.new_node(NodeKind::Document, String::new(), FormatDetail::None);
        arena.root = root;
        arena
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn new_node(&mut self, kind: NodeKind, data: String, detail: FormatDetail) -> NodeId {
        let node = NodeData {
            kind,
            data,
            detail,
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
        };
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.data = Some(node);
            NodeId { index, generation: slot.generation }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot { generation: 0, data: Some(node) });
            NodeId { index, generation: 0 }
        }
    }

    /// Resolve a handle; stale (recycled) handles yield `None`.
    pub fn get(&self, id: NodeId) -> Option<&NodeData> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.data.as_ref()
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.data.as_mut()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Append `child` as the new last child of `parent`. `child` must be
    /// detached. Returns `false` when either handle is stale.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if !self.contains(parent) || !self.contains(child) {
            return false;
        }
        let prev_last = match self.get(parent) {
            Some(p) => p.last_child(),
            None => return false,
        };
        {
            let Some(c) = self.get_mut(child) else { return false };
            debug_assert!(c.parent.is_none(), "child must be detached");
            c.parent = Some(parent);
            c.prev_sibling = prev_last;
            c.next_sibling = None;
        }
        if let Some(prev) = prev_last {
            if let Some(p) = self.get_mut(prev) {
                p.next_sibling = Some(child);
            }
        }
        if let Some(p) = self.get_mut(parent) {
            if p.first_child.is_none() {
                p.first_child = Some(child);
            }
            p.last_child = Some(child);
        }
        true
    }

    /// Detach `node` from the tree and recycle it together with all of its
    /// descendants. A no-op for the root and for stale handles.
    pub fn remove_subtree(&mut self, node: NodeId) {
        if node == self.root || !self.contains(node) {
            return;
        }
        self.detach(node);
        // Free slots iteratively; subtrees can be deep.
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if let Some(data) = self.get(id) {
                let mut child = data.first_child();
                while let Some(c) = child {
                    stack.push(c);
                    child = self.get(c).and_then(NodeData::next_sibling);
                }
            }
            let slot = &mut self.slots[id.index as usize];
            slot.data = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(id.index);
        }
    }

    fn detach(&mut self, node: NodeId) {
        let (parent, prev, next) = match self.get(node) {
            Some(n) => (n.parent(), n.prev_sibling(), n.next_sibling()),
            None => return,
        };
        if let Some(p) = prev {
            if let Some(d) = self.get_mut(p) {
                d.next_sibling = next;
            }
        }
        if let Some(n) = next {
            if let Some(d) = self.get_mut(n) {
                d.prev_sibling = prev;
            }
        }
        if let Some(p) = parent {
            if let Some(d) = self.get_mut(p) {
                if d.first_child == Some(node) {
                    d.first_child = next;
                }
                if d.last_child == Some(node) {
                    d.last_child = prev;
                }
            }
        }
        if let Some(d) = self.get_mut(node) {
            d.parent = None;
            d.prev_sibling = None;
            d.next_sibling = None;
        }
    }

    /// Concatenated text of all descendant Text nodes, skipping attribute
    /// subtrees. For a Text node this is its payload; for an Attribute node
    /// the concatenation of its own text children.
    pub fn inner_text(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, true, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, is_start: bool, out: &mut String) {
        let Some(data) = self.get(node) else { return };
        match data.kind() {
            NodeKind::Text => out.push_str(data.data()),
            NodeKind::Attribute if !is_start => {}
            _ => {
                let mut child = data.first_child();
                while let Some(c) = child {
                    self.collect_text(c, false, out);
                    child = self.get(c).and_then(NodeData::next_sibling);
                }
            }
        }
    }

    /// Update a node's format detail in place (readers flag JSON containers
    /// as their content arrives).
    pub fn set_detail(&mut self, node: NodeId, detail: FormatDetail) {
        if let Some(d) = self.get_mut(node) {
            d.detail = detail;
        }
    }

    /// Number of live nodes, root included. Used to assert bounded memory.
    pub fn live_nodes(&self) -> usize {
        self.slots.iter().filter(|s| s.data.is_some()).count()
    }
}

impl Default for NodeArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(arena: &mut NodeArena, payload: &str) -> NodeId {
        arena.new_node(NodeKind::Text, payload.into(), FormatDetail::None)
    }

    fn elem(arena: &mut NodeArena, name: &str) -> NodeId {
        arena.new_node(NodeKind::Element, name.into(), FormatDetail::None)
    }

    #[test]
    fn add_child_links_siblings() {
        let mut arena = NodeArena::new();
        let root = arena.root();
        let a = elem(&mut arena, "a");
        let b = elem(&mut arena, "b");
        assert!(arena.add_child(root, a));
        assert!(arena.add_child(root, b));
        let r = arena.get(root).unwrap();
        assert_eq!(r.first_child(), Some(a));
        assert_eq!(r.last_child(), Some(b));
        assert_eq!(arena.get(a).unwrap().next_sibling(), Some(b));
        assert_eq!(arena.get(b).unwrap().prev_sibling(), Some(a));
    }

    #[test]
    fn remove_only_child_clears_both_edges() {
        let mut arena = NodeArena::new();
        let root = arena.root();
        let a = elem(&mut arena, "a");
        arena.add_child(root, a);
        arena.remove_subtree(a);
        let r = arena.get(root).unwrap();
        assert_eq!(r.first_child(), None);
        assert_eq!(r.last_child(), None);
    }

    #[test]
    fn remove_first_and_last_child_keep_chain_consistent() {
        let mut arena = NodeArena::new();
        let root = arena.root();
        let a = elem(&mut arena, "a");
        let b = elem(&mut arena, "b");
        let c = elem(&mut arena, "c");
        for id in [a, b, c] {
            arena.add_child(root, id);
        }
        arena.remove_subtree(a);
        assert_eq!(arena.get(root).unwrap().first_child(), Some(b));
        assert_eq!(arena.get(b).unwrap().prev_sibling(), None);
        arena.remove_subtree(c);
        assert_eq!(arena.get(root).unwrap().last_child(), Some(b));
        assert_eq!(arena.get(b).unwrap().next_sibling(), None);
    }

    #[test]
    fn stale_handle_is_rejected_after_recycle() {
        let mut arena = NodeArena::new();
        let root = arena.root();
        let a = elem(&mut arena, "a");
        arena.add_child(root, a);
        arena.remove_subtree(a);
        assert!(arena.get(a).is_none());
        let b = elem(&mut arena, "b");
        // The slot is reused with a bumped generation.
        assert!(arena.get(b).is_some());
        assert!(arena.get(a).is_none());
    }

    #[test]
    fn inner_text_skips_attribute_subtrees() {
        let mut arena = NodeArena::new();
        let root = arena.root();
        let e = elem(&mut arena, "e");
        arena.add_child(root, e);
        let attr = arena.new_node(NodeKind::Attribute, "id".into(), FormatDetail::None);
        arena.add_child(e, attr);
        let av = text(&mut arena, "attr-value");
        arena.add_child(attr, av);
        let t = text(&mut arena, "body");
        arena.add_child(e, t);
        assert_eq!(arena.inner_text(e), "body");
        assert_eq!(arena.inner_text(attr), "attr-value");
    }

    #[test]
    fn removing_root_is_a_noop() {
        let mut arena = NodeArena::new();
        let root = arena.root();
        arena.remove_subtree(root);
        assert!(arena.get(root).is_some());
    }
}
