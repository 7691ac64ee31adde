//! Cursor adapter: the sole bridge between [`NodeArena`] and the path-query
//! engine.

use remold_xpath::{DocumentCursor, NodeKind, QName};

use crate::tree::{NodeArena, NodeData, NodeId};

/// Read-only cursor over an arena tree.
#[derive(Clone, Copy)]
pub struct TreeCursor<'a> {
    arena: &'a NodeArena,
    node: NodeId,
}

impl<'a> TreeCursor<'a> {
    pub fn new(arena: &'a NodeArena, node: NodeId) -> Self {
        Self { arena, node }
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }

    pub fn arena(&self) -> &'a NodeArena {
        self.arena
    }

    fn data(&self) -> Option<&'a NodeData> {
        self.arena.get(self.node)
    }

    fn is_attribute(arena: &NodeArena, id: NodeId) -> bool {
        arena.get(id).is_some_and(|d| d.kind() == NodeKind::Attribute)
    }
}

impl PartialEq for TreeCursor<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.arena, other.arena) && self.node == other.node
    }
}

impl std::fmt::Debug for TreeCursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("TreeCursor");
        s.field("node", &self.node);
        if let Some(d) = self.data() {
            s.field("kind", &d.kind()).field("data", &d.data());
        }
        s.finish()
    }
}

impl DocumentCursor for TreeCursor<'_> {
    fn kind(&self) -> NodeKind {
        self.data().map_or(NodeKind::Text, NodeData::kind)
    }

    fn name(&self) -> Option<QName> {
        self.data().and_then(NodeData::qname)
    }

    fn string_value(&self) -> String {
        self.arena.inner_text(self.node)
    }

    fn move_to_parent(&mut self) -> bool {
        match self.data().and_then(NodeData::parent) {
            Some(p) => {
                self.node = p;
                true
            }
            None => false,
        }
    }

    fn move_to_first_child(&mut self) -> bool {
        // Attribute children are packed first; skip over them.
        let mut next = self.data().and_then(NodeData::first_child);
        while let Some(id) = next {
            if !Self::is_attribute(self.arena, id) {
                self.node = id;
                return true;
            }
            next = self.arena.get(id).and_then(NodeData::next_sibling);
        }
        false
    }

    fn move_to_next_sibling(&mut self) -> bool {
        if self.kind() == NodeKind::Attribute {
            return false;
        }
        match self.data().and_then(NodeData::next_sibling) {
            Some(id) => {
                self.node = id;
                true
            }
            None => false,
        }
    }

    fn move_to_previous_sibling(&mut self) -> bool {
        if self.kind() == NodeKind::Attribute {
            return false;
        }
        match self.data().and_then(NodeData::prev_sibling) {
            Some(id) if !Self::is_attribute(self.arena, id) => {
                self.node = id;
                true
            }
            _ => false,
        }
    }

    fn move_to_first_sibling(&mut self) -> bool {
        let on_attribute = self.kind() == NodeKind::Attribute;
        let Some(parent) = self.data().and_then(NodeData::parent) else {
            return false;
        };
        let mut probe = Self { arena: self.arena, node: parent };
        let moved = if on_attribute { probe.move_to_first_attribute() } else { probe.move_to_first_child() };
        if moved {
            self.node = probe.node;
        }
        moved
    }

    fn move_to_first_attribute(&mut self) -> bool {
        match self.data().and_then(NodeData::first_child) {
            Some(id) if Self::is_attribute(self.arena, id) => {
                self.node = id;
                true
            }
            _ => false,
        }
    }

    fn move_to_next_attribute(&mut self) -> bool {
        if self.kind() != NodeKind::Attribute {
            return false;
        }
        match self.data().and_then(NodeData::next_sibling) {
            Some(id) if Self::is_attribute(self.arena, id) => {
                self.node = id;
                true
            }
            _ => false,
        }
    }
}
