//! Minimal reference-counted node tree implementing [`DocumentCursor`].
//!
//! Intended for tests and examples; real embeddings supply their own storage.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::model::{DocumentCursor, NodeKind, QName};

#[derive(Debug)]
pub struct SimpleNode {
    kind: NodeKind,
    name: Option<QName>,
    text: String,
    parent: RefCell<Weak<SimpleNode>>,
    children: RefCell<Vec<Rc<SimpleNode>>>,
    attributes: RefCell<Vec<Rc<SimpleNode>>>,
}

impl SimpleNode {
    fn new(kind: NodeKind, name: Option<QName>, text: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            kind,
            name,
            text: text.into(),
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            attributes: RefCell::new(Vec::new()),
        })
    }

    pub fn document() -> Rc<Self> {
        Self::new(NodeKind::Document, None, "")
    }

    pub fn element(name: &str) -> Rc<Self> {
        Self::new(NodeKind::Element, Some(QName::local(name)), "")
    }

    pub fn element_ns(prefix: &str, local: &str, ns_uri: &str) -> Rc<Self> {
        let name = QName {
            prefix: Some(prefix.to_string()),
            local: local.to_string(),
            ns_uri: Some(ns_uri.to_string()),
        };
        Self::new(NodeKind::Element, Some(name), "")
    }

    pub fn text(value: &str) -> Rc<Self> {
        Self::new(NodeKind::Text, None, value)
    }

    pub fn attribute(name: &str, value: &str) -> Rc<Self> {
        Self::new(NodeKind::Attribute, Some(QName::local(name)), value)
    }

    pub fn append(parent: &Rc<Self>, child: Rc<Self>) {
        *child.parent.borrow_mut() = Rc::downgrade(parent);
        parent.children.borrow_mut().push(child);
    }

    pub fn append_attribute(parent: &Rc<Self>, attr: Rc<Self>) {
        *attr.parent.borrow_mut() = Rc::downgrade(parent);
        parent.attributes.borrow_mut().push(attr);
    }

    pub fn cursor(self: &Rc<Self>) -> SimpleCursor {
        SimpleCursor { node: Rc::clone(self) }
    }

    fn string_value(&self) -> String {
        match self.kind {
            NodeKind::Text | NodeKind::Attribute => self.text.clone(),
            _ => {
                let mut out = String::new();
                for child in self.children.borrow().iter() {
                    out.push_str(&child.string_value());
                }
                out
            }
        }
    }
}

#[derive(Clone)]
pub struct SimpleCursor {
    node: Rc<SimpleNode>,
}

impl PartialEq for SimpleCursor {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }
}

impl std::fmt::Debug for SimpleCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleCursor")
            .field("kind", &self.node.kind)
            .field("name", &self.node.name)
            .finish()
    }
}

fn position_of(list: &[Rc<SimpleNode>], node: &Rc<SimpleNode>) -> Option<usize> {
    list.iter().position(|n| Rc::ptr_eq(n, node))
}

impl DocumentCursor for SimpleCursor {
    fn kind(&self) -> NodeKind {
        self.node.kind
    }

    fn name(&self) -> Option<QName> {
        self.node.name.clone()
    }

    fn string_value(&self) -> String {
        self.node.string_value()
    }

    fn move_to_parent(&mut self) -> bool {
        let parent = self.node.parent.borrow().upgrade();
        match parent {
            Some(p) => {
                self.node = p;
                true
            }
            None => false,
        }
    }

    fn move_to_first_child(&mut self) -> bool {
        let first = self.node.children.borrow().first().cloned();
        match first {
            Some(c) => {
                self.node = c;
                true
            }
            None => false,
        }
    }

    fn move_to_next_sibling(&mut self) -> bool {
        if self.node.kind == NodeKind::Attribute {
            return false;
        }
        let Some(parent) = self.node.parent.borrow().upgrade() else {
            return false;
        };
        let siblings = parent.children.borrow();
        match position_of(&siblings, &self.node) {
            Some(i) if i + 1 < siblings.len() => {
                let next = Rc::clone(&siblings[i + 1]);
                drop(siblings);
                self.node = next;
                true
            }
            _ => false,
        }
    }

    fn move_to_previous_sibling(&mut self) -> bool {
        if self.node.kind == NodeKind::Attribute {
            return false;
        }
        let Some(parent) = self.node.parent.borrow().upgrade() else {
            return false;
        };
        let siblings = parent.children.borrow();
        match position_of(&siblings, &self.node) {
            Some(i) if i > 0 => {
                let prev = Rc::clone(&siblings[i - 1]);
                drop(siblings);
                self.node = prev;
                true
            }
            _ => false,
        }
    }

    fn move_to_first_sibling(&mut self) -> bool {
        let Some(parent) = self.node.parent.borrow().upgrade() else {
            return false;
        };
        let first = if self.node.kind == NodeKind::Attribute {
            parent.attributes.borrow().first().cloned()
        } else {
            parent.children.borrow().first().cloned()
        };
        match first {
            Some(n) => {
                self.node = n;
                true
            }
            None => false,
        }
    }

    fn move_to_first_attribute(&mut self) -> bool {
        let first = self.node.attributes.borrow().first().cloned();
        match first {
            Some(a) => {
                self.node = a;
                true
            }
            None => false,
        }
    }

    fn move_to_next_attribute(&mut self) -> bool {
        if self.node.kind != NodeKind::Attribute {
            return false;
        }
        let Some(parent) = self.node.parent.borrow().upgrade() else {
            return false;
        };
        let attrs = parent.attributes.borrow();
        match position_of(&attrs, &self.node) {
            Some(i) if i + 1 < attrs.len() => {
                let next = Rc::clone(&attrs[i + 1]);
                drop(attrs);
                self.node = next;
                true
            }
            _ => false,
        }
    }
}
