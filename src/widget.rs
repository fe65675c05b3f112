//! Retained visual tree.
//!
//! The tray arranges its boxes, separators and icons as [`Node`]s and the
//! view layer renders whatever tree it finds. Children are packed either
//! from the start or from the end of their parent, like a toolkit box.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use tracing::{trace, warn};

use crate::icon::IconView;
use crate::signal::{HandlerId, Signals};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

impl Orientation {
    pub fn from_vertical(vertical: bool) -> Self {
        if vertical {
            Orientation::Vertical
        } else {
            Orientation::Horizontal
        }
    }

    /// Separators run across the packing direction.
    pub fn cross(self) -> Self {
        match self {
            Orientation::Horizontal => Orientation::Vertical,
            Orientation::Vertical => Orientation::Horizontal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeEvent {
    Destroyed,
}

pub enum NodeKind {
    /// Top-level container a tray can be attached to.
    Root,
    Box(Orientation),
    Separator(Orientation),
    Icon(Rc<RefCell<IconView>>),
}

impl fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Root => write!(f, "Root"),
            NodeKind::Box(o) => write!(f, "Box({o:?})"),
            NodeKind::Separator(o) => write!(f, "Separator({o:?})"),
            NodeKind::Icon(view) => write!(f, "Icon({:?})", view.borrow().tooltip),
        }
    }
}

struct NodeInner {
    kind: NodeKind,
    start: RefCell<Vec<Node>>,
    end: RefCell<Vec<Node>>,
    parent: RefCell<Weak<NodeInner>>,
    visible: Cell<bool>,
    destroyed: Cell<bool>,
    revision: Cell<u64>,
    signals: Signals<NodeEvent>,
}

/// Shared handle to a visual node. Equality is identity.
#[derive(Clone)]
pub struct Node(Rc<NodeInner>);

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("kind", &self.0.kind)
            .field("visible", &self.0.visible.get())
            .field("children", &self.children())
            .finish()
    }
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Node(Rc::new(NodeInner {
            kind,
            start: RefCell::new(Vec::new()),
            end: RefCell::new(Vec::new()),
            parent: RefCell::new(Weak::new()),
            visible: Cell::new(false),
            destroyed: Cell::new(false),
            revision: Cell::new(0),
            signals: Signals::new(),
        }))
    }

    pub fn root() -> Self {
        Self::new(NodeKind::Root)
    }

    pub fn container(orientation: Orientation) -> Self {
        Self::new(NodeKind::Box(orientation))
    }

    pub fn separator(orientation: Orientation) -> Self {
        Self::new(NodeKind::Separator(orientation))
    }

    pub fn kind(&self) -> &NodeKind {
        &self.0.kind
    }

    pub fn parent(&self) -> Option<Node> {
        self.0.parent.borrow().upgrade().map(Node)
    }

    /// Children in visual order: start-packed in order, then end-packed
    /// from the innermost to the outermost.
    pub fn children(&self) -> Vec<Node> {
        let mut children = self.0.start.borrow().clone();
        children.extend(self.0.end.borrow().iter().rev().cloned());
        children
    }

    pub fn contains(&self, child: &Node) -> bool {
        self.0.start.borrow().contains(child) || self.0.end.borrow().contains(child)
    }

    pub fn pack_start(&self, child: &Node) {
        self.pack(child, false);
    }

    pub fn pack_end(&self, child: &Node) {
        self.pack(child, true);
    }

    /// Plain container add.
    pub fn add(&self, child: &Node) {
        self.pack_start(child);
    }

    fn pack(&self, child: &Node, at_end: bool) {
        if self.0.destroyed.get() || child.0.destroyed.get() {
            warn!("packing into or from a destroyed node");
            return;
        }
        if child.parent().is_some() {
            warn!("node already has a parent, not packing it again");
            return;
        }
        let list = if at_end { &self.0.end } else { &self.0.start };
        list.borrow_mut().push(child.clone());
        *child.0.parent.borrow_mut() = Rc::downgrade(&self.0);
        self.touch();
    }

    /// Detach `child`. Returns `false` if it was not a child.
    pub fn remove(&self, child: &Node) -> bool {
        let removed = [&self.0.start, &self.0.end].into_iter().any(|list| {
            let mut list = list.borrow_mut();
            let before = list.len();
            list.retain(|c| c != child);
            list.len() != before
        });
        if removed {
            *child.0.parent.borrow_mut() = Weak::new();
            self.touch();
        }
        removed
    }

    fn touch(&self) {
        self.0.revision.set(self.0.revision.get() + 1);
    }

    /// Number of structural changes (packs and removals) so far.
    pub fn revision(&self) -> u64 {
        self.0.revision.get()
    }

    /// Revision summed over the whole subtree.
    pub fn tree_revision(&self) -> u64 {
        self.revision()
            + self
                .children()
                .iter()
                .map(Node::tree_revision)
                .sum::<u64>()
    }

    pub fn show(&self) {
        self.0.visible.set(true);
    }

    pub fn hide(&self) {
        self.0.visible.set(false);
    }

    pub fn show_all(&self) {
        self.show();
        for child in self.children() {
            child.show_all();
        }
    }

    pub fn is_visible(&self) -> bool {
        self.0.visible.get()
    }

    pub fn is_destroyed(&self) -> bool {
        self.0.destroyed.get()
    }

    pub fn connect_destroy<F>(&self, handler: F) -> HandlerId
    where
        F: Fn() + 'static,
    {
        self.0.signals.connect(NodeEvent::Destroyed, handler)
    }

    pub fn disconnect(&self, id: HandlerId) -> bool {
        self.0.signals.disconnect(id)
    }

    /// Detach from the parent, destroy every child, then fire `destroyed`.
    /// Destroying twice is a no-op.
    pub fn destroy(&self) {
        if self.0.destroyed.replace(true) {
            return;
        }
        trace!(kind = ?self.0.kind, "destroying node");
        if let Some(parent) = self.parent() {
            parent.remove(self);
        }

        let children = self.children();
        self.0.start.borrow_mut().clear();
        self.0.end.borrow_mut().clear();
        for child in children {
            *child.0.parent.borrow_mut() = Weak::new();
            child.destroy();
        }

        self.0.visible.set(false);
        self.0.signals.emit(NodeEvent::Destroyed);
        self.0.signals.disconnect_all();
    }
}
