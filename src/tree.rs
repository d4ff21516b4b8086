//! An arena-based property tree: the in-memory model that the encoder
//! consumes and the decoder's callbacks reconstruct the shape of.
//!
//! The tree owns its node storage in a single growable vector; nodes
//! refer to each other by index (`NodeId`) rather than by pointer, and
//! names / string-typed leaf values are borrowed with a lifetime tied to
//! the tree rather than copied, mirroring the original's `const char*`
//! fields into caller-owned storage.

use crate::error::{BejError, Result};
use crate::types::{DictionarySelector, FormatFlags, FormatTuple, PrincipalDataType};

pub type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentKind {
    Set,
    Array,
    PropertyAnnotation,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LeafValue<'a> {
    Integer(i64),
    Enum(&'a str),
    Str(&'a str),
    Real(f64),
    Boolean(bool),
    Null,
}

impl<'a> LeafValue<'a> {
    fn principal_type(&self) -> PrincipalDataType {
        match self {
            LeafValue::Integer(_) => PrincipalDataType::Integer,
            LeafValue::Enum(_) => PrincipalDataType::Enum,
            LeafValue::Str(_) => PrincipalDataType::String,
            LeafValue::Real(_) => PrincipalDataType::Real,
            LeafValue::Boolean(_) => PrincipalDataType::Boolean,
            LeafValue::Null => PrincipalDataType::Null,
        }
    }
}

/// Per-node bookkeeping used only during encoding. Cleared before every
/// encode pass via [`PropertyTree::reset_metadata`] so a tree can be
/// encoded more than once.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct EncoderMetadata {
    /// `(sequence_number << 1) | selector`, ready to nnint-encode as `S`.
    pub sequence_number: u64,
    pub dictionary: Option<DictionarySelectorRepr>,
    pub children_dict_prop_offset: u16,
    pub next_child: Option<NodeId>,
    pub next_child_index: u16,
    pub sfl_size: usize,
    pub v_size: usize,
    /// For `Enum` leaves only: the resolved dictionary sequence number of
    /// the node's string value, computed once during the metadata pass
    /// and reused verbatim during emission.
    pub enum_value_sequence: u16,
}

/// `DictionarySelector` isn't `Default`; this newtype gives
/// `EncoderMetadata` a cheap `#[derive(Default)]` via `Option`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictionarySelectorRepr {
    Major,
    Annotation,
}

impl From<DictionarySelector> for DictionarySelectorRepr {
    fn from(s: DictionarySelector) -> Self {
        match s {
            DictionarySelector::Major => DictionarySelectorRepr::Major,
            DictionarySelector::Annotation => DictionarySelectorRepr::Annotation,
        }
    }
}

impl From<DictionarySelectorRepr> for DictionarySelector {
    fn from(s: DictionarySelectorRepr) -> Self {
        match s {
            DictionarySelectorRepr::Major => DictionarySelector::Major,
            DictionarySelectorRepr::Annotation => DictionarySelector::Annotation,
        }
    }
}

pub(crate) struct ParentNode<'a> {
    pub name: &'a str,
    pub format: FormatTuple,
    pub kind: ParentKind,
    pub sibling: Option<NodeId>,
    pub first_child: Option<NodeId>,
    pub last_child: Option<NodeId>,
    pub child_count: u16,
    pub metadata: EncoderMetadata,
}

pub(crate) struct LeafNode<'a> {
    pub name: &'a str,
    pub format: FormatTuple,
    pub sibling: Option<NodeId>,
    pub value: LeafValue<'a>,
    pub metadata: EncoderMetadata,
}

pub(crate) enum Node<'a> {
    Parent(ParentNode<'a>),
    Leaf(LeafNode<'a>),
}

/// An arena of BEJ property-tree nodes. Node 0, once created via
/// [`PropertyTree::new_set`]/[`new_array`](PropertyTree::new_array), is
/// conventionally the tree's root for encoding purposes.
pub struct PropertyTree<'a> {
    pub(crate) nodes: Vec<Node<'a>>,
}

impl<'a> Default for PropertyTree<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> PropertyTree<'a> {
    pub fn new() -> Self {
        PropertyTree { nodes: Vec::new() }
    }

    fn push_parent(&mut self, name: &'a str, kind: ParentKind, data_type: PrincipalDataType) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node::Parent(ParentNode {
            name,
            format: FormatTuple::new(data_type),
            kind,
            sibling: None,
            first_child: None,
            last_child: None,
            child_count: 0,
            metadata: EncoderMetadata::default(),
        }));
        id
    }

    fn push_leaf(&mut self, name: &'a str, value: LeafValue<'a>) -> NodeId {
        let id = self.nodes.len();
        let data_type = value.principal_type();
        self.nodes.push(Node::Leaf(LeafNode {
            name,
            format: FormatTuple::new(data_type),
            sibling: None,
            value,
            metadata: EncoderMetadata::default(),
        }));
        id
    }

    pub fn new_set(&mut self, name: &'a str) -> NodeId {
        self.push_parent(name, ParentKind::Set, PrincipalDataType::Set)
    }

    pub fn new_array(&mut self, name: &'a str) -> NodeId {
        self.push_parent(name, ParentKind::Array, PrincipalDataType::Array)
    }

    pub fn new_property_annotation(&mut self, name: &'a str) -> NodeId {
        self.push_parent(name, ParentKind::PropertyAnnotation, PrincipalDataType::PropertyAnnotation)
    }

    pub fn new_integer(&mut self, name: &'a str, value: i64) -> NodeId {
        self.push_leaf(name, LeafValue::Integer(value))
    }

    pub fn new_enum(&mut self, name: &'a str, value: &'a str) -> NodeId {
        self.push_leaf(name, LeafValue::Enum(value))
    }

    pub fn new_string(&mut self, name: &'a str, value: &'a str) -> NodeId {
        self.push_leaf(name, LeafValue::Str(value))
    }

    pub fn new_real(&mut self, name: &'a str, value: f64) -> NodeId {
        self.push_leaf(name, LeafValue::Real(value))
    }

    pub fn new_boolean(&mut self, name: &'a str, value: bool) -> NodeId {
        self.push_leaf(name, LeafValue::Boolean(value))
    }

    pub fn new_null(&mut self, name: &'a str) -> NodeId {
        self.push_leaf(name, LeafValue::Null)
    }

    fn format_mut(&mut self, node: NodeId) -> &mut FormatTuple {
        match &mut self.nodes[node] {
            Node::Parent(p) => &mut p.format,
            Node::Leaf(l) => &mut l.format,
        }
    }

    pub fn set_deferred_binding(&mut self, node: NodeId, value: bool) {
        self.format_mut(node).flags.set(FormatFlags::DEFERRED_BINDING, value);
    }

    pub fn set_read_only(&mut self, node: NodeId, value: bool) {
        self.format_mut(node).flags.set(FormatFlags::READ_ONLY, value);
    }

    pub fn set_nullable(&mut self, node: NodeId, value: bool) {
        self.format_mut(node).flags.set(FormatFlags::NULLABLE, value);
    }

    /// Appends `child` to `parent`'s child list in O(1) via the tail
    /// pointer.
    pub fn link_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let last_child = match &self.nodes[parent] {
            Node::Parent(p) => p.last_child,
            Node::Leaf(_) => {
                return Err(BejError::InvalidSize("cannot add a child to a leaf node".into()))
            }
        };
        if let Some(last) = last_child {
            match &mut self.nodes[last] {
                Node::Parent(p) => p.sibling = Some(child),
                Node::Leaf(l) => l.sibling = Some(child),
            }
        }
        if let Node::Parent(p) = &mut self.nodes[parent] {
            if p.first_child.is_none() {
                p.first_child = Some(child);
            }
            p.last_child = Some(child);
            p.child_count += 1;
        }
        Ok(())
    }

    pub fn is_parent(&self, node: NodeId) -> bool {
        matches!(self.nodes[node], Node::Parent(_))
    }

    pub fn name(&self, node: NodeId) -> &'a str {
        match &self.nodes[node] {
            Node::Parent(p) => p.name,
            Node::Leaf(l) => l.name,
        }
    }

    pub fn format(&self, node: NodeId) -> FormatTuple {
        match &self.nodes[node] {
            Node::Parent(p) => p.format,
            Node::Leaf(l) => l.format,
        }
    }

    pub fn sibling(&self, node: NodeId) -> Option<NodeId> {
        match &self.nodes[node] {
            Node::Parent(p) => p.sibling,
            Node::Leaf(l) => l.sibling,
        }
    }

    pub fn first_child(&self, node: NodeId) -> Option<NodeId> {
        match &self.nodes[node] {
            Node::Parent(p) => p.first_child,
            Node::Leaf(_) => None,
        }
    }

    pub fn child_count(&self, node: NodeId) -> u16 {
        match &self.nodes[node] {
            Node::Parent(p) => p.child_count,
            Node::Leaf(_) => 0,
        }
    }

    pub fn parent_kind(&self, node: NodeId) -> Option<ParentKind> {
        match &self.nodes[node] {
            Node::Parent(p) => Some(p.kind),
            Node::Leaf(_) => None,
        }
    }

    pub fn leaf_value(&self, node: NodeId) -> Option<LeafValue<'a>> {
        match &self.nodes[node] {
            Node::Leaf(l) => Some(l.value),
            Node::Parent(_) => None,
        }
    }

    /// Advances `parent`'s next-child cursor past `current`, returning
    /// the new cursor value.
    pub(crate) fn advance_to_next_child(&mut self, parent: NodeId, current: NodeId) -> Option<NodeId> {
        let next = self.sibling(current);
        if let Node::Parent(p) = &mut self.nodes[parent] {
            p.metadata.next_child = next;
            p.metadata.next_child_index += 1;
        }
        next
    }

    pub(crate) fn metadata(&self, node: NodeId) -> EncoderMetadata {
        match &self.nodes[node] {
            Node::Parent(p) => p.metadata,
            Node::Leaf(l) => l.metadata,
        }
    }

    pub(crate) fn metadata_mut(&mut self, node: NodeId) -> &mut EncoderMetadata {
        match &mut self.nodes[node] {
            Node::Parent(p) => &mut p.metadata,
            Node::Leaf(l) => &mut l.metadata,
        }
    }

    /// Clears every node's encoder metadata, so the tree may be encoded
    /// again (e.g. against a different `majorSchemaStartingOffset`).
    pub(crate) fn reset_metadata(&mut self) {
        for node in &mut self.nodes {
            match node {
                Node::Parent(p) => p.metadata = EncoderMetadata::default(),
                Node::Leaf(l) => l.metadata = EncoderMetadata::default(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_child_appends_in_order() {
        let mut tree = PropertyTree::new();
        let set = tree.new_set("Resource");
        let a = tree.new_integer("Id", 1);
        let b = tree.new_integer("Count", 2);
        tree.link_child(set, a).unwrap();
        tree.link_child(set, b).unwrap();

        assert_eq!(tree.child_count(set), 2);
        assert_eq!(tree.first_child(set), Some(a));
        assert_eq!(tree.sibling(a), Some(b));
        assert_eq!(tree.sibling(b), None);
    }

    #[test]
    fn cannot_link_child_to_a_leaf() {
        let mut tree = PropertyTree::new();
        let leaf = tree.new_integer("Id", 1);
        let other = tree.new_integer("Count", 2);
        assert!(tree.link_child(leaf, other).is_err());
    }
}
