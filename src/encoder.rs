//! The two-pass tree-to-bytes encoder: a metadata pass that computes
//! each node's encoded size bottom-up, followed by an emit pass that
//! writes the PLDM header and then every node's `S`, `F`, `L`, `V` in
//! the same traversal order.

use crate::dictionary::Dictionary;
use crate::error::{BejError, Result};
use crate::nnint::{encode_int, encode_nnint, int_encoded_size, nnint_encoded_size};
use crate::pldm::PldmHeader;
use crate::real;
use crate::tree::{DictionarySelectorRepr, LeafValue, NodeId, ParentKind, PropertyTree};
use crate::types::{pack_sequence, DictionarySelector, PrincipalDataType, SchemaClass};

/// Where an encoded node's bytes are sent. Blanket-implemented for
/// `FnMut(&[u8]) -> Result<()>` closures and for `Vec<u8>`, mirroring the
/// original's `BejEncoderOutputHandler` callback.
pub trait OutputSink {
    fn recv_output(&mut self, bytes: &[u8]) -> Result<()>;
}

impl<F: FnMut(&[u8]) -> Result<()>> OutputSink for F {
    fn recv_output(&mut self, bytes: &[u8]) -> Result<()> {
        self(bytes)
    }
}

impl OutputSink for Vec<u8> {
    fn recv_output(&mut self, bytes: &[u8]) -> Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

pub struct Encoder<'d> {
    major: &'d Dictionary<'d>,
    annotation: &'d Dictionary<'d>,
}

impl<'d> Encoder<'d> {
    pub fn new(major: &'d Dictionary<'d>, annotation: &'d Dictionary<'d>) -> Self {
        Encoder { major, annotation }
    }

    fn pick(&self, selector: DictionarySelector) -> &Dictionary<'d> {
        match selector {
            DictionarySelector::Major => self.major,
            DictionarySelector::Annotation => self.annotation,
        }
    }

    /// Encodes `tree` (whose root must have been created via
    /// [`PropertyTree::new_set`]) into `sink`. `major_schema_starting_offset`
    /// selects where in the major dictionary the root resolves; `None`
    /// starts at the dictionary's head (a complete resource).
    pub fn encode<'a>(
        &self,
        tree: &mut PropertyTree<'a>,
        root: NodeId,
        major_schema_starting_offset: Option<u16>,
        schema_class: SchemaClass,
        sink: &mut dyn OutputSink,
    ) -> Result<()> {
        if tree.parent_kind(root) != Some(ParentKind::Set) {
            return Err(BejError::InvalidSize("encoder root must be a bejSet".into()));
        }

        tree.reset_metadata();
        self.compute_metadata(tree, root, major_schema_starting_offset)?;

        let header = PldmHeader::new(schema_class);
        header.write_into(&mut |bytes| sink.recv_output(bytes))?;

        self.emit_tree(tree, root, sink)
    }

    fn compute_metadata<'a>(
        &self,
        tree: &mut PropertyTree<'a>,
        root: NodeId,
        major_schema_starting_offset: Option<u16>,
    ) -> Result<()> {
        let dict_offset = major_schema_starting_offset.unwrap_or_else(|| self.major.property_head_offset());
        let record = self.major.record_at(dict_offset)?;
        {
            let meta = tree.metadata_mut(root);
            meta.dictionary = Some(DictionarySelectorRepr::Major);
            meta.sequence_number = pack_sequence(0, DictionarySelector::Major);
            meta.children_dict_prop_offset = record.child_pointer_offset;
            meta.next_child = tree.first_child(root);
        }
        self.init_parent_value_size(tree, root)?;

        let mut stack: Vec<NodeId> = vec![root];
        while let Some(&parent) = stack.last() {
            let mut pushed = None;
            loop {
                let child = match tree.metadata(parent).next_child {
                    Some(c) => c,
                    None => break,
                };
                self.resolve_child_metadata(tree, parent, child)?;

                if tree.is_parent(child) {
                    tree.advance_to_next_child(parent, child);
                    pushed = Some(child);
                    break;
                }

                let child_meta = tree.metadata(child);
                let parent_meta = tree.metadata_mut(parent);
                parent_meta.v_size += child_meta.sfl_size + child_meta.v_size;
                tree.advance_to_next_child(parent, child);
            }

            if let Some(child) = pushed {
                stack.push(child);
                continue;
            }

            // `parent`'s children are all processed; finalize and pop.
            let popped = stack.pop().unwrap();
            debug_assert_eq!(popped, parent);
            let v_size = tree.metadata(parent).v_size;
            tree.metadata_mut(parent).sfl_size += nnint_encoded_size(v_size as u64);

            if let Some(&grandparent) = stack.last() {
                let meta = tree.metadata(parent);
                tree.metadata_mut(grandparent).v_size += meta.sfl_size + meta.v_size;
            }
        }

        Ok(())
    }

    /// Resolves `child`'s dictionary sequence number, selector, and (for
    /// Set/Array/PropertyAnnotation/Enum) its own children-or-value
    /// dictionary offset, then computes its `v_size`/initial `sfl_size`.
    fn resolve_child_metadata<'a>(&self, tree: &mut PropertyTree<'a>, parent: NodeId, child: NodeId) -> Result<()> {
        let parent_meta = tree.metadata(parent);
        let parent_selector: DictionarySelector = parent_meta
            .dictionary
            .expect("parent metadata computed before its children")
            .into();
        let parent_children_offset = parent_meta.children_dict_prop_offset;
        let is_array_element = tree.parent_kind(parent) == Some(ParentKind::Array);
        let name = tree.name(child);
        let data_type = tree.format(child).data_type;

        let (selector, sequence_number, children_dict_prop_offset) = if is_array_element {
            let selector = parent_selector;
            let sequence_number = pack_sequence(parent_meta.next_child_index, selector);
            let children_dict_prop_offset = if matches!(data_type, PrincipalDataType::Set | PrincipalDataType::Enum) {
                let dict = self.pick(selector);
                let (record, _) = dict.get_property(parent_children_offset, 0)?;
                record.child_pointer_offset
            } else {
                0
            };
            (selector, sequence_number, children_dict_prop_offset)
        } else {
            let wants_annotation = name.starts_with('@');
            let selector = if parent_selector == DictionarySelector::Annotation || wants_annotation {
                DictionarySelector::Annotation
            } else {
                DictionarySelector::Major
            };
            let crossing = parent_selector == DictionarySelector::Major && wants_annotation;
            let search_start = if crossing {
                self.annotation.first_annotated_property_offset()
            } else {
                parent_children_offset
            };
            let dict = self.pick(selector);
            let (record, _) = dict.get_property_by_name(search_start, name)?;
            let sequence_number = pack_sequence(record.sequence_number, selector);
            (selector, sequence_number, record.child_pointer_offset)
        };

        let meta = tree.metadata_mut(child);
        meta.dictionary = Some(selector.into());
        meta.sequence_number = sequence_number;
        meta.children_dict_prop_offset = children_dict_prop_offset;
        meta.next_child = tree.first_child(child);

        if tree.is_parent(child) {
            self.init_parent_value_size(tree, child)?;
        } else {
            self.init_leaf_value_size(tree, child, selector, children_dict_prop_offset)?;
        }
        Ok(())
    }

    fn init_parent_value_size<'a>(&self, tree: &mut PropertyTree<'a>, node: NodeId) -> Result<()> {
        let kind = tree.parent_kind(node).unwrap();
        let child_count = tree.child_count(node);
        let (v_size, sfl_base) = match kind {
            ParentKind::Set | ParentKind::Array => (nnint_encoded_size(child_count as u64), 0),
            ParentKind::PropertyAnnotation => {
                if child_count != 1 {
                    return Err(BejError::InvalidSize(
                        "a property annotation node must have exactly one child".into(),
                    ));
                }
                (0, 0)
            }
        };
        let meta = tree.metadata_mut(node);
        meta.v_size = v_size;
        meta.sfl_size = sfl_base + nnint_encoded_size(meta.sequence_number) + 1;
        Ok(())
    }

    fn init_leaf_value_size<'a>(
        &self,
        tree: &mut PropertyTree<'a>,
        node: NodeId,
        selector: DictionarySelector,
        children_dict_prop_offset: u16,
    ) -> Result<()> {
        let value = tree.leaf_value(node).expect("leaf node has a value");
        let v_size = match value {
            LeafValue::Integer(v) => int_encoded_size(v),
            LeafValue::Str(s) => s.len() + 1,
            LeafValue::Boolean(_) => 1,
            LeafValue::Null => 0,
            LeafValue::Real(v) => real::encoded_size(v),
            LeafValue::Enum(value_name) => {
                let dict = self.pick(selector);
                let (enum_record, _) = dict.get_property_by_name(children_dict_prop_offset, value_name)?;
                tree.metadata_mut(node).enum_value_sequence = enum_record.sequence_number;
                nnint_encoded_size(enum_record.sequence_number as u64)
            }
        };
        let meta = tree.metadata_mut(node);
        meta.v_size = v_size;
        meta.sfl_size = nnint_encoded_size(meta.sequence_number) + 1 + nnint_encoded_size(v_size as u64);
        Ok(())
    }

    fn emit_tree<'a>(&self, tree: &PropertyTree<'a>, root: NodeId, sink: &mut dyn OutputSink) -> Result<()> {
        self.emit_node(tree, root, sink)?;

        let mut cursor: Vec<(NodeId, Option<NodeId>)> = vec![(root, tree.first_child(root))];
        while let Some(&(parent, next)) = cursor.last() {
            match next {
                None => {
                    cursor.pop();
                }
                Some(child) => {
                    self.emit_node(tree, child, sink)?;
                    let after = tree.sibling(child);
                    cursor.last_mut().unwrap().1 = after;
                    if tree.is_parent(child) {
                        cursor.push((child, tree.first_child(child)));
                    }
                }
            }
        }
        Ok(())
    }

    fn emit_node(&self, tree: &PropertyTree, node: NodeId, sink: &mut dyn OutputSink) -> Result<()> {
        let meta = tree.metadata(node);
        sink.recv_output(&encode_nnint(meta.sequence_number))?;
        sink.recv_output(&[tree.format(node).to_byte()])?;
        sink.recv_output(&encode_nnint(meta.v_size as u64))?;

        if tree.is_parent(node) {
            if tree.parent_kind(node) != Some(ParentKind::PropertyAnnotation) {
                sink.recv_output(&encode_nnint(tree.child_count(node) as u64))?;
            }
            return Ok(());
        }

        match tree.leaf_value(node).unwrap() {
            LeafValue::Integer(v) => sink.recv_output(&encode_int(v))?,
            LeafValue::Boolean(v) => sink.recv_output(&[if v { 0xFF } else { 0x00 }])?,
            LeafValue::Null => {}
            LeafValue::Str(s) => {
                sink.recv_output(s.as_bytes())?;
                sink.recv_output(&[0])?;
            }
            LeafValue::Real(v) => sink.recv_output(&real::encode(v))?,
            LeafValue::Enum(_) => {
                sink.recv_output(&encode_nnint(meta.enum_value_sequence as u64))?;
            }
        }
        Ok(())
    }
}
