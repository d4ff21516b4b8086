//! End-to-end encode -> decode round trips through hand-built property
//! trees and dictionaries, exercising every principal type, nested
//! arrays-of-sets, and a property annotation on an array-valued
//! property.

use std::sync::Once;

use bej::dictionary::{Dictionary, DICTIONARY_HEADER_SIZE, PROPERTY_RECORD_SIZE};
use bej::{DecodeEvent, Decoder, Encoder, PrincipalDataType, PropertyTree, SchemaClass};

static LOGGER_INIT: Once = Once::new();

/// Rust runs tests concurrently; most logging facilities aren't safe to
/// initialize more than once per process.
fn ensure_env_logger_initialized() {
    LOGGER_INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// One row of a dictionary under construction. `child_index` is the
/// index, within the same entry list, of this property's first child
/// (resolved to an offset once every entry's position is known).
struct RawEntry {
    seq: u16,
    name: &'static str,
    ty: PrincipalDataType,
    child_index: Option<usize>,
    child_count: u16,
}

fn entry(seq: u16, name: &'static str, ty: PrincipalDataType) -> RawEntry {
    RawEntry {
        seq,
        name,
        ty,
        child_index: None,
        child_count: 0,
    }
}

fn parent(seq: u16, name: &'static str, ty: PrincipalDataType, child_index: usize, child_count: u16) -> RawEntry {
    RawEntry {
        seq,
        name,
        ty,
        child_index: Some(child_index),
        child_count,
    }
}

/// Builds a complete dictionary blob (header + records + name pool) from
/// a flat entry list, computing every offset mechanically so the test
/// fixtures below read as plain schema tables rather than byte arithmetic.
fn build_dictionary(entries: &[RawEntry]) -> Vec<u8> {
    let pool_start = DICTIONARY_HEADER_SIZE + entries.len() * PROPERTY_RECORD_SIZE;

    let mut pool = Vec::new();
    let mut name_offsets = Vec::with_capacity(entries.len());
    for e in entries {
        name_offsets.push(pool_start + pool.len());
        pool.extend_from_slice(e.name.as_bytes());
        pool.push(0);
    }

    let dict_size = pool_start + pool.len();
    let mut blob = Vec::with_capacity(dict_size);
    blob.push(1u8); // version_tag
    blob.push(0u8); // flags
    blob.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    blob.extend_from_slice(&1u32.to_le_bytes()); // schema_version
    blob.extend_from_slice(&(dict_size as u32).to_le_bytes());

    for (i, e) in entries.iter().enumerate() {
        use bej::FormatTuple;
        blob.push(FormatTuple::new(e.ty).to_byte());
        blob.extend_from_slice(&e.seq.to_le_bytes());
        let child_ptr = e
            .child_index
            .map(|ci| (DICTIONARY_HEADER_SIZE + ci * PROPERTY_RECORD_SIZE) as u16)
            .unwrap_or(0);
        blob.extend_from_slice(&child_ptr.to_le_bytes());
        blob.extend_from_slice(&e.child_count.to_le_bytes());
        let name_len = if e.name.is_empty() { 0u8 } else { (e.name.len() + 1) as u8 };
        blob.push(name_len);
        blob.extend_from_slice(&(name_offsets[i] as u16).to_le_bytes());
    }
    blob.extend_from_slice(&pool);
    blob
}

/// A dictionary with a single (empty-named) synthetic root and no other
/// properties, used where a test's tree never needs annotations.
fn empty_annotation_dictionary() -> Vec<u8> {
    build_dictionary(&[entry(0, "Annotations", PrincipalDataType::Set)])
}

fn dummy_simple_dictionary() -> Vec<u8> {
    build_dictionary(&[
        parent(0, "DummySimple", PrincipalDataType::Set, 1, 5),
        parent(0, "ChildArrayProperty", PrincipalDataType::Array, 6, 1),
        entry(1, "Id", PrincipalDataType::String),
        entry(2, "SampleEnabledProperty", PrincipalDataType::Boolean),
        entry(3, "SampleIntegerProperty", PrincipalDataType::Integer),
        entry(4, "SampleRealProperty", PrincipalDataType::Real),
        parent(0, "", PrincipalDataType::Set, 7, 2), // array element type
        entry(0, "AnotherBoolean", PrincipalDataType::Boolean),
        parent(1, "LinkStatus", PrincipalDataType::Enum, 9, 3),
        entry(0, "LinkDown", PrincipalDataType::Null),
        entry(1, "LinkUp", PrincipalDataType::Null),
        entry(2, "NoLink", PrincipalDataType::Null),
    ])
}

fn encode_tree(tree: &mut PropertyTree, root: bej::NodeId, major: &[u8], anno: &[u8]) -> Vec<u8> {
    let major_dict = Dictionary::new(major).unwrap();
    let anno_dict = Dictionary::new(anno).unwrap();
    let encoder = Encoder::new(&major_dict, &anno_dict);
    let mut out = Vec::new();
    encoder
        .encode(tree, root, None, SchemaClass::Major, &mut out)
        .unwrap();
    out
}

fn decode_events(block: &[u8], major: &[u8], anno: &[u8]) -> Vec<DecodeEvent> {
    let major_dict = Dictionary::new(major).unwrap();
    let anno_dict = Dictionary::new(anno).unwrap();
    let decoder = Decoder::new(&major_dict, &anno_dict);
    decoder.decode_events(block).unwrap()
}

#[test]
fn round_trips_dummy_simple_document() {
    ensure_env_logger_initialized();

    let major = dummy_simple_dictionary();
    let anno = empty_annotation_dictionary();

    let mut tree = PropertyTree::new();
    let root = tree.new_set("DummySimple");
    let id = tree.new_string("Id", "Dummy ID");
    let sample_enabled = tree.new_null("SampleEnabledProperty");
    let sample_int = tree.new_integer("SampleIntegerProperty", -5);
    let sample_real = tree.new_real("SampleRealProperty", -5576.90001);
    let array = tree.new_array("ChildArrayProperty");

    let elem0 = tree.new_set("");
    let elem0_bool = tree.new_boolean("AnotherBoolean", true);
    let elem0_link = tree.new_enum("LinkStatus", "NoLink");
    tree.link_child(elem0, elem0_bool).unwrap();
    tree.link_child(elem0, elem0_link).unwrap();

    let elem1 = tree.new_set("");
    let elem1_link = tree.new_enum("LinkStatus", "LinkDown");
    tree.link_child(elem1, elem1_link).unwrap();

    tree.link_child(array, elem0).unwrap();
    tree.link_child(array, elem1).unwrap();

    tree.link_child(root, id).unwrap();
    tree.link_child(root, sample_enabled).unwrap();
    tree.link_child(root, sample_int).unwrap();
    tree.link_child(root, sample_real).unwrap();
    tree.link_child(root, array).unwrap();

    let block = encode_tree(&mut tree, root, &major, &anno);
    let events = decode_events(&block, &major, &anno);

    assert_eq!(
        events,
        vec![
            DecodeEvent::SetStart("".into()),
            DecodeEvent::String("Id".into(), "Dummy ID".into()),
            DecodeEvent::PropertyEnd,
            DecodeEvent::Null("SampleEnabledProperty".into()),
            DecodeEvent::PropertyEnd,
            DecodeEvent::Integer("SampleIntegerProperty".into(), -5),
            DecodeEvent::PropertyEnd,
            DecodeEvent::Real(
                "SampleRealProperty".into(),
                bej::real::decode(&bej::real::encode(-5576.90001)).unwrap()
            ),
            DecodeEvent::PropertyEnd,
            DecodeEvent::ArrayStart("ChildArrayProperty".into()),
            DecodeEvent::SetStart("".into()),
            DecodeEvent::Boolean("AnotherBoolean".into(), true),
            DecodeEvent::PropertyEnd,
            DecodeEvent::EnumValue("LinkStatus".into(), "NoLink".into()),
            DecodeEvent::SetEnd,
            DecodeEvent::PropertyEnd,
            DecodeEvent::SetStart("".into()),
            DecodeEvent::EnumValue("LinkStatus".into(), "LinkDown".into()),
            DecodeEvent::SetEnd,
            DecodeEvent::ArrayEnd,
            DecodeEvent::SetEnd,
        ]
    );
}

#[test]
fn round_trips_property_annotation_on_an_array_valued_property() {
    ensure_env_logger_initialized();

    let major = build_dictionary(&[
        parent(0, "Resource", PrincipalDataType::Set, 1, 1),
        entry(0, "Status", PrincipalDataType::Set),
    ]);
    let anno = build_dictionary(&[
        parent(0, "Annotations", PrincipalDataType::Set, 1, 1),
        parent(0, "@Message.ExtendedInfo", PrincipalDataType::Array, 2, 1),
        parent(0, "", PrincipalDataType::Set, 3, 2), // array element type
        entry(0, "MessageId", PrincipalDataType::String),
        parent(1, "RelatedProperties", PrincipalDataType::Array, 5, 1),
        entry(0, "", PrincipalDataType::String), // array element type
    ]);

    let mut tree = PropertyTree::new();
    let root = tree.new_set("Resource");
    let status_annotation = tree.new_property_annotation("Status");
    let extended_info = tree.new_array("@Message.ExtendedInfo");
    let info_set = tree.new_set("");
    let message_id = tree.new_string("MessageId", "PredictiveFailure");
    let related = tree.new_array("RelatedProperties");
    let related_0 = tree.new_string("", "FailurePredicted");
    let related_1 = tree.new_string("", "MediaType");

    tree.link_child(related, related_0).unwrap();
    tree.link_child(related, related_1).unwrap();
    tree.link_child(info_set, message_id).unwrap();
    tree.link_child(info_set, related).unwrap();
    tree.link_child(extended_info, info_set).unwrap();
    tree.link_child(status_annotation, extended_info).unwrap();
    tree.link_child(root, status_annotation).unwrap();

    let block = encode_tree(&mut tree, root, &major, &anno);
    let events = decode_events(&block, &major, &anno);

    assert_eq!(
        events,
        vec![
            DecodeEvent::SetStart("".into()),
            DecodeEvent::Annotation("Status".into()),
            DecodeEvent::ArrayStart("@Message.ExtendedInfo".into()),
            DecodeEvent::SetStart("".into()),
            DecodeEvent::String("MessageId".into(), "PredictiveFailure".into()),
            DecodeEvent::PropertyEnd,
            DecodeEvent::ArrayStart("RelatedProperties".into()),
            DecodeEvent::String("".into(), "FailurePredicted".into()),
            DecodeEvent::PropertyEnd,
            DecodeEvent::String("".into(), "MediaType".into()),
            DecodeEvent::ArrayEnd,
            DecodeEvent::SetEnd,
            DecodeEvent::ArrayEnd,
            DecodeEvent::SetEnd,
        ]
    );
}

#[test]
fn a_tree_can_be_encoded_more_than_once() {
    let major = dummy_simple_dictionary();
    let anno = empty_annotation_dictionary();

    let mut tree = PropertyTree::new();
    let root = tree.new_set("DummySimple");
    let id = tree.new_string("Id", "first");
    tree.link_child(root, id).unwrap();

    let first = encode_tree(&mut tree, root, &major, &anno);
    let second = encode_tree(&mut tree, root, &major, &anno);
    assert_eq!(first, second);
}
