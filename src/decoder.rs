//! The iterative, stack-driven SFLV walker: turns a BEJ-encoded byte
//! stream into a sequence of callback invocations in strict document
//! order. There is no host-stack recursion — nesting is tracked by an
//! explicit section stack of frames, each remembering where its value
//! ends and what to restore on close.

use crate::dictionary::{Dictionary, PropertyRecord};
use crate::error::{BejError, Result};
use crate::nnint::{decode_int, nnint_value};
use crate::pldm::PldmHeader;
use crate::real::{self, RealValue};
use crate::sflv::{parse_sflv, Sflv};
use crate::types::{DictionarySelector, FormatFlags, PrincipalDataType};

/// Upper bound on the number of SFLV tuples a single decode may process.
/// Exceeding it aborts with [`BejError::NotSupported`] rather than
/// letting a pathologically wide or deep stream run unbounded.
pub const MAX_ITERATIONS: u64 = 1_000_000;

/// Callback set a caller implements to receive decoded events in
/// document order. Every method has a no-op default, so implementors
/// only override the events they actually want — mirroring the "any
/// callback may be absent" contract of the original's null-checked
/// function-pointer struct, but as ordinary Rust default methods.
///
/// Returning an error from any method aborts decoding immediately; the
/// error is surfaced verbatim from [`Decoder::decode_pldm_block`].
#[allow(unused_variables)]
pub trait DecodeCallbacks {
    fn set_start(&mut self, name: &str) -> Result<()> {
        Ok(())
    }
    fn set_end(&mut self) -> Result<()> {
        Ok(())
    }
    fn array_start(&mut self, name: &str) -> Result<()> {
        Ok(())
    }
    fn array_end(&mut self) -> Result<()> {
        Ok(())
    }
    /// The comma between sibling properties of the same set/array.
    fn property_end(&mut self) -> Result<()> {
        Ok(())
    }
    fn null(&mut self, name: &str) -> Result<()> {
        Ok(())
    }
    fn integer(&mut self, name: &str, value: i64) -> Result<()> {
        Ok(())
    }
    fn enum_value(&mut self, name: &str, value_name: &str) -> Result<()> {
        Ok(())
    }
    fn string(&mut self, name: &str, value: &str) -> Result<()> {
        Ok(())
    }
    fn real(&mut self, name: &str, value: RealValue) -> Result<()> {
        Ok(())
    }
    fn boolean(&mut self, name: &str, value: bool) -> Result<()> {
        Ok(())
    }
    fn annotation(&mut self, name: &str) -> Result<()> {
        Ok(())
    }
    /// Purely informational: invoked whenever a tuple's `readOnlyProperty`
    /// flag is set, in addition to (not instead of) its normal dispatch.
    fn read_only_property(&mut self, sequence_number: u16) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionKind {
    /// A closed `PropertyAnnotation` — opens no JSON container, so
    /// closing it emits nothing.
    None,
    Set,
    Array,
}

struct Frame {
    kind: SectionKind,
    add_property_name: bool,
    main_dict_prop_offset: u16,
    anno_dict_prop_offset: u16,
    end_offset: usize,
}

/// Decodes BEJ streams against a fixed pair of dictionaries. Stateless
/// and reusable across many `decode_pldm_block` calls.
pub struct Decoder<'d> {
    major: &'d Dictionary<'d>,
    annotation: &'d Dictionary<'d>,
}

impl<'d> Decoder<'d> {
    pub fn new(major: &'d Dictionary<'d>, annotation: &'d Dictionary<'d>) -> Self {
        Decoder { major, annotation }
    }

    fn pick(&self, selector: DictionarySelector) -> &Dictionary<'d> {
        match selector {
            DictionarySelector::Major => self.major,
            DictionarySelector::Annotation => self.annotation,
        }
    }

    /// Validates the 7-byte PLDM header, then decodes the rest of
    /// `block` against `callbacks`.
    pub fn decode_pldm_block(&self, block: &[u8], callbacks: &mut dyn DecodeCallbacks) -> Result<()> {
        let (_header, stream) = PldmHeader::parse(block)?;
        self.decode(stream, callbacks)
    }

    /// Convenience "pull" form: runs the callback decoder against a
    /// collecting implementation and returns the resulting events
    /// eagerly. Not a lazy generator — Rust has no stable coroutines —
    /// so this materializes the whole event list up front.
    pub fn decode_events(&self, block: &[u8]) -> Result<Vec<DecodeEvent>> {
        let mut collector = EventCollector::default();
        self.decode_pldm_block(block, &mut collector)?;
        Ok(collector.events)
    }

    fn decode(&self, stream: &[u8], callbacks: &mut dyn DecodeCallbacks) -> Result<()> {
        let mut stream_offset = 0usize;
        let mut main_dict_prop_offset = self.major.property_head_offset();
        let mut anno_dict_prop_offset = self.annotation.first_annotated_property_offset();
        // The document root's own name is never emitted.
        let mut add_property_name = false;
        let mut stack: Vec<Frame> = Vec::new();
        let mut iterations = 0u64;

        while stream_offset < stream.len() {
            iterations += 1;
            if iterations > MAX_ITERATIONS {
                log::warn!("decode exceeded {MAX_ITERATIONS} SFLV iterations, aborting");
                return Err(BejError::NotSupported(format!(
                    "stream exceeds the {MAX_ITERATIONS}-iteration decode bound"
                )));
            }

            let tuple = parse_sflv(stream, stream_offset)?;

            if tuple.format.flags.contains(FormatFlags::READ_ONLY) {
                callbacks.read_only_property(tuple.sequence_number)?;
            }

            let data_type = tuple.format.data_type;

            if data_type.is_unsupported() {
                log::trace!(
                    "skipping unsupported principal type {data_type:?} at offset {stream_offset}"
                );
                stream_offset = tuple.value_end_offset;
                self.drain(
                    &mut stack,
                    stream_offset,
                    &mut main_dict_prop_offset,
                    &mut anno_dict_prop_offset,
                    &mut add_property_name,
                    callbacks,
                )?;
                continue;
            }

            let top_is_array = matches!(stack.last(), Some(f) if f.kind == SectionKind::Array);

            match data_type {
                PrincipalDataType::Set | PrincipalDataType::Array => {
                    let dict = self.pick(tuple.schema);
                    let base_offset = self.dict_offset(tuple.schema, main_dict_prop_offset, anno_dict_prop_offset);
                    let lookup_seq = if top_is_array { 0 } else { tuple.sequence_number };
                    let (record, _) = dict.get_property(base_offset, lookup_seq)?;
                    let name = self.resolved_name(dict, &record, add_property_name)?;

                    let is_set = data_type == PrincipalDataType::Set;
                    if is_set {
                        callbacks.set_start(name)?;
                    } else {
                        callbacks.array_start(name)?;
                    }

                    let child_count = nnint_value(tuple.value)?;
                    if child_count == 0 {
                        if is_set {
                            callbacks.set_end()?;
                        } else {
                            callbacks.array_end()?;
                        }
                        stream_offset = tuple.value_end_offset;
                        self.drain(
                            &mut stack,
                            stream_offset,
                            &mut main_dict_prop_offset,
                            &mut anno_dict_prop_offset,
                            &mut add_property_name,
                            callbacks,
                        )?;
                    } else {
                        stack.push(Frame {
                            kind: if is_set { SectionKind::Set } else { SectionKind::Array },
                            add_property_name,
                            main_dict_prop_offset,
                            anno_dict_prop_offset,
                            end_offset: tuple.value_end_offset,
                        });
                        add_property_name = is_set;
                        self.set_dict_offset(
                            tuple.schema,
                            record.child_pointer_offset,
                            &mut main_dict_prop_offset,
                            &mut anno_dict_prop_offset,
                        );
                        stream_offset = self.value_start(&tuple) + crate::nnint::nnint_size(tuple.value)?;
                    }
                }
                PrincipalDataType::PropertyAnnotation => {
                    let (record, _) = self.major.get_property(main_dict_prop_offset, tuple.sequence_number)?;
                    let name = self.major.property_name(record.name_offset, record.name_length)?;
                    callbacks.annotation(name)?;

                    stack.push(Frame {
                        kind: SectionKind::None,
                        add_property_name,
                        main_dict_prop_offset,
                        anno_dict_prop_offset,
                        end_offset: tuple.value_end_offset,
                    });
                    add_property_name = true;
                    main_dict_prop_offset = record.child_pointer_offset;
                    stream_offset = self.value_start(&tuple);
                }
                PrincipalDataType::Enum => {
                    let dict = self.pick(tuple.schema);
                    let base_offset = self.dict_offset(tuple.schema, main_dict_prop_offset, anno_dict_prop_offset);
                    let lookup_seq = if top_is_array { 0 } else { tuple.sequence_number };
                    let (record, _) = dict.get_property(base_offset, lookup_seq)?;
                    let name = self.resolved_name(dict, &record, add_property_name)?;

                    if tuple.value_length == 0 {
                        callbacks.null(name)?;
                    } else {
                        let value_seq = nnint_value(tuple.value)? as u16;
                        let (value_record, _) = dict.get_property(record.child_pointer_offset, value_seq)?;
                        let value_name = dict.property_name(value_record.name_offset, value_record.name_length)?;
                        callbacks.enum_value(name, value_name)?;
                    }
                    stream_offset = tuple.value_end_offset;
                    self.drain(
                        &mut stack,
                        stream_offset,
                        &mut main_dict_prop_offset,
                        &mut anno_dict_prop_offset,
                        &mut add_property_name,
                        callbacks,
                    )?;
                }
                PrincipalDataType::Null
                | PrincipalDataType::Integer
                | PrincipalDataType::String
                | PrincipalDataType::Real
                | PrincipalDataType::Boolean => {
                    let name = if add_property_name {
                        let dict = self.pick(tuple.schema);
                        let base_offset = self.dict_offset(tuple.schema, main_dict_prop_offset, anno_dict_prop_offset);
                        let (record, _) = dict.get_property(base_offset, tuple.sequence_number)?;
                        dict.property_name(record.name_offset, record.name_length)?
                    } else {
                        ""
                    };
                    self.emit_leaf(data_type, name, &tuple, callbacks)?;
                    stream_offset = tuple.value_end_offset;
                    self.drain(
                        &mut stack,
                        stream_offset,
                        &mut main_dict_prop_offset,
                        &mut anno_dict_prop_offset,
                        &mut add_property_name,
                        callbacks,
                    )?;
                }
                // Bytestring, Choice, ResourceLink(Expansion), Reserved1..3.
                _ => unreachable!("unsupported types are dispatched above"),
            }
        }

        if !stack.is_empty() {
            return Err(BejError::Unknown(
                "section stack is non-empty at end of stream".into(),
            ));
        }
        Ok(())
    }

    fn dict_offset(&self, selector: DictionarySelector, main: u16, anno: u16) -> u16 {
        match selector {
            DictionarySelector::Major => main,
            DictionarySelector::Annotation => anno,
        }
    }

    fn set_dict_offset(&self, selector: DictionarySelector, value: u16, main: &mut u16, anno: &mut u16) {
        match selector {
            DictionarySelector::Major => *main = value,
            DictionarySelector::Annotation => *anno = value,
        }
    }

    fn resolved_name<'b>(
        &self,
        dict: &Dictionary<'b>,
        record: &PropertyRecord,
        add_property_name: bool,
    ) -> Result<&'b str> {
        if add_property_name {
            dict.property_name(record.name_offset, record.name_length)
        } else {
            Ok("")
        }
    }

    fn value_start(&self, tuple: &Sflv) -> usize {
        tuple.value_end_offset - tuple.value.len()
    }

    fn emit_leaf(
        &self,
        data_type: PrincipalDataType,
        name: &str,
        tuple: &Sflv,
        callbacks: &mut dyn DecodeCallbacks,
    ) -> Result<()> {
        if tuple.value_length == 0 && data_type != PrincipalDataType::Null {
            return callbacks.null(name);
        }
        match data_type {
            PrincipalDataType::Null => callbacks.null(name),
            PrincipalDataType::Integer => callbacks.integer(name, decode_int(tuple.value)),
            PrincipalDataType::Boolean => callbacks.boolean(name, tuple.value[0] != 0),
            PrincipalDataType::String => {
                if *tuple.value.last().expect("checked non-empty above") != 0 {
                    return Err(BejError::InvalidSize(
                        "bejString value is not NUL-terminated".into(),
                    ));
                }
                let s = std::str::from_utf8(&tuple.value[..tuple.value.len() - 1])
                    .map_err(|_| BejError::InvalidSize("bejString value is not valid UTF-8".into()))?;
                callbacks.string(name, s)
            }
            PrincipalDataType::Real => callbacks.real(name, real::decode(tuple.value)?),
            other => unreachable!("emit_leaf called with non-leaf type {other:?}"),
        }
    }

    /// After a leaf (or an empty set/array) advances `stream_offset`,
    /// pop every frame whose `end_offset` has just been reached,
    /// restoring its saved state and emitting the matching close event.
    /// Stops at the first frame that doesn't match, emitting a single
    /// `property_end` for the sibling comma.
    #[allow(clippy::too_many_arguments)]
    fn drain(
        &self,
        stack: &mut Vec<Frame>,
        stream_offset: usize,
        main_dict_prop_offset: &mut u16,
        anno_dict_prop_offset: &mut u16,
        add_property_name: &mut bool,
        callbacks: &mut dyn DecodeCallbacks,
    ) -> Result<()> {
        loop {
            match stack.last() {
                Some(frame) if frame.end_offset == stream_offset => {
                    let frame = stack.pop().expect("just matched via peek");
                    *add_property_name = frame.add_property_name;
                    *main_dict_prop_offset = frame.main_dict_prop_offset;
                    *anno_dict_prop_offset = frame.anno_dict_prop_offset;
                    match frame.kind {
                        SectionKind::Set => callbacks.set_end()?,
                        SectionKind::Array => callbacks.array_end()?,
                        SectionKind::None => {}
                    }
                }
                Some(_) => {
                    callbacks.property_end()?;
                    break;
                }
                None => break,
            }
        }
        Ok(())
    }
}

/// A single decoded event, as collected by [`Decoder::decode_events`].
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeEvent {
    SetStart(String),
    SetEnd,
    ArrayStart(String),
    ArrayEnd,
    PropertyEnd,
    Null(String),
    Integer(String, i64),
    EnumValue(String, String),
    String(String, String),
    Real(String, RealValue),
    Boolean(String, bool),
    Annotation(String),
    ReadOnlyProperty(u16),
}

#[derive(Default)]
struct EventCollector {
    events: Vec<DecodeEvent>,
}

impl DecodeCallbacks for EventCollector {
    fn set_start(&mut self, name: &str) -> Result<()> {
        self.events.push(DecodeEvent::SetStart(name.to_string()));
        Ok(())
    }
    fn set_end(&mut self) -> Result<()> {
        self.events.push(DecodeEvent::SetEnd);
        Ok(())
    }
    fn array_start(&mut self, name: &str) -> Result<()> {
        self.events.push(DecodeEvent::ArrayStart(name.to_string()));
        Ok(())
    }
    fn array_end(&mut self) -> Result<()> {
        self.events.push(DecodeEvent::ArrayEnd);
        Ok(())
    }
    fn property_end(&mut self) -> Result<()> {
        self.events.push(DecodeEvent::PropertyEnd);
        Ok(())
    }
    fn null(&mut self, name: &str) -> Result<()> {
        self.events.push(DecodeEvent::Null(name.to_string()));
        Ok(())
    }
    fn integer(&mut self, name: &str, value: i64) -> Result<()> {
        self.events.push(DecodeEvent::Integer(name.to_string(), value));
        Ok(())
    }
    fn enum_value(&mut self, name: &str, value_name: &str) -> Result<()> {
        self.events
            .push(DecodeEvent::EnumValue(name.to_string(), value_name.to_string()));
        Ok(())
    }
    fn string(&mut self, name: &str, value: &str) -> Result<()> {
        self.events.push(DecodeEvent::String(name.to_string(), value.to_string()));
        Ok(())
    }
    fn real(&mut self, name: &str, value: RealValue) -> Result<()> {
        self.events.push(DecodeEvent::Real(name.to_string(), value));
        Ok(())
    }
    fn boolean(&mut self, name: &str, value: bool) -> Result<()> {
        self.events.push(DecodeEvent::Boolean(name.to_string(), value));
        Ok(())
    }
    fn annotation(&mut self, name: &str) -> Result<()> {
        self.events.push(DecodeEvent::Annotation(name.to_string()));
        Ok(())
    }
    fn read_only_property(&mut self, sequence_number: u16) -> Result<()> {
        self.events.push(DecodeEvent::ReadOnlyProperty(sequence_number));
        Ok(())
    }
}
