//! The small fixed vocabularies of the BEJ wire format: principal data
//! types, schema classes, the packed format byte, and the dictionary
//! selector bit.

use bitflags::bitflags;
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

use crate::error::{BejError, Result};

/// The 4-bit "principal data type" tag carried in the high nibble of the
/// format byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum PrincipalDataType {
    Set = 0,
    Array = 1,
    Null = 2,
    Integer = 3,
    Enum = 4,
    String = 5,
    Real = 6,
    Boolean = 7,
    Bytestring = 8,
    Choice = 9,
    PropertyAnnotation = 10,
    Reserved1 = 11,
    Reserved2 = 12,
    Reserved3 = 13,
    ResourceLink = 14,
    ResourceLinkExpansion = 15,
}

impl PrincipalDataType {
    pub fn from_nibble(n: u8) -> Result<Self> {
        PrincipalDataType::from_u8(n & 0x0F)
            .ok_or_else(|| BejError::InvalidSchemaType(format!("unknown principal type {n}")))
    }

    /// Types this crate declines to decode or encode a value for, beyond
    /// simply skipping past them on the wire.
    pub fn is_unsupported(self) -> bool {
        matches!(
            self,
            PrincipalDataType::Bytestring
                | PrincipalDataType::Choice
                | PrincipalDataType::Reserved1
                | PrincipalDataType::Reserved2
                | PrincipalDataType::Reserved3
                | PrincipalDataType::ResourceLink
                | PrincipalDataType::ResourceLinkExpansion
        )
    }

    pub fn is_parent(self) -> bool {
        matches!(
            self,
            PrincipalDataType::Set | PrincipalDataType::Array | PrincipalDataType::PropertyAnnotation
        )
    }
}

/// The RDE schema class carried in the PLDM block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum SchemaClass {
    Major = 0,
    Event = 1,
    Annotation = 2,
    CollectionMemberType = 3,
    Error = 4,
}

impl SchemaClass {
    pub fn from_byte(b: u8) -> Result<Self> {
        SchemaClass::from_u8(b)
            .ok_or_else(|| BejError::InvalidSchemaType(format!("unknown schema class {b}")))
    }
}

bitflags! {
    /// The four flag bits packed into the low nibble of the format byte.
    /// Bit 0 is the first-declared field in the original's packed
    /// bitfield struct, hence the least-significant bit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FormatFlags: u8 {
        const DEFERRED_BINDING = 0b0000_0001;
        const READ_ONLY        = 0b0000_0010;
        const NULLABLE         = 0b0000_0100;
        const RESERVED         = 0b0000_1000;
    }
}

/// The combined (flags, principal type) format byte (`F` of `SFLV`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatTuple {
    pub flags: FormatFlags,
    pub data_type: PrincipalDataType,
}

impl FormatTuple {
    pub fn new(data_type: PrincipalDataType) -> Self {
        FormatTuple {
            flags: FormatFlags::empty(),
            data_type,
        }
    }

    pub fn from_byte(b: u8) -> Result<Self> {
        let data_type = PrincipalDataType::from_nibble(b >> 4)?;
        let flags = FormatFlags::from_bits_truncate(b & 0x0F);
        Ok(FormatTuple { flags, data_type })
    }

    pub fn to_byte(self) -> u8 {
        ((self.data_type as u8) << 4) | self.flags.bits()
    }
}

/// Which of the two dictionaries (major schema, or annotation) a
/// property's name resolves against. Packed as bit 0 of the `S` nnint
/// value on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictionarySelector {
    Major,
    Annotation,
}

pub const DICTIONARY_TYPE_MASK: u64 = 0x01;
pub const DICTIONARY_SEQ_NUM_SHIFT: u32 = 1;

impl DictionarySelector {
    pub fn from_bit(bit: u64) -> Self {
        if bit & DICTIONARY_TYPE_MASK != 0 {
            DictionarySelector::Annotation
        } else {
            DictionarySelector::Major
        }
    }

    pub fn bit(self) -> u64 {
        match self {
            DictionarySelector::Major => 0,
            DictionarySelector::Annotation => 1,
        }
    }
}

/// Packs a dictionary sequence number and selector into the raw value
/// carried by the `S` nnint.
pub fn pack_sequence(sequence_number: u16, selector: DictionarySelector) -> u64 {
    ((sequence_number as u64) << DICTIONARY_SEQ_NUM_SHIFT) | selector.bit()
}

/// Splits a raw `S` nnint value into its dictionary sequence number and
/// selector.
pub fn unpack_sequence(raw: u64) -> (u16, DictionarySelector) {
    let selector = DictionarySelector::from_bit(raw);
    let sequence_number = (raw >> DICTIONARY_SEQ_NUM_SHIFT) as u16;
    (sequence_number, selector)
}
