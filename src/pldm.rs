//! The 7-byte PLDM block header that frames every BEJ-encoded stream.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{BejError, Result};
use crate::types::SchemaClass;

/// The only BEJ version this crate understands.
pub const BEJ_VERSION: u32 = 0xF1F0_F000;

pub const PLDM_HEADER_SIZE: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PldmHeader {
    pub version: u32,
    pub schema_class: SchemaClass,
}

impl PldmHeader {
    pub fn new(schema_class: SchemaClass) -> Self {
        PldmHeader {
            version: BEJ_VERSION,
            schema_class,
        }
    }

    /// Parses the 7-byte header from the front of `block`, rejecting an
    /// unrecognized version or a schema class this crate refuses to
    /// decode at the top level (`Annotation`, `CollectionMemberType`,
    /// `Error`). All three rejections share the same `NotSupported`
    /// error code, matching `bejDecodePldmBlock` in the original.
    pub fn parse(block: &[u8]) -> Result<(Self, &[u8])> {
        if block.len() < PLDM_HEADER_SIZE {
            return Err(BejError::InvalidSize(format!(
                "PLDM block must be at least {PLDM_HEADER_SIZE} bytes, got {}",
                block.len()
            )));
        }
        let version = (&block[0..4])
            .read_u32::<LittleEndian>()
            .expect("length checked above");
        if version != BEJ_VERSION {
            log::warn!("rejecting unsupported BEJ version {version:#010x}");
            return Err(BejError::NotSupported(format!(
                "unsupported BEJ version {version:#010x}"
            )));
        }
        let schema_class = SchemaClass::from_byte(block[6])?;
        if matches!(
            schema_class,
            SchemaClass::Annotation | SchemaClass::CollectionMemberType | SchemaClass::Error
        ) {
            log::warn!("rejecting unsupported schema class {schema_class:?}");
            return Err(BejError::NotSupported(format!(
                "schema class {schema_class:?} is not decodable at the top level"
            )));
        }
        Ok((
            PldmHeader {
                version,
                schema_class,
            },
            &block[PLDM_HEADER_SIZE..],
        ))
    }

    pub fn write_into(&self, out: &mut dyn FnMut(&[u8]) -> Result<()>) -> Result<()> {
        let mut header = Vec::with_capacity(PLDM_HEADER_SIZE);
        header.write_u32::<LittleEndian>(self.version).unwrap();
        header.write_u16::<LittleEndian>(0).unwrap();
        header.write_u8(self.schema_class as u8).unwrap();
        out(&header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_block() {
        assert!(matches!(
            PldmHeader::parse(&[0; 3]),
            Err(BejError::InvalidSize(_))
        ));
    }

    #[test]
    fn rejects_bad_version() {
        let mut block = vec![0xAA, 0xBB, 0xCC, 0xDD, 0x00, 0x00, 0x00];
        block.extend_from_slice(&[1, 2, 3]);
        assert!(matches!(
            PldmHeader::parse(&block),
            Err(BejError::NotSupported(_))
        ));
    }

    #[test]
    fn rejects_annotation_schema_class() {
        let mut block = BEJ_VERSION.to_le_bytes().to_vec();
        block.extend_from_slice(&0u16.to_le_bytes());
        block.push(SchemaClass::Annotation as u8);
        assert!(matches!(
            PldmHeader::parse(&block),
            Err(BejError::NotSupported(_))
        ));
    }

    #[test]
    fn accepts_major_schema_class() {
        let mut block = BEJ_VERSION.to_le_bytes().to_vec();
        block.extend_from_slice(&0u16.to_le_bytes());
        block.push(SchemaClass::Major as u8);
        block.extend_from_slice(&[9, 9]);
        let (header, rest) = PldmHeader::parse(&block).unwrap();
        assert_eq!(header.schema_class, SchemaClass::Major);
        assert_eq!(rest, &[9, 9]);
    }
}
