//! A read-only view over a binary BEJ dictionary blob: a 12-byte header,
//! followed by fixed-size property records, followed by a NUL-terminated
//! name string pool.

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{BejError, Result};
use crate::nnint::{nnint_size, nnint_value};
use crate::types::FormatTuple;

pub const DICTIONARY_HEADER_SIZE: usize = 12;
pub const PROPERTY_RECORD_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DictionaryHeader {
    pub version_tag: u8,
    pub truncated: bool,
    pub entry_count: u16,
    pub schema_version: u32,
    pub dictionary_size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyRecord {
    pub format: FormatTuple,
    pub sequence_number: u16,
    pub child_pointer_offset: u16,
    pub child_count: u16,
    pub name_length: u8,
    pub name_offset: u16,
}

/// A borrowed view over a dictionary blob. Does not own or copy the
/// underlying bytes.
pub struct Dictionary<'a> {
    bytes: &'a [u8],
}

impl<'a> Dictionary<'a> {
    pub fn new(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < DICTIONARY_HEADER_SIZE {
            return Err(BejError::InvalidSize(format!(
                "dictionary blob must be at least {DICTIONARY_HEADER_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        let dict = Dictionary { bytes };
        let header = dict.header()?;
        if (header.dictionary_size as usize) > bytes.len() {
            return Err(BejError::InvalidSize(format!(
                "dictionary header declares size {} but blob is only {} bytes",
                header.dictionary_size,
                bytes.len()
            )));
        }
        Ok(dict)
    }

    pub fn header(&self) -> Result<DictionaryHeader> {
        let mut cursor = self.bytes;
        let version_tag = cursor.read_u8().expect("length checked in Dictionary::new");
        let flags = cursor.read_u8().expect("length checked in Dictionary::new");
        let entry_count = cursor
            .read_u16::<LittleEndian>()
            .expect("length checked in Dictionary::new");
        let schema_version = cursor
            .read_u32::<LittleEndian>()
            .expect("length checked in Dictionary::new");
        let dictionary_size = cursor
            .read_u32::<LittleEndian>()
            .expect("length checked in Dictionary::new");
        Ok(DictionaryHeader {
            version_tag,
            truncated: flags & 0x01 != 0,
            entry_count,
            schema_version,
            dictionary_size,
        })
    }

    /// Offset of the first (synthetic root) property record.
    pub fn property_head_offset(&self) -> u16 {
        DICTIONARY_HEADER_SIZE as u16
    }

    /// Offset of the first property record after the root, by convention
    /// the start of the annotation dictionary's search range.
    pub fn first_annotated_property_offset(&self) -> u16 {
        self.property_head_offset() + PROPERTY_RECORD_SIZE as u16
    }

    fn entry_index(&self, offset: u16) -> Option<u16> {
        let head = self.property_head_offset();
        if offset < head {
            return None;
        }
        let delta = offset - head;
        if delta % PROPERTY_RECORD_SIZE as u16 != 0 {
            return None;
        }
        Some(delta / PROPERTY_RECORD_SIZE as u16)
    }

    pub fn validate_offset(&self, offset: u16) -> bool {
        match self.entry_index(offset) {
            Some(idx) => self
                .header()
                .map(|h| idx < h.entry_count)
                .unwrap_or(false),
            None => false,
        }
    }

    /// Reads the record at an exactly-known offset, without searching.
    /// Used by the encoder to resolve the tree root directly against
    /// `majorSchemaStartingOffset`.
    pub fn record_at(&self, offset: u16) -> Result<PropertyRecord> {
        self.read_record_at(offset)
    }

    fn read_record_at(&self, offset: u16) -> Result<PropertyRecord> {
        if !self.validate_offset(offset) {
            return Err(BejError::InvalidPropertyOffset(offset));
        }
        let start = offset as usize;
        let end = start + PROPERTY_RECORD_SIZE;
        if end > self.bytes.len() {
            return Err(BejError::InvalidSize(format!(
                "property record at offset {offset} runs past the end of the dictionary"
            )));
        }
        let mut cursor = &self.bytes[start..end];
        let format = FormatTuple::from_byte(cursor.read_u8().expect("bounds checked above"))?;
        let sequence_number = cursor.read_u16::<LittleEndian>().expect("bounds checked above");
        let child_pointer_offset = cursor.read_u16::<LittleEndian>().expect("bounds checked above");
        let child_count = cursor.read_u16::<LittleEndian>().expect("bounds checked above");
        let name_length = cursor.read_u8().expect("bounds checked above");
        let name_offset = cursor.read_u16::<LittleEndian>().expect("bounds checked above");

        if name_length > 0 {
            let name_end = name_offset as usize + name_length as usize;
            if name_end > self.bytes.len() {
                return Err(BejError::InvalidSize(format!(
                    "property record at offset {offset} names a string past the end of the dictionary"
                )));
            }
            if self.bytes[name_end - 1] != 0 {
                return Err(BejError::InvalidSize(format!(
                    "property record at offset {offset} has a non-NUL-terminated name"
                )));
            }
        }

        Ok(PropertyRecord {
            format,
            sequence_number,
            child_pointer_offset,
            child_count,
            name_length,
            name_offset,
        })
    }

    /// Reads the name string of a record, given its `name_offset` and
    /// `name_length` fields (including the trailing NUL in `name_length`,
    /// per the wire format; the returned string excludes it).
    pub fn property_name(&self, name_offset: u16, name_length: u8) -> Result<&'a str> {
        if name_length == 0 {
            return Ok("");
        }
        let start = name_offset as usize;
        let end = start + name_length as usize - 1;
        std::str::from_utf8(&self.bytes[start..end])
            .map_err(|_| BejError::InvalidSize(format!("name at offset {name_offset} is not valid UTF-8")))
    }

    /// Scans forward from `start_offset` for the record with dictionary
    /// sequence number `sequence_number`. Returns the record and its own
    /// offset.
    pub fn get_property(
        &self,
        start_offset: u16,
        sequence_number: u16,
    ) -> Result<(PropertyRecord, u16)> {
        let header = self.header()?;
        let start_index = self
            .entry_index(start_offset)
            .ok_or(BejError::InvalidPropertyOffset(start_offset))?;
        for idx in start_index..header.entry_count {
            let offset = self.property_head_offset() + idx * PROPERTY_RECORD_SIZE as u16;
            let record = self.read_record_at(offset)?;
            if record.sequence_number == sequence_number {
                return Ok((record, offset));
            }
        }
        Err(BejError::UnknownProperty {
            sequence: sequence_number,
            from_offset: start_offset,
        })
    }

    /// Scans forward from `start_offset` for the record named `name`.
    pub fn get_property_by_name(&self, start_offset: u16, name: &str) -> Result<(PropertyRecord, u16)> {
        let header = self.header()?;
        let start_index = self
            .entry_index(start_offset)
            .ok_or(BejError::InvalidPropertyOffset(start_offset))?;
        for idx in start_index..header.entry_count {
            let offset = self.property_head_offset() + idx * PROPERTY_RECORD_SIZE as u16;
            let record = self.read_record_at(offset)?;
            if self.property_name(record.name_offset, record.name_length)? == name {
                return Ok((record, offset));
            }
        }
        Err(BejError::UnknownPropertyName(name.to_string()))
    }

    /// Resolves a BEJ locator (`nnint(totalBytes) || tupleS1 || ...`) by
    /// walking one dictionary sequence number at a time, descending
    /// through each resolved record's `child_pointer_offset`.
    pub fn resolve_locator(&self, locator: &[u8]) -> Result<(PropertyRecord, u16)> {
        let header_len = nnint_size(locator)?;
        let declared_len = nnint_value(locator)? as usize;
        if header_len + declared_len != locator.len() {
            return Err(BejError::InvalidSize(
                "BEJ locator length prefix does not match its actual length".into(),
            ));
        }
        let mut tuple_offset = header_len;
        let mut dict_offset = self.property_head_offset();
        loop {
            let tuple = &locator[tuple_offset..];
            let raw_seq = nnint_value(tuple)?;
            let sequence_number = (raw_seq >> crate::types::DICTIONARY_SEQ_NUM_SHIFT) as u16;
            let (record, record_offset) = self.get_property(dict_offset, sequence_number)?;
            tuple_offset += nnint_size(tuple)?;
            if tuple_offset == locator.len() {
                return Ok((record, record_offset));
            }
            if tuple_offset > locator.len() {
                return Err(BejError::InvalidSize("BEJ locator tuple overruns its buffer".into()));
            }
            dict_offset = record.child_pointer_offset;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrincipalDataType;

    /// Hand-built dictionary with:
    ///   entry 0: "Resource" (seq 0, set, 2 children, children at offset 22)
    ///   entry 1: "Id"       (seq 0, string)
    ///   entry 2: "Count"    (seq 1, integer)
    fn sample_dictionary() -> Vec<u8> {
        let pool_start = DICTIONARY_HEADER_SIZE as u16 + 3 * PROPERTY_RECORD_SIZE as u16;
        let resource_name_off = pool_start;
        let id_name_off = resource_name_off + b"Resource\0".len() as u16;
        let count_name_off = id_name_off + b"Id\0".len() as u16;

        let mut names = Vec::new();
        names.extend_from_slice(b"Resource\0");
        names.extend_from_slice(b"Id\0");
        names.extend_from_slice(b"Count\0");

        let mut blob = Vec::new();
        // children begin right after entry 0's own record, at index 1.
        let children_off = DICTIONARY_HEADER_SIZE as u16 + PROPERTY_RECORD_SIZE as u16;

        let dict_size = pool_start as u32 + names.len() as u32;
        blob.push(1); // version_tag
        blob.push(0); // flags
        blob.extend_from_slice(&3u16.to_le_bytes()); // entry_count
        blob.extend_from_slice(&1u32.to_le_bytes()); // schema_version
        blob.extend_from_slice(&dict_size.to_le_bytes()); // dictionary_size

        // entry 0: Resource, Set, seq 0, 2 children at children_off
        blob.push(FormatTuple::new(PrincipalDataType::Set).to_byte());
        blob.extend_from_slice(&0u16.to_le_bytes());
        blob.extend_from_slice(&children_off.to_le_bytes());
        blob.extend_from_slice(&2u16.to_le_bytes());
        blob.push(9); // "Resource\0"
        blob.extend_from_slice(&resource_name_off.to_le_bytes());

        // entry 1: Id, String, seq 0
        blob.push(FormatTuple::new(PrincipalDataType::String).to_byte());
        blob.extend_from_slice(&0u16.to_le_bytes());
        blob.extend_from_slice(&0u16.to_le_bytes());
        blob.extend_from_slice(&0u16.to_le_bytes());
        blob.push(3); // "Id\0"
        blob.extend_from_slice(&id_name_off.to_le_bytes());

        // entry 2: Count, Integer, seq 1
        blob.push(FormatTuple::new(PrincipalDataType::Integer).to_byte());
        blob.extend_from_slice(&1u16.to_le_bytes());
        blob.extend_from_slice(&0u16.to_le_bytes());
        blob.extend_from_slice(&0u16.to_le_bytes());
        blob.push(6); // "Count\0"
        blob.extend_from_slice(&count_name_off.to_le_bytes());

        blob.extend_from_slice(&names);
        blob
    }

    #[test]
    fn header_parses() {
        let blob = sample_dictionary();
        let dict = Dictionary::new(&blob).unwrap();
        let header = dict.header().unwrap();
        assert_eq!(header.entry_count, 3);
        assert!(!header.truncated);
    }

    #[test]
    fn get_property_by_sequence_and_name() {
        let blob = sample_dictionary();
        let dict = Dictionary::new(&blob).unwrap();
        let head = dict.property_head_offset();

        let (resource, _) = dict.get_property(head, 0).unwrap();
        assert_eq!(resource.child_count, 2);
        let name = dict.property_name(resource.name_offset, resource.name_length).unwrap();
        assert_eq!(name, "Resource");

        let (id_rec, _) = dict.get_property_by_name(resource.child_pointer_offset, "Id").unwrap();
        assert_eq!(id_rec.format.data_type, PrincipalDataType::String);

        let (count_rec, _) = dict.get_property(resource.child_pointer_offset, 1).unwrap();
        let name = dict.property_name(count_rec.name_offset, count_rec.name_length).unwrap();
        assert_eq!(name, "Count");
    }

    #[test]
    fn unknown_sequence_number_errors() {
        let blob = sample_dictionary();
        let dict = Dictionary::new(&blob).unwrap();
        let head = dict.property_head_offset();
        assert!(matches!(
            dict.get_property(head, 42),
            Err(BejError::UnknownProperty { .. })
        ));
    }

    #[test]
    fn resolve_locator_descends_two_levels() {
        let blob = sample_dictionary();
        let dict = Dictionary::new(&blob).unwrap();

        // locator: Resource(seq 0) -> Count(seq 1)
        let mut tuples = Vec::new();
        tuples.extend(crate::nnint::encode_nnint(0)); // seq 0, selector major
        tuples.extend(crate::nnint::encode_nnint(1 << 1)); // seq 1, selector major
        let mut locator = crate::nnint::encode_nnint(tuples.len() as u64);
        locator.extend(tuples);

        let (record, _) = dict.resolve_locator(&locator).unwrap();
        let name = dict.property_name(record.name_offset, record.name_length).unwrap();
        assert_eq!(name, "Count");
    }
}
