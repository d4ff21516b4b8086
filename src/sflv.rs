//! Parsing of a single Sequence/Format/Length/Value tuple out of a byte
//! stream, without copying `V`.

use crate::error::{BejError, Result};
use crate::nnint::{nnint_size, nnint_value};
use crate::types::{unpack_sequence, DictionarySelector, FormatTuple};

#[derive(Debug)]
pub struct Sflv<'a> {
    pub schema: DictionarySelector,
    pub sequence_number: u16,
    pub format: FormatTuple,
    pub value_length: u32,
    pub value: &'a [u8],
    /// Absolute offset within the original stream one past the end of
    /// this tuple's `V`.
    pub value_end_offset: usize,
}

/// Parses the SFLV tuple starting at `offset` within `stream`.
pub fn parse_sflv(stream: &[u8], offset: usize) -> Result<Sflv<'_>> {
    if offset > stream.len() {
        return Err(BejError::InvalidSize("SFLV offset past end of stream".into()));
    }
    let seg = &stream[offset..];

    let seq_nnint_size = nnint_size(seg)?;
    let raw_seq = nnint_value(seg)?;
    let (sequence_number, schema) = unpack_sequence(raw_seq);

    let format_offset = seq_nnint_size;
    let format_byte = *seg
        .get(format_offset)
        .ok_or_else(|| BejError::InvalidSize("SFLV tuple truncated before format byte".into()))?;
    let format = FormatTuple::from_byte(format_byte)?;

    let len_nnint_offset = format_offset + 1;
    let len_nnint = seg
        .get(len_nnint_offset..)
        .ok_or_else(|| BejError::InvalidSize("SFLV tuple truncated before length".into()))?;
    let value_length = nnint_value(len_nnint)?;
    let len_nnint_size = nnint_size(len_nnint)?;

    let value_offset = len_nnint_offset + len_nnint_size;
    let value_start = offset + value_offset;
    let value_end = value_start + value_length as usize;
    if value_end > stream.len() {
        return Err(BejError::InvalidSize(format!(
            "SFLV value of length {value_length} at offset {offset} runs past the end of the stream"
        )));
    }

    Ok(Sflv {
        schema,
        sequence_number,
        format,
        value_length: value_length as u32,
        value: &stream[value_start..value_end],
        value_end_offset: value_end,
    })
}
