//! Decomposition and reconstruction of `bejReal` values.
//!
//! `V = nnint(len_whole) || bejInteger(whole) || nnint(zero_count) ||
//! nnint(fract) || nnint(len_exp) || [bejInteger(exp) if len_exp > 0]`.

use crate::error::{BejError, Result};
use crate::nnint::{decode_int, encode_int, encode_nnint, int_encoded_size, nnint_size, nnint_value};

/// The five constituent parts of a decoded `bejReal`, handed to the
/// decoder's `real` callback verbatim rather than reassembled into an
/// approximate `f64` (reassembly is a lossy operation callers may or may
/// not want).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RealValue {
    pub whole: i64,
    pub zero_count: u64,
    pub fract: u64,
    pub exp_len: u8,
    pub exp: i64,
}

/// Splits an `f64` into `(whole, zero_count, fract)`, stopping after at
/// most 16 fractional digits. `whole` carries the value's sign; `fract`
/// and `zero_count` are always non-negative.
pub fn decompose(value: f64) -> (i64, u64, u64) {
    let whole = value.trunc() as i64;
    let mut remainder = (value - value.trunc()).abs();

    let mut zero_count = 0u64;
    let mut fract: u64 = 0;
    let mut started = false;

    for _ in 0..16 {
        if remainder < 1e-9 {
            break;
        }
        remainder *= 10.0;
        let digit = remainder.trunc() as u64;
        remainder -= digit as f64;
        if !started {
            if digit == 0 {
                zero_count += 1;
                continue;
            }
            started = true;
        }
        fract = fract * 10 + digit;
    }

    (whole, zero_count, fract)
}

/// Size in bytes of the encoded `V` for `value`, given this crate's
/// encoder never emits an exponent (`len_exp` is always `0`).
pub fn encoded_size(value: f64) -> usize {
    let (whole, zero_count, fract) = decompose(value);
    let len_whole = int_encoded_size(whole);
    crate::nnint::nnint_encoded_size(len_whole as u64)
        + len_whole
        + crate::nnint::nnint_encoded_size(zero_count)
        + crate::nnint::nnint_encoded_size(fract)
        + crate::nnint::nnint_encoded_size(0)
}

/// Encodes `value` as the bytes of `V`.
pub fn encode(value: f64) -> Vec<u8> {
    let (whole, zero_count, fract) = decompose(value);
    let len_whole = int_encoded_size(whole);
    let mut out = Vec::with_capacity(encoded_size(value));
    out.extend(encode_nnint(len_whole as u64));
    out.extend(encode_int(whole));
    out.extend(encode_nnint(zero_count));
    out.extend(encode_nnint(fract));
    out.extend(encode_nnint(0));
    out
}

/// Slices `bytes[offset..offset + len]`, rejecting a declared `len` that
/// would run past the end of `bytes` (or overflow computing the end)
/// rather than panicking on an out-of-bounds index.
fn take(bytes: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    let end = offset
        .checked_add(len)
        .ok_or_else(|| BejError::InvalidSize("bejReal field length overflows".into()))?;
    bytes.get(offset..end).ok_or_else(|| {
        BejError::InvalidSize(format!(
            "bejReal field of length {len} at offset {offset} runs past the end of its value"
        ))
    })
}

/// Decodes a `bejReal`'s `V` bytes, supporting an input-side exponent
/// even though this crate's own encoder never produces one.
pub fn decode(bytes: &[u8]) -> Result<RealValue> {
    let mut offset = 0usize;

    let len_whole_size = nnint_size(&bytes[offset..])?;
    let len_whole = nnint_value(&bytes[offset..])? as usize;
    offset += len_whole_size;

    let whole = decode_int(take(bytes, offset, len_whole)?);
    offset += len_whole;

    let zero_count_size = nnint_size(&bytes[offset..])?;
    let zero_count = nnint_value(&bytes[offset..])?;
    offset += zero_count_size;

    let fract_size = nnint_size(&bytes[offset..])?;
    let fract = nnint_value(&bytes[offset..])?;
    offset += fract_size;

    let len_exp_size = nnint_size(&bytes[offset..])?;
    let len_exp = nnint_value(&bytes[offset..])? as u8;
    offset += len_exp_size;

    let exp = if len_exp > 0 {
        decode_int(take(bytes, offset, len_exp as usize)?)
    } else {
        0
    };

    Ok(RealValue {
        whole,
        zero_count,
        fract,
        exp_len: len_exp,
        exp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decomposes_simple_negative_value() {
        let (whole, zero_count, fract) = decompose(-5576.90001);
        assert_eq!(whole, -5576);
        assert_eq!(zero_count, 0);
        assert_eq!(fract, 90001);
    }

    #[test]
    fn decomposes_leading_fractional_zeros() {
        let (whole, zero_count, fract) = decompose(0.001);
        assert_eq!(whole, 0);
        assert_eq!(zero_count, 2);
        assert_eq!(fract, 1);
    }

    #[test]
    fn round_trips_through_encode_decode() {
        let encoded = encode(-5576.90001);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.whole, -5576);
        assert_eq!(decoded.zero_count, 0);
        assert_eq!(decoded.fract, 90001);
        assert_eq!(decoded.exp_len, 0);
    }

    #[test]
    fn rejects_a_len_whole_that_overruns_the_value() {
        // len_whole claims 8 bytes but only one follows.
        let mut bytes = encode_nnint(8);
        bytes.push(0x01);
        assert!(matches!(decode(&bytes), Err(BejError::InvalidSize(_))));
    }

    #[test]
    fn rejects_a_len_exp_that_overruns_the_value() {
        let mut bytes = encode_nnint(1); // len_whole
        bytes.extend(encode_int(0)); // whole
        bytes.extend(encode_nnint(0)); // zero_count
        bytes.extend(encode_nnint(0)); // fract
        bytes.extend(encode_nnint(8)); // len_exp, claims 8 bytes with none following
        assert!(matches!(decode(&bytes), Err(BejError::InvalidSize(_))));
    }
}
