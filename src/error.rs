use thiserror::Error;

pub type Result<T> = std::result::Result<T, BejError>;

/// The eight-way error taxonomy used across every component of the codec.
///
/// Unlike the C original there is no `NoError` variant: success is
/// `Result::Ok`, not a sentinel value.
#[derive(Debug, Error)]
pub enum BejError {
    #[error("unknown decode error: {0}")]
    Unknown(String),

    #[error("invalid size: {0}")]
    InvalidSize(String),

    #[error("not supported: {0}")]
    NotSupported(String),

    #[error("unknown property: sequence {sequence} (searched from offset {from_offset})")]
    UnknownProperty { sequence: u16, from_offset: u16 },

    #[error("unknown property named {0:?}")]
    UnknownPropertyName(String),

    #[error("invalid schema type: {0}")]
    InvalidSchemaType(String),

    #[error("invalid property offset: {0}")]
    InvalidPropertyOffset(u16),

    // Rust references can't be null, so nothing in this crate constructs
    // this variant; it is kept only so `code()` preserves the stable
    // eight-code taxonomy (`NullParameter=7`) for callers that match on it.
    #[error("null parameter: {0}")]
    NullParameter(&'static str),
}

impl BejError {
    /// Stable integer code, matching the taxonomy's external interface.
    /// There is deliberately no `0`: that value is reserved for
    /// `bejErrorNoError` in the original C, which has no analogue once
    /// success is represented by `Result::Ok`.
    pub fn code(&self) -> i32 {
        match self {
            BejError::Unknown(_) => 1,
            BejError::InvalidSize(_) => 2,
            BejError::NotSupported(_) => 3,
            BejError::UnknownProperty { .. } | BejError::UnknownPropertyName(_) => 4,
            BejError::InvalidSchemaType(_) => 5,
            BejError::InvalidPropertyOffset(_) => 6,
            BejError::NullParameter(_) => 7,
        }
    }
}
