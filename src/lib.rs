//! A codec for the DMTF Redfish Device Enablement (RDE) Binary-Encoded
//! JSON (BEJ) wire format, version `0xF1F0F000`.
//!
//! Given a pair of compact binary dictionaries (a *major* schema
//! dictionary and a shared *annotation* dictionary), this crate converts
//! between a [`tree::PropertyTree`] and a BEJ byte stream prefixed by a
//! 7-byte PLDM block header. JSON materialization, dictionary file I/O,
//! and RDE operation framing are left to the caller.

#![deny(unused_must_use)]
// Don't allow dbg! prints in release.
#![cfg_attr(not(debug_assertions), deny(clippy::dbg_macro))]

pub use decoder::{DecodeCallbacks, DecodeEvent, Decoder};
pub use dictionary::Dictionary;
pub use encoder::{Encoder, OutputSink};
pub use error::{BejError, Result};
pub use pldm::PldmHeader;
pub use tree::{LeafValue, NodeId, ParentKind, PropertyTree};
pub use types::{FormatFlags, FormatTuple, PrincipalDataType, SchemaClass};

pub mod decoder;
pub mod dictionary;
pub mod encoder;
pub mod error;
pub mod nnint;
pub mod pldm;
pub mod real;
pub mod sflv;
pub mod tree;
pub mod types;
