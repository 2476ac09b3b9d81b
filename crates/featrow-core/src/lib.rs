//! Featrow canonical record types
//!
//! This crate defines the `FeatureRow` record every ingestion source is
//! normalized into, together with its strict binary codec. The codec either
//! produces a complete record or fails; there are no partial decodes.

pub mod codec;
pub mod record;
pub mod serde_utils;

pub use codec::{decode, encode, CodecError, MAX_RECORD_SIZE};
pub use record::{FeatureField, FeatureRow};
