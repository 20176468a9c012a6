//! Tap-URL parameter decoding.
//!
//! A physical tap resolves to a URL whose query string carries the chip's
//! credential in one of several historical encodings. This module turns that
//! query string into a canonical [`CredentialRecord`] plus the [`TapFormat`]
//! that produced it. Decoding never performs I/O and never fails with an
//! error: a query nothing matches decodes to [`TapFormat::None`].

mod decode;
mod params;
mod types;

pub use decode::decode_tap;
pub(crate) use decode::default_challenge;
pub use params::TapParams;
pub use types::{CredentialRecord, DecodeNote, DecodedTap, TapFormat};
