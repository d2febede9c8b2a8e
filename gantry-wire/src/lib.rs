//! # gantry-wire
//!
//! Wire-format contract for the gantry FFI bridge.
//!
//! This crate provides the foundational types shared by both sides of the
//! language boundary:
//! - [`WireBuffer`] - the cross-boundary byte buffer with C layout
//! - [`WireWriter`] / [`WireReader`] - the big-endian value codec
//! - [`Encode`] / [`Decode`] - typed lowering and lifting over the codec
//! - [`CodecError`] - schema and contract violations
//!
//! Byte layout here is not negotiable at either end: it must match the
//! native library's interface definitions exactly, which is why decoding is
//! strict (a top-level value must consume its whole buffer) and why every
//! malformed input fails loudly instead of being coerced.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod buffer;
mod codec;
mod encode;
mod error;

pub use buffer::WireBuffer;
pub use codec::{WireReader, WireWriter};
pub use encode::{decode_value, encode_value, Decode, Encode};
pub use error::CodecError;
