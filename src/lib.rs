//! Protocol Buffers binary wire-format codec with selective field extraction.
//!
//! The crate is layered leaves first:
//!
//! * [`wire`] and [`leb128`]: varint, zigzag, fixed-width and tag primitives.
//! * [`size`]: exact size calculations used to presize an [`Encoder`] buffer.
//! * [`encode`]: the [`Encoder`], appending fields into a caller-sized buffer.
//! * [`decode`]: the [`Decoder`], a read cursor in [`Mode::Safe`] or [`Mode::Fast`].
//! * [`lazy`]: selective decoding driven by a [`Def`], producing a [`DecodeResult`]
//!   tree of [`FieldData`] that is only interpreted when asked for.

#![no_std]
#![deny(clippy::as_conversions)]

extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod decode;
pub mod encode;
pub mod error;
pub mod lazy;
pub mod leb128;
pub mod message;
pub mod packed;
pub mod scalar;
pub mod size;
pub mod wire;

mod util;

pub use decode::{Decoder, Mode};
pub use encode::Encoder;
pub use error::DecodeError;
pub use lazy::{DecodePool, DecodeResult, Def, FieldData, LazyDecoder, MessageView, PoolConfig};
pub use message::{MessageDecode, MessageEncode, RawMessage, UnknownFields};
pub use wire::WireType;
