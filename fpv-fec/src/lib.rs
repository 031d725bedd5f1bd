//! FEC-protected packet transport and lock-free hand-off buffers (spec §2,
//! components A-D): the [`frame_ring`] and [`byte_ring`] SPSC rings are
//! `no_std`/allocation-free over a caller-owned buffer; [`encoder`] and
//! [`decoder`] additionally require the `std` feature because the
//! Reed-Solomon backend they wrap works over `Vec`-backed shards (see
//! [`gf`] and DESIGN.md for the grounding and the tradeoff this implies).

#![cfg_attr(not(feature = "std"), no_std)]

pub mod byte_ring;
pub mod frame_ring;

#[cfg(feature = "std")]
pub mod gf;

#[cfg(feature = "std")]
pub mod encoder;

#[cfg(feature = "std")]
pub mod decoder;

pub use byte_ring::ByteRing;
pub use frame_ring::FrameRing;

#[cfg(feature = "std")]
pub use decoder::{DecodedSink, DropReason, FecDecoder};
#[cfg(feature = "std")]
pub use encoder::{EncodedSink, FecDescriptor, FecEncoder};
