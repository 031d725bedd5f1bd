//! Wire formats shared by the air and ground binaries: the transport frame
//! header carried by every FEC-coded frame, the air-to-ground video packet
//! header, and the ground-to-air control packets.
//!
//! This crate is `no_std` and allocation-free: every type here is a plain,
//! fixed-size, little-endian packed struct with hand-rolled `pack`/`unpack`
//! methods rather than a derive-based serializer, mirroring the rest of the
//! transport stack's avoidance of a runtime-cost wire format layer.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod control;
pub mod crc;
pub mod transport;
pub mod video;

pub use control::{CameraParams, ConfigPacket, Ground2AirType, WifiRate};
pub use crc::crc8;
pub use transport::{block_distance, TransportHeader};
pub use video::{Air2GroundType, Resolution, VideoHeader};
