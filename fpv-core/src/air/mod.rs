//! The air-side pipeline: camera capture to FEC-protected radio frames, and
//! the reverse `ConfigPacket` dispatch (spec §4.E, §4.F).

pub mod camera;
pub mod rx;
pub mod tx;

pub use rx::{AirRx, CameraController};
pub use tx::{AirTx, CameraEvent, CameraSource, DvrTap};
