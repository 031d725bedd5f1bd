//! Orchestration, DVR, stats and error surface for the fpv-link transport
//! (SPEC_FULL.md §2 "fpv_core — orchestration, error handling, stats"):
//! the [`air`] and [`ground`] pipelines compose the lower `fpv-fec`/
//! `fpv-wire`/`fpv-radio` crates into the air-side and ground-side state
//! machines spec §4.E-§4.H describe; [`dvr`] is the three-stage recording
//! sink of spec §4.J; [`stats`] and [`error`] are the non-hot-path surfaces
//! spec §7 requires.
//!
//! Per spec §9 ("Global state... becomes a composed `Runtime` struct"),
//! this crate deliberately holds no singletons: `fpv-air` and `fpv-ground`
//! each construct their own `Runtime` (owning one `AirTx`/`AirRx` or
//! `GroundRx`/`GroundTx` plus a [`stats::Stats`]) once at startup and pass
//! it explicitly to the worker loops they spawn.

pub mod air;
pub mod dvr;
pub mod error;
pub mod ground;
pub mod stats;

pub use error::FpvError;
pub use stats::{Stats, StatsSnapshot};
