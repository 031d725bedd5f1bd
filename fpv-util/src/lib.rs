//! Generic, runtime-agnostic utilities the other `fpv-*` crates depend upon
//! but that are not themselves part of the FEC transport or wire formats.
//!
//! The main purpose of this crate is to keep the hot-path crates
//! (`fpv-fec`, `fpv-wire`) self-contained and `no_std`-friendly.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod log;
pub mod stats;
pub mod sync;
pub mod tokens;

/// A generic error for conditions that carry no further context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Error;

/// A type alias for `Result<T, fpv_util::Error>`.
pub type Result<T> = core::result::Result<T, Error>;
