//! Command-line surface for the air binary (SPEC_FULL.md §4 ambient "CLI /
//! logging / config surface"). Mirrors the shape of the ground CLI (spec.md
//! §6: "interface names for capture/injection, target channel, initial FEC
//! shape, MTU") even though, on this side, the camera and radio driver are
//! simulated (spec.md §1).

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[clap(version, about = "Air-side video transmitter and control dispatcher")]
pub struct Args {
    /// Injection interface for outgoing video frames (spec §6: "injection
    /// (=1)"). Ignored in `--demo` mode.
    #[clap(long)]
    pub inject: Option<String>,

    /// Capture interface for incoming `ConfigPacket`s. Ignored in `--demo`
    /// mode.
    #[clap(long)]
    pub capture: Option<String>,

    /// Run against an in-process loopback radio pair instead of a real
    /// monitor-mode interface; exercises the full pipeline without root or
    /// hardware.
    #[clap(long)]
    pub demo: bool,

    /// Target radio channel (informational only: tuning the interface to
    /// this channel is outside this crate's scope, spec §6).
    #[clap(long, default_value_t = 11)]
    pub channel: u8,

    /// Initial FEC `k` (data frames per block).
    #[clap(long = "fec-k", default_value_t = 4)]
    pub fec_k: u8,

    /// Initial FEC `n` (data + parity frames per block).
    #[clap(long = "fec-n", default_value_t = 6)]
    pub fec_n: u8,

    /// Initial per-frame MTU in bytes.
    #[clap(long, default_value_t = fpv_radio::AIR2GROUND_MTU)]
    pub mtu: usize,

    /// Initial camera frame rate limit, 0 disables pacing.
    #[clap(long = "fps-limit", default_value_t = 30)]
    pub fps_limit: u8,

    /// Directory to record the raw JPEG byte stream into when
    /// `dvr_record` is toggled on; if omitted, DVR is disabled entirely.
    #[clap(long = "dvr-dir")]
    pub dvr_dir: Option<PathBuf>,

    /// Show more log messages (repeatable).
    #[clap(long, short, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Show less log messages (repeatable).
    #[clap(long, short, action = clap::ArgAction::Count)]
    pub quiet: u8,
}
