//! Command-line surface for the ground binary (spec §6: "The ground CLI
//! specifies interface names for capture (≥1) and injection (=1), the
//! target channel, initial FEC shape, and MTU").

use clap::Parser;

#[derive(Parser, Debug)]
#[clap(version, about = "Ground-side video receiver and control dispatcher")]
pub struct Args {
    /// Capture interfaces for incoming video (one or more; spec §6:
    /// "capture (≥1)"). Repeatable: `--capture wlan0 --capture wlan1`.
    /// Ignored in `--demo` mode.
    #[clap(long = "capture")]
    pub capture: Vec<String>,

    /// Injection interface for the outgoing config uplink (spec §6:
    /// "injection (=1)"). Ignored in `--demo` mode.
    #[clap(long)]
    pub inject: Option<String>,

    /// Run against an in-process loopback radio pair instead of real
    /// monitor-mode interfaces; exercises the full pipeline without root
    /// or hardware.
    #[clap(long)]
    pub demo: bool,

    /// Target radio channel (informational only, spec §6).
    #[clap(long, default_value_t = 11)]
    pub channel: u8,

    /// Initial video-channel FEC `k` (data frames per block).
    #[clap(long = "fec-k", default_value_t = 4)]
    pub fec_k: u8,

    /// Initial video-channel FEC `n` (data + parity frames per block).
    #[clap(long = "fec-n", default_value_t = 6)]
    pub fec_n: u8,

    /// Initial per-frame MTU in bytes for the video channel.
    #[clap(long, default_value_t = fpv_radio::AIR2GROUND_MTU)]
    pub mtu: usize,

    /// Show more log messages (repeatable).
    #[clap(long, short, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Show less log messages (repeatable).
    #[clap(long, short, action = clap::ArgAction::Count)]
    pub quiet: u8,
}
