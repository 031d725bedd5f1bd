//! The stats snapshot spec §7 requires: one [`Counter`](fpv_util::stats::Counter)
//! per error category plus the byte/packet/frame totals, sampled once per
//! second (`original_source/gs/src/main.cpp`'s stats thread does the same on
//! the ground side; `air_firmware/main/main.cpp`'s `s_stats` struct is the
//! air-side counterpart).

use fpv_util::stats::{Counter, CounterSnapshot};

/// Every non-fatal counter named by spec §7's error table, plus the
/// traffic/frame totals spec §7 calls out explicitly.
#[derive(Default)]
pub struct Stats {
    pub bytes_sent: Counter,
    pub bytes_received: Counter,
    pub packets_dropped: Counter,
    pub video_frames: Counter,
    pub dvr_bytes: Counter,
    pub dvr_drops: Counter,

    pub malformed_wire_frame: Counter,
    pub fec_pool_exhaustion: Counter,
    pub fec_unrecoverable_block: Counter,
    pub reconfigurations: Counter,
    pub radio_inject_failure: Counter,
    pub dvr_write_error: Counter,
    pub config_field_invalid: Counter,
    pub watchdog_timeout: Counter,
}

/// A point-in-time copy of every [`Stats`] counter, the shape published once
/// per second (spec §7: "published to a stats snapshot sampled once per
/// second").
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub bytes_sent: CounterSnapshot,
    pub bytes_received: CounterSnapshot,
    pub packets_dropped: CounterSnapshot,
    pub video_frames: CounterSnapshot,
    pub dvr_bytes: CounterSnapshot,
    pub dvr_drops: CounterSnapshot,

    pub malformed_wire_frame: CounterSnapshot,
    pub fec_pool_exhaustion: CounterSnapshot,
    pub fec_unrecoverable_block: CounterSnapshot,
    pub reconfigurations: CounterSnapshot,
    pub radio_inject_failure: CounterSnapshot,
    pub dvr_write_error: CounterSnapshot,
    pub config_field_invalid: CounterSnapshot,
    pub watchdog_timeout: CounterSnapshot,
}

impl Stats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            bytes_sent: self.bytes_sent.snapshot(),
            bytes_received: self.bytes_received.snapshot(),
            packets_dropped: self.packets_dropped.snapshot(),
            video_frames: self.video_frames.snapshot(),
            dvr_bytes: self.dvr_bytes.snapshot(),
            dvr_drops: self.dvr_drops.snapshot(),
            malformed_wire_frame: self.malformed_wire_frame.snapshot(),
            fec_pool_exhaustion: self.fec_pool_exhaustion.snapshot(),
            fec_unrecoverable_block: self.fec_unrecoverable_block.snapshot(),
            reconfigurations: self.reconfigurations.snapshot(),
            radio_inject_failure: self.radio_inject_failure.snapshot(),
            dvr_write_error: self.dvr_write_error.snapshot(),
            config_field_invalid: self.config_field_invalid.snapshot(),
            watchdog_timeout: self.watchdog_timeout.snapshot(),
        }
    }
}
