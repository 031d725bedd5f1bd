//! The ground-side pipeline: multi-radio capture to reassembled video
//! frames, and the periodic `ConfigPacket` uplink (spec §4.G, §4.H).

pub mod rx;
pub mod tx;

pub use rx::{GroundRx, LinkQuality, VideoFrame};
pub use tx::GroundTx;

use std::sync::Mutex;
use std::time::Duration;

/// Shared ping/pong round-trip bookkeeping between [`tx::GroundTx`] (which
/// stamps and sends `ping`) and [`rx::GroundRx`] (which observes the
/// matching `pong` and derives the round trip), mirroring the single shared
/// `last_sent_ping`/`last_ping_sent_tp` pair the original ground station
/// keeps in one thread (`original_source/gs/src/main.cpp`).
#[derive(Default)]
pub struct PingTracker {
    inner: Mutex<PingState>,
}

#[derive(Default, Clone, Copy)]
struct PingState {
    last_sent_ping: u8,
    last_sent_tx_us: u64,
    last_rtt_us: Option<u64>,
}

impl PingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called by `GroundTx` right after a `ConfigPacket` carrying
    /// `ping = current_ping()` goes out.
    fn record_sent(&self, now_us: u64) {
        let mut state = self.inner.lock().unwrap();
        state.last_sent_tx_us = now_us;
    }

    fn current_ping(&self) -> u8 {
        self.inner.lock().unwrap().last_sent_ping
    }

    /// Called by `GroundRx` when an incoming `VideoHeader::pong` matches the
    /// most recently sent `ping`: advances the ping nonce and records the
    /// half round-trip latency.
    fn observe_pong(&self, pong: u8, now_us: u64) {
        let mut state = self.inner.lock().unwrap();
        if pong == state.last_sent_ping {
            state.last_sent_ping = state.last_sent_ping.wrapping_add(1);
            state.last_rtt_us = Some(now_us.saturating_sub(state.last_sent_tx_us) / 2);
        }
    }

    pub fn last_rtt(&self) -> Option<Duration> {
        self.inner
            .lock()
            .unwrap()
            .last_rtt_us
            .map(Duration::from_micros)
    }
}
