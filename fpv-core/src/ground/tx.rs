//! Ground transmit pipeline: periodic `ConfigPacket` uplink (spec §4.H).
//!
//! Ported from `original_source/gs/src/main.cpp`'s `comms_thread_proc`: a
//! 500 ms period gate, stamping the shared `ping` nonce before each send and
//! recording the send timestamp for [`super::PingTracker`] to derive a
//! round trip from, through a (ground-configured, `k=2, n=6` by default)
//! FEC encoder for robustness of the tiny command channel.

use fpv_fec::encoder::{EncodedSink, FecDescriptor, FecEncoder};
use fpv_wire::control::ConfigPacket;

use super::PingTracker;

/// Default FEC shape for the control channel (spec §4.H: "typically
/// `k=2, n=6`").
pub const DEFAULT_CONFIG_DESCRIPTOR: FecDescriptor = FecDescriptor { k: 2, n: 6, mtu: 64 };

/// Minimum interval between unsolicited `ConfigPacket` sends (spec §4.H,
/// §5: "every 500 ms").
pub const CONFIG_PERIOD_US: u64 = 500_000;

/// Periodically (and on every parameter change) re-emits the current
/// `ConfigPacket` through its own FEC-protected channel.
pub struct GroundTx {
    encoder: FecEncoder,
    current: ConfigPacket,
    last_sent_us: u64,
}

impl GroundTx {
    pub fn new(descriptor: FecDescriptor, initial: ConfigPacket) -> Result<Self, fpv_fec::encoder::Error> {
        Ok(Self {
            encoder: FecEncoder::new(descriptor)?,
            current: initial,
            last_sent_us: 0,
        })
    }

    pub fn current(&self) -> &ConfigPacket {
        &self.current
    }

    /// Applied by the UI/CLI layer when the operator changes a parameter;
    /// the next [`GroundTx::tick`] call will send it immediately regardless
    /// of the period gate.
    pub fn set_config(&mut self, config: ConfigPacket) {
        self.current = config;
        self.last_sent_us = 0;
    }

    /// Called on every pass of the ground TX loop. Sends the current
    /// `ConfigPacket` (stamped with `ping_tracker`'s current nonce) through
    /// `sink` if at least [`CONFIG_PERIOD_US`] has elapsed since the last
    /// send, or if [`GroundTx::set_config`] forced an immediate resend.
    pub fn tick(&mut self, now_us: u64, ping_tracker: &PingTracker, sink: &mut impl EncodedSink) {
        if now_us.saturating_sub(self.last_sent_us) < CONFIG_PERIOD_US {
            return;
        }

        let mut packet = self.current;
        packet.ping = ping_tracker.current_ping();

        let mut bytes = [0u8; fpv_wire::control::CONFIG_PACKET_LEN];
        packet.pack(&mut bytes);
        let _ = self.encoder.encode_stream(&bytes, sink);
        // `ConfigPacket` is shorter than `mtu`, so `encode_stream` alone never
        // fills the slot; seal it now rather than let it linger and get
        // padded out with the next tick's bytes.
        let _ = self.encoder.flush_packet(sink);

        self.last_sent_us = now_us;
        ping_tracker.record_sent(now_us);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Collector(Vec<Vec<u8>>);
    impl EncodedSink for Collector {
        fn on_encoded(&mut self, frame: &[u8]) {
            self.0.push(frame.to_vec());
        }
    }

    #[test]
    fn first_tick_always_sends() {
        let mut tx = GroundTx::new(DEFAULT_CONFIG_DESCRIPTOR, ConfigPacket::default()).unwrap();
        let ping = PingTracker::new();
        let mut sink = Collector(Vec::new());
        tx.tick(0, &ping, &mut sink);
        assert!(!sink.0.is_empty());
    }

    #[test]
    fn a_second_tick_before_the_period_elapses_is_suppressed() {
        let mut tx = GroundTx::new(DEFAULT_CONFIG_DESCRIPTOR, ConfigPacket::default()).unwrap();
        let ping = PingTracker::new();
        let mut sink = Collector(Vec::new());
        tx.tick(0, &ping, &mut sink);
        let after_first = sink.0.len();
        tx.tick(100, &ping, &mut sink);
        assert_eq!(sink.0.len(), after_first);
    }

    #[test]
    fn a_tick_past_the_period_sends_again() {
        let mut tx = GroundTx::new(DEFAULT_CONFIG_DESCRIPTOR, ConfigPacket::default()).unwrap();
        let ping = PingTracker::new();
        let mut sink = Collector(Vec::new());
        tx.tick(0, &ping, &mut sink);
        let after_first = sink.0.len();
        tx.tick(CONFIG_PERIOD_US, &ping, &mut sink);
        assert!(sink.0.len() > after_first);
    }

    #[test]
    fn set_config_forces_an_immediate_resend() {
        let mut tx = GroundTx::new(DEFAULT_CONFIG_DESCRIPTOR, ConfigPacket::default()).unwrap();
        let ping = PingTracker::new();
        let mut sink = Collector(Vec::new());
        tx.tick(0, &ping, &mut sink);
        let after_first = sink.0.len();

        let mut changed = ConfigPacket::default();
        changed.wifi_power_dbm = 10;
        tx.set_config(changed);
        tx.tick(1, &ping, &mut sink);
        assert!(sink.0.len() > after_first);
    }

    #[test]
    fn outgoing_ping_reflects_the_tracker_nonce() {
        let mut tx = GroundTx::new(DEFAULT_CONFIG_DESCRIPTOR, ConfigPacket::default()).unwrap();
        let ping = PingTracker::new();
        ping.record_sent(0);
        ping.observe_pong(0, 10); // advances tracker's nonce to 1
        let mut sink = Collector(Vec::new());
        tx.tick(0, &ping, &mut sink);
        assert_eq!(tx.current().ping, 0); // `current` isn't mutated, only the wire copy is

        let first_frame = &sink.0[0];
        let hdr = fpv_wire::TransportHeader::unpack(&first_frame[..6].try_into().unwrap());
        assert_eq!(hdr.block_index, 0);
    }
}
