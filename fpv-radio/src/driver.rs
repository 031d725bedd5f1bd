//! The radio injector/capture boundary: the 802.11 monitor/injection driver
//! itself is out of scope (spec §1, "external collaborators"), represented
//! here only by a trait, the way `dot15d4`'s MAC service is generic over
//! [`dot15d4::radio::driver::RadioDriver`](../../dot15d4/src/radio/driver.rs)
//! rather than owning a concrete radio. A `std`-only [`PcapRadio`]
//! (`pcap-capture` feature) and a deterministic in-memory [`LoopbackRadio`]
//! test double mirror that file's `RadioDriver` trait plus its `TestRadio`
//! double.

use std::time::Duration;

use crate::direction::IEEE80211_HEADER_LEN;
use crate::radiotap::{self, RadiotapInfo};

/// Trailing bytes every capture layer reports after the 802.11 payload:
/// FCS, which must be stripped before the payload is handed upstream (spec
/// §6).
pub const FCS_LEN: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum InjectError {
    #[error("radio driver rejected the frame: {0}")]
    Driver(String),
    #[error("peer is gone")]
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("radio driver capture failed: {0}")]
    Driver(String),
}

/// One captured 802.11 frame: its parsed radiotap fields plus the raw
/// 802.11 payload (radiotap capsule and trailing FCS already stripped).
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub radiotap: RadiotapInfo,
    pub payload: Vec<u8>,
}

/// Injects pre-built `[radiotap | ieee80211 | transport frame]` units onto
/// the air. Exactly one injection interface per side (spec §6: "the target
/// channel... and injection (=1)").
pub trait RadioInjector {
    fn inject(&mut self, frame: &[u8]) -> Result<(), InjectError>;
}

/// Captures raw 802.11 frames off one monitor-mode interface. The ground
/// side may hold several (spec §4.G, "any number of capture interfaces").
pub trait RadioCapture {
    /// Blocks up to `timeout` for the next frame, or returns `Ok(None)` on
    /// timeout with nothing received (spec §5: "finite timeouts... on RX
    /// select").
    fn capture(&mut self, timeout: Duration) -> Result<Option<CapturedFrame>, CaptureError>;

    fn interface_name(&self) -> &str;
}

/// Strips the radiotap capsule and trailing FCS from a raw captured buffer,
/// returning the parsed radiotap fields and the bare 802.11 payload.
pub fn split_captured(raw: &[u8]) -> Result<(RadiotapInfo, &[u8]), radiotap::Error> {
    let (info, it_len) = radiotap::parse(raw)?;
    let body = &raw[it_len..];
    let body = &body[..body.len().saturating_sub(FCS_LEN)];
    Ok((info, body))
}

/// A deterministic in-memory radio pair for tests: whatever one endpoint
/// injects, the other's next `capture` call returns, minus the loopback's
/// own radiotap parsing round-trip (so `RadioCapture`/`RadioInjector`
/// consumers can be exercised without a real NIC or root privileges).
pub struct LoopbackRadio {
    name: &'static str,
    inject_tx: std::sync::mpsc::Sender<Vec<u8>>,
    capture_rx: std::sync::mpsc::Receiver<Vec<u8>>,
}

impl LoopbackRadio {
    /// Creates a connected pair: frames injected on one side arrive as
    /// captures on the other.
    pub fn pair(side_a: &'static str, side_b: &'static str) -> (Self, Self) {
        let (a_tx, b_rx) = std::sync::mpsc::channel();
        let (b_tx, a_rx) = std::sync::mpsc::channel();
        (
            Self {
                name: side_a,
                inject_tx: a_tx,
                capture_rx: a_rx,
            },
            Self {
                name: side_b,
                inject_tx: b_tx,
                capture_rx: b_rx,
            },
        )
    }
}

impl RadioInjector for LoopbackRadio {
    fn inject(&mut self, frame: &[u8]) -> Result<(), InjectError> {
        self.inject_tx
            .send(frame.to_vec())
            .map_err(|_| InjectError::Closed)
    }
}

impl RadioCapture for LoopbackRadio {
    fn capture(&mut self, timeout: Duration) -> Result<Option<CapturedFrame>, CaptureError> {
        match self.capture_rx.recv_timeout(timeout) {
            Ok(raw) => {
                let (radiotap, payload) = split_captured(&raw).map_err(|e| CaptureError::Driver(e.to_string()))?;
                Ok(Some(CapturedFrame {
                    radiotap,
                    payload: payload.to_vec(),
                }))
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => Ok(None),
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                Err(CaptureError::Driver("peer dropped".into()))
            }
        }
    }

    fn interface_name(&self) -> &str {
        self.name
    }
}

/// A raw AF_PACKET monitor-mode capture/injection interface, backed by
/// `libpcap` — the same library the original firmware's ground station binds
/// directly (`original_source/gs/src/Comms.cpp`: `#include <pcap.h>`,
/// `pcap_next_ex`/`pcap_inject`).
#[cfg(feature = "pcap-capture")]
pub struct PcapRadio {
    cap: pcap::Capture<pcap::Active>,
    name: String,
}

#[cfg(feature = "pcap-capture")]
impl PcapRadio {
    /// Opens `interface` in monitor mode with the given read snaplen. Callers
    /// are expected to have already put the interface into monitor mode and
    /// tuned it to the target channel (spec §6: outside this crate's scope).
    pub fn open(interface: &str, snaplen: i32) -> Result<Self, pcap::Error> {
        let cap = pcap::Capture::from_device(interface)?
            .promisc(true)
            .snaplen(snaplen)
            .timeout(30) // spec §5: "30 ms on RX select"
            .immediate_mode(true)
            .open()?;
        Ok(Self {
            cap,
            name: interface.to_string(),
        })
    }
}

#[cfg(feature = "pcap-capture")]
impl RadioInjector for PcapRadio {
    fn inject(&mut self, frame: &[u8]) -> Result<(), InjectError> {
        self.cap
            .sendpacket(frame)
            .map_err(|e| InjectError::Driver(e.to_string()))
    }
}

#[cfg(feature = "pcap-capture")]
impl RadioCapture for PcapRadio {
    fn capture(&mut self, _timeout: Duration) -> Result<Option<CapturedFrame>, CaptureError> {
        // `_timeout` is nominal: the effective poll interval is the value
        // passed to `Capture::timeout` at `open` time, matching the pcap
        // API's one-shot-configured timeout model.
        match self.cap.next_packet() {
            Ok(packet) => {
                let (radiotap, payload) =
                    split_captured(packet.data).map_err(|e| CaptureError::Driver(e.to_string()))?;
                if payload.len() < IEEE80211_HEADER_LEN {
                    return Ok(None);
                }
                Ok(Some(CapturedFrame {
                    radiotap,
                    payload: payload.to_vec(),
                }))
            }
            Err(pcap::Error::TimeoutExpired) => Ok(None),
            Err(e) => Err(CaptureError::Driver(e.to_string())),
        }
    }

    fn interface_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direction::Direction;
    use crate::radiotap::build_tx;

    fn wire_frame(direction: Direction, payload: &[u8]) -> Vec<u8> {
        let mut frame = build_tx(None);
        frame.extend_from_slice(&direction.header_template());
        frame.extend_from_slice(payload);
        frame.extend_from_slice(&[0, 0, 0, 0]); // fake FCS
        frame
    }

    #[test]
    fn loopback_delivers_injected_frames_to_the_peer() {
        let (mut air, mut ground) = LoopbackRadio::pair("air0", "ground0");
        let frame = wire_frame(Direction::AirToGround, b"hello");
        air.inject(&frame).unwrap();

        let captured = ground
            .capture(Duration::from_millis(100))
            .unwrap()
            .expect("frame should arrive");
        assert_eq!(Direction::from_payload(&captured.payload), Some(Direction::AirToGround));
        assert_eq!(&captured.payload[IEEE80211_HEADER_LEN..], b"hello");
    }

    #[test]
    fn capture_times_out_when_nothing_arrives() {
        let (_air, mut ground) = LoopbackRadio::pair("air0", "ground0");
        assert!(ground.capture(Duration::from_millis(10)).unwrap().is_none());
    }

    #[test]
    fn fcs_is_stripped_from_the_payload() {
        let (mut air, mut ground) = LoopbackRadio::pair("air0", "ground0");
        air.inject(&wire_frame(Direction::GroundToAir, b"xyz")).unwrap();
        let captured = ground.capture(Duration::from_millis(100)).unwrap().unwrap();
        assert_eq!(&captured.payload[IEEE80211_HEADER_LEN..], b"xyz");
    }
}
