//! 802.11 monitor/injection wire framing: the direction discriminator and
//! IEEE header templates, radiotap construction/parsing, the Wi-Fi rate
//! table's driver-facing codes, and the radio injector/capture trait
//! boundary (spec §6, "EXTERNAL INTERFACES").
//!
//! Unlike `fpv-wire`/`fpv-fec`, this crate is `std`-only: both the ground
//! binary's `libpcap` capture and the air binary's simulated radio
//! (SPEC_FULL.md §5) run on `std::thread`, and radiotap/pcap parsing is not
//! meaningfully `no_std`.

pub mod direction;
pub mod driver;
pub mod radiotap;
pub mod rate;

pub use direction::{Direction, AIR2GROUND_MTU, IEEE80211_HEADER_LEN};
pub use driver::{CapturedFrame, RadioCapture, RadioInjector};
pub use radiotap::{RadiotapFlags, RadiotapInfo};
pub use rate::{NotSupported, RateSetter, WifiRate};

#[cfg(feature = "pcap-capture")]
pub use driver::PcapRadio;
pub use driver::LoopbackRadio;
