//! Radiotap header construction (TX) and parsing (RX), limited to the
//! fields spec §6 names: `rate`, `channel`, `channel_flags`, `dbm_antsignal`,
//! `flags` (with `FCS_AT_END` and the bad-FCS bit).
//!
//! Ported from `original_source/gs/src/Comms.cpp`'s `prepare_radiotap_header`
//! (TX: `TX_FLAGS`/`NO_ACK`, `DATA_RETRIES=0`, optional `MCS`) and its
//! `Penumbra_Radiotap_Header` RX struct (channel, channel_flags, rate,
//! `input_dBm`, flags) — the original gets these pre-extracted from a C
//! radiotap-parsing library; here the present-bitmap walk is done by hand,
//! following the field table from the (stable, widely mirrored)
//! `ieee80211_radiotap.h` layout, the way `dot15d4-frame` hand-parses its own
//! bitflagged wire headers with the `bitflags` crate.

use bitflags::bitflags;

/// Fixed 8-byte `struct ieee80211_radiotap_header` prefix (version, pad,
/// `it_len`, `it_present`), present on every radiotap capsule.
pub const RADIOTAP_FIXED_LEN: usize = 8;

bitflags! {
    /// Bit positions in the `it_present` bitmap this crate understands.
    /// Only a single (non-extended) present word is supported: bit 31
    /// ("more present words follow") is not handled, matching the fixed
    /// single-word header the original firmware emits.
    struct PresentBit: u32 {
        const TSFT               = 1 << 0;
        const FLAGS               = 1 << 1;
        const RATE                = 1 << 2;
        const CHANNEL             = 1 << 3;
        const FHSS                = 1 << 4;
        const DBM_ANTSIGNAL       = 1 << 5;
        const DBM_ANTNOISE        = 1 << 6;
        const LOCK_QUALITY        = 1 << 7;
        const TX_ATTENUATION      = 1 << 8;
        const DB_TX_ATTENUATION   = 1 << 9;
        const DBM_TX_POWER        = 1 << 10;
        const ANTENNA             = 1 << 11;
        const DB_ANTSIGNAL        = 1 << 12;
        const DB_ANTNOISE         = 1 << 13;
        const RX_FLAGS            = 1 << 14;
        const TX_FLAGS            = 1 << 15;
        const DATA_RETRIES        = 1 << 17;
        const MCS                 = 1 << 19;
        const EXT                 = 1 << 31;
    }
}

bitflags! {
    /// The `flags` radiotap field (spec §6: "`FCS_AT_END` and the bad-FCS bit").
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RadiotapFlags: u8 {
        const FCS_AT_END = 1 << 4;
        const BAD_FCS    = 1 << 6;
    }
}

/// `IEEE80211_RADIOTAP_F_TX_NOACK`: request no link-layer ACK for injected
/// frames (this transport has no retransmission, spec §1 Non-goals).
const TX_FLAGS_NOACK: u16 = 0x0008;

/// The subset of a received radiotap capsule's fields this transport reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RadiotapInfo {
    pub rate: Option<u8>,
    pub channel_freq_mhz: Option<u16>,
    pub channel_flags: Option<u16>,
    pub dbm_antsignal: Option<i8>,
    pub flags: Option<RadiotapFlags>,
}

impl RadiotapInfo {
    /// Whether this frame should be dropped per spec §6 ("Bad-FCS frames
    /// are dropped").
    pub fn bad_fcs(&self) -> bool {
        self.flags
            .is_some_and(|f| f.contains(RadiotapFlags::BAD_FCS))
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("radiotap capsule shorter than the fixed 8-byte header")]
    Truncated,
    #[error("radiotap capsule declares a length beyond the buffer")]
    BadLength,
    #[error("radiotap present bitmap uses an extended present word (unsupported)")]
    ExtendedPresent,
}

/// Parses the leading radiotap capsule of `buf`, returning the extracted
/// fields and the byte offset of the 802.11 header that follows it
/// (`it_len`).
pub fn parse(buf: &[u8]) -> Result<(RadiotapInfo, usize), Error> {
    if buf.len() < RADIOTAP_FIXED_LEN {
        return Err(Error::Truncated);
    }
    let it_len = u16::from_le_bytes([buf[2], buf[3]]) as usize;
    if it_len > buf.len() || it_len < RADIOTAP_FIXED_LEN {
        return Err(Error::BadLength);
    }
    let present = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
    if present & PresentBit::EXT.bits() != 0 {
        return Err(Error::ExtendedPresent);
    }

    let mut info = RadiotapInfo::default();
    let mut off = RADIOTAP_FIXED_LEN;

    macro_rules! align {
        ($width:expr) => {{
            let rem = off % $width;
            if rem != 0 {
                off += $width - rem;
            }
        }};
    }
    macro_rules! take {
        ($width:expr) => {{
            if off + $width > it_len {
                break;
            }
            let slice = &buf[off..off + $width];
            off += $width;
            slice
        }};
    }

    // Field order is fixed by the bit position in `it_present`, independent
    // of which bits are actually set.
    'fields: for bit in 0..31u32 {
        let flag = PresentBit::from_bits_truncate(1 << bit);
        if present & (1 << bit) == 0 {
            continue;
        }
        match flag {
            f if f == PresentBit::TSFT => {
                align!(8);
                let _ = take!(8);
            }
            f if f == PresentBit::FLAGS => {
                let s = take!(1);
                info.flags = Some(RadiotapFlags::from_bits_truncate(s[0]));
            }
            f if f == PresentBit::RATE => {
                let s = take!(1);
                info.rate = Some(s[0]);
            }
            f if f == PresentBit::CHANNEL => {
                align!(2);
                let s = take!(4);
                info.channel_freq_mhz = Some(u16::from_le_bytes([s[0], s[1]]));
                info.channel_flags = Some(u16::from_le_bytes([s[2], s[3]]));
            }
            f if f == PresentBit::FHSS => {
                let _ = take!(2);
            }
            f if f == PresentBit::DBM_ANTSIGNAL => {
                let s = take!(1);
                info.dbm_antsignal = Some(s[0] as i8);
            }
            f if f == PresentBit::DBM_ANTNOISE => {
                let _ = take!(1);
            }
            f if f == PresentBit::LOCK_QUALITY => {
                align!(2);
                let _ = take!(2);
            }
            f if f == PresentBit::TX_ATTENUATION => {
                align!(2);
                let _ = take!(2);
            }
            f if f == PresentBit::DB_TX_ATTENUATION => {
                align!(2);
                let _ = take!(2);
            }
            f if f == PresentBit::DBM_TX_POWER => {
                let _ = take!(1);
            }
            f if f == PresentBit::ANTENNA => {
                let _ = take!(1);
            }
            f if f == PresentBit::DB_ANTSIGNAL => {
                let _ = take!(1);
            }
            f if f == PresentBit::DB_ANTNOISE => {
                let _ = take!(1);
            }
            f if f == PresentBit::RX_FLAGS => {
                align!(2);
                let _ = take!(2);
            }
            _ => break 'fields, // unrecognized/unsupported bit: stop walking
        }
    }

    Ok((info, it_len))
}

/// Builds a TX radiotap capsule matching the original firmware's ground
/// transmit path: `TX_FLAGS = NO_ACK`, `DATA_RETRIES = 0`, and an optional
/// MCS triple (`known`, `flags`, `mcs_index`) when `mcs` is `Some`.
pub fn build_tx(mcs: Option<u8>) -> Vec<u8> {
    let mut present = PresentBit::TX_FLAGS | PresentBit::DATA_RETRIES;
    if mcs.is_some() {
        present |= PresentBit::MCS;
    }

    let mut body = Vec::new();
    body.extend_from_slice(&TX_FLAGS_NOACK.to_le_bytes());
    body.push(0); // data retries
    if let Some(index) = mcs {
        const MCS_HAVE_MCS: u8 = 1 << 2;
        body.push(MCS_HAVE_MCS);
        body.push(0);
        body.push(index);
    }

    let it_len = (RADIOTAP_FIXED_LEN + body.len()) as u16;
    let mut out = Vec::with_capacity(it_len as usize);
    out.push(0); // it_version
    out.push(0); // pad
    out.extend_from_slice(&it_len.to_le_bytes());
    out.extend_from_slice(&present.bits().to_le_bytes());
    out.extend_from_slice(&body);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_header_carries_no_ack_and_zero_retries() {
        let hdr = build_tx(None);
        let (info, it_len) = parse(&hdr).unwrap();
        assert_eq!(it_len, hdr.len());
        // flags/rate/channel/rssi are not part of the TX capsule.
        assert_eq!(info.flags, None);
    }

    #[test]
    fn tx_header_with_mcs_round_trips_length() {
        let hdr = build_tx(Some(3));
        assert_eq!(hdr.len(), RADIOTAP_FIXED_LEN + 2 + 3);
        let (_, it_len) = parse(&hdr).unwrap();
        assert_eq!(it_len, hdr.len());
    }

    #[test]
    fn parses_flags_rate_channel_and_rssi() {
        // version(1) pad(1) it_len(2) it_present(4) flags(1) rate(1) pad(1) channel(4) rssi(1)
        let present = PresentBit::FLAGS | PresentBit::RATE | PresentBit::CHANNEL | PresentBit::DBM_ANTSIGNAL;
        let mut buf = vec![0u8, 0u8];
        buf.extend_from_slice(&0u16.to_le_bytes()); // it_len placeholder
        buf.extend_from_slice(&present.bits().to_le_bytes());
        buf.push(RadiotapFlags::FCS_AT_END.bits()); // flags
        buf.push(12); // rate: 6 Mbps (500kbps units)
        buf.push(0); // align pad for channel (u16)
        buf.extend_from_slice(&2412u16.to_le_bytes()); // channel freq
        buf.extend_from_slice(&0u16.to_le_bytes()); // channel flags
        buf.push((-55i8) as u8); // dbm_antsignal
        let len = buf.len() as u16;
        buf[2..4].copy_from_slice(&len.to_le_bytes());

        let (info, it_len) = parse(&buf).unwrap();
        assert_eq!(it_len, buf.len());
        assert_eq!(info.rate, Some(12));
        assert_eq!(info.channel_freq_mhz, Some(2412));
        assert_eq!(info.channel_flags, Some(0));
        assert_eq!(info.dbm_antsignal, Some(-55));
        assert_eq!(info.flags, Some(RadiotapFlags::FCS_AT_END));
        assert!(!info.bad_fcs());
    }

    #[test]
    fn bad_fcs_bit_is_reported() {
        let mut info = RadiotapInfo::default();
        info.flags = Some(RadiotapFlags::FCS_AT_END | RadiotapFlags::BAD_FCS);
        assert!(info.bad_fcs());
    }

    #[test]
    fn truncated_capsule_is_rejected() {
        assert_eq!(parse(&[0u8; 4]), Err(Error::Truncated));
    }
}
