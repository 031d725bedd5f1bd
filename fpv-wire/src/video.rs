//! Air-to-ground `VideoPacket` header (spec §3), carried inside the FEC
//! payload stream, one or more per JPEG frame.

use crate::crc::crc8;

/// Size in bytes of a [`VideoHeader`] once packed (`Air2Ground_Video_Packet`
/// in the original firmware is asserted to be exactly 13 bytes).
pub const VIDEO_HEADER_LEN: usize = 13;

/// The closed set of camera resolutions the reference firmware supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Resolution {
    Qvga = 0, // 320x240
    Cif = 1,  // 400x296
    Hvga = 2, // 480x320
    Vga = 3,  // 640x480
    Svga = 4, // 800x600
    Xga = 5,  // 1024x768
    Sxga = 6, // 1280x1024
    Uxga = 7, // 1600x1200
}

impl Resolution {
    pub const fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Qvga,
            1 => Self::Cif,
            2 => Self::Hvga,
            3 => Self::Vga,
            4 => Self::Svga,
            5 => Self::Xga,
            6 => Self::Sxga,
            7 => Self::Uxga,
            _ => return None,
        })
    }
}

/// Discriminates the two air-to-ground payload kinds (spec §9, "Tagged
/// variants"). `Telemetry` is declared for forward compatibility but carries
/// no interpreted fields yet (see SPEC_FULL.md §3 supplement).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Air2GroundType {
    Video = 0,
    Telemetry = 1,
}

impl Air2GroundType {
    pub const fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Video,
            1 => Self::Telemetry,
            _ => return None,
        })
    }
}

/// `{ type, total_size:32, pong:8, crc:8, resolution:8, part_index:7,
/// last_part:1, frame_index:32 }`, little-endian packed, 13 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoHeader {
    pub packet_type: Air2GroundType,
    /// Header length plus payload bytes carried in this part.
    pub total_size: u32,
    /// Echoes the most recently observed ground `ping` nonce.
    pub pong: u8,
    pub resolution: Resolution,
    /// 0-based index of this part within `frame_index`.
    pub part_index: u8,
    /// Set on exactly one part per frame: the last one.
    pub last_part: bool,
    pub frame_index: u32,
}

impl VideoHeader {
    /// Packs the header and returns the CRC-8 computed with the CRC field
    /// zeroed, as spec §3 requires.
    pub fn pack(&self, out: &mut [u8; VIDEO_HEADER_LEN]) -> u8 {
        out[0] = self.packet_type as u8;
        out[1..5].copy_from_slice(&self.total_size.to_le_bytes());
        out[5] = self.pong;
        out[6] = 0; // crc field, filled in below
        out[7] = self.resolution as u8;
        debug_assert!(self.part_index < 0x80);
        out[8] = (self.part_index & 0x7f) | ((self.last_part as u8) << 7);
        out[9..13].copy_from_slice(&self.frame_index.to_le_bytes());

        let crc = crc8(0, out);
        out[6] = crc;
        crc
    }

    /// Unpacks and validates the header's CRC. Returns `None` on CRC mismatch
    /// or an unrecognized `type` (spec §4.F: "reject if crc8(...) != crc").
    pub fn unpack(bytes: &[u8; VIDEO_HEADER_LEN]) -> Option<Self> {
        let mut zeroed = *bytes;
        let received_crc = zeroed[6];
        zeroed[6] = 0;
        if crc8(0, &zeroed) != received_crc {
            return None;
        }

        let packet_type = Air2GroundType::from_u8(bytes[0])?;
        let total_size = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        let pong = bytes[5];
        let resolution = Resolution::from_u8(bytes[7])?;
        let part_index = bytes[8] & 0x7f;
        let last_part = bytes[8] & 0x80 != 0;
        let frame_index = u32::from_le_bytes([bytes[9], bytes[10], bytes[11], bytes[12]]);

        Some(Self {
            packet_type,
            total_size,
            pong,
            resolution,
            part_index,
            last_part,
            frame_index,
        })
    }
}
