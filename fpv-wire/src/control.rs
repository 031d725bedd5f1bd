//! Ground-to-air `ConfigPacket` (spec §3) and its wire-level sibling, the
//! (currently empty) `Data` packet. Both share the same 6-byte header.

use crate::crc::crc8;
use crate::video::Resolution;

/// Maximum size in bytes any ground-to-air packet may occupy on the wire
/// (`GROUND2AIR_DATA_MAX_SIZE` in the original firmware).
pub const GROUND2AIR_MAX_SIZE: usize = 64;

/// `{ type:8, size:32, crc:8 }`, little-endian packed, 6 bytes.
pub const GROUND2AIR_HEADER_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Ground2AirType {
    Data = 0,
    Config = 1,
}

impl Ground2AirType {
    pub const fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Data,
            1 => Self::Config,
            _ => return None,
        })
    }
}

/// The closed, 30-entry Wi-Fi rate table of spec §6. Kept here (rather than in
/// `fpv-radio`) because it is a field of [`ConfigPacket`] serialized on the
/// wire; `fpv-radio::rate` re-exports it next to the driver-facing code that
/// applies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WifiRate {
    B2MCck = 0,
    B2MCckShort = 1,
    B5_5MCck = 2,
    B5_5MCckShort = 3,
    B11MCck = 4,
    B11MCckShort = 5,
    G6MOfdm = 6,
    G9MOfdm = 7,
    G12MOfdm = 8,
    G18MOfdm = 9,
    G24MOfdm = 10,
    G36MOfdm = 11,
    G48MOfdm = 12,
    G54MOfdm = 13,
    N6_5MMcs0 = 14,
    N7_2MMcs0Short = 15,
    N13MMcs1 = 16,
    N14_4MMcs1Short = 17,
    N19_5MMcs2 = 18,
    N21_7MMcs2Short = 19,
    N26MMcs3 = 20,
    N28_9MMcs3Short = 21,
    N39MMcs4 = 22,
    N43_3MMcs4Short = 23,
    N52MMcs5 = 24,
    N57_8MMcs5Short = 25,
    N58MMcs6 = 26,
    N65MMcs6Short = 27,
    N65MMcs7 = 28,
    N72MMcs7Short = 29,
}

/// Total number of entries in the [`WifiRate`] table (spec §6).
pub const WIFI_RATE_COUNT: u8 = 30;

impl WifiRate {
    pub const fn from_u8(value: u8) -> Option<Self> {
        use WifiRate::*;
        Some(match value {
            0 => B2MCck,
            1 => B2MCckShort,
            2 => B5_5MCck,
            3 => B5_5MCckShort,
            4 => B11MCck,
            5 => B11MCckShort,
            6 => G6MOfdm,
            7 => G9MOfdm,
            8 => G12MOfdm,
            9 => G18MOfdm,
            10 => G24MOfdm,
            11 => G36MOfdm,
            12 => G48MOfdm,
            13 => G54MOfdm,
            14 => N6_5MMcs0,
            15 => N7_2MMcs0Short,
            16 => N13MMcs1,
            17 => N14_4MMcs1Short,
            18 => N19_5MMcs2,
            19 => N21_7MMcs2Short,
            20 => N26MMcs3,
            21 => N28_9MMcs3Short,
            22 => N39MMcs4,
            23 => N43_3MMcs4Short,
            24 => N52MMcs5,
            25 => N57_8MMcs5Short,
            26 => N58MMcs6,
            27 => N65MMcs6Short,
            28 => N65MMcs7,
            29 => N72MMcs7Short,
            _ => return None,
        })
    }
}

/// Camera tuning parameters pushed from the ground (spec §3). Field ranges
/// are documented per the original firmware's `Ground2Air_Config_Packet`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraParams {
    pub resolution: Resolution,
    pub fps_limit: u8,
    /// 0-63.
    pub quality: u8,
    /// -2..=2
    pub brightness: i8,
    /// -2..=2
    pub contrast: i8,
    /// -2..=2
    pub saturation: i8,
    /// -1..=6
    pub sharpness: i8,
    pub denoise: u8,
    /// 0-6
    pub special_effect: u8,
    pub awb: bool,
    pub awb_gain: bool,
    /// 0-4
    pub wb_mode: u8,
    pub aec: bool,
    pub aec2: bool,
    /// -2..=2
    pub ae_level: i8,
    /// 0-1200
    pub aec_value: u16,
    pub agc: bool,
    /// 0-30
    pub agc_gain: u8,
    /// 0-6
    pub gainceiling: u8,
    pub bpc: bool,
    pub wpc: bool,
    pub raw_gma: bool,
    pub lenc: bool,
    pub hmirror: bool,
    pub vflip: bool,
    pub dcw: bool,
}

/// Packed size of [`CameraParams`] (26 fields, 27 bytes: 25 single-byte
/// fields plus the 2-byte `aec_value`).
pub const CAMERA_PARAMS_LEN: usize = 27;

impl CameraParams {
    fn pack(&self, out: &mut [u8]) {
        out[0] = self.resolution as u8;
        out[1] = self.fps_limit;
        out[2] = self.quality;
        out[3] = self.brightness as u8;
        out[4] = self.contrast as u8;
        out[5] = self.saturation as u8;
        out[6] = self.sharpness as u8;
        out[7] = self.denoise;
        out[8] = self.special_effect;
        out[9] = self.awb as u8;
        out[10] = self.awb_gain as u8;
        out[11] = self.wb_mode;
        out[12] = self.aec as u8;
        out[13] = self.aec2 as u8;
        out[14] = self.ae_level as u8;
        out[15..17].copy_from_slice(&self.aec_value.to_le_bytes());
        out[17] = self.agc as u8;
        out[18] = self.agc_gain;
        out[19] = self.gainceiling;
        out[20] = self.bpc as u8;
        out[21] = self.wpc as u8;
        out[22] = self.raw_gma as u8;
        out[23] = self.lenc as u8;
        out[24] = self.hmirror as u8;
        out[25] = self.vflip as u8;
        out[26] = self.dcw as u8;
    }

    fn unpack(bytes: &[u8]) -> Option<Self> {
        Some(Self {
            resolution: Resolution::from_u8(bytes[0])?,
            fps_limit: bytes[1],
            quality: bytes[2],
            brightness: bytes[3] as i8,
            contrast: bytes[4] as i8,
            saturation: bytes[5] as i8,
            sharpness: bytes[6] as i8,
            denoise: bytes[7],
            special_effect: bytes[8],
            awb: bytes[9] != 0,
            awb_gain: bytes[10] != 0,
            wb_mode: bytes[11],
            aec: bytes[12] != 0,
            aec2: bytes[13] != 0,
            ae_level: bytes[14] as i8,
            aec_value: u16::from_le_bytes([bytes[15], bytes[16]]),
            agc: bytes[17] != 0,
            agc_gain: bytes[18],
            gainceiling: bytes[19],
            bpc: bytes[20] != 0,
            wpc: bytes[21] != 0,
            raw_gma: bytes[22] != 0,
            lenc: bytes[23] != 0,
            hmirror: bytes[24] != 0,
            vflip: bytes[25] != 0,
            dcw: bytes[26] != 0,
        })
    }
}

impl Default for CameraParams {
    fn default() -> Self {
        Self {
            resolution: Resolution::Vga,
            fps_limit: 30,
            quality: 8,
            brightness: 0,
            contrast: 0,
            saturation: 0,
            sharpness: -1,
            denoise: 0,
            special_effect: 0,
            awb: true,
            awb_gain: true,
            wb_mode: 0,
            aec: true,
            aec2: true,
            ae_level: 0,
            aec_value: 0,
            agc: true,
            agc_gain: 0,
            gainceiling: 0,
            bpc: true,
            wpc: true,
            raw_gma: false,
            lenc: true,
            hmirror: false,
            vflip: false,
            dcw: true,
        }
    }
}

/// Fixed-size body of a [`Ground2AirType::Config`] packet, excluding the
/// shared 6-byte header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigPacket {
    /// Nonce echoed by the air side as `VideoHeader::pong`.
    pub ping: u8,
    /// dBm, valid range 2..=20.
    pub wifi_power_dbm: i8,
    pub wifi_rate: WifiRate,
    pub fec_k: u8,
    pub fec_n: u8,
    pub fec_mtu: u16,
    pub dvr_record: bool,
    pub camera: CameraParams,
}

/// Packed size of the [`ConfigPacket`] body (without the shared header).
pub const CONFIG_BODY_LEN: usize = 1 + 1 + 1 + 1 + 1 + 2 + 1 + CAMERA_PARAMS_LEN;

/// Packed size of a full `ConfigPacket` on the wire (header + body), always
/// `<= GROUND2AIR_MAX_SIZE` per spec §3.
pub const CONFIG_PACKET_LEN: usize = GROUND2AIR_HEADER_LEN + CONFIG_BODY_LEN;

const _: () = assert!(CONFIG_PACKET_LEN <= GROUND2AIR_MAX_SIZE);

impl ConfigPacket {
    /// Packs header + body into `out` and returns the CRC-8 written into the
    /// header (computed with the CRC field zeroed, spec §4.I).
    pub fn pack(&self, out: &mut [u8; CONFIG_PACKET_LEN]) -> u8 {
        out[0] = Ground2AirType::Config as u8;
        out[1..5].copy_from_slice(&(CONFIG_PACKET_LEN as u32).to_le_bytes());
        out[5] = 0; // crc, filled below

        let body = &mut out[GROUND2AIR_HEADER_LEN..];
        body[0] = self.ping;
        body[1] = self.wifi_power_dbm as u8;
        body[2] = self.wifi_rate as u8;
        body[3] = self.fec_k;
        body[4] = self.fec_n;
        body[5..7].copy_from_slice(&self.fec_mtu.to_le_bytes());
        body[7] = self.dvr_record as u8;
        self.camera.pack(&mut body[8..8 + CAMERA_PARAMS_LEN]);

        let crc = crc8(0, out);
        out[5] = crc;
        crc
    }

    /// Unpacks and validates a `ConfigPacket`. Returns `None` if the `type`
    /// byte is not `Config`, the declared `size` does not match, or the CRC
    /// does not match (spec §4.F admission rules).
    pub fn unpack(bytes: &[u8; CONFIG_PACKET_LEN]) -> Option<Self> {
        if Ground2AirType::from_u8(bytes[0])? != Ground2AirType::Config {
            return None;
        }
        let size = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        if size as usize > bytes.len() {
            return None;
        }

        let mut zeroed = *bytes;
        let received_crc = zeroed[5];
        zeroed[5] = 0;
        if crc8(0, &zeroed[..size as usize]) != received_crc {
            return None;
        }

        let body = &bytes[GROUND2AIR_HEADER_LEN..];
        Some(Self {
            ping: body[0],
            wifi_power_dbm: body[1] as i8,
            wifi_rate: WifiRate::from_u8(body[2])?,
            fec_k: body[3],
            fec_n: body[4],
            fec_mtu: u16::from_le_bytes([body[5], body[6]]),
            dvr_record: body[7] != 0,
            camera: CameraParams::unpack(&body[8..8 + CAMERA_PARAMS_LEN])?,
        })
    }
}

impl Default for ConfigPacket {
    fn default() -> Self {
        Self {
            ping: 0,
            wifi_power_dbm: 20,
            wifi_rate: WifiRate::G18MOfdm,
            fec_k: 2,
            fec_n: 3,
            fec_mtu: 1024,
            dvr_record: false,
            camera: CameraParams::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_round_trip() {
        let packet = ConfigPacket::default();
        let mut bytes = [0u8; CONFIG_PACKET_LEN];
        packet.pack(&mut bytes);
        assert_eq!(ConfigPacket::unpack(&bytes), Some(packet));
    }

    #[test]
    fn corrupted_body_fails_crc() {
        let packet = ConfigPacket::default();
        let mut bytes = [0u8; CONFIG_PACKET_LEN];
        packet.pack(&mut bytes);
        bytes[GROUND2AIR_HEADER_LEN] ^= 0xff;
        assert_eq!(ConfigPacket::unpack(&bytes), None);
    }

    #[test]
    fn wrong_type_is_rejected() {
        let packet = ConfigPacket::default();
        let mut bytes = [0u8; CONFIG_PACKET_LEN];
        packet.pack(&mut bytes);
        bytes[0] = Ground2AirType::Data as u8;
        assert_eq!(ConfigPacket::unpack(&bytes), None);
    }

    #[test]
    fn fits_in_wire_budget() {
        assert!(CONFIG_PACKET_LEN <= GROUND2AIR_MAX_SIZE);
    }
}
