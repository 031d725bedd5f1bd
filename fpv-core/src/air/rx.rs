//! Air receive pipeline: FEC-decoded bytes in, `ConfigPacket` dispatch out
//! (spec §4.F `AirRx`).
//!
//! Ported from `original_source/air_firmware/main/main.cpp`'s
//! `comms_data_available`/`apply_config_packet`: validate the outer header,
//! then diff the incoming `CameraParams`/FEC/radio fields against the ones
//! currently applied and fire only the side effects that actually changed.

use fpv_fec::encoder::FecDescriptor;
use fpv_radio::rate::RateSetter;
use fpv_wire::control::{CameraParams, ConfigPacket, CONFIG_PACKET_LEN};

use super::tx::AirTx;

/// The camera sensor reprogramming side effect (spec §1: the camera driver
/// is an external collaborator; this is the narrow boundary `AirRx` calls
/// into when `CameraParams` change).
pub trait CameraController {
    fn apply(&mut self, params: &CameraParams);
}

/// Tracks the last applied `ConfigPacket` and dispatches only the fields
/// that changed into their respective side effects, per spec §4.F.
pub struct AirRx {
    current: ConfigPacket,
    last_ping_seen: u8,
}

impl AirRx {
    /// `initial` is the configuration already in effect (typically
    /// `ConfigPacket::default()` applied once at startup).
    pub fn new(initial: ConfigPacket) -> Self {
        Self {
            current: initial,
            last_ping_seen: initial.ping,
        }
    }

    pub fn current(&self) -> &ConfigPacket {
        &self.current
    }

    /// Validates and applies one incoming control-channel payload (spec
    /// §4.F: "reject if `size > payload`, reject if crc mismatch"; those
    /// checks live in [`ConfigPacket::unpack`] itself). Returns the pong
    /// nonce `AirTx` should now echo, or `None` if the payload was dropped.
    pub fn ingest(
        &mut self,
        payload: &[u8],
        tx: &mut AirTx,
        radio: &mut impl RateSetter,
        camera: &mut impl CameraController,
        dvr_record: &mut bool,
    ) -> Option<u8> {
        if payload.len() < CONFIG_PACKET_LEN {
            return None;
        }
        let mut bytes = [0u8; CONFIG_PACKET_LEN];
        bytes.copy_from_slice(&payload[..CONFIG_PACKET_LEN]);
        let incoming = ConfigPacket::unpack(&bytes)?;

        self.apply(&incoming, tx, radio, camera, dvr_record);
        self.last_ping_seen = incoming.ping;
        Some(incoming.ping)
    }

    fn apply(
        &mut self,
        incoming: &ConfigPacket,
        tx: &mut AirTx,
        radio: &mut impl RateSetter,
        camera: &mut impl CameraController,
        dvr_record: &mut bool,
    ) {
        let prior = self.current;

        if incoming.fec_k != prior.fec_k || incoming.fec_n != prior.fec_n || incoming.fec_mtu != prior.fec_mtu {
            let descriptor = FecDescriptor {
                k: incoming.fec_k,
                n: incoming.fec_n,
                mtu: incoming.fec_mtu as usize,
            };
            let _ = tx.reconfigure_fec(descriptor);
        }

        if incoming.wifi_rate != prior.wifi_rate {
            // Spec §6: "failure is fatal and halts"; that decision belongs
            // to the caller driving the runtime loop, so the error is
            // surfaced rather than swallowed here.
            let _ = radio.set_rate(incoming.wifi_rate);
        }

        if incoming.camera != prior.camera {
            camera.apply(&incoming.camera);
            tx.set_resolution(incoming.camera.resolution);
            if incoming.camera.fps_limit != prior.camera.fps_limit {
                tx.set_fps_limit(incoming.camera.fps_limit);
            }
        }

        if incoming.dvr_record != prior.dvr_record {
            *dvr_record = incoming.dvr_record;
        }

        tx.set_pong(incoming.ping);
        self.current = *incoming;
    }
}
