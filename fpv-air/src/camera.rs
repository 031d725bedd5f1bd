//! A simulated JPEG camera sensor (spec.md §1: the real camera driver is an
//! external collaborator out of scope for this crate). Produces deterministic
//! JPEG-shaped byte spans — a `0xFFD8` SOI marker, a fill region sized to the
//! currently configured [`Resolution`], and a `0xFFD9` EOI marker — through
//! the same [`CameraSource`]/[`CameraController`] boundary a real sensor
//! driver would implement.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use fpv_core::air::{CameraController, CameraEvent, CameraSource};
use fpv_wire::control::CameraParams;
use fpv_wire::video::Resolution;

fn frame_len_for(resolution: Resolution) -> usize {
    match resolution {
        Resolution::Qvga => 6 * 1024,
        Resolution::Cif => 9 * 1024,
        Resolution::Hvga => 12 * 1024,
        Resolution::Vga => 20 * 1024,
        Resolution::Svga => 32 * 1024,
        Resolution::Xga => 48 * 1024,
        Resolution::Sxga => 72 * 1024,
        Resolution::Uxga => 100 * 1024,
    }
}

struct CameraState {
    params: CameraParams,
}

/// Owns the simulated sensor's current parameters, handed out as the two
/// narrow collaborator handles `AirTx`/`AirRx` expect: a [`CameraSource`]
/// that the capture-callback thread pumps, and a [`CameraController`] that
/// the control-dispatch thread reprograms through.
#[derive(Clone)]
pub struct SharedCamera(Arc<Mutex<CameraState>>);

impl SharedCamera {
    pub fn new(initial: CameraParams) -> Self {
        Self(Arc::new(Mutex::new(CameraState { params: initial })))
    }

    pub fn source(&self) -> SimulatedCameraSource {
        SimulatedCameraSource {
            state: self.0.clone(),
            frame_index: 0,
            started: false,
        }
    }

    pub fn controller(&self) -> SimulatedCameraController {
        SimulatedCameraController(self.0.clone())
    }
}

/// One camera DMA chunk stream: a single `FrameStart` followed by a single
/// full-frame `Chunk { last: true, .. }`, mirroring a sensor that hands the
/// whole JPEG to its DMA callback in one shot rather than many small bursts.
pub struct SimulatedCameraSource {
    state: Arc<Mutex<CameraState>>,
    frame_index: u32,
    started: bool,
}

impl SimulatedCameraSource {
    fn synthesize_frame(&self, resolution: Resolution, quality: u8) -> Vec<u8> {
        let len = frame_len_for(resolution);
        let mut bytes = Vec::with_capacity(len + 4);
        bytes.extend_from_slice(&[0xFF, 0xD8]); // SOI
        let fill = quality.wrapping_add(self.frame_index as u8);
        bytes.extend(std::iter::repeat(fill).take(len));
        bytes.extend_from_slice(&[0xFF, 0xD9]); // EOI
        bytes
    }
}

impl CameraSource for SimulatedCameraSource {
    fn next_event(&mut self) -> Option<CameraEvent> {
        if !self.started {
            self.started = true;
            return Some(CameraEvent::FrameStart);
        }
        self.started = false;

        let (resolution, quality) = {
            let state = self.state.lock().unwrap();
            (state.params.resolution, state.params.quality)
        };
        let frame = self.synthesize_frame(resolution, quality);
        self.frame_index = self.frame_index.wrapping_add(1);

        // Stands in for a sensor's fixed acquisition cadence; `AirTx`'s own
        // `fps_limit` pacing (spec §4.E) decides whether this frame is
        // actually sent.
        std::thread::sleep(Duration::from_millis(33));

        Some(CameraEvent::Chunk {
            count: frame.len(),
            data: frame,
            stride: 1,
            last: true,
        })
    }
}

pub struct SimulatedCameraController(Arc<Mutex<CameraState>>);

impl CameraController for SimulatedCameraController {
    fn apply(&mut self, params: &CameraParams) {
        self.0.lock().unwrap().params = *params;
    }
}
