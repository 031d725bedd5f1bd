//! Air transmit pipeline: camera byte callback → video packetizer → FEC
//! encoder (spec §4.E `AirTx`).
//!
//! Ported from `original_source/air_firmware/main/main.cpp`'s
//! `camera_data_available`/`send_air2ground_video_packet`. The camera driver
//! itself is out of scope (spec §1) and represented only by [`CameraSource`],
//! the way `dot15d4`'s MAC service is generic over
//! [`dot15d4::radio::driver::RadioDriver`](../../../dot15d4/src/radio/driver.rs)
//! rather than owning a concrete radio.

use fpv_fec::encoder::{self, EncodedSink, FecDescriptor, FecEncoder};
use fpv_wire::video::{Air2GroundType, Resolution, VideoHeader, VIDEO_HEADER_LEN};

use super::camera::{gather_strided, trim_to_jpeg_end};

/// One event the camera driver collaborator produces: either "a new frame is
/// starting" (`data == nullptr` in the original callback) or a strided chunk
/// of bytes belonging to the frame in progress.
pub enum CameraEvent {
    FrameStart,
    Chunk {
        data: Vec<u8>,
        stride: usize,
        count: usize,
        last: bool,
    },
}

/// The out-of-scope camera driver collaborator (spec §1).
pub trait CameraSource {
    fn next_event(&mut self) -> Option<CameraEvent>;
}

/// Sink for the raw bytes of each accepted (not skipped) camera chunk,
/// pushed to `ByteRing` A in the original (spec §4.E "DVR tap"). `None` when
/// `dvr_record` is currently off.
pub type DvrTap<'a> = Option<&'a mut dyn FnMut(&[u8])>;

/// Packetizes one camera's JPEG byte stream into FEC-protected `VideoPacket`s
/// (spec §4.E).
pub struct AirTx {
    encoder: FecEncoder,
    scratch: Vec<u8>,

    resolution: Resolution,
    pong: u8,

    frame_started: bool,
    skip_current_frame: bool,
    frame_index: u32,
    part_index: u8,
    frame_data_size: usize,

    target_dt_us: u64,
    last_acquired_tp_us: Option<u64>,
    last_sent_tp_us: u64,
}

impl AirTx {
    pub fn new(descriptor: FecDescriptor) -> Result<Self, encoder::Error> {
        let mtu = descriptor.mtu;
        Ok(Self {
            encoder: FecEncoder::new(descriptor)?,
            scratch: vec![0u8; mtu],
            resolution: Resolution::Vga,
            pong: 0,
            frame_started: false,
            skip_current_frame: false,
            frame_index: 0,
            part_index: 0,
            frame_data_size: 0,
            target_dt_us: 0,
            last_acquired_tp_us: None,
            last_sent_tp_us: 0,
        })
    }

    pub fn encoder_mut(&mut self) -> &mut FecEncoder {
        &mut self.encoder
    }

    /// Applied by `AirRx` on a `Config` packet's camera/FEC fields (spec
    /// §4.F).
    pub fn set_resolution(&mut self, resolution: Resolution) {
        self.resolution = resolution;
    }

    pub fn set_pong(&mut self, pong: u8) {
        self.pong = pong;
    }

    /// `target_frame_dt = 0` disables pacing (spec §4.E: "0 disables"); no
    /// special case is needed since an elapsed duration is never negative,
    /// so the skip condition below is then never true.
    pub fn set_fps_limit(&mut self, fps_limit: u8) {
        self.target_dt_us = if fps_limit == 0 {
            0
        } else {
            1_000_000 / fps_limit as u64
        };
    }

    pub fn reconfigure_fec(&mut self, descriptor: FecDescriptor) -> Result<(), encoder::Error> {
        self.encoder.reconfigure(descriptor)?;
        self.scratch.resize(descriptor.mtu, 0);
        Ok(())
    }

    /// Pulls and processes exactly one event from `source`. Returns `false`
    /// once the source is exhausted.
    pub fn pump(
        &mut self,
        source: &mut impl CameraSource,
        now_us: u64,
        sink: &mut impl EncodedSink,
        mut dvr: DvrTap<'_>,
    ) -> bool {
        match source.next_event() {
            None => false,
            Some(CameraEvent::FrameStart) => {
                self.on_frame_start();
                true
            }
            Some(CameraEvent::Chunk { data, stride, count, last }) => {
                self.on_chunk(now_us, &data, stride, count, last, sink, dvr.as_deref_mut());
                true
            }
        }
    }

    fn on_frame_start(&mut self) {
        self.frame_started = true;
    }

    /// Processes one strided camera chunk (spec §4.E). `dvr` receives a copy
    /// of every accepted (non-skipped) chunk's bytes.
    pub fn on_chunk(
        &mut self,
        now_us: u64,
        src: &[u8],
        stride: usize,
        mut count: usize,
        last: bool,
        sink: &mut impl EncodedSink,
        mut dvr: Option<&mut dyn FnMut(&[u8])>,
    ) {
        if !self.skip_current_frame {
            if last {
                count = trim_to_jpeg_end(src, stride, count);
            }

            let mut offset = 0usize;
            while count > 0 {
                let payload_size = self.encoder.descriptor().mtu - VIDEO_HEADER_LEN;
                if self.frame_data_size >= payload_size {
                    self.flush_video_packet(false, sink);
                    self.frame_data_size = 0;
                    self.part_index = self.part_index.wrapping_add(1);
                }

                let c = (payload_size - self.frame_data_size).min(count);
                if self.scratch.len() < c {
                    self.scratch.resize(c, 0);
                }
                let gathered = &mut self.scratch[..c];
                gather_strided(&src[offset * stride..], stride, c, gathered);

                {
                    let slot = self.encoder.reserve_packet();
                    let start = VIDEO_HEADER_LEN + self.frame_data_size;
                    slot[start..start + c].copy_from_slice(gathered);
                }
                self.encoder.advance_packet(c);

                if let Some(tap) = dvr.as_deref_mut() {
                    tap(gathered);
                }

                self.frame_data_size += c;
                count -= c;
                offset += c;
            }
        }

        if last && self.frame_started {
            self.frame_started = false;

            let acquire_dt = self
                .last_acquired_tp_us
                .map(|t| now_us.saturating_sub(t))
                .unwrap_or(0);
            self.last_acquired_tp_us = Some(now_us);

            let send_dt = now_us.saturating_sub(self.last_sent_tp_us);
            if send_dt < self.target_dt_us {
                self.skip_current_frame = true;
            } else {
                self.skip_current_frame = false;
                self.last_sent_tp_us += self.target_dt_us.max(acquire_dt);
            }

            if self.frame_data_size > 0 {
                self.flush_video_packet(true, sink);
            }
            self.frame_data_size = 0;
            self.frame_index = self.frame_index.wrapping_add(1);
            self.part_index = 0;
        }
    }

    fn flush_video_packet(&mut self, last_part: bool, sink: &mut impl EncodedSink) {
        let header = VideoHeader {
            packet_type: Air2GroundType::Video,
            total_size: (VIDEO_HEADER_LEN + self.frame_data_size) as u32,
            pong: self.pong,
            resolution: self.resolution,
            part_index: self.part_index,
            last_part,
            frame_index: self.frame_index,
        };
        let mut hdr_bytes = [0u8; VIDEO_HEADER_LEN];
        header.pack(&mut hdr_bytes);

        let slot = self.encoder.reserve_packet();
        slot[..VIDEO_HEADER_LEN].copy_from_slice(&hdr_bytes);
        self.encoder.advance_packet(VIDEO_HEADER_LEN);
        // `flush_packet` can only fail on the Reed-Solomon backend; a sealed
        // data frame never drives parity computation by itself (only the
        // k-th one does), so a parity failure here would be a configuration
        // bug surfaced earlier at `FecEncoder::new`/`reconfigure` time.
        let _ = self.encoder.flush_packet(sink);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fpv_wire::TransportHeader;

    struct Collector(Vec<Vec<u8>>);
    impl EncodedSink for Collector {
        fn on_encoded(&mut self, frame: &[u8]) {
            self.0.push(frame.to_vec());
        }
    }

    fn descriptor() -> FecDescriptor {
        FecDescriptor { k: 2, n: 4, mtu: 32 }
    }

    fn video_header_of(frame: &[u8]) -> VideoHeader {
        let body = &frame[6..];
        let mut bytes = [0u8; VIDEO_HEADER_LEN];
        bytes.copy_from_slice(&body[..VIDEO_HEADER_LEN]);
        VideoHeader::unpack(&bytes).unwrap()
    }

    /// Filters out parity frames (whose bytes are Reed-Solomon combinations,
    /// not a valid `VideoHeader`), keeping only sealed data frames in order.
    fn data_video_headers(sink: &Collector, k: u8) -> Vec<VideoHeader> {
        sink.0
            .iter()
            .filter(|f| TransportHeader::unpack(&f[..6].try_into().unwrap()).packet_index < k)
            .map(|f| video_header_of(f))
            .collect()
    }

    #[test]
    fn one_small_frame_produces_a_single_last_part() {
        let mut tx = AirTx::new(descriptor()).unwrap();
        let mut sink = Collector(Vec::new());
        tx.on_frame_start();
        tx.on_chunk(0, &[1, 2, 3, 4], 1, 4, true, &mut sink, None);

        // One data frame sealed (k=2 means parity waits for a second data
        // frame, which never comes in this single-frame test).
        assert_eq!(sink.0.len(), 1);
        let header = video_header_of(&sink.0[0]);
        assert!(header.last_part);
        assert_eq!(header.part_index, 0);
        assert_eq!(header.frame_index, 0);
    }

    #[test]
    fn a_full_slot_is_flushed_mid_frame_with_last_part_false() {
        // k=3 so a single frame's two data packets never complete the block
        // (which would also emit parity and complicate the assertion below).
        let wide = FecDescriptor { k: 3, n: 5, mtu: 32 };
        let mut tx = AirTx::new(wide).unwrap();
        let mut sink = Collector(Vec::new());
        let payload_size = wide.mtu - VIDEO_HEADER_LEN; // 19
        let big = vec![7u8; payload_size + 3];
        tx.on_frame_start();
        tx.on_chunk(0, &big, 1, big.len(), true, &mut sink, None);

        assert_eq!(sink.0.len(), 2);
        assert!(!video_header_of(&sink.0[0]).last_part);
        assert_eq!(video_header_of(&sink.0[0]).part_index, 0);
        assert!(video_header_of(&sink.0[1]).last_part);
        assert_eq!(video_header_of(&sink.0[1]).part_index, 1);
    }

    #[test]
    fn frame_index_advances_once_per_frame() {
        let mut tx = AirTx::new(descriptor()).unwrap();
        let mut sink = Collector(Vec::new());
        for _ in 0..3 {
            tx.on_frame_start();
            tx.on_chunk(0, &[1, 2], 1, 2, true, &mut sink, None);
        }
        let indices: Vec<u32> = data_video_headers(&sink, 2).iter().map(|h| h.frame_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn skipped_frame_produces_no_packets_but_pacing_still_advances() {
        // k=1 so every accepted video frame's single data packet immediately
        // completes its own block: one data frame delivered per accepted
        // video frame makes the "skip produced nothing" assertion exact.
        let narrow = FecDescriptor { k: 1, n: 2, mtu: 32 };
        let mut tx = AirTx::new(narrow).unwrap();
        tx.set_fps_limit(10); // target_dt = 100_000us
        let mut sink = Collector(Vec::new());

        tx.on_frame_start();
        tx.on_chunk(0, &[1, 2], 1, 2, true, &mut sink, None);
        assert_eq!(data_video_headers(&sink, 1).len(), 1);

        // Second frame arrives immediately: should be skipped.
        tx.on_frame_start();
        tx.on_chunk(100, &[3, 4], 1, 2, true, &mut sink, None);
        assert_eq!(
            data_video_headers(&sink, 1).len(),
            1,
            "skipped frame must not emit packets"
        );

        // Third frame, far enough later: should go through.
        tx.on_frame_start();
        tx.on_chunk(200_000, &[5, 6], 1, 2, true, &mut sink, None);
        assert_eq!(data_video_headers(&sink, 1).len(), 2);
    }

    #[test]
    fn zero_fps_limit_never_skips() {
        let narrow = FecDescriptor { k: 1, n: 2, mtu: 32 };
        let mut tx = AirTx::new(narrow).unwrap();
        tx.set_fps_limit(0);
        let mut sink = Collector(Vec::new());
        for t in [0u64, 1, 2, 3] {
            tx.on_frame_start();
            tx.on_chunk(t, &[9], 1, 1, true, &mut sink, None);
        }
        assert_eq!(data_video_headers(&sink, 1).len(), 4);
    }

    #[test]
    fn dvr_tap_receives_every_accepted_chunk() {
        let mut tx = AirTx::new(descriptor()).unwrap();
        let mut sink = Collector(Vec::new());
        let mut tapped = Vec::new();
        {
            let mut tap = |bytes: &[u8]| tapped.extend_from_slice(bytes);
            tx.on_frame_start();
            tx.on_chunk(0, &[1, 2, 3], 1, 3, true, &mut sink, Some(&mut tap));
        }
        assert_eq!(tapped, vec![1, 2, 3]);
    }

    #[test]
    fn block_index_and_transport_header_stay_consistent_across_frames() {
        let mut tx = AirTx::new(descriptor()).unwrap();
        let mut sink = Collector(Vec::new());
        let payload_size = descriptor().mtu - VIDEO_HEADER_LEN;
        for _ in 0..2 {
            tx.on_frame_start();
            let big = vec![1u8; payload_size + 1];
            tx.on_chunk(0, &big, 1, big.len(), true, &mut sink, None);
        }
        let blocks: Vec<u32> = sink
            .0
            .iter()
            .map(|f| TransportHeader::unpack(&f[..6].try_into().unwrap()).block_index)
            .collect();
        // Strictly non-decreasing; block completes (k=2) partway through.
        assert!(blocks.windows(2).all(|w| w[0] <= w[1]));
    }
}
