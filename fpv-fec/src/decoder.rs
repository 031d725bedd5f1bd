//! Reassembles FEC-protected transport frames into an ordered payload
//! stream, delivering data as early as possible and recovering up to
//! `n - k` losses per block (spec §4.D `FecDecoder`).
//!
//! Ported from `original_source/components/common/fec_codec.cpp`'s decoder
//! task: two per-block lists of received packets (data, parity), an
//! early-delivery scan over the contiguous prefix, a completion check once
//! `k` data packets are in hand, and an `fec_decode` recovery path once
//! `data + parity >= k`. The literal firmware silently drops an abandoned
//! block's undelivered data; this decoder instead delivers whatever
//! contiguous-or-not data positions it already holds before discarding the
//! rest, matching the stronger delivery guarantee this transport's spec
//! calls for on forced abandonment.

use fpv_util::log::{debug, warn};
use fpv_wire::transport::BLOCK_INDEX_MODULUS;
use fpv_wire::{block_distance, TransportHeader, TRANSPORT_HEADER_LEN};

use crate::encoder::{Error, FecDescriptor, MAX_CODING_N};
use crate::gf::Codec;

/// How many blocks behind `current_block` a frame may be before it's
/// treated as a stale duplicate rather than a session restart. Ported
/// verbatim from `fec_codec.cpp`'s `block_index + 100 < crt_block_index`
/// (spec §9 open question on the 24-bit `block_index` wraparound).
pub const STALE_BLOCK_WINDOW: u32 = 100;

const HALF_MODULUS: u32 = BLOCK_INDEX_MODULUS / 2;

/// Why an incoming frame was not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// `packet_index >= n`.
    MalformedIndex,
    /// Frame too short to contain a header and its declared payload.
    Truncated,
    /// Old block, within the stale window: a harmless duplicate/straggler.
    StaleBlock,
    /// `packet_index` already seen for this block.
    Duplicate,
}

/// Receives decoded payloads in `(block_index, packet_index)` order.
pub trait DecodedSink {
    fn on_decoded(&mut self, payload: &[u8]);
}

enum Admission {
    Store,
    Drop(DropReason),
}

/// Reassembles the opposite-direction FEC frame stream.
///
/// One ingress task is expected to call [`FecDecoder::ingest_frame`]; the
/// FEC-recovery computation itself runs synchronously within that call
/// (spec §5: handing `on_decoded` off to a separate worker thread is a
/// concern of the layer above, as with [`crate::encoder::FecEncoder`]).
pub struct FecDecoder {
    descriptor: FecDescriptor,
    codec: Codec,
    current_block: u32,
    initialized: bool,

    data_present: Vec<bool>,
    data: Vec<Vec<u8>>,
    data_size: Vec<u16>,
    delivered: Vec<bool>,
    data_count: usize,

    parity_present: Vec<bool>,
    parity: Vec<Vec<u8>>,
    parity_count: usize,

    /// Index of the lowest not-yet-delivered data position; the
    /// contiguous-prefix cursor used for early delivery.
    deliver_cursor: usize,
}

impl FecDecoder {
    pub fn new(descriptor: FecDescriptor) -> Result<Self, Error> {
        descriptor.validate()?;
        let k = descriptor.k as usize;
        let n = descriptor.n as usize;
        let codec = Codec::new(k, n)?;
        Ok(Self {
            descriptor,
            codec,
            current_block: 0,
            initialized: false,
            data_present: vec![false; k],
            data: vec![vec![0u8; descriptor.mtu]; k],
            data_size: vec![0u16; k],
            delivered: vec![false; k],
            data_count: 0,
            parity_present: vec![false; n - k],
            parity: vec![vec![0u8; descriptor.mtu]; n - k],
            parity_count: 0,
            deliver_cursor: 0,
        })
    }

    pub fn descriptor(&self) -> FecDescriptor {
        self.descriptor
    }

    pub fn current_block(&self) -> u32 {
        self.current_block
    }

    /// Re-initializes with a new shape, abandoning the in-flight block
    /// without attempting recovery (spec §7, "Reconfiguration of in-flight
    /// session").
    pub fn reconfigure(&mut self, descriptor: FecDescriptor) -> Result<(), Error> {
        descriptor.validate()?;
        let k = descriptor.k as usize;
        let n = descriptor.n as usize;
        let codec = Codec::new(k, n)?;
        self.descriptor = descriptor;
        self.codec = codec;
        self.data_present = vec![false; k];
        self.data = vec![vec![0u8; descriptor.mtu]; k];
        self.data_size = vec![0u16; k];
        self.delivered = vec![false; k];
        self.data_count = 0;
        self.parity_present = vec![false; n - k];
        self.parity = vec![vec![0u8; descriptor.mtu]; n - k];
        self.parity_count = 0;
        self.deliver_cursor = 0;
        Ok(())
    }

    /// Feeds one complete, already-delimited transport frame (6-byte header
    /// followed by its payload) into the decoder.
    pub fn ingest_frame(&mut self, frame: &[u8], sink: &mut impl DecodedSink) -> Result<(), DropReason> {
        if frame.len() < TRANSPORT_HEADER_LEN {
            return Err(DropReason::Truncated);
        }
        let mut hdr_bytes = [0u8; TRANSPORT_HEADER_LEN];
        hdr_bytes.copy_from_slice(&frame[..TRANSPORT_HEADER_LEN]);
        let header = TransportHeader::unpack(&hdr_bytes);
        let payload = &frame[TRANSPORT_HEADER_LEN..];

        if header.packet_index as usize >= self.descriptor.n as usize || header.packet_index >= MAX_CODING_N {
            return Err(DropReason::MalformedIndex);
        }
        if payload.len() < self.descriptor.mtu {
            return Err(DropReason::Truncated);
        }

        match self.admit(header.block_index, sink) {
            Admission::Drop(reason) => return Err(reason),
            Admission::Store => {}
        }

        let k = self.descriptor.k as usize;
        let packet_index = header.packet_index as usize;
        if packet_index < k {
            if self.data_present[packet_index] {
                return Err(DropReason::Duplicate);
            }
            self.data[packet_index][..self.descriptor.mtu]
                .copy_from_slice(&payload[..self.descriptor.mtu]);
            self.data_size[packet_index] = header.size;
            self.data_present[packet_index] = true;
            self.data_count += 1;
        } else {
            let pidx = packet_index - k;
            if self.parity_present[pidx] {
                return Err(DropReason::Duplicate);
            }
            self.parity[pidx][..self.descriptor.mtu].copy_from_slice(&payload[..self.descriptor.mtu]);
            self.parity_present[pidx] = true;
            self.parity_count += 1;
        }

        self.deliver_early(sink);

        if self.deliver_cursor == k {
            self.advance_block();
        } else if self.data_count + self.parity_count >= k {
            self.try_recover(sink);
            self.advance_block();
        }

        Ok(())
    }

    /// Decides whether an incoming frame for `block_index` belongs to the
    /// block currently being assembled, starts a new one (abandoning the
    /// old one, delivering what can still be delivered), or should be
    /// dropped outright. Uses the forward `block_distance` rather than a
    /// plain `<`/`>` comparison so the 24-bit `block_index` counter wraps
    /// correctly (spec §9 open question).
    fn admit(&mut self, block_index: u32, sink: &mut impl DecodedSink) -> Admission {
        if !self.initialized {
            self.initialized = true;
            self.current_block = block_index;
            return Admission::Store;
        }
        if block_index == self.current_block {
            return Admission::Store;
        }

        let forward = block_distance(self.current_block, block_index);
        if forward < HALF_MODULUS {
            // `block_index` is ahead of us: abandon the in-progress block
            // (deliver whatever can still be salvaged), adopt the new one.
            self.force_flush_current(sink);
            self.reset_block(block_index);
            return Admission::Store;
        }

        let backward = BLOCK_INDEX_MODULUS - forward;
        if backward <= STALE_BLOCK_WINDOW {
            debug!("dropping stale block {} ({} behind current {})", block_index, backward, self.current_block);
            Admission::Drop(DropReason::StaleBlock)
        } else {
            // Far enough in the past to be a new session rather than a
            // straggler; restart decoding from here.
            warn!("block {} is {} behind current {}, restarting session", block_index, backward, self.current_block);
            self.reset_block(block_index);
            Admission::Store
        }
    }

    /// Delivers the contiguous run of not-yet-delivered data positions
    /// starting at `deliver_cursor` (spec §4.D emission policy step 1).
    fn deliver_early(&mut self, sink: &mut impl DecodedSink) {
        let k = self.descriptor.k as usize;
        while self.deliver_cursor < k
            && self.data_present[self.deliver_cursor]
            && !self.delivered[self.deliver_cursor]
        {
            let i = self.deliver_cursor;
            let size = self.data_size[i] as usize;
            sink.on_decoded(&self.data[i][..size]);
            self.delivered[i] = true;
            self.deliver_cursor += 1;
        }
    }

    /// Attempts Reed-Solomon recovery of the missing data positions and
    /// delivers every not-yet-delivered data position in order (spec §4.D
    /// emission policy step 3). A failed reconstruction (fewer than `k`
    /// shards in total, which should not happen given the caller only
    /// reaches here once `data_count + parity_count >= k`) leaves the block
    /// untouched; the caller advances past it regardless.
    fn try_recover(&mut self, sink: &mut impl DecodedSink) {
        let k = self.descriptor.k as usize;
        let n = self.descriptor.n as usize;

        let mut shards: Vec<Option<Vec<u8>>> = Vec::with_capacity(n);
        for i in 0..k {
            shards.push(self.data_present[i].then(|| self.data[i].clone()));
        }
        for i in 0..(n - k) {
            shards.push(self.parity_present[i].then(|| self.parity[i].clone()));
        }

        if self.codec.reconstruct(&mut shards).is_err() {
            warn!("block {} unrecoverable: {} data + {} parity < k", self.current_block, self.data_count, self.parity_count);
            return;
        }
        debug!("block {} recovered {} missing data positions", self.current_block, k - self.data_count);

        for i in 0..k {
            if !self.delivered[i] {
                let recovered = shards[i].take().unwrap_or_else(|| self.data[i].clone());
                // A position the decoder had to reconstruct carries the
                // full `mtu` length: the transport header's `size` field is
                // not itself FEC-coded, so a lost data frame's true size is
                // unrecoverable and the firmware falls back to `mtu`
                // (`fec_codec.cpp`, `fec_decoded_packets[...].size = mtu`).
                let size = if self.data_present[i] {
                    self.data_size[i] as usize
                } else {
                    self.descriptor.mtu
                };
                sink.on_decoded(&recovered[..size]);
                self.delivered[i] = true;
            }
        }
        self.deliver_cursor = k;
    }

    /// Abandons the in-progress block, delivering whatever can still be
    /// salvaged (a last-chance FEC recovery if enough shards are in hand,
    /// otherwise whatever already-held data positions remain with gaps
    /// left as gaps and nothing synthesized), before the caller resets for
    /// the block about to take its place.
    fn force_flush_current(&mut self, sink: &mut impl DecodedSink) {
        let k = self.descriptor.k as usize;
        if self.data_count + self.parity_count >= k {
            self.try_recover(sink);
        } else {
            self.deliver_held(sink);
        }
    }

    fn deliver_held(&mut self, sink: &mut impl DecodedSink) {
        let k = self.descriptor.k as usize;
        for i in 0..k {
            if self.data_present[i] && !self.delivered[i] {
                let size = self.data_size[i] as usize;
                sink.on_decoded(&self.data[i][..size]);
                self.delivered[i] = true;
            }
        }
    }

    fn advance_block(&mut self) {
        self.reset_block((self.current_block + 1) % BLOCK_INDEX_MODULUS);
    }

    fn reset_block(&mut self, new_block_index: u32) {
        self.current_block = new_block_index;
        self.data_present.iter_mut().for_each(|p| *p = false);
        self.data_size.iter_mut().for_each(|s| *s = 0);
        self.delivered.iter_mut().for_each(|d| *d = false);
        self.parity_present.iter_mut().for_each(|p| *p = false);
        self.data_count = 0;
        self.parity_count = 0;
        self.deliver_cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Collector(Vec<Vec<u8>>);
    impl DecodedSink for Collector {
        fn on_decoded(&mut self, payload: &[u8]) {
            self.0.push(payload.to_vec());
        }
    }

    fn descriptor() -> FecDescriptor {
        FecDescriptor { k: 2, n: 4, mtu: 4 }
    }

    fn frame(block: u32, index: u8, payload: &[u8], mtu: usize) -> Vec<u8> {
        let mut padded = payload.to_vec();
        padded.resize(mtu, 0);
        let header = TransportHeader {
            block_index: block,
            packet_index: index,
            size: payload.len() as u16,
        };
        let mut out = vec![0u8; TRANSPORT_HEADER_LEN];
        header.pack((&mut out[..]).try_into().unwrap());
        out.extend_from_slice(&padded);
        out
    }

    #[test]
    fn in_order_data_delivers_immediately() {
        let mut dec = FecDecoder::new(descriptor()).unwrap();
        let mut sink = Collector(Vec::new());
        dec.ingest_frame(&frame(0, 0, b"aaaa", 4), &mut sink).unwrap();
        assert_eq!(sink.0, vec![b"aaaa".to_vec()]);
        dec.ingest_frame(&frame(0, 1, b"bbbb", 4), &mut sink).unwrap();
        assert_eq!(sink.0, vec![b"aaaa".to_vec(), b"bbbb".to_vec()]);
        assert_eq!(dec.current_block(), 1);
    }

    #[test]
    fn out_of_order_data_waits_for_the_gap() {
        let mut dec = FecDecoder::new(descriptor()).unwrap();
        let mut sink = Collector(Vec::new());
        dec.ingest_frame(&frame(0, 1, b"bbbb", 4), &mut sink).unwrap();
        assert!(sink.0.is_empty());
        dec.ingest_frame(&frame(0, 0, b"aaaa", 4), &mut sink).unwrap();
        assert_eq!(sink.0, vec![b"aaaa".to_vec(), b"bbbb".to_vec()]);
    }

    #[test]
    fn duplicate_packet_is_dropped() {
        let mut dec = FecDecoder::new(descriptor()).unwrap();
        let mut sink = Collector(Vec::new());
        dec.ingest_frame(&frame(0, 0, b"aaaa", 4), &mut sink).unwrap();
        let err = dec.ingest_frame(&frame(0, 0, b"aaaa", 4), &mut sink).unwrap_err();
        assert_eq!(err, DropReason::Duplicate);
    }

    #[test]
    fn malformed_packet_index_is_dropped() {
        let mut dec = FecDecoder::new(descriptor()).unwrap();
        let mut sink = Collector(Vec::new());
        let err = dec.ingest_frame(&frame(0, 9, b"aaaa", 4), &mut sink).unwrap_err();
        assert_eq!(err, DropReason::MalformedIndex);
    }

    #[test]
    fn fec_recovery_reconstructs_missing_data() {
        use crate::encoder::{EncodedSink, FecEncoder};

        struct Frames(Vec<Vec<u8>>);
        impl EncodedSink for Frames {
            fn on_encoded(&mut self, frame: &[u8]) {
                self.0.push(frame.to_vec());
            }
        }

        let mut enc = FecEncoder::new(descriptor()).unwrap();
        let mut frames = Frames(Vec::new());
        enc.encode_stream(b"aaaabbbb", &mut frames).unwrap();
        assert_eq!(frames.0.len(), 4); // 2 data + 2 parity

        let mut dec = FecDecoder::new(descriptor()).unwrap();
        let mut sink = Collector(Vec::new());
        // Drop packet 0 (data); packet 1 (data) plus one parity frame is
        // exactly k=2 shards, enough to reconstruct position 0.
        dec.ingest_frame(&frames.0[1], &mut sink).unwrap();
        assert!(sink.0.is_empty()); // waiting on position 0
        dec.ingest_frame(&frames.0[2], &mut sink).unwrap();
        assert_eq!(sink.0, vec![b"aaaa".to_vec(), b"bbbb".to_vec()]);
    }

    #[test]
    fn stale_block_within_window_is_dropped() {
        let mut dec = FecDecoder::new(descriptor()).unwrap();
        let mut sink = Collector(Vec::new());
        dec.ingest_frame(&frame(50, 0, b"aaaa", 4), &mut sink).unwrap();
        dec.ingest_frame(&frame(50, 1, b"bbbb", 4), &mut sink).unwrap();
        assert_eq!(dec.current_block(), 51);
        let err = dec.ingest_frame(&frame(10, 0, b"cccc", 4), &mut sink).unwrap_err();
        assert_eq!(err, DropReason::StaleBlock);
    }

    #[test]
    fn very_old_block_restarts_the_session() {
        let mut dec = FecDecoder::new(descriptor()).unwrap();
        let mut sink = Collector(Vec::new());
        dec.ingest_frame(&frame(500, 0, b"aaaa", 4), &mut sink).unwrap();
        // 500 - 200 = 300 blocks back, far beyond the stale window.
        dec.ingest_frame(&frame(200, 0, b"zzzz", 4), &mut sink).unwrap();
        assert_eq!(dec.current_block(), 200);
        assert_eq!(sink.0.last().unwrap(), b"zzzz");
    }

    #[test]
    fn forced_abandonment_delivers_held_positions_with_gaps() {
        let mut dec = FecDecoder::new(descriptor()).unwrap();
        let mut sink = Collector(Vec::new());
        // Position 0 never arrives; position 1 does, but completion/recovery
        // can't happen (no parity seen) before block 1 shows up.
        dec.ingest_frame(&frame(0, 1, b"bbbb", 4), &mut sink).unwrap();
        assert!(sink.0.is_empty());
        dec.ingest_frame(&frame(1, 0, b"cccc", 4), &mut sink).unwrap();
        // Position 1 of block 0 is salvaged despite position 0 being lost.
        assert_eq!(sink.0, vec![b"bbbb".to_vec(), b"cccc".to_vec()]);
        assert_eq!(dec.current_block(), 1);
    }

    #[test]
    fn block_index_wraps_at_24_bits() {
        let mut dec = FecDecoder::new(descriptor()).unwrap();
        let mut sink = Collector(Vec::new());
        let near_wrap = BLOCK_INDEX_MODULUS - 1;
        dec.ingest_frame(&frame(near_wrap, 0, b"aaaa", 4), &mut sink).unwrap();
        dec.ingest_frame(&frame(near_wrap, 1, b"bbbb", 4), &mut sink).unwrap();
        assert_eq!(dec.current_block(), 0);
        dec.ingest_frame(&frame(0, 0, b"cccc", 4), &mut sink).unwrap();
        assert_eq!(sink.0.last().unwrap(), b"cccc");
    }
}
