//! End-to-end `FecEncoder`/`FecDecoder` scenarios, wired together the way
//! `AirTx`/`GroundRx` wire them in production: every sealed transport frame
//! from the encoder is handed straight to the decoder, with individual
//! frames dropped or reordered per scenario.

use fpv_fec::decoder::{DropReason, FecDecoder};
use fpv_fec::encoder::{EncodedSink, FecDescriptor, FecEncoder};
use fpv_wire::{TransportHeader, TRANSPORT_HEADER_LEN};

struct Frames(Vec<Vec<u8>>);

impl EncodedSink for Frames {
    fn on_encoded(&mut self, frame: &[u8]) {
        self.0.push(frame.to_vec());
    }
}

struct Delivered(Vec<Vec<u8>>);

impl fpv_fec::decoder::DecodedSink for Delivered {
    fn on_decoded(&mut self, payload: &[u8]) {
        self.0.push(payload.to_vec());
    }
}

impl Delivered {
    fn concat(&self) -> Vec<u8> {
        self.0.iter().flat_map(|p| p.iter().copied()).collect()
    }
}

fn header_of(frame: &[u8]) -> TransportHeader {
    TransportHeader::unpack(&frame[..TRANSPORT_HEADER_LEN].try_into().unwrap())
}

fn sequential_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 256) as u8).collect()
}

fn default_shape() -> FecDescriptor {
    FecDescriptor { k: 4, n: 6, mtu: 1024 }
}

/// Scenario 1: clean delivery, `k=4, n=6, mtu=1024`, 8 KiB with no losses.
#[test]
fn clean_delivery() {
    let shape = default_shape();
    let payload = sequential_bytes(8 * 1024);

    let mut enc = FecEncoder::new(shape).unwrap();
    let mut frames = Frames(Vec::new());
    enc.encode_stream(&payload, &mut frames).unwrap();
    assert_eq!(frames.0.len(), 12, "2 blocks x (4 data + 2 parity)");

    let mut dec = FecDecoder::new(shape).unwrap();
    let mut delivered = Delivered(Vec::new());
    for frame in &frames.0 {
        // Early delivery can finish a block (and advance past it) before
        // that block's own parity frames arrive; those then land as a
        // harmless stale-block drop rather than an error worth failing on.
        let _ = dec.ingest_frame(frame, &mut delivered);
    }

    assert_eq!(delivered.concat(), payload);
    assert_eq!(delivered.0.len(), 8, "8 data positions, no duplicates");
}

/// Scenario 2: parity recovery. Same shape; drop `(block=0, packet=1)` and
/// `(block=0, packet=2)` — 2 losses, within the `n - k = 2` budget.
#[test]
fn parity_recovery_within_budget() {
    let shape = default_shape();
    let payload = sequential_bytes(8 * 1024);

    let mut enc = FecEncoder::new(shape).unwrap();
    let mut frames = Frames(Vec::new());
    enc.encode_stream(&payload, &mut frames).unwrap();

    let mut dec = FecDecoder::new(shape).unwrap();
    let mut delivered = Delivered(Vec::new());
    for frame in &frames.0 {
        let header = header_of(frame);
        if header.block_index == 0 && (header.packet_index == 1 || header.packet_index == 2) {
            continue;
        }
        let _ = dec.ingest_frame(frame, &mut delivered);
    }

    // Every byte still arrives, including the two reconstructed positions;
    // the decoder has no public recovery tally, so correctness of the
    // reassembled stream is what stands in for "2 recoveries" here.
    assert_eq!(delivered.concat(), payload);
    assert_eq!(delivered.0.len(), 8);
}

/// Scenario 3: unrecoverable loss. Drop `(0,0)`, `(0,1)`, `(0,2)` — 3 losses
/// against a budget of 2. Block 0 positions 0-2 are skipped, position 3 is
/// still delivered, and block 1 proceeds intact.
#[test]
fn unrecoverable_loss_skips_then_continues() {
    let shape = default_shape();
    let block0 = sequential_bytes(4 * 1024);
    let block1 = sequential_bytes(4 * 1024).into_iter().map(|b| b.wrapping_add(1)).collect::<Vec<u8>>();

    let mut enc = FecEncoder::new(shape).unwrap();
    let mut frames = Frames(Vec::new());
    enc.encode_stream(&block0, &mut frames).unwrap();
    enc.encode_stream(&block1, &mut frames).unwrap();
    assert_eq!(frames.0.len(), 12);

    let mut dec = FecDecoder::new(shape).unwrap();
    let mut delivered = Delivered(Vec::new());
    for frame in &frames.0 {
        let header = header_of(frame);
        if header.block_index == 0 && header.packet_index <= 2 {
            continue;
        }
        let _ = dec.ingest_frame(frame, &mut delivered);
    }

    // Only block 0's position 3 survives (1024 bytes), then block 1's four
    // positions arrive intact and in order.
    assert_eq!(delivered.0.len(), 1 + 4);
    assert_eq!(delivered.0[0], block0[3 * 1024..]);
    assert_eq!(delivered.0[1..].concat(), block1);
}

/// Scenario 4: duplicate frame. Sending `(0,0)` twice yields exactly one
/// delivery of position 0.
#[test]
fn duplicate_frame_delivered_once() {
    let shape = default_shape();
    let payload = sequential_bytes(4 * 1024);

    let mut enc = FecEncoder::new(shape).unwrap();
    let mut frames = Frames(Vec::new());
    enc.encode_stream(&payload, &mut frames).unwrap();

    let mut dec = FecDecoder::new(shape).unwrap();
    let mut delivered = Delivered(Vec::new());
    dec.ingest_frame(&frames.0[0], &mut delivered).unwrap();
    let err = dec.ingest_frame(&frames.0[0], &mut delivered).unwrap_err();
    assert_eq!(err, DropReason::Duplicate);

    assert_eq!(delivered.0.len(), 1);
    assert_eq!(delivered.0[0], payload[..1024]);
}

/// Scenario 5: reorder across blocks. Block 0's last data frame never
/// arrives before block 1 starts; its arrived prefix is delivered early,
/// the trailing gap is left as a gap on forced abandonment, and block 1
/// then delivers in order with no cross-block reordering.
#[test]
fn reorder_across_blocks_flushes_prefix_and_continues() {
    let shape = default_shape();
    let block0 = sequential_bytes(4 * 1024);
    let block1 = sequential_bytes(4 * 1024).into_iter().map(|b| b.wrapping_add(7)).collect::<Vec<u8>>();

    let mut enc = FecEncoder::new(shape).unwrap();
    let mut frames = Frames(Vec::new());
    enc.encode_stream(&block0, &mut frames).unwrap();
    enc.encode_stream(&block1, &mut frames).unwrap();

    let mut dec = FecDecoder::new(shape).unwrap();
    let mut delivered = Delivered(Vec::new());

    // Block 0's positions 0-2 only (early delivery as each arrives); no
    // parity, position 3 withheld.
    for frame in frames.0.iter().take(12).filter(|f| {
        let h = header_of(f);
        h.block_index == 0 && h.packet_index < 3
    }) {
        dec.ingest_frame(frame, &mut delivered).unwrap();
    }
    assert_eq!(delivered.0.len(), 3, "positions 0-2 already delivered early");

    // Block 1's first frame arrives next, forcing abandonment of block 0
    // (position 3 can't be recovered: no parity in hand, so it's left a
    // gap) and is itself admitted and early-delivered as block 1 begins.
    let block1_first = frames.0.iter().find(|f| header_of(f).block_index == 1 && header_of(f).packet_index == 0).unwrap();
    dec.ingest_frame(block1_first, &mut delivered).unwrap();
    assert_eq!(delivered.0.len(), 4, "block 0's position 3 never arrives and is never delivered");
    assert_eq!(dec.current_block(), 1);

    for frame in frames.0.iter().skip(7) {
        // Block 1 also finishes via early delivery before its own parity
        // frames arrive; those land as a harmless stale-block drop.
        let _ = dec.ingest_frame(frame, &mut delivered);
    }

    assert_eq!(delivered.concat()[..3 * 1024], block0[..3 * 1024]);
    assert_eq!(delivered.concat()[3 * 1024..], block1);
}

/// Scenario 6: mid-stream reconfiguration from `k=4,n=6` to `k=6,n=10`.
/// Both sides reinitialize, the in-flight block is abandoned, `block_index`
/// keeps increasing rather than resetting, and nothing already delivered
/// is re-delivered.
#[test]
fn reconfiguration_mid_stream_continues_block_index() {
    let before = default_shape();
    let after = FecDescriptor { k: 6, n: 10, mtu: 1024 };

    let mut enc = FecEncoder::new(before).unwrap();
    let mut dec = FecDecoder::new(before).unwrap();
    let mut delivered = Delivered(Vec::new());

    let first_block = sequential_bytes(4 * 1024);
    let mut frames = Frames(Vec::new());
    enc.encode_stream(&first_block, &mut frames).unwrap();
    for frame in &frames.0 {
        let _ = dec.ingest_frame(frame, &mut delivered);
    }
    assert_eq!(delivered.concat(), first_block);
    assert_eq!(enc.descriptor(), before);
    let block_index_before_reconfigure = dec.current_block();
    assert_eq!(block_index_before_reconfigure, 1);

    enc.reconfigure(after).unwrap();
    dec.reconfigure(after).unwrap();
    assert_eq!(enc.descriptor(), after);
    assert_eq!(dec.current_block(), block_index_before_reconfigure, "block_index is not reset");

    let second_block = sequential_bytes(6 * 1024);
    let mut frames2 = Frames(Vec::new());
    enc.encode_stream(&second_block, &mut frames2).unwrap();
    assert_eq!(frames2.0.len(), 10, "6 data + 4 parity under the new shape");

    let delivered_before = delivered.0.len();
    for frame in &frames2.0 {
        let _ = dec.ingest_frame(frame, &mut delivered);
    }

    assert_eq!(delivered.0.len(), delivered_before + 6);
    assert_eq!(delivered.0[delivered_before..].concat(), second_block);
    assert_eq!(dec.current_block(), block_index_before_reconfigure + 1);
}
