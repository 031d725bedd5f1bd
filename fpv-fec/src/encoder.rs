//! Packetizes a byte stream into `k` data frames plus `n - k` parity frames
//! per block, sealing each into a transport frame as soon as it is ready
//! (spec §4.C `FecEncoder`).
//!
//! Ported from `original_source/components/common/fec_codec.cpp`'s encoder
//! task: `encode_data`/`flush_encode_packet` accumulate bytes into a
//! `mtu`-sized packet, `seal_packet` stamps the header the instant a data
//! packet is full, and once `coding_k` packets have been sealed the worker
//! runs `fec_encode` over the stored payload pointers to produce the parity
//! packets.

use fpv_wire::transport::BLOCK_INDEX_MODULUS;
use fpv_wire::{TransportHeader, TRANSPORT_HEADER_LEN};

use crate::gf::Codec;

/// `fec_codec.cpp`'s `Fec_Codec::MAX_CODING_K`.
pub const MAX_CODING_K: u8 = 16;
/// `fec_codec.cpp`'s `Fec_Codec::MAX_CODING_N`.
pub const MAX_CODING_N: u8 = 32;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid FEC shape: need 1 <= k <= {MAX_CODING_K}, k < n <= {MAX_CODING_N}, mtu > 0")]
    BadShape,
    #[error("reed-solomon backend error: {0}")]
    Codec(#[from] crate::gf::RsError),
}

/// `k`, `n`, `mtu`, mirroring `fec_codec.h`'s `Descriptor` (the scheduling
/// hint `core`/`priority` fields are a FreeRTOS task-placement concern with
/// no counterpart on this side of the transport).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FecDescriptor {
    pub k: u8,
    pub n: u8,
    pub mtu: usize,
}

impl FecDescriptor {
    pub fn validate(&self) -> Result<(), Error> {
        if self.k == 0 || self.k > MAX_CODING_K {
            return Err(Error::BadShape);
        }
        if self.n <= self.k || self.n > MAX_CODING_N {
            return Err(Error::BadShape);
        }
        if self.mtu == 0 {
            return Err(Error::BadShape);
        }
        Ok(())
    }
}

/// Receives each sealed transport frame as it is produced, in strictly
/// increasing `(block_index, packet_index)` order within a block.
pub trait EncodedSink {
    fn on_encoded(&mut self, frame: &[u8]);
}

/// Packetizes a byte stream into FEC-protected transport frames.
///
/// Exactly one thread is expected to call `reserve_packet`/`flush_packet`/
/// `encode_stream`; `on_encoded` runs synchronously within that same call
/// (spec §5: wiring it onto a separate worker thread, if desired, is a
/// concern of the layer above this one, not of `FecEncoder` itself).
pub struct FecEncoder {
    descriptor: FecDescriptor,
    codec: Codec,
    block_index: u32,
    /// Index of the data packet currently being filled, `0..k`.
    packet_in_block: u8,
    slot: Vec<u8>,
    written: usize,
    slot_active: bool,
    /// Sealed data payloads accumulated so far this block; source shards
    /// for the Reed-Solomon parity computation once it reaches `k`.
    block_shards: Vec<Vec<u8>>,
}

impl FecEncoder {
    pub fn new(descriptor: FecDescriptor) -> Result<Self, Error> {
        descriptor.validate()?;
        let codec = Codec::new(descriptor.k as usize, descriptor.n as usize)?;
        Ok(Self {
            descriptor,
            codec,
            block_index: 0,
            packet_in_block: 0,
            slot: Vec::new(),
            written: 0,
            slot_active: false,
            block_shards: Vec::with_capacity(descriptor.k as usize),
        })
    }

    pub fn descriptor(&self) -> FecDescriptor {
        self.descriptor
    }

    /// Re-initializes with a new shape, abandoning any in-flight block
    /// without emitting it. `block_index` continues rather than resetting
    /// (spec §7, "Reconfiguration of in-flight session").
    pub fn reconfigure(&mut self, descriptor: FecDescriptor) -> Result<(), Error> {
        descriptor.validate()?;
        let codec = Codec::new(descriptor.k as usize, descriptor.n as usize)?;
        self.descriptor = descriptor;
        self.codec = codec;
        self.packet_in_block = 0;
        self.slot.clear();
        self.written = 0;
        self.slot_active = false;
        self.block_shards.clear();
        Ok(())
    }

    /// Returns the writable `mtu`-byte region of the current data packet,
    /// starting a new one if none is active. The caller is responsible for
    /// tracking how much of it has been filled and calling
    /// [`FecEncoder::advance_packet`] accordingly; [`FecEncoder::encode_stream`]
    /// does this bookkeeping automatically for a plain byte span.
    pub fn reserve_packet(&mut self) -> &mut [u8] {
        if !self.slot_active {
            self.slot.clear();
            self.slot.resize(self.descriptor.mtu, 0);
            self.written = 0;
            self.slot_active = true;
        }
        &mut self.slot[..]
    }

    /// Records that `additional` more bytes of the current slot (starting
    /// right after the previously recorded amount) have been written.
    pub fn advance_packet(&mut self, additional: usize) {
        self.written = (self.written + additional).min(self.descriptor.mtu);
    }

    /// Bytes already written into the current reserved slot.
    pub fn packet_fill(&self) -> usize {
        self.written
    }

    /// Marks the current slot full, zero-padding any remaining bytes, seals
    /// it into a transport frame and emits it. If `k` data packets have now
    /// been sealed this block, also computes and emits the `n - k` parity
    /// packets and advances to the next block.
    pub fn flush_packet(&mut self, sink: &mut impl EncodedSink) -> Result<(), Error> {
        if !self.slot_active {
            return Ok(());
        }
        for b in &mut self.slot[self.written..] {
            *b = 0;
        }
        self.written = self.descriptor.mtu;

        self.emit(self.packet_in_block, &self.slot.clone(), sink);
        self.block_shards.push(core::mem::take(&mut self.slot));
        self.packet_in_block += 1;
        self.slot_active = false;
        self.written = 0;

        if self.packet_in_block as usize == self.descriptor.k as usize {
            self.emit_parity(sink)?;
        }
        Ok(())
    }

    /// Convenience: fills successive slots from `bytes`, flushing whenever
    /// one fills, until the whole span has been consumed.
    pub fn encode_stream(&mut self, mut bytes: &[u8], sink: &mut impl EncodedSink) -> Result<(), Error> {
        while !bytes.is_empty() {
            let room = self.descriptor.mtu - self.packet_fill();
            let slot = self.reserve_packet();
            let n = room.min(bytes.len());
            let start = slot.len() - room;
            slot[start..start + n].copy_from_slice(&bytes[..n]);
            self.advance_packet(n);
            bytes = &bytes[n..];
            if self.packet_fill() >= self.descriptor.mtu {
                self.flush_packet(sink)?;
            }
        }
        Ok(())
    }

    fn emit(&self, packet_index: u8, payload: &[u8], sink: &mut impl EncodedSink) {
        let header = TransportHeader {
            block_index: self.block_index,
            packet_index,
            size: payload.len() as u16,
        };
        let mut hdr_bytes = [0u8; TRANSPORT_HEADER_LEN];
        header.pack(&mut hdr_bytes);
        let mut frame = Vec::with_capacity(TRANSPORT_HEADER_LEN + payload.len());
        frame.extend_from_slice(&hdr_bytes);
        frame.extend_from_slice(payload);
        sink.on_encoded(&frame);
    }

    fn emit_parity(&mut self, sink: &mut impl EncodedSink) -> Result<(), Error> {
        let k = self.descriptor.k as usize;
        let n = self.descriptor.n as usize;
        let mtu = self.descriptor.mtu;

        let mut shards: Vec<Vec<u8>> = Vec::with_capacity(n);
        shards.extend(self.block_shards.drain(..));
        for _ in k..n {
            shards.push(vec![0u8; mtu]);
        }

        self.codec.encode(&mut shards)?;

        for (i, shard) in shards.iter().enumerate().skip(k) {
            self.emit(i as u8, shard, sink);
        }

        self.block_index = (self.block_index + 1) % BLOCK_INDEX_MODULUS;
        self.packet_in_block = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Collector(Vec<Vec<u8>>);
    impl EncodedSink for Collector {
        fn on_encoded(&mut self, frame: &[u8]) {
            self.0.push(frame.to_vec());
        }
    }

    fn descriptor() -> FecDescriptor {
        FecDescriptor { k: 2, n: 4, mtu: 8 }
    }

    #[test]
    fn data_frames_emitted_before_parity() {
        let mut enc = FecEncoder::new(descriptor()).unwrap();
        let mut sink = Collector(Vec::new());
        enc.encode_stream(&[1; 8], &mut sink).unwrap();
        assert_eq!(sink.0.len(), 1);
        enc.encode_stream(&[2; 8], &mut sink).unwrap();
        // Second data frame plus 2 parity frames for this block.
        assert_eq!(sink.0.len(), 4);
    }

    #[test]
    fn headers_carry_strictly_increasing_packet_index_within_a_block() {
        let mut enc = FecEncoder::new(descriptor()).unwrap();
        let mut sink = Collector(Vec::new());
        enc.encode_stream(&[1; 16], &mut sink).unwrap();
        let indices: Vec<u8> = sink
            .0
            .iter()
            .map(|f| TransportHeader::unpack(&f[..6].try_into().unwrap()).packet_index)
            .collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn block_index_advances_once_per_block() {
        let mut enc = FecEncoder::new(descriptor()).unwrap();
        let mut sink = Collector(Vec::new());
        enc.encode_stream(&[0; 32], &mut sink).unwrap(); // two full blocks
        let blocks: Vec<u32> = sink
            .0
            .iter()
            .map(|f| TransportHeader::unpack(&f[..6].try_into().unwrap()).block_index)
            .collect();
        assert_eq!(blocks, vec![0, 0, 0, 0, 1, 1, 1, 1]);
    }

    #[test]
    fn flush_zero_pads_a_partial_packet() {
        let mut enc = FecEncoder::new(descriptor()).unwrap();
        let mut sink = Collector(Vec::new());
        enc.reserve_packet()[..3].copy_from_slice(&[9, 9, 9]);
        enc.advance_packet(3);
        enc.flush_packet(&mut sink).unwrap();
        assert_eq!(&sink.0[0][6..], &[9, 9, 9, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn reconfigure_preserves_block_index() {
        let mut enc = FecEncoder::new(descriptor()).unwrap();
        let mut sink = Collector(Vec::new());
        enc.encode_stream(&[0; 16], &mut sink).unwrap();
        assert_eq!(enc.block_index, 1);
        enc.reconfigure(FecDescriptor { k: 3, n: 6, mtu: 8 }).unwrap();
        assert_eq!(enc.block_index, 1);
        assert_eq!(enc.descriptor().k, 3);
    }

    #[test]
    fn bad_shape_rejected() {
        assert!(FecEncoder::new(FecDescriptor { k: 0, n: 4, mtu: 8 }).is_err());
        assert!(FecEncoder::new(FecDescriptor { k: 4, n: 4, mtu: 8 }).is_err());
        assert!(FecEncoder::new(FecDescriptor { k: 2, n: 4, mtu: 0 }).is_err());
    }
}
