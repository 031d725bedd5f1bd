//! Three-stage DVR sink: capture-time byte callback → RAM ring → bulk ring
//! → blocked file writes, with session/segment rollover (spec §4.J).
//!
//! Ported from `original_source/air_firmware/main/main.cpp`'s DVR task
//! trio and `Circular_Buffer`-backed ring pair: a small RAM ring absorbs the
//! capture callback's burstiness without blocking it, a much larger bulk
//! ring absorbs SD card latency spikes, and a writer task drains the bulk
//! ring into fixed-size blocks on disk, rolling to a new segment file once
//! the current one reaches 500 MiB.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Size of the RAM-stage ring (spec §4.J: "ByteRing[RAM, 10 KiB]").
pub const RAM_RING_CAPACITY: usize = 10 * 1024;
/// Size of the bulk-stage ring (spec §4.J: "ByteRing[bulk, 3 MiB]").
pub const BULK_RING_CAPACITY: usize = 3 * 1024 * 1024;
/// Block size the writer stage flushes to disk in (spec §4.J).
pub const WRITE_BLOCK_LEN: usize = 8 * 1024;
/// A segment file rolls over once it reaches this size (spec §6).
pub const SEGMENT_ROLLOVER_BYTES: u64 = 500 * 1024 * 1024;

/// A single-producer/single-consumer byte ring over a self-owned buffer.
///
/// [`fpv_fec::byte_ring::ByteRing`] borrows its backing storage for the
/// duration of each use, which fits the FEC encoder/decoder (one caller
/// holding the buffer across a bounded operation) but not the DVR pipeline,
/// which needs a ring it can own across the lifetime of a recording
/// session. Same wrap-around write/read discipline as the borrowed version,
/// duplicated over a `Vec<u8>` instead of re-borrowed each call.
pub struct OwnedByteRing {
    buf: Vec<u8>,
    capacity: usize,
    start: usize,
    size: usize,
}

impl OwnedByteRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity],
            capacity,
            start: 0,
            size: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn free(&self) -> usize {
        self.capacity - self.size
    }

    /// Fails (leaving the ring untouched) iff `self.free() < data.len()`.
    pub fn write(&mut self, data: &[u8]) -> bool {
        if data.len() > self.free() {
            return false;
        }
        let idx = (self.start + self.size) % self.capacity;
        if idx + data.len() <= self.capacity {
            self.buf[idx..idx + data.len()].copy_from_slice(data);
        } else {
            let first = self.capacity - idx;
            self.buf[idx..].copy_from_slice(&data[..first]);
            self.buf[..data.len() - first].copy_from_slice(&data[first..]);
        }
        self.size += data.len();
        true
    }

    /// Largest contiguous slice of buffered bytes at the read cursor,
    /// clamped to `max`. Call [`OwnedByteRing::advance`] with the amount
    /// actually consumed.
    pub fn peek_contiguous(&self, max: usize) -> &[u8] {
        if self.size == 0 {
            return &[];
        }
        let mut len = max.min(self.size);
        if self.start + len > self.capacity {
            len = self.capacity - self.start;
        }
        &self.buf[self.start..self.start + len]
    }

    pub fn advance(&mut self, len: usize) {
        debug_assert!(len <= self.size);
        self.start = (self.start + len) % self.capacity;
        self.size -= len;
    }
}

/// The file I/O boundary the DVR writer stage drains into (spec §1: SD
/// filesystem writes are an out-of-scope external collaborator).
pub trait SegmentStore {
    type Segment: Write;

    fn exists(&self, name: &str) -> bool;
    fn create(&mut self, name: &str) -> io::Result<Self::Segment>;
}

/// A [`SegmentStore`] backed by plain files in a directory, the concrete
/// collaborator a real build wires in.
pub struct FsDvrStorage {
    dir: PathBuf,
}

impl FsDvrStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SegmentStore for FsDvrStorage {
    type Segment = std::fs::File;

    fn exists(&self, name: &str) -> bool {
        self.dir.join(name).exists()
    }

    fn create(&mut self, name: &str) -> io::Result<Self::Segment> {
        std::fs::File::create(self.dir.join(name))
    }
}

fn segment_name(session: u32, segment: u32) -> String {
    format!("session{session:03}_segment{segment:03}.mjpeg")
}

/// Finds the lowest session id with no existing `segment000` file (spec
/// §4.J: "the next free session id is found by probing filenames... for
/// existence").
fn next_free_session(store: &impl SegmentStore) -> u32 {
    let mut session = 0u32;
    while store.exists(&segment_name(session, 0)) {
        session += 1;
    }
    session
}

/// Why a write into the pipeline did not happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DvrDrop {
    /// The RAM ring had no room (spec §7: "FEC pool exhaustion"'s DVR
    /// counterpart; the hot path must never block on storage).
    RamRingFull,
    /// The bulk ring had no room to absorb the RAM ring's drained bytes.
    BulkRingFull,
    /// No recording session is currently active.
    NotRecording,
}

/// The three-stage pipeline plus session/segment bookkeeping (spec §4.J).
pub struct Dvr<S: SegmentStore> {
    ram: OwnedByteRing,
    bulk: OwnedByteRing,
    store: S,
    session: Option<Session<S::Segment>>,
}

struct Session<W> {
    id: u32,
    segment_id: u32,
    file: W,
    bytes_in_segment: u64,
}

impl<S: SegmentStore> Dvr<S> {
    pub fn new(store: S) -> Self {
        Self {
            ram: OwnedByteRing::new(RAM_RING_CAPACITY),
            bulk: OwnedByteRing::new(BULK_RING_CAPACITY),
            store,
            session: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    /// Starts a new session at the next free `sessionNNN` id (spec §4.J:
    /// "started when `dvr_record` becomes true"). A no-op if already
    /// recording.
    pub fn start_session(&mut self) -> io::Result<()> {
        if self.session.is_some() {
            return Ok(());
        }
        let id = next_free_session(&self.store);
        let file = self.store.create(&segment_name(id, 0))?;
        self.session = Some(Session {
            id,
            segment_id: 0,
            file,
            bytes_in_segment: 0,
        });
        Ok(())
    }

    /// Ends the current session, if any (spec §4.J: "ends when [dvr_record]
    /// returns to false or the storage reports an error").
    pub fn end_session(&mut self) {
        self.session = None;
    }

    /// Capture-time callback push into the RAM ring (stage 1). Never
    /// blocks; on exhaustion the byte is dropped and counted by the caller.
    pub fn push(&mut self, bytes: &[u8]) -> Result<(), DvrDrop> {
        if self.session.is_none() {
            return Err(DvrDrop::NotRecording);
        }
        if self.ram.write(bytes) {
            Ok(())
        } else {
            Err(DvrDrop::RamRingFull)
        }
    }

    /// Stage 2: drains everything currently buffered in the RAM ring into
    /// the bulk ring. Run from a worker task distinct from the capture
    /// callback.
    pub fn drain_ram_to_bulk(&mut self) -> Result<usize, DvrDrop> {
        let mut moved = 0;
        loop {
            let chunk = self.ram.peek_contiguous(self.bulk.free()).to_vec();
            if chunk.is_empty() {
                break;
            }
            if !self.bulk.write(&chunk) {
                return Err(DvrDrop::BulkRingFull);
            }
            self.ram.advance(chunk.len());
            moved += chunk.len();
        }
        Ok(moved)
    }

    /// Stage 3: drains up to one [`WRITE_BLOCK_LEN`]-sized block from the
    /// bulk ring to the current segment file, rolling to a new segment if
    /// the current one would exceed [`SEGMENT_ROLLOVER_BYTES`]. Returns the
    /// number of bytes written, or `0` if less than a full block (or the
    /// bulk ring's remainder) is currently available and recording is
    /// active with nothing to flush yet.
    pub fn drain_bulk_to_file(&mut self) -> io::Result<usize> {
        let Some(session) = self.session.as_mut() else {
            return Ok(0);
        };

        let available = self.bulk.len();
        if available == 0 {
            return Ok(0);
        }
        let take = available.min(WRITE_BLOCK_LEN);
        let chunk = self.bulk.peek_contiguous(take).to_vec();
        if chunk.is_empty() {
            return Ok(0);
        }

        session.file.write_all(&chunk)?;
        self.bulk.advance(chunk.len());
        session.bytes_in_segment += chunk.len() as u64;

        if session.bytes_in_segment >= SEGMENT_ROLLOVER_BYTES {
            let next_segment = session.segment_id + 1;
            let name = segment_name(session.id, next_segment);
            let file = self.store.create(&name)?;
            session.segment_id = next_segment;
            session.file = file;
            session.bytes_in_segment = 0;
        }

        Ok(chunk.len())
    }
}

/// Accepts any directory path and opens/creates it first, the convenience
/// a real air binary uses at startup.
pub fn open_fs_dvr(dir: impl AsRef<Path>) -> io::Result<Dvr<FsDvrStorage>> {
    std::fs::create_dir_all(dir.as_ref())?;
    Ok(Dvr::new(FsDvrStorage::new(dir.as_ref().to_path_buf())))
}
