//! A variable-size, single-producer/single-consumer bytestream ring: each
//! entry is a length-prefixed frame, stored contiguously or wrapped at the
//! end of the backing buffer (spec §4.A `FrameRing`).
//!
//! Ported from the air firmware's `Queue` (`queue.h`): a `u32` length prefix
//! is normally written immediately before the frame's bytes. A write that
//! would otherwise straddle the end of the buffer instead places its
//! *payload* at offset 0 (`m_write_end = size`), but the prefix describing
//! that payload is still written at the pre-wrap write cursor (`queue.h:100`,
//! `m_buffer + m_write_start`) rather than at offset 0. The reader detects
//! the wrap the same way the writer decided to take it: the prefix it reads
//! at `read_start` describes a frame whose end would fall past `capacity`,
//! so the payload it fetches instead comes from offset 0 (`queue.h:128-141`).

const LEN_PREFIX: usize = core::mem::size_of::<u32>();

/// An outstanding, not-yet-committed write reservation.
pub struct WriteGuard<'g, 'buf> {
    ring: &'g mut FrameRing<'buf>,
    /// Offset (into `buf`) of the reserved payload region; the length
    /// prefix may live elsewhere (the pre-wrap tail) when this reservation
    /// wrapped.
    payload_start: usize,
    /// Offset just past the reserved payload.
    end: usize,
}

impl<'buf> WriteGuard<'_, 'buf> {
    /// The reserved, writable payload region.
    pub fn payload(&mut self) -> &mut [u8] {
        &mut self.ring.buf[self.payload_start..self.end]
    }

    /// Commits the write: advances the write cursor past this frame.
    pub fn commit(self) {
        self.ring.write_start = self.end;
        self.ring.count += 1;
    }

    /// Discards the reservation without publishing it to the reader.
    pub fn abort(self) {
        // Nothing to undo: `write_start` was never advanced.
    }
}

/// An outstanding, not-yet-committed read reservation.
pub struct ReadGuard<'g, 'buf> {
    ring: &'g mut FrameRing<'buf>,
    payload_start: usize,
    end: usize,
}

impl ReadGuard<'_, '_> {
    pub fn payload(&self) -> &[u8] {
        &self.ring.buf[self.payload_start..self.end]
    }

    pub fn commit(self) {
        self.ring.read_start = self.end;
        debug_assert!(self.ring.count > 0);
        self.ring.count -= 1;
    }

    pub fn abort(self) {
        // Nothing to undo: `read_start` was never advanced.
    }
}

/// A bounded, length-framed SPSC byte ring operating over a caller-owned
/// buffer. Never allocates, never blocks: `begin_write`/`begin_read` return
/// `None` immediately when there is no room or nothing to read.
pub struct FrameRing<'a> {
    buf: &'a mut [u8],
    capacity: usize,
    write_start: usize,
    /// Set while a write reservation is outstanding; cleared on commit.
    /// `begin_write` refuses a second reservation while this is `Some`.
    write_pending: bool,
    read_start: usize,
    read_pending: bool,
    count: usize,
}

impl<'a> FrameRing<'a> {
    /// `buf.len()` is the byte capacity of the ring (frame payload plus its
    /// 4-byte length prefix counts against it).
    pub fn new(buf: &'a mut [u8]) -> Self {
        let capacity = buf.len();
        Self {
            buf,
            capacity,
            write_start: 0,
            write_pending: false,
            read_start: 0,
            read_pending: false,
            count: 0,
        }
    }

    /// Number of complete, committed frames currently buffered.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Reserves room for a `size`-byte frame. Fails (returns `None`) if the
    /// contiguous free region following the write cursor cannot hold the
    /// length prefix plus `size` bytes without colliding with the read
    /// cursor, in either the no-wrap or wrap-around layout.
    pub fn begin_write(&mut self, size: usize) -> Option<WriteGuard<'_, 'a>> {
        if self.write_pending || self.read_pending {
            return None;
        }

        let needed = LEN_PREFIX + size;
        let end = self.write_start + needed;
        if end <= self.capacity {
            // No wrap: the only collision to check is running into the
            // reader from behind.
            if self.write_start < self.read_start && end >= self.read_start {
                return None;
            }
            self.buf[self.write_start..self.write_start + LEN_PREFIX]
                .copy_from_slice(&(size as u32).to_le_bytes());
            self.write_pending = true;
            return Some(WriteGuard {
                payload_start: self.write_start + LEN_PREFIX,
                end,
                ring: self,
            });
        }

        // Wrap: the payload goes at offset 0, but the prefix describing it
        // is still written at the pre-wrap write cursor (`queue.h:100`) so
        // the reader can find it there before following the wrap itself.
        if self.write_start + LEN_PREFIX > self.capacity {
            return None; // tail too short to even hold the length prefix
        }
        if self.read_start > self.write_start {
            return None;
        }
        if size >= self.read_start {
            return None;
        }
        self.buf[self.write_start..self.write_start + LEN_PREFIX]
            .copy_from_slice(&(size as u32).to_le_bytes());
        self.write_pending = true;
        Some(WriteGuard {
            payload_start: 0,
            end: size,
            ring: self,
        })
    }

    /// Reserves the next committed frame for reading, or `None` if the ring
    /// is empty.
    pub fn begin_read(&mut self) -> Option<ReadGuard<'_, 'a>> {
        if self.read_pending || self.write_pending {
            return None;
        }
        if self.read_start == self.write_start && self.count == 0 {
            return None;
        }

        let mut len_bytes = [0u8; LEN_PREFIX];
        len_bytes.copy_from_slice(&self.buf[self.read_start..self.read_start + LEN_PREFIX]);
        let size = u32::from_le_bytes(len_bytes) as usize;

        let end = self.read_start + LEN_PREFIX + size;
        if end <= self.capacity {
            self.read_pending = true;
            Some(ReadGuard {
                payload_start: self.read_start + LEN_PREFIX,
                end,
                ring: self,
            })
        } else {
            // The prefix just read at `read_start` (the pre-wrap tail)
            // describes a frame the writer placed at offset 0 instead.
            self.read_pending = true;
            Some(ReadGuard {
                payload_start: 0,
                end: size,
                ring: self,
            })
        }
    }
}

// `WriteGuard`/`ReadGuard` must clear their ring's pending flag on drop
// regardless of whether `commit`/`abort` was called explicitly, since both
// consume `self` by value and either path ends here.
impl Drop for WriteGuard<'_, '_> {
    fn drop(&mut self) {
        self.ring.write_pending = false;
    }
}

impl Drop for ReadGuard<'_, '_> {
    fn drop(&mut self) {
        self.ring.read_pending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trip() {
        let mut storage = [0u8; 64];
        let mut ring = FrameRing::new(&mut storage);

        let mut w = ring.begin_write(5).unwrap();
        w.payload().copy_from_slice(b"hello");
        w.commit();

        assert_eq!(ring.count(), 1);

        let r = ring.begin_read().unwrap();
        assert_eq!(r.payload(), b"hello");
        r.commit();
        assert_eq!(ring.count(), 0);
    }

    #[test]
    fn second_outstanding_writer_is_refused() {
        let mut storage = [0u8; 64];
        let mut ring = FrameRing::new(&mut storage);
        let _w = ring.begin_write(4).unwrap();
        assert!(ring.begin_write(4).is_none());
    }

    #[test]
    fn abort_does_not_publish_the_frame() {
        let mut storage = [0u8; 64];
        let mut ring = FrameRing::new(&mut storage);
        let w = ring.begin_write(4).unwrap();
        w.abort();
        assert_eq!(ring.count(), 0);
        assert!(ring.begin_read().is_none());
    }

    #[test]
    fn write_fails_when_free_space_insufficient() {
        let mut storage = [0u8; 16]; // 4-byte prefix + 12 bytes payload
        let mut ring = FrameRing::new(&mut storage);
        assert!(ring.begin_write(20).is_none());
    }

    #[test]
    fn wrap_around_places_frame_at_offset_zero() {
        let mut storage = [0u8; 32];
        let mut ring = FrameRing::new(&mut storage);

        // First frame occupies [0, 4+10) = [0, 14).
        let mut w = ring.begin_write(10).unwrap();
        w.payload().copy_from_slice(&[1u8; 10]);
        w.commit();
        let r = ring.begin_read().unwrap();
        r.commit();

        // write_start is now 14; a 10-byte frame needs 14 bytes, which would
        // end at 28 <= 32, fitting without wrap. Force a wrap with a bigger
        // ask relative to remaining room by writing near the end first.
        let mut storage2 = [0u8; 20];
        let mut ring2 = FrameRing::new(&mut storage2);
        let mut w1 = ring2.begin_write(8).unwrap(); // occupies [0, 12)
        w1.payload().copy_from_slice(&[2u8; 8]);
        w1.commit();
        let r1 = ring2.begin_read().unwrap();
        r1.commit(); // read_start now 12, write_start still 12

        // Next write of 6 bytes needs 10 bytes from offset 12 -> end 22 > 20:
        // must wrap to offset 0.
        let mut w2 = ring2.begin_write(6).unwrap();
        w2.payload().copy_from_slice(&[3u8; 6]);
        w2.commit();

        let r2 = ring2.begin_read().unwrap();
        assert_eq!(r2.payload(), [3u8; 6]);
    }

    #[test]
    fn spsc_total_bytes_conserved() {
        let mut storage = [0u8; 128];
        let mut ring = FrameRing::new(&mut storage);
        let mut committed = 0usize;
        let mut observed = 0usize;

        for i in 0..5u8 {
            let frame = [i; 7];
            if let Some(mut w) = ring.begin_write(frame.len()) {
                w.payload().copy_from_slice(&frame);
                w.commit();
                committed += frame.len();
            }
            if let Some(r) = ring.begin_read() {
                observed += r.payload().len();
                r.commit();
            }
        }
        while let Some(r) = ring.begin_read() {
            observed += r.payload().len();
            r.commit();
        }
        assert_eq!(committed, observed);
    }
}
