//! Reed–Solomon erasure coding backend for the block FEC primitive (spec
//! §4.C/§4.D `fec_encode`/`fec_decode`), wrapped behind a narrow type so the
//! rest of the crate only ever calls `encode`/`reconstruct` and never
//! touches the Galois-field arithmetic directly.
//!
//! Grounded on `hgaiser-moonshine`'s `session/stream/video/packetizer.rs`,
//! the only pack example wiring up an FEC-protected video transport:
//! `reed_solomon_erasure::galois_8::ReedSolomon::new(k, n)`, `.encode(&mut
//! shards)` over `Vec<Vec<u8>>` shards, `.reconstruct(&mut shards)` over
//! `Vec<Option<Vec<u8>>>`.

use reed_solomon_erasure::galois_8::ReedSolomon;
pub use reed_solomon_erasure::Error as RsError;

/// A configured `(k, n - k)` Reed-Solomon code.
pub struct Codec {
    rs: ReedSolomon,
}

impl Codec {
    /// `k` data shards, `n - k` parity shards. `k >= 1` and `n > k` are the
    /// caller's responsibility (checked by `FecDescriptor::validate`).
    pub fn new(k: usize, n: usize) -> Result<Self, RsError> {
        Ok(Self {
            rs: ReedSolomon::new(k, n - k)?,
        })
    }

    /// Computes the `n - k` parity shards from the `k` data shards already
    /// present at the front of `shards`. All shards must be the same length.
    pub fn encode(&self, shards: &mut [Vec<u8>]) -> Result<(), RsError> {
        self.rs.encode(shards)
    }

    /// Reconstructs every `None` entry in `shards` in place, given at least
    /// `k` `Some` entries at their original positions. `shards[0..k]` are
    /// data, `shards[k..n]` are parity.
    pub fn reconstruct(&self, shards: &mut [Option<Vec<u8>>]) -> Result<(), RsError> {
        self.rs.reconstruct(shards)
    }
}
