//! The two pure, verbatim-ported pieces of the camera capture path: the JPEG
//! end-marker trim and its alignment workaround, and the strided gather copy
//! (spec §4.E, §9).
//!
//! Ported from `original_source/air_firmware/main/main.cpp`'s
//! `camera_data_available`: the backward scan for `0xFF 0xD9` starting at
//! `src + (count-2)*stride`, and the `count & 0x1FF == 0` / `count % 100 == 0`
//! one-byte nudges that follow it, preserved bit-for-bit per spec §9's open
//! question ("do not attempt to generalize").

/// Scans backward from `count - 2` for the JPEG end-of-image marker
/// (`0xFF 0xD9`) in a strided byte span, truncating `count` to end just past
/// it. If no marker is found before the scan reaches `src[0]`, `count` is
/// returned unchanged. `src` must hold at least `count` strided elements
/// (i.e. `(count - 1) * stride + 1` bytes).
///
/// The `& 0x1FF` / `% 100` nudges are a radio-layer alignment workaround
/// whose exact invariant the original firmware does not document; they are
/// applied only when a marker was actually found, matching the source.
pub fn trim_to_jpeg_end(src: &[u8], stride: usize, count: usize) -> usize {
    if count < 2 {
        return count;
    }
    let mut i = count - 2;
    loop {
        if i == 0 {
            break;
        }
        if src[i * stride] == 0xFF && src[(i + 1) * stride] == 0xD9 {
            let mut new_count = i + 2;
            if new_count & 0x1FF == 0 {
                new_count += 1;
            }
            if new_count % 100 == 0 {
                new_count += 1;
            }
            return new_count;
        }
        i -= 1;
    }
    count
}

/// Gathers `count` strided elements from `src` (`src[i * stride]` for
/// `i in 0..count`) into a contiguous `dst` (spec §9: "implementers may use
/// any equivalent that preserves the property"; the original's 8-wide
/// manual unroll is a memory-bandwidth optimization left to the optimizer
/// here rather than hand-duplicated).
pub fn gather_strided(src: &[u8], stride: usize, count: usize, dst: &mut [u8]) {
    debug_assert_eq!(dst.len(), count);
    if stride == 1 {
        dst.copy_from_slice(&src[..count]);
        return;
    }
    for (i, out) in dst.iter_mut().enumerate() {
        *out = src[i * stride];
    }
}
