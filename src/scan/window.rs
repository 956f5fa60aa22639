//! Near-boundary window extraction.
//!
//! The exact trigger offset inside a detecting chunk is unknown, so a fixed
//! heuristic picks a slice around the last `window_size` bytes of the chunk,
//! biased half a window back. The slice is not guaranteed to be `window_size`
//! long: it is clamped at the start of the buffer and can reach
//! `window_size + window_size / 2` bytes.

use std::ops::Range;

/// Bounds of the window for a chunk of `len` bytes.
pub fn window_bounds(len: usize, window_size: usize) -> Option<Range<usize>> {
    if len == 0 || window_size == 0 {
        return None;
    }
    let half = window_size / 2;

    let upper = len.saturating_sub(window_size) + half;
    let mut lower = upper.saturating_sub(window_size);
    if upper == 0 {
        return None;
    }
    if lower < half {
        lower = 0;
    } else {
        lower -= half;
    }

    // chunks shorter than half a window
    let upper = upper.min(len);
    Some(lower..upper)
}

/// Slice the near-boundary window out of `chunk`.
pub fn extract_window(chunk: &[u8], window_size: usize) -> Option<&[u8]> {
    window_bounds(chunk.len(), window_size).map(|r| &chunk[r])
}
