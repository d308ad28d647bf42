//! ==============================================================================
//! downsample.rs - reduce a reading series for display
//! ==============================================================================
//!
//! purpose:
//!     picks at most `resolution` evenly strided points out of a series so a
//!     client can draw a long time range without pulling every reading.
//!
//! relationships:
//!     - used by: server.rs (GET /readings?resolution=N)
//!
//! the input must already be in chronological order. nothing here sorts.
//!
//! ==============================================================================

use std::num::NonZeroUsize;

/// reduce `series` to at most `resolution` points
///
/// walks the series with stride `len / resolution` (at least 1). once the
/// stride reaches the final element the last reading is emitted and the walk
/// stops, so the output can be shorter than `resolution`. if the walk uses up
/// every slot before reaching the end, the final slot takes the last reading
/// instead. either way the most recent reading closes the result.
pub fn downsample<T: Clone>(series: &[T], resolution: NonZeroUsize) -> Vec<T> {
    let Some(last) = series.last() else {
        return Vec::new();
    };

    let n = series.len();
    let stride = (n / resolution.get()).max(1);
    let mut reduced = Vec::with_capacity(resolution.get().min(n));

    for i in 0..resolution.get() {
        let index = i * stride;
        if index >= n - 1 {
            reduced.push(last.clone());
            return reduced;
        }
        reduced.push(series[index].clone());
    }

    // walk ran out of slots short of the tail
    if let Some(slot) = reduced.last_mut() {
        *slot = last.clone();
    }
    reduced
}
