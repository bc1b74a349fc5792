//! Change detection for clipboard contents.
//!
//! Text and file changes are plain comparisons. Image changes use a
//! latency-adaptive strategy:
//!
//! - If reading the image took less than the slow-read threshold, the two
//!   images are encoded to PNG and compared byte for byte.
//! - Otherwise the raw buffers are compared by length and then at a fixed
//!   number of random offsets, and the next poll is pushed out to twice the
//!   measured read latency.
//!
//! The sampled comparison is approximate on purpose. For two buffers of
//! equal length that differ in a fraction `p` of positions, the chance of
//! missing the change with `n` samples is `(1 - p)^n`; with the default 100
//! samples and `p = 1%` that is about 37%. Buffers of different lengths are
//! always reported as changed.

use std::time::Duration;

use clip_types::{ImageError, ImagePayload};
use rand::Rng;

/// Default number of offsets inspected by [`image_differs_sampled`].
pub const DEFAULT_SAMPLE_COUNT: usize = 100;

/// Text changed if the new value is non-empty and differs from the previous.
///
/// An empty clipboard never counts as a change.
pub fn text_changed(previous: &str, next: &str) -> bool {
    !next.is_empty() && previous != next
}

/// File changed if a file is present and its path differs from the previous one.
pub fn file_changed(previous: Option<&str>, next: Option<&str>) -> bool {
    match next {
        Some(next) if !next.is_empty() => previous != Some(next),
        _ => false,
    }
}

/// How two images should be compared on this poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageComparison {
    /// Full comparison of decoded pixels.
    Exact,
    /// Random-offset sampling of the raw buffers.
    Sampled,
}

/// Thresholds for the adaptive image comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDiffPolicy {
    /// Reads slower than this switch to sampling.
    pub slow_read_threshold: Duration,
    /// Poll interval when reads are fast.
    pub min_interval: Duration,
    /// Offsets inspected per sampled comparison.
    pub sample_count: usize,
}

impl ImageDiffPolicy {
    /// Pick the comparison and the next poll interval for a read that took `read_latency`.
    pub fn strategy(&self, read_latency: Duration) -> (ImageComparison, Duration) {
        if read_latency < self.slow_read_threshold {
            (ImageComparison::Exact, self.min_interval)
        } else {
            let stretched = read_latency.saturating_mul(2);
            (ImageComparison::Sampled, stretched.max(self.min_interval))
        }
    }
}

impl Default for ImageDiffPolicy {
    fn default() -> Self {
        Self {
            slow_read_threshold: Duration::from_millis(200),
            min_interval: Duration::from_millis(500),
            sample_count: DEFAULT_SAMPLE_COUNT,
        }
    }
}

/// Exact image comparison on decoded RGBA pixels.
///
/// A bitmap and a data URL of the same pixels compare equal. An empty
/// `next` image is never a change.
pub fn image_differs_exact(
    previous: &ImagePayload,
    next: &ImagePayload,
) -> Result<bool, ImageError> {
    if next.is_empty() {
        return Ok(false);
    }
    if previous.is_empty() {
        return Ok(true);
    }
    if previous == next {
        return Ok(false);
    }
    Ok(previous.to_bitmap()? != next.to_bitmap()?)
}

/// Approximate image comparison by random sampling.
///
/// Returns `true` if the buffers differ in length or at any of `samples`
/// random offsets. Equal buffers always compare unchanged; buffers that
/// differ in few positions may be reported unchanged.
pub fn image_differs_sampled<R: Rng + ?Sized>(
    previous: &[u8],
    next: &[u8],
    samples: usize,
    rng: &mut R,
) -> bool {
    if next.is_empty() {
        return false;
    }
    if previous.len() != next.len() {
        return true;
    }
    (0..samples).any(|_| {
        let offset = rng.gen_range(0..next.len());
        previous[offset] != next[offset]
    })
}
