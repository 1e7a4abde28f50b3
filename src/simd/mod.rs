//! SIMD acceleration for the defilter hot path.
//!
//! The vector kernels are architecture-specific; capability detection is
//! cached at first use so repeated calls pay no detection overhead. Targets
//! without a vector implementation fall back to the bpp-specialized scalar
//! kernel, which produces bit-identical output.

#[cfg(target_arch = "x86_64")]
use std::sync::LazyLock;

#[cfg(target_arch = "x86_64")]
pub(crate) mod x86_64;

/// Whether the SSE2 kernels may be used, detected once at startup.
#[cfg(target_arch = "x86_64")]
static HAS_SSE2: LazyLock<bool> = LazyLock::new(|| is_x86_feature_detected!("sse2"));

/// Reconstruct a filtered image buffer in place using the best available
/// vector kernel.
///
/// Same contract as [`defilter_ref`](crate::defilter_ref). On x86_64 this
/// runs the hand-written SSE2 kernels; elsewhere it degrades to
/// [`defilter_opt`](crate::defilter_opt). Output is byte-for-byte identical
/// either way.
pub fn defilter_simd(buf: &mut [u8], h: u32, bpp: u32, bpl: u32) {
    #[cfg(target_arch = "x86_64")]
    {
        if *HAS_SSE2 {
            // SAFETY: SSE2 support was verified by the cached feature check.
            unsafe { x86_64::defilter_sse2(buf, h, bpp, bpl) };
            return;
        }
    }

    crate::specialized::defilter_opt(buf, h, bpp, bpl);
}
