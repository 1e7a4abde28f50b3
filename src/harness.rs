//! Verification and benchmark harness for the defilter kernels.
//!
//! The random-image generator is a pure function of its arguments: two
//! indices walk a fixed byte table at different strides, so any two calls
//! with the same `(w, h, bpp, filter, seed)` produce identical buffers. The
//! equivalence check leans on that to hand the same input to two kernels and
//! diff the outputs byte-for-byte.

use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::DefilterFn;

/// The bytes-per-pixel values the kernels specialize over.
pub const BPP_VALUES: [u32; 6] = [1, 2, 3, 4, 6, 8];

/// Human-readable names for filter values 0..=5 as used by the harness.
pub const FILTER_NAMES: [&str; 6] = ["None", "Sub", "Up", "Avg", "Paeth", "Mixed"];

/// Pseudo-filter value that cycles through filters 0..=4 per row.
pub const FILTER_CYCLE: u32 = 5;

const FILTER_COUNT: u32 = 5;

/// Fixed entropy table for the deterministic image generator.
const RANDOM_DATA: [u8; 299] = [
    0xD9, 0xFA, 0xA7, 0x20, 0x6B, 0xD3, 0x41, 0xC9, 0x1A, 0x27, 0x2F, 0x64, 0x59,
    0x85, 0x47, 0x1C, 0xFC, 0x3E, 0xA3, 0x5B, 0x3C, 0xD2, 0xB5, 0xB6, 0x80, 0xBB,
    0x84, 0x3C, 0xD4, 0x94, 0x3A, 0x6D, 0xC2, 0x1B, 0x3D, 0x5F, 0x82, 0xD9, 0x1A,
    0x7F, 0xC6, 0x8D, 0x39, 0xDD, 0x07, 0xAD, 0x7A, 0x40, 0x8D, 0x37, 0x56, 0x12,
    0x8B, 0x51, 0xAF, 0x9D, 0x17, 0xBD, 0xD0, 0x61, 0x58, 0xC8, 0x05, 0x44, 0x9B,
    0xCA, 0xD4, 0xD0, 0xD0, 0xB9, 0x83, 0x75, 0x31, 0x4B, 0x09, 0xEC, 0x52, 0xEB,
    0xE5, 0xE8, 0xAA, 0xF6, 0xDD, 0x79, 0x36, 0x61, 0x17, 0xB1, 0x8A, 0x48, 0x00,
    0x1A, 0x9D, 0xDC, 0x51, 0x9F, 0x34, 0x7A, 0x48, 0x56, 0xC9, 0xF3, 0x6A, 0x81,
    0x9B, 0x47, 0x56, 0x64, 0x00, 0x30, 0x60, 0x04, 0x90, 0x4B, 0xC2, 0x48, 0xE3,
    0xED, 0x62, 0xDF, 0x46, 0xEF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFE, 0x94, 0xEE, 0x00, 0xA9, 0x3B, 0x86, 0x9B, 0xD8, 0xEE, 0x3D, 0x9E, 0x32,
    0x00, 0x00, 0x00, 0x00, 0x92, 0x61, 0x9F, 0x3B, 0x22, 0xB0, 0xB9, 0xB3, 0xB0,
    0x01, 0x01, 0x01, 0x01, 0xF4, 0x83, 0xFC, 0x49, 0xA9, 0xD2, 0x89, 0xE0, 0x17,
    0x74, 0x3E, 0xBD, 0x28, 0x74, 0x5E, 0xF8, 0x6D, 0xD2, 0x43, 0xB7, 0x5A, 0xB5,
    0xE6, 0xA4, 0xC7, 0xA4, 0x46, 0xD3, 0x00, 0x1A, 0x26, 0x0C, 0x65, 0x24, 0xAD,
    0xA7, 0xEA, 0xF4, 0xBD, 0xF6, 0x63, 0x2B, 0xEC, 0x1E, 0xDF, 0x0C, 0xBD, 0x50,
    0xEB, 0x71, 0xD9, 0x86, 0x31, 0x62, 0x5E, 0xE7, 0x4D, 0x8B, 0xD1, 0x11, 0x5B,
    0x26, 0x48, 0x9F, 0x8E, 0xE6, 0x7B, 0xE1, 0x0C, 0xF8, 0xCD, 0xF8, 0x90, 0x1E,
    0x4E, 0x24, 0xFE, 0x90, 0xD3, 0xA2, 0x2D, 0xFC, 0x4F, 0x3A, 0x2F, 0x1B, 0xE2,
    0xB8, 0xBF, 0x11, 0x68, 0x80, 0xCB, 0x26, 0xAD, 0x1C, 0x58, 0x4E, 0x57, 0x30,
    0x00, 0x00, 0x00, 0x86, 0x4A, 0x50, 0x36, 0x90, 0x5C, 0x40, 0xA7, 0x38, 0x92,
    0x03, 0xF0, 0x39, 0x82, 0x40, 0xED, 0x39, 0x22, 0x82, 0x90, 0x67, 0xDF, 0x95,
    0x34, 0x15, 0x8A, 0x0F, 0x25, 0x94, 0x56, 0xFD, 0x38, 0x85, 0x9B, 0x06, 0x22,
];

#[inline]
fn wrap(x: usize, advance: usize) -> usize {
    let x = x + advance;
    if x < RANDOM_DATA.len() {
        x
    } else {
        x - RANDOM_DATA.len()
    }
}

/// Generate a filtered test image, deterministic in all arguments.
///
/// Each row is a filter byte followed by `w * bpp` payload bytes. The first
/// row always gets filter 0; later rows get `filter`, or cycle through
/// 0..=4 when `filter` is [`FILTER_CYCLE`].
pub fn random_image(w: u32, h: u32, bpp: u32, filter: u32, seed: u32) -> Vec<u8> {
    let count = RANDOM_DATA.len();
    let mut index0 = seed as usize % count;
    let mut index1 = (seed as usize).wrapping_mul(33) % count;

    let row_bytes = (w * bpp) as usize;
    let mut image = Vec::with_capacity((row_bytes + 1) * h as usize);
    let mut cycled = filter;

    for y in 0..h {
        if y == 0 {
            // The first row of a real PNG can carry any filter; the sweep in
            // `check` pins it to 0 so every (filter, size) tuple exercises at
            // least one plain row. First-row filters get dedicated tests.
            image.push(0);
        } else if filter < FILTER_COUNT {
            image.push(filter as u8);
        } else {
            cycled += 1;
            if cycled >= FILTER_COUNT {
                cycled = 0;
            }
            image.push(cycled as u8);
        }

        let mut x = row_bytes;
        loop {
            image.push(RANDOM_DATA[index0]);
            index0 = wrap(index0, 1);
            x -= 1;
            if x == 0 {
                break;
            }

            image.push(RANDOM_DATA[index1]);
            index1 = wrap(index1, 2);
            x -= 1;
            if x == 0 {
                break;
            }
        }
    }

    image
}

/// Compare two defiltered buffers byte-for-byte, filter bytes included.
///
/// `a` is the reference output, `b` the candidate's. Returns the first
/// difference as a structured error.
pub fn compare_images(
    kernel: &str,
    a: &[u8],
    b: &[u8],
    w: u32,
    h: u32,
    bpp: u32,
    bpl: u32,
) -> Result<()> {
    if bpl != w * bpp + 1 {
        return Err(Error::InvalidRowStride { bpl, bpp, width: w });
    }

    for y in 0..h {
        let row = (y * bpl) as usize;
        let a_filter = a[row];
        let b_filter = b[row];

        if a_filter != b_filter {
            return Err(Error::FilterByteMismatch {
                kernel: kernel.to_string(),
                row: y,
                expected: a_filter,
                actual: b_filter,
            });
        }
        if a_filter >= FILTER_COUNT as u8 {
            return Err(Error::InvalidFilterByte {
                row: y,
                value: a_filter,
            });
        }

        for x in 0..w {
            for i in 0..bpp {
                let at = row + 1 + (x * bpp + i) as usize;
                if a[at] != b[at] {
                    return Err(Error::PixelMismatch {
                        kernel: kernel.to_string(),
                        width: w,
                        height: h,
                        bpp,
                        bpl,
                        row: y,
                        column: x,
                        byte: i,
                        expected: a[at],
                        actual: b[at],
                        filter: a_filter,
                    });
                }
            }
        }
    }

    Ok(())
}

/// Exhaustively verify `candidate` against `reference`.
///
/// Sweeps `filter ∈ 0..=5` (5 cycles filters per row), `h ∈ 1..20`,
/// `w ∈ 1..100` and every supported bpp, regenerating the same image for
/// both kernels from a shared seed. Returns the first mismatch.
pub fn check(name: &str, reference: DefilterFn, candidate: DefilterFn) -> Result<()> {
    let mut seed = 0u32;

    for filter in 0..=FILTER_CYCLE {
        for h in 1..20 {
            for w in 1..100 {
                for &bpp in &BPP_VALUES {
                    let bpl = w * bpp + 1;

                    let mut expected = random_image(w, h, bpp, filter, seed);
                    let mut actual = random_image(w, h, bpp, filter, seed);
                    debug_assert_eq!(expected, actual, "image generator must be deterministic");

                    reference(&mut expected, h, bpp, bpl);
                    candidate(&mut actual, h, bpp, bpl);

                    compare_images(name, &expected, &actual, w, h, bpp, bpl)?;
                    seed += 1;
                }
            }
        }
    }

    Ok(())
}

/// One benchmark measurement: `iterations` defilter calls over a 256x256
/// image with the given filter and bpp.
#[derive(Debug, Clone, Copy)]
pub struct BenchSample {
    /// Filter value used for every row past the first (5 = cycled).
    pub filter: u32,
    /// Bytes per pixel.
    pub bpp: u32,
    /// Total wall-clock time for all iterations.
    pub elapsed: Duration,
}

/// Benchmark a kernel over every (filter, bpp) pair.
///
/// Runs filters Sub through Mixed on a 256x256 image, 1000 iterations each.
/// The buffer is reconstructed in place and reused across iterations; the
/// work per call is identical either way, which is all throughput needs.
pub fn bench(func: DefilterFn) -> Vec<BenchSample> {
    const W: u32 = 256;
    const H: u32 = 256;
    const ITERATIONS: u32 = 1000;

    let mut samples = Vec::new();

    for filter in 1..=FILTER_CYCLE {
        for &bpp in &BPP_VALUES {
            let bpl = W * bpp + 1;
            let mut image = random_image(W, H, bpp, filter, 0);

            let start = Instant::now();
            for _ in 0..ITERATIONS {
                func(&mut image, H, bpp, bpl);
            }
            samples.push(BenchSample {
                filter,
                bpp,
                elapsed: start.elapsed(),
            });
        }
    }

    samples
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_is_deterministic() {
        let a = random_image(37, 11, 3, FILTER_CYCLE, 123);
        let b = random_image(37, 11, 3, FILTER_CYCLE, 123);
        assert_eq!(a, b);

        // Different seeds diverge.
        let c = random_image(37, 11, 3, FILTER_CYCLE, 124);
        assert_ne!(a, c);
    }

    #[test]
    fn test_generator_layout() {
        let w = 5;
        let h = 4;
        let bpp = 2;
        let image = random_image(w, h, bpp, 4, 9);
        assert_eq!(image.len(), ((w * bpp + 1) * h) as usize);

        // First row is unfiltered; the rest carry the requested filter.
        let bpl = (w * bpp + 1) as usize;
        assert_eq!(image[0], 0);
        assert_eq!(image[bpl], 4);
        assert_eq!(image[2 * bpl], 4);
    }

    #[test]
    fn test_generator_cycles_filters() {
        let w = 1;
        let h = 8;
        let image = random_image(w, h, 1, FILTER_CYCLE, 0);
        let bpl = 2;
        let filters: Vec<u8> = (0..h as usize).map(|y| image[y * bpl]).collect();
        assert_eq!(filters, vec![0, 0, 1, 2, 3, 4, 0, 1]);
    }

    #[test]
    fn test_compare_images_reports_first_difference() {
        let a = vec![0u8, 1, 2, 3, 4];
        let mut b = a.clone();
        b[3] = 9;

        let err = compare_images("unit", &a, &b, 2, 1, 2, 5).unwrap_err();
        match err {
            crate::Error::PixelMismatch {
                row, column, byte, ..
            } => {
                assert_eq!((row, column, byte), (0, 1, 0));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_compare_images_rejects_bad_stride() {
        let a = vec![0u8; 10];
        assert!(matches!(
            compare_images("unit", &a, &a, 3, 2, 1, 5),
            Err(crate::Error::InvalidRowStride { .. })
        ));
    }
}
