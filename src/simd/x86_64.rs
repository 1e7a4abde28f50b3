//! x86_64 SSE2 defilter kernels.
//!
//! Each filter/bpp pair gets its own row kernel: a scalar head that walks
//! bytes until the store pointer is 16-byte aligned, a vector body, and a
//! scalar tail sized so no vector access ever leaves the current row. Reads
//! from the previous row are unaligned; stores into the current row are
//! always aligned.
//!
//! The Sub bodies turn the serial `p[i] += p[i - bpp]` recurrence into a
//! log-step parallel prefix sum: each `slli_si128` + `add_epi8` round doubles
//! the number of accumulated lags, and the running carry between blocks is
//! the register's top `bpp` bytes broadcast back into the low lanes. Avg and
//! Paeth widen bytes to 16-bit lanes and chase the pixel-to-pixel dependency
//! in-register, one pixel group per step.

use std::arch::x86_64::*;

use crate::filter::{avg, paeth_opt, split_row, FilterType};
use crate::reference;
use crate::specialized;

/// One prefix-sum round: fold `SHIFT` more bytes of lag into `p`.
macro_rules! sll_addb {
    ($p:ident, $shift:literal) => {
        $p = _mm_add_epi8($p, _mm_slli_si128($p, $shift));
    };
}

/// The same round applied to two independent registers, interleaved so the
/// two dependency chains overlap in the pipeline.
macro_rules! sll_addb_2x {
    ($p0:ident, $p1:ident, $shift:literal) => {
        let t0 = _mm_slli_si128($p0, $shift);
        let t1 = _mm_slli_si128($p1, $shift);
        $p0 = _mm_add_epi8($p0, t0);
        $p1 = _mm_add_epi8($p1, t1);
    };
}

/// Branchless Paeth predictor over eight 16-bit lanes.
///
/// `mulhi_epu16` against `0xAB << 7` divides the min/max spread by 3; the
/// arithmetic shifts of the two boundary signs mask in `max`, `min`, or
/// neither, leaving `c`. Mirrors the scalar `paeth_opt` exactly.
#[inline]
#[target_feature(enable = "sse2")]
unsafe fn paeth_epi16(a: __m128i, b: __m128i, c: __m128i) -> __m128i {
    let rcp3 = _mm_set1_epi16((0xAB << 7) as i16);

    let min_ab = _mm_min_epi16(a, b);
    let max_ab = _mm_max_epi16(a, b);
    let div_ab = _mm_mulhi_epu16(_mm_sub_epi16(max_ab, min_ab), rcp3);

    let min_ab = _mm_sub_epi16(min_ab, c);
    let max_ab = _mm_sub_epi16(max_ab, c);

    let r = _mm_add_epi16(
        c,
        _mm_andnot_si128(_mm_srai_epi16(_mm_add_epi16(div_ab, min_ab), 15), max_ab),
    );
    _mm_add_epi16(
        r,
        _mm_andnot_si128(_mm_srai_epi16(_mm_sub_epi16(div_ab, max_ab), 15), min_ab),
    )
}

/// Explicit little-endian seeds keep lane 0 at the lowest address on any
/// target byte order.
#[inline]
fn load_u16_le(bytes: &[u8], k: usize) -> i32 {
    u16::from_le_bytes([bytes[k], bytes[k + 1]]) as i32
}

#[inline]
fn load_u24_le(bytes: &[u8], k: usize) -> i32 {
    u32::from_le_bytes([bytes[k], bytes[k + 1], bytes[k + 2], 0]) as i32
}

#[inline]
fn load_u32_le(bytes: &[u8], k: usize) -> i32 {
    u32::from_le_bytes([bytes[k], bytes[k + 1], bytes[k + 2], bytes[k + 3]]) as i32
}

/// Reconstruct a filtered image buffer in place with the SSE2 kernels.
///
/// # Safety
/// Caller must ensure SSE2 is available on the current CPU.
#[target_feature(enable = "sse2")]
pub(crate) unsafe fn defilter_sse2(buf: &mut [u8], h: u32, bpp: u32, bpl: u32) {
    let bpp = bpp as usize;
    let bpl = bpl as usize;

    for y in 0..h as usize {
        let (filter, row, above) = split_row(buf, y, bpl);
        match FilterType::from_byte(filter) {
            Some(FilterType::Sub) => sub_dispatch(row, bpp),
            Some(FilterType::Up) if y > 0 => up_sse2(row, above),
            Some(FilterType::Average) => {
                if y == 0 {
                    reference::avg_first_row(row, bpp);
                } else {
                    avg_dispatch(row, above, bpp);
                }
            }
            Some(FilterType::Paeth) => {
                if y == 0 {
                    // Implicit zero row above: Paeth degenerates to Sub.
                    sub_dispatch(row, bpp);
                } else {
                    paeth_dispatch(row, above, bpp);
                }
            }
            _ => {}
        }
    }
}

#[target_feature(enable = "sse2")]
unsafe fn sub_dispatch(row: &mut [u8], bpp: usize) {
    match bpp {
        1 => sub_bpp1(row),
        2 => sub_bpp2(row),
        3 => sub_bpp3(row),
        4 => sub_bpp4(row),
        6 => sub_bpp6(row),
        8 => sub_bpp8(row),
        _ => reference::sub_row(row, bpp),
    }
}

#[target_feature(enable = "sse2")]
unsafe fn avg_dispatch(row: &mut [u8], above: &[u8], bpp: usize) {
    match bpp {
        1 => avg_bpp1(row, above),
        // No vector formulation amortizes a 2- or 3-byte lag; the
        // specialized scalar loops win there.
        2 => specialized::avg_row::<2>(row, above),
        3 => specialized::avg_row::<3>(row, above),
        4 => avg_bpp4(row, above),
        6 => avg_bpp6(row, above),
        8 => avg_bpp8(row, above),
        _ => reference::avg_row(row, above, bpp),
    }
}

#[target_feature(enable = "sse2")]
unsafe fn paeth_dispatch(row: &mut [u8], above: &[u8], bpp: usize) {
    match bpp {
        1 => paeth_bpp1(row, above),
        3 => paeth_bpp3(row, above),
        4 => paeth_bpp4(row, above),
        6 => paeth_bpp6(row, above),
        8 => paeth_bpp8(row, above),
        _ => paeth_scalar(row, above, bpp),
    }
}

// ============================================================================
// Sub
// ============================================================================

#[target_feature(enable = "sse2")]
unsafe fn sub_bpp1(row: &mut [u8]) {
    let mut i = row.len() - 1;
    let mut k = 0usize;

    if i >= 32 {
        let head = row.as_ptr().add(k + 1).align_offset(16);
        i -= head;
        for _ in 0..head {
            row[k + 1] = row[k + 1].wrapping_add(row[k]);
            k += 1;
        }

        let mut p0 = _mm_cvtsi32_si128(row[k] as i32);

        while i >= 64 {
            let p = row.as_mut_ptr().add(k);
            p0 = _mm_add_epi8(p0, _mm_load_si128(p.add(1) as *const __m128i));
            let mut p1 = _mm_load_si128(p.add(17) as *const __m128i);
            let mut p2 = _mm_load_si128(p.add(33) as *const __m128i);
            let mut p3 = _mm_load_si128(p.add(49) as *const __m128i);

            sll_addb_2x!(p0, p2, 1);
            sll_addb_2x!(p0, p2, 2);
            sll_addb_2x!(p0, p2, 4);
            sll_addb_2x!(p0, p2, 8);
            _mm_store_si128(p.add(1) as *mut __m128i, p0);

            p0 = _mm_srli_si128(p0, 15);
            let t2 = _mm_srli_si128(p2, 15);
            p1 = _mm_add_epi8(p1, p0);
            p3 = _mm_add_epi8(p3, t2);

            sll_addb_2x!(p1, p3, 1);
            sll_addb_2x!(p1, p3, 2);
            sll_addb_2x!(p1, p3, 4);
            sll_addb_2x!(p1, p3, 8);
            _mm_store_si128(p.add(17) as *mut __m128i, p1);

            // Splat the top byte of the second block across the register and
            // fold it into the two blocks summed without it.
            p1 = _mm_unpackhi_epi8(p1, p1);
            p1 = _mm_unpackhi_epi16(p1, p1);
            p1 = _mm_shuffle_epi32(p1, 0b11_11_11_11);

            p2 = _mm_add_epi8(p2, p1);
            p3 = _mm_add_epi8(p3, p1);

            _mm_store_si128(p.add(33) as *mut __m128i, p2);
            _mm_store_si128(p.add(49) as *mut __m128i, p3);
            p0 = _mm_srli_si128(p3, 15);

            k += 64;
            i -= 64;
        }

        while i >= 16 {
            let p = row.as_mut_ptr().add(k);
            p0 = _mm_add_epi8(p0, _mm_load_si128(p.add(1) as *const __m128i));

            sll_addb!(p0, 1);
            sll_addb!(p0, 2);
            sll_addb!(p0, 4);
            sll_addb!(p0, 8);

            _mm_store_si128(p.add(1) as *mut __m128i, p0);
            p0 = _mm_srli_si128(p0, 15);

            k += 16;
            i -= 16;
        }
    }

    while i != 0 {
        row[k + 1] = row[k + 1].wrapping_add(row[k]);
        k += 1;
        i -= 1;
    }
}

#[target_feature(enable = "sse2")]
unsafe fn sub_bpp2(row: &mut [u8]) {
    let mut i = row.len() - 2;
    let mut k = 0usize;

    if i >= 32 {
        let head = row.as_ptr().add(k + 2).align_offset(16);
        i -= head;
        for _ in 0..head {
            row[k + 2] = row[k + 2].wrapping_add(row[k]);
            k += 1;
        }

        let mut p0 = _mm_cvtsi32_si128(load_u16_le(row, k));

        while i >= 64 {
            let p = row.as_mut_ptr().add(k);
            p0 = _mm_add_epi8(p0, _mm_load_si128(p.add(2) as *const __m128i));
            let mut p1 = _mm_load_si128(p.add(18) as *const __m128i);
            let mut p2 = _mm_load_si128(p.add(34) as *const __m128i);
            let mut p3 = _mm_load_si128(p.add(50) as *const __m128i);

            sll_addb_2x!(p0, p2, 2);
            sll_addb_2x!(p0, p2, 4);
            sll_addb_2x!(p0, p2, 8);
            _mm_store_si128(p.add(2) as *mut __m128i, p0);

            p0 = _mm_srli_si128(p0, 14);
            let t2 = _mm_srli_si128(p2, 14);
            p1 = _mm_add_epi8(p1, p0);
            p3 = _mm_add_epi8(p3, t2);

            sll_addb_2x!(p1, p3, 2);
            sll_addb_2x!(p1, p3, 4);
            sll_addb_2x!(p1, p3, 8);
            _mm_store_si128(p.add(18) as *mut __m128i, p1);

            p1 = _mm_unpackhi_epi16(p1, p1);
            p1 = _mm_shuffle_epi32(p1, 0b11_11_11_11);

            p2 = _mm_add_epi8(p2, p1);
            p3 = _mm_add_epi8(p3, p1);

            _mm_store_si128(p.add(34) as *mut __m128i, p2);
            _mm_store_si128(p.add(50) as *mut __m128i, p3);
            p0 = _mm_srli_si128(p3, 14);

            k += 64;
            i -= 64;
        }

        while i >= 16 {
            let p = row.as_mut_ptr().add(k);
            p0 = _mm_add_epi8(p0, _mm_load_si128(p.add(2) as *const __m128i));

            sll_addb!(p0, 2);
            sll_addb!(p0, 4);
            sll_addb!(p0, 8);

            _mm_store_si128(p.add(2) as *mut __m128i, p0);
            p0 = _mm_srli_si128(p0, 14);

            k += 16;
            i -= 16;
        }
    }

    while i != 0 {
        row[k + 2] = row[k + 2].wrapping_add(row[k]);
        k += 1;
        i -= 1;
    }
}

#[target_feature(enable = "sse2")]
unsafe fn sub_bpp3(row: &mut [u8]) {
    let mut i = row.len() - 3;
    let mut k = 0usize;

    if i >= 32 {
        let head = row.as_ptr().add(k + 3).align_offset(16);
        i -= head;
        for _ in 0..head {
            row[k + 3] = row[k + 3].wrapping_add(row[k]);
            k += 1;
        }

        let ext3b = _mm_set1_epi32(0x0100_0001);
        let mut p0 = _mm_cvtsi32_si128(load_u24_le(row, k));

        while i >= 64 {
            let p = row.as_mut_ptr().add(k);
            p0 = _mm_add_epi8(p0, _mm_load_si128(p.add(3) as *const __m128i));
            let mut p1 = _mm_load_si128(p.add(19) as *const __m128i);
            let mut p2 = _mm_load_si128(p.add(35) as *const __m128i);

            sll_addb_2x!(p0, p2, 3);
            sll_addb_2x!(p0, p2, 6);
            sll_addb_2x!(p0, p2, 12);

            let mut p3 = _mm_load_si128(p.add(51) as *const __m128i);
            let t0 = _mm_srli_si128(p0, 13);
            let t2 = _mm_srli_si128(p2, 13);

            p1 = _mm_add_epi8(p1, t0);
            p3 = _mm_add_epi8(p3, t2);

            sll_addb_2x!(p1, p3, 3);
            sll_addb_2x!(p1, p3, 6);
            sll_addb_2x!(p1, p3, 12);
            _mm_store_si128(p.add(3) as *mut __m128i, p0);

            // A 3-byte carry doesn't land on a lane boundary: replicate the
            // top pixel via a 32-bit multiply and reorder the 16-bit halves
            // so the pattern repeats across the whole register.
            p0 = _mm_shuffle_epi32(p1, 0b11_11_11_11);
            p0 = _mm_srli_epi32(p0, 8);
            p0 = _mm_mul_epu32(p0, ext3b);

            p0 = _mm_shufflelo_epi16(p0, 0b00_10_01_00);
            p0 = _mm_shufflehi_epi16(p0, 0b01_00_10_01);

            _mm_store_si128(p.add(19) as *mut __m128i, p1);
            p2 = _mm_add_epi8(p2, p0);
            p0 = _mm_shuffle_epi32(p0, 0b01_11_10_01);

            _mm_store_si128(p.add(35) as *mut __m128i, p2);
            p0 = _mm_add_epi8(p0, p3);

            _mm_store_si128(p.add(51) as *mut __m128i, p0);
            p0 = _mm_srli_si128(p0, 13);

            k += 64;
            i -= 64;
        }

        while i >= 16 {
            let p = row.as_mut_ptr().add(k);
            p0 = _mm_add_epi8(p0, _mm_load_si128(p.add(3) as *const __m128i));

            sll_addb!(p0, 3);
            sll_addb!(p0, 6);
            sll_addb!(p0, 12);

            _mm_store_si128(p.add(3) as *mut __m128i, p0);
            p0 = _mm_srli_si128(p0, 13);

            k += 16;
            i -= 16;
        }
    }

    while i != 0 {
        row[k + 3] = row[k + 3].wrapping_add(row[k]);
        k += 1;
        i -= 1;
    }
}

#[target_feature(enable = "sse2")]
unsafe fn sub_bpp4(row: &mut [u8]) {
    let mut i = row.len() - 4;
    let mut k = 0usize;

    if i >= 32 {
        let head = row.as_ptr().add(k + 4).align_offset(16);
        i -= head;
        for _ in 0..head {
            row[k + 4] = row[k + 4].wrapping_add(row[k]);
            k += 1;
        }

        let mut p0 = _mm_cvtsi32_si128(load_u32_le(row, k));

        while i >= 64 {
            let p = row.as_mut_ptr().add(k);
            p0 = _mm_add_epi8(p0, _mm_load_si128(p.add(4) as *const __m128i));
            let mut p1 = _mm_load_si128(p.add(20) as *const __m128i);
            let mut p2 = _mm_load_si128(p.add(36) as *const __m128i);
            let mut p3 = _mm_load_si128(p.add(52) as *const __m128i);

            sll_addb_2x!(p0, p2, 4);
            sll_addb_2x!(p0, p2, 8);
            _mm_store_si128(p.add(4) as *mut __m128i, p0);

            p0 = _mm_srli_si128(p0, 12);
            let t2 = _mm_srli_si128(p2, 12);

            p1 = _mm_add_epi8(p1, p0);
            p3 = _mm_add_epi8(p3, t2);

            sll_addb_2x!(p1, p3, 4);
            sll_addb_2x!(p1, p3, 8);

            p0 = _mm_shuffle_epi32(p1, 0b11_11_11_11);
            _mm_store_si128(p.add(20) as *mut __m128i, p1);

            p2 = _mm_add_epi8(p2, p0);
            p0 = _mm_add_epi8(p0, p3);

            _mm_store_si128(p.add(36) as *mut __m128i, p2);
            _mm_store_si128(p.add(52) as *mut __m128i, p0);
            p0 = _mm_srli_si128(p0, 12);

            k += 64;
            i -= 64;
        }

        while i >= 16 {
            let p = row.as_mut_ptr().add(k);
            p0 = _mm_add_epi8(p0, _mm_load_si128(p.add(4) as *const __m128i));

            sll_addb!(p0, 4);
            sll_addb!(p0, 8);

            _mm_store_si128(p.add(4) as *mut __m128i, p0);
            p0 = _mm_srli_si128(p0, 12);

            k += 16;
            i -= 16;
        }
    }

    while i != 0 {
        row[k + 4] = row[k + 4].wrapping_add(row[k]);
        k += 1;
        i -= 1;
    }
}

#[target_feature(enable = "sse2")]
unsafe fn sub_bpp6(row: &mut [u8]) {
    let mut i = row.len() - 6;
    let mut k = 0usize;

    if i >= 32 {
        let head = row.as_ptr().add(k + 6).align_offset(16);
        i -= head;
        for _ in 0..head {
            row[k + 6] = row[k + 6].wrapping_add(row[k]);
            k += 1;
        }

        // Load eight bytes and clear the top two to seed a 6-byte carry.
        let mut p0 = _mm_loadl_epi64(row.as_ptr().add(k) as *const __m128i);
        p0 = _mm_slli_epi64(p0, 16);
        p0 = _mm_srli_epi64(p0, 16);

        while i >= 64 {
            let p = row.as_mut_ptr().add(k);
            p0 = _mm_add_epi8(p0, _mm_load_si128(p.add(6) as *const __m128i));
            let mut p1 = _mm_load_si128(p.add(22) as *const __m128i);
            let mut p2 = _mm_load_si128(p.add(38) as *const __m128i);

            sll_addb_2x!(p0, p2, 6);
            sll_addb_2x!(p0, p2, 12);

            let mut p3 = _mm_load_si128(p.add(54) as *const __m128i);
            _mm_store_si128(p.add(6) as *mut __m128i, p0);

            p0 = _mm_srli_si128(p0, 10);
            let t1 = _mm_srli_si128(p2, 10);

            p1 = _mm_add_epi8(p1, p0);
            p3 = _mm_add_epi8(p3, t1);

            sll_addb_2x!(p1, p3, 6);
            sll_addb_2x!(p1, p3, 12);
            p0 = _mm_shuffle_epi32(p1, 0b11_10_11_10);

            // Rotate the 16-bit lanes so the top 6 bytes repeat across the
            // register.
            p0 = _mm_shufflelo_epi16(p0, 0b01_11_10_01);
            p0 = _mm_shufflehi_epi16(p0, 0b10_01_11_10);

            _mm_store_si128(p.add(22) as *mut __m128i, p1);
            p2 = _mm_add_epi8(p2, p0);
            p0 = _mm_shuffle_epi32(p0, 0b01_11_10_01);

            _mm_store_si128(p.add(38) as *mut __m128i, p2);
            p0 = _mm_add_epi8(p0, p3);

            _mm_store_si128(p.add(54) as *mut __m128i, p0);
            p0 = _mm_srli_si128(p0, 10);

            k += 64;
            i -= 64;
        }

        while i >= 16 {
            let p = row.as_mut_ptr().add(k);
            p0 = _mm_add_epi8(p0, _mm_load_si128(p.add(6) as *const __m128i));

            sll_addb!(p0, 6);
            sll_addb!(p0, 12);

            _mm_store_si128(p.add(6) as *mut __m128i, p0);
            p0 = _mm_srli_si128(p0, 10);

            k += 16;
            i -= 16;
        }
    }

    while i != 0 {
        row[k + 6] = row[k + 6].wrapping_add(row[k]);
        k += 1;
        i -= 1;
    }
}

#[target_feature(enable = "sse2")]
unsafe fn sub_bpp8(row: &mut [u8]) {
    let mut i = row.len() - 8;
    let mut k = 0usize;

    if i >= 32 {
        let head = row.as_ptr().add(k + 8).align_offset(16);
        i -= head;
        for _ in 0..head {
            row[k + 8] = row[k + 8].wrapping_add(row[k]);
            k += 1;
        }

        let mut p0 = _mm_loadl_epi64(row.as_ptr().add(k) as *const __m128i);

        while i >= 64 {
            let p = row.as_mut_ptr().add(k);
            p0 = _mm_add_epi8(p0, _mm_load_si128(p.add(8) as *const __m128i));
            let mut p1 = _mm_load_si128(p.add(24) as *const __m128i);
            let mut p2 = _mm_load_si128(p.add(40) as *const __m128i);
            let mut p3 = _mm_load_si128(p.add(56) as *const __m128i);

            sll_addb_2x!(p0, p2, 8);
            _mm_store_si128(p.add(8) as *mut __m128i, p0);

            p0 = _mm_srli_si128(p0, 8);
            let t2 = _mm_shuffle_epi32(p2, 0b11_10_11_10);
            p1 = _mm_add_epi8(p1, p0);

            sll_addb_2x!(p1, p3, 8);
            p0 = _mm_shuffle_epi32(p1, 0b11_10_11_10);
            p3 = _mm_add_epi8(p3, t2);
            _mm_store_si128(p.add(24) as *mut __m128i, p1);

            p2 = _mm_add_epi8(p2, p0);
            p0 = _mm_add_epi8(p0, p3);

            _mm_store_si128(p.add(40) as *mut __m128i, p2);
            _mm_store_si128(p.add(56) as *mut __m128i, p0);
            p0 = _mm_srli_si128(p0, 8);

            k += 64;
            i -= 64;
        }

        while i >= 16 {
            let p = row.as_mut_ptr().add(k);
            p0 = _mm_add_epi8(p0, _mm_load_si128(p.add(8) as *const __m128i));

            sll_addb!(p0, 8);

            _mm_store_si128(p.add(8) as *mut __m128i, p0);
            p0 = _mm_srli_si128(p0, 8);

            k += 16;
            i -= 16;
        }
    }

    while i != 0 {
        row[k + 8] = row[k + 8].wrapping_add(row[k]);
        k += 1;
        i -= 1;
    }
}

// ============================================================================
// Up
// ============================================================================

/// The Up filter has no intra-row dependency, so this is a plain widening of
/// the byte add: aligned loads from the row, unaligned from the row above.
#[target_feature(enable = "sse2")]
unsafe fn up_sse2(row: &mut [u8], above: &[u8]) {
    let mut i = row.len();
    let mut k = 0usize;

    if i >= 24 {
        let head = row.as_ptr().align_offset(16);
        i -= head;
        for _ in 0..head {
            row[k] = row[k].wrapping_add(above[k]);
            k += 1;
        }

        while i >= 64 {
            let p = row.as_mut_ptr().add(k);
            let u = above.as_ptr().add(k);

            let u0 = _mm_loadu_si128(u as *const __m128i);
            let u1 = _mm_loadu_si128(u.add(16) as *const __m128i);

            let mut p0 = _mm_load_si128(p as *const __m128i);
            let mut p1 = _mm_load_si128(p.add(16) as *const __m128i);

            let u2 = _mm_loadu_si128(u.add(32) as *const __m128i);
            let u3 = _mm_loadu_si128(u.add(48) as *const __m128i);

            p0 = _mm_add_epi8(p0, u0);
            p1 = _mm_add_epi8(p1, u1);

            let mut p2 = _mm_load_si128(p.add(32) as *const __m128i);
            let mut p3 = _mm_load_si128(p.add(48) as *const __m128i);

            p2 = _mm_add_epi8(p2, u2);
            p3 = _mm_add_epi8(p3, u3);

            _mm_store_si128(p as *mut __m128i, p0);
            _mm_store_si128(p.add(16) as *mut __m128i, p1);
            _mm_store_si128(p.add(32) as *mut __m128i, p2);
            _mm_store_si128(p.add(48) as *mut __m128i, p3);

            k += 64;
            i -= 64;
        }

        while i >= 8 {
            let p = row.as_mut_ptr().add(k);
            let u0 = _mm_loadl_epi64(above.as_ptr().add(k) as *const __m128i);
            let mut p0 = _mm_loadl_epi64(p as *const __m128i);

            p0 = _mm_add_epi8(p0, u0);
            _mm_storel_epi64(p as *mut __m128i, p0);

            k += 8;
            i -= 8;
        }
    }

    while i != 0 {
        row[k] = row[k].wrapping_add(above[k]);
        k += 1;
        i -= 1;
    }
}

// ============================================================================
// Avg
// ============================================================================

/// A 1-byte lag makes Avg nearly serial. The SIMD here only precomputes
/// `2*p + u` in 16-bit lanes eight bytes at a time; the divide-by-two chain
/// itself is walked with scalar shifts.
#[target_feature(enable = "sse2")]
unsafe fn avg_bpp1(row: &mut [u8], above: &[u8]) {
    row[0] = row[0].wrapping_add(above[0] >> 1);

    let mut i = row.len() - 1;
    let mut k = 0usize;

    if i >= 32 {
        let head = row.as_ptr().add(k + 1).align_offset(16);
        i -= head;
        for _ in 0..head {
            row[k + 1] = row[k + 1].wrapping_add(avg(row[k], above[k + 1]));
            k += 1;
        }

        let zero = _mm_setzero_si128();
        let mut t0 = row[k] as u32;

        while i >= 8 {
            let mut p0 = _mm_loadl_epi64(row.as_ptr().add(k + 1) as *const __m128i);
            let mut u0 = _mm_loadl_epi64(above.as_ptr().add(k + 1) as *const __m128i);

            p0 = _mm_unpacklo_epi8(p0, zero);
            u0 = _mm_unpacklo_epi8(u0, zero);

            p0 = _mm_slli_epi16(p0, 1);
            p0 = _mm_add_epi16(p0, u0);

            // Each 32-bit extract carries two 16-bit lanes; the stray upper
            // lane is shifted past the byte mask.
            let mut t1 = _mm_cvtsi128_si32(p0) as u32;
            p0 = _mm_srli_si128(p0, 4);
            t0 = ((t0 + t1) >> 1) & 0xFF;
            t1 >>= 16;
            row[k + 1] = t0 as u8;

            t0 = ((t0 + t1) >> 1) & 0xFF;
            t1 = _mm_cvtsi128_si32(p0) as u32;
            p0 = _mm_srli_si128(p0, 4);
            row[k + 2] = t0 as u8;

            t0 = ((t0 + t1) >> 1) & 0xFF;
            t1 >>= 16;
            row[k + 3] = t0 as u8;

            t0 = ((t0 + t1) >> 1) & 0xFF;
            t1 = _mm_cvtsi128_si32(p0) as u32;
            p0 = _mm_srli_si128(p0, 4);
            row[k + 4] = t0 as u8;

            t0 = ((t0 + t1) >> 1) & 0xFF;
            t1 >>= 16;
            row[k + 5] = t0 as u8;

            t0 = ((t0 + t1) >> 1) & 0xFF;
            t1 = _mm_cvtsi128_si32(p0) as u32;
            row[k + 6] = t0 as u8;

            t0 = ((t0 + t1) >> 1) & 0xFF;
            t1 >>= 16;
            row[k + 7] = t0 as u8;

            t0 = ((t0 + t1) >> 1) & 0xFF;
            row[k + 8] = t0 as u8;

            k += 8;
            i -= 8;
        }
    }

    while i != 0 {
        row[k + 1] = row[k + 1].wrapping_add(avg(row[k], above[k + 1]));
        k += 1;
        i -= 1;
    }
}

/// Avg with a 4-byte lag: two prefix stages per register half in 9-bit
/// precision, renormalized to bytes with `>> 2 & 0x00FF` after each stage.
#[target_feature(enable = "sse2")]
unsafe fn avg_bpp4(row: &mut [u8], above: &[u8]) {
    for j in 0..4 {
        row[j] = row[j].wrapping_add(above[j] >> 1);
    }

    let mut i = row.len() - 4;
    let mut k = 0usize;

    if i >= 32 {
        let head = row.as_ptr().add(k + 4).align_offset(16);
        i -= head;
        for _ in 0..head {
            row[k + 4] = row[k + 4].wrapping_add(avg(row[k], above[k + 4]));
            k += 1;
        }

        let zero = _mm_setzero_si128();
        let m00ff = _mm_set1_epi16(0x00FF);
        let m01ff = _mm_set1_epi16(0x01FF);

        let mut t1 = _mm_unpacklo_epi8(_mm_cvtsi32_si128(load_u32_le(row, k)), zero);

        while i >= 16 {
            let p = row.as_mut_ptr().add(k);
            let u = above.as_ptr().add(k + 4);

            let mut p0 = _mm_load_si128(p.add(4) as *const __m128i);
            let mut u0 = _mm_loadu_si128(u as *const __m128i);

            let mut p1 = p0;
            p0 = _mm_unpacklo_epi8(p0, zero);

            let mut u1 = u0;
            p0 = _mm_slli_epi16(p0, 1);

            u0 = _mm_unpacklo_epi8(u0, zero);
            p0 = _mm_add_epi16(p0, t1);

            p1 = _mm_unpackhi_epi8(p1, zero);
            p0 = _mm_add_epi16(p0, u0);
            p0 = _mm_and_si128(p0, m01ff);

            u1 = _mm_unpackhi_epi8(u1, zero);
            t1 = _mm_slli_si128(p0, 8);
            p0 = _mm_slli_epi16(p0, 1);

            p1 = _mm_slli_epi16(p1, 1);
            p0 = _mm_add_epi16(p0, t1);
            p0 = _mm_srli_epi16(p0, 2);

            p1 = _mm_add_epi16(p1, u1);
            p0 = _mm_and_si128(p0, m00ff);
            t1 = _mm_srli_si128(p0, 8);

            p1 = _mm_add_epi16(p1, t1);
            p1 = _mm_and_si128(p1, m01ff);

            t1 = _mm_slli_si128(p1, 8);
            p1 = _mm_slli_epi16(p1, 1);

            t1 = _mm_add_epi16(t1, p1);
            t1 = _mm_srli_epi16(t1, 2);
            t1 = _mm_and_si128(t1, m00ff);

            p0 = _mm_packus_epi16(p0, t1);
            t1 = _mm_srli_si128(t1, 8);
            _mm_store_si128(p.add(4) as *mut __m128i, p0);

            k += 16;
            i -= 16;
        }
    }

    while i != 0 {
        row[k + 4] = row[k + 4].wrapping_add(avg(row[k], above[k + 4]));
        k += 1;
        i -= 1;
    }
}

/// Avg with a 6-byte lag: three widened pixel groups per 16-byte block,
/// chained `(u + prev) >> 1` then repacked with shuffles.
#[target_feature(enable = "sse2")]
unsafe fn avg_bpp6(row: &mut [u8], above: &[u8]) {
    for j in 0..6 {
        row[j] = row[j].wrapping_add(above[j] >> 1);
    }

    let mut i = row.len() - 6;
    let mut k = 0usize;

    if i >= 32 {
        let head = row.as_ptr().add(k + 6).align_offset(16);
        i -= head;
        for _ in 0..head {
            row[k + 6] = row[k + 6].wrapping_add(avg(row[k], above[k + 6]));
            k += 1;
        }

        let zero = _mm_setzero_si128();
        let mut t1 = _mm_loadl_epi64(row.as_ptr().add(k) as *const __m128i);

        while i >= 16 {
            let p = row.as_mut_ptr().add(k);
            let u = above.as_ptr().add(k + 6);

            let mut u0 = _mm_loadu_si128(u as *const __m128i);
            t1 = _mm_unpacklo_epi8(t1, zero);
            let mut p0 = _mm_load_si128(p.add(6) as *const __m128i);

            let mut p1 = _mm_srli_si128(p0, 6);
            let mut u1 = _mm_srli_si128(u0, 6);

            let mut p2 = _mm_srli_si128(p0, 12);
            let mut u2 = _mm_srli_si128(u0, 12);

            p0 = _mm_unpacklo_epi8(p0, zero);
            u0 = _mm_unpacklo_epi8(u0, zero);

            p1 = _mm_unpacklo_epi8(p1, zero);
            u1 = _mm_unpacklo_epi8(u1, zero);

            p2 = _mm_unpacklo_epi8(p2, zero);
            u2 = _mm_unpacklo_epi8(u2, zero);

            u0 = _mm_add_epi16(u0, t1);
            u0 = _mm_srli_epi16(u0, 1);
            p0 = _mm_add_epi8(p0, u0);

            u1 = _mm_add_epi16(u1, p0);
            u1 = _mm_srli_epi16(u1, 1);
            p1 = _mm_add_epi8(p1, u1);

            u2 = _mm_add_epi16(u2, p1);
            u2 = _mm_srli_epi16(u2, 1);
            p2 = _mm_add_epi8(p2, u2);

            p0 = _mm_slli_si128(p0, 4);
            p0 = _mm_packus_epi16(p0, p1);
            p0 = _mm_slli_si128(p0, 2);
            p0 = _mm_srli_si128(p0, 4);

            p2 = _mm_packus_epi16(p2, p2);
            p2 = _mm_slli_si128(p2, 12);
            p0 = _mm_or_si128(p0, p2);

            _mm_store_si128(p.add(6) as *mut __m128i, p0);
            t1 = _mm_srli_si128(p0, 10);

            k += 16;
            i -= 16;
        }
    }

    while i != 0 {
        row[k + 6] = row[k + 6].wrapping_add(avg(row[k], above[k + 6]));
        k += 1;
        i -= 1;
    }
}

/// Avg with an 8-byte lag: the two register halves are independent chains;
/// the finished low half seeds the high half.
#[target_feature(enable = "sse2")]
unsafe fn avg_bpp8(row: &mut [u8], above: &[u8]) {
    for j in 0..8 {
        row[j] = row[j].wrapping_add(above[j] >> 1);
    }

    let mut i = row.len() - 8;
    let mut k = 0usize;

    if i >= 32 {
        let head = row.as_ptr().add(k + 8).align_offset(16);
        i -= head;
        for _ in 0..head {
            row[k + 8] = row[k + 8].wrapping_add(avg(row[k], above[k + 8]));
            k += 1;
        }

        let zero = _mm_setzero_si128();
        let mut t1 = _mm_unpacklo_epi8(
            _mm_loadl_epi64(row.as_ptr().add(k) as *const __m128i),
            zero,
        );

        while i >= 16 {
            let p = row.as_mut_ptr().add(k);
            let u = above.as_ptr().add(k + 8);

            let mut u0 = _mm_loadu_si128(u as *const __m128i);
            let mut p0 = _mm_load_si128(p.add(8) as *const __m128i);

            let mut u1 = u0;
            let mut p1 = p0;
            u0 = _mm_unpacklo_epi8(u0, zero);
            p0 = _mm_unpacklo_epi8(p0, zero);

            u0 = _mm_add_epi16(u0, t1);
            p1 = _mm_unpackhi_epi8(p1, zero);
            u0 = _mm_srli_epi16(u0, 1);
            u1 = _mm_unpackhi_epi8(u1, zero);

            p0 = _mm_add_epi8(p0, u0);
            u1 = _mm_add_epi16(u1, p0);
            u1 = _mm_srli_epi16(u1, 1);
            p1 = _mm_add_epi8(p1, u1);

            let packed = _mm_packus_epi16(p0, p1);
            t1 = p1;
            _mm_store_si128(p.add(8) as *mut __m128i, packed);

            k += 16;
            i -= 16;
        }
    }

    while i != 0 {
        row[k + 8] = row[k + 8].wrapping_add(avg(row[k], above[k + 8]));
        k += 1;
        i -= 1;
    }
}

// ============================================================================
// Paeth
// ============================================================================

/// Scalar Paeth used for bpp values without a vector path and for the
/// heads/tails of the vector kernels.
fn paeth_scalar(row: &mut [u8], above: &[u8], bpp: usize) {
    for i in 0..bpp {
        row[i] = row[i].wrapping_add(above[i]);
    }
    for i in bpp..row.len() {
        row[i] = row[i].wrapping_add(paeth_opt(row[i - bpp], above[i], above[i - bpp]));
    }
}

/// At bpp 1 the dependency is fully serial; the only optimization is keeping
/// the previous row/column bytes in registers between iterations.
fn paeth_bpp1(row: &mut [u8], above: &[u8]) {
    let mut pz = 0u8;
    let mut uz = 0u8;

    for i in 0..row.len() {
        let u0 = above[i];
        pz = row[i].wrapping_add(paeth_opt(pz, u0, uz));
        row[i] = pz;
        uz = u0;
    }
}

#[target_feature(enable = "sse2")]
unsafe fn paeth_bpp3(row: &mut [u8], above: &[u8]) {
    for j in 0..3 {
        row[j] = row[j].wrapping_add(above[j]);
    }

    let mut i = row.len() - 3;
    let mut k = 0usize;

    if i >= 32 {
        let head = row.as_ptr().add(k + 3).align_offset(16);
        i -= head;
        for _ in 0..head {
            row[k + 3] = row[k + 3].wrapping_add(paeth_opt(row[k], above[k + 3], above[k]));
            k += 1;
        }

        let zero = _mm_setzero_si128();
        let mask = _mm_setr_epi32(-1, 0x0000_FFFF, 0, 0);

        let mut pz = _mm_unpacklo_epi8(_mm_cvtsi32_si128(load_u24_le(row, k)), zero);
        let mut uz = _mm_unpacklo_epi8(_mm_cvtsi32_si128(load_u24_le(above, k)), zero);

        // Eight bytes per block: two full 3-byte pixels plus the first two
        // bytes of the third; the leftover lanes roll into the next block's
        // seeds.
        while i >= 8 {
            let p = row.as_mut_ptr().add(k);
            let u = above.as_ptr().add(k);

            let mut p0 = _mm_loadl_epi64(p.add(3) as *const __m128i);
            let mut u0 = _mm_loadl_epi64(u.add(3) as *const __m128i);

            u0 = _mm_unpacklo_epi8(u0, zero);
            p0 = _mm_unpacklo_epi8(p0, zero);
            let u1 = _mm_srli_si128(u0, 6);

            uz = paeth_epi16(pz, u0, uz);
            uz = _mm_and_si128(uz, mask);
            p0 = _mm_add_epi8(p0, uz);

            uz = paeth_epi16(p0, u1, u0);
            uz = _mm_and_si128(uz, mask);
            uz = _mm_slli_si128(uz, 6);
            p0 = _mm_add_epi8(p0, uz);

            let p1 = _mm_srli_si128(p0, 6);
            let mut u2 = _mm_srli_si128(u1, 6);

            u2 = paeth_epi16(p1, u2, u1);
            u2 = _mm_slli_si128(u2, 12);

            p0 = _mm_add_epi8(p0, u2);
            pz = _mm_srli_si128(p0, 10);
            uz = _mm_srli_si128(u1, 4);

            p0 = _mm_packus_epi16(p0, p0);
            _mm_storel_epi64(p.add(3) as *mut __m128i, p0);

            k += 8;
            i -= 8;
        }
    }

    while i != 0 {
        row[k + 3] = row[k + 3].wrapping_add(paeth_opt(row[k], above[k + 3], above[k]));
        k += 1;
        i -= 1;
    }
}

#[target_feature(enable = "sse2")]
unsafe fn paeth_bpp4(row: &mut [u8], above: &[u8]) {
    for j in 0..4 {
        row[j] = row[j].wrapping_add(above[j]);
    }

    let mut i = row.len() - 4;
    let mut k = 0usize;

    if i >= 32 {
        let head = row.as_ptr().add(k + 4).align_offset(16);
        i -= head;
        for _ in 0..head {
            row[k + 4] = row[k + 4].wrapping_add(paeth_opt(row[k], above[k + 4], above[k]));
            k += 1;
        }

        let zero = _mm_setzero_si128();
        let mask = _mm_setr_epi32(-1, -1, 0, 0);

        let mut pz = _mm_unpacklo_epi8(_mm_cvtsi32_si128(load_u32_le(row, k)), zero);
        let mut uz = _mm_unpacklo_epi8(_mm_cvtsi32_si128(load_u32_le(above, k)), zero);

        while i >= 16 {
            let p = row.as_mut_ptr().add(k);
            let u = above.as_ptr().add(k);

            let mut p0 = _mm_load_si128(p.add(4) as *const __m128i);
            let mut u0 = _mm_loadu_si128(u.add(4) as *const __m128i);

            let mut p1 = _mm_unpackhi_epi8(p0, zero);
            p0 = _mm_unpacklo_epi8(p0, zero);
            let mut u1 = _mm_unpackhi_epi8(u0, zero);
            u0 = _mm_unpacklo_epi8(u0, zero);

            uz = paeth_epi16(pz, u0, uz);
            uz = _mm_and_si128(uz, mask);
            p0 = _mm_add_epi8(p0, uz);
            uz = _mm_shuffle_epi32(u0, 0b01_00_11_10);

            u0 = paeth_epi16(p0, uz, u0);
            u0 = _mm_slli_si128(u0, 8);
            p0 = _mm_add_epi8(p0, u0);
            pz = _mm_srli_si128(p0, 8);

            uz = paeth_epi16(pz, u1, uz);
            uz = _mm_and_si128(uz, mask);
            p1 = _mm_add_epi8(p1, uz);
            uz = _mm_shuffle_epi32(u1, 0b01_00_11_10);

            u1 = paeth_epi16(p1, uz, u1);
            u1 = _mm_slli_si128(u1, 8);
            p1 = _mm_add_epi8(p1, u1);
            pz = _mm_srli_si128(p1, 8);

            p0 = _mm_packus_epi16(p0, p1);
            _mm_store_si128(p.add(4) as *mut __m128i, p0);

            k += 16;
            i -= 16;
        }
    }

    while i != 0 {
        row[k + 4] = row[k + 4].wrapping_add(paeth_opt(row[k], above[k + 4], above[k]));
        k += 1;
        i -= 1;
    }
}

#[target_feature(enable = "sse2")]
unsafe fn paeth_bpp6(row: &mut [u8], above: &[u8]) {
    for j in 0..6 {
        row[j] = row[j].wrapping_add(above[j]);
    }

    let mut i = row.len() - 6;
    let mut k = 0usize;

    if i >= 32 {
        let head = row.as_ptr().add(k + 6).align_offset(16);
        i -= head;
        for _ in 0..head {
            row[k + 6] = row[k + 6].wrapping_add(paeth_opt(row[k], above[k + 6], above[k]));
            k += 1;
        }

        let zero = _mm_setzero_si128();

        let mut pz = _mm_unpacklo_epi8(
            _mm_loadl_epi64(row.as_ptr().add(k) as *const __m128i),
            zero,
        );
        let mut uz = _mm_unpacklo_epi8(
            _mm_loadl_epi64(above.as_ptr().add(k) as *const __m128i),
            zero,
        );

        while i >= 16 {
            let p = row.as_mut_ptr().add(k);
            let u = above.as_ptr().add(k);

            let mut p0 = _mm_load_si128(p.add(6) as *const __m128i);
            let mut u0 = _mm_loadu_si128(u.add(6) as *const __m128i);

            let mut p1 = _mm_srli_si128(p0, 6);
            p0 = _mm_unpacklo_epi8(p0, zero);
            let mut u1 = _mm_srli_si128(u0, 6);
            u0 = _mm_unpacklo_epi8(u0, zero);

            uz = paeth_epi16(pz, u0, uz);
            p0 = _mm_add_epi8(p0, uz);

            let mut p2 = _mm_srli_si128(p1, 6);
            let mut u2 = _mm_srli_si128(u1, 6);
            p1 = _mm_unpacklo_epi8(p1, zero);
            u1 = _mm_unpacklo_epi8(u1, zero);

            u0 = paeth_epi16(p0, u1, u0);
            p1 = _mm_add_epi8(p1, u0);

            p2 = _mm_unpacklo_epi8(p2, zero);
            u2 = _mm_unpacklo_epi8(u2, zero);

            u0 = paeth_epi16(p1, u2, u1);
            p2 = _mm_add_epi8(p2, u0);

            p0 = _mm_slli_si128(p0, 4);
            p0 = _mm_packus_epi16(p0, p1);
            p0 = _mm_slli_si128(p0, 2);
            p0 = _mm_srli_si128(p0, 4);

            p2 = _mm_shuffle_epi32(p2, 0b01_00_01_00);
            u2 = _mm_shuffle_epi32(u2, 0b01_00_01_00);

            pz = _mm_shuffle_epi32(_mm_unpackhi_epi32(p1, p2), 0b11_11_01_00);
            uz = _mm_shuffle_epi32(_mm_unpackhi_epi32(u1, u2), 0b11_11_01_00);

            p2 = _mm_packus_epi16(p2, p2);
            p2 = _mm_slli_si128(p2, 12);
            p0 = _mm_or_si128(p0, p2);

            _mm_store_si128(p.add(6) as *mut __m128i, p0);

            k += 16;
            i -= 16;
        }
    }

    while i != 0 {
        row[k + 6] = row[k + 6].wrapping_add(paeth_opt(row[k], above[k + 6], above[k]));
        k += 1;
        i -= 1;
    }
}

#[target_feature(enable = "sse2")]
unsafe fn paeth_bpp8(row: &mut [u8], above: &[u8]) {
    for j in 0..8 {
        row[j] = row[j].wrapping_add(above[j]);
    }

    let mut i = row.len() - 8;
    let mut k = 0usize;

    if i >= 32 {
        let head = row.as_ptr().add(k + 8).align_offset(16);
        i -= head;
        for _ in 0..head {
            row[k + 8] = row[k + 8].wrapping_add(paeth_opt(row[k], above[k + 8], above[k]));
            k += 1;
        }

        let zero = _mm_setzero_si128();

        let mut pz = _mm_unpacklo_epi8(
            _mm_loadl_epi64(row.as_ptr().add(k) as *const __m128i),
            zero,
        );
        let mut uz = _mm_unpacklo_epi8(
            _mm_loadl_epi64(above.as_ptr().add(k) as *const __m128i),
            zero,
        );

        // The lag equals half the register: two predictor steps finish a
        // whole 16-byte block.
        while i >= 16 {
            let p = row.as_mut_ptr().add(k);
            let u = above.as_ptr().add(k);

            let mut p0 = _mm_load_si128(p.add(8) as *const __m128i);
            let mut u0 = _mm_loadu_si128(u.add(8) as *const __m128i);

            let p1 = _mm_unpackhi_epi8(p0, zero);
            p0 = _mm_unpacklo_epi8(p0, zero);
            let u1 = _mm_unpackhi_epi8(u0, zero);
            u0 = _mm_unpacklo_epi8(u0, zero);

            uz = paeth_epi16(pz, u0, uz);
            p0 = _mm_add_epi8(p0, uz);

            pz = paeth_epi16(p0, u1, u0);
            pz = _mm_add_epi8(pz, p1);
            uz = u1;

            p0 = _mm_packus_epi16(p0, pz);
            _mm_store_si128(p.add(8) as *mut __m128i, p0);

            k += 16;
            i -= 16;
        }
    }

    while i != 0 {
        row[k + 8] = row[k + 8].wrapping_add(paeth_opt(row[k], above[k + 8], above[k]));
        k += 1;
        i -= 1;
    }
}
