//! PNG scanline filter types and the byte arithmetic shared by all kernels.
//!
//! PNG prefixes every scanline with one filter-type byte and stores pixel
//! bytes as differences against neighboring bytes. Reconstruction is plain
//! unsigned mod-256 arithmetic; the only interesting pieces are the floor
//! average (hardware rounded averages do not match) and the Paeth predictor.

/// Scanline filter types as defined by the PNG specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    /// Bytes stored verbatim.
    None = 0,
    /// Difference from the byte `bpp` positions to the left.
    Sub = 1,
    /// Difference from the byte directly above.
    Up = 2,
    /// Difference from the floor average of left and above.
    Average = 3,
    /// Difference from the Paeth predictor of left, above and above-left.
    Paeth = 4,
}

impl FilterType {
    /// Parse a scanline's filter byte. Returns `None` for corrupt values.
    pub fn from_byte(value: u8) -> Option<FilterType> {
        match value {
            0 => Some(FilterType::None),
            1 => Some(FilterType::Sub),
            2 => Some(FilterType::Up),
            3 => Some(FilterType::Average),
            4 => Some(FilterType::Paeth),
            _ => None,
        }
    }
}

/// Floor average of two bytes, computed in 16-bit precision.
///
/// PNG requires truncation; SSE2's PAVGB rounds up and must not be used.
#[inline]
pub(crate) fn avg(a: u8, b: u8) -> u8 {
    ((a as u16 + b as u16) >> 1) as u8
}

/// Unsigned division by 3 as a multiply and shift, valid for `x <= 255`.
///
/// The SIMD kernels use the same identity through a 16-bit multiply-high
/// against `0xAB << 7`.
#[inline]
pub(crate) fn udiv3(x: i32) -> i32 {
    (x * 0xAB) >> 9
}

/// Paeth predictor.
///
/// Selects whichever of `a` (left), `b` (above), `c` (above-left) is closest
/// to `p = a + b - c`, preferring `a`, then `b`, on ties.
#[inline]
pub(crate) fn paeth_ref(a: u8, b: u8, c: u8) -> u8 {
    let a_i = a as i32;
    let b_i = b as i32;
    let c_i = c as i32;

    let p = a_i + b_i - c_i;
    let pa = (p - a_i).abs();
    let pb = (p - b_i).abs();
    let pc = (p - c_i).abs();

    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// Branchless Paeth predictor, equivalent to [`paeth_ref`] for every input.
///
/// The predictor only ever needs `min(a, b)` and `max(a, b)`: the interval
/// between them is split in thirds around `c`, and arithmetic shifts of the
/// two boundary signs mask in either `max`, `min`, or neither (leaving `c`).
/// At most one of the masked terms survives. This is the exact shape the
/// SSE2 Paeth kernel computes in 16-bit lanes.
#[inline]
pub(crate) fn paeth_opt(a: u8, b: u8, c: u8) -> u8 {
    let min_ab = a.min(b) as i32;
    let max_ab = a.max(b) as i32;
    let div_ab = udiv3(max_ab - min_ab);

    let min_ab = min_ab - c as i32;
    let max_ab = max_ab - c as i32;

    (c as i32 + (max_ab & !((div_ab + min_ab) >> 31)) + (min_ab & !((div_ab - max_ab) >> 31)))
        as u8
}

/// Split row `y` of a filtered image into its filter byte, its mutable
/// payload, and the (already reconstructed) payload of the row above.
///
/// The two payload slices are disjoint views into the same buffer. For the
/// first row the upper payload is empty; callers substitute the degenerate
/// filter arithmetic instead of reading it.
#[inline]
pub(crate) fn split_row(buf: &mut [u8], y: usize, bpl: usize) -> (u8, &mut [u8], &[u8]) {
    let (prev, cur) = buf.split_at_mut(y * bpl);
    let filter = cur[0];
    let row = &mut cur[1..bpl];
    let above = if y == 0 {
        &[][..]
    } else {
        &prev[(y - 1) * bpl + 1..y * bpl]
    };
    (filter, row, above)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_udiv3_matches_integer_division() {
        for x in 0..=255 {
            assert_eq!(udiv3(x), x / 3, "udiv3({x})");
        }
    }

    #[test]
    fn test_avg_floors() {
        assert_eq!(avg(1, 2), 1);
        assert_eq!(avg(255, 255), 255);
        assert_eq!(avg(255, 254), 254);
        assert_eq!(avg(0, 1), 0);
    }

    #[test]
    fn test_paeth_ref_basics() {
        // All equal: predictor is that value.
        assert_eq!(paeth_ref(100, 100, 100), 100);
        // p = 10 + 20 - 15 = 15; pc = 0 wins.
        assert_eq!(paeth_ref(10, 20, 15), 15);
        // Zero above-left degenerates to picking the smaller of a, b.
        assert_eq!(paeth_ref(10, 0, 0), 10);
    }

    #[test]
    fn test_paeth_opt_matches_ref_exhaustive() {
        for a in 0..=255u8 {
            for b in 0..=255u8 {
                for c in 0..=255u8 {
                    assert_eq!(
                        paeth_opt(a, b, c),
                        paeth_ref(a, b, c),
                        "paeth mismatch at a={a} b={b} c={c}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_paeth_symmetric_in_a_b() {
        for a in 0..=255u8 {
            for b in 0..=255u8 {
                for c in [0u8, 1, 127, 128, 254, 255] {
                    assert_eq!(paeth_ref(a, b, c), paeth_ref(b, a, c));
                }
            }
        }
    }

    #[test]
    fn test_filter_type_from_byte() {
        assert_eq!(FilterType::from_byte(0), Some(FilterType::None));
        assert_eq!(FilterType::from_byte(4), Some(FilterType::Paeth));
        assert_eq!(FilterType::from_byte(5), None);
        assert_eq!(FilterType::from_byte(255), None);
    }
}
