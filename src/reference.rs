//! Reference defilter kernel.
//!
//! A direct transcription of the PNG specification's reconstruction rules.
//! Every other kernel in this crate is checked byte-for-byte against this
//! one, so it stays deliberately plain: indexed loops, no specialization.

use crate::filter::{avg, paeth_ref, split_row, FilterType};

/// Reconstruct a filtered image buffer in place using the scalar reference
/// kernel.
///
/// `buf` holds `h` rows of `bpl` bytes, each row a filter byte followed by
/// `bpl - 1` pixel bytes. Callers must uphold `bpl == w * bpp + 1`, `h >= 1`
/// and `buf.len() >= h as usize * bpl as usize`; the kernel does not
/// validate. Filter bytes outside `0..=4` leave their row untouched.
pub fn defilter_ref(buf: &mut [u8], h: u32, bpp: u32, bpl: u32) {
    let bpp = bpp as usize;
    let bpl = bpl as usize;

    for y in 0..h as usize {
        let (filter, row, above) = split_row(buf, y, bpl);
        match FilterType::from_byte(filter) {
            Some(FilterType::Sub) => sub_row(row, bpp),
            Some(FilterType::Up) if y > 0 => up_row(row, above),
            Some(FilterType::Average) => {
                if y == 0 {
                    avg_first_row(row, bpp);
                } else {
                    avg_row(row, above, bpp);
                }
            }
            Some(FilterType::Paeth) => {
                if y == 0 {
                    // With a zero row above, the Paeth predictor always
                    // selects the left byte.
                    sub_row(row, bpp);
                } else {
                    paeth_row(row, above, bpp);
                }
            }
            // None, Up against the implicit zero first row, or a corrupt
            // filter byte: nothing to undo.
            _ => {}
        }
    }
}

pub(crate) fn sub_row(row: &mut [u8], bpp: usize) {
    for i in bpp..row.len() {
        row[i] = row[i].wrapping_add(row[i - bpp]);
    }
}

pub(crate) fn up_row(row: &mut [u8], above: &[u8]) {
    for (p, &u) in row.iter_mut().zip(above) {
        *p = p.wrapping_add(u);
    }
}

pub(crate) fn avg_row(row: &mut [u8], above: &[u8], bpp: usize) {
    for i in 0..bpp {
        row[i] = row[i].wrapping_add(above[i] >> 1);
    }
    for i in bpp..row.len() {
        row[i] = row[i].wrapping_add(avg(row[i - bpp], above[i]));
    }
}

/// Average filter against the implicit zero row: only the left term remains.
pub(crate) fn avg_first_row(row: &mut [u8], bpp: usize) {
    for i in bpp..row.len() {
        row[i] = row[i].wrapping_add(row[i - bpp] >> 1);
    }
}

pub(crate) fn paeth_row(row: &mut [u8], above: &[u8], bpp: usize) {
    for i in 0..bpp {
        row[i] = row[i].wrapping_add(above[i]);
    }
    for i in bpp..row.len() {
        row[i] = row[i].wrapping_add(paeth_ref(row[i - bpp], above[i], above[i - bpp]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_row() {
        let mut row = vec![1u8, 10, 20, 30, 40];
        sub_row(&mut row, 1);
        assert_eq!(row, vec![1, 11, 31, 61, 101]);
    }

    #[test]
    fn test_sub_row_wrapping() {
        let mut row = vec![200u8, 100];
        sub_row(&mut row, 1);
        assert_eq!(row, vec![200, 44]);
    }

    #[test]
    fn test_up_row() {
        let mut row = vec![10u8, 20, 30];
        up_row(&mut row, &[1, 2, 3]);
        assert_eq!(row, vec![11, 22, 33]);
    }

    #[test]
    fn test_avg_row_floors() {
        let mut row = vec![2u8, 4];
        avg_row(&mut row, &[10, 21], 1);
        // 2 + 10/2 = 7, then 4 + (7 + 21)/2 = 18.
        assert_eq!(row, vec![7, 18]);
    }

    #[test]
    fn test_paeth_row() {
        let mut row = vec![1u8, 1, 1, 1, 1, 1];
        paeth_row(&mut row, &[10, 20, 30, 40, 50, 60], 3);
        assert_eq!(row, vec![11, 21, 31, 41, 51, 61]);
    }

    #[test]
    fn test_none_rows_untouched() {
        let mut buf = vec![0u8, 9, 8, 7, 0, 6, 5, 4];
        let original = buf.clone();
        defilter_ref(&mut buf, 2, 1, 4);
        assert_eq!(buf, original);
    }

    #[test]
    fn test_up_on_first_row_is_noop() {
        let mut buf = vec![2u8, 9, 8, 7];
        defilter_ref(&mut buf, 1, 1, 4);
        assert_eq!(buf, vec![2, 9, 8, 7]);
    }
}
