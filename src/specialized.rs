//! Bytes-per-pixel specialized defilter kernel.
//!
//! The same algorithm as the reference kernel with `bpp` lifted to a const
//! generic parameter. Monomorphizing over the closed set {1, 2, 3, 4, 6, 8}
//! turns every stride into a compile-time constant, lets the compiler unroll
//! the per-pixel prologues, and opens the inner loops to autovectorization.

use crate::filter::{avg, paeth_ref, split_row, FilterType};
use crate::reference::defilter_ref;

/// Reconstruct a filtered image buffer in place using the bpp-specialized
/// scalar kernel.
///
/// Same contract as [`defilter_ref`](crate::defilter_ref). Unsupported bpp
/// values fall back to the reference kernel.
pub fn defilter_opt(buf: &mut [u8], h: u32, bpp: u32, bpl: u32) {
    match bpp {
        1 => defilter_rows::<1>(buf, h, bpl),
        2 => defilter_rows::<2>(buf, h, bpl),
        3 => defilter_rows::<3>(buf, h, bpl),
        4 => defilter_rows::<4>(buf, h, bpl),
        6 => defilter_rows::<6>(buf, h, bpl),
        8 => defilter_rows::<8>(buf, h, bpl),
        _ => defilter_ref(buf, h, bpp, bpl),
    }
}

fn defilter_rows<const BPP: usize>(buf: &mut [u8], h: u32, bpl: u32) {
    let bpl = bpl as usize;

    for y in 0..h as usize {
        let (filter, row, above) = split_row(buf, y, bpl);
        match FilterType::from_byte(filter) {
            Some(FilterType::Sub) => sub_row::<BPP>(row),
            Some(FilterType::Up) if y > 0 => up_row(row, above),
            Some(FilterType::Average) => {
                if y == 0 {
                    avg_first_row::<BPP>(row);
                } else {
                    avg_row::<BPP>(row, above);
                }
            }
            Some(FilterType::Paeth) => {
                if y == 0 {
                    sub_row::<BPP>(row);
                } else {
                    paeth_row::<BPP>(row, above);
                }
            }
            _ => {}
        }
    }
}

fn sub_row<const BPP: usize>(row: &mut [u8]) {
    for i in BPP..row.len() {
        row[i] = row[i].wrapping_add(row[i - BPP]);
    }
}

/// The Up filter has no intra-row dependency, so a single shared loop
/// vectorizes regardless of bpp.
fn up_row(row: &mut [u8], above: &[u8]) {
    for (p, &u) in row.iter_mut().zip(above) {
        *p = p.wrapping_add(u);
    }
}

pub(crate) fn avg_row<const BPP: usize>(row: &mut [u8], above: &[u8]) {
    for i in 0..BPP.min(row.len()) {
        row[i] = row[i].wrapping_add(above[i] >> 1);
    }
    for i in BPP..row.len() {
        row[i] = row[i].wrapping_add(avg(row[i - BPP], above[i]));
    }
}

pub(crate) fn avg_first_row<const BPP: usize>(row: &mut [u8]) {
    for i in BPP..row.len() {
        row[i] = row[i].wrapping_add(row[i - BPP] >> 1);
    }
}

fn paeth_row<const BPP: usize>(row: &mut [u8], above: &[u8]) {
    for i in 0..BPP.min(row.len()) {
        row[i] = row[i].wrapping_add(above[i]);
    }
    for i in BPP..row.len() {
        row[i] = row[i].wrapping_add(paeth_ref(row[i - BPP], above[i], above[i - BPP]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::{random_image, FILTER_CYCLE};

    #[test]
    fn test_matches_reference_on_small_images() {
        for filter in 0..=FILTER_CYCLE {
            for &bpp in &[1u32, 2, 3, 4, 6, 8] {
                for w in [1u32, 2, 5, 17] {
                    let h = 4;
                    let bpl = w * bpp + 1;
                    let mut expected = random_image(w, h, bpp, filter, 7);
                    let mut actual = expected.clone();

                    defilter_ref(&mut expected, h, bpp, bpl);
                    defilter_opt(&mut actual, h, bpp, bpl);
                    assert_eq!(
                        expected, actual,
                        "mismatch for filter={filter} bpp={bpp} w={w}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_unsupported_bpp_falls_back() {
        // bpp 5 is outside the supported set; both kernels must still agree.
        let mut expected = vec![1u8, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10];
        let mut actual = expected.clone();
        defilter_ref(&mut expected, 1, 5, 11);
        defilter_opt(&mut actual, 1, 5, 11);
        assert_eq!(expected, actual);
    }
}
