//! Error types for the depng library.
//!
//! The kernels themselves never report errors; they assume their documented
//! preconditions. Everything here is surfaced by the verification harness.

use std::fmt;

/// Result type alias for depng operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced while verifying kernel output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Row stride doesn't match `width * bpp + 1`.
    InvalidRowStride {
        /// Bytes per line handed to the comparator.
        bpl: u32,
        /// Bytes per pixel.
        bpp: u32,
        /// Image width in pixels.
        width: u32,
    },
    /// A scanline carries a filter byte outside `0..=4`.
    InvalidFilterByte {
        /// Row index of the corrupt scanline.
        row: u32,
        /// The offending byte value.
        value: u8,
    },
    /// Two kernels disagree on a filter byte.
    FilterByteMismatch {
        /// Name of the kernel under test.
        kernel: String,
        /// Row index.
        row: u32,
        /// Filter byte produced by the reference kernel.
        expected: u8,
        /// Filter byte produced by the candidate kernel.
        actual: u8,
    },
    /// Two kernels disagree on a reconstructed pixel byte.
    PixelMismatch {
        /// Name of the kernel under test.
        kernel: String,
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
        /// Bytes per pixel.
        bpp: u32,
        /// Bytes per line including the filter byte.
        bpl: u32,
        /// Row of the first differing byte.
        row: u32,
        /// Pixel column of the first differing byte.
        column: u32,
        /// Byte index within the pixel.
        byte: u32,
        /// Value produced by the reference kernel.
        expected: u8,
        /// Value produced by the candidate kernel.
        actual: u8,
        /// Filter byte of the offending row.
        filter: u8,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidRowStride { bpl, bpp, width } => {
                write!(
                    f,
                    "invalid row stride {} for bpp {} and width {}",
                    bpl, bpp, width
                )
            }
            Error::InvalidFilterByte { row, value } => {
                write!(f, "invalid filter byte {} at row {}", value, row)
            }
            Error::FilterByteMismatch {
                kernel,
                row,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "{}: filter byte mismatch at row {}: {} != {}",
                    kernel, row, expected, actual
                )
            }
            Error::PixelMismatch {
                kernel,
                width,
                height,
                bpp,
                bpl,
                row,
                column,
                byte,
                expected,
                actual,
                filter,
            } => {
                write!(
                    f,
                    "{}: [{}x{}|bpp:{}|bpl:{}] pixel mismatch at y={} x={} byte={}: \
                     {} != {} (filter {})",
                    kernel, width, height, bpp, bpl, row, column, byte, expected, actual, filter
                )
            }
        }
    }
}

impl std::error::Error for Error {}
