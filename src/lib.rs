//! # depng
//!
//! SIMD-accelerated PNG reverse-filter (defiltering) kernels.
//!
//! A PNG encoder prefixes each scanline with a filter-type byte and stores
//! pixel bytes as differences against neighboring bytes; a decoder must undo
//! that transform between inflating the stream and handing pixels on. This
//! crate implements that hot path three ways over one in-place signature:
//!
//! - [`defilter_ref`] — scalar reference, a direct transcription of the PNG
//!   specification and the oracle for everything else.
//! - [`defilter_opt`] — the same algorithm monomorphized over the supported
//!   bytes-per-pixel values {1, 2, 3, 4, 6, 8}.
//! - [`defilter_simd`] — hand-written SSE2 kernels per filter and bpp, with
//!   a scalar fallback on other targets.
//!
//! All three produce byte-for-byte identical output; [`harness::check`]
//! proves it over an exhaustive sweep of small images.
//!
//! ## Example
//!
//! ```rust
//! // A 4x1 grayscale image, Sub-filtered: each byte stores the delta
//! // from its left neighbor.
//! let mut image = vec![1u8, 10, 20, 30, 40];
//! depng::defilter_simd(&mut image, 1, 1, 5);
//! assert_eq!(&image[1..], &[10, 30, 60, 100]);
//! ```
//!
//! Chunk parsing, CRC checking, inflation and color handling are left to the
//! embedding decoder; the kernels only see the decompressed scanline block.

#![warn(missing_docs)]

pub mod error;
pub mod filter;
pub mod harness;
mod reference;
mod simd;
mod specialized;

pub use error::{Error, Result};
pub use filter::FilterType;
pub use reference::defilter_ref;
pub use simd::defilter_simd;
pub use specialized::defilter_opt;

/// Signature shared by all defilter kernels: `(buf, h, bpp, bpl)`.
///
/// `buf` holds `h` rows of `bpl` bytes; each row is one filter byte followed
/// by `bpl - 1 = w * bpp` pixel bytes, reconstructed in place.
pub type DefilterFn = fn(&mut [u8], u32, u32, u32);
