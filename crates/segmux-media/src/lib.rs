//! segmux-media: bitstream helpers for the recording core.
//!
//! # Modules
//!
//! - [`nal`] - Annex-B start-code splitting and H.264/H.265 NAL type decoding
//! - [`extradata`] - The [`ExtradataExtractor`] seam and the parameter-set
//!   implementation used to open container tracks from a keyframe

pub mod error;
pub mod extradata;
pub mod nal;

pub use error::{Error, Result};
pub use extradata::{ExtradataExtractor, ParameterSetExtractor};
pub use nal::{split_annex_b, NalUnit};
