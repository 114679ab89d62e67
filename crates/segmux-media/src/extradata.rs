//! Codec extradata extraction.
//!
//! A container track can only be opened once the codec's parameter sets are
//! known. [`ParameterSetExtractor`] pulls them out of the first usable
//! keyframe: SPS+PPS for H.264 and VPS+SPS+PPS for H.265. Other codecs need
//! no extradata and yield an empty payload.

use bytes::{Bytes, BytesMut};
use segmux_common::{Buffer, CodecType};

use crate::error::{Error, Result};
use crate::nal::{self, split_annex_b};

/// Source of the header bytes a container needs to open a track.
pub trait ExtradataExtractor: Send {
    /// Extract extradata for `codec` from a keyframe.
    ///
    /// An empty `Bytes` means the codec needs none.
    fn extract(&self, codec: CodecType, keyframe: &Buffer) -> Result<Bytes>;
}

impl<F> ExtradataExtractor for F
where
    F: Fn(CodecType, &Buffer) -> Result<Bytes> + Send,
{
    fn extract(&self, codec: CodecType, keyframe: &Buffer) -> Result<Bytes> {
        self(codec, keyframe)
    }
}

/// Extracts in-band Annex-B parameter sets.
///
/// The returned extradata keeps each parameter set's start code, in stream
/// order, which is what Annex-B aware muxers expect.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParameterSetExtractor;

impl ParameterSetExtractor {
    pub fn new() -> Self {
        Self
    }
}

/// Parameter-set NAL types and their names, per codec.
fn required_sets(codec: CodecType) -> &'static [(u8, &'static str)] {
    match codec {
        CodecType::H264 => &[(nal::H264_SPS, "SPS"), (nal::H264_PPS, "PPS")],
        CodecType::H265 => &[
            (nal::H265_VPS, "VPS"),
            (nal::H265_SPS, "SPS"),
            (nal::H265_PPS, "PPS"),
        ],
        _ => &[],
    }
}

impl ExtradataExtractor for ParameterSetExtractor {
    fn extract(&self, codec: CodecType, keyframe: &Buffer) -> Result<Bytes> {
        let required = required_sets(codec);
        if required.is_empty() {
            return Ok(Bytes::new());
        }
        if keyframe.is_empty() {
            return Err(Error::EmptyPayload);
        }

        let units = split_annex_b(keyframe.data());
        if units.is_empty() {
            return Err(Error::NoNalUnits(codec));
        }

        let mut seen = vec![false; required.len()];
        let mut out = BytesMut::new();
        for unit in &units {
            let Some(unit_type) = unit.unit_type(codec) else {
                continue;
            };
            if let Some(pos) = required.iter().position(|&(t, _)| t == unit_type) {
                seen[pos] = true;
                out.extend_from_slice(unit.with_start_code);
            }
        }

        if let Some(pos) = seen.iter().position(|found| !found) {
            return Err(Error::MissingParameterSet {
                codec,
                missing: required[pos].1,
            });
        }

        tracing::debug!(%codec, bytes = out.len(), "Captured extradata from keyframe");
        Ok(out.freeze())
    }
}
