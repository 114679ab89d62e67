//! Error types for segmux-media.

use segmux_common::CodecType;
use thiserror::Error;

/// Result type for segmux-media operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for segmux-media operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The buffer carries no payload.
    #[error("Empty payload")]
    EmptyPayload,

    /// No Annex-B start code was found.
    #[error("No NAL units found in {0} payload")]
    NoNalUnits(CodecType),

    /// The keyframe lacks a required parameter set.
    #[error("{codec} keyframe without {missing}")]
    MissingParameterSet {
        codec: CodecType,
        missing: &'static str,
    },
}

impl From<Error> for segmux_common::Error {
    fn from(err: Error) -> Self {
        segmux_common::Error::Extradata(err.to_string())
    }
}
