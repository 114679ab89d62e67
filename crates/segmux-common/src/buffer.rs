//! Reference-counted media buffers.
//!
//! A [`Buffer`] is an immutable view over a [`Bytes`] payload plus the
//! metadata the recording core needs: media kind, a microsecond timestamp,
//! and the keyframe and end-of-stream flags. Cloning is cheap (an atomic
//! increment), so one buffer can move from a producer thread through a queue
//! into the worker without copying.

use bytes::Bytes;

use crate::types::MediaKind;

/// Shared, timestamped media payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buffer {
    kind: Option<MediaKind>,
    data: Bytes,
    timestamp_us: i64,
    keyframe: bool,
    eos: bool,
}

impl Buffer {
    /// An encoded video frame.
    pub fn video(data: impl Into<Bytes>, timestamp_us: i64, keyframe: bool) -> Self {
        Self {
            kind: Some(MediaKind::Video),
            data: data.into(),
            timestamp_us,
            keyframe,
            eos: false,
        }
    }

    /// An encoded audio frame.
    pub fn audio(data: impl Into<Bytes>, timestamp_us: i64) -> Self {
        Self {
            kind: Some(MediaKind::Audio),
            data: data.into(),
            timestamp_us,
            keyframe: false,
            eos: false,
        }
    }

    /// An untyped byte range, as emitted by callback-mode sessions.
    pub fn untyped(data: impl Into<Bytes>, timestamp_us: i64) -> Self {
        Self {
            kind: None,
            data: data.into(),
            timestamp_us,
            keyframe: false,
            eos: false,
        }
    }

    /// A zero-length end-of-stream marker for `kind`.
    pub fn end_of_stream(kind: MediaKind, timestamp_us: i64) -> Self {
        Self {
            kind: Some(kind),
            data: Bytes::new(),
            timestamp_us,
            keyframe: false,
            eos: true,
        }
    }

    /// Restrict the valid region to the first `len` bytes.
    ///
    /// Producers that fill a larger allocation use this to expose only the
    /// bytes they wrote. `len` larger than the payload is clamped.
    #[must_use]
    pub fn with_valid_len(mut self, len: usize) -> Self {
        let len = len.min(self.data.len());
        self.data = self.data.slice(..len);
        self
    }

    /// The media kind, or `None` for untyped output.
    pub fn kind(&self) -> Option<MediaKind> {
        self.kind
    }

    /// The valid payload bytes.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Number of valid payload bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Presentation timestamp in microseconds.
    pub fn timestamp_us(&self) -> i64 {
        self.timestamp_us
    }

    pub fn is_keyframe(&self) -> bool {
        self.keyframe
    }

    pub fn is_eos(&self) -> bool {
        self.eos
    }
}
