//! Common error types used throughout segmux.
//!
//! Every failure the recording core can observe maps onto one variant here.
//! None of them cross the pipeline boundary as a panic: the controller turns
//! each into a closed session, an event, or a log line.

use std::fmt;

use crate::types::MediaKind;

/// Common error type for segmux.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The parameter string or configuration was rejected.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The muxer backend could not open a container.
    #[error("Failed to open session at {path}: {message}")]
    OpenSession {
        /// The output path the session was opened for.
        path: String,
        /// Backend-provided description.
        message: String,
    },

    /// The muxer backend refused to create a track.
    #[error("Failed to create {kind} track: {message}")]
    TrackCreate {
        /// The media kind of the rejected track.
        kind: MediaKind,
        /// Backend-provided description.
        message: String,
    },

    /// The container header could not be written.
    #[error("Header write failed: {0}")]
    HeaderWrite(String),

    /// A frame could not be written to its track.
    #[error("Write failed on {kind} track: {message}")]
    Write {
        /// The media kind of the track that failed.
        kind: MediaKind,
        /// Backend-provided description.
        message: String,
    },

    /// The external naming callback reported failure.
    #[error("File naming callback failed: {0}")]
    NamingCallback(String),

    /// Codec extradata could not be obtained from a keyframe.
    #[error("Extradata unavailable: {0}")]
    Extradata(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new Config error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new OpenSession error.
    pub fn open_session(path: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::OpenSession {
            path: path.to_string(),
            message: message.into(),
        }
    }

    /// Create a new TrackCreate error.
    pub fn track_create<S: Into<String>>(kind: MediaKind, msg: S) -> Self {
        Self::TrackCreate {
            kind,
            message: msg.into(),
        }
    }

    /// Create a new HeaderWrite error.
    pub fn header_write<S: Into<String>>(msg: S) -> Self {
        Self::HeaderWrite(msg.into())
    }

    /// Create a new Write error.
    pub fn write<S: Into<String>>(kind: MediaKind, msg: S) -> Self {
        Self::Write {
            kind,
            message: msg.into(),
        }
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
