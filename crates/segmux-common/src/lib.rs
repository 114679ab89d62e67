//! Segmux-Common: Shared types, buffers, and parameter parsing.
//!
//! This crate provides common functionality used across segmux:
//!
//! - **Typed IDs**: Type-safe UUID wrappers for recording sessions
//! - **Core Types**: Media kinds, codec identifiers, and per-track configuration
//! - **Buffers**: Reference-counted, timestamped media payloads
//! - **Parameters**: The `key=value` parameter string format used for configuration
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use segmux_common::{Buffer, CodecType, MediaKind, TrackConfig};
//!
//! let track = TrackConfig::parse("type=video;codec=h264;width=1920;height=1080").unwrap();
//! assert_eq!(track.kind, MediaKind::Video);
//! assert_eq!(track.codec, CodecType::H264);
//!
//! let frame = Buffer::video(vec![0u8; 16], 40_000, true);
//! assert!(frame.is_keyframe());
//! ```

pub mod buffer;
pub mod error;
pub mod ids;
pub mod params;
pub mod types;

pub use buffer::Buffer;
pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
