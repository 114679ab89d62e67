//! Control commands.
//!
//! External intent reaches the controller only as a [`ControlCommand`]
//! applied between ingest cycles, so the controller stays a single-writer
//! state machine.

use std::fmt;

use crate::events::EventObserver;
use crate::naming::FileNamer;

/// A request to change controller policy.
pub enum ControlCommand {
    /// Switch streaming on or off.
    SetStreaming(bool),
    /// Segment length in seconds. Zero is ignored; negative disables rotation.
    SetSegmentDuration(i64),
    /// Output directory or file. Empty is ignored.
    SetOutputPath(String),
    /// File name prefix. Empty is ignored.
    SetFilePrefix(String),
    /// Register (or with `None`, remove) the external naming callback.
    SetFileNamer(Option<Box<dyn FileNamer>>),
    /// Register (or with `None`, remove) the event observer.
    SetObserver(Option<Box<dyn EventObserver>>),
}

impl ControlCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetStreaming(_) => "set_streaming",
            Self::SetSegmentDuration(_) => "set_segment_duration",
            Self::SetOutputPath(_) => "set_output_path",
            Self::SetFilePrefix(_) => "set_file_prefix",
            Self::SetFileNamer(_) => "set_file_namer",
            Self::SetObserver(_) => "set_observer",
        }
    }
}

impl fmt::Debug for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetStreaming(enabled) => f.debug_tuple("SetStreaming").field(enabled).finish(),
            Self::SetSegmentDuration(secs) => {
                f.debug_tuple("SetSegmentDuration").field(secs).finish()
            }
            Self::SetOutputPath(path) => f.debug_tuple("SetOutputPath").field(path).finish(),
            Self::SetFilePrefix(prefix) => f.debug_tuple("SetFilePrefix").field(prefix).finish(),
            Self::SetFileNamer(namer) => f
                .debug_tuple("SetFileNamer")
                .field(&namer.as_ref().map(|_| ".."))
                .finish(),
            Self::SetObserver(observer) => f
                .debug_tuple("SetObserver")
                .field(&observer.as_ref().map(|_| ".."))
                .finish(),
        }
    }
}
