//! The muxer backend seam.
//!
//! A [`MuxerBackend`] opens containers; a [`Container`] owns one open output
//! and exposes the four primitives a recording session needs: create a
//! track, write the header once, write frames per track, and finalize.
//! Backends are looked up by the configured name in a [`BackendRegistry`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use segmux_common::{Buffer, Result, TrackConfig};

use crate::memory::MemoryBackend;

/// Receives finished container byte ranges in callback mode.
pub type ByteSink = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Destination for a container's bytes.
#[derive(Clone)]
pub enum IoTarget {
    /// Write to the file named in the request.
    File,
    /// Hand every finished byte range to the sink.
    Callback(ByteSink),
}

impl IoTarget {
    pub fn is_callback(&self) -> bool {
        matches!(self, Self::Callback(_))
    }
}

impl fmt::Debug for IoTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => f.write_str("File"),
            Self::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

/// Everything a backend needs to open one container.
#[derive(Debug, Clone)]
pub struct OpenRequest<'a> {
    /// Resolved output path. In callback mode it only names the stream.
    pub path: &'a str,
    /// Output container tag, if configured.
    pub container: Option<&'a str>,
    /// Backend-specific dictionary string, if configured.
    pub dictionary: Option<&'a str>,
    pub io: IoTarget,
}

/// Backend-assigned track identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackHandle(pub u32);

impl fmt::Display for TrackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One open container.
pub trait Container: Send {
    /// Create a track. Video tracks receive the captured extradata.
    fn add_track(&mut self, config: &TrackConfig, extradata: Option<&Bytes>) -> Result<TrackHandle>;

    /// Write the container header. Called at most once.
    fn write_header(&mut self) -> Result<()>;

    /// Write one buffer to `track`.
    fn write_frame(&mut self, track: TrackHandle, buffer: &Buffer) -> Result<()>;

    /// Flush and write the trailer. The container is not used afterwards.
    fn finalize(&mut self) -> Result<()>;
}

/// Factory for containers.
pub trait MuxerBackend: Send + Sync {
    /// Registry name of this backend.
    fn name(&self) -> &str;

    /// Open a container for `request`.
    fn open(&self, request: OpenRequest<'_>) -> Result<Box<dyn Container>>;
}

/// Name-indexed set of available backends.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: BTreeMap<String, Arc<dyn MuxerBackend>>,
}

impl BackendRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in backends.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MemoryBackend::new()));
        registry
    }

    /// Add or replace a backend under its own name.
    pub fn register(&mut self, backend: Arc<dyn MuxerBackend>) {
        let name = backend.name().to_string();
        if self.backends.insert(name.clone(), backend).is_some() {
            tracing::debug!("Replaced muxer backend '{name}'");
        }
    }

    /// Look up a backend by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn MuxerBackend>> {
        self.backends.get(name).cloned()
    }

    /// Names of all registered backends, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.backends.keys().map(String::as_str).collect()
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.names())
            .finish()
    }
}
