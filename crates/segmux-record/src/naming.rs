//! Output file naming.
//!
//! Names come from an optional external [`FileNamer`] first. When none is
//! registered, or it fails, the pattern
//! `[dir/][prefix][_YYYYMMDDHHMMSS][_index].mp4` is used. A configured
//! output path with an empty prefix names a single file and is returned as is.

use chrono::{DateTime, Local};
use std::fmt;

use segmux_common::{Error, Result};

use crate::config::MuxerConfig;

/// Extension of every generated file. It does not follow `output_type`.
pub const FILE_EXTENSION: &str = "mp4";

/// External naming callback.
pub trait FileNamer: Send {
    /// Produce the next file path. An empty name counts as a failure.
    fn file_name(&mut self) -> Result<String>;
}

impl<F> FileNamer for F
where
    F: FnMut() -> Result<String> + Send,
{
    fn file_name(&mut self) -> Result<String> {
        self()
    }
}

/// Naming state owned by a controller.
pub struct FileNaming {
    pub output_path: String,
    pub prefix: String,
    pub time_suffix: bool,
    /// Next index to append; only positive values are used and incremented.
    pub index: i64,
    namer: Option<Box<dyn FileNamer>>,
}

impl FileNaming {
    pub fn from_config(config: &MuxerConfig) -> Self {
        Self {
            output_path: config.output_path.clone(),
            prefix: config.file_prefix.clone(),
            time_suffix: config.file_time,
            index: config.file_index,
            namer: None,
        }
    }

    /// Register or remove the external naming callback.
    pub fn set_namer(&mut self, namer: Option<Box<dyn FileNamer>>) {
        self.namer = namer;
    }

    pub fn has_namer(&self) -> bool {
        self.namer.is_some()
    }

    /// Produce the next path. Each call yields exactly one path.
    pub fn generate(&mut self) -> String {
        self.generate_at(Local::now())
    }

    /// [`generate`](Self::generate) with an explicit clock.
    pub fn generate_at(&mut self, now: DateTime<Local>) -> String {
        if let Some(namer) = self.namer.as_mut() {
            let named = namer.file_name().and_then(|name| {
                if name.is_empty() {
                    Err(Error::NamingCallback("callback returned an empty name".into()))
                } else {
                    Ok(name)
                }
            });
            match named {
                Ok(name) => return name,
                Err(e) => tracing::warn!("File naming callback failed, using pattern: {e}"),
            }
        }
        self.pattern_at(now)
    }

    fn pattern_at(&mut self, now: DateTime<Local>) -> String {
        if !self.output_path.is_empty() && self.prefix.is_empty() {
            return self.output_path.clone();
        }

        let mut name = self.prefix.clone();
        if self.time_suffix {
            name.push('_');
            name.push_str(&now.format("%Y%m%d%H%M%S").to_string());
        }
        if self.index > 0 {
            name.push_str(&format!("_{}", self.index));
            self.index += 1;
        }
        name.push('.');
        name.push_str(FILE_EXTENSION);

        if self.output_path.is_empty() {
            name
        } else {
            format!("{}/{}", self.output_path.trim_end_matches('/'), name)
        }
    }
}

impl fmt::Debug for FileNaming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileNaming")
            .field("output_path", &self.output_path)
            .field("prefix", &self.prefix)
            .field("time_suffix", &self.time_suffix)
            .field("index", &self.index)
            .field("namer", &self.has_namer())
            .finish()
    }
}
