//! Recorder configuration.
//!
//! [`MuxerConfig`] is parsed from the `key=value` parameter string (see
//! [`segmux_common::params`]) or deserialized from a structured file. Every
//! field except the backend name has a usable default.
//!
//! ```
//! use segmux_record::config::{IoMode, MuxerConfig};
//!
//! let config = MuxerConfig::parse(
//!     "name=memory;path=/rec;file_prefix=cam;file_duration=60|type=video;codec=h264",
//! )
//! .unwrap();
//! assert_eq!(config.file_duration, 60);
//! assert_eq!(config.io_mode(), IoMode::File);
//! assert!(config.video.is_some());
//! ```

use serde::{Deserialize, Serialize};

use segmux_common::params::{self, ParamMap};
use segmux_common::{Error, MediaKind, Result, TrackConfig};

/// Recognized head-section keys.
pub const KEY_NAME: &str = "name";
pub const KEY_PATH: &str = "path";
pub const KEY_FILE_PREFIX: &str = "file_prefix";
pub const KEY_FILE_TIME: &str = "file_time";
pub const KEY_FILE_INDEX: &str = "file_index";
pub const KEY_FILE_DURATION: &str = "file_duration";
pub const KEY_OUTPUT_TYPE: &str = "output_type";
pub const KEY_ENABLE_STREAMING: &str = "enable_streaming";
pub const KEY_DICTIONARY: &str = "dictionary";
pub const KEY_TRACK_FAILURE: &str = "track_failure";

const KNOWN_KEYS: &[&str] = &[
    KEY_NAME,
    KEY_PATH,
    KEY_FILE_PREFIX,
    KEY_FILE_TIME,
    KEY_FILE_INDEX,
    KEY_FILE_DURATION,
    KEY_OUTPUT_TYPE,
    KEY_ENABLE_STREAMING,
    KEY_DICTIONARY,
    KEY_TRACK_FAILURE,
];

/// Where finished container bytes go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IoMode {
    /// The backend writes straight to the named file.
    File,
    /// Finished byte ranges come back through a callback as output buffers.
    Callback,
}

/// What a session does when the backend rejects a track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackFailurePolicy {
    /// Report the failure and keep recording the remaining tracks.
    #[default]
    Continue,
    /// Report the failure and tear the session down.
    AbortSession,
}

impl std::str::FromStr for TrackFailurePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continue" => Ok(Self::Continue),
            "abort" | "abort_session" => Ok(Self::AbortSession),
            other => Err(Error::config(format!("unknown track failure policy '{other}'"))),
        }
    }
}

/// Full recorder configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MuxerConfig {
    /// Name of the muxer backend to resolve in the registry.
    pub backend: String,
    /// Output file (with an empty prefix) or output directory.
    pub output_path: String,
    pub file_prefix: String,
    /// Append a `_YYYYMMDDHHMMSS` local-time suffix to generated names.
    pub file_time: bool,
    /// Starting file index; appended and post-incremented when positive.
    pub file_index: i64,
    /// Segment length in seconds; zero or negative disables rotation.
    pub file_duration: i64,
    /// Output container tag handed to the backend.
    pub output_type: String,
    pub enable_streaming: bool,
    /// Backend-specific dictionary string, passed through untouched.
    pub dictionary: String,
    pub track_failure: TrackFailurePolicy,
    pub video: Option<TrackConfig>,
    pub audio: Option<TrackConfig>,
}

impl Default for MuxerConfig {
    fn default() -> Self {
        Self {
            backend: String::new(),
            output_path: String::new(),
            file_prefix: String::new(),
            file_time: false,
            file_index: 0,
            file_duration: 0,
            output_type: String::new(),
            enable_streaming: true,
            dictionary: String::new(),
            track_failure: TrackFailurePolicy::Continue,
            video: None,
            audio: None,
        }
    }
}

impl MuxerConfig {
    /// Parse a full parameter string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the backend name is missing or a
    /// recognized head key carries an invalid value. Track sections that fail
    /// to parse are skipped with a warning.
    pub fn parse(params_str: &str) -> Result<Self> {
        let (head, sections) = params::split_sections(params_str);
        let map = params::parse_map(head)?;
        let mut config = Self::from_head(&map)?;

        for section in sections {
            let track = match TrackConfig::parse(section) {
                Ok(track) => track,
                Err(e) => {
                    tracing::warn!("Skipping track section '{section}': {e}");
                    continue;
                }
            };
            let slot = match track.kind {
                MediaKind::Video => &mut config.video,
                MediaKind::Audio => &mut config.audio,
            };
            if slot.is_some() {
                tracing::warn!("Duplicate {} track section; the later one wins", track.kind);
            }
            tracing::info!("Found {} track config ({})", track.kind, track.codec);
            *slot = Some(track);
        }

        Ok(config)
    }

    fn from_head(map: &ParamMap) -> Result<Self> {
        let backend = map
            .get(KEY_NAME)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::config("missing muxer backend name"))?;

        for key in map.keys() {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                tracing::debug!("Ignoring unrecognized muxer key '{key}'");
            }
        }

        let defaults = Self::default();
        Ok(Self {
            backend,
            output_path: map.get(KEY_PATH).cloned().unwrap_or_default(),
            file_prefix: map.get(KEY_FILE_PREFIX).cloned().unwrap_or_default(),
            file_time: params::flag_value(map, KEY_FILE_TIME)?.unwrap_or(defaults.file_time),
            file_index: params::parse_value(map, KEY_FILE_INDEX)?.unwrap_or(defaults.file_index),
            file_duration: params::parse_value(map, KEY_FILE_DURATION)?
                .unwrap_or(defaults.file_duration),
            output_type: map.get(KEY_OUTPUT_TYPE).cloned().unwrap_or_default(),
            enable_streaming: params::flag_value(map, KEY_ENABLE_STREAMING)?
                .unwrap_or(defaults.enable_streaming),
            dictionary: map.get(KEY_DICTIONARY).cloned().unwrap_or_default(),
            track_failure: params::parse_value(map, KEY_TRACK_FAILURE)?
                .unwrap_or(defaults.track_failure),
            video: None,
            audio: None,
        })
    }

    /// Select the IO mode.
    ///
    /// An empty output path asks for the callback sink, but without an output
    /// container tag there is nothing to stream, so direct-file mode is used.
    pub fn io_mode(&self) -> IoMode {
        if self.output_path.is_empty() && !self.output_type.is_empty() {
            IoMode::Callback
        } else {
            IoMode::File
        }
    }

    /// Rotation threshold in microseconds, if rotation is enabled.
    pub fn rotation_threshold_us(&self) -> Option<i64> {
        (self.file_duration > 0).then(|| self.file_duration.saturating_mul(1_000_000))
    }

    /// The configured track for `kind`.
    pub fn track(&self, kind: MediaKind) -> Option<&TrackConfig> {
        match kind {
            MediaKind::Video => self.video.as_ref(),
            MediaKind::Audio => self.audio.as_ref(),
        }
    }

    /// Check that each track slot holds a track of its own kind.
    ///
    /// Parsed parameter strings always satisfy this; structured configs
    /// (TOML, JSON) can put an audio track in the video slot.
    pub fn check_tracks(&self) -> Result<()> {
        for (slot, track) in [(MediaKind::Video, &self.video), (MediaKind::Audio, &self.audio)] {
            if let Some(track) = track {
                if track.kind != slot {
                    return Err(Error::config(format!(
                        "{slot} track slot holds a {} track",
                        track.kind
                    )));
                }
            }
        }
        Ok(())
    }

    /// Render the configuration back into a parameter string.
    pub fn to_params(&self) -> String {
        let mut map = ParamMap::new();
        map.insert(KEY_NAME.into(), self.backend.clone());
        let optional = [
            (KEY_PATH, &self.output_path),
            (KEY_FILE_PREFIX, &self.file_prefix),
            (KEY_OUTPUT_TYPE, &self.output_type),
            (KEY_DICTIONARY, &self.dictionary),
        ];
        for (key, value) in optional {
            if !value.is_empty() {
                map.insert(key.into(), value.clone());
            }
        }
        map.insert(KEY_FILE_TIME.into(), u8::from(self.file_time).to_string());
        map.insert(KEY_FILE_INDEX.into(), self.file_index.to_string());
        map.insert(KEY_FILE_DURATION.into(), self.file_duration.to_string());
        map.insert(KEY_ENABLE_STREAMING.into(), self.enable_streaming.to_string());
        if self.track_failure == TrackFailurePolicy::AbortSession {
            map.insert(KEY_TRACK_FAILURE.into(), "abort".into());
        }

        let mut out = params::to_section(&map);
        for track in [&self.video, &self.audio].into_iter().flatten() {
            out.push(params::SECTION_SEPARATOR);
            out.push_str(&track.to_params());
        }
        out
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.video.is_none() && self.audio.is_none() {
            warnings.push("no track sections configured; nothing will be recorded".into());
        }
        if self.file_duration > 0 && self.video.is_none() {
            warnings.push("file_duration is set but rotation requires a video track".into());
        }
        if !self.output_path.is_empty() && self.file_prefix.is_empty() && self.file_duration > 0 {
            warnings.push(
                "output path without prefix is single-file mode; every segment reuses the same path"
                    .into(),
            );
        }
        if self.output_path.is_empty() && self.output_type.is_empty() {
            warnings.push(
                "neither path nor output_type set; files will be written to the working directory"
                    .into(),
            );
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segmux_common::CodecType;

    #[test]
    fn missing_backend_name_is_an_error() {
        let err = MuxerConfig::parse("path=/rec;file_prefix=cam").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(MuxerConfig::parse("name=  ").is_err());
    }

    #[test]
    fn defaults() {
        let config = MuxerConfig::parse("name=memory").unwrap();
        assert!(config.enable_streaming);
        assert_eq!(config.file_index, 0);
        assert_eq!(config.rotation_threshold_us(), None);
        assert_eq!(config.track_failure, TrackFailurePolicy::Continue);
        assert_eq!(config.io_mode(), IoMode::File);
    }

    #[test]
    fn all_head_keys() {
        let config = MuxerConfig::parse(
            "name=memory;path=/rec;file_prefix=cam;file_time=1;file_index=3;file_duration=30;\
             output_type=mp4;enable_streaming=false;dictionary=movflags=faststart;track_failure=abort",
        )
        .unwrap();
        assert_eq!(config.backend, "memory");
        assert_eq!(config.output_path, "/rec");
        assert_eq!(config.file_prefix, "cam");
        assert!(config.file_time);
        assert_eq!(config.file_index, 3);
        assert_eq!(config.rotation_threshold_us(), Some(30_000_000));
        assert_eq!(config.output_type, "mp4");
        assert!(!config.enable_streaming);
        assert_eq!(config.dictionary, "movflags=faststart");
        assert_eq!(config.track_failure, TrackFailurePolicy::AbortSession);
    }

    #[test]
    fn io_mode_selection() {
        let callback = MuxerConfig::parse("name=memory;output_type=mpegts").unwrap();
        assert_eq!(callback.io_mode(), IoMode::Callback);
        let no_tag = MuxerConfig::parse("name=memory").unwrap();
        assert_eq!(no_tag.io_mode(), IoMode::File);
        let file = MuxerConfig::parse("name=memory;path=/a.mp4;output_type=mp4").unwrap();
        assert_eq!(file.io_mode(), IoMode::File);
    }

    #[test]
    fn embedded_tracks() {
        let config = MuxerConfig::parse(
            "name=memory|type=video;codec=h264;width=1920|type=audio;codec=aac;channels=1",
        )
        .unwrap();
        assert_eq!(config.video.as_ref().map(|t| t.codec), Some(CodecType::H264));
        assert_eq!(config.track(MediaKind::Audio).and_then(|t| t.channels), Some(1));
    }

    #[test]
    fn bad_track_sections_are_skipped() {
        let config =
            MuxerConfig::parse("name=memory|type=video;codec=vp9|type=audio;codec=aac").unwrap();
        assert!(config.video.is_none());
        assert!(config.audio.is_some());
    }

    #[test]
    fn later_duplicate_track_wins() {
        let config =
            MuxerConfig::parse("name=memory|type=video;codec=h264|type=video;codec=h265").unwrap();
        assert_eq!(config.video.map(|t| t.codec), Some(CodecType::H265));
    }

    #[test]
    fn invalid_numeric_value() {
        let err = MuxerConfig::parse("name=memory;file_duration=soon").unwrap_err();
        assert!(err.to_string().contains("file_duration"));
    }

    #[test]
    fn params_roundtrip() {
        let original = MuxerConfig::parse(
            "name=memory;path=/rec;file_prefix=cam;file_index=2;file_duration=10|type=video;codec=h265",
        )
        .unwrap();
        let again = MuxerConfig::parse(&original.to_params()).unwrap();
        assert_eq!(again, original);
    }

    #[test]
    fn validate_warnings() {
        let config = MuxerConfig::parse("name=memory;file_duration=10").unwrap();
        let warnings = config.validate();
        assert!(warnings.iter().any(|w| w.contains("no track sections")));
        assert!(warnings.iter().any(|w| w.contains("rotation requires a video track")));
    }

    #[test]
    fn mismatched_track_slot_is_rejected() {
        let config: MuxerConfig = serde_json::from_str(
            r#"{"backend":"memory","video":{"kind":"audio","codec":"aac"}}"#,
        )
        .unwrap();
        let err = config.check_tracks().unwrap_err();
        assert!(err.to_string().contains("video track slot holds a audio track"));

        let parsed = MuxerConfig::parse("name=memory|type=audio;codec=aac").unwrap();
        assert!(parsed.check_tracks().is_ok());
    }

    #[test]
    fn deserializes_from_json_with_defaults() {
        let config: MuxerConfig =
            serde_json::from_str(r#"{"backend":"memory","file_prefix":"cam"}"#).unwrap();
        assert_eq!(config.backend, "memory");
        assert!(config.enable_streaming);
    }
}
