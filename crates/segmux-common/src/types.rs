//! Core type definitions for media kinds, codecs, and track configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::params::{self, ParamMap};

/// Kind of media carried by a buffer or a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Encoded video.
    Video,
    /// Encoded audio.
    Audio,
}

impl MediaKind {
    /// Numeric code reported in track-specific events.
    pub fn track_code(self) -> i64 {
        match self {
            Self::Video => -1,
            Self::Audio => -2,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

impl FromStr for MediaKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            other => Err(Error::config(format!("unknown media type '{other}'"))),
        }
    }
}

/// Codec identifier of an encoded stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecType {
    H264,
    H265,
    Mjpeg,
    Aac,
    Mp2,
    Opus,
    G711a,
    G711u,
    G726,
    Pcm,
}

impl CodecType {
    /// The media kind this codec produces.
    pub fn kind(self) -> MediaKind {
        match self {
            Self::H264 | Self::H265 | Self::Mjpeg => MediaKind::Video,
            _ => MediaKind::Audio,
        }
    }
}

impl fmt::Display for CodecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::H264 => "h264",
            Self::H265 => "h265",
            Self::Mjpeg => "mjpeg",
            Self::Aac => "aac",
            Self::Mp2 => "mp2",
            Self::Opus => "opus",
            Self::G711a => "g711a",
            Self::G711u => "g711u",
            Self::G726 => "g726",
            Self::Pcm => "pcm",
        };
        f.write_str(name)
    }
}

impl FromStr for CodecType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "h264" | "avc" | "video:h264" => Ok(Self::H264),
            "h265" | "hevc" | "video:h265" => Ok(Self::H265),
            "mjpeg" | "jpeg" | "image:jpeg" => Ok(Self::Mjpeg),
            "aac" | "audio:aac" => Ok(Self::Aac),
            "mp2" | "audio:mp2" => Ok(Self::Mp2),
            "opus" | "audio:opus" => Ok(Self::Opus),
            "g711a" | "audio:g711a" => Ok(Self::G711a),
            "g711u" | "audio:g711u" => Ok(Self::G711u),
            "g726" | "audio:g726" => Ok(Self::G726),
            "pcm" | "audio:pcm" => Ok(Self::Pcm),
            other => Err(Error::config(format!("unknown codec '{other}'"))),
        }
    }
}

/// Immutable description of one track.
///
/// A controller holds at most one video and one audio `TrackConfig`. Keys
/// without a typed field are preserved in [`extra`](Self::extra) and handed
/// to the muxer backend untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackConfig {
    pub kind: MediaKind,
    pub codec: CodecType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u16>,
    #[serde(default, skip_serializing_if = "ParamMap::is_empty")]
    pub extra: ParamMap,
}

const TRACK_KEYS: &[&str] = &[
    "type",
    "codec",
    "width",
    "height",
    "frame_rate",
    "bitrate",
    "sample_rate",
    "channels",
];

impl TrackConfig {
    /// A bare video track for `codec`.
    pub fn video(codec: CodecType) -> Self {
        Self::bare(MediaKind::Video, codec)
    }

    /// A bare audio track for `codec`.
    pub fn audio(codec: CodecType) -> Self {
        Self::bare(MediaKind::Audio, codec)
    }

    fn bare(kind: MediaKind, codec: CodecType) -> Self {
        Self {
            kind,
            codec,
            width: None,
            height: None,
            frame_rate: None,
            bitrate: None,
            sample_rate: None,
            channels: None,
            extra: ParamMap::new(),
        }
    }

    /// Parse a track sub-configuration section.
    ///
    /// `type` and `codec` are required, and the codec must belong to the
    /// declared media type.
    pub fn parse(section: &str) -> Result<Self> {
        let map = params::parse_map(section)?;
        Self::from_map(&map)
    }

    /// Build a track configuration from an already-parsed section.
    pub fn from_map(map: &ParamMap) -> Result<Self> {
        let kind: MediaKind = map
            .get("type")
            .ok_or_else(|| Error::config("track section is missing 'type'"))?
            .parse()?;
        let codec: CodecType = map
            .get("codec")
            .ok_or_else(|| Error::config("track section is missing 'codec'"))?
            .parse()?;
        if codec.kind() != kind {
            return Err(Error::config(format!(
                "codec '{codec}' cannot be used for a {kind} track"
            )));
        }

        let extra = map
            .iter()
            .filter(|(k, _)| !TRACK_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Self {
            kind,
            codec,
            width: params::parse_value(map, "width")?,
            height: params::parse_value(map, "height")?,
            frame_rate: params::parse_value(map, "frame_rate")?,
            bitrate: params::parse_value(map, "bitrate")?,
            sample_rate: params::parse_value(map, "sample_rate")?,
            channels: params::parse_value(map, "channels")?,
            extra,
        })
    }

    /// Render back into a section string.
    pub fn to_params(&self) -> String {
        let mut map = self.extra.clone();
        map.insert("type".into(), self.kind.to_string());
        map.insert("codec".into(), self.codec.to_string());
        let numeric = [
            ("width", self.width),
            ("height", self.height),
            ("frame_rate", self.frame_rate),
            ("bitrate", self.bitrate),
            ("sample_rate", self.sample_rate),
            ("channels", self.channels.map(u32::from)),
        ];
        for (key, value) in numeric {
            if let Some(v) = value {
                map.insert(key.into(), v.to_string());
            }
        }
        params::to_section(&map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_codes_are_distinct() {
        assert_eq!(MediaKind::Video.track_code(), -1);
        assert_eq!(MediaKind::Audio.track_code(), -2);
    }

    #[test]
    fn codec_aliases() {
        assert_eq!("HEVC".parse::<CodecType>().unwrap(), CodecType::H265);
        assert_eq!("avc".parse::<CodecType>().unwrap(), CodecType::H264);
        assert_eq!("audio:aac".parse::<CodecType>().unwrap(), CodecType::Aac);
        assert!("vp9".parse::<CodecType>().is_err());
    }

    #[test]
    fn parse_video_track() {
        let track =
            TrackConfig::parse("type=video;codec=h265;width=1280;height=720;frame_rate=25;gop=50")
                .unwrap();
        assert_eq!(track.kind, MediaKind::Video);
        assert_eq!(track.codec, CodecType::H265);
        assert_eq!(track.width, Some(1280));
        assert_eq!(track.frame_rate, Some(25));
        assert_eq!(track.extra.get("gop").map(String::as_str), Some("50"));
    }

    #[test]
    fn parse_audio_track() {
        let track = TrackConfig::parse("type=audio;codec=aac;sample_rate=48000;channels=2").unwrap();
        assert_eq!(track.kind, MediaKind::Audio);
        assert_eq!(track.sample_rate, Some(48000));
        assert_eq!(track.channels, Some(2));
    }

    #[test]
    fn rejects_mismatched_codec() {
        let err = TrackConfig::parse("type=audio;codec=h264").unwrap_err();
        assert!(err.to_string().contains("cannot be used"));
    }

    #[test]
    fn rejects_missing_type() {
        assert!(TrackConfig::parse("codec=h264").is_err());
    }

    #[test]
    fn params_roundtrip() {
        let track = TrackConfig::parse("type=video;codec=h264;width=640;profile=high").unwrap();
        let again = TrackConfig::parse(&track.to_params()).unwrap();
        assert_eq!(again, track);
    }
}
