//! The `key=value` parameter string format.
//!
//! A parameter string is made of sections separated by [`SECTION_SEPARATOR`].
//! The first section holds the owner's own keys; every later section is an
//! embedded sub-configuration (one per track). Inside a section, entries are
//! `key=value` pairs separated by `;` or newlines. Whitespace around keys and
//! values is ignored, as are empty entries.
//!
//! ```
//! use segmux_common::params::{parse_map, split_sections};
//!
//! let (head, tracks) = split_sections("name=memory;file_prefix=cam|type=video;codec=h264");
//! let map = parse_map(head).unwrap();
//! assert_eq!(map.get("file_prefix").map(String::as_str), Some("cam"));
//! assert_eq!(tracks, vec!["type=video;codec=h264"]);
//! ```

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Separator between the head section and embedded sub-configurations.
pub const SECTION_SEPARATOR: char = '|';

/// Ordered map of parsed parameters.
pub type ParamMap = BTreeMap<String, String>;

/// Split a parameter string into its head section and embedded sections.
///
/// Empty embedded sections are dropped.
pub fn split_sections(params: &str) -> (&str, Vec<&str>) {
    let mut parts = params.split(SECTION_SEPARATOR);
    let head = parts.next().unwrap_or("");
    let rest = parts
        .map(str::trim)
        .filter(|section| !section.is_empty())
        .collect();
    (head, rest)
}

/// Parse one section into a [`ParamMap`].
///
/// Later duplicates of a key overwrite earlier ones.
///
/// # Errors
///
/// Returns [`Error::Config`] for an entry without `=` or with an empty key.
pub fn parse_map(section: &str) -> Result<ParamMap> {
    let mut map = ParamMap::new();
    for entry in section.split(|c| c == ';' || c == '\n') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let Some((key, value)) = entry.split_once('=') else {
            return Err(Error::config(format!("malformed entry '{entry}' (expected key=value)")));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::config(format!("entry '{entry}' has an empty key")));
        }
        map.insert(key.to_string(), value.trim().to_string());
    }
    Ok(map)
}

/// Render a map back into a single section string.
pub fn to_section(map: &ParamMap) -> String {
    map.iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(";")
}

/// Interpret a flag value.
///
/// Accepts `1/0`, `true/false`, `yes/no` and `on/off` (case-insensitive).
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Look up `key` and parse it with [`str::parse`], naming the key on failure.
pub fn parse_value<T>(map: &ParamMap, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match map.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| Error::config(format!("invalid value '{raw}' for '{key}': {e}"))),
    }
}

/// Look up `key` and interpret it with [`parse_flag`].
pub fn flag_value(map: &ParamMap, key: &str) -> Result<Option<bool>> {
    match map.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => parse_flag(raw)
            .map(Some)
            .ok_or_else(|| Error::config(format!("invalid flag '{raw}' for '{key}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_keeps_head_and_drops_empty_sections() {
        let (head, rest) = split_sections("a=1||b=2| ");
        assert_eq!(head, "a=1");
        assert_eq!(rest, vec!["b=2"]);
    }

    #[test]
    fn split_without_separator() {
        let (head, rest) = split_sections("a=1;b=2");
        assert_eq!(head, "a=1;b=2");
        assert!(rest.is_empty());
    }

    #[test]
    fn parse_map_accepts_semicolons_and_newlines() {
        let map = parse_map("a=1;\n b = two \n\n;c=").unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map["a"], "1");
        assert_eq!(map["b"], "two");
        assert_eq!(map["c"], "");
    }

    #[test]
    fn parse_map_keeps_equals_in_value() {
        let map = parse_map("dictionary=movflags=frag_keyframe").unwrap();
        assert_eq!(map["dictionary"], "movflags=frag_keyframe");
    }

    #[test]
    fn parse_map_rejects_malformed_entries() {
        assert!(parse_map("novalue").is_err());
        assert!(parse_map("=1").is_err());
    }

    #[test]
    fn flags() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn typed_lookup_reports_key() {
        let map = parse_map("file_index=abc").unwrap();
        let err = parse_value::<i64>(&map, "file_index").unwrap_err();
        assert!(err.to_string().contains("file_index"));
        assert_eq!(parse_value::<i64>(&map, "missing").unwrap(), None);
    }

    #[test]
    fn section_roundtrip() {
        let map = parse_map("b=2;a=1").unwrap();
        assert_eq!(to_section(&map), "a=1;b=2");
    }
}
