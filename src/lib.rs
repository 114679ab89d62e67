//! Segmux - time-segmented multi-track recording
//!
//! This library crate exposes the binary's configuration loading and
//! simulation support for integration testing. The recorder itself lives in
//! the `segmux-record` and `segmux-flow` crates.

pub mod config;
pub mod simulate;
