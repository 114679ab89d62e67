use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use segmux_flow::WorkerOptions;
use segmux_record::events::DEFAULT_LOG_CAPACITY;
use segmux_record::MuxerConfig;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Raw `key=value` parameter string. Takes precedence over `[recorder]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<String>,

    #[serde(default)]
    pub recorder: MuxerConfig,

    #[serde(default)]
    pub queues: WorkerOptions,

    #[serde(default)]
    pub events: EventsConfig,

    /// Sections this version does not recognize; reported by validation.
    #[serde(flatten, default)]
    pub unknown: BTreeMap<String, toml::Value>,
}

impl Config {
    /// The effective recorder configuration.
    pub fn muxer_config(&self) -> segmux_common::Result<MuxerConfig> {
        match self.params.as_deref() {
            Some(params) => MuxerConfig::parse(params),
            None => Ok(self.recorder.clone()),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventsConfig {
    /// Number of events kept in the in-memory event log
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            log_capacity: default_log_capacity(),
        }
    }
}

fn default_log_capacity() -> usize {
    DEFAULT_LOG_CAPACITY
}
