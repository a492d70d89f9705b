use serde::{Deserialize, Serialize};

/// Description of a discoverable stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub name: String,
    pub stream_type: String,
    pub source_id: String,
    pub nominal_srate: f64,
    pub channel_count: u32,
    /// Resolver that discovered the stream and can open it
    pub resolver_id: String,
}

impl StreamInfo {
    /// Value of a selector key, if the key is known.
    pub fn property(&self, key: &str) -> Option<String> {
        match key {
            "name" => Some(self.name.clone()),
            "type" => Some(self.stream_type.clone()),
            "source_id" => Some(self.source_id.clone()),
            "channel_count" => Some(self.channel_count.to_string()),
            "nominal_srate" => Some(self.nominal_srate.to_string()),
            _ => None,
        }
    }
}

/// `key = value` predicate used to pick a stream, e.g. `type = EEG`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selector {
    pub key: String,
    pub value: String,
}

impl Selector {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, info: &StreamInfo) -> bool {
        info.property(&self.key).as_deref() == Some(self.value.as_str())
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Result of one successful, non-empty pull.
#[derive(Debug, Clone, PartialEq)]
pub struct Pulled {
    pub timestamps: Vec<f64>,
    pub received_at: f64,
}
