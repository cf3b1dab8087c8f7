use crate::checkpoint::watermark::Watermark;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field every anomaly record carries; used for ordering and checkpointing.
pub const TIMESTAMP_FIELD: &str = "timeStamp";

/// A single anomaly record as returned by the upstream API.
///
/// The record is kept as an opaque JSON object so that every field passes
/// through to the sink unmodified, in its original order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnomalyEvent(Map<String, Value>);

impl AnomalyEvent {
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn raw_timestamp(&self) -> Option<&str> {
        self.0.get(TIMESTAMP_FIELD).and_then(Value::as_str)
    }

    /// Parsed `timeStamp`, or None when missing or malformed.
    pub fn timestamp(&self) -> Option<Watermark> {
        self.raw_timestamp().and_then(|ts| Watermark::parse(ts).ok())
    }
}

/// Stable ascending sort by `timeStamp`. Events without a usable timestamp
/// sort first.
pub fn sort_by_timestamp(events: &mut [AnomalyEvent]) {
    events.sort_by_cached_key(AnomalyEvent::timestamp);
}

pub fn max_timestamp(events: &[AnomalyEvent]) -> Option<Watermark> {
    events.iter().filter_map(AnomalyEvent::timestamp).max()
}
