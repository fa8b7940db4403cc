//! Decoding of the live-delay feed into `DelayRecord`s
//!
//! The feed is a JSON array of objects. `StationName` is normally a nested
//! localized structure (`{"Zh_tw": "臺北", "En": "Taipei"}`) but may be a
//! plain value; the display name is the configured locale's entry when
//! present, otherwise the raw field's string form.

use delay_sink::{DelayRecord, FetchError};
use serde::Deserialize;
use serde_json::Value;

/// Locale key used when none is configured
pub const DEFAULT_NAME_LOCALE: &str = "Zh_tw";

/// One entry of the live-delay feed. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct RawDelay {
    #[serde(rename = "StationID", default)]
    station_id: String,
    #[serde(rename = "StationName", default)]
    station_name: Value,
    #[serde(rename = "DelayTime")]
    delay_time: i64,
}

/// Resolve the display name of a station.
///
/// - object with a string under `locale` → that string
/// - string → the string itself
/// - null → empty
/// - anything else → its JSON text
pub fn resolve_station_name(raw: &Value, locale: &str) -> String {
    match raw {
        Value::Object(names) => match names.get(locale) {
            Some(Value::String(name)) => name.clone(),
            _ => raw.to_string(),
        },
        Value::String(name) => name.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Decode a feed body into records, preserving the feed's order.
pub fn decode_records(body: &str, locale: &str) -> Result<Vec<DelayRecord>, FetchError> {
    let raw: Vec<RawDelay> = serde_json::from_str(body)
        .map_err(|e| FetchError::Parse(format!("delay feed is not a record array: {e}")))?;

    Ok(raw
        .into_iter()
        .map(|entry| DelayRecord {
            station_name: resolve_station_name(&entry.station_name, locale),
            station_id: entry.station_id,
            delay_minutes: entry.delay_time,
        })
        .collect())
}
