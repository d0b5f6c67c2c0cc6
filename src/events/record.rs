use chrono::DateTime;
use serde::{Deserialize, Serialize};

/// One event as returned by `/GetADXData`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub partition: String,
    pub offset: String,
    pub sequence_number: i64,
    /// RFC 3339, `null` when the broker supplied no timestamp.
    pub enqueued_time: Option<String>,
    pub body: String,
}

impl EventRecord {
    pub fn decode_body(payload: Option<&[u8]>) -> String {
        payload
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .unwrap_or_default()
    }

    pub fn enqueued_at(millis: Option<i64>) -> Option<String> {
        millis
            .and_then(DateTime::from_timestamp_millis)
            .map(|t| t.to_rfc3339())
    }
}
