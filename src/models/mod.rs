use serde::Deserialize;

/// One unit of work, decoded from a queue message body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkItem {
    #[serde(rename = "s3_key")]
    pub source_key: String,
}

impl WorkItem {
    /// Decode a message body. Unknown fields are ignored; `s3_key` is required.
    pub fn from_body(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }
}

/// A leased queue message. Only `receipt_handle` can acknowledge it, and only
/// while the lease lasts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: Option<String>,
    pub body: String,
    pub receipt_handle: Option<String>,
}
