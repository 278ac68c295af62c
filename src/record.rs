use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub method: String,
    pub resource: String,
    pub protocol: String,
}

/// One parsed line of an nginx access log ("combined" format).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub remote_addr: String,
    pub remote_user: String,
    pub time_local: DateTime<FixedOffset>,
    pub request: Request,
    pub status: u16,
    pub body_bytes_sent: u64,
    pub http_referer: String,
    pub http_user_agent: String,
}
