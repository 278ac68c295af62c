use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, FixedOffset};
use regex::Regex;
use thiserror::Error;
use crate::record::LogRecord;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("unknown filter field '{0}' (expected one of: {names})", names = FilterField::NAMES.join(", "))]
    UnknownFilterField(String),
    #[error("invalid filter value '{pattern}': {source}")]
    InvalidFilterPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Record attributes that `--filter-field` can select.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterField {
    RemoteAddress,
    RemoteUser,
    TimeLocal,
    Method,
    Resource,
    Protocol,
    Status,
    BodyBytesSent,
    HttpReferer,
    HttpUserAgent,
}

impl FilterField {
    pub const NAMES: [&'static str; 10] = [
        "remote_address",
        "remote_user",
        "time_local",
        "method",
        "resource",
        "protocol",
        "status",
        "body_bytes_sent",
        "http_referer",
        "http_user_agent",
    ];

    pub fn name(self) -> &'static str {
        match self {
            FilterField::RemoteAddress => "remote_address",
            FilterField::RemoteUser => "remote_user",
            FilterField::TimeLocal => "time_local",
            FilterField::Method => "method",
            FilterField::Resource => "resource",
            FilterField::Protocol => "protocol",
            FilterField::Status => "status",
            FilterField::BodyBytesSent => "body_bytes_sent",
            FilterField::HttpReferer => "http_referer",
            FilterField::HttpUserAgent => "http_user_agent",
        }
    }

    pub fn project(self, r: &LogRecord) -> String {
        match self {
            FilterField::RemoteAddress => r.remote_addr.clone(),
            FilterField::RemoteUser => r.remote_user.clone(),
            FilterField::TimeLocal => r.time_local.to_string(),
            FilterField::Method => r.request.method.clone(),
            FilterField::Resource => r.request.resource.clone(),
            FilterField::Protocol => r.request.protocol.clone(),
            FilterField::Status => r.status.to_string(),
            FilterField::BodyBytesSent => r.body_bytes_sent.to_string(),
            FilterField::HttpReferer => r.http_referer.clone(),
            FilterField::HttpUserAgent => r.http_user_agent.clone(),
        }
    }
}

impl FromStr for FilterField {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "remote_address" | "remote_add" => Ok(FilterField::RemoteAddress),
            "remote_user" => Ok(FilterField::RemoteUser),
            "time_local" => Ok(FilterField::TimeLocal),
            "method" => Ok(FilterField::Method),
            "resource" => Ok(FilterField::Resource),
            "protocol" => Ok(FilterField::Protocol),
            "status" => Ok(FilterField::Status),
            "body_bytes_sent" => Ok(FilterField::BodyBytesSent),
            "http_referer" => Ok(FilterField::HttpReferer),
            "http_user_agent" => Ok(FilterField::HttpUserAgent),
            other => Err(FilterError::UnknownFilterField(other.to_string())),
        }
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

/// Inclusive time bounds; an unset bound is not checked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub from: Option<DateTime<FixedOffset>>,
    pub to: Option<DateTime<FixedOffset>>,
}

impl TimeWindow {
    pub fn is_open(&self) -> bool { self.from.is_none() && self.to.is_none() }

    pub fn contains(&self, ts: &DateTime<FixedOffset>) -> bool {
        if let Some(from) = self.from.as_ref() && ts < from { return false; }
        if let Some(to) = self.to.as_ref() && ts > to { return false; }
        true
    }
}

#[derive(Clone, Debug)]
pub struct FieldFilter {
    field: FilterField,
    pattern: Regex,
}

impl FieldFilter {
    pub fn new(field: FilterField, pattern: &str) -> Result<Self, FilterError> {
        let pattern = Regex::new(pattern)
            .map_err(|source| FilterError::InvalidFilterPattern { pattern: pattern.to_string(), source })?;
        Ok(Self { field, pattern })
    }

    pub fn pattern(&self) -> &str { self.pattern.as_str() }

    // Unanchored: the pattern may match anywhere in the projected value.
    pub fn matches(&self, r: &LogRecord) -> bool { self.pattern.is_match(&self.field.project(r)) }
}

pub fn passes(r: &LogRecord, window: &TimeWindow, filter: Option<&FieldFilter>) -> bool {
    window.contains(&r.time_local) && filter.is_none_or(|f| f.matches(r))
}
