use std::num::ParseIntError;
use std::sync::OnceLock;
use chrono::DateTime;
use regex::Regex;
use thiserror::Error;
use crate::record::{LogRecord, Request};

pub const TIME_LOCAL_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

static LINE_RE: OnceLock<Regex> = OnceLock::new();
static REQUEST_RE: OnceLock<Regex> = OnceLock::new();

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("not an nginx access log line: {0}")]
    MalformedLogLine(String),
    #[error("not an http request line: {0}")]
    MalformedRequestLine(String),
    #[error("bad timestamp '{value}': {source}")]
    MalformedTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error("bad {field} '{value}': {source}")]
    MalformedInteger {
        field: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },
}

fn line_re() -> &'static Regex {
    LINE_RE.get_or_init(|| {
        Regex::new(concat!(
            r#"^(?P<addr>\S+) - (?P<user>\S+) \[(?P<time>[^\]]+)\] "(?P<request>[^"]*)" "#,
            r#"(?P<status>\S+) (?P<size>\S+) "(?P<referer>[^"]*)" "(?P<agent>.*)"\s*$"#,
        ))
        .expect("static access log regex")
    })
}

fn request_re() -> &'static Regex {
    REQUEST_RE.get_or_init(|| Regex::new(r"^(\w+)\s+(\S+)\s+(HTTP/\d\.\d)$").expect("static request regex"))
}

pub fn parse_line(line: &str) -> Result<LogRecord, ParseError> {
    let caps = line_re().captures(line).ok_or_else(|| ParseError::MalformedLogLine(line.to_string()))?;
    let request = parse_request(&caps["request"])?;
    let time = &caps["time"];
    let time_local = DateTime::parse_from_str(time, TIME_LOCAL_FORMAT)
        .map_err(|source| ParseError::MalformedTimestamp { value: time.to_string(), source })?;
    let status = parse_int::<u16>("status", &caps["status"])?;
    let body_bytes_sent = parse_int::<u64>("body_bytes_sent", &caps["size"])?;
    Ok(LogRecord {
        remote_addr: caps["addr"].to_string(),
        remote_user: caps["user"].to_string(),
        time_local,
        request,
        status,
        body_bytes_sent,
        http_referer: caps["referer"].to_string(),
        http_user_agent: caps["agent"].to_string(),
    })
}

fn parse_request(s: &str) -> Result<Request, ParseError> {
    let caps = request_re().captures(s).ok_or_else(|| ParseError::MalformedRequestLine(s.to_string()))?;
    Ok(Request { method: caps[1].to_string(), resource: caps[2].to_string(), protocol: caps[3].to_string() })
}

fn parse_int<T: std::str::FromStr<Err = ParseIntError>>(field: &'static str, value: &str) -> Result<T, ParseError> {
    value.parse::<T>().map_err(|source| ParseError::MalformedInteger { field, value: value.to_string(), source })
}
