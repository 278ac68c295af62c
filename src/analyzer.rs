use std::io::BufRead;
use chrono::{DateTime, FixedOffset};
use thiserror::Error;
use crate::filter::{self, FieldFilter, FilterError, FilterField, TimeWindow};
use crate::finder::Source;
use crate::loader::{LoadError, Loader};
use crate::parser::{self, ParseError};
use crate::report::{self, Report};
use crate::stats::{RunningStatistics, NOT_SPECIFIED};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid time bound '{value}' (expected e.g. 2024-11-07T16:07:56+00:00): {source}")]
    InvalidWindowBound {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("failed reading {source_id}: {source}")]
    Read {
        source_id: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{source_id}:{line_no}: {source}")]
    Parse {
        source_id: String,
        line_no: usize,
        #[source]
        source: ParseError,
    },
}

#[derive(Clone, Debug, Default)]
pub struct AnalysisOptions {
    pub from: Option<String>,
    pub to: Option<String>,
    /// Field name as given by the user; it is echoed in the report unchanged.
    pub filter_field: Option<String>,
    pub filter_value: Option<String>,
    /// Accepted records to take from each source; `None` reads everything.
    pub read_limit: Option<usize>,
    pub progress: bool,
}

pub struct Analyzer<L: Loader> {
    loader: L,
}

fn parse_bound(value: Option<&str>) -> Result<Option<DateTime<FixedOffset>>, AnalysisError> {
    value
        .map(|v| DateTime::parse_from_rfc3339(v).map_err(|source| AnalysisError::InvalidWindowBound { value: v.to_string(), source }))
        .transpose()
}

impl<L: Loader> Analyzer<L> {
    pub fn new(loader: L) -> Self { Self { loader } }

    pub fn analyze(&self, sources: &[Source], opts: &AnalysisOptions) -> Result<Report, AnalysisError> {
        let window = TimeWindow { from: parse_bound(opts.from.as_deref())?, to: parse_bound(opts.to.as_deref())? };
        let filter = match (opts.filter_field.as_deref(), opts.filter_value.as_deref()) {
            (Some(name), Some(value)) => Some(FieldFilter::new(name.parse::<FilterField>()?, value)?),
            _ => None,
        };
        let mut stats = RunningStatistics {
            from: opts.from.clone().unwrap_or_else(|| NOT_SPECIFIED.to_string()),
            to: opts.to.clone().unwrap_or_else(|| NOT_SPECIFIED.to_string()),
            field: filter.as_ref().and(opts.filter_field.clone()).unwrap_or_else(|| NOT_SPECIFIED.to_string()),
            value: filter.as_ref().map(|f| f.pattern().to_string()).unwrap_or_else(|| NOT_SPECIFIED.to_string()),
            ..Default::default()
        };
        log::info!("analyzing {} source(s)", sources.len());
        if !window.is_open() { log::debug!("time window {} .. {}", stats.from, stats.to); }
        for source in sources {
            let id = source.to_string();
            stats.add_source(id.clone());
            let reader = self.loader.load(source)?;
            let accepted = ingest(&id, reader, &window, filter.as_ref(), opts.read_limit, opts.progress, &mut stats)?;
            log::info!("{}: {} record(s) accepted", id, accepted);
        }
        Ok(report::build(&stats))
    }
}

// Consumes `reader`; it is dropped (and the source closed) on every return path.
fn ingest(
    id: &str,
    mut reader: Box<dyn BufRead>,
    window: &TimeWindow,
    filter: Option<&FieldFilter>,
    read_limit: Option<usize>,
    progress: bool,
    stats: &mut RunningStatistics,
) -> Result<usize, AnalysisError> {
    let limit = read_limit.unwrap_or(usize::MAX);
    let pb = if progress { Some(indicatif::ProgressBar::new_spinner()) } else { None };
    if let Some(ref pb) = pb { pb.set_message(format!("Reading {}", id)); }
    let mut accepted = 0usize;
    let mut buf = Vec::new();
    let mut idx = 0usize;
    loop {
        if accepted >= limit {
            log::debug!("{}: read limit {} reached at line {}", id, limit, idx + 1);
            break;
        }
        buf.clear();
        let n = reader.read_until(b'\n', &mut buf)
            .map_err(|source| AnalysisError::Read { source_id: id.to_string(), source })?;
        if n == 0 { break; }
        let raw = buf.strip_suffix(b"\n").unwrap_or(&buf);
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        // Invalid UTF-8 is replaced with U+FFFD; the line parser decides what is malformed.
        let line = String::from_utf8_lossy(raw);
        if let Some(ref pb) = pb && idx % 500 == 0 { pb.tick(); pb.set_message(format!("{}: {} lines", id, idx)); }
        idx += 1;
        // Blank lines carry no record and are skipped rather than reported as malformed.
        if line.trim().is_empty() { continue; }
        let record = parser::parse_line(&line)
            .map_err(|source| AnalysisError::Parse { source_id: id.to_string(), line_no: idx, source })?;
        if !filter::passes(&record, window, filter) {
            log::trace!("{}:{} rejected", id, idx);
            continue;
        }
        stats.accept(record);
        accepted += 1;
    }
    if let Some(pb) = pb { pb.finish_and_clear(); }
    Ok(accepted)
}
