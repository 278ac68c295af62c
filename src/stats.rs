use std::collections::HashMap;
use crate::record::LogRecord;

pub const NOT_SPECIFIED: &str = "-";

/// Accumulator for one analysis run. Owned by the analyzer for the duration of the run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunningStatistics {
    pub sources: Vec<String>,
    pub from: String,
    pub to: String,
    pub field: String,
    pub value: String,
    pub requests: usize,
    pub total_bytes: u64,
    pub sizes: Vec<u64>,
    pub resources: HashMap<String, usize>,
    pub statuses: HashMap<u16, usize>,
    pub clients: HashMap<String, usize>,
    pub agents: HashMap<String, usize>,
}

impl Default for RunningStatistics {
    fn default() -> Self {
        Self {
            sources: vec![],
            from: NOT_SPECIFIED.to_string(),
            to: NOT_SPECIFIED.to_string(),
            field: NOT_SPECIFIED.to_string(),
            value: NOT_SPECIFIED.to_string(),
            requests: 0,
            total_bytes: 0,
            sizes: vec![],
            resources: HashMap::new(),
            statuses: HashMap::new(),
            clients: HashMap::new(),
            agents: HashMap::new(),
        }
    }
}

impl RunningStatistics {
    pub fn add_source(&mut self, id: impl Into<String>) { self.sources.push(id.into()); }

    pub fn accept(&mut self, r: LogRecord) {
        self.requests += 1;
        self.total_bytes += r.body_bytes_sent;
        self.sizes.push(r.body_bytes_sent);
        *self.resources.entry(r.request.resource).or_insert(0) += 1;
        *self.statuses.entry(r.status).or_insert(0) += 1;
        *self.clients.entry(r.remote_addr).or_insert(0) += 1;
        *self.agents.entry(r.http_user_agent).or_insert(0) += 1;
    }

    pub fn mean_size(&self) -> f64 {
        if self.requests == 0 { return 0.0; }
        self.total_bytes as f64 / self.requests as f64
    }
}

/// Percentile `p` (0..=100) with linear interpolation between order statistics.
/// An empty sample yields 0.
pub fn percentile(samples: &[u64], p: f64) -> f64 {
    if samples.is_empty() { return 0.0; }
    let mut sorted = samples.to_vec();
    sorted.sort_unstable();
    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let frac = rank - lo as f64;
    let base = sorted[lo] as f64;
    match sorted.get(lo + 1) {
        Some(&next) => base + frac * (next as f64 - base),
        None => base,
    }
}

pub fn percentile95(samples: &[u64]) -> f64 { percentile(samples, 95.0) }
