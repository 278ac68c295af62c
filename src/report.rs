use std::collections::HashMap;
use std::hash::Hash;
use serde::{Deserialize, Serialize};
use crate::stats::{percentile95, RunningStatistics};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub sources: Vec<String>,
    pub from: String,
    pub to: String,
    pub field: String,
    pub value: String,
    pub requests: usize,
    pub resources: Vec<(String, usize)>,
    pub statuses: Vec<(u16, usize)>,
    pub clients: Vec<(String, usize)>,
    pub agents: Vec<(String, usize)>,
    pub mean_size: f64,
    pub p95_size: f64,
}

/// Most frequent first; equal counts ordered by key.
pub fn sorted_counts<K: Ord + Hash + Clone>(counts: &HashMap<K, usize>) -> Vec<(K, usize)> {
    let mut v: Vec<(K, usize)> = counts.iter().map(|(k, c)| (k.clone(), *c)).collect();
    v.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    v
}

/// Reason phrase for a status code, empty when the code is not registered.
pub fn status_text(code: u16) -> &'static str {
    reqwest::StatusCode::from_u16(code).ok().and_then(|s| s.canonical_reason()).unwrap_or("")
}

/// One titled table of a rendered report.
#[derive(Clone, Debug, PartialEq)]
pub struct Section {
    pub title: &'static str,
    pub headers: &'static [&'static str],
    pub rows: Vec<Vec<String>>,
}

fn top<K>(counts: &[(K, usize)], highest: usize, cells: impl Fn(&K, usize) -> Vec<String>) -> Vec<Vec<String>> {
    counts.iter().take(highest).map(|(k, c)| cells(k, *c)).collect()
}

/// The five report tables in output order, frequency tables cut to `highest` rows.
/// `file_sep` joins the source list inside its single cell.
pub fn sections(rep: &Report, highest: usize, file_sep: &str) -> Vec<Section> {
    let general = vec![
        vec!["File(s)".to_string(), rep.sources.join(file_sep)],
        vec!["Start date".to_string(), rep.from.clone()],
        vec!["End date".to_string(), rep.to.clone()],
        vec!["Filter field".to_string(), rep.field.clone()],
        vec!["Filter value".to_string(), rep.value.clone()],
        vec!["Requests".to_string(), rep.requests.to_string()],
        vec!["Average response size".to_string(), rep.mean_size.to_string()],
        vec!["95p response size".to_string(), rep.p95_size.to_string()],
    ];
    vec![
        Section { title: "General information", headers: &["Metric", "Value"], rows: general },
        Section { title: "Requested resources", headers: &["Resource", "Count"], rows: top(&rep.resources, highest, |k, c| vec![k.clone(), c.to_string()]) },
        Section { title: "Response codes", headers: &["Code", "Name", "Count"], rows: top(&rep.statuses, highest, |k, c| vec![k.to_string(), status_text(*k).to_string(), c.to_string()]) },
        Section { title: "Client addresses", headers: &["Client", "Count"], rows: top(&rep.clients, highest, |k, c| vec![k.clone(), c.to_string()]) },
        Section { title: "User agents", headers: &["Agent", "Count"], rows: top(&rep.agents, highest, |k, c| vec![k.clone(), c.to_string()]) },
    ]
}

pub fn build(stats: &RunningStatistics) -> Report {
    Report {
        sources: stats.sources.clone(),
        from: stats.from.clone(),
        to: stats.to.clone(),
        field: stats.field.clone(),
        value: stats.value.clone(),
        requests: stats.requests,
        resources: sorted_counts(&stats.resources),
        statuses: sorted_counts(&stats.statuses),
        clients: sorted_counts(&stats.clients),
        agents: sorted_counts(&stats.agents),
        mean_size: stats.mean_size(),
        p95_size: percentile95(&stats.sizes),
    }
}
