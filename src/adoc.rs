use crate::report::{sections, Report};

fn cell(s: &str) -> String { s.replace('|', "\\|") }

fn row(s: &mut String, cells: &[String]) {
    for c in cells { s.push('|'); s.push_str(c); }
    s.push('\n');
}

pub fn render_adoc(rep: &Report, highest: usize) -> String {
    let mut s = String::new();
    for sec in sections(rep, highest, " +\n") {
        s.push_str(&format!("== {}\n", sec.title));
        s.push_str(&format!("[cols=\"{}\", options=\"header\"]\n|===\n", vec!["^"; sec.headers.len()].join(",")));
        row(&mut s, &sec.headers.iter().map(|h| h.to_string()).collect::<Vec<_>>());
        s.push('\n');
        for r in &sec.rows { row(&mut s, &r.iter().map(|c| cell(c)).collect::<Vec<_>>()); }
        s.push_str("|===\n\n");
    }
    s
}
