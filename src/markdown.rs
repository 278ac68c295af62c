use crate::report::{sections, Report};

fn cell(s: &str) -> String { s.replace('|', "\\|") }

fn row(s: &mut String, cells: &[String]) {
    for c in cells { s.push('|'); s.push_str(c); }
    s.push_str("|\n");
}

pub fn render_markdown(rep: &Report, highest: usize) -> String {
    let mut s = String::new();
    for sec in sections(rep, highest, "<br>") {
        s.push_str(&format!("## {}\n", sec.title));
        row(&mut s, &sec.headers.iter().map(|h| h.to_string()).collect::<Vec<_>>());
        for _ in sec.headers { s.push_str("|:-:"); }
        s.push_str("|\n");
        for r in &sec.rows { row(&mut s, &r.iter().map(|c| cell(c)).collect::<Vec<_>>()); }
        s.push('\n');
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn report() -> Report {
        Report {
            sources: vec!["logs/a.txt".to_string(), "logs/b.txt".to_string()],
            from: "2024-11-08T14:39:44Z".to_string(),
            to: "-".to_string(),
            field: "http_user_agent".to_string(),
            value: "Opera*".to_string(),
            requests: 8,
            resources: vec![("/index.html".to_string(), 5), ("/a|b.css".to_string(), 2), ("/z.js".to_string(), 1)],
            statuses: vec![(200, 6), (404, 2)],
            clients: vec![("10.0.0.1".to_string(), 8)],
            agents: vec![("Opera/9.81".to_string(), 8)],
            mean_size: 1453.25,
            p95_size: 2917.0,
        }
    }

    #[test]
    fn renders_all_sections() {
        let want = "## General information\n\
|Metric|Value|\n\
|:-:|:-:|\n\
|File(s)|logs/a.txt<br>logs/b.txt|\n\
|Start date|2024-11-08T14:39:44Z|\n\
|End date|-|\n\
|Filter field|http_user_agent|\n\
|Filter value|Opera*|\n\
|Requests|8|\n\
|Average response size|1453.25|\n\
|95p response size|2917|\n\
\n\
## Requested resources\n\
|Resource|Count|\n\
|:-:|:-:|\n\
|/index.html|5|\n\
|/a\\|b.css|2|\n\
\n\
## Response codes\n\
|Code|Name|Count|\n\
|:-:|:-:|:-:|\n\
|200|OK|6|\n\
|404|Not Found|2|\n\
\n\
## Client addresses\n\
|Client|Count|\n\
|:-:|:-:|\n\
|10.0.0.1|8|\n\
\n\
## User agents\n\
|Agent|Count|\n\
|:-:|:-:|\n\
|Opera/9.81|8|\n\
\n";
        assert_eq!(render_markdown(&report(), 2), want);
    }

    #[test]
    fn highest_larger_than_table_shows_everything() {
        let md = render_markdown(&report(), 100);
        assert!(md.contains("|/z.js|1|\n"));
    }
}
