use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;
use anyhow::{Context, bail};
use clap::{Parser, ValueEnum, ColorChoice, ArgAction, CommandFactory};
use clap_complete::Shell;
use comfy_table::{Table, ContentArrangement};
use serde::{Deserialize, Serialize};
use is_terminal::IsTerminal;
mod record;
mod parser;
mod filter;
mod stats;
mod report;
mod finder;
mod loader;
mod analyzer;
mod markdown;
mod adoc;

use crate::analyzer::{AnalysisOptions, Analyzer};
use crate::filter::{FilterError, FilterField};
use crate::loader::SourceLoader;
use crate::report::Report;

static ENABLE_COLOR: OnceLock<bool> = OnceLock::new();

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ReportFormat { Markdown, Adoc }

impl ReportFormat {
    fn render(self, rep: &Report, highest: usize) -> String {
        match self {
            ReportFormat::Markdown => crate::markdown::render_markdown(rep, highest),
            ReportFormat::Adoc => crate::adoc::render_adoc(rep, highest),
        }
    }

    fn file_name(self) -> &'static str {
        match self { ReportFormat::Markdown => "report.md", ReportFormat::Adoc => "report.adoc" }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum LogLevel { Error, Warn, Info, Debug, Trace }

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum LogFormat { Text, Json }

#[derive(Parser, Debug)]
#[command(
    name = "NginxDoctor",
    about = "nginx access log analyzer",
    long_about = "nginx access log analyzer that reads local files, glob patterns or a URL, filters records by time window and field, and writes a Markdown or AsciiDoc report.",
    after_long_help = "Examples:\n  NginxDoctor -p logs/access.log\n  NginxDoctor -p 'logs/*' --file-glob '*.log' --from 2024-11-07T16:07:56Z -f adoc\n  NginxDoctor -p https://example.com/nginx_logs --filter-field http_user_agent --filter-value 'Opera*' -n 10\n  NginxDoctor -p logs --read 1000 --json-path report.json",
    color = ColorChoice::Auto
)]
struct Args {
    /// Log file, directory, glob pattern or http(s) URL
    #[arg(long, short = 'p')]
    path: Option<String>,
    /// Lower time bound, inclusive (e.g. 2024-11-07T16:07:56+00:00)
    #[arg(long)]
    from: Option<String>,
    /// Upper time bound, inclusive
    #[arg(long)]
    to: Option<String>,
    /// Report format [default: markdown]
    #[arg(long, short = 'f', value_enum)]
    format: Option<ReportFormat>,
    /// One of: remote_address, remote_user, time_local, method, resource, protocol, status, body_bytes_sent, http_referer, http_user_agent
    #[arg(long, requires = "filter_value", value_parser = filter_field_name)]
    filter_field: Option<String>,
    /// Regular expression matched against the filter field
    #[arg(long, requires = "filter_field")]
    filter_value: Option<String>,
    /// Rows shown per frequency table [default: 3]
    #[arg(long, short = 'n', value_parser = clap::value_parser!(u64).range(1..))]
    highest: Option<u64>,
    /// Accepted records to read from each source (default: all)
    #[arg(long, short = 'r', value_parser = clap::value_parser!(u64).range(1..))]
    read: Option<u64>,
    /// File name pattern used when a directory is given
    #[arg(long, short = 'g')]
    file_glob: Option<String>,
    /// HTTP timeout in seconds for remote sources [default: 30]
    #[arg(long)]
    timeout: Option<u64>,
    #[arg(long, short = 'o')]
    output: Option<String>,
    #[arg(long)]
    out_dir: Option<String>,
    #[arg(long, short = 'j')]
    json_path: Option<String>,
    #[arg(long)]
    config: Option<String>,
    #[arg(long, default_value_t = false)]
    progress: bool,
    #[arg(long, default_value_t = false)]
    no_truncate: bool,
    #[arg(long, short = 'C', default_value_t = false)]
    no_color: bool,
    #[arg(long, default_value_t = false)]
    force_color: bool,
    #[arg(long)]
    log_level: Option<LogLevel>,
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
    #[arg(long)]
    log_path: Option<String>,
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,
    #[arg(short = 'q', long, default_value_t = false)]
    quiet: bool,
    #[arg(long, value_enum)]
    completions: Option<Shell>,
    #[arg(long)]
    completions_out: Option<String>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            path: None,
            from: None,
            to: None,
            format: None,
            filter_field: None,
            filter_value: None,
            highest: None,
            read: None,
            file_glob: None,
            timeout: None,
            output: None,
            out_dir: None,
            json_path: None,
            config: None,
            progress: false,
            no_truncate: false,
            no_color: false,
            force_color: false,
            log_level: None,
            log_format: None,
            log_path: None,
            verbose: 0,
            quiet: false,
            completions: None,
            completions_out: None,
        }
    }
}

impl Args {
    fn format(&self) -> ReportFormat { self.format.unwrap_or(ReportFormat::Markdown) }
    fn highest(&self) -> usize { self.highest.unwrap_or(3) as usize }
    fn timeout(&self) -> Duration { Duration::from_secs(self.timeout.unwrap_or(30)) }
}

// Validates the name but returns it as typed.
fn filter_field_name(s: &str) -> Result<String, FilterError> {
    s.parse::<FilterField>().map(|_| s.to_string())
}

#[derive(Deserialize, Default)]
struct AppConfig {
    path: Option<String>,
    from: Option<String>,
    to: Option<String>,
    format: Option<ReportFormat>,
    filter_field: Option<String>,
    filter_value: Option<String>,
    highest: Option<u64>,
    read: Option<u64>,
    file_glob: Option<String>,
    timeout: Option<u64>,
    output: Option<String>,
    out_dir: Option<String>,
    json_path: Option<String>,
    progress: Option<bool>,
    no_truncate: Option<bool>,
    force_color: Option<bool>,
    log_level: Option<LogLevel>,
    log_format: Option<LogFormat>,
    log_path: Option<String>,
}

fn apply_config(args: &mut Args, cfg: AppConfig) {
    if args.path.is_none() && let Some(v) = cfg.path { args.path = Some(v); }
    if args.from.is_none() && let Some(v) = cfg.from { args.from = Some(v); }
    if args.to.is_none() && let Some(v) = cfg.to { args.to = Some(v); }
    if args.format.is_none() && let Some(v) = cfg.format { args.format = Some(v); }
    if args.filter_field.is_none() && args.filter_value.is_none() && let (Some(f), Some(v)) = (cfg.filter_field, cfg.filter_value) {
        args.filter_field = Some(f);
        args.filter_value = Some(v);
    }
    if args.highest.is_none() && let Some(v) = cfg.highest && v > 0 { args.highest = Some(v); }
    if args.read.is_none() && let Some(v) = cfg.read && v > 0 { args.read = Some(v); }
    if args.file_glob.is_none() && let Some(v) = cfg.file_glob { args.file_glob = Some(v); }
    if args.timeout.is_none() && let Some(v) = cfg.timeout { args.timeout = Some(v); }
    if args.output.is_none() && let Some(v) = cfg.output { args.output = Some(v); }
    if args.out_dir.is_none() && let Some(v) = cfg.out_dir { args.out_dir = Some(v); }
    if args.json_path.is_none() && let Some(v) = cfg.json_path { args.json_path = Some(v); }
    if let Some(v) = cfg.progress { args.progress |= v; }
    if let Some(v) = cfg.no_truncate { args.no_truncate |= v; }
    if let Some(v) = cfg.force_color { args.force_color |= v; }
    if args.log_level.is_none() && let Some(v) = cfg.log_level { args.log_level = Some(v); }
    if args.log_format.is_none() && let Some(v) = cfg.log_format { args.log_format = Some(v); }
    if args.log_path.is_none() && let Some(v) = cfg.log_path { args.log_path = Some(v); }
}

fn parse_config(s: &str) -> anyhow::Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(s)?;
    if let Some(name) = cfg.filter_field.as_deref() {
        filter_field_name(name)?;
    }
    Ok(cfg)
}

fn load_config(args: &mut Args) -> anyhow::Result<()> {
    if let Some(p) = args.config.clone() {
        let s = std::fs::read_to_string(&p).with_context(|| format!("cannot read config {}", p))?;
        let cfg = parse_config(&s).with_context(|| format!("cannot parse config {}", p))?;
        apply_config(args, cfg);
    } else if let Ok(s) = std::fs::read_to_string("NginxDoctor.toml") {
        match parse_config(&s) {
            Ok(cfg) => apply_config(args, cfg),
            Err(e) => eprintln!("Ignoring NginxDoctor.toml: {:#}", e),
        }
    }
    Ok(())
}

fn init_logging(args: &Args) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
    if args.quiet {
        builder.filter_level(log::LevelFilter::Error);
    } else if let Some(lvl) = args.log_level {
        let f = match lvl { LogLevel::Error => log::LevelFilter::Error, LogLevel::Warn => log::LevelFilter::Warn, LogLevel::Info => log::LevelFilter::Info, LogLevel::Debug => log::LevelFilter::Debug, LogLevel::Trace => log::LevelFilter::Trace };
        builder.filter_level(f);
    } else if args.verbose > 0 {
        let f = if args.verbose >= 3 { log::LevelFilter::Trace } else if args.verbose == 2 { log::LevelFilter::Debug } else { log::LevelFilter::Info };
        builder.filter_level(f);
    }
    if let Some(fmt) = args.log_format {
        match fmt {
            LogFormat::Json => {
                builder.format(|buf, record| {
                    use std::io::Write;
                    let obj = serde_json::json!({
                        "ts": chrono::Local::now().to_rfc3339(),
                        "level": record.level().to_string(),
                        "target": record.target(),
                        "msg": record.args().to_string(),
                    });
                    writeln!(buf, "{}", obj)
                });
            }
            LogFormat::Text => {
                builder.format(|buf, record| {
                    use std::io::Write;
                    let ts = chrono::Local::now().format("%H:%M:%S");
                    writeln!(buf, "[{:<5} {}] {}", record.level(), ts, record.args())
                });
            }
        }
    }
    if let Some(path) = args.log_path.as_ref() {
        match std::fs::File::create(path) {
            Ok(f) => { builder.target(env_logger::Target::Pipe(Box::new(f))); }
            Err(e) => eprintln!("Failed to open log file {}: {}", path, e),
        }
    }
    builder.init();
}

fn main() {
    let mut args = Args::parse();
    if let Some(sh) = args.completions {
        let mut cmd = Args::command();
        if let Some(path) = args.completions_out.as_ref() && let Ok(mut f) = std::fs::File::create(path) {
            clap_complete::generate(sh, &mut cmd, "NginxDoctor", &mut f);
        } else {
            clap_complete::generate(sh, &mut cmd, "NginxDoctor", &mut std::io::stdout());
        }
        return;
    }
    if let Err(e) = load_config(&mut args) {
        eprintln!("error: {:#}", e);
        std::process::exit(2);
    }
    init_logging(&args);
    let term = std::env::var("TERM").unwrap_or_default();
    let no_color_env = std::env::var_os("NO_COLOR").is_some();
    let color_default = std::io::stdout().is_terminal() && !no_color_env && term != "dumb";
    let enable_color = if args.force_color { true } else { color_default && !args.no_color };
    let _ = ENABLE_COLOR.set(enable_color);
    if let Err(e) = run(&args) {
        log::error!("{:#}", e);
        if args.log_path.is_some() { eprintln!("{}", paint(&format!("error: {:#}", e), "1;31")); }
        std::process::exit(1);
    }
}

fn report_path(args: &Args) -> PathBuf {
    match args.output.as_ref() {
        Some(p) => PathBuf::from(p),
        None => PathBuf::from(args.out_dir.as_deref().unwrap_or(".")).join(args.format().file_name()),
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let Some(path) = args.path.as_deref() else { bail!("no log path given (use --path or set `path` in the config file)") };
    let sources = crate::finder::resolve(path, args.file_glob.as_deref()).context("cannot resolve log sources")?;
    let loader = SourceLoader::new(args.timeout()).context("cannot build HTTP client")?;
    let opts = AnalysisOptions {
        from: args.from.clone(),
        to: args.to.clone(),
        filter_field: args.filter_field.clone(),
        filter_value: args.filter_value.clone(),
        read_limit: args.read.map(|n| n as usize),
        progress: args.progress,
    };
    let rep = Analyzer::new(loader).analyze(&sources, &opts).context("analysis failed")?;
    let highest = args.highest();
    let out = report_path(args);
    let text = args.format().render(&rep, highest);
    let json = match args.json_path.as_ref() {
        Some(p) => Some((p, serde_json::to_vec_pretty(&rep).context("cannot serialize report")?)),
        None => None,
    };
    if let Some(dir) = out.parent() && !dir.as_os_str().is_empty() {
        std::fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;
    }
    std::fs::write(&out, text).with_context(|| format!("cannot write report {}", out.display()))?;
    log::info!("report written to {}", out.display());
    if let Some((p, bytes)) = json {
        if let Err(e) = std::fs::write(p, bytes) {
            let _ = std::fs::remove_file(&out);
            return Err(e).with_context(|| format!("cannot write JSON {}", p));
        }
        if !args.quiet { println!("{}", paint(&format!("JSON written: {}", p), "1;36")); }
    }
    if !args.quiet {
        print_summary(&rep, highest, args.no_truncate);
        println!("{}", paint(&format!("Report written: {}", out.display()), "1;36"));
    }
    Ok(())
}

fn print_summary(rep: &Report, highest: usize, no_trunc: bool) {
    for sec in crate::report::sections(rep, highest, "\n") {
        println!("{}", paint(sec.title, "1"));
        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(sec.headers.iter().map(|h| paint(h, "1")).collect::<Vec<_>>());
        for r in &sec.rows {
            table.add_row(r.iter().map(|c| if no_trunc { c.clone() } else { truncate(c, 72) }).collect::<Vec<_>>());
        }
        println!("{}", table);
    }
}

fn truncate(s: &str, n: usize) -> String {
    let mut out: String = s.chars().take(n).collect();
    if s.chars().count() > n { out.push_str("..."); }
    out
}

fn paint(s: &str, code: &str) -> String {
    if *ENABLE_COLOR.get().unwrap_or(&true) { format!("\x1b[{}m{}\x1b[0m", code, s) } else { s.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn base_args(dir: &std::path::Path) -> Args {
        Args { quiet: true, out_dir: Some(dir.to_string_lossy().into_owned()), ..Default::default() }
    }

    const LINES: &str = concat!(
        "217.168.17.5 - - [17/May/2015:08:05:34 +0000] \"GET /downloads/product_1 HTTP/1.1\" 200 490 \"-\" \"Debian APT-HTTP/1.3 (0.8.10.3)\"\n",
        "217.168.17.5 - - [17/May/2015:08:05:09 +0000] \"GET /downloads/product_2 HTTP/1.1\" 200 490 \"-\" \"Debian APT-HTTP/1.3 (0.8.10.3)\"\n",
        "93.180.71.3 - - [17/May/2015:08:05:32 +0000] \"GET /downloads/product_1 HTTP/1.1\" 304 0 \"-\" \"Debian APT-HTTP/1.3 (0.8.16~exp12ubuntu10.21)\"\n",
        "80.91.33.133 - - [17/May/2015:08:05:24 +0000] \"GET /downloads/product_1 HTTP/1.1\" 404 336 \"-\" \"Debian APT-HTTP/1.3 (0.8.16~exp12ubuntu10.17)\"\n",
    );

    #[test]
    fn cli_accepts_filter_pair() {
        let a = Args::try_parse_from(["NginxDoctor", "-p", "logs", "--filter-field", "remote_add", "--filter-value", "^10\\.", "-n", "5", "-f", "adoc"]).unwrap();
        assert_eq!(a.filter_field.as_deref(), Some("remote_add"));
        assert_eq!(a.filter_value.as_deref(), Some("^10\\."));
        assert_eq!(a.highest(), 5);
        assert_eq!(a.format(), ReportFormat::Adoc);
    }

    #[test]
    fn cli_rejects_invalid_combinations() {
        assert!(Args::try_parse_from(["NginxDoctor", "-p", "logs", "--filter-field", "status"]).is_err());
        assert!(Args::try_parse_from(["NginxDoctor", "-p", "logs", "--filter-value", "x"]).is_err());
        assert!(Args::try_parse_from(["NginxDoctor", "-p", "logs", "--filter-field", "referrer", "--filter-value", "x"]).is_err());
        assert!(Args::try_parse_from(["NginxDoctor", "-p", "logs", "--highest", "0"]).is_err());
        assert!(Args::try_parse_from(["NginxDoctor", "-p", "logs", "--read", "0"]).is_err());
        assert!(Args::try_parse_from(["NginxDoctor", "-p", "logs", "--format", "html"]).is_err());
    }

    #[test]
    fn config_fills_only_unset_values() {
        let cfg: AppConfig = toml::from_str(r#"
            path = "from-config"
            format = "adoc"
            highest = 7
            filter_field = "http_user_agent"
            filter_value = "Opera"
            log_level = "debug"
        "#).unwrap();
        let mut a = Args { path: Some("from-cli".to_string()), ..Default::default() };
        apply_config(&mut a, cfg);
        assert_eq!(a.path.as_deref(), Some("from-cli"));
        assert_eq!(a.format(), ReportFormat::Adoc);
        assert_eq!(a.highest(), 7);
        assert_eq!(a.timeout(), Duration::from_secs(30));
        assert_eq!(a.filter_field.as_deref(), Some("http_user_agent"));
        assert_eq!(a.filter_value.as_deref(), Some("Opera"));
        assert!(matches!(a.log_level, Some(LogLevel::Debug)));
    }

    #[test]
    fn explicit_cli_defaults_beat_config() {
        let cfg = parse_config("format = \"adoc\"\nhighest = 7\ntimeout = 5\n").unwrap();
        let mut a = Args::try_parse_from(["NginxDoctor", "-p", "x", "-f", "markdown", "-n", "3", "--timeout", "30"]).unwrap();
        apply_config(&mut a, cfg);
        assert_eq!(a.format(), ReportFormat::Markdown);
        assert_eq!(a.highest(), 3);
        assert_eq!(a.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn config_rejects_unknown_filter_field() {
        assert!(parse_config("filter_field = \"referrer\"").is_err());
        let cfg = parse_config("filter_field = \"remote_add\"").unwrap();
        assert_eq!(cfg.filter_field.as_deref(), Some("remote_add"));
    }

    #[test]
    fn report_path_follows_format() {
        let a = Args { out_dir: Some("reports".to_string()), format: Some(ReportFormat::Adoc), ..Default::default() };
        assert_eq!(report_path(&a), PathBuf::from("reports/report.adoc"));
        let b = Args { output: Some("x/out.md".to_string()), out_dir: Some("ignored".to_string()), ..Default::default() };
        assert_eq!(report_path(&b), PathBuf::from("x/out.md"));
        assert_eq!(report_path(&Args::default()), PathBuf::from("./report.md"));
    }

    #[test]
    fn run_writes_markdown_and_json() {
        let tmp = tempfile::tempdir().unwrap();
        let log = tmp.path().join("access.log");
        fs::write(&log, LINES).unwrap();
        let json = tmp.path().join("report.json");
        let mut a = base_args(tmp.path());
        a.path = Some(log.to_string_lossy().into_owned());
        a.json_path = Some(json.to_string_lossy().into_owned());
        run(&a).unwrap();
        let md = fs::read_to_string(tmp.path().join("report.md")).unwrap();
        assert!(md.starts_with("## General information\n"));
        assert!(md.contains("|Requests|4|\n"));
        assert!(md.contains("|/downloads/product_1|3|\n"));
        assert!(md.contains("|200|OK|2|\n"));
        let rep: Report = serde_json::from_slice(&fs::read(&json).unwrap()).unwrap();
        assert_eq!(rep.requests, 4);
        assert_eq!(rep.clients[0], ("217.168.17.5".to_string(), 2));
    }

    #[test]
    fn run_honors_window_and_adoc_format() {
        let tmp = tempfile::tempdir().unwrap();
        let log = tmp.path().join("access.log");
        fs::write(&log, LINES).unwrap();
        let mut a = base_args(tmp.path());
        a.path = Some(log.to_string_lossy().into_owned());
        a.format = Some(ReportFormat::Adoc);
        a.from = Some("2015-05-17T08:05:24Z".to_string());
        a.to = Some("2015-05-17T08:05:32Z".to_string());
        run(&a).unwrap();
        let doc = fs::read_to_string(tmp.path().join("report.adoc")).unwrap();
        assert!(doc.contains("|Requests|2\n"));
        assert!(doc.contains("|Start date|2015-05-17T08:05:24Z\n"));
    }

    #[test]
    fn failed_run_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let log = tmp.path().join("access.log");
        fs::write(&log, format!("{}not a log line\n", LINES)).unwrap();
        let mut a = base_args(tmp.path());
        a.path = Some(log.to_string_lossy().into_owned());
        let err = run(&a).unwrap_err();
        assert!(format!("{:#}", err).contains("not an nginx access log line"));
        assert!(!tmp.path().join("report.md").exists());
    }

    #[test]
    fn failed_json_write_removes_report() {
        let tmp = tempfile::tempdir().unwrap();
        let log = tmp.path().join("access.log");
        fs::write(&log, LINES).unwrap();
        let mut a = base_args(tmp.path());
        a.path = Some(log.to_string_lossy().into_owned());
        a.json_path = Some(tmp.path().join("missing").join("report.json").to_string_lossy().into_owned());
        let err = run(&a).unwrap_err();
        assert!(format!("{:#}", err).contains("cannot write JSON"));
        assert!(!tmp.path().join("report.md").exists());
    }

    #[test]
    fn missing_path_is_an_error() {
        assert!(run(&Args::default()).is_err());
    }

    #[test]
    fn truncate_ascii() {
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("abcdef", 6), "abcdef");
    }
}
