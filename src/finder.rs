use std::fmt;
use std::path::{Path, PathBuf};
use globset::{GlobBuilder, GlobMatcher};
use thiserror::Error;
use url::Url;
use walkdir::WalkDir;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    Local(PathBuf),
    Remote(Url),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Local(p) => write!(f, "{}", p.display()),
            Source::Remote(u) => write!(f, "{}", u),
        }
    }
}

#[derive(Debug, Error)]
pub enum FindError {
    #[error("bad path pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
    #[error("failed to walk {path}: {source}")]
    Walk {
        path: String,
        #[source]
        source: walkdir::Error,
    },
    #[error("no log files match '{0}'")]
    NoSources(String),
}

const GLOB_META: [char; 4] = ['*', '?', '[', '{'];

fn glob(pattern: &str) -> Result<GlobMatcher, FindError> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|source| FindError::Pattern { pattern: pattern.to_string(), source })
}

/// Resolves a user-supplied path into an ordered list of sources.
///
/// An http(s) URL yields a single remote source. A file yields itself, a directory
/// yields the files directly inside it whose name matches `file_glob`. Anything else
/// is treated as a glob pattern over local paths.
pub fn resolve(path: &str, file_glob: Option<&str>) -> Result<Vec<Source>, FindError> {
    if let Ok(u) = Url::parse(path) && matches!(u.scheme(), "http" | "https") {
        return Ok(vec![Source::Remote(u)]);
    }
    let names = glob(file_glob.unwrap_or("*"))?;
    let p = Path::new(path);
    let mut files: Vec<PathBuf> = if p.is_file() {
        vec![p.to_path_buf()]
    } else if p.is_dir() {
        dir_files(p, &names)?
    } else {
        pattern_files(path, &names)?
    };
    if files.is_empty() { return Err(FindError::NoSources(path.to_string())); }
    files.sort();
    files.dedup();
    log::debug!("resolved '{}' to {} file(s)", path, files.len());
    Ok(files.into_iter().map(Source::Local).collect())
}

fn dir_files(dir: &Path, names: &GlobMatcher) -> Result<Vec<PathBuf>, FindError> {
    let mut out = vec![];
    for de in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        let de = de.map_err(|source| FindError::Walk { path: dir.to_string_lossy().into_owned(), source })?;
        if de.file_type().is_file() && names.is_match(de.file_name()) { out.push(de.into_path()); }
    }
    Ok(out)
}

fn pattern_files(pattern: &str, names: &GlobMatcher) -> Result<Vec<PathBuf>, FindError> {
    let matcher = glob(pattern)?;
    let literal: Vec<&str> = pattern.split('/').take_while(|c| !c.contains(GLOB_META)).collect();
    let root = if literal.is_empty() {
        PathBuf::from(".")
    } else if literal == [""] {
        PathBuf::from("/")
    } else {
        PathBuf::from(literal.join("/"))
    };
    if !root.exists() { return Ok(vec![]); }
    let mut out = vec![];
    for de in WalkDir::new(&root).min_depth(1).follow_links(true) {
        let de = de.map_err(|source| FindError::Walk { path: root.to_string_lossy().into_owned(), source })?;
        let candidate = if literal.is_empty() { de.path().strip_prefix(".").unwrap_or(de.path()) } else { de.path() };
        if !matcher.is_match(candidate) { continue; }
        if de.file_type().is_dir() { out.extend(dir_files(de.path(), names)?); }
        else if de.file_type().is_file() { out.push(de.into_path()); }
    }
    Ok(out)
}
