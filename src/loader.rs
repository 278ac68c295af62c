use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::time::Duration;
use reqwest::blocking::Client;
use thiserror::Error;
use crate::finder::Source;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("GET {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("GET {url} returned {status}")]
    Status { url: String, status: u16 },
}

/// Opens a source as a line-oriented reader. The reader is closed when dropped.
pub trait Loader {
    fn load(&self, source: &Source) -> Result<Box<dyn BufRead>, LoadError>;
}

pub struct SourceLoader {
    client: Client,
}

impl SourceLoader {
    pub fn new(timeout: Duration) -> Result<Self, LoadError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("NginxDoctor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| LoadError::Request { url: String::new(), source })?;
        Ok(Self { client })
    }
}

impl Loader for SourceLoader {
    fn load(&self, source: &Source) -> Result<Box<dyn BufRead>, LoadError> {
        match source {
            Source::Local(path) => {
                let f = File::open(path).map_err(|e| LoadError::Open { path: path.clone(), source: e })?;
                Ok(Box::new(BufReader::new(f)))
            }
            Source::Remote(url) => {
                log::debug!("GET {}", url);
                let resp = self.client.get(url.clone()).send()
                    .map_err(|e| LoadError::Request { url: url.to_string(), source: e })?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(LoadError::Status { url: url.to_string(), status: status.as_u16() });
                }
                Ok(Box::new(BufReader::new(resp)))
            }
        }
    }
}
