//! HTTP(S) download with manual redirect handling and a fixed timeout.
//!
//! No retries here: a failed fetch is one terminal error for the caller.

use abix_core::config::TransportConfig;
use abix_core::{AbixError, IoResultExt, Result};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;

/// Redirect chains longer than this are treated as a loop.
const MAX_REDIRECTS: usize = 5;

/// Download capability used by the resolver. The HTTP implementation is
/// [`HttpFetcher`]; tests substitute an in-memory one.
pub trait Fetcher {
    /// Stream `url` into `dest`. On any failure `dest` does not exist afterwards.
    fn fetch(&self, url: &str, dest: &Path) -> Result<()>;

    /// Fetch a small text document (checksum lists).
    fn fetch_text(&self, url: &str) -> Result<String>;
}

pub struct HttpFetcher {
    agent: ureq::Agent,
    config: TransportConfig,
}

impl HttpFetcher {
    pub fn new(config: TransportConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout)
            .redirects(0)
            .build();
        Self { agent, config }
    }

    pub fn from_env() -> Self {
        Self::new(TransportConfig::from_env())
    }

    /// GET `url`, following 301/302 by re-issuing the request against the
    /// `Location` header. Anything but a final 200 is an error.
    fn get(&self, url: &str, depth: usize) -> Result<ureq::Response> {
        let response = match self.agent.get(url).call() {
            Ok(r) => r,
            Err(ureq::Error::Status(code, _)) => {
                return Err(AbixError::transport(url, format!("HTTP {}", code)));
            }
            Err(ureq::Error::Transport(t)) => {
                return Err(AbixError::transport(url, t));
            }
        };
        match response.status() {
            200 => Ok(response),
            301 | 302 => {
                if depth >= MAX_REDIRECTS {
                    return Err(AbixError::transport(url, "too many redirects"));
                }
                let location = response.header("Location").ok_or_else(|| {
                    AbixError::transport(url, format!("HTTP {} without Location", response.status()))
                })?;
                let next = resolve_location(url, location)?;
                tracing::debug!("redirect {} -> {}", url, next);
                self.get(&next, depth + 1)
            }
            code => Err(AbixError::transport(url, format!("HTTP {}", code))),
        }
    }

    fn timeout_reason(&self, e: &io::Error) -> String {
        if e.kind() == io::ErrorKind::TimedOut {
            format!("timed out after {}s", self.config.timeout.as_secs())
        } else {
            e.to_string()
        }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        let response = self.get(url, 0)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .io_context(|| format!("failed to create {}", parent.display()))?;
        }
        let mut file =
            File::create(dest).io_context(|| format!("failed to create {}", dest.display()))?;
        let mut reader = response.into_reader();
        if let Err(e) = io::copy(&mut reader, &mut file) {
            drop(file);
            let _ = fs::remove_file(dest);
            return Err(AbixError::transport(url, self.timeout_reason(&e)));
        }
        if let Err(e) = file.sync_all() {
            let _ = fs::remove_file(dest);
            return Err(AbixError::io(format!("failed to flush {}", dest.display()), e));
        }
        Ok(())
    }

    fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.get(url, 0)?;
        let mut body = String::new();
        response
            .into_reader()
            .read_to_string(&mut body)
            .map_err(|e| AbixError::transport(url, self.timeout_reason(&e)))?;
        Ok(body)
    }
}

fn resolve_location(base: &str, location: &str) -> Result<String> {
    let base = url::Url::parse(base).map_err(|e| AbixError::transport(base, e))?;
    base.join(location)
        .map(|u| u.to_string())
        .map_err(|e| AbixError::transport(location, e))
}
