use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use log::warn;
use reqwest::blocking::Client;
use reqwest::Certificate;
use thiserror::Error;

pub const USER_AGENT: &str =
  "mismatch-util (https://mismatch-finder.toolforge.org; Wikidata mismatch generation)";
pub const REQUEST_TIMEOUT_SECS: u64 = 60;
pub const RATE_LIMIT_COOLDOWN_SECS: u64 = 60;

/// Everything that can go wrong retrieving one external record. Only
/// `RateLimited` is retried; the rest cause the record to be skipped.
#[derive(Debug, Error)]
pub enum FetchError {
  #[error("rate limited (http {0})")]
  RateLimited(u16),
  #[error("http status {0}")]
  Http(u16),
  #[error("request timed out")]
  Timeout,
  #[error("malformed response: {0}")]
  Malformed(String),
  #[error("request failed: {0}")]
  Transport(String),
}

impl FetchError {
  /// Classify a transport-level reqwest error.
  pub fn from_request(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
      FetchError::Timeout
    } else {
      FetchError::Transport(err.to_string())
    }
  }

  /// Classify a non-success status code. 403 is how both Open Library and
  /// the Wikimedia endpoints signal rate limiting, 429 is the standard code.
  pub fn from_status(status: u16) -> FetchError {
    match status {
      403 | 429 => FetchError::RateLimited(status),
      other => FetchError::Http(other),
    }
  }
}

#[derive(Debug, Error)]
pub enum ClientError {
  #[error("could not read CA bundle: {0}")]
  CaBundle(#[from] std::io::Error),
  #[error(transparent)]
  Build(#[from] reqwest::Error),
}

/// Explicit client configuration, including the CA bundle that packaged
/// executables need injected. No process-global TLS state.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
  pub ca_bundle: Option<PathBuf>,
}

impl ClientConfig {
  pub fn build(&self) -> Result<Client, ClientError> {
    let mut builder = Client::builder()
      .user_agent(USER_AGENT)
      .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS));
    if let Some(bundle_path) = &self.ca_bundle {
      let pem = fs::read(bundle_path)?;
      builder = builder.add_root_certificate(Certificate::from_pem(&pem)?);
    }
    Ok(builder.build()?)
  }
}

/// Run a fetch, waiting out rate limits. The same identifier is retried
/// after a fixed cool-down for as long as the remote keeps signalling 403;
/// every other failure is the caller's to handle.
pub fn with_rate_limit_retry<T>(
  mut fetch: impl FnMut() -> Result<T, FetchError>,
) -> Result<T, FetchError> {
  loop {
    match fetch() {
      Err(FetchError::RateLimited(status)) => {
        warn!("rate limited (http {}), waiting {}s before retrying", status, RATE_LIMIT_COOLDOWN_SECS);
        thread::sleep(Duration::from_secs(RATE_LIMIT_COOLDOWN_SECS));
      }
      other => return other,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn classifies_rate_limit_statuses() {
    assert!(matches!(FetchError::from_status(403), FetchError::RateLimited(403)));
    assert!(matches!(FetchError::from_status(429), FetchError::RateLimited(429)));
    assert!(matches!(FetchError::from_status(500), FetchError::Http(500)));
  }

  #[test]
  fn default_config_builds_a_client() {
    assert!(ClientConfig::default().build().is_ok());
  }

  #[test]
  fn retry_wrapper_passes_other_failures_through() {
    let result: Result<(), _> = with_rate_limit_retry(|| Err(FetchError::Http(500)));
    assert!(matches!(result, Err(FetchError::Http(500))));
    let ok = with_rate_limit_retry(|| Ok(7));
    assert_eq!(ok.unwrap(), 7);
  }
}
