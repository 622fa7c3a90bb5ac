use std::path::Path;

use reqwest::blocking::multipart::Form;
use reqwest::blocking::Client;
use thiserror::Error;

pub const IMPORT_API_URL: &str = "https://mismatch-finder.toolforge.org/api/imports";
/// Import metadata limits enforced by the API.
pub const MAX_EXTERNAL_SOURCE_CHARS: usize = 100;
pub const MAX_DESCRIPTION_CHARS: usize = 350;

/// Metadata accompanying one import. Mismatches expire server-side six
/// months after upload unless `expires` names an earlier ISO date.
#[derive(Debug, Clone)]
pub struct ImportMetadata {
  pub external_source: String,
  pub description: Option<String>,
  pub external_source_url: Option<String>,
  pub expires: Option<String>,
}

impl ImportMetadata {
  /// The query parameters the import API expects, omitting unset options.
  pub fn to_params(&self) -> Vec<(&'static str, String)> {
    let mut params = vec![("external_source", self.external_source.clone())];
    if let Some(description) = &self.description {
      params.push(("description", description.clone()));
    }
    if let Some(source_url) = &self.external_source_url {
      params.push(("external_source_url", source_url.clone()));
    }
    if let Some(expires) = &self.expires {
      params.push(("expires", expires.clone()));
    }
    params
  }
}

#[derive(Debug, Error)]
pub enum UploadError {
  #[error("could not read mismatch file: {0}")]
  File(#[from] std::io::Error),
  #[error("upload request failed: {0}")]
  Request(String),
  #[error("the import was rejected (http {status}): {body}")]
  Rejected { status: u16, body: String },
}

/// POST one schema-valid CSV to the import API. An HTTP error surfaces the
/// response body, which is the service's own description of the rejection.
pub fn upload_file(
  client: &Client,
  access_token: &str,
  mismatch_file: &Path,
  metadata: &ImportMetadata,
) -> Result<(), UploadError> {
  let form = Form::new()
    .file("mismatch_file", mismatch_file)
    .map_err(UploadError::File)?;
  let response = client
    .post(IMPORT_API_URL)
    .header("Accept", "application/json")
    .bearer_auth(access_token)
    .query(&metadata.to_params())
    .multipart(form)
    .send()
    .map_err(|err| UploadError::Request(err.to_string()))?;

  let status = response.status();
  if status.is_success() {
    Ok(())
  } else {
    Err(UploadError::Rejected {
      status: status.as_u16(),
      body: response.text().unwrap_or_default(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn omits_unset_metadata_params() {
    let metadata = ImportMetadata {
      external_source: "Open Library".to_string(),
      description: None,
      external_source_url: Some("https://openlibrary.org".to_string()),
      expires: None,
    };
    assert_eq!(
      metadata.to_params(),
      vec![
        ("external_source", "Open Library".to_string()),
        ("external_source_url", "https://openlibrary.org".to_string()),
      ]
    );
  }
}
