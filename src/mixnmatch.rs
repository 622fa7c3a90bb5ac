use reqwest::blocking::Client;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::client::FetchError;

pub const API_BASE_URL: &str = "https://mix-n-match.toolforge.org/api.php";

/// One `time_mismatch` issue from the Mix'n'Match issue listing.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeMismatchIssue {
  #[serde(deserialize_with = "string_or_number")]
  pub entry_id: String,
  pub time_mismatch: TimeMismatch,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeMismatch {
  #[serde(rename = "prop")]
  pub property_id: String,
  #[serde(rename = "q")]
  pub item_id: String,
  pub wd_time: String,
  pub mnm_time: String,
}

impl TimeMismatchIssue {
  /// The catalog's own page for this entry, useful in skip logs.
  pub fn source_url(&self) -> String {
    format!("https://mix-n-match.toolforge.org/#/entry/{}", self.entry_id)
  }

  /// The listing includes entries whose two times already agree; those are
  /// not mismatches and are dropped up front.
  pub fn is_genuine(&self) -> bool {
    self.time_mismatch.wd_time != self.time_mismatch.mnm_time
  }
}

// entry ids come back as numbers from some catalogs and strings from others
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
  match Value::deserialize(deserializer)? {
    Value::String(text) => Ok(text),
    Value::Number(number) => Ok(number.to_string()),
    other => Err(serde::de::Error::custom(format!("expected an entry id, got {}", other))),
  }
}

#[derive(Debug, Deserialize)]
struct IssuesResponse {
  #[serde(default)]
  data: Vec<TimeMismatchIssue>,
}

/// Every open time-mismatch issue across all catalogs.
pub fn time_mismatch_issues(client: &Client) -> Result<Vec<TimeMismatchIssue>, FetchError> {
  let url = format!("{}?query=all_issues&mode=time_mismatch", API_BASE_URL);
  let response = client.get(&url).send().map_err(FetchError::from_request)?;
  let status = response.status().as_u16();
  if status != 200 {
    return Err(FetchError::from_status(status));
  }
  let parsed: IssuesResponse = response
    .json()
    .map_err(|err| FetchError::Malformed(err.to_string()))?;
  Ok(parsed.data)
}

/// The external source URL recorded for a catalog entry. The API sometimes
/// returns an empty `entries` array instead of a map, so the payload is
/// probed rather than deserialized into a fixed shape.
pub fn entry_external_url(client: &Client, entry_id: &str) -> Result<String, FetchError> {
  let url = format!("{}?query=get_entry&entry={}", API_BASE_URL, entry_id);
  let response = client.get(&url).send().map_err(FetchError::from_request)?;
  let status = response.status().as_u16();
  if status != 200 {
    return Err(FetchError::from_status(status));
  }
  let payload: Value = response
    .json()
    .map_err(|err| FetchError::Malformed(err.to_string()))?;
  payload
    .get("data")
    .and_then(|data| data.get("entries"))
    .and_then(|entries| entries.get(entry_id))
    .and_then(|entry| entry.get("ext_url"))
    .and_then(Value::as_str)
    .map(str::to_string)
    .ok_or_else(|| FetchError::Malformed(format!("no ext_url for entry {}", entry_id)))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn deserializes_issues_with_numeric_and_string_entry_ids() {
    let listing: IssuesResponse = serde_json::from_value(serde_json::json!({
      "data": [
        {
          "entry_id": 91474261,
          "issue_id": 4,
          "time_mismatch": {"prop": "P570", "q": "Q1339", "wd_time": "+1750-07-28T00:00:00Z", "mnm_time": "+1750-07-27T00:00:00Z"}
        },
        {
          "entry_id": "112",
          "time_mismatch": {"prop": "P569", "q": "Q2", "wd_time": "+1900-01-01T00:00:00Z", "mnm_time": "+1900-01-01T00:00:00Z"}
        }
      ]
    }))
    .unwrap();
    assert_eq!(listing.data.len(), 2);
    assert_eq!(listing.data[0].entry_id, "91474261");
    assert!(listing.data[0].is_genuine());
    assert!(!listing.data[1].is_genuine());
    assert_eq!(
      listing.data[0].source_url(),
      "https://mix-n-match.toolforge.org/#/entry/91474261"
    );
  }
}
