use std::collections::HashMap;

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::client::FetchError;

pub const REST_ITEMS_BASE_URL: &str =
  "https://www.wikidata.org/w/rest.php/wikibase/v0/entities/items";

/// A statement as served by the Wikidata REST API. Only the fields the
/// mismatch generators read are modeled; `content` stays untyped because
/// its shape depends on the property's datatype.
#[derive(Debug, Clone, Deserialize)]
pub struct Statement {
  pub id: String,
  pub value: StatementValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatementValue {
  #[serde(rename = "type")]
  pub value_type: String,
  #[serde(default)]
  pub content: Value,
}

impl Statement {
  /// Whether the statement holds a concrete value, as opposed to
  /// somevalue/novalue or a range.
  pub fn has_concrete_value(&self) -> bool {
    self.value.value_type == "value"
  }

  /// The time payload of a concrete time-valued statement.
  pub fn time(&self) -> Option<&str> {
    if !self.has_concrete_value() {
      return None;
    }
    self.value.content.get("time").and_then(Value::as_str)
  }
}

#[derive(Debug, Deserialize)]
struct StatementsResponse {
  #[serde(default)]
  statements: HashMap<String, Vec<Statement>>,
}

/// Fetch an item's statements, keyed by property id.
pub fn item_statements(
  client: &Client,
  item_id: &str,
) -> Result<HashMap<String, Vec<Statement>>, FetchError> {
  let url = format!("{}/{}?_fields=statements", REST_ITEMS_BASE_URL, item_id);
  let response = client.get(&url).send().map_err(FetchError::from_request)?;
  let status = response.status().as_u16();
  if status != 200 {
    return Err(FetchError::from_status(status));
  }
  let parsed: StatementsResponse = response
    .json()
    .map_err(|err| FetchError::Malformed(err.to_string()))?;
  Ok(parsed.statements)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn extracts_times_from_concrete_values() {
    let statement: Statement = serde_json::from_value(serde_json::json!({
      "id": "Q1$7b31ad2c-4e3f-2c1a-9f04-363929bbcd71",
      "value": {"type": "value", "content": {"time": "+1950-01-01T00:00:00Z", "precision": 11}}
    }))
    .unwrap();
    assert!(statement.has_concrete_value());
    assert_eq!(statement.time(), Some("+1950-01-01T00:00:00Z"));
  }

  #[test]
  fn ignores_non_value_statements() {
    let statement: Statement = serde_json::from_value(serde_json::json!({
      "id": "Q62900754$f8a1d2b0-41c6-7f22-8e05-48b2a1c9de14",
      "value": {"type": "somevalue"}
    }))
    .unwrap();
    assert!(!statement.has_concrete_value());
    assert_eq!(statement.time(), None);
  }
}
