use std::fs::File;
use std::path::Path;

use csv::StringRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// The import file schema, in the exact order the Mismatch Finder expects.
pub const COLUMNS: [&str; 8] = [
  "item_id",
  "statement_guid",
  "property_id",
  "wikidata_value",
  "meta_wikidata_value",
  "external_value",
  "external_url",
  "type",
];

pub const TYPE_STATEMENT: &str = "statement";
pub const TYPE_QUALIFIER: &str = "qualifier";

// query exports hold full entity URLs, generators want bare QIDs
static ENTITY_URL_REGEX: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"^https?://www\.wikidata\.org/(?:entity|wiki)/(Q\d+)$").unwrap());

/// Strip a full entity URL down to its QID; anything else passes through
/// untouched for the validator to judge.
pub fn normalize_item_id(raw: &str) -> String {
  match ENTITY_URL_REGEX.captures(raw.trim()) {
    Some(captures) => captures[1].to_string(),
    None => raw.trim().to_string(),
  }
}

/// One row of a mismatch import file. Immutable once built; `None` fields
/// serialize as empty CSV cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MismatchRow {
  pub item_id: String,
  pub statement_guid: Option<String>,
  pub property_id: String,
  pub wikidata_value: Option<String>,
  pub meta_wikidata_value: Option<String>,
  pub external_value: String,
  pub external_url: Option<String>,
  #[serde(rename = "type")]
  pub mismatch_type: Option<String>,
}

impl MismatchRow {
  /// Assemble a statement mismatch. Pure assembly, no validation: the
  /// schema check runs over whole batches, not here. `statement_guid` is
  /// `None` only when no specific statement is being corrected.
  pub fn statement(
    item_id: &str,
    property_id: &str,
    statement_guid: Option<&str>,
    wikidata_value: Option<&str>,
    external_value: &str,
    external_url: Option<&str>,
  ) -> MismatchRow {
    MismatchRow {
      item_id: normalize_item_id(item_id),
      statement_guid: statement_guid.map(str::to_string),
      property_id: property_id.to_string(),
      wikidata_value: wikidata_value.map(str::to_string),
      meta_wikidata_value: None,
      external_value: external_value.to_string(),
      external_url: external_url.map(str::to_string),
      mismatch_type: Some(TYPE_STATEMENT.to_string()),
    }
  }

  /// The same row shape for a qualifier mismatch.
  pub fn qualifier(
    item_id: &str,
    property_id: &str,
    statement_guid: Option<&str>,
    wikidata_value: Option<&str>,
    external_value: &str,
    external_url: Option<&str>,
  ) -> MismatchRow {
    MismatchRow {
      mismatch_type: Some(TYPE_QUALIFIER.to_string()),
      ..MismatchRow::statement(
        item_id,
        property_id,
        statement_guid,
        wikidata_value,
        external_value,
        external_url,
      )
    }
  }

  // field-by-header mapping so that structurally broken files still load
  // and the validator can enumerate what is wrong with them
  fn from_record(headers: &StringRecord, record: &StringRecord) -> MismatchRow {
    let field = |name: &str| -> String {
      headers
        .iter()
        .position(|header| header == name)
        .and_then(|index| record.get(index))
        .unwrap_or("")
        .to_string()
    };
    let optional = |name: &str| -> Option<String> {
      let value = field(name);
      if value.is_empty() {
        None
      } else {
        Some(value)
      }
    };
    MismatchRow {
      item_id: field("item_id"),
      statement_guid: optional("statement_guid"),
      property_id: field("property_id"),
      wikidata_value: optional("wikidata_value"),
      meta_wikidata_value: optional("meta_wikidata_value"),
      external_value: field("external_value"),
      external_url: optional("external_url"),
      mismatch_type: optional("type"),
    }
  }
}

/// An ordered batch of mismatch rows plus the column header it was built
/// or read with. Insertion order is processing order.
#[derive(Debug, Clone)]
pub struct MismatchBatch {
  pub columns: Vec<String>,
  pub rows: Vec<MismatchRow>,
}

impl MismatchBatch {
  /// A batch built in-memory always carries the canonical header.
  pub fn new(rows: Vec<MismatchRow>) -> MismatchBatch {
    MismatchBatch {
      columns: COLUMNS.iter().map(|column| column.to_string()).collect(),
      rows,
    }
  }

  /// Read a batch from a CSV file, capturing the file's actual header so
  /// the validator can flag column problems.
  pub fn from_csv_path(path: &Path) -> Result<MismatchBatch, csv::Error> {
    let mut reader = csv::Reader::from_path(path)?;
    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();
    for record in reader.records() {
      rows.push(MismatchRow::from_record(&headers, &record?));
    }
    Ok(MismatchBatch { columns, rows })
  }

  pub fn write_csv_path(&self, path: &Path) -> Result<(), csv::Error> {
    // the header is written explicitly so even an empty batch produces a
    // schema-complete file
    let mut writer = csv::WriterBuilder::new()
      .has_headers(false)
      .from_writer(File::create(path).map_err(csv::Error::from)?);
    writer.write_record(&self.columns)?;
    for row in &self.rows {
      writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
  }

  pub fn len(&self) -> usize {
    self.rows.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample_row() -> MismatchRow {
    MismatchRow::statement(
      "Q1",
      "P577",
      Some("Q1$abc"),
      Some("2022-04-15T00:00:00Z"),
      "2022-01-01T00:00:00Z",
      Some("https://openlibrary.org/works/OL1W"),
    )
  }

  #[test]
  fn builds_statement_rows_by_default() {
    let row = sample_row();
    assert_eq!(row.mismatch_type.as_deref(), Some(TYPE_STATEMENT));
    assert_eq!(row.meta_wikidata_value, None);
  }

  #[test]
  fn builds_qualifier_rows_on_request() {
    let row = MismatchRow::qualifier("Q1", "P580", None, None, "1999", None);
    assert_eq!(row.mismatch_type.as_deref(), Some(TYPE_QUALIFIER));
  }

  #[test]
  fn strips_entity_urls_to_bare_qids() {
    assert_eq!(normalize_item_id("http://www.wikidata.org/entity/Q42"), "Q42");
    assert_eq!(normalize_item_id("https://www.wikidata.org/wiki/Q42"), "Q42");
    assert_eq!(normalize_item_id("Q42"), "Q42");
    assert_eq!(normalize_item_id("X1"), "X1");
  }

  #[test]
  fn round_trips_through_csv() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mismatches.csv");

    let mut incomplete = sample_row();
    incomplete.statement_guid = None;
    incomplete.wikidata_value = None;
    incomplete.external_url = None;
    incomplete.mismatch_type = None;
    let batch = MismatchBatch::new(vec![sample_row(), incomplete.clone()]);
    batch.write_csv_path(&path).unwrap();

    let reloaded = MismatchBatch::from_csv_path(&path).unwrap();
    assert_eq!(reloaded.columns, COLUMNS.to_vec());
    assert_eq!(reloaded.rows, vec![sample_row(), incomplete]);
  }

  #[test]
  fn loads_structurally_broken_files_for_checking() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.csv");
    std::fs::write(&path, "item_id,external_value\nQ5,1999\n").unwrap();

    let batch = MismatchBatch::from_csv_path(&path).unwrap();
    assert_eq!(batch.columns, vec!["item_id", "external_value"]);
    assert_eq!(batch.rows[0].item_id, "Q5");
    assert_eq!(batch.rows[0].external_value, "1999");
    assert_eq!(batch.rows[0].property_id, "");
    assert_eq!(batch.rows[0].statement_guid, None);
  }
}
