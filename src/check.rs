use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use url::Url;

use crate::mismatch::{MismatchBatch, COLUMNS, TYPE_QUALIFIER, TYPE_STATEMENT};

/// Upload limit of the Mismatch Finder import API, in megabytes.
pub const MAX_UPLOAD_MB: u64 = 10;
/// Value columns are capped by the import service.
pub const MAX_VALUE_CHARS: usize = 1500;

lazy_static! {
  static ref QID_REGEX: Regex = Regex::new(r"^Q\d+$").unwrap();
  static ref PID_REGEX: Regex = Regex::new(r"^P\d+$").unwrap();
}

/// The outcome of checking one batch: every violation found, in check
/// order, never just the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
  violations: Vec<String>,
}

impl ValidationReport {
  pub fn ok(&self) -> bool {
    self.violations.is_empty()
  }

  pub fn violations(&self) -> &[String] {
    &self.violations
  }

  /// The full feedback text shown to data producers: the user guide
  /// pointer followed by every violation, numbered.
  pub fn directions_message(&self) -> String {
    let mut message = String::from(
      "There's a problem with the mismatch data. Please see the Mismatch Finder file creation directions on GitHub:\n\
       \n\
       https://github.com/wmde/wikidata-mismatch-finder/blob/main/docs/UserGuide.md#creating-a-mismatches-import-file\n\
       \n\
       Directions on how to fix the data are also detailed below:\n",
    );
    for (index, violation) in self.violations.iter().enumerate() {
      message.push_str(&format!("\n{}. {}\n", index + 1, violation));
    }
    message
  }
}

/// A batch that failed the schema check, with every violation aggregated
/// into one error. This is the only hard stop on the upload path.
#[derive(Debug, Error)]
#[error("{}", .0.directions_message())]
pub struct CheckError(pub ValidationReport);

fn bullet_list(intro: &str, entries: &[String]) -> String {
  let mut message = intro.to_string();
  for entry in entries {
    message.push_str(&format!("\n    - {}", entry));
  }
  message
}

fn has_column(batch: &MismatchBatch, name: &str) -> bool {
  batch.columns.iter().any(|column| column == name)
}

fn validate_url(url: &str) -> bool {
  match Url::parse(url) {
    Ok(parsed) => parsed.has_host(),
    Err(_) => false,
  }
}

/// Check a batch against the import file contract. All checks always run
/// and every failure is accumulated; value checks only run over columns
/// the batch actually has, so a missing column is reported once by the
/// column check instead of cascading.
pub fn check_batch(batch: &MismatchBatch) -> ValidationReport {
  let mut violations = Vec::new();

  // 1. column set and order
  if batch.columns != COLUMNS {
    let required = COLUMNS
      .iter()
      .map(|column| format!("'{}'", column))
      .collect::<Vec<_>>()
      .join(", ");
    violations.push(format!(
      "Please check that the following columns are present in this exact order:\n    {}",
      required
    ));
  }

  // 2. QID and PID shapes
  let mut invalid_id_columns = Vec::new();
  if has_column(batch, "item_id") && !batch.rows.iter().all(|row| QID_REGEX.is_match(&row.item_id)) {
    invalid_id_columns.push("item_id".to_string());
  }
  if has_column(batch, "property_id")
    && !batch.rows.iter().all(|row| PID_REGEX.is_match(&row.property_id))
  {
    invalid_id_columns.push("property_id".to_string());
  }
  if !invalid_id_columns.is_empty() {
    violations.push(bullet_list(
      "Please assure that the following columns have valid ids:",
      &invalid_id_columns,
    ));
  }

  // 3. required values
  let mut null_columns = Vec::new();
  if has_column(batch, "item_id") && batch.rows.iter().any(|row| row.item_id.is_empty()) {
    null_columns.push("item_id".to_string());
  }
  if has_column(batch, "property_id") && batch.rows.iter().any(|row| row.property_id.is_empty()) {
    null_columns.push("property_id".to_string());
  }
  if has_column(batch, "external_value")
    && batch.rows.iter().any(|row| row.external_value.is_empty())
  {
    null_columns.push("external_value".to_string());
  }
  if !null_columns.is_empty() {
    violations.push(bullet_list(
      "Please assure that the following columns do not have null values:",
      &null_columns,
    ));
  }

  // 4. a recorded wikidata value must name the statement it came from
  if has_column(batch, "statement_guid") && has_column(batch, "wikidata_value") {
    let orphaned_value = batch
      .rows
      .iter()
      .any(|row| row.wikidata_value.is_some() && row.statement_guid.is_none());
    if orphaned_value {
      violations.push(
        "Please assure that `statement_guid` is null only in cases where `wikidata_value` is as well."
          .to_string(),
      );
    }
  }

  // 5. external urls must be absolute
  if has_column(batch, "external_url") {
    let invalid_urls: Vec<String> = batch
      .rows
      .iter()
      .filter_map(|row| row.external_url.as_deref())
      .filter(|candidate| !validate_url(candidate))
      .map(str::to_string)
      .collect();
    if !invalid_urls.is_empty() {
      violations.push(bullet_list(
        "Please check the following URLs in `external_url` to make sure that they're valid:",
        &invalid_urls,
      ));
    }
  }

  // 6. type vocabulary
  if has_column(batch, "type") {
    let type_ok = batch.rows.iter().all(|row| match row.mismatch_type.as_deref() {
      None | Some(TYPE_STATEMENT) | Some(TYPE_QUALIFIER) => true,
      Some(_) => false,
    });
    if !type_ok {
      violations.push(
        "Please check that the `type` column contains only: 'statement', 'qualifier' or a null value."
          .to_string(),
      );
    }
  }

  // 7. value lengths
  let mut too_long_columns = Vec::new();
  if has_column(batch, "wikidata_value")
    && batch.rows.iter().any(|row| {
      row.wikidata_value.as_deref().is_some_and(|value| value.chars().count() > MAX_VALUE_CHARS)
    })
  {
    too_long_columns.push("wikidata_value".to_string());
  }
  if has_column(batch, "external_value")
    && batch.rows.iter().any(|row| row.external_value.chars().count() > MAX_VALUE_CHARS)
  {
    too_long_columns.push("external_value".to_string());
  }
  if has_column(batch, "external_url")
    && batch.rows.iter().any(|row| {
      row.external_url.as_deref().is_some_and(|value| value.chars().count() > MAX_VALUE_CHARS)
    })
  {
    too_long_columns.push("external_url".to_string());
  }
  if !too_long_columns.is_empty() {
    violations.push(bullet_list(
      "Please assure that the following columns do not have values over 1,500 characters:",
      &too_long_columns,
    ));
  }

  ValidationReport { violations }
}

/// The upload-path wrapper: a clean batch passes through, anything else
/// halts with the aggregated report.
pub fn ensure_valid(batch: &MismatchBatch) -> Result<(), CheckError> {
  let report = check_batch(batch);
  if report.ok() {
    Ok(())
  } else {
    Err(CheckError(report))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::mismatch::MismatchRow;

  fn well_formed_row() -> MismatchRow {
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
  fn accepts_a_minimal_well_formed_batch() {
    let report = check_batch(&MismatchBatch::new(vec![well_formed_row()]));
    assert!(report.ok());
    assert!(report.violations().is_empty());
  }

  #[test]
  fn accumulates_every_violation_instead_of_short_circuiting() {
    let mut row = well_formed_row();
    row.item_id = "X1".to_string();
    row.external_url = Some("not-a-url".to_string());
    let report = check_batch(&MismatchBatch::new(vec![row]));
    assert_eq!(report.violations().len(), 2);
    assert!(report.violations()[0].contains("item_id"));
    assert!(report.violations()[1].contains("not-a-url"));
  }

  #[test]
  fn rejects_wrong_column_order() {
    let mut batch = MismatchBatch::new(vec![well_formed_row()]);
    batch.columns.swap(0, 2);
    let report = check_batch(&batch);
    assert_eq!(report.violations().len(), 1);
    assert!(report.violations()[0].contains("exact order"));
  }

  #[test]
  fn rejects_missing_required_values() {
    let mut row = well_formed_row();
    row.external_value = String::new();
    let report = check_batch(&MismatchBatch::new(vec![row]));
    assert_eq!(report.violations().len(), 1);
    assert!(report.violations()[0].contains("external_value"));
  }

  #[test]
  fn rejects_values_without_statement_guids() {
    let mut row = well_formed_row();
    row.statement_guid = None;
    let report = check_batch(&MismatchBatch::new(vec![row]));
    assert_eq!(report.violations().len(), 1);
    assert!(report.violations()[0].contains("statement_guid"));
    // the converse is allowed
    let mut guid_only = well_formed_row();
    guid_only.wikidata_value = None;
    assert!(check_batch(&MismatchBatch::new(vec![guid_only])).ok());
  }

  #[test]
  fn rejects_unknown_type_values() {
    let mut row = well_formed_row();
    row.mismatch_type = Some("claim".to_string());
    let report = check_batch(&MismatchBatch::new(vec![row]));
    assert_eq!(report.violations().len(), 1);
    assert!(report.violations()[0].contains("`type`"));
    // empty type is read as statement by the sink
    let mut untyped = well_formed_row();
    untyped.mismatch_type = None;
    assert!(check_batch(&MismatchBatch::new(vec![untyped])).ok());
  }

  #[test]
  fn rejects_overlong_values() {
    let mut row = well_formed_row();
    row.external_value = "x".repeat(MAX_VALUE_CHARS + 1);
    let report = check_batch(&MismatchBatch::new(vec![row]));
    assert_eq!(report.violations().len(), 1);
    assert!(report.violations()[0].contains("1,500 characters"));
    assert!(report.violations()[0].contains("external_value"));
  }

  #[test]
  fn reports_are_idempotent() {
    let mut row = well_formed_row();
    row.item_id = "X1".to_string();
    let batch = MismatchBatch::new(vec![row]);
    assert_eq!(check_batch(&batch), check_batch(&batch));
  }

  #[test]
  fn ensure_valid_aggregates_into_one_error() {
    let mut row = well_formed_row();
    row.item_id = "X1".to_string();
    row.external_url = Some("not-a-url".to_string());
    let error = ensure_valid(&MismatchBatch::new(vec![row])).unwrap_err();
    let message = error.to_string();
    assert!(message.contains("UserGuide.md"));
    assert!(message.contains("1. "));
    assert!(message.contains("2. "));
  }
}
