use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::check::MAX_UPLOAD_MB;

#[derive(Debug, Error)]
pub enum SplitError {
  #[error("mismatch file path has no usable file name")]
  BadFileName,
  #[error(transparent)]
  Csv(#[from] csv::Error),
  #[error(transparent)]
  Io(#[from] std::io::Error),
}

/// How many files a mismatch CSV of the given size needs to fit under the
/// upload limit. Sizes are whole megabytes, matching the limit check.
pub fn planned_part_count(file_bytes: u64) -> usize {
  let size_mb = file_bytes >> 20;
  let parts = (size_mb / MAX_UPLOAD_MB) as usize + usize::from(size_mb % MAX_UPLOAD_MB > 0);
  parts.max(1)
}

/// Near-equal part sizes, the remainder spread over the leading parts.
pub fn part_sizes(total_rows: usize, parts: usize) -> Vec<usize> {
  let base = total_rows / parts;
  let remainder = total_rows % parts;
  (0..parts)
    .map(|index| base + usize::from(index < remainder))
    .collect()
}

/// Split a mismatch CSV into `parts` files named `{stem}_{i}.csv` inside
/// `out_dir`, every part carrying the source header. Rows pass through as
/// raw records, untouched.
pub fn split_csv_into(
  source: &Path,
  out_dir: &Path,
  parts: usize,
) -> Result<Vec<PathBuf>, SplitError> {
  let stem = source
    .file_stem()
    .and_then(|stem| stem.to_str())
    .ok_or(SplitError::BadFileName)?;

  let mut reader = csv::Reader::from_path(source)?;
  let headers = reader.headers()?.clone();
  let rows: Vec<csv::StringRecord> = reader.records().collect::<Result<Vec<_>, _>>()?;
  let sizes = part_sizes(rows.len(), parts);

  let mut produced = Vec::new();
  let mut cursor = rows.iter();
  for (index, size) in sizes.iter().enumerate() {
    let part_path = out_dir.join(format!("{}_{}.csv", stem, index + 1));
    let mut writer = csv::Writer::from_path(&part_path)?;
    writer.write_record(&headers)?;
    for record in cursor.by_ref().take(*size) {
      writer.write_record(record)?;
    }
    writer.flush()?;
    produced.push(part_path);
  }
  Ok(produced)
}

/// Split an oversized mismatch CSV by its on-disk size.
pub fn split_csv(source: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, SplitError> {
  let file_bytes = fs::metadata(source)?.len();
  split_csv_into(source, out_dir, planned_part_count(file_bytes))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn plans_one_part_per_started_ten_megabytes() {
    assert_eq!(planned_part_count(25 << 20), 3);
    assert_eq!(planned_part_count(30 << 20), 3);
    assert_eq!(planned_part_count(31 << 20), 4);
    assert_eq!(planned_part_count(512 << 10), 1);
  }

  #[test]
  fn spreads_the_remainder_over_the_leading_parts() {
    assert_eq!(part_sizes(10, 3), vec![4, 3, 3]);
    assert_eq!(part_sizes(9, 3), vec![3, 3, 3]);
    assert_eq!(part_sizes(2, 2), vec![1, 1]);
  }

  #[test]
  fn every_part_carries_the_header() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("mismatches.csv");
    std::fs::write(
      &source,
      "item_id,statement_guid,property_id,wikidata_value,meta_wikidata_value,external_value,external_url,type\n\
       Q1,,P577,,,1996,,statement\n\
       Q2,,P577,,,1997,,statement\n\
       Q3,,P577,,,1998,,statement\n",
    )
    .unwrap();

    let parts = split_csv_into(&source, dir.path(), 2).unwrap();
    assert_eq!(parts.len(), 2);
    assert!(parts[0].ends_with("mismatches_1.csv"));
    assert!(parts[1].ends_with("mismatches_2.csv"));

    let first = std::fs::read_to_string(&parts[0]).unwrap();
    let second = std::fs::read_to_string(&parts[1]).unwrap();
    assert_eq!(first.lines().count(), 3);
    assert_eq!(second.lines().count(), 2);
    for content in [&first, &second] {
      assert!(content.starts_with("item_id,statement_guid,property_id"));
    }
    assert!(first.contains("Q1") && first.contains("Q2"));
    assert!(second.contains("Q3"));
  }
}
