use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use log::warn;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("unrecognized date format: '{0}'")]
pub struct ParseError(pub String);

/// How much of the source string actually specified a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precision {
  Year,
  Month,
  Day,
}

/// A date normalized to a UTC midnight instant, tagged with the precision
/// of the string it came from. A bare year carries the synthetic
/// month=1/day=1 and `Precision::Year`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalDate {
  pub instant: DateTime<Utc>,
  pub precision: Precision,
}

impl CanonicalDate {
  pub fn new(date: NaiveDate, precision: Precision) -> Self {
    CanonicalDate {
      instant: Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)),
      precision,
    }
  }

  /// The Wikidata time serialization, e.g. `2022-04-15T00:00:00Z`.
  pub fn wikidata_time(&self) -> String {
    self.instant.format("%Y-%m-%dT%H:%M:%SZ").to_string()
  }
}

struct DateFormat {
  fmt: &'static str,
  // missing fields are synthesized as 1 by padding the input before parsing
  fill: &'static str,
  precision: Precision,
}

// Tried in this order, first successful parse wins. Most specific format
// first; no attempt is made to detect strings that several formats would
// accept. Note that chrono's %B also accepts abbreviated month names when
// parsing, so "Jan 1 1996" matches the "%B %d %Y" entry.
const DATE_FORMATS: &[DateFormat] = &[
  DateFormat { fmt: "%Y-%m-%d", fill: "", precision: Precision::Day },
  DateFormat { fmt: "%B %d, %Y", fill: "", precision: Precision::Day },
  DateFormat { fmt: "%B %d %Y", fill: "", precision: Precision::Day },
  DateFormat { fmt: "%B %Y %d", fill: " 1", precision: Precision::Month },
  DateFormat { fmt: "%Y %m %d", fill: " 1 1", precision: Precision::Year },
];

/// Parse an external free-text date into a [`CanonicalDate`].
pub fn normalize(raw: &str) -> Result<CanonicalDate, ParseError> {
  let trimmed = raw.trim();
  for format in DATE_FORMATS {
    let padded = format!("{}{}", trimmed, format.fill);
    if let Ok(date) = NaiveDate::parse_from_str(&padded, format.fmt) {
      return Ok(CanonicalDate::new(date, format.precision));
    }
  }
  Err(ParseError(raw.to_string()))
}

/// Parse the Wikidata time serialization (`2022-04-15T00:00:00Z`, with an
/// optional leading `+`) as a day-precision date.
pub fn parse_wikidata_time(raw: &str) -> Result<CanonicalDate, ParseError> {
  let trimmed = raw.trim().trim_start_matches('+');
  let parsed = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%SZ")
    .map_err(|_| ParseError(raw.to_string()))?;
  Ok(CanonicalDate {
    instant: Utc.from_utc_datetime(&parsed),
    precision: Precision::Day,
  })
}

/// One raw date string from an external record, parsed if possible.
#[derive(Debug, Clone)]
pub struct Candidate {
  pub raw: String,
  pub date: Option<CanonicalDate>,
}

impl Candidate {
  /// Normalize a raw string, logging it when no known format matches.
  pub fn parse(raw: &str) -> Candidate {
    match normalize(raw) {
      Ok(date) => Candidate { raw: raw.to_string(), date: Some(date) },
      Err(err) => {
        warn!("{}", err);
        Candidate { raw: raw.to_string(), date: None }
      }
    }
  }
}

/// The earliest parseable candidate, or `None` when nothing parsed.
/// Ties are equivalent for our purposes and broken arbitrarily.
pub fn earliest(candidates: &[Candidate]) -> Option<&Candidate> {
  candidates
    .iter()
    .filter(|candidate| candidate.date.is_some())
    .min_by_key(|candidate| candidate.date.map(|date| date.instant))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
  Match,
  Mismatch,
}

/// Decide whether a Wikidata-held date and an externally-sourced date are a
/// genuine discrepancy. External sources frequently record only a year for
/// facts Wikidata holds fully specified, so a year-precision candidate in
/// the known value's year is not a mismatch unless the known value really
/// is January 1 of that year.
pub fn compare(known: &CanonicalDate, candidate: &CanonicalDate) -> Comparison {
  if known.instant == candidate.instant {
    return Comparison::Match;
  }
  if known.instant.year() == candidate.instant.year()
    && candidate.precision == Precision::Year
    && !(known.instant.month() == 1 && known.instant.day() == 1)
  {
    return Comparison::Match;
  }
  Comparison::Mismatch
}

#[cfg(test)]
mod tests {
  use super::*;

  fn day(y: i32, m: u32, d: u32) -> CanonicalDate {
    CanonicalDate::new(NaiveDate::from_ymd_opt(y, m, d).unwrap(), Precision::Day)
  }

  fn year(y: i32) -> CanonicalDate {
    CanonicalDate::new(NaiveDate::from_ymd_opt(y, 1, 1).unwrap(), Precision::Year)
  }

  #[test]
  fn normalizes_known_formats() {
    let cases = [
      ("1996", (1996, 1, 1), Precision::Year),
      ("January 1996", (1996, 1, 1), Precision::Month),
      ("Jan 1996", (1996, 1, 1), Precision::Month),
      ("January 1, 1996", (1996, 1, 1), Precision::Day),
      ("January 01, 1996", (1996, 1, 1), Precision::Day),
      ("Jan 1 1996", (1996, 1, 1), Precision::Day),
      ("2005-01-01", (2005, 1, 1), Precision::Day),
      ("2021-12-31", (2021, 12, 31), Precision::Day),
    ];
    for (raw, (y, m, d), precision) in cases {
      let parsed = normalize(raw).unwrap();
      assert_eq!(parsed, CanonicalDate::new(NaiveDate::from_ymd_opt(y, m, d).unwrap(), precision), "{raw}");
    }
  }

  #[test]
  fn rejects_unknown_formats() {
    assert!(normalize("circa 1850").is_err());
    assert!(normalize("1996?").is_err());
    assert!(normalize("").is_err());
  }

  #[test]
  fn normalized_instants_are_utc_midnight() {
    let parsed = normalize("January 1996").unwrap();
    assert_eq!(parsed.wikidata_time(), "1996-01-01T00:00:00Z");
  }

  #[test]
  fn parses_wikidata_time_strings() {
    let parsed = parse_wikidata_time("2022-04-15T00:00:00Z").unwrap();
    assert_eq!(parsed, day(2022, 4, 15));
    let signed = parse_wikidata_time("+2022-04-15T00:00:00Z").unwrap();
    assert_eq!(signed, day(2022, 4, 15));
    assert!(parse_wikidata_time("2022-04-15").is_err());
  }

  #[test]
  fn compares_equal_instants_as_match() {
    assert_eq!(compare(&day(2022, 4, 15), &day(2022, 4, 15)), Comparison::Match);
  }

  #[test]
  fn tolerates_year_precision_candidates_in_the_same_year() {
    assert_eq!(compare(&day(2022, 4, 15), &year(2022)), Comparison::Match);
  }

  #[test]
  fn flags_day_differences_at_equal_precision() {
    assert_eq!(compare(&day(2022, 1, 1), &day(2022, 4, 15)), Comparison::Mismatch);
  }

  #[test]
  fn flags_different_years() {
    assert_eq!(compare(&day(2022, 4, 15), &day(2023, 4, 15)), Comparison::Mismatch);
  }

  #[test]
  fn reduces_to_the_earliest_candidate() {
    let single = vec![Candidate::parse("2021-02-01")];
    assert_eq!(earliest(&single).unwrap().raw, "2021-02-01");

    let many = vec![
      Candidate::parse("2021-01-01"),
      Candidate::parse("2022-02-02"),
      Candidate::parse("2020-12-31"),
      Candidate::parse("2021-06-03"),
    ];
    assert_eq!(earliest(&many).unwrap().raw, "2020-12-31");
  }

  #[test]
  fn reduces_all_unparseable_to_none() {
    let unparseable = vec![Candidate::parse("n.d."), Candidate::parse("unknown")];
    assert!(earliest(&unparseable).is_none());
    assert!(earliest(&[]).is_none());
  }
}
