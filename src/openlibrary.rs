use reqwest::blocking::Client;
use serde::Deserialize;

use crate::client::FetchError;

pub const WORKS_BASE_URL: &str = "https://openlibrary.org/works";

/// The subset of an Open Library work record we care about.
#[derive(Debug, Deserialize)]
struct WorkRecord {
  first_publish_date: Option<String>,
}

/// One edition inside the editions listing.
#[derive(Debug, Deserialize)]
struct EditionRecord {
  publish_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EditionsListing {
  #[serde(default)]
  entries: Vec<EditionRecord>,
}

pub fn work_url(work_id: &str) -> String {
  format!("{}/{}", WORKS_BASE_URL, work_id)
}

fn get_json<T: serde::de::DeserializeOwned>(client: &Client, url: &str) -> Result<T, FetchError> {
  let response = client.get(url).send().map_err(FetchError::from_request)?;
  let status = response.status().as_u16();
  if status != 200 {
    return Err(FetchError::from_status(status));
  }
  response
    .json::<T>()
    .map_err(|err| FetchError::Malformed(err.to_string()))
}

/// The work's first publication date as recorded by Open Library, if any.
pub fn first_publish_date(client: &Client, work_id: &str) -> Result<Option<String>, FetchError> {
  let record: WorkRecord = get_json(client, &format!("{}/{}.json", WORKS_BASE_URL, work_id))?;
  Ok(record.first_publish_date)
}

/// The publication date of every known edition of the work. Editions with
/// no date contribute `None` so callers can see how sparse the listing is.
pub fn edition_publish_dates(
  client: &Client,
  work_id: &str,
) -> Result<Vec<Option<String>>, FetchError> {
  let listing: EditionsListing =
    get_json(client, &format!("{}/{}/editions.json", WORKS_BASE_URL, work_id))?;
  Ok(listing.entries.into_iter().map(|edition| edition.publish_date).collect())
}

/// Every date-bearing record Open Library has for the work: the first
/// publication date if present, then each edition's date.
pub fn publish_date_candidates(client: &Client, work_id: &str) -> Result<Vec<String>, FetchError> {
  let mut raw_dates = Vec::new();
  if let Some(first) = first_publish_date(client, work_id)? {
    raw_dates.push(first);
  }
  for date in edition_publish_dates(client, work_id)?.into_iter().flatten() {
    raw_dates.push(date);
  }
  Ok(raw_dates)
}
