/// Crosschecks publication dates (P577) of written works on Wikidata
/// against Open Library, emitting a Mismatch Finder import CSV.
///
/// Input CSVs come from a Wikidata query export with the columns
/// `item`, `publicationDate`, `openLibraryID`; large exports are usually
/// split into several files, so more than one input may be passed.
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use rayon::prelude::*;
use reqwest::blocking::Client;
use serde::Deserialize;

use mismatch_util::check::ensure_valid;
use mismatch_util::client::{with_rate_limit_retry, ClientConfig};
use mismatch_util::dates::{
  compare, earliest, parse_wikidata_time, CanonicalDate, Candidate, Comparison,
};
use mismatch_util::mismatch::{normalize_item_id, MismatchBatch, MismatchRow};
use mismatch_util::openlibrary;
use mismatch_util::wikidata;

const PUBLICATION_DATE_PID: &str = "P577";
// one blocking client per parallel lane
const NUM_CLIENTS: usize = 4;
const CHUNK_COOLDOWN_MILLIS: u64 = 200;

#[derive(Parser)]
#[command(about = "Generate publication date mismatches from Open Library.")]
struct Args {
  /// Wikidata query export CSV(s) with item, publicationDate and openLibraryID columns.
  #[arg(short = 'i', long = "input-file", required = true, num_args = 1..)]
  input_files: Vec<PathBuf>,
  /// Where to write the mismatch import CSV.
  #[arg(short = 'o', long, default_value = "openlibrary_publication_date_mismatches.csv")]
  output_file: PathBuf,
  /// PEM bundle to trust instead of the system roots.
  #[arg(long)]
  ca_bundle: Option<PathBuf>,
  /// Increase output verbosity.
  #[arg(short, long)]
  verbose: bool,
}

#[derive(Debug, Deserialize)]
struct WorkRow {
  item: String,
  #[serde(rename = "publicationDate")]
  publication_date: String,
  #[serde(rename = "openLibraryID")]
  open_library_id: String,
}

fn main() -> Result<()> {
  let args = Args::parse();
  env_logger::Builder::from_default_env()
    .format_target(false)
    .format_timestamp_secs()
    .filter_level(if args.verbose { log::LevelFilter::Info } else { log::LevelFilter::Warn })
    .init();

  let mut works = Vec::new();
  for input_file in &args.input_files {
    let mut reader = csv::Reader::from_path(input_file)
      .with_context(|| format!("could not open {}", input_file.display()))?;
    for row in reader.deserialize::<WorkRow>() {
      works.push(row.with_context(|| format!("bad row in {}", input_file.display()))?);
    }
  }
  eprintln!("-- crosschecking {} works against Open Library", works.len());

  let config = ClientConfig { ca_bundle: args.ca_bundle.clone() };
  let clients = (0..NUM_CLIENTS)
    .map(|_| config.build())
    .collect::<Result<Vec<_>, _>>()?;

  let progress = ProgressBar::new(works.len() as u64);
  progress.set_style(
    ProgressStyle::default_bar()
      .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
      .expect("progress bar template is well formed")
      .progress_chars("#>-"),
  );

  let mut rows = Vec::new();
  let mut skipped = 0usize;
  for chunk in works.chunks(NUM_CLIENTS) {
    // fetch a chunk in parallel, then consume it in input order so the
    // emitted rows stay stable by input index
    let fetched: Vec<_> = chunk
      .par_iter()
      .enumerate()
      .map(|(lane, work)| {
        let outcome = with_rate_limit_retry(|| {
          openlibrary::publish_date_candidates(&clients[lane], &work.open_library_id)
        });
        (work, outcome)
      })
      .collect();

    for (work, outcome) in fetched {
      progress.inc(1);
      let raw_dates = match outcome {
        Ok(raw_dates) => raw_dates,
        Err(err) => {
          warn!("skipping {} ({}): {}", work.item, work.open_library_id, err);
          skipped += 1;
          continue;
        }
      };
      if raw_dates.is_empty() {
        info!("publication date not found on Open Library for item {}", work.item);
        skipped += 1;
        continue;
      }

      let candidates: Vec<Candidate> =
        raw_dates.iter().map(|raw| Candidate::parse(raw)).collect();
      let Some(chosen) = earliest(&candidates) else {
        warn!("no parseable Open Library date for item {}", work.item);
        skipped += 1;
        continue;
      };
      let Some(external_date) = chosen.date else {
        continue;
      };

      let known = match parse_wikidata_time(&work.publication_date) {
        Ok(known) => known,
        Err(err) => {
          warn!("skipping {}: bad Wikidata value ({})", work.item, err);
          skipped += 1;
          continue;
        }
      };

      if compare(&known, &external_date) == Comparison::Mismatch {
        // a recorded wikidata value must name its statement, so look the
        // guid up; when the lookup comes back empty the row is emitted
        // with neither, which the schema allows
        let (statement_guid, wikidata_value) =
          match publication_statement_guid(&clients[0], &work.item, &known) {
            Some(guid) => (Some(guid), Some(known.wikidata_time())),
            None => (None, None),
          };
        rows.push(MismatchRow::statement(
          &work.item,
          PUBLICATION_DATE_PID,
          statement_guid.as_deref(),
          wikidata_value.as_deref(),
          &chosen.raw,
          Some(&openlibrary::work_url(&work.open_library_id)),
        ));
      }
    }
    // courtesy sleep for reducing the load on Open Library's infra.
    thread::sleep(Duration::from_millis(CHUNK_COOLDOWN_MILLIS));
  }
  progress.finish_and_clear();
  eprintln!("-- found {} mismatches ({} records skipped)", rows.len(), skipped);

  let batch = MismatchBatch::new(rows);
  ensure_valid(&batch)?;
  batch.write_csv_path(&args.output_file)?;
  eprintln!("-- wrote {} rows to {}", batch.len(), args.output_file.display());
  Ok(())
}

/// The GUID of the item's publication date statement holding the known
/// value, resolved through the Wikidata REST API.
fn publication_statement_guid(
  client: &Client,
  item: &str,
  known: &CanonicalDate,
) -> Option<String> {
  let item_id = normalize_item_id(item);
  let statements = match wikidata::item_statements(client, &item_id) {
    Ok(statements) => statements,
    Err(err) => {
      warn!("could not resolve statement guid for {}: {}", item_id, err);
      return None;
    }
  };
  statements
    .get(PUBLICATION_DATE_PID)
    .into_iter()
    .flatten()
    .find(|statement| {
      statement.time().is_some_and(|time| {
        parse_wikidata_time(time)
          .map(|parsed| parsed.instant == known.instant)
          .unwrap_or(false)
      })
    })
    .map(|statement| statement.id.clone())
}
