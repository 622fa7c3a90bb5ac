/// Turns Mix'n'Match `time_mismatch` issues into a Mismatch Finder import
/// CSV by crosschecking each flagged item's statements through the
/// Wikidata REST API. Reentrant: an interrupted run picks up from the
/// rows already accumulated in the output file.
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};

use mismatch_util::check::ensure_valid;
use mismatch_util::client::ClientConfig;
use mismatch_util::mismatch::{MismatchBatch, MismatchRow};
use mismatch_util::mixnmatch;
use mismatch_util::wikidata;

#[derive(Parser)]
#[command(about = "Generate time mismatches from Mix'n'Match issue reports.")]
struct Args {
  /// Where to write the mismatch import CSV. An existing file is resumed.
  #[arg(short = 'o', long, default_value = "mixnmatch_time_mismatches.csv")]
  output_file: PathBuf,
  /// PEM bundle to trust instead of the system roots.
  #[arg(long)]
  ca_bundle: Option<PathBuf>,
  /// Increase output verbosity.
  #[arg(short, long)]
  verbose: bool,
}

fn main() -> Result<()> {
  let args = Args::parse();
  env_logger::Builder::from_default_env()
    .format_target(false)
    .format_timestamp_secs()
    .filter_level(if args.verbose { log::LevelFilter::Info } else { log::LevelFilter::Warn })
    .init();

  let client = ClientConfig { ca_bundle: args.ca_bundle.clone() }.build()?;

  eprintln!("-- fetching time-mismatch issues from Mix'n'Match");
  let issues = mixnmatch::time_mismatch_issues(&client)?;
  let genuine: Vec<_> = issues.into_iter().filter(|issue| issue.is_genuine()).collect();
  eprintln!("-- {} issues with genuinely differing times", genuine.len());

  // resume from a previous interrupted run: skip one listed issue per row
  // already on disk. Coarse (an issue can yield several rows), but it only
  // ever re-emits, never drops.
  let mut rows = if args.output_file.is_file() {
    let existing = MismatchBatch::from_csv_path(&args.output_file)
      .with_context(|| format!("could not resume from {}", args.output_file.display()))?;
    eprintln!("-- resuming: {} rows already accumulated", existing.len());
    existing.rows
  } else {
    Vec::new()
  };
  let already_covered = rows.len().min(genuine.len());

  let progress = ProgressBar::new((genuine.len() - already_covered) as u64);
  progress.set_style(
    ProgressStyle::default_bar()
      .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
      .expect("progress bar template is well formed")
      .progress_chars("#>-"),
  );

  for issue in genuine.iter().skip(already_covered) {
    progress.inc(1);
    let data = &issue.time_mismatch;

    let statements = match wikidata::item_statements(&client, &data.item_id) {
      Ok(statements) => statements,
      Err(err) => {
        warn!("skipping {} ({}): {}", data.item_id, issue.source_url(), err);
        continue;
      }
    };

    let external_url = match mixnmatch::entry_external_url(&client, &issue.entry_id) {
      Ok(external_url) => external_url,
      Err(err) => {
        warn!("skipping malformed external URL for {}: {}", issue.source_url(), err);
        continue;
      }
    };

    match statements.get(&data.property_id) {
      // the property is entirely absent, so there is no statement to name
      None => rows.push(MismatchRow::statement(
        &data.item_id,
        &data.property_id,
        None,
        None,
        &data.mnm_time,
        Some(&external_url),
      )),
      // Wikidata may hold several incorrect values; emit a row for each
      Some(candidates) => {
        for statement in candidates {
          let Some(wikidata_time) = statement.time() else {
            info!(
              "skipping {} on {} {}: no concrete value",
              statement.id, data.item_id, data.property_id
            );
            continue;
          };
          if wikidata_time == data.mnm_time {
            // isn't actually a mismatch
            continue;
          }
          rows.push(MismatchRow::statement(
            &data.item_id,
            &data.property_id,
            Some(&statement.id),
            Some(wikidata_time),
            &data.mnm_time,
            Some(&external_url),
          ));
        }
      }
    }
  }
  progress.finish_and_clear();

  let batch = MismatchBatch::new(rows);
  batch.write_csv_path(&args.output_file)?;
  eprintln!("-- wrote {} rows to {}", batch.len(), args.output_file.display());
  ensure_valid(&batch)?;
  println!("All checks have passed! The data is ready to be uploaded to Mismatch Finder.");
  Ok(())
}
