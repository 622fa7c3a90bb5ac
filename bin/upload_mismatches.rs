/// Sends mismatch CSVs to the Mismatch Finder import API, either a single
/// file or a directory of split files. Every file is schema-checked before
/// any bytes leave the machine.
use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use jwalk::WalkDir;

use mismatch_util::check::{ensure_valid, MAX_UPLOAD_MB};
use mismatch_util::client::ClientConfig;
use mismatch_util::colors::thank_you_message;
use mismatch_util::mismatch::MismatchBatch;
use mismatch_util::upload::{
  upload_file, ImportMetadata, MAX_DESCRIPTION_CHARS, MAX_EXTERNAL_SOURCE_CHARS,
};

#[derive(Parser)]
#[command(about = "Upload mismatch CSVs to the Mismatch Finder import API.")]
#[command(group(
  clap::ArgGroup::new("target").required(true).args(["mismatch_file", "mismatch_files_dir"])
))]
struct Args {
  /// Your Mismatch Finder API access token.
  #[arg(short = 't', long = "access-token")]
  access_token: String,
  /// Path to a single CSV file containing mismatches to import.
  #[arg(short = 'm', long = "mismatch-file")]
  mismatch_file: Option<PathBuf>,
  /// Path to a directory containing only mismatch CSVs to import.
  #[arg(short = 'd', long = "mismatch-files-dir")]
  mismatch_files_dir: Option<PathBuf>,
  /// The name of the external source the mismatches come from (up to 100 characters).
  #[arg(short = 's', long = "external-source")]
  external_source: String,
  /// A short text describing this import (up to 350 characters).
  #[arg(long)]
  description: Option<String>,
  /// A URL for the external source.
  #[arg(long = "external-source-url")]
  external_source_url: Option<String>,
  /// ISO date after which the imported mismatches are no longer relevant;
  /// the service defaults to six months from the upload.
  #[arg(long)]
  expires: Option<String>,
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
    .init();

  if args.external_source.chars().count() > MAX_EXTERNAL_SOURCE_CHARS {
    bail!("--external-source is limited to {} characters", MAX_EXTERNAL_SOURCE_CHARS);
  }
  if let Some(description) = &args.description {
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
      bail!("--description is limited to {} characters", MAX_DESCRIPTION_CHARS);
    }
  }

  let mismatch_files = collect_mismatch_files(&args)?;
  let metadata = ImportMetadata {
    external_source: args.external_source.clone(),
    description: args.description.clone(),
    external_source_url: args.external_source_url.clone(),
    expires: args.expires.clone(),
  };
  let client = ClientConfig { ca_bundle: args.ca_bundle.clone() }.build()?;

  if args.verbose {
    let listing: Vec<String> =
      mismatch_files.iter().map(|path| path.display().to_string()).collect();
    println!(
      "The following mismatch files will be uploaded to the Wikidata Mismatch Finder:\n\n{}\n",
      listing.join("\n")
    );
  }

  let progress = ProgressBar::new(mismatch_files.len() as u64);
  progress.set_style(
    ProgressStyle::default_bar()
      .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
      .expect("progress bar template is well formed")
      .progress_chars("#>-"),
  );

  let mut rejected = 0usize;
  for mismatch_file in &mismatch_files {
    // validation failures are a hard stop, rejections just skip the file
    let batch = MismatchBatch::from_csv_path(mismatch_file)
      .with_context(|| format!("could not read {}", mismatch_file.display()))?;
    ensure_valid(&batch)
      .with_context(|| format!("{} failed the schema check", mismatch_file.display()))?;

    match upload_file(&client, &args.access_token, mismatch_file, &metadata) {
      Ok(()) => {
        progress.println(format!(
          "Mismatch file {} was successfully uploaded to the Wikidata Mismatch Finder.",
          mismatch_file.display()
        ));
      }
      Err(err) => {
        progress.println(format!(
          "There was an error in trying to upload the mismatch file {}.\n{}",
          mismatch_file.display(),
          err
        ));
        rejected += 1;
      }
    }
    progress.inc(1);
  }
  progress.finish_and_clear();

  if rejected > 0 {
    bail!("{} of {} mismatch files were not accepted", rejected, mismatch_files.len());
  }
  println!("{}", thank_you_message());
  Ok(())
}

fn collect_mismatch_files(args: &Args) -> Result<Vec<PathBuf>> {
  if let Some(mismatch_file) = &args.mismatch_file {
    if !mismatch_file.is_file() {
      bail!("mismatch file not found: {}", mismatch_file.display());
    }
    if mismatch_file.extension().and_then(|ext| ext.to_str()) != Some("csv") {
      bail!("mismatch file is not a CSV: {}", mismatch_file.display());
    }
    ensure_uploadable_size(mismatch_file)?;
    return Ok(vec![mismatch_file.clone()]);
  }

  let dir = args
    .mismatch_files_dir
    .as_ref()
    .expect("clap guarantees one of the two target arguments");
  if !dir.is_dir() {
    bail!("mismatch directory not found: {}", dir.display());
  }

  let mut mismatch_files = Vec::new();
  for entry in WalkDir::new(dir).max_depth(1).sort(true).into_iter().flatten() {
    let path = entry.path();
    if !path.is_file() {
      continue;
    }
    if path.extension().and_then(|ext| ext.to_str()) != Some("csv") {
      bail!(
        "the mismatch directory should contain only CSV files, found {}",
        path.display()
      );
    }
    ensure_uploadable_size(&path)?;
    mismatch_files.push(path);
  }
  if mismatch_files.is_empty() {
    bail!("no CSV files found in {}", dir.display());
  }
  mismatch_files.sort();
  Ok(mismatch_files)
}

fn ensure_uploadable_size(path: &std::path::Path) -> Result<()> {
  let size_mb = fs::metadata(path)?.len() >> 20;
  if size_mb > MAX_UPLOAD_MB {
    bail!(
      "{} is over the Mismatch Finder import limit of {} MB; break it down with \
       `split_mismatch_file` first",
      path.display(),
      MAX_UPLOAD_MB
    );
  }
  Ok(())
}
