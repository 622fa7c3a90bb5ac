/// Checks the formatting of a mismatch file to see if it's valid to upload
/// to Mismatch Finder. Note: the upload limit for the import API is 10 MB.
use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use mismatch_util::check::{ensure_valid, MAX_UPLOAD_MB};
use mismatch_util::colors::{RESET, WD_RED};
use mismatch_util::mismatch::MismatchBatch;

#[derive(Parser)]
#[command(about = "Check a mismatch CSV against the Mismatch Finder import schema.")]
struct Args {
  /// Path to the CSV file containing mismatches to import to Mismatch Finder.
  #[arg(short = 'm', long = "mismatch-file")]
  mismatch_file: PathBuf,
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

  if !args.mismatch_file.is_file() {
    bail!("mismatch file not found: {}", args.mismatch_file.display());
  }
  if args.mismatch_file.extension().and_then(|ext| ext.to_str()) != Some("csv") {
    bail!("mismatch file is not a CSV: {}", args.mismatch_file.display());
  }

  let size_mb = fs::metadata(&args.mismatch_file)?.len() >> 20;
  if size_mb >= MAX_UPLOAD_MB {
    eprintln!(
      "\n{}WARNING: The mismatch file is larger than the Mismatch Finder import limit of {} MB. \
       Please break it into smaller CSV files with `split_mismatch_file` before uploading.{}\n",
      WD_RED, MAX_UPLOAD_MB, RESET
    );
  }

  if args.verbose {
    println!(
      "Checking the data within {} to see if it's valid for uploading to Mismatch Finder...",
      args.mismatch_file.display()
    );
  }

  let batch = MismatchBatch::from_csv_path(&args.mismatch_file)
    .with_context(|| format!("could not read {}", args.mismatch_file.display()))?;
  ensure_valid(&batch)?;
  println!("All checks have passed! The data is ready to be uploaded to Mismatch Finder.");
  Ok(())
}
