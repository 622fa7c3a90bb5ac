/// Splits a large mismatch file into separate files that each fit under
/// the 10 MB Mismatch Finder upload limit.
use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use mismatch_util::check::MAX_UPLOAD_MB;
use mismatch_util::split::{planned_part_count, split_csv_into};

#[derive(Parser)]
#[command(about = "Split an oversized mismatch CSV into uploadable parts.")]
struct Args {
  /// Path to the CSV file containing mismatches that should be split into smaller files.
  #[arg(short = 'm', long = "mismatch-file")]
  mismatch_file: PathBuf,
  /// Directory for the split files; made if missing, must be empty otherwise.
  /// Defaults to a new directory named after the mismatch file.
  #[arg(short = 'd', long = "mismatch-files-dir")]
  mismatch_files_dir: Option<PathBuf>,
  /// Delete the original mismatch file after splitting.
  #[arg(long = "delete-mismatch-file")]
  delete_mismatch_file: bool,
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

  let file_bytes = fs::metadata(&args.mismatch_file)?.len();
  if file_bytes >> 20 <= MAX_UPLOAD_MB {
    bail!(
      "{} is already at most {} MB. You do not need to split it and are ready to upload \
       the CSV to Mismatch Finder via `upload_mismatches`.",
      args.mismatch_file.display(),
      MAX_UPLOAD_MB
    );
  }

  let out_dir = match &args.mismatch_files_dir {
    Some(dir) => {
      if dir.is_dir() {
        if fs::read_dir(dir)?.next().is_some() {
          bail!(
            "the output directory {} is not empty; it should be, so that directory based \
             uploads will not send stray files",
            dir.display()
          );
        }
        if args.verbose {
          println!("The output directory exists and is empty. Splitting and saving mismatches.");
        }
      } else {
        if args.verbose {
          println!("The output directory does not exist and will be created.");
        }
        fs::create_dir_all(dir)?;
      }
      dir.clone()
    }
    None => {
      let derived = args.mismatch_file.with_extension("");
      if derived.exists() {
        bail!(
          "no output directory was provided and {} already exists; please pass a directory \
           via --mismatch-files-dir",
          derived.display()
        );
      }
      if args.verbose {
        println!("No output directory has been provided. Creating one based on the mismatch file name.");
      }
      fs::create_dir_all(&derived)?;
      derived
    }
  };

  let parts = planned_part_count(file_bytes);
  if args.verbose {
    let both_or_all = if parts == 2 { "both" } else { "all" };
    println!(
      "The mismatch file will be split into {} files that will {} be {} MB or less.",
      parts, both_or_all, MAX_UPLOAD_MB
    );
  }

  let produced = split_csv_into(&args.mismatch_file, &out_dir, parts)
    .with_context(|| format!("could not split {}", args.mismatch_file.display()))?;

  let produced_names: Vec<String> = produced
    .iter()
    .filter_map(|path| path.file_name().and_then(|name| name.to_str()))
    .map(str::to_string)
    .collect();
  println!(
    "The following mismatch files were created in the {} directory:\n\n{}",
    out_dir.display(),
    produced_names.join("\n")
  );
  println!(
    "\nYou're now ready to upload your mismatch files to Mismatch Finder via the upload API! \
     Please use `upload_mismatches` or see the user guide at \
     https://github.com/wmde/wikidata-mismatch-finder/blob/development/docs/UserGuide.md."
  );

  if args.delete_mismatch_file {
    fs::remove_file(&args.mismatch_file)?;
    if args.verbose {
      println!("Deleted the original mismatch file {}.", args.mismatch_file.display());
    }
  }
  Ok(())
}
