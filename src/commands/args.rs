//! Command-line argument definitions for the mrepack CLI.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use mrepack::RunSettings;

#[derive(Parser)]
#[command(name = "mrepack")]
#[command(about = "Redistribute reads across multi-read container files")]
#[command(
    long_about = "mrepack: repackage reads held in multi-read container files.

MODES:
  Batch (default):  pack reads into {base}_{n}.{ext} files of a fixed size
  Binning (-b):     route each read to {label}/{basename} using a
                    read_id<TAB>label table; unlisted reads are dropped

Reads already present in a destination are left untouched, so a run can be
repeated safely into the same output directory."
)]
#[command(after_help = "EXAMPLES:
  # Repack a directory into files of 4000 reads
  mrepack repack -i reads/ -s batched/

  # One unbounded output file, searching subdirectories
  mrepack repack -i reads/ -s single/ -n 0 --recursive

  # Split by barcode on 8 threads
  mrepack repack -i reads/ -s demux/ -b barcodes.tsv -t 8

  # List the reads of a container
  mrepack inspect batched/batch_0.fast5 --groups")]
pub struct Cli {
    /// Enable verbose progress output with timestamps
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Hide the progress bar
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Repackage reads by fixed-size batching or label binning
    Repack(RepackArgs),

    /// List the reads held in a container
    Inspect(InspectArgs),
}

#[derive(Args, Debug, Default)]
pub struct RepackArgs {
    /// Input container file or directory
    #[arg(short, long = "input_path", alias = "input")]
    pub input: Option<PathBuf>,

    /// Output directory
    #[arg(short, long = "save_path", alias = "output")]
    pub save_path: Option<PathBuf>,

    /// Tab-separated read_id<TAB>label file; enables binning mode
    #[arg(short, long = "binning_file", alias = "binning_csv_file")]
    pub binning_file: Option<PathBuf>,

    /// Base name of batch outputs [default: batch]
    #[arg(short, long = "filename_base")]
    pub filename_base: Option<String>,

    /// Reads per batch output; 0 or negative for a single output [default: 4000]
    #[arg(short = 'n', long = "batch_size", allow_hyphen_values = true)]
    pub batch_size: Option<i64>,

    /// Search the input directory recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Worker threads [default: 1]
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Container file extension to look for [default: fast5]
    #[arg(long)]
    pub extension: Option<String>,

    /// TOML run file with a [run] table; flags override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl RepackArgs {
    /// Flag values as a settings layer.
    pub fn settings(&self) -> RunSettings {
        RunSettings {
            input: self.input.clone(),
            save_path: self.save_path.clone(),
            binning_file: self.binning_file.clone(),
            filename_base: self.filename_base.clone(),
            batch_size: self.batch_size,
            recursive: self.recursive.then_some(true),
            threads: self.threads,
            extension: self.extension.clone(),
        }
    }
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Container file to list
    pub container: PathBuf,

    /// Also list group names and sizes
    #[arg(short, long)]
    pub groups: bool,
}
