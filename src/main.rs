use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use fmpair::align::{self, MapOpt, Scoring};
use fmpair::index::{FMIndex, IndexMeta, IndexParams, SaStrategy};
use fmpair::io::fasta;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "fmpair", author, version, about = "Paired-end read mapper over a compressed FM index", arg_required_else_help = true)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build an FM index of the reference (first FASTA record)
    Index {
        /// Reference FASTA file
        reference: PathBuf,
        /// Output prefix; the index is written to <prefix>.fmi
        #[arg(short, long, default_value = "ref")]
        output: String,
        /// Suffix array construction algorithm
        #[arg(long, value_enum, default_value_t = StrategyArg::LinearRecursive)]
        strategy: StrategyArg,
        /// Keep an occurrence checkpoint every N BWT rows
        #[arg(long = "occ-sampling", default_value_t = 32)]
        occ_sampling: usize,
        /// Keep suffix array entries divisible by N
        #[arg(long = "sa-sampling", default_value_t = 32)]
        sa_sampling: usize,
    },
    /// Map paired-end reads (two FASTQ files) and write SAM
    Map {
        /// Path to the index (.fmi)
        #[arg(short = 'i', long = "index")]
        index: PathBuf,
        /// First-mate FASTQ
        reads1: PathBuf,
        /// Second-mate FASTQ
        reads2: PathBuf,
        /// Output SAM path (stdout if omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
        #[arg(long = "kmers-per-read", default_value_t = 5)]
        kmers_per_read: usize,
        #[arg(long = "seed-len", default_value_t = 26)]
        seed_len: usize,
        /// Costs, e.g. "match=1,mismatch=-1,insertion=-2,deletion=-2"
        #[arg(long, default_value = "match=1,mismatch=-1,insertion=-2,deletion=-2")]
        scoring: Scoring,
        #[arg(short = 't', long = "threads", default_value_t = 1)]
        threads: usize,
        #[arg(long = "batch-size", default_value_t = 4096)]
        batch_size: usize,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum StrategyArg {
    Simple,
    PrefixDoubling,
    LinearRecursive,
}

impl From<StrategyArg> for SaStrategy {
    fn from(s: StrategyArg) -> Self {
        match s {
            StrategyArg::Simple => SaStrategy::Simple,
            StrategyArg::PrefixDoubling => SaStrategy::PrefixDoubling,
            StrategyArg::LinearRecursive => SaStrategy::LinearRecursive,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp(None)
        .format_target(false)
        .init();

    match cli.command {
        Commands::Index { reference, output, strategy, occ_sampling, sa_sampling } => {
            let params = IndexParams {
                strategy: strategy.into(),
                compression_occ: occ_sampling,
                compression_sa: sa_sampling,
            };
            run_index(&reference, &output, params)
        }
        Commands::Map {
            index,
            reads1,
            reads2,
            out,
            kmers_per_read,
            seed_len,
            scoring,
            threads,
            batch_size,
        } => {
            let opt = MapOpt { kmers_per_read, seed_kmer_size: seed_len, scoring, threads, batch_size };
            let command_line = std::env::args().collect::<Vec<_>>().join(" ");
            let summary = align::map_paired_fastq(&index, &reads1, &reads2, out.as_deref(), opt, &command_line)?;
            if summary.unmapped > 0 {
                log::info!("{} read pairs could not be mapped", summary.unmapped);
            }
            Ok(())
        }
    }
}

fn run_index(reference: &Path, output: &str, params: IndexParams) -> Result<()> {
    let rec = fasta::read_reference(reference)?;
    log::info!("reference: {} ({} bp)", rec.id, rec.seq.len());

    let mut fm = FMIndex::build(&rec.seq, params)
        .with_context(|| format!("cannot build index for '{}'", reference.display()))?;
    fm.set_meta(IndexMeta {
        reference_name: Some(rec.id),
        reference_file: Some(reference.display().to_string()),
        build_timestamp: Some(chrono::Utc::now().to_rfc3339()),
    });

    let out_path = format!("{}.fmi", output);
    fm.save_to_file(&out_path)
        .with_context(|| format!("cannot write index to '{}'", out_path))?;
    log::info!("FM index saved: {}", out_path);
    Ok(())
}
