use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use ideology_ledger::orchestrator::{find_all_spec_hashes, run_all_combinations, run_profiles, run_stakeholders, run_stats};
use ideology_ledger::{Config, Filters, JsonDirStore, Partition, RunOutcome};

/// Ideology ledger - legislator profiles, rankings and chart stats
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Record store directory (one sub-directory per collection)
    #[arg(short, long, default_value = "store", global = true)]
    store_dir: PathBuf,

    /// Path to config file (overrides IDEOLOGY_CONFIG environment variable)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Minimum bills behind a category score for ranking and charts
    #[arg(long, global = true)]
    min_bills: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score, rank and store legislator profiles for one partition
    Profiles(PartitionArgs),
    /// Build histogram and scatter stats from stored profiles
    Stats {
        /// Only this spec hash (defaults to every spec hash on record)
        #[arg(long)]
        spec_hash: Option<String>,
    },
    /// Count stakeholder groups per legislator for one partition
    Stakeholders(PartitionArgs),
    /// Every model/schema/chamber combination, then stats
    Sweep,
}

#[derive(ClapArgs, Debug)]
struct PartitionArgs {
    /// Classification model (e.g. gemini-2.5-flash-lite)
    #[arg(long)]
    model: String,

    /// Classification schema version (defaults to latest)
    #[arg(long)]
    schema: Option<u32>,

    /// Restrict to one congress
    #[arg(long)]
    congress: Option<u32>,

    /// Restrict to one chamber (house, senate)
    #[arg(long)]
    chamber: Option<String>,

    /// Restrict to bill type(s) (hr, hjres, s, sjres)
    #[arg(long = "bill-type", num_args = 1..)]
    bill_types: Vec<String>,
}

impl PartitionArgs {
    fn partition(&self) -> Result<Partition> {
        let filters = Filters::parse(self.congress, self.chamber.as_deref(), self.bill_types.as_slice())?;
        Ok(Partition::new(&self.model, self.schema, filters)?)
    }
}

/// A validated command, ready to run.
enum Job {
    Profiles(Partition),
    Stakeholders(Partition),
    Stats(Option<String>),
    Sweep,
}

fn report(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Completed(s) => info!(
            "Run finished - spec_hash={}, bills={}, legislators={}, written={}",
            s.spec_hash, s.bills, s.legislators, s.written
        ),
        RunOutcome::NoClassifications { spec_hash } => {
            warn!("No bill classifications matched, nothing written - spec_hash={}", spec_hash)
        }
    }
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(true)
        .init();

    let args = Args::parse();
    info!("Starting ideology - store_dir={}", args.store_dir.display());

    // Filters are validated before the store is touched
    let job = match args.command {
        Command::Profiles(p) => Job::Profiles(p.partition()?),
        Command::Stakeholders(p) => Job::Stakeholders(p.partition()?),
        Command::Stats { spec_hash } => Job::Stats(spec_hash),
        Command::Sweep => Job::Sweep,
    };

    let config = Config::load(args.config.as_deref(), &args.store_dir)
        .context("loading configuration")?
        .with_min_bills(args.min_bills);
    debug!("Effective config - {}", config.display_summary());

    let store = JsonDirStore::open(&args.store_dir)
        .with_context(|| format!("opening record store at {}", args.store_dir.display()))?;

    match job {
        Job::Profiles(partition) => report(&run_profiles(&store, &partition, &config)?),
        Job::Stakeholders(partition) => report(&run_stakeholders(&store, &partition)?),
        Job::Stats(spec_hash) => {
            let written = run_stats(&store, spec_hash.as_deref(), &config)?;
            info!("Stats finished - documents={}", written);
        }
        Job::Sweep => {
            let outcomes = run_all_combinations(&store, &config)?;
            outcomes.iter().for_each(report);

            let hashes = find_all_spec_hashes(&store)?;
            debug!("Stats for spec hashes: {}", hashes.join(", "));
            let written = run_stats(&store, None, &config)?;
            info!("Sweep finished - partitions={}, stats_documents={}", outcomes.len(), written);
        }
    }

    Ok(())
}
