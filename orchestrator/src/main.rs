//! Main entry point for the orchestrator binary
//!
//! Each subcommand runs once against one context and exits: a randomized
//! transaction burst, an anomaly burst, or a customer registration run.

use std::str::FromStr;

use anyhow::Context as _;
use clap::{Args as ClapArgs, Parser, Subcommand};

use orchestrator::{
    services::{FileRunLogSink, JsonDocumentStore, RealTransport},
    BurstOrchestrator, BurstPlan, DispatchEngine, DispatchSettings, RegistrationPlan, SamplePolicy,
};
use shared::{logging, process_debug, Context, ContextConfig, ProcessId, RuntimeSettings};

/// Synthetic traffic generator for the loyalty platform
#[derive(Parser)]
#[command(name = "orchestrator")]
#[command(about = "Sends synthetic customer and transaction traffic for one context")]
pub struct Args {
    /// Business context: retail, qsr or fuel
    #[arg(long)]
    pub context: Context,

    /// Write a log file and a per-run request/response artifact
    #[arg(long)]
    pub enable_logging: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// One transaction for a sample of the stored customers
    Randomize(SampleArgs),

    /// A rapid series of transactions for a few customers, who are flagged as anomalous
    Anomaly {
        #[command(flatten)]
        sample: SampleArgs,

        /// Transactions sent per sampled customer
        #[arg(long, default_value_t = 10)]
        burst_amount: u32,
    },

    /// Create new customers and store the ones that were accepted
    Register {
        /// Send a first transaction for a share of the new customers
        #[arg(long)]
        send_txns: bool,

        /// Fewest customers to create
        #[arg(long, default_value_t = 10)]
        min_customers: u32,

        /// Most customers to create
        #[arg(long, default_value_t = 100)]
        max_customers: u32,
    },
}

/// Sample size selection; at most one may be given
#[derive(ClapArgs)]
pub struct SampleArgs {
    /// Fraction of customers to sample, in (0, 1]
    #[arg(long, conflicts_with_all = ["count", "random_fraction"])]
    pub sample_fraction: Option<f64>,

    /// Exact number of customers to sample
    #[arg(long, conflicts_with = "random_fraction")]
    pub count: Option<usize>,

    /// Draw the fraction uniformly from MIN:MAX on every run
    #[arg(long)]
    pub random_fraction: Option<FractionRange>,
}

impl SampleArgs {
    fn apply(&self, plan: BurstPlan) -> BurstPlan {
        if let Some(fraction) = self.sample_fraction {
            plan.with_policy(SamplePolicy::Fraction(fraction))
        } else if let Some(count) = self.count {
            plan.with_policy(SamplePolicy::FixedCount(count))
        } else if let Some(range) = &self.random_fraction {
            plan.with_policy(SamplePolicy::RandomFraction { min: range.min, max: range.max })
        } else {
            plan
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FractionRange {
    pub min: f64,
    pub max: f64,
}

impl FromStr for FractionRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (min, max) = s.split_once(':').ok_or_else(|| format!("expected MIN:MAX, got '{s}'"))?;
        let parse = |v: &str| v.trim().parse::<f64>().map_err(|e| format!("invalid fraction '{v}': {e}"));
        Ok(Self { min: parse(min)?, max: parse(max)? })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let process_id = ProcessId::Orchestrator(args.context);

    let runtime = RuntimeSettings::from_env().context("reading runtime settings")?;
    let log_dir = args.enable_logging.then_some(runtime.log_dir.as_path());
    logging::init_tracing(&process_id, Some(&args.log_level), log_dir)?;

    let config = ContextConfig::from_env(args.context)
        .with_context(|| format!("loading {} configuration", args.context))?;
    process_debug!(process_id, "Configuration: {:?}", config);
    logging::log_startup(&process_id, &format!("{} run against {}", args.context, config.store.collection));

    // Initialize services
    let store = JsonDocumentStore::open(&config.store, process_id.clone()).await?;
    let transport = RealTransport::new(runtime.request_timeout)?;
    let engine = DispatchEngine::new(transport, DispatchSettings::from(&runtime), process_id.clone());
    let run_log = FileRunLogSink::new(runtime.log_dir.clone());

    let orchestrator = BurstOrchestrator::new(&config, store, engine, run_log);

    match args.command {
        Command::Randomize(sample) => {
            let plan = sample.apply(BurstPlan::randomize()).with_persist_log(args.enable_logging);
            let summary = orchestrator.run_burst(&plan).await?;
            println!("{summary}");
            if let Some(path) = &summary.artifact {
                println!("Run log: {}", path.display());
            }
        }
        Command::Anomaly { sample, burst_amount } => {
            let plan = sample.apply(BurstPlan::anomaly(burst_amount)).with_persist_log(args.enable_logging);
            let summary = orchestrator.run_burst(&plan).await?;
            println!("{summary}");
            if let Some(path) = &summary.artifact {
                println!("Run log: {}", path.display());
            }
        }
        Command::Register { send_txns, min_customers, max_customers } => {
            let plan = RegistrationPlan {
                min_customers,
                max_customers,
                send_first_transactions: send_txns,
                persist_log: args.enable_logging,
            };
            let summary = orchestrator.register_customers(&plan).await?;
            println!("{summary}");
            if let Some(burst) = &summary.first_transactions {
                println!("First transactions: {burst}");
            }
        }
    }

    logging::log_success(&process_id, "Run complete");
    Ok(())
}
