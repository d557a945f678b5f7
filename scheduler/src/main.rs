//! Main entry point for the scheduler binary
//!
//! Runs the standard job set until ctrl-c or SIGTERM. `births` runs the
//! registration command as a child process on every fire; `bursts` runs a
//! transaction burst in-process.

use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, ValueEnum};

use orchestrator::{
    services::{FileRunLogSink, JsonDocumentStore, RealTransport},
    BurstOrchestrator, BurstPlan, DispatchEngine, DispatchSettings, SamplePolicy,
};
use scheduler::{
    services::{BurstTask, ScriptTask},
    JobSetSettings, JobTask, Scheduler,
};
use shared::{logging, process_warn, Context, ContextConfig, ProcessId, RuntimeSettings};

#[derive(Debug, Clone, Copy, PartialEq, ValueEnum)]
pub enum JobKind {
    /// Register new customers by running the orchestrator command
    Births,
    /// Transaction bursts over stored customers
    Bursts,
}

#[derive(Debug, Clone, Copy, PartialEq, ValueEnum)]
pub enum BurstKind {
    Randomize,
    Anomaly,
}

/// Recurring synthetic traffic scheduler
#[derive(Parser)]
#[command(name = "scheduler")]
#[command(about = "Runs customer registration or transaction bursts on a schedule")]
pub struct Args {
    /// Which job the schedule drives
    #[arg(long, value_enum)]
    pub job: JobKind,

    /// Business context: retail, qsr or fuel
    #[arg(long)]
    pub context: Context,

    /// Write log files (and run artifacts for in-process bursts)
    #[arg(long)]
    pub enable_logging: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Command run by the births job [default: orchestrator --context <CONTEXT> register --send-txns]
    #[arg(long)]
    pub script: Option<String>,

    /// Burst variant for the bursts job
    #[arg(long, value_enum, default_value = "randomize")]
    pub burst_kind: BurstKind,

    /// Fraction of customers sampled per burst
    #[arg(long)]
    pub sample_fraction: Option<f64>,

    /// Transactions per customer for anomaly bursts
    #[arg(long, default_value_t = 10)]
    pub burst_amount: u32,
}

impl Args {
    fn script_line(&self) -> String {
        self.script
            .clone()
            .unwrap_or_else(|| format!("orchestrator --context {} register --send-txns", self.context))
    }

    fn burst_plan(&self) -> BurstPlan {
        let plan = match self.burst_kind {
            BurstKind::Randomize => BurstPlan::randomize(),
            BurstKind::Anomaly => BurstPlan::anomaly(self.burst_amount),
        };
        let plan = match self.sample_fraction {
            Some(fraction) => plan.with_policy(SamplePolicy::Fraction(fraction)),
            None => plan,
        };
        plan.with_persist_log(self.enable_logging)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let process_id = ProcessId::Scheduler;

    let runtime = RuntimeSettings::from_env().context("reading runtime settings")?;
    let log_dir = args.enable_logging.then_some(runtime.log_dir.as_path());
    logging::init_tracing(&process_id, Some(&args.log_level), log_dir)?;

    let task: Arc<dyn JobTask> = match args.job {
        JobKind::Births => {
            let line = args.script_line();
            let script = ScriptTask::from_command_line(&line).context("--script must not be empty")?;
            Arc::new(script)
        }
        JobKind::Bursts => {
            let plan = args.burst_plan();
            plan.validate()?;

            let config = ContextConfig::from_env(args.context)
                .with_context(|| format!("loading {} configuration", args.context))?;
            let burst_id = ProcessId::Orchestrator(args.context);
            let store = JsonDocumentStore::open(&config.store, burst_id.clone()).await?;
            let transport = RealTransport::new(runtime.request_timeout)?;
            let engine = DispatchEngine::new(transport, DispatchSettings::from(&runtime), burst_id);
            let run_log = FileRunLogSink::new(runtime.log_dir.clone());
            let orchestrator = Arc::new(BurstOrchestrator::new(&config, store, engine, run_log));
            Arc::new(BurstTask::new(orchestrator, plan))
        }
    };

    let mut scheduler = Scheduler::with_system_clock();
    let jobs = JobSetSettings::default().build(chrono::Utc::now(), task)?;
    scheduler.add_jobs(jobs)?;

    // Set up graceful shutdown
    let shutdown_sender = scheduler.get_shutdown_sender();
    let signal_process = process_id.clone();
    tokio::spawn(async move {
        let reason = wait_for_signal(&signal_process).await;
        logging::log_shutdown(&signal_process, reason);
        let _ = shutdown_sender.send(()).await;
    });

    scheduler.run().await?;

    let records = scheduler.ledger().records().await;
    let failed = records.iter().filter(|record| !record.outcome.is_success()).count();
    logging::log_success(&process_id, &format!("Scheduler stopped after {} runs ({} failed)", records.len(), failed));
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal(process_id: &ProcessId) -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => tokio::select! {
            _ = tokio::signal::ctrl_c() => "Received Ctrl+C signal",
            _ = terminate.recv() => "Received SIGTERM",
        },
        Err(e) => {
            process_warn!(process_id, "SIGTERM handler unavailable: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            "Received Ctrl+C signal"
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal(_process_id: &ProcessId) -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "Received Ctrl+C signal"
}
