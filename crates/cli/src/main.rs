//! Batchline CLI
//!
//! Runs a file of jobs through the task queue against a backend API.

mod job_file;
mod logging;
mod report;

use anyhow::{bail, Context, Result};
use batchline_core::application::constants::HEALTH_ENDPOINT;
use batchline_core::application::{
    ExecutionContext, JobDescriptor, RequestExecutor, TaskQueue,
};
use batchline_core::domain::queue::{
    DEFAULT_WORKER_COUNT, ENV_API_KEY, ENV_BACKEND_URL, ENV_WORKERS,
};
use batchline_core::domain::{QueueConfig, RequestLog};
use batchline_core::port::ApiRequest;
use batchline_infra_http::{ReqwestTransport, DEFAULT_REQUEST_TIMEOUT};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use report::RunSummary;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "batchline")]
#[command(about = "Batchline - batch API task runner", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    backend: BackendArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct BackendArgs {
    /// API key sent verbatim in the Authorization header
    #[arg(long, env = ENV_API_KEY, hide_env_values = true, global = true, default_value = "")]
    api_key: String,

    /// Base URL every endpoint is appended to
    #[arg(long, env = ENV_BACKEND_URL, global = true, default_value = "")]
    backend_url: String,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs(), global = true)]
    timeout_secs: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a JSON-lines file of jobs as one batch
    Run {
        /// Job file, one JSON job per line
        #[arg(long)]
        jobs: PathBuf,

        /// Batch tag for every submitted job
        #[arg(long, default_value = "default")]
        batch: String,

        /// Worker count
        #[arg(long, env = ENV_WORKERS, default_value_t = DEFAULT_WORKER_COUNT)]
        workers: usize,

        /// Seconds a worker pauses after each job
        #[arg(long)]
        throttle: Option<f64>,

        /// Progress poll interval in milliseconds
        #[arg(long, default_value_t = 500)]
        poll_ms: u64,

        /// Print a task table instead of the JSON summary
        #[arg(long)]
        table: bool,

        /// Exit non-zero when any task failed
        #[arg(long)]
        strict: bool,

        /// Write the request history as JSON lines
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Call the health endpoint once
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init()?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            jobs,
            batch,
            workers,
            throttle,
            poll_ms,
            table,
            strict,
            history,
        } => {
            let options = RunOptions {
                jobs,
                batch,
                workers,
                throttle,
                poll: Duration::from_millis(poll_ms.max(1)),
                table,
                strict,
                history,
            };
            run_batch(&cli.backend, options).await
        }
        Commands::Health => health(&cli.backend).await,
    }
}

struct RunOptions {
    jobs: PathBuf,
    batch: String,
    workers: usize,
    throttle: Option<f64>,
    poll: Duration,
    table: bool,
    strict: bool,
    history: Option<PathBuf>,
}

fn build_executor(backend: &BackendArgs) -> Result<Arc<RequestExecutor>> {
    let transport = ReqwestTransport::new(Duration::from_secs(backend.timeout_secs))
        .context("Failed to build HTTP client")?;
    Ok(Arc::new(RequestExecutor::new(Arc::new(transport))))
}

async fn run_batch(backend: &BackendArgs, options: RunOptions) -> Result<()> {
    let jobs = job_file::load(&options.jobs)?;
    if jobs.is_empty() {
        bail!("No jobs in {}", options.jobs.display());
    }

    let config = QueueConfig::new(&backend.api_key, &backend.backend_url, options.workers);
    let queue = TaskQueue::new(config, build_executor(backend)?)?;

    for line in jobs {
        let mut descriptor = JobDescriptor::new(line.kind, options.batch.as_str());
        if let Some(seconds) = line.throttle_seconds.or(options.throttle) {
            descriptor = descriptor.with_throttle_secs(seconds)?;
        }
        queue.submit(descriptor)?;
    }

    queue.start()?;
    info!(batch = %options.batch, workers = options.workers, "Batch started");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ticker = tokio::time::interval(options.poll);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut ctrl_c => {
                warn!("Interrupted, stopping workers");
                break;
            }
        }

        let stats = queue.stats();
        info!(
            done = stats.counts.settled(),
            total = stats.counts.total,
            running = stats.counts.running,
            failed = stats.counts.failed,
            queue_depth = stats.queue_depth,
            "Progress {:.0}%",
            queue.progress() * 100.0
        );
        if queue.is_done() {
            break;
        }
    }
    queue.stop().await;

    let history = RequestLog::new();
    let added = queue.sync_request_history(&history);
    if let Some(path) = &options.history {
        write_history(path, &history)?;
        info!(records = added, path = %path.display(), "Request history written");
    }

    let summary = RunSummary {
        batch: options.batch.clone(),
        stats: queue.stats(),
        batch_stats: queue.batch_stats(&options.batch),
        results: queue.batch_results(&options.batch),
        history_records: history.len(),
    };

    if options.table {
        report::print_human(&summary, &queue.batch_tasks(&options.batch));
    } else {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    if options.strict && summary.batch_stats.failed > 0 {
        bail!("{} task(s) failed", summary.batch_stats.failed);
    }
    Ok(())
}

async fn health(backend: &BackendArgs) -> Result<()> {
    let config = QueueConfig::new(&backend.api_key, &backend.backend_url, 1);
    config.validate()?;

    let executor = build_executor(backend)?;
    let history = RequestLog::new();
    let ctx = ExecutionContext::session(config.credentials, history.clone());
    let response = executor.execute(&ctx, &ApiRequest::get(HEALTH_ENDPOINT)).await?;

    if response.is_success() {
        println!("{}", format!("✓ Backend healthy ({})", response.status).green().bold());
    } else {
        println!("{}", format!("✗ Backend returned {}", response.status).red().bold());
    }
    for record in history.records() {
        println!("  {} {} -> {}", record.method, record.target_url, record.response.status);
    }

    if !response.is_success() {
        bail!("Health check failed with status {}", response.status);
    }
    Ok(())
}

fn write_history(path: &Path, history: &RequestLog) -> Result<()> {
    let mut out = String::new();
    for record in history.records() {
        out.push_str(&serde_json::to_string(&record)?);
        out.push('\n');
    }
    std::fs::write(path, out)
        .with_context(|| format!("Failed to write request history to {}", path.display()))
}
