//! Subcommand implementations.

use anyhow::{Context, Result, bail};
use clap::Args;
use courier_core::Courier;
use courier_core::classify::{ClassifiedError, ResourceKind, friendly_classified};
use courier_core::domain::{OperationId, QueueSnapshot, RequestTarget};
use courier_core::queue::{ProcessReport, SkipReason};

#[derive(Debug, Args)]
pub struct EnqueueArgs {
    /// Absolute URL, or a path relative to `transport.base_url`.
    pub url: String,

    #[arg(long, short = 'X', default_value = "POST")]
    pub method: String,

    /// JSON request body.
    #[arg(long, short = 'd')]
    pub body: Option<String>,

    /// Extra header as `Name: value` (repeatable).
    #[arg(long = "header", short = 'H', value_name = "NAME: VALUE")]
    pub headers: Vec<String>,

    /// Label shown in status output.
    #[arg(long)]
    pub description: Option<String>,

    /// Retry budget (default: `queue.default_max_retries`).
    #[arg(long, value_name = "N")]
    pub max_retries: Option<u32>,

    /// Resource kind used to word not-found failures (e.g. `lesson`).
    #[arg(long)]
    pub resource: Option<ResourceKind>,

    /// Deliver right away instead of waiting for `process`.
    #[arg(long)]
    pub now: bool,
}

impl EnqueueArgs {
    pub fn target(&self) -> Result<RequestTarget> {
        let mut target = RequestTarget::new(&self.method, &self.url);
        for header in &self.headers {
            let Some((name, value)) = header.split_once(':') else {
                bail!("header must look like `Name: value`, got {header:?}");
            };
            target = target.with_header(name.trim(), value.trim());
        }
        if let Some(body) = &self.body {
            let json = serde_json::from_str(body).context("--body is not valid JSON")?;
            target = target.with_json(json);
        }
        Ok(target)
    }

    fn description(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| format!("{} {}", self.method.to_uppercase(), self.url))
    }
}

pub async fn run_enqueue(courier: &Courier, args: EnqueueArgs) -> Result<()> {
    let target = args.target()?;
    let id = courier
        .manager
        .enqueue(target, args.description(), args.max_retries)
        .await?;
    println!("{id}");

    if args.now {
        let report = courier.manager.process_queue().await?;
        print_report(&report);
        let snapshot = courier.manager.snapshot().await;
        if let Some(failed) = snapshot.failed.iter().find(|f| f.operation.id == id) {
            let friendly = friendly_classified(&ClassifiedError::from_failed(failed), args.resource);
            println!("{}: {} {}", friendly.title, friendly.message, friendly.action);
        }
    }
    Ok(())
}

pub async fn run_process(courier: &Courier) -> Result<()> {
    let report = courier.manager.process_queue().await?;
    print_report(&report);
    Ok(())
}

pub async fn run_status(courier: &Courier, json: bool) -> Result<()> {
    let snapshot = courier.manager.snapshot().await;
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }
    print_status(&snapshot);
    Ok(())
}

pub async fn run_retry(courier: &Courier, id: &str) -> Result<()> {
    let id: OperationId = id
        .parse()
        .with_context(|| format!("invalid operation id {id:?}"))?;
    let report = courier.manager.retry_failed(id).await?;
    print_report(&report);
    Ok(())
}

pub async fn run_clear_failed(courier: &Courier) -> Result<()> {
    let failed = courier.manager.counts().await.failed;
    courier.manager.clear_failed().await?;
    println!("cleared {failed} failed operation(s)");
    Ok(())
}

pub async fn run_watch(courier: &Courier, process: bool) -> Result<()> {
    let mut subscription = courier.manager.subscribe().await;
    if process && !courier.trigger().request() {
        bail!("connectivity bridge is not running");
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            snapshot = subscription.recv() => {
                let Some(snapshot) = snapshot else { break };
                let counts = snapshot.counts();
                println!(
                    "pending={} processing={} failed={}",
                    counts.pending, counts.processing, counts.failed
                );
            }
        }
    }
    subscription.unsubscribe();
    Ok(())
}

fn print_report(report: &ProcessReport) {
    match report {
        ProcessReport::Skipped(SkipReason::Offline) => println!("offline: nothing dispatched"),
        ProcessReport::Skipped(SkipReason::AlreadyRunning) => {
            println!("another processing run is active")
        }
        ProcessReport::Completed(summary) => println!(
            "delivered={} requeued={} failed={}",
            summary.succeeded, summary.requeued, summary.failed
        ),
    }
}

fn print_status(snapshot: &QueueSnapshot) {
    let counts = snapshot.counts();
    println!(
        "pending={} processing={} failed={}",
        counts.pending, counts.processing, counts.failed
    );

    for op in &snapshot.pending {
        println!(
            "  {}  {} {}  {}  (retries {}/{})",
            op.id,
            op.target.method(),
            op.target.url,
            op.description,
            op.retry_count,
            op.max_retries
        );
    }

    if !snapshot.failed.is_empty() {
        println!("failed:");
    }
    for failed in &snapshot.failed {
        let friendly = friendly_classified(&ClassifiedError::from_failed(failed), None);
        println!("  {}  {}", failed.operation.id, failed.operation.description);
        println!("    {}: {}", friendly.title, friendly.message);
        println!("    {}", friendly.action);
    }
}
