//! manager-handler — fans resource notifications out to metric workers.
//!
//! Subscribes to:
//! - the manager SNS topic (Lambda trigger), one resource notification per record
//!
//! Publishes to:
//! - `SNS_WORKER_TOPIC_ARN`, one message per selected metric handler

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use lambda_runtime::{service_fn, LambdaEvent};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use fanout_core::config::{self, Config};
use fanout_core::StaticRegistry;
use fanout_dispatch::{DispatchReport, Dispatcher};
use fanout_queue::{parse_event, DryRunPublisher, SnsEvent, SnsPublisher, TopicPublisher};

// ── CLI ─────────────────────────────────────────────────────────────

/// Metric manager — splits one resource notification into per-handler worker jobs.
#[derive(Parser, Debug)]
#[command(name = "manager-handler", version, about)]
struct Cli {
    /// Handle a single SNS event read from this JSON file and exit,
    /// instead of serving the Lambda runtime.
    #[arg(long, env = "FANOUT_EVENT_FILE")]
    event: Option<PathBuf>,

    /// Log outbound payloads instead of publishing them.
    #[arg(long, env = "FANOUT_DRY_RUN", default_value_t = false)]
    dry_run: bool,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_ansi(false)
        .without_time()
        .init();

    let cli = Cli::parse();

    config::load_dotenv();
    let config = Config::from_env();
    config.log_summary();
    debug!(config = %config.redacted_summary(), "effective configuration");

    let registry = StaticRegistry::new(config.dispatch.handler_slugs()?.iter().cloned())
        .context("invalid METRIC_HANDLERS")?;
    let topic = config.dispatch.worker_topic_arn()?.to_string();

    let publisher: Arc<dyn TopicPublisher> = if cli.dry_run {
        Arc::new(DryRunPublisher)
    } else {
        Arc::new(SnsPublisher::new(&config.aws).await)
    };

    let dispatcher = Arc::new(Dispatcher::new(Arc::new(registry), publisher, topic));

    if let Some(path) = cli.event {
        let body = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read event file {}", path.display()))?;
        let event = parse_event(&body)?;
        let reports = dispatcher.handle_event(&event).await?;
        info!(records = reports.len(), "event handled");
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    info!(topic = dispatcher.topic(), "manager-handler starting Lambda runtime");
    lambda_runtime::run(service_fn(move |event: LambdaEvent<SnsEvent>| {
        let dispatcher = dispatcher.clone();
        async move { invoke(&dispatcher, event).await }
    }))
    .await
    .map_err(|e| anyhow::anyhow!(e))?;

    Ok(())
}

/// One Lambda invocation. Failures are reported here and handed back to the
/// runtime, which decides on redelivery.
async fn invoke(
    dispatcher: &Dispatcher,
    event: LambdaEvent<SnsEvent>,
) -> Result<Vec<DispatchReport>, lambda_runtime::Error> {
    let request_id = event.context.request_id;
    dispatcher.handle_event(&event.payload).await.map_err(|e| {
        error!(
            request_id = %request_id,
            handler = e.handler().unwrap_or("-"),
            error = %e,
            "invocation failed"
        );
        e.into()
    })
}
