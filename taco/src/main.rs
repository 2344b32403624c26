//! `taco` command-line entry point.

mod cli;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use taco::artifacts::ArtifactStore;
use taco::backend::ProcessBackend;
use taco::events::LoggingEventSink;
use taco::input::discover;
use taco::ledger::Ledger;
use taco::pipeline::{PipelineRunner, StageRegistry};
use taco::settings::PipelineSettings;
use taco::utils::git_revision;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = cli::Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.default_log_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = PipelineSettings::load(&args.settings)
        .with_context(|| format!("loading settings from {}", args.settings.display()))?;
    if args.verbose >= 2 {
        let dump = serde_json::to_string_pretty(&settings).context("rendering settings")?;
        info!(path = %args.settings.display(), "Loaded settings:\n{dump}");
    }

    let registry = StageRegistry::reference()
        .context("building stage registry")?
        .bind(&settings)
        .context("binding settings to stages")?;

    let backend_config = settings.backend().ok_or_else(|| {
        anyhow!("settings file {} has no \"backend\" section", args.settings.display())
    })?;
    let backend = Arc::new(ProcessBackend::from_config(backend_config));

    let items = discover(&args.input, &args.suffix)
        .with_context(|| format!("discovering input in {}", args.input.display()))?;

    if !args.quiet {
        println!("TACO batch runner v{}", env!("CARGO_PKG_VERSION"));
        println!("Found {} item(s) in {}", items.len(), args.input.display());
    }

    let ledger = Ledger::open(&args.ledger)
        .with_context(|| format!("opening ledger {}", args.ledger.display()))?;
    let revision = git_revision(Path::new("."));

    let store = ArtifactStore::new(&args.output);
    let mut runner = PipelineRunner::new(registry, ledger, store, backend)
        .with_event_sink(Arc::new(LoggingEventSink::debug()))
        .with_revision(revision)
        .with_fail_fast(args.fail_fast);

    let report = runner.run(&items).await.context("pipeline run aborted")?;

    if !report.is_clean() {
        for failed in &report.failed {
            warn!(item = %failed.id, error = %failed.error, "Item not recorded");
        }
    }
    if !args.quiet {
        println!(
            "Processed {}, skipped {}, failed {}",
            report.processed(),
            report.skipped.len(),
            report.failed.len()
        );
    }

    Ok(())
}
