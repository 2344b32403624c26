//! The batch runner: one item at a time, one stage at a time.

use super::registry::BoundRegistry;
use super::report::{FailedItem, ItemReport, RunReport};
use crate::artifacts::ArtifactStore;
use crate::backend::NumericBackend;
use crate::context::{ItemState, StageContext};
use crate::core::{ItemOutcome, PipelineEvent};
use crate::errors::TacoError;
use crate::events::{EventSink, NoOpEventSink};
use crate::input::{read_raw, WorkItem};
use crate::ledger::{Ledger, LedgerRow};
use crate::utils::{generate_run_id, UNKNOWN_REVISION};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Drives discovered items through the bound stage sequence.
///
/// Items already in the ledger are skipped. Every other item runs from its
/// raw series until a gate stops it or the last stage completes, and is then
/// recorded with exactly one ledger row.
#[derive(Debug)]
pub struct PipelineRunner {
    registry: BoundRegistry,
    ledger: Ledger,
    store: ArtifactStore,
    backend: Arc<dyn NumericBackend>,
    sink: Arc<dyn EventSink>,
    revision: String,
    fail_fast: bool,
}

impl PipelineRunner {
    /// Creates a runner.
    #[must_use]
    pub fn new(
        registry: BoundRegistry,
        ledger: Ledger,
        store: ArtifactStore,
        backend: Arc<dyn NumericBackend>,
    ) -> Self {
        Self {
            registry,
            ledger,
            store,
            backend,
            sink: Arc::new(NoOpEventSink),
            revision: UNKNOWN_REVISION.to_string(),
            fail_fast: false,
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Sets the code revision recorded in every item's attributes.
    ///
    /// The binary passes the git revision of the working directory the
    /// batch is launched in.
    #[must_use]
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = revision.into();
        self
    }

    /// Aborts the run on the first item error instead of continuing.
    #[must_use]
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Returns the ledger.
    #[must_use]
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Returns the artifact store.
    #[must_use]
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Processes `items` in order.
    ///
    /// # Errors
    ///
    /// Returns an error if a run-fatal error occurs (ledger or artifact I/O),
    /// or on the first item error when fail-fast is set. Rows appended before
    /// the error stay in the ledger.
    pub async fn run(&mut self, items: &[WorkItem]) -> Result<RunReport, TacoError> {
        let run_id = generate_run_id();
        let mut report = RunReport::new(run_id);

        info!(run_id = %run_id, items = items.len(), "Starting run");
        self.emit(run_id, PipelineEvent::run_started(items.len()));

        for item in items {
            if self.ledger.is_done(&item.id) {
                debug!(run_id = %run_id, item = %item.id, "Already recorded, skipping");
                self.emit(run_id, PipelineEvent::item_skipped(&item.id));
                report.skipped.push(item.id.clone());
                continue;
            }

            info!(run_id = %run_id, item = %item.id, "Processing item");
            self.emit(run_id, PipelineEvent::item_started(&item.id));

            match self.process_item(run_id, item).await {
                Ok(item_report) => report.items.push(item_report),
                Err(err) => {
                    let chain = error_chain(&err);
                    error!(run_id = %run_id, item = %item.id, error = %chain, "Item failed");
                    self.emit(run_id, PipelineEvent::item_failed(&item.id, &chain));
                    if err.is_fatal() || self.fail_fast {
                        return Err(err);
                    }
                    report.failed.push(FailedItem {
                        id: item.id.clone(),
                        error: chain,
                    });
                }
            }
        }

        info!(
            run_id = %run_id,
            processed = report.processed(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Run completed"
        );
        let completed = PipelineEvent::run_completed(
            report.processed(),
            report.skipped.len(),
            report.failed.len(),
        );
        self.emit(run_id, completed);

        Ok(report)
    }

    async fn process_item(
        &mut self,
        run_id: Uuid,
        item: &WorkItem,
    ) -> Result<ItemReport, TacoError> {
        self.store.ensure_item_directory(&item.id)?;
        let raw = read_raw(&item.raw_path)?;
        let mut state = ItemState::from_raw(item, raw, &self.revision);

        let mut executed = Vec::new();
        let mut outcome = ItemOutcome::Completed;

        for (position, bound) in self.registry.stages().iter().enumerate() {
            let spec = &bound.spec;
            let stage = spec.id();

            if let Some(missing) = spec.inputs.iter().find(|name| !state.has_table(**name)) {
                return Err(TacoError::stage(stage.name(), format!("missing input '{missing}'")));
            }

            debug!(item = %item.id, stage = %stage, position, "Running stage");
            self.emit(run_id, PipelineEvent::stage_started(&item.id, position, stage));
            let start = Instant::now();

            let output = {
                let mut ctx = StageContext::new(
                    stage,
                    &mut state,
                    &bound.options,
                    self.backend.as_ref(),
                    &spec.inputs,
                    &spec.outputs,
                );
                spec.runner.execute(&mut ctx).await?
            };

            if let Some(slot) = spec.flag_slot {
                match output.flag {
                    Some(flag) => state.set_flag(slot, flag),
                    None => warn!(
                        item = %item.id,
                        stage = %stage,
                        flag = %slot,
                        "Stage returned no flag, keeping failure sentinel"
                    ),
                }
            }

            for name in &spec.outputs {
                if let Some(table) = state.table(*name) {
                    self.store.write_table(&item.id, *name, table)?;
                }
            }
            self.store.write_attributes(&item.id, state.attributes())?;
            executed.push(stage);

            let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
            let event = output.metadata.into_iter().fold(
                PipelineEvent::stage_completed(&item.id, stage, duration_ms),
                |event, (key, value)| event.add_data(key, value),
            );
            self.emit(run_id, event);

            if let Some(gate) = &spec.gate {
                if !gate.check.passes(&state) {
                    info!(
                        item = %item.id,
                        stage = %stage,
                        state = gate.on_fail.state(),
                        "Item short-circuited"
                    );
                    let event = PipelineEvent::short_circuited(&item.id, stage, gate.on_fail);
                    self.emit(run_id, event);
                    outcome = ItemOutcome::ShortCircuited(gate.on_fail);
                    break;
                }
            }
        }

        let flags = *state.flags();
        self.ledger.append(LedgerRow::new(item.id.clone(), flags))?;
        info!(item = %item.id, outcome = %outcome, "Recorded item");
        self.emit(run_id, PipelineEvent::item_recorded(&item.id, &flags));

        Ok(ItemReport {
            id: item.id.clone(),
            outcome,
            flags,
            stages: executed,
        })
    }

    fn emit(&self, run_id: Uuid, event: PipelineEvent) {
        self.sink.emit(&event.add_data("run_id", serde_json::json!(run_id.to_string())));
    }
}

/// Renders an error with its sources, skipping causes whose text is
/// already embedded in an outer message.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut chain = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !chain.contains(&text) {
            chain.push_str(": ");
            chain.push_str(&text);
        }
        source = cause.source();
    }
    chain
}
