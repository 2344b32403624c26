//! The context for a single stage execution.

use super::ItemState;
use crate::backend::{BackendResponse, Invocation, NumericBackend, Operation};
use crate::core::{ArtifactName, OutcomeFlag, StageId};
use crate::errors::{BackendError, TacoError};
use crate::settings::StageOptions;

/// What a stage sees while it runs: the item state, its own options, the
/// backend, and the artifacts it declared.
pub struct StageContext<'a> {
    stage: StageId,
    state: &'a mut ItemState,
    options: &'a StageOptions,
    backend: &'a dyn NumericBackend,
    inputs: &'a [ArtifactName],
    outputs: &'a [ArtifactName],
}

impl<'a> StageContext<'a> {
    /// Creates a new stage context.
    #[must_use]
    pub fn new(
        stage: StageId,
        state: &'a mut ItemState,
        options: &'a StageOptions,
        backend: &'a dyn NumericBackend,
        inputs: &'a [ArtifactName],
        outputs: &'a [ArtifactName],
    ) -> Self {
        Self {
            stage,
            state,
            options,
            backend,
            inputs,
            outputs,
        }
    }

    /// Returns the stage id.
    #[must_use]
    pub fn stage(&self) -> StageId {
        self.stage
    }

    /// Returns the item id.
    #[must_use]
    pub fn item_id(&self) -> &str {
        self.state.id()
    }

    /// Returns the stage's options.
    #[must_use]
    pub fn options(&self) -> &'a StageOptions {
        self.options
    }

    /// Returns the item state.
    #[must_use]
    pub fn state(&self) -> &ItemState {
        &*self.state
    }

    /// Returns the item state for modification.
    pub fn state_mut(&mut self) -> &mut ItemState {
        &mut *self.state
    }

    /// Returns the declared inputs that have not been produced yet.
    #[must_use]
    pub fn missing_inputs(&self) -> Vec<ArtifactName> {
        self.inputs
            .iter()
            .copied()
            .filter(|name| !self.state.has_table(*name))
            .collect()
    }

    /// Sends the declared inputs to the backend and folds the response into
    /// the item state.
    ///
    /// Attribute updates are merged, declared outputs replace their tables,
    /// and the flag (if any) is returned for the runner to store.
    ///
    /// # Errors
    ///
    /// Returns an error if a declared input is missing, the backend fails, or
    /// the response lacks a declared output.
    pub async fn invoke(
        &mut self,
        operation: Operation,
        options: serde_json::Value,
    ) -> Result<Option<OutcomeFlag>, TacoError> {
        let stage = self.stage;
        let inputs = self
            .inputs
            .iter()
            .map(|name| {
                self.state
                    .table(*name)
                    .map(|table| (*name, table))
                    .ok_or_else(|| {
                        TacoError::stage(stage.name(), format!("missing input '{name}'"))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let response = self
            .backend
            .invoke(Invocation {
                item_id: self.state.id(),
                stage,
                operation,
                options,
                attributes: self.state.attributes(),
                inputs,
                outputs: self.outputs,
            })
            .await?;

        if let Some(missing) = self
            .outputs
            .iter()
            .find(|name| !response.outputs.contains_key(*name))
        {
            let message = format!("missing output '{missing}'");
            return Err(BackendError::protocol(operation.name(), message).into());
        }

        let BackendResponse {
            flag,
            attributes,
            outputs,
        } = response;

        self.state.attributes_mut().merge(attributes);
        for (name, table) in outputs {
            if self.outputs.contains(&name) {
                self.state.insert_table(name, table);
            } else {
                tracing::warn!(
                    item = self.state.id(),
                    stage = %stage,
                    artifact = %name,
                    "Ignoring undeclared output"
                );
            }
        }

        Ok(flag)
    }
}

impl std::fmt::Debug for StageContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageContext")
            .field("stage", &self.stage)
            .field("item", &self.state.id())
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Table;
    use crate::testing::ScriptedBackend;

    fn state() -> ItemState {
        let mut raw = Table::new(["time", "flux"]);
        raw.push_row(vec![0.0, 1.0]).unwrap();
        ItemState::new("KIC001", raw)
    }

    #[tokio::test]
    async fn test_invoke_stores_declared_outputs() {
        let backend = ScriptedBackend::new();
        let mut state = state();
        let options = StageOptions::None;
        let mut ctx = StageContext::new(
            StageId::Filter,
            &mut state,
            &options,
            &backend,
            &[ArtifactName::Raw],
            &[ArtifactName::Filtered],
        );

        let flag = ctx.invoke(Operation::Filter, serde_json::json!({})).await.unwrap();

        assert_eq!(flag, None);
        assert!(state.has_table(ArtifactName::Filtered));
        assert_eq!(backend.call_count(StageId::Filter), 1);
    }

    #[tokio::test]
    async fn test_missing_input_is_stage_error() {
        let backend = ScriptedBackend::new();
        let mut state = state();
        let options = StageOptions::None;
        let mut ctx = StageContext::new(
            StageId::PeakFind,
            &mut state,
            &options,
            &backend,
            &[ArtifactName::PdsBgr],
            &[ArtifactName::Peaks],
        );

        assert_eq!(ctx.missing_inputs(), vec![ArtifactName::PdsBgr]);
        let err = ctx.invoke(Operation::PeakFind, serde_json::json!({})).await.unwrap_err();

        assert!(matches!(err, TacoError::Stage { .. }));
        assert_eq!(backend.call_count(StageId::PeakFind), 0);
    }

    #[tokio::test]
    async fn test_missing_output_is_backend_error() {
        let backend =
            ScriptedBackend::new().without_output(StageId::Filter, ArtifactName::Filtered);
        let mut state = state();
        let options = StageOptions::None;
        let mut ctx = StageContext::new(
            StageId::Filter,
            &mut state,
            &options,
            &backend,
            &[ArtifactName::Raw],
            &[ArtifactName::Filtered],
        );

        let err = ctx.invoke(Operation::Filter, serde_json::json!({})).await.unwrap_err();

        assert!(matches!(err, TacoError::Backend(BackendError::Protocol { .. })));
        assert!(err.to_string().contains("missing output 'filtered'"));
    }
}
