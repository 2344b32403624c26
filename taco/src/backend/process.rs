//! External-process numeric collaborator.
//!
//! Each invocation spawns `<program> <args...> <operation>` inside a fresh
//! scratch directory. Input tables are written there as CSV files and a JSON
//! request naming them is written to the child's stdin. The child answers on
//! stdout with a JSON object:
//!
//! ```json
//! {"flag": 0.0, "attributes": {"numax": 35.2}, "outputs": {"peaks": "peaks.csv"}}
//! ```
//!
//! Output paths are resolved against the scratch directory, which is removed
//! once the response has been read.

use super::{BackendResponse, Invocation, NumericBackend};
use crate::core::{ArtifactName, OutcomeFlag, Table};
use crate::errors::BackendError;
use crate::settings::BackendConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[derive(Serialize)]
struct WireRequest<'a> {
    operation: &'a str,
    stage: &'a str,
    item: &'a str,
    options: &'a serde_json::Value,
    attributes: serde_json::Value,
    inputs: BTreeMap<&'static str, PathBuf>,
    outputs: Vec<&'static str>,
    workdir: &'a Path,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    flag: Option<f64>,
    #[serde(default)]
    attributes: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    outputs: BTreeMap<String, PathBuf>,
}

/// A collaborator reached by spawning a program per invocation.
#[derive(Debug, Clone)]
pub struct ProcessBackend {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl ProcessBackend {
    /// Creates a backend spawning `program` with no extra arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    /// Creates a backend from the settings document.
    #[must_use]
    pub fn from_config(config: &BackendConfig) -> Self {
        let backend = Self::new(config.program.clone()).with_args(config.args.clone());
        match config.timeout_secs {
            Some(secs) => backend.with_timeout(Duration::from_secs(secs)),
            None => backend,
        }
    }

    /// Sets the arguments placed before the operation name.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the per-invocation timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the program.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Returns the per-invocation timeout.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn spawn(
        &self,
        operation: &str,
        workdir: &Path,
        request: Vec<u8>,
    ) -> Result<Output, BackendError> {
        let io_err = |source| BackendError::Io {
            operation: operation.to_string(),
            source,
        };

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(operation)
            .current_dir(workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BackendError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Feed stdin while draining stdout so a chatty child cannot deadlock.
        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                match stdin.write_all(&request).await {
                    Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => return Err(e),
                    _ => {}
                }
            }
            Ok(())
        };

        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        fed.map_err(io_err)?;
        output.map_err(io_err)
    }
}

#[async_trait]
impl NumericBackend for ProcessBackend {
    async fn invoke(&self, invocation: Invocation<'_>) -> Result<BackendResponse, BackendError> {
        let operation = invocation.operation.name();
        let io_err = |source| BackendError::Io {
            operation: operation.to_string(),
            source,
        };

        let workdir = tempfile::Builder::new()
            .prefix("taco-")
            .tempdir()
            .map_err(io_err)?;

        let mut inputs = BTreeMap::new();
        for (name, table) in &invocation.inputs {
            let path = workdir.path().join(format!("{}.csv", name.key()));
            tokio::fs::write(&path, table.to_csv()).await.map_err(io_err)?;
            inputs.insert(name.key(), path);
        }

        let request = WireRequest {
            operation,
            stage: invocation.stage.name(),
            item: invocation.item_id,
            options: &invocation.options,
            attributes: invocation.attributes.to_json(),
            inputs,
            outputs: invocation.outputs.iter().map(|name| name.key()).collect(),
            workdir: workdir.path(),
        };
        let request = serde_json::to_vec(&request)
            .map_err(|e| BackendError::protocol(operation, format!("cannot encode request: {e}")))?;

        tracing::debug!(
            item = invocation.item_id,
            stage = %invocation.stage,
            operation,
            program = %self.program,
            "Invoking collaborator"
        );

        let run = self.spawn(operation, workdir.path(), request);
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| BackendError::Timeout {
                    operation: operation.to_string(),
                    seconds: limit.as_secs(),
                })??,
            None => run.await?,
        };

        if !output.status.success() {
            return Err(BackendError::Exit {
                operation: operation.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let wire: WireResponse = serde_json::from_slice(&output.stdout)
            .map_err(|e| BackendError::protocol(operation, format!("malformed response: {e}")))?;

        let mut outputs = HashMap::new();
        for (key, path) in wire.outputs {
            let name = ArtifactName::from_key(&key).ok_or_else(|| {
                BackendError::protocol(operation, format!("unknown output '{key}'"))
            })?;
            let path = workdir.path().join(path);
            let text = tokio::fs::read_to_string(&path).await.map_err(|e| {
                let message = format!("cannot read output '{key}' at {}: {e}", path.display());
                BackendError::protocol(operation, message)
            })?;
            let table = Table::from_csv(&text)
                .map_err(|e| BackendError::protocol(operation, format!("output '{key}': {e}")))?;
            outputs.insert(name, table);
        }

        Ok(BackendResponse {
            flag: wire.flag.map(OutcomeFlag::new),
            attributes: wire.attributes,
            outputs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Operation;
    use crate::core::{Attributes, StageId};

    fn shell(script: &str) -> ProcessBackend {
        ProcessBackend::new("sh").with_args(["-c", script, "collaborator"])
    }

    async fn call(
        backend: &ProcessBackend,
        inputs: Vec<(ArtifactName, &Table)>,
    ) -> Result<BackendResponse, BackendError> {
        let mut attrs = Attributes::new();
        attrs.set("KIC", serde_json::json!("1234567"));
        backend
            .invoke(Invocation {
                item_id: "KIC001",
                stage: StageId::PeakFind,
                operation: Operation::PeakFind,
                options: serde_json::json!({"snr": 1.1}),
                attributes: &attrs,
                inputs,
                outputs: &[ArtifactName::Peaks],
            })
            .await
    }

    #[tokio::test]
    async fn test_request_is_echoed_back() {
        let backend = shell(
            r#"printf '{"attributes": {"request": '; cat; printf ', "operation": "%s"}}' "$1""#,
        );
        let pds = Table::new(["frequency", "power"]);

        let response = call(&backend, vec![(ArtifactName::PdsBgr, &pds)]).await.unwrap();

        let request = &response.attributes["request"];
        assert_eq!(request["operation"], "peak_find");
        assert_eq!(request["stage"], "peak_find");
        assert_eq!(request["item"], "KIC001");
        assert_eq!(request["options"]["snr"], 1.1);
        assert_eq!(request["attributes"]["KIC"], "1234567");
        assert_eq!(request["outputs"], serde_json::json!(["peaks"]));
        assert!(request["inputs"]["pds_bgr"].as_str().unwrap().ends_with("pds_bgr.csv"));
        assert_eq!(response.attributes["operation"], "peak_find");
        assert_eq!(response.flag, None);
    }

    #[tokio::test]
    async fn test_outputs_and_flag() {
        let backend = shell(
            r#"cat > /dev/null
test -f pds_bgr.csv || exit 9
printf 'frequency,amplitude\n20.5,3\n24.25,1.5\n' > peaks.csv
echo '{"flag": 0.0, "outputs": {"peaks": "peaks.csv"}}'"#,
        );
        let pds = Table::new(["frequency", "power"]);

        let response = call(&backend, vec![(ArtifactName::PdsBgr, &pds)]).await.unwrap();

        assert_eq!(response.flag, Some(OutcomeFlag::SUCCESS));
        let peaks = &response.outputs[&ArtifactName::Peaks];
        assert_eq!(peaks.len(), 2);
        assert_eq!(peaks.column("frequency"), Some(vec![20.5, 24.25]));
    }

    #[tokio::test]
    async fn test_non_zero_exit() {
        let backend = shell("cat > /dev/null; echo 'fit diverged' >&2; exit 3");
        let err = call(&backend, Vec::new()).await.unwrap_err();

        match err {
            BackendError::Exit { operation, stderr, .. } => {
                assert_eq!(operation, "peak_find");
                assert_eq!(stderr, "fit diverged");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_response() {
        let backend = shell("cat > /dev/null; echo not-json");
        let err = call(&backend, Vec::new()).await.unwrap_err();
        assert!(matches!(err, BackendError::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_missing_output_file() {
        let backend = shell(r#"cat > /dev/null; echo '{"outputs": {"peaks": "nowhere.csv"}}'"#);
        let err = call(&backend, Vec::new()).await.unwrap_err();
        assert!(err.to_string().contains("nowhere.csv"));
    }

    #[tokio::test]
    async fn test_unknown_output_name() {
        let backend = shell(r#"cat > /dev/null; echo '{"outputs": {"spectrum": "x.csv"}}'"#);
        let err = call(&backend, Vec::new()).await.unwrap_err();
        assert!(err.to_string().contains("unknown output 'spectrum'"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let backend = shell("sleep 5").with_timeout(Duration::from_millis(100));
        let err = call(&backend, Vec::new()).await.unwrap_err();
        assert!(matches!(err, BackendError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let backend = ProcessBackend::new("/nonexistent/taco-numeric");
        let err = call(&backend, Vec::new()).await.unwrap_err();
        assert!(matches!(err, BackendError::Spawn { .. }));
    }

    #[test]
    fn test_from_config() {
        let config = BackendConfig {
            program: "taco-numeric".to_string(),
            args: vec!["--fast".to_string()],
            timeout_secs: Some(30),
        };
        let backend = ProcessBackend::from_config(&config);

        assert_eq!(backend.program(), "taco-numeric");
        assert_eq!(backend.timeout(), Some(Duration::from_secs(30)));
        assert!(ProcessBackend::from_config(&BackendConfig::new("x")).timeout().is_none());
    }
}
