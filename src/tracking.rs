//! Local experiment tracking
//!
//! Records one run per training execution under a root directory:
//!
//! ```text
//! <root>/<run_id>/meta.json
//! <root>/<run_id>/params.json
//! <root>/<run_id>/metrics.json
//! <root>/<run_id>/artifacts/model.json
//! <root>/<run_id>/artifacts/model.hash
//! <root>/<run_id>/artifacts/evaluation.json
//! ```
//!
//! The run is always finalized: FINISHED on success, FAILED when the scoped
//! closure returns an error.

use anyhow::{Context, Result as AnyResult};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dataset::EvalTable;
use crate::errors::TrainerError;
use crate::metrics::{calculate_metrics, Metrics};
use crate::model::{Model, Regressor};

/// Lifecycle state of a tracked run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

/// Task type declared to the evaluation pass
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTask {
    Regressor,
}

/// Single schema-example row stored alongside the model artifact
#[derive(Clone, Debug, Serialize)]
pub struct InputExample {
    pub columns: Vec<String>,
    pub row: Vec<f64>,
}

impl InputExample {
    pub fn new(columns: &[String], row: &[f64]) -> Self {
        Self {
            columns: columns.to_vec(),
            row: row.to_vec(),
        }
    }
}

/// Capability set the orchestrator needs from a tracking backend
pub trait TrackingRun {
    fn log_param(&mut self, key: &str, value: &str);
    fn log_metric(&mut self, key: &str, value: f64);

    /// Persist the fitted model as a run artifact, returning its path.
    fn log_model(
        &mut self,
        model: &Model,
        input_example: &InputExample,
    ) -> Result<PathBuf, TrainerError>;

    /// Standardized evaluation pass over a named-column table. The declared
    /// target column is excluded from the feature view.
    fn evaluate(
        &mut self,
        model: &Model,
        table: &EvalTable,
        target: &str,
        task: ModelTask,
    ) -> Result<Metrics, TrainerError>;
}

#[derive(Serialize)]
struct RunMeta<'a> {
    run_id: &'a str,
    status: RunStatus,
    start_time_ms: i64,
    end_time_ms: Option<i64>,
}

#[derive(Serialize)]
struct ModelArtifact<'a> {
    model: &'a Model,
    input_example: &'a InputExample,
    logged_at_ms: i64,
}

#[derive(Serialize)]
struct EvaluationReport<'a> {
    task: ModelTask,
    target: &'a str,
    n_rows: usize,
    metrics: Metrics,
}

/// Filesystem-backed tracking store
pub struct FsTrackingStore {
    root: PathBuf,
}

impl FsTrackingStore {
    /// Open (creating if needed) a tracking root directory.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, TrainerError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| {
            TrainerError::Tracking(format!(
                "failed to create tracking root {}: {e}",
                root.display()
            ))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Begin a new run in RUNNING state.
    pub fn start_run(&self) -> Result<FsTrackingRun, TrainerError> {
        let run_id = Uuid::new_v4().simple().to_string();
        let dir = self.root.join(&run_id);

        let run = FsTrackingRun {
            run_id,
            dir,
            start_time_ms: Utc::now().timestamp_millis(),
            end_time_ms: None,
            status: RunStatus::Running,
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
        };

        run.create_layout()
            .map_err(|e| TrainerError::Tracking(format!("{e:#}")))?;
        info!("Started tracking run {} at {}", run.run_id, run.dir.display());
        Ok(run)
    }

    /// Run `f` inside a run scope. The run is finalized on every exit path:
    /// FINISHED when `f` succeeds, FAILED when it errors (the original error
    /// still propagates).
    pub fn with_run<T>(
        &self,
        f: impl FnOnce(&mut FsTrackingRun) -> Result<T, TrainerError>,
    ) -> Result<T, TrainerError> {
        let mut run = self.start_run()?;
        match f(&mut run) {
            Ok(value) => {
                run.finish()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(finalize_err) = run.fail() {
                    warn!("Failed to mark run {} as failed: {finalize_err}", run.run_id);
                }
                Err(err)
            }
        }
    }
}

/// One in-progress tracked run
pub struct FsTrackingRun {
    run_id: String,
    dir: PathBuf,
    start_time_ms: i64,
    end_time_ms: Option<i64>,
    status: RunStatus,
    params: BTreeMap<String, String>,
    metrics: BTreeMap<String, f64>,
}

impl FsTrackingRun {
    pub fn id(&self) -> &str {
        &self.run_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    fn artifacts_dir(&self) -> PathBuf {
        self.dir.join("artifacts")
    }

    fn create_layout(&self) -> AnyResult<()> {
        fs::create_dir_all(self.artifacts_dir()).context("Failed to create run directory")?;
        self.write_meta()
    }

    fn write_meta(&self) -> AnyResult<()> {
        let meta = RunMeta {
            run_id: &self.run_id,
            status: self.status,
            start_time_ms: self.start_time_ms,
            end_time_ms: self.end_time_ms,
        };
        write_json(&self.dir.join("meta.json"), &meta)
    }

    /// Finalize with the given status, flushing params and metrics.
    fn finalize(&mut self, status: RunStatus) -> Result<(), TrainerError> {
        self.status = status;
        self.end_time_ms = Some(Utc::now().timestamp_millis());

        let flush = || -> AnyResult<()> {
            write_json(&self.dir.join("params.json"), &self.params)?;
            write_json(&self.dir.join("metrics.json"), &self.metrics)?;
            self.write_meta()
        };
        flush().map_err(|e| TrainerError::Tracking(format!("{e:#}")))?;

        info!("Run {} finalized as {:?}", self.run_id, status);
        Ok(())
    }

    /// Mark the run FINISHED and persist its state.
    pub fn finish(&mut self) -> Result<(), TrainerError> {
        self.finalize(RunStatus::Finished)
    }

    /// Mark the run FAILED and persist whatever was recorded so far.
    pub fn fail(&mut self) -> Result<(), TrainerError> {
        self.finalize(RunStatus::Failed)
    }
}

impl TrackingRun for FsTrackingRun {
    fn log_param(&mut self, key: &str, value: &str) {
        debug!("param {key}={value}");
        self.params.insert(key.to_string(), value.to_string());
    }

    fn log_metric(&mut self, key: &str, value: f64) {
        debug!("metric {key}={value}");
        self.metrics.insert(key.to_string(), value);
    }

    fn log_model(
        &mut self,
        model: &Model,
        input_example: &InputExample,
    ) -> Result<PathBuf, TrainerError> {
        let artifact = ModelArtifact {
            model,
            input_example,
            logged_at_ms: Utc::now().timestamp_millis(),
        };

        let model_path = self.artifacts_dir().join("model.json");
        let write = || -> AnyResult<()> {
            let json = serde_json::to_string_pretty(&artifact)
                .context("Failed to serialize model artifact")?;
            fs::write(&model_path, &json).context("Failed to write model artifact")?;

            let hash = blake3::hash(json.as_bytes());
            fs::write(
                self.artifacts_dir().join("model.hash"),
                hex::encode(hash.as_bytes()),
            )
            .context("Failed to write model hash")?;
            Ok(())
        };
        write().map_err(|e| TrainerError::Tracking(format!("{e:#}")))?;

        info!("Logged model artifact to {}", model_path.display());
        Ok(model_path)
    }

    fn evaluate(
        &mut self,
        model: &Model,
        table: &EvalTable,
        target: &str,
        task: ModelTask,
    ) -> Result<Metrics, TrainerError> {
        let (features, targets) = table
            .split_on_target(target)
            .map_err(|e| TrainerError::Data(format!("{e:#}")))?;

        let metrics = calculate_metrics(model, &features, &targets)?;
        self.log_metric("eval_mse", metrics.mse);
        self.log_metric("eval_mae", metrics.mae);
        self.log_metric("eval_r2", metrics.r2);

        let report = EvaluationReport {
            task,
            target,
            n_rows: table.rows.len(),
            metrics,
        };
        write_json(&self.artifacts_dir().join("evaluation.json"), &report)
            .map_err(|e| TrainerError::Tracking(format!("{e:#}")))?;

        info!(
            "Evaluation ({:?}) on {} rows: mse={} mae={} r2={}",
            task, report.n_rows, metrics.mse, metrics.mae, metrics.r2
        );
        Ok(metrics)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> AnyResult<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::dataset::TARGET_COLUMN;
    use crate::model::select_model;
    use tempfile::tempdir;

    fn fitted_knn() -> Model {
        let mut model = select_model(&ModelConfig::Knn { n_neighbors: 1 }).unwrap();
        let x = vec![vec![0.0], vec![1.0], vec![2.0]];
        let y = vec![0.0, 1.0, 2.0];
        model.fit(&x, &y).unwrap();
        model
    }

    #[test]
    fn test_with_run_finishes_on_success() {
        let dir = tempdir().unwrap();
        let store = FsTrackingStore::open(dir.path()).unwrap();

        let run_dir = store
            .with_run(|run| {
                run.log_param("model_type", "knn");
                run.log_metric("train_mse", 0.25);
                Ok(run.dir().to_path_buf())
            })
            .unwrap();

        let meta: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(run_dir.join("meta.json")).unwrap())
                .unwrap();
        assert_eq!(meta["status"], "FINISHED");
        assert!(meta["end_time_ms"].is_i64());

        let params: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(run_dir.join("params.json")).unwrap())
                .unwrap();
        assert_eq!(params["model_type"], "knn");

        let metrics: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(run_dir.join("metrics.json")).unwrap())
                .unwrap();
        assert_eq!(metrics["train_mse"], 0.25);
    }

    #[test]
    fn test_with_run_marks_failed_and_propagates() {
        let dir = tempdir().unwrap();
        let store = FsTrackingStore::open(dir.path()).unwrap();

        let result: Result<(), TrainerError> = store.with_run(|run| {
            run.log_param("model_type", "knn");
            Err(TrainerError::Computation("boom".to_string()))
        });

        let err = result.unwrap_err();
        assert!(matches!(err, TrainerError::Computation(_)));

        // Exactly one run directory, marked FAILED, with params flushed.
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(entries.len(), 1);

        let meta: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(entries[0].join("meta.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(meta["status"], "FAILED");

        let params: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(entries[0].join("params.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(params["model_type"], "knn");
    }

    #[test]
    fn test_log_model_writes_artifact_and_hash() {
        let dir = tempdir().unwrap();
        let store = FsTrackingStore::open(dir.path()).unwrap();
        let model = fitted_knn();

        let example = InputExample::new(&["a".to_string()], &[0.0]);
        let model_path = store
            .with_run(|run| run.log_model(&model, &example))
            .unwrap();

        let json = std::fs::read_to_string(&model_path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["model"]["family"], "knn");
        assert_eq!(parsed["input_example"]["columns"][0], "a");

        let hash = std::fs::read_to_string(model_path.with_file_name("model.hash")).unwrap();
        assert_eq!(hash, hex::encode(blake3::hash(json.as_bytes()).as_bytes()));
    }

    #[test]
    fn test_evaluate_excludes_target_column() {
        let dir = tempdir().unwrap();
        let store = FsTrackingStore::open(dir.path()).unwrap();
        let model = fitted_knn();

        // Table rows: single feature plus the quality column. A 1-NN model
        // trained on identity data predicts the feature value itself, so the
        // metrics are exact iff only the feature column reaches the model.
        let table = EvalTable {
            columns: vec!["a".to_string(), TARGET_COLUMN.to_string()],
            rows: vec![vec![0.0, 0.0], vec![1.0, 1.0], vec![2.0, 2.0]],
        };

        let (metrics, run_dir) = store
            .with_run(|run| {
                let m = run.evaluate(&model, &table, TARGET_COLUMN, ModelTask::Regressor)?;
                Ok((m, run.dir().to_path_buf()))
            })
            .unwrap();

        assert_eq!(metrics.mse, 0.0);
        assert_eq!(metrics.r2, 1.0);

        let logged: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(run_dir.join("metrics.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(logged["eval_mse"], 0.0);
        assert_eq!(logged["eval_r2"], 1.0);

        let report: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(run_dir.join("artifacts/evaluation.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(report["task"], "regressor");
        assert_eq!(report["target"], TARGET_COLUMN);
        assert_eq!(report["n_rows"], 3);
    }

    #[test]
    fn test_evaluate_missing_target_is_data_error() {
        let dir = tempdir().unwrap();
        let store = FsTrackingStore::open(dir.path()).unwrap();
        let model = fitted_knn();

        let table = EvalTable {
            columns: vec!["a".to_string()],
            rows: vec![vec![0.0]],
        };

        let result = store.with_run(|run| {
            run.evaluate(&model, &table, TARGET_COLUMN, ModelTask::Regressor)
        });
        assert!(matches!(result.unwrap_err(), TrainerError::Data(_)));
    }
}
