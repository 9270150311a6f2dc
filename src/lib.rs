//! Wine-quality trainer
//!
//! Sequential training-and-evaluation pipeline for wine-quality regression:
//! load a CSV dataset, split it deterministically, fit an elastic-net or
//! k-nearest-neighbors regressor, and record parameters, metrics, the model
//! artifact, and an evaluation pass to a local tracking store.

pub mod config;
pub mod dataset;
pub mod deterministic;
pub mod errors;
pub mod metrics;
pub mod model;
pub mod report;
pub mod tracking;

use std::path::PathBuf;

pub use config::{ExperimentConfig, ModelConfig};
pub use dataset::{Dataset, EvalTable, Split, TARGET_COLUMN};
pub use errors::TrainerError;
pub use metrics::{calculate_metrics, Metrics};
pub use model::{select_model, ElasticNetRegressor, KnnRegressor, Model, Regressor};
pub use report::{format_metrics, print_metrics};
pub use tracking::{FsTrackingStore, InputExample, ModelTask, TrackingRun};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Outcome of one tracked training run
#[derive(Clone, Debug)]
pub struct RunSummary {
    pub run_id: String,
    pub train: Metrics,
    pub test: Metrics,
    pub model_path: PathBuf,
}

/// Execute one full experiment: select the model, prepare the data, and run
/// the tracked fit/evaluate sequence. The tracking run is finalized on every
/// exit path.
pub fn run_experiment(config: &ExperimentConfig) -> Result<RunSummary, TrainerError> {
    config.validate()?;
    let mut model = select_model(&config.model)?;

    let dataset = Dataset::from_csv(&config.data_path)
        .map_err(|err| TrainerError::Data(format!("{err:#}")))?;
    tracing::info!(
        "Loaded {} rows with {} features",
        dataset.len(),
        dataset.feature_count()
    );

    let split = dataset
        .train_test_split(config.test_size, config.seed)
        .map_err(|err| TrainerError::Data(format!("{err:#}")))?;
    tracing::info!(
        "Split dataset: {} train rows, {} test rows (seed {})",
        split.x_train.len(),
        split.x_test.len(),
        config.seed
    );

    let store = FsTrackingStore::open(&config.tracking_dir)?;

    store.with_run(|run| {
        run.log_param("file_path", &config.data_path.display().to_string());
        run.log_param("test_size", &config.test_size.to_string());
        run.log_param("random_state", &config.seed.to_string());
        run.log_param("model_type", config.model.family());

        // Only the selected family's hyperparameters are recorded.
        match config.model {
            ModelConfig::ElasticNet { alpha, l1_ratio } => {
                run.log_param("alpha", &alpha.to_string());
                run.log_param("l1_ratio", &l1_ratio.to_string());
            }
            ModelConfig::Knn { n_neighbors } => {
                run.log_param("n_neighbors", &n_neighbors.to_string());
            }
        }

        model.fit(&split.x_train, &split.y_train)?;

        let train = calculate_metrics(&model, &split.x_train, &split.y_train)?;
        print_metrics("Training metrics", &train);
        run.log_metric("train_mse", train.mse);
        run.log_metric("train_mae", train.mae);
        run.log_metric("train_r2", train.r2);

        let test = calculate_metrics(&model, &split.x_test, &split.y_test)?;
        print_metrics("Testing metrics", &test);
        run.log_metric("test_mse", test.mse);
        run.log_metric("test_mae", test.mae);
        run.log_metric("test_r2", test.r2);

        let input_example = InputExample::new(&dataset.feature_names, &split.x_train[0]);
        let model_path = run.log_model(&model, &input_example)?;

        let eval_table = EvalTable::from_features_and_targets(
            &dataset.feature_names,
            &split.x_test,
            TARGET_COLUMN,
            &split.y_test,
        )
        .map_err(|err| TrainerError::Data(format!("{err:#}")))?;
        run.evaluate(&model, &eval_table, TARGET_COLUMN, ModelTask::Regressor)?;

        Ok(RunSummary {
            run_id: run.id().to_string(),
            train,
            test,
            model_path,
        })
    })
}
