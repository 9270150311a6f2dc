//! Experiment and model configuration

use std::path::PathBuf;

use crate::errors::TrainerError;

pub const DEFAULT_ALPHA: f64 = 0.5;
pub const DEFAULT_L1_RATIO: f64 = 0.5;
pub const DEFAULT_N_NEIGHBORS: usize = 5;
pub const DEFAULT_TEST_SIZE: f64 = 0.25;
pub const DEFAULT_SEED: i64 = 123456;

/// Selected model family with its hyperparameters
#[derive(Clone, Debug, PartialEq)]
pub enum ModelConfig {
    /// Linear model with mixed L1/L2 regularization
    ElasticNet { alpha: f64, l1_ratio: f64 },
    /// Distance-based regressor averaging the nearest training targets
    Knn { n_neighbors: usize },
}

impl ModelConfig {
    /// Build a config from a family name, keeping only the hyperparameters
    /// that family uses.
    pub fn from_family(
        family: &str,
        alpha: f64,
        l1_ratio: f64,
        n_neighbors: usize,
    ) -> Result<Self, TrainerError> {
        match family {
            "elasticnet" => Ok(Self::ElasticNet { alpha, l1_ratio }),
            "knn" => Ok(Self::Knn { n_neighbors }),
            other => Err(TrainerError::Config(format!(
                "unknown model family '{other}' (expected 'elasticnet' or 'knn')"
            ))),
        }
    }

    pub fn family(&self) -> &'static str {
        match self {
            Self::ElasticNet { .. } => "elasticnet",
            Self::Knn { .. } => "knn",
        }
    }

    pub fn validate(&self) -> Result<(), TrainerError> {
        match *self {
            Self::ElasticNet { alpha, l1_ratio } => {
                if !alpha.is_finite() || alpha < 0.0 {
                    return Err(TrainerError::Config(format!(
                        "alpha must be a finite value >= 0, got {alpha}"
                    )));
                }
                if !l1_ratio.is_finite() || !(0.0..=1.0).contains(&l1_ratio) {
                    return Err(TrainerError::Config(format!(
                        "l1_ratio must be in [0, 1], got {l1_ratio}"
                    )));
                }
            }
            Self::Knn { n_neighbors } => {
                if n_neighbors == 0 {
                    return Err(TrainerError::Config(
                        "n_neighbors must be a positive integer".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Full configuration for one training run
#[derive(Clone, Debug)]
pub struct ExperimentConfig {
    pub data_path: PathBuf,
    pub test_size: f64,
    pub seed: i64,
    pub model: ModelConfig,
    pub tracking_dir: PathBuf,
}

impl ExperimentConfig {
    pub fn validate(&self) -> Result<(), TrainerError> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(TrainerError::Config(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        self.model.validate()
    }
}
