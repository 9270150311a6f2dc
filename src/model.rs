//! Regression estimators
//!
//! Two families: an elastic-net linear model fitted by cyclic coordinate
//! descent, and a k-nearest-neighbors regressor. Both expose the same
//! fit/predict capability so the orchestrator never depends on a concrete
//! family.

use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::errors::TrainerError;

/// Capability set shared by all estimators
pub trait Regressor {
    /// Fit on aligned feature rows and targets. Mutates the estimator once.
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), TrainerError>;

    /// Predict one value per input row. Requires a prior `fit`.
    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, TrainerError>;
}

/// Map a validated config to an untrained estimator. No training occurs here.
pub fn select_model(config: &ModelConfig) -> Result<Model, TrainerError> {
    config.validate()?;
    Ok(match *config {
        ModelConfig::ElasticNet { alpha, l1_ratio } => {
            Model::ElasticNet(ElasticNetRegressor::new(alpha, l1_ratio))
        }
        ModelConfig::Knn { n_neighbors } => Model::Knn(KnnRegressor::new(n_neighbors)),
    })
}

/// Concrete estimator, serializable as a model artifact
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "family")]
pub enum Model {
    #[serde(rename = "elasticnet")]
    ElasticNet(ElasticNetRegressor),
    #[serde(rename = "knn")]
    Knn(KnnRegressor),
}

impl Regressor for Model {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), TrainerError> {
        match self {
            Self::ElasticNet(m) => m.fit(x, y),
            Self::Knn(m) => m.fit(x, y),
        }
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, TrainerError> {
        match self {
            Self::ElasticNet(m) => m.predict(x),
            Self::Knn(m) => m.predict(x),
        }
    }
}

fn check_training_shapes(x: &[Vec<f64>], y: &[f64]) -> Result<usize, TrainerError> {
    if x.is_empty() {
        return Err(TrainerError::Computation(
            "cannot fit on an empty training set".to_string(),
        ));
    }
    if x.len() != y.len() {
        return Err(TrainerError::Computation(format!(
            "feature rows ({}) and targets ({}) are misaligned",
            x.len(),
            y.len()
        )));
    }
    let width = x[0].len();
    if width == 0 {
        return Err(TrainerError::Computation(
            "training rows have no feature columns".to_string(),
        ));
    }
    for (i, row) in x.iter().enumerate() {
        if row.len() != width {
            return Err(TrainerError::Computation(format!(
                "row {i} has {} features, expected {width}",
                row.len()
            )));
        }
    }
    Ok(width)
}

/// Linear regression with mixed L1/L2 penalties, fitted by coordinate descent
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ElasticNetRegressor {
    pub alpha: f64,
    pub l1_ratio: f64,
    pub max_iter: usize,
    pub tol: f64,
    coefficients: Option<Vec<f64>>,
    intercept: Option<f64>,
}

impl ElasticNetRegressor {
    pub fn new(alpha: f64, l1_ratio: f64) -> Self {
        Self {
            alpha,
            l1_ratio,
            max_iter: 1000,
            tol: 1e-6,
            coefficients: None,
            intercept: None,
        }
    }

    pub fn coefficients(&self) -> Option<&[f64]> {
        self.coefficients.as_deref()
    }

    pub fn intercept(&self) -> Option<f64> {
        self.intercept
    }

    /// Soft-threshold operator for the L1 proximal step
    fn soft_threshold(val: f64, threshold: f64) -> f64 {
        if val > threshold {
            val - threshold
        } else if val < -threshold {
            val + threshold
        } else {
            0.0
        }
    }
}

impl Regressor for ElasticNetRegressor {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), TrainerError> {
        let n_features = check_training_shapes(x, y)?;
        let n_samples = x.len();
        let n = n_samples as f64;

        // Center features and targets so the intercept drops out of the
        // coordinate updates.
        let mut x_mean = vec![0.0; n_features];
        for row in x {
            for (j, &v) in row.iter().enumerate() {
                x_mean[j] += v;
            }
        }
        for m in &mut x_mean {
            *m /= n;
        }
        let y_mean = y.iter().sum::<f64>() / n;

        // Column-major centered copy; coordinate descent walks columns.
        let mut cols = vec![vec![0.0; n_samples]; n_features];
        for (i, row) in x.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                cols[j][i] = v - x_mean[j];
            }
        }

        let col_norms: Vec<f64> = cols
            .iter()
            .map(|col| col.iter().map(|v| v * v).sum())
            .collect();

        let l1_penalty = self.alpha * self.l1_ratio * n;
        let l2_penalty = self.alpha * (1.0 - self.l1_ratio) * n;

        let mut w = vec![0.0; n_features];
        let mut residual: Vec<f64> = y.iter().map(|&v| v - y_mean).collect();

        for _iter in 0..self.max_iter {
            let mut delta = 0.0;

            for j in 0..n_features {
                let denom = col_norms[j] + l2_penalty;
                if denom < 1e-15 {
                    w[j] = 0.0;
                    continue;
                }

                // rho = x_j^T r + ||x_j||^2 * w_j
                let dot: f64 = cols[j]
                    .iter()
                    .zip(residual.iter())
                    .map(|(&c, &r)| c * r)
                    .sum();
                let rho = dot + col_norms[j] * w[j];

                let old_wj = w[j];
                w[j] = Self::soft_threshold(rho, l1_penalty) / denom;

                let diff = old_wj - w[j];
                if diff != 0.0 {
                    for (r, &c) in residual.iter_mut().zip(cols[j].iter()) {
                        *r += c * diff;
                    }
                }
                delta += diff.abs();
            }

            if delta < self.tol {
                break;
            }
        }

        let intercept = y_mean - w.iter().zip(x_mean.iter()).map(|(&wj, &m)| wj * m).sum::<f64>();
        self.coefficients = Some(w);
        self.intercept = Some(intercept);
        Ok(())
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, TrainerError> {
        let (w, b) = match (&self.coefficients, self.intercept) {
            (Some(w), Some(b)) => (w, b),
            _ => {
                return Err(TrainerError::Computation(
                    "elasticnet model has not been fitted".to_string(),
                ))
            }
        };

        let mut out = Vec::with_capacity(x.len());
        for (i, row) in x.iter().enumerate() {
            if row.len() != w.len() {
                return Err(TrainerError::Computation(format!(
                    "row {i} has {} features, model expects {}",
                    row.len(),
                    w.len()
                )));
            }
            let dot: f64 = row.iter().zip(w.iter()).map(|(&v, &wj)| v * wj).sum();
            out.push(dot + b);
        }
        Ok(out)
    }
}

/// K-nearest-neighbors regressor with uniform weighting
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KnnRegressor {
    pub n_neighbors: usize,
    x_train: Option<Vec<Vec<f64>>>,
    y_train: Option<Vec<f64>>,
}

impl KnnRegressor {
    pub fn new(n_neighbors: usize) -> Self {
        Self {
            n_neighbors,
            x_train: None,
            y_train: None,
        }
    }

    fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
        a.iter()
            .zip(b.iter())
            .map(|(&x, &y)| {
                let d = x - y;
                d * d
            })
            .sum()
    }
}

impl Regressor for KnnRegressor {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), TrainerError> {
        check_training_shapes(x, y)?;
        if self.n_neighbors > x.len() {
            return Err(TrainerError::Config(format!(
                "n_neighbors ({}) exceeds the training set size ({})",
                self.n_neighbors,
                x.len()
            )));
        }
        self.x_train = Some(x.to_vec());
        self.y_train = Some(y.to_vec());
        Ok(())
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, TrainerError> {
        let (x_train, y_train) = match (&self.x_train, &self.y_train) {
            (Some(xt), Some(yt)) => (xt, yt),
            _ => {
                return Err(TrainerError::Computation(
                    "knn model has not been fitted".to_string(),
                ))
            }
        };
        let width = x_train[0].len();

        let mut out = Vec::with_capacity(x.len());
        for (i, row) in x.iter().enumerate() {
            if row.len() != width {
                return Err(TrainerError::Computation(format!(
                    "row {i} has {} features, model expects {width}",
                    row.len()
                )));
            }

            let mut neighbors: Vec<(f64, usize)> = x_train
                .iter()
                .enumerate()
                .map(|(idx, train_row)| (Self::squared_distance(row, train_row), idx))
                .collect();
            // Stable sort on distance keeps ascending-index order for ties.
            neighbors.sort_by(|a, b| a.0.total_cmp(&b.0));

            let sum: f64 = neighbors
                .iter()
                .take(self.n_neighbors)
                .map(|&(_, idx)| y_train[idx])
                .sum();
            out.push(sum / self.n_neighbors as f64);
        }
        Ok(out)
    }
}
