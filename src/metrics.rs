//! Regression metric computation

use serde::{Deserialize, Serialize};

use crate::errors::TrainerError;
use crate::model::Regressor;

/// MSE / MAE / R² triple for one dataset slice
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub mse: f64,
    pub mae: f64,
    pub r2: f64,
}

/// Predict on the given slice and compute the metric triple.
///
/// R² is 1 - ss_res/ss_tot. When the targets are constant (ss_tot == 0) it
/// is exactly 1.0 for zero residuals and -inf otherwise; it is negative
/// whenever the model is worse than predicting the target mean. The
/// estimator is not mutated.
pub fn calculate_metrics(
    model: &dyn Regressor,
    x: &[Vec<f64>],
    y: &[f64],
) -> Result<Metrics, TrainerError> {
    if y.is_empty() {
        return Err(TrainerError::Computation(
            "cannot compute metrics on an empty slice".to_string(),
        ));
    }

    let predictions = model.predict(x)?;
    if predictions.len() != y.len() {
        return Err(TrainerError::Computation(format!(
            "predictions ({}) and targets ({}) are misaligned",
            predictions.len(),
            y.len()
        )));
    }

    let n = y.len() as f64;
    let mut ss_res = 0.0;
    let mut abs_sum = 0.0;
    for (&p, &t) in predictions.iter().zip(y.iter()) {
        let d = p - t;
        ss_res += d * d;
        abs_sum += d.abs();
    }

    let y_mean = y.iter().sum::<f64>() / n;
    let ss_tot: f64 = y.iter().map(|&t| (t - y_mean) * (t - y_mean)).sum();

    let r2 = if ss_tot == 0.0 {
        if ss_res == 0.0 {
            1.0
        } else {
            f64::NEG_INFINITY
        }
    } else {
        1.0 - ss_res / ss_tot
    };

    Ok(Metrics {
        mse: ss_res / n,
        mae: abs_sum / n,
        r2,
    })
}
