//! Console metric reports

use crate::metrics::Metrics;

/// Format a metric report: title followed by three labeled lines.
pub fn format_metrics(title: &str, metrics: &Metrics) -> String {
    format!(
        "{title}\nMSE: {}\nMAE: {}\nR2: {}",
        metrics.mse, metrics.mae, metrics.r2
    )
}

/// Print a metric report to stdout.
pub fn print_metrics(title: &str, metrics: &Metrics) {
    println!("{}", format_metrics(title, metrics));
}
