//! CSV dataset loading and deterministic splitting
//!
//! Reads the wine-quality table (header row, numeric feature columns plus a
//! `quality` target column) and produces reproducible train/test partitions.

use anyhow::{Context, Result};
use std::path::Path;

use crate::deterministic::shuffled_indices;

/// Name of the target column expected in the input file.
pub const TARGET_COLUMN: &str = "quality";

/// In-memory dataset with named feature columns and a numeric target
#[derive(Clone, Debug)]
pub struct Dataset {
    pub feature_names: Vec<String>,
    pub features: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
}

/// Four-way train/test partition of a dataset
#[derive(Clone, Debug)]
pub struct Split {
    pub x_train: Vec<Vec<f64>>,
    pub x_test: Vec<Vec<f64>>,
    pub y_train: Vec<f64>,
    pub y_test: Vec<f64>,
}

impl Dataset {
    /// Load a dataset from a delimited file with a header row.
    /// The delimiter is taken from the header (`;` if present, else `,`);
    /// the target column is located by name and every remaining column is a
    /// numeric feature.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read dataset file {}", path.as_ref().display())
        })?;

        let mut lines = content.lines().enumerate();

        let (_, header) = lines
            .next()
            .context("Dataset file is empty (missing header row)")?;
        let delimiter = if header.contains(';') { ';' } else { ',' };

        let columns: Vec<String> = header
            .split(delimiter)
            .map(|s| s.trim().trim_matches('"').to_string())
            .collect();

        let target_idx = columns
            .iter()
            .position(|c| c == TARGET_COLUMN)
            .with_context(|| format!("Target column '{TARGET_COLUMN}' not found in header"))?;

        if columns.len() < 2 {
            anyhow::bail!("Header must contain at least one feature column and the target");
        }

        let feature_names: Vec<String> = columns
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != target_idx)
            .map(|(_, c)| c.clone())
            .collect();

        let mut features = Vec::new();
        let mut targets = Vec::new();

        for (line_idx, line) in lines {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let parts: Vec<&str> = line.split(delimiter).map(|s| s.trim()).collect();
            if parts.len() != columns.len() {
                anyhow::bail!(
                    "Line {}: expected {} columns, got {}",
                    line_idx + 1,
                    columns.len(),
                    parts.len()
                );
            }

            let mut row = Vec::with_capacity(feature_names.len());
            for (i, part) in parts.iter().enumerate() {
                let val = part.parse::<f64>().with_context(|| {
                    format!("Line {}, column '{}': invalid number", line_idx + 1, columns[i])
                })?;
                if i == target_idx {
                    targets.push(val);
                } else {
                    row.push(val);
                }
            }
            features.push(row);
        }

        if features.is_empty() {
            anyhow::bail!("Dataset contains no data rows");
        }

        Ok(Self {
            feature_names,
            features,
            targets,
        })
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Check if dataset is empty
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Number of feature columns
    pub fn feature_count(&self) -> usize {
        self.feature_names.len()
    }

    /// Partition into train and test rows.
    ///
    /// The partition is a deterministic function of (row order, test_size,
    /// seed): the row indices are permuted with the crate's seeded LCG and
    /// `round(len * test_size)` of them are held out for test. Row alignment
    /// between features and targets is preserved.
    pub fn train_test_split(&self, test_size: f64, seed: i64) -> Result<Split> {
        if !(test_size > 0.0 && test_size < 1.0) {
            anyhow::bail!("test_size must be in (0, 1), got {test_size}");
        }

        let n = self.len();
        let n_test = ((n as f64) * test_size).round() as usize;
        if n_test == 0 || n_test == n {
            anyhow::bail!(
                "test_size {test_size} leaves an empty partition for {n} rows"
            );
        }

        let indices = shuffled_indices(n, seed);

        let mut split = Split {
            x_train: Vec::with_capacity(n - n_test),
            x_test: Vec::with_capacity(n_test),
            y_train: Vec::with_capacity(n - n_test),
            y_test: Vec::with_capacity(n_test),
        };

        for (pos, &idx) in indices.iter().enumerate() {
            if pos < n_test {
                split.x_test.push(self.features[idx].clone());
                split.y_test.push(self.targets[idx]);
            } else {
                split.x_train.push(self.features[idx].clone());
                split.y_train.push(self.targets[idx]);
            }
        }

        Ok(split)
    }
}

/// Named-column table handed to the evaluation pass.
///
/// Built by reattaching the true test targets to the held-out test features
/// under the target column name.
#[derive(Clone, Debug)]
pub struct EvalTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl EvalTable {
    /// Append the target column to the feature rows.
    pub fn from_features_and_targets(
        feature_names: &[String],
        features: &[Vec<f64>],
        target_name: &str,
        targets: &[f64],
    ) -> Result<Self> {
        if features.len() != targets.len() {
            anyhow::bail!(
                "Feature rows ({}) and targets ({}) are misaligned",
                features.len(),
                targets.len()
            );
        }

        let mut columns: Vec<String> = feature_names.to_vec();
        columns.push(target_name.to_string());

        let rows = features
            .iter()
            .zip(targets)
            .map(|(row, &t)| {
                let mut r = row.clone();
                r.push(t);
                r
            })
            .collect();

        Ok(Self { columns, rows })
    }

    /// Split the table into a feature view and the declared target column.
    /// The target column is excluded from the feature view.
    pub fn split_on_target(&self, target: &str) -> Result<(Vec<Vec<f64>>, Vec<f64>)> {
        let target_idx = self
            .columns
            .iter()
            .position(|c| c == target)
            .with_context(|| format!("Target column '{target}' not found in evaluation table"))?;

        let mut features = Vec::with_capacity(self.rows.len());
        let mut targets = Vec::with_capacity(self.rows.len());

        for row in &self.rows {
            let mut r = Vec::with_capacity(row.len() - 1);
            for (i, &v) in row.iter().enumerate() {
                if i == target_idx {
                    targets.push(v);
                } else {
                    r.push(v);
                }
            }
            features.push(r);
        }

        Ok((features, targets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv() -> Result<NamedTempFile> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "acidity;sugar;quality")?;
        writeln!(file, "7.4;1.9;5")?;
        writeln!(file, "7.8;2.6;5")?;
        writeln!(file, "11.2;1.9;6")?;
        writeln!(file, "7.4;2.3;4")?;
        file.flush()?;
        Ok(file)
    }

    fn create_large_csv(rows: usize) -> Result<NamedTempFile> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "a,b,quality")?;
        for i in 0..rows {
            writeln!(file, "{},{},{}", i, i * 2, i % 10)?;
        }
        file.flush()?;
        Ok(file)
    }

    #[test]
    fn test_load_csv() -> Result<()> {
        let file = create_test_csv()?;
        let dataset = Dataset::from_csv(file.path())?;

        assert_eq!(dataset.len(), 4);
        assert_eq!(dataset.feature_count(), 2);
        assert_eq!(dataset.feature_names, vec!["acidity", "sugar"]);
        assert_eq!(dataset.features[0], vec![7.4, 1.9]);
        assert_eq!(dataset.targets[0], 5.0);

        Ok(())
    }

    #[test]
    fn test_missing_target_column() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "a;b;c")?;
        writeln!(file, "1;2;3")?;
        file.flush()?;

        let err = Dataset::from_csv(file.path()).unwrap_err();
        assert!(err.to_string().contains("quality"));
        Ok(())
    }

    #[test]
    fn test_inconsistent_row_rejected() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "a;b;quality")?;
        writeln!(file, "1;2;3")?;
        writeln!(file, "1;2")?;
        file.flush()?;

        assert!(Dataset::from_csv(file.path()).is_err());
        Ok(())
    }

    #[test]
    fn test_empty_dataset_rejected() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "a;b;quality")?;
        file.flush()?;

        assert!(Dataset::from_csv(file.path()).is_err());
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        assert!(Dataset::from_csv("/nonexistent/wine.csv").is_err());
    }

    #[test]
    fn test_split_determinism() -> Result<()> {
        let file = create_large_csv(100)?;
        let dataset = Dataset::from_csv(file.path())?;

        let s1 = dataset.train_test_split(0.25, 123456)?;
        let s2 = dataset.train_test_split(0.25, 123456)?;

        assert_eq!(s1.x_train, s2.x_train);
        assert_eq!(s1.x_test, s2.x_test);
        assert_eq!(s1.y_train, s2.y_train);
        assert_eq!(s1.y_test, s2.y_test);

        let s3 = dataset.train_test_split(0.25, 99)?;
        assert_ne!(s1.x_test, s3.x_test);

        Ok(())
    }

    #[test]
    fn test_split_sizes() -> Result<()> {
        let file = create_large_csv(1000)?;
        let dataset = Dataset::from_csv(file.path())?;

        let split = dataset.train_test_split(0.25, 123456)?;
        assert_eq!(split.x_test.len(), 250);
        assert_eq!(split.x_train.len(), 750);
        assert_eq!(split.x_train.len() + split.x_test.len(), dataset.len());
        assert_eq!(split.y_train.len(), 750);
        assert_eq!(split.y_test.len(), 250);

        Ok(())
    }

    #[test]
    fn test_split_is_disjoint_partition() -> Result<()> {
        // Feature value identifies the source row, so the union of the two
        // partitions must cover every row exactly once.
        let file = create_large_csv(40)?;
        let dataset = Dataset::from_csv(file.path())?;

        let split = dataset.train_test_split(0.25, 7)?;
        let mut seen: Vec<i64> = split
            .x_train
            .iter()
            .chain(split.x_test.iter())
            .map(|row| row[0] as i64)
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..40).collect::<Vec<_>>());

        Ok(())
    }

    #[test]
    fn test_split_rejects_bad_fraction() -> Result<()> {
        let file = create_test_csv()?;
        let dataset = Dataset::from_csv(file.path())?;

        assert!(dataset.train_test_split(0.0, 1).is_err());
        assert!(dataset.train_test_split(1.0, 1).is_err());
        assert!(dataset.train_test_split(-0.5, 1).is_err());

        Ok(())
    }

    #[test]
    fn test_eval_table_roundtrip() -> Result<()> {
        let names = vec!["a".to_string(), "b".to_string()];
        let features = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        let targets = vec![5.0, 6.0];

        let table = EvalTable::from_features_and_targets(&names, &features, TARGET_COLUMN, &targets)?;
        assert_eq!(table.columns, vec!["a", "b", "quality"]);
        assert_eq!(table.rows[0], vec![1.0, 2.0, 5.0]);

        let (x, y) = table.split_on_target(TARGET_COLUMN)?;
        assert_eq!(x, features);
        assert_eq!(y, targets);

        Ok(())
    }

    #[test]
    fn test_eval_table_misaligned_rejected() {
        let names = vec!["a".to_string()];
        let features = vec![vec![1.0]];
        let targets = vec![5.0, 6.0];

        assert!(
            EvalTable::from_features_and_targets(&names, &features, TARGET_COLUMN, &targets)
                .is_err()
        );
    }
}
