//! Read-only train/test split shared by every optimizer of a round

use crate::error::{Result, TuneError};
use ndarray::{concatenate, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// `(x_train, y_train, x_test, y_test)`; labels are integral class ids stored as `f64`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSplit {
    x_train: Array2<f64>,
    y_train: Array1<f64>,
    x_test: Array2<f64>,
    y_test: Array1<f64>,
}

impl DataSplit {
    /// Validate shapes and wrap the four arrays
    pub fn new(
        x_train: Array2<f64>,
        y_train: Array1<f64>,
        x_test: Array2<f64>,
        y_test: Array1<f64>,
    ) -> Result<Self> {
        let split = Self {
            x_train,
            y_train,
            x_test,
            y_test,
        };
        split.validate()?;
        Ok(split)
    }

    fn validate(&self) -> Result<()> {
        if self.x_train.nrows() != self.y_train.len() {
            return Err(TuneError::ShapeError {
                expected: format!("{} training labels", self.x_train.nrows()),
                actual: format!("{} training labels", self.y_train.len()),
            });
        }
        if self.x_test.nrows() != self.y_test.len() {
            return Err(TuneError::ShapeError {
                expected: format!("{} test labels", self.x_test.nrows()),
                actual: format!("{} test labels", self.y_test.len()),
            });
        }
        if self.x_train.ncols() != self.x_test.ncols() {
            return Err(TuneError::ShapeError {
                expected: format!("{} test features", self.x_train.ncols()),
                actual: format!("{} test features", self.x_test.ncols()),
            });
        }
        if self.x_train.nrows() == 0 {
            return Err(TuneError::DataError("training split is empty".to_string()));
        }
        let finite = |v: &f64| v.is_finite();
        if !(self.x_train.iter().all(finite)
            && self.x_test.iter().all(finite)
            && self.y_train.iter().all(finite)
            && self.y_test.iter().all(finite))
        {
            return Err(TuneError::DataError("split contains non-finite values".to_string()));
        }
        Ok(())
    }

    /// Load a JSON-serialised split, re-checking its shapes
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let split: Self = serde_json::from_str(&content)?;
        split.validate()?;
        Ok(split)
    }

    /// Write the split as JSON
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }

    pub fn x_train(&self) -> &Array2<f64> {
        &self.x_train
    }

    pub fn y_train(&self) -> &Array1<f64> {
        &self.y_train
    }

    pub fn x_test(&self) -> &Array2<f64> {
        &self.x_test
    }

    pub fn y_test(&self) -> &Array1<f64> {
        &self.y_test
    }

    pub fn n_features(&self) -> usize {
        self.x_train.ncols()
    }

    pub fn n_train(&self) -> usize {
        self.x_train.nrows()
    }

    pub fn n_test(&self) -> usize {
        self.x_test.nrows()
    }

    /// Cross-validation pool: test rows followed by train rows
    pub fn merged_pool(&self) -> Result<(Array2<f64>, Array1<f64>)> {
        let x = concatenate(Axis(0), &[self.x_test.view(), self.x_train.view()])?;
        let y = concatenate(Axis(0), &[self.y_test.view(), self.y_train.view()])?;
        Ok((x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn split() -> DataSplit {
        DataSplit::new(
            array![[1.0, 2.0], [3.0, 4.0]],
            array![0.0, 1.0],
            array![[5.0, 6.0]],
            array![1.0],
        )
        .unwrap()
    }

    #[test]
    fn test_merged_pool_puts_test_rows_first() {
        let (x, y) = split().merged_pool().unwrap();
        assert_eq!(x, array![[5.0, 6.0], [1.0, 2.0], [3.0, 4.0]]);
        assert_eq!(y, array![1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_label_mismatch() {
        let result = DataSplit::new(array![[1.0]], array![0.0, 1.0], array![[1.0]], array![0.0]);
        assert!(matches!(result, Err(TuneError::ShapeError { .. })));
    }

    #[test]
    fn test_feature_mismatch() {
        let result = DataSplit::new(array![[1.0, 2.0]], array![0.0], array![[1.0]], array![0.0]);
        assert!(matches!(result, Err(TuneError::ShapeError { .. })));
    }

    #[test]
    fn test_json_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("split.json");
        split().save_json(&path).unwrap();
        assert_eq!(DataSplit::from_json_file(&path).unwrap(), split());
    }
}
