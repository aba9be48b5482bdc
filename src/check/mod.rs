//! Standalone accuracy and latency check for the offline classifier.
//!
//! Loads a serialized [`Classifier`] and a labelled CSV test set, predicts
//! every row once, and verifies two thresholds: accuracy strictly above
//! [`MIN_ACCURACY`] and inference time strictly below
//! [`MAX_INFERENCE_TIME`]. The timed section covers feature extraction and
//! prediction, not file loading.
//!
//! Used by the `accuracy-check` binary. Nothing here touches the chat store.

pub mod classifier;
pub mod dataset;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info};

pub use classifier::Classifier;
pub use dataset::Table;

/// Accuracy must be strictly greater than this.
pub const MIN_ACCURACY: f64 = 0.8;
/// Inference must finish strictly faster than this.
pub const MAX_INFERENCE_TIME: Duration = Duration::from_secs(2);

/// Default artifact location, relative to the working directory.
pub const MODEL_PATH: &str = "models/titanic_model.json";
/// Default test set location, relative to the working directory.
pub const DATA_PATH: &str = "data/test.csv";
/// Name of the label column in the test set.
pub const LABEL_COLUMN: &str = "Survived";

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid classifier artifact: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid classifier artifact: {0}")]
    Artifact(String),

    #[error("test set line {line}: {message}")]
    Csv { line: usize, message: String },

    #[error("test set is missing column '{0}'")]
    MissingColumn(String),

    #[error("test set has no rows")]
    EmptyDataset,

    #[error("Accuracy too low: {0}")]
    AccuracyTooLow(f64),

    #[error("Inference too slow: {:.4}s", .0.as_secs_f64())]
    InferenceTooSlow(Duration),
}

/// Outcome of one evaluation run.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckReport {
    pub rows: usize,
    pub accuracy: f64,
    pub inference_time: Duration,
}

impl CheckReport {
    /// Applies the thresholds, accuracy first.
    pub fn verify(&self) -> Result<(), CheckError> {
        if !(self.accuracy > MIN_ACCURACY) {
            return Err(CheckError::AccuracyTooLow(self.accuracy));
        }
        if self.inference_time >= MAX_INFERENCE_TIME {
            return Err(CheckError::InferenceTooSlow(self.inference_time));
        }
        Ok(())
    }
}

/// Loads both inputs and measures the classifier against the test set.
pub fn evaluate(model_path: &Path, data_path: &Path) -> Result<CheckReport, CheckError> {
    let classifier = Classifier::load(model_path)?;
    let table = Table::load(data_path)?;
    debug!(
        rows = table.len(),
        features = classifier.feature_names.len(),
        "loaded classifier and test set"
    );
    evaluate_table(&classifier, &table)
}

pub fn evaluate_table(classifier: &Classifier, table: &Table) -> Result<CheckReport, CheckError> {
    let labels = table.labels(LABEL_COLUMN)?;

    let start = Instant::now();
    let matrix = classifier.features(table)?;
    let predictions = classifier.predict(&matrix);
    let inference_time = start.elapsed();

    Ok(CheckReport {
        rows: labels.len(),
        accuracy: accuracy(&labels, &predictions),
        inference_time,
    })
}

/// Fraction of positions where `predicted` equals `expected`.
pub fn accuracy(expected: &[i64], predicted: &[i64]) -> f64 {
    if expected.is_empty() {
        return 0.0;
    }
    let correct = expected
        .iter()
        .zip(predicted)
        .filter(|(a, b)| a == b)
        .count();
    correct as f64 / expected.len() as f64
}

/// Evaluates and verifies in one step, logging the measured values.
pub fn run_check(model_path: &Path, data_path: &Path) -> Result<CheckReport, CheckError> {
    let report = evaluate(model_path, data_path)?;
    info!(
        rows = report.rows,
        accuracy = report.accuracy,
        inference_secs = report.inference_time.as_secs_f64(),
        "evaluated classifier"
    );
    report.verify()?;
    Ok(report)
}
