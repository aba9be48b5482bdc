//! `accuracy-check`: verifies the offline classifier against the test set.
//!
//! Reads `models/titanic_model.json` and `data/test.csv` relative to the
//! working directory. Exits 0 when accuracy is above 0.8 and inference takes
//! less than 2 seconds; otherwise prints the failing value and exits 1.

use std::path::Path;

use qa_chat::check::{self, DATA_PATH, MODEL_PATH};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let report = check::run_check(Path::new(MODEL_PATH), Path::new(DATA_PATH))?;
    println!(
        "ok: accuracy {} over {} rows, inference {:.4}s",
        report.accuracy,
        report.rows,
        report.inference_time.as_secs_f64()
    );
    Ok(())
}
