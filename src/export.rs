//! Export stored turns and sample records as JSON.
//!
//! Produces `{ "turns": [...], "samples": [...] }` with ISO-8601 timestamps,
//! suitable for offline evaluation or backups.

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use crate::config::Config;
use crate::models::{Feedback, SampleRecord};
use crate::store::Store;

#[derive(Serialize)]
struct ExportData {
    turns: Vec<ExportTurn>,
    samples: Vec<SampleRecord>,
}

#[derive(Serialize)]
struct ExportTurn {
    id: i64,
    question: String,
    answer: String,
    feedback: Feedback,
    created_at: String,
}

/// Export turns (newest first) and samples as JSON.
///
/// If `output` is `Some`, writes to that file path. Otherwise writes
/// to stdout for piping.
pub async fn run_export(config: &Config, output: Option<&Path>) -> Result<()> {
    let store = Store::open(config).await?;

    let turns = store
        .list_turns()
        .await?
        .into_iter()
        .map(|t| ExportTurn {
            id: t.id,
            question: t.question,
            answer: t.answer,
            feedback: t.feedback,
            created_at: format_ts_iso(t.created_at),
        })
        .collect::<Vec<_>>();
    let samples = store.list_samples().await?;
    store.close().await;

    let data = ExportData { turns, samples };
    let json = serde_json::to_string_pretty(&data)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(path, &json)?;
            eprintln!(
                "Exported {} turns, {} samples to {}",
                data.turns.len(),
                data.samples.len(),
                path.display()
            );
        }
        None => {
            println!("{}", json);
        }
    }

    Ok(())
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
