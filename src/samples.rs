//! Sample record management from the command line.
//!
//! Mirrors the sample-data page: list, add, update and delete reference
//! question/answer pairs.

use anyhow::Result;

use crate::config::Config;
use crate::seed::ensure_initial_data;
use crate::store::Store;

/// A single sample-record operation.
#[derive(Debug, Clone)]
pub enum SampleCommand {
    List,
    Add { question: String, answer: String },
    Update { id: i64, question: String, answer: String },
    Delete { id: i64 },
}

/// Run one sample command against the configured store.
///
/// The seed set is installed first, so a fresh database lists the initial
/// samples rather than nothing.
pub async fn run_samples(config: &Config, command: SampleCommand) -> Result<()> {
    let store = Store::open(config).await?;
    let result = apply(&store, command).await;
    store.close().await;
    result
}

async fn apply(store: &Store, command: SampleCommand) -> Result<()> {
    ensure_initial_data(store).await?;

    match command {
        SampleCommand::List => {
            let samples = store.list_samples().await?;
            if samples.is_empty() {
                println!("No sample data.");
                return Ok(());
            }
            println!("{:<5} {:<40} ANSWER", "ID", "QUESTION");
            for s in samples {
                println!("{:<5} {:<40} {}", s.id, s.question, s.answer);
            }
        }
        SampleCommand::Add { question, answer } => {
            let id = store.insert_sample(question.trim(), answer.trim()).await?;
            println!("Added sample #{}.", id);
        }
        SampleCommand::Update {
            id,
            question,
            answer,
        } => {
            store
                .update_sample(id, question.trim(), answer.trim())
                .await?;
            println!("Updated sample #{}.", id);
        }
        SampleCommand::Delete { id } => {
            store.delete_sample(id).await?;
            println!("Deleted sample #{}.", id);
        }
    }
    Ok(())
}
