//! Conversation history listing and feedback recording.
//!
//! Backs `qachat history` and `qachat feedback`. Listing prints turns newest
//! first; with `--scores` each turn is scored the same way the history page
//! does it.

use anyhow::Result;

use crate::config::Config;
use crate::controller::score_history;
use crate::metrics::initialize_metrics_or_warn;
use crate::models::Feedback;
use crate::store::Store;

/// Print the most recent turns. `limit` must be at least 1 when given.
pub async fn run_history(config: &Config, limit: Option<i64>, scores: bool) -> Result<()> {
    let store = Store::open(config).await?;
    let turns = store.recent_turns(limit).await?;

    if turns.is_empty() {
        println!("No conversation history.");
        store.close().await;
        return Ok(());
    }

    let scorer = if scores {
        initialize_metrics_or_warn(&config.metrics)
    } else {
        None
    };
    let samples = match &scorer {
        Some(_) => store.list_samples().await?,
        None => Vec::new(),
    };
    store.close().await;

    let entries = score_history(scorer.as_ref(), turns, &samples);

    for entry in &entries {
        let turn = &entry.turn;
        let when = chrono::DateTime::from_timestamp(turn.created_at, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| turn.created_at.to_string());

        println!("#{}  [{}]  {}", turn.id, turn.feedback, when);
        println!("    Q: {}", turn.question);
        println!("    A: {}", turn.answer);
        if let Some(s) = &entry.scores {
            let mut line = format!("words={} relevance={:.3}", s.word_count, s.relevance);
            if let Some(bleu) = s.bleu {
                line.push_str(&format!(" bleu={:.3}", bleu));
            }
            if let Some(sim) = s.similarity {
                line.push_str(&format!(" similarity={:.3}", sim));
            }
            println!("    {}", line);
        }
        println!();
    }

    Ok(())
}

/// Record feedback on a turn. Fails if the turn does not exist.
pub async fn run_feedback(config: &Config, id: i64, value: Feedback) -> Result<()> {
    let store = Store::open(config).await?;
    let result = store.set_feedback(id, value).await;
    store.close().await;
    result?;

    println!("Turn #{} marked {}.", id, value);
    Ok(())
}
