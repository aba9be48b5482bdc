//! One-shot question answering from the command line.
//!
//! Runs the same exchange as the chat page: generate an answer, persist the
//! turn, print it. A failed generation prints the error and saves nothing.

use anyhow::Result;

use crate::config::Config;
use crate::controller::PageController;

/// Run the ask command and print the saved turn.
pub async fn run_ask(config: &Config, question: &str) -> Result<()> {
    let controller = PageController::from_config(config).await?;

    let result = controller.ask(question).await;
    controller.store().close().await;
    let turn = result?;

    println!("Q: {}", turn.question);
    println!("A: {}", turn.answer);
    println!();
    println!(
        "Saved as turn #{}. Rate it with: qachat feedback {} positive",
        turn.id, turn.id
    );
    Ok(())
}
