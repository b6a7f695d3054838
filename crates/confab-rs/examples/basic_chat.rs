//! Minimal chat example — a conversation loop with automatic compaction.
//!
//! Sends a few user turns, prints each reply, and shows the token ledger
//! and estimated cost at the end. With the default threshold (10) nothing
//! compacts here; lower it to watch summaries appear.
//!
//! # Usage
//!
//! ```bash
//! OPENROUTER_KEY=sk-... cargo run --example basic_chat
//! ```

use confab_rs::prelude::*;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), String> {
    // 1. Create the backend.
    let api_key = std::env::var("OPENROUTER_KEY")
        .map_err(|_| "Set OPENROUTER_KEY env var to your OpenRouter API key")?;
    let backend = OpenRouterBackend::new(api_key, "anthropic/claude-sonnet-4")
        .map_err(|e| e.to_string())?;

    // 2. Configure the conversation.
    let config = ChatConfig::new("anthropic/claude-sonnet-4")
        .with_system_prompt("You are a helpful assistant. Be concise.")
        .with_temperature(0.7);

    let mut chat = ChatManager::new(Arc::new(backend), config);

    // 3. Run a few exchanges.
    for prompt in [
        "What is ownership in Rust?",
        "How does borrowing relate to it?",
        "Give me a one-line summary of both.",
    ] {
        println!("> {prompt}");
        match chat.submit(prompt).await {
            Ok(Some(reply)) => println!("{}\n", reply.content),
            Ok(None) => {}
            Err(e) => eprintln!("exchange failed: {e}\n"),
        }
    }

    // 4. Print the ledger.
    let totals = chat.token_totals();
    println!(
        "--- {} messages | {} | ${:.4} ---",
        chat.log().len(),
        totals.summary(),
        chat.estimated_cost(),
    );

    Ok(())
}
