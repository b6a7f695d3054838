//! Comparison example — one query fanned out to three models at once.
//!
//! Each backend runs concurrently; results come back in configuration
//! order with latency and token counts, followed by a synthesized verdict.
//!
//! # Usage
//!
//! ```bash
//! OPENROUTER_KEY=sk-... cargo run --example compare_backends
//! ```

use confab_rs::prelude::*;
use std::sync::Arc;

fn descriptor(api_key: &str, id: &str, name: &str, model: &str) -> Result<BackendDescriptor, String> {
    let backend = OpenRouterBackend::new(api_key, model).map_err(|e| e.to_string())?;
    Ok(BackendDescriptor::new(id, name, Arc::new(backend)))
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let api_key = std::env::var("OPENROUTER_KEY")
        .map_err(|_| "Set OPENROUTER_KEY env var to your OpenRouter API key")?;

    // 1. Configure the comparison targets.
    let backends = vec![
        descriptor(&api_key, "sonnet", "Claude Sonnet", "anthropic/claude-sonnet-4")?,
        descriptor(&api_key, "gpt-4o", "GPT-4o", "openai/gpt-4o")?,
        descriptor(&api_key, "flash", "Gemini Flash", "google/gemini-2.0-flash-001")?,
    ];

    // 2. The synthesizer judges the aggregate; any backend works.
    let synthesizer =
        OpenRouterBackend::new(&api_key, "anthropic/claude-sonnet-4").map_err(|e| e.to_string())?;
    let mut comparator = Comparator::new(Arc::new(synthesizer));

    // 3. Run the comparison.
    let Some(run) = comparator
        .compare("Explain the borrow checker in two sentences.", &backends)
        .await
    else {
        return Err("empty query".into());
    };

    // 4. Print per-backend results, then the verdict.
    for result in run.results() {
        match (&result.response_text, &result.error) {
            (Some(text), _) => println!(
                "[{}] {:.2}s, {} in / {} out\n{text}\n",
                result.display_name,
                result.latency.as_secs_f64(),
                result.input_tokens,
                result.output_tokens,
            ),
            (None, Some(error)) => println!("[{}] failed: {error}\n", result.display_name),
            (None, None) => {}
        }
    }
    println!("=== Synthesis ===\n{}", run.synthesis().unwrap_or(""));

    Ok(())
}
