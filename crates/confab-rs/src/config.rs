//! Dependency-injected configuration for conversations.
//!
//! There is no process-wide settings singleton: a [`ChatConfig`] is built
//! once and handed to the [`ChatManager`](crate::chat::ChatManager) at
//! construction time. Defaults are sensible; override what you need through
//! the builder methods.
//!
//! ```ignore
//! let config = ChatConfig::new("anthropic/claude-sonnet-4")
//!     .with_system_prompt("You are a helpful assistant.")
//!     .with_temperature(0.7)
//!     .with_compaction_threshold(10);
//! ```

use crate::api::InvokeOptions;
use crate::chat::compaction::CompactionConfig;

// ── Pricing ────────────────────────────────────────────────────────

/// Per-model pricing for cost estimation (USD per 1M tokens).
#[derive(Debug, Clone, Copy)]
pub struct ModelPricing {
    /// Price per 1M input tokens.
    pub input_per_million: f64,
    /// Price per 1M output tokens.
    pub output_per_million: f64,
}

impl ModelPricing {
    /// Estimate cost for given token counts.
    pub fn estimate_cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 / 1_000_000.0) * self.input_per_million
            + (output_tokens as f64 / 1_000_000.0) * self.output_per_million
    }
}

impl Default for ModelPricing {
    fn default() -> Self {
        // Mid-range estimate for unknown models.
        Self {
            input_per_million: 3.0,
            output_per_million: 15.0,
        }
    }
}

/// Lookup approximate pricing for a model by name.
///
/// Matches on the model name segment after the last `/` in paths like
/// `"anthropic/claude-sonnet-4"` to avoid false positives from org prefixes.
/// These don't need to be exact — cost display is an estimate, not billing.
pub fn pricing_for_model(model: &str) -> ModelPricing {
    let name = model.rsplit('/').next().unwrap_or(model).to_lowercase();

    if name.contains("opus") {
        ModelPricing {
            input_per_million: 15.0,
            output_per_million: 75.0,
        }
    } else if name.contains("sonnet") {
        ModelPricing {
            input_per_million: 3.0,
            output_per_million: 15.0,
        }
    } else if name.contains("haiku") {
        ModelPricing {
            input_per_million: 0.25,
            output_per_million: 1.25,
        }
    } else if name.contains("gpt-4o-mini") || name.contains("4o-mini") {
        ModelPricing {
            input_per_million: 0.15,
            output_per_million: 0.60,
        }
    } else if name.contains("gpt-4o") || name.contains("gpt-4") {
        ModelPricing {
            input_per_million: 2.50,
            output_per_million: 10.0,
        }
    } else if name.contains("gemini") && name.contains("flash") {
        ModelPricing {
            input_per_million: 0.075,
            output_per_million: 0.30,
        }
    } else if name.contains("gemini") {
        ModelPricing {
            input_per_million: 1.25,
            output_per_million: 5.0,
        }
    } else if name.contains("deepseek") {
        ModelPricing {
            input_per_million: 0.27,
            output_per_million: 1.10,
        }
    } else {
        ModelPricing::default()
    }
}

// ── Chat configuration ─────────────────────────────────────────────

/// Configuration for one conversation.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Model identifier, used for logging and pricing lookup.
    pub model: String,
    /// System prompt applied to every exchange.
    pub system_prompt: Option<String>,
    /// Sampling temperature for exchanges.
    pub temperature: Option<f32>,
    /// Cap on generated tokens per exchange.
    pub max_output_tokens: Option<u32>,
    /// Compaction policy.
    pub compaction: CompactionConfig,
    /// Pricing used for cost estimates.
    pub pricing: ModelPricing,
}

impl ChatConfig {
    /// Create a config for `model` with default compaction policy and
    /// pricing looked up from the model name.
    pub fn new(model: impl Into<String>) -> Self {
        let model = model.into();
        let pricing = pricing_for_model(&model);
        Self {
            model,
            system_prompt: None,
            temperature: None,
            max_output_tokens: None,
            compaction: CompactionConfig::default(),
            pricing,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature.clamp(0.0, 1.0));
        self
    }

    pub fn with_max_output_tokens(mut self, max: u32) -> Self {
        self.max_output_tokens = Some(max);
        self
    }

    /// Override the number of non-summary messages that triggers compaction.
    pub fn with_compaction_threshold(mut self, threshold: usize) -> Self {
        self.compaction.threshold = threshold;
        self
    }

    pub fn with_pricing(mut self, pricing: ModelPricing) -> Self {
        self.pricing = pricing;
        self
    }

    /// Per-exchange invocation options derived from this config.
    pub fn invoke_options(&self) -> InvokeOptions {
        InvokeOptions {
            system_prompt: self.system_prompt.clone(),
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
        }
    }
}
