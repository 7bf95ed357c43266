//! Static model pricing, used when the provider reports no cost itself.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::Utc;

use contentcurator_shared::{ModelOption, OperationCostInfo, OperationKind};

/// USD per million tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    pub input: f64,
    pub output: f64,
}

/// Key of the entry used for models missing from the table.
pub const DEFAULT_PRICING_KEY: &str = "default";

static PRICING: LazyLock<HashMap<&'static str, ModelPricing>> = LazyLock::new(|| {
    HashMap::from([
        ("anthropic/claude-opus-4", ModelPricing { input: 15.0, output: 75.0 }),
        ("anthropic/claude-sonnet-4", ModelPricing { input: 3.0, output: 15.0 }),
        ("anthropic/claude-3-5-haiku", ModelPricing { input: 0.8, output: 4.0 }),
        ("openai/gpt-4o", ModelPricing { input: 2.5, output: 10.0 }),
        ("openai/gpt-4o-mini", ModelPricing { input: 0.15, output: 0.6 }),
        (DEFAULT_PRICING_KEY, ModelPricing { input: 3.0, output: 15.0 }),
    ])
});

impl ModelPricing {
    /// Pricing for `"<provider>/<model>"`, falling back to the default entry.
    pub fn for_key(key: &str) -> Self {
        PRICING
            .get(key)
            .or_else(|| PRICING.get(DEFAULT_PRICING_KEY))
            .copied()
            .unwrap_or(ModelPricing { input: 0.0, output: 0.0 })
    }

    pub fn for_model(model: &ModelOption) -> Self {
        Self::for_key(&model.key())
    }

    /// USD cost of a request.
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 * self.input + output_tokens as f64 * self.output) / 1_000_000.0
    }
}

/// Rough token count for text the provider did not meter (four characters per token).
pub fn estimate_tokens(text: &str) -> u64 {
    text.chars().count().div_ceil(4) as u64
}

/// Build a cost record, pricing the request from the table when `cost` is `None`.
pub fn operation_cost(
    operation: OperationKind,
    model: &ModelOption,
    input_tokens: u64,
    output_tokens: u64,
    cost: Option<f64>,
) -> OperationCostInfo {
    let cost = cost.unwrap_or_else(|| ModelPricing::for_model(model).cost(input_tokens, output_tokens));
    OperationCostInfo {
        operation,
        cost,
        provider: model.provider.clone(),
        model: model.model.clone(),
        input_tokens,
        output_tokens,
        timestamp: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_and_unknown_models() {
        let sonnet = ModelPricing::for_key("anthropic/claude-sonnet-4");
        assert_eq!(sonnet.input, 3.0);
        let unknown = ModelPricing::for_key("acme/mystery-1");
        assert_eq!(unknown, ModelPricing::for_key(DEFAULT_PRICING_KEY));
    }

    #[test]
    fn cost_per_million() {
        let pricing = ModelPricing { input: 3.0, output: 15.0 };
        let cost = pricing.cost(1_000_000, 100_000);
        assert!((cost - 4.5).abs() < 1e-9);
    }

    #[test]
    fn token_estimate() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn explicit_cost_wins() {
        let model = ModelOption::new("anthropic", "claude-opus-4");
        let op = operation_cost(OperationKind::Review, &model, 1000, 1000, Some(0.01));
        assert_eq!(op.cost, 0.01);
        let priced = operation_cost(OperationKind::Review, &model, 1_000_000, 0, None);
        assert_eq!(priced.cost, 15.0);
    }
}
