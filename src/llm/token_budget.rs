//! Static per-model token-budget table (spec §4.5 "Token budgets per model
//! are fetched from a static table").

const DEFAULT_BUDGET: usize = 128_000;

const MODEL_BUDGETS: &[(&str, usize)] = &[
    ("gpt-4o", 128_000),
    ("gpt-4o-mini", 128_000),
    ("gpt-4-turbo", 128_000),
    ("gpt-4", 8_192),
    ("gpt-3.5-turbo", 16_385),
    ("claude-3-5-sonnet-20241022", 200_000),
    ("claude-3-5-haiku-20241022", 200_000),
    ("claude-3-opus-20240229", 200_000),
];

pub fn budget_for_model(model: &str) -> usize {
    MODEL_BUDGETS
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, budget)| *budget)
        .unwrap_or(DEFAULT_BUDGET)
}

/// Requests whose prompt exceeds `limit - reserved_output` fail fast rather
/// than risk server-side truncation (spec §4.5).
pub fn reserved_output_tokens(max_output_tokens: u32) -> usize {
    max_output_tokens as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_model_returns_its_budget() {
        assert_eq!(budget_for_model("gpt-4"), 8_192);
    }

    #[test]
    fn unknown_model_falls_back_to_default() {
        assert_eq!(budget_for_model("some-future-model"), DEFAULT_BUDGET);
    }
}
