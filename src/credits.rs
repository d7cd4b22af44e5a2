//! Credit metering.
//!
//! Converts token usage for a single AI call into an integer number of
//! billable credits. Every function here is pure: no I/O, no shared state.

use serde::{Deserialize, Serialize};

/// Flat charge added whenever web search was enabled, on any provider.
pub const WEB_SEARCH_SURCHARGE: u64 = 3;

/// Every call costs at least this much.
pub const MINIMUM_CHARGE: u64 = 1;

/// Credits per 1000 tokens for one provider/model pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateCard {
    pub provider: &'static str,
    pub model: &'static str,
    pub input_per_1k: u64,
    pub output_per_1k: u64,
    /// Only billed when extended thinking was enabled.
    pub thinking_per_1k: u64,
}

pub const RATE_CARDS: &[RateCard] = &[
    RateCard {
        provider: "openai-mini",
        model: "gpt-4o-mini",
        input_per_1k: 1,
        output_per_1k: 4,
        thinking_per_1k: 0,
    },
    RateCard {
        provider: "openai-full",
        model: "gpt-4o",
        input_per_1k: 3,
        output_per_1k: 6,
        thinking_per_1k: 0,
    },
    RateCard {
        provider: "claude-standard",
        model: "claude-3-sonnet",
        input_per_1k: 3,
        output_per_1k: 15,
        thinking_per_1k: 3,
    },
];

/// Usage facts for one call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostInput {
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub thinking_tokens: u64,
    #[serde(default)]
    pub web_search: bool,
    #[serde(default)]
    pub extended_thinking: bool,
}

/// Find the rate card for an exact provider/model pair.
pub fn rate_card(provider: &str, model: &str) -> Option<&'static RateCard> {
    RATE_CARDS
        .iter()
        .find(|card| card.provider == provider && card.model == model)
}

/// `ceil(tokens * rate / 1000)`, saturating on overflow.
fn per_thousand(tokens: u64, rate: u64) -> u64 {
    tokens.saturating_mul(rate).div_ceil(1000)
}

impl RateCard {
    /// Cost before surcharges and the minimum-charge floor.
    pub fn base_cost(&self, input: &CostInput) -> u64 {
        let mut cost = per_thousand(input.input_tokens, self.input_per_1k)
            .saturating_add(per_thousand(input.output_tokens, self.output_per_1k));

        if input.extended_thinking && input.thinking_tokens > 0 {
            cost = cost.saturating_add(per_thousand(input.thinking_tokens, self.thinking_per_1k));
        }

        cost
    }
}

/// Compute the credit charge for one call.
///
/// Unknown provider/model pairs have a base cost of zero and are charged the
/// minimum.
pub fn credit_cost(input: &CostInput) -> u64 {
    let base = rate_card(&input.provider, &input.model)
        .map(|card| card.base_cost(input))
        .unwrap_or(0);

    let surcharge = if input.web_search {
        WEB_SEARCH_SURCHARGE
    } else {
        0
    };

    base.saturating_add(surcharge).max(MINIMUM_CHARGE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(provider: &str, model: &str, input: u64, output: u64) -> CostInput {
        CostInput {
            provider: provider.to_string(),
            model: model.to_string(),
            input_tokens: input,
            output_tokens: output,
            ..Default::default()
        }
    }

    #[test]
    fn test_mini_cost() {
        // ceil(1000/1000) + ceil(500*4/1000) = 1 + 2
        assert_eq!(credit_cost(&usage("openai-mini", "gpt-4o-mini", 1000, 500)), 3);
    }

    #[test]
    fn test_full_cost_rounds_each_term_up() {
        // ceil(100*3/1000) + ceil(100*6/1000) = 1 + 1
        assert_eq!(credit_cost(&usage("openai-full", "gpt-4o", 100, 100)), 2);
        // ceil(2000*3/1000) + ceil(1500*6/1000) = 6 + 9
        assert_eq!(credit_cost(&usage("openai-full", "gpt-4o", 2000, 1500)), 15);
    }

    #[test]
    fn test_claude_with_extended_thinking() {
        let mut input = usage("claude-standard", "claude-3-sonnet", 2000, 1000);
        input.extended_thinking = true;
        input.thinking_tokens = 500;
        // 6 + 15 + ceil(500*3/1000)
        assert_eq!(credit_cost(&input), 23);
    }

    #[test]
    fn test_thinking_tokens_ignored_without_flag() {
        let mut input = usage("claude-standard", "claude-3-sonnet", 2000, 1000);
        input.thinking_tokens = 500;
        assert_eq!(credit_cost(&input), 21);
    }

    #[test]
    fn test_zero_usage_hits_floor() {
        assert_eq!(credit_cost(&usage("openai-mini", "gpt-4o-mini", 0, 0)), 1);
    }

    #[test]
    fn test_unknown_pair_charges_minimum() {
        assert_eq!(credit_cost(&usage("openai-mini", "gpt-4o", 50_000, 50_000)), 1);
        assert_eq!(credit_cost(&usage("mystery", "model-x", 10, 10)), 1);
    }

    #[test]
    fn test_web_search_surcharge_is_exactly_three() {
        let cases = [
            usage("openai-mini", "gpt-4o-mini", 0, 0),
            usage("openai-mini", "gpt-4o-mini", 1234, 567),
            usage("openai-full", "gpt-4o", 999, 1),
            usage("claude-standard", "claude-3-sonnet", 4000, 3000),
            usage("unknown", "unknown", 100, 100),
        ];
        for case in cases {
            let mut with_search = case.clone();
            with_search.web_search = true;
            assert_eq!(
                credit_cost(&with_search) - credit_cost(&case),
                WEB_SEARCH_SURCHARGE,
                "surcharge mismatch for {:?}",
                case
            );
        }
    }

    #[test]
    fn test_floor_holds_for_all_flag_combinations() {
        for card in RATE_CARDS {
            for &web_search in &[false, true] {
                for &extended_thinking in &[false, true] {
                    for &tokens in &[0u64, 1, 999, 1000, 1001] {
                        let input = CostInput {
                            provider: card.provider.to_string(),
                            model: card.model.to_string(),
                            input_tokens: tokens,
                            output_tokens: tokens,
                            thinking_tokens: tokens,
                            web_search,
                            extended_thinking,
                        };
                        assert!(credit_cost(&input) >= MINIMUM_CHARGE);
                    }
                }
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let mut input = usage("claude-standard", "claude-3-sonnet", 777, 333);
        input.web_search = true;
        input.extended_thinking = true;
        input.thinking_tokens = 42;
        assert_eq!(credit_cost(&input), credit_cost(&input));
    }

    #[test]
    fn test_huge_token_counts_saturate() {
        let input = usage("claude-standard", "claude-3-sonnet", u64::MAX, u64::MAX);
        assert!(credit_cost(&input) > 0);
    }

    #[test]
    fn test_rate_card_lookup_is_exact() {
        assert!(rate_card("openai-full", "gpt-4o").is_some());
        assert!(rate_card("openai-full", "GPT-4o").is_none());
    }
}
