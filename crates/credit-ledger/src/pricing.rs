//! Token-to-credit conversion.

/// Micro-credits per credit unit.
pub const MICRO_PER_CREDIT: i64 = 1_000_000;

/// Exchange rate: 200,000 tokens buy 10 credit units.
pub const TOKENS_PER_TEN_CREDITS: u32 = 200_000;

/// Opening grant for a freshly created account: 10 credit units.
pub const STARTING_GRANT_MICRO: i64 = 10 * MICRO_PER_CREDIT;

/// Micro-credits per token, derived from the exchange rate.
/// 10 units / 200,000 tokens = 50 micro per token.
const MICRO_PER_TOKEN: i64 = 10 * MICRO_PER_CREDIT / TOKENS_PER_TEN_CREDITS as i64;

/// Token usage from an LLM response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Cost in micro-credits for the given token count.
///
/// Linear in token count: 200,000 tokens cost exactly 10.0 units.
pub fn cost_from_tokens(total_tokens: u32) -> i64 {
    total_tokens as i64 * MICRO_PER_TOKEN
}

/// Split a cost into two halves, one per message of an exchange.
///
/// Each half is rounded up, so the halves never sum to less than the
/// full cost.
pub fn split_cost(cost_micro: i64) -> (i64, i64) {
    let half = (cost_micro + 1) / 2;
    (half, half)
}

/// Format micro-credits as a decimal credit amount for display.
pub fn format_credits(micro: i64) -> String {
    let units = micro as f64 / MICRO_PER_CREDIT as f64;
    if units.abs() < 0.01 && micro != 0 {
        format!("{:.4}", units)
    } else {
        format!("{:.2}", units)
    }
}
