//! Ratio ↔ token quantization.
//!
//! Controllers search a bounded integer space: a pruning ratio in `[0, 1)`
//! becomes a token in `[0, 100)` at a quantum of 0.01. The mapping floors,
//! so `token_to_ratio(ratio_to_token(r)) <= r` and the gap is below one
//! quantum.

/// Quantized pruning ratio.
pub type Token = u32;

/// Ratio represented by one token step.
pub const RATIO_QUANTUM: f64 = 0.01;

/// Largest valid token (ratio 0.99).
pub const MAX_TOKEN: Token = 99;

// Dividing by 100 gives the correctly rounded decimal (35 -> 0.35), which
// multiplying by 0.01 does not.
const TOKENS_PER_UNIT: f64 = 100.0;

/// Convert a ratio to its token: the largest token whose ratio does not
/// exceed `ratio`. NaN and negatives map to 0; ratios at or above 1.0 clamp
/// to [`MAX_TOKEN`].
pub fn ratio_to_token(ratio: f64) -> Token {
    if ratio.is_nan() || ratio <= 0.0 {
        return 0;
    }
    // `ratio / RATIO_QUANTUM` can land on either side of an integer, so
    // start one step high and walk down to the floor.
    let mut token = ((ratio / RATIO_QUANTUM).floor() as Token).saturating_add(1).min(MAX_TOKEN);
    while token > 0 && token_to_ratio(token) > ratio {
        token -= 1;
    }
    token
}

/// Convert a token back to the ratio it stands for.
pub fn token_to_ratio(token: Token) -> f64 {
    f64::from(token) / TOKENS_PER_UNIT
}

pub fn ratios_to_tokens(ratios: &[f64]) -> Vec<Token> {
    ratios.iter().map(|&r| ratio_to_token(r)).collect()
}

pub fn tokens_to_ratios(tokens: &[Token]) -> Vec<f64> {
    tokens.iter().map(|&t| token_to_ratio(t)).collect()
}
