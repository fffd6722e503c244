use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SCORE_MARKER: Regex =
        Regex::new(r"(?i)SCORE:\s*(\d+\.?\d*)").expect("score pattern is valid");
}

/// Extract the score from a critique.
///
/// Looks for the first `SCORE:` marker (case-insensitive) followed by a
/// decimal number. Returns `None` when the model ignored the format.
/// Values are not clamped: a model that writes `SCORE: 15` yields `15.0`.
pub fn parse_score(analysis: &str) -> Option<f64> {
    SCORE_MARKER
        .captures(analysis)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Sentinel projection of [`parse_score`]: a missing score becomes `0.0`.
pub fn parse_score_or_zero(analysis: &str) -> f64 {
    parse_score(analysis).unwrap_or(0.0)
}
