//! Structured verdicts from free-form model output
//!
//! The oracle is told to answer with a strict JSON object but routinely
//! wraps it in prose, markdown fences or `<answer>` tags. Extraction runs
//! an ordered list of independent matchers and parses whatever the first
//! one finds. Nothing here fails outward: anything unusable becomes the
//! [`Verdict::sentinel`].

use crate::importance::{ImportanceLevel, SCAM_SCORE};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

pub const SENTINEL_RATIONALE: &str = "Failed to parse response";
pub const MISSING_RATIONALE: &str = "Missing reasoning.";

/// Interpreted oracle answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    /// `-1` denotes a scam, otherwise `0..=1`.
    pub importance_score: f64,
    /// `0..=1`.
    pub confidence_score: f64,
    pub rationale: String,
}

impl Verdict {
    /// The zero-confidence "no actionable signal" verdict.
    #[must_use]
    pub fn sentinel() -> Self {
        Self {
            importance_score: 0.0,
            confidence_score: 0.0,
            rationale: SENTINEL_RATIONALE.to_string(),
        }
    }

    /// The tier this verdict justifies, or `None` when it is
    /// inconclusive (non-positive confidence, or a non-positive score
    /// other than the scam score).
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn decide(&self) -> Option<ImportanceLevel> {
        let score = self.importance_score;
        let confident = self.confidence_score > 0.0;
        if !score.is_finite() || !confident {
            return None;
        }
        if score == SCAM_SCORE {
            return Some(ImportanceLevel::Scam);
        }
        (score > 0.0).then(|| ImportanceLevel::from_score(score))
    }
}

/// Finds a candidate JSON object in raw text.
pub(crate) type Matcher = fn(&str) -> Option<&str>;

// The closing tag is optional: a `</answer>` stop sequence strips it
// from the reply.
static ANSWER_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<answer>\s*(\{.*?\})\s*(?:</answer>|$)").expect("valid regex")
});
static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("valid regex"));
static BARE_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)\{\s*"importance".*?\}"#).expect("valid regex"));

/// JSON object after `<answer>`, up to `</answer>` or the end of the text.
pub(crate) fn answer_tag(text: &str) -> Option<&str> {
    ANSWER_TAG
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// JSON object inside a (optionally `json`-labelled) fenced code block.
pub(crate) fn code_fence(text: &str) -> Option<&str> {
    CODE_FENCE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Any object-shaped substring opening with an `"importance"` key.
pub(crate) fn bare_object(text: &str) -> Option<&str> {
    BARE_OBJECT.find(text).map(|m| m.as_str())
}

/// Matchers for importance answers, highest priority first.
pub(crate) const IMPORTANCE_MATCHERS: [Matcher; 3] = [answer_tag, code_fence, bare_object];

/// Run `matchers` in order and return the first hit, trimmed.
pub(crate) fn first_match<'a>(text: &'a str, matchers: &[Matcher]) -> Option<&'a str> {
    matchers
        .iter()
        .find_map(|matcher| matcher(text))
        .map(str::trim)
}

#[derive(Deserialize)]
struct ImportanceAnswer {
    #[serde(default)]
    importance: f64,
    #[serde(default)]
    confidence: f64,
    #[serde(default = "missing_rationale")]
    reasoning: String,
}

fn missing_rationale() -> String {
    MISSING_RATIONALE.to_string()
}

/// Parse an importance answer out of raw oracle text.
///
/// Fields absent from an otherwise valid object default independently
/// (`0.0`, `0.0`, `"Missing reasoning."`). No match, invalid JSON, or a
/// field of the wrong type yields the sentinel.
#[must_use]
pub fn extract(raw: &str) -> Verdict {
    let Some(candidate) = first_match(raw, &IMPORTANCE_MATCHERS) else {
        debug!("No JSON object found in oracle response");
        return Verdict::sentinel();
    };

    match serde_json::from_str::<ImportanceAnswer>(candidate) {
        Ok(answer) => Verdict {
            importance_score: answer.importance,
            confidence_score: answer.confidence,
            rationale: answer.reasoning,
        },
        Err(e) => {
            debug!(error = %e, "Failed to parse oracle JSON");
            Verdict::sentinel()
        }
    }
}
