//! Classification prompts
//!
//! A [`Prompt`] knows how to render itself for the oracle and how to
//! read the oracle's answer back into a [`Verdict`].

use crate::importance::SCAM_SCORE;
use crate::message::NormalizedMessage;
use crate::verdict::{self, MISSING_RATIONALE, Verdict};
use serde::Deserialize;
use tracing::debug;

/// Body characters included in the importance prompt.
const BODY_PREVIEW_CHARS: usize = 500;

pub trait Prompt {
    /// The full text sent to the oracle.
    fn render(&self) -> String;

    /// Interpret the oracle's raw answer. Never fails; unusable output
    /// yields [`Verdict::sentinel`].
    fn interpret(&self, raw: &str) -> Verdict;
}

/// Scores how important a message is to its owner (`0.0..=1.0`).
#[derive(Debug, Clone, Copy)]
pub struct ImportancePrompt<'a> {
    message: &'a NormalizedMessage,
}

impl<'a> ImportancePrompt<'a> {
    #[must_use]
    pub const fn new(message: &'a NormalizedMessage) -> Self {
        Self { message }
    }
}

const IMPORTANCE_INSTRUCTION: &str = "\
CRITICAL: You MUST respond with ONLY the exact JSON format specified below. \
Do NOT add any other fields, explanations, or text outside the JSON.

Your task: Assign an importance score (0.0-1.0) to this email for an individual person.

Scoring Guidelines:
- HIGH (0.8-1.0): Security alerts, account notifications, direct human communication, medical/legal info, calendar invites, job applications
- MEDIUM (0.4-0.79): Order confirmations, shipping updates, expiring EXISTING paid services/memberships, appointment reminders
- LOW (0.0-0.39): All marketing, promotions, newsletters, deals, offers, advertisements, bulk emails

CRITICAL DISTINCTION:
- Expiring membership you ALREADY pay for (gym, subscription) = MEDIUM
- Promotional offer to JOIN something new = LOW

STRICT RULES:
1. ANY email with promotional keywords (deals, discount, offer, sale, limited time, promo code, bonus points, low stock, savings, % off) = LOW importance
2. Emails about YOUR EXISTING paid services expiring = MEDIUM importance
3. Promotional offers to join/buy NEW services = LOW importance
4. If the primary purpose is to sell or promote anything = LOW importance, even if personalized
5. Marketing emails disguised as urgent alerts are still marketing = LOW importance
6. Food newsletters, event promotions, reward programs, loyalty programs = LOW importance
7. Neighborhood posts/community updates = LOW importance (not urgent personal matters)

RESPONSE FORMAT - FOLLOW EXACTLY:
{
  \"importance\": 0.XX,
  \"confidence\": 0.XX,
  \"reasoning\": \"Brief explanation\"
}

ONLY return this JSON. NO other text, fields, or explanations.";

const IMPORTANCE_EXAMPLES: &[(&str, f64, f64, &str)] = &[
    ("Promotional/Marketing (LOW)", 0.1, 0.95, "Promotional email with discount offers"),
    ("Stock Alert Marketing (LOW)", 0.1, 0.95, "Marketing email using artificial urgency about low stock"),
    ("Bonus Points Promotion (LOW)", 0.1, 0.95, "Promotional offer for loyalty program rewards"),
    ("Expiring Paid Service (MEDIUM)", 0.6, 0.90, "Notification about expiring paid membership requiring action"),
    ("Security Alert (HIGH)", 0.95, 0.98, "Account security alert requiring immediate verification"),
    ("Order Confirmation (MEDIUM)", 0.6, 0.90, "Transactional confirmation of completed purchase"),
    ("Newsletter/Food Forecast (LOW)", 0.1, 0.95, "Newsletter content with no actionable information"),
];

const IMPORTANCE_REMINDER: &str = "\
FINAL REMINDER:
Return ONLY this exact JSON structure:
{
  \"importance\": [number 0.0-1.0],
  \"confidence\": [number 0.0-1.0],
  \"reasoning\": \"[one sentence]\"
}
NO additional fields or text allowed.

REMEMBER:
- Look for promotional keywords: 'deals', 'offers', 'discount', 'limited time', 'bonus points', 'low stock', 'promo code', 'savings', '% off' = ALL LOW
- 'Join now' or 'Sign up' offers = LOW (trying to sell NEW service)
- 'Your membership expires' = MEDIUM (existing service you pay for)
- Neighborhood posts, community updates = LOW (not urgent personal matters)
- Any email trying to sell something = LOW, regardless of personalization

Evaluate now (JSON only):";

impl Prompt for ImportancePrompt<'_> {
    fn render(&self) -> String {
        let examples = IMPORTANCE_EXAMPLES
            .iter()
            .map(|(label, importance, confidence, reasoning)| {
                format!(
                    "{label}:\n{{\n  \"importance\": {importance:.2},\n  \"confidence\": {confidence:.2},\n  \"reasoning\": \"{reasoning}\"\n}}"
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        let body: String = self.message.body.chars().take(BODY_PREVIEW_CHARS).collect();

        format!(
            "{IMPORTANCE_INSTRUCTION}\n\n\
             EXAMPLES - Learn the patterns:\n\n{examples}\n\n\
             EMAIL TO EVALUATE:\n\
             From: {}\n\
             Subject: {}\n\
             Body: {body}...\n\n\
             {IMPORTANCE_REMINDER}",
            self.message.sender, self.message.subject,
        )
    }

    fn interpret(&self, raw: &str) -> Verdict {
        verdict::extract(raw)
    }
}

/// Screens a message for phishing and fraud.
///
/// A positive answer is reported as an importance score of `-1`.
#[derive(Debug, Clone, Copy)]
pub struct ScamPrompt<'a> {
    message: &'a NormalizedMessage,
}

impl<'a> ScamPrompt<'a> {
    #[must_use]
    pub const fn new(message: &'a NormalizedMessage) -> Self {
        Self { message }
    }
}

const SCAM_INSTRUCTION: &str = "\
You are a smart email security assistant designed to detect scam or phishing emails.
Your task is to classify an email as either a scam (fraudulent, phishing, deceptive) or not.

Consider an email a **scam** if it includes:
- Urgent language prompting quick action (e.g., 'act now', 'your account will be closed')
- Requests for sensitive information (passwords, bank info, OTP, SSN)
- Fake sender addresses or spoofed domains
- Unusual attachments or links to suspicious websites
- Promises of rewards, inheritances, lottery winnings, cryptocurrency giveaways
- Poor grammar, spelling, and formatting

**JSON Output Rules:**
- 'scam': 1 → Yes, this email is a scam
- 'scam': 0 → No, this email is legitimate
- Include a 'confidence' score between 0.0 and 1.0
- Explain your reasoning clearly in one sentence";

const SCAM_EXAMPLES: &str = "\
EXAMPLES:

Example 1:
From: \"Support\" <support@apple.verify-login.com>
Subject: Urgent! Confirm your Apple ID
Body: Your Apple ID has been locked. Click this link to verify your identity...

<answer>
{
  \"scam\": 1,
  \"confidence\": 0.97,
  \"reasoning\": \"Spoofed domain with phishing link requesting sensitive info.\"
}
</answer>

Example 2:
From: \"Amazon\" <auto-confirm@amazon.com>
Subject: Your order has been shipped
Body: Your order #456-123456 will arrive by Tuesday...

<answer>
{
  \"scam\": 0,
  \"confidence\": 0.93,
  \"reasoning\": \"Legitimate transactional email from a known sender with expected content.\"
}
</answer>

Example 3:
From: \"CryptoGiveaway\" <giveaway@eloncrypto.org>
Subject: You've won 5 BTC!
Body: Click now to claim your crypto prize before it expires...

<answer>
{
  \"scam\": 1,
  \"confidence\": 0.99,
  \"reasoning\": \"Too-good-to-be-true offer with suspicious domain and urgent CTA.\"
}
</answer>";

const SCAM_FORMAT: &str = "\
Respond ONLY with valid JSON wrapped in <answer> tags. No extra text.

REQUIRED FORMAT:
<answer>
{
  \"scam\": 0 or 1,
  \"confidence\": 0.XX,
  \"reasoning\": \"One clear sentence explaining your decision.\"
}
</answer>

RULES:
- scam: 0 = NOT SCAM, 1 = SCAM
- Return ONLY valid JSON inside <answer> tags
- No markdown, no explanation, just JSON";

#[derive(Deserialize)]
struct ScamAnswer {
    #[serde(default)]
    scam: f64,
    #[serde(default)]
    confidence: f64,
    #[serde(default = "missing_rationale")]
    reasoning: String,
}

fn missing_rationale() -> String {
    MISSING_RATIONALE.to_string()
}

impl Prompt for ScamPrompt<'_> {
    fn render(&self) -> String {
        format!(
            "{SCAM_INSTRUCTION}\n\n{SCAM_EXAMPLES}\n\n\
             EMAIL TO ANALYZE:\n\
             From: {}\n\
             Subject: {}\n\
             Body: {}\n\n\
             ANALYZE THE FOLLOWING EMAIL:\n{SCAM_FORMAT}",
            self.message.sender, self.message.subject, self.message.body,
        )
    }

    /// Only a tag-wrapped object is accepted.
    #[allow(clippy::float_cmp)]
    fn interpret(&self, raw: &str) -> Verdict {
        let Some(candidate) = verdict::answer_tag(raw) else {
            debug!("No <answer> block in scam screen response");
            return Verdict::sentinel();
        };

        match serde_json::from_str::<ScamAnswer>(candidate.trim()) {
            Ok(answer) => Verdict {
                importance_score: if answer.scam == 1.0 { SCAM_SCORE } else { 0.0 },
                confidence_score: answer.confidence,
                rationale: answer.reasoning,
            },
            Err(e) => {
                debug!(error = %e, "Failed to parse scam screen JSON");
                Verdict::sentinel()
            }
        }
    }
}
