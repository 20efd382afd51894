//! Structured AI analysis result attached to a resume record.
//!
//! Parsing is strict: the model's reply must be valid JSON matching this
//! shape, and every score must land in [0, 100]. Malformed payloads are
//! terminal errors — never coerced, never clamped.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound for the overall score and every category score.
pub const MAX_SCORE: u32 = 100;

#[derive(Debug, Error)]
pub enum FeedbackParseError {
    #[error("feedback was not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{section} score {score} is out of range (0-100)")]
    ScoreOutOfRange { section: &'static str, score: u32 },
}

/// Full analysis result: one aggregate score plus five fixed categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub overall_score: u32,
    #[serde(rename = "ATS")]
    pub ats: CategoryFeedback,
    pub tone_and_style: CategoryFeedback,
    pub content: CategoryFeedback,
    pub structure: CategoryFeedback,
    pub skills: CategoryFeedback,
}

/// One scored dimension with its ordered tips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryFeedback {
    pub score: u32,
    pub tips: Vec<Tip>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tip {
    #[serde(rename = "type")]
    pub kind: TipKind,
    pub tip: String,
    /// Longer rationale; the ATS category usually omits it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipKind {
    Good,
    Improve,
}

impl Feedback {
    fn check_scores(&self) -> Result<(), FeedbackParseError> {
        let sections = [
            ("overallScore", self.overall_score),
            ("ATS", self.ats.score),
            ("toneAndStyle", self.tone_and_style.score),
            ("content", self.content.score),
            ("structure", self.structure.score),
            ("skills", self.skills.score),
        ];
        for (section, score) in sections {
            if score > MAX_SCORE {
                return Err(FeedbackParseError::ScoreOutOfRange { section, score });
            }
        }
        Ok(())
    }
}

/// Parses the model's feedback text into a validated [`Feedback`].
pub fn parse_feedback(text: &str) -> Result<Feedback, FeedbackParseError> {
    let feedback: Feedback = serde_json::from_str(strip_json_fences(text))?;
    feedback.check_scores()?;
    Ok(feedback)
}

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}
