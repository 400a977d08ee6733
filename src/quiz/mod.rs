pub mod bank;
pub mod countdown;
pub mod generator;
pub mod registry;
pub mod session;

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use bank::QuestionBank;
pub use generator::{LlmQuestionSource, QuestionOrigin, QuestionSet, QuestionSource, build_question_set};
pub use registry::QuizRegistry;
pub use session::{QuizPhase, QuizSession, QuizSummary, SessionView};

pub const OPTION_COUNT: usize = 4;
pub const DEFAULT_QUESTION_COUNT: usize = 10;
pub const MAX_QUESTION_COUNT: usize = 20;
pub const DEFAULT_QUESTION_SECONDS: u32 = 30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// Weight applied to the percentage when computing the total score.
    pub fn factor(&self) -> f64 {
        match self {
            Difficulty::Easy => 1.0,
            Difficulty::Medium => 2.0,
            Difficulty::Hard => 3.0,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = QuizError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(QuizError::UnknownDifficulty(other.to_string())),
        }
    }
}

/// A multiple-choice question as issued to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: String,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    pub explanation: String,
    pub category: String,
    pub difficulty: Difficulty,
}

impl QuizQuestion {
    pub fn is_correct(&self, option: usize) -> bool {
        option == self.correct_index
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuizError {
    #[error("unknown difficulty `{0}`")]
    UnknownDifficulty(String),
    #[error("quiz has no questions")]
    EmptyQuestionSet,
    #[error("quiz is in the {actual} phase, expected {expected}")]
    WrongPhase {
        expected: QuizPhase,
        actual: QuizPhase,
    },
    #[error("option {0} is out of range")]
    InvalidOption(usize),
    #[error("answer already submitted")]
    AlreadySubmitted,
    #[error("answer not submitted yet")]
    NotSubmitted,
    #[error("quiz session not found")]
    SessionNotFound,
}

/// Loose shape accepted from the completion endpoint. Field names vary between
/// models, so the common aliases are folded in here and validated afterwards.
#[derive(Debug, Deserialize)]
struct GeneratedPayload {
    #[serde(default)]
    questions: Vec<GeneratedQuestion>,
}

#[derive(Debug, Deserialize)]
struct GeneratedQuestion {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default, alias = "question")]
    prompt: Option<String>,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default, alias = "correctIndex", alias = "correct_answer", alias = "correctAnswer")]
    correct_index: Option<usize>,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

/// Parses the completion text into validated questions.
///
/// Returns an error when the text is not a JSON object carrying a `questions`
/// array; individual malformed entries are dropped instead.
pub fn parse_generated_questions(
    text: &str,
    difficulty: Difficulty,
) -> anyhow::Result<Vec<QuizQuestion>> {
    let body = strip_code_fence(text);
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|err| anyhow::anyhow!("completion is not valid JSON: {err}"))?;

    if !value.get("questions").is_some_and(|q| q.is_array()) {
        anyhow::bail!("completion JSON has no `questions` array");
    }

    let payload: GeneratedPayload = serde_json::from_value(value)
        .map_err(|err| anyhow::anyhow!("unexpected question payload: {err}"))?;

    Ok(payload
        .questions
        .into_iter()
        .filter_map(|raw| validate_generated(raw, difficulty))
        .collect())
}

fn validate_generated(raw: GeneratedQuestion, difficulty: Difficulty) -> Option<QuizQuestion> {
    let prompt = raw.prompt?.trim().to_string();
    if prompt.is_empty() {
        return None;
    }

    let options: Vec<String> = raw
        .options
        .into_iter()
        .map(|option| option.trim().to_string())
        .collect();
    if options.len() != OPTION_COUNT || options.iter().any(|option| option.is_empty()) {
        return None;
    }

    let correct_index = raw.correct_index.filter(|index| *index < OPTION_COUNT)?;

    let id = match raw.id {
        Some(serde_json::Value::String(id)) if !id.trim().is_empty() => id,
        Some(serde_json::Value::Number(n)) => format!("ai-{n}"),
        _ => format!("ai-{}", Uuid::new_v4()),
    };

    Some(QuizQuestion {
        id,
        prompt,
        options,
        correct_index,
        explanation: raw.explanation.unwrap_or_default().trim().to_string(),
        category: raw
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "general".to_string()),
        // Issued at the requested level whatever label the model attached.
        difficulty,
    })
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
pub(crate) fn sample_question(id: &str, correct_index: usize, difficulty: Difficulty) -> QuizQuestion {
    QuizQuestion {
        id: id.to_string(),
        prompt: format!("Question {id}"),
        options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
        correct_index,
        explanation: format!("Because {id}"),
        category: "tradition".to_string(),
        difficulty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_parses_case_insensitively() {
        assert_eq!("HARD".parse::<Difficulty>(), Ok(Difficulty::Hard));
        assert_eq!(" easy ".parse::<Difficulty>(), Ok(Difficulty::Easy));
        assert!("expert".parse::<Difficulty>().is_err());
    }

    #[test]
    fn parses_fenced_payload_and_drops_invalid_entries() {
        let text = r#"```json
{"questions": [
  {"id": 1, "question": "Which island hosts Borobudur?", "options": ["Java", "Bali", "Sumatra", "Borneo"], "correctAnswer": 0, "explanation": "Central Java.", "category": "architecture"},
  {"prompt": "Only three options", "options": ["a", "b", "c"], "correct_index": 1},
  {"prompt": "Index out of range", "options": ["a", "b", "c", "d"], "correct_index": 4}
]}
```"#;
        let questions = parse_generated_questions(text, Difficulty::Easy).expect("parse");
        assert_eq!(questions.len(), 1);
        let first = &questions[0];
        assert_eq!(first.id, "ai-1");
        assert_eq!(first.correct_index, 0);
        assert_eq!(first.difficulty, Difficulty::Easy);
        assert_eq!(first.category, "architecture");
    }

    #[test]
    fn rejects_non_json_and_missing_array() {
        assert!(parse_generated_questions("Sure! Here are some questions:", Difficulty::Medium).is_err());
        assert!(parse_generated_questions(r#"{"items": []}"#, Difficulty::Medium).is_err());
    }
}
