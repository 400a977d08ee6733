use std::{env, path::PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;

use crate::quiz::DEFAULT_QUESTION_SECONDS;

const MODULE_QUIZ: &str = "quiz";
const DEFAULT_QUIZ_PROMPT: &str = r#"You write multiple-choice quiz questions about Indonesian cultural heritage: regional dances, music and instruments, traditional crafts and textiles, architecture, cuisine, ceremonies and history.
Write exactly {{COUNT}} questions at {{DIFFICULTY}} difficulty. Easy questions cover widely known icons, medium questions need some familiarity with a region, hard questions concern specific techniques, terms or historical details.
Every question must have exactly four options with one correct answer, and a one or two sentence explanation of the answer. Do not repeat questions. Only state facts you are certain of.
Respond with a single JSON object and nothing else, in this shape:
{"questions": [{"id": "1", "prompt": "...", "options": ["...", "...", "...", "..."], "correct_index": 0, "explanation": "...", "category": "music", "difficulty": "{{DIFFICULTY}}"}]}
`correct_index` is the zero-based index of the correct option. `category` is one of: dance, music, craft, architecture, cuisine, tradition, performance."#;

/// Process-level settings read from the environment at boot.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub media_root: PathBuf,
    pub question_seconds: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL env var is missing")?;

        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let media_root = env::var("MEDIA_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("storage/media"));

        let question_seconds = env::var("QUIZ_QUESTION_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_QUESTION_SECONDS);

        Ok(Self {
            database_url,
            port,
            media_root,
            question_seconds,
        })
    }
}

/// Settings editable from the dashboard, stored in `module_configs`.
#[derive(Clone, Debug, Default)]
pub struct ModuleSettings {
    quiz: Option<QuizSettings>,
}

impl ModuleSettings {
    pub async fn ensure_defaults(pool: &PgPool) -> Result<()> {
        let quiz_models = serde_json::to_value(QuizModels::default())?;
        let quiz_prompts = serde_json::to_value(QuizPrompts::default())?;

        sqlx::query(
            "INSERT INTO module_configs (module_name, models, prompts) VALUES ($1, $2, $3)
             ON CONFLICT (module_name) DO NOTHING",
        )
        .bind(MODULE_QUIZ)
        .bind(&quiz_models)
        .bind(&quiz_prompts)
        .execute(pool)
        .await
        .context("failed to seed quiz module configuration")?;

        Ok(())
    }

    pub async fn load(pool: &PgPool) -> Result<Self> {
        let rows = sqlx::query_as::<_, ModuleConfigRow>(
            "SELECT module_name, models, prompts FROM module_configs",
        )
        .fetch_all(pool)
        .await
        .context("failed to load module configurations from database")?;

        let mut settings = ModuleSettings::default();
        for row in rows {
            match row.module_name.as_str() {
                MODULE_QUIZ => {
                    settings.quiz = Some(parse_quiz_settings(row.models, row.prompts)?);
                }
                other => {
                    return Err(anyhow!("unknown module configuration found: {}", other));
                }
            }
        }

        Ok(settings)
    }

    pub fn quiz(&self) -> Option<&QuizSettings> {
        self.quiz.as_ref()
    }
}

#[derive(Clone, Debug, Default)]
pub struct QuizSettings {
    pub models: QuizModels,
    pub prompts: QuizPrompts,
}

impl QuizSettings {
    /// Generation prompt with the requested count and difficulty filled in.
    pub fn render_prompt(&self, count: usize, difficulty: &str) -> String {
        self.prompts
            .generation
            .replace("{{COUNT}}", &count.to_string())
            .replace("{{DIFFICULTY}}", difficulty)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuizModels {
    pub generation_model: String,
}

impl Default for QuizModels {
    fn default() -> Self {
        Self {
            generation_model: "openrouter/openai/gpt-4o-mini".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuizPrompts {
    pub generation: String,
}

impl Default for QuizPrompts {
    fn default() -> Self {
        Self {
            generation: DEFAULT_QUIZ_PROMPT.to_string(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct ModuleConfigRow {
    module_name: String,
    models: Value,
    prompts: Value,
}

fn parse_quiz_settings(models: Value, prompts: Value) -> Result<QuizSettings> {
    let models: QuizModels = serde_json::from_value(models)
        .map_err(|err| anyhow!("failed to parse quiz models: {err}"))?;
    let prompts: QuizPrompts = serde_json::from_value(prompts)
        .map_err(|err| anyhow!("failed to parse quiz prompts: {err}"))?;
    Ok(QuizSettings { models, prompts })
}

pub async fn update_quiz_models(pool: &PgPool, models: &QuizModels) -> Result<()> {
    update_column(pool, "models", models).await
}

pub async fn update_quiz_prompts(pool: &PgPool, prompts: &QuizPrompts) -> Result<()> {
    update_column(pool, "prompts", prompts).await
}

async fn update_column<T: Serialize>(pool: &PgPool, column: &'static str, value: &T) -> Result<()> {
    let payload = serde_json::to_value(value)
        .map_err(|err| anyhow!("failed to serialize {column} payload: {err}"))?;
    let sql = match column {
        "models" => "UPDATE module_configs SET models = $2, updated_at = NOW() WHERE module_name = $1",
        _ => "UPDATE module_configs SET prompts = $2, updated_at = NOW() WHERE module_name = $1",
    };
    let result = sqlx::query(sql)
        .bind(MODULE_QUIZ)
        .bind(payload)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(anyhow!("module configuration not found for {MODULE_QUIZ}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_placeholders_are_filled() {
        let settings = QuizSettings::default();
        let prompt = settings.render_prompt(10, "hard");
        assert!(prompt.contains("exactly 10 questions at hard difficulty"));
        assert!(!prompt.contains("{{"));
    }

    #[test]
    fn stored_settings_round_trip_through_json() {
        let models = serde_json::json!({ "generation_model": "poe/GPT-4o" });
        let prompts = serde_json::json!({ "generation": "Write {{COUNT}} questions." });
        let settings = parse_quiz_settings(models, prompts).unwrap();
        assert_eq!(settings.models.generation_model, "poe/GPT-4o");
        assert_eq!(settings.render_prompt(3, "easy"), "Write 3 questions.");
    }

    #[test]
    fn malformed_stored_settings_are_reported() {
        let err = parse_quiz_settings(serde_json::json!({}), serde_json::json!({})).unwrap_err();
        assert!(err.to_string().contains("quiz models"));
    }
}
