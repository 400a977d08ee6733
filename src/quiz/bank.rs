use anyhow::{Context, Result};
use rand::{Rng, seq::SliceRandom};
use serde::Deserialize;
use sqlx::{PgPool, types::Json};
use tracing::error;
use uuid::Uuid;

use super::{Difficulty, OPTION_COUNT, QuizQuestion};

const BUNDLED_BANK: &str = include_str!("../../data/quiz_bank.json");

#[derive(Deserialize)]
struct BundledBank {
    questions: Vec<QuizQuestion>,
}

#[derive(sqlx::FromRow)]
struct BankRow {
    id: Uuid,
    prompt: String,
    options: Json<Vec<String>>,
    correct_index: i16,
    explanation: String,
    category: String,
    difficulty: String,
}

/// Fallback question bank used when generation fails.
#[derive(Debug, Clone, Default)]
pub struct QuestionBank {
    questions: Vec<QuizQuestion>,
}

impl QuestionBank {
    pub fn new(questions: Vec<QuizQuestion>) -> Self {
        Self { questions }
    }

    pub fn bundled() -> Result<Self> {
        let bank: BundledBank =
            serde_json::from_str(BUNDLED_BANK).context("failed to parse bundled quiz bank")?;
        Ok(Self::new(bank.questions))
    }

    /// Bundled questions plus every approved quiz suggestion. Database errors
    /// are logged and the bundled set is returned alone.
    pub async fn load(pool: &PgPool) -> Result<Self> {
        let mut bank = Self::bundled()?;
        match fetch_approved_suggestions(pool).await {
            Ok(extra) => bank.questions.extend(extra),
            Err(err) => error!(?err, "failed to load approved quiz suggestions"),
        }
        Ok(bank)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn count_for(&self, difficulty: Difficulty) -> usize {
        self.questions
            .iter()
            .filter(|question| question.difficulty == difficulty)
            .count()
    }

    /// Random sample of up to `count` questions at `difficulty`, without repeats.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        difficulty: Difficulty,
        count: usize,
        rng: &mut R,
    ) -> Vec<QuizQuestion> {
        let mut pool: Vec<&QuizQuestion> = self
            .questions
            .iter()
            .filter(|question| question.difficulty == difficulty)
            .collect();
        pool.shuffle(rng);
        pool.into_iter().take(count).cloned().collect()
    }
}

async fn fetch_approved_suggestions(pool: &PgPool) -> Result<Vec<QuizQuestion>> {
    let rows = sqlx::query_as::<_, BankRow>(
        "SELECT id, prompt, options, correct_index, explanation, category, difficulty
         FROM quiz_bank ORDER BY created_at",
    )
    .fetch_all(pool)
    .await
    .context("failed to query quiz_bank")?;

    Ok(rows
        .into_iter()
        .filter_map(|row| {
            let difficulty = row.difficulty.parse().ok()?;
            let correct_index = usize::try_from(row.correct_index).ok()?;
            let options = row.options.0;
            if options.len() != OPTION_COUNT || correct_index >= OPTION_COUNT {
                return None;
            }
            Some(QuizQuestion {
                id: row.id.to_string(),
                prompt: row.prompt,
                options,
                correct_index,
                explanation: row.explanation,
                category: row.category,
                difficulty,
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn bundled_bank_is_well_formed() {
        let bank = QuestionBank::bundled().unwrap();
        assert!(!bank.is_empty());
        for difficulty in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
            assert!(bank.count_for(difficulty) >= 10, "{difficulty} bank too small");
        }
        let ids: HashSet<_> = bank.questions.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids.len(), bank.len());
        assert!(bank.questions.iter().all(|q| q.options.len() == OPTION_COUNT
            && q.correct_index < OPTION_COUNT));
    }

    #[test]
    fn sample_filters_by_difficulty_without_repeats() {
        let bank = QuestionBank::bundled().unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let picked = bank.sample(Difficulty::Hard, 10, &mut rng);

        assert_eq!(picked.len(), 10);
        assert!(picked.iter().all(|q| q.difficulty == Difficulty::Hard));
        let ids: HashSet<_> = picked.iter().map(|q| q.id.clone()).collect();
        assert_eq!(ids.len(), 10);
    }

    #[test]
    fn sample_is_capped_by_bank_size() {
        let bank = QuestionBank::bundled().unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let available = bank.count_for(Difficulty::Easy);
        assert_eq!(bank.sample(Difficulty::Easy, available + 5, &mut rng).len(), available);
    }
}
