use std::future::Future;

use anyhow::{Result, bail};
use rand::Rng;
use tracing::{info, warn};

use super::{Difficulty, QuestionBank, QuizQuestion, parse_generated_questions};
use crate::{
    config::QuizSettings,
    llm::{ChatMessage, LlmClient, LlmRequest, MessageRole},
};

/// Anything able to produce a batch of questions at a difficulty.
pub trait QuestionSource {
    fn generate(
        &self,
        count: usize,
        difficulty: Difficulty,
    ) -> impl Future<Output = Result<Vec<QuizQuestion>>> + Send;
}

/// Question source backed by the chat completion endpoint.
pub struct LlmQuestionSource {
    client: LlmClient,
    settings: QuizSettings,
}

impl LlmQuestionSource {
    pub fn new(client: LlmClient, settings: QuizSettings) -> Self {
        Self { client, settings }
    }
}

impl QuestionSource for LlmQuestionSource {
    async fn generate(&self, count: usize, difficulty: Difficulty) -> Result<Vec<QuizQuestion>> {
        let system = self.settings.render_prompt(count, difficulty.as_str());
        let request = LlmRequest::new(
            self.settings.models.generation_model.clone(),
            vec![
                ChatMessage::new(MessageRole::System, system),
                ChatMessage::new(
                    MessageRole::User,
                    format!("Generate {count} {difficulty} questions now."),
                ),
            ],
        )
        .expect_json();

        let response = self.client.execute(request).await?;
        info!(
            provider = %response.provider,
            model = %response.model,
            prompt_tokens = response.token_usage.prompt_tokens,
            response_tokens = response.token_usage.response_tokens,
            total_tokens = response.token_usage.total_tokens,
            "quiz questions generated"
        );

        let questions = parse_generated_questions(&response.text, difficulty)?;
        if questions.is_empty() {
            bail!("completion contained no valid questions");
        }
        Ok(questions)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionOrigin {
    Generated,
    Fallback,
}

/// Questions chosen for a new session.
#[derive(Debug, Clone)]
pub struct QuestionSet {
    pub questions: Vec<QuizQuestion>,
    pub origin: QuestionOrigin,
    pub requested: usize,
}

impl QuestionSet {
    pub fn is_short(&self) -> bool {
        self.questions.len() < self.requested
    }
}

/// Asks `source` for `count` questions and falls back to the bank on any
/// failure. The caller cannot tell the two apart from the questions alone.
pub async fn build_question_set<S, R>(
    source: &S,
    bank: &QuestionBank,
    count: usize,
    difficulty: Difficulty,
    rng: &mut R,
) -> QuestionSet
where
    S: QuestionSource + Sync,
    R: Rng + Send + ?Sized,
{
    match source.generate(count, difficulty).await {
        Ok(mut questions) => {
            questions.truncate(count);
            let set = QuestionSet {
                questions,
                origin: QuestionOrigin::Generated,
                requested: count,
            };
            if set.is_short() {
                warn!(
                    requested = count,
                    received = set.questions.len(),
                    %difficulty,
                    "generator returned fewer questions than requested"
                );
            }
            set
        }
        Err(err) => {
            warn!(?err, %difficulty, "question generation failed, using fallback bank");
            let set = QuestionSet {
                questions: bank.sample(difficulty, count, rng),
                origin: QuestionOrigin::Fallback,
                requested: count,
            };
            if set.is_short() {
                warn!(
                    requested = count,
                    available = set.questions.len(),
                    %difficulty,
                    "fallback bank is smaller than the requested question count"
                );
            }
            set
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::quiz::sample_question;

    struct FailingSource;

    impl QuestionSource for FailingSource {
        async fn generate(&self, _count: usize, _difficulty: Difficulty) -> Result<Vec<QuizQuestion>> {
            bail!("connection refused")
        }
    }

    struct FixedSource(usize);

    impl QuestionSource for FixedSource {
        async fn generate(&self, _count: usize, difficulty: Difficulty) -> Result<Vec<QuizQuestion>> {
            Ok((0..self.0)
                .map(|i| sample_question(&format!("ai-{i}"), 2, difficulty))
                .collect())
        }
    }

    #[tokio::test]
    async fn failed_generation_falls_back_to_the_bank() {
        let bank = QuestionBank::bundled().unwrap();
        let mut rng = StdRng::seed_from_u64(3);

        let set = build_question_set(&FailingSource, &bank, 10, Difficulty::Hard, &mut rng).await;

        assert_eq!(set.origin, QuestionOrigin::Fallback);
        assert_eq!(set.questions.len(), 10);
        assert!(!set.is_short());
        assert!(set.questions.iter().all(|q| q.difficulty == Difficulty::Hard));
    }

    #[tokio::test]
    async fn small_bank_yields_a_flagged_short_set() {
        let bank = QuestionBank::new(vec![
            sample_question("a", 0, Difficulty::Easy),
            sample_question("b", 1, Difficulty::Easy),
            sample_question("c", 2, Difficulty::Hard),
        ]);
        let mut rng = StdRng::seed_from_u64(5);

        let set = build_question_set(&FailingSource, &bank, 10, Difficulty::Easy, &mut rng).await;

        assert_eq!(set.questions.len(), 2);
        assert!(set.is_short());
    }

    #[tokio::test]
    async fn generated_questions_are_truncated_to_the_request() {
        let bank = QuestionBank::default();
        let mut rng = StdRng::seed_from_u64(9);

        let set = build_question_set(&FixedSource(14), &bank, 10, Difficulty::Medium, &mut rng).await;

        assert_eq!(set.origin, QuestionOrigin::Generated);
        assert_eq!(set.questions.len(), 10);
        assert_eq!(set.questions[0].id, "ai-0");
    }
}
