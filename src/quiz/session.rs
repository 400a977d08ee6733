use std::fmt;

use serde::Serialize;

use super::{Difficulty, OPTION_COUNT, QuizError, QuizQuestion};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizPhase {
    Start,
    Question,
    Result,
}

impl fmt::Display for QuizPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuizPhase::Start => write!(f, "start"),
            QuizPhase::Question => write!(f, "question"),
            QuizPhase::Result => write!(f, "result"),
        }
    }
}

/// What one countdown tick did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Running { remaining: u32 },
    /// The countdown reached zero and the question was submitted unanswered.
    Expired,
    /// The tick belongs to a question that is no longer active.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnswerRecord {
    pub selected: Option<usize>,
    pub correct: bool,
    pub timed_out: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuizSummary {
    pub correct: usize,
    pub total: usize,
    pub percentage: u32,
    pub total_score: u32,
    pub mean_difficulty: f64,
}

impl QuizSummary {
    /// `total_score` weights the raw percentage by the mean difficulty factor of
    /// every issued question, answered correctly or not.
    pub fn compute(questions: &[QuizQuestion], correct: usize) -> Self {
        let total = questions.len();
        if total == 0 {
            return Self {
                correct: 0,
                total: 0,
                percentage: 0,
                total_score: 0,
                mean_difficulty: 0.0,
            };
        }

        let raw_percentage = correct as f64 / total as f64 * 100.0;
        let mean_difficulty = questions
            .iter()
            .map(|question| question.difficulty.factor())
            .sum::<f64>()
            / total as f64;

        Self {
            correct,
            total,
            percentage: raw_percentage.round() as u32,
            total_score: (raw_percentage * mean_difficulty).round() as u32,
            mean_difficulty,
        }
    }
}

/// One play-through of the quiz, from start screen to result screen.
///
/// The session never schedules anything itself: the countdown task calls
/// [`QuizSession::tick`] with the epoch it was armed for, and a tick whose epoch
/// no longer matches is ignored.
#[derive(Debug, Clone)]
pub struct QuizSession {
    questions: Vec<QuizQuestion>,
    phase: QuizPhase,
    current: usize,
    selected: Option<usize>,
    submitted: bool,
    score: usize,
    remaining: u32,
    question_seconds: u32,
    answers: Vec<AnswerRecord>,
    epoch: u64,
    question_entries: usize,
    result_entries: usize,
}

impl QuizSession {
    pub fn new(question_seconds: u32) -> Self {
        let question_seconds = question_seconds.max(1);
        Self {
            questions: Vec::new(),
            phase: QuizPhase::Start,
            current: 0,
            selected: None,
            submitted: false,
            score: 0,
            remaining: question_seconds,
            question_seconds,
            answers: Vec::new(),
            epoch: 0,
            question_entries: 0,
            result_entries: 0,
        }
    }

    pub fn question_entries(&self) -> usize {
        self.question_entries
    }

    pub fn result_entries(&self) -> usize {
        self.result_entries
    }

    /// Moves from `start` into the first question. Returns the epoch the
    /// countdown for that question must be armed with.
    pub fn begin(&mut self, questions: Vec<QuizQuestion>) -> Result<u64, QuizError> {
        self.expect_phase(QuizPhase::Start)?;
        if questions.is_empty() {
            return Err(QuizError::EmptyQuestionSet);
        }

        self.questions = questions;
        self.answers = Vec::with_capacity(self.questions.len());
        self.current = 0;
        self.score = 0;
        Ok(self.enter_question())
    }

    pub fn select(&mut self, option: usize) -> Result<(), QuizError> {
        self.expect_phase(QuizPhase::Question)?;
        if self.submitted {
            return Err(QuizError::AlreadySubmitted);
        }
        if option >= OPTION_COUNT {
            return Err(QuizError::InvalidOption(option));
        }
        self.selected = Some(option);
        Ok(())
    }

    /// Locks in the current selection. Returns whether it was correct.
    pub fn submit(&mut self) -> Result<bool, QuizError> {
        self.expect_phase(QuizPhase::Question)?;
        if self.submitted {
            return Err(QuizError::AlreadySubmitted);
        }
        Ok(self.lock_answer(false))
    }

    /// Applies one second of countdown for the question armed at `epoch`.
    pub fn tick(&mut self, epoch: u64) -> TickOutcome {
        if self.phase != QuizPhase::Question || self.submitted || epoch != self.epoch {
            return TickOutcome::Stale;
        }

        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining > 0 {
            return TickOutcome::Running {
                remaining: self.remaining,
            };
        }

        self.selected = None;
        self.lock_answer(true);
        TickOutcome::Expired
    }

    /// Leaves a submitted question. Returns the epoch of the next question, or
    /// `None` once the session has moved to `result`.
    pub fn advance(&mut self) -> Result<Option<u64>, QuizError> {
        self.expect_phase(QuizPhase::Question)?;
        if !self.submitted {
            return Err(QuizError::NotSubmitted);
        }

        if self.current + 1 >= self.questions.len() {
            self.phase = QuizPhase::Result;
            self.result_entries += 1;
            self.epoch += 1;
            return Ok(None);
        }

        self.current += 1;
        Ok(Some(self.enter_question()))
    }

    /// Discards everything and returns to the start screen.
    pub fn restart(&mut self) {
        let epoch = self.epoch + 1;
        *self = Self::new(self.question_seconds);
        self.epoch = epoch;
    }

    pub fn summary(&self) -> Option<QuizSummary> {
        (self.phase == QuizPhase::Result).then(|| QuizSummary::compute(&self.questions, self.score))
    }

    pub fn view(&self) -> SessionView {
        let question = (self.phase == QuizPhase::Question)
            .then(|| self.questions.get(self.current))
            .flatten()
            .map(|question| QuestionView {
                id: question.id.clone(),
                prompt: question.prompt.clone(),
                options: question.options.clone(),
                category: question.category.clone(),
                difficulty: question.difficulty,
                selected: self.selected,
                submitted: self.submitted,
                correct_index: self.submitted.then_some(question.correct_index),
                explanation: self.submitted.then(|| question.explanation.clone()),
            });

        SessionView {
            phase: self.phase,
            index: self.current,
            total: self.questions.len(),
            remaining_seconds: self.remaining,
            score: self.score,
            answers: self.answers.clone(),
            question,
            result: self.summary(),
        }
    }

    fn enter_question(&mut self) -> u64 {
        self.phase = QuizPhase::Question;
        self.selected = None;
        self.submitted = false;
        self.remaining = self.question_seconds;
        self.question_entries += 1;
        self.epoch += 1;
        self.epoch
    }

    fn lock_answer(&mut self, timed_out: bool) -> bool {
        let correct = self
            .selected
            .zip(self.questions.get(self.current))
            .is_some_and(|(selected, question)| question.is_correct(selected));
        if correct {
            self.score += 1;
        }
        self.submitted = true;
        self.answers.push(AnswerRecord {
            selected: self.selected,
            correct,
            timed_out,
        });
        correct
    }

    fn expect_phase(&self, expected: QuizPhase) -> Result<(), QuizError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(QuizError::WrongPhase {
                expected,
                actual: self.phase,
            })
        }
    }
}

#[cfg(test)]
impl QuizSession {
    pub fn phase(&self) -> QuizPhase {
        self.phase
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn score(&self) -> usize {
        self.score
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    pub fn answers(&self) -> &[AnswerRecord] {
        &self.answers
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub phase: QuizPhase,
    pub index: usize,
    pub total: usize,
    pub remaining_seconds: u32,
    pub score: usize,
    pub answers: Vec<AnswerRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<QuestionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<QuizSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub id: String,
    pub prompt: String,
    pub options: Vec<String>,
    pub category: String,
    pub difficulty: Difficulty,
    pub selected: Option<usize>,
    pub submitted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::sample_question;

    fn questions(n: usize, difficulty: Difficulty) -> Vec<QuizQuestion> {
        (0..n)
            .map(|i| sample_question(&format!("q{i}"), i % OPTION_COUNT, difficulty))
            .collect()
    }

    #[test]
    fn n_questions_enter_question_n_times_and_result_once() {
        let mut session = QuizSession::new(30);
        session.begin(questions(4, Difficulty::Easy)).unwrap();

        for _ in 0..4 {
            session.submit().unwrap();
            session.advance().unwrap();
        }

        assert_eq!(session.question_entries(), 4);
        assert_eq!(session.result_entries(), 1);
        assert_eq!(session.phase(), QuizPhase::Result);
        assert!(matches!(
            session.advance(),
            Err(QuizError::WrongPhase { actual: QuizPhase::Result, .. })
        ));
        assert_eq!(session.result_entries(), 1);
    }

    #[test]
    fn selection_can_change_until_submitted() {
        let mut session = QuizSession::new(30);
        session.begin(questions(1, Difficulty::Easy)).unwrap();

        session.select(3).unwrap();
        session.select(0).unwrap();
        assert!(session.submit().unwrap());
        assert_eq!(session.select(1), Err(QuizError::AlreadySubmitted));
        assert_eq!(session.submit(), Err(QuizError::AlreadySubmitted));
        assert_eq!(session.score(), 1);
    }

    #[test]
    fn invalid_option_is_refused() {
        let mut session = QuizSession::new(30);
        session.begin(questions(1, Difficulty::Easy)).unwrap();
        assert_eq!(session.select(4), Err(QuizError::InvalidOption(4)));
    }

    #[test]
    fn advancing_requires_submission() {
        let mut session = QuizSession::new(30);
        session.begin(questions(2, Difficulty::Easy)).unwrap();
        assert_eq!(session.advance(), Err(QuizError::NotSubmitted));
    }

    #[test]
    fn countdown_expiry_submits_without_answer() {
        let mut session = QuizSession::new(3);
        let epoch = session.begin(questions(2, Difficulty::Easy)).unwrap();
        session.select(0).unwrap();

        assert_eq!(session.tick(epoch), TickOutcome::Running { remaining: 2 });
        assert_eq!(session.tick(epoch), TickOutcome::Running { remaining: 1 });
        assert_eq!(session.tick(epoch), TickOutcome::Expired);

        assert!(session.is_submitted());
        assert_eq!(session.score(), 0);
        assert_eq!(
            session.answers()[0],
            AnswerRecord {
                selected: None,
                correct: false,
                timed_out: true
            }
        );
        assert_eq!(session.tick(epoch), TickOutcome::Stale);
    }

    #[test]
    fn stale_epoch_never_mutates_next_question() {
        let mut session = QuizSession::new(30);
        let first = session.begin(questions(2, Difficulty::Easy)).unwrap();
        session.submit().unwrap();
        let second = session.advance().unwrap().unwrap();

        assert_ne!(first, second);
        assert_eq!(session.tick(first), TickOutcome::Stale);
        assert_eq!(session.remaining(), 30);
    }

    #[test]
    fn submitting_with_five_seconds_left_stops_the_clock_and_keeps_the_point() {
        let mut session = QuizSession::new(30);
        let epoch = session.begin(questions(1, Difficulty::Easy)).unwrap();
        for _ in 0..25 {
            session.tick(epoch);
        }
        assert_eq!(session.remaining(), 5);

        session.select(0).unwrap();
        assert!(session.submit().unwrap());
        assert_eq!(session.tick(epoch), TickOutcome::Stale);
        assert_eq!(session.remaining(), 5);

        session.advance().unwrap();
        let summary = session.summary().unwrap();
        assert_eq!(summary.correct, 1);
        assert_eq!(summary.percentage, 100);
    }

    #[test]
    fn total_score_weights_by_mean_difficulty_of_issued_questions() {
        let mut issued = questions(2, Difficulty::Easy);
        issued.extend(questions(2, Difficulty::Hard));

        let summary = QuizSummary::compute(&issued, 1);
        assert_eq!(summary.percentage, 25);
        assert!((summary.mean_difficulty - 2.0).abs() < 1e-9);
        assert_eq!(summary.total_score, 50);

        let thirds = QuizSummary::compute(&questions(3, Difficulty::Medium), 1);
        assert_eq!(thirds.percentage, 33);
        assert_eq!(thirds.total_score, 67);
    }

    #[test]
    fn restart_returns_to_start_with_clean_state() {
        let mut session = QuizSession::new(30);
        let epoch = session.begin(questions(1, Difficulty::Easy)).unwrap();
        session.select(0).unwrap();
        session.submit().unwrap();
        session.advance().unwrap();

        session.restart();
        assert_eq!(session.phase(), QuizPhase::Start);
        assert_eq!(session.score(), 0);
        assert!(session.questions().is_empty());
        assert_eq!(session.question_entries(), 0);
        assert!(session.epoch() > epoch);
        assert!(session.summary().is_none());
    }

    #[test]
    fn view_hides_answer_until_submitted() {
        let mut session = QuizSession::new(30);
        session.begin(questions(1, Difficulty::Easy)).unwrap();
        let before = session.view().question.unwrap();
        assert!(before.correct_index.is_none());
        assert!(before.explanation.is_none());

        session.select(2).unwrap();
        session.submit().unwrap();
        let after = session.view().question.unwrap();
        assert_eq!(after.correct_index, Some(0));
        assert_eq!(after.selected, Some(2));
        assert!(after.explanation.is_some());
    }

    #[test]
    fn begin_refuses_empty_set() {
        let mut session = QuizSession::new(30);
        assert_eq!(session.begin(Vec::new()), Err(QuizError::EmptyQuestionSet));
        assert_eq!(session.phase(), QuizPhase::Start);
    }
}
