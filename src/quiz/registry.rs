use std::{collections::HashMap, sync::Arc};

use tokio::{
    sync::{Mutex, RwLock},
    time::{Duration, Instant, sleep},
};
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    QuizError, QuizQuestion,
    countdown::{Countdown, TimerGauge},
    session::{QuizSession, SessionView},
};

pub const SESSION_IDLE_LIMIT: Duration = Duration::from_secs(60 * 60);
const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// A quiz session together with the countdown armed for its current question.
pub struct LiveQuiz {
    session: Arc<Mutex<QuizSession>>,
    countdown: Mutex<Option<Countdown>>,
    last_seen: Mutex<Instant>,
    gauge: TimerGauge,
}

impl LiveQuiz {
    fn new(question_seconds: u32, gauge: TimerGauge) -> Self {
        Self {
            session: Arc::new(Mutex::new(QuizSession::new(question_seconds))),
            countdown: Mutex::new(None),
            last_seen: Mutex::new(Instant::now()),
            gauge,
        }
    }

    pub async fn begin(&self, questions: Vec<QuizQuestion>) -> Result<SessionView, QuizError> {
        let epoch = self.session.lock().await.begin(questions)?;
        self.arm(epoch).await;
        Ok(self.view().await)
    }

    pub async fn select(&self, option: usize) -> Result<SessionView, QuizError> {
        self.session.lock().await.select(option)?;
        Ok(self.view().await)
    }

    pub async fn submit(&self) -> Result<SessionView, QuizError> {
        self.session.lock().await.submit()?;
        self.disarm().await;
        Ok(self.view().await)
    }

    pub async fn advance(&self) -> Result<SessionView, QuizError> {
        let (next, question_entries, result_entries) = {
            let mut session = self.session.lock().await;
            let next = session.advance()?;
            (next, session.question_entries(), session.result_entries())
        };
        match next {
            Some(epoch) => self.arm(epoch).await,
            None => {
                self.disarm().await;
                debug!(question_entries, result_entries, "quiz reached results");
            }
        }
        Ok(self.view().await)
    }

    pub async fn restart(&self) -> SessionView {
        self.disarm().await;
        self.session.lock().await.restart();
        self.view().await
    }

    pub async fn teardown(&self) {
        self.disarm().await;
    }

    pub async fn view(&self) -> SessionView {
        *self.last_seen.lock().await = Instant::now();
        self.session.lock().await.view()
    }

    async fn idle_for(&self) -> Duration {
        self.last_seen.lock().await.elapsed()
    }

    /// Replaces any running countdown with a fresh one for `epoch`. The old
    /// task is fully gone before the new one is spawned.
    async fn arm(&self, epoch: u64) {
        let mut slot = self.countdown.lock().await;
        if let Some(previous) = slot.take() {
            previous.cancel().await;
        }
        *slot = Some(Countdown::start(Arc::clone(&self.session), epoch, &self.gauge));
    }

    async fn disarm(&self) {
        let previous = self.countdown.lock().await.take();
        if let Some(previous) = previous {
            previous.cancel().await;
        }
    }
}

/// In-memory quiz sessions keyed by id. Nothing here is persisted.
#[derive(Clone)]
pub struct QuizRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, Arc<LiveQuiz>>>>,
    gauge: TimerGauge,
    question_seconds: u32,
}

impl QuizRegistry {
    pub fn new(question_seconds: u32) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            gauge: TimerGauge::default(),
            question_seconds,
        }
    }

    pub fn active_countdowns(&self) -> usize {
        self.gauge.active()
    }

    pub async fn create(&self) -> (Uuid, Arc<LiveQuiz>) {
        let id = Uuid::new_v4();
        let live = Arc::new(LiveQuiz::new(self.question_seconds, self.gauge.clone()));
        self.sessions.write().await.insert(id, Arc::clone(&live));
        (id, live)
    }

    pub async fn get(&self, id: Uuid) -> Result<Arc<LiveQuiz>, QuizError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(QuizError::SessionNotFound)
    }

    pub async fn remove(&self, id: Uuid) -> Result<(), QuizError> {
        let live = self
            .sessions
            .write()
            .await
            .remove(&id)
            .ok_or(QuizError::SessionNotFound)?;
        live.teardown().await;
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Tears down sessions nobody has looked at for `max_idle`.
    pub async fn sweep_idle(&self, max_idle: Duration) -> usize {
        let snapshot: Vec<(Uuid, Arc<LiveQuiz>)> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(id, live)| (*id, Arc::clone(live)))
            .collect();

        let mut removed = 0;
        for (id, live) in snapshot {
            if live.idle_for().await < max_idle {
                continue;
            }
            if self.sessions.write().await.remove(&id).is_some() {
                live.teardown().await;
                removed += 1;
                debug!(%id, "swept idle quiz session");
            }
        }
        removed
    }

    pub fn spawn_sweeper(&self) {
        let registry = self.clone();
        tokio::spawn(async move {
            loop {
                sleep(SWEEP_INTERVAL).await;
                let removed = registry.sweep_idle(SESSION_IDLE_LIMIT).await;
                if removed > 0 {
                    info!(removed, "idle quiz sessions swept");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::{Difficulty, QuizPhase, sample_question};

    fn questions(n: usize) -> Vec<QuizQuestion> {
        (0..n)
            .map(|i| sample_question(&format!("q{i}"), 1, Difficulty::Medium))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_navigation_keeps_a_single_countdown() {
        let registry = QuizRegistry::new(30);
        let (_, live) = registry.create().await;

        let view = live.begin(questions(5)).await.unwrap();
        assert_eq!(view.remaining_seconds, 30);
        assert_eq!(registry.active_countdowns(), 1);

        for _ in 0..3 {
            tokio::time::sleep(Duration::from_millis(4_500)).await;
            live.submit().await.unwrap();
            assert_eq!(registry.active_countdowns(), 0);
            let view = live.advance().await.unwrap();
            assert_eq!(view.remaining_seconds, 30);
            assert_eq!(registry.active_countdowns(), 1);
        }

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(live.view().await.remaining_seconds, 27);
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_the_same_question_replaces_the_countdown() {
        let registry = QuizRegistry::new(30);
        let (_, live) = registry.create().await;
        live.begin(questions(2)).await.unwrap();

        let epoch = live.session.lock().await.epoch();
        live.arm(epoch).await;
        live.arm(epoch).await;
        assert_eq!(registry.active_countdowns(), 1);

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(live.view().await.remaining_seconds, 28);
    }

    #[tokio::test(start_paused = true)]
    async fn full_play_through_reaches_result_once_with_timeouts() {
        let registry = QuizRegistry::new(30);
        let (_, live) = registry.create().await;
        live.begin(questions(3)).await.unwrap();

        live.select(1).await.unwrap();
        live.submit().await.unwrap();
        live.advance().await.unwrap();

        tokio::time::sleep(Duration::from_millis(30_500)).await;
        let timed_out = live.view().await;
        assert!(timed_out.question.as_ref().unwrap().submitted);
        assert_eq!(registry.active_countdowns(), 0);
        live.advance().await.unwrap();

        live.select(1).await.unwrap();
        live.submit().await.unwrap();
        let result = live.advance().await.unwrap();

        assert_eq!(result.phase, QuizPhase::Result);
        let summary = result.result.unwrap();
        assert_eq!(summary.correct, 2);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.percentage, 67);
        assert_eq!(summary.total_score, 133);

        let session = live.session.lock().await;
        assert_eq!(session.question_entries(), 3);
        assert_eq!(session.result_entries(), 1);
        drop(session);
        assert_eq!(registry.active_countdowns(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_and_remove_cancel_the_countdown() {
        let registry = QuizRegistry::new(30);
        let (id, live) = registry.create().await;
        live.begin(questions(2)).await.unwrap();

        let view = live.restart().await;
        assert_eq!(view.phase, QuizPhase::Start);
        assert_eq!(registry.active_countdowns(), 0);

        live.begin(questions(2)).await.unwrap();
        assert_eq!(registry.active_countdowns(), 1);
        registry.remove(id).await.unwrap();
        assert_eq!(registry.active_countdowns(), 0);
        assert_eq!(registry.remove(id).await, Err(QuizError::SessionNotFound));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_only_idle_sessions() {
        let registry = QuizRegistry::new(30);
        let (stale_id, stale) = registry.create().await;
        stale.begin(questions(1)).await.unwrap();

        tokio::time::sleep(Duration::from_secs(90)).await;
        let (fresh_id, _) = registry.create().await;

        let removed = registry.sweep_idle(Duration::from_secs(60)).await;
        assert_eq!(removed, 1);
        assert!(registry.get(stale_id).await.is_err());
        assert!(registry.get(fresh_id).await.is_ok());
        assert_eq!(registry.len().await, 1);
    }
}
