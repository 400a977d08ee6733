use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{Duration, Instant, interval_at},
};
use tracing::debug;

use super::session::{QuizSession, TickOutcome};

const TICK: Duration = Duration::from_secs(1);

/// Counts countdown tasks that are still alive, across all sessions.
#[derive(Clone, Default, Debug)]
pub struct TimerGauge {
    active: Arc<AtomicUsize>,
}

impl TimerGauge {
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    fn enter(&self) -> GaugeGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        GaugeGuard {
            active: Arc::clone(&self.active),
        }
    }
}

struct GaugeGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Per-question countdown. Ticks the session once per second until the
/// question is submitted, expires, or the countdown is cancelled.
///
/// Dropping a `Countdown` aborts the task; [`Countdown::cancel`] additionally
/// waits until the task is gone.
pub struct Countdown {
    handle: Option<JoinHandle<()>>,
}

impl Countdown {
    pub fn start(session: Arc<Mutex<QuizSession>>, epoch: u64, gauge: &TimerGauge) -> Self {
        // Counted before spawning so the gauge never under-reports a scheduled task.
        let guard = gauge.enter();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            let mut ticker = interval_at(Instant::now() + TICK, TICK);
            loop {
                ticker.tick().await;
                let outcome = session.lock().await.tick(epoch);
                match outcome {
                    TickOutcome::Running { .. } => continue,
                    TickOutcome::Expired => {
                        debug!(epoch, "question countdown expired");
                        break;
                    }
                    TickOutcome::Stale => break,
                }
            }
        });

        Self {
            handle: Some(handle),
        }
    }

    pub async fn cancel(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            // Resolves once the task future, and with it the gauge guard, is dropped.
            let _ = handle.await;
        }
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::{Difficulty, QuizPhase, sample_question};

    fn session_with(n: usize) -> (Arc<Mutex<QuizSession>>, u64) {
        let mut session = QuizSession::new(30);
        let questions = (0..n)
            .map(|i| sample_question(&format!("q{i}"), 0, Difficulty::Easy))
            .collect();
        let epoch = session.begin(questions).unwrap();
        (Arc::new(Mutex::new(session)), epoch)
    }

    #[tokio::test(start_paused = true)]
    async fn expires_after_thirty_seconds() {
        let gauge = TimerGauge::default();
        let (session, epoch) = session_with(1);
        let _countdown = Countdown::start(Arc::clone(&session), epoch, &gauge);

        tokio::time::sleep(Duration::from_millis(29_500)).await;
        {
            let guard = session.lock().await;
            assert_eq!(guard.remaining(), 1);
            assert!(!guard.is_submitted());
        }

        tokio::time::sleep(Duration::from_secs(1)).await;
        let guard = session.lock().await;
        assert!(guard.is_submitted());
        assert_eq!(guard.score(), 0);
        assert_eq!(guard.phase(), QuizPhase::Question);
        drop(guard);

        tokio::task::yield_now().await;
        assert_eq!(gauge.active(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_ticking_and_releases_gauge() {
        let gauge = TimerGauge::default();
        let (session, epoch) = session_with(1);
        let countdown = Countdown::start(Arc::clone(&session), epoch, &gauge);
        assert_eq!(gauge.active(), 1);

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        countdown.cancel().await;
        assert_eq!(gauge.active(), 0);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(session.lock().await.remaining(), 28);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_countdown_exits_without_touching_the_next_question() {
        let gauge = TimerGauge::default();
        let (session, first) = session_with(2);
        let stale = Countdown::start(Arc::clone(&session), first, &gauge);

        let second = {
            let mut guard = session.lock().await;
            guard.submit().unwrap();
            guard.advance().unwrap().unwrap()
        };
        assert_ne!(first, second);

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(session.lock().await.remaining(), 30);
        tokio::task::yield_now().await;
        assert_eq!(gauge.active(), 0);
        drop(stale);
    }
}
