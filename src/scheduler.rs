//! Poll scheduler.
//!
//! One worker task drives the periodic refresh of the conversation list and
//! of the active conversation's messages. `start` is idempotent (re-arming
//! replaces the previous worker), `stop` shuts the worker down gracefully,
//! and `refresh_now` runs a tick immediately without disturbing the timer
//! phase. Ticks that race a manual refresh converge because the underlying
//! merges are idempotent.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::config::ChatConfig;
use crate::session::ChatSession;

struct Worker {
    handle: JoinHandle<()>,
    shutdown: Arc<Notify>,
}

/// Drives periodic refresh of a [`ChatSession`].
pub struct PollScheduler {
    session: Arc<ChatSession>,
    interval: Duration,
    start_jitter: Duration,
    refresh: Arc<Notify>,
    worker: Mutex<Option<Worker>>,
}

impl PollScheduler {
    /// Create a scheduler for the given session.
    #[must_use]
    pub fn new(session: Arc<ChatSession>, config: &ChatConfig) -> Self {
        Self {
            session,
            interval: config.poll_interval,
            start_jitter: config.start_jitter,
            refresh: Arc::new(Notify::new()),
            worker: Mutex::new(None),
        }
    }

    /// Arm the poll timers. Safe to call multiple times: re-arming replaces
    /// the previous worker instead of stacking timers.
    pub async fn start(&self) {
        let mut worker = self.worker.lock().await;
        if let Some(previous) = worker.take() {
            previous.shutdown.notify_one();
        }

        let jitter = self.pick_jitter();
        let shutdown = Arc::new(Notify::new());
        let handle = tokio::spawn(run_loop(
            Arc::clone(&self.session),
            self.interval,
            jitter,
            Arc::clone(&shutdown),
            Arc::clone(&self.refresh),
        ));
        *worker = Some(Worker { handle, shutdown });
        info!(interval = ?self.interval, "poll scheduler armed");
    }

    /// Disarm the timers. An in-flight tick is allowed to complete and merge
    /// harmlessly.
    pub async fn stop(&self) {
        if let Some(worker) = self.worker.lock().await.take() {
            worker.shutdown.notify_one();
            info!("poll scheduler stopped");
        }
    }

    /// Request an immediate tick without resetting the timer phase.
    pub fn refresh_now(&self) {
        self.refresh.notify_one();
    }

    /// Whether a worker task is currently armed.
    pub async fn is_running(&self) -> bool {
        self.worker
            .lock()
            .await
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    fn pick_jitter(&self) -> Duration {
        let max_ms = u64::try_from(self.start_jitter.as_millis()).unwrap_or(u64::MAX);
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }
}

async fn run_loop(
    session: Arc<ChatSession>,
    interval: Duration,
    jitter: Duration,
    shutdown: Arc<Notify>,
    refresh: Arc<Notify>,
) {
    if !jitter.is_zero() {
        tokio::select! {
            () = tokio::time::sleep(jitter) => {}
            () = shutdown.notified() => return,
        }
    }

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => tick(&session).await,
            () = refresh.notified() => tick(&session).await,
            () = shutdown.notified() => {
                info!("poll worker shutting down");
                break;
            }
        }
    }
}

async fn tick(session: &Arc<ChatSession>) {
    if let Err(err) = session.refresh().await {
        // Prior state is retained; the next tick is the retry.
        warn!(%err, "poll tick failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::LocalIdentity;
    use crate::test_support::MockTransport;
    use crate::transport::ChatTransport;
    use crate::types::SenderRole;

    fn session_with(transport: &Arc<MockTransport>) -> Arc<ChatSession> {
        ChatSession::new(
            ChatConfig::default(),
            Arc::clone(transport) as Arc<dyn ChatTransport>,
            LocalIdentity::new(SenderRole::Client),
        )
    }

    fn quiet_config() -> ChatConfig {
        ChatConfig::new()
            .with_poll_interval(Duration::from_secs(3600))
            .with_start_jitter(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_stop_disarms() {
        let transport = Arc::new(MockTransport::new());
        let scheduler = PollScheduler::new(session_with(&transport), &quiet_config());

        scheduler.start().await;
        scheduler.start().await;
        assert!(scheduler.is_running().await);

        scheduler.stop().await;
        assert!(!scheduler.is_running().await);

        // stop with nothing armed is a no-op
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_first_tick_and_manual_refresh() {
        let transport = Arc::new(MockTransport::new());
        let scheduler = PollScheduler::new(session_with(&transport), &quiet_config());

        scheduler.start().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        let after_start = transport.list_calls();
        assert!(after_start >= 1, "interval fires an immediate first tick");

        scheduler.refresh_now();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(transport.list_calls() > after_start);

        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_no_ticks_after_stop() {
        let transport = Arc::new(MockTransport::new());
        let scheduler = PollScheduler::new(
            session_with(&transport),
            &ChatConfig::new()
                .with_poll_interval(Duration::from_millis(20))
                .with_start_jitter(Duration::ZERO),
        );

        scheduler.start().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.stop().await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        let settled = transport.list_calls();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(transport.list_calls(), settled);
    }
}
