//! Interval polling gated by an external circuit breaker.
//!
//! Every tick consults the breaker oracle first. An open breaker skips the
//! tick entirely; when the oracle knows a reset ETA, the interval is parked
//! and a one-shot resume timer re-invokes `start` shortly after the ETA.
//! Every timer handle the scheduler creates is tracked and cleared on
//! `stop()`. Tasks also carry the generation they were started under;
//! `stop()` bumps it, so a timer whose sleep already elapsed goes inert
//! instead of restarting a stopped scheduler, even when the abort misses.

use crate::render::Notifier;
use crate::sync::ConversationSyncEngine;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tradechat_model::BreakerStatus;

/// Read-only view of the external backend health gate. Consulted, never
/// mutated, by the scheduler.
#[async_trait]
pub trait CircuitBreakerProbe: Send + Sync {
    async fn status(&self) -> BreakerStatus;
}

#[derive(Default)]
struct SchedulerTasks {
    interval: Option<JoinHandle<()>>,
    resume: Option<JoinHandle<()>>,
}

pub struct PollingScheduler {
    engine: Arc<ConversationSyncEngine>,
    breaker: Arc<dyn CircuitBreakerProbe>,
    notifier: Arc<dyn Notifier>,
    page_limit: u32,
    resume_grace: Duration,
    generation: AtomicU64,
    tasks: Mutex<SchedulerTasks>,
}

impl PollingScheduler {
    pub fn new(
        engine: Arc<ConversationSyncEngine>,
        breaker: Arc<dyn CircuitBreakerProbe>,
        notifier: Arc<dyn Notifier>,
        page_limit: u32,
        resume_grace: Duration,
    ) -> Self {
        Self {
            engine,
            breaker,
            notifier,
            page_limit,
            resume_grace,
            generation: AtomicU64::new(0),
            tasks: Mutex::new(SchedulerTasks::default()),
        }
    }

    /// Starts (or restarts) the poll loop. The first tick fires
    /// immediately.
    pub fn start(self: &Arc<Self>, interval: Duration) {
        self.stop();
        let generation = self.generation.load(Ordering::SeqCst);
        info!(interval_ms = interval.as_millis() as u64, "polling started");

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;

                // A bumped generation means stop() ran since this loop was
                // started; go inert even if the abort raced past us.
                if this.generation.load(Ordering::SeqCst) != generation {
                    return;
                }

                let status = this.breaker.status().await;
                if !status.allows_fetch() {
                    debug!(?status.state, "breaker open, tick skipped");
                    if let Some(eta) = status.reset_eta {
                        this.arm_resume(eta, interval, generation);
                        // Park the interval; the resume timer owns the
                        // restart.
                        return;
                    }
                    continue;
                }

                if let Err(err) = this.engine.fetch_and_merge(1, this.page_limit).await {
                    warn!(error = %err, "poll tick failed");
                    this.notifier.notify(&err);
                }
            }
        });

        let mut tasks = self.tasks.lock();
        if self.generation.load(Ordering::SeqCst) != generation {
            handle.abort();
            return;
        }
        tasks.interval = Some(handle);
    }

    /// One-shot timer at `reset_eta + grace` that restarts polling.
    fn arm_resume(
        self: &Arc<Self>,
        eta: chrono::DateTime<Utc>,
        interval: Duration,
        generation: u64,
    ) {
        let wait = (eta - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO)
            + self.resume_grace;
        debug!(wait_ms = wait.as_millis() as u64, "resume timer armed");

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            // Re-check under the lock: a stop() since arming wins over the
            // restart, even when its abort missed this already-woken task.
            let restart = {
                let mut tasks = this.tasks.lock();
                let current = this.generation.load(Ordering::SeqCst) == generation;
                if current {
                    tasks.resume = None;
                }
                current
            };
            if restart {
                info!("breaker reset ETA passed, resuming polls");
                this.start(interval);
            }
        });

        let mut tasks = self.tasks.lock();
        if self.generation.load(Ordering::SeqCst) != generation {
            handle.abort();
            return;
        }
        if let Some(previous) = tasks.resume.take() {
            previous.abort();
        }
        tasks.resume = Some(handle);
    }

    /// Idempotent. Cancels the interval and any armed resume timer, and
    /// invalidates any timer that already fired but has not run yet.
    pub fn stop(&self) {
        let mut tasks = self.tasks.lock();
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = tasks.interval.take() {
            handle.abort();
        }
        if let Some(handle) = tasks.resume.take() {
            handle.abort();
        }
    }

    /// True while either the interval loop or a resume timer is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        let tasks = self.tasks.lock();
        tasks
            .interval
            .as_ref()
            .is_some_and(|h| !h.is_finished())
            || tasks.resume.as_ref().is_some_and(|h| !h.is_finished())
    }

    #[must_use]
    pub fn has_resume_armed(&self) -> bool {
        self.tasks
            .lock()
            .resume
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Drop for PollingScheduler {
    fn drop(&mut self) {
        let mut tasks = self.tasks.lock();
        if let Some(handle) = tasks.interval.take() {
            handle.abort();
        }
        if let Some(handle) = tasks.resume.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ChatApi, MessagePage, SendRequest, UploadFile};
    use crate::error::{ChatError, Result};
    use crate::render::Renderer;
    use parking_lot::Mutex as PMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tradechat_model::{Attachment, Conversation, ConversationKind, Message, MessageView};

    struct NullRenderer;
    impl Renderer for NullRenderer {
        fn append(&self, _view: MessageView) {}
        fn mark_read(&self, _message_id: &str) {}
        fn show_typing(&self, _user_id: &str) {}
        fn clear_typing(&self, _user_id: &str) {}
    }

    struct NullNotifier;
    impl Notifier for NullNotifier {
        fn inline(&self, _text: &str) {}
        fn notify(&self, _error: &ChatError) {}
    }

    #[derive(Default)]
    struct CountingApi {
        fetch_calls: AtomicUsize,
    }

    #[async_trait]
    impl ChatApi for CountingApi {
        async fn fetch_messages(
            &self,
            _kind: ConversationKind,
            _conversation_id: &str,
            _page: u32,
            _limit: u32,
        ) -> Result<MessagePage> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            Ok(MessagePage {
                messages: Vec::new(),
                pagination: None,
            })
        }
        async fn send_message(&self, _request: &SendRequest) -> Result<Message> {
            unimplemented!()
        }
        async fn upload_attachment(&self, _file: &UploadFile) -> Result<Attachment> {
            unimplemented!()
        }
        async fn mark_read(&self, _message_id: &str) -> Result<()> {
            Ok(())
        }
    }

    struct ScriptedBreaker {
        statuses: PMutex<Vec<BreakerStatus>>,
    }

    impl ScriptedBreaker {
        fn always(status: BreakerStatus) -> Self {
            Self {
                statuses: PMutex::new(vec![status]),
            }
        }

        fn sequence(statuses: Vec<BreakerStatus>) -> Self {
            Self {
                statuses: PMutex::new(statuses),
            }
        }
    }

    #[async_trait]
    impl CircuitBreakerProbe for ScriptedBreaker {
        async fn status(&self) -> BreakerStatus {
            let mut statuses = self.statuses.lock();
            if statuses.len() > 1 {
                statuses.remove(0)
            } else {
                *statuses.first().expect("scripted breaker needs a status")
            }
        }
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    fn scheduler(
        api: Arc<CountingApi>,
        breaker: Arc<ScriptedBreaker>,
    ) -> Arc<PollingScheduler> {
        let engine = Arc::new(ConversationSyncEngine::new(
            Conversation::new("o1", ConversationKind::Order, "u1", "u2"),
            api,
            Arc::new(NullRenderer),
        ));
        Arc::new(PollingScheduler::new(
            engine,
            breaker,
            Arc::new(NullNotifier),
            50,
            Duration::from_millis(1000),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn closed_breaker_polls_on_every_tick() {
        let api = Arc::new(CountingApi::default());
        let breaker = Arc::new(ScriptedBreaker::always(BreakerStatus::closed()));
        let sched = scheduler(api.clone(), breaker);

        sched.start(Duration::from_secs(5));
        tokio::time::advance(Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(api.fetch_calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(api.fetch_calls.load(Ordering::SeqCst), 2);

        sched.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn open_breaker_skips_tick_and_arms_resume() {
        // Scenario E
        let api = Arc::new(CountingApi::default());
        let eta = Utc::now() + chrono::Duration::seconds(30);
        let breaker = Arc::new(ScriptedBreaker::sequence(vec![
            BreakerStatus::open(Some(eta)),
            BreakerStatus::closed(),
        ]));
        let sched = scheduler(api.clone(), breaker);

        sched.start(Duration::from_secs(5));
        tokio::time::advance(Duration::from_millis(1)).await;
        settle().await;

        assert_eq!(api.fetch_calls.load(Ordering::SeqCst), 0);
        assert!(sched.has_resume_armed());

        sched.stop();
        assert!(!sched.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn resume_timer_restarts_polling_after_eta() {
        let api = Arc::new(CountingApi::default());
        let eta = Utc::now() + chrono::Duration::seconds(10);
        let breaker = Arc::new(ScriptedBreaker::sequence(vec![
            BreakerStatus::open(Some(eta)),
            BreakerStatus::closed(),
        ]));
        let sched = scheduler(api.clone(), breaker);

        sched.start(Duration::from_secs(5));
        tokio::time::advance(Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(api.fetch_calls.load(Ordering::SeqCst), 0);

        // past eta + grace: polling resumed, first tick fetches
        tokio::time::advance(Duration::from_secs(12)).await;
        settle().await;
        tokio::time::advance(Duration::from_millis(1)).await;
        settle().await;
        assert!(api.fetch_calls.load(Ordering::SeqCst) >= 1);

        sched.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn open_breaker_without_eta_keeps_checking() {
        let api = Arc::new(CountingApi::default());
        let breaker = Arc::new(ScriptedBreaker::sequence(vec![
            BreakerStatus::open(None),
            BreakerStatus::closed(),
        ]));
        let sched = scheduler(api.clone(), breaker);

        sched.start(Duration::from_secs(5));
        tokio::time::advance(Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(api.fetch_calls.load(Ordering::SeqCst), 0);
        assert!(!sched.has_resume_armed());

        tokio::time::advance(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(api.fetch_calls.load(Ordering::SeqCst), 1);

        sched.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_clears_all_timers() {
        let api = Arc::new(CountingApi::default());
        let eta = Utc::now() + chrono::Duration::seconds(60);
        let breaker = Arc::new(ScriptedBreaker::always(BreakerStatus::open(Some(eta))));
        let sched = scheduler(api.clone(), breaker);

        sched.start(Duration::from_secs(5));
        tokio::time::advance(Duration::from_millis(1)).await;
        settle().await;
        assert!(sched.has_resume_armed());

        sched.stop();
        sched.stop();
        assert!(!sched.is_running());

        // nothing fires later
        tokio::time::advance(Duration::from_secs(120)).await;
        settle().await;
        assert_eq!(api.fetch_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_after_resume_sleep_elapses_prevents_restart() {
        let api = Arc::new(CountingApi::default());
        let eta = Utc::now() + chrono::Duration::seconds(10);
        let breaker = Arc::new(ScriptedBreaker::always(BreakerStatus::open(Some(eta))));
        let sched = scheduler(api.clone(), breaker);

        sched.start(Duration::from_secs(5));
        tokio::time::advance(Duration::from_millis(1)).await;
        settle().await;
        assert!(sched.has_resume_armed());

        // let the resume sleep elapse, then stop before yielding to the
        // woken task; the stop must still win
        tokio::time::advance(Duration::from_secs(12)).await;
        sched.stop();
        settle().await;

        tokio::time::advance(Duration::from_secs(120)).await;
        settle().await;
        assert_eq!(api.fetch_calls.load(Ordering::SeqCst), 0);
        assert!(!sched.is_running());
        assert!(!sched.has_resume_armed());
    }
}
