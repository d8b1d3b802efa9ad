//! Debounced typing-indicator state machine.
//!
//! `Idle -> Typing` on the first input event, then a 2 s inactivity window
//! that every further input resets; expiry emits `stop-typing` and returns
//! to `Idle`. The remote half (showing indicators for the other
//! participant) is driven by the session's socket pump.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;
use tradechat_model::SocketEvent;

struct TypingInner {
    typing: bool,
    timer: Option<JoinHandle<()>>,
}

pub struct TypingIndicatorController {
    conversation_id: String,
    user_id: String,
    bus: broadcast::Sender<SocketEvent>,
    debounce: Duration,
    inner: Arc<Mutex<TypingInner>>,
}

impl TypingIndicatorController {
    pub fn new(
        conversation_id: impl Into<String>,
        user_id: impl Into<String>,
        bus: broadcast::Sender<SocketEvent>,
        debounce: Duration,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            user_id: user_id.into(),
            bus,
            debounce,
            inner: Arc::new(Mutex::new(TypingInner {
                typing: false,
                timer: None,
            })),
        }
    }

    #[must_use]
    pub fn is_typing(&self) -> bool {
        self.inner.lock().typing
    }

    /// Local input event. Emits `typing` on the idle -> typing edge and
    /// (re)arms the debounce timer.
    pub fn input(&self) {
        let mut inner = self.inner.lock();
        if !inner.typing {
            inner.typing = true;
            emit(
                &self.bus,
                SocketEvent::Typing {
                    conversation_id: self.conversation_id.clone(),
                    user_id: self.user_id.clone(),
                },
            );
        }

        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }

        let bus = self.bus.clone();
        let state = Arc::clone(&self.inner);
        let conversation_id = self.conversation_id.clone();
        let user_id = self.user_id.clone();
        let debounce = self.debounce;
        inner.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            let mut inner = state.lock();
            if inner.typing {
                inner.typing = false;
                inner.timer = None;
                emit(
                    &bus,
                    SocketEvent::StopTyping {
                        conversation_id,
                        user_id,
                    },
                );
            }
        }));
    }

    /// Teardown: cancel the debounce timer and, if mid-typing, emit the
    /// closing `stop-typing` so the peer is not left with a stuck indicator.
    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }
        if inner.typing {
            inner.typing = false;
            emit(
                &self.bus,
                SocketEvent::StopTyping {
                    conversation_id: self.conversation_id.clone(),
                    user_id: self.user_id.clone(),
                },
            );
        }
    }
}

impl Drop for TypingIndicatorController {
    fn drop(&mut self) {
        if let Some(timer) = self.inner.lock().timer.take() {
            timer.abort();
        }
    }
}

fn emit(bus: &broadcast::Sender<SocketEvent>, event: SocketEvent) {
    match bus.send(event) {
        Ok(receivers) => debug!(receivers, "typing event emitted"),
        Err(_) => debug!("typing event dropped, socket channel closed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> (TypingIndicatorController, broadcast::Receiver<SocketEvent>) {
        let (tx, rx) = broadcast::channel(16);
        let ctl =
            TypingIndicatorController::new("c1", "u1", tx, Duration::from_millis(2000));
        (ctl, rx)
    }

    fn drain(rx: &mut broadcast::Receiver<SocketEvent>) -> Vec<SocketEvent> {
        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn typing_then_silence_emits_one_pair() {
        // Scenario F: typing, then 2.1 s of silence
        let (ctl, mut rx) = controller();
        ctl.input();
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_millis(2100)).await;
        tokio::task::yield_now().await;

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], SocketEvent::Typing { .. }));
        assert!(matches!(events[1], SocketEvent::StopTyping { .. }));
        assert!(!ctl.is_typing());
    }

    #[tokio::test(start_paused = true)]
    async fn continuous_input_keeps_typing_alive() {
        let (ctl, mut rx) = controller();
        for _ in 0..5 {
            ctl.input();
            tokio::time::advance(Duration::from_millis(1500)).await;
            tokio::task::yield_now().await;
        }
        // still inside the window: only the initial typing edge was emitted
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], SocketEvent::Typing { .. }));
        assert!(ctl.is_typing());

        tokio::time::advance(Duration::from_millis(2100)).await;
        tokio::task::yield_now().await;
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], SocketEvent::StopTyping { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_mid_typing_emits_closing_event() {
        let (ctl, mut rx) = controller();
        ctl.input();
        ctl.stop();

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], SocketEvent::StopTyping { .. }));

        // and the aborted timer never fires a duplicate
        tokio::time::advance(Duration::from_millis(3000)).await;
        tokio::task::yield_now().await;
        assert!(drain(&mut rx).is_empty());
    }
}
