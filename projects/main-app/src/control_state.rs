use std::sync::atomic::{AtomicBool, Ordering};

use tokio::{sync::Mutex, time::Instant};

use crate::core::state::ControlSnapshot;

#[derive(Debug, Default)]
struct ControlRecord {
    activation_pending: bool,
    resource_active: bool,
    activated_at: Option<Instant>,
}

/// Record shared between the event tasks and the controller.
///
/// Writers per field are fixed: event tasks set `activation_pending` and
/// `shutdown_requested`; the controller clears `activation_pending` and owns
/// `resource_active` and `activated_at`. `activated_at` is `Some` exactly when
/// `resource_active` is true.
#[derive(Debug, Default)]
pub struct ControlState {
    record: Mutex<ControlRecord>,
    shutdown_requested: AtomicBool,
}

impl ControlState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an activation unless one is already pending or running.
    /// Returns whether the press was accepted.
    pub async fn request_activation(&self) -> bool {
        let mut record = self.record.lock().await;
        if record.resource_active || record.activation_pending {
            return false;
        }
        record.activation_pending = true;
        true
    }

    /// Reads and clears the pending flag in one step.
    pub async fn take_pending(&self) -> bool {
        let mut record = self.record.lock().await;
        if record.resource_active {
            return false;
        }
        std::mem::take(&mut record.activation_pending)
    }

    pub async fn mark_active(&self, at: Instant) {
        let mut record = self.record.lock().await;
        record.resource_active = true;
        record.activated_at = Some(at);
    }

    pub async fn mark_inactive(&self) {
        let mut record = self.record.lock().await;
        record.resource_active = false;
        record.activated_at = None;
    }

    pub async fn activated_at(&self) -> Option<Instant> {
        let record = self.record.lock().await;
        record.activated_at
    }

    pub async fn is_active(&self) -> bool {
        self.record.lock().await.resource_active
    }

    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::Release);
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::Acquire)
    }

    pub async fn snapshot(&self) -> ControlSnapshot {
        let record = self.record.lock().await;
        ControlSnapshot {
            activation_pending: record.activation_pending,
            resource_active: record.resource_active,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::time::Instant;

    use super::ControlState;

    #[tokio::test]
    async fn press_while_pending_or_active_is_a_no_op() {
        let state = ControlState::new();
        assert!(state.request_activation().await);

        let queued = state.snapshot().await;
        assert!(!state.request_activation().await);
        assert_eq!(state.snapshot().await, queued);

        assert!(state.take_pending().await);
        state.mark_active(Instant::now()).await;
        let active = state.snapshot().await;
        for _ in 0..5 {
            assert!(!state.request_activation().await);
        }
        assert_eq!(state.snapshot().await, active);
    }

    #[tokio::test]
    async fn clearing_pending_twice_equals_clearing_once() {
        let state = ControlState::new();
        assert!(state.request_activation().await);

        assert!(state.take_pending().await);
        let once = state.snapshot().await;
        assert!(!state.take_pending().await);
        assert_eq!(state.snapshot().await, once);
        assert!(!once.activation_pending);
    }

    #[tokio::test]
    async fn activated_at_tracks_active_flag() {
        let state = ControlState::new();
        assert!(state.activated_at().await.is_none());

        state.mark_active(Instant::now()).await;
        assert!(state.is_active().await);
        assert!(state.activated_at().await.is_some());

        state.mark_inactive().await;
        assert!(!state.is_active().await);
        assert!(state.activated_at().await.is_none());
    }

    #[tokio::test]
    async fn shutdown_flag_is_monotonic() {
        let state = ControlState::new();
        assert!(!state.is_shutdown_requested());
        state.request_shutdown();
        state.request_shutdown();
        assert!(state.is_shutdown_requested());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_presses_queue_a_single_activation() {
        let state = Arc::new(ControlState::new());
        let mut handles = Vec::new();
        for _ in 0..32 {
            let state = state.clone();
            handles.push(tokio::spawn(async move { state.request_activation().await }));
        }

        let mut accepted = 0;
        for handle in handles {
            if handle.await.expect("press task should finish") {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 1);
        assert!(state.take_pending().await);
        assert!(!state.take_pending().await);
    }
}
