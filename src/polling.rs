use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::SearchBackend;
use crate::session::{PollOutcome, SharedSession};

pub const POLL_FAILED_STATUS: &str = "Failed polling attempt...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Wait before the first poll after a reset
    pub initial_delay: Duration,
    /// Wait between polls after that
    pub delay: Duration,
    /// Consecutive failures tolerated before giving up
    pub retries: u32,
}

/// Why a polling loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollExit {
    Stopped,
    Cancelled,
    Stale,
    Failed,
}

/// Running polling loop. Cancelling or dropping the handle ends the loop,
/// even while a request is in flight.
pub struct PollHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<PollExit>,
    recording_id: Uuid,
}

impl PollHandle {
    pub fn recording_id(&self) -> Uuid {
        self.recording_id
    }

    pub fn cancel(&self) {
        let _ = self.shutdown.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn join(self) -> PollExit {
        let PollHandle { shutdown, task, .. } = self;
        let exit = task.await.unwrap_or(PollExit::Cancelled);
        drop(shutdown);
        exit
    }
}

/// Start polling for `recording_id`
pub fn spawn(
    backend: Arc<dyn SearchBackend>,
    session: SharedSession,
    recording_id: Uuid,
    settings: PollSettings,
) -> PollHandle {
    let (shutdown, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(run(backend, session, recording_id, settings, shutdown_rx));
    PollHandle {
        shutdown,
        task,
        recording_id,
    }
}

async fn run(
    backend: Arc<dyn SearchBackend>,
    session: SharedSession,
    recording_id: Uuid,
    settings: PollSettings,
    mut shutdown: watch::Receiver<bool>,
) -> PollExit {
    let mut delay = settings.initial_delay;
    let mut failures = 0u32;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => return PollExit::Cancelled,
        }

        let polled = tokio::select! {
            polled = backend.poll_events(false) => polled,
            _ = shutdown.changed() => return PollExit::Cancelled,
        };
        if *shutdown.borrow() {
            return PollExit::Cancelled;
        }

        match polled {
            Ok(payload) => {
                failures = 0;
                let mut session = session.lock().await;
                match session.apply_poll(recording_id, payload) {
                    PollOutcome::Continue => {}
                    PollOutcome::Stopped => {
                        info!(%recording_id, "backend stopped recording");
                        return PollExit::Stopped;
                    }
                    PollOutcome::Stale => {
                        debug!(%recording_id, "recording no longer active");
                        return PollExit::Stale;
                    }
                }
            }
            Err(err) => {
                failures += 1;
                if failures > settings.retries {
                    warn!(%recording_id, error = %err, "polling failed, giving up");
                    let mut session = session.lock().await;
                    if session.is_current(recording_id) {
                        session.stop_recording();
                        session.set_status(POLL_FAILED_STATUS);
                        session.alert(format!("Error: {err}"));
                    }
                    return PollExit::Failed;
                }
                warn!(%recording_id, attempt = failures, error = %err, "poll failed, retrying");
            }
        }

        delay = settings.delay;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use crate::fake_backend::{event, ScriptedBackend};
    use crate::models::PollPayload;
    use crate::session::Session;

    fn fast(retries: u32) -> PollSettings {
        PollSettings {
            initial_delay: Duration::from_millis(1),
            delay: Duration::from_millis(1),
            retries,
        }
    }

    #[tokio::test]
    async fn test_accumulates_until_stopped() {
        let a = event("A", 1);
        let b = event("B", 2);
        let c = event("C", 3);
        let backend = Arc::new(ScriptedBackend::with_polls(vec![
            Ok(PollPayload::Events(vec![a.clone(), b.clone()])),
            Ok(PollPayload::Events(vec![c.clone()])),
            Ok(PollPayload::Stopped),
        ]));
        let session = Session::shared();
        let id = session.lock().await.begin_recording();

        let handle = spawn(backend.clone(), session.clone(), id, fast(0));
        assert_eq!(handle.join().await, PollExit::Stopped);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(backend.poll_calls(), 3);
        assert_eq!(session.lock().await.demo().events, vec![a, b, c]);
    }

    #[tokio::test]
    async fn test_cancel_stops_polling() {
        let backend = Arc::new(ScriptedBackend::default());
        let session = Session::shared();
        let id = session.lock().await.begin_recording();
        let settings = PollSettings {
            initial_delay: Duration::from_secs(60),
            delay: Duration::from_secs(60),
            retries: 0,
        };

        let handle = spawn(backend.clone(), session, id, settings);
        handle.cancel();
        assert_eq!(handle.join().await, PollExit::Cancelled);
        assert_eq!(backend.poll_calls(), 0);
    }

    #[tokio::test]
    async fn test_dropping_handle_cancels() {
        let backend = Arc::new(ScriptedBackend::default());
        let session = Session::shared();
        let id = session.lock().await.begin_recording();

        let handle = spawn(backend.clone(), session, id, fast(0));
        drop(handle);
        tokio::time::sleep(Duration::from_millis(30)).await;
        let calls = backend.poll_calls();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(backend.poll_calls(), calls);
    }

    #[tokio::test]
    async fn test_stale_recording_ends_loop() {
        let backend = Arc::new(ScriptedBackend::with_polls(vec![Ok(PollPayload::Events(vec![
            event("late", 9),
        ]))]));
        let session = Session::shared();
        let old = session.lock().await.begin_recording();
        session.lock().await.begin_recording();

        let handle = spawn(backend, session.clone(), old, fast(0));
        assert_eq!(handle.join().await, PollExit::Stale);
        assert!(session.lock().await.demo().is_empty());
    }

    #[tokio::test]
    async fn test_retries_then_recovers() {
        let backend = Arc::new(ScriptedBackend::with_polls(vec![
            Err(BackendError::Empty("pollForEvents")),
            Ok(PollPayload::Events(vec![event("A", 1)])),
            Ok(PollPayload::Stopped),
        ]));
        let session = Session::shared();
        let id = session.lock().await.begin_recording();

        let handle = spawn(backend, session.clone(), id, fast(1));
        assert_eq!(handle.join().await, PollExit::Stopped);
        let mut session = session.lock().await;
        assert_eq!(session.demo().len(), 1);
        assert!(session.take_alerts().is_empty());
    }

    #[tokio::test]
    async fn test_zero_retries_fails_on_first_error() {
        let backend = Arc::new(ScriptedBackend::with_polls(vec![
            Err(BackendError::Empty("pollForEvents")),
            Ok(PollPayload::Events(vec![event("never", 1)])),
        ]));
        let session = Session::shared();
        let id = session.lock().await.begin_recording();

        let handle = spawn(backend.clone(), session.clone(), id, fast(0));
        assert_eq!(handle.join().await, PollExit::Failed);
        assert_eq!(backend.poll_calls(), 1);

        let mut session = session.lock().await;
        assert!(!session.recording());
        assert_eq!(session.take_alerts(), vec!["Error: pollForEvents returned no data"]);
        assert!(session.demo().is_empty());
    }

    #[tokio::test]
    async fn test_gives_up_after_retries() {
        let backend = Arc::new(ScriptedBackend::with_polls(vec![
            Err(BackendError::Signaled("index offline".into())),
            Err(BackendError::Signaled("index offline".into())),
            Ok(PollPayload::Events(vec![event("never", 1)])),
        ]));
        let session = Session::shared();
        let id = session.lock().await.begin_recording();

        let handle = spawn(backend.clone(), session.clone(), id, fast(1));
        assert_eq!(handle.join().await, PollExit::Failed);
        assert_eq!(backend.poll_calls(), 2);

        let mut session = session.lock().await;
        assert_eq!(session.status(), POLL_FAILED_STATUS);
        assert!(!session.recording());
        assert_eq!(
            session.take_alerts(),
            vec!["Error: backend reported an error: index offline"]
        );
        assert!(session.demo().is_empty());
    }
}
