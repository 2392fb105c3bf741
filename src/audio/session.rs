use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::timeout_at,
};
use tracing::{debug, info};

use crate::audio::controller::{AudioBackend, PlaybackController, PlaybackState, SessionEvent};

pub type EventSender = mpsc::UnboundedSender<SessionEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

/// Creates the event channel a session is driven by. The sender half is
/// handed to the backend's voice callbacks before the session is spawned.
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// A running playback session: one controller on its own task, fed one
/// event at a time.
pub struct Session {
    events: EventSender,
    state: watch::Receiver<PlaybackState>,
    task: JoinHandle<()>,
}

impl Session {
    pub fn spawn<B>(controller: PlaybackController<B>, events: EventSender, receiver: EventReceiver) -> Self
    where
        B: AudioBackend + 'static,
    {
        let (state_tx, state) = watch::channel(controller.state());
        let task = tokio::spawn(run(controller, receiver, state_tx));

        Self { events, state, task }
    }

    /// Queues an event for the session. Returns `false` once the session is gone.
    pub fn send(&self, event: SessionEvent) -> bool {
        self.events.send(event).is_ok()
    }

    pub fn state(&self) -> PlaybackState {
        *self.state.borrow()
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

async fn run<B: AudioBackend>(
    mut controller: PlaybackController<B>,
    mut events: EventReceiver,
    state: watch::Sender<PlaybackState>,
) {
    controller.start().await;
    state.send_replace(controller.state());

    while controller.state() != PlaybackState::Destroyed {
        let next = match controller.recovery_deadline() {
            Some(deadline) => match timeout_at(deadline, events.recv()).await {
                Ok(event) => event,
                Err(_) => {
                    controller.recovery_timed_out().await;
                    state.send_replace(controller.state());
                    break;
                }
            },
            None => events.recv().await,
        };

        let Some(event) = next else {
            debug!("Session event channel closed");
            break;
        };

        controller.handle(event).await;
        state.send_replace(controller.state());
    }

    info!("👋 Playback session ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::{
            queue::{Song, SongQueue},
            retry::Unbounded,
        },
        error::PlaybackError,
    };
    use async_trait::async_trait;
    use std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        time::Duration,
    };
    use tokio::time::{sleep, Instant};

    #[derive(Clone, Default)]
    struct NullBackend {
        destroyed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl AudioBackend for NullBackend {
        async fn connect(&mut self) -> Result<(), PlaybackError> {
            Ok(())
        }

        async fn play(&mut self, _song: &Song) -> Result<(), PlaybackError> {
            Ok(())
        }

        async fn stop(&mut self) -> Result<(), PlaybackError> {
            Ok(())
        }

        async fn destroy(&mut self) {
            self.destroyed.store(true, Ordering::SeqCst);
        }
    }

    fn spawn_session(backend: NullBackend) -> Session {
        let queue = SongQueue::shared();
        queue.write().add(Song::new("A", "https://youtu.be/A"));

        let controller = PlaybackController::new(
            queue,
            backend,
            Box::new(Unbounded),
            Duration::from_secs(5),
        );
        let (events, receiver) = channel();
        Session::spawn(controller, events, receiver)
    }

    async fn wait_for(session: &Session, wanted: PlaybackState) {
        session
            .state
            .clone()
            .wait_for(|state| *state == wanted)
            .await
            .expect("session state channel closed");
    }

    #[tokio::test(start_paused = true)]
    async fn unrecovered_disconnect_destroys_after_timeout() {
        let backend = NullBackend::default();
        let session = spawn_session(backend.clone());

        session.send(SessionEvent::Ready);
        wait_for(&session, PlaybackState::ConnectedPlaying).await;

        let disconnected_at = Instant::now();
        session.send(SessionEvent::Disconnected);
        wait_for(&session, PlaybackState::Destroyed).await;

        assert!(disconnected_at.elapsed() >= Duration::from_secs(5));
        assert!(backend.destroyed.load(Ordering::SeqCst));

        sleep(Duration::from_millis(10)).await;
        assert!(!session.is_active());
        assert!(!session.send(SessionEvent::Ready));
    }

    #[tokio::test(start_paused = true)]
    async fn reconnecting_within_timeout_keeps_the_connection() {
        let backend = NullBackend::default();
        let session = spawn_session(backend.clone());

        session.send(SessionEvent::Ready);
        session.send(SessionEvent::Disconnected);
        wait_for(&session, PlaybackState::DisconnectedRecovering).await;

        sleep(Duration::from_secs(3)).await;
        session.send(SessionEvent::Connecting);
        wait_for(&session, PlaybackState::Connecting).await;

        sleep(Duration::from_secs(10)).await;
        assert_eq!(session.state(), PlaybackState::Connecting);
        assert!(!backend.destroyed.load(Ordering::SeqCst));
        assert!(session.is_active());

        session.send(SessionEvent::Ready);
        wait_for(&session, PlaybackState::ConnectedPlaying).await;
    }

    #[tokio::test(start_paused = true)]
    async fn signalling_also_counts_as_recovery() {
        let backend = NullBackend::default();
        let session = spawn_session(backend.clone());

        session.send(SessionEvent::Ready);
        session.send(SessionEvent::Disconnected);
        session.send(SessionEvent::Signalling);
        wait_for(&session, PlaybackState::Signalling).await;

        sleep(Duration::from_secs(6)).await;
        assert!(!backend.destroyed.load(Ordering::SeqCst));
    }
}
