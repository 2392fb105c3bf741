//! Playback state machine for a single voice session.
//!
//! The controller owns the audio backend and reacts to [`SessionEvent`]s one
//! at a time. It never touches Discord directly: joining, playing and tearing
//! down go through the [`AudioBackend`] seam.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        queue::{SharedQueue, Song},
        retry::{RetryDecision, RetryPolicy},
    },
    error::PlaybackError,
};

/// Observable state of a playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Connecting,
    Signalling,
    ConnectedPlaying,
    ConnectedIdle,
    DisconnectedRecovering,
    Destroyed,
}

/// Everything that can happen to a session: connection status changes,
/// player status changes and user requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Signalling,
    Connecting,
    Ready,
    Disconnected,
    PlayerPlaying,
    PlayerIdle,
    PlayerError(String),
    Enqueued,
    Skip,
}

/// Voice connection plus audio player, as seen by the controller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioBackend: Send {
    /// Joins the voice channel and wires the lifecycle callbacks.
    async fn connect(&mut self) -> Result<(), PlaybackError>;

    /// Replaces whatever is playing with `song`.
    async fn play(&mut self, song: &Song) -> Result<(), PlaybackError>;

    /// Stops the current track. The player reports idle afterwards.
    async fn stop(&mut self) -> Result<(), PlaybackError>;

    /// Leaves the channel for good.
    async fn destroy(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Idle,
    Connecting,
    Signalling,
    Ready,
    Recovering,
    Destroyed,
}

pub struct PlaybackController<B: AudioBackend> {
    queue: SharedQueue,
    backend: B,
    retry: Box<dyn RetryPolicy>,
    reconnect_timeout: Duration,
    link: Link,
    connected_once: bool,
    playing: bool,
    attempts: u32,
    recovery_deadline: Option<Instant>,
}

impl<B: AudioBackend> PlaybackController<B> {
    pub fn new(
        queue: SharedQueue,
        backend: B,
        retry: Box<dyn RetryPolicy>,
        reconnect_timeout: Duration,
    ) -> Self {
        Self {
            queue,
            backend,
            retry,
            reconnect_timeout,
            link: Link::Idle,
            connected_once: false,
            playing: false,
            attempts: 0,
            recovery_deadline: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        match self.link {
            Link::Idle => PlaybackState::Idle,
            Link::Connecting => PlaybackState::Connecting,
            Link::Signalling => PlaybackState::Signalling,
            Link::Ready if self.playing => PlaybackState::ConnectedPlaying,
            Link::Ready => PlaybackState::ConnectedIdle,
            Link::Recovering => PlaybackState::DisconnectedRecovering,
            Link::Destroyed => PlaybackState::Destroyed,
        }
    }

    /// When set, the session must be torn down if no reconnect progress
    /// arrives before this instant.
    pub fn recovery_deadline(&self) -> Option<Instant> {
        self.recovery_deadline
    }

    /// `Idle -> Connecting`: joins the channel through the backend.
    pub async fn start(&mut self) {
        if self.link != Link::Idle {
            return;
        }

        self.link = Link::Connecting;
        info!("🔌 Connecting to voice channel");

        if let Err(e) = self.backend.connect().await {
            error!("❌ Could not join voice channel: {}", e);
            self.backend.destroy().await;
            self.link = Link::Destroyed;
            self.playing = false;
        }
    }

    pub async fn handle(&mut self, event: SessionEvent) {
        if self.link == Link::Destroyed {
            debug!("Ignoring {:?} on destroyed session", event);
            return;
        }

        match event {
            SessionEvent::Signalling => self.on_connection_progress(Link::Signalling),
            SessionEvent::Connecting => self.on_connection_progress(Link::Connecting),
            SessionEvent::Ready => self.on_ready().await,
            SessionEvent::Disconnected => self.on_disconnected(),
            SessionEvent::PlayerPlaying => {
                info!("▶️ The audio player has started playing");
            }
            SessionEvent::PlayerIdle => self.on_player_idle().await,
            SessionEvent::PlayerError(reason) => self.on_player_error(&reason).await,
            SessionEvent::Enqueued => self.on_enqueued().await,
            SessionEvent::Skip => self.on_skip().await,
        }
    }

    /// The recovery window elapsed without the connection coming back.
    pub async fn recovery_timed_out(&mut self) {
        warn!(
            "⏱️ Connection did not recover within {:?}, destroying it",
            self.reconnect_timeout
        );
        self.recovery_deadline = None;
        self.backend.destroy().await;
        self.link = Link::Destroyed;
        self.playing = false;
    }

    fn on_connection_progress(&mut self, link: Link) {
        if self.link == Link::Recovering {
            info!("🔄 Connection is reconnecting ({:?})", link);
            self.recovery_deadline = None;
        } else {
            debug!("Connection status: {:?}", link);
        }
        self.link = link;
    }

    /// Playback always starts from the head, so songs left over from an
    /// earlier session play before the one that started this session.
    async fn on_ready(&mut self) {
        self.recovery_deadline = None;
        self.link = Link::Ready;

        if self.connected_once {
            info!("✅ Reconnected");
        } else {
            info!("✅ Connected");
            self.connected_once = true;
        }

        if !self.playing {
            let head = self.head();
            if head.is_some() {
                self.start_song(head).await;
            }
        }
    }

    fn on_disconnected(&mut self) {
        match self.link {
            Link::Idle | Link::Recovering | Link::Destroyed => {}
            _ => {
                warn!("🔌 Disconnected, waiting {:?} for reconnect", self.reconnect_timeout);
                self.link = Link::Recovering;
                self.recovery_deadline = Some(Instant::now() + self.reconnect_timeout);
            }
        }
    }

    async fn on_player_idle(&mut self) {
        if !self.playing {
            debug!("Player idle with nothing playing");
            return;
        }

        self.playing = false;
        self.attempts = 0;
        self.queue.write().shift();

        let head = self.head();
        self.start_song(head).await;
    }

    async fn on_player_error(&mut self, reason: &str) {
        if !self.connected_once {
            debug!("Player error before first song: {}", reason);
            return;
        }

        error!("❌ Error: {} with resource", reason);
        self.playing = false;

        let next = self.after_failure().await;
        self.start_song(next).await;
    }

    async fn on_enqueued(&mut self) {
        if self.link == Link::Ready && !self.playing {
            let head = self.head();
            self.start_song(head).await;
        }
    }

    async fn on_skip(&mut self) {
        if !self.playing {
            debug!("Skip requested with nothing playing");
            return;
        }

        info!("⏭️ Skipping current song");
        if let Err(e) = self.backend.stop().await {
            error!("Error stopping current track: {}", e);
        }
    }

    /// Plays `song`, consulting the retry policy for as long as the backend
    /// refuses it. `None` leaves the player idle.
    async fn start_song(&mut self, mut song: Option<Song>) {
        loop {
            let Some(current) = song.take() else {
                self.playing = false;
                info!("💤 The audio player is idle");
                return;
            };

            match self.backend.play(&current).await {
                Ok(()) => {
                    self.playing = true;
                    info!("🎵 Playing: {}", current.title);
                    return;
                }
                Err(e) => {
                    error!("❌ Error: {} with resource {}", e, current.url);
                    song = self.after_failure().await;
                }
            }
        }
    }

    /// Applies the retry policy to the failed head and returns what to play next.
    async fn after_failure(&mut self) -> Option<Song> {
        self.attempts += 1;

        match self.retry.on_error(self.attempts) {
            RetryDecision::Retry { delay } if delay.is_zero() => {
                tokio::task::yield_now().await;
            }
            RetryDecision::Retry { delay } => {
                debug!("Retrying in {:?} (attempt {})", delay, self.attempts);
                tokio::time::sleep(delay).await;
            }
            RetryDecision::GiveUp => {
                let dropped = self.queue.write().shift();
                if let Some(song) = dropped {
                    warn!(
                        "⏭️ Giving up on {} after {} failed attempts",
                        song.title, self.attempts
                    );
                }
                self.attempts = 0;
            }
        }

        self.head()
    }

    fn head(&self) -> Option<Song> {
        self.queue.read().first().cloned()
    }
}
