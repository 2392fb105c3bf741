//! Songbird implementation of [`AudioBackend`].
//!
//! Songbird's driver and track events are translated into [`SessionEvent`]s
//! and pushed onto the session channel, so the controller only ever sees
//! typed events in arrival order.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    events::CoreEvent,
    input::{Input, YoutubeDl},
    tracks::PlayMode,
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        controller::{AudioBackend, SessionEvent},
        queue::Song,
        session::EventSender,
    },
    error::PlaybackError,
};

pub struct SongbirdBackend {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    channel_id: ChannelId,
    events: EventSender,
    http: reqwest::Client,
    call: Option<Arc<Mutex<Call>>>,
}

impl SongbirdBackend {
    pub fn new(
        manager: Arc<Songbird>,
        guild_id: GuildId,
        channel_id: ChannelId,
        events: EventSender,
    ) -> Self {
        Self {
            manager,
            guild_id,
            channel_id,
            events,
            http: reqwest::Client::new(),
            call: None,
        }
    }

    fn notify(&self, event: SessionEvent) {
        forward(&self.events, event);
    }
}

#[async_trait]
impl AudioBackend for SongbirdBackend {
    async fn connect(&mut self) -> Result<(), PlaybackError> {
        info!(
            "🔊 Joining voice channel {} in guild {}",
            self.channel_id, self.guild_id
        );

        let call = self.manager.get_or_insert(self.guild_id);
        {
            let mut handler = call.lock().await;
            register_voice_events(&mut handler, &self.events);
        }

        self.notify(SessionEvent::Signalling);
        let join = {
            let mut handler = call.lock().await;
            handler.join(self.channel_id).await
        };

        let result = match join {
            Ok(join) => {
                self.notify(SessionEvent::Connecting);
                join.await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            if let Err(remove_error) = self.manager.remove(self.guild_id).await {
                debug!("Nothing to clean up after failed join: {:?}", remove_error);
            }
            return Err(PlaybackError::Join(e));
        }

        self.call = Some(call);
        Ok(())
    }

    async fn play(&mut self, song: &Song) -> Result<(), PlaybackError> {
        let call = self.call.as_ref().ok_or(PlaybackError::NoCall)?;

        let source = YoutubeDl::new(self.http.clone(), song.url.clone());
        let mut handler = call.lock().await;
        handler.play_only_input(Input::from(source));

        Ok(())
    }

    async fn stop(&mut self) -> Result<(), PlaybackError> {
        let call = self.call.as_ref().ok_or(PlaybackError::NoCall)?;
        call.lock().await.stop();
        Ok(())
    }

    async fn destroy(&mut self) {
        self.call = None;
        match self.manager.remove(self.guild_id).await {
            Ok(()) => info!("👋 Left voice channel in guild {}", self.guild_id),
            Err(e) => error!("Error leaving voice channel: {:?}", e),
        }
    }
}

fn forward(events: &EventSender, event: SessionEvent) {
    if let Err(e) = events.send(event) {
        debug!("Session already gone, dropping {:?}", e.0);
    }
}

/// Maps a track event to a session event, given the play modes of the
/// tracks it fired for.
fn track_event(kind: TrackEvent, modes: &[&PlayMode]) -> Option<SessionEvent> {
    match kind {
        TrackEvent::Play => Some(SessionEvent::PlayerPlaying),
        TrackEvent::Error => Some(SessionEvent::PlayerError(error_reason(modes))),
        // Errored tracks fire End right after Error; the head must not advance
        TrackEvent::End if modes.iter().any(|mode| matches!(mode, PlayMode::Errored(_))) => None,
        TrackEvent::End => Some(SessionEvent::PlayerIdle),
        _ => None,
    }
}

fn error_reason(modes: &[&PlayMode]) -> String {
    let reasons: Vec<String> = modes
        .iter()
        .filter_map(|mode| match mode {
            PlayMode::Errored(e) => Some(e.to_string()),
            _ => None,
        })
        .collect();

    if reasons.is_empty() {
        String::from("unknown track error")
    } else {
        reasons.join(", ")
    }
}

fn connection_events(event: CoreEvent) -> Vec<SessionEvent> {
    match event {
        CoreEvent::DriverConnect => vec![SessionEvent::Ready],
        CoreEvent::DriverReconnect => vec![SessionEvent::Connecting, SessionEvent::Ready],
        CoreEvent::DriverDisconnect => vec![SessionEvent::Disconnected],
        _ => Vec::new(),
    }
}

/// Forwards the end, error and start of every track on the call.
struct TrackNotifier {
    events: EventSender,
    kind: TrackEvent,
}

#[async_trait]
impl VoiceEventHandler for TrackNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let modes: Vec<&PlayMode> = match ctx {
            EventContext::Track(tracks) => tracks.iter().map(|(state, _handle)| &state.playing).collect(),
            _ => Vec::new(),
        };

        match track_event(self.kind, &modes) {
            Some(event) => forward(&self.events, event),
            None => debug!("Not forwarding {:?}", self.kind),
        }

        None
    }
}

/// Forwards driver connection changes.
struct ConnectionNotifier {
    events: EventSender,
    kind: CoreEvent,
}

#[async_trait]
impl VoiceEventHandler for ConnectionNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::DriverDisconnect(data) = ctx {
            warn!("🔌 Voice driver disconnected: {:?}", data.reason);
        }

        for event in connection_events(self.kind) {
            forward(&self.events, event);
        }

        None
    }
}

fn register_voice_events(handler: &mut Call, events: &EventSender) {
    for kind in [TrackEvent::End, TrackEvent::Error, TrackEvent::Play] {
        handler.add_global_event(
            Event::Track(kind),
            TrackNotifier {
                events: events.clone(),
                kind,
            },
        );
    }

    for kind in [
        CoreEvent::DriverConnect,
        CoreEvent::DriverReconnect,
        CoreEvent::DriverDisconnect,
    ] {
        handler.add_global_event(
            Event::Core(kind),
            ConnectionNotifier {
                events: events.clone(),
                kind,
            },
        );
    }
}
