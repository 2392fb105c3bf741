//! # Bot Module
//!
//! Discord side of the bot: slash command registration, interaction
//! dispatch and the single playback session.
//!
//! [`QueueBot`] implements Serenity's [`EventHandler`]. It owns the
//! process-wide [`SongQueue`](crate::audio::queue::SongQueue) and at most
//! one [`Session`]. An `enqueue` with no live session bootstraps one in the
//! requester's voice channel; otherwise the session is told a song arrived.

use anyhow::Result;
use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Interaction, Message, Ready, UserId, VoiceState},
    async_trait,
};
use std::{future::Future, sync::Arc};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

pub mod commands;
pub mod handlers;

use crate::{
    audio::{
        controller::{PlaybackController, PlaybackState, SessionEvent},
        queue::{SharedQueue, Song},
        session::{self, Session},
        voice::SongbirdBackend,
    },
    config::Config,
    error::{EnqueueError, PlaybackError},
    sources::SongResolver,
};

pub struct QueueBot {
    config: Arc<Config>,
    /// Shared song queue; outlives every session
    pub queue: SharedQueue,
    resolver: Arc<dyn SongResolver>,
    session: Mutex<Option<Session>>,
}

impl QueueBot {
    pub fn new(config: Config, queue: SharedQueue, resolver: Arc<dyn SongResolver>) -> Self {
        Self {
            config: Arc::new(config),
            queue,
            resolver,
            session: Mutex::new(None),
        }
    }

    /// Registers the slash commands in the configured guild.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        let guild_id = GuildId::new(self.config.guild_id);

        info!("📝 Started refreshing application (/) commands for guild {}", guild_id);
        commands::register_guild_commands(ctx, guild_id).await?;
        info!("✅ Successfully reloaded application (/) commands");

        Ok(())
    }

    /// Resolves `query`, appends it to the queue and makes sure a session is
    /// playing it.
    ///
    /// With no live session the requester must be in a voice channel.
    pub async fn enqueue(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        user_id: UserId,
        query: &str,
    ) -> Result<Song, EnqueueError> {
        // yt-dlp can take seconds; the session slot stays free meanwhile
        let song = self.resolver.resolve(query).await?;
        let voice_channel = handlers::user_voice_channel(ctx, guild_id, user_id);

        self.admit(song, voice_channel, |channel_id| {
            self.start_session(ctx, guild_id, channel_id)
        })
        .await
    }

    /// Queues a resolved song for the live session, or starts a session in
    /// `voice_channel` when there is none.
    async fn admit<F, Fut>(
        &self,
        song: Song,
        voice_channel: Option<ChannelId>,
        start: F,
    ) -> Result<Song, EnqueueError>
    where
        F: FnOnce(ChannelId) -> Fut,
        Fut: Future<Output = Result<Session, PlaybackError>>,
    {
        let mut slot = self.session.lock().await;

        let queued = match slot.as_ref().filter(|session| session.is_active()) {
            Some(session) => {
                self.queue.write().add(song.clone());
                if session.send(SessionEvent::Enqueued) {
                    return Ok(song);
                }
                warn!("Session ended while enqueueing {}, starting a new one", song.title);
                true
            }
            None => false,
        };

        let channel_id = voice_channel.ok_or(EnqueueError::NotInVoiceChannel)?;
        if !queued {
            self.queue.write().add(song.clone());
        }

        info!("🎧 Joining at channel {} for {}", channel_id, song.title);
        *slot = Some(start(channel_id).await?);

        Ok(song)
    }

    /// Stops the current song. Returns the song that was skipped, if any.
    pub async fn skip(&self) -> Option<Song> {
        let slot = self.session.lock().await;
        let session = slot.as_ref().filter(|session| session.is_active())?;

        if session.state() != PlaybackState::ConnectedPlaying {
            return None;
        }

        let current = self.queue.read().first().cloned();
        session.send(SessionEvent::Skip);
        current
    }

    async fn start_session(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Session, PlaybackError> {
        let manager = songbird::get(ctx).await.ok_or(PlaybackError::SongbirdMissing)?;

        let (events, receiver) = session::channel();
        let backend = SongbirdBackend::new(manager, guild_id, channel_id, events.clone());
        let controller = PlaybackController::new(
            self.queue.clone(),
            backend,
            self.config.retry_policy(),
            self.config.reconnect_timeout,
        );

        Ok(Session::spawn(controller, events, receiver))
    }
}

#[async_trait]
impl EventHandler for QueueBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 Logged in as {}!", ready.user.tag());

        // A failed registration does not stop the bot
        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error registering commands: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                error!("Error handling command: {:?}", e);
            }
        }
    }

    async fn message(&self, _ctx: Context, msg: Message) {
        debug!("💬 {}: {}", msg.author.name, msg.content);
    }

    /// Forwards the bot's own voice-state changes to the session.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let bot_id = ctx.cache.current_user().id;
        if new.user_id != bot_id {
            return;
        }

        let slot = self.session.lock().await;
        let Some(session) = slot.as_ref().filter(|session| session.is_active()) else {
            return;
        };

        // The first join is reported by the driver; only moves count here
        let previous = old.and_then(|state| state.channel_id);
        match (previous, new.channel_id) {
            (_, None) => {
                warn!("🔌 Bot left the voice channel");
                session.send(SessionEvent::Disconnected);
            }
            (Some(from), Some(to)) if from != to => {
                info!("📡 Moved from channel {} to {}", from, to);
                session.send(SessionEvent::Signalling);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::{controller::MockAudioBackend, queue::SongQueue, retry::Unbounded},
        sources::MockSongResolver,
    };
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn song(title: &str) -> Song {
        Song::new(title, format!("https://youtu.be/{title}"))
    }

    fn bot(queue: &SharedQueue) -> QueueBot {
        let config = Config {
            discord_token: "token".into(),
            application_id: 1,
            guild_id: 2,
            reconnect_timeout: Duration::from_secs(5),
            retry_max_attempts: 0,
            retry_backoff: Duration::ZERO,
            ytdlp_path: "yt-dlp".into(),
        };
        QueueBot::new(config, queue.clone(), Arc::new(MockSongResolver::new()))
    }

    fn session_with(queue: &SharedQueue, joins: bool) -> Session {
        let mut backend = MockAudioBackend::new();
        backend.expect_connect().returning(move || {
            if joins {
                Ok(())
            } else {
                Err(PlaybackError::NoCall)
            }
        });
        backend.expect_play().returning(|_| Ok(()));
        backend.expect_destroy().return_const(());

        let controller =
            PlaybackController::new(queue.clone(), backend, Box::new(Unbounded), Duration::from_secs(5));
        let (events, receiver) = session::channel();
        Session::spawn(controller, events, receiver)
    }

    async fn cannot_start(_channel: ChannelId) -> Result<Session, PlaybackError> {
        Err(PlaybackError::SongbirdMissing)
    }

    #[tokio::test]
    async fn first_song_starts_a_session() {
        let queue = SongQueue::shared();
        let bot = bot(&queue);

        let added = bot
            .admit(song("A"), Some(ChannelId::new(7)), |_| {
                let session = session_with(&queue, true);
                async move { Ok(session) }
            })
            .await
            .unwrap();

        assert_eq!(added, song("A"));
        assert_eq!(queue.read().titles(), vec!["A"]);
        assert!(bot.session.lock().await.is_some());
    }

    #[tokio::test]
    async fn requester_outside_voice_queues_nothing() {
        let queue = SongQueue::shared();
        let bot = bot(&queue);

        let result = bot.admit(song("A"), None, cannot_start).await;

        assert!(matches!(result, Err(EnqueueError::NotInVoiceChannel)));
        assert!(queue.read().is_empty());
        assert!(bot.session.lock().await.is_none());
    }

    #[tokio::test]
    async fn live_session_is_notified_without_starting_another() {
        let queue = SongQueue::shared();
        queue.write().add(song("A"));
        let bot = bot(&queue);
        *bot.session.lock().await = Some(session_with(&queue, true));

        let added = bot.admit(song("B"), None, cannot_start).await.unwrap();

        assert_eq!(added, song("B"));
        assert_eq!(queue.read().titles(), vec!["A", "B"]);
    }

    #[tokio::test(start_paused = true)]
    async fn ended_session_is_replaced() {
        let queue = SongQueue::shared();
        let bot = bot(&queue);

        let ended = session_with(&queue, false);
        while ended.is_active() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        *bot.session.lock().await = Some(ended);

        bot.admit(song("C"), Some(ChannelId::new(7)), |_| {
            let session = session_with(&queue, true);
            async move { Ok(session) }
        })
        .await
        .unwrap();

        assert_eq!(queue.read().titles(), vec!["C"]);
        let slot = bot.session.lock().await;
        assert!(slot.as_ref().is_some_and(Session::is_active));
    }
}
