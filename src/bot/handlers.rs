use anyhow::Result;
use serenity::{
    builder::{
        CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{error, info, warn};

use crate::{
    audio::queue::{Song, SongQueue},
    bot::QueueBot,
    error::EnqueueError,
    sources::search_term,
};

const ENQUEUE_FAILED: &str = "Could not add this song to the queue :(";
const NOT_IN_VOICE: &str = "🔇 Join a voice channel first";
const NOTHING_PLAYING: &str = "❌ Nothing is playing";

/// Dispatches slash commands.
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &QueueBot) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Command used outside of a server"))?;

    info!(
        "📝 Command /{} used by {} in guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "enqueue" => handle_enqueue(ctx, &command, bot, guild_id).await?,
        "skip" => handle_skip(ctx, &command, bot).await?,
        "queue" => handle_queue(ctx, &command, bot).await?,
        _ => {
            command
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .content("❌ Unknown command")
                            .ephemeral(true),
                    ),
                )
                .await?;
        }
    }

    Ok(())
}

async fn handle_enqueue(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &QueueBot,
    guild_id: GuildId,
) -> Result<()> {
    // Resolving runs yt-dlp, which can outlast the interaction deadline
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let query = search_term(string_option(command, "url"), string_option(command, "title"));

    let reply = match bot.enqueue(ctx, guild_id, command.user.id, &query).await {
        Ok(song) => enqueue_reply(&song),
        Err(EnqueueError::Resolve(e)) => {
            warn!("Could not resolve {:?}: {}", query, e);
            ENQUEUE_FAILED.to_string()
        }
        Err(EnqueueError::NotInVoiceChannel) => NOT_IN_VOICE.to_string(),
        Err(e) => {
            error!("❌ Could not start playback: {}", e);
            ENQUEUE_FAILED.to_string()
        }
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(reply))
        .await?;

    Ok(())
}

async fn handle_skip(ctx: &Context, command: &CommandInteraction, bot: &QueueBot) -> Result<()> {
    let reply = match bot.skip().await {
        Some(song) => format!("⏭️ Skipped {}", song.title),
        None => NOTHING_PLAYING.to_string(),
    };

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(CreateInteractionResponseMessage::new().content(reply)),
        )
        .await?;

    Ok(())
}

async fn handle_queue(ctx: &Context, command: &CommandInteraction, bot: &QueueBot) -> Result<()> {
    let reply = queue_reply(&bot.queue.read());

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(CreateInteractionResponseMessage::new().content(reply)),
        )
        .await?;

    Ok(())
}

// Helpers

pub fn enqueue_reply(song: &Song) -> String {
    format!("The song {} was added to the queue!\n {}", song.title, song.url)
}

pub fn queue_reply(queue: &SongQueue) -> String {
    format!("The queue is: {}", queue.titles().join(", "))
}

fn string_option<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

pub fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}
