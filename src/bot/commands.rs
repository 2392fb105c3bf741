use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

/// Registers the slash commands in the configured guild.
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

pub fn all_commands() -> Vec<CreateCommand> {
    vec![enqueue_command(), skip_command(), queue_command()]
}

fn enqueue_command() -> CreateCommand {
    CreateCommand::new("enqueue")
        .description("Put a song in the queue")
        .add_option(CreateCommandOption::new(
            CommandOptionType::String,
            "url",
            "The music url",
        ))
        .add_option(CreateCommandOption::new(
            CommandOptionType::String,
            "title",
            "Music title",
        ))
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Skip current song")
}

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue").description("Show the queue")
}
