pub mod immersion;
pub mod streak;

use serenity::{
    model::application::{Command, Interaction},
    prelude::*,
};
use crate::bot::SharedBotData;

pub async fn register_commands(ctx: &Context) -> serenity::Result<()> {
    let commands = vec![
        immersion::register(),
        streak::register(),
    ];

    Command::set_global_commands(&ctx.http, commands).await?;
    Ok(())
}

pub async fn handle_command(
    ctx: &Context,
    interaction: &Interaction,
    data: SharedBotData,
) -> serenity::Result<()> {
    if let Interaction::Command(command) = interaction {
        match command.data.name.as_str() {
            "immersion" => immersion::run(ctx, command, data).await?,
            "streak" => streak::run(ctx, command, data).await?,
            _ => {
                tracing::warn!("Unknown command: {}", command.data.name);
            }
        }
    }
    Ok(())
}
