use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::application::{CommandInteraction, CommandOptionType},
    prelude::*,
};
use crate::{
    bot::SharedBotData,
    data::MediaType,
    immersion::{parse_media_type, LogError, LogOutcome, NewActivity},
    utils::{
        command_helpers::{get_number_option, get_optional_string_option, get_string_option, get_user_id},
        responses::{day_count, default_response, error_response},
    },
};
use tracing::{debug, error, info};

pub fn register() -> CreateCommand {
    let media_option = MediaType::ALL.into_iter().fold(
        CreateCommandOption::new(
            CommandOptionType::String,
            "media_type",
            "The kind of immersion to log"
        )
        .required(true),
        |option, media| {
            option.add_string_choice(format!("{} (in {})", media.label(), media.unit()), media.as_str())
        },
    );

    CreateCommand::new("immersion")
        .description("Log a Japanese immersion activity")
        .add_option(media_option)
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Number,
                "amount",
                "Amount (episodes, pages, minutes, characters)"
            )
            .required(true)
        )
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "title", "Title of the media")
                .required(false)
                .max_length(200)
        )
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "comment", "Extra notes")
                .required(false)
                .max_length(500)
        )
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "date",
                "Date in YYYY-MM-DD format (defaults to today)"
            )
            .required(false)
        )
}

pub fn outcome_message(outcome: &LogOutcome) -> String {
    let media = outcome.log.media_type;
    let mut message = format!(
        "{} logged for {}: +{} {} (total {} {}).",
        media.label(),
        outcome.log.logged_date,
        outcome.log.amount,
        media.unit(),
        outcome.stats.total,
        media.unit(),
    );
    match &outcome.streaks {
        Some(streaks) => {
            message.push_str(&format!("\nStreak: {}", day_count(streaks.overall.current)));
            if streaks.media.current > 0 {
                message.push_str(&format!(" ({} streak: {})", media.label(), day_count(streaks.media.current)));
            }
        }
        None => message.push_str("\nStreak will update at the next refresh."),
    }
    if let Some(title) = &outcome.log.title {
        message.push_str(&format!("\nTitle: {}", title));
    }
    message
}

pub async fn run(
    ctx: &Context,
    command: &CommandInteraction,
    data: SharedBotData,
) -> serenity::Result<()> {
    info!("Immersion command executed by user {}", command.user.id);

    let result = match parse_media_type(&get_string_option(command, "media_type")?) {
        Ok(media_type) => {
            let activity = NewActivity {
                user_id: get_user_id(command),
                media_type,
                amount: get_number_option(command, "amount")?,
                title: get_optional_string_option(command, "title")?,
                comment: get_optional_string_option(command, "comment")?,
                custom_date: get_optional_string_option(command, "date")?,
            };
            data.logger.log_activity(activity).await
        }
        Err(e) => Err(e),
    };

    let response = match result {
        Ok(outcome) => default_response(&outcome_message(&outcome)),
        Err(LogError::Store(e)) => {
            error!("Failed to log immersion for user {}: {:#}", command.user.id, e);
            error_response("Failed to log immersion. Please try again.")
        }
        Err(e) => {
            debug!("Rejected immersion log from user {}: {}", command.user.id, e);
            error_response(&e.to_string())
        }
    };

    command.create_response(&ctx.http, response).await?;
    Ok(())
}
