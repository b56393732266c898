use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::application::{CommandInteraction, CommandOptionType},
    prelude::*,
};
use crate::{
    bot::SharedBotData,
    data::{CategoryStats, MediaType, StreakResult, UserSummary},
    utils::{
        command_helpers::{get_optional_string_option, get_user_id},
        responses::{day_count, default_response, error_response},
    },
};
use tracing::{error, info};

pub fn register() -> CreateCommand {
    let media_option = MediaType::ALL.into_iter().fold(
        CreateCommandOption::new(
            CommandOptionType::String,
            "media_type",
            "Only show the streak for this kind of immersion"
        )
        .required(false),
        |option, media| option.add_string_choice(media.label(), media.as_str()),
    );

    CreateCommand::new("streak")
        .description("Show your immersion streaks")
        .add_option(media_option)
}

fn category_label(category: &str) -> String {
    category
        .parse::<MediaType>()
        .map(|media| media.label().to_string())
        .unwrap_or_else(|_| category.to_string())
}

fn streak_line(label: &str, streak: &StreakResult) -> String {
    format!("{}: {} (best {})", label, day_count(streak.current), day_count(streak.longest))
}

fn profile_line(profile: &UserSummary) -> String {
    let mut line = format!(
        "{} {} across {} media {}",
        profile.total_sessions,
        if profile.total_sessions == 1 { "session" } else { "sessions" },
        profile.active_types.len(),
        if profile.active_types.len() == 1 { "type" } else { "types" },
    );
    if let Some(joined_at) = profile.joined_at {
        line.push_str(&format!(", logging since {}", joined_at.format("%Y-%m-%d")));
    }
    line
}

/// Best-of streak followed by one line per media type and the user's profile.
pub fn overview_message(overall: &StreakResult, stats: &[CategoryStats], profile: &UserSummary) -> String {
    if overall.longest == 0 {
        return "No immersion logged yet. Use `/immersion` to start a streak!".to_string();
    }

    let mut message = streak_line("Overall", overall);
    for entry in stats {
        let streak = StreakResult {
            current: entry.current_streak,
            longest: entry.best_streak,
        };
        message.push('\n');
        message.push_str(&streak_line(&category_label(&entry.media_type), &streak));
        if let Ok(media) = entry.media_type.parse::<MediaType>() {
            message.push_str(&format!(", {} {} total", entry.total, media.unit()));
        }
    }
    message.push('\n');
    message.push_str(&profile_line(profile));
    message
}

async fn load_overview(data: &SharedBotData, user_id: &str) -> anyhow::Result<String> {
    let summary = match data.db.fetch_streak_aggregate(user_id).await? {
        Some(summary) => summary,
        None => data.streaks.refresh_and_persist_streaks(user_id).await?,
    };
    let stats = data.db.fetch_user_stats(user_id).await?;
    let profile = UserSummary::new(&stats, data.db.fetch_joined_at(user_id).await?);
    Ok(overview_message(&summary.overall, &stats, &profile))
}

pub async fn run(
    ctx: &Context,
    command: &CommandInteraction,
    data: SharedBotData,
) -> serenity::Result<()> {
    info!("Streak command executed by user {}", command.user.id);
    let user_id = get_user_id(command);

    let content = match get_optional_string_option(command, "media_type")? {
        Some(category) => data
            .streaks
            .get_streak_for_category(&user_id, &category)
            .await
            .map(|streak| streak_line(&category_label(&category), &streak)),
        None => load_overview(&data, &user_id).await,
    };

    let response = match content {
        Ok(content) => default_response(&content),
        Err(e) => {
            error!("Failed to load streaks for user {}: {:#}", user_id, e);
            error_response("Failed to load your streaks. Please try again.")
        }
    };

    command.create_response(&ctx.http, response).await?;
    Ok(())
}
