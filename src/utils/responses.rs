use serenity::builder::{CreateInteractionResponse, CreateInteractionResponseMessage};

pub fn default_response(message: &str) -> CreateInteractionResponse {
    let data = CreateInteractionResponseMessage::new().content(message);
    CreateInteractionResponse::Message(data)
}

/// Only the invoking user sees the message.
pub fn error_response(message: &str) -> CreateInteractionResponse {
    let data = CreateInteractionResponseMessage::new()
        .content(format!("❌ {}", message))
        .ephemeral(true);
    CreateInteractionResponse::Message(data)
}

pub fn day_count(days: u32) -> String {
    if days == 1 {
        "1 day".to_string()
    } else {
        format!("{} days", days)
    }
}
