use serenity::{
    model::application::{CommandDataOptionValue, CommandInteraction}
};

/// Extracts the user ID from a Discord command interaction.
///
/// Command interactions always carry a user, in guilds and in DMs alike.
pub fn get_user_id(command: &CommandInteraction) -> String {
    command.user.id.to_string()
}

/// Extracts an optional string option, trimmed. Blank values count as absent.
///
/// # Returns
/// * `Ok(None)` - If the option was not supplied or is blank
/// * `Ok(Some(String))` - The trimmed value
/// * `Err(serenity::Error)` - If the option is present but not a string
pub fn get_optional_string_option(command: &CommandInteraction, name: &str) -> serenity::Result<Option<String>> {
    let Some(option) = command.data.options.iter().find(|opt| opt.name == name) else {
        return Ok(None);
    };

    match &option.value {
        CommandDataOptionValue::String(s) => {
            let trimmed = s.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        _ => Err(serenity::Error::Other("Argument is not a string")),
    }
}

/// Extracts a required string option value from a Discord command interaction.
///
/// # Example
/// ```rust,ignore
/// let media_type = get_string_option(command, "media_type")?;
/// ```
pub fn get_string_option(command: &CommandInteraction, name: &str) -> serenity::Result<String> {
    get_optional_string_option(command, name)?
        .ok_or(serenity::Error::Other("Missing required argument"))
}

/// Extracts a required number option. Integer values are widened.
pub fn get_number_option(command: &CommandInteraction, name: &str) -> serenity::Result<f64> {
    let option = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .ok_or(serenity::Error::Other("Missing required argument"))?;

    match option.value {
        CommandDataOptionValue::Number(n) => Ok(n),
        CommandDataOptionValue::Integer(i) => Ok(i as f64),
        _ => Err(serenity::Error::Other("Argument is not a number")),
    }
}
