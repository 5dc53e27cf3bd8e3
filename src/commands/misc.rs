use serenity::all::{Colour, Context, CreateEmbed, CreateMessage, GetMessages, Message};

use super::{Args, CommandError, CommandResult, COMMANDS, PREFIX};
use crate::bot::Handler;
use crate::utils::{or_dash, truncate};
use crate::VERSION;

const SOURCE_URL: &str = "https://github.com/adn770/ve-bot";
const INFO_COLOUR: u32 = 0x8c9eff;
const MAX_DELETE: u8 = 100;

pub async fn ping(ctx: &Context, msg: &Message) -> CommandResult {
    tracing::info!("ping");
    msg.channel_id.say(&ctx.http, "pong").await?;
    Ok(())
}

pub async fn info(bot: &Handler, ctx: &Context, msg: &Message) -> CommandResult {
    let app = ctx.http.get_current_application_info().await?;
    let details = bot.state.read().await.settings.details();
    let owner = app
        .owner
        .as_ref()
        .map(|owner| owner.tag())
        .unwrap_or_else(|| "unknown".to_string());
    let avatar = ctx.cache.current_user().face();

    let source = [
        format!("vebot {VERSION}"),
        "Using serenity".to_string(),
        format!("Source in [Github]({SOURCE_URL})"),
    ];

    let embed = CreateEmbed::new()
        .title(format!("{} v{VERSION}", app.name))
        .colour(Colour::new(INFO_COLOUR))
        .field("Settings", details, false)
        .field("Developer", owner, false)
        .field("Source made with", source.join("\n"), false)
        .thumbnail(avatar);

    msg.channel_id
        .send_message(&ctx.http, CreateMessage::new().embed(embed))
        .await?;
    Ok(())
}

/// Role names sorted for display, with `@` escaped so they do not mention anyone.
pub fn display_roles(names: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut roles: Vec<String> = names
        .into_iter()
        .map(|name| {
            if name.starts_with('@') {
                format!("\\{name}")
            } else {
                name
            }
        })
        .collect();
    roles.sort();
    roles
}

pub async fn me(ctx: &Context, msg: &Message) -> CommandResult {
    let author = &msg.author;
    let display_name = msg
        .author_nick(ctx)
        .await
        .unwrap_or_else(|| author.display_name().to_string());

    let mut top_role = "@everyone".to_string();
    let mut role_names = vec!["@everyone".to_string()];
    if msg.guild_id.is_some() {
        let member = msg.member(ctx).await?;
        if let Some(mut roles) = member.roles(&ctx.cache) {
            roles.sort_by_key(|role| std::cmp::Reverse(role.position));
            if let Some(role) = roles.first() {
                top_role = role.name.clone();
            }
            role_names.extend(roles.into_iter().map(|role| role.name));
        }
    }
    let roles = display_roles(role_names);

    let embed = CreateEmbed::new()
        .title(author.tag())
        .thumbnail(author.face())
        .field("Display name", display_name, true)
        .field("Id", author.id.to_string(), true)
        .field("Top role", top_role, true)
        .field("All roles", truncate(&roles.join(", "), 1024), true);

    msg.channel_id
        .send_message(&ctx.http, CreateMessage::new().embed(embed))
        .await?;
    Ok(())
}

pub async fn delete(ctx: &Context, msg: &Message, mut args: Args<'_>) -> CommandResult {
    let number: u8 = args.parse_or(2)?;
    if number == 0 || number > MAX_DELETE {
        return Err(CommandError::BadArgument(format!(
            "the number must be between 1 and {MAX_DELETE}"
        )));
    }

    let messages = msg
        .channel_id
        .messages(&ctx.http, GetMessages::new().limit(number))
        .await?;
    tracing::info!("{} deletes {} messages", msg.author.name, messages.len());

    for message in messages {
        msg.channel_id
            .delete_message(&ctx.http, message.id)
            .await
            .map_err(|err| CommandError::from_discord(err, &["Manage Messages"]))?;
    }
    Ok(())
}

/// One line per command: usage, aliases and description.
pub fn help_lines() -> Vec<String> {
    COMMANDS
        .iter()
        .map(|command| {
            let mut line = format!("`{PREFIX}{}", command.name);
            if !command.usage.is_empty() {
                line.push(' ');
                line.push_str(command.usage);
            }
            line.push('`');
            if !command.aliases.is_empty() {
                line.push_str(&format!(" ({})", command.aliases.join(", ")));
            }
            line.push_str(" - ");
            line.push_str(command.help);
            if command.owner_only {
                line.push_str(" *(owner)*");
            }
            line
        })
        .collect()
}

pub async fn help(ctx: &Context, msg: &Message) -> CommandResult {
    let embed = CreateEmbed::new()
        .title("Commands")
        .description(or_dash(&help_lines().join("\n")).to_string());

    msg.channel_id
        .send_message(&ctx.http, CreateMessage::new().embed(embed))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_roles() {
        let roles = display_roles(vec![
            "Players".to_string(),
            "@everyone".to_string(),
            "Dungeon Master".to_string(),
        ]);
        assert_eq!(roles, ["Dungeon Master", "Players", "\\@everyone"]);
    }

    #[test]
    fn test_help_lines() {
        let lines = help_lines();
        assert_eq!(lines.len(), COMMANDS.len());
        assert!(lines.contains(&"`.ping` - Ping/pong test.".to_string()));
        assert!(lines
            .iter()
            .any(|line| line.starts_with("`.set <setting> <value>` (s) - ") && line.ends_with("*(owner)*")));
    }
}
