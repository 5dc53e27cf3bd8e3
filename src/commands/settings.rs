use anyhow::Context as _;
use serenity::all::{Context, Mentionable, Message};

use super::{Args, CommandResult};
use crate::bot::Handler;
use crate::config::SettingKey;

pub async fn set(bot: &Handler, ctx: &Context, msg: &Message, mut args: Args<'_>) -> CommandResult {
    let setting = args.required()?;
    let value = args.required()?;

    let Some(key) = SettingKey::resolve(setting) else {
        let reply = format!(
            "Invalid setting \"{setting}\". Valid choices are: [{}]",
            SettingKey::names().join(", ")
        );
        msg.channel_id.say(&ctx.http, reply).await?;
        return Ok(());
    };

    // disk work happens on a copy, outside the lock
    let mut state = bot.state.read().await.clone();
    let new_value = value.to_string();
    let (state, outcome) = tokio::task::spawn_blocking(move || {
        let outcome = state.apply(key, &new_value);
        (state, outcome)
    })
    .await
    .context("settings update panicked")?;

    if let Err(err) = outcome? {
        msg.channel_id.say(&ctx.http, err.to_string()).await?;
        return Ok(());
    }
    *bot.state.write().await = state;

    if key.changes_mode() {
        tracing::info!("{} triggered a mode change.", msg.author.name);
        let reply = format!("{} triggered a mode change.", msg.author.mention());
        msg.channel_id.say(&ctx.http, reply).await?;
    }

    let success = format!("{} changed to \"{value}\".", key.name());
    tracing::info!("{success}");
    msg.channel_id.say(&ctx.http, success).await?;
    Ok(())
}
