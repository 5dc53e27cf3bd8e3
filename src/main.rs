use std::process;

use clap::Parser;
use dotenvy::dotenv;
use vebot::args::Args;
use vebot::{utils, Bot, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let args = Args::parse();
    args.log.init()?;

    let mut settings = Settings::load(Settings::FILE)?;
    if !settings.resolve_token(args.token, || utils::prompt("enter token:"))? {
        tracing::error!("no token provided");
        process::exit(1);
    }
    settings.save()?;

    let mut bot = Bot::new(settings).await?;

    tracing::info!("Starting bot");
    bot.start().await?;

    Ok(())
}
