use std::collections::HashSet;
use std::path::Path;

use serenity::all::{ActivityData, CreateAttachment, EditProfile, Message, Ready, UserId};
use serenity::async_trait;
use serenity::prelude::*;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::books::Library;
use crate::commands::{self, CommandError, Invocation};
use crate::config::{SettingError, SettingKey, Settings};
use crate::LogUtil;

const AVATAR_PATH: &str = "img/avatar.png";
const AVATAR_HASH: &str = "0e2cba3d8bec4ff4db557700231b3c10";
const ACTIVITY: &str = "vebot";

/// Everything the commands can read or change at runtime.
#[derive(Debug, Clone)]
pub struct State {
	pub settings: Settings,
	pub library: Library,
}

impl State {
	pub fn new(settings: Settings) -> Self {
		let library = Library::load(&settings.library_paths());
		info!("library loaded with {} books", library.len());
		Self { settings, library }
	}

	/// Changes and saves a setting, reloading the library when the change selects
	/// different books. Blocks on the filesystem.
	pub fn apply(&mut self, key: SettingKey, value: &str) -> anyhow::Result<Result<(), SettingError>> {
		if let Err(err) = self.settings.set(key, value)? {
			return Ok(Err(err));
		}
		if key.affects_library() {
			self.library = Library::load(&self.settings.library_paths());
			info!("library reloaded with {} books", self.library.len());
		}
		Ok(Ok(()))
	}
}

pub struct Handler {
	pub(crate) state: RwLock<State>,
	owners: RwLock<HashSet<UserId>>,
}

#[async_trait]
impl EventHandler for Handler {
	async fn ready(&self, ctx: Context, ready: Ready) {
		info!("Bot online as {}.", ready.user.tag());

		self.refresh_owners(&ctx).await.report_on_error();
		self.update_avatar(&ctx, &ready).await.report_on_error();

		ctx.set_activity(Some(ActivityData::playing(ACTIVITY)));
	}

	async fn message(&self, ctx: Context, msg: Message) {
		if msg.author.bot {
			return;
		}

		let Some(parsed) = commands::parse(&msg.content) else {
			return;
		};

		let result = match parsed {
			Ok(invocation) => self.invoke(&ctx, &msg, invocation).await,
			Err(err) => Err(err),
		};

		if let Err(err) = result {
			self.report(&ctx, &msg, err).await;
		}
	}
}

impl Handler {
	pub fn new(settings: Settings) -> Self {
		Self {
			state: RwLock::new(State::new(settings)),
			owners: RwLock::new(HashSet::new()),
		}
	}

	async fn invoke(&self, ctx: &Context, msg: &Message, invocation: Invocation<'_>) -> commands::CommandResult {
		if invocation.command.owner_only && !self.owners.read().await.contains(&msg.author.id) {
			return Err(CommandError::NotOwner);
		}

		commands::run(self, ctx, msg, invocation).await
	}

	async fn report(&self, ctx: &Context, msg: &Message, err: CommandError) {
		match err.user_message() {
			Some(reply) => {
				msg.channel_id.say(&ctx.http, reply).await.report_on_error();
			}
			None => error!("command {:?} failed: {err:?}", msg.content),
		}
	}

	async fn refresh_owners(&self, ctx: &Context) -> anyhow::Result<()> {
		let app = ctx.http.get_current_application_info().await?;

		let mut owners = HashSet::new();
		if let Some(owner) = &app.owner {
			owners.insert(owner.id);
		}
		if let Some(team) = &app.team {
			owners.extend(team.members.iter().map(|member| member.user.id));
		}
		info!("{} owner(s) allowed to run owner commands", owners.len());

		*self.owners.write().await = owners;
		Ok(())
	}

	async fn update_avatar(&self, ctx: &Context, ready: &Ready) -> anyhow::Result<()> {
		let current = ready.user.avatar.as_ref().map(ToString::to_string);
		info!("avatar {current:?}");
		if current.as_deref() == Some(AVATAR_HASH) {
			return Ok(());
		}
		if !Path::new(AVATAR_PATH).is_file() {
			warn!("{AVATAR_PATH} not found, keeping the current avatar");
			return Ok(());
		}

		info!("Changing avatar.");
		let avatar = CreateAttachment::path(AVATAR_PATH).await?;
		let mut user = ready.user.clone();
		user.edit(ctx, EditProfile::new().avatar(&avatar)).await?;
		Ok(())
	}
}

pub struct Bot {
	pub client: Client,
}

impl Bot {
	pub async fn new(settings: Settings) -> anyhow::Result<Self> {
		let client = Client::builder(
			&settings.token,
			GatewayIntents::GUILDS
				| GatewayIntents::GUILD_MESSAGES
				| GatewayIntents::DIRECT_MESSAGES
				| GatewayIntents::MESSAGE_CONTENT,
		);

		let handler = Handler::new(settings);

		let client = client.event_handler(handler).await?;

		Ok(Self { client })
	}

	pub async fn start(&mut self) -> serenity::Result<()> {
		self.client.start().await
	}
}
