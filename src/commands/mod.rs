//! Prefix commands understood by the bot.

use serenity::all::{Context, HttpError, Message, ModelError};
use thiserror::Error;

use crate::bot::Handler;

mod books;
mod dice;
mod misc;
mod settings;

pub use dice::{format_attribute, modifier, roll_attributes, roll_character, AttributeRoll, CharacterSheet};

pub const PREFIX: &str = ".";

/// Discord's "Missing Permissions" error code.
const MISSING_PERMISSIONS: isize = 50013;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Ping,
    Info,
    Me,
    Delete,
    Help,
    Set,
    Roll,
    RollCharacter,
    Monster,
    MonsterList,
    RollTable,
}

#[derive(Debug)]
pub struct Command {
    pub kind: CommandKind,
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub usage: &'static str,
    pub help: &'static str,
    pub owner_only: bool,
}

pub static COMMANDS: &[Command] = &[
    Command {
        kind: CommandKind::Ping,
        name: "ping",
        aliases: &[],
        usage: "",
        help: "Ping/pong test.",
        owner_only: false,
    },
    Command {
        kind: CommandKind::Info,
        name: "info",
        aliases: &["inf", "i"],
        usage: "",
        help: "Show bot details.",
        owner_only: false,
    },
    Command {
        kind: CommandKind::Me,
        name: "me",
        aliases: &[],
        usage: "",
        help: "Show my details.",
        owner_only: false,
    },
    Command {
        kind: CommandKind::Delete,
        name: "delete",
        aliases: &["del"],
        usage: "[number=2]",
        help: "Deletes messages in the channel (default 2).",
        owner_only: true,
    },
    Command {
        kind: CommandKind::Help,
        name: "help",
        aliases: &["h"],
        usage: "",
        help: "Shows this message.",
        owner_only: false,
    },
    Command {
        kind: CommandKind::Set,
        name: "set",
        aliases: &["s"],
        usage: "<setting> <value>",
        help: "Changes a setting value.",
        owner_only: true,
    },
    Command {
        kind: CommandKind::Roll,
        name: "roll",
        aliases: &["r"],
        usage: "[dice=1d20]",
        help: "Rolls the specified dice or a d20.",
        owner_only: false,
    },
    Command {
        kind: CommandKind::RollCharacter,
        name: "rollcharacter",
        aliases: &["rc"],
        usage: "[name]",
        help: "Rolls the ability scores of a character.",
        owner_only: false,
    },
    Command {
        kind: CommandKind::Monster,
        name: "monster",
        aliases: &["m"],
        usage: "<id> [count]",
        help: "Searches a monster in the monster manual.",
        owner_only: false,
    },
    Command {
        kind: CommandKind::MonsterList,
        name: "mlist",
        aliases: &["ml"],
        usage: "",
        help: "Lists the monster manual.",
        owner_only: false,
    },
    Command {
        kind: CommandKind::RollTable,
        name: "rollt",
        aliases: &["rt"],
        usage: "<table>",
        help: "Searches a table and rolls on it.",
        owner_only: true,
    },
];

pub fn find(name: &str) -> Option<&'static Command> {
    COMMANDS
        .iter()
        .find(|command| command.name == name || command.aliases.contains(&name))
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Missing Bot Permission: {}.", .0.join(", "))]
    BotMissingPermissions(Vec<String>),
    #[error("Missing Permission: You are not an owner.")]
    NotOwner,
    #[error("Missing argument: Check \".help\".")]
    MissingArgument,
    #[error("Bad argument: {0}")]
    BadArgument(String),
    #[error("Command not found: Check \".help\".")]
    NotFound,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CommandError {
    /// The reply shown in the channel, if this error is meant for the user.
    pub fn user_message(&self) -> Option<String> {
        match self {
            CommandError::Other(_) => None,
            err => Some(err.to_string()),
        }
    }

    /// Maps a failed Discord call, telling the user when the bot lacks `needed`.
    pub fn from_discord(err: serenity::Error, needed: &[&str]) -> Self {
        match &err {
            serenity::Error::Model(ModelError::InvalidPermissions { required, .. }) => {
                CommandError::BotMissingPermissions(
                    required.get_permission_names().into_iter().map(String::from).collect(),
                )
            }
            serenity::Error::Http(HttpError::UnsuccessfulRequest(response))
                if response.error.code == MISSING_PERMISSIONS =>
            {
                CommandError::BotMissingPermissions(needed.iter().map(|p| p.to_string()).collect())
            }
            _ => CommandError::Other(err.into()),
        }
    }
}

impl From<serenity::Error> for CommandError {
    fn from(err: serenity::Error) -> Self {
        CommandError::from_discord(err, &[])
    }
}

pub type CommandResult = Result<(), CommandError>;

/// Whitespace separated arguments following the command name.
#[derive(Debug, Clone, Copy)]
pub struct Args<'a> {
    rest: &'a str,
}

impl<'a> Args<'a> {
    pub fn new(rest: &'a str) -> Self {
        Self { rest: rest.trim() }
    }

    /// Takes the next word.
    pub fn next(&mut self) -> Option<&'a str> {
        if self.rest.is_empty() {
            return None;
        }
        let (word, rest) = self
            .rest
            .split_once(char::is_whitespace)
            .unwrap_or((self.rest, ""));
        self.rest = rest.trim_start();
        Some(word)
    }

    pub fn required(&mut self) -> Result<&'a str, CommandError> {
        self.next().ok_or(CommandError::MissingArgument)
    }

    /// Parses the next word, or returns `default` when there is none.
    pub fn parse_or<T: std::str::FromStr>(&mut self, default: T) -> Result<T, CommandError> {
        match self.next() {
            Some(word) => word
                .parse()
                .map_err(|_| CommandError::BadArgument(format!("\"{word}\" is not a valid number"))),
            None => Ok(default),
        }
    }

    /// Everything that is left, unsplit.
    pub fn rest(&self) -> Option<&'a str> {
        Some(self.rest).filter(|rest| !rest.is_empty())
    }
}

#[derive(Debug)]
pub struct Invocation<'a> {
    pub command: &'static Command,
    pub args: Args<'a>,
}

/// Splits a message into a command and its arguments.
///
/// Messages without the prefix yield `None`, as do things like `...` that are
/// not meant as commands at all.
pub fn parse(content: &str) -> Option<Result<Invocation<'_>, CommandError>> {
    let rest = content.strip_prefix(PREFIX)?;
    if !rest.starts_with(|c: char| c.is_alphabetic()) {
        return None;
    }

    let (name, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    Some(
        find(name)
            .map(|command| Invocation {
                command,
                args: Args::new(args),
            })
            .ok_or(CommandError::NotFound),
    )
}

pub async fn run(bot: &Handler, ctx: &Context, msg: &Message, invocation: Invocation<'_>) -> CommandResult {
    let args = invocation.args;
    tracing::debug!("{} invoked {}", msg.author.name, invocation.command.name);

    match invocation.command.kind {
        CommandKind::Ping => misc::ping(ctx, msg).await,
        CommandKind::Info => misc::info(bot, ctx, msg).await,
        CommandKind::Me => misc::me(ctx, msg).await,
        CommandKind::Delete => misc::delete(ctx, msg, args).await,
        CommandKind::Help => misc::help(ctx, msg).await,
        CommandKind::Set => settings::set(bot, ctx, msg, args).await,
        CommandKind::Roll => dice::roll(ctx, msg, args).await,
        CommandKind::RollCharacter => dice::roll_character_cmd(bot, ctx, msg, args).await,
        CommandKind::Monster => books::monster(bot, ctx, msg, args).await,
        CommandKind::MonsterList => books::monster_list(bot, ctx, msg).await,
        CommandKind::RollTable => books::roll_table(bot, ctx, msg, args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_by_name_and_alias() {
        assert_eq!(find("roll").unwrap().kind, CommandKind::Roll);
        assert_eq!(find("rc").unwrap().kind, CommandKind::RollCharacter);
        assert_eq!(find("ml").unwrap().kind, CommandKind::MonsterList);
        assert!(find("Roll").is_none());
        assert!(find("teleport").is_none());
    }

    #[test]
    fn test_names_and_aliases_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for command in COMMANDS {
            for name in std::iter::once(&command.name).chain(command.aliases) {
                assert!(seen.insert(*name), "duplicate command name {name}");
            }
        }
    }

    #[test]
    fn test_parse() {
        assert!(parse("hello there").is_none());
        assert!(parse(".").is_none());
        assert!(parse("...").is_none());
        assert!(parse(". roll").is_none());

        let invocation = parse(".r 4d6K3 + 2").unwrap().unwrap();
        assert_eq!(invocation.command.kind, CommandKind::Roll);
        assert_eq!(invocation.args.rest(), Some("4d6K3 + 2"));

        let invocation = parse(".ping").unwrap().unwrap();
        assert_eq!(invocation.args.rest(), None);

        assert!(matches!(parse(".dance"), Some(Err(CommandError::NotFound))));
    }

    #[test]
    fn test_args() {
        let mut args = Args::new("  system   ose  extra words ");
        assert_eq!(args.next(), Some("system"));
        assert_eq!(args.required().unwrap(), "ose");
        assert_eq!(args.rest(), Some("extra words"));
        assert_eq!(args.next(), Some("extra"));
        assert_eq!(args.next(), Some("words"));
        assert_eq!(args.next(), None);
        assert!(matches!(args.required(), Err(CommandError::MissingArgument)));

        let mut args = Args::new("5 x");
        assert_eq!(args.parse_or(2u8).unwrap(), 5);
        assert!(matches!(args.parse_or(2u8), Err(CommandError::BadArgument(_))));
        assert_eq!(args.parse_or(2u8).unwrap(), 2);
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(
            CommandError::NotFound.user_message().unwrap(),
            "Command not found: Check \".help\"."
        );
        assert_eq!(
            CommandError::MissingArgument.user_message().unwrap(),
            "Missing argument: Check \".help\"."
        );
        assert_eq!(
            CommandError::BotMissingPermissions(vec!["Manage Messages".into()])
                .user_message()
                .unwrap(),
            "Missing Bot Permission: Manage Messages."
        );
        assert_eq!(
            CommandError::NotOwner.user_message().unwrap(),
            "Missing Permission: You are not an owner."
        );
        assert!(CommandError::Other(anyhow::anyhow!("boom")).user_message().is_none());
    }
}
