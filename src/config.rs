use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context as _;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::utils::resolve_prefix;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenGame {
    Yes,
    No,
}

/// Rule system used for ability modifiers and system specific books.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameSystem {
    Ve,
    Ose,
}

/// How ability scores are rolled for a new character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeMethod {
    #[serde(rename = "inorder")]
    InOrder,
    #[serde(rename = "inorder+")]
    InOrderPlus,
    #[serde(rename = "ve")]
    Ve,
    #[serde(rename = "heroic")]
    Heroic,
}

impl OpenGame {
    pub const VALUES: &'static [&'static str] = &["yes", "no"];

    pub fn as_str(self) -> &'static str {
        match self {
            OpenGame::Yes => "yes",
            OpenGame::No => "no",
        }
    }
}

impl GameSystem {
    pub const VALUES: &'static [&'static str] = &["ve", "ose"];

    pub fn as_str(self) -> &'static str {
        match self {
            GameSystem::Ve => "ve",
            GameSystem::Ose => "ose",
        }
    }
}

impl AttributeMethod {
    pub const VALUES: &'static [&'static str] = &["inorder", "inorder+", "ve", "heroic"];

    pub fn as_str(self) -> &'static str {
        match self {
            AttributeMethod::InOrder => "inorder",
            AttributeMethod::InOrderPlus => "inorder+",
            AttributeMethod::Ve => "ve",
            AttributeMethod::Heroic => "heroic",
        }
    }
}

macro_rules! impl_from_str {
    ($($ty:ty => [$($text:literal => $variant:expr),+ $(,)?]),+ $(,)?) => {
        $(
            impl FromStr for $ty {
                type Err = ();

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    match s {
                        $($text => Ok($variant),)+
                        _ => Err(()),
                    }
                }
            }

            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )+
    };
}

impl_from_str! {
    OpenGame => ["yes" => OpenGame::Yes, "no" => OpenGame::No],
    GameSystem => ["ve" => GameSystem::Ve, "ose" => GameSystem::Ose],
    AttributeMethod => [
        "inorder" => AttributeMethod::InOrder,
        "inorder+" => AttributeMethod::InOrderPlus,
        "ve" => AttributeMethod::Ve,
        "heroic" => AttributeMethod::Heroic,
    ],
}

/// A setting that can be changed from the chat with `.set`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    Language,
    OpenGame,
    System,
    Mode,
    Attributes,
    ScoreThreshold,
    Monsters,
}

impl SettingKey {
    pub const ALL: [SettingKey; 7] = [
        SettingKey::Language,
        SettingKey::OpenGame,
        SettingKey::System,
        SettingKey::Mode,
        SettingKey::Attributes,
        SettingKey::ScoreThreshold,
        SettingKey::Monsters,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SettingKey::Language => "language",
            SettingKey::OpenGame => "opengame",
            SettingKey::System => "system",
            SettingKey::Mode => "mode",
            SettingKey::Attributes => "attributes",
            SettingKey::ScoreThreshold => "score_threshold",
            SettingKey::Monsters => "monsters",
        }
    }

    /// Resolves an abbreviated setting name. Ambiguous prefixes resolve to nothing.
    pub fn resolve(prefix: &str) -> Option<SettingKey> {
        resolve_prefix(prefix, Self::ALL, |key| key.name())
    }

    /// Empty when any value is accepted.
    pub fn valid_values(self) -> &'static [&'static str] {
        match self {
            SettingKey::OpenGame => OpenGame::VALUES,
            SettingKey::System => GameSystem::VALUES,
            SettingKey::Attributes => AttributeMethod::VALUES,
            _ => &[],
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|key| key.name()).collect()
    }

    /// Whether changing this setting changes which books are loaded.
    pub fn affects_library(self) -> bool {
        matches!(self, SettingKey::Language | SettingKey::System | SettingKey::Mode)
    }

    pub fn changes_mode(self) -> bool {
        matches!(self, SettingKey::System | SettingKey::Mode)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingError {
    #[error("invalid value, use [{}]", .0.join(", "))]
    InvalidValue(&'static [&'static str]),
    #[error("invalid value, use an integer")]
    NotAnInteger,
}

/// Application settings, persisted as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub token: String,
    pub language: String,
    pub opengame: OpenGame,
    pub system: GameSystem,
    pub mode: String,
    pub attributes: AttributeMethod,
    #[serde(deserialize_with = "integer")]
    pub score_threshold: i64,
    pub monsters: String,
    pub books_path: PathBuf,
    #[serde(skip)]
    path: PathBuf,
}

/// Accepts `70` as well as `"70"`, which is how older settings files stored it.
fn integer<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Integer {
        Number(i64),
        Text(String),
    }

    match Integer::deserialize(deserializer)? {
        Integer::Number(n) => Ok(n),
        Integer::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            token: String::new(),
            language: "en".to_string(),
            opengame: OpenGame::Yes,
            system: GameSystem::Ve,
            mode: "default".to_string(),
            attributes: AttributeMethod::Ve,
            score_threshold: 60,
            monsters: "mmbecmi".to_string(),
            books_path: PathBuf::from("books"),
            path: PathBuf::from(Self::FILE),
        }
    }
}

impl Settings {
    pub const FILE: &'static str = ".vebot.json";

    /// Loads the settings stored at `path`, falling back to defaults when the file
    /// does not exist yet. Later saves go to the same path.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

        if !path.is_file() {
            tracing::debug!("settings file {path:?} not found, using defaults");
            return Ok(Self {
                path,
                ..Self::default()
            });
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read settings from {path:?}"))?;
        let mut settings: Settings = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse settings in {path:?}"))?;
        settings.path = path;

        tracing::debug!("loaded settings from {:?}", settings.path);
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&self.path, json)
            .with_context(|| format!("failed to write settings to {:?}", self.path))?;
        tracing::debug!("saved settings to {:?}", self.path);
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Settles the token for this run: `flag` wins over the stored token, and
    /// `ask` is only called when neither is set. Returns whether a token is known.
    pub fn resolve_token<F>(&mut self, flag: Option<String>, ask: F) -> anyhow::Result<bool>
    where
        F: FnOnce() -> anyhow::Result<String>,
    {
        if let Some(token) = flag.filter(|token| !token.trim().is_empty()) {
            self.token = token;
        }
        if self.token.trim().is_empty() {
            self.token = ask()?.trim().to_string();
        }
        Ok(!self.token.is_empty())
    }

    /// Changes a user-facing setting and saves it to disk. Nothing changes in
    /// memory unless the save succeeds.
    pub fn set(&mut self, key: SettingKey, value: &str) -> anyhow::Result<Result<(), SettingError>> {
        let invalid = || SettingError::InvalidValue(key.valid_values());
        let mut updated = self.clone();

        match key {
            SettingKey::Language => updated.language = value.to_string(),
            SettingKey::Mode => updated.mode = value.to_string(),
            SettingKey::Monsters => updated.monsters = value.to_string(),
            SettingKey::OpenGame => match value.parse() {
                Ok(v) => updated.opengame = v,
                Err(()) => return Ok(Err(invalid())),
            },
            SettingKey::System => match value.parse() {
                Ok(v) => updated.system = v,
                Err(()) => return Ok(Err(invalid())),
            },
            SettingKey::Attributes => match value.parse() {
                Ok(v) => updated.attributes = v,
                Err(()) => return Ok(Err(invalid())),
            },
            SettingKey::ScoreThreshold => match value.parse() {
                Ok(v) => updated.score_threshold = v,
                Err(_) => return Ok(Err(SettingError::NotAnInteger)),
            },
        }

        updated.save()?;
        *self = updated;
        Ok(Ok(()))
    }

    pub fn value(&self, key: SettingKey) -> String {
        match key {
            SettingKey::Language => self.language.clone(),
            SettingKey::OpenGame => self.opengame.to_string(),
            SettingKey::System => self.system.to_string(),
            SettingKey::Mode => self.mode.clone(),
            SettingKey::Attributes => self.attributes.to_string(),
            SettingKey::ScoreThreshold => self.score_threshold.to_string(),
            SettingKey::Monsters => self.monsters.clone(),
        }
    }

    /// The base books directory followed by the system and mode directories for
    /// the current language, when they exist.
    pub fn library_paths(&self) -> Vec<PathBuf> {
        let mut paths = vec![self.books_path.clone()];
        for name in [self.system.as_str(), self.mode.as_str()] {
            let sub = self.books_path.join(format!("{name}_{}", self.language));
            if sub.is_dir() && !paths.contains(&sub) {
                paths.push(sub);
            }
        }
        tracing::info!("library paths: {paths:?}");
        paths
    }

    /// Markdown list of the user-facing settings.
    pub fn details(&self) -> String {
        SettingKey::ALL
            .iter()
            .map(|key| format!("- **{}**: [{}]\n", key.name(), self.value(*key)))
            .collect()
    }
}
