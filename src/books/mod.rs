//! Books are JSON documents kept in the library directories: monster manuals
//! and random tables.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::utils::resolve_prefix;

mod monster;
mod table;

pub use monster::*;
pub use table::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum BookType {
    MonsterManual,
    Table,
}

impl TryFrom<u8> for BookType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(BookType::MonsterManual),
            2 => Ok(BookType::Table),
            other => Err(format!("unknown book type {other}")),
        }
    }
}

impl From<BookType> for u8 {
    fn from(value: BookType) -> Self {
        match value {
            BookType::MonsterManual => 1,
            BookType::Table => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Book {
    Monsters(MonsterBook),
    Table(Table),
}

#[derive(Deserialize)]
struct Header {
    #[serde(rename = "Type")]
    kind: BookType,
}

impl Book {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let header = Header::deserialize(&value).context("invalid book header")?;

        let book = match header.kind {
            BookType::MonsterManual => Book::Monsters(MonsterBook::deserialize(&value)?),
            BookType::Table => {
                let table = Table::deserialize(&value)?;
                table.validate()?;
                Book::Table(table)
            }
        };
        Ok(book)
    }

    pub fn id(&self) -> &str {
        match self {
            Book::Monsters(book) => &book.id,
            Book::Table(table) => &table.id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Book::Monsters(book) => &book.title,
            Book::Table(table) => &table.title,
        }
    }

    pub fn kind(&self) -> BookType {
        match self {
            Book::Monsters(_) => BookType::MonsterManual,
            Book::Table(_) => BookType::Table,
        }
    }
}

/// All the books loaded from the library directories, by id.
#[derive(Debug, Clone, Default)]
pub struct Library {
    books: BTreeMap<String, Book>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every `*.json` book found in `paths`. Books that fail to load are
    /// logged and skipped; a later book replaces an earlier one with the same id.
    pub fn load(paths: &[PathBuf]) -> Self {
        let mut library = Self::new();

        for dir in paths {
            let files = match json_files(dir) {
                Ok(files) => files,
                Err(err) => {
                    tracing::warn!("cannot read library path {dir:?}: {err:#}");
                    continue;
                }
            };

            for file in files {
                tracing::info!("loading book {file:?}");
                match library.add_file(&file) {
                    Ok(book) => {
                        tracing::info!("  book \"{} [{}]\" loaded", book.title(), book.id())
                    }
                    Err(err) => tracing::error!("failed to load book {file:?}: {err:#}"),
                }
            }
        }

        library
    }

    pub fn add_file(&mut self, path: &Path) -> anyhow::Result<&Book> {
        let json = fs::read_to_string(path).with_context(|| format!("reading {path:?}"))?;
        let book = Book::from_json(&json)?;
        Ok(self.add_book(book))
    }

    pub fn add_book(&mut self, book: Book) -> &Book {
        match &book {
            Book::Monsters(monsters) => tracing::info!("  {} monsters found", monsters.pages.len()),
            Book::Table(table) => tracing::info!("  {} entries found", table.entries.len()),
        }
        let id = book.id().to_string();
        self.books.insert(id.clone(), book);
        &self.books[&id]
    }

    pub fn index(&self) -> impl Iterator<Item = &Book> {
        self.books.values()
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// Finds a book by id or by an unambiguous id prefix.
    pub fn search(&self, prefix: &str) -> Option<&Book> {
        let book = resolve_prefix(prefix, self.books.values(), |book| book.id())?;
        tracing::info!("found \"{} [{}]\" in the library", book.title(), book.id());
        Some(book)
    }
}

fn json_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Book fields may be written as strings or numbers; both read as text.
pub(crate) fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    use serde_json::Value;

    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
    })
}

pub(crate) fn optional_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let value = text(deserializer)?;
    Ok(Some(value).filter(|v| !v.trim().is_empty()))
}
