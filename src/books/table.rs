use std::ops::RangeInclusive;

use anyhow::{anyhow, Context as _};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{optional_text, text, BookType};
use crate::dice::{self, DiceError};

/// How the result of a nested table combines with its entry's own text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultOp {
    #[default]
    Replace,
    Append,
    Concat,
}

impl ResultOp {
    fn is_replace(&self) -> bool {
        *self == ResultOp::Replace
    }
}

/// A random table: roll `die` and read every entry whose id range holds the result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    #[serde(rename = "Id", default, deserialize_with = "text")]
    pub id: String,
    #[serde(rename = "Title", default)]
    pub title: String,
    #[serde(rename = "Type", default = "table_type")]
    pub kind: BookType,
    #[serde(rename = "Die")]
    pub die: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forced_roll: Option<i64>,
    #[serde(default, skip_serializing_if = "ResultOp::is_replace")]
    pub rop: ResultOp,
    #[serde(rename = "Pages", default)]
    pub entries: Vec<TableEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableEntry {
    #[serde(rename = "Id", deserialize_with = "text")]
    pub id: String,
    #[serde(rename = "Details", default)]
    pub details: String,
    #[serde(
        rename = "Number",
        default,
        deserialize_with = "optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub number: Option<String>,
    #[serde(rename = "Table", default, skip_serializing_if = "Option::is_none")]
    pub table: Option<Box<Table>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRoll {
    pub result: String,
    pub explanation: Vec<String>,
}

fn table_type() -> BookType {
    BookType::Table
}

impl Table {
    /// Builds a table with one entry per non-empty line, rolled with `1d{lines}`.
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        let entries: Vec<TableEntry> = lines
            .into_iter()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .enumerate()
            .map(|(i, line)| TableEntry {
                id: (i + 1).to_string(),
                details: line.to_string(),
                number: None,
                table: None,
            })
            .collect();

        Self {
            id: "undefined".to_string(),
            title: "undefined title".to_string(),
            kind: BookType::Table,
            die: format!("1d{}", entries.len()),
            forced_roll: None,
            rop: ResultOp::Replace,
            entries,
        }
    }

    /// Checks the dice expressions and entry ids of this table and of every
    /// nested table.
    pub fn validate(&self) -> anyhow::Result<()> {
        dice::validate(&self.die).with_context(|| format!("table {:?} die {:?}", self.id, self.die))?;

        for entry in &self.entries {
            entry
                .range()
                .ok_or_else(|| anyhow!("table {:?} has an invalid entry id {:?}", self.id, entry.id))?;
            if let Some(number) = &entry.number {
                dice::validate(number)
                    .with_context(|| format!("table {:?} entry {:?} number", self.id, entry.id))?;
            }
            if let Some(table) = &entry.table {
                table.validate()?;
            }
        }
        Ok(())
    }

    /// All entries whose id range holds `roll`, in book order.
    pub fn find(&self, roll: i64) -> Vec<&TableEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.range().is_some_and(|range| range.contains(&roll)))
            .collect()
    }

    /// Rolls on this table and on any table chained from the selected entries.
    pub fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<TableRoll, DiceError> {
        let rolled = dice::roll(&self.die, rng)?;
        let rid = self.forced_roll.unwrap_or(rolled.total);
        tracing::info!("rolled {rid} in {} for {}", self.die, self.title);

        let mut explanation = vec![format!("{} -> **{rid}**", self.die)];
        let mut results = Vec::new();

        for entry in self.find(rid) {
            let mut result = entry.expand(rng);
            if let Some(table) = &entry.table {
                let nested = table.roll(rng)?;
                if !nested.result.is_empty() {
                    result = match table.rop {
                        ResultOp::Replace => nested.result,
                        ResultOp::Append => format!("{result}\n{}", nested.result),
                        ResultOp::Concat => result + &nested.result,
                    };
                    explanation.extend(nested.explanation);
                }
            }
            results.push(result);
        }

        let result = results.join("\n");
        tracing::info!("> {result}\n{}", explanation.join("\n"));
        Ok(TableRoll {
            result,
            explanation,
        })
    }
}

impl TableEntry {
    /// `"4"` is the range `4..=4`, `"1-3"` is `1..=3`.
    pub fn range(&self) -> Option<RangeInclusive<i64>> {
        let id = self.id.trim();
        match id.split_once('-') {
            Some((low, high)) => Some(low.trim().parse().ok()?..=high.trim().parse().ok()?),
            None => {
                let n = id.parse().ok()?;
                Some(n..=n)
            }
        }
    }

    /// The entry details with the quantity markers filled in from `Number`.
    pub fn expand<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let count = match &self.number {
            Some(number) => match dice::roll(number, rng) {
                Ok(roll) => roll.total,
                Err(err) => {
                    tracing::warn!("entry {:?} number {number:?}: {err}", self.id);
                    0
                }
            },
            None => 0,
        };
        expand_details(&self.details, count)
    }
}

/// Fills the quantity markers of an entry: `#` is the amount (`un` for one),
/// `#a` the amount for feminine words, and `$`, `$(es)`, `a$(-es)` plural endings.
pub fn expand_details(details: &str, count: i64) -> String {
    let mut text = details.to_string();

    if count == 1 {
        text = text.replace('#', "un");
    } else if count > 1 {
        let n = count.to_string();
        text = text
            .replace("#a", &n)
            .replace('#', &n)
            .replace("a$(-es)", "es")
            .replace("$(es)", "es")
            .replace('$', "s");
    }

    text = text
        .replace("#a", "")
        .replace('#', "")
        .replace("$(-es)", "")
        .replace("$(es)", "")
        .replace('$', "");
    while text.contains("  ") {
        text = text.replace("  ", " ");
    }
    text
}
