use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{optional_text, text, BookType};
use crate::dice::{self, DiceError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonsterBook {
    #[serde(rename = "Id", deserialize_with = "text")]
    pub id: String,
    #[serde(rename = "Title", default)]
    pub title: String,
    #[serde(rename = "Type")]
    pub kind: BookType,
    #[serde(rename = "Pages", default)]
    pub pages: Vec<Monster>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Monster {
    #[serde(rename = "Id", default, deserialize_with = "text")]
    pub id: String,
    #[serde(rename = "Name", default, deserialize_with = "text")]
    pub name: String,
    #[serde(rename = "AC", default, deserialize_with = "text")]
    pub armour_class: String,
    #[serde(rename = "HD", default, deserialize_with = "text")]
    pub hit_dice: String,
    #[serde(rename = "HP", default, deserialize_with = "text")]
    pub hit_points: String,
    #[serde(rename = "Move", default, deserialize_with = "text")]
    pub movement: String,
    #[serde(rename = "Attacks", default, deserialize_with = "text")]
    pub attacks: String,
    #[serde(rename = "Damage", default, deserialize_with = "text")]
    pub damage: String,
    #[serde(rename = "Number", default, deserialize_with = "text")]
    pub number_appearing: String,
    #[serde(rename = "Save", default, deserialize_with = "text")]
    pub save_as: String,
    #[serde(rename = "Morale", default, deserialize_with = "text")]
    pub morale: String,
    #[serde(rename = "Treasure", default, deserialize_with = "text")]
    pub treasure: String,
    #[serde(rename = "Alignment", default, deserialize_with = "text")]
    pub alignment: String,
    #[serde(rename = "XP", default, deserialize_with = "text")]
    pub xp: String,
    #[serde(rename = "Notes", default, deserialize_with = "optional_text")]
    pub notes: Option<String>,
}

impl MonsterBook {
    pub fn search(&self, id: &str) -> Option<&Monster> {
        if id.is_empty() {
            return None;
        }
        self.pages.iter().find(|monster| monster.id == id)
    }

    pub fn index(&self) -> &[Monster] {
        &self.pages
    }
}

impl Monster {
    /// Label/value pairs in the order they are shown to players.
    pub fn stats(&self) -> [(&'static str, &str); 11] {
        [
            ("AC", self.armour_class.as_str()),
            ("HD", self.hit_dice.as_str()),
            ("Move", self.movement.as_str()),
            ("Attacks", self.attacks.as_str()),
            ("Damage", self.damage.as_str()),
            ("# Appearing (In Lair)", self.number_appearing.as_str()),
            ("Save As", self.save_as.as_str()),
            ("Morale", self.morale.as_str()),
            ("Treasure", self.treasure.as_str()),
            ("Alignment", self.alignment.as_str()),
            ("XP", self.xp.as_str()),
        ]
    }

    /// Rolls hit points for `count` monsters of this kind, lowest first.
    ///
    /// The leading number of `HP` (or `HD` when there is no `HP`) says how many
    /// times `die` is rolled, so `3+1` with `1d8` rolls `3 * 1d8`.
    pub fn roll_hit_points<R: Rng + ?Sized>(
        &self,
        count: usize,
        die: &str,
        rng: &mut R,
    ) -> Result<Vec<i64>, DiceError> {
        let source = if self.hit_points.trim().is_empty() {
            &self.hit_dice
        } else {
            &self.hit_points
        };
        let multiplier: String = source
            .trim()
            .chars()
            .take_while(char::is_ascii_digit)
            .collect();
        let multiplier = if multiplier.is_empty() { "1" } else { multiplier.as_str() };
        let expr = format!("{multiplier} * {die}");

        let mut rolls = (0..count)
            .map(|_| dice::roll(&expr, rng).map(|roll| roll.total))
            .collect::<Result<Vec<_>, _>>()?;
        rolls.sort_unstable();
        Ok(rolls)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn book() -> MonsterBook {
        serde_json::from_str(
            r#"{
                "Id": "mm", "Title": "Monsters", "Type": 1,
                "Pages": [
                    {"Id": "7", "Name": "Ogre", "AC": 5, "HD": "4+1", "HP": "4+1", "XP": 125, "Notes": ""},
                    {"Id": "8", "Name": "Orc", "AC": 6, "HD": "1", "Notes": "Hates daylight"},
                    {"Id": "9", "Name": "Rat", "HD": "½"}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_search_exact_id() {
        let book = book();
        assert_eq!(book.search("8").unwrap().name, "Orc");
        assert!(book.search("").is_none());
        assert!(book.search("80").is_none());
        assert_eq!(book.index().len(), 3);
    }

    #[test]
    fn test_numbers_read_as_text() {
        let book = book();
        let ogre = book.search("7").unwrap();
        assert_eq!(ogre.armour_class, "5");
        assert_eq!(ogre.xp, "125");
        assert_eq!(ogre.notes, None);
        assert_eq!(book.search("8").unwrap().notes.as_deref(), Some("Hates daylight"));
        assert_eq!(ogre.stats()[0], ("AC", "5"));
    }

    #[test]
    fn test_roll_hit_points() {
        let book = book();
        let mut rng = StdRng::seed_from_u64(7);

        let hp = book.search("7").unwrap().roll_hit_points(5, "1d8", &mut rng).unwrap();
        assert_eq!(hp.len(), 5);
        assert!(hp.windows(2).all(|w| w[0] <= w[1]));
        assert!(hp.iter().all(|v| (4..=32).contains(v) && v % 4 == 0));

        let orc = book.search("8").unwrap().roll_hit_points(3, "1d8", &mut rng).unwrap();
        assert!(orc.iter().all(|v| (1..=8).contains(v)));

        let rat = book.search("9").unwrap().roll_hit_points(1, "1d4", &mut rng).unwrap();
        assert!((1..=4).contains(&rat[0]));

        assert!(book.search("8").unwrap().roll_hit_points(1, "1d", &mut rng).is_err());
    }
}
