use rand::Rng;
use serenity::all::{ChannelType, Context, CreateEmbed, CreateEmbedFooter, CreateMessage, Message};

use super::{Args, CommandResult};
use crate::bot::Handler;
use crate::config::{AttributeMethod, GameSystem, OpenGame};
use crate::dice;
use crate::utils::truncate;
use crate::LogUtil;

const DEFAULT_DIE: &str = "1d20";
const ATTRIBUTE_LABELS: [&str; 6] = ["STR", "DEX", "CON", "INT", "WIS", "CHA"];
const MAX_ATTEMPTS: usize = 1000;

pub async fn roll(ctx: &Context, msg: &Message, args: Args<'_>) -> CommandResult {
    let die = args.rest().unwrap_or(DEFAULT_DIE);
    let outcome = dice::roll(die, &mut rand::thread_rng());

    let reply = match outcome {
        Ok(roll) => format!("{die} -> **{}** <- {}", roll.total, roll.explanation),
        Err(err) => {
            tracing::error!("cannot roll {die:?}: {err}");
            format!("ERROR: {err}")
        }
    };
    msg.channel_id.say(&ctx.http, truncate(&reply, 2000)).await?;
    Ok(())
}

/// One rolled set of ability scores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRoll {
    /// Score and dice explanation, in display order.
    pub rows: Vec<(i64, String)>,
    /// Quality of the whole set; sets below the threshold are rolled again.
    pub score: i64,
    pub die: &'static str,
}

/// Rolls the ability scores for `method`.
///
/// The set scores the sum of its values, or 0 when two or more values are below 9.
/// Seven value methods are sorted highest first and the lowest value does not count.
pub fn roll_attributes<R: Rng + ?Sized>(method: AttributeMethod, rng: &mut R) -> AttributeRoll {
    let (die, count) = match method {
        AttributeMethod::InOrder => ("3d6", 6),
        AttributeMethod::InOrderPlus => ("4d6K3", 6),
        AttributeMethod::Ve => ("3d6", 7),
        AttributeMethod::Heroic => ("4d6K3", 7),
    };

    let mut rows: Vec<(i64, String)> = (0..count)
        .map(|_| {
            // the expressions above are constant and always valid
            let roll = dice::roll(die, rng).unwrap_or_else(|_| dice::Roll {
                total: 0,
                explanation: String::new(),
            });
            (roll.total, roll.explanation.replace("~~", " ▾"))
        })
        .collect();

    let low = rows.iter().filter(|(value, _)| *value < 9).count();
    let mut score: i64 = if low < 2 {
        rows.iter().map(|(value, _)| value).sum()
    } else {
        0
    };

    if rows.len() > 6 {
        rows.sort_by(|a, b| b.0.cmp(&a.0));
        if let Some((lowest, _)) = rows.last() {
            score -= lowest;
        }
    }

    AttributeRoll { rows, score, die }
}

/// The modifier a score gives under `system`, e.g. `+1`.
pub fn modifier(system: GameSystem, score: i64) -> Option<&'static str> {
    let modifier = match system {
        GameSystem::Ve => match score {
            18.. => "+2",
            15..=17 => "+1",
            7..=14 => "",
            4..=6 => "-1",
            1..=3 => "-2",
            _ => "",
        },
        GameSystem::Ose => match score {
            18.. => "+3",
            16..=17 => "+2",
            13..=15 => "+1",
            9..=12 => "",
            6..=8 => "-1",
            4..=5 => "-2",
            1..=3 => "-3",
            _ => "",
        },
    };
    Some(modifier).filter(|m| !m.is_empty())
}

pub fn format_attribute(system: GameSystem, die: &str, score: i64, details: &str, label: Option<&str>) -> String {
    let prefix = label.map(|label| format!("{label}:    ")).unwrap_or_default();
    let modifier = modifier(system, score)
        .map(|m| format!(" ({m})"))
        .unwrap_or_default();
    format!("{die} -> **{prefix}{score}{modifier}** <- {details}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterSheet {
    pub lines: Vec<String>,
    pub notes: Vec<String>,
    pub score: i64,
}

/// Rolls sets of ability scores until one reaches `threshold`, giving up after a
/// bounded number of attempts with the best set seen.
pub fn roll_character<R: Rng + ?Sized>(
    method: AttributeMethod,
    system: GameSystem,
    threshold: i64,
    rng: &mut R,
) -> CharacterSheet {
    let mut best = roll_attributes(method, rng);
    let mut attempts = 1;
    while best.score < threshold && attempts < MAX_ATTEMPTS {
        let next = roll_attributes(method, rng);
        if next.score > best.score {
            best = next;
        }
        attempts += 1;
    }
    if best.score < threshold {
        tracing::warn!("no attribute set reached {threshold} after {attempts} attempts");
    }
    tracing::debug!("rolled attributes in {attempts} attempts, score {}", best.score);

    let labels: Vec<Option<&str>> = if best.rows.len() == ATTRIBUTE_LABELS.len() {
        ATTRIBUTE_LABELS.iter().copied().map(Some).collect()
    } else {
        vec![None; best.rows.len()]
    };

    let lines = best
        .rows
        .iter()
        .zip(labels)
        .map(|((score, details), label)| format_attribute(system, best.die, *score, details, label))
        .collect();

    CharacterSheet {
        lines,
        notes: vec!["Assign the attribute values as you wish.".to_string()],
        score: best.score,
    }
}

/// The character sheet embed; `name`, when given, becomes the description.
fn character_embed(sheet: &CharacterSheet, name: Option<&str>) -> CreateEmbed {
    let embed = CreateEmbed::new()
        .title("Character")
        .field("Ability Scores:", truncate(&sheet.lines.join("\n"), 1024), false)
        .field("Notes:", sheet.notes.join("\n"), true);
    match name {
        Some(name) => embed.description(name),
        None => embed,
    }
}

pub async fn roll_character_cmd(bot: &Handler, ctx: &Context, msg: &Message, args: Args<'_>) -> CommandResult {
    let (sheet, opengame) = {
        let state = bot.state.read().await;
        let settings = &state.settings;
        let sheet = roll_character(
            settings.attributes,
            settings.system,
            settings.score_threshold,
            &mut rand::thread_rng(),
        );
        (sheet, settings.opengame)
    };

    let embed = character_embed(&sheet, args.rest())
        .footer(CreateEmbedFooter::new(msg.author.display_name()).icon_url(msg.author.face()));

    match opengame {
        OpenGame::Yes => {
            msg.channel_id
                .send_message(&ctx.http, CreateMessage::new().embed(embed))
                .await?;
        }
        OpenGame::No => {
            for guild in ctx.cache.guilds() {
                let Some(channels) = guild.channels(&ctx.http).await.report_on_error() else {
                    continue;
                };
                for channel in channels.values() {
                    if channel.kind == ChannelType::Text && channel.name.starts_with("dm") {
                        channel
                            .send_message(&ctx.http, CreateMessage::new().embed(embed.clone()))
                            .await
                            .report_on_error();
                    }
                }
            }
            msg.author
                .direct_message(&ctx.http, CreateMessage::new().embed(embed))
                .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(1234)
    }

    #[test]
    fn test_attribute_counts_and_dice() {
        let mut rng = rng();
        let cases = [
            (AttributeMethod::InOrder, 6, "3d6"),
            (AttributeMethod::InOrderPlus, 6, "4d6K3"),
            (AttributeMethod::Ve, 7, "3d6"),
            (AttributeMethod::Heroic, 7, "4d6K3"),
        ];
        for (method, count, die) in cases {
            let roll = roll_attributes(method, &mut rng);
            assert_eq!(roll.rows.len(), count);
            assert_eq!(roll.die, die);
            assert!(roll.rows.iter().all(|(v, _)| (3..=18).contains(v)));
        }
    }

    #[test]
    fn test_dropped_dice_are_marked() {
        let roll = roll_attributes(AttributeMethod::Heroic, &mut rng());
        for (_, details) in &roll.rows {
            assert!(!details.contains("~~"));
            assert_eq!(details.matches('▾').count(), 2, "{details}");
        }
    }

    #[test]
    fn test_score_of_seven_values() {
        let mut rng = rng();
        for _ in 0..100 {
            let roll = roll_attributes(AttributeMethod::Ve, &mut rng);
            let values: Vec<i64> = roll.rows.iter().map(|(v, _)| *v).collect();
            assert!(values.windows(2).all(|w| w[0] >= w[1]), "{values:?}");

            let lowest = *values.last().unwrap();
            let low = values.iter().filter(|v| **v < 9).count();
            let expected = if low < 2 { values.iter().sum::<i64>() } else { 0 } - lowest;
            assert_eq!(roll.score, expected);
        }
    }

    #[test]
    fn test_score_of_six_values() {
        let mut rng = rng();
        for _ in 0..100 {
            let roll = roll_attributes(AttributeMethod::InOrder, &mut rng);
            let values: Vec<i64> = roll.rows.iter().map(|(v, _)| *v).collect();
            let low = values.iter().filter(|v| **v < 9).count();
            let expected: i64 = if low < 2 { values.iter().sum() } else { 0 };
            assert_eq!(roll.score, expected);
        }
    }

    #[test]
    fn test_modifiers() {
        assert_eq!(modifier(GameSystem::Ve, 18), Some("+2"));
        assert_eq!(modifier(GameSystem::Ve, 15), Some("+1"));
        assert_eq!(modifier(GameSystem::Ve, 14), None);
        assert_eq!(modifier(GameSystem::Ve, 7), None);
        assert_eq!(modifier(GameSystem::Ve, 6), Some("-1"));
        assert_eq!(modifier(GameSystem::Ve, 3), Some("-2"));

        assert_eq!(modifier(GameSystem::Ose, 18), Some("+3"));
        assert_eq!(modifier(GameSystem::Ose, 16), Some("+2"));
        assert_eq!(modifier(GameSystem::Ose, 13), Some("+1"));
        assert_eq!(modifier(GameSystem::Ose, 9), None);
        assert_eq!(modifier(GameSystem::Ose, 8), Some("-1"));
        assert_eq!(modifier(GameSystem::Ose, 5), Some("-2"));
        assert_eq!(modifier(GameSystem::Ose, 3), Some("-3"));
        assert_eq!(modifier(GameSystem::Ose, 0), None);
    }

    #[test]
    fn test_format_attribute() {
        assert_eq!(
            format_attribute(GameSystem::Ve, "3d6", 16, "[6, 5, 5]", Some("STR")),
            "3d6 -> **STR:    16 (+1)** <- [6, 5, 5]"
        );
        assert_eq!(
            format_attribute(GameSystem::Ose, "3d6", 10, "[3, 3, 4]", None),
            "3d6 -> **10** <- [3, 3, 4]"
        );
    }

    #[test]
    fn test_character_reaches_threshold() {
        let sheet = roll_character(AttributeMethod::Ve, GameSystem::Ve, 60, &mut rng());
        assert!(sheet.score >= 60);
        assert_eq!(sheet.lines.len(), 7);
        assert!(sheet.lines.iter().all(|line| line.starts_with("3d6 -> **")));
        assert_eq!(sheet.notes, ["Assign the attribute values as you wish."]);
    }

    #[test]
    fn test_in_order_characters_are_labelled() {
        let sheet = roll_character(AttributeMethod::InOrderPlus, GameSystem::Ose, 0, &mut rng());
        for (line, label) in sheet.lines.iter().zip(ATTRIBUTE_LABELS) {
            assert!(line.starts_with(&format!("4d6K3 -> **{label}:    ")), "{line}");
        }
    }

    #[test]
    fn test_character_embed() {
        let sheet = roll_character(AttributeMethod::InOrder, GameSystem::Ve, 0, &mut rng());

        let json = serde_json::to_value(character_embed(&sheet, None)).unwrap();
        assert_eq!(json["title"], "Character");
        assert!(json.get("description").map_or(true, serde_json::Value::is_null));
        assert_eq!(json["fields"][0]["name"], "Ability Scores:");
        assert_eq!(json["fields"][1]["name"], "Notes:");

        let json = serde_json::to_value(character_embed(&sheet, Some("Mira"))).unwrap();
        assert_eq!(json["title"], "Character");
        assert_eq!(json["description"], "Mira");
    }

    #[test]
    fn test_unreachable_threshold_gives_up() {
        let sheet = roll_character(AttributeMethod::InOrder, GameSystem::Ve, 1000, &mut rng());
        assert!(sheet.score < 1000);
        assert_eq!(sheet.lines.len(), 6);
    }
}
