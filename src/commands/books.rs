use serenity::all::{Context, CreateEmbed, CreateMessage, Message};

use super::{Args, CommandError, CommandResult};
use crate::books::{Book, Monster, MonsterBook};
use crate::bot::Handler;
use crate::utils::{or_dash, truncate};

const PAGE_SIZE: usize = 25;
const HIT_DIE: &str = "1d8";
const MAX_MONSTERS: usize = 50;

fn monster_embed(monster: &Monster, hit_points: Option<&[i64]>) -> CreateEmbed {
    let mut embed = CreateEmbed::new().title(format!("{} [**{}**]", monster.name, monster.id));
    for (name, value) in monster.stats() {
        embed = embed.field(name, or_dash(value), true);
    }
    if let Some(notes) = &monster.notes {
        embed = embed.field("Notes", truncate(notes, 1024), false);
    }
    if let Some(hit_points) = hit_points {
        let hit_points: Vec<String> = hit_points.iter().map(i64::to_string).collect();
        embed = embed.field("Hit Points", truncate(&hit_points.join(", "), 1024), false);
    }
    embed
}

/// The monster index sorted by name, as `(from, to, monsters)` pages.
pub fn monster_pages(book: &MonsterBook) -> Vec<(usize, usize, Vec<&Monster>)> {
    let mut index: Vec<&Monster> = book.index().iter().collect();
    index.sort_by(|a, b| a.name.cmp(&b.name));

    index
        .chunks(PAGE_SIZE)
        .enumerate()
        .map(|(i, chunk)| {
            let from = i * PAGE_SIZE + 1;
            (from, from + PAGE_SIZE - 1, chunk.to_vec())
        })
        .collect()
}

fn not_found(name: &str) -> String {
    format!("monster manual \"{name}\" not found")
}

pub async fn monster(bot: &Handler, ctx: &Context, msg: &Message, mut args: Args<'_>) -> CommandResult {
    let id = args.required()?;
    let count: usize = args.parse_or(0)?;
    if count > MAX_MONSTERS {
        return Err(CommandError::BadArgument(format!("at most {MAX_MONSTERS} monsters")));
    }

    let reply = {
        let state = bot.state.read().await;
        let book_id = &state.settings.monsters;
        match state.library.search(book_id) {
            Some(Book::Monsters(book)) => match book.search(id) {
                Some(monster) => {
                    let hit_points = if count > 0 {
                        match monster.roll_hit_points(count, HIT_DIE, &mut rand::thread_rng()) {
                            Ok(hit_points) => Some(hit_points),
                            Err(err) => {
                                tracing::warn!("cannot roll hit points for {}: {err}", monster.name);
                                None
                            }
                        }
                    } else {
                        None
                    };
                    Ok(monster_embed(monster, hit_points.as_deref()))
                }
                None => Err(format!("\"{id}\" not found")),
            },
            _ => Err(not_found(book_id)),
        }
    };

    match reply {
        Ok(embed) => {
            msg.channel_id
                .send_message(&ctx.http, CreateMessage::new().embed(embed))
                .await?;
        }
        Err(text) => {
            msg.channel_id.say(&ctx.http, text).await?;
        }
    }
    Ok(())
}

pub async fn monster_list(bot: &Handler, ctx: &Context, msg: &Message) -> CommandResult {
    let embeds = {
        let state = bot.state.read().await;
        let book_id = &state.settings.monsters;
        match state.library.search(book_id) {
            Some(Book::Monsters(book)) => {
                tracing::debug!("listed {} monsters", book.index().len());
                Ok(monster_pages(book)
                    .into_iter()
                    .map(|(from, to, monsters)| {
                        monsters.into_iter().fold(
                            CreateEmbed::new().title(format!("Monster Book. From {from} to {to}")),
                            |embed, monster| embed.field(or_dash(&monster.name), or_dash(&monster.id), true),
                        )
                    })
                    .collect::<Vec<_>>())
            }
            _ => Err(not_found(book_id)),
        }
    };

    match embeds {
        Ok(embeds) => {
            for embed in embeds {
                msg.channel_id
                    .send_message(&ctx.http, CreateMessage::new().embed(embed))
                    .await?;
            }
        }
        Err(text) => {
            msg.channel_id.say(&ctx.http, text).await?;
        }
    }
    Ok(())
}

pub async fn roll_table(bot: &Handler, ctx: &Context, msg: &Message, mut args: Args<'_>) -> CommandResult {
    let name = args.required()?;

    let reply = {
        let state = bot.state.read().await;
        match state.library.search(name) {
            Some(Book::Table(table)) => match table.roll(&mut rand::thread_rng()) {
                Ok(roll) if !roll.result.trim().is_empty() => Ok(CreateEmbed::new()
                    .title(table.title.clone())
                    .field("Result", truncate(&roll.result, 1024), false)
                    .field("Explanation", truncate(&roll.explanation.join("\n"), 1024), false)),
                Ok(_) => Err("something went wrong".to_string()),
                Err(err) => {
                    tracing::error!("rolling on {:?} failed: {err}", table.id);
                    Err("something went wrong".to_string())
                }
            },
            _ => Err(format!("table \"{name}\" not found")),
        }
    };

    match reply {
        Ok(embed) => {
            msg.channel_id
                .send_message(&ctx.http, CreateMessage::new().embed(embed))
                .await?;
        }
        Err(text) => {
            msg.channel_id.say(&ctx.http, text).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(count: usize) -> MonsterBook {
        let pages: Vec<serde_json::Value> = (0..count)
            .map(|i| serde_json::json!({"Id": i.to_string(), "Name": format!("Monster {:03}", count - i)}))
            .collect();
        serde_json::from_value(serde_json::json!({
            "Id": "mm", "Title": "Monsters", "Type": 1, "Pages": pages
        }))
        .unwrap()
    }

    #[test]
    fn test_monster_pages() {
        let book = book(30);
        let pages = monster_pages(&book);
        assert_eq!(pages.len(), 2);

        let (from, to, monsters) = &pages[0];
        assert_eq!((*from, *to), (1, 25));
        assert_eq!(monsters.len(), 25);
        assert_eq!(monsters[0].name, "Monster 001");
        assert_eq!(monsters[0].id, "29");

        let (from, to, monsters) = &pages[1];
        assert_eq!((*from, *to), (26, 50));
        assert_eq!(monsters.len(), 5);
        assert_eq!(monsters[4].name, "Monster 030");
    }

    #[test]
    fn test_empty_book_has_no_pages() {
        assert!(monster_pages(&book(0)).is_empty());
    }
}
