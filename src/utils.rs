use std::io::{self, BufRead as _, Write as _};

/// Writes `prompt` to stdout and reads one line from stdin, without the line ending.
pub fn prompt(prompt: &str) -> anyhow::Result<String> {
    let stdout = io::stdout();
    let mut stdout = stdout.lock();
    stdout.write_all(prompt.as_bytes())?;
    stdout.flush()?;

    let stdin = io::stdin();
    let mut stdin = stdin.lock();

    let mut line = String::new();
    stdin.read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Picks the item whose name equals `prefix`, or else the only one whose name
/// starts with it.
pub fn resolve_prefix<T, F>(prefix: &str, items: impl IntoIterator<Item = T>, name: F) -> Option<T>
where
    F: Fn(&T) -> &str,
{
    if prefix.is_empty() {
        return None;
    }

    let mut found = None;
    let mut count = 0;
    for item in items {
        let item_name = name(&item);
        if item_name == prefix {
            return Some(item);
        }
        if item_name.starts_with(prefix) {
            count += 1;
            found = Some(item);
        }
    }

    if count == 1 {
        found
    } else {
        None
    }
}

/// Discord rejects embed fields with empty values.
pub fn or_dash(value: &str) -> &str {
    if value.trim().is_empty() {
        "-"
    } else {
        value
    }
}

/// Cuts `text` to at most `max` characters, marking the cut with an ellipsis.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
