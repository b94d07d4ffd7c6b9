//! Parsers for the command server's text output.
//!
//! The server reports favorites, playlists and queues as numbered plain-text
//! lists. These are pure functions from raw text to structured records so
//! they can be tested without any network code. Grammar: line-oriented,
//! blank lines ignored, lines that don't match `<int>:<rest>` rejected.

use crate::model::{ListItem, QueueItem};

/// Single-word status responses that must never be mistaken for list items.
const STATUS_RESPONSES: &[&str] = &[
    "on",
    "off",
    "stopped",
    "playing",
    "paused",
    "transitioning",
    "in progress",
    "shuffle",
    "repeat",
    "crossfade",
];

fn is_status_response(text: &str) -> bool {
    let lower = text.to_lowercase();
    STATUS_RESPONSES.contains(&lower.as_str())
}

/// Parse a numbered `<int>: <name>` list (favorites, playlists, stations).
pub fn parse_numbered_list(output: &str) -> Vec<ListItem> {
    let mut items = Vec::new();
    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || is_status_response(trimmed) {
            continue;
        }
        let Some((number_part, name_part)) = trimmed.split_once(':') else {
            continue;
        };
        let Ok(number) = number_part.trim().parse::<u32>() else {
            continue;
        };
        let name = name_part.trim();
        if !name.is_empty() && !is_status_response(name) {
            items.push(ListItem {
                number,
                name: name.to_string(),
            });
        }
    }
    items
}

/// Case-insensitive ASCII prefix strip.
fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        text.get(prefix.len()..)
    } else {
        None
    }
}

/// Split a pipe-delimited `Artist: X | Album: Y | Title: Z` record.
/// Returns `(artist, album, title)`; fields absent from the record are empty.
pub fn parse_pipe_fields(content: &str) -> (String, String, String) {
    let mut artist = String::new();
    let mut album = String::new();
    let mut title = String::new();

    for part in content.split('|') {
        let part = part.trim();
        if let Some(rest) = strip_prefix_ci(part, "artist:") {
            artist = rest.trim().to_string();
        } else if let Some(rest) = strip_prefix_ci(part, "album:") {
            album = rest.trim().to_string();
        } else if let Some(rest) = strip_prefix_ci(part, "title:") {
            title = rest.trim().to_string();
        }
    }
    (artist, album, title)
}

/// Parse queue output. Each line is `<int>: <record>` where the record is
/// pipe-delimited; a `*` (or `*>`) marks the currently playing track.
pub fn parse_queue_list(output: &str) -> Vec<QueueItem> {
    let mut items = Vec::new();
    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let is_current = line.contains('*');
        let cleaned = line.replace("*>", "").replace('*', "");
        let trimmed = cleaned.trim();

        let Some((number_part, content_part)) = trimmed.split_once(':') else {
            continue;
        };
        let Ok(number) = number_part.trim().parse::<u32>() else {
            continue;
        };

        let content = content_part.trim();
        let (artist, album, mut title) = parse_pipe_fields(content);
        // Unstructured record: take the whole content as title
        if title.is_empty() && artist.is_empty() {
            title = content.to_string();
        }

        items.push(QueueItem {
            number,
            title,
            artist,
            album,
            is_current,
        });
    }
    items
}

/// Map an `on`/`off` status response to a boolean. Anything other than a
/// case-insensitive `on` is false.
pub fn parse_on_off(result: &str) -> bool {
    result.trim().eq_ignore_ascii_case("on")
}
