use crate::domain::{Message, Part};

/// Concatenated free-text content of a message, the unit the search engine
/// matches against. Only text and reasoning parts contribute; tool payloads
/// and step markers are excluded.
pub fn searchable_message_text(message: &Message) -> Option<String> {
    let mut content = String::new();
    for part in &message.parts {
        let chunk = match part {
            Part::Text { text } | Part::Reasoning { text } => text,
            _ => continue,
        };
        if chunk.trim().is_empty() {
            continue;
        }
        if !content.is_empty() {
            content.push('\n');
        }
        content.push_str(chunk);
    }

    if content.trim().is_empty() {
        None
    } else {
        Some(content)
    }
}
