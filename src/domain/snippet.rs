/// Opening marker placed before the matched span in a snippet. Machine
/// readable rather than markup so the presentation layer owns highlighting.
pub const MATCH_OPEN: &str = "<<MATCH>>";
pub const MATCH_CLOSE: &str = "<<END>>";
pub const ELLIPSIS: &str = "...";

pub const SNIPPET_LENGTH: usize = 100;

/// Extract a fixed-size context window around the match at
/// `match_start..match_end` (byte offsets into `content`), wrapping the
/// matched span in `MATCH_OPEN`/`MATCH_CLOSE` and adding ellipses where the
/// window does not reach either end of the text.
pub fn build_snippet(
    content: &str,
    match_start: usize,
    match_end: usize,
    snippet_length: usize,
) -> String {
    let matched = &content[match_start..match_end];
    let context_chars = snippet_length.saturating_sub(matched.len()) / 2;

    let start = floor_char_boundary(content, match_start.saturating_sub(context_chars));
    let end = ceil_char_boundary(
        content,
        match_end.saturating_add(context_chars).min(content.len()),
    );

    let mut snippet = String::new();
    if start > 0 {
        snippet.push_str(ELLIPSIS);
    }
    snippet.push_str(&content[start..match_start]);
    snippet.push_str(MATCH_OPEN);
    snippet.push_str(matched);
    snippet.push_str(MATCH_CLOSE);
    snippet.push_str(&content[match_end..end]);
    if end < content.len() {
        snippet.push_str(ELLIPSIS);
    }
    snippet
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(s: &str, mut index: usize) -> usize {
    while index < s.len() && !s.is_char_boundary(index) {
        index += 1;
    }
    index
}
