//! Splitting generated text into transport-sized messages

/// Largest single message the chat transport accepts, in UTF-16 code units
pub const TRANSPORT_MAX_CHARS: usize = 4096;

/// Split `text` into trimmed, non-empty pieces of at most `max_units` UTF-16
/// code units, preferring to cut at line breaks and then at whitespace.
///
/// Each window (starting past any whitespace) is cut at its end when the
/// next character is whitespace. Otherwise it is cut at the last line break
/// in the back half of the window, then at the last whitespace inside the
/// window, and only then mid-word at the window boundary. A lone character
/// wider than the window still forms its own piece.
pub fn chunk(text: &str, max_units: usize) -> Vec<String> {
    let max_units = max_units.max(1);
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        while start < chars.len() && chars[start].is_whitespace() {
            start += 1;
        }
        if start == chars.len() {
            break;
        }

        let mut end = start;
        let mut units = 0;
        while end < chars.len() && units + chars[end].len_utf16() <= max_units {
            units += chars[end].len_utf16();
            end += 1;
        }
        if end == start {
            end += 1;
        }

        if end < chars.len() && !chars[end].is_whitespace() {
            let half = start + (end - start) / 2;
            let newline = (half.max(start + 1)..end).rev().find(|&i| chars[i] == '\n');
            let space = || (start + 1..end).rev().find(|&i| chars[i].is_whitespace());
            if let Some(cut) = newline.or_else(space) {
                end = cut;
            }
        }

        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }
        start = end;
    }

    chunks
}

/// Rewrite Markdown `* ` bullets with an arrow marker that renders the same
/// on every chat client.
pub fn format_bullets(text: &str) -> String {
    text.split('\n')
        .map(|line| match line.trim().strip_prefix("* ") {
            Some(rest) => format!("➤ {rest}"),
            None => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
