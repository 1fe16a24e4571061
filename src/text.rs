//! Small text helpers shared by the executor, the browser driver and the prompt builder.

/// Truncate `text` to at most `max_chars` characters, marking the cut.
///
/// Cuts on a char boundary so multi-byte output never panics.
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((byte_idx, _)) => {
            let total = text.chars().count();
            format!("{}...\n[truncated, {} chars total]", &text[..byte_idx], total)
        }
    }
}

/// Shorten a single-line preview (log lines, status output).
pub fn preview(text: &str, max_chars: usize) -> String {
    let line = text.lines().next().unwrap_or("");
    match line.char_indices().nth(max_chars) {
        None if line.len() == text.len() => line.to_string(),
        None => format!("{}...", line),
        Some((byte_idx, _)) => format!("{}...", &line[..byte_idx]),
    }
}
