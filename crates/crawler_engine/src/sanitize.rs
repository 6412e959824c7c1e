/// Longest cell text written to the spreadsheet, in characters.
pub const MAX_CELL_CHARS: usize = 32_000;

/// Appended to text cut at [`MAX_CELL_CHARS`].
pub const TRUNCATION_MARKER: &str = "...";

/// Removes control characters spreadsheets reject and caps the length.
///
/// Tab, line feed and carriage return are kept.
pub fn clean_text(text: &str) -> String {
    let mut cleaned: String = text.chars().filter(|c| !is_stripped_control(*c)).collect();
    if let Some((cut, _)) = cleaned.char_indices().nth(MAX_CELL_CHARS) {
        cleaned.truncate(cut);
        cleaned.push_str(TRUNCATION_MARKER);
    }
    cleaned
}

/// [`clean_text`], with `sentinel` standing in for text that was nothing but
/// control characters and whitespace.
pub fn clean_or(text: &str, sentinel: &str) -> String {
    let cleaned = clean_text(text);
    if cleaned.trim().is_empty() {
        sentinel.to_string()
    } else {
        cleaned
    }
}

fn is_stripped_control(c: char) -> bool {
    matches!(c, '\u{00}'..='\u{08}' | '\u{0B}'..='\u{0C}' | '\u{0E}'..='\u{1F}')
}
