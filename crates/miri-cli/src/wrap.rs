use unicode_width::UnicodeWidthChar;
use unicode_width::UnicodeWidthStr;

/// Greedy wrap by display width. Prefers breaking after a space and falls
/// back to breaking inside a word. Always returns at least one row.
pub fn wrap_to_width(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }
    let mut rows = Vec::new();
    let mut row = String::new();
    let mut row_width = 0;
    for ch in text.chars() {
        let ch_width = ch.width().unwrap_or(0);
        if !row.is_empty() && row_width + ch_width > width {
            match row.rfind(' ').filter(|&pos| pos > 0) {
                Some(pos) => {
                    let rest = row.split_off(pos + 1);
                    rows.push(row.trim_end().to_string());
                    row = rest;
                    row_width = row.width();
                }
                None => {
                    rows.push(std::mem::take(&mut row));
                    row_width = 0;
                }
            }
        }
        row.push(ch);
        row_width += ch_width;
    }
    rows.push(row);
    rows
}
