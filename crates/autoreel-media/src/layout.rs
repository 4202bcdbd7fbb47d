//! Greedy word wrapping for caption overlays.
//!
//! Lengths are counted in `char`s so accented text wraps by what is drawn,
//! not by its UTF-8 byte length.

/// Default line width for portrait captions.
pub const DEFAULT_MAX_CHARS_PER_LINE: usize = 22;

/// Wrap `text` into lines of at most `max_chars_per_line` characters.
///
/// Words are split on any whitespace and never broken; a word longer than
/// the limit gets a line of its own. Each line is filled as far as it goes
/// before wrapping.
pub fn wrap(text: &str, max_chars_per_line: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if current_len == 0 {
            current.push_str(word);
            current_len = word_len;
        } else if current_len + word_len + 1 <= max_chars_per_line {
            current.push(' ');
            current.push_str(word);
            current_len += word_len + 1;
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
            current_len = word_len;
        }
    }

    if current_len > 0 {
        lines.push(current);
    }

    lines
}

/// Wrap and join with line breaks, ready for the overlay.
pub fn wrap_display(text: &str, max_chars_per_line: usize) -> String {
    wrap(text, max_chars_per_line).join("\n")
}
