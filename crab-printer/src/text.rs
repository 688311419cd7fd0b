//! Fixed-width text utilities for receipt layout
//!
//! Thermal printers in text mode give every character one cell, so widths
//! are counted in chars. Fields that do not fit are cut, never wrapped,
//! to keep columns aligned.

/// Number of printer cells a string occupies
pub fn text_width(s: &str) -> usize {
    s.chars().count()
}

/// Truncate a string to fit within `max_width` cells
pub fn truncate(s: &str, max_width: usize) -> String {
    s.chars().take(max_width).collect()
}

/// Pad a string to exactly `width` cells
///
/// If the string is longer than the width, it will be truncated.
pub fn fit(s: &str, width: usize, align_right: bool) -> String {
    let current_width = text_width(s);
    if current_width >= width {
        return truncate(s, width);
    }
    let spaces = width - current_width;
    if align_right {
        format!("{}{}", " ".repeat(spaces), s)
    } else {
        format!("{}{}", s, " ".repeat(spaces))
    }
}

/// Right-justify a value in `width` cells without ever cutting it
///
/// Used for numeric columns: an oversized amount pushes the line wider
/// rather than losing digits.
pub fn pad_start(s: &str, width: usize) -> String {
    let current_width = text_width(s);
    if current_width >= width {
        s.to_string()
    } else {
        format!("{}{}", " ".repeat(width - current_width), s)
    }
}
