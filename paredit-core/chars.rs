//! Char-indexed string helpers.
//!
//! Every offset handed around by the editor counts Unicode scalar values, not
//! bytes. These helpers translate between the two so callers can slice line
//! text without worrying about UTF-8 boundaries.

use std::borrow::Cow;

/// Number of chars in `s`.
#[inline]
pub fn char_len(s: &str) -> usize {
  s.chars().count()
}

/// Byte index of the char at `char_idx`, saturating at `s.len()`.
pub fn char_to_byte(s: &str, char_idx: usize) -> usize {
  s.char_indices()
    .nth(char_idx)
    .map(|(byte, _)| byte)
    .unwrap_or(s.len())
}

/// Slice `s` by char positions. Out of range positions saturate at the end of
/// the string, and a reversed range yields an empty slice.
pub fn slice_chars(s: &str, start: usize, end: usize) -> &str {
  if end <= start {
    return "";
  }
  let from = char_to_byte(s, start);
  let to = char_to_byte(s, end);
  &s[from..to]
}

/// Everything from char `start` to the end of `s`.
pub fn slice_chars_from(s: &str, start: usize) -> &str {
  &s[char_to_byte(s, start)..]
}

/// Split text into lines on `\r\n` or `\n`. Always yields at least one item.
pub fn split_lines(text: &str) -> Vec<&str> {
  let mut lines: Vec<&str> = text.split('\n').collect();
  let last = lines.len() - 1;
  // only a `\r` that precedes a `\n` belongs to the line break
  for line in &mut lines[..last] {
    let text: &str = *line;
    *line = text.strip_suffix('\r').unwrap_or(text);
  }
  lines
}

/// `text` with every `\r\n` turned into `\n`, which is how the buffer stores
/// line breaks. A lone `\r` is kept.
pub fn normalize_line_endings(text: &str) -> Cow<'_, str> {
  if text.contains("\r\n") {
    Cow::Owned(text.replace("\r\n", "\n"))
  } else {
    Cow::Borrowed(text)
  }
}
