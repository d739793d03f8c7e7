//! The line buffer behind the editor.
//!
//! Text is stored as a list of [`TextLine`]s, each carrying its own tokens and
//! the scanner state it was lexed with. Edits go through
//! [`LineInputModel::change_range`], which lexes the replacement lines right
//! away and queues the affected lines as dirty. [`LineInputModel::flush_changes`]
//! later re-lexes the queue and cascades downwards for as long as a line ends
//! in a different state than the line below was lexed with (typically after
//! opening or closing a multi-line string).
//!
//! All offsets are char offsets. Every line, including the last one, counts one
//! extra position for its line break, so the largest valid offset is
//! `Σ(len + 1) - 1`.

use std::collections::{
  BTreeSet,
  HashSet,
};

use paredit_core::{
  chars::{
    char_len,
    normalize_line_endings,
    slice_chars,
    slice_chars_from,
    split_lines,
  },
  scanner::Scanner,
  token::{
    ScannerState,
    Token,
  },
};

use crate::{
  cursor::TokenCursor,
  history::{
    Selection,
    UndoManager,
    UndoStep,
  },
};

/// A single line of text and its tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextLine {
  text:        String,
  len:         usize,
  tokens:      Vec<Token>,
  start_state: ScannerState,
  end_state:   ScannerState,
}

impl TextLine {
  fn new(text: String, state: ScannerState, scanner: &mut Scanner) -> Self {
    let tokens = scanner.process_line(&text, state);
    Self {
      len: char_len(&text),
      text,
      tokens,
      start_state: state,
      end_state: scanner.state(),
    }
  }

  fn process(&mut self, state: ScannerState, scanner: &mut Scanner) {
    self.tokens = scanner.process_line(&self.text, state);
    self.start_state = state;
    self.end_state = scanner.state();
  }

  pub fn text(&self) -> &str {
    &self.text
  }

  /// Length of the line in chars, without the line break.
  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  /// Tokens of the line, always ending with an end-of-line sentinel.
  pub fn tokens(&self) -> &[Token] {
    &self.tokens
  }

  /// State the line was last lexed with.
  pub fn start_state(&self) -> ScannerState {
    self.start_state
  }

  pub fn end_state(&self) -> ScannerState {
    self.end_state
  }
}

/// Line level bookkeeping accumulated since the last
/// [`LineInputModel::take_changes`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChangeTracking {
  /// Lines whose text or tokens changed.
  pub changed:  BTreeSet<usize>,
  /// `(first line, count)` runs of inserted lines.
  pub inserted: Vec<(usize, usize)>,
  /// `(first line, count)` runs of deleted lines.
  pub deleted:  Vec<(usize, usize)>,
}

impl ChangeTracking {
  pub fn is_empty(&self) -> bool {
    self.changed.is_empty() && self.inserted.is_empty() && self.deleted.is_empty()
  }
}

/// Ordered lines of a tokenized buffer.
#[derive(Debug)]
pub struct LineInputModel {
  lines:              Vec<TextLine>,
  scanner:            Scanner,
  /// Lines which must be re-lexed on the next flush.
  dirty_lines:        Vec<usize>,
  changes:            ChangeTracking,
  pub undo_manager:   UndoManager,
  /// When set, every edit is recorded in [`Self::undo_manager`].
  pub recording_undo: bool,
}

impl Default for LineInputModel {
  fn default() -> Self {
    Self::new()
  }
}

impl LineInputModel {
  pub fn new() -> Self {
    let mut scanner = Scanner::new();
    let first = TextLine::new(String::new(), ScannerState::INITIAL, &mut scanner);
    Self {
      lines: vec![first],
      scanner,
      dirty_lines: Vec::new(),
      changes: ChangeTracking::default(),
      undo_manager: UndoManager::default(),
      recording_undo: false,
    }
  }

  /// Builds a flushed model holding `text`, with no pending changes.
  pub fn from_text(text: &str) -> Self {
    let mut model = Self::new();
    model.insert_string(0, text, None, None);
    model.flush_changes();
    model.take_changes();
    model
  }

  pub fn lines(&self) -> &[TextLine] {
    &self.lines
  }

  pub fn line(&self, idx: usize) -> Option<&TextLine> {
    self.lines.get(idx)
  }

  pub fn line_count(&self) -> usize {
    self.lines.len()
  }

  pub fn dirty_lines(&self) -> &[usize] {
    &self.dirty_lines
  }

  pub fn changed_lines(&self) -> &BTreeSet<usize> {
    &self.changes.changed
  }

  pub fn inserted_lines(&self) -> &[(usize, usize)] {
    &self.changes.inserted
  }

  pub fn deleted_lines(&self) -> &[(usize, usize)] {
    &self.changes.deleted
  }

  /// Drains the change tracking sets, leaving them empty.
  pub fn take_changes(&mut self) -> ChangeTracking {
    std::mem::take(&mut self.changes)
  }

  /// Shift tracked line indices after `deleted` lines at `start` were
  /// replaced by `inserted` lines.
  fn update_lines(&mut self, start: usize, deleted: usize, inserted: usize) {
    let removed = start..start + deleted;
    let shift = |idx: usize| {
      if idx >= start {
        idx + inserted - deleted
      } else {
        idx
      }
    };

    self.dirty_lines.retain(|idx| !removed.contains(idx));
    for idx in &mut self.dirty_lines {
      *idx = shift(*idx);
    }

    let changes = &mut self.changes;
    changes.changed = changes
      .changed
      .iter()
      .filter(|&&idx| !removed.contains(&idx))
      .map(|&idx| shift(idx))
      .collect();
    for runs in [&mut changes.inserted, &mut changes.deleted] {
      runs.retain(|(first, _)| !removed.contains(first));
      for (first, _) in runs.iter_mut() {
        *first = shift(*first);
      }
    }
  }

  fn delete_lines(&mut self, start: usize, count: usize) {
    if count == 0 {
      return;
    }
    self.update_lines(start, count, 0);
    self.changes.deleted.push((start, count));
  }

  fn insert_lines(&mut self, start: usize, count: usize) {
    if count == 0 {
      return;
    }
    self.update_lines(start, 0, count);
    self.changes.inserted.push((start, count));
  }

  /// Queue a line for re-lexing.
  pub fn mark_dirty(&mut self, idx: usize) {
    if idx < self.lines.len() && !self.dirty_lines.contains(&idx) {
      self.dirty_lines.push(idx);
    }
  }

  /// Re-lex every dirty line, cascading onto the lines below while their
  /// recorded start state disagrees with the new end state above them.
  pub fn flush_changes(&mut self) {
    if self.dirty_lines.is_empty() {
      return;
    }
    let mut queue = std::mem::take(&mut self.dirty_lines);
    queue.sort_unstable();
    let mut seen = HashSet::new();
    for first in queue {
      if seen.contains(&first) || first >= self.lines.len() {
        continue;
      }
      let mut idx = first;
      let mut state = self.state_for_line(idx);
      loop {
        seen.insert(idx);
        self.changes.changed.insert(idx);
        let line = &mut self.lines[idx];
        line.process(state, &mut self.scanner);
        state = line.end_state;
        idx += 1;
        match self.lines.get(idx) {
          Some(next) if next.start_state != state => {},
          _ => break,
        }
      }
      if idx - first > 1 {
        tracing::trace!(first, last = idx - 1, "cascaded re-lex");
      }
    }
  }

  /// Offset of the first char of `line`.
  pub fn get_offset_for_line(&self, line: usize) -> usize {
    self.lines.iter().take(line).map(|line| line.len + 1).sum()
  }

  /// Largest valid offset: the position after the last char of the last line.
  pub fn max_offset(&self) -> usize {
    self.lines.iter().map(|line| line.len + 1).sum::<usize>() - 1
  }

  /// Row and column of `offset`. Offsets past the end map to the end of the
  /// last line.
  pub fn get_row_col(&self, offset: usize) -> (usize, usize) {
    let mut offset = offset;
    for (row, line) in self.lines.iter().enumerate() {
      if offset > line.len {
        offset -= line.len + 1;
      } else {
        return (row, offset);
      }
    }
    let last = self.lines.len() - 1;
    (last, self.lines[last].len)
  }

  /// Text between `start` and `end`, in either order, with lines joined by
  /// `\n`. With `must_be_within` an empty string is returned when either
  /// bound lies past [`Self::max_offset`].
  pub fn get_text(&self, start: usize, end: usize, must_be_within: bool) -> String {
    if start == end {
      return String::new();
    }
    let (from, to) = (start.min(end), start.max(end));
    if must_be_within && to > self.max_offset() {
      return String::new();
    }
    let (start_row, start_col) = self.get_row_col(from);
    let (end_row, end_col) = self.get_row_col(to);
    if start_row == end_row {
      return slice_chars(&self.lines[start_row].text, start_col, end_col).to_string();
    }
    let mut text = String::from(slice_chars_from(&self.lines[start_row].text, start_col));
    for line in &self.lines[start_row + 1..end_row] {
      text.push('\n');
      text.push_str(&line.text);
    }
    text.push('\n');
    text.push_str(slice_chars(&self.lines[end_row].text, 0, end_col));
    text
  }

  /// Scanner state a line should start in: the end state of the line above.
  pub fn state_for_line(&self, line: usize) -> ScannerState {
    match line.checked_sub(1).and_then(|prev| self.lines.get(prev)) {
      Some(prev) => prev.end_state,
      None => ScannerState::INITIAL,
    }
  }

  /// Replace the text between `start` and `end` with `text`. `\r\n` line
  /// breaks are stored as `\n`.
  ///
  /// The selections are only used for undo bookkeeping.
  pub fn change_range(
    &mut self,
    start: usize,
    end: usize,
    text: &str,
    old_selection: Option<Selection>,
    new_selection: Option<Selection>,
  ) {
    let (start, end) = (start.min(end), start.max(end));
    let text = normalize_line_endings(text);
    let deleted = if self.recording_undo {
      self.get_text(start, end, false)
    } else {
      String::new()
    };
    let (start_line, start_col) = self.get_row_col(start);
    let (end_line, end_col) = self.get_row_col(end);

    let replace = split_lines(&text);
    let left = slice_chars(&self.lines[start_line].text, 0, start_col).to_string();
    let right = slice_chars_from(&self.lines[end_line].text, end_col).to_string();

    let last = replace.len() - 1;
    let mut state = self.state_for_line(start_line);
    let mut items = Vec::with_capacity(replace.len());
    for (i, fragment) in replace.iter().enumerate() {
      let mut line = String::new();
      if i == 0 {
        line.push_str(&left);
      }
      line.push_str(fragment);
      if i == last {
        line.push_str(&right);
      }
      // lines after the first are provisional until the next flush
      let line = TextLine::new(line, state, &mut self.scanner);
      state = line.end_state;
      items.push(line);
    }

    let removed = end_line - start_line;
    if last < removed {
      self.delete_lines(start_line + 1, removed - last);
    } else {
      self.insert_lines(start_line + 1, last - removed);
    }
    self.changes.changed.extend(start_line..=start_line + last);
    self.lines.splice(start_line..=end_line, items);

    self.mark_dirty(start_line);
    if last > 0 {
      self.mark_dirty(start_line + 1);
      self.mark_dirty(start_line + last);
    }

    tracing::trace!(
      start,
      end,
      inserted = text.len(),
      lines = self.lines.len(),
      "changed range"
    );

    if self.recording_undo {
      self.undo_manager.add_undo_step(UndoStep::edit(
        start,
        text.into_owned(),
        deleted,
        old_selection,
        new_selection,
      ));
    }
  }

  /// Insert `text` at `offset`, returning the number of chars it took up in
  /// the buffer.
  pub fn insert_string(
    &mut self,
    offset: usize,
    text: &str,
    old_selection: Option<Selection>,
    new_selection: Option<Selection>,
  ) -> usize {
    let text = normalize_line_endings(text);
    self.change_range(offset, offset, &text, old_selection, new_selection);
    char_len(&text)
  }

  /// Delete `count` chars starting at `offset`.
  pub fn delete_range(
    &mut self,
    offset: usize,
    count: usize,
    old_selection: Option<Selection>,
    new_selection: Option<Selection>,
  ) {
    self.change_range(offset, offset + count, "", old_selection, new_selection);
  }

  /// Cursor on the token containing `offset`, or on the token before it when
  /// `previous` is set.
  pub fn get_token_cursor(&self, offset: usize, previous: bool) -> TokenCursor<'_> {
    let (row, col) = self.get_row_col(offset);
    let tokens = &self.lines[row].tokens;
    let idx = tokens
      .iter()
      .rposition(|token| token.offset <= col)
      .unwrap_or(0);
    let idx = if previous { idx.saturating_sub(1) } else { idx };
    TokenCursor::new(self, row, idx)
  }

  /// The whole text of the buffer.
  pub fn text(&self) -> String {
    self.get_text(0, self.max_offset(), false)
  }
}
