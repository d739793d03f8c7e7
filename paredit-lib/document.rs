//! Editor state around a [`LineInputModel`].
//!
//! A [`Document`] owns the buffer together with the selection, the remembered
//! caret column and the grow-selection stack. It is the context paredit
//! commands and undo/redo run against. Every mutation made through a
//! `Document` is recorded for undo and leaves the buffer flushed.

use paredit_core::chars::{
  char_len,
  normalize_line_endings,
};

use crate::{
  config::IndentConfig,
  cursor::TokenCursor,
  history::{
    Selection,
    UndoContext,
    UndoManager,
  },
  indent,
  model::LineInputModel,
};

#[derive(Debug, Default)]
pub struct Document {
  model:                    LineInputModel,
  selection_start:          usize,
  selection_end:            usize,
  /// Selections pushed by `grow_selection`, popped by `shrink_selection`.
  pub grow_selection_stack: Vec<Selection>,
  /// Column the caret tries to keep when moving between lines.
  caret_x:                  usize,
  indent:                   IndentConfig,
}

impl Document {
  pub fn new() -> Self {
    Self::default()
  }

  /// A document holding `text`, with the caret at the start.
  pub fn from_text(text: &str) -> Self {
    Self {
      model: LineInputModel::from_text(text),
      ..Self::default()
    }
  }

  pub fn with_indent_config(mut self, indent: IndentConfig) -> Self {
    self.indent = indent;
    self
  }

  pub fn model(&self) -> &LineInputModel {
    &self.model
  }

  pub fn model_mut(&mut self) -> &mut LineInputModel {
    &mut self.model
  }

  pub fn indent_config(&self) -> &IndentConfig {
    &self.indent
  }

  pub fn text(&self) -> String {
    self.model.text()
  }

  pub fn selection_start(&self) -> usize {
    self.selection_start
  }

  pub fn selection_end(&self) -> usize {
    self.selection_end
  }

  pub fn selection(&self) -> Selection {
    Selection::new(self.selection_start, self.selection_end)
  }

  pub fn set_selection_start(&mut self, offset: usize) {
    self.selection_start = offset.min(self.model.max_offset());
  }

  pub fn set_selection_end(&mut self, offset: usize) {
    self.selection_end = offset.min(self.model.max_offset());
  }

  /// Set both ends of the selection, clamped to the document.
  pub fn set_selection(&mut self, selection: Selection) {
    self.set_selection_start(selection.start);
    self.set_selection_end(selection.end);
  }

  /// Collapse the selection to `offset`.
  pub fn set_caret(&mut self, offset: usize) {
    self.set_selection(Selection::point(offset));
  }

  pub fn caret_x(&self) -> usize {
    self.caret_x
  }

  fn update_caret_x(&mut self) {
    self.caret_x = self.model.get_row_col(self.selection_end).1;
  }

  /// Cursor at the caret.
  pub fn get_token_cursor(&self) -> TokenCursor<'_> {
    self.model.get_token_cursor(self.selection_end, false)
  }

  /// Run `body` with undo recording on, collecting its edits into a single
  /// undo step. The buffer is flushed afterwards.
  pub fn with_undo<R>(&mut self, body: impl FnOnce(&mut Self) -> R) -> R {
    let recording = std::mem::replace(&mut self.model.recording_undo, true);
    let result = UndoManager::with_undo(self, body);
    self.model.recording_undo = recording;
    self.model.flush_changes();
    result
  }

  pub fn undo(&mut self) {
    UndoManager::undo(self);
    self.model.flush_changes();
    self.update_caret_x();
  }

  pub fn redo(&mut self) {
    UndoManager::redo(self);
    self.model.flush_changes();
    self.update_caret_x();
  }

  /// Replace the selection with `text`, leaving the caret after it.
  pub fn insert_string(&mut self, text: &str) {
    let text = normalize_line_endings(text);
    self.with_undo(|doc| {
      if !doc.selection().is_empty() {
        doc.delete_selection();
      }
      let start = doc.selection_end;
      let end = start + char_len(&text);
      doc.model.insert_string(
        start,
        &text,
        Some(doc.selection()),
        Some(Selection::point(end)),
      );
      doc.set_caret(end);
      doc.update_caret_x();
    });
  }

  pub fn delete_selection(&mut self) {
    self.with_undo(|doc| {
      let selection = doc.selection();
      if selection.is_empty() {
        return;
      }
      let start = selection.min();
      doc.model.delete_range(
        start,
        selection.max() - start,
        Some(selection),
        Some(Selection::point(start)),
      );
      doc.set_caret(start);
    });
  }

  /// Delete the selection, or the char before the caret.
  pub fn backspace(&mut self) {
    self.with_undo(|doc| {
      if !doc.selection().is_empty() {
        doc.delete_selection();
      } else if doc.selection_end > 0 {
        let end = doc.selection_end;
        doc.model.delete_range(
          end - 1,
          1,
          Some(Selection::point(end)),
          Some(Selection::point(end - 1)),
        );
        doc.set_caret(end - 1);
      }
      doc.update_caret_x();
    });
  }

  /// Delete the selection, or the char after the caret.
  pub fn delete(&mut self) {
    self.with_undo(|doc| {
      if !doc.selection().is_empty() {
        doc.delete_selection();
      } else if doc.selection_end < doc.model.max_offset() {
        let end = doc.selection_end;
        let caret = Selection::point(end);
        doc.model.delete_range(end, 1, Some(caret), Some(caret));
        doc.set_caret(end);
      }
      doc.update_caret_x();
    });
  }

  /// Move the selection end to `offset`, dragging the start along when
  /// `clear` is set.
  fn move_caret(&mut self, offset: usize, clear: bool) {
    self.set_selection_end(offset);
    if clear {
      self.selection_start = self.selection_end;
    }
  }

  /// Move the caret one char left. With `clear`, a selection collapses to
  /// its left edge instead.
  pub fn caret_left(&mut self, clear: bool) {
    if clear && !self.selection().is_empty() {
      self.set_caret(self.selection().min());
    } else {
      self.move_caret(self.selection_end.saturating_sub(1), clear);
    }
    self.update_caret_x();
  }

  /// Move the caret one char right. With `clear`, a selection collapses to
  /// its right edge instead.
  pub fn caret_right(&mut self, clear: bool) {
    if clear && !self.selection().is_empty() {
      self.set_caret(self.selection().max());
    } else {
      self.move_caret(self.selection_end + 1, clear);
    }
    self.update_caret_x();
  }

  /// Start of the current line.
  pub fn caret_home(&mut self, clear: bool) {
    let (_, col) = self.model.get_row_col(self.selection_end);
    self.move_caret(self.selection_end - col, clear);
    self.update_caret_x();
  }

  /// End of the current line.
  pub fn caret_end(&mut self, clear: bool) {
    let (row, col) = self.model.get_row_col(self.selection_end);
    let len = self.model.lines()[row].len();
    self.move_caret(self.selection_end - col + len, clear);
    self.update_caret_x();
  }

  pub fn caret_home_all(&mut self, clear: bool) {
    self.move_caret(0, clear);
    self.update_caret_x();
  }

  pub fn caret_end_all(&mut self, clear: bool) {
    self.move_caret(self.model.max_offset(), clear);
    self.update_caret_x();
  }

  /// Previous line, keeping the remembered column where the line allows.
  /// On the first line the caret goes to the start of the document.
  pub fn caret_up(&mut self, clear: bool) {
    let (row, _) = self.model.get_row_col(self.selection_end);
    let offset = match row.checked_sub(1) {
      Some(above) => {
        let len = self.model.lines()[above].len();
        self.model.get_offset_for_line(above) + self.caret_x.min(len)
      },
      None => 0,
    };
    self.move_caret(offset, clear);
  }

  /// Next line, keeping the remembered column where the line allows. On the
  /// last line the caret goes to the end of the document.
  pub fn caret_down(&mut self, clear: bool) {
    let (row, _) = self.model.get_row_col(self.selection_end);
    let offset = if row + 1 < self.model.line_count() {
      let len = self.model.lines()[row + 1].len();
      self.model.get_offset_for_line(row + 1) + self.caret_x.min(len)
    } else {
      self.model.max_offset()
    };
    self.move_caret(offset, clear);
  }

  pub fn select_all(&mut self) {
    self.selection_start = 0;
    self.selection_end = self.model.max_offset();
    self.update_caret_x();
  }

  /// True when the caret sits at the very end with nothing selected, which
  /// is when a return submits the input instead of breaking the line.
  pub fn can_return(&self) -> bool {
    self.selection().is_empty() && self.selection_end == self.model.max_offset()
  }

  /// Replace the whole text, as when recalling history, and put the caret at
  /// the end.
  pub fn replace_all(&mut self, text: &str) {
    let text = normalize_line_endings(text);
    self.with_undo(|doc| {
      let max = doc.model.max_offset();
      doc.model.change_range(0, max, &text, None, None);
      doc.set_caret(char_len(&text));
      doc.update_caret_x();
    });
  }

  /// Break the line at the caret and indent the new line.
  pub fn newline_and_indent(&mut self) {
    self.model.undo_manager.insert_undo_stop();
    let indent = indent::get_indent(&self.model, self.selection_end, &self.indent);
    let mut text = String::with_capacity(indent + 1);
    text.push('\n');
    text.extend(std::iter::repeat_n(' ', indent));
    self.insert_string(&text);
  }
}

impl UndoContext for Document {
  fn model_mut(&mut self) -> &mut LineInputModel {
    &mut self.model
  }

  fn selection(&self) -> Selection {
    Document::selection(self)
  }

  fn set_selection(&mut self, selection: Selection) {
    Document::set_selection(self, selection);
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn test_insert_replaces_selection() {
    let mut doc = Document::from_text("hello world");
    doc.set_selection(Selection::new(6, 11));
    doc.insert_string("there");
    assert_eq!(doc.text(), "hello there");
    assert_eq!(doc.selection(), Selection::point(11));

    doc.undo();
    assert_eq!(doc.text(), "hello world");
    assert_eq!(doc.selection(), Selection::new(6, 11));
    doc.redo();
    assert_eq!(doc.text(), "hello there");
  }

  #[test]
  fn test_typing_undoes_as_one_step() {
    let mut doc = Document::new();
    for ch in ["(", "f", "o", "o"] {
      doc.insert_string(ch);
    }
    assert_eq!(doc.text(), "(foo");
    assert_eq!(doc.model().undo_manager.undos().len(), 1);
    doc.undo();
    assert_eq!(doc.text(), "");
    assert_eq!(doc.selection(), Selection::point(0));
  }

  #[test]
  fn test_crlf_insert_undoes_exactly() {
    let mut doc = Document::from_text("xyz");
    doc.insert_string("a\r\nb");
    assert_eq!(doc.text(), "a\nbxyz");
    assert_eq!(doc.selection(), Selection::point(3));

    doc.undo();
    assert_eq!(doc.text(), "xyz");
    assert_eq!(doc.selection(), Selection::point(0));
    doc.redo();
    assert_eq!(doc.text(), "a\nbxyz");
    assert_eq!(doc.selection(), Selection::point(3));

    // typing after a CRLF still joins the same step
    let mut doc = Document::new();
    doc.insert_string("a\r\n");
    doc.insert_string("b");
    assert_eq!(doc.text(), "a\nb");
    assert_eq!(doc.model().undo_manager.undos().len(), 1);
    doc.undo();
    assert_eq!(doc.text(), "");

    doc.replace_all("(a\r\n b)");
    assert_eq!(doc.selection(), Selection::point(6));
    assert!(doc.can_return());
  }

  #[test]
  fn test_backspace_and_delete() {
    let mut doc = Document::from_text("abc");
    doc.set_caret(2);
    doc.backspace();
    assert_eq!(doc.text(), "ac");
    assert_eq!(doc.selection_end(), 1);
    doc.delete();
    assert_eq!(doc.text(), "a");

    // nothing to delete at either edge
    doc.delete();
    doc.set_caret(0);
    doc.backspace();
    assert_eq!(doc.text(), "a");
  }

  #[test]
  fn test_selection_is_clamped() {
    let mut doc = Document::from_text("ab\ncd");
    doc.set_selection(Selection::new(2, 99));
    assert_eq!(doc.selection(), Selection::new(2, 5));
    doc.select_all();
    assert_eq!(doc.selection(), Selection::new(0, 5));
    assert!(!doc.can_return());
    doc.caret_right(true);
    assert!(doc.can_return());
  }

  #[test]
  fn test_caret_motion() {
    let mut doc = Document::from_text("abcd\nx\nefgh");
    doc.set_caret(3);
    doc.caret_right(true);
    assert_eq!(doc.caret_x(), 4);
    doc.caret_down(true);
    assert_eq!(doc.selection_end(), 6);
    doc.caret_down(true);
    // remembered column survives the short line
    assert_eq!(doc.selection_end(), 11);
    doc.caret_down(true);
    assert_eq!(doc.selection_end(), doc.model().max_offset());
    doc.caret_home(true);
    assert_eq!(doc.selection_end(), 7);
    doc.caret_end(false);
    assert_eq!(doc.selection(), Selection::new(7, 11));
    doc.caret_left(true);
    assert_eq!(doc.selection(), Selection::point(7));
    doc.caret_up(true);
    assert_eq!(doc.selection_end(), 5);
    doc.caret_up(true);
    doc.caret_up(true);
    assert_eq!(doc.selection_end(), 0);
    doc.caret_left(true);
    assert_eq!(doc.selection_end(), 0);
    doc.caret_end_all(false);
    assert_eq!(doc.selection(), Selection::new(0, 11));
    doc.caret_home_all(true);
    assert_eq!(doc.selection(), Selection::point(0));
  }

  #[test]
  fn test_replace_all() {
    let mut doc = Document::from_text("(old\n form)");
    doc.replace_all("(new)");
    assert_eq!(doc.text(), "(new)");
    assert_eq!(doc.selection(), Selection::point(5));
    assert_eq!(doc.model().line_count(), 1);
    doc.undo();
    assert_eq!(doc.text(), "(old\n form)");
  }

  #[test]
  fn test_newline_and_indent() {
    let mut doc = Document::from_text("(let [a 1]");
    doc.caret_end_all(true);
    doc.insert_string(" ");
    doc.newline_and_indent();
    assert_eq!(doc.text(), "(let [a 1] \n  ");
    assert_eq!(doc.selection_end(), 14);
    assert_eq!(doc.caret_x(), 2);

    // the typing before the break is undone separately
    doc.undo();
    assert_eq!(doc.text(), "(let [a 1] ");
    doc.undo();
    assert_eq!(doc.text(), "(let [a 1]");
  }

  #[test]
  fn test_with_undo_groups_edits() {
    let mut doc = Document::from_text("ab");
    doc.with_undo(|doc| {
      doc.model_mut().insert_string(0, "(", None, None);
      doc.model_mut().insert_string(3, ")", None, None);
      doc.set_caret(1);
    });
    assert_eq!(doc.text(), "(ab)");
    assert!(doc.model().dirty_lines().is_empty());
    doc.undo();
    assert_eq!(doc.text(), "ab");
    assert_eq!(doc.selection(), Selection::point(0));
    assert!(!doc.model().recording_undo);
  }
}
