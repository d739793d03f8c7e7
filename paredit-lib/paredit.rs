//! Structural editing commands.
//!
//! Every command works at the [`Document`]'s selection, reads the buffer
//! through a [`TokenCursor`](crate::cursor::TokenCursor) and applies its
//! edits inside [`Document::with_undo`], so a command is always undone as a
//! single step. Offsets are worked out before the first edit is made; edits
//! touching several places are applied back to front so the earlier offsets
//! stay valid.
//!
//! Commands that make no sense inside a string literal refuse to run there
//! and return [`ParEditError::InvalidContext`] without touching the buffer.

use paredit_core::{
  chars::char_len,
  scanner::valid_pair,
  token::TokenKind,
};
use thiserror::Error;

use crate::{
  cursor::TokenCursor,
  document::Document,
  history::Selection,
  model::LineInputModel,
};

pub type Result<T> = std::result::Result<T, ParEditError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParEditError {
  #[error("invalid context for {operation}")]
  InvalidContext { operation: &'static str },
}

fn ensure_outside_string(cursor: &TokenCursor<'_>, operation: &'static str) -> Result<()> {
  if cursor.within_string() {
    tracing::warn!(operation, offset = cursor.offset_start(), "refused inside string");
    return Err(ParEditError::InvalidContext { operation });
  }
  Ok(())
}

fn edit(doc: &mut Document, start: usize, end: usize, text: &str) {
  doc.model_mut().change_range(start, end, text, None, None);
}

/// Text of the `back` chars before `offset` and the `ahead` chars after it,
/// or nothing when that range leaves the document.
fn text_around(model: &LineInputModel, offset: usize, back: usize, ahead: usize) -> String {
  match offset.checked_sub(back) {
    Some(start) => model.get_text(start, offset + ahead, true),
    None => String::new(),
  }
}

/// Wrap the selection in `open` and `close`. With nothing selected, the
/// expression after the caret is wrapped and the caret lands inside the new
/// list.
pub fn wrap_sexpr(doc: &mut Document, open: &str, close: &str) -> Result<()> {
  let selection = doc.selection();
  let (start, mut end) = (selection.min(), selection.max());
  let mut cursor = doc.model().get_token_cursor(end, false);
  ensure_outside_string(&cursor, "wrap_sexpr")?;
  if selection.is_empty() {
    cursor.forward_sexp(true);
    end = cursor.offset_start();
  }
  tracing::debug!(start, end, open, "wrap sexp");

  let shift = char_len(open);
  doc.with_undo(|doc| {
    edit(doc, end, end, close);
    edit(doc, start, start, open);
    if selection.is_empty() {
      doc.set_caret(start + shift);
    } else {
      doc.set_selection(Selection::new(selection.start + shift, selection.end + shift));
    }
  });
  Ok(())
}

/// Split the list, or the string, around the caret in two.
pub fn split_sexp(doc: &mut Document) {
  let start = doc.selection_end();
  let mut cursor = doc.model().get_token_cursor(start, false);

  if cursor.within_string() {
    // never split between a backslash and the quote it escapes
    let at = if text_around(doc.model(), start, 1, 1) == "\\\"" {
      start + 1
    } else {
      start
    };
    doc.with_undo(|doc| {
      edit(doc, at, at, "\" \"");
      doc.set_caret(at + 1);
    });
    return;
  }

  cursor.backward_whitespace(true);
  let start = cursor.offset_start();
  let mut whitespace = cursor;
  whitespace.forward_whitespace(true);
  let whitespace_end = whitespace.offset_start();

  if !cursor.backward_list() {
    return;
  }
  let open = cursor.get_prev_token().raw.clone();
  if !cursor.forward_list() {
    return;
  }
  let text = format!("{} {}", cursor.get_token().raw, open);
  tracing::debug!(start, "split sexp");

  doc.with_undo(|doc| {
    edit(doc, start, whitespace_end, &text);
    doc.set_caret(start + 1);
  });
}

/// Join the expressions on either side of the caret: two lists of the same
/// class or two strings.
pub fn join_sexp(doc: &mut Document) -> Result<()> {
  let mut cursor = doc.model().get_token_cursor(doc.selection_end(), false);
  cursor.backward_whitespace(true);
  let left = cursor.get_prev_token();
  let beginning = cursor.offset_start();
  ensure_outside_string(&cursor, "join_sexp")?;

  cursor.forward_whitespace(true);
  let right = cursor.get_token();
  let end = cursor.offset_start();

  let (from, to, text, caret) = match (left.kind, right.kind) {
    (TokenKind::String | TokenKind::StringEnd, TokenKind::String | TokenKind::StringStart) => {
      (beginning - 1, end + 1, "", beginning - 1)
    },
    (TokenKind::Close, TokenKind::Open) if valid_pair(&left.raw, &right.raw) => {
      let from = beginning - left.len();
      (from, end + right.len(), " ", from + 1)
    },
    _ => return Ok(()),
  };
  tracing::debug!(from, to, "join sexp");

  doc.with_undo(|doc| {
    edit(doc, from, to, text);
    doc.set_caret(caret);
  });
  Ok(())
}

/// Remove the delimiters of the list around the caret.
pub fn splice_sexp(doc: &mut Document) -> Result<()> {
  splice_sexp_at(doc, doc.selection_end())
}

/// Remove the delimiters of the list around `start`.
pub fn splice_sexp_at(doc: &mut Document, start: usize) -> Result<()> {
  let mut cursor = doc.model().get_token_cursor(start, false);
  ensure_outside_string(&cursor, "splice_sexp")?;
  if !cursor.backward_list() {
    return Ok(());
  }
  let open = cursor.get_prev_token();
  let beginning = cursor.offset_start();
  if !cursor.forward_list() || !valid_pair(&open.raw, &cursor.get_token().raw) {
    return Ok(());
  }
  let end = cursor.offset_start();
  let (open_len, close_len) = (open.len(), cursor.get_token().len());
  tracing::debug!(beginning, end, "splice sexp");

  doc.with_undo(|doc| {
    edit(doc, end, end + close_len, "");
    edit(doc, beginning - open_len, beginning, "");
    doc.set_caret(start - open_len);
  });
  Ok(())
}

/// Delete from the start of the enclosing list up to `start`. Returns the
/// new caret offset.
pub fn kill_backward_list(doc: &mut Document, start: usize) -> Result<usize> {
  let mut cursor = doc.model().get_token_cursor(start, false);
  ensure_outside_string(&cursor, "kill_backward_list")?;
  if !cursor.backward_list() {
    return Ok(start);
  }
  let from = cursor.offset_start();
  tracing::debug!(from, to = start, "kill backward list");

  doc.with_undo(|doc| {
    edit(doc, from, start, "");
    doc.set_caret(from);
  });
  Ok(from)
}

/// Delete from `start` to the end of the enclosing list. Inside a line
/// comment the line break is kept. Returns the new caret offset.
pub fn kill_forward_list(doc: &mut Document, start: usize) -> Result<usize> {
  let mut cursor = doc.model().get_token_cursor(start, false);
  let in_comment = (cursor.get_token().kind == TokenKind::Comment && start > cursor.offset_start())
    || cursor.get_prev_token().kind == TokenKind::Comment;
  ensure_outside_string(&cursor, "kill_forward_list")?;
  if !cursor.forward_list() {
    return Ok(start);
  }
  let to = cursor.offset_start();
  tracing::debug!(from = start, to, in_comment, "kill forward list");

  doc.with_undo(|doc| {
    edit(doc, start, to, if in_comment { "\n" } else { "" });
    doc.set_caret(start);
  });
  Ok(start)
}

/// Kill everything before the caret in its list, then splice the list.
pub fn splice_sexp_killing_backward(doc: &mut Document) -> Result<()> {
  let start = doc.selection_end();
  doc.with_undo(|doc| {
    let at = kill_backward_list(doc, start)?;
    splice_sexp_at(doc, at)
  })
}

/// Kill everything after the caret in its list, then splice the list.
pub fn splice_sexp_killing_forward(doc: &mut Document) -> Result<()> {
  let start = doc.selection_end();
  doc.with_undo(|doc| {
    let at = kill_forward_list(doc, start)?;
    splice_sexp_at(doc, at)
  })
}

/// Pull the expression after the enclosing list into it.
pub fn forward_slurp_sexp(doc: &mut Document) {
  let mut cursor = doc.get_token_cursor();
  if !cursor.forward_list() {
    return;
  }
  let offset = cursor.offset_start();
  let close = cursor.get_token().raw.clone();
  cursor.next();
  if !cursor.forward_sexp(false) {
    return;
  }
  cursor.backward_whitespace(false);
  let at = cursor.offset_start();
  tracing::debug!(offset, at, "forward slurp");

  doc.with_undo(|doc| {
    edit(doc, at, at, &close);
    edit(doc, offset, offset + char_len(&close), "");
  });
}

/// Pull the expression before the enclosing list into it.
pub fn backward_slurp_sexp(doc: &mut Document) {
  let mut cursor = doc.get_token_cursor();
  if !cursor.backward_list() {
    return;
  }
  cursor.previous();
  let offset = cursor.offset_start();
  let open = cursor.get_token().raw.clone();
  if !cursor.backward_sexp(false) {
    return;
  }
  cursor.forward_whitespace(false);
  let at = cursor.offset_start();
  tracing::debug!(offset, at, "backward slurp");

  doc.with_undo(|doc| {
    edit(doc, offset, offset + char_len(&open), "");
    edit(doc, at, at, &open);
  });
}

/// Push the last expression of the enclosing list out of it.
pub fn forward_barf_sexp(doc: &mut Document) {
  let mut cursor = doc.get_token_cursor();
  if !cursor.forward_list() {
    return;
  }
  let offset = cursor.offset_start();
  let close = cursor.get_token().raw.clone();
  if !cursor.backward_sexp(false) {
    return;
  }
  cursor.backward_whitespace(true);
  let at = cursor.offset_start();
  tracing::debug!(offset, at, "forward barf");

  doc.with_undo(|doc| {
    edit(doc, offset, offset + char_len(&close), "");
    edit(doc, at, at, &close);
  });
}

/// Push the first expression of the enclosing list out of it.
pub fn backward_barf_sexp(doc: &mut Document) {
  let mut cursor = doc.get_token_cursor();
  if !cursor.backward_list() {
    return;
  }
  cursor.previous();
  let offset = cursor.offset_start();
  let open = cursor.get_token().raw.clone();
  cursor.next();
  if !cursor.forward_sexp(false) {
    return;
  }
  cursor.forward_whitespace(false);
  let at = cursor.offset_start();
  tracing::debug!(offset, at, "backward barf");

  doc.with_undo(|doc| {
    edit(doc, at, at, &open);
    edit(doc, offset, offset + char_len(&open), "");
  });
}

/// Insert an empty pair such as `()` and put the caret between the two
/// delimiters.
pub fn open(doc: &mut Document, pair: &str) {
  let start = doc.selection().min();
  let inside = char_len(pair).saturating_sub(1);
  doc.with_undo(|doc| {
    doc.insert_string(pair);
    doc.set_caret(start + inside);
  });
}

/// Type a close delimiter.
///
/// When `close` is already the next thing after the caret the caret just
/// moves over it. Inside a complete list the caret jumps to the end of the
/// list. Otherwise the missing delimiter is appended after the last
/// expression that follows the caret.
pub fn close(doc: &mut Document, close: &str) {
  let start = doc.selection_end();
  let mut cursor = doc.get_token_cursor();
  cursor.forward_whitespace(false);

  if cursor.get_token().raw == close {
    let to = cursor.offset_start();
    doc.with_undo(|doc| {
      edit(doc, start, to, "");
      doc.set_caret(start + 1);
    });
  } else if cursor.forward_list() {
    doc.set_caret(cursor.offset_end());
  } else {
    while cursor.forward_sexp(true) {}
    let at = cursor.offset_end();
    tracing::debug!(at, close, "inserted missing close");
    doc.with_undo(|doc| {
      edit(doc, at, at, close);
      doc.set_caret(at + 1);
    });
  }
}

const PAREN_PAIRS: &[&str] = &["()", "[]", "{}", "\"\"", "\\\""];
const OPEN_PARENS: &[&str] = &["(", "[", "{", "\""];
const CLOSE_PARENS: &[&str] = &[")", "]", "}", "\""];

fn is_pair(text: &str) -> bool {
  PAREN_PAIRS.contains(&text)
}

fn is_delimiter(text: &str) -> bool {
  OPEN_PARENS.contains(&text) || CLOSE_PARENS.contains(&text)
}

/// Backspace that keeps delimiters balanced.
///
/// An empty pair or an escape sequence before the caret is deleted whole.
/// A lone delimiter is stepped over instead of deleted.
pub fn backspace(doc: &mut Document) {
  let selection = doc.selection();
  if !selection.is_empty() {
    doc.backspace();
    return;
  }
  let start = selection.end;
  let model = doc.model();

  if text_around(model, start, 3, 0) == "\\\"\"" {
    doc.set_caret(start - 1);
  } else if start >= 2 && model.get_text(start - 2, start - 1, true) == "\\" {
    doc.with_undo(|doc| {
      doc.model_mut().delete_range(
        start - 2,
        2,
        Some(Selection::point(start)),
        Some(Selection::point(start - 2)),
      );
      doc.set_caret(start - 2);
    });
  } else if is_pair(&text_around(model, start, 1, 1)) {
    doc.with_undo(|doc| {
      doc.model_mut().delete_range(
        start - 1,
        2,
        Some(Selection::point(start)),
        Some(Selection::point(start - 1)),
      );
      doc.set_caret(start - 1);
    });
  } else if is_delimiter(&text_around(model, start, 1, 0)) {
    doc.set_caret(start - 1);
  } else {
    doc.backspace();
  }
}

/// Forward delete that keeps delimiters balanced.
///
/// An empty pair at or around the caret is deleted whole. A lone delimiter
/// is stepped over instead of deleted.
pub fn delete_forward(doc: &mut Document) {
  let selection = doc.selection();
  if !selection.is_empty() {
    doc.delete();
    return;
  }
  let start = selection.end;
  let model = doc.model();

  if is_pair(&model.get_text(start, start + 2, true)) {
    doc.with_undo(|doc| {
      let caret = Selection::point(start);
      doc.model_mut().delete_range(start, 2, Some(caret), Some(caret));
    });
  } else if is_pair(&text_around(model, start, 1, 1)) {
    doc.with_undo(|doc| {
      doc.model_mut().delete_range(
        start - 1,
        2,
        Some(Selection::point(start)),
        Some(Selection::point(start - 1)),
      );
      doc.set_caret(start - 1);
    });
  } else if is_delimiter(&model.get_text(start, start + 1, true)) {
    doc.set_caret(start + 1);
  } else {
    doc.delete();
  }
}

/// Type a double quote.
///
/// Outside a string this inserts an empty string. Inside one, the caret
/// steps over the closing quote when it is right before it, and an escaped
/// quote is inserted anywhere else.
pub fn string_quote(doc: &mut Document) {
  let selection = doc.selection();
  if !selection.is_empty() {
    doc.insert_string("\"");
    return;
  }
  let start = selection.end;
  let cursor = doc.model().get_token_cursor(start, false);
  let token = cursor.get_token();
  let before_string = cursor.offset_start() == start
    && matches!(token.kind, TokenKind::String | TokenKind::StringStart);

  if !cursor.within_string() || before_string {
    doc.with_undo(|doc| {
      edit(doc, start, start, "\"\"");
      doc.set_caret(start + 1);
    });
  } else if matches!(token.kind, TokenKind::String | TokenKind::StringEnd)
    && cursor.offset_end() == start + 1
  {
    doc.set_caret(start + 1);
  } else {
    doc.with_undo(|doc| {
      edit(doc, start, start, "\\\"");
      doc.set_caret(start + 2);
    });
  }
}

/// Contents of the list enclosing `start..end`, delimiters excluded.
fn list_contents(model: &LineInputModel, start: usize, end: usize) -> Option<Selection> {
  let mut from = model.get_token_cursor(start, false);
  let mut to = model.get_token_cursor(end, false);
  (from.backward_list() && to.forward_list()).then(|| Selection::new(from.offset_start(), to.offset_start()))
}

/// The whole list whose contents are `contents`, delimiters included.
fn whole_list(model: &LineInputModel, contents: Selection) -> Option<Selection> {
  let mut from = model.get_token_cursor(contents.start, false);
  let to = model.get_token_cursor(contents.end, false);
  (from.backward_up_list() && to.get_token().kind == TokenKind::Close)
    .then(|| Selection::new(from.offset_start(), to.offset_end()))
}

/// Select the next larger syntactic unit: the token at the caret, then the
/// contents of the enclosing list, then the whole list, and so on outwards.
///
/// Each selection is pushed onto the document's grow stack. A stack whose
/// top no longer matches the selection is discarded first.
pub fn grow_selection(doc: &mut Document) {
  let current = doc.selection();
  if doc.grow_selection_stack.last() != Some(&current) {
    doc.grow_selection_stack.clear();
    doc.grow_selection_stack.push(current);
  }

  let model = doc.model();
  let cursor = model.get_token_cursor(current.min(), false);
  let grown = if current.is_empty() && !cursor.within_whitespace() {
    let token = cursor.get_token();
    match token.kind {
      TokenKind::Open => {
        let mut close = cursor;
        close.next();
        close
          .forward_list()
          .then(|| Selection::new(cursor.offset_start(), close.offset_end()))
      },
      TokenKind::Close => {
        let mut previous = cursor;
        previous
          .backward_sexp(false)
          .then(|| Selection::new(previous.offset_start(), current.end))
      },
      _ => Some(Selection::new(cursor.offset_start(), cursor.offset_end())),
    }
  } else {
    list_contents(model, current.min(), current.max()).and_then(|contents| {
      if contents.min() == current.min() && contents.max() == current.max() {
        whole_list(model, contents)
      } else {
        Some(contents)
      }
    })
  };

  if let Some(grown) = grown {
    tracing::debug!(start = grown.start, end = grown.end, "grow selection");
    doc.set_selection(grown);
    doc.grow_selection_stack.push(doc.selection());
  }
}

/// Go back to the selection before the last [`grow_selection`]. Forgets the
/// stack when the selection was changed in between.
pub fn shrink_selection(doc: &mut Document) {
  let Some(top) = doc.grow_selection_stack.pop() else {
    return;
  };
  match doc.grow_selection_stack.last() {
    Some(&previous) if top == doc.selection() => doc.set_selection(previous),
    _ => doc.grow_selection_stack.clear(),
  }
}

/// Replace the enclosing list with the expression at the caret.
pub fn raise_sexp(doc: &mut Document) {
  let selection = doc.selection();
  if !selection.is_empty() {
    return;
  }
  let model = doc.model();
  let mut cursor = model.get_token_cursor(selection.end, false);
  cursor.forward_whitespace(true);
  let mut end = cursor;
  if !end.forward_sexp(true) {
    return;
  }
  let raised = model.get_text(cursor.offset_start(), end.offset_start(), false);
  cursor.backward_list();
  end.forward_list();
  if cursor.get_prev_token().kind != TokenKind::Open {
    return;
  }
  cursor.previous();
  if end.get_token().kind != TokenKind::Close {
    return;
  }
  let (from, to) = (cursor.offset_start(), end.offset_end());
  tracing::debug!(from, to, "raise sexp");

  doc.with_undo(|doc| {
    edit(doc, from, to, &raised);
    doc.set_caret(from);
  });
}

/// Swap the enclosing list with its parent. Whatever precedes the caret in
/// the inner list becomes the head of a new outer list.
///
/// `(let [x 1] (foo |bar))` becomes `(foo (let [x 1] |bar))`.
pub fn convolute(doc: &mut Document) {
  let selection = doc.selection();
  if !selection.is_empty() {
    return;
  }
  let caret = selection.end;
  let model = doc.model();
  let mut inner_open = model.get_token_cursor(caret, false);
  let mut inner_close = inner_open;
  if !inner_open.backward_list() || !inner_close.forward_list() {
    return;
  }
  let head = model.get_text(inner_open.offset_start(), caret, false);
  inner_open.previous();

  let mut outer_open = inner_open;
  if !outer_open.backward_list() || !outer_open.backward_up_list() {
    return;
  }
  let mut outer_close = inner_open;
  if !outer_close.forward_list() {
    return;
  }

  let head = format!("{}{}", inner_open.get_token().raw, head);
  let close = inner_close.get_token().raw.clone();
  let outer_end = outer_close.offset_end();
  let (close_start, close_end) = (inner_close.offset_start(), inner_close.offset_end());
  let head_start = inner_open.offset_start();
  let outer_start = outer_open.offset_start();
  tracing::debug!(outer_start, outer_end, "convolute");

  doc.with_undo(|doc| {
    edit(doc, outer_end, outer_end, &close);
    edit(doc, close_start, close_end, "");
    edit(doc, head_start, caret, "");
    edit(doc, outer_start, outer_start, &head);
    doc.set_caret(caret);
  });
}
