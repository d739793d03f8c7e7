//! Structural navigation over the token stream.
//!
//! A [`TokenCursor`] is a `(line, token)` position inside a
//! [`LineInputModel`]. Besides stepping token by token it knows how to move
//! over whole s-expressions, which is all the paredit commands and the indent
//! engine need to understand the shape of the code.
//!
//! Cursors borrow the model, so they cannot outlive an edit. Take a new one
//! from [`LineInputModel::get_token_cursor`] after changing the text.

use std::{
  fmt,
  ptr,
};

use once_cell::sync::Lazy;
use paredit_core::{
  scanner::valid_pair,
  token::{
    ScannerState,
    Token,
    TokenKind,
  },
};

use crate::model::LineInputModel;

/// What [`TokenCursor::get_prev_token`] reports at the start of the document.
static DOCUMENT_START: Lazy<Token> = Lazy::new(|| Token::eol(0, ScannerState::INITIAL));

#[derive(Clone, Copy)]
pub struct TokenCursor<'a> {
  doc:       &'a LineInputModel,
  pub line:  usize,
  pub token: usize,
}

impl fmt::Debug for TokenCursor<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TokenCursor")
      .field("line", &self.line)
      .field("token", &self.token)
      .finish()
  }
}

impl PartialEq for TokenCursor<'_> {
  fn eq(&self, other: &Self) -> bool {
    self.line == other.line && self.token == other.token && ptr::eq(self.doc, other.doc)
  }
}

impl Eq for TokenCursor<'_> {}

impl<'a> TokenCursor<'a> {
  pub fn new(doc: &'a LineInputModel, line: usize, token: usize) -> Self {
    Self { doc, line, token }
  }

  pub fn doc(&self) -> &'a LineInputModel {
    self.doc
  }

  fn tokens(&self) -> &'a [Token] {
    self.doc.lines()[self.line].tokens()
  }

  /// The token under the cursor.
  pub fn get_token(&self) -> &'a Token {
    &self.tokens()[self.token]
  }

  /// The token right before the cursor. At the very start of the document
  /// this is a synthetic end-of-line token.
  pub fn get_prev_token(&self) -> &'a Token {
    if self.at_start() {
      return &DOCUMENT_START;
    }
    let mut cursor = *self;
    cursor.previous();
    cursor.get_token()
  }

  /// Line and column of the start of the current token.
  pub fn row_col(&self) -> (usize, usize) {
    (self.line, self.get_token().offset)
  }

  /// Offset of the first char of the current token.
  pub fn offset_start(&self) -> usize {
    self.doc.get_offset_for_line(self.line) + self.get_token().offset
  }

  /// Offset just past the current token, never beyond the document.
  pub fn offset_end(&self) -> usize {
    let end = self.offset_start() + self.get_token().len();
    end.min(self.doc.max_offset())
  }

  pub fn at_start(&self) -> bool {
    self.line == 0 && self.token == 0
  }

  pub fn at_end(&self) -> bool {
    self.line == self.doc.line_count() - 1 && self.token == self.tokens().len() - 1
  }

  /// Step to the next token, crossing lines. Returns false at the end of the
  /// document.
  pub fn next(&mut self) -> bool {
    if self.token + 1 < self.tokens().len() {
      self.token += 1;
    } else if self.line + 1 < self.doc.line_count() {
      self.line += 1;
      self.token = 0;
    } else {
      return false;
    }
    true
  }

  /// Step to the previous token, crossing lines. Returns false at the start
  /// of the document.
  pub fn previous(&mut self) -> bool {
    if self.token > 0 {
      self.token -= 1;
    } else if self.line > 0 {
      self.line -= 1;
      self.token = self.tokens().len() - 1;
    } else {
      return false;
    }
    true
  }

  /// Skip whitespace and line ends, and comments too when `include_comments`
  /// is set.
  pub fn forward_whitespace(&mut self, include_comments: bool) {
    while !self.at_end() {
      match self.get_token().kind {
        TokenKind::Comment if !include_comments => return,
        TokenKind::Comment | TokenKind::Eol | TokenKind::Whitespace => {
          self.next();
        },
        _ => return,
      }
    }
  }

  /// Skip whitespace backwards. Never stops between a comment and the end
  /// of its line.
  pub fn backward_whitespace(&mut self, include_comments: bool) {
    while !self.at_start() {
      match self.get_prev_token().kind {
        TokenKind::Comment if !include_comments => return,
        TokenKind::Comment | TokenKind::Eol => {
          self.previous();
          if self.get_prev_token().kind == TokenKind::Comment {
            self.next();
            return;
          }
        },
        TokenKind::Whitespace => {
          self.previous();
        },
        _ => return,
      }
    }
  }

  /// Move forward over one s-expression. With `skip_comments` comments are
  /// treated as whitespace, otherwise a comment counts as an expression.
  ///
  /// Returns false, having only skipped whitespace, when the next token is a
  /// close delimiter. Also returns false when the document ends inside an
  /// unbalanced list.
  pub fn forward_sexp(&mut self, skip_comments: bool) -> bool {
    let mut depth = 0isize;
    self.forward_whitespace(skip_comments);
    if self.get_token().kind == TokenKind::Close {
      return false;
    }
    while !self.at_end() {
      self.forward_whitespace(skip_comments);
      match self.get_token().kind {
        TokenKind::Comment => {
          // the comment and its line end
          self.next();
          self.next();
          if depth <= 0 {
            return true;
          }
        },
        TokenKind::Identifier
        | TokenKind::Literal
        | TokenKind::Keyword
        | TokenKind::String
        | TokenKind::StringEnd => {
          self.next();
          if depth <= 0 {
            return true;
          }
        },
        TokenKind::StringStart | TokenKind::StringMiddle => {
          // run to the closing fragment
          while self.next() && !self.at_end() {
            if !matches!(
              self.get_token().kind,
              TokenKind::StringMiddle | TokenKind::Eol
            ) {
              break;
            }
          }
        },
        TokenKind::Close => {
          depth -= 1;
          self.next();
          if depth <= 0 {
            return true;
          }
        },
        TokenKind::Open => {
          depth += 1;
          self.next();
        },
        _ => {
          self.next();
        },
      }
    }
    false
  }

  /// Move backward over one s-expression. With `skip_comments` comments are
  /// treated as whitespace, otherwise a comment counts as an expression.
  ///
  /// Returns false, having only skipped whitespace, when the previous token
  /// is an open delimiter.
  pub fn backward_sexp(&mut self, skip_comments: bool) -> bool {
    let mut depth = 0isize;
    self.backward_whitespace(skip_comments);
    if self.get_prev_token().kind == TokenKind::Open {
      return false;
    }
    while !self.at_start() {
      self.backward_whitespace(skip_comments);
      match self.get_prev_token().kind {
        TokenKind::Identifier
        | TokenKind::Literal
        | TokenKind::Keyword
        | TokenKind::Comment
        | TokenKind::String
        | TokenKind::StringStart => {
          self.previous();
          if depth <= 0 {
            return true;
          }
        },
        TokenKind::StringMiddle | TokenKind::StringEnd => {
          while self.previous() && !self.at_start() {
            if self.get_prev_token().kind != TokenKind::StringMiddle {
              break;
            }
          }
        },
        TokenKind::Close => {
          depth += 1;
          self.previous();
        },
        TokenKind::Open => {
          depth -= 1;
          self.previous();
          if depth <= 0 {
            return true;
          }
        },
        _ => {
          self.previous();
        },
      }
    }
    false
  }

  /// Move to the close delimiter of the enclosing list.
  pub fn forward_list(&mut self) -> bool {
    let mut cursor = *self;
    while cursor.forward_sexp(true) {}
    if cursor.get_token().kind == TokenKind::Close {
      *self = cursor;
      return true;
    }
    false
  }

  /// Move to just after the open delimiter of the enclosing list.
  pub fn backward_list(&mut self) -> bool {
    let mut cursor = *self;
    while cursor.backward_sexp(false) {}
    if cursor.get_prev_token().kind == TokenKind::Open {
      *self = cursor;
      return true;
    }
    false
  }

  /// Skip whitespace and step into the list that follows.
  pub fn down_list(&mut self) -> bool {
    let mut cursor = *self;
    cursor.forward_whitespace(true);
    if cursor.get_token().kind == TokenKind::Open {
      cursor.next();
      *self = cursor;
      return true;
    }
    false
  }

  /// Skip whitespace and step out past the close delimiter that follows.
  pub fn up_list(&mut self) -> bool {
    let mut cursor = *self;
    cursor.forward_whitespace(true);
    if cursor.get_token().kind == TokenKind::Close {
      cursor.next();
      *self = cursor;
      return true;
    }
    false
  }

  /// Skip whitespace backwards and step out before the open delimiter that
  /// precedes.
  pub fn backward_up_list(&mut self) -> bool {
    let mut cursor = *self;
    cursor.backward_whitespace(true);
    if cursor.get_prev_token().kind == TokenKind::Open {
      cursor.previous();
      *self = cursor;
      return true;
    }
    false
  }

  pub fn within_whitespace(&self) -> bool {
    matches!(self.get_token().kind, TokenKind::Whitespace | TokenKind::Eol)
  }

  /// True inside a string literal, including the line ends of a multi-line
  /// string.
  pub fn within_string(&self) -> bool {
    let kind = self.get_token().kind;
    if kind.is_string() {
      return true;
    }
    kind == TokenKind::Eol
      && matches!(
        self.get_prev_token().kind,
        TokenKind::StringMiddle | TokenKind::StringStart
      )
  }
}

/// A delimiter under the caret and its partner, for highlighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParenMatch {
  /// Offset of the open delimiter, if found.
  pub open:  Option<usize>,
  /// Offset of the close delimiter, if found.
  pub close: Option<usize>,
  /// Both delimiters were found and are of the same class.
  pub valid: bool,
}

/// Find the partner of the delimiter at `offset`. Returns `None` when the
/// token there is not a delimiter.
pub fn paren_match(model: &LineInputModel, offset: usize) -> Option<ParenMatch> {
  let cursor = model.get_token_cursor(offset, false);
  let (open, close) = match cursor.get_token().kind {
    TokenKind::Close => {
      let mut open = cursor;
      while open.backward_sexp(false) {}
      let open = (open.get_prev_token().kind == TokenKind::Open && open.previous()).then_some(open);
      (open, Some(cursor))
    },
    TokenKind::Open => {
      let mut close = cursor;
      close.next();
      while close.forward_sexp(true) {}
      let close = (close.get_token().kind == TokenKind::Close).then_some(close);
      (Some(cursor), close)
    },
    _ => return None,
  };
  let valid = match (open, close) {
    (Some(open), Some(close)) => valid_pair(&open.get_token().raw, &close.get_token().raw),
    _ => false,
  };
  Some(ParenMatch {
    open: open.map(|cursor| cursor.offset_start()),
    close: close.map(|cursor| cursor.offset_start()),
    valid,
  })
}

#[cfg(test)]
mod test {
  use super::*;

  fn model(text: &str) -> LineInputModel {
    LineInputModel::from_text(text)
  }

  #[test]
  fn test_next_and_previous_cross_lines() {
    let model = model("(a\nb)");
    let mut cursor = model.get_token_cursor(0, false);
    assert!(cursor.at_start());
    assert!(!cursor.previous());
    let mut raws = vec![cursor.get_token().raw.to_string()];
    while cursor.next() {
      raws.push(cursor.get_token().raw.to_string());
    }
    assert_eq!(raws, vec!["(", "a", "\n", "b", ")", "\n"]);
    assert!(cursor.at_end());
    assert_eq!(cursor.get_prev_token().raw, ")");
    assert_eq!(model.get_token_cursor(0, false).get_prev_token().kind, TokenKind::Eol);
  }

  #[test]
  fn test_offsets() {
    let model = model("(ab\n cd)");
    let cursor = model.get_token_cursor(6, false);
    assert_eq!(cursor.get_token().raw, "cd");
    assert_eq!(cursor.offset_start(), 5);
    assert_eq!(cursor.offset_end(), 7);
    assert_eq!(cursor.row_col(), (1, 1));
    let end = model.get_token_cursor(8, false);
    assert_eq!(end.get_token().kind, TokenKind::Eol);
    assert_eq!(end.offset_end(), 8);
  }

  #[test]
  fn test_forward_sexp() {
    let model = model("(a (b c) \"s\") d");
    let mut cursor = model.get_token_cursor(0, false);
    assert!(cursor.forward_sexp(true));
    assert_eq!(cursor.offset_start(), 13);

    let mut cursor = model.get_token_cursor(3, false);
    assert!(cursor.forward_sexp(true));
    assert_eq!(cursor.offset_start(), 8);
    assert!(cursor.forward_sexp(true));
    assert_eq!(cursor.offset_start(), 12);
    assert!(!cursor.forward_sexp(true));
    assert_eq!(cursor.offset_start(), 12);
  }

  #[test]
  fn test_forward_sexp_over_multiline_string() {
    let model = model("(\"a\nb\nc\" d)");
    let mut cursor = model.get_token_cursor(1, false);
    assert!(cursor.forward_sexp(true));
    assert_eq!(cursor.row_col(), (2, 2));
    assert!(cursor.backward_sexp(false));
    assert_eq!(cursor.offset_start(), 1);
  }

  #[test]
  fn test_forward_sexp_comments() {
    let model = model("(a ; note\n b)");
    let mut cursor = model.get_token_cursor(2, false);
    assert!(cursor.forward_sexp(true));
    assert_eq!(cursor.get_token().raw, ")");

    let mut cursor = model.get_token_cursor(2, false);
    assert!(cursor.forward_sexp(false));
    assert_eq!(cursor.row_col(), (1, 0));
  }

  #[test]
  fn test_backward_sexp() {
    let model = model("(a (b c) d)");
    let mut cursor = model.get_token_cursor(9, false);
    assert!(cursor.backward_sexp(false));
    assert_eq!(cursor.offset_start(), 3);
    assert!(cursor.backward_sexp(false));
    assert_eq!(cursor.offset_start(), 1);
    assert!(!cursor.backward_sexp(false));
    assert_eq!(cursor.offset_start(), 1);
  }

  #[test]
  fn test_list_motions() {
    let model = model("(a (b c) d)");
    let mut cursor = model.get_token_cursor(6, false);
    assert!(cursor.forward_list());
    assert_eq!(cursor.offset_start(), 7);
    assert!(cursor.up_list());
    assert_eq!(cursor.offset_start(), 8);
    assert!(cursor.backward_list());
    assert_eq!(cursor.offset_start(), 1);
    assert!(cursor.backward_up_list());
    assert_eq!(cursor.offset_start(), 0);
    assert!(!cursor.backward_up_list());
    assert!(cursor.down_list());
    assert_eq!(cursor.offset_start(), 1);

    let mut cursor = model.get_token_cursor(1, false);
    assert!(!cursor.down_list());
    assert!(!cursor.up_list());
    assert_eq!(cursor.offset_start(), 1);
  }

  #[test]
  fn test_unbalanced_forward_list_does_not_move() {
    let model = model("(a b");
    let mut cursor = model.get_token_cursor(2, false);
    assert!(!cursor.forward_list());
    assert_eq!(cursor.offset_start(), 2);
  }

  #[test]
  fn test_backward_whitespace_stops_after_comment_line() {
    let model = model("a ; c\n  b");
    let mut cursor = model.get_token_cursor(8, false);
    cursor.backward_whitespace(true);
    assert_eq!(cursor.row_col(), (1, 0));
  }

  #[test]
  fn test_within_string() {
    let model = model("(\"ab\ncd\" x)");
    assert!(model.get_token_cursor(2, false).within_string());
    assert!(model.get_token_cursor(4, false).within_string());
    assert!(model.get_token_cursor(6, false).within_string());
    assert!(!model.get_token_cursor(9, false).within_string());
    assert!(model.get_token_cursor(8, false).within_whitespace());
  }

  #[test]
  fn test_paren_match() {
    let model = model("(a [b] c]");
    assert_eq!(
      paren_match(&model, 3),
      Some(ParenMatch {
        open:  Some(3),
        close: Some(5),
        valid: true,
      })
    );
    assert_eq!(
      paren_match(&model, 8),
      Some(ParenMatch {
        open:  Some(0),
        close: Some(8),
        valid: false,
      })
    );
    assert_eq!(paren_match(&model, 1), None);

    let model = self::model("(a");
    assert_eq!(
      paren_match(&model, 0),
      Some(ParenMatch {
        open:  Some(0),
        close: None,
        valid: false,
      })
    );
  }

  /// Positions in `text` that start an expression after whitespace.
  fn sexp_starts(model: &LineInputModel) -> Vec<usize> {
    (0..=model.max_offset())
      .filter(|&offset| {
        let cursor = model.get_token_cursor(offset, false);
        cursor.offset_start() == offset
          && !cursor.within_whitespace()
          && cursor.get_token().kind != TokenKind::Close
      })
      .collect()
  }

  quickcheck::quickcheck! {
    fn test_sexp_motion_duality(atoms: Vec<(u8, bool)>) -> bool {
      // build a balanced form out of the random input
      let mut text = String::from("(");
      let mut depth = 0;
      for (atom, nested) in atoms.iter().take(24) {
        if *nested && depth < 3 {
          text.push('(');
          depth += 1;
        } else if *atom % 5 == 0 && depth > 0 {
          text.push(')');
          depth -= 1;
        }
        text.push_str(&format!("a{} ", atom % 7));
      }
      text.push_str(&")".repeat(depth + 1));

      let model = LineInputModel::from_text(&text);
      sexp_starts(&model).into_iter().all(|offset| {
        let start = model.get_token_cursor(offset, false);
        let mut cursor = start;
        if !cursor.forward_sexp(true) {
          return true;
        }
        let end = cursor;
        cursor.backward_sexp(false) && cursor == start && {
          let mut forward = cursor;
          forward.forward_sexp(true) && forward == end
        }
      })
    }
  }
}
