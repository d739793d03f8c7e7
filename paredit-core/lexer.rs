//! Table driven lexing.
//!
//! A [`LexicalGrammar`] is an ordered list of terminals, each a regular
//! expression paired with the [`TokenKind`] it produces. A [`Lexer`] walks one
//! line of source with a grammar: at every position all terminals are tried,
//! anchored at that position, and the longest non-empty match wins. When two
//! terminals match the same length the one registered first wins, which is how
//! `nil` becomes a literal instead of an identifier.
//!
//! ```ignore
//! use paredit_core::{lexer::LexicalGrammar, token::TokenKind};
//!
//! let grammar = LexicalGrammar::new(&[
//!   (r"\s+", TokenKind::Whitespace),
//!   (r"[a-z]+", TokenKind::Identifier),
//!   (r".", TokenKind::Junk),
//! ])?;
//! let mut lexer = grammar.lex("ab cd");
//! assert_eq!(lexer.scan()?.unwrap().raw, "ab");
//! ```

use regex::Regex;
use thiserror::Error;

use crate::token::{
  Token,
  TokenKind,
};

pub type Result<T> = std::result::Result<T, LexerError>;

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum LexerError {
  #[error("unexpected character at {position}: {line:?}")]
  UnexpectedCharacter { position: usize, line: String },
}

#[derive(Debug)]
struct Terminal {
  pattern: Regex,
  kind:    TokenKind,
}

#[derive(Debug, Default)]
pub struct LexicalGrammar {
  terminals: Vec<Terminal>,
}

impl LexicalGrammar {
  pub fn new(terminals: &[(&str, TokenKind)]) -> std::result::Result<Self, regex::Error> {
    let mut grammar = Self::default();
    for &(pattern, kind) in terminals {
      grammar.terminal(pattern, kind)?;
    }
    Ok(grammar)
  }

  /// Register a terminal. Terminals registered earlier win ties.
  pub fn terminal(&mut self, pattern: &str, kind: TokenKind) -> std::result::Result<(), regex::Error> {
    let pattern = Regex::new(&format!("^(?:{pattern})"))?;
    self.terminals.push(Terminal { pattern, kind });
    Ok(())
  }

  pub fn len(&self) -> usize {
    self.terminals.len()
  }

  pub fn is_empty(&self) -> bool {
    self.terminals.is_empty()
  }

  pub fn lex<'a>(&'a self, source: &'a str) -> Lexer<'a> {
    Lexer {
      source,
      grammar: self,
      position: 0,
      column: 0,
    }
  }

  /// Longest match at the start of `input`, as `(kind, byte length)`.
  fn longest_match(&self, input: &str) -> Option<(TokenKind, usize)> {
    let mut best: Option<(TokenKind, usize)> = None;
    for terminal in &self.terminals {
      let Some(m) = terminal.pattern.find(input) else {
        continue;
      };
      let len = m.end();
      if len > best.map_or(0, |(_, best_len)| best_len) {
        best = Some((terminal.kind, len));
      }
    }
    best
  }
}

/// Scans tokens out of one line of source.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
  source:   &'a str,
  grammar:  &'a LexicalGrammar,
  /// Byte position of the next token.
  position: usize,
  /// Char column of the next token.
  column:   usize,
}

impl<'a> Lexer<'a> {
  /// Continue lexing the same source from the current position with another
  /// grammar.
  pub fn switch_grammar(&mut self, grammar: &'a LexicalGrammar) {
    self.grammar = grammar;
  }

  /// Char column of the next token.
  pub fn column(&self) -> usize {
    self.column
  }

  /// Source text not yet consumed.
  pub fn remaining(&self) -> &'a str {
    &self.source[self.position..]
  }

  pub fn at_end(&self) -> bool {
    self.position >= self.source.len()
  }

  /// Returns the next token, `None` at the end of the line, or an error when
  /// no terminal matches the remaining input.
  pub fn scan(&mut self) -> Result<Option<Token>> {
    let rest = self.remaining();
    match self.grammar.longest_match(rest) {
      Some((kind, len)) => {
        let raw = &rest[..len];
        let token = Token::new(kind, raw, self.column);
        self.position += len;
        self.column += raw.chars().count();
        Ok(Some(token))
      },
      None if self.at_end() => Ok(None),
      None => {
        Err(LexerError::UnexpectedCharacter {
          position: self.column,
          line:     self.source.to_string(),
        })
      },
    }
  }

  /// Consume the remaining input as one junk token.
  pub fn skip_rest(&mut self) -> Option<Token> {
    if self.at_end() {
      return None;
    }
    let rest = self.remaining();
    let token = Token::new(TokenKind::Junk, rest, self.column);
    self.position = self.source.len();
    self.column += rest.chars().count();
    Some(token)
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn grammar() -> LexicalGrammar {
    LexicalGrammar::new(&[
      (r"\s+", TokenKind::Whitespace),
      (r"nil", TokenKind::Literal),
      (r"[a-z]+", TokenKind::Identifier),
    ])
    .unwrap()
  }

  fn kinds(grammar: &LexicalGrammar, source: &str) -> Vec<(TokenKind, String)> {
    let mut lexer = grammar.lex(source);
    let mut out = Vec::new();
    while let Some(token) = lexer.scan().unwrap() {
      out.push((token.kind, token.raw.to_string()));
    }
    out
  }

  #[test]
  fn test_longest_match_wins() {
    let grammar = grammar();
    assert_eq!(kinds(&grammar, "nilly"), vec![(
      TokenKind::Identifier,
      "nilly".to_string()
    )]);
  }

  #[test]
  fn test_earliest_rule_wins_ties() {
    let grammar = grammar();
    assert_eq!(kinds(&grammar, "nil x"), vec![
      (TokenKind::Literal, "nil".to_string()),
      (TokenKind::Whitespace, " ".to_string()),
      (TokenKind::Identifier, "x".to_string()),
    ]);
  }

  #[test]
  fn test_unmatched_input_is_an_error() {
    let grammar = grammar();
    let mut lexer = grammar.lex("ab?");
    assert!(lexer.scan().unwrap().is_some());
    assert_eq!(
      lexer.scan(),
      Err(LexerError::UnexpectedCharacter {
        position: 2,
        line:     "ab?".to_string(),
      })
    );
    let junk = lexer.skip_rest().unwrap();
    assert_eq!(junk.kind, TokenKind::Junk);
    assert_eq!(junk.offset, 2);
    assert!(lexer.scan().unwrap().is_none());
  }

  #[test]
  fn test_empty_matches_are_ignored() {
    let grammar = LexicalGrammar::new(&[(r"[a-z]*", TokenKind::Identifier)]).unwrap();
    let mut lexer = grammar.lex("");
    assert_eq!(lexer.scan(), Ok(None));
    let mut lexer = grammar.lex("1");
    assert!(lexer.scan().is_err());
  }

  #[test]
  fn test_columns_count_chars() {
    let grammar = grammar();
    let mut lexer = grammar.lex("λ ab");
    assert!(lexer.scan().is_err());
    lexer.skip_rest();
    assert_eq!(lexer.column(), 4);
  }
}
