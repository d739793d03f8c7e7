//! Clojure(Script) line scanner.
//!
//! Two grammars cooperate. [`TOPLEVEL`] holds every ordinary token and
//! reports a string that is still open at the end of the line as
//! [`TokenKind::StringStart`]. [`IN_STRING`] is used while inside such a
//! string: it yields [`TokenKind::StringEnd`] once the closing quote is found
//! and [`TokenKind::StringMiddle`] otherwise.
//!
//! The [`Scanner`] switches grammar in the middle of a line whenever a string
//! starts or ends, and threads a [`ScannerState`] from one line to the next.

use once_cell::sync::Lazy;

use crate::{
  lexer::LexicalGrammar,
  token::{
    ScannerState,
    Token,
    TokenKind,
  },
};

pub static TOPLEVEL: Lazy<LexicalGrammar> = Lazy::new(|| {
  LexicalGrammar::new(&[
    (r"[\s,]+", TokenKind::Whitespace),
    (r";.*", TokenKind::Comment),
    (r"\(|\[|\{|#\(|#\?\(|#\{|#\?@\(", TokenKind::Open),
    (r"\)|\]|\}", TokenKind::Close),
    (r"~@|~|'|#'|#:|#_|\^|`|#|\^:", TokenKind::Punctuation),
    (r"true|false|nil", TokenKind::Literal),
    (r"[0-9]+[rR][0-9a-zA-Z]+", TokenKind::Literal),
    (r"[-+]?[0-9]+(\.[0-9]+)?([eE][-+]?[0-9]+)?", TokenKind::Literal),
    (r#":[^()\[\]{}#,~@'`\^"\s;]*"#, TokenKind::Keyword),
    // a very loose symbol, close to what the reader accepts
    (
      r#"[^()\[\]{}#,~@'`\^"\s:;][^()\[\]{}#,~@'`\^"\s;]*"#,
      TokenKind::Identifier,
    ),
    (r#""([^"\\]|\\.)*""#, TokenKind::String),
    (r#""([^"\\]|\\.)*"#, TokenKind::StringStart),
    (r".", TokenKind::Junk),
  ])
  .expect("toplevel grammar patterns are valid")
});

pub static IN_STRING: Lazy<LexicalGrammar> = Lazy::new(|| {
  LexicalGrammar::new(&[
    (r#"([^"\\]|\\.)*""#, TokenKind::StringEnd),
    (r#"([^"\\]|\\.)*"#, TokenKind::StringMiddle),
  ])
  .expect("string grammar patterns are valid")
});

/// The family a delimiter belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParenClass {
  Round,
  Curly,
  Square,
}

impl ParenClass {
  /// Class of an open or close delimiter, `None` for anything else.
  pub fn of(delimiter: &str) -> Option<Self> {
    match delimiter {
      "(" | ")" | "#(" | "#?(" | "#?@(" => Some(Self::Round),
      "{" | "}" | "#{" => Some(Self::Curly),
      "[" | "]" => Some(Self::Square),
      _ => None,
    }
  }

  pub fn close(self) -> &'static str {
    match self {
      Self::Round => ")",
      Self::Curly => "}",
      Self::Square => "]",
    }
  }
}

/// True if `open` and `close` are delimiters of the same class.
pub fn valid_pair(open: &str, close: &str) -> bool {
  match (ParenClass::of(open), ParenClass::of(close)) {
    (Some(open), Some(close)) => open == close,
    _ => false,
  }
}

/// Turns lines of text into tokens, one line at a time.
///
/// Each buffer owns its own scanner; the only thing it remembers between
/// calls is the state reached at the end of the last line.
#[derive(Debug, Default, Clone)]
pub struct Scanner {
  state: ScannerState,
}

impl Scanner {
  pub fn new() -> Self {
    Self::default()
  }

  /// State reached at the end of the last processed line.
  pub fn state(&self) -> ScannerState {
    self.state
  }

  /// Tokenize `line` starting from `state`.
  ///
  /// The returned tokens partition the line exactly and are followed by an
  /// end-of-line sentinel. Each token records the state right after it.
  pub fn process_line(&mut self, line: &str, state: ScannerState) -> Vec<Token> {
    self.state = state;
    let mut tokens = Vec::new();
    let mut lexer = self.grammar().lex(line);
    loop {
      let mut token = match lexer.scan() {
        Ok(Some(token)) => token,
        Ok(None) => break,
        Err(err) => {
          // unreachable with the built-in grammars, except for a lone
          // trailing backslash inside a multi-line string
          tracing::error!(%err, "lexer invariant violated, emitting junk");
          match lexer.skip_rest() {
            Some(token) => token,
            None => break,
          }
        },
      };
      match token.kind {
        TokenKind::StringStart => {
          self.state.in_string = true;
          lexer.switch_grammar(&IN_STRING);
        },
        TokenKind::StringEnd => {
          self.state.in_string = false;
          lexer.switch_grammar(&TOPLEVEL);
        },
        _ => {},
      }
      token.state = self.state;
      tokens.push(token);
    }
    tokens.push(Token::eol(lexer.column(), self.state));
    tracing::trace!(tokens = tokens.len(), state = ?self.state, "scanned line");
    tokens
  }

  fn grammar(&self) -> &'static LexicalGrammar {
    if self.state.in_string {
      &IN_STRING
    } else {
      &TOPLEVEL
    }
  }
}

/// Convenience to lex one line from a fresh state.
pub fn lex_line(line: &str, state: ScannerState) -> (Vec<Token>, ScannerState) {
  let mut scanner = Scanner::new();
  let tokens = scanner.process_line(line, state);
  (tokens, scanner.state())
}

#[cfg(test)]
mod test {
  use super::*;

  fn kinds(line: &str, state: ScannerState) -> Vec<(TokenKind, String)> {
    let (tokens, _) = lex_line(line, state);
    tokens
      .into_iter()
      .map(|token| (token.kind, token.raw.to_string()))
      .collect()
  }

  fn toplevel(line: &str) -> Vec<TokenKind> {
    lex_line(line, ScannerState::INITIAL)
      .0
      .into_iter()
      .map(|token| token.kind)
      .collect()
  }

  #[test]
  fn test_basic_forms() {
    use TokenKind::*;
    assert_eq!(toplevel("(defn foo [x] x)"), vec![
      Open, Identifier, Whitespace, Identifier, Whitespace, Open, Identifier, Close, Whitespace,
      Identifier, Close, Eol
    ]);
    assert_eq!(toplevel("#{:a 1.5e3}"), vec![
      Open, Keyword, Whitespace, Literal, Close, Eol
    ]);
    assert_eq!(toplevel("#?(:clj 16rFF)"), vec![
      Open, Keyword, Whitespace, Literal, Close, Eol
    ]);
    assert_eq!(toplevel("'(~@xs) ; done"), vec![
      Punctuation,
      Open,
      Punctuation,
      Identifier,
      Close,
      Whitespace,
      Comment,
      Eol
    ]);
  }

  #[test]
  fn test_literals_beat_identifiers_on_ties() {
    use TokenKind::*;
    assert_eq!(toplevel("nil"), vec![Literal, Eol]);
    assert_eq!(toplevel("nilly"), vec![Identifier, Eol]);
    assert_eq!(toplevel("-12"), vec![Literal, Eol]);
    assert_eq!(toplevel("-"), vec![Identifier, Eol]);
  }

  #[test]
  fn test_multiline_string() {
    use TokenKind::*;
    let mut scanner = Scanner::new();
    let first = scanner.process_line(r#"(str "abc"#, ScannerState::INITIAL);
    assert_eq!(
      first.iter().map(|t| t.kind).collect::<Vec<_>>(),
      vec![Open, Identifier, Whitespace, StringStart, Eol]
    );
    assert!(scanner.state().in_string);
    assert!(first.last().unwrap().state.in_string);

    let middle = scanner.process_line("still going", scanner.state());
    assert_eq!(middle[0].kind, StringMiddle);
    assert!(scanner.state().in_string);

    let empty = scanner.process_line("", scanner.state());
    assert_eq!(empty.len(), 1);
    assert_eq!(empty[0].kind, Eol);

    let last = scanner.process_line(r#"done\" " x)"#, scanner.state());
    assert_eq!(
      last
        .iter()
        .map(|t| (t.kind, t.raw.as_str()))
        .collect::<Vec<_>>(),
      vec![
        (StringEnd, r#"done\" ""#),
        (Whitespace, " "),
        (Identifier, "x"),
        (Close, ")"),
        (Eol, "\n"),
      ]
    );
    assert!(!scanner.state().in_string);
    assert!(last[0].state == ScannerState::INITIAL);
  }

  #[test]
  fn test_trailing_backslash_inside_string() {
    let state = ScannerState { in_string: true };
    assert_eq!(kinds("ab\\", state), vec![
      (TokenKind::StringMiddle, "ab".to_string()),
      (TokenKind::Junk, "\\".to_string()),
      (TokenKind::Eol, "\n".to_string()),
    ]);
  }

  #[test]
  fn test_eol_offset_is_line_length_in_chars() {
    let (tokens, _) = lex_line("(λ)", ScannerState::INITIAL);
    let eol = tokens.last().unwrap();
    assert_eq!(eol.kind, TokenKind::Eol);
    assert_eq!(eol.offset, 3);
    assert_eq!(tokens[1].offset, 1);
  }

  #[test]
  fn test_valid_pair() {
    assert!(valid_pair("(", ")"));
    assert!(valid_pair("#(", ")"));
    assert!(valid_pair("#?@(", ")"));
    assert!(valid_pair("{", "}"));
    assert!(valid_pair("#{", "}"));
    assert!(valid_pair("[", "]"));
    assert!(!valid_pair("(", "]"));
    assert!(!valid_pair("#{", ")"));
    assert!(!valid_pair("x", "x"));
  }

  fn joined(line: &str, state: ScannerState) -> String {
    let (tokens, _) = lex_line(line, state);
    tokens
      .iter()
      .filter(|token| token.kind != TokenKind::Eol)
      .map(|token| token.raw.as_str())
      .collect()
  }

  quickcheck::quickcheck! {
    fn test_tokens_partition_the_line(text: String, in_string: bool) -> bool {
      let line = text.replace(['\n', '\r'], " ");
      joined(&line, ScannerState { in_string }) == line
    }

    fn test_relex_is_deterministic(text: String, in_string: bool) -> bool {
      let line = text.replace('\n', " ");
      let state = ScannerState { in_string };
      lex_line(&line, state) == lex_line(&line, state)
    }
  }
}
