use std::fmt;

use crate::Tendril;

/// Lexical category of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
  /// Spaces, tabs and commas.
  Whitespace,
  /// A `;` line comment, running to the end of the line.
  Comment,
  /// `(`, `[`, `{` and the reader-macro openers `#(`, `#?(`, `#?@(`, `#{`.
  Open,
  Close,
  /// Quote, syntax-quote, unquote, meta and dispatch markers.
  Punctuation,
  /// Numbers, `true`, `false` and `nil`.
  Literal,
  Keyword,
  Identifier,
  /// A string opened and closed on the same line.
  String,
  /// The opening fragment of a string that continues on the next line.
  StringStart,
  /// A full line inside a multi-line string.
  StringMiddle,
  /// The closing fragment of a multi-line string.
  StringEnd,
  /// Anything no other rule accepts.
  Junk,
  /// Sentinel appended to every line.
  Eol,
}

impl TokenKind {
  pub fn is_whitespace(self) -> bool {
    matches!(self, Self::Whitespace | Self::Eol)
  }

  /// True for every part of a string literal, complete or multi-line.
  pub fn is_string(self) -> bool {
    matches!(
      self,
      Self::String | Self::StringStart | Self::StringMiddle | Self::StringEnd
    )
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Whitespace => "ws",
      Self::Comment => "comment",
      Self::Open => "open",
      Self::Close => "close",
      Self::Punctuation => "punc",
      Self::Literal => "lit",
      Self::Keyword => "kw",
      Self::Identifier => "id",
      Self::String => "str",
      Self::StringStart => "str-start",
      Self::StringMiddle => "str-inside",
      Self::StringEnd => "str-end",
      Self::Junk => "junk",
      Self::Eol => "eol",
    }
  }
}

impl fmt::Display for TokenKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// The only lexical context carried from one line to the next.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScannerState {
  pub in_string: bool,
}

impl ScannerState {
  /// State at the start of a document.
  pub const INITIAL: Self = Self { in_string: false };
}

/// A token on a single line.
///
/// `offset` is the char column where the token starts. `state` is the scanner
/// state in effect immediately after the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub kind:   TokenKind,
  pub raw:    Tendril,
  pub offset: usize,
  pub state:  ScannerState,
}

impl Token {
  pub fn new(kind: TokenKind, raw: impl Into<Tendril>, offset: usize) -> Self {
    Self {
      kind,
      raw: raw.into(),
      offset,
      state: ScannerState::INITIAL,
    }
  }

  /// End-of-line sentinel at column `offset`.
  pub fn eol(offset: usize, state: ScannerState) -> Self {
    Self {
      kind: TokenKind::Eol,
      raw: Tendril::from("\n"),
      offset,
      state,
    }
  }

  /// Length of the raw text in chars.
  pub fn len(&self) -> usize {
    self.raw.chars().count()
  }

  pub fn is_empty(&self) -> bool {
    self.raw.is_empty()
  }
}
