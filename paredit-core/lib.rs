//! Lexical layer of the structural editor: tokens, regex grammars and the
//! line-at-a-time Clojure scanner.

use smartstring::{
  LazyCompact,
  SmartString,
};

pub mod chars;
pub mod lexer;
pub mod scanner;
pub mod token;

pub type Tendril = SmartString<LazyCompact>;
