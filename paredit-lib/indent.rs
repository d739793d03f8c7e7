//! Indentation for a new line.
//!
//! Walks backwards from the caret through the enclosing lists, recording for
//! each one where it starts, where its first argument sits and how many
//! arguments precede the caret. The innermost list then decides the column,
//! guided by per-symbol rules in the style of cljfmt:
//!
//! - `Block(n)`: once `n` arguments are on their own, indent the body by two
//!   columns from the open delimiter.
//! - `Inner(n, limit)`: indent by two columns any list nested `n` levels below
//!   the form, optionally only before argument `limit`.
//!
//! Without a matching rule a line aligns with the first argument when there is
//! one on the opening line, or with the first element otherwise.

use std::collections::HashMap;

use paredit_core::token::TokenKind;
use smallvec::SmallVec;

use self::IndentRule::{
  Block,
  Inner,
};
use crate::{
  config::IndentConfig,
  model::LineInputModel,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndentRule {
  Block(usize),
  Inner(usize, Option<usize>),
}

pub type Rules = SmallVec<[IndentRule; 2]>;

/// cljfmt's default rules.
const DEFAULT_RULES: &[(&str, &[IndentRule])] = &[
  ("alt!", &[Block(0)]),
  ("alt!!", &[Block(0)]),
  ("are", &[Block(2)]),
  ("as->", &[Block(2)]),
  ("binding", &[Block(1)]),
  ("bound-fn", &[Inner(1, None)]),
  ("case", &[Block(1)]),
  ("catch", &[Block(2)]),
  ("comment", &[Block(0)]),
  ("cond", &[Block(0)]),
  ("condp", &[Block(2)]),
  ("cond->", &[Block(1)]),
  ("cond->>", &[Block(1)]),
  ("def", &[Inner(0, None)]),
  ("defmacro", &[Inner(0, None)]),
  ("defmethod", &[Inner(0, None)]),
  ("defmulti", &[Inner(0, None)]),
  ("defn", &[Inner(0, None)]),
  ("defn-", &[Inner(0, None)]),
  ("defonce", &[Inner(0, None)]),
  ("defprotocol", &[Block(1), Inner(1, None)]),
  ("defrecord", &[Block(2), Inner(1, None)]),
  ("defstruct", &[Block(1)]),
  ("deftest", &[Inner(0, None)]),
  ("deftype", &[Block(2), Inner(1, None)]),
  ("do", &[Block(0)]),
  ("doseq", &[Block(1)]),
  ("dotimes", &[Block(1)]),
  ("doto", &[Block(1)]),
  ("extend", &[Block(1)]),
  ("extend-protocol", &[Block(1), Inner(1, None)]),
  ("extend-type", &[Block(1), Inner(1, None)]),
  ("fdef", &[Inner(0, None)]),
  ("finally", &[Block(0)]),
  ("fn", &[Inner(0, None)]),
  ("for", &[Block(1)]),
  ("future", &[Block(0)]),
  ("go", &[Block(0)]),
  ("go-loop", &[Block(1)]),
  ("if", &[Block(1)]),
  ("if-let", &[Block(1)]),
  ("if-not", &[Block(1)]),
  ("if-some", &[Block(1)]),
  ("let", &[Block(1)]),
  ("letfn", &[Block(1), Inner(2, Some(0))]),
  ("locking", &[Block(1)]),
  ("loop", &[Block(1)]),
  ("match", &[Block(1)]),
  ("ns", &[Block(1)]),
  ("proxy", &[Block(2), Inner(1, None)]),
  ("reify", &[Inner(0, None), Inner(1, None)]),
  ("struct-map", &[Block(1)]),
  ("testing", &[Block(1)]),
  ("thread", &[Block(0)]),
  ("try", &[Block(0)]),
  ("use-fixtures", &[Inner(0, None)]),
  ("when", &[Block(1)]),
  ("when-first", &[Block(1)]),
  ("when-let", &[Block(1)]),
  ("when-not", &[Block(1)]),
  ("when-some", &[Block(1)]),
  ("while", &[Block(1)]),
  ("with-local-vars", &[Block(1)]),
  ("with-open", &[Block(1)]),
  ("with-out-str", &[Block(0)]),
  ("with-precision", &[Block(1)]),
  ("with-redefs", &[Block(1)]),
];

/// Open delimiters whose first element is treated as a call head.
const OPEN_LIST: &[&str] = &["#(", "#?(", "(", "#?@("];

/// Indent rules keyed by symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndentRules {
  rules: HashMap<String, Rules>,
}

impl Default for IndentRules {
  fn default() -> Self {
    Self {
      rules: DEFAULT_RULES
        .iter()
        .map(|(symbol, rules)| (symbol.to_string(), Rules::from_slice(rules)))
        .collect(),
    }
  }
}

impl IndentRules {
  /// A table without any rules.
  pub fn empty() -> Self {
    Self {
      rules: HashMap::new(),
    }
  }

  pub fn get(&self, symbol: &str) -> &[IndentRule] {
    self
      .rules
      .get(symbol)
      .map(|rules| rules.as_slice())
      .unwrap_or_default()
  }

  /// Set the rules for `symbol`, replacing any existing ones.
  pub fn insert(&mut self, symbol: impl Into<String>, rules: impl IntoIterator<Item = IndentRule>) {
    self.rules.insert(symbol.into(), rules.into_iter().collect());
  }

  pub fn len(&self) -> usize {
    self.rules.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rules.is_empty()
  }
}

impl Extend<(String, Rules)> for IndentRules {
  fn extend<T: IntoIterator<Item = (String, Rules)>>(&mut self, iter: T) {
    self.rules.extend(iter);
  }
}

/// What was learned about one enclosing list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndentState {
  /// Raw text of the list's first element.
  pub first:             Option<String>,
  /// Column of the first element, right after the open delimiter.
  pub start_column:      usize,
  /// Column of the first argument when it shares a line with a symbol head,
  /// otherwise the same as `start_column`.
  pub first_item_column: usize,
  pub rules:             Rules,
  /// Number of elements between the open delimiter and the caret.
  pub arg_position:      usize,
  /// Number of elements on the line being continued.
  pub exprs_on_line:     usize,
}

/// Collect the enclosing lists around `offset`, outermost first.
///
/// At most `max_depth` lists are collected and the walk gives up after
/// `max_lines` lines. When no list encloses `offset`, a single state
/// describing the previous line's indentation is returned.
pub fn collect_indent_state(
  model: &LineInputModel,
  offset: usize,
  max_depth: usize,
  max_lines: usize,
  rules: &IndentRules,
) -> Vec<IndentState> {
  let mut cursor = model.get_token_cursor(offset, false);
  cursor.backward_whitespace(true);

  let mut max_depth = max_depth;
  let mut arg_position = 0;
  let mut exprs_on_line = 0;
  let start_line = cursor.line;
  let mut last_line = cursor.line;
  let mut last_indent = 0;
  let mut states = Vec::new();

  loop {
    if !cursor.backward_sexp(false) {
      let prev = cursor.get_prev_token();
      if prev.kind == TokenKind::Open && prev.offset <= 1 {
        // a list opened at the margin, no point looking further out
        max_depth = 0;
      }

      let mut next = cursor;
      next.forward_sexp(true);
      next.forward_whitespace(true);
      let head = cursor.get_token();
      let first_item_column = if head.kind == TokenKind::Identifier
        && next.line == cursor.line
        && !next.at_end()
        && OPEN_LIST.contains(&prev.raw.as_str())
      {
        next.row_col().1
      } else {
        cursor.row_col().1
      };
      let first = head.raw.to_string();
      let start_column = cursor.row_col().1;

      if !cursor.backward_up_list() {
        break;
      }
      states.push(IndentState {
        rules: Rules::from_slice(rules.get(&first)),
        first: Some(first),
        start_column,
        first_item_column,
        arg_position,
        exprs_on_line,
      });
      arg_position = 0;
      exprs_on_line = 1;
    }

    if cursor.line != last_line {
      let mut head = cursor;
      head.forward_sexp(true);
      head.forward_whitespace(true);
      if !head.at_end() {
        last_indent = head.row_col().1;
        exprs_on_line = 0;
        last_line = cursor.line;
      }
    }

    if matches!(
      cursor.get_prev_token().kind,
      TokenKind::Whitespace | TokenKind::Comment | TokenKind::Eol
    ) {
      arg_position += 1;
      exprs_on_line += 1;
    }

    if cursor.at_start()
      || start_line.abs_diff(cursor.line) >= max_lines
      || states.len() >= max_depth
    {
      break;
    }
  }

  states.reverse();
  if states.is_empty() {
    states.push(IndentState {
      first:             None,
      start_column:      last_indent,
      first_item_column: last_indent,
      rules:             Rules::new(),
      arg_position:      0,
      exprs_on_line:     0,
    });
  }
  states
}

/// Column a new line inserted at `offset` should be indented to.
pub fn get_indent(model: &LineInputModel, offset: usize, config: &IndentConfig) -> usize {
  let states = collect_indent_state(
    model,
    offset,
    config.max_depth,
    config.max_lines,
    &config.rules,
  );
  let Some(this_block) = states.last() else {
    return 0;
  };
  let innermost = states.len() - 1;

  let mut indent = None;
  for (pos, state) in states.iter().enumerate().rev() {
    for rule in &state.rules {
      match *rule {
        Inner(depth, limit) if pos + depth == innermost => {
          if limit.is_none_or(|limit| limit > this_block.arg_position) {
            indent = Some(this_block.start_column + 1);
          }
        },
        Block(args) if pos == innermost => {
          if this_block.exprs_on_line > args {
            indent = Some(this_block.first_item_column);
          } else if this_block.arg_position >= args {
            indent = Some(this_block.start_column + 1);
          }
        },
        _ => {},
      }
    }
  }

  indent.unwrap_or(if this_block.exprs_on_line > 0 {
    this_block.first_item_column
  } else {
    this_block.start_column
  })
}
