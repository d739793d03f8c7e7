//! Indentation settings.
//!
//! Settings are read from a TOML document:
//!
//! ```toml
//! [indent]
//! max-depth = 3
//! max-lines = 20
//!
//! [indent.rules]
//! let   = [["block", 1]]
//! letfn = [["block", 1], ["inner", 2, 0]]
//! ```
//!
//! User rules are merged over the built-in table, replacing the rules of any
//! symbol they mention.

use std::collections::HashMap;

use serde::{
  Deserialize,
  Deserializer,
};
use thiserror::Error;

use crate::indent::{
  IndentRule,
  IndentRules,
  Rules,
};

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to parse indent config: {0}")]
  Parse(#[from] toml::de::Error),
  #[error("invalid indent rule for `{symbol}`: {reason}")]
  InvalidRule { symbol: String, reason: String },
  #[error("`{field}` must be greater than zero")]
  InvalidLimit { field: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndentConfig {
  /// How many enclosing lists to inspect.
  pub max_depth: usize,
  /// How many lines above the caret to inspect.
  pub max_lines: usize,
  pub rules:     IndentRules,
}

impl Default for IndentConfig {
  fn default() -> Self {
    Self {
      max_depth: 3,
      max_lines: 20,
      rules:     IndentRules::default(),
    }
  }
}

impl IndentConfig {
  /// Parse the `[indent]` table of a TOML document. Missing keys keep their
  /// defaults.
  pub fn from_toml(source: &str) -> Result<Self> {
    let file: ConfigFile = toml::from_str(source)?;
    Self::try_from(file.indent)
  }
}

impl TryFrom<RawIndentConfig> for IndentConfig {
  type Error = ConfigError;

  fn try_from(raw: RawIndentConfig) -> Result<Self> {
    if raw.max_depth == 0 {
      return Err(ConfigError::InvalidLimit { field: "max-depth" });
    }
    if raw.max_lines == 0 {
      return Err(ConfigError::InvalidLimit { field: "max-lines" });
    }
    let mut rules = IndentRules::default();
    for (symbol, raw_rules) in raw.rules {
      let parsed = raw_rules
        .into_iter()
        .map(|rule| rule.parse(&symbol))
        .collect::<Result<Rules>>()?;
      rules.insert(symbol, parsed);
    }
    Ok(Self {
      max_depth: raw.max_depth,
      max_lines: raw.max_lines,
      rules,
    })
  }
}

impl<'de> Deserialize<'de> for IndentConfig {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
    let raw = RawIndentConfig::deserialize(deserializer)?;
    Self::try_from(raw).map_err(serde::de::Error::custom)
  }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
struct ConfigFile {
  indent: RawIndentConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
struct RawIndentConfig {
  max_depth: usize,
  max_lines: usize,
  rules:     HashMap<String, Vec<RawRule>>,
}

impl Default for RawIndentConfig {
  fn default() -> Self {
    let defaults = IndentConfig::default();
    Self {
      max_depth: defaults.max_depth,
      max_lines: defaults.max_lines,
      rules:     HashMap::new(),
    }
  }
}

/// `["block", n]`, `["inner", n]` or `["inner", n, limit]`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawRule {
  Short(String, usize),
  Long(String, usize, usize),
}

impl RawRule {
  fn parse(self, symbol: &str) -> Result<IndentRule> {
    let invalid = |reason: String| {
      ConfigError::InvalidRule {
        symbol: symbol.to_string(),
        reason,
      }
    };
    match self {
      Self::Short(kind, n) if kind == "block" => Ok(IndentRule::Block(n)),
      Self::Short(kind, n) if kind == "inner" => Ok(IndentRule::Inner(n, None)),
      Self::Long(kind, n, limit) if kind == "inner" => Ok(IndentRule::Inner(n, Some(limit))),
      Self::Long(kind, ..) if kind == "block" => {
        Err(invalid("block rules take a single argument".to_string()))
      },
      Self::Short(kind, _) | Self::Long(kind, ..) => Err(invalid(format!("unknown rule kind `{kind}`"))),
    }
  }
}
