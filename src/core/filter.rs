/// Filter pass: optional content filters applied to cleaned passage text
/// before final whitespace normalisation.

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::config::ConfigError;

/// A filter as written in the story config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterConfig {
    /// Remove every match of a regular expression.
    StripPattern(String),
    /// Remove each span from `start` through the next `end`, markers
    /// included. An unterminated `start` is left alone.
    StripBetween { start: String, end: String },
    /// Remove every occurrence of a literal string.
    StripLiteral(String),
}

#[derive(Debug, Clone)]
enum Filter {
    Pattern(Regex),
    Between { start: String, end: String },
    Literal(String),
}

impl Filter {
    fn apply(&self, text: &str) -> String {
        match self {
            Self::Pattern(re) => re.replace_all(text, "").into_owned(),
            Self::Literal(literal) if !literal.is_empty() => text.replace(literal.as_str(), ""),
            Self::Literal(_) => text.to_string(),
            Self::Between { start, end } => strip_between(text, start, end),
        }
    }
}

fn strip_between(text: &str, start: &str, end: &str) -> String {
    if start.is_empty() || end.is_empty() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find(start) {
        let after = open + start.len();
        let Some(close) = rest[after..].find(end) else {
            break;
        };
        out.push_str(&rest[..open]);
        rest = &rest[after + close + end.len()..];
    }
    out.push_str(rest);
    out
}

/// The compiled filter chain, applied in config order.
#[derive(Debug, Clone, Default)]
pub struct FilterPass {
    filters: Vec<Filter>,
}

impl FilterPass {
    pub fn compile(configs: &[FilterConfig]) -> Result<Self, ConfigError> {
        let filters = configs
            .iter()
            .map(|config| -> Result<Filter, ConfigError> {
                Ok(match config {
                    FilterConfig::StripPattern(pattern) => Filter::Pattern(Regex::new(pattern)?),
                    FilterConfig::StripBetween { start, end } => Filter::Between {
                        start: start.clone(),
                        end: end.clone(),
                    },
                    FilterConfig::StripLiteral(literal) => Filter::Literal(literal.clone()),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { filters })
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn apply(&self, text: &str) -> String {
        self.filters
            .iter()
            .fold(text.to_string(), |acc, filter| filter.apply(&acc))
    }
}
