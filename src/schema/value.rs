use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// A caller-held variable snapshot, keyed by variable name without `$`.
pub type Snapshot = HashMap<String, Value>;

/// A dynamic value bound to a story variable.
///
/// Serialized untagged so snapshots read naturally in RON and JSON:
/// `{"score": 50, "items": ["sword"], "met_guard": true}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Boolean(bool),
    Number(f64),
    Text(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Build a list of text items.
    pub fn text_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(|s| Self::Text(s.into())).collect())
    }

    /// Numeric view of this value. Text coerces when it parses as a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => parse_number(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Truthiness of a bare value reference in a condition.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Boolean(b) => *b,
            Self::Number(n) => *n != 0.0,
            Self::Text(s) => !s.is_empty(),
            Self::List(_) | Self::Map(_) => true,
        }
    }

    /// Loose equality used by `is` / `is not`: numeric when both sides
    /// coerce to numbers, exact text comparison otherwise.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a == b,
            _ => self.to_string() == other.to_string(),
        }
    }

    /// Membership used by `contains`. Lists compare elements by text form,
    /// maps test their keys, anything else falls back to a substring check.
    pub fn contains(&self, needle: &Value) -> bool {
        let needle = needle.to_string();
        match self {
            Self::List(items) => items.iter().any(|item| item.to_string() == needle),
            Self::Map(map) => map.contains_key(&needle),
            other => other.to_string().contains(&needle),
        }
    }

    /// 1-indexed list access. Negative indices count from the end.
    pub fn nth(&self, index: i64) -> Option<&Value> {
        let items = self.as_list()?;
        let len = items.len() as i64;
        let pos = match index {
            i if i > 0 => i - 1,
            i if i < 0 => len + i,
            _ => return None,
        };
        if (0..len).contains(&pos) {
            items.get(pos as usize)
        } else {
            None
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::Text(s) => f.write_str(s),
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            Self::Map(map) => {
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                Ok(())
            }
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Parse a plain decimal literal: optional sign, digits, optional fraction.
///
/// Stricter than `f64::from_str`, which would also accept `inf` and `NaN`.
pub fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    let digits = s.strip_prefix(['-', '+']).unwrap_or(s);
    if digits.is_empty() || digits.starts_with('.') || digits.ends_with('.') {
        return None;
    }
    let mut seen_dot = false;
    for c in digits.chars() {
        match c {
            '0'..='9' => {}
            '.' if !seen_dot => seen_dot = true,
            _ => return None,
        }
    }
    s.parse::<f64>().ok()
}

/// Render a number the way passage text expects: integral values carry
/// no fractional part.
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        return "0".to_string();
    }
    format!("{}", n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_render_without_trailing_zero() {
        assert_eq!(Value::Number(50.0).to_string(), "50");
        assert_eq!(Value::Number(-0.0).to_string(), "0");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
    }

    #[test]
    fn text_coerces_to_number() {
        assert_eq!(Value::text("42").as_number(), Some(42.0));
        assert_eq!(Value::text(" -3.5 ").as_number(), Some(-3.5));
        assert_eq!(Value::text("abc").as_number(), None);
        assert_eq!(Value::text("inf").as_number(), None);
        assert_eq!(Value::Boolean(true).as_number(), None);
    }

    #[test]
    fn loose_equality() {
        assert!(Value::Number(5.0).loose_eq(&Value::text("5")));
        assert!(Value::text("5.0").loose_eq(&Value::Number(5.0)));
        assert!(Value::text("Bob").loose_eq(&Value::text("Bob")));
        assert!(!Value::text("Bob").loose_eq(&Value::text("bob")));
        assert!(Value::Boolean(true).loose_eq(&Value::text("true")));
    }

    #[test]
    fn list_contains_by_text_form() {
        let items = Value::text_list(["sword", "shield"]);
        assert!(items.contains(&Value::text("sword")));
        assert!(!items.contains(&Value::text("swo")));

        let numbers = Value::List(vec![Value::Number(3.0)]);
        assert!(numbers.contains(&Value::text("3")));
    }

    #[test]
    fn text_contains_is_substring() {
        assert!(Value::text("a rusty key").contains(&Value::text("rusty")));
        assert!(Value::Number(123.0).contains(&Value::text("23")));
    }

    #[test]
    fn nth_is_one_indexed() {
        let items = Value::text_list(["a", "b", "c"]);
        assert_eq!(items.nth(1), Some(&Value::text("a")));
        assert_eq!(items.nth(3), Some(&Value::text("c")));
        assert_eq!(items.nth(-1), Some(&Value::text("c")));
        assert_eq!(items.nth(0), None);
        assert_eq!(items.nth(4), None);
        assert_eq!(Value::text("abc").nth(1), None);
    }

    #[test]
    fn truthiness() {
        assert!(Value::Number(1.0).is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::text("").is_truthy());
        assert!(Value::List(Vec::new()).is_truthy());
    }

    #[test]
    fn ron_round_trip_untagged() {
        let mut snapshot = Snapshot::new();
        snapshot.insert("score".to_string(), Value::Number(50.0));
        snapshot.insert("items".to_string(), Value::text_list(["sword"]));
        snapshot.insert("met".to_string(), Value::Boolean(true));

        let serialized = ron::to_string(&snapshot).unwrap();
        let deserialized: Snapshot = ron::from_str(&serialized).unwrap();
        assert_eq!(deserialized, snapshot);
    }
}
