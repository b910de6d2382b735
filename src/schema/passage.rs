use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::value::Value;

/// Ordered history of passage names the player has entered.
pub type VisitLog = Vec<String>;

/// Passage name → tags, used by `(visited: where its tags contains ...)`.
pub type TagIndex = FxHashMap<String, Vec<String>>;

/// A passage record as handed over by the document-extraction step.
///
/// `raw_body` is the exact text between the passage tags, macros included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPassage {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(alias = "rawBody", alias = "text")]
    pub raw_body: String,
}

impl RawPassage {
    pub fn new(name: impl Into<String>, raw_body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: Vec::new(),
            raw_body: raw_body.into(),
        }
    }

    /// Attach a whitespace-separated tag string, as it appears in markup.
    /// Duplicates are dropped, first occurrence order is kept.
    pub fn with_tags(mut self, tags: &str) -> Self {
        for tag in tags.split_whitespace() {
            if !self.tags.iter().any(|t| t == tag) {
                self.tags.push(tag.to_string());
            }
        }
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// A navigable choice extracted from link syntax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub text: String,
    pub target: String,
}

impl Choice {
    pub fn new(text: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            target: target.into(),
        }
    }
}

/// A compiled passage: rendered text, choices, and the variables whose
/// value differs from the input snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub name: String,
    pub content: String,
    pub choices: Vec<Choice>,
    pub tags: Vec<String>,
    pub state_changes: BTreeMap<String, Value>,
}
