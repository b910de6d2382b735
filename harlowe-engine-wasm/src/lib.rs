//! WASM bindings for harlowe-engine: powers the in-browser story player.
//!
//! Everything crossing the boundary is JSON text. Snapshots are objects
//! of variable name to value, visit logs are arrays of passage names, and
//! an empty string stands for "not supplied".

use wasm_bindgen::prelude::*;

use harlowe_engine::core::config::StoryConfig;
use harlowe_engine::core::pipeline::{parse_passages_ron, StoryEngine};
use harlowe_engine::schema::passage::RawPassage;
use harlowe_engine::schema::value::Snapshot;

// ---------------------------------------------------------------------------
// Embedded demo story, compiled into the WASM binary
// ---------------------------------------------------------------------------
mod data {
    pub const LANTERN_STORY: &str = include_str!("../../stories/lantern.ron");
}

// ---------------------------------------------------------------------------
// JSON helpers
// ---------------------------------------------------------------------------
fn parse_snapshot(json: &str) -> Result<Option<Snapshot>, JsError> {
    if json.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(json)
        .map(Some)
        .map_err(|e| JsError::new(&format!("Invalid snapshot JSON: {e}")))
}

fn parse_visits(json: &str) -> Result<Option<Vec<String>>, JsError> {
    if json.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(json)
        .map(Some)
        .map_err(|e| JsError::new(&format!("Invalid visit log JSON: {e}")))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, JsError> {
    serde_json::to_string(value).map_err(|e| JsError::new(&format!("Serialization error: {e}")))
}

// ---------------------------------------------------------------------------
// StoryHandle: the main exported struct
// ---------------------------------------------------------------------------
#[wasm_bindgen]
pub struct StoryHandle {
    engine: StoryEngine,
}

#[wasm_bindgen]
impl StoryHandle {
    /// Load a story from a JSON array of passage records.
    ///
    /// Expected JSON shape:
    /// ```json
    /// [{ "name": "Start", "tags": ["intro"], "rawBody": "Hello [[Next]]" }]
    /// ```
    /// `config_ron` may be empty for the default config.
    #[wasm_bindgen(constructor)]
    pub fn new(passages_json: &str, config_ron: &str, seed: u64) -> Result<StoryHandle, JsError> {
        let passages: Vec<RawPassage> = serde_json::from_str(passages_json)
            .map_err(|e| JsError::new(&format!("Invalid passages JSON: {e}")))?;
        Self::build(passages, config_ron, seed)
    }

    /// The bundled demo story.
    pub fn demo(seed: u64) -> Result<StoryHandle, JsError> {
        let passages = parse_passages_ron(data::LANTERN_STORY)
            .map_err(|e| JsError::new(&format!("Story parse error: {e}")))?;
        Self::build(passages, "", seed)
    }

    /// Compile a passage. Returns the passage as JSON:
    /// `{ name, content, choices: [{ text, target }], tags, state_changes }`.
    pub fn passage(
        &mut self,
        name: &str,
        snapshot_json: &str,
        visits_json: &str,
    ) -> Result<String, JsError> {
        let snapshot = parse_snapshot(snapshot_json)?;
        let visits = parse_visits(visits_json)?;
        let passage = self
            .engine
            .passage(name, snapshot.as_ref(), visits.as_deref())
            .map_err(|e| JsError::new(&format!("Passage error: {e}")))?;
        to_json(&passage)
    }

    pub fn start_passage(
        &mut self,
        snapshot_json: &str,
        visits_json: &str,
    ) -> Result<String, JsError> {
        let name = self
            .engine
            .start_name()
            .ok_or_else(|| JsError::new("Story has no start passage"))?
            .to_string();
        self.passage(&name, snapshot_json, visits_json)
    }

    /// Rendered header text, or `undefined` when the story has none.
    pub fn header(&mut self, snapshot_json: &str) -> Result<Option<String>, JsError> {
        let snapshot = parse_snapshot(snapshot_json)?;
        Ok(self.engine.header_content(snapshot.as_ref()))
    }

    /// Rendered footer text, or `undefined` when the story has none.
    pub fn footer(&mut self, snapshot_json: &str) -> Result<Option<String>, JsError> {
        let snapshot = parse_snapshot(snapshot_json)?;
        Ok(self.engine.footer_content(snapshot.as_ref()))
    }

    /// Navigable passage names as a JSON array, in story order.
    pub fn passage_names(&self) -> Result<String, JsError> {
        to_json(&self.engine.passage_names())
    }

    pub fn has_passage(&self, name: &str) -> bool {
        self.engine.has_passage(name)
    }
}

impl StoryHandle {
    fn build(
        passages: Vec<RawPassage>,
        config_ron: &str,
        seed: u64,
    ) -> Result<StoryHandle, JsError> {
        let config = if config_ron.trim().is_empty() {
            StoryConfig::default()
        } else {
            StoryConfig::parse_ron(config_ron)
                .map_err(|e| JsError::new(&format!("Config parse error: {e}")))?
        };
        let engine = StoryEngine::builder()
            .passages(passages)
            .config(config)
            .seed(seed)
            .build()
            .map_err(|e| JsError::new(&format!("Story build error: {e}")))?;
        Ok(StoryHandle { engine })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_story_parses() {
        let passages = parse_passages_ron(data::LANTERN_STORY).unwrap();
        assert!(passages.iter().any(|p| p.name == "Start"));
        assert!(passages.iter().any(|p| p.has_tag("header")));
    }

    #[test]
    fn snapshot_json_round_trip() {
        let snapshot = parse_snapshot(r#"{"gold": 3, "name": "Ada", "bag": ["rope"]}"#)
            .ok()
            .flatten()
            .unwrap();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot["gold"].to_string(), "3");
        assert!(parse_snapshot("  ").ok().flatten().is_none());
    }

    #[test]
    fn visit_log_json() {
        let visits = parse_visits(r#"["Start", "Hall"]"#).ok().flatten().unwrap();
        assert_eq!(visits, vec!["Start".to_string(), "Hall".to_string()]);
    }
}
