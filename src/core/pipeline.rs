/// The story engine: passage lookup with compiled, cached results.
///
/// Wires together passage loading, configuration, the shared RNG and the
/// passage compiler.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::compiler::PassageCompiler;
use crate::core::config::{ConfigError, StoryConfig};
use crate::schema::passage::{Passage, RawPassage, TagIndex};
use crate::schema::value::Snapshot;

#[derive(Debug, Error)]
pub enum StoryError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("passage not found: {0}")]
    PassageNotFound(String),
    #[error("story has no navigable passages")]
    NoPassages,
}

const START_PASSAGE: &str = "Start";

/// A loaded story. Built via `StoryEngine::builder()`.
#[derive(Debug)]
pub struct StoryEngine {
    passages: FxHashMap<String, RawPassage>,
    /// Navigable passage names in document order.
    order: Vec<String>,
    header: Option<RawPassage>,
    footer: Option<RawPassage>,
    tags: TagIndex,
    compiler: PassageCompiler,
    config: StoryConfig,
    rng: StdRng,
    /// Default-state compilations, keyed by passage name.
    cache: FxHashMap<String, Passage>,
}

/// Builder for constructing a `StoryEngine`.
pub struct StoryEngineBuilder {
    passages: Vec<RawPassage>,
    passages_path: Option<PathBuf>,
    config: Option<StoryConfig>,
    config_path: Option<PathBuf>,
    seed: Option<u64>,
    rng: Option<StdRng>,
}

impl StoryEngine {
    pub fn builder() -> StoryEngineBuilder {
        StoryEngineBuilder {
            passages: Vec::new(),
            passages_path: None,
            config: None,
            config_path: None,
            seed: None,
            rng: None,
        }
    }

    pub fn config(&self) -> &StoryConfig {
        &self.config
    }

    pub fn passage_names(&self) -> &[String] {
        &self.order
    }

    pub fn has_passage(&self, name: &str) -> bool {
        self.passages.contains_key(name)
    }

    pub fn raw_passage(&self, name: &str) -> Option<&RawPassage> {
        self.passages.get(name)
    }

    /// Compile a passage by name.
    ///
    /// With neither a snapshot nor a visit log the passage is compiled
    /// against empty state once and the result is reused.
    pub fn passage(
        &mut self,
        name: &str,
        snapshot: Option<&Snapshot>,
        visits: Option<&[String]>,
    ) -> Result<Passage, StoryError> {
        let raw = self
            .passages
            .get(name)
            .ok_or_else(|| StoryError::PassageNotFound(name.to_string()))?;

        if snapshot.is_none() && visits.is_none() {
            if let Some(cached) = self.cache.get(name) {
                log::trace!("passage `{}` served from cache", name);
                return Ok(cached.clone());
            }
        }

        let empty = Snapshot::new();
        let passage = self.compiler.compile(
            raw,
            snapshot.unwrap_or(&empty),
            visits.unwrap_or(&[]),
            &self.tags,
            &mut self.rng,
        );

        if snapshot.is_none() && visits.is_none() {
            self.cache.insert(name.to_string(), passage.clone());
        }
        Ok(passage)
    }

    /// Name of the opening passage: the configured one, else "Start",
    /// else the first navigable passage.
    pub fn start_name(&self) -> Option<&str> {
        if let Some(name) = self.config.start_passage.as_deref() {
            if self.passages.contains_key(name) {
                return Some(name);
            }
            log::warn!("configured start passage `{}` does not exist", name);
        }
        if self.passages.contains_key(START_PASSAGE) {
            return Some(START_PASSAGE);
        }
        self.order.first().map(String::as_str)
    }

    pub fn start_passage(
        &mut self,
        snapshot: Option<&Snapshot>,
        visits: Option<&[String]>,
    ) -> Result<Passage, StoryError> {
        let name = self.start_name().ok_or(StoryError::NoPassages)?.to_string();
        self.passage(&name, snapshot, visits)
    }

    /// Rendered text of the first passage tagged as header, if any.
    pub fn header_content(&mut self, snapshot: Option<&Snapshot>) -> Option<String> {
        let raw = self.header.as_ref()?;
        Some(Self::render(&self.compiler, raw, snapshot, &self.tags, &mut self.rng))
    }

    /// Rendered text of the first passage tagged as footer, if any.
    pub fn footer_content(&mut self, snapshot: Option<&Snapshot>) -> Option<String> {
        let raw = self.footer.as_ref()?;
        Some(Self::render(&self.compiler, raw, snapshot, &self.tags, &mut self.rng))
    }

    fn render(
        compiler: &PassageCompiler,
        raw: &RawPassage,
        snapshot: Option<&Snapshot>,
        tags: &TagIndex,
        rng: &mut StdRng,
    ) -> String {
        let empty = Snapshot::new();
        compiler.render(raw, snapshot.unwrap_or(&empty), &[], tags, rng)
    }
}

impl StoryEngineBuilder {
    /// Provide passage records directly (for testing without files).
    pub fn passages(mut self, passages: Vec<RawPassage>) -> Self {
        self.passages.extend(passages);
        self
    }

    /// A RON file holding a list of passages, or a directory of them.
    pub fn passages_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.passages_path = Some(path.into());
        self
    }

    /// Provide a config directly (for testing without files).
    pub fn config(mut self, config: StoryConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Seed the story RNG, overriding any seed in the config.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Use this RNG instead of seeding one.
    pub fn rng(mut self, rng: StdRng) -> Self {
        self.rng = Some(rng);
        self
    }

    pub fn build(self) -> Result<StoryEngine, StoryError> {
        let config = match (&self.config_path, self.config) {
            (Some(path), _) => StoryConfig::load_from_ron(path)?,
            (None, Some(config)) => config,
            (None, None) => StoryConfig::default(),
        };

        let mut records = self.passages;
        if let Some(ref path) = self.passages_path {
            if path.is_dir() {
                load_ron_files_from_dir(path, |file| {
                    records.extend(load_passages_ron(file)?);
                    Ok(())
                })?;
            } else {
                records.extend(load_passages_ron(path)?);
            }
        }

        let rng = match (self.rng, self.seed.or(config.seed)) {
            (Some(rng), _) => rng,
            (None, Some(seed)) => StdRng::seed_from_u64(seed),
            (None, None) => StdRng::from_entropy(),
        };

        let mut passages = FxHashMap::default();
        let mut order = Vec::new();
        let mut header = None;
        let mut footer = None;
        let mut tags = TagIndex::default();

        for record in records {
            tags.insert(record.name.clone(), record.tags.clone());
            if record.has_tag(&config.header_tag) {
                header.get_or_insert(record);
                continue;
            }
            if record.has_tag(&config.footer_tag) {
                footer.get_or_insert(record);
                continue;
            }
            if !passages.contains_key(&record.name) {
                order.push(record.name.clone());
            } else {
                log::debug!("duplicate passage `{}`, later definition wins", record.name);
            }
            passages.insert(record.name.clone(), record);
        }

        if passages.is_empty() {
            return Err(StoryError::NoPassages);
        }

        log::debug!(
            "story loaded: {} passages, header: {}, footer: {}",
            passages.len(),
            header.is_some(),
            footer.is_some()
        );

        Ok(StoryEngine {
            passages,
            order,
            header,
            footer,
            tags,
            compiler: PassageCompiler::from_config(&config)?,
            config,
            rng,
            cache: FxHashMap::default(),
        })
    }
}

/// Parse a RON list of passage records.
pub fn parse_passages_ron(input: &str) -> Result<Vec<RawPassage>, StoryError> {
    Ok(ron::from_str(input)?)
}

pub fn load_passages_ron(path: &Path) -> Result<Vec<RawPassage>, StoryError> {
    let contents = std::fs::read_to_string(path)?;
    parse_passages_ron(&contents)
}

/// Load all .ron files from a directory, calling `loader` for each.
/// Files are visited in name order.
fn load_ron_files_from_dir<F>(dir: &Path, mut loader: F) -> Result<(), StoryError>
where
    F: FnMut(&Path) -> Result<(), StoryError>,
{
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|s| s.to_str()) == Some("ron") {
            paths.push(path);
        }
    }
    paths.sort();
    for path in paths {
        loader(&path)?;
    }
    Ok(())
}
