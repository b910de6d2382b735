//! Harlowe Engine: an interpreter for Harlowe-style hypertext fiction.
//!
//! Compiles raw passage markup against a caller-held variable snapshot and
//! visit log: assignments run, conditional chains and visited guards
//! resolve, prints render, and links become choices. The result is the
//! rendered passage text plus the variables it changed.

pub mod core;
pub mod schema;

pub use crate::core::compiler::PassageCompiler;
pub use crate::core::config::{ConfigError, StoryConfig};
pub use crate::core::pipeline::{StoryEngine, StoryEngineBuilder, StoryError};
pub use crate::schema::passage::{Choice, Passage, RawPassage, TagIndex, VisitLog};
pub use crate::schema::value::{Snapshot, Value};
