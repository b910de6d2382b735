/// Passage Linter: checks a story for broken links, unbalanced macros and
/// naming problems.
///
/// Usage: passage_linter <passages.ron | dir> [--config <path>]

use clap::Parser;
use harlowe_engine::core::config::StoryConfig;
use harlowe_engine::core::links::extract_choices;
use harlowe_engine::core::pipeline::load_passages_ron;
use harlowe_engine::core::scanner::{hook_at, macro_at, macro_head_at};
use harlowe_engine::schema::passage::RawPassage;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "passage_linter")]
#[command(about = "Validate a story's passages before playing them")]
struct Cli {
    /// RON file (or directory of files) holding the passage list
    passages: PathBuf,

    /// Story config in RON
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    env_logger::Builder::from_default_env().init();
    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => match StoryConfig::load_from_ron(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("ERROR: Failed to load config: {}", e);
                process::exit(1);
            }
        },
        None => StoryConfig::default(),
    };

    let mut passages = Vec::new();
    if cli.passages.is_file() {
        match load_passages_ron(&cli.passages) {
            Ok(loaded) => passages.extend(loaded),
            Err(e) => {
                eprintln!("ERROR: Failed to load passage file: {}", e);
                process::exit(1);
            }
        }
    } else if cli.passages.is_dir() {
        load_passages_recursive(&cli.passages, &mut passages);
    } else {
        eprintln!("ERROR: Path '{}' does not exist", cli.passages.display());
        process::exit(1);
    }

    println!("Loaded {} passages", passages.len());

    let (errors, warnings) = lint_passages(&passages, &config);

    println!("\n=== Passage Lint Report ===\n");

    if errors.is_empty() && warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    for error in &errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} errors, {} warnings",
        errors.len(),
        warnings.len()
    );

    if errors.is_empty() {
        process::exit(0);
    } else {
        process::exit(1);
    }
}

fn load_passages_recursive(dir: &Path, passages: &mut Vec<RawPassage>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    let mut paths: Vec<PathBuf> = entries.flatten().map(|entry| entry.path()).collect();
    paths.sort();
    for path in paths {
        if path.is_dir() {
            load_passages_recursive(&path, passages);
        } else if path.extension().and_then(|s| s.to_str()) == Some("ron") {
            match load_passages_ron(&path) {
                Ok(loaded) => {
                    println!("  Loaded: {} ({} passages)", path.display(), loaded.len());
                    passages.extend(loaded);
                }
                Err(e) => {
                    eprintln!("  ERROR loading {}: {}", path.display(), e);
                }
            }
        }
    }
}

fn lint_passages(passages: &[RawPassage], config: &StoryConfig) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for passage in passages {
        *counts.entry(passage.name.as_str()).or_insert(0) += 1;
    }
    let names: HashSet<&str> = counts.keys().copied().collect();

    let mut duplicates: Vec<(&str, usize)> = counts
        .iter()
        .map(|(&name, &n)| (name, n))
        .filter(|&(_, n)| n > 1)
        .collect();
    duplicates.sort();
    for (name, n) in duplicates {
        warnings.push(format!(
            "Passage '{}' is defined {} times; the last definition wins",
            name, n
        ));
    }

    let mut linked: HashSet<String> = HashSet::new();
    for passage in passages {
        if passage.name.trim().is_empty() {
            errors.push("A passage has an empty name".to_string());
        }
        if passage.raw_body.trim().is_empty() {
            warnings.push(format!("Passage '{}' has an empty body", passage.name));
        }

        for choice in extract_choices(&passage.raw_body) {
            if !names.contains(choice.target.as_str()) {
                errors.push(format!(
                    "Passage '{}' links to missing passage '{}'",
                    passage.name, choice.target
                ));
            }
            linked.insert(choice.target);
        }

        for problem in unbalanced_markup(&passage.raw_body) {
            errors.push(format!("Passage '{}': {}", passage.name, problem));
        }
    }

    let is_framing =
        |p: &RawPassage| p.has_tag(&config.header_tag) || p.has_tag(&config.footer_tag);

    let start = match config.start_passage.as_deref() {
        Some(name) if names.contains(name) => Some(name.to_string()),
        Some(name) => {
            errors.push(format!("Configured start passage '{}' does not exist", name));
            None
        }
        None if names.contains("Start") => Some("Start".to_string()),
        None => {
            let first = passages.iter().find(|p| !is_framing(*p));
            if let Some(first) = first {
                warnings.push(format!(
                    "No 'Start' passage; the story will open at '{}'",
                    first.name
                ));
            }
            first.map(|p| p.name.clone())
        }
    };
    if passages.iter().all(is_framing) {
        errors.push("Story has no navigable passages".to_string());
    }

    let mut seen = HashSet::new();
    for passage in passages {
        if !seen.insert(passage.name.as_str()) || is_framing(passage) {
            continue;
        }
        if Some(&passage.name) != start.as_ref() && !linked.contains(&passage.name) {
            warnings.push(format!("Passage '{}' is never linked to", passage.name));
        }
    }

    (errors, warnings)
}

/// Every macro or hook opener in `body` that never closes.
fn unbalanced_markup(body: &str) -> Vec<String> {
    let mut problems = Vec::new();
    let bytes = body.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'(' => {
                if let Some((name, _)) = macro_head_at(body, i) {
                    if macro_at(body, i).is_none() {
                        problems.push(format!("unclosed macro ({}: at byte {}", name, i));
                        break;
                    }
                }
            }
            b'[' => {
                if hook_at(body, i).is_none() {
                    problems.push(format!("unclosed '[' at byte {}", i));
                    break;
                }
            }
            _ => {}
        }
        i += 1;
    }
    problems
}
