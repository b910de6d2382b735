/// Passage compiler: a raw body, a snapshot and a visit log compile to a rendered
/// passage with choices and a state diff.

use rand::RngCore;

use super::conditional::{reduce_chains, remove_orphans};
use super::config::{ConfigError, StoryConfig};
use super::context::EvalContext;
use super::filter::FilterPass;
use super::links::{extract_choices, strip_links};
use super::print::{resolve_prints, substitute_vars};
use super::scanner::scan_balanced;
use super::store::{execute_top_level_sets, strip_sets, VariableStore};
use crate::schema::passage::{Choice, Passage, RawPassage, TagIndex};
use crate::schema::value::Snapshot;

/// Compiles one passage at a time. Holds no per-passage state: every call
/// builds its own [`VariableStore`] from the snapshot it is given.
#[derive(Debug, Clone)]
pub struct PassageCompiler {
    filters: FilterPass,
    max_reductions: usize,
    max_depth: usize,
}

impl Default for PassageCompiler {
    fn default() -> Self {
        Self {
            filters: FilterPass::default(),
            max_reductions: 1000,
            max_depth: 64,
        }
    }
}

/// Result of cleaning a body, before it is packaged as a [`Passage`].
struct Cleaned {
    content: String,
    choices: Vec<Choice>,
    store: VariableStore,
}

impl PassageCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &StoryConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            filters: FilterPass::compile(&config.filters)?,
            max_reductions: config.max_reductions.max(1),
            max_depth: config.max_depth,
        })
    }

    pub fn with_max_depth(mut self, max: usize) -> Self {
        self.max_depth = max;
        self
    }

    pub fn with_max_reductions(mut self, max: usize) -> Self {
        self.max_reductions = max.max(1);
        self
    }

    pub fn compile(
        &self,
        raw: &RawPassage,
        snapshot: &Snapshot,
        visits: &[String],
        tags: &TagIndex,
        rng: &mut dyn RngCore,
    ) -> Passage {
        let cleaned = self.clean(&raw.raw_body, snapshot, visits, tags, rng);
        let state_changes = cleaned.store.changes_since(snapshot);
        log::debug!(
            "compiled passage `{}`: {} choices, {} changed variables",
            raw.name,
            cleaned.choices.len(),
            state_changes.len()
        );
        Passage {
            name: raw.name.clone(),
            content: cleaned.content,
            choices: cleaned.choices,
            tags: raw.tags.clone(),
            state_changes,
        }
    }

    /// Rendered content only, for header and footer passages.
    pub fn render(
        &self,
        raw: &RawPassage,
        snapshot: &Snapshot,
        visits: &[String],
        tags: &TagIndex,
        rng: &mut dyn RngCore,
    ) -> String {
        self.clean(&raw.raw_body, snapshot, visits, tags, rng).content
    }

    fn clean(
        &self,
        body: &str,
        snapshot: &Snapshot,
        visits: &[String],
        tags: &TagIndex,
        rng: &mut dyn RngCore,
    ) -> Cleaned {
        let mut store = VariableStore::from_snapshot(snapshot);

        let text = execute_top_level_sets(body, &mut store, rng);
        let intermediate = {
            let mut ctx = EvalContext::new(&mut store, visits, tags, rng)
                .with_max_reductions(self.max_reductions)
                .with_max_depth(self.max_depth);
            let reduced = reduce_chains(&text, &mut ctx);
            remove_orphans(&reduced, self.max_reductions)
        };

        // choices come from the reduced text, before links are stripped
        let choices = extract_choices(&intermediate);

        let text = strip_links(&intermediate);
        let text = collapse_groups(&text);
        let text = strip_sets(&text);
        let text = {
            let mut ctx = EvalContext::new(&mut store, visits, tags, rng)
                .with_max_reductions(self.max_reductions);
            resolve_prints(&text, &mut ctx)
        };
        let text = substitute_vars(&text, &store);
        let text = if self.filters.is_empty() {
            text
        } else {
            self.filters.apply(&text)
        };

        Cleaned {
            content: normalize_whitespace(&text),
            choices,
            store,
        }
    }
}

/// Replace each `{ ... }` group with its contents, whitespace runs
/// collapsed to single spaces. Unbalanced braces are left as text.
pub fn collapse_groups(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut i = 0;
    let bytes = text.as_bytes();
    while i < bytes.len() {
        if bytes[i] != b'{' {
            i += 1;
            continue;
        }
        match scan_balanced(text, i, "{") {
            Some(end) => {
                let inner = collapse_groups(&text[i + 1..end - 1]);
                out.push_str(&text[copied..i]);
                out.push_str(&inner.split_whitespace().collect::<Vec<_>>().join(" "));
                copied = end;
                i = end;
            }
            None => i += 1,
        }
    }
    out.push_str(&text[copied..]);
    out
}

/// Trim, strip trailing spaces from lines and keep at most one blank
/// line between paragraphs.
pub fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.trim().lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        if !out.is_empty() || !line.is_empty() {
            out.push_str(line);
            out.push('\n');
        }
    }
    out.truncate(out.trim_end().len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::value::Value;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn compile_with(body: &str, snapshot: &Snapshot, visits: &[String]) -> Passage {
        let compiler = PassageCompiler::new();
        let mut rng = StdRng::seed_from_u64(11);
        let tags = TagIndex::default();
        compiler.compile(&RawPassage::new("Test", body), snapshot, visits, &tags, &mut rng)
    }

    fn compile(body: &str) -> Passage {
        compile_with(body, &Snapshot::new(), &[])
    }

    #[test]
    fn score_scenario() {
        let passage = compile("(set: $score to 50)(if: $score > 30)[High][Low]");
        assert_eq!(passage.content, "High");
        assert_eq!(passage.state_changes.len(), 1);
        assert_eq!(passage.state_changes["score"], Value::Number(50.0));
    }

    #[test]
    fn items_scenario() {
        let passage =
            compile("(set: $items to (a: \"sword\",\"shield\"))You have a (print: $items's 1).");
        assert!(passage.content.ends_with("You have a sword."));
        assert_eq!(
            passage.state_changes["items"],
            Value::text_list(["sword", "shield"])
        );
    }

    #[test]
    fn choices_follow_selected_branch() {
        let body = "(if: $key)[[[Open the door->Vault]]](else:)[[[Knock->Door]]]\n[[Leave|Street]]";
        let mut snapshot = Snapshot::new();
        snapshot.insert("key".to_string(), Value::Boolean(true));
        let with_key = compile_with(body, &snapshot, &[]);
        assert_eq!(
            with_key.choices,
            vec![Choice::new("Open the door", "Vault"), Choice::new("Leave", "Street")]
        );
        assert_eq!(with_key.content, "");

        let without = compile(body);
        assert_eq!(
            without.choices,
            vec![Choice::new("Knock", "Door"), Choice::new("Leave", "Street")]
        );
    }

    #[test]
    fn unchanged_variables_are_not_reported() {
        let mut snapshot = Snapshot::new();
        snapshot.insert("gold".to_string(), Value::Number(5.0));
        snapshot.insert("name".to_string(), Value::text("Ada"));
        let passage = compile_with(
            "(set: $gold to 5)(set: $gold to it + 1)Hi $name.",
            &snapshot,
            &[],
        );
        assert_eq!(passage.content, "Hi Ada.");
        assert_eq!(passage.state_changes.len(), 1);
        assert_eq!(passage.state_changes["gold"], Value::Number(6.0));
        assert_eq!(snapshot["gold"], Value::Number(5.0));
    }

    #[test]
    fn nested_sets_wait_for_their_branch() {
        let body = "[(set: $hidden to 1)]x(if: false)[(set: $skipped to 1)](else:)[(set: $taken to 1)]";
        let passage = compile(body);
        assert!(passage.state_changes.contains_key("taken"));
        assert!(!passage.state_changes.contains_key("hidden"));
        assert!(!passage.state_changes.contains_key("skipped"));
        assert_eq!(passage.content, "[]x");
    }

    #[test]
    fn visited_guard_in_passage() {
        let visits = vec!["Cellar".to_string()];
        let passage = compile_with(
            "(visited: \"Cellar\")[You smell damp.](visited: \"Attic\")[Dusty.] Onward.",
            &Snapshot::new(),
            &visits,
        );
        assert_eq!(passage.content, "You smell damp. Onward.");
    }

    #[test]
    fn orphans_and_groups_are_cleaned() {
        let passage = compile("{Line   one\n   two}(else:)[never]\n\n\n\nEnd");
        assert_eq!(passage.content, "Line one two\n\nEnd");
    }

    #[test]
    fn undefined_inline_var_is_left() {
        assert_eq!(compile("Hi $stranger.").content, "Hi $stranger.");
    }

    #[test]
    fn compile_is_idempotent() {
        let body = "(set: $n to $n + 1)(if: $n > 1)[again](else:)[first] [[Next]]";
        let mut snapshot = Snapshot::new();
        snapshot.insert("n".to_string(), Value::Number(1.0));
        let a = compile_with(body, &snapshot, &[]);
        let b = compile_with(body, &snapshot, &[]);
        assert_eq!(a.content, b.content);
        assert_eq!(a.state_changes, b.state_changes);
        assert_eq!(a.content, "again");
    }

    #[test]
    fn filters_run_before_normalisation() {
        let config = StoryConfig::parse_ron(
            r#"(filters: [StripBetween(start: "Stats:", end: "|")])"#,
        )
        .unwrap();
        let compiler = PassageCompiler::from_config(&config).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let passage = compiler.compile(
            &RawPassage::new("P", "Stats: HP 3 | \n\n\nThe hall."),
            &Snapshot::new(),
            &[],
            &TagIndex::default(),
            &mut rng,
        );
        assert_eq!(passage.content, "The hall.");
    }

    #[test]
    fn whitespace_normalisation() {
        assert_eq!(normalize_whitespace("  a  \n\n\n\nb\n"), "a\n\nb");
        assert_eq!(normalize_whitespace("a\nb"), "a\nb");
        assert_eq!(normalize_whitespace("\n\n"), "");
    }

    #[test]
    fn collapse_nested_and_unbalanced() {
        assert_eq!(collapse_groups("{ a {  b } c }"), "a b c");
        assert_eq!(collapse_groups("x { open"), "x { open");
    }
}
