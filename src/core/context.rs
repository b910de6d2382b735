/// Evaluation context: the mutable state one passage compile threads
/// through every reduction step.

use rand::RngCore;

use super::store::VariableStore;
use crate::schema::passage::TagIndex;

/// Everything condition and expression evaluation may read or mutate.
pub struct EvalContext<'a> {
    pub store: &'a mut VariableStore,
    /// Passage names visited so far, oldest first.
    pub visits: &'a [String],
    /// Tags of every passage in the story, by passage name.
    pub tags: &'a TagIndex,
    pub rng: &'a mut dyn RngCore,
    /// Upper bound on reduction passes before giving up on a loop.
    pub max_reductions: usize,
    /// Nesting level of the body currently being reduced.
    pub depth: usize,
    pub max_depth: usize,
}

impl<'a> EvalContext<'a> {
    pub fn new(
        store: &'a mut VariableStore,
        visits: &'a [String],
        tags: &'a TagIndex,
        rng: &'a mut dyn RngCore,
    ) -> Self {
        Self {
            store,
            visits,
            tags,
            rng,
            max_reductions: 1000,
            depth: 0,
            max_depth: 64,
        }
    }

    pub fn with_max_reductions(mut self, max: usize) -> Self {
        self.max_reductions = max.max(1);
        self
    }

    pub fn with_max_depth(mut self, max: usize) -> Self {
        self.max_depth = max;
        self
    }

    pub fn has_visited(&self, passage: &str) -> bool {
        self.visits.iter().any(|v| v == passage)
    }

    /// True if any visited passage has a tag containing `tag`.
    pub fn has_visited_tag(&self, tag: &str) -> bool {
        self.visits.iter().any(|name| {
            self.tags
                .get(name)
                .is_some_and(|tags| tags.iter().any(|t| t.contains(tag)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn visited_lookups() {
        let mut store = VariableStore::new();
        let mut rng = StdRng::seed_from_u64(1);
        let visits = vec!["Cellar".to_string(), "Hall".to_string()];
        let mut tags = TagIndex::default();
        tags.insert("Cellar".to_string(), vec!["dark".to_string()]);
        tags.insert("Garden".to_string(), vec!["bright".to_string()]);

        let ctx = EvalContext::new(&mut store, &visits, &tags, &mut rng);
        assert!(ctx.has_visited("Hall"));
        assert!(!ctx.has_visited("hall"));
        assert!(ctx.has_visited_tag("dark"));
        assert!(!ctx.has_visited_tag("bright"));
    }

    #[test]
    fn reduction_cap_is_at_least_one() {
        let mut store = VariableStore::new();
        let mut rng = StdRng::seed_from_u64(1);
        let tags = TagIndex::default();
        let ctx = EvalContext::new(&mut store, &[], &tags, &mut rng).with_max_reductions(0);
        assert_eq!(ctx.max_reductions, 1);
    }
}
