/// Conditional chains: `(if:)[...]`, any number of `(else-if:)[...]`, then
/// an optional `(else:)[...]` or implicit bare `[...]` else.
///
/// Chains are reduced in document order. The selected branch body has its
/// nested chains and guards resolved first, then its remaining top-level
/// assignments run, then its prints render. Unselected bodies are
/// discarded without being evaluated. Bodies nested deeper than
/// `max_depth` are kept as literal text.

use super::context::EvalContext;
use super::eval::condition_holds;
use super::print::resolve_prints;
use super::scanner::{
    find_macro, find_macro_head, hook_at, hook_body, macro_at, macro_head_at, skip_whitespace,
    Span,
};
use super::store::execute_top_level_sets;
use super::visited::{guard_at, resolve_guard, VISITED_HEADS};

const IF_HEADS: &[&str] = &["if"];
const ELSE_IF_HEADS: &[&str] = &["else-if", "elseif"];
const ELSE_HEADS: &[&str] = &["else"];
const ORPHAN_HEADS: &[&str] = &["else-if", "elseif", "else"];
const CHAIN_HEADS: &[&str] = &["if", "visited", "history"];

/// One condition/body pair. `condition` is `None` for an else branch.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub condition: Option<String>,
    pub hook: Span,
}

/// A located chain, from `(if:` through the last consumed hook.
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    pub span: Span,
    pub branches: Vec<Branch>,
}

fn is_named(name: &str, names: &[&str]) -> bool {
    names.iter().any(|n| n.eq_ignore_ascii_case(name))
}

/// The hook attached to a macro ending at `after`, whitespace allowed.
/// A `[[link]]` is not a hook; a `[[[link]]]` is a hook holding one.
pub(crate) fn attached_hook(text: &str, after: usize) -> Option<Span> {
    let start = skip_whitespace(text, after);
    let rest = &text[start..];
    if rest.starts_with("[[") && !rest.starts_with("[[[") {
        return None;
    }
    hook_at(text, start)
}

/// Collect the chain whose `(if:` sits at `pos`. `None` when the `if`
/// itself is unbalanced or has no hook.
pub fn collect_chain(text: &str, pos: usize) -> Option<Chain> {
    let head = macro_at(text, pos)?;
    if !is_named(head.name, IF_HEADS) {
        return None;
    }
    let hook = attached_hook(text, head.span.end)?;
    let mut branches = vec![Branch {
        condition: Some(head.args.to_string()),
        hook,
    }];
    let mut end = hook.end;

    loop {
        let next = skip_whitespace(text, end);
        if let Some(found) = macro_at(text, next) {
            if is_named(found.name, ELSE_IF_HEADS) {
                let Some(hook) = attached_hook(text, found.span.end) else {
                    break;
                };
                branches.push(Branch {
                    condition: Some(found.args.to_string()),
                    hook,
                });
                end = hook.end;
                continue;
            }
            if is_named(found.name, ELSE_HEADS) {
                if let Some(hook) = attached_hook(text, found.span.end) {
                    branches.push(Branch {
                        condition: None,
                        hook,
                    });
                    end = hook.end;
                }
            }
            break;
        }
        // implicit else: a bare hook, never a `[[link]]`
        let rest = &text[next..];
        if rest.starts_with('[') && !rest.starts_with("[[") {
            if let Some(hook) = hook_at(text, next) {
                branches.push(Branch {
                    condition: None,
                    hook,
                });
                end = hook.end;
            }
        }
        break;
    }

    Some(Chain {
        span: Span::new(pos, end),
        branches,
    })
}

/// Index of the first branch that holds, evaluating left to right.
pub fn select_branch(chain: &Chain, ctx: &mut EvalContext) -> Option<usize> {
    chain
        .branches
        .iter()
        .position(|branch| match &branch.condition {
            Some(cond) => condition_holds(cond, ctx),
            None => true,
        })
}

fn resolve_chain(chain: &Chain, text: &str, ctx: &mut EvalContext) -> String {
    match select_branch(chain, ctx) {
        Some(i) => {
            log::trace!(
                "chain at byte {}: branch {} of {} selected",
                chain.span.start,
                i + 1,
                chain.branches.len()
            );
            reduce_body(hook_body(text, chain.branches[i].hook), ctx)
        }
        None => String::new(),
    }
}

/// Reduce a selected body: chains, then top-level sets, then prints.
pub fn reduce_body(body: &str, ctx: &mut EvalContext) -> String {
    if ctx.depth >= ctx.max_depth {
        log::warn!(
            "bodies nested deeper than {} levels are left unresolved",
            ctx.max_depth
        );
        return body.to_string();
    }
    ctx.depth += 1;
    let reduced = reduce_chains(body, ctx);
    let reduced = execute_top_level_sets(&reduced, ctx.store, ctx.rng);
    let reduced = resolve_prints(&reduced, ctx);
    ctx.depth -= 1;
    reduced
}

/// Resolve every `(if:)` chain and `(visited:)` guard, first to last.
/// Malformed ones are skipped and left as text.
pub fn reduce_chains(text: &str, ctx: &mut EvalContext) -> String {
    let mut out = text.to_string();
    let mut from = 0;
    let mut passes = 0;
    while let Some(pos) = find_macro_head(&out, from, CHAIN_HEADS) {
        if passes >= ctx.max_reductions {
            log::warn!(
                "chain reduction stopped after {} passes, leaving the rest unresolved",
                passes
            );
            break;
        }
        passes += 1;

        let is_guard =
            macro_head_at(&out, pos).is_some_and(|(name, _)| is_named(name, VISITED_HEADS));
        let resolved = if is_guard {
            guard_at(&out, pos).map(|guard| (guard.span, resolve_guard(&guard, &out, ctx)))
        } else {
            collect_chain(&out, pos).map(|chain| (chain.span, resolve_chain(&chain, &out, ctx)))
        };

        match resolved {
            Some((span, replacement)) => {
                out.replace_range(span.start..span.end, &replacement);
                from = span.start + replacement.len();
            }
            None => {
                log::debug!("malformed chain at byte {}, left as text", pos);
                from = pos + 1;
            }
        }
    }
    out
}

/// Remove `(else-if:)` / `(else:)` macros and their hooks that no `(if:)`
/// consumed.
pub fn remove_orphans(text: &str, max_passes: usize) -> String {
    let mut out = text.to_string();
    let mut from = 0;
    let mut passes = 0;
    while let Some(found) = find_macro(&out, from, ORPHAN_HEADS) {
        if passes >= max_passes {
            log::warn!("orphan cleanup stopped after {} passes", passes);
            break;
        }
        passes += 1;
        let span = found.span;
        let end = attached_hook(&out, span.end).map_or(span.end, |hook| hook.end);
        log::debug!("removing orphaned branch: {}", &out[span.start..end]);
        out.replace_range(span.start..end, "");
        from = span.start;
    }
    out
}
