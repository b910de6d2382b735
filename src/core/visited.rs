/// `(visited: <query>)[<body>]` guards over the visit log.

use super::conditional::{attached_hook, reduce_body};
use super::context::EvalContext;
use super::eval::visited;
use super::expr::{parse_visited_query, VisitedQuery};
use super::scanner::{hook_body, macro_at, Span};

pub const VISITED_HEADS: &[&str] = &["visited", "history"];

/// A located guard: the macro and its hook.
#[derive(Debug, Clone, PartialEq)]
pub struct VisitedGuard {
    /// From `(visited:` through the hook's closing `]`.
    pub span: Span,
    pub query: VisitedQuery,
    pub hook: Span,
}

/// Parse the guard whose `(` sits at `pos`. `None` if the macro is
/// unbalanced, has no argument or is not followed by a hook.
pub fn guard_at(text: &str, pos: usize) -> Option<VisitedGuard> {
    let head = macro_at(text, pos)?;
    if !VISITED_HEADS.iter().any(|n| n.eq_ignore_ascii_case(head.name)) {
        return None;
    }
    let query = parse_visited_query(head.args)?;
    let hook = attached_hook(text, head.span.end)?;
    Some(VisitedGuard {
        span: Span::new(pos, hook.end),
        query,
        hook,
    })
}

/// The text a guard resolves to: its reduced body when the query holds,
/// empty otherwise.
pub fn resolve_guard(guard: &VisitedGuard, text: &str, ctx: &mut EvalContext) -> String {
    if visited(&guard.query, ctx) {
        log::trace!("visited guard {:?} holds", guard.query);
        reduce_body(hook_body(text, guard.hook), ctx)
    } else {
        String::new()
    }
}
