/// Print resolution: `(print:)` macros, bare `(random:)` / `(either:)`
/// macros and inline `$var` substitution.

use super::context::EvalContext;
use super::eval::evaluate;
use super::expr::{has_comparison, parse_expr};
use super::scanner::find_macro;
use super::store::VariableStore;

const PRINTABLE: &[&str] = &["print", "random", "either"];

/// Text a `(print: <expr>)` argument renders to. Comparisons and anything
/// undefined or unparseable render empty.
pub fn render_print(args: &str, ctx: &mut EvalContext) -> String {
    if has_comparison(args) {
        return String::new();
    }
    match parse_expr(args).and_then(|expr| evaluate(&expr, ctx)) {
        Some(value) => value.to_string(),
        None => String::new(),
    }
}

/// Replace every printable macro with its rendered text.
pub fn resolve_prints(text: &str, ctx: &mut EvalContext) -> String {
    let mut out = text.to_string();
    let mut from = 0;
    let mut passes = 0;
    while let Some(found) = find_macro(&out, from, PRINTABLE) {
        if passes >= ctx.max_reductions {
            log::warn!(
                "print resolution stopped after {} macros, leaving the rest",
                passes
            );
            break;
        }
        passes += 1;

        let span = found.span;
        let rendered = if found.name.eq_ignore_ascii_case("print") {
            let args = found.args.to_string();
            render_print(&args, ctx)
        } else {
            // a bare call evaluates as its own expression
            let call = span.slice(&out).to_string();
            render_print(&call, ctx)
        };
        log::trace!("{} -> {:?}", span.slice(&out), rendered);
        out.replace_range(span.start..span.end, &rendered);
        from = span.start + rendered.len();
    }
    out
}

/// Replace `$name` tokens with the variable's text. Undefined names are
/// left as written.
pub fn substitute_vars(text: &str, store: &VariableStore) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'$' {
            i += 1;
            continue;
        }
        let start = i + 1;
        let mut end = start;
        while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
            end += 1;
        }
        if end == start || bytes[start].is_ascii_digit() {
            i = end.max(i + 1);
            continue;
        }
        if let Some(value) = store.get(&text[start..end]) {
            out.push_str(&text[copied..i]);
            out.push_str(&value.to_string());
            copied = end;
        }
        i = end;
    }
    out.push_str(&text[copied..]);
    out
}
