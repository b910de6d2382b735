/// Evaluation of parsed conditions and operand expressions against a live
/// [`EvalContext`].
///
/// Nothing here fails: undefined variables, type mismatches and malformed
/// operands evaluate to `None` (no value) or `false`.

use rand::Rng;
use std::collections::BTreeMap;

use super::context::EvalContext;
use super::expr::{parse_condition, BinaryOp, CompareOp, Condition, Expr, VisitedQuery};
use crate::schema::value::Value;

/// Parse and evaluate raw condition text.
pub fn condition_holds(src: &str, ctx: &mut EvalContext) -> bool {
    let holds = evaluate_condition(&parse_condition(src), ctx);
    log::trace!("condition `{}` -> {}", src.trim(), holds);
    holds
}

pub fn evaluate_condition(cond: &Condition, ctx: &mut EvalContext) -> bool {
    match cond {
        Condition::Not(inner) => !evaluate_condition(inner, ctx),
        // every part is evaluated, no short-circuit
        Condition::All(parts) => {
            let results: Vec<bool> = parts.iter().map(|p| evaluate_condition(p, ctx)).collect();
            results.into_iter().all(|r| r)
        }
        Condition::Any(parts) => {
            let results: Vec<bool> = parts.iter().map(|p| evaluate_condition(p, ctx)).collect();
            results.into_iter().any(|r| r)
        }
        Condition::Compare { op, lhs, rhs } => compare(*op, lhs, rhs, ctx),
        Condition::Truthy(expr) => truthy(expr, ctx),
        Condition::Invalid(src) => {
            if !src.is_empty() {
                log::debug!("unparseable condition `{}` is false", src);
            }
            false
        }
    }
}

fn truthy(expr: &Expr, ctx: &mut EvalContext) -> bool {
    match expr {
        // a bare word names a variable, `$` optional
        Expr::Ident(name) => ctx.store.get(name).is_some_and(Value::is_truthy),
        other => evaluate(other, ctx).is_some_and(|v| v.is_truthy()),
    }
}

fn compare(op: CompareOp, lhs: &Expr, rhs: &Expr, ctx: &mut EvalContext) -> bool {
    let left = evaluate(lhs, ctx);
    let right = evaluate(rhs, ctx);
    match op {
        CompareOp::Contains => contains(left.as_ref(), right.as_ref()),
        CompareOp::DoesNotContain => !contains(left.as_ref(), right.as_ref()),
        CompareOp::Is => equals(left.as_ref(), right.as_ref()),
        CompareOp::IsNot => !equals(left.as_ref(), right.as_ref()),
        CompareOp::Gt | CompareOp::Lt | CompareOp::Gte | CompareOp::Lte => {
            let (Some(a), Some(b)) = (
                left.as_ref().and_then(Value::as_number),
                right.as_ref().and_then(Value::as_number),
            ) else {
                return false;
            };
            match op {
                CompareOp::Gt => a > b,
                CompareOp::Lt => a < b,
                CompareOp::Gte => a >= b,
                _ => a <= b,
            }
        }
    }
}

fn contains(haystack: Option<&Value>, needle: Option<&Value>) -> bool {
    match (haystack, needle) {
        (Some(h), Some(n)) => h.contains(n),
        _ => false,
    }
}

fn equals(left: Option<&Value>, right: Option<&Value>) -> bool {
    match (left, right) {
        (Some(a), Some(b)) => a.loose_eq(b),
        _ => false,
    }
}

/// Evaluate an operand to a value. `None` means undefined.
pub fn evaluate(expr: &Expr, ctx: &mut EvalContext) -> Option<Value> {
    match expr {
        Expr::Number(n) => Some(Value::Number(*n)),
        Expr::Str(s) => Some(Value::Text(s.clone())),
        Expr::Bool(b) => Some(Value::Boolean(*b)),
        Expr::Ident(word) => Some(Value::Text(word.clone())),
        Expr::Var(name) => ctx.store.get(name).cloned(),
        Expr::It => None,
        Expr::Neg(inner) => numeric(inner, ctx).map(|n| Value::Number(-n)),
        Expr::Binary { op, lhs, rhs } => binary(*op, lhs, rhs, ctx),
        Expr::Call { name, args } => call(name, args, ctx),
        Expr::Visited(query) => Some(Value::Boolean(visited(query, ctx))),
        Expr::Possessive { object, index } => {
            let object = evaluate(object, ctx)?;
            possessive(&object, index, ctx)
        }
    }
}

/// Numeric view of an operand. Undefined or non-numeric is `None`.
pub fn numeric(expr: &Expr, ctx: &mut EvalContext) -> Option<f64> {
    evaluate(expr, ctx)?.as_number()
}

pub fn visited(query: &VisitedQuery, ctx: &EvalContext) -> bool {
    match query {
        VisitedQuery::Passage(name) => ctx.has_visited(name),
        VisitedQuery::TagContains(tag) => ctx.has_visited_tag(tag),
    }
}

fn binary(op: BinaryOp, lhs: &Expr, rhs: &Expr, ctx: &mut EvalContext) -> Option<Value> {
    let left = evaluate(lhs, ctx)?;
    let right = evaluate(rhs, ctx)?;
    if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
        return op.apply(a, b).map(Value::Number);
    }
    if op != BinaryOp::Add {
        return None;
    }
    match (left, right) {
        (Value::List(mut a), Value::List(b)) => {
            a.extend(b);
            Some(Value::List(a))
        }
        (Value::Map(mut a), Value::Map(b)) => {
            a.extend(b);
            Some(Value::Map(a))
        }
        (a @ Value::Text(_), b) | (a, b @ Value::Text(_)) => {
            Some(Value::Text(format!("{}{}", a, b)))
        }
        _ => None,
    }
}

fn call(name: &str, args: &[Expr], ctx: &mut EvalContext) -> Option<Value> {
    match name {
        "random" => {
            let [lo, hi] = args else {
                return None;
            };
            let lo = numeric(lo, ctx)?.trunc() as i64;
            let hi = numeric(hi, ctx)?.trunc() as i64;
            Some(Value::Number(random_between(lo, hi, ctx) as f64))
        }
        "either" => {
            if args.is_empty() {
                return None;
            }
            let pick = ctx.rng.gen_range(0..args.len());
            evaluate(&args[pick], ctx)
        }
        "a" | "array" => Some(Value::List(
            args.iter().filter_map(|a| evaluate(a, ctx)).collect(),
        )),
        "dm" | "datamap" => {
            let items: Vec<Value> = args.iter().filter_map(|a| evaluate(a, ctx)).collect();
            let map: BTreeMap<String, Value> = items
                .chunks_exact(2)
                .map(|pair| (pair[0].to_string(), pair[1].clone()))
                .collect();
            Some(Value::Map(map))
        }
        _ => {
            log::debug!("unsupported macro `({}:)` in expression", name);
            None
        }
    }
}

/// Uniform integer in `[lo, hi]`; reversed bounds are swapped.
pub fn random_between(lo: i64, hi: i64, ctx: &mut EvalContext) -> i64 {
    let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
    ctx.rng.gen_range(lo..=hi)
}

fn possessive(object: &Value, index: &Expr, ctx: &mut EvalContext) -> Option<Value> {
    match (object, index) {
        (Value::List(items), Expr::Ident(word)) => match word.as_str() {
            "last" => items.last().cloned(),
            "first" => items.first().cloned(),
            "length" => Some(Value::Number(items.len() as f64)),
            _ => None,
        },
        (Value::Map(map), Expr::Ident(key) | Expr::Str(key)) => map.get(key).cloned(),
        (Value::Text(text), Expr::Ident(word)) if word == "length" => {
            Some(Value::Number(text.chars().count() as f64))
        }
        (Value::List(_), index) => {
            let n = numeric(index, ctx)?;
            if n.fract() != 0.0 {
                return None;
            }
            object.nth(n as i64).cloned()
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::expr::parse_expr;
    use crate::core::store::VariableStore;
    use crate::schema::passage::TagIndex;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn check(store: &mut VariableStore, src: &str) -> bool {
        let mut rng = StdRng::seed_from_u64(7);
        let tags = TagIndex::default();
        let visits = vec!["Cellar".to_string()];
        let mut ctx = EvalContext::new(store, &visits, &tags, &mut rng);
        condition_holds(src, &mut ctx)
    }

    fn eval(src: &str, ctx: &mut EvalContext<'_>) -> Option<Value> {
        parse_expr(src).and_then(|e| evaluate(&e, ctx))
    }

    fn store_with(pairs: &[(&str, Value)]) -> VariableStore {
        let mut store = VariableStore::new();
        for (k, v) in pairs {
            store.set(*k, v.clone());
        }
        store
    }

    #[test]
    fn numeric_comparisons() {
        let mut store = store_with(&[("x", Value::Number(5.0))]);
        assert!(check(&mut store, "$x > 3"));
        assert!(!check(&mut store, "$x < 3"));
        assert!(check(&mut store, "$x >= 5"));
        assert!(check(&mut store, "$x <= 5"));
        assert!(!check(&mut store, "$x > 5"));
    }

    #[test]
    fn comparisons_fail_closed() {
        let mut store = store_with(&[("word", Value::text("abc"))]);
        assert!(!check(&mut store, "$missing > 0"));
        assert!(!check(&mut store, "$missing < 0"));
        assert!(!check(&mut store, "$word > 0"));
        assert!(!check(&mut store, "$word <= 0"));
    }

    #[test]
    fn text_coerces_to_number() {
        let mut store = store_with(&[("hp", Value::text("12"))]);
        assert!(check(&mut store, "$hp > 10"));
        assert!(check(&mut store, "$hp is 12"));
    }

    #[test]
    fn arithmetic_operand_in_comparison() {
        let mut store = store_with(&[("x", Value::Number(4.0))]);
        assert!(check(&mut store, "($x + 2) > 5"));
        assert!(check(&mut store, "$x * 2 is 8"));
    }

    #[test]
    fn equality() {
        let mut store = store_with(&[
            ("name", Value::text("Ada")),
            ("n", Value::Number(3.0)),
        ]);
        assert!(check(&mut store, "$name is \"Ada\""));
        assert!(check(&mut store, "$name is not \"Bob\""));
        assert!(check(&mut store, "$n is \"3\""));
        assert!(!check(&mut store, "$ghost is 0"));
        assert!(check(&mut store, "$ghost is not 0"));
    }

    #[test]
    fn contains_and_its_negation() {
        let mut store = store_with(&[
            ("items", Value::text_list(["sword", "shield"])),
            ("motto", Value::text("fortune favours")),
        ]);
        assert!(check(&mut store, "$items contains \"sword\""));
        assert!(!check(&mut store, "$items contains \"swo\""));
        assert!(check(&mut store, "$items does not contain \"torch\""));
        assert!(check(&mut store, "$motto contains \"tune\""));
        assert!(!check(&mut store, "$ghost contains \"x\""));
        assert!(check(&mut store, "$ghost does not contain \"x\""));
    }

    #[test]
    fn compound_conditions() {
        let mut store = store_with(&[
            ("a", Value::Number(1.0)),
            ("b", Value::Number(0.0)),
        ]);
        assert!(!check(&mut store, "$a is 1 and $b is 1"));
        assert!(check(&mut store, "$a is 1 or $b is 1"));
        assert!(check(&mut store, "not $b"));
        assert!(check(&mut store, "($a is 1) and not ($b is 1)"));
    }

    #[test]
    fn truthiness() {
        let mut store = store_with(&[
            ("flag", Value::Boolean(true)),
            ("zero", Value::Number(0.0)),
            ("empty", Value::text("")),
            ("list", Value::List(Vec::new())),
        ]);
        assert!(check(&mut store, "$flag"));
        assert!(check(&mut store, "flag"));
        assert!(!check(&mut store, "$zero"));
        assert!(!check(&mut store, "$empty"));
        assert!(check(&mut store, "$list"));
        assert!(!check(&mut store, "$undefined"));
        assert!(check(&mut store, "true"));
        assert!(!check(&mut store, "false"));
    }

    #[test]
    fn visited_inside_condition() {
        let mut store = VariableStore::new();
        assert!(check(&mut store, "(visited: \"Cellar\")"));
        assert!(!check(&mut store, "(visited: \"Attic\")"));
        assert!(check(&mut store, "not (visited: \"Attic\")"));
    }

    #[test]
    fn garbage_is_false() {
        let mut store = VariableStore::new();
        assert!(!check(&mut store, ""));
        assert!(!check(&mut store, "> 3"));
    }

    #[test]
    fn random_is_inclusive_and_swaps_bounds() {
        let mut store = VariableStore::new();
        let mut rng = StdRng::seed_from_u64(42);
        let tags = TagIndex::default();
        let mut ctx = EvalContext::new(&mut store, &[], &tags, &mut rng);
        for _ in 0..200 {
            let n = random_between(6, 1, &mut ctx);
            assert!((1..=6).contains(&n));
        }
        assert_eq!(random_between(3, 3, &mut ctx), 3);
    }

    #[test]
    fn possessive_access() {
        let mut store = store_with(&[("items", Value::text_list(["a", "b", "c"]))]);
        let mut rng = StdRng::seed_from_u64(1);
        let tags = TagIndex::default();
        let mut ctx = EvalContext::new(&mut store, &[], &tags, &mut rng);
        assert_eq!(eval("$items's 2", &mut ctx), Some(Value::text("b")));
        assert_eq!(eval("$items's last", &mut ctx), Some(Value::text("c")));
        assert_eq!(eval("$items's length", &mut ctx), Some(Value::Number(3.0)));
        assert_eq!(eval("$items's 9", &mut ctx), None);
    }

    #[test]
    fn text_concatenation() {
        let mut store = store_with(&[("name", Value::text("Ada"))]);
        let mut rng = StdRng::seed_from_u64(1);
        let tags = TagIndex::default();
        let mut ctx = EvalContext::new(&mut store, &[], &tags, &mut rng);
        assert_eq!(eval("\"Lady \" + $name", &mut ctx), Some(Value::text("Lady Ada")));
    }
}
