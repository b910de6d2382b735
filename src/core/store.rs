/// Variable store and the `(set:)` assignment grammar.

use rand::{Rng, RngCore};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

use super::expr::{BinaryOp, Expr, Parser};
use super::lexer::{tokenize, Token, TokenKind};
use super::scanner::{bracket_depth_at, find_macro};
use crate::schema::value::{Snapshot, Value};

/// Where an arithmetic or concatenation assignment reads from.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Var(String),
    /// `it`: the variable being assigned.
    It,
}

/// Right-hand side of one `<name> to <value>` command, in the priority
/// order the grammar tries them.
#[derive(Debug, Clone, PartialEq)]
pub enum AssignValue {
    /// `<source> <op> <operand>` with a numeric operand.
    Arithmetic {
        source: Source,
        op: BinaryOp,
        operand: Expr,
    },
    /// `<source> + (a: ...)` or `<source> + (dm: ...)`.
    Concat {
        source: Source,
        items: Vec<Expr>,
        map: bool,
    },
    /// `(a: ...)`.
    List(Vec<Expr>),
    /// `(dm: ...)` as a plain literal always assigns an empty map.
    EmptyMap,
    /// `(random: lo, hi)`, drawn when the assignment runs.
    Random { lo: Expr, hi: Expr },
    Number(f64),
    Boolean(bool),
    /// `$other`: copy that variable's current value.
    Copy(String),
    /// Anything else, quotes stripped.
    Text(String),
}

/// One parsed assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub target: String,
    pub value: AssignValue,
}

/// The live variables of one passage evaluation.
///
/// Seeded by deep copy from the caller's snapshot and mutated in place as
/// assignments execute; the caller's snapshot is never touched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableStore {
    vars: FxHashMap<String, Value>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            vars: snapshot
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name.strip_prefix('$').unwrap_or(name))
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Numeric value of a variable; absent or non-numeric reads as 0.
    pub fn number_or_zero(&self, name: &str) -> f64 {
        self.get(name).and_then(Value::as_number).unwrap_or(0.0)
    }

    /// Variables whose value differs from `before`. Maps compare by size
    /// and per-key equality, everything else by value equality.
    pub fn changes_since(&self, before: &Snapshot) -> BTreeMap<String, Value> {
        self.vars
            .iter()
            .filter(|(name, value)| before.get(name.as_str()) != Some(*value))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// Execute the body of a `(set: ...)` macro: one or more
    /// comma-separated assignments, left to right.
    pub fn execute(&mut self, command: &str, rng: &mut dyn RngCore) {
        let assignments = parse_assignments(command);
        if assignments.is_empty() {
            log::debug!("ignoring malformed assignment: {}", command.trim());
        }
        for assignment in assignments {
            self.apply(assignment, rng);
        }
    }

    pub fn apply(&mut self, assignment: Assignment, rng: &mut dyn RngCore) {
        let Assignment { target, value } = assignment;
        let resolved = match value {
            AssignValue::Arithmetic {
                source,
                op,
                operand,
            } => {
                let lhs = self.number_or_zero(self.source_name(&source, &target));
                let rhs = self.operand(&operand);
                match op.apply(lhs, rhs) {
                    Some(n) => Value::Number(n),
                    None => {
                        log::debug!("division by zero assigning ${}, left unchanged", target);
                        return;
                    }
                }
            }
            AssignValue::Concat { source, items, map } => {
                let current = self.get(self.source_name(&source, &target)).cloned();
                let items: Vec<Value> = items.iter().filter_map(|e| self.literal(e)).collect();
                if map {
                    let mut entries = match current {
                        Some(Value::Map(m)) => m,
                        _ => BTreeMap::new(),
                    };
                    for pair in items.chunks_exact(2) {
                        entries.insert(pair[0].to_string(), pair[1].clone());
                    }
                    Value::Map(entries)
                } else {
                    let mut list = match current {
                        Some(Value::List(l)) => l,
                        _ => Vec::new(),
                    };
                    list.extend(items);
                    Value::List(list)
                }
            }
            AssignValue::List(items) => {
                Value::List(items.iter().filter_map(|e| self.literal(e)).collect())
            }
            AssignValue::EmptyMap => Value::Map(BTreeMap::new()),
            AssignValue::Random { lo, hi } => {
                let (a, b) = (self.operand(&lo) as i64, self.operand(&hi) as i64);
                let (a, b) = if a <= b { (a, b) } else { (b, a) };
                Value::Number(rng.gen_range(a..=b) as f64)
            }
            AssignValue::Number(n) => Value::Number(n),
            AssignValue::Boolean(b) => Value::Boolean(b),
            AssignValue::Copy(name) => match self.get(&name) {
                Some(v) => v.clone(),
                None => Value::Text(format!("${}", name)),
            },
            AssignValue::Text(text) => Value::Text(text),
        };
        log::trace!("set ${} = {:?}", target, resolved);
        self.vars.insert(target, resolved);
    }

    /// A numeric operand: a literal, or a variable read as 0 when absent.
    fn operand(&self, expr: &Expr) -> f64 {
        match expr {
            Expr::Number(n) => *n,
            Expr::Var(name) => self.number_or_zero(name),
            _ => 0.0,
        }
    }

    fn source_name<'s>(&self, source: &'s Source, target: &'s str) -> &'s str {
        match source {
            Source::Var(name) => name,
            Source::It => target,
        }
    }

    /// Value of a list item: literals as written, variables by value.
    fn literal(&self, expr: &Expr) -> Option<Value> {
        match expr {
            Expr::Str(s) => Some(Value::Text(s.clone())),
            Expr::Number(n) => Some(Value::Number(*n)),
            Expr::Bool(b) => Some(Value::Boolean(*b)),
            Expr::Ident(w) => Some(Value::Text(w.clone())),
            Expr::Var(name) => self.get(name).cloned(),
            _ => None,
        }
    }
}

fn source_of(expr: &Expr) -> Option<Source> {
    match expr {
        Expr::Var(name) => Some(Source::Var(name.clone())),
        Expr::It => Some(Source::It),
        _ => None,
    }
}

fn strip_quotes(text: &str) -> String {
    text.chars().filter(|c| *c != '"' && *c != '\'').collect()
}

/// Classify a right-hand side. `raw` is its source text.
fn classify(tokens: &[Token], raw: &str) -> AssignValue {
    let mut parser = Parser::new(raw, tokens);
    let parsed = parser.expr().filter(|_| parser.at_end());

    match parsed {
        Some(Expr::Binary { op, lhs, rhs }) => {
            if let Some(source) = source_of(&lhs) {
                if matches!(*rhs, Expr::Number(_) | Expr::Var(_)) {
                    return AssignValue::Arithmetic {
                        source,
                        op,
                        operand: *rhs,
                    };
                }
                if let (BinaryOp::Add, Expr::Call { name, args }) = (op, &*rhs) {
                    match name.as_str() {
                        "a" | "array" => {
                            return AssignValue::Concat {
                                source,
                                items: args.clone(),
                                map: false,
                            }
                        }
                        "dm" | "datamap" => {
                            return AssignValue::Concat {
                                source,
                                items: args.clone(),
                                map: true,
                            }
                        }
                        _ => {}
                    }
                }
            }
            AssignValue::Text(strip_quotes(raw.trim()))
        }
        Some(Expr::Call { name, args }) if name == "a" || name == "array" => {
            AssignValue::List(args)
        }
        Some(Expr::Call { name, .. }) if name == "dm" || name == "datamap" => {
            AssignValue::EmptyMap
        }
        Some(Expr::Call { name, mut args }) if name == "random" && args.len() == 2 => {
            let hi = args.pop().unwrap_or(Expr::Number(0.0));
            let lo = args.pop().unwrap_or(Expr::Number(0.0));
            AssignValue::Random { lo, hi }
        }
        Some(Expr::Number(n)) => AssignValue::Number(n),
        Some(Expr::Bool(b)) => AssignValue::Boolean(b),
        Some(Expr::Var(name)) => AssignValue::Copy(name),
        _ => AssignValue::Text(strip_quotes(raw.trim())),
    }
}

/// Parse a `(set:)` body into its assignments. Segments that do not start
/// with `$name to` are treated as part of the previous value, so
/// `$msg to Hello, world` stays one assignment.
pub fn parse_assignments(command: &str) -> Vec<Assignment> {
    let tokens = tokenize(command);

    let mut starts = Vec::new();
    let mut depth = 0i32;
    for (i, tok) in tokens.iter().enumerate() {
        match tok.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => depth -= 1,
            TokenKind::Var(_) if depth == 0 => {
                let at_segment_start = i == 0 || tokens[i - 1].kind == TokenKind::Comma;
                if at_segment_start && tokens.get(i + 1).map(|t| &t.kind) == Some(&TokenKind::To) {
                    starts.push(i);
                }
            }
            _ => {}
        }
    }
    if starts.first() != Some(&0) {
        return Vec::new();
    }

    let mut assignments = Vec::new();
    for (n, &start) in starts.iter().enumerate() {
        // the next assignment starts right after its separating comma
        let end = starts.get(n + 1).map(|next| next - 1).unwrap_or(tokens.len());
        let target = match &tokens[start].kind {
            TokenKind::Var(name) => name.clone(),
            _ => continue,
        };
        let rhs = &tokens[start + 2..end];
        if rhs.is_empty() {
            continue;
        }
        let raw = &command[rhs[0].span.start..rhs[rhs.len() - 1].span.end];
        let rebased = rebase(rhs, rhs[0].span.start);
        assignments.push(Assignment {
            target,
            value: classify(&rebased, raw),
        });
    }
    assignments
}

/// Shift token spans so they index into a sub-slice of the source.
fn rebase(tokens: &[Token], offset: usize) -> Vec<Token> {
    tokens
        .iter()
        .map(|t| {
            let mut t = t.clone();
            t.span.start -= offset;
            t.span.end -= offset;
            t
        })
        .collect()
}

const SET_MACRO: &[&str] = &["set"];

/// Execute every `(set:)` outside any `[...]` hook and remove it from
/// the text. Sets inside hooks are left for the branch that owns them.
pub fn execute_top_level_sets(
    text: &str,
    store: &mut VariableStore,
    rng: &mut dyn RngCore,
) -> String {
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut from = 0;
    while let Some(found) = find_macro(text, from, SET_MACRO) {
        if bracket_depth_at(text, found.span.start) == 0 {
            out.push_str(&text[copied..found.span.start]);
            store.execute(found.args, rng);
            copied = found.span.end;
        }
        from = found.span.end;
    }
    out.push_str(&text[copied..]);
    out
}

/// Remove every remaining `(set:)` without executing it.
pub fn strip_sets(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut from = 0;
    while let Some(found) = find_macro(text, from, SET_MACRO) {
        log::trace!("dropping unreached assignment: {}", found.args.trim());
        out.push_str(&text[copied..found.span.start]);
        copied = found.span.end;
        from = found.span.end;
    }
    out.push_str(&text[copied..]);
    out
}
