/// Expression AST and recursive-descent parser.
///
/// Two grammars share one token stream:
///
/// - **Operands** (print arguments, comparison sides, assignment values):
///   ```text
///   expr    := term (('+' | '-') term)*
///   term    := unary (('*' | '/' | '%') unary)*
///   unary   := '-' unary | postfix
///   postfix := primary ("'s" index)*
///   primary := number | string | true | false | it | $var | ident
///            | '(' ident ':' args ')' | '(' expr ')'
///   ```
/// - **Conditions** (`(if:)`, `(else-if:)`), resolved by rule priority
///   rather than operator precedence. First matching rule wins:
///   1. leading `not` negates the whole remainder
///   2. a parenthesised group spanning everything is unwrapped
///   3. `and` at depth 0 splits into parts that must all hold
///   4. `or` at depth 0 splits into parts of which any must hold
///   5. a comparison, word operators (`is`, `is not`, `contains`,
///      `does not contain`) taking priority over `>=`, `<=`, `>`, `<`
///   6. a bare operand tested for truthiness

use super::lexer::{tokenize, Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    fn from_token(kind: &TokenKind) -> Option<Self> {
        match kind {
            TokenKind::Plus => Some(Self::Add),
            TokenKind::Minus => Some(Self::Sub),
            TokenKind::Star => Some(Self::Mul),
            TokenKind::Slash => Some(Self::Div),
            TokenKind::Percent => Some(Self::Mod),
            _ => None,
        }
    }

    /// Apply the operator. Division and modulo of two integral operands
    /// truncate toward zero. Division by zero yields `None`.
    pub fn apply(self, a: f64, b: f64) -> Option<f64> {
        let integral = a.fract() == 0.0 && b.fract() == 0.0;
        match self {
            Self::Add => Some(a + b),
            Self::Sub => Some(a - b),
            Self::Mul => Some(a * b),
            Self::Div if b == 0.0 => None,
            Self::Div if integral => Some((a / b).trunc()),
            Self::Div => Some(a / b),
            Self::Mod if b == 0.0 => None,
            Self::Mod => Some(a % b),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Is,
    IsNot,
    Contains,
    DoesNotContain,
    Gt,
    Lt,
    Gte,
    Lte,
}

impl CompareOp {
    fn from_token(kind: &TokenKind) -> Option<Self> {
        match kind {
            TokenKind::Is => Some(Self::Is),
            TokenKind::IsNot => Some(Self::IsNot),
            TokenKind::Contains => Some(Self::Contains),
            TokenKind::DoesNotContain => Some(Self::DoesNotContain),
            TokenKind::Gt => Some(Self::Gt),
            TokenKind::Lt => Some(Self::Lt),
            TokenKind::Gte => Some(Self::Gte),
            TokenKind::Lte => Some(Self::Lte),
            _ => None,
        }
    }

    fn is_word(self) -> bool {
        matches!(
            self,
            Self::Is | Self::IsNot | Self::Contains | Self::DoesNotContain
        )
    }
}

/// What a `(visited: ...)` guard asks about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisitedQuery {
    /// A passage name, quoted or bare.
    Passage(String),
    /// `where its tags contains "tag"`.
    TagContains(String),
}

/// An operand expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    /// A bare word, e.g. `last` or an unquoted text value.
    Ident(String),
    Var(String),
    /// The variable currently being assigned.
    It,
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// A macro call in expression position: `(random: 1, 6)`, `(a: ...)`.
    Call { name: String, args: Vec<Expr> },
    Visited(VisitedQuery),
    /// `$list's index`.
    Possessive { object: Box<Expr>, index: Box<Expr> },
}

/// A boolean condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Not(Box<Condition>),
    All(Vec<Condition>),
    Any(Vec<Condition>),
    Compare { op: CompareOp, lhs: Expr, rhs: Expr },
    Truthy(Expr),
    /// Source that could not be parsed; always false.
    Invalid(String),
}

/// Cursor over a token slice of `src`.
pub(crate) struct Parser<'a> {
    src: &'a str,
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(src: &'a str, tokens: &'a [Token]) -> Self {
        Self {
            src,
            tokens,
            pos: 0,
        }
    }

    fn peek(&self) -> Option<&'a TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn peek_at(&self, ahead: usize) -> Option<&'a TokenKind> {
        self.tokens.get(self.pos + ahead).map(|t| &t.kind)
    }

    fn bump(&mut self) -> Option<&'a TokenKind> {
        let tok = self.peek();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub(crate) fn expr(&mut self) -> Option<Expr> {
        let mut lhs = self.term()?;
        while let Some(op @ (BinaryOp::Add | BinaryOp::Sub)) =
            self.peek().and_then(BinaryOp::from_token)
        {
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Some(lhs)
    }

    fn term(&mut self) -> Option<Expr> {
        let mut lhs = self.unary()?;
        while let Some(op @ (BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod)) =
            self.peek().and_then(BinaryOp::from_token)
        {
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Some(lhs)
    }

    fn unary(&mut self) -> Option<Expr> {
        if self.eat(&TokenKind::Minus) {
            return match self.unary()? {
                Expr::Number(n) => Some(Expr::Number(-n)),
                other => Some(Expr::Neg(Box::new(other))),
            };
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Option<Expr> {
        let mut object = self.primary()?;
        while self.eat(&TokenKind::Possessive) {
            let index = self.primary()?;
            object = Expr::Possessive {
                object: Box::new(object),
                index: Box::new(index),
            };
        }
        Some(object)
    }

    fn primary(&mut self) -> Option<Expr> {
        match self.bump()? {
            TokenKind::Number(n) => Some(Expr::Number(*n)),
            TokenKind::Str(s) => Some(Expr::Str(s.clone())),
            TokenKind::True => Some(Expr::Bool(true)),
            TokenKind::False => Some(Expr::Bool(false)),
            TokenKind::It => Some(Expr::It),
            TokenKind::Var(name) => Some(Expr::Var(name.clone())),
            TokenKind::Ident(word) => Some(Expr::Ident(word.clone())),
            TokenKind::LParen => {
                if let (Some(TokenKind::Ident(name)), Some(TokenKind::Colon)) =
                    (self.peek(), self.peek_at(1))
                {
                    self.pos += 2;
                    return self.call(name);
                }
                let inner = self.expr()?;
                self.eat(&TokenKind::RParen).then_some(inner)
            }
            _ => None,
        }
    }

    /// Parse call arguments after `(name:` through the closing `)`.
    fn call(&mut self, name: &str) -> Option<Expr> {
        let name = name.to_ascii_lowercase();
        let args_start = self.pos;
        let close = matching_paren(self.tokens, args_start - 3)?;

        if name == "visited" || name == "history" {
            let query = visited_query(self.src, &self.tokens[args_start..close])?;
            self.pos = close + 1;
            return Some(Expr::Visited(query));
        }

        let mut args = Vec::new();
        if self.pos < close {
            loop {
                args.push(self.expr()?);
                if self.eat(&TokenKind::Comma) {
                    // trailing comma before `)` is tolerated
                    if self.pos == close {
                        break;
                    }
                    continue;
                }
                break;
            }
        }
        if self.pos != close {
            return None;
        }
        self.pos = close + 1;
        Some(Expr::Call { name, args })
    }
}

/// Index of the `)` matching the `(` at `open`.
fn matching_paren(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, tok) in tokens.iter().enumerate().skip(open) {
        match tok.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split `tokens` on every depth-0 occurrence of `sep`.
fn split_top<'t>(tokens: &'t [Token], sep: &TokenKind) -> Vec<&'t [Token]> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, tok) in tokens.iter().enumerate() {
        match &tok.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => depth -= 1,
            kind if depth == 0 && kind == sep => {
                parts.push(&tokens[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&tokens[start..]);
    parts
}

/// Source text covered by a token slice.
fn source_of<'s>(src: &'s str, tokens: &[Token]) -> &'s str {
    match (tokens.first(), tokens.last()) {
        (Some(first), Some(last)) => &src[first.span.start..last.span.end],
        _ => "",
    }
}

fn visited_query(src: &str, tokens: &[Token]) -> Option<VisitedQuery> {
    match tokens {
        [] => None,
        [Token {
            kind: TokenKind::Str(name),
            ..
        }] => Some(VisitedQuery::Passage(name.clone())),
        [Token {
            kind: TokenKind::Ident(w),
            ..
        }, Token {
            kind: TokenKind::Ident(its),
            ..
        }, Token {
            kind: TokenKind::Ident(tags),
            ..
        }, Token {
            kind: TokenKind::Contains,
            ..
        }, Token {
            kind: TokenKind::Str(tag),
            ..
        }] if w == "where" && its == "its" && tags == "tags" => {
            Some(VisitedQuery::TagContains(tag.clone()))
        }
        _ => Some(VisitedQuery::Passage(source_of(src, tokens).trim().to_string())),
    }
}

/// Parse a whole token slice as one operand. `None` if anything is left
/// over or malformed.
fn operand(src: &str, tokens: &[Token]) -> Option<Expr> {
    if tokens.is_empty() {
        return None;
    }
    let mut parser = Parser::new(src, tokens);
    let expr = parser.expr()?;
    parser.at_end().then_some(expr)
}

/// True if `tokens` is `( ... )` with the outer pair spanning all of it
/// and it is not itself a macro call.
fn fully_wrapped(tokens: &[Token]) -> bool {
    if tokens.len() < 2 || tokens[0].kind != TokenKind::LParen {
        return false;
    }
    if matches!(
        (tokens.get(1).map(|t| &t.kind), tokens.get(2).map(|t| &t.kind)),
        (Some(TokenKind::Ident(_)), Some(TokenKind::Colon))
    ) {
        return false;
    }
    matching_paren(tokens, 0) == Some(tokens.len() - 1)
}

fn condition(src: &str, tokens: &[Token]) -> Condition {
    if tokens.is_empty() {
        return Condition::Invalid(String::new());
    }

    if tokens[0].kind == TokenKind::Not {
        return Condition::Not(Box::new(condition(src, &tokens[1..])));
    }

    if fully_wrapped(tokens) {
        return condition(src, &tokens[1..tokens.len() - 1]);
    }

    let parts = split_top(tokens, &TokenKind::And);
    if parts.len() > 1 {
        return Condition::All(parts.into_iter().map(|p| condition(src, p)).collect());
    }

    let parts = split_top(tokens, &TokenKind::Or);
    if parts.len() > 1 {
        return Condition::Any(parts.into_iter().map(|p| condition(src, p)).collect());
    }

    if let Some((at, op)) = find_comparison(tokens) {
        let lhs = operand(src, &tokens[..at]);
        let rhs = operand(src, &tokens[at + 1..]);
        return match (lhs, rhs) {
            (Some(lhs), Some(rhs)) => Condition::Compare { op, lhs, rhs },
            _ => Condition::Invalid(source_of(src, tokens).to_string()),
        };
    }

    match operand(src, tokens) {
        Some(expr) => Condition::Truthy(expr),
        None => Condition::Invalid(source_of(src, tokens).to_string()),
    }
}

/// The first depth-0 word operator, else the first depth-0 symbol one.
fn find_comparison(tokens: &[Token]) -> Option<(usize, CompareOp)> {
    let mut depth = 0i32;
    let mut symbol = None;
    for (i, tok) in tokens.iter().enumerate() {
        match tok.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => depth -= 1,
            ref kind if depth == 0 => {
                if let Some(op) = CompareOp::from_token(kind) {
                    if op.is_word() {
                        return Some((i, op));
                    }
                    if symbol.is_none() {
                        symbol = Some((i, op));
                    }
                }
            }
            _ => {}
        }
    }
    symbol
}

/// Parse a condition from raw macro argument text.
pub fn parse_condition(src: &str) -> Condition {
    let tokens = tokenize(src);
    condition(src, &tokens)
}

/// Parse a single operand expression from raw text.
pub fn parse_expr(src: &str) -> Option<Expr> {
    let tokens = tokenize(src);
    operand(src, &tokens)
}

/// Parse the argument of a `(visited: ...)` macro.
pub fn parse_visited_query(src: &str) -> Option<VisitedQuery> {
    let tokens = tokenize(src);
    visited_query(src, &tokens)
}

/// True if the text contains any comparison operator token.
pub fn has_comparison(src: &str) -> bool {
    tokenize(src).iter().any(|t| t.kind.is_comparison())
}
