/// Tokenizer for macro argument text: conditions, assignments and print
/// expressions.
///
/// Keyword operators are folded into single tokens (`is not`,
/// `does not contain`) so the parser never has to look at raw words.

use super::scanner::Span;
use crate::schema::value::parse_number;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Str(String),
    /// `$name`, stored without the sigil.
    Var(String),
    Ident(String),

    True,
    False,
    It,
    To,
    Is,
    IsNot,
    Not,
    Contains,
    DoesNotContain,
    And,
    Or,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Lt,
    Gt,
    Lte,
    Gte,

    LParen,
    RParen,
    Comma,
    Colon,
    /// `'s` possessive access.
    Possessive,

    Unknown(char),
}

impl TokenKind {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Self::Is
                | Self::IsNot
                | Self::Contains
                | Self::DoesNotContain
                | Self::Lt
                | Self::Gt
                | Self::Lte
                | Self::Gte
        )
    }

    /// Tokens after which `'s` reads as possessive rather than a quote.
    fn ends_operand(&self) -> bool {
        matches!(
            self,
            Self::Var(_) | Self::Ident(_) | Self::RParen | Self::Str(_) | Self::It
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

struct Lexer<'a> {
    input: &'a str,
    chars: Vec<(usize, char)>,
    i: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().collect(),
            i: 0,
            tokens: Vec::new(),
        }
    }

    fn offset(&self, i: usize) -> usize {
        self.chars.get(i).map(|(o, _)| *o).unwrap_or(self.input.len())
    }

    fn peek(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.i + ahead).map(|(_, c)| *c)
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        let span = Span::new(self.offset(start), self.offset(self.i));
        self.tokens.push(Token { kind, span });
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) {
        while let Some(c) = self.peek(0) {
            if !pred(c) {
                break;
            }
            self.i += 1;
        }
    }

    /// Word at char index `at` (skipping whitespace), with its end index.
    fn word_after(&self, at: usize) -> Option<(&'a str, usize)> {
        let mut j = at;
        while self.chars.get(j).is_some_and(|(_, c)| c.is_whitespace()) {
            j += 1;
        }
        let start = j;
        while self.chars.get(j).is_some_and(|(_, c)| is_ident_char(*c)) {
            j += 1;
        }
        if j == start {
            return None;
        }
        let input = self.input;
        Some((&input[self.offset(start)..self.offset(j)], j))
    }

    fn run(mut self) -> Vec<Token> {
        while let Some(c) = self.peek(0) {
            let start = self.i;
            if c.is_whitespace() {
                self.i += 1;
                continue;
            }
            match c {
                '$' => {
                    self.i += 1;
                    let name_start = self.i;
                    self.take_while(is_ident_char);
                    if self.i == name_start {
                        self.push(TokenKind::Unknown('$'), start);
                    } else {
                        let name =
                            self.input[self.offset(name_start)..self.offset(self.i)].to_string();
                        self.push(TokenKind::Var(name), start);
                    }
                }
                '\'' if self.is_possessive() => {
                    self.i += 2;
                    self.push(TokenKind::Possessive, start);
                }
                '"' | '\'' => {
                    self.i += 1;
                    let body_start = self.i;
                    self.take_while(|ch| ch != c);
                    let body = self.input[self.offset(body_start)..self.offset(self.i)].to_string();
                    if self.peek(0) == Some(c) {
                        self.i += 1;
                    }
                    self.push(TokenKind::Str(body), start);
                }
                '0'..='9' => self.lex_number(start),
                '.' if self.peek(1).is_some_and(|d| d.is_ascii_digit()) => self.lex_number(start),
                c if is_ident_start(c) => self.lex_word(start),
                '>' | '<' => {
                    self.i += 1;
                    let eq = self.peek(0) == Some('=');
                    if eq {
                        self.i += 1;
                    }
                    let kind = match (c, eq) {
                        ('>', true) => TokenKind::Gte,
                        ('>', false) => TokenKind::Gt,
                        ('<', true) => TokenKind::Lte,
                        _ => TokenKind::Lt,
                    };
                    self.push(kind, start);
                }
                _ => {
                    self.i += 1;
                    let kind = match c {
                        '+' => TokenKind::Plus,
                        '-' => TokenKind::Minus,
                        '*' => TokenKind::Star,
                        '/' => TokenKind::Slash,
                        '%' => TokenKind::Percent,
                        '(' => TokenKind::LParen,
                        ')' => TokenKind::RParen,
                        ',' => TokenKind::Comma,
                        ':' => TokenKind::Colon,
                        other => TokenKind::Unknown(other),
                    };
                    self.push(kind, start);
                }
            }
        }
        self.tokens
    }

    fn is_possessive(&self) -> bool {
        let follows_operand = self
            .tokens
            .last()
            .is_some_and(|t| t.kind.ends_operand() && t.span.end == self.offset(self.i));
        follows_operand
            && self.peek(1) == Some('s')
            && !self.peek(2).is_some_and(is_ident_char)
    }

    fn lex_number(&mut self, start: usize) {
        self.take_while(|c| c.is_ascii_digit());
        if self.peek(0) == Some('.') && self.peek(1).is_some_and(|d| d.is_ascii_digit()) {
            self.i += 1;
            self.take_while(|c| c.is_ascii_digit());
        }
        let input = self.input;
        let literal = &input[self.offset(start)..self.offset(self.i)];
        let value = if literal.starts_with('.') {
            parse_number(&format!("0{}", literal))
        } else {
            parse_number(literal)
        }
        .unwrap_or(0.0);
        // ordinal suffix: `1st`, `2nd`, `3rd`, `4th`
        if let Some((word, end)) = self.word_at_cursor() {
            if matches!(word, "st" | "nd" | "rd" | "th") {
                self.i = end;
            }
        }
        self.push(TokenKind::Number(value), start);
    }

    fn word_at_cursor(&self) -> Option<(&'a str, usize)> {
        if !self.peek(0).is_some_and(is_ident_start) {
            return None;
        }
        self.word_after(self.i)
    }

    fn lex_word(&mut self, start: usize) {
        self.take_while(is_ident_char);
        let input = self.input;
        let word = &input[self.offset(start)..self.offset(self.i)];
        let kind = match word {
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "it" => TokenKind::It,
            "to" => TokenKind::To,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "contains" => TokenKind::Contains,
            "is" => match self.word_after(self.i) {
                Some(("not", end)) => {
                    self.i = end;
                    TokenKind::IsNot
                }
                _ => TokenKind::Is,
            },
            "does" => match self.word_after(self.i) {
                Some(("not", not_end)) => match self.word_after(not_end) {
                    Some(("contain" | "contains", end)) => {
                        self.i = end;
                        TokenKind::DoesNotContain
                    }
                    _ => TokenKind::Ident(word.to_string()),
                },
                _ => TokenKind::Ident(word.to_string()),
            },
            _ => TokenKind::Ident(word.to_string()),
        };
        self.push(kind, start);
    }
}

/// Tokenize macro argument text. Never fails: unrecognised characters
/// become [`TokenKind::Unknown`] and unterminated strings run to the end.
pub fn tokenize(input: &str) -> Vec<Token> {
    Lexer::new(input).run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lex_set_command() {
        assert_eq!(
            kinds("$score to 50"),
            vec![
                TokenKind::Var("score".to_string()),
                TokenKind::To,
                TokenKind::Number(50.0),
            ]
        );
    }

    #[test]
    fn lex_keyword_operators() {
        assert_eq!(
            kinds("$a is not 3 and $b does not contain \"x\""),
            vec![
                TokenKind::Var("a".to_string()),
                TokenKind::IsNot,
                TokenKind::Number(3.0),
                TokenKind::And,
                TokenKind::Var("b".to_string()),
                TokenKind::DoesNotContain,
                TokenKind::Str("x".to_string()),
            ]
        );
    }

    #[test]
    fn keywords_do_not_match_inside_identifiers() {
        assert_eq!(kinds("$island"), vec![TokenKind::Var("island".to_string())]);
        assert_eq!(kinds("android"), vec![TokenKind::Ident("android".to_string())]);
    }

    #[test]
    fn lex_possessive_and_strings() {
        assert_eq!(
            kinds("$items's 1"),
            vec![
                TokenKind::Var("items".to_string()),
                TokenKind::Possessive,
                TokenKind::Number(1.0),
            ]
        );
        assert_eq!(kinds("'single'"), vec![TokenKind::Str("single".to_string())]);
        assert_eq!(
            kinds("\"it's\""),
            vec![TokenKind::Str("it's".to_string())]
        );
    }

    #[test]
    fn lex_symbol_comparisons() {
        assert_eq!(
            kinds(">= <= > <"),
            vec![TokenKind::Gte, TokenKind::Lte, TokenKind::Gt, TokenKind::Lt]
        );
    }

    #[test]
    fn lex_macro_call() {
        assert_eq!(
            kinds("(random: 1, 6)"),
            vec![
                TokenKind::LParen,
                TokenKind::Ident("random".to_string()),
                TokenKind::Colon,
                TokenKind::Number(1.0),
                TokenKind::Comma,
                TokenKind::Number(6.0),
                TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn lex_decimals_and_ordinals() {
        assert_eq!(kinds("2.5"), vec![TokenKind::Number(2.5)]);
        assert_eq!(kinds("0.5"), vec![TokenKind::Number(0.5)]);
        assert_eq!(
            kinds("$list's 2nd"),
            vec![
                TokenKind::Var("list".to_string()),
                TokenKind::Possessive,
                TokenKind::Number(2.0),
            ]
        );
    }

    #[test]
    fn spans_point_into_source() {
        let src = "$hp > 10";
        let tokens = tokenize(src);
        assert_eq!(tokens[0].span.slice(src), "$hp");
        assert_eq!(tokens[2].span.slice(src), "10");
    }
}
