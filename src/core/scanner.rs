/// Balanced-span scanning over raw passage text.
///
/// Every macro and hook lookup in the interpreter goes through here. Only
/// the opener's own delimiter class is counted: a `(` scan ignores
/// brackets, a `[` scan ignores parentheses. Quotes get no special
/// treatment. All delimiters are ASCII, so byte offsets are always valid
/// `str` boundaries.

/// Byte range `[start, end)` within the scanned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }
}

/// A located `(name: args)` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacroSpan<'a> {
    /// Lower-cased macro name as written.
    pub name: &'a str,
    /// The whole invocation, `(` through `)`.
    pub span: Span,
    /// The argument text between `:` and the closing `)`.
    pub args: &'a str,
}

fn closer_for(open: u8) -> Option<u8> {
    match open {
        b'(' => Some(b')'),
        b'[' => Some(b']'),
        b'{' => Some(b'}'),
        _ => None,
    }
}

/// Scan for the closer matching the token at `start`.
///
/// `token` begins with the opening delimiter (`"(set:"`, `"["`). Depth
/// starts at 1 right after the token. Returns the index one past the
/// matching closer, or `None` if the text ends first.
pub fn scan_balanced(text: &str, start: usize, token: &str) -> Option<usize> {
    let rest = text.get(start..)?;
    if !rest.starts_with(token) {
        return None;
    }
    let open = *token.as_bytes().first()?;
    let close = closer_for(open)?;
    let bytes = text.as_bytes();

    let mut depth = 1usize;
    let mut i = start + token.len();
    while i < bytes.len() {
        if bytes[i] == open {
            depth += 1;
        } else if bytes[i] == close {
            depth -= 1;
            if depth == 0 {
                return Some(i + 1);
            }
        }
        i += 1;
    }
    None
}

/// Locate a `[hook]` starting exactly at `pos`.
pub fn hook_at(text: &str, pos: usize) -> Option<Span> {
    if text.as_bytes().get(pos) != Some(&b'[') {
        return None;
    }
    scan_balanced(text, pos, "[").map(|end| Span::new(pos, end))
}

/// The body of a hook span, brackets excluded.
pub fn hook_body<'a>(text: &'a str, hook: Span) -> &'a str {
    &text[hook.start + 1..hook.end - 1]
}

/// Read a macro head `(name:` at `pos`. Returns the name and the index
/// just past the colon.
pub fn macro_head_at(text: &str, pos: usize) -> Option<(&str, usize)> {
    let bytes = text.as_bytes();
    if bytes.get(pos) != Some(&b'(') {
        return None;
    }
    let name_start = pos + 1;
    let mut i = name_start;
    while bytes
        .get(i)
        .is_some_and(|&b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        i += 1;
    }
    if i == name_start || bytes.get(i) != Some(&b':') {
        return None;
    }
    Some((&text[name_start..i], i + 1))
}

/// Parse the complete macro invocation whose `(` sits at `pos`.
pub fn macro_at(text: &str, pos: usize) -> Option<MacroSpan<'_>> {
    let (name, args_start) = macro_head_at(text, pos)?;
    let end = scan_balanced(text, pos, "(")?;
    Some(MacroSpan {
        name,
        span: Span::new(pos, end),
        args: &text[args_start..end - 1],
    })
}

/// Find the first `(name:` head at or after `from` whose name is one of
/// `names` (ASCII case-insensitive). Only the head is matched; the
/// arguments may still be unbalanced.
pub fn find_macro_head(text: &str, from: usize, names: &[&str]) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        if bytes[i] == b'(' {
            if let Some((name, _)) = macro_head_at(text, i) {
                if names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
                    return Some(i);
                }
            }
        }
        i += 1;
    }
    None
}

/// Find the first complete invocation of one of `names` at or after
/// `from`. An unbalanced invocation ends the search: everything after it
/// lies inside its unclosed argument list.
pub fn find_macro<'a>(text: &'a str, from: usize, names: &[&str]) -> Option<MacroSpan<'a>> {
    let pos = find_macro_head(text, from, names)?;
    let found = macro_at(text, pos);
    if found.is_none() {
        log::debug!("unbalanced macro at byte {}, leaving the rest as text", pos);
    }
    found
}

/// Net `[` / `]` depth at `pos`, counted from the start of the text.
pub fn bracket_depth_at(text: &str, pos: usize) -> usize {
    let mut depth = 0usize;
    for &b in &text.as_bytes()[..pos.min(text.len())] {
        match b {
            b'[' => depth += 1,
            b']' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    depth
}

/// First non-whitespace index at or after `pos`.
pub fn skip_whitespace(text: &str, pos: usize) -> usize {
    let bytes = text.as_bytes();
    let mut i = pos;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}
