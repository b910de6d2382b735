/// Link syntax: `[[[...]]]` and `[[...]]`, with `->`, `<-` or `|`
/// separators.

use crate::schema::passage::Choice;

/// A link located in text. Empty links carry no choice.
#[derive(Debug, Clone, PartialEq)]
struct LinkMatch {
    start: usize,
    end: usize,
    choice: Option<Choice>,
}

/// Split a link's inner text into display text and target.
///
/// `->` binds rightmost and `<-` leftmost, so `a->b->c` targets `c` and
/// `a<-b<-c` targets `a`. A `|` separates display from target. With no
/// separator the whole text is both.
pub fn parse_link(inner: &str) -> Choice {
    if let Some(at) = inner.rfind("->") {
        return Choice::new(inner[..at].trim(), inner[at + 2..].trim());
    }
    if let Some(at) = inner.find("<-") {
        return Choice::new(inner[at + 2..].trim(), inner[..at].trim());
    }
    if let Some(at) = inner.find('|') {
        return Choice::new(inner[..at].trim(), inner[at + 1..].trim());
    }
    let whole = inner.trim();
    Choice::new(whole, whole)
}

fn next_link(text: &str, from: usize) -> Option<LinkMatch> {
    let start = from + text.get(from..)?.find("[[")?;
    let (open, close) = if text[start..].starts_with("[[[") {
        (3, "]]]")
    } else {
        (2, "]]")
    };
    let body_start = start + open;
    let Some(len) = text[body_start..].find(close) else {
        log::debug!("unterminated link at byte {}", start);
        return None;
    };
    let inner = &text[body_start..body_start + len];
    let choice = (!inner.trim().is_empty()).then(|| parse_link(inner));
    Some(LinkMatch {
        start,
        end: body_start + len + close.len(),
        choice,
    })
}

/// Every link in `text`, in order.
pub fn extract_choices(text: &str) -> Vec<Choice> {
    let mut choices = Vec::new();
    let mut from = 0;
    while let Some(link) = next_link(text, from) {
        from = link.end;
        choices.extend(link.choice);
    }
    choices
}

/// Remove link markup from rendered text. Choices are presented
/// separately, so nothing of the link is kept.
pub fn strip_links(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    while let Some(link) = next_link(text, copied) {
        out.push_str(&text[copied..link.start]);
        copied = link.end;
    }
    out.push_str(&text[copied..]);
    out
}
