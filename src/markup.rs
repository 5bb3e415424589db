//! Paint formatter markup as styled terminal lines.
//!
//! Only the tags `format_message` emits are recognised; anything else that
//! looks like a tag is shown literally.

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Strong,
    Em,
    Code,
    Pre,
    Link,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Open(Tag),
    Close(Tag),
    Break,
}

const SIMPLE_TAGS: [(&str, Token); 10] = [
    ("<strong>", Token::Open(Tag::Strong)),
    ("</strong>", Token::Close(Tag::Strong)),
    ("<em>", Token::Open(Tag::Em)),
    ("</em>", Token::Close(Tag::Em)),
    ("<code>", Token::Open(Tag::Code)),
    ("</code>", Token::Close(Tag::Code)),
    ("<pre>", Token::Open(Tag::Pre)),
    ("</pre>", Token::Close(Tag::Pre)),
    ("</a>", Token::Close(Tag::Link)),
    ("<br>", Token::Break),
];

/// Match a tag at the start of `rest`, returning it and its byte length.
fn match_tag(rest: &str) -> Option<(Token, usize)> {
    for (text, token) in SIMPLE_TAGS {
        if rest.starts_with(text) {
            return Some((token, text.len()));
        }
    }
    if rest.starts_with("<a href=\"") {
        return rest.find('>').map(|end| (Token::Open(Tag::Link), end + 1));
    }
    None
}

#[derive(Default)]
struct Depth {
    strong: u8,
    em: u8,
    code: u8,
    pre: u8,
    link: u8,
}

impl Depth {
    fn slot(&mut self, tag: Tag) -> &mut u8 {
        match tag {
            Tag::Strong => &mut self.strong,
            Tag::Em => &mut self.em,
            Tag::Code => &mut self.code,
            Tag::Pre => &mut self.pre,
            Tag::Link => &mut self.link,
        }
    }

    fn style(&self, base: Style) -> Style {
        let mut style = base;
        if self.strong > 0 {
            style = style.add_modifier(Modifier::BOLD);
        }
        if self.em > 0 {
            style = style.add_modifier(Modifier::ITALIC);
        }
        if self.pre > 0 {
            style = style.fg(Color::Green);
        } else if self.code > 0 {
            style = style.fg(Color::Yellow);
        }
        if self.link > 0 {
            style = style.fg(Color::Blue).add_modifier(Modifier::UNDERLINED);
        }
        style
    }
}

/// Convert markup to lines, one per `<br>`.
pub fn to_lines(markup: &str, base: Style) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut text = String::new();
    let mut depth = Depth::default();
    let mut rest = markup;

    while !rest.is_empty() {
        let token = if rest.starts_with('<') {
            match_tag(rest)
        } else {
            None
        };

        let Some((token, len)) = token else {
            // Copy plain text up to the next possible tag.
            let skip = rest.chars().next().map(char::len_utf8).unwrap_or(1);
            let next = rest[skip..].find('<').map(|i| i + skip).unwrap_or(rest.len());
            text.push_str(&rest[..next]);
            rest = &rest[next..];
            continue;
        };

        if !text.is_empty() {
            spans.push(Span::styled(std::mem::take(&mut text), depth.style(base)));
        }
        match token {
            Token::Open(tag) => {
                let slot = depth.slot(tag);
                *slot = slot.saturating_add(1);
            }
            Token::Close(tag) => {
                let slot = depth.slot(tag);
                *slot = slot.saturating_sub(1);
            }
            Token::Break => lines.push(Line::from(std::mem::take(&mut spans))),
        }
        rest = &rest[len..];
    }

    if !text.is_empty() {
        spans.push(Span::styled(text, depth.style(base)));
    }
    lines.push(Line::from(spans));
    lines
}
