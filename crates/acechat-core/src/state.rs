//! UI-agnostic chat message types
//!
//! Shared between the session controller and whatever paints the transcript;
//! nothing here depends on a specific UI framework.

use crate::format::format_message;

/// The role of a transcript message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
    Error,
}

impl ChatRole {
    /// Avatar glyph shown beside the message body.
    pub fn glyph(&self) -> &'static str {
        match self {
            ChatRole::User => "●",
            ChatRole::Assistant => "◆",
            ChatRole::Error => "▲",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChatRole::User => "You",
            ChatRole::Assistant => "ACE AI",
            ChatRole::Error => "Error",
        }
    }
}

/// Identifies a message for in-place updates while a reply streams in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(pub u64);

/// Number of ticks a freshly appended message stays in its reveal transition.
pub const REVEAL_TICKS: u8 = 2;

/// A chat message in the transcript
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: MessageId,
    pub role: ChatRole,
    content: String,
    markup: String,
    reveal: u8,
}

impl ChatMessage {
    pub fn new(id: MessageId, role: ChatRole, content: impl Into<String>) -> Self {
        let content = content.into();
        let markup = format_message(&content);
        Self {
            id,
            role,
            content,
            markup,
            reveal: REVEAL_TICKS,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Markup derived from the full content.
    pub fn markup(&self) -> &str {
        &self.markup
    }

    /// Replace the content and re-derive the markup from all of it.
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.markup = format_message(&self.content);
    }

    /// True while the fade/slide-in transition is still running.
    pub fn is_revealing(&self) -> bool {
        self.reveal > 0
    }

    pub(crate) fn tick_reveal(&mut self) {
        self.reveal = self.reveal.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markup_follows_content() {
        let mut msg = ChatMessage::new(MessageId(1), ChatRole::Assistant, "**a");
        msg.set_content("**a**");
        assert_eq!(msg.markup(), "<strong>a</strong>");
        assert_eq!(msg.content(), "**a**");
    }

    #[test]
    fn test_reveal_runs_out() {
        let mut msg = ChatMessage::new(MessageId(1), ChatRole::User, "hi");
        assert!(msg.is_revealing());
        for _ in 0..REVEAL_TICKS {
            msg.tick_reveal();
        }
        assert!(!msg.is_revealing());
    }

    #[test]
    fn test_roles_have_distinct_glyphs() {
        let glyphs = [
            ChatRole::User.glyph(),
            ChatRole::Assistant.glyph(),
            ChatRole::Error.glyph(),
        ];
        assert_ne!(glyphs[0], glyphs[1]);
        assert_ne!(glyphs[1], glyphs[2]);
        assert_ne!(glyphs[0], glyphs[2]);
    }
}
