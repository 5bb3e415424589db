//! Transcript view model: the ordered entries the chat panel paints.

use tracing::warn;

use crate::state::{ChatMessage, ChatRole, MessageId};

/// Suggestion shortcuts offered by the welcome card.
pub const SUGGESTIONS: [&str; 3] = [
    "Tell me about yourself",
    "What can you help me with?",
    "Explain AI in simple terms",
];

pub const WELCOME_TITLE: &str = "Welcome to ACE AI";
pub const WELCOME_GREETING: &str = "I'm your helpful AI assistant. How can I help you today?";

#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    /// Greeting card with suggestion shortcuts, dropped by the first message.
    Welcome,
    Message(ChatMessage),
    /// The assistant is composing a reply.
    Typing,
}

/// Scroll bookkeeping in rendered lines.
///
/// The painter reports measured heights through [`Transcript::set_metrics`];
/// while `follow` is set the offset tracks the bottom of the content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Scroll {
    offset: u16,
    content_height: u16,
    viewport_height: u16,
    follow: bool,
}

impl Scroll {
    fn max_offset(&self) -> u16 {
        self.content_height.saturating_sub(self.viewport_height)
    }
}

#[derive(Debug, Clone)]
pub struct Transcript {
    entries: Vec<Entry>,
    next_id: u64,
    typing_frame: u8,
    scroll: Scroll,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    /// A fresh transcript showing only the welcome card.
    pub fn new() -> Self {
        Self {
            entries: vec![Entry::Welcome],
            next_id: 1,
            typing_frame: 0,
            scroll: Scroll {
                follow: true,
                ..Scroll::default()
            },
        }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.entries.iter().filter_map(|e| match e {
            Entry::Message(m) => Some(m),
            _ => None,
        })
    }

    pub fn count_role(&self, role: ChatRole) -> usize {
        self.messages().filter(|m| m.role == role).count()
    }

    pub fn message(&self, id: MessageId) -> Option<&ChatMessage> {
        self.messages().find(|m| m.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_welcome(&self) -> bool {
        self.entries.iter().any(|e| matches!(e, Entry::Welcome))
    }

    pub fn has_typing_placeholder(&self) -> bool {
        self.entries.iter().any(|e| matches!(e, Entry::Typing))
    }

    /// Append a fully formed message and scroll to it.
    pub fn append_message(&mut self, role: ChatRole, content: impl Into<String>) -> MessageId {
        self.entries.retain(|e| !matches!(e, Entry::Welcome));

        let id = MessageId(self.next_id);
        self.next_id += 1;
        self.entries
            .push(Entry::Message(ChatMessage::new(id, role, content)));
        self.scroll_to_bottom();
        id
    }

    /// Start an empty message whose content will be filled in later.
    pub fn begin_message(&mut self, role: ChatRole) -> MessageId {
        self.append_message(role, String::new())
    }

    /// Replace the content of a message in place. Returns false if the
    /// message is gone (e.g. the transcript was cleared).
    pub fn update_message(&mut self, id: MessageId, content: impl Into<String>) -> bool {
        let found = self.entries.iter_mut().rev().find_map(|e| match e {
            Entry::Message(m) if m.id == id => Some(m),
            _ => None,
        });

        match found {
            Some(msg) => {
                msg.set_content(content);
                self.scroll_to_bottom();
                true
            }
            None => false,
        }
    }

    /// Insert the typing placeholder. Refuses to add a second one.
    pub fn show_typing_placeholder(&mut self) -> bool {
        if self.has_typing_placeholder() {
            warn!("typing placeholder already shown");
            return false;
        }
        self.typing_frame = 0;
        self.entries.push(Entry::Typing);
        self.scroll_to_bottom();
        true
    }

    pub fn remove_typing_placeholder(&mut self) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| !matches!(e, Entry::Typing));
        before != self.entries.len()
    }

    /// Drop every entry, optionally reinstating the welcome card.
    pub fn clear(&mut self, with_welcome: bool) {
        self.entries.clear();
        if with_welcome {
            self.entries.push(Entry::Welcome);
        }
        self.scroll = Scroll {
            follow: true,
            viewport_height: self.scroll.viewport_height,
            ..Scroll::default()
        };
    }

    /// Pin the view to the end of the content.
    pub fn scroll_to_bottom(&mut self) {
        self.scroll.follow = true;
        self.scroll.offset = self.scroll.max_offset();
    }

    /// Record the painted content height and the visible height.
    pub fn set_metrics(&mut self, content_height: u16, viewport_height: u16) {
        self.scroll.content_height = content_height;
        self.scroll.viewport_height = viewport_height;
        if self.scroll.follow {
            self.scroll.offset = self.scroll.max_offset();
        } else {
            self.scroll.offset = self.scroll.offset.min(self.scroll.max_offset());
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.scroll.offset = self.scroll.offset.saturating_sub(lines);
        self.scroll.follow = self.scroll.offset >= self.scroll.max_offset();
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max = self.scroll.max_offset();
        self.scroll.offset = self.scroll.offset.saturating_add(lines).min(max);
        self.scroll.follow = self.scroll.offset >= max;
    }

    pub fn scroll_offset(&self) -> u16 {
        self.scroll.offset
    }

    pub fn is_following(&self) -> bool {
        self.scroll.follow
    }

    /// Typing animation frame, 0-2.
    pub fn typing_frame(&self) -> u8 {
        self.typing_frame
    }

    /// Advance animations: typing dots and message reveal.
    pub fn tick(&mut self) {
        if self.has_typing_placeholder() {
            self.typing_frame = (self.typing_frame + 1) % 3;
        }
        for entry in &mut self.entries {
            if let Entry::Message(m) = entry {
                m.tick_reveal();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_with_welcome() {
        let t = Transcript::new();
        assert_eq!(t.entries(), &[Entry::Welcome]);
    }

    #[test]
    fn test_first_message_drops_welcome() {
        let mut t = Transcript::new();
        t.append_message(ChatRole::User, "hi");
        assert!(!t.has_welcome());
        assert_eq!(t.entries().len(), 1);
        assert_eq!(t.messages().next().map(|m| m.markup()), Some("hi"));
    }

    #[test]
    fn test_single_typing_placeholder() {
        let mut t = Transcript::new();
        assert!(t.show_typing_placeholder());
        assert!(!t.show_typing_placeholder());
        let typing = t
            .entries()
            .iter()
            .filter(|e| matches!(e, Entry::Typing))
            .count();
        assert_eq!(typing, 1);
        assert!(t.remove_typing_placeholder());
        assert!(!t.remove_typing_placeholder());
    }

    #[test]
    fn test_update_message_rederives_markup() {
        let mut t = Transcript::new();
        let id = t.begin_message(ChatRole::Assistant);
        assert!(t.update_message(id, "Hello **wor"));
        assert!(t.update_message(id, "Hello **world**"));
        assert_eq!(
            t.message(id).map(|m| m.markup()),
            Some("Hello <strong>world</strong>")
        );
    }

    #[test]
    fn test_update_after_clear_is_refused() {
        let mut t = Transcript::new();
        let id = t.begin_message(ChatRole::Assistant);
        t.clear(true);
        assert!(!t.update_message(id, "late"));
        assert_eq!(t.entries(), &[Entry::Welcome]);
    }

    #[test]
    fn test_clear_without_welcome() {
        let mut t = Transcript::new();
        t.append_message(ChatRole::User, "x");
        t.clear(false);
        assert!(t.is_empty());
    }

    #[test]
    fn test_follows_bottom_until_user_scrolls_up() {
        let mut t = Transcript::new();
        t.append_message(ChatRole::User, "x");
        t.set_metrics(50, 20);
        assert_eq!(t.scroll_offset(), 30);

        t.scroll_up(5);
        assert!(!t.is_following());
        t.set_metrics(60, 20);
        assert_eq!(t.scroll_offset(), 25);

        t.scroll_down(100);
        assert!(t.is_following());
        assert_eq!(t.scroll_offset(), 40);
    }

    #[test]
    fn test_append_repins_to_bottom() {
        let mut t = Transcript::new();
        t.set_metrics(50, 20);
        t.scroll_up(10);
        t.append_message(ChatRole::Assistant, "more");
        assert!(t.is_following());
    }

    #[test]
    fn test_tick_cycles_typing_frame() {
        let mut t = Transcript::new();
        t.show_typing_placeholder();
        t.tick();
        t.tick();
        assert_eq!(t.typing_frame(), 2);
        t.tick();
        assert_eq!(t.typing_frame(), 0);
    }
}
