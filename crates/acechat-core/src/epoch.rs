use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Generation counter shared between the session and its background tasks.
///
/// Advanced whenever the transcript is reset; work started under an older
/// generation must not touch the new transcript.
#[derive(Debug, Clone, Default)]
pub struct Epoch(Arc<AtomicU64>);

impl Epoch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Invalidate every outstanding ticket.
    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn ticket(&self) -> Ticket {
        Ticket {
            epoch: self.clone(),
            generation: self.current(),
        }
    }
}

/// A generation captured when a task starts.
#[derive(Debug, Clone)]
pub struct Ticket {
    epoch: Epoch,
    generation: u64,
}

impl Ticket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        self.epoch.current() == self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_invalidates_tickets() {
        let epoch = Epoch::new();
        let ticket = epoch.ticket();
        assert!(ticket.is_current());
        epoch.advance();
        assert!(!ticket.is_current());
        assert!(epoch.ticket().is_current());
    }

    #[test]
    fn test_clones_share_the_counter() {
        let epoch = Epoch::new();
        let other = epoch.clone();
        other.advance();
        assert_eq!(epoch.current(), 1);
    }
}
