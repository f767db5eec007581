use serde::Serialize;
use tracing::debug;

/// Save workflow states. `Rejected` is only reachable from `Validating`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaveState {
    Validating,
    Persisting,
    Enriching,
    Done,
    Rejected,
}

impl SaveState {
    pub fn can_transition_to(self, next: SaveState) -> bool {
        matches!(
            (self, next),
            (SaveState::Validating, SaveState::Persisting)
                | (SaveState::Validating, SaveState::Rejected)
                | (SaveState::Persisting, SaveState::Enriching)
                | (SaveState::Enriching, SaveState::Done)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SaveState::Done | SaveState::Rejected)
    }
}

/// Records the path one save takes through the state machine.
#[derive(Debug, Clone)]
pub struct StateTracker {
    history: Vec<SaveState>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self {
            history: vec![SaveState::Validating],
        }
    }

    pub fn current(&self) -> SaveState {
        self.history.last().copied().unwrap_or(SaveState::Validating)
    }

    /// Move to `next`. Illegal transitions are ignored and reported as `false`.
    pub fn advance(&mut self, next: SaveState) -> bool {
        let from = self.current();
        if !from.can_transition_to(next) {
            debug!("Ignoring illegal save transition {:?} -> {:?}", from, next);
            return false;
        }
        debug!("Save transition {:?} -> {:?}", from, next);
        self.history.push(next);
        true
    }

    pub fn history(&self) -> &[SaveState] {
        &self.history
    }
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut tracker = StateTracker::new();
        assert!(tracker.advance(SaveState::Persisting));
        assert!(tracker.advance(SaveState::Enriching));
        assert!(tracker.advance(SaveState::Done));
        assert!(tracker.current().is_terminal());
    }

    #[test]
    fn test_rejected_only_from_validating() {
        let mut tracker = StateTracker::new();
        tracker.advance(SaveState::Persisting);
        assert!(!tracker.advance(SaveState::Rejected));
        assert_eq!(tracker.current(), SaveState::Persisting);
    }

    #[test]
    fn test_cannot_skip_persisting() {
        let mut tracker = StateTracker::new();
        assert!(!tracker.advance(SaveState::Enriching));
        assert_eq!(tracker.history(), &[SaveState::Validating]);
    }
}
