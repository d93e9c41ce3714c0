//! Playback position over a completed history.

use std::sync::Arc;

use crate::history::SimulationHistory;
use crate::types::SimulationSnapshot;

/// Passive cursor into a [`SimulationHistory`]. Holds no timer; the caller
/// decides when to advance.
#[derive(Debug, Clone, Default)]
pub struct PlaybackCursor {
    history: Arc<SimulationHistory>,
    index: usize,
}

impl PlaybackCursor {
    pub fn new(history: impl Into<Arc<SimulationHistory>>) -> Self {
        Self {
            history: history.into(),
            index: 0,
        }
    }

    pub fn history(&self) -> &SimulationHistory {
        &self.history
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Jump to `index`. Out-of-range values leave the cursor where it is.
    pub fn set_index(&mut self, index: usize) {
        if index < self.history.len() {
            self.index = index;
        }
    }

    /// Step forward, wrapping to the first snapshot after the last.
    pub fn advance(&mut self) {
        if !self.history.is_empty() {
            self.index = (self.index + 1) % self.history.len();
        }
    }

    /// Step back, wrapping to the last snapshot before the first.
    pub fn retreat(&mut self) {
        let len = self.history.len();
        if len > 0 {
            self.index = (self.index + len - 1) % len;
        }
    }

    pub fn current(&self) -> Option<&SimulationSnapshot> {
        self.history.get(self.index).map(|(_, s)| s)
    }

    pub fn current_time(&self) -> Option<u64> {
        self.history.get(self.index).map(|(t, _)| t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn history(len: usize) -> SimulationHistory {
        SimulationHistory::from_parts(
            (0..len as u64).map(|i| i * 3600).collect(),
            vec![SimulationSnapshot::default(); len],
        )
        .unwrap()
    }

    #[test]
    fn advance_wraps_to_start() {
        let mut c = PlaybackCursor::new(history(3));
        c.advance();
        c.advance();
        assert_eq!(c.current_time(), Some(7200));
        c.advance();
        assert_eq!(c.index(), 0);
        c.retreat();
        assert_eq!(c.index(), 2);
    }

    #[test]
    fn empty_history_is_inert() {
        let mut c = PlaybackCursor::default();
        c.advance();
        c.retreat();
        c.set_index(0);
        assert_eq!(c.index(), 0);
        assert!(c.current().is_none());
        assert!(c.current_time().is_none());
    }

    proptest! {
        #[test]
        fn set_index_clamps_by_ignoring(len in 1usize..20, start in 0usize..20, target in 0usize..40) {
            let mut c = PlaybackCursor::new(history(len));
            c.set_index(start);
            let before = c.index();
            c.set_index(target);
            if target < len {
                prop_assert_eq!(c.index(), target);
            } else {
                prop_assert_eq!(c.index(), before);
            }
            prop_assert!(c.index() < len);
        }

        #[test]
        fn len_advances_return_to_start(len in 1usize..20, start in 0usize..20) {
            let mut c = PlaybackCursor::new(history(len));
            c.set_index(start);
            let before = c.index();
            for _ in 0..len {
                c.advance();
            }
            prop_assert_eq!(c.index(), before);
        }
    }
}
