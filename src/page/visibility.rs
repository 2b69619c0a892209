use crate::host::VisibilityState;

/// Tracks the first moment the page was hidden.
///
/// Observations stamped after that moment describe a backgrounded page
/// and are discarded by the paint metrics. A prerendering page counts as
/// not yet visible, but also not hidden, until it is activated.
#[derive(Debug, Clone)]
pub struct VisibilityTracker {
    state: VisibilityState,
    prerendering: bool,
    first_hidden_time: f64,
}

impl VisibilityTracker {
    pub fn new(state: VisibilityState, prerendering: bool) -> Self {
        Self {
            state,
            prerendering,
            first_hidden_time: initial_hidden_time(state, prerendering),
        }
    }

    /// `f64::INFINITY` while the page has never been hidden.
    pub fn first_hidden_time(&self) -> f64 {
        self.first_hidden_time
    }

    pub fn state(&self) -> VisibilityState {
        self.state
    }

    pub fn is_hidden(&self) -> bool {
        self.state == VisibilityState::Hidden
    }

    pub fn is_prerendering(&self) -> bool {
        self.prerendering
    }

    pub fn on_visibility_change(&mut self, state: VisibilityState, time_stamp: f64) {
        self.state = state;
        if state == VisibilityState::Hidden && self.first_hidden_time.is_infinite() {
            self.first_hidden_time = if self.prerendering { 0.0 } else { time_stamp };
        }
    }

    /// Prerendered page became the active page.
    pub fn on_activation(&mut self, state: VisibilityState) {
        self.prerendering = false;
        self.state = state;
        if state == VisibilityState::Hidden && self.first_hidden_time.is_infinite() {
            self.first_hidden_time = 0.0;
        }
    }

    /// Restored from the history cache: the restored page starts over.
    pub fn reset(&mut self, state: VisibilityState) {
        self.state = state;
        self.prerendering = false;
        self.first_hidden_time = initial_hidden_time(state, false);
    }
}

fn initial_hidden_time(state: VisibilityState, prerendering: bool) -> f64 {
    if state == VisibilityState::Hidden && !prerendering {
        0.0
    } else {
        f64::INFINITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_first_hidden_only() {
        let mut tracker = VisibilityTracker::new(VisibilityState::Visible, false);
        assert!(tracker.first_hidden_time().is_infinite());

        tracker.on_visibility_change(VisibilityState::Hidden, 1200.0);
        tracker.on_visibility_change(VisibilityState::Visible, 1500.0);
        tracker.on_visibility_change(VisibilityState::Hidden, 3000.0);
        assert_eq!(tracker.first_hidden_time(), 1200.0);
        assert!(tracker.is_hidden());
    }

    #[test]
    fn loaded_in_background_counts_from_zero() {
        let tracker = VisibilityTracker::new(VisibilityState::Hidden, false);
        assert_eq!(tracker.first_hidden_time(), 0.0);
    }

    #[test]
    fn prerendering_is_not_hidden_until_activation() {
        let mut tracker = VisibilityTracker::new(VisibilityState::Hidden, true);
        assert!(tracker.first_hidden_time().is_infinite());
        assert!(tracker.is_prerendering());

        tracker.on_activation(VisibilityState::Visible);
        assert!(!tracker.is_prerendering());
        assert!(tracker.first_hidden_time().is_infinite());
    }

    #[test]
    fn reset_after_restore() {
        let mut tracker = VisibilityTracker::new(VisibilityState::Visible, false);
        tracker.on_visibility_change(VisibilityState::Hidden, 500.0);
        tracker.reset(VisibilityState::Visible);
        assert!(tracker.first_hidden_time().is_infinite());
        assert!(!tracker.is_hidden());
    }
}
