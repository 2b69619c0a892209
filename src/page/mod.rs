//! Page-level state shared by every calculator.
//!
//! This replaces ambient globals: the first hidden time, the interaction
//! count and the navigation context live here and are injected into
//! calculators through [`crate::metrics::Context`].

pub mod identity;
pub mod interaction_count;
pub mod visibility;

use crate::host::{PerformanceHost, ReadyState, VisibilityState};
use crate::metric::{Metric, MetricName};

pub use identity::{generate_unique_id, NavigationState, SoftNavigation};
pub use interaction_count::InteractionCounter;
pub use visibility::VisibilityTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Keyboard,
    Pointer,
}

/// Lifecycle signals the host dispatches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PageEvent {
    VisibilityChange { state: VisibilityState, time_stamp: f64 },
    /// A prerendered page became the active page
    PrerenderingActivated { time_stamp: f64 },
    /// The document finished loading
    Load { time_stamp: f64 },
    /// Trusted keyboard or pointer input
    Input { kind: InputKind, time_stamp: f64 },
    /// Resumed from the history cache without reloading
    Restore { time_stamp: f64 },
    SoftNavigation { navigation_id: u64, start_time: f64 },
    /// A frame was presented after the previous event
    FramePresented { time_stamp: f64 },
    /// The page is about to unload
    Finalize,
}

impl PageEvent {
    /// Events after which no further entries are expected for the
    /// current instance.
    pub fn ends_observation(&self) -> bool {
        matches!(
            self,
            PageEvent::VisibilityChange { state: VisibilityState::Hidden, .. } | PageEvent::Finalize
        )
    }
}

#[derive(Debug, Clone)]
pub struct PageState {
    pub visibility: VisibilityTracker,
    pub navigation: NavigationState,
    pub interactions: InteractionCounter,
    ready_state: ReadyState,
}

impl PageState {
    pub fn from_host(host: &dyn PerformanceHost) -> Self {
        Self {
            visibility: VisibilityTracker::new(host.visibility_state(), host.is_prerendering()),
            navigation: NavigationState::from_host(host),
            interactions: InteractionCounter::new(),
            ready_state: host.ready_state(),
        }
    }

    pub fn ready_state(&self) -> ReadyState {
        self.ready_state
    }

    pub fn is_loaded(&self) -> bool {
        self.ready_state == ReadyState::Complete
    }

    /// Fold a lifecycle event into the shared state. Runs before any
    /// calculator sees the event.
    pub fn apply(&mut self, event: &PageEvent, host: &dyn PerformanceHost) {
        match *event {
            PageEvent::VisibilityChange { state, time_stamp } => {
                self.visibility.on_visibility_change(state, time_stamp);
            }
            PageEvent::PrerenderingActivated { .. } => {
                self.visibility.on_activation(host.visibility_state());
                self.navigation.on_activation(host.navigation_entry().as_ref());
            }
            PageEvent::Load { .. } => self.ready_state = ReadyState::Complete,
            PageEvent::Restore { time_stamp } => {
                self.visibility.reset(VisibilityState::Visible);
                self.navigation.on_restore(time_stamp);
            }
            PageEvent::SoftNavigation { navigation_id, start_time } => {
                self.navigation.on_soft_navigation(SoftNavigation { navigation_id, start_time });
            }
            PageEvent::Input { .. } | PageEvent::FramePresented { .. } | PageEvent::Finalize => {}
        }
    }

    /// Fresh metric instance classified against the current navigation.
    pub fn init_metric(&self, name: MetricName, value: Option<f64>) -> Metric {
        Metric::new(
            name,
            value.unwrap_or(-1.0),
            generate_unique_id(),
            self.navigation.navigation_type(),
        )
    }

    pub fn interaction_count(&self, host: &dyn PerformanceHost) -> u64 {
        self.interactions.count(host)
    }
}
