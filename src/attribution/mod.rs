//! Breakdown of reported values into causal phases.
//!
//! Decomposers are pure functions of a metric snapshot and the lookups
//! the host can still answer. Phases are clamped to be non-negative and
//! never add up to more than the metric value; when the raw entries are
//! missing the breakdown degrades to zeros rather than failing.

pub mod cls;
pub mod fcp;
pub mod inp;
pub mod lcp;
pub mod ttfb;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::Serialize;

use crate::dom::selector::selector;
use crate::dom::TargetNode;
use crate::entry::{NavigationTiming, ResourceTiming};
use crate::host::{PerformanceHost, ReadyState};
use crate::page::NavigationState;

pub use cls::{attribute_cls, largest_source, ClsAttribution, ShiftTargets};
pub use fcp::{attribute_fcp, FcpAttribution};
pub use inp::{attribute_inp, EntryGroup, FrameGroups, InpAttribution, InteractionTargets, InteractionType};
pub use lcp::{attribute_lcp, LcpAttribution, PaintTargets};
pub use ttfb::{attribute_ttfb, TtfbAttribution};

/// Caller-supplied replacement for the default selector.
///
/// Returning `None` falls back to the default selector.
pub type TargetGenerator = Arc<dyn Fn(&TargetNode) -> Option<String>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Attribution {
    Cls(ClsAttribution),
    Fcp(FcpAttribution),
    Inp(InpAttribution),
    Lcp(LcpAttribution),
    Ttfb(TtfbAttribution),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadState {
    Loading,
    DomInteractive,
    DomContentLoaded,
    Complete,
}

/// What the host can still tell us when a report is built.
#[derive(Debug, Clone)]
pub struct Lookups {
    /// Navigation record; `None` for instances started by a restore or a
    /// soft navigation, where the page's navigation record no longer applies
    pub navigation: Option<NavigationTiming>,
    pub resources: Vec<ResourceTiming>,
    pub ready_state: ReadyState,
    pub restore_time: Option<f64>,
}

impl Lookups {
    pub fn from_host(host: &dyn PerformanceHost, navigation: &NavigationState) -> Self {
        let current = navigation.restore_time().is_none() && navigation.soft_navigation().is_none();
        Self {
            navigation: host.navigation_entry().filter(|_| current),
            resources: host.resource_entries(),
            ready_state: host.ready_state(),
            restore_time: navigation.restore_time(),
        }
    }

    pub fn load_state(&self, timestamp: f64) -> LoadState {
        load_state(timestamp, self.ready_state, self.navigation.as_ref())
    }
}

/// Document loading phase at `timestamp`.
pub fn load_state(timestamp: f64, ready_state: ReadyState, navigation: Option<&NavigationTiming>) -> LoadState {
    if ready_state == ReadyState::Loading {
        return LoadState::Loading;
    }
    let Some(nav) = navigation else {
        return LoadState::Complete;
    };
    if timestamp < nav.dom_interactive {
        LoadState::Loading
    } else if nav.dom_content_loaded_event_start == 0.0 || timestamp < nav.dom_content_loaded_event_start {
        LoadState::DomInteractive
    } else if nav.dom_complete == 0.0 || timestamp < nav.dom_complete {
        LoadState::DomContentLoaded
    } else {
        LoadState::Complete
    }
}

/// Describe `node` with the caller's generator, falling back to the
/// default selector. A panicking generator leaves the target undetermined.
pub fn describe_target(node: Option<&TargetNode>, generate: Option<&TargetGenerator>) -> Option<String> {
    let node = node?;
    if let Some(generate) = generate {
        match panic::catch_unwind(AssertUnwindSafe(|| generate(node))) {
            Ok(Some(custom)) => return Some(custom),
            Ok(None) => {}
            Err(_) => {
                log::warn!("target generator panicked; leaving target undetermined");
                return None;
            }
        }
    }
    let sel = selector(node);
    (!sel.is_empty()).then_some(sel)
}

/// Clamp `raw` into what is left of `budget` after `used`.
pub(crate) fn capped(raw: f64, used: f64, budget: f64) -> f64 {
    raw.max(0.0).min((budget - used).max(0.0))
}
