//! Server-response breakdown.
//!
//! Each phase ends at a boundary taken from the navigation record. The
//! boundaries are walked with a monotone cursor clamped to the metric
//! value, so out-of-order or unset timestamps collapse their phase to
//! zero and the phases always add up to the value.

use serde::Serialize;

use crate::entry::NavigationTiming;
use crate::metric::Metric;

use super::Lookups;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TtfbAttribution {
    pub waiting_duration: f64,
    pub redirect_duration: f64,
    pub cache_duration: f64,
    pub dns_duration: f64,
    pub connection_duration: f64,
    pub request_duration: f64,
    pub navigation_entry: Option<NavigationTiming>,
}

impl TtfbAttribution {
    pub fn total(&self) -> f64 {
        self.waiting_duration
            + self.redirect_duration
            + self.cache_duration
            + self.dns_duration
            + self.connection_duration
            + self.request_duration
    }
}

struct Cursor {
    at: f64,
    limit: f64,
}

impl Cursor {
    /// Advance to `boundary` and return the phase that just ended.
    fn advance_to(&mut self, boundary: f64) -> f64 {
        let next = boundary.max(self.at).min(self.limit);
        let phase = next - self.at;
        self.at = next;
        phase
    }
}

fn first_set(a: f64, b: f64) -> f64 {
    if a > 0.0 {
        a
    } else {
        b
    }
}

pub fn attribute_ttfb(metric: &Metric, lookups: &Lookups) -> TtfbAttribution {
    let Some(nav) = lookups.navigation.as_ref() else {
        return TtfbAttribution::default();
    };
    let rel = |t: f64| t - nav.activation_start;
    let fetch_start = first_set(nav.worker_start, nav.fetch_start);
    let waiting_end = if nav.redirect_start > 0.0 { nav.redirect_start } else { fetch_start };

    let mut cursor = Cursor { at: 0.0, limit: metric.value.max(0.0) };
    TtfbAttribution {
        waiting_duration: cursor.advance_to(rel(waiting_end)),
        redirect_duration: cursor.advance_to(rel(fetch_start)),
        cache_duration: cursor.advance_to(rel(nav.domain_lookup_start)),
        dns_duration: cursor.advance_to(rel(nav.connect_start)),
        connection_duration: cursor.advance_to(rel(nav.connect_end)),
        request_duration: cursor.advance_to(f64::INFINITY),
        navigation_entry: Some(nav.clone()),
    }
}
