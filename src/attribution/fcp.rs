use serde::Serialize;

use crate::entry::{NavigationTiming, PaintTiming};
use crate::metric::Metric;

use super::{Lookups, LoadState};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FcpAttribution {
    pub time_to_first_byte: f64,
    pub first_byte_to_fcp: f64,
    pub load_state: LoadState,
    pub navigation_entry: Option<NavigationTiming>,
    pub fcp_entry: Option<PaintTiming>,
}

/// Split the paint time at the first byte of the response.
pub fn attribute_fcp(metric: &Metric, lookups: &Lookups) -> FcpAttribution {
    let value = metric.value.max(0.0);
    let fcp_entry = metric.entries.iter().find_map(|e| e.as_paint()).cloned();

    match (lookups.navigation.as_ref(), fcp_entry) {
        (Some(nav), Some(paint)) => {
            let ttfb = (nav.response_start - nav.activation_start).max(0.0).min(value);
            FcpAttribution {
                time_to_first_byte: ttfb,
                first_byte_to_fcp: value - ttfb,
                load_state: lookups.load_state(paint.start_time),
                navigation_entry: Some(nav.clone()),
                fcp_entry: Some(paint),
            }
        }
        (_, fcp_entry) => FcpAttribution {
            time_to_first_byte: 0.0,
            first_byte_to_fcp: value,
            load_state: lookups.load_state(lookups.restore_time.unwrap_or(value)),
            navigation_entry: None,
            fcp_entry,
        },
    }
}
