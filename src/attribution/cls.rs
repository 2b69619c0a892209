use std::collections::HashMap;

use serde::Serialize;

use crate::entry::{LayoutShift, LayoutShiftSource};
use crate::metric::Metric;

use super::{describe_target, Lookups, LoadState, TargetGenerator};

/// Targets captured while shifts were processed, keyed by
/// [`LayoutShift::key`]. `None` means the target could not be described.
pub type ShiftTargets = HashMap<(u64, u64), Option<String>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClsAttribution {
    pub largest_shift_target: Option<String>,
    pub largest_shift_time: Option<f64>,
    pub largest_shift_value: Option<f64>,
    pub largest_shift_entry: Option<LayoutShift>,
    pub largest_shift_source: Option<LayoutShiftSource>,
    pub load_state: Option<LoadState>,
}

/// The source most worth reporting: the first one describing a rendered
/// element, otherwise the first one.
pub fn largest_source(entry: &LayoutShift) -> Option<&LayoutShiftSource> {
    entry
        .sources
        .iter()
        .find(|s| s.node.as_ref().is_some_and(|n| n.is_element()))
        .or_else(|| entry.sources.first())
}

pub fn attribute_cls(
    metric: &Metric,
    lookups: &Lookups,
    targets: &ShiftTargets,
    generate: Option<&TargetGenerator>,
) -> ClsAttribution {
    let mut largest: Option<&LayoutShift> = None;
    for entry in metric.entries.iter().filter_map(|e| e.as_layout_shift()) {
        // ties go to the later shift
        if largest.map_or(true, |l| entry.value >= l.value) {
            largest = Some(entry);
        }
    }
    let Some(largest) = largest else {
        return ClsAttribution::default();
    };

    let source = largest_source(largest);
    let target = match targets.get(&largest.key()) {
        Some(captured) => captured.clone(),
        None => describe_target(source.and_then(|s| s.node.as_deref()), generate),
    };

    ClsAttribution {
        largest_shift_target: target,
        largest_shift_time: Some(largest.start_time),
        largest_shift_value: Some(largest.value),
        largest_shift_entry: Some(largest.clone()),
        largest_shift_source: source.cloned(),
        load_state: Some(lookups.load_state(largest.start_time)),
    }
}
