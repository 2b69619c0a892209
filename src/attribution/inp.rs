//! Interaction breakdown.
//!
//! Event entries that rendered in the same frame are grouped so the
//! processing window of a slow interaction covers every handler that ran
//! before its next paint, not just its own.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use crate::entry::{EventTiming, LongAnimationFrame};
use crate::metric::Metric;

use super::{capped, describe_target, Lookups, LoadState, TargetGenerator};

/// Render times closer than this belong to the same frame.
pub const FRAME_TOLERANCE_MS: f64 = 8.0;
/// Groups kept regardless of whether a retained interaction needs them.
pub const MAX_PREVIOUS_FRAMES: usize = 50;

/// Targets captured before processing, keyed by interaction id.
pub type InteractionTargets = HashMap<u64, Option<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InteractionType {
    Keyboard,
    Pointer,
}

impl InteractionType {
    pub fn from_event_name(name: &str) -> Self {
        if name.starts_with("key") {
            InteractionType::Keyboard
        } else {
            InteractionType::Pointer
        }
    }
}

/// Event entries presented in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryGroup {
    pub start_time: f64,
    pub processing_start: f64,
    pub processing_end: f64,
    pub render_time: f64,
    pub entries: Vec<EventTiming>,
}

impl EntryGroup {
    fn new(entry: &EventTiming) -> Self {
        Self {
            start_time: entry.start_time,
            processing_start: entry.processing_start,
            processing_end: entry.processing_end,
            render_time: entry.render_time(),
            entries: vec![entry.clone()],
        }
    }

    fn absorb(&mut self, entry: &EventTiming) {
        self.start_time = self.start_time.min(entry.start_time);
        self.processing_start = self.processing_start.min(entry.processing_start);
        self.processing_end = self.processing_end.max(entry.processing_end);
        self.entries.push(entry.clone());
    }

    fn intersects(&self, frame: &LongAnimationFrame) -> bool {
        frame.start_time < self.render_time && frame.end_time() > self.start_time
    }
}

/// Recent frame groups and the long animation frames overlapping them.
#[derive(Debug, Default)]
pub struct FrameGroups {
    groups: Vec<EntryGroup>,
    long_frames: Vec<LongAnimationFrame>,
}

impl FrameGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn groups(&self) -> &[EntryGroup] {
        &self.groups
    }

    pub fn long_frames(&self) -> &[LongAnimationFrame] {
        &self.long_frames
    }

    pub fn add_event(&mut self, entry: &EventTiming) {
        let render_time = entry.render_time();
        let existing = self
            .groups
            .iter_mut()
            .rev()
            .find(|g| (g.render_time - render_time).abs() <= FRAME_TOLERANCE_MS);
        match existing {
            Some(group) => group.absorb(entry),
            None => self.groups.push(EntryGroup::new(entry)),
        }
    }

    pub fn add_long_frame(&mut self, frame: &LongAnimationFrame) {
        self.long_frames.push(frame.clone());
    }

    /// Group the entry was presented in.
    pub fn group_for(&self, entry: &EventTiming) -> Option<&EntryGroup> {
        let render_time = entry.render_time();
        self.groups
            .iter()
            .rev()
            .find(|g| (g.render_time - render_time).abs() <= FRAME_TOLERANCE_MS)
    }

    /// Keep the newest groups plus every group `retained` asks for, then
    /// drop long frames no kept group overlaps.
    pub fn prune<F>(&mut self, retained: F)
    where
        F: Fn(&EntryGroup) -> bool,
    {
        let recent_from = self.groups.len().saturating_sub(MAX_PREVIOUS_FRAMES);
        let mut index = 0;
        self.groups.retain(|g| {
            let keep = index >= recent_from || retained(g);
            index += 1;
            keep
        });
        let groups = &self.groups;
        self.long_frames.retain(|f| groups.iter().any(|g| g.intersects(f)));
    }

    pub fn long_frames_between(&self, start: f64, end: f64) -> Vec<LongAnimationFrame> {
        self.long_frames
            .iter()
            .filter(|f| f.start_time < end && f.end_time() > start)
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InpAttribution {
    pub interaction_target: Option<String>,
    pub interaction_time: f64,
    pub interaction_type: InteractionType,
    pub next_paint_time: f64,
    pub processed_event_entries: Vec<EventTiming>,
    pub long_animation_frame_entries: Vec<LongAnimationFrame>,
    pub input_delay: f64,
    pub processing_duration: f64,
    pub presentation_delay: f64,
    pub load_state: LoadState,
}

pub fn attribute_inp(
    metric: &Metric,
    groups: &FrameGroups,
    targets: &InteractionTargets,
    lookups: &Lookups,
    generate: Option<&TargetGenerator>,
) -> InpAttribution {
    let value = metric.value.max(0.0);
    let Some(first) = metric.entries.iter().find_map(|e| e.as_event()) else {
        return InpAttribution {
            interaction_target: None,
            interaction_time: 0.0,
            interaction_type: InteractionType::Pointer,
            next_paint_time: 0.0,
            processed_event_entries: Vec::new(),
            long_animation_frame_entries: Vec::new(),
            input_delay: 0.0,
            processing_duration: 0.0,
            presentation_delay: 0.0,
            load_state: lookups.load_state(0.0),
        };
    };

    let group = groups.group_for(first);
    let processing_start = group.map_or(first.processing_start, |g| g.processing_start);
    let mut processed: Vec<EventTiming> = match group {
        Some(g) => g.entries.clone(),
        None => metric.entries.iter().filter_map(|e| e.as_event()).cloned().collect(),
    };
    processed.sort_by(|a, b| {
        a.processing_start
            .partial_cmp(&b.processing_start)
            .unwrap_or(Ordering::Equal)
    });

    let next_paint_time = first.render_time().max(processing_start);
    let processing_end = group
        .map_or(first.processing_end, |g| g.processing_end)
        .min(next_paint_time);

    let input_delay = capped(processing_start - first.start_time, 0.0, value);
    let processing_duration = capped(processing_end - processing_start, input_delay, value);
    let presentation_delay = capped(
        next_paint_time - processing_end,
        input_delay + processing_duration,
        value,
    );

    let interaction_target = match first.interaction_key().and_then(|id| targets.get(&id)) {
        Some(captured) => captured.clone(),
        None => describe_target(first.target.as_deref(), generate),
    };

    InpAttribution {
        interaction_target,
        interaction_time: first.start_time,
        interaction_type: InteractionType::from_event_name(&first.name),
        next_paint_time,
        processed_event_entries: processed,
        long_animation_frame_entries: groups.long_frames_between(first.start_time, processing_end),
        input_delay,
        processing_duration,
        presentation_delay,
        load_state: lookups.load_state(first.start_time),
    }
}
