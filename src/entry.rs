//! Timing entries delivered by the host.
//!
//! All timestamps are milliseconds relative to the page's time origin.

use std::sync::Arc;

use serde::Serialize;

use crate::dom::TargetNode;
use crate::host::EntryCategory;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutShiftSource {
    #[serde(skip)]
    pub node: Option<Arc<TargetNode>>,
    pub previous_rect: Rect,
    pub current_rect: Rect,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutShift {
    pub start_time: f64,
    pub value: f64,
    pub had_recent_input: bool,
    pub sources: Vec<LayoutShiftSource>,
}

impl LayoutShift {
    /// Identity used to look up data captured for this entry
    pub fn key(&self) -> (u64, u64) {
        (self.start_time.to_bits(), self.value.to_bits())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaintTiming {
    /// `first-paint` or `first-contentful-paint`
    pub name: String,
    pub start_time: f64,
    /// Soft navigation this paint belongs to, if any
    pub navigation_id: Option<u64>,
}

pub const FIRST_CONTENTFUL_PAINT: &str = "first-contentful-paint";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LargestContentfulPaint {
    pub render_time: f64,
    pub load_time: f64,
    pub size: f64,
    pub id: String,
    pub url: Option<String>,
    #[serde(skip)]
    pub element: Option<Arc<TargetNode>>,
    pub navigation_id: Option<u64>,
}

impl LargestContentfulPaint {
    /// Render time, falling back to load time when rendering was not
    /// exposed (cross-origin images without timing headers).
    pub fn start_time(&self) -> f64 {
        if self.render_time > 0.0 {
            self.render_time
        } else {
            self.load_time
        }
    }

    pub fn key(&self) -> (u64, u64) {
        (self.start_time().to_bits(), self.size.to_bits())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventEntryType {
    Event,
    FirstInput,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTiming {
    #[serde(skip)]
    pub entry_type: EventEntryType,
    /// DOM event name, e.g. `pointerdown`, `keydown`, `click`
    pub name: String,
    pub start_time: f64,
    pub duration: f64,
    pub processing_start: f64,
    pub processing_end: f64,
    pub interaction_id: Option<u64>,
    #[serde(skip)]
    pub target: Option<Arc<TargetNode>>,
}

impl EventTiming {
    /// Key under which this entry groups into an interaction.
    ///
    /// `first-input` entries always qualify; hosts that predate
    /// interaction ids report them under id 0.
    pub fn interaction_key(&self) -> Option<u64> {
        match (self.interaction_id, self.entry_type) {
            (Some(id), _) if id > 0 => Some(id),
            (_, EventEntryType::FirstInput) => Some(self.interaction_id.unwrap_or(0)),
            _ => None,
        }
    }

    pub fn render_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LongAnimationFrame {
    pub start_time: f64,
    pub duration: f64,
    pub render_start: f64,
    pub blocking_duration: f64,
}

impl LongAnimationFrame {
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationTimingType {
    #[default]
    Navigate,
    Reload,
    BackForward,
    Prerender,
}

/// The page's navigation record. Unset timestamps are 0.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationTiming {
    pub name: String,
    #[serde(rename = "type")]
    pub nav_type: NavigationTimingType,
    pub activation_start: f64,
    pub worker_start: f64,
    pub redirect_start: f64,
    pub redirect_end: f64,
    pub fetch_start: f64,
    pub domain_lookup_start: f64,
    pub domain_lookup_end: f64,
    pub connect_start: f64,
    pub connect_end: f64,
    pub request_start: f64,
    pub response_start: f64,
    pub response_end: f64,
    pub dom_interactive: f64,
    pub dom_content_loaded_event_start: f64,
    pub dom_complete: f64,
    pub load_event_end: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTiming {
    pub name: String,
    pub start_time: f64,
    pub request_start: f64,
    pub response_end: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "entryType", rename_all = "kebab-case")]
pub enum PerformanceEntry {
    LayoutShift(LayoutShift),
    Paint(PaintTiming),
    LargestContentfulPaint(LargestContentfulPaint),
    Event(EventTiming),
    LongAnimationFrame(LongAnimationFrame),
    Navigation(NavigationTiming),
    Resource(ResourceTiming),
}

impl PerformanceEntry {
    pub fn category(&self) -> EntryCategory {
        match self {
            PerformanceEntry::LayoutShift(_) => EntryCategory::LayoutShift,
            PerformanceEntry::Paint(_) => EntryCategory::Paint,
            PerformanceEntry::LargestContentfulPaint(_) => EntryCategory::LargestContentfulPaint,
            PerformanceEntry::Event(e) => match e.entry_type {
                EventEntryType::Event => EntryCategory::Event,
                EventEntryType::FirstInput => EntryCategory::FirstInput,
            },
            PerformanceEntry::LongAnimationFrame(_) => EntryCategory::LongAnimationFrame,
            PerformanceEntry::Navigation(_) => EntryCategory::Navigation,
            PerformanceEntry::Resource(_) => EntryCategory::Resource,
        }
    }

    pub fn start_time(&self) -> f64 {
        match self {
            PerformanceEntry::LayoutShift(e) => e.start_time,
            PerformanceEntry::Paint(e) => e.start_time,
            PerformanceEntry::LargestContentfulPaint(e) => e.start_time(),
            PerformanceEntry::Event(e) => e.start_time,
            PerformanceEntry::LongAnimationFrame(e) => e.start_time,
            PerformanceEntry::Navigation(_) => 0.0,
            PerformanceEntry::Resource(e) => e.start_time,
        }
    }

    pub fn as_layout_shift(&self) -> Option<&LayoutShift> {
        match self {
            PerformanceEntry::LayoutShift(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_paint(&self) -> Option<&PaintTiming> {
        match self {
            PerformanceEntry::Paint(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_largest_contentful_paint(&self) -> Option<&LargestContentfulPaint> {
        match self {
            PerformanceEntry::LargestContentfulPaint(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_event(&self) -> Option<&EventTiming> {
        match self {
            PerformanceEntry::Event(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_long_animation_frame(&self) -> Option<&LongAnimationFrame> {
        match self {
            PerformanceEntry::LongAnimationFrame(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_navigation(&self) -> Option<&NavigationTiming> {
        match self {
            PerformanceEntry::Navigation(e) => Some(e),
            _ => None,
        }
    }
}
