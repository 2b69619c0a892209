//! Boundary to the browser-like host that produces timing entries.
//!
//! The host owns the real observation machinery. This crate only asks
//! whether a category is available, replays what was buffered, and
//! filters the batches the host pushes through [`crate::engine::WebVitals`].

use std::fmt;

use crate::entry::{NavigationTiming, PerformanceEntry, ResourceTiming};
use crate::error::{Result, VitalsError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryCategory {
    LayoutShift,
    Paint,
    LargestContentfulPaint,
    Event,
    FirstInput,
    LongAnimationFrame,
    Navigation,
    Resource,
}

impl EntryCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryCategory::LayoutShift => "layout-shift",
            EntryCategory::Paint => "paint",
            EntryCategory::LargestContentfulPaint => "largest-contentful-paint",
            EntryCategory::Event => "event",
            EntryCategory::FirstInput => "first-input",
            EntryCategory::LongAnimationFrame => "long-animation-frame",
            EntryCategory::Navigation => "navigation",
            EntryCategory::Resource => "resource",
        }
    }
}

impl fmt::Display for EntryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityState {
    Visible,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

/// Everything the engine needs from the embedding page.
pub trait PerformanceHost {
    /// Current time on the page's clock
    fn now(&self) -> f64;

    /// Whether the host delivers entries of this category.
    fn supports(&self, category: EntryCategory) -> bool;

    /// Every entry of `category` recorded so far, including those in a
    /// batch that is currently being delivered.
    fn buffered_entries(&self, category: EntryCategory) -> Vec<PerformanceEntry>;

    /// Drain entries the host has queued but not yet delivered.
    fn take_records(&mut self, category: EntryCategory) -> Vec<PerformanceEntry>;

    fn navigation_entry(&self) -> Option<NavigationTiming>;

    fn resource_entries(&self) -> Vec<ResourceTiming>;

    fn visibility_state(&self) -> VisibilityState;

    fn is_prerendering(&self) -> bool {
        false
    }

    /// Whether the page was discarded by the host and reloaded
    fn was_discarded(&self) -> bool {
        false
    }

    fn ready_state(&self) -> ReadyState;

    /// Native interaction count, when the host exposes one.
    fn interaction_count(&self) -> Option<u64> {
        None
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ObserveOptions {
    /// Replay entries recorded before the subscription
    pub buffered: bool,
    /// Minimum `event` duration delivered to this observer
    pub duration_threshold: Option<f64>,
}

impl ObserveOptions {
    pub fn buffered() -> Self {
        Self {
            buffered: true,
            duration_threshold: None,
        }
    }

    pub fn with_duration_threshold(mut self, threshold: f64) -> Self {
        self.duration_threshold = Some(threshold);
        self
    }
}

/// Subscription to a single entry category.
///
/// Once disconnected, every entry is rejected, including ones the host
/// replays late.
#[derive(Debug, Clone)]
pub struct Observer {
    category: EntryCategory,
    options: ObserveOptions,
    connected: bool,
}

impl Observer {
    /// Probe the host and subscribe. Fails with
    /// [`VitalsError::Unsupported`] when the category is unavailable.
    pub fn observe(
        host: &dyn PerformanceHost,
        category: EntryCategory,
        options: ObserveOptions,
    ) -> Result<Self> {
        if !host.supports(category) {
            return Err(VitalsError::Unsupported(category));
        }
        Ok(Self {
            category,
            options,
            connected: true,
        })
    }

    pub fn category(&self) -> EntryCategory {
        self.category
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    /// Resume after a restore.
    pub fn reconnect(&mut self) {
        self.connected = true;
    }

    pub fn accepts(&self, entry: &PerformanceEntry) -> bool {
        if !self.connected || entry.category() != self.category {
            return false;
        }
        match (self.options.duration_threshold, entry) {
            (Some(threshold), PerformanceEntry::Event(event)) if self.category == EntryCategory::Event => {
                event.duration >= threshold
            }
            _ => true,
        }
    }

    /// Entries recorded before the subscription, if buffering was requested.
    pub fn replay(&self, host: &dyn PerformanceHost) -> Vec<PerformanceEntry> {
        if !self.options.buffered {
            return Vec::new();
        }
        self.retain(host.buffered_entries(self.category))
    }

    pub fn take_records(&self, host: &mut dyn PerformanceHost) -> Vec<PerformanceEntry> {
        self.retain(host.take_records(self.category))
    }

    pub fn filter<'a>(
        &'a self,
        batch: &'a [PerformanceEntry],
    ) -> impl Iterator<Item = &'a PerformanceEntry> + 'a {
        batch.iter().filter(move |entry| self.accepts(entry))
    }

    fn retain(&self, entries: Vec<PerformanceEntry>) -> Vec<PerformanceEntry> {
        entries.into_iter().filter(|e| self.accepts(e)).collect()
    }
}
