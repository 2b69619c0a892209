//! In-crate stand-ins for the host and the caller.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use crate::attribution::Lookups;
use crate::engine::WebVitals;
use crate::entry::{
    EventEntryType, EventTiming, LargestContentfulPaint, LayoutShift, NavigationTiming, NavigationTimingType,
    PaintTiming, PerformanceEntry, ResourceTiming, FIRST_CONTENTFUL_PAINT,
};
use crate::host::{EntryCategory, PerformanceHost, ReadyState, VisibilityState};
use crate::metric::Metric;
use crate::report::ReportCallback;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Scriptable host. Entries passed to [`record`](FakeHost::record) become
/// the buffer; [`queue_pending`](FakeHost::queue_pending) entries are only
/// reachable through `take_records`.
pub struct FakeHost {
    pub now: f64,
    pub visibility: VisibilityState,
    pub prerendering: bool,
    pub discarded: bool,
    pub ready: ReadyState,
    pub navigation: Option<NavigationTiming>,
    pub resources: Vec<ResourceTiming>,
    pub native_interaction_count: Option<u64>,
    unsupported: HashSet<EntryCategory>,
    log: Vec<PerformanceEntry>,
    pending: Vec<PerformanceEntry>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            now: 10_000.0,
            visibility: VisibilityState::Visible,
            prerendering: false,
            discarded: false,
            ready: ReadyState::Complete,
            navigation: Some(navigation()),
            resources: Vec::new(),
            native_interaction_count: None,
            unsupported: HashSet::new(),
            log: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub fn without(mut self, category: EntryCategory) -> Self {
        self.unsupported.insert(category);
        self
    }

    pub fn record(&mut self, entries: &[PerformanceEntry]) {
        self.log.extend_from_slice(entries);
    }

    pub fn queue_pending(&mut self, entries: &[PerformanceEntry]) {
        self.pending.extend_from_slice(entries);
    }
}

impl PerformanceHost for FakeHost {
    fn now(&self) -> f64 {
        self.now
    }

    fn supports(&self, category: EntryCategory) -> bool {
        !self.unsupported.contains(&category)
    }

    fn buffered_entries(&self, category: EntryCategory) -> Vec<PerformanceEntry> {
        self.log.iter().filter(|e| e.category() == category).cloned().collect()
    }

    fn take_records(&mut self, category: EntryCategory) -> Vec<PerformanceEntry> {
        let (taken, kept): (Vec<_>, Vec<_>) = self.pending.drain(..).partition(|e| e.category() == category);
        self.pending = kept;
        self.log.extend(taken.iter().cloned());
        taken
    }

    fn navigation_entry(&self) -> Option<NavigationTiming> {
        self.navigation.clone()
    }

    fn resource_entries(&self) -> Vec<ResourceTiming> {
        self.resources.clone()
    }

    fn visibility_state(&self) -> VisibilityState {
        self.visibility
    }

    fn is_prerendering(&self) -> bool {
        self.prerendering
    }

    fn was_discarded(&self) -> bool {
        self.discarded
    }

    fn ready_state(&self) -> ReadyState {
        self.ready
    }

    fn interaction_count(&self) -> Option<u64> {
        self.native_interaction_count
    }
}

/// A plain, fully loaded navigation with no redirect or worker.
pub fn navigation() -> NavigationTiming {
    NavigationTiming {
        name: "https://example.com/".into(),
        nav_type: NavigationTimingType::Navigate,
        activation_start: 0.0,
        worker_start: 0.0,
        redirect_start: 0.0,
        redirect_end: 0.0,
        fetch_start: 10.0,
        domain_lookup_start: 20.0,
        domain_lookup_end: 60.0,
        connect_start: 60.0,
        connect_end: 120.0,
        request_start: 130.0,
        response_start: 300.0,
        response_end: 400.0,
        dom_interactive: 900.0,
        dom_content_loaded_event_start: 1000.0,
        dom_complete: 1800.0,
        load_event_end: 1850.0,
    }
}

pub fn lookups(navigation: Option<NavigationTiming>) -> Lookups {
    Lookups {
        navigation,
        resources: Vec::new(),
        ready_state: ReadyState::Complete,
        restore_time: None,
    }
}

pub fn event_timing(interaction_id: Option<u64>, name: &str, start: f64, duration: f64) -> EventTiming {
    EventTiming {
        entry_type: EventEntryType::Event,
        name: name.into(),
        start_time: start,
        duration,
        processing_start: start,
        processing_end: start + duration / 2.0,
        interaction_id,
        target: None,
    }
}

pub fn event(interaction_id: u64, name: &str, start: f64, duration: f64) -> PerformanceEntry {
    PerformanceEntry::Event(event_timing(Some(interaction_id), name, start, duration))
}

pub fn layout_shift(value: f64, start: f64) -> LayoutShift {
    LayoutShift {
        start_time: start,
        value,
        had_recent_input: false,
        sources: Vec::new(),
    }
}

pub fn shift(value: f64, start: f64) -> PerformanceEntry {
    PerformanceEntry::LayoutShift(layout_shift(value, start))
}

pub fn fcp(start: f64) -> PerformanceEntry {
    PerformanceEntry::Paint(PaintTiming {
        name: FIRST_CONTENTFUL_PAINT.into(),
        start_time: start,
        navigation_id: None,
    })
}

pub fn lcp_entry(render_time: f64, size: f64, url: Option<&str>) -> LargestContentfulPaint {
    LargestContentfulPaint {
        render_time,
        load_time: 0.0,
        size,
        id: String::new(),
        url: url.map(str::to_owned),
        element: None,
        navigation_id: None,
    }
}

pub fn lcp(render_time: f64, size: f64) -> PerformanceEntry {
    PerformanceEntry::LargestContentfulPaint(lcp_entry(render_time, size, None))
}

/// Records every snapshot handed to a callback.
#[derive(Clone, Default)]
pub struct Collector {
    seen: Rc<RefCell<Vec<Metric>>>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback(&self) -> ReportCallback {
        let seen = self.seen.clone();
        Box::new(move |metric: &Metric| seen.borrow_mut().push(metric.clone()))
    }

    pub fn take(&self) -> Vec<Metric> {
        self.seen.borrow_mut().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.seen.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.borrow().is_empty()
    }
}

/// Deliver `entries` the way a host does: buffer them, then push the batch.
pub fn feed(vitals: &mut WebVitals<FakeHost>, entries: &[PerformanceEntry]) {
    vitals.host_mut().record(entries);
    vitals.deliver(entries);
}
