use std::cell::RefCell;
use std::rc::Rc;

use crate::aggregate::{InteractionAggregator, InteractionListener};
use crate::attribution::{
    attribute_inp, describe_target, Attribution, FrameGroups, InteractionTargets, Lookups, TargetGenerator,
};
use crate::entry::{EventTiming, PerformanceEntry};
use crate::error::Result;
use crate::host::{EntryCategory, ObserveOptions, Observer};
use crate::metric::{Metric, MetricName, INP_THRESHOLDS};
use crate::page::PageEvent;
use crate::report::{ReportCallback, ReportGate, ReportTrigger};

use super::{CalcState, Context, MetricCalculator, ReportOpts};

/// Hosts do not deliver `event` entries shorter than this.
pub const MIN_DURATION_THRESHOLD: f64 = 16.0;

/// Groups every entry into frames and remembers what each interaction
/// targeted before the node can change.
struct FrameCapture {
    groups: Rc<RefCell<FrameGroups>>,
    targets: Rc<RefCell<InteractionTargets>>,
    generate: Option<TargetGenerator>,
}

impl InteractionListener for FrameCapture {
    fn before_entry(&mut self, entry: &EventTiming) -> Result<()> {
        self.groups.borrow_mut().add_event(entry);
        if let (Some(id), Some(node)) = (entry.interaction_key(), entry.target.as_deref()) {
            let mut targets = self.targets.borrow_mut();
            if !targets.contains_key(&id) {
                targets.insert(id, describe_target(Some(node), self.generate.as_ref()));
            }
        }
        Ok(())
    }
}

/// Interaction to next paint.
pub struct InpCalculator {
    gate: ReportGate,
    duration_threshold: f64,
    generate: Option<TargetGenerator>,
    attribution: bool,
    groups: Rc<RefCell<FrameGroups>>,
    targets: Rc<RefCell<InteractionTargets>>,
    state: CalcState,
    awaiting_activation: bool,
    events: Option<Observer>,
    first_input: Option<Observer>,
    long_frames: Option<Observer>,
    aggregator: InteractionAggregator,
    metric: Option<Metric>,
}

impl InpCalculator {
    pub fn new(callback: ReportCallback, opts: ReportOpts) -> Self {
        Self {
            gate: ReportGate::bind(callback, INP_THRESHOLDS, opts.report_all_changes),
            duration_threshold: opts.duration_threshold().max(MIN_DURATION_THRESHOLD),
            generate: opts.generate_target,
            attribution: false,
            groups: Rc::default(),
            targets: Rc::default(),
            state: CalcState::Uninitialized,
            awaiting_activation: false,
            events: None,
            first_input: None,
            long_frames: None,
            aggregator: InteractionAggregator::new(),
            metric: None,
        }
    }

    pub fn with_attribution(mut self) -> Self {
        self.attribution = true;
        self.aggregator.add_listener(Box::new(FrameCapture {
            groups: self.groups.clone(),
            targets: self.targets.clone(),
            generate: self.generate.clone(),
        }));
        self
    }

    fn observers(&self) -> impl Iterator<Item = &Observer> + '_ {
        self.events.iter().chain(&self.first_input).chain(&self.long_frames)
    }

    fn begin(&mut self, cx: &mut Context<'_>) {
        let options = ObserveOptions::buffered().with_duration_threshold(self.duration_threshold);
        let events = match Observer::observe(&*cx.host, EntryCategory::Event, options) {
            Ok(observer) => observer,
            Err(err) => {
                log::debug!("INP not observed: {err}");
                self.state = CalcState::Finalized;
                return;
            }
        };
        self.events = Some(events);
        self.first_input = Observer::observe(&*cx.host, EntryCategory::FirstInput, ObserveOptions::buffered()).ok();
        if self.attribution {
            self.long_frames =
                Observer::observe(&*cx.host, EntryCategory::LongAnimationFrame, ObserveOptions::buffered()).ok();
        }
        self.metric = Some(cx.page.init_metric(MetricName::Inp, None));
        self.state = CalcState::Observing;

        let replay: Vec<PerformanceEntry> = self.observers().flat_map(|o| o.replay(&*cx.host)).collect();
        self.process(cx, &replay);
    }

    fn process(&mut self, cx: &Context<'_>, entries: &[PerformanceEntry]) {
        self.absorb(entries);
        self.update(cx, ReportTrigger::change(cx.page_hidden()));
    }

    fn absorb(&mut self, entries: &[PerformanceEntry]) {
        for entry in entries {
            match entry {
                PerformanceEntry::Event(event) => self.aggregator.process_entry(event),
                PerformanceEntry::LongAnimationFrame(frame) => self.groups.borrow_mut().add_long_frame(frame),
                _ => {}
            }
        }
        if self.attribution {
            let aggregator = &self.aggregator;
            self.groups.borrow_mut().prune(|group| {
                group
                    .entries
                    .iter()
                    .filter_map(|e| e.interaction_key())
                    .any(|id| aggregator.contains(id))
            });
        }
    }

    /// Move the metric to the current estimate and try to report it.
    fn update(&mut self, cx: &Context<'_>, trigger: ReportTrigger) {
        let count = cx.page.interaction_count(&*cx.host);
        if let (Some(metric), Some(inp)) = (self.metric.as_mut(), self.aggregator.estimate_p98(count)) {
            metric.value = inp.latency;
            metric.entries = inp.entries.iter().cloned().map(PerformanceEntry::Event).collect();
        }
        self.report(cx, trigger);
    }

    fn report(&mut self, cx: &Context<'_>, trigger: ReportTrigger) -> bool {
        let Some(metric) = self.metric.as_mut() else {
            return false;
        };
        if !self.attribution {
            return self.gate.report(metric, trigger);
        }
        let lookups = Lookups::from_host(&*cx.host, &cx.page.navigation);
        let groups = self.groups.borrow();
        let targets = self.targets.borrow();
        let generate = self.generate.as_ref();
        self.gate.report_with(metric, trigger, |m| {
            Some(Attribution::Inp(attribute_inp(m, &groups, &targets, &lookups, generate)))
        })
    }

    fn finalize(&mut self, cx: &mut Context<'_>) {
        let mut pending = Vec::new();
        for observer in self.observers() {
            pending.extend(observer.take_records(&mut *cx.host));
        }
        self.absorb(&pending);
        let trigger = ReportTrigger {
            is_final: true,
            page_hidden: cx.page_hidden(),
        };
        self.update(cx, trigger);
        for observer in [&mut self.events, &mut self.first_input, &mut self.long_frames].into_iter().flatten() {
            observer.disconnect();
        }
        self.state = CalcState::Finalized;
    }

    fn rearm(&mut self, cx: &Context<'_>) {
        self.aggregator.reset(cx.page.interaction_count(&*cx.host));
        *self.groups.borrow_mut() = FrameGroups::new();
        self.targets.borrow_mut().clear();
        self.gate.rebind();
        self.metric = Some(cx.page.init_metric(MetricName::Inp, None));
        self.state = CalcState::Observing;
        for observer in [&mut self.events, &mut self.first_input, &mut self.long_frames].into_iter().flatten() {
            observer.reconnect();
        }
    }
}

impl MetricCalculator for InpCalculator {
    fn name(&self) -> MetricName {
        MetricName::Inp
    }

    fn state(&self) -> CalcState {
        self.state
    }

    fn start(&mut self, cx: &mut Context<'_>) {
        if cx.page.visibility.is_prerendering() {
            self.awaiting_activation = true;
            return;
        }
        self.begin(cx);
    }

    fn handle_entries(&mut self, cx: &mut Context<'_>, batch: &[PerformanceEntry]) {
        if self.state != CalcState::Observing {
            return;
        }
        let accepted: Vec<PerformanceEntry> = batch
            .iter()
            .filter(|e| self.observers().any(|o| o.accepts(e)))
            .cloned()
            .collect();
        if !accepted.is_empty() {
            self.process(cx, &accepted);
        }
    }

    fn handle_event(&mut self, cx: &mut Context<'_>, event: &PageEvent) {
        match *event {
            PageEvent::PrerenderingActivated { .. } if self.awaiting_activation => {
                self.awaiting_activation = false;
                self.begin(cx);
            }
            PageEvent::Restore { .. } if self.events.is_some() => self.rearm(cx),
            PageEvent::SoftNavigation { .. } if self.events.is_some() => {
                if self.state == CalcState::Observing {
                    self.finalize(cx);
                }
                self.rearm(cx);
            }
            _ if event.ends_observation() && self.state == CalcState::Observing => self.finalize(cx),
            _ => {}
        }
    }
}
