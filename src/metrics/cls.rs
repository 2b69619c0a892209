use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::aggregate::{LayoutShiftAggregator, ShiftListener};
use crate::attribution::{attribute_cls, describe_target, largest_source, Attribution, Lookups, ShiftTargets, TargetGenerator};
use crate::entry::{LayoutShift, PerformanceEntry};
use crate::error::Result;
use crate::host::{EntryCategory, ObserveOptions, Observer};
use crate::metric::{Metric, MetricName, CLS_THRESHOLDS};
use crate::page::PageEvent;
use crate::report::{ReportCallback, ReportGate, ReportTrigger};

use super::{CalcState, Context, FcpCalculator, MetricCalculator, ReportOpts};

/// Describes the most relevant source of each shift while its node is
/// still the one the host captured.
struct TargetCapture {
    targets: Rc<RefCell<ShiftTargets>>,
    generate: Option<TargetGenerator>,
}

impl ShiftListener for TargetCapture {
    fn after_shift(&mut self, entry: &LayoutShift) -> Result<()> {
        let Some(source) = largest_source(entry) else {
            return Ok(());
        };
        let target = describe_target(source.node.as_deref(), self.generate.as_ref());
        self.targets.borrow_mut().entry(entry.key()).or_insert(target);
        Ok(())
    }
}

/// Cumulative layout shift.
///
/// Layout shifts are only observed once the page has painted content,
/// so the metric never reports before FCP would.
pub struct ClsCalculator {
    gate: ReportGate,
    generate: Option<TargetGenerator>,
    attribution: bool,
    targets: Rc<RefCell<ShiftTargets>>,
    state: CalcState,
    awaiting_activation: bool,
    fcp: FcpCalculator,
    painted: Rc<Cell<bool>>,
    shifts_supported: bool,
    observer: Option<Observer>,
    aggregator: LayoutShiftAggregator,
    metric: Option<Metric>,
    awaiting_frame: bool,
}

impl ClsCalculator {
    pub fn new(callback: ReportCallback, opts: ReportOpts) -> Self {
        let painted = Rc::new(Cell::new(false));
        let flag = painted.clone();
        let fcp = FcpCalculator::new(Box::new(move |_: &Metric| flag.set(true)), ReportOpts::default());
        Self {
            gate: ReportGate::bind(callback, CLS_THRESHOLDS, opts.report_all_changes),
            generate: opts.generate_target,
            attribution: false,
            targets: Rc::default(),
            state: CalcState::Uninitialized,
            awaiting_activation: false,
            fcp,
            painted,
            shifts_supported: true,
            observer: None,
            aggregator: LayoutShiftAggregator::new(),
            metric: None,
            awaiting_frame: false,
        }
    }

    pub fn with_attribution(mut self) -> Self {
        self.attribution = true;
        self.aggregator.add_listener(Box::new(TargetCapture {
            targets: self.targets.clone(),
            generate: self.generate.clone(),
        }));
        self
    }

    fn begin_if_painted(&mut self, cx: &mut Context<'_>) {
        if self.observer.is_some() || !self.shifts_supported || !self.painted.get() {
            return;
        }
        let observer = match Observer::observe(&*cx.host, EntryCategory::LayoutShift, ObserveOptions::buffered()) {
            Ok(observer) => observer,
            Err(err) => {
                log::debug!("CLS not observed: {err}");
                self.shifts_supported = false;
                self.state = CalcState::Finalized;
                return;
            }
        };
        self.metric = Some(cx.page.init_metric(MetricName::Cls, Some(0.0)));
        self.state = CalcState::Observing;
        let replay = observer.replay(&*cx.host);
        self.observer = Some(observer);
        self.process(cx, &replay);
        self.report(cx, ReportTrigger::change(cx.page_hidden()));
    }

    fn process(&mut self, cx: &Context<'_>, entries: &[PerformanceEntry]) {
        let Some(metric) = self.metric.as_mut() else {
            return;
        };
        let mut changed = false;
        for shift in entries.iter().filter_map(|e| e.as_layout_shift()) {
            self.aggregator.process_entry(shift);
            changed |= self.aggregator.apply(metric);
        }
        if changed {
            self.report(cx, ReportTrigger::change(cx.page_hidden()));
        }
    }

    fn report(&mut self, cx: &Context<'_>, trigger: ReportTrigger) -> bool {
        let Some(metric) = self.metric.as_mut() else {
            return false;
        };
        if !self.attribution {
            return self.gate.report(metric, trigger);
        }
        let lookups = Lookups::from_host(&*cx.host, &cx.page.navigation);
        let targets = self.targets.borrow();
        let generate = self.generate.as_ref();
        self.gate.report_with(metric, trigger, |m| {
            Some(Attribution::Cls(attribute_cls(m, &lookups, &targets, generate)))
        })
    }

    /// Drop the window state and start a new instance at 0.
    fn rearm(&mut self, cx: &Context<'_>) {
        self.aggregator.reset();
        self.targets.borrow_mut().clear();
        self.gate.rebind();
        self.metric = Some(cx.page.init_metric(MetricName::Cls, Some(0.0)));
        self.state = CalcState::Observing;
        self.awaiting_frame = false;
        if let Some(observer) = self.observer.as_mut() {
            observer.reconnect();
        }
    }

    fn finalize(&mut self, cx: &mut Context<'_>) {
        if let Some(observer) = self.observer.as_ref() {
            let pending = observer.take_records(&mut *cx.host);
            self.process(cx, &pending);
        }
        let trigger = ReportTrigger {
            is_final: true,
            page_hidden: cx.page_hidden(),
        };
        self.report(cx, trigger);
        if let Some(observer) = self.observer.as_mut() {
            observer.disconnect();
        }
        self.awaiting_frame = false;
        self.state = CalcState::Finalized;
    }
}

impl MetricCalculator for ClsCalculator {
    fn name(&self) -> MetricName {
        MetricName::Cls
    }

    fn state(&self) -> CalcState {
        self.state
    }

    fn start(&mut self, cx: &mut Context<'_>) {
        if cx.page.visibility.is_prerendering() {
            self.awaiting_activation = true;
            return;
        }
        self.state = CalcState::Observing;
        self.fcp.start(cx);
        self.begin_if_painted(cx);
    }

    fn handle_entries(&mut self, cx: &mut Context<'_>, batch: &[PerformanceEntry]) {
        if self.state != CalcState::Observing {
            return;
        }
        let Some(observer) = self.observer.as_ref() else {
            // The replay in begin_if_painted already covers this batch.
            self.fcp.handle_entries(cx, batch);
            self.begin_if_painted(cx);
            return;
        };
        let accepted: Vec<PerformanceEntry> = observer.filter(batch).cloned().collect();
        self.process(cx, &accepted);
    }

    fn handle_event(&mut self, cx: &mut Context<'_>, event: &PageEvent) {
        if self.awaiting_activation {
            if let PageEvent::PrerenderingActivated { .. } = event {
                self.awaiting_activation = false;
                self.start(cx);
            }
            return;
        }
        if self.observer.is_none() {
            if !self.shifts_supported {
                return;
            }
            // Still waiting for content to paint.
            self.fcp.handle_event(cx, event);
            self.state = match self.fcp.state() {
                CalcState::Finalized => CalcState::Finalized,
                _ => CalcState::Observing,
            };
            self.begin_if_painted(cx);
            if self.observer.is_none() {
                return;
            }
        }

        match *event {
            PageEvent::Restore { .. } => {
                self.rearm(cx);
                self.awaiting_frame = true;
            }
            PageEvent::FramePresented { .. } if self.awaiting_frame => {
                self.awaiting_frame = false;
                self.report(cx, ReportTrigger::change(cx.page_hidden()));
            }
            PageEvent::SoftNavigation { .. } => {
                if self.state == CalcState::Observing {
                    self.finalize(cx);
                }
                self.rearm(cx);
                self.report(cx, ReportTrigger::change(cx.page_hidden()));
            }
            _ if event.ends_observation() && self.state == CalcState::Observing => self.finalize(cx),
            _ => {}
        }
    }
}
