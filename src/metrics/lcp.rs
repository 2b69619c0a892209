use std::cell::RefCell;
use std::rc::Rc;

use crate::aggregate::{LargestPaintAggregator, PaintListener};
use crate::attribution::{attribute_lcp, describe_target, Attribution, Lookups, PaintTargets, TargetGenerator};
use crate::entry::{LargestContentfulPaint, PerformanceEntry};
use crate::error::Result;
use crate::host::{EntryCategory, ObserveOptions, Observer};
use crate::metric::{Metric, MetricName, LCP_THRESHOLDS};
use crate::page::PageEvent;
use crate::report::{ReportCallback, ReportGate, ReportTrigger};

use super::{CalcState, Context, MetricCalculator, ReportOpts};

struct TargetCapture {
    targets: Rc<RefCell<PaintTargets>>,
    generate: Option<TargetGenerator>,
}

impl PaintListener for TargetCapture {
    fn before_entry(&mut self, entry: &LargestContentfulPaint) -> Result<()> {
        if let Some(element) = entry.element.as_deref() {
            let generate = self.generate.as_ref();
            self.targets
                .borrow_mut()
                .entry(entry.key())
                .or_insert_with(|| describe_target(Some(element), generate));
        }
        Ok(())
    }
}

/// Largest contentful paint.
///
/// The candidate keeps moving until the user interacts with the page or
/// it is hidden; listening stops at most once per instance.
pub struct LcpCalculator {
    gate: ReportGate,
    report_all_changes: bool,
    generate: Option<TargetGenerator>,
    attribution: bool,
    targets: Rc<RefCell<PaintTargets>>,
    state: CalcState,
    awaiting_activation: bool,
    observer: Option<Observer>,
    aggregator: LargestPaintAggregator,
    metric: Option<Metric>,
    restored_at: Option<f64>,
}

impl LcpCalculator {
    pub fn new(callback: ReportCallback, opts: ReportOpts) -> Self {
        Self {
            gate: ReportGate::bind(callback, LCP_THRESHOLDS, opts.report_all_changes),
            report_all_changes: opts.report_all_changes,
            generate: opts.generate_target,
            attribution: false,
            targets: Rc::default(),
            state: CalcState::Uninitialized,
            awaiting_activation: false,
            observer: None,
            aggregator: LargestPaintAggregator::new(),
            metric: None,
            restored_at: None,
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

    fn begin(&mut self, cx: &mut Context<'_>) {
        let observer =
            match Observer::observe(&*cx.host, EntryCategory::LargestContentfulPaint, ObserveOptions::buffered()) {
                Ok(observer) => observer,
                Err(err) => {
                    log::debug!("LCP not observed: {err}");
                    self.state = CalcState::Finalized;
                    return;
                }
            };
        self.metric = Some(cx.page.init_metric(MetricName::Lcp, None));
        self.state = CalcState::Observing;
        let replay = observer.replay(&*cx.host);
        self.observer = Some(observer);
        self.process(cx, &replay);
    }

    fn process(&mut self, cx: &Context<'_>, entries: &[PerformanceEntry]) {
        let candidates: Vec<&LargestContentfulPaint> = entries
            .iter()
            .filter_map(|e| e.as_largest_contentful_paint())
            .filter(|e| cx.page.navigation.owns(e.navigation_id))
            .collect();
        // Only the newest candidate of a batch matters unless every change
        // is reported.
        let skip = if self.report_all_changes {
            0
        } else {
            candidates.len().saturating_sub(1)
        };

        for entry in &candidates[skip..] {
            if !self.aggregator.process_entry(entry, cx.first_hidden_time()) {
                continue;
            }
            if let Some(metric) = self.metric.as_mut() {
                metric.value = (entry.start_time() - cx.page.navigation.time_origin()).max(0.0);
                metric.entries = vec![PerformanceEntry::LargestContentfulPaint((*entry).clone())];
            }
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
            Some(Attribution::Lcp(attribute_lcp(m, &lookups, &targets, generate)))
        })
    }

    /// Take the last candidate as final. Runs at most once per instance.
    fn stop_listening(&mut self, cx: &mut Context<'_>) {
        if self.state != CalcState::Observing || self.restored_at.is_some() {
            return;
        }
        if let Some(observer) = self.observer.as_ref() {
            let pending = observer.take_records(&mut *cx.host);
            self.process(cx, &pending);
        }
        if let Some(observer) = self.observer.as_mut() {
            observer.disconnect();
        }
        let trigger = ReportTrigger {
            is_final: true,
            page_hidden: cx.page_hidden(),
        };
        self.report(cx, trigger);
        self.state = CalcState::Finalized;
    }

    fn rearm(&mut self, cx: &Context<'_>) {
        self.aggregator.reset();
        self.targets.borrow_mut().clear();
        self.gate.rebind();
        self.metric = Some(cx.page.init_metric(MetricName::Lcp, None));
        self.state = CalcState::Observing;
        self.restored_at = None;
    }
}

impl MetricCalculator for LcpCalculator {
    fn name(&self) -> MetricName {
        MetricName::Lcp
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
        if self.state != CalcState::Observing || self.restored_at.is_some() {
            return;
        }
        let Some(observer) = self.observer.as_ref() else {
            return;
        };
        let accepted: Vec<PerformanceEntry> = observer.filter(batch).cloned().collect();
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
            PageEvent::Input { .. } => self.stop_listening(cx),
            PageEvent::Restore { time_stamp } if self.observer.is_some() => {
                self.rearm(cx);
                self.restored_at = Some(time_stamp);
            }
            PageEvent::FramePresented { time_stamp } => {
                let Some(restored) = self.restored_at.take() else {
                    return;
                };
                if let Some(metric) = self.metric.as_mut() {
                    metric.value = (time_stamp - restored).max(0.0);
                }
                self.report(cx, ReportTrigger::finalize());
                self.state = CalcState::Finalized;
            }
            PageEvent::SoftNavigation { .. } if self.observer.is_some() => {
                self.stop_listening(cx);
                self.rearm(cx);
                let replay = match self.observer.as_mut() {
                    Some(observer) => {
                        observer.reconnect();
                        observer.replay(&*cx.host)
                    }
                    None => Vec::new(),
                };
                self.process(cx, &replay);
            }
            _ if event.ends_observation() => {
                if self.restored_at.take().is_some() {
                    self.state = CalcState::Finalized;
                } else {
                    self.stop_listening(cx);
                }
            }
            _ => {}
        }
    }
}
