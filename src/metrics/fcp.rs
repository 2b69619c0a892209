use crate::attribution::{attribute_fcp, Attribution, Lookups};
use crate::entry::{PerformanceEntry, FIRST_CONTENTFUL_PAINT};
use crate::host::{EntryCategory, ObserveOptions, Observer};
use crate::metric::{Metric, MetricName, FCP_THRESHOLDS};
use crate::page::PageEvent;
use crate::report::{ReportCallback, ReportGate, ReportTrigger};

use super::{CalcState, Context, MetricCalculator, ReportOpts};

/// First contentful paint. Single-shot per navigation.
pub struct FcpCalculator {
    gate: ReportGate,
    attribution: bool,
    state: CalcState,
    awaiting_activation: bool,
    observer: Option<Observer>,
    metric: Option<Metric>,
    /// Restore timestamp while the first frame after it is pending
    restored_at: Option<f64>,
}

impl FcpCalculator {
    pub fn new(callback: ReportCallback, opts: ReportOpts) -> Self {
        Self {
            gate: ReportGate::bind(callback, FCP_THRESHOLDS, opts.report_all_changes),
            attribution: false,
            state: CalcState::Uninitialized,
            awaiting_activation: false,
            observer: None,
            metric: None,
            restored_at: None,
        }
    }

    pub fn with_attribution(mut self) -> Self {
        self.attribution = true;
        self
    }

    fn begin(&mut self, cx: &mut Context<'_>) {
        let observer = match Observer::observe(&*cx.host, EntryCategory::Paint, ObserveOptions::buffered()) {
            Ok(observer) => observer,
            Err(err) => {
                log::debug!("FCP not observed: {err}");
                self.state = CalcState::Finalized;
                return;
            }
        };
        self.metric = Some(cx.page.init_metric(MetricName::Fcp, None));
        self.state = CalcState::Observing;
        let replay = observer.replay(&*cx.host);
        self.observer = Some(observer);
        self.process(cx, &replay);
    }

    fn process(&mut self, cx: &mut Context<'_>, entries: &[PerformanceEntry]) {
        for entry in entries {
            let Some(paint) = entry.as_paint() else {
                continue;
            };
            if paint.name != FIRST_CONTENTFUL_PAINT || !cx.page.navigation.owns(paint.navigation_id) {
                continue;
            }

            if let Some(observer) = self.observer.as_mut() {
                observer.disconnect();
            }
            if paint.start_time < cx.first_hidden_time() {
                if let Some(metric) = self.metric.as_mut() {
                    metric.value = (paint.start_time - cx.page.navigation.time_origin()).max(0.0);
                    metric.entries.push(entry.clone());
                }
                self.report(cx, ReportTrigger::finalize());
            } else {
                log::trace!("FCP at {} came after the page was hidden", paint.start_time);
            }
            self.state = CalcState::Finalized;
            return;
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
        self.gate
            .report_with(metric, trigger, |m| Some(Attribution::Fcp(attribute_fcp(m, &lookups))))
    }

    /// Fresh instance for the navigation the page state now describes.
    fn rearm(&mut self, cx: &Context<'_>) {
        self.gate.rebind();
        self.metric = Some(cx.page.init_metric(MetricName::Fcp, None));
        self.state = CalcState::Observing;
        self.restored_at = None;
    }

    fn finish(&mut self, cx: &mut Context<'_>) {
        if self.state != CalcState::Observing {
            return;
        }
        if self.restored_at.take().is_none() {
            if let Some(observer) = self.observer.as_ref() {
                let pending = observer.take_records(&mut *cx.host);
                self.process(cx, &pending);
            }
        }
        if let Some(observer) = self.observer.as_mut() {
            observer.disconnect();
        }
        self.state = CalcState::Finalized;
    }
}

impl MetricCalculator for FcpCalculator {
    fn name(&self) -> MetricName {
        MetricName::Fcp
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
        let Some(observer) = self.observer.as_ref() else {
            return;
        };
        let accepted: Vec<PerformanceEntry> = observer.filter(batch).cloned().collect();
        self.process(cx, &accepted);
    }

    fn handle_event(&mut self, cx: &mut Context<'_>, event: &PageEvent) {
        match *event {
            PageEvent::PrerenderingActivated { .. } if self.awaiting_activation => {
                self.awaiting_activation = false;
                self.begin(cx);
            }
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
            _ if event.ends_observation() => self.finish(cx),
            _ => {}
        }
    }
}
