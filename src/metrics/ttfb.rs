use crate::attribution::{attribute_ttfb, Attribution, Lookups};
use crate::entry::{NavigationTiming, PerformanceEntry};
use crate::error::{Result, VitalsError};
use crate::host::{EntryCategory, PerformanceHost};
use crate::metric::{Metric, MetricName, TTFB_THRESHOLDS};
use crate::page::PageEvent;
use crate::report::{ReportCallback, ReportGate, ReportTrigger};

use super::{CalcState, Context, MetricCalculator, ReportOpts};

/// Read the navigation record, rejecting a response start that is unset
/// or lies in the future.
fn navigation_record(host: &dyn PerformanceHost) -> Result<NavigationTiming> {
    let navigation = host
        .navigation_entry()
        .ok_or(VitalsError::Unsupported(EntryCategory::Navigation))?;
    let response_start = navigation.response_start;
    if response_start <= 0.0 || response_start >= host.now() {
        return Err(VitalsError::InvalidTimestamp {
            field: "responseStart",
            value: response_start,
        });
    }
    Ok(navigation)
}

/// Time to first byte. Measured once the document has loaded.
pub struct TtfbCalculator {
    gate: ReportGate,
    attribution: bool,
    state: CalcState,
    awaiting_activation: bool,
    metric: Option<Metric>,
}

impl TtfbCalculator {
    pub fn new(callback: ReportCallback, opts: ReportOpts) -> Self {
        Self {
            gate: ReportGate::bind(callback, TTFB_THRESHOLDS, opts.report_all_changes),
            attribution: false,
            state: CalcState::Uninitialized,
            awaiting_activation: false,
            metric: None,
        }
    }

    pub fn with_attribution(mut self) -> Self {
        self.attribution = true;
        self
    }

    fn begin(&mut self, cx: &mut Context<'_>) {
        self.metric = Some(cx.page.init_metric(MetricName::Ttfb, None));
        self.state = CalcState::Observing;
        if cx.page.is_loaded() {
            self.complete(cx);
        }
    }

    /// Measure from the navigation record and finalize, reported or not.
    fn complete(&mut self, cx: &mut Context<'_>) {
        if self.state != CalcState::Observing {
            return;
        }
        self.state = CalcState::Finalized;
        let navigation = match navigation_record(&*cx.host) {
            Ok(navigation) => navigation,
            Err(err) => {
                log::debug!("TTFB not reported: {err}");
                return;
            }
        };
        if let Some(metric) = self.metric.as_mut() {
            metric.value = (navigation.response_start - cx.page.navigation.activation_start()).max(0.0);
            metric.entries = vec![PerformanceEntry::Navigation(navigation)];
        }
        self.report(cx, ReportTrigger::finalize());
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
            .report_with(metric, trigger, |m| Some(Attribution::Ttfb(attribute_ttfb(m, &lookups))))
    }

    /// A navigation that never hit the network: report 0 right away.
    fn report_zero(&mut self, cx: &Context<'_>) {
        self.gate.rebind();
        self.metric = Some(cx.page.init_metric(MetricName::Ttfb, Some(0.0)));
        self.state = CalcState::Finalized;
        self.report(cx, ReportTrigger::finalize());
    }
}

impl MetricCalculator for TtfbCalculator {
    fn name(&self) -> MetricName {
        MetricName::Ttfb
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

    fn handle_entries(&mut self, _cx: &mut Context<'_>, _batch: &[PerformanceEntry]) {}

    fn handle_event(&mut self, cx: &mut Context<'_>, event: &PageEvent) {
        match *event {
            PageEvent::PrerenderingActivated { .. } if self.awaiting_activation => {
                self.awaiting_activation = false;
                self.begin(cx);
            }
            PageEvent::Load { .. } => self.complete(cx),
            PageEvent::Restore { .. } | PageEvent::SoftNavigation { .. } if self.metric.is_some() => {
                self.report_zero(cx);
            }
            // Hidden or finalized pages keep waiting: the record is only
            // complete once the document has loaded.
            _ => {}
        }
    }
}
