//! Routes host batches and lifecycle events to the registered calculators.

mod batch;

use std::collections::BTreeMap;

use crate::entry::PerformanceEntry;
use crate::host::{EntryCategory, PerformanceHost};
use crate::metric::{Metric, MetricName};
use crate::metrics::{
    CalcState, ClsCalculator, Context, FcpCalculator, InpCalculator, LcpCalculator, MetricCalculator, ReportOpts,
    TtfbCalculator,
};
use crate::page::{PageEvent, PageState};
use crate::report::{ReportCallback, ReportTrigger};

use batch::BatchBinding;

fn calculator(
    name: MetricName,
    callback: ReportCallback,
    opts: ReportOpts,
    attribution: bool,
) -> Box<dyn MetricCalculator> {
    match (name, attribution) {
        (MetricName::Cls, false) => Box::new(ClsCalculator::new(callback, opts)),
        (MetricName::Cls, true) => Box::new(ClsCalculator::new(callback, opts).with_attribution()),
        (MetricName::Fcp, false) => Box::new(FcpCalculator::new(callback, opts)),
        (MetricName::Fcp, true) => Box::new(FcpCalculator::new(callback, opts).with_attribution()),
        (MetricName::Inp, false) => Box::new(InpCalculator::new(callback, opts)),
        (MetricName::Inp, true) => Box::new(InpCalculator::new(callback, opts).with_attribution()),
        (MetricName::Lcp, false) => Box::new(LcpCalculator::new(callback, opts)),
        (MetricName::Lcp, true) => Box::new(LcpCalculator::new(callback, opts).with_attribution()),
        (MetricName::Ttfb, false) => Box::new(TtfbCalculator::new(callback, opts)),
        (MetricName::Ttfb, true) => Box::new(TtfbCalculator::new(callback, opts).with_attribution()),
    }
}

/// Metric engine for one page.
///
/// Owns the host, the shared page state and every registered calculator.
/// The host pushes entry batches through [`deliver`](Self::deliver) and
/// lifecycle signals through [`dispatch`](Self::dispatch).
pub struct WebVitals<H: PerformanceHost> {
    host: H,
    page: PageState,
    calculators: Vec<Box<dyn MetricCalculator>>,
    batches: Vec<BatchBinding>,
}

impl<H: PerformanceHost> WebVitals<H> {
    pub fn new(host: H) -> Self {
        let mut page = PageState::from_host(&host);
        if host.supports(EntryCategory::Event) {
            for entry in host.buffered_entries(EntryCategory::Event) {
                if let Some(event) = entry.as_event() {
                    page.interactions.observe(event);
                }
            }
        }
        Self {
            host,
            page,
            calculators: Vec::new(),
            batches: Vec::new(),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn page(&self) -> &PageState {
        &self.page
    }

    /// Start `calculator` and route everything that follows to it.
    pub fn register(&mut self, mut calculator: Box<dyn MetricCalculator>) {
        log::debug!("register {} calculator", calculator.name());
        let mut cx = Context {
            host: &mut self.host,
            page: &self.page,
        };
        calculator.start(&mut cx);
        self.calculators.push(calculator);
    }

    fn on_metric(&mut self, name: MetricName, callback: ReportCallback, opts: ReportOpts, attribution: bool) {
        self.register(calculator(name, callback, opts, attribution));
    }

    pub fn on_cls(&mut self, callback: impl FnMut(&Metric) + 'static, opts: ReportOpts) {
        self.on_metric(MetricName::Cls, Box::new(callback), opts, false);
    }

    pub fn on_cls_with_attribution(&mut self, callback: impl FnMut(&Metric) + 'static, opts: ReportOpts) {
        self.on_metric(MetricName::Cls, Box::new(callback), opts, true);
    }

    pub fn on_fcp(&mut self, callback: impl FnMut(&Metric) + 'static, opts: ReportOpts) {
        self.on_metric(MetricName::Fcp, Box::new(callback), opts, false);
    }

    pub fn on_fcp_with_attribution(&mut self, callback: impl FnMut(&Metric) + 'static, opts: ReportOpts) {
        self.on_metric(MetricName::Fcp, Box::new(callback), opts, true);
    }

    pub fn on_inp(&mut self, callback: impl FnMut(&Metric) + 'static, opts: ReportOpts) {
        self.on_metric(MetricName::Inp, Box::new(callback), opts, false);
    }

    pub fn on_inp_with_attribution(&mut self, callback: impl FnMut(&Metric) + 'static, opts: ReportOpts) {
        self.on_metric(MetricName::Inp, Box::new(callback), opts, true);
    }

    pub fn on_lcp(&mut self, callback: impl FnMut(&Metric) + 'static, opts: ReportOpts) {
        self.on_metric(MetricName::Lcp, Box::new(callback), opts, false);
    }

    pub fn on_lcp_with_attribution(&mut self, callback: impl FnMut(&Metric) + 'static, opts: ReportOpts) {
        self.on_metric(MetricName::Lcp, Box::new(callback), opts, true);
    }

    pub fn on_ttfb(&mut self, callback: impl FnMut(&Metric) + 'static, opts: ReportOpts) {
        self.on_metric(MetricName::Ttfb, Box::new(callback), opts, false);
    }

    pub fn on_ttfb_with_attribution(&mut self, callback: impl FnMut(&Metric) + 'static, opts: ReportOpts) {
        self.on_metric(MetricName::Ttfb, Box::new(callback), opts, true);
    }

    /// Report `names` together to one callback.
    ///
    /// The set goes out whenever the policy in `opts` allows a report and
    /// at least one of its metrics changed. A member reaching its final
    /// value always allows the report.
    pub fn on_batch(
        &mut self,
        names: &[MetricName],
        callback: impl FnMut(&BTreeMap<MetricName, Metric>) + 'static,
        opts: ReportOpts,
    ) {
        let mut binding = BatchBinding::new(Box::new(callback), opts.report_all_changes);
        let inner = opts.with_report_all_changes(true);
        for &name in names {
            binding.add_member(name, self.calculators.len());
            self.on_metric(name, binding.sink(), inner.clone(), false);
        }
        self.batches.push(binding);
        let trigger = ReportTrigger::change(self.page.visibility.is_hidden());
        self.flush_batches(trigger);
    }

    /// State of the first calculator registered for `name`.
    pub fn state_of(&self, name: MetricName) -> Option<CalcState> {
        self.calculators.iter().find(|c| c.name() == name).map(|c| c.state())
    }

    /// Hand a batch of entries to every calculator, in delivery order.
    pub fn deliver(&mut self, batch: &[PerformanceEntry]) {
        log::trace!("deliver {} entries", batch.len());
        for event in batch.iter().filter_map(|e| e.as_event()) {
            self.page.interactions.observe(event);
        }
        let mut cx = Context {
            host: &mut self.host,
            page: &self.page,
        };
        for calculator in &mut self.calculators {
            calculator.handle_entries(&mut cx, batch);
        }
        let trigger = ReportTrigger::change(self.page.visibility.is_hidden());
        self.flush_batches(trigger);
    }

    /// Fold `event` into the page state, then let every calculator react.
    pub fn dispatch(&mut self, event: PageEvent) {
        log::debug!("page event {event:?}");
        self.page.apply(&event, &self.host);
        let mut cx = Context {
            host: &mut self.host,
            page: &self.page,
        };
        for calculator in &mut self.calculators {
            calculator.handle_event(&mut cx, &event);
        }
        let hidden = self.page.visibility.is_hidden();
        let trigger = match event {
            PageEvent::Finalize => ReportTrigger {
                is_final: true,
                page_hidden: hidden,
            },
            _ => ReportTrigger::change(hidden),
        };
        self.flush_batches(trigger);
    }

    /// The page is going away: every calculator drains and reports.
    pub fn finalize(&mut self) {
        self.dispatch(PageEvent::Finalize);
    }

    fn flush_batches(&mut self, trigger: ReportTrigger) {
        for binding in &mut self.batches {
            binding.flush(trigger, &self.calculators);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::attribution::Attribution;
    use crate::host::VisibilityState;
    use crate::metric::{NavigationType, Rating};
    use crate::page::InputKind;
    use crate::testing::{event, fcp, feed, init_logging, lcp, shift, Collector, FakeHost};

    fn hidden_at(time_stamp: f64) -> PageEvent {
        PageEvent::VisibilityChange { state: VisibilityState::Hidden, time_stamp }
    }

    fn register_all(vitals: &mut WebVitals<FakeHost>, seen: &Collector) {
        vitals.on_cls(seen.callback(), ReportOpts::default());
        vitals.on_fcp(seen.callback(), ReportOpts::default());
        vitals.on_inp(seen.callback(), ReportOpts::default());
        vitals.on_lcp(seen.callback(), ReportOpts::default());
        vitals.on_ttfb(seen.callback(), ReportOpts::default());
    }

    fn by_name(reports: &[Metric], name: MetricName) -> Vec<&Metric> {
        reports.iter().filter(|m| m.name == name).collect()
    }

    #[test]
    fn full_page_visit() {
        init_logging();
        let seen = Collector::new();
        let mut vitals = WebVitals::new(FakeHost::new());
        register_all(&mut vitals, &seen);

        feed(&mut vitals, &[fcp(1100.0), lcp(1100.0, 2000.0)]);
        feed(&mut vitals, &[shift(0.05, 1300.0), lcp(2300.0, 40_000.0)]);
        feed(&mut vitals, &[event(1000, "pointerdown", 2800.0, 72.0)]);
        vitals.dispatch(PageEvent::Input { kind: InputKind::Pointer, time_stamp: 2800.0 });
        feed(&mut vitals, &[shift(0.02, 2000.0)]);
        vitals.dispatch(hidden_at(6000.0));

        let reports = seen.take();
        assert_eq!(by_name(&reports, MetricName::Ttfb)[0].value, 300.0);
        assert_eq!(by_name(&reports, MetricName::Fcp)[0].value, 1100.0);
        assert_eq!(by_name(&reports, MetricName::Lcp)[0].value, 2300.0);
        assert_eq!(by_name(&reports, MetricName::Inp)[0].value, 72.0);

        let cls = by_name(&reports, MetricName::Cls);
        assert_eq!(cls.len(), 1);
        assert!((cls[0].value - 0.07).abs() < 1e-9);
        assert_eq!(cls[0].rating, Rating::Good);
        for metric in &reports {
            assert_eq!(metric.navigation_type, NavigationType::Navigate);
        }
    }

    #[test]
    fn buffered_interactions_seed_the_count() {
        let mut host = FakeHost::new();
        host.record(&[event(1000, "click", 100.0, 40.0), event(1070, "click", 900.0, 40.0)]);
        let mut vitals = WebVitals::new(host);
        assert_eq!(vitals.page().interaction_count(vitals.host()), 11);

        vitals.deliver(&[event(1140, "keydown", 1500.0, 40.0)]);
        assert_eq!(vitals.page().interaction_count(vitals.host()), 21);
    }

    #[test]
    fn restore_starts_fresh_instances_everywhere() {
        init_logging();
        let seen = Collector::new();
        let mut vitals = WebVitals::new(FakeHost::new());
        register_all(&mut vitals, &seen);
        feed(&mut vitals, &[fcp(1100.0), lcp(1100.0, 2000.0)]);
        vitals.dispatch(hidden_at(4000.0));
        let first_visit = seen.take();

        vitals.dispatch(PageEvent::Restore { time_stamp: 9000.0 });
        vitals.dispatch(PageEvent::FramePresented { time_stamp: 9020.0 });
        let restored = seen.take();

        for name in [MetricName::Fcp, MetricName::Lcp, MetricName::Ttfb] {
            let after = by_name(&restored, name);
            assert_eq!(after.len(), 1, "{name}");
            assert_eq!(after[0].navigation_type, NavigationType::BackForwardCache);
            assert!(by_name(&first_visit, name).iter().all(|m| m.id != after[0].id));
        }
        assert_eq!(by_name(&restored, MetricName::Fcp)[0].value, 20.0);
        assert_eq!(by_name(&restored, MetricName::Ttfb)[0].value, 0.0);
    }

    #[test]
    fn finalize_flushes_every_calculator() {
        let seen = Collector::new();
        let mut vitals = WebVitals::new(FakeHost::new());
        register_all(&mut vitals, &seen);
        feed(&mut vitals, &[fcp(1100.0), lcp(1500.0, 2000.0)]);
        vitals.finalize();

        for name in [MetricName::Cls, MetricName::Fcp, MetricName::Inp, MetricName::Lcp, MetricName::Ttfb] {
            assert_eq!(vitals.state_of(name), Some(CalcState::Finalized), "{name}");
        }
        let reports = seen.take();
        assert_eq!(by_name(&reports, MetricName::Lcp)[0].value, 1500.0);
        assert_eq!(by_name(&reports, MetricName::Cls)[0].value, 0.0);
    }

    #[test]
    fn unregistered_metric_has_no_state() {
        let vitals = WebVitals::new(FakeHost::new());
        assert_eq!(vitals.state_of(MetricName::Inp), None);
    }

    fn collect_batches(
        vitals: &mut WebVitals<FakeHost>,
        names: &[MetricName],
        opts: ReportOpts,
    ) -> Rc<RefCell<Vec<BTreeMap<MetricName, Metric>>>> {
        let batches = Rc::new(RefCell::new(Vec::new()));
        let out = batches.clone();
        vitals.on_batch(
            names,
            move |batch: &BTreeMap<MetricName, Metric>| out.borrow_mut().push(batch.clone()),
            opts,
        );
        batches
    }

    #[test]
    fn batch_goes_out_when_a_member_is_final() {
        init_logging();
        let mut vitals = WebVitals::new(FakeHost::new());
        let batches = collect_batches(
            &mut vitals,
            &[MetricName::Fcp, MetricName::Lcp, MetricName::Ttfb],
            ReportOpts::default(),
        );
        assert_eq!(batches.borrow().len(), 1);
        assert_eq!(batches.borrow()[0][&MetricName::Ttfb].delta, 300.0);

        feed(&mut vitals, &[fcp(1100.0), lcp(1400.0, 2000.0)]);
        assert_eq!(batches.borrow().len(), 2);

        vitals.dispatch(hidden_at(3000.0));
        vitals.finalize();

        let batches = batches.borrow();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1].len(), 3);
        assert_eq!(batches[1][&MetricName::Fcp].delta, 1100.0);
        assert_eq!(batches[1][&MetricName::Lcp].value, 1400.0);
        assert_eq!(batches[1][&MetricName::Ttfb].delta, 0.0);
    }

    #[test]
    fn batched_paint_reports_as_soon_as_single_binding() {
        let seen = Collector::new();
        let mut vitals = WebVitals::new(FakeHost::new());
        vitals.on_fcp(seen.callback(), ReportOpts::default());
        let batches = collect_batches(&mut vitals, &[MetricName::Fcp], ReportOpts::default());

        feed(&mut vitals, &[fcp(1100.0)]);
        assert_eq!(seen.len(), 1);
        let batches = batches.borrow();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0][&MetricName::Fcp].value, 1100.0);
    }

    #[test]
    fn batch_holds_changes_until_hidden() {
        let mut vitals = WebVitals::new(FakeHost::new());
        let batches = collect_batches(&mut vitals, &[MetricName::Lcp], ReportOpts::default());
        feed(&mut vitals, &[lcp(900.0, 2000.0)]);
        feed(&mut vitals, &[lcp(1400.0, 6000.0)]);
        assert!(batches.borrow().is_empty());

        vitals.dispatch(hidden_at(3000.0));
        vitals.finalize();
        let batches = batches.borrow();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0][&MetricName::Lcp].value, 1400.0);
    }

    #[test]
    fn restored_member_finalizes_again() {
        let mut vitals = WebVitals::new(FakeHost::new());
        let batches = collect_batches(&mut vitals, &[MetricName::Fcp], ReportOpts::default());
        feed(&mut vitals, &[fcp(1100.0)]);
        vitals.dispatch(hidden_at(3000.0));
        vitals.dispatch(PageEvent::Restore { time_stamp: 9000.0 });
        vitals.dispatch(PageEvent::FramePresented { time_stamp: 9024.0 });

        let batches = batches.borrow();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1][&MetricName::Fcp].value, 24.0);
        assert_eq!(batches[1][&MetricName::Fcp].navigation_type, NavigationType::BackForwardCache);
    }

    #[test]
    fn batch_with_every_change() {
        let batches = Rc::new(RefCell::new(Vec::new()));
        let out = batches.clone();
        let mut vitals = WebVitals::new(FakeHost::new());
        vitals.on_batch(
            &[MetricName::Lcp],
            move |batch: &BTreeMap<MetricName, Metric>| out.borrow_mut().push(batch.clone()),
            ReportOpts::new().with_report_all_changes(true),
        );
        feed(&mut vitals, &[lcp(900.0, 2000.0)]);
        feed(&mut vitals, &[lcp(1400.0, 6000.0)]);

        let batches = batches.borrow();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1][&MetricName::Lcp].delta, 500.0);
    }

    #[test]
    fn snapshots_serialize_for_beacons() {
        let seen = Collector::new();
        let mut vitals = WebVitals::new(FakeHost::new());
        vitals.on_ttfb_with_attribution(seen.callback(), ReportOpts::default());

        let reports = seen.take();
        let json = serde_json::to_value(&reports[0]).unwrap();
        assert_eq!(json["name"], "TTFB");
        assert_eq!(json["rating"], "good");
        assert_eq!(json["navigationType"], "navigate");
        assert_eq!(json["entries"][0]["entryType"], "navigation");
        assert!(json["attribution"]["requestDuration"].is_number());
        assert!(matches!(reports[0].attribution, Some(Attribution::Ttfb(_))));
        vitals.finalize();
    }
}
