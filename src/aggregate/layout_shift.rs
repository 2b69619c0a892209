//! Session-windowed layout instability.
//!
//! Shifts are grouped into windows: an entry joins the current window when
//! it lands less than 1s after the previous shift and less than 5s after
//! the window's first shift. The page score is the worst window seen.

use crate::entry::{LayoutShift, PerformanceEntry};
use crate::error::Result;
use crate::metric::Metric;

use super::isolate;

/// Maximum gap between consecutive shifts in one window
pub const SESSION_GAP_MS: f64 = 1000.0;
/// Maximum span of one window from its first shift
pub const SESSION_SPAN_MS: f64 = 5000.0;

pub trait ShiftListener {
    /// Called after window bookkeeping for every unexpected shift.
    fn after_shift(&mut self, entry: &LayoutShift) -> Result<()>;
}

#[derive(Default)]
pub struct LayoutShiftAggregator {
    session_value: f64,
    session_entries: Vec<LayoutShift>,
    listeners: Vec<Box<dyn ShiftListener>>,
}

impl LayoutShiftAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&mut self, listener: Box<dyn ShiftListener>) {
        self.listeners.push(listener);
    }

    /// Cumulative value of the current window
    pub fn session_value(&self) -> f64 {
        self.session_value
    }

    pub fn session_entries(&self) -> &[LayoutShift] {
        &self.session_entries
    }

    pub fn process_entry(&mut self, entry: &LayoutShift) {
        if entry.had_recent_input {
            return;
        }

        let extends = match (self.session_entries.first(), self.session_entries.last()) {
            (Some(first), Some(last)) => {
                self.session_value > 0.0
                    && entry.start_time - last.start_time < SESSION_GAP_MS
                    && entry.start_time - first.start_time < SESSION_SPAN_MS
            }
            _ => false,
        };

        if extends {
            self.session_value += entry.value;
            self.session_entries.push(entry.clone());
        } else {
            self.session_value = entry.value;
            self.session_entries = vec![entry.clone()];
        }

        for listener in &mut self.listeners {
            isolate("layout shift", || listener.after_shift(entry));
        }
    }

    /// Raise `metric` to the current window when the window is worse.
    /// Returns whether the metric changed.
    pub fn apply(&self, metric: &mut Metric) -> bool {
        if self.session_value <= metric.value {
            return false;
        }
        metric.value = self.session_value;
        metric.entries = self
            .session_entries
            .iter()
            .cloned()
            .map(PerformanceEntry::LayoutShift)
            .collect();
        true
    }

    /// Start over for a new metric instance. Listeners stay registered.
    pub fn reset(&mut self) {
        self.session_value = 0.0;
        self.session_entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VitalsError;
    use crate::metric::{MetricName, NavigationType};
    use crate::testing::layout_shift;
    use proptest::prelude::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn cls_metric() -> Metric {
        Metric::new(MetricName::Cls, 0.0, "v5-1-1000000000000".into(), NavigationType::Navigate)
    }

    fn run(shifts: &[(f64, f64)]) -> Metric {
        let mut agg = LayoutShiftAggregator::new();
        let mut metric = cls_metric();
        for &(value, start) in shifts {
            agg.process_entry(&layout_shift(value, start));
            agg.apply(&mut metric);
        }
        metric
    }

    #[test]
    fn close_shifts_form_one_window() {
        let metric = run(&[(0.05, 100.0), (0.03, 600.0), (0.2, 1500.0)]);
        assert!((metric.value - 0.28).abs() < 1e-9);
        assert_eq!(metric.entries.len(), 3);
    }

    #[test]
    fn gap_rule_applies_between_consecutive_shifts() {
        // 4200ms between the second and third shift exceeds the gap limit
        // even though the span from the first shift is under five seconds.
        let metric = run(&[(0.05, 100.0), (0.03, 600.0), (0.2, 4800.0)]);
        assert!((metric.value - 0.2).abs() < 1e-9);
        assert_eq!(metric.entries.len(), 1);
    }

    #[test]
    fn gap_over_one_second_starts_new_window() {
        let metric = run(&[(0.1, 0.0), (0.1, 500.0), (0.05, 2000.0), (0.05, 2500.0)]);
        assert!((metric.value - 0.2).abs() < 1e-9);
        assert_eq!(metric.entries.len(), 2);
    }

    #[test]
    fn span_over_five_seconds_starts_new_window() {
        let shifts: Vec<(f64, f64)> = (0..12).map(|i| (0.01, i as f64 * 500.0)).collect();
        let metric = run(&shifts);
        // 0..4500 fits ten entries; 5000 opens a new window
        assert!((metric.value - 0.1).abs() < 1e-9);
        assert_eq!(metric.entries.len(), 10);
    }

    #[test]
    fn recent_input_is_ignored() {
        let mut agg = LayoutShiftAggregator::new();
        let mut shift = layout_shift(0.4, 100.0);
        shift.had_recent_input = true;
        agg.process_entry(&shift);
        assert_eq!(agg.session_value(), 0.0);
        assert!(agg.session_entries().is_empty());
    }

    #[test]
    fn later_smaller_window_keeps_the_maximum() {
        let metric = run(&[(0.3, 0.0), (0.05, 3000.0)]);
        assert!((metric.value - 0.3).abs() < 1e-9);
        assert_eq!(metric.entries.len(), 1);
    }

    struct Failing(Rc<Cell<usize>>);

    impl ShiftListener for Failing {
        fn after_shift(&mut self, _entry: &LayoutShift) -> Result<()> {
            self.0.set(self.0.get() + 1);
            Err(VitalsError::Listener("boom".into()))
        }
    }

    struct Panicking;

    impl ShiftListener for Panicking {
        fn after_shift(&mut self, _entry: &LayoutShift) -> Result<()> {
            panic!("listener bug");
        }
    }

    #[test]
    fn listener_failures_do_not_affect_aggregation() {
        let calls = Rc::new(Cell::new(0));
        let mut agg = LayoutShiftAggregator::new();
        agg.add_listener(Box::new(Failing(calls.clone())));
        agg.add_listener(Box::new(Panicking));

        agg.process_entry(&layout_shift(0.1, 0.0));
        agg.process_entry(&layout_shift(0.2, 100.0));

        assert_eq!(calls.get(), 2);
        assert!((agg.session_value() - 0.3).abs() < 1e-9);
    }

    /// Maximum window sum computed by splitting at every rule violation.
    fn reference_max(shifts: &[(f64, f64)]) -> f64 {
        let mut best: f64 = 0.0;
        let mut window_start = 0usize;
        let mut sum = 0.0;
        for (i, &(value, start)) in shifts.iter().enumerate() {
            let joins = i > window_start
                && sum > 0.0
                && start - shifts[i - 1].1 < SESSION_GAP_MS
                && start - shifts[window_start].1 < SESSION_SPAN_MS;
            if joins {
                sum += value;
            } else {
                window_start = i;
                sum = value;
            }
            best = best.max(sum);
        }
        best
    }

    proptest! {
        #[test]
        fn reported_value_is_worst_window(
            steps in prop::collection::vec((0u32..50, 0u32..2500), 1..60)
        ) {
            let mut t = 0.0;
            let shifts: Vec<(f64, f64)> = steps
                .into_iter()
                .map(|(v, gap)| {
                    t += gap as f64;
                    (v as f64 / 100.0, t)
                })
                .collect();
            let metric = run(&shifts);
            prop_assert!((metric.value - reference_max(&shifts)).abs() < 1e-9);
        }
    }
}
