//! Decides when a metric instance is handed to the caller.

use std::collections::{BTreeMap, HashMap};

use crate::attribution::Attribution;
use crate::metric::{Metric, MetricName, Thresholds};

pub type ReportCallback = Box<dyn FnMut(&Metric)>;
pub type BatchCallback = Box<dyn FnMut(&BTreeMap<MetricName, Metric>)>;

/// Why a report is being attempted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportTrigger {
    /// The instance is not expected to change any more
    pub is_final: bool,
    pub page_hidden: bool,
}

impl ReportTrigger {
    pub fn change(page_hidden: bool) -> Self {
        Self { is_final: false, page_hidden }
    }

    pub fn finalize() -> Self {
        Self { is_final: true, page_hidden: false }
    }

    fn allows(&self, report_all_changes: bool) -> bool {
        report_all_changes || self.is_final || self.page_hidden
    }
}

/// Report gate bound to one callback.
///
/// A value is reported when the policy allows it and it differs from the
/// last reported value, or when nothing was reported for the instance yet.
/// That second rule is what lets a zero value go out exactly once.
pub struct ReportGate {
    callback: ReportCallback,
    thresholds: Thresholds,
    report_all_changes: bool,
    prev_value: Option<f64>,
}

impl ReportGate {
    pub fn bind(callback: ReportCallback, thresholds: Thresholds, report_all_changes: bool) -> Self {
        Self {
            callback,
            thresholds,
            report_all_changes,
            prev_value: None,
        }
    }

    /// Forget the previous value; the next instance starts fresh.
    pub fn rebind(&mut self) {
        self.prev_value = None;
    }

    pub fn has_reported(&self) -> bool {
        self.prev_value.is_some()
    }

    pub fn report(&mut self, metric: &mut Metric, trigger: ReportTrigger) -> bool {
        self.report_with(metric, trigger, |_| None)
    }

    /// Like [`report`](Self::report), attaching `attribute`'s result to the
    /// snapshot. `attribute` only runs when the callback fires.
    pub fn report_with<F>(&mut self, metric: &mut Metric, trigger: ReportTrigger, attribute: F) -> bool
    where
        F: FnOnce(&Metric) -> Option<Attribution>,
    {
        if !metric.is_determined() || !trigger.allows(self.report_all_changes) {
            return false;
        }
        let delta = metric.value - self.prev_value.unwrap_or(0.0);
        if delta == 0.0 && self.prev_value.is_some() {
            return false;
        }

        self.prev_value = Some(metric.value);
        metric.delta = delta;
        metric.rating = self.thresholds.rate(metric.value);

        let mut snapshot = metric.clone();
        snapshot.attribution = attribute(metric);
        log::debug!(
            "report {} value={} delta={} final={} id={}",
            snapshot.name,
            snapshot.value,
            snapshot.delta,
            trigger.is_final,
            snapshot.id
        );
        (self.callback)(&snapshot);
        true
    }
}

/// Report gate for several metrics delivered to one callback.
///
/// The batch goes out when at least one of its metrics changed; every
/// determined metric rides along. A metric whose id changed counts as a
/// fresh instance.
pub struct BatchReportGate {
    callback: BatchCallback,
    report_all_changes: bool,
    prev_values: HashMap<MetricName, (String, f64)>,
}

impl BatchReportGate {
    pub fn bind(callback: BatchCallback, report_all_changes: bool) -> Self {
        Self {
            callback,
            report_all_changes,
            prev_values: HashMap::new(),
        }
    }

    /// Forget the previous value of one metric.
    pub fn rebind(&mut self, name: MetricName) {
        self.prev_values.remove(&name);
    }

    pub fn report(&mut self, metrics: &mut [&mut Metric], trigger: ReportTrigger) -> bool {
        if !trigger.allows(self.report_all_changes) {
            return false;
        }

        let mut changed = false;
        let mut batch = BTreeMap::new();
        for metric in metrics.iter_mut().filter(|m| m.is_determined()) {
            let prev = self
                .prev_values
                .get(&metric.name)
                .filter(|(id, _)| *id == metric.id)
                .map(|(_, value)| *value);
            let delta = metric.value - prev.unwrap_or(0.0);
            if delta != 0.0 || prev.is_none() {
                changed = true;
            }
            metric.delta = delta;
            metric.rating = metric.name.thresholds().rate(metric.value);
            batch.insert(metric.name, (**metric).clone());
        }
        if !changed {
            return false;
        }

        for (name, metric) in &batch {
            self.prev_values.insert(*name, (metric.id.clone(), metric.value));
        }
        log::debug!("report batch of {} metrics", batch.len());
        (self.callback)(&batch);
        true
    }
}
