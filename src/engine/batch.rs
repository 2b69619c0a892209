use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::metric::{Metric, MetricName};
use crate::metrics::{CalcState, MetricCalculator};
use crate::report::{BatchCallback, BatchReportGate, ReportCallback, ReportTrigger};

/// Several metrics reported together to one callback.
///
/// The inner calculators report every change into `latest`; the gate then
/// decides when the whole set goes out. A member that has just finalized
/// makes the flush final, so single-shot metrics are not held back.
pub(crate) struct BatchBinding {
    gate: BatchReportGate,
    latest: Rc<RefCell<BTreeMap<MetricName, Metric>>>,
    /// Member calculators by index into the engine's registry
    members: Vec<(MetricName, usize)>,
    /// Members whose finalization was already flushed
    settled: BTreeSet<usize>,
}

impl BatchBinding {
    pub(crate) fn new(callback: BatchCallback, report_all_changes: bool) -> Self {
        Self {
            gate: BatchReportGate::bind(callback, report_all_changes),
            latest: Rc::default(),
            members: Vec::new(),
            settled: BTreeSet::new(),
        }
    }

    pub(crate) fn add_member(&mut self, name: MetricName, index: usize) {
        self.members.push((name, index));
    }

    /// Callback for one inner calculator. Keeps only the newest snapshot.
    pub(crate) fn sink(&self) -> ReportCallback {
        let latest = self.latest.clone();
        Box::new(move |metric: &Metric| {
            latest.borrow_mut().insert(metric.name, metric.clone());
        })
    }

    pub(crate) fn flush(&mut self, mut trigger: ReportTrigger, calculators: &[Box<dyn MetricCalculator>]) -> bool {
        let mut latest = self.latest.borrow_mut();
        for &(name, index) in &self.members {
            let finished = calculators
                .get(index)
                .is_some_and(|c| c.state() == CalcState::Finalized);
            if !finished {
                // Restored or re-armed: its next finalization counts again.
                self.settled.remove(&index);
            } else if latest.contains_key(&name) && self.settled.insert(index) {
                trigger.is_final = true;
            }
        }
        if latest.is_empty() {
            return false;
        }
        let mut metrics: Vec<&mut Metric> = latest.values_mut().collect();
        self.gate.report(&mut metrics, trigger)
    }
}
