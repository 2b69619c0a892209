//! Per-metric state machines.
//!
//! Every calculator moves `Uninitialized -> Observing -> Finalized`. A
//! history-cache restore or a soft navigation puts it back in `Observing`
//! with a fresh metric instance instead of ending it.

pub mod cls;
pub mod fcp;
pub mod inp;
pub mod lcp;
pub mod ttfb;

use std::fmt;

use serde::Deserialize;

use crate::attribution::TargetGenerator;
use crate::entry::PerformanceEntry;
use crate::host::PerformanceHost;
use crate::metric::MetricName;
use crate::page::{PageEvent, PageState};

pub use cls::ClsCalculator;
pub use fcp::FcpCalculator;
pub use inp::InpCalculator;
pub use lcp::LcpCalculator;
pub use ttfb::TtfbCalculator;

/// Minimum `event` duration considered for responsiveness by default.
pub const DEFAULT_DURATION_THRESHOLD: f64 = 40.0;

/// Caller options shared by every `on_*` registration.
#[derive(Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReportOpts {
    /// Report every change instead of only final values
    pub report_all_changes: bool,
    pub duration_threshold: Option<f64>,
    #[serde(skip)]
    pub generate_target: Option<TargetGenerator>,
}

impl ReportOpts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_report_all_changes(mut self, enabled: bool) -> Self {
        self.report_all_changes = enabled;
        self
    }

    pub fn with_duration_threshold(mut self, threshold: f64) -> Self {
        self.duration_threshold = Some(threshold);
        self
    }

    pub fn with_generate_target(mut self, generate: TargetGenerator) -> Self {
        self.generate_target = Some(generate);
        self
    }

    pub fn duration_threshold(&self) -> f64 {
        self.duration_threshold.unwrap_or(DEFAULT_DURATION_THRESHOLD)
    }
}

impl fmt::Debug for ReportOpts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportOpts")
            .field("report_all_changes", &self.report_all_changes)
            .field("duration_threshold", &self.duration_threshold)
            .field("generate_target", &self.generate_target.is_some())
            .finish()
    }
}

/// What a calculator may touch while handling a batch or an event.
pub struct Context<'a> {
    pub host: &'a mut dyn PerformanceHost,
    pub page: &'a PageState,
}

impl Context<'_> {
    pub fn page_hidden(&self) -> bool {
        self.page.visibility.is_hidden()
    }

    pub fn first_hidden_time(&self) -> f64 {
        self.page.visibility.first_hidden_time()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalcState {
    Uninitialized,
    Observing,
    Finalized,
}

pub trait MetricCalculator {
    fn name(&self) -> MetricName;

    fn state(&self) -> CalcState;

    /// Subscribe and replay buffered entries. A prerendering page defers
    /// this until it is activated.
    fn start(&mut self, cx: &mut Context<'_>);

    /// A batch the host delivered. Calculators filter it through their
    /// own observers.
    fn handle_entries(&mut self, cx: &mut Context<'_>, batch: &[PerformanceEntry]);

    /// Runs after the page state has absorbed `event`.
    fn handle_event(&mut self, cx: &mut Context<'_>, event: &PageEvent);
}
