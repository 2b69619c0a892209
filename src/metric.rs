use std::fmt;

use serde::Serialize;

use crate::attribution::Attribution;
use crate::entry::PerformanceEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum MetricName {
    #[serde(rename = "CLS")]
    Cls,
    #[serde(rename = "FCP")]
    Fcp,
    #[serde(rename = "INP")]
    Inp,
    #[serde(rename = "LCP")]
    Lcp,
    #[serde(rename = "TTFB")]
    Ttfb,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::Cls => "CLS",
            MetricName::Fcp => "FCP",
            MetricName::Inp => "INP",
            MetricName::Lcp => "LCP",
            MetricName::Ttfb => "TTFB",
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        match self {
            MetricName::Cls => CLS_THRESHOLDS,
            MetricName::Fcp => FCP_THRESHOLDS,
            MetricName::Inp => INP_THRESHOLDS,
            MetricName::Lcp => LCP_THRESHOLDS,
            MetricName::Ttfb => TTFB_THRESHOLDS,
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rating {
    Good,
    NeedsImprovement,
    Poor,
}

/// Upper bound of "good" and lower bound of "poor", both exclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub good: f64,
    pub poor: f64,
}

impl Thresholds {
    pub fn rate(&self, value: f64) -> Rating {
        if value > self.poor {
            Rating::Poor
        } else if value > self.good {
            Rating::NeedsImprovement
        } else {
            Rating::Good
        }
    }
}

pub const CLS_THRESHOLDS: Thresholds = Thresholds { good: 0.1, poor: 0.25 };
pub const FCP_THRESHOLDS: Thresholds = Thresholds { good: 1800.0, poor: 3000.0 };
pub const INP_THRESHOLDS: Thresholds = Thresholds { good: 200.0, poor: 500.0 };
pub const LCP_THRESHOLDS: Thresholds = Thresholds { good: 2500.0, poor: 4000.0 };
pub const TTFB_THRESHOLDS: Thresholds = Thresholds { good: 800.0, poor: 1800.0 };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NavigationType {
    Navigate,
    Reload,
    BackForward,
    /// Resumed from the history cache
    BackForwardCache,
    Prerender,
    /// Reloaded after the host discarded the page
    Restore,
    SoftNavigation,
}

/// One measurement lifecycle of one metric for one navigation.
///
/// `value` is -1 until first determined. Snapshots handed to callbacks
/// are clones: the live instance keeps growing its `entries`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metric {
    pub name: MetricName,
    pub value: f64,
    pub rating: Rating,
    pub delta: f64,
    pub id: String,
    pub entries: Vec<PerformanceEntry>,
    pub navigation_type: NavigationType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribution: Option<Attribution>,
}

impl Metric {
    pub fn new(name: MetricName, value: f64, id: String, navigation_type: NavigationType) -> Self {
        Self {
            name,
            value,
            rating: Rating::Good,
            delta: 0.0,
            id,
            entries: Vec::new(),
            navigation_type,
            attribution: None,
        }
    }

    pub fn is_determined(&self) -> bool {
        self.value >= 0.0
    }
}
