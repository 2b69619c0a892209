//! Metric instance identity: unique ids and navigation classification.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

use crate::entry::{NavigationTiming, NavigationTimingType};
use crate::host::PerformanceHost;
use crate::metric::NavigationType;

/// Prefix identifying the id scheme.
pub const ID_SCHEME: &str = "v5";

/// `v5-<unix millis>-<13 digit random>`, unique per metric instance.
pub fn generate_unique_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let random: u64 = rand::thread_rng().gen_range(1_000_000_000_000..10_000_000_000_000);
    format!("{ID_SCHEME}-{millis}-{random}")
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoftNavigation {
    pub navigation_id: u64,
    pub start_time: f64,
}

/// Navigation context every new metric instance is classified against.
#[derive(Debug, Clone)]
pub struct NavigationState {
    timing_type: Option<NavigationTimingType>,
    activation_start: f64,
    prerendered: bool,
    was_discarded: bool,
    restore_time: Option<f64>,
    soft_navigation: Option<SoftNavigation>,
}

impl NavigationState {
    pub fn from_host(host: &dyn PerformanceHost) -> Self {
        let navigation = host.navigation_entry();
        Self {
            timing_type: navigation.as_ref().map(|n| n.nav_type),
            activation_start: navigation.as_ref().map_or(0.0, |n| n.activation_start),
            prerendered: host.is_prerendering(),
            was_discarded: host.was_discarded(),
            restore_time: None,
            soft_navigation: None,
        }
    }

    pub fn activation_start(&self) -> f64 {
        self.activation_start
    }

    /// Timestamp metric values are measured from: the soft navigation's
    /// start when one is active, otherwise the activation start.
    pub fn time_origin(&self) -> f64 {
        match self.soft_navigation {
            Some(soft) => soft.start_time,
            None => self.activation_start,
        }
    }

    pub fn restore_time(&self) -> Option<f64> {
        self.restore_time
    }

    pub fn soft_navigation(&self) -> Option<SoftNavigation> {
        self.soft_navigation
    }

    /// Whether a paint tagged with `navigation_id` belongs to the current
    /// navigation.
    pub fn owns(&self, navigation_id: Option<u64>) -> bool {
        match self.soft_navigation {
            Some(soft) => navigation_id == Some(soft.navigation_id),
            None => true,
        }
    }

    pub fn on_activation(&mut self, navigation: Option<&NavigationTiming>) {
        if let Some(navigation) = navigation {
            self.activation_start = navigation.activation_start;
        }
        self.prerendered = true;
    }

    pub fn on_restore(&mut self, time_stamp: f64) {
        self.restore_time = Some(time_stamp);
        self.soft_navigation = None;
    }

    pub fn on_soft_navigation(&mut self, soft: SoftNavigation) {
        self.soft_navigation = Some(soft);
    }

    pub fn navigation_type(&self) -> NavigationType {
        if self.soft_navigation.is_some() {
            return NavigationType::SoftNavigation;
        }
        if self.restore_time.is_some() {
            return NavigationType::BackForwardCache;
        }
        let Some(timing_type) = self.timing_type else {
            return NavigationType::Navigate;
        };
        if self.prerendered || self.activation_start > 0.0 {
            NavigationType::Prerender
        } else if self.was_discarded {
            NavigationType::Restore
        } else {
            match timing_type {
                NavigationTimingType::Navigate => NavigationType::Navigate,
                NavigationTimingType::Reload => NavigationType::Reload,
                NavigationTimingType::BackForward => NavigationType::BackForward,
                NavigationTimingType::Prerender => NavigationType::Prerender,
            }
        }
    }
}
