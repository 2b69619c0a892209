use crate::entry::LargestContentfulPaint;
use crate::error::Result;

use super::isolate;

pub trait PaintListener {
    /// Called for every candidate before it is considered.
    fn before_entry(&mut self, entry: &LargestContentfulPaint) -> Result<()>;
}

/// Latest largest-paint candidate for the current instance.
#[derive(Default)]
pub struct LargestPaintAggregator {
    candidate: Option<LargestContentfulPaint>,
    listeners: Vec<Box<dyn PaintListener>>,
}

impl LargestPaintAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&mut self, listener: Box<dyn PaintListener>) {
        self.listeners.push(listener);
    }

    pub fn candidate(&self) -> Option<&LargestContentfulPaint> {
        self.candidate.as_ref()
    }

    /// Record `entry` as the candidate when it was painted before the page
    /// was first hidden. Returns whether it was accepted.
    pub fn process_entry(&mut self, entry: &LargestContentfulPaint, first_hidden_time: f64) -> bool {
        for listener in &mut self.listeners {
            isolate("largest paint", || listener.before_entry(entry));
        }
        if entry.start_time() >= first_hidden_time {
            return false;
        }
        self.candidate = Some(entry.clone());
        true
    }

    pub fn reset(&mut self) {
        self.candidate = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::lcp_entry;

    #[test]
    fn latest_candidate_wins() {
        let mut agg = LargestPaintAggregator::new();
        assert!(agg.process_entry(&lcp_entry(800.0, 1000.0, None), f64::INFINITY));
        assert!(agg.process_entry(&lcp_entry(600.0, 400.0, None), f64::INFINITY));
        assert_eq!(agg.candidate().unwrap().render_time, 600.0);
    }

    #[test]
    fn paints_after_hidden_are_rejected() {
        let mut agg = LargestPaintAggregator::new();
        assert!(!agg.process_entry(&lcp_entry(1500.0, 1000.0, None), 1200.0));
        assert!(agg.candidate().is_none());
        agg.reset();
        assert!(agg.candidate().is_none());
    }
}
