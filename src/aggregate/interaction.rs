//! Bounded set of the worst interactions on the page.
//!
//! Only the ten longest interactions are retained. The reported value is
//! picked from them by how many interactions actually happened: one step
//! down the list per fifty interactions approximates the 98th percentile
//! without storing every interaction.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::entry::EventTiming;
use crate::error::Result;

use super::isolate;

pub const MAX_INTERACTIONS_TO_CONSIDER: usize = 10;
pub const INTERACTIONS_PER_STEP: u64 = 50;

/// One user interaction and the event entries describing its worst frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Interaction {
    pub id: u64,
    pub latency: f64,
    pub entries: Vec<EventTiming>,
}

pub trait InteractionListener {
    /// Called for every entry before it is considered.
    fn before_entry(&mut self, _entry: &EventTiming) -> Result<()> {
        Ok(())
    }

    /// Called after an entry updated a retained interaction.
    fn after_candidate(&mut self, _interaction: &Interaction) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct InteractionAggregator {
    records: HashMap<u64, Interaction>,
    /// Record ids sorted by latency, longest first
    ranking: Vec<u64>,
    /// Interaction count at the last reset
    baseline: u64,
    listeners: Vec<Box<dyn InteractionListener>>,
}

impl InteractionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&mut self, listener: Box<dyn InteractionListener>) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.ranking.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranking.is_empty()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.records.contains_key(&id)
    }

    /// Retained interactions, longest first.
    pub fn longest(&self) -> impl Iterator<Item = &Interaction> + '_ {
        self.ranking.iter().filter_map(|id| self.records.get(id))
    }

    pub fn process_entry(&mut self, entry: &EventTiming) {
        for listener in &mut self.listeners {
            isolate("interaction", || listener.before_entry(entry));
        }

        let Some(id) = entry.interaction_key() else {
            return;
        };

        let min_latency = self
            .ranking
            .last()
            .and_then(|id| self.records.get(id))
            .map(|r| r.latency);
        let considered = self.records.contains_key(&id)
            || self.ranking.len() < MAX_INTERACTIONS_TO_CONSIDER
            || min_latency.map_or(true, |min| entry.duration > min);
        if !considered {
            return;
        }

        match self.records.get_mut(&id) {
            Some(record) => {
                if entry.duration > record.latency {
                    record.entries = vec![entry.clone()];
                    record.latency = entry.duration;
                } else if entry.duration == record.latency
                    && record.entries.first().map(|e| e.start_time) == Some(entry.start_time)
                {
                    record.entries.push(entry.clone());
                }
            }
            None => {
                self.records.insert(
                    id,
                    Interaction {
                        id,
                        latency: entry.duration,
                        entries: vec![entry.clone()],
                    },
                );
                self.ranking.push(id);
            }
        }

        let records = &self.records;
        self.ranking.sort_by(|a, b| {
            let (a, b) = (records[a].latency, records[b].latency);
            b.partial_cmp(&a).unwrap_or(Ordering::Equal)
        });
        if self.ranking.len() > MAX_INTERACTIONS_TO_CONSIDER {
            for evicted in self.ranking.split_off(MAX_INTERACTIONS_TO_CONSIDER) {
                self.records.remove(&evicted);
            }
        }

        if let Some(interaction) = self.records.get(&id) {
            for listener in &mut self.listeners {
                isolate("interaction", || listener.after_candidate(interaction));
            }
        }
    }

    /// Index into the retained list for `count_since_reset` interactions
    pub fn estimate_index(len: usize, count_since_reset: u64) -> usize {
        let step = usize::try_from(count_since_reset / INTERACTIONS_PER_STEP).unwrap_or(usize::MAX);
        step.min(len.saturating_sub(1))
    }

    /// Approximate p98 interaction given the page's total interaction
    /// count. Only interactions since the last reset are counted.
    pub fn estimate_p98(&self, interaction_count: u64) -> Option<&Interaction> {
        if self.ranking.is_empty() {
            return None;
        }
        let since_reset = interaction_count.saturating_sub(self.baseline);
        let index = Self::estimate_index(self.ranking.len(), since_reset);
        self.records.get(&self.ranking[index])
    }

    /// Forget every interaction. `interaction_count` becomes the baseline
    /// the next estimate counts from.
    pub fn reset(&mut self, interaction_count: u64) {
        self.records.clear();
        self.ranking.clear();
        self.baseline = interaction_count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EventEntryType;
    use crate::testing::event_timing;
    use proptest::prelude::*;

    fn entry(id: u64, start: f64, duration: f64) -> EventTiming {
        event_timing(Some(id), "pointerup", start, duration)
    }

    fn latencies(agg: &InteractionAggregator) -> Vec<f64> {
        agg.longest().map(|i| i.latency).collect()
    }

    #[test]
    fn entries_without_interaction_are_ignored() {
        let mut agg = InteractionAggregator::new();
        agg.process_entry(&event_timing(None, "mouseover", 10.0, 200.0));
        assert!(agg.is_empty());

        let mut first_input = event_timing(None, "mousedown", 20.0, 80.0);
        first_input.entry_type = EventEntryType::FirstInput;
        agg.process_entry(&first_input);
        assert_eq!(agg.len(), 1);
        assert!(agg.contains(0));
    }

    #[test]
    fn longer_duration_replaces_entries() {
        let mut agg = InteractionAggregator::new();
        agg.process_entry(&entry(5, 100.0, 48.0));
        agg.process_entry(&entry(5, 100.0, 48.0));
        agg.process_entry(&entry(5, 104.0, 96.0));

        let record = agg.longest().next().unwrap();
        assert_eq!(record.latency, 96.0);
        assert_eq!(record.entries.len(), 1);
        assert_eq!(record.entries[0].start_time, 104.0);
    }

    #[test]
    fn equal_duration_same_frame_appends() {
        let mut agg = InteractionAggregator::new();
        agg.process_entry(&entry(5, 100.0, 48.0));
        agg.process_entry(&event_timing(Some(5), "click", 100.0, 48.0));
        // same duration, different start: a different frame, not merged
        agg.process_entry(&entry(5, 120.0, 48.0));
        // shorter: ignored
        agg.process_entry(&entry(5, 100.0, 16.0));

        let record = agg.longest().next().unwrap();
        assert_eq!(record.entries.len(), 2);
        assert_eq!(record.entries[1].name, "click");
    }

    #[test]
    fn keeps_only_ten_longest() {
        let mut agg = InteractionAggregator::new();
        for id in 1..=15u64 {
            agg.process_entry(&entry(id, id as f64 * 100.0, id as f64 * 10.0));
        }
        assert_eq!(agg.len(), MAX_INTERACTIONS_TO_CONSIDER);
        assert_eq!(latencies(&agg)[0], 150.0);
        assert_eq!(*latencies(&agg).last().unwrap(), 60.0);
        assert!(!agg.contains(5));

        // shorter than the shortest retained interaction: not a candidate
        agg.process_entry(&entry(99, 2000.0, 50.0));
        assert!(!agg.contains(99));
    }

    #[test]
    fn estimate_index_scales_with_interaction_count() {
        assert_eq!(InteractionAggregator::estimate_index(10, 432), 8);
        assert_eq!(InteractionAggregator::estimate_index(10, 49), 0);
        assert_eq!(InteractionAggregator::estimate_index(10, 5000), 9);
        assert_eq!(InteractionAggregator::estimate_index(3, 120), 2);
    }

    #[test]
    fn p98_picks_ninth_longest_at_432_interactions() {
        let mut agg = InteractionAggregator::new();
        for id in 1..=10u64 {
            agg.process_entry(&entry(id, id as f64 * 100.0, id as f64 * 10.0));
        }
        let inp = agg.estimate_p98(432).unwrap();
        assert_eq!(inp.latency, 20.0);
        assert_eq!(agg.estimate_p98(10).unwrap().latency, 100.0);
    }

    #[test]
    fn reset_counts_from_new_baseline() {
        let mut agg = InteractionAggregator::new();
        agg.process_entry(&entry(1, 0.0, 300.0));
        agg.reset(400);
        assert!(agg.estimate_p98(400).is_none());

        for id in 2..=11u64 {
            agg.process_entry(&entry(id, id as f64 * 100.0, id as f64 * 10.0));
        }
        // 449 - 400 = 49 interactions since reset: still the longest
        assert_eq!(agg.estimate_p98(449).unwrap().latency, 110.0);
    }

    proptest! {
        #[test]
        fn retains_top_ten_latencies(durations in prop::collection::vec(0u32..1000, 0..80)) {
            let mut agg = InteractionAggregator::new();
            for (i, d) in durations.iter().enumerate() {
                agg.process_entry(&entry(i as u64 + 1, i as f64 * 10.0, *d as f64));
            }

            let retained = latencies(&agg);
            prop_assert!(retained.len() <= MAX_INTERACTIONS_TO_CONSIDER);
            prop_assert!(retained.windows(2).all(|w| w[0] >= w[1]));

            let mut expected: Vec<f64> = durations.iter().map(|d| *d as f64).collect();
            expected.sort_by(|a, b| b.partial_cmp(a).unwrap());
            expected.truncate(MAX_INTERACTIONS_TO_CONSIDER);
            prop_assert_eq!(retained, expected);
        }

        #[test]
        fn repeated_ids_merge_before_ranking(
            entries in prop::collection::vec((1u64..16, 0u32..1000), 0..80),
        ) {
            let mut agg = InteractionAggregator::new();
            let mut longest_by_id: HashMap<u64, f64> = HashMap::new();
            for (i, (id, d)) in entries.iter().enumerate() {
                let duration = *d as f64;
                agg.process_entry(&entry(*id, i as f64 * 10.0, duration));
                let longest = longest_by_id.entry(*id).or_insert(duration);
                *longest = longest.max(duration);
            }

            let mut expected: Vec<f64> = longest_by_id.into_values().collect();
            expected.sort_by(|a, b| b.partial_cmp(a).unwrap());
            expected.truncate(MAX_INTERACTIONS_TO_CONSIDER);
            prop_assert_eq!(latencies(&agg), expected);

            let mut ids: Vec<u64> = agg.longest().map(|r| r.id).collect();
            ids.sort_unstable();
            ids.dedup();
            prop_assert_eq!(ids.len(), agg.len());
            for record in agg.longest() {
                prop_assert!(!record.entries.is_empty());
                prop_assert!(record
                    .entries
                    .iter()
                    .all(|e| e.duration == record.latency && e.interaction_id == Some(record.id)));
            }
        }
    }
}
