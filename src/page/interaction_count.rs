use crate::entry::EventTiming;
use crate::host::PerformanceHost;

/// Gap between consecutive interaction ids assigned by hosts that do not
/// expose a native count.
const INTERACTION_ID_STEP: u64 = 7;

/// Number of interactions on the page so far.
///
/// Hosts that expose a native count are trusted. Otherwise the count is
/// estimated from the spread of interaction ids seen on `event` entries.
#[derive(Debug, Clone, Default)]
pub struct InteractionCounter {
    min_known_id: Option<u64>,
    max_known_id: u64,
}

impl InteractionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, entry: &EventTiming) {
        let Some(id) = entry.interaction_id.filter(|id| *id > 0) else {
            return;
        };
        self.min_known_id = Some(self.min_known_id.map_or(id, |min| min.min(id)));
        self.max_known_id = self.max_known_id.max(id);
    }

    pub fn estimate(&self) -> u64 {
        match self.min_known_id {
            Some(min) => (self.max_known_id - min) / INTERACTION_ID_STEP + 1,
            None => 0,
        }
    }

    pub fn count(&self, host: &dyn PerformanceHost) -> u64 {
        host.interaction_count().unwrap_or_else(|| self.estimate())
    }
}
