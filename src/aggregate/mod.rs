//! Running state behind the windowed and percentile metrics.
//!
//! Each aggregator is owned by exactly one calculator. Attribution layers
//! hook into it through listeners instead of subscribing a second time,
//! so no entry is ever counted twice.

pub mod interaction;
pub mod largest_paint;
pub mod layout_shift;

use std::panic::{self, AssertUnwindSafe};

use crate::error::Result;

pub use interaction::{Interaction, InteractionAggregator, InteractionListener};
pub use largest_paint::{LargestPaintAggregator, PaintListener};
pub use layout_shift::{LayoutShiftAggregator, ShiftListener};

/// Run a listener so that neither its error nor its panic reaches the
/// aggregation path.
pub(crate) fn isolate<F>(hook: &str, f: F)
where
    F: FnOnce() -> Result<()>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => log::warn!("{hook} listener failed: {err}"),
        Err(_) => log::warn!("{hook} listener panicked"),
    }
}
