use thiserror::Error;

use crate::host::EntryCategory;

/// Everything that can go wrong while observing a page.
///
/// None of these are fatal: the worst outcome is that a metric is never
/// reported for the visit.
#[derive(Debug, Error)]
pub enum VitalsError {
    /// The host cannot deliver entries of this category.
    #[error("entry category `{0}` is not supported by the host")]
    Unsupported(EntryCategory),

    /// A timestamp was missing, inverted or out of range.
    #[error("invalid timestamp for {field}: {value}")]
    InvalidTimestamp { field: &'static str, value: f64 },

    /// A registered listener or hook failed.
    #[error("listener failed: {0}")]
    Listener(String),
}

pub type Result<T> = std::result::Result<T, VitalsError>;
