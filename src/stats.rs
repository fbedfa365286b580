//! Run statistics: a flat, serde-serializable struct with a
//! `to_json`/`from_json` pair, populated phase by phase as
//! [`crate::discover::run`] progresses.

use serde::{Deserialize, Serialize};

/// Per-phase timings and pruning counters for one [`crate::discover::run`]
/// call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stats {
    /// Milliseconds spent in log encoding (C1).
    pub log_encoding_millis: u128,
    /// Milliseconds spent building the two activity orders (C2).
    pub order_calculation_millis: u128,
    /// Milliseconds spent in the search driver (C5), including replay.
    pub search_millis: u128,
    /// Milliseconds spent in post-processing (C6).
    pub post_processing_millis: u128,
    /// Wall-clock milliseconds for the whole `run` call.
    pub total_millis: u128,

    /// Milliseconds spent specifically inside [`crate::place::evaluate`]
    /// calls, summed across every candidate replayed. Tracked separately
    /// from `search_millis` because replay dominates search cost.
    pub replay_millis: u128,
    /// Number of candidate places actually replayed (fitness-evaluated).
    pub places_evaluated: u64,
    /// Number of places collected as fitting before post-processing.
    pub places_fitting: u64,

    /// Places whose red (input-extending) subtree was cut off by an
    /// `OVERFED` verdict, counted via the `2^|missing| - 1` subtree-size
    /// formula rather than by actually visiting them.
    pub pruned_red_places: u64,
    /// Same, for blue (output-extending) subtrees cut off by `UNDERFED`.
    pub pruned_blue_places: u64,
    /// Candidates rejected by a pre-pruning rule before replay.
    pub pre_pruned_places: u64,

    /// Places removed by post-processing, broken down by the pass that
    /// removed them.
    pub removed_structural_implicit: u64,
    pub removed_concurrent_implicit: u64,
    pub removed_redundant: u64,

    /// Non-fatal errors collected along the way (LP solver failures,
    /// per-root worker panics, cancellation). `run` still returns its
    /// best-effort result when this is non-empty.
    pub errors: Vec<String>,
}

impl Stats {
    pub fn total_pruned_places(&self) -> u64 {
        self.pruned_red_places + self.pruned_blue_places
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    pub fn from_json(json: &str) -> serde_json::Result<Stats> {
        serde_json::from_str(json)
    }
}
