#![warn(
    clippy::doc_markdown,
    missing_debug_implementations,
    rust_2018_idioms,
    missing_docs
)]
#![allow(clippy::needless_doctest_main)]
#![doc = include_str!("../README.md")]

/// Configuration: `Config` and the tagged strategy-selection enums consumed
/// by every other module.
pub mod config;
/// Orchestrator (C7): the strictly sequential `log -> order -> search ->
/// postprocess` pipeline, with per-phase timing and cancellation.
pub mod discover;
/// Error kinds surfaced by the crate (`InvalidLog`, `InvalidConfig`,
/// `LPSolverFailure`, `Cancelled`, `WorkerPanic`).
pub mod error;
/// Log encoder (C1): `START`/`END` injection, activity-to-bitmask
/// assignment, trace deduplication with frequency counts.
pub mod log;
/// Small boolean-LP solving interface used by the post-processor, with a
/// branch-and-bound fallback for the solver-less case.
pub mod lp;
/// External net-builder demonstration: wraps a fitting place set into a
/// `petri_net::PetriNet`.
pub mod net_builder;
/// Activity orderings (C2): the five ordering strategies that shape the
/// red/blue candidate-place search tree.
pub mod order;
/// Petri net data structure, used only by [`net_builder`].
pub mod petri_net {
    /// `PetriNet` struct and its places/transitions/arcs/markings.
    pub mod petri_net_struct;

    #[doc(inline)]
    pub use petri_net_struct::PetriNet;
}
/// Place + Fitness evaluator (C3): bitmask replay of a place against the
/// deduplicated log.
pub mod place;
/// Pre-pruning strategies (C4): pluggable predicates rejecting candidate
/// places before replay.
pub mod pruning;
/// Search driver (C5): the depth-first traversal of the red/blue
/// candidate-place tree.
pub mod search;
/// Post-processor (C6): LP-based removal of implicit places.
pub mod postprocess;
/// Per-phase timing and pruning-count statistics returned alongside the
/// discovered place set.
pub mod stats;

#[cfg(test)]
mod tests;

#[doc(inline)]
pub use config::Config;

#[doc(inline)]
pub use discover::{run, run_cancellable};

#[doc(inline)]
pub use error::EstMinerError;

#[doc(inline)]
pub use place::Place;

#[doc(inline)]
pub use petri_net::petri_net_struct::PetriNet;

#[doc(inline)]
pub use stats::Stats;
