//! Orchestrator (C7): the strictly sequential log-encoding -> order-building
//! -> search -> post-processing pipeline, wired up with per-phase timing.

use std::collections::HashSet;
use std::time::Instant;

use crate::config::Config;
use crate::error::EstMinerError;
use crate::log::encode_log;
use crate::order::build_orders;
use crate::place::Place;
use crate::pruning::PrePruning;
use crate::search::{self, CancellationToken};
use crate::stats::Stats;

/// Runs the full pipeline with no external cancellation control. Equivalent
/// to `run_cancellable(log, config, CancellationToken::new())`.
pub fn run(log: &[Vec<String>], config: &Config) -> Result<(HashSet<Place>, Stats), EstMinerError> {
    run_cancellable(log, config, CancellationToken::new())
}

/// Runs the full pipeline, checking `cancel` at every search-tree node
/// boundary. A caller that wants a wall-clock timeout spawns a watchdog
/// thread that calls `cancel.cancel()` after the deadline and passes the
/// same token here.
///
/// Fails fast (before touching the log) only for `InvalidLog`/`InvalidConfig`
/// preconditions — every other failure mode (`LPSolverFailure`, `Cancelled`,
/// `WorkerPanic`) is recorded in `Stats.errors` and `run` still returns its
/// best-effort result.
pub fn run_cancellable(
    log: &[Vec<String>],
    config: &Config,
    cancel: CancellationToken,
) -> Result<(HashSet<Place>, Stats), EstMinerError> {
    config.validate()?;

    let total_started = Instant::now();
    let mut stats = Stats::default();

    let started = Instant::now();
    let encoded = encode_log(log)?;
    stats.log_encoding_millis = started.elapsed().as_millis();

    let started = Instant::now();
    let (in_order, out_order) = build_orders(&encoded, config.order_strategy);
    stats.order_calculation_millis = started.elapsed().as_millis();

    let important_traces: Vec<Vec<crate::log::ActivityMask>> = config
        .important_traces
        .iter()
        .map(|trace| {
            trace
                .iter()
                .filter_map(|label| encoded.mask_of(label))
                .collect()
        })
        .collect();
    let pre_pruning = PrePruning::initialize(&encoded, config.pre_pruning.clone(), important_traces);

    let started = Instant::now();
    let run_search = || {
        search::run(
            &encoded,
            config.tau,
            &in_order,
            &out_order,
            config.restricted_edge,
            &pre_pruning,
            &cancel,
        )
    };
    let search_outcome = match config.parallelism {
        Some(threads) => {
            match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
                Ok(pool) => pool.install(run_search),
                Err(e) => {
                    stats.errors.push(format!("failed to build thread pool: {e}"));
                    run_search()
                }
            }
        }
        None => run_search(),
    };
    stats.search_millis = started.elapsed().as_millis();

    stats.replay_millis = (search_outcome.replay_nanos / 1_000_000) as u128;
    stats.places_evaluated = search_outcome.places_evaluated;
    stats.pruned_red_places = search_outcome.pruned_red_places;
    stats.pruned_blue_places = search_outcome.pruned_blue_places;
    stats.pre_pruned_places = search_outcome.pre_pruned_places;
    stats.places_fitting = search_outcome.places.len() as u64;
    stats.errors.extend(search_outcome.errors);

    if search_outcome.cancelled {
        stats.errors.push(EstMinerError::Cancelled.to_string());
        stats.total_millis = total_started.elapsed().as_millis();
        return Ok((search_outcome.places, stats));
    }

    let started = Instant::now();
    let activities: Vec<crate::log::ActivityMask> =
        (0..encoded.activities.len()).map(|i| 1u64 << i).collect();
    let post_outcome = crate::postprocess::run(search_outcome.places, &activities, config.post_processing);
    stats.post_processing_millis = started.elapsed().as_millis();

    stats.removed_structural_implicit = post_outcome.removed_structural_implicit;
    stats.removed_concurrent_implicit = post_outcome.removed_concurrent_implicit;
    stats.removed_redundant = post_outcome.removed_redundant;
    stats.errors.extend(post_outcome.errors);

    stats.total_millis = total_started.elapsed().as_millis();

    Ok((post_outcome.places, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PrePruningRule;

    fn trace(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn rejects_invalid_config_before_touching_the_log() {
        let log = vec![trace(&["a", "b"])];
        let config = Config { tau: 0.0, ..Config::default() };
        assert!(matches!(run(&log, &config), Err(EstMinerError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_empty_log() {
        let config = Config::default();
        assert!(matches!(run(&[], &config), Err(EstMinerError::InvalidLog(_))));
    }

    #[test]
    fn end_to_end_two_activity_log() {
        let log = vec![trace(&["a", "b"]), trace(&["a", "b"])];
        let config = Config {
            pre_pruning: vec![PrePruningRule::Useless],
            post_processing: crate::config::PostProcessing::None,
            ..Config::default()
        };
        let (places, stats) = run(&log, &config).unwrap();
        assert!(!places.is_empty());
        assert!(stats.errors.is_empty());
        assert_eq!(stats.places_fitting, places.len() as u64);
    }

    #[test]
    fn cancellation_returns_partial_result_and_skips_post_processing() {
        let log = vec![trace(&["a", "b", "c", "d"]), trace(&["a", "c", "b", "d"])];
        let config = Config::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (places, stats) = run_cancellable(&log, &config, cancel).unwrap();
        assert_eq!(stats.post_processing_millis, 0);
        assert!(stats.errors.iter().any(|e| e.contains("cancelled")));
        for place in &places {
            assert!(place.input_len >= 1 && place.output_len >= 1);
        }
    }
}
