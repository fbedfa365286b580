//! Search driver (C5): depth-first traversal of the red/blue candidate-place
//! tree, dispatched one root subtree per `rayon` task.
//!
//! Every node is pre-pruned, evaluated, collected if fitting, then expanded
//! into red (input-growing) and blue (output-growing) children in a single
//! pass. Red children always come from `in_order`, blue children from
//! `out_order` — pairing each edge color with its own order is what keeps
//! every candidate place reachable by exactly one path through the forest.
//! Root-level parallelism maps one `rayon` task per root and reduces the
//! per-root results at the end.

use std::any::Any;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;

use crate::config::RestrictedEdge;
use crate::log::{ActivityMask, EncodedLog};
use crate::order::ActivityOrder;
use crate::place::{evaluate, Place};
use crate::pruning::PrePruning;

/// Shared cooperative-cancellation flag, checked at every node boundary of
/// every root's DFS. Cloning shares the same underlying flag; a wall-clock
/// watchdog (or any other caller) sets it from outside the worker pool.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Everything [`run`] produces: the fitting set plus the counters
/// [`crate::stats::Stats`] surfaces.
#[derive(Debug, Default)]
pub struct SearchOutcome {
    pub places: HashSet<Place>,
    pub pruned_red_places: u64,
    pub pruned_blue_places: u64,
    pub pre_pruned_places: u64,
    pub places_evaluated: u64,
    pub replay_nanos: u128,
    /// One entry per worker panic or cancellation note encountered.
    pub errors: Vec<String>,
    pub cancelled: bool,
}

#[derive(Default)]
struct LocalStats {
    pruned_red: u64,
    pruned_blue: u64,
    pre_pruned: u64,
    evaluated: u64,
    replay_nanos: u128,
    errors: Vec<String>,
}

/// Runs the full forest: every `(a, b)` activity pair is a root, dispatched
/// to `rayon`'s work-stealing pool (one task per root). A worker panic is
/// caught and turned into an error entry rather than corrupting its peers.
pub fn run(
    log: &EncodedLog,
    tau: f32,
    in_order: &ActivityOrder,
    out_order: &ActivityOrder,
    restricted_edge: RestrictedEdge,
    pre_pruning: &PrePruning,
    cancel: &CancellationToken,
) -> SearchOutcome {
    let activities: Vec<ActivityMask> = (0..log.activities.len()).map(|i| 1u64 << i).collect();
    let roots: Vec<Place> = activities
        .iter()
        .flat_map(|&a| activities.iter().map(move |&b| Place::new(a, b)))
        .collect();

    let (places, stats) = roots
        .into_par_iter()
        .map(|root| run_root(root, log, tau, in_order, out_order, restricted_edge, pre_pruning, cancel))
        .reduce(
            || (HashSet::new(), LocalStats::default()),
            |mut acc, (places, local)| {
                acc.0.extend(places);
                merge_stats(&mut acc.1, local);
                acc
            },
        );

    SearchOutcome {
        places,
        pruned_red_places: stats.pruned_red,
        pruned_blue_places: stats.pruned_blue,
        pre_pruned_places: stats.pre_pruned,
        places_evaluated: stats.evaluated,
        replay_nanos: stats.replay_nanos,
        errors: stats.errors,
        cancelled: cancel.is_cancelled(),
    }
}

fn merge_stats(acc: &mut LocalStats, other: LocalStats) {
    acc.pruned_red += other.pruned_red;
    acc.pruned_blue += other.pruned_blue;
    acc.pre_pruned += other.pre_pruned;
    acc.evaluated += other.evaluated;
    acc.replay_nanos += other.replay_nanos;
    acc.errors.extend(other.errors);
}

fn run_root(
    root: Place,
    log: &EncodedLog,
    tau: f32,
    in_order: &ActivityOrder,
    out_order: &ActivityOrder,
    restricted_edge: RestrictedEdge,
    pre_pruning: &PrePruning,
    cancel: &CancellationToken,
) -> (HashSet<Place>, LocalStats) {
    let mut fitting = HashSet::new();
    let mut stats = LocalStats::default();

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        traverse(
            root,
            log,
            tau,
            in_order,
            out_order,
            restricted_edge,
            pre_pruning,
            cancel,
            &mut fitting,
            &mut stats,
        );
    }));

    if let Err(payload) = outcome {
        fitting.clear();
        stats.errors.push(format!(
            "worker panicked on root (I={:#x}, O={:#x}): {}",
            root.input,
            root.output,
            panic_message(&payload)
        ));
    }

    (fitting, stats)
}

fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// The per-node traversal contract: pre-prune, evaluate, collect if
/// fitting, then generate red/blue children unless the restricted-edge
/// mode forbids it here or the monotonicity theorems already guarantee
/// every descendant in that direction is doomed (overfed cuts the red
/// subtree, underfed cuts the blue subtree).
#[allow(clippy::too_many_arguments)]
fn traverse(
    place: Place,
    log: &EncodedLog,
    tau: f32,
    in_order: &ActivityOrder,
    out_order: &ActivityOrder,
    restricted_edge: RestrictedEdge,
    pre_pruning: &PrePruning,
    cancel: &CancellationToken,
    fitting: &mut HashSet<Place>,
    stats: &mut LocalStats,
) {
    if cancel.is_cancelled() {
        return;
    }

    if pre_pruning.should_prune(&place) {
        stats.pre_pruned += 1;
        return;
    }

    let started = Instant::now();
    let fitness = evaluate(log, &place, tau);
    stats.replay_nanos += started.elapsed().as_nanos();
    stats.evaluated += 1;

    if fitness.fitting {
        fitting.insert(place);
        pre_pruning.record_accepted(place);
    }

    let red_allowed_here = match restricted_edge {
        RestrictedEdge::Red => place.output_len == 1,
        RestrictedEdge::Blue => true,
    };
    let blue_allowed_here = match restricted_edge {
        RestrictedEdge::Blue => place.input_len == 1,
        RestrictedEdge::Red => true,
    };

    if red_allowed_here {
        if fitness.overfed {
            stats.pruned_red += subtree_size(in_order, place.input, log.end_mask);
        } else {
            let a_max = in_order.max_of_set(place.input);
            for &b in in_order.larger(a_max) {
                let child = Place::new(place.input | b, place.output);
                traverse(
                    child, log, tau, in_order, out_order, restricted_edge, pre_pruning, cancel, fitting, stats,
                );
            }
        }
    }

    if blue_allowed_here {
        if fitness.underfed {
            stats.pruned_blue += subtree_size(out_order, place.output, log.start_mask);
        } else {
            let a_max = out_order.max_of_set(place.output);
            for &b in out_order.larger(a_max) {
                let child = Place::new(place.input, place.output | b);
                traverse(
                    child, log, tau, in_order, out_order, restricted_edge, pre_pruning, cancel, fitting, stats,
                );
            }
        }
    }
}

/// `2^|missing| - 1`: the number of places that would have been enumerated
/// in the subtree rooted just below `set`'s current maximum, where `missing`
/// excludes `excluded` (an activity that can never legally extend this
/// direction — `END` for input growth, `START` for output growth).
fn subtree_size(order: &ActivityOrder, set: ActivityMask, excluded: ActivityMask) -> u64 {
    let a_max = order.max_of_set(set);
    let missing = order.larger(a_max).iter().filter(|&&m| m != excluded).count();
    (1u64 << missing.min(63)) - 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OrderStrategy, PrePruningRule};
    use crate::log::encode_log;
    use crate::order::build_orders;

    fn log_of(traces: &[&[&str]]) -> EncodedLog {
        let traces: Vec<Vec<String>> = traces
            .iter()
            .map(|t| t.iter().map(|s| s.to_string()).collect())
            .collect();
        encode_log(&traces).unwrap()
    }

    fn run_default(log: &EncodedLog, tau: f32) -> SearchOutcome {
        let (in_order, out_order) = build_orders(log, OrderStrategy::Lexicographic);
        let pre_pruning = PrePruning::initialize(log, vec![PrePruningRule::Useless], Vec::new());
        run(
            log,
            tau,
            &in_order,
            &out_order,
            RestrictedEdge::default(),
            &pre_pruning,
            &CancellationToken::new(),
        )
    }

    #[test]
    fn two_activity_log_finds_the_three_chain_places() {
        // S1: log [<a,b>, <a,b>], tau=1.
        let log = log_of(&[&["a", "b"], &["a", "b"]]);
        let outcome = run_default(&log, 1.0);

        let a = log.mask_of("a").unwrap();
        let b = log.mask_of("b").unwrap();
        assert!(outcome.places.contains(&Place::new(log.start_mask, a)));
        assert!(outcome.places.contains(&Place::new(a, b)));
        assert!(outcome.places.contains(&Place::new(b, log.end_mask)));
    }

    #[test]
    fn no_fitting_place_has_start_in_output_or_end_in_input() {
        let log = log_of(&[&["a", "b"], &["a", "c"]]);
        let outcome = run_default(&log, 1.0);
        for place in &outcome.places {
            assert!(place.output & log.start_mask == 0);
            assert!(place.input & log.end_mask == 0);
        }
    }

    #[test]
    fn cancellation_yields_a_subset_of_the_full_result() {
        let log = log_of(&[&["a", "b", "c", "d"], &["a", "c", "b", "d"]]);
        let full = run_default(&log, 1.0);

        let (in_order, out_order) = build_orders(&log, OrderStrategy::Lexicographic);
        let pre_pruning = PrePruning::initialize(&log, vec![PrePruningRule::Useless], Vec::new());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let partial = run(
            &log,
            1.0,
            &in_order,
            &out_order,
            RestrictedEdge::default(),
            &pre_pruning,
            &cancel,
        );
        assert!(partial.cancelled);
        assert!(partial.places.len() <= full.places.len());
        assert!(partial.places.is_subset(&full.places));
    }

    #[test]
    fn concurrency_scenario_has_expected_fitting_and_missing_places() {
        // S3: {<a,b,c,d>, <a,c,b,d>}.
        let log = log_of(&[&["a", "b", "c", "d"], &["a", "c", "b", "d"]]);
        let outcome = run_default(&log, 1.0);
        let a = log.mask_of("a").unwrap();
        let b = log.mask_of("b").unwrap();
        let c = log.mask_of("c").unwrap();
        let d = log.mask_of("d").unwrap();
        assert!(outcome.places.contains(&Place::new(a, b)));
        assert!(outcome.places.contains(&Place::new(a, c)));
        assert!(outcome.places.contains(&Place::new(b, d)));
        assert!(outcome.places.contains(&Place::new(c, d)));
        assert!(!outcome.places.contains(&Place::new(a, d)));
    }
}
