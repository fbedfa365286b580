//! Pre-pruning strategies (C4): cheap, structural or log-statistic tests
//! applied to a candidate place *before* it is replayed, so the search
//! driver can skip the replay entirely.

use std::collections::HashMap;
use std::sync::RwLock;

use itertools::Itertools;

use crate::config::PrePruningRule;
use crate::log::{ActivityMask, EncodedLog};
use crate::place::Place;

/// A composed pre-pruning check: the rules configured via
/// [`PrePruningRule`], each with whatever log-statistic cache it needs,
/// OR'd together by [`PrePruning::should_prune`].
pub struct PrePruning {
    rules: Vec<PrePruningRule>,
    start_mask: ActivityMask,
    end_mask: ActivityMask,
    /// `follow_all[(a, b)]`: fraction of *all* distinct traces in which
    /// `b` eventually follows `a`. Used by `HeuristicFollows`.
    follow_all: HashMap<(ActivityMask, ActivityMask), f32>,
    /// `follow_given_both[(a, b)]`: fraction of the distinct traces
    /// containing *both* `a` and `b` in which `b` eventually follows `a`.
    /// Used by `InterestingPlaces`.
    follow_given_both: HashMap<(ActivityMask, ActivityMask), f32>,
    /// Traces `ImportantTraces` must keep replayable, plus the growing set
    /// of already-accepted fitting places it replays them against.
    important: Option<ImportantTracesState>,
}

struct ImportantTracesState {
    traces: Vec<Vec<ActivityMask>>,
    accepted: RwLock<Vec<Place>>,
}

impl PrePruning {
    /// Builds the caches every configured rule needs, scanning the log
    /// once up front rather than per-candidate.
    pub fn initialize(
        log: &EncodedLog,
        rules: Vec<PrePruningRule>,
        important_traces: Vec<Vec<ActivityMask>>,
    ) -> Self {
        let needs_follow_all = rules
            .iter()
            .any(|r| matches!(r, PrePruningRule::HeuristicFollows { .. }));
        let needs_follow_given_both = rules
            .iter()
            .any(|r| matches!(r, PrePruningRule::InterestingPlaces { .. }));
        let needs_important = rules
            .iter()
            .any(|r| matches!(r, PrePruningRule::ImportantTraces));

        let activities: Vec<ActivityMask> = (0..log.activities.len()).map(|i| 1u64 << i).collect();

        let follow_all = if needs_follow_all {
            build_follow_matrix(log, &activities, FollowDenominator::AllTraces)
        } else {
            HashMap::new()
        };
        let follow_given_both = if needs_follow_given_both {
            build_follow_matrix(log, &activities, FollowDenominator::TracesContainingBoth)
        } else {
            HashMap::new()
        };
        let important = if needs_important {
            Some(ImportantTracesState {
                traces: important_traces,
                accepted: RwLock::new(Vec::new()),
            })
        } else {
            None
        };

        PrePruning {
            rules,
            start_mask: log.start_mask,
            end_mask: log.end_mask,
            follow_all,
            follow_given_both,
            important,
        }
    }

    /// `true` if any configured rule rejects `place` before replay.
    pub fn should_prune(&self, place: &Place) -> bool {
        self.rules.iter().any(|rule| self.rule_prunes(rule, place))
    }

    /// Called by the search driver whenever a place is collected as
    /// fitting, so `ImportantTraces` can account for it in future replay
    /// checks.
    pub fn record_accepted(&self, place: Place) {
        if let Some(state) = &self.important {
            state.accepted.write().unwrap().push(place);
        }
    }

    fn rule_prunes(&self, rule: &PrePruningRule, place: &Place) -> bool {
        match rule {
            PrePruningRule::Useless => place.is_useless(self.start_mask, self.end_mask),
            PrePruningRule::HeuristicFollows { follow_threshold } => {
                for_each_in_out_pair(place, |a, b| {
                    let follows = self.follow_all.get(&(a, b)).copied().unwrap_or(0.0);
                    (1.0 - follows) > *follow_threshold
                })
            }
            PrePruningRule::InterestingPlaces { support_threshold } => {
                for_each_in_out_pair(place, |a, b| {
                    let support = self.follow_given_both.get(&(a, b)).copied().unwrap_or(0.0);
                    support < *support_threshold
                })
            }
            PrePruningRule::RestrictArity { max_in, max_out } => {
                place.input_len as usize > *max_in || place.output_len as usize > *max_out
            }
            PrePruningRule::ImportantTraces => {
                let Some(state) = &self.important else {
                    return false;
                };
                let mut candidate = state.accepted.read().unwrap().clone();
                candidate.push(*place);
                !can_replay_all_to_completion(&state.traces, &candidate)
            }
        }
    }
}

/// `true` if `place` contains at least one `(a ∈ I, b ∈ O)` pair for which
/// `pair_fails` holds.
fn for_each_in_out_pair(place: &Place, pair_fails: impl Fn(ActivityMask, ActivityMask) -> bool) -> bool {
    let mut input = place.input;
    while input != 0 {
        let a = input & input.wrapping_neg();
        input &= input - 1;
        let mut output = place.output;
        while output != 0 {
            let b = output & output.wrapping_neg();
            output &= output - 1;
            if pair_fails(a, b) {
                return true;
            }
        }
    }
    false
}

enum FollowDenominator {
    AllTraces,
    TracesContainingBoth,
}

/// `true` if `b` eventually occurs somewhere after `a`'s first occurrence
/// in `trace`.
fn eventually_follows(trace: &[ActivityMask], a: ActivityMask, b: ActivityMask) -> bool {
    match trace.iter().position(|&e| e == a) {
        Some(idx) => trace[idx + 1..].iter().any(|&e| e == b),
        None => false,
    }
}

fn build_follow_matrix(
    log: &EncodedLog,
    activities: &[ActivityMask],
    denominator: FollowDenominator,
) -> HashMap<(ActivityMask, ActivityMask), f32> {
    let total_traces = log.num_distinct_traces().max(1) as f32;
    let mut matrix = HashMap::new();
    for (&a, &b) in activities.iter().cartesian_product(activities.iter()) {
        if a == b {
            continue;
        }
        let mut follows_count = 0usize;
        let mut denom_count = 0usize;
        for (trace, _freq) in &log.traces {
            let contains_a = trace.iter().any(|&e| e == a);
            let contains_b = trace.iter().any(|&e| e == b);
            match denominator {
                FollowDenominator::AllTraces => {
                    if contains_a && eventually_follows(trace, a, b) {
                        follows_count += 1;
                    }
                }
                FollowDenominator::TracesContainingBoth => {
                    if contains_a && contains_b {
                        denom_count += 1;
                        if eventually_follows(trace, a, b) {
                            follows_count += 1;
                        }
                    }
                }
            }
        }
        let support = match denominator {
            FollowDenominator::AllTraces => follows_count as f32 / total_traces,
            FollowDenominator::TracesContainingBoth => {
                if denom_count == 0 {
                    0.0
                } else {
                    follows_count as f32 / denom_count as f32
                }
            }
        };
        matrix.insert((a, b), support);
    }
    matrix
}

/// Simulates `traces` against `places` as a token-flow net (consuming a
/// token from every place with the firing activity in its output before
/// producing into every place with it in its input, same order as
/// [`crate::place::evaluate`]'s single-place replay). Returns `false` as
/// soon as any place would need to consume a token it doesn't have.
///
/// This is a simplified soundness check used only to decide whether
/// `ImportantTraces` pre-pruning accepts a candidate, not a general
/// conformance checker.
fn can_replay_all_to_completion(traces: &[Vec<ActivityMask>], places: &[Place]) -> bool {
    traces
        .iter()
        .all(|trace| can_replay_to_completion(trace, places))
}

fn can_replay_to_completion(trace: &[ActivityMask], places: &[Place]) -> bool {
    let mut tokens = vec![0i64; places.len()];
    for &event in trace {
        for (i, place) in places.iter().enumerate() {
            if event & place.output != 0 {
                tokens[i] -= 1;
                if tokens[i] < 0 {
                    return false;
                }
            }
        }
        for (i, place) in places.iter().enumerate() {
            if event & place.input != 0 {
                tokens[i] += 1;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::encode_log;

    fn log_of(traces: &[&[&str]]) -> EncodedLog {
        let traces: Vec<Vec<String>> = traces
            .iter()
            .map(|t| t.iter().map(|s| s.to_string()).collect())
            .collect();
        encode_log(&traces).unwrap()
    }

    #[test]
    fn useless_rule_prunes_start_in_output_or_end_in_input() {
        let log = log_of(&[&["a", "b"]]);
        let pruning = PrePruning::initialize(&log, vec![PrePruningRule::Useless], Vec::new());
        let start_as_output = Place::new(log.mask_of("a").unwrap(), log.start_mask);
        assert!(pruning.should_prune(&start_as_output));
        let end_as_input = Place::new(log.end_mask, log.mask_of("b").unwrap());
        assert!(pruning.should_prune(&end_as_input));
        let fine = Place::new(log.mask_of("a").unwrap(), log.mask_of("b").unwrap());
        assert!(!pruning.should_prune(&fine));
    }

    #[test]
    fn restrict_arity_prunes_oversized_sets() {
        let log = log_of(&[&["a", "b", "c"]]);
        let pruning = PrePruning::initialize(
            &log,
            vec![PrePruningRule::RestrictArity { max_in: 1, max_out: 1 }],
            Vec::new(),
        );
        let a = log.mask_of("a").unwrap();
        let b = log.mask_of("b").unwrap();
        let c = log.mask_of("c").unwrap();
        let oversized = Place::new(a | b, c);
        assert!(pruning.should_prune(&oversized));
        let ok = Place::new(a, c);
        assert!(!pruning.should_prune(&ok));
    }

    #[test]
    fn interesting_places_prunes_unsupported_relations() {
        let log = log_of(&[&["a", "b"], &["a", "b"], &["a", "x"]]);
        let pruning = PrePruning::initialize(
            &log,
            vec![PrePruningRule::InterestingPlaces { support_threshold: 0.9 }],
            Vec::new(),
        );
        let a = log.mask_of("a").unwrap();
        let b = log.mask_of("b").unwrap();
        // a -> b holds in both traces containing both: support 1.0, kept.
        assert!(!pruning.should_prune(&Place::new(a, b)));
    }

    #[test]
    fn no_rules_never_prunes() {
        let log = log_of(&[&["a", "b"]]);
        let pruning = PrePruning::initialize(&log, Vec::new(), Vec::new());
        let place = Place::new(log.start_mask, log.end_mask);
        assert!(!pruning.should_prune(&place));
    }
}
