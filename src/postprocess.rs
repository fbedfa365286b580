//! Post-processor (C6): removes implicit places from the fitting set found
//! by C5, via the bool-LP feasibility tests behind [`crate::lp`].
//!
//! Three removal passes share the same shape: structural-implicit
//! (Colom-Silva), concurrent-implicit, and redundant-place removal, each
//! posing a [`crate::lp::solve_bool_lp`] problem per candidate place and
//! guarded by [`safe_to_remove`] so a removal never strips an activity of
//! its last feeding place.

use std::collections::{HashMap, HashSet};

use crate::config::PostProcessing;
use crate::error::EstMinerError;
use crate::log::ActivityMask;
use crate::lp::{solve_bool_lp, BoolLp, Constraint, ConstraintOp, LpOutcome, VarKind};
use crate::place::Place;

/// Counts of what each pass actually removed, for [`crate::stats::Stats`].
#[derive(Debug, Default)]
pub struct PostProcessOutcome {
    pub places: HashSet<Place>,
    pub removed_structural_implicit: u64,
    pub removed_concurrent_implicit: u64,
    pub removed_redundant: u64,
    /// One entry per place the LP solver couldn't reach a verdict for — the
    /// place is kept rather than treated as implicit.
    pub errors: Vec<String>,
}

/// `pre`/`post` incidence: `pre[p][t] = 1` iff `t ∈ I_p`, `post[p][t] = 1`
/// iff `t ∈ O_p`.
fn incidence(place: &Place, t: ActivityMask) -> (f64, f64) {
    let pre = if place.input & t != 0 { 1.0 } else { 0.0 };
    let post = if place.output & t != 0 { 1.0 } else { 0.0 };
    (pre, post)
}

/// Runs the configured post-processing pipeline over the fitting set.
///
/// `Both` runs structural removal before concurrent removal on the
/// survivors; `RedundantThenImplicit` runs redundant removal before
/// structural removal.
pub fn run(
    places: HashSet<Place>,
    activities: &[ActivityMask],
    mode: PostProcessing,
) -> PostProcessOutcome {
    let mut outcome = PostProcessOutcome {
        places,
        ..Default::default()
    };

    match mode {
        PostProcessing::None => {}
        PostProcessing::Structural => {
            remove_structural_implicit(&mut outcome, activities);
        }
        PostProcessing::Concurrent => {
            remove_concurrent_implicit(&mut outcome, activities);
        }
        PostProcessing::Both => {
            remove_structural_implicit(&mut outcome, activities);
            remove_concurrent_implicit(&mut outcome, activities);
        }
        PostProcessing::RedundantThenImplicit => {
            remove_redundant(&mut outcome, activities);
            remove_structural_implicit(&mut outcome, activities);
        }
    }

    outcome
}

/// Activity -> places that feed it as output. Removal of `q` is refused
/// when `q` is the only entry left for some activity in `O_q`, so that
/// activity never loses its last input-constraint feeder.
fn feeders_by_activity(
    places: &HashSet<Place>,
    activities: &[ActivityMask],
) -> HashMap<ActivityMask, HashSet<Place>> {
    let mut map: HashMap<ActivityMask, HashSet<Place>> =
        activities.iter().map(|&a| (a, HashSet::new())).collect();
    for &p in places {
        for &a in activities {
            if p.output & a != 0 {
                map.entry(a).or_default().insert(p);
            }
        }
    }
    map
}

fn safe_to_remove(
    candidate: &Place,
    activities: &[ActivityMask],
    feeders: &HashMap<ActivityMask, HashSet<Place>>,
) -> bool {
    activities
        .iter()
        .filter(|&&a| candidate.output & a != 0)
        .all(|a| feeders.get(a).map_or(true, |f| f.len() > 1))
}

fn remove_structural_implicit(outcome: &mut PostProcessOutcome, activities: &[ActivityMask]) {
    let mut remaining: HashSet<Place> = outcome.places.clone();
    let mut feeders = feeders_by_activity(&remaining, activities);
    let candidates: Vec<Place> = outcome.places.iter().copied().collect();

    for q in candidates {
        if !remaining.contains(&q) {
            continue;
        }
        if !safe_to_remove(&q, activities, &feeders) {
            continue;
        }
        let others: Vec<Place> = remaining.iter().copied().filter(|&p| p != q).collect();
        match is_structurally_implicit(&q, &others, activities) {
            Ok(true) => {
                remaining.remove(&q);
                for &a in activities {
                    if q.output & a != 0 {
                        if let Some(set) = feeders.get_mut(&a) {
                            set.remove(&q);
                        }
                    }
                }
                outcome.removed_structural_implicit += 1;
            }
            Ok(false) => {}
            Err(e) => outcome.errors.push(e.to_string()),
        }
    }

    outcome.places = remaining;
}

fn remove_concurrent_implicit(outcome: &mut PostProcessOutcome, activities: &[ActivityMask]) {
    let mut remaining: HashSet<Place> = outcome.places.clone();
    let mut feeders = feeders_by_activity(&remaining, activities);
    let candidates: Vec<Place> = outcome.places.iter().copied().collect();

    for q in candidates {
        if !remaining.contains(&q) {
            continue;
        }
        if !safe_to_remove(&q, activities, &feeders) {
            continue;
        }
        let others: Vec<Place> = remaining.iter().copied().filter(|&p| p != q).collect();
        match is_concurrently_implicit(&q, &others, activities) {
            Ok(true) => {
                remaining.remove(&q);
                for &a in activities {
                    if q.output & a != 0 {
                        if let Some(set) = feeders.get_mut(&a) {
                            set.remove(&q);
                        }
                    }
                }
                outcome.removed_concurrent_implicit += 1;
            }
            Ok(false) => {}
            Err(e) => outcome.errors.push(e.to_string()),
        }
    }

    outcome.places = remaining;
}

fn remove_redundant(outcome: &mut PostProcessOutcome, activities: &[ActivityMask]) {
    let mut remaining: HashSet<Place> = outcome.places.clone();
    let mut feeders = feeders_by_activity(&remaining, activities);
    let candidates: Vec<Place> = outcome.places.iter().copied().collect();

    for q in candidates {
        if !remaining.contains(&q) {
            continue;
        }
        if !safe_to_remove(&q, activities, &feeders) {
            continue;
        }
        let others: Vec<Place> = remaining.iter().copied().filter(|&p| p != q).collect();
        match is_redundant(&q, &others, activities) {
            Ok(true) => {
                remaining.remove(&q);
                for &a in activities {
                    if q.output & a != 0 {
                        if let Some(set) = feeders.get_mut(&a) {
                            set.remove(&q);
                        }
                    }
                }
                outcome.removed_redundant += 1;
            }
            Ok(false) => {}
            Err(e) => outcome.errors.push(e.to_string()),
        }
    }

    outcome.places = remaining;
}

/// Colom-Silva structural-implicit test: feasible non-negative weights `y`
/// over `others` plus an integer slack `mu`, minimized; `q` is implicit iff
/// the minimum is `<= 0`.
fn is_structurally_implicit(
    q: &Place,
    others: &[Place],
    activities: &[ActivityMask],
) -> Result<bool, EstMinerError> {
    if others.is_empty() {
        return Ok(false);
    }

    let n = others.len();
    // vars: y_0..y_{n-1} (bool), then mu (bounded integer — a single place's
    // token delta per activity is in [-1, 1], so mu never needs a wider
    // range than the activity count to express any achievable slack).
    let mu_index = n;
    let mu_bound = activities.len() as i64 + 1;
    let mut vars = vec![VarKind::Bool; n];
    vars.push(VarKind::Integer { lower: -mu_bound, upper: mu_bound });

    let mut constraints = Vec::new();
    for &t in activities {
        let (pre_q, post_q) = incidence(q, t);
        let mut coeffs = vec![0.0; n + 1];
        for (i, p) in others.iter().enumerate() {
            let (pre_p, post_p) = incidence(p, t);
            coeffs[i] = post_p - pre_p;
        }
        constraints.push(Constraint {
            coeffs,
            op: ConstraintOp::LessOrEqual,
            rhs: post_q - pre_q,
        });
    }
    for &t in activities {
        if q.output & t == 0 {
            continue;
        }
        let (pre_q, _) = incidence(q, t);
        let mut coeffs = vec![0.0; n + 1];
        for (i, p) in others.iter().enumerate() {
            let (pre_p, _) = incidence(p, t);
            coeffs[i] = pre_p;
        }
        coeffs[mu_index] = 1.0;
        constraints.push(Constraint {
            coeffs,
            op: ConstraintOp::GreaterOrEqual,
            rhs: pre_q,
        });
    }

    // Minimize mu: maximize -mu.
    let mut objective = vec![0.0; n + 1];
    objective[mu_index] = -1.0;
    let problem = BoolLp { vars, objective, constraints };

    match solve_bool_lp(&problem) {
        LpOutcome::Optimal { value, .. } => Ok(-value <= 0.0),
        LpOutcome::Infeasible => Ok(false),
        LpOutcome::Error(msg) => Err(EstMinerError::LPSolverFailure(msg)),
    }
}

/// Concurrent-implicit test: same shape but two independent selector
/// vectors `y`/`z`, `mu` capped above by zero and *maximized*.
fn is_concurrently_implicit(
    q: &Place,
    others: &[Place],
    activities: &[ActivityMask],
) -> Result<bool, EstMinerError> {
    if others.is_empty() {
        return Ok(false);
    }

    let n = others.len();
    let y_base = 0;
    let z_base = n;
    let mu_index = 2 * n;
    let mu_bound = activities.len() as i64 + 1;

    let mut vars = vec![VarKind::Bool; 2 * n];
    vars.push(VarKind::Integer { lower: -mu_bound, upper: 0 });

    let mut constraints = Vec::new();
    for &t in activities {
        let (pre_q, post_q) = incidence(q, t);
        let mut coeffs = vec![0.0; 2 * n + 1];
        for (i, p) in others.iter().enumerate() {
            let (pre_p, post_p) = incidence(p, t);
            coeffs[y_base + i] = post_p - pre_p;
        }
        constraints.push(Constraint {
            coeffs,
            op: ConstraintOp::LessOrEqual,
            rhs: post_q - pre_q,
        });
    }
    for &t in activities {
        if q.output & t == 0 {
            continue;
        }
        let (pre_q, _) = incidence(q, t);
        let mut coeffs = vec![0.0; 2 * n + 1];
        for (i, p) in others.iter().enumerate() {
            let (pre_p, _) = incidence(p, t);
            coeffs[z_base + i] = pre_p;
        }
        coeffs[mu_index] = 1.0;
        constraints.push(Constraint {
            coeffs,
            op: ConstraintOp::GreaterOrEqual,
            rhs: pre_q,
        });
    }

    let mut objective = vec![0.0; 2 * n + 1];
    objective[mu_index] = 1.0;
    let problem = BoolLp { vars, objective, constraints };

    match solve_bool_lp(&problem) {
        LpOutcome::Optimal { value, .. } => Ok(value <= 0.0),
        LpOutcome::Infeasible => Ok(false),
        LpOutcome::Error(msg) => Err(EstMinerError::LPSolverFailure(msg)),
    }
}

/// Redundant-place test (`is_redundant`): equality constraints rather than
/// the implicit tests' inequality family, minimizing the number of other
/// places used to exactly reproduce `q`'s incidence, bounded to at most one
/// unit of slack per activity.
fn is_redundant(q: &Place, others: &[Place], activities: &[ActivityMask]) -> Result<bool, EstMinerError> {
    if others.is_empty() {
        return Ok(false);
    }

    let n = others.len();
    let vars = vec![VarKind::Bool; n];
    let objective = vec![0.0; n]; // feasibility only

    let mut constraints = Vec::new();
    for &t in activities {
        let (pre_q, post_q) = incidence(q, t);
        let mut pre_coeffs = vec![0.0; n];
        let mut post_coeffs = vec![0.0; n];
        for (i, p) in others.iter().enumerate() {
            let (pre_p, post_p) = incidence(p, t);
            pre_coeffs[i] = pre_p;
            post_coeffs[i] = post_p;
        }
        constraints.push(Constraint { coeffs: pre_coeffs.clone(), op: ConstraintOp::Equal, rhs: pre_q });
        constraints.push(Constraint { coeffs: post_coeffs.clone(), op: ConstraintOp::Equal, rhs: post_q });
        constraints.push(Constraint { coeffs: pre_coeffs, op: ConstraintOp::LessOrEqual, rhs: 1.0 });
        constraints.push(Constraint { coeffs: post_coeffs, op: ConstraintOp::LessOrEqual, rhs: 1.0 });
    }

    let problem = BoolLp { vars, objective, constraints };
    match solve_bool_lp(&problem) {
        LpOutcome::Optimal { .. } => Ok(true),
        LpOutcome::Infeasible => Ok(false),
        LpOutcome::Error(msg) => Err(EstMinerError::LPSolverFailure(msg)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::encode_log;

    fn log_activities(labels: &[&str]) -> (crate::log::EncodedLog, Vec<ActivityMask>) {
        let log = encode_log(&[labels.iter().map(|s| s.to_string()).collect()]).unwrap();
        let activities = (0..log.activities.len()).map(|i| 1u64 << i).collect();
        (log, activities)
    }

    #[test]
    fn removes_structurally_implicit_chain_shortcut() {
        // S5: {(a,b), (b,c), (a,c)} -> (a,c) is implicit given the chain.
        let (log, activities) = log_activities(&["a", "b", "c"]);
        let a = log.mask_of("a").unwrap();
        let b = log.mask_of("b").unwrap();
        let c = log.mask_of("c").unwrap();

        let mut places = HashSet::new();
        places.insert(Place::new(a, b));
        places.insert(Place::new(b, c));
        places.insert(Place::new(a, c));

        let outcome = run(places, &activities, PostProcessing::Structural);
        assert!(!outcome.places.contains(&Place::new(a, c)));
        assert!(outcome.places.contains(&Place::new(a, b)));
        assert!(outcome.places.contains(&Place::new(b, c)));
        assert_eq!(outcome.removed_structural_implicit, 1);
    }

    #[test]
    fn refuses_to_remove_the_last_feeder_of_an_activity() {
        // (b,c) is c's only feeder once (a,c) is removed as implicit — the
        // safety guard must check feeder counts after each removal, not
        // just against the original candidate set.
        let (log, activities) = log_activities(&["a", "b", "c"]);
        let a = log.mask_of("a").unwrap();
        let b = log.mask_of("b").unwrap();
        let c = log.mask_of("c").unwrap();

        let mut places = HashSet::new();
        places.insert(Place::new(a, b));
        places.insert(Place::new(b, c));
        places.insert(Place::new(a, c));

        let outcome = run(places, &activities, PostProcessing::Structural);
        // (a,c) is implicit given the a->b->c chain and gets removed; (b,c)
        // becomes c's last feeder and must never be touched afterwards.
        assert!(outcome.places.contains(&Place::new(b, c)));
    }

    #[test]
    fn no_post_processing_returns_input_unchanged() {
        let (log, activities) = log_activities(&["a", "b", "c"]);
        let a = log.mask_of("a").unwrap();
        let b = log.mask_of("b").unwrap();
        let c = log.mask_of("c").unwrap();
        let mut places = HashSet::new();
        places.insert(Place::new(a, b));
        places.insert(Place::new(b, c));
        places.insert(Place::new(a, c));

        let outcome = run(places.clone(), &activities, PostProcessing::None);
        assert_eq!(outcome.places, places);
    }

    #[test]
    fn idempotent_on_a_second_pass() {
        let (log, activities) = log_activities(&["a", "b", "c"]);
        let a = log.mask_of("a").unwrap();
        let b = log.mask_of("b").unwrap();
        let c = log.mask_of("c").unwrap();
        let mut places = HashSet::new();
        places.insert(Place::new(a, b));
        places.insert(Place::new(b, c));
        places.insert(Place::new(a, c));

        let once = run(places, &activities, PostProcessing::Structural);
        let twice = run(once.places.clone(), &activities, PostProcessing::Structural);
        assert_eq!(once.places, twice.places);
        assert_eq!(twice.removed_structural_implicit, 0);
    }
}
