//! Search configuration: a single serde-serializable struct with
//! `to_json`/`from_json`, plus tagged enums for the pluggable strategies.

use serde::{Deserialize, Serialize};

use crate::error::{EstMinerError, InvalidConfig};

/// Which of the two restricted-edge tree shapes the search driver enforces.
///
/// Exactly one edge color is restricted to nodes where the *other* set is
/// still a singleton; this is what keeps every candidate place reachable
/// by exactly one path through the forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestrictedEdge {
    /// A red (input-extending) child may only be generated when `|O| = 1`.
    Red,
    /// A blue (output-extending) child may only be generated when `|I| = 1`.
    Blue,
}

impl Default for RestrictedEdge {
    fn default() -> Self {
        RestrictedEdge::Red
    }
}

/// Which activity ordering the search driver uses to generate children.
///
/// `overfed_oriented = false` is the "underfed-oriented" default polarity
/// (most-frequent-minimal input order); `true` swaps the two orders so the
/// search instead cuts off overfed subtrees earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStrategy {
    Lexicographic,
    AbsTraceFrequency { overfed_oriented: bool },
    RelTraceFrequency { overfed_oriented: bool },
    AvgTraceOcc { overfed_oriented: bool },
    AvgFirstOccIndex,
}

impl Default for OrderStrategy {
    fn default() -> Self {
        OrderStrategy::Lexicographic
    }
}

/// A single pre-pruning rule. `Config::pre_pruning` is a list of these,
/// composed by logical OR (a place is pruned if any rule fires).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PrePruningRule {
    /// Prune places with `START ∈ O` or `END ∈ I` — structurally useless.
    Useless,
    /// Prune `(I, O)` pairs where some `a ∈ I, b ∈ O` is almost never
    /// followed by the other, log-wide.
    HeuristicFollows { follow_threshold: f32 },
    /// Prune unless every `a ∈ I, b ∈ O` pair has eventual-follows support
    /// at least `support_threshold`, among traces containing both.
    InterestingPlaces { support_threshold: f32 },
    /// Prune places whose `|I|` or `|O|` exceeds the given cap.
    RestrictArity { max_in: usize, max_out: usize },
    /// Prune a place unless the configured important traces can still be
    /// replayed to completion combined with already-accepted places.
    ImportantTraces,
}

/// Which post-processing passes run, and in what order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostProcessing {
    /// No post-processing; the raw fitting set is returned as-is.
    None,
    /// Structural-implicit removal only (Colom-Silva).
    Structural,
    /// Concurrent-implicit removal only.
    Concurrent,
    /// Structural removal, then concurrent removal, on the survivors.
    Both,
    /// Redundant-place removal, then structural-implicit removal.
    RedundantThenImplicit,
}

impl Default for PostProcessing {
    fn default() -> Self {
        PostProcessing::Both
    }
}

/// Top-level knobs for [`crate::discover::run`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Noise tolerance in `(0.0, 1.0]`; `1.0` demands perfect replay fitness
    /// on every involved trace.
    pub tau: f32,
    pub order_strategy: OrderStrategy,
    pub restricted_edge: RestrictedEdge,
    pub pre_pruning: Vec<PrePruningRule>,
    /// Traces that `ImportantTraces` pre-pruning must keep replayable. Only
    /// consulted if `pre_pruning` contains [`PrePruningRule::ImportantTraces`].
    pub important_traces: Vec<Vec<String>>,
    pub post_processing: PostProcessing,
    /// Number of rayon worker threads to use for the search; `None` uses
    /// rayon's global default pool.
    pub parallelism: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            tau: 1.0,
            order_strategy: OrderStrategy::default(),
            restricted_edge: RestrictedEdge::default(),
            pre_pruning: vec![PrePruningRule::Useless],
            important_traces: Vec::new(),
            post_processing: PostProcessing::default(),
            parallelism: None,
        }
    }
}

impl Config {
    /// Validates every field's allowed range, returning `InvalidConfig` on
    /// the first violation found. Called by [`crate::discover::run`]
    /// before anything else happens.
    pub fn validate(&self) -> Result<(), EstMinerError> {
        if self.tau <= 0.0 || self.tau > 1.0 {
            return Err(InvalidConfig::TauOutOfRange(self.tau).into());
        }
        if let Some(0) = self.parallelism {
            return Err(InvalidConfig::ZeroParallelism.into());
        }
        for rule in &self.pre_pruning {
            match rule {
                PrePruningRule::HeuristicFollows { follow_threshold } => {
                    if !(0.0..=1.0).contains(follow_threshold) {
                        return Err(InvalidConfig::ThresholdOutOfRange {
                            name: "HeuristicFollows::follow_threshold",
                            value: *follow_threshold,
                        }
                        .into());
                    }
                }
                PrePruningRule::InterestingPlaces { support_threshold } => {
                    if !(0.0..=1.0).contains(support_threshold) {
                        return Err(InvalidConfig::ThresholdOutOfRange {
                            name: "InterestingPlaces::support_threshold",
                            value: *support_threshold,
                        }
                        .into());
                    }
                }
                PrePruningRule::RestrictArity { max_in, max_out } => {
                    if *max_in == 0 {
                        return Err(InvalidConfig::ArityCapTooSmall {
                            name: "RestrictArity::max_in",
                            value: *max_in,
                        }
                        .into());
                    }
                    if *max_out == 0 {
                        return Err(InvalidConfig::ArityCapTooSmall {
                            name: "RestrictArity::max_out",
                            value: *max_out,
                        }
                        .into());
                    }
                }
                PrePruningRule::Useless | PrePruningRule::ImportantTraces => {}
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    pub fn from_json(json: &str) -> serde_json::Result<Config> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn tau_out_of_range_is_rejected() {
        let cfg = Config {
            tau: 1.5,
            ..Config::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(EstMinerError::InvalidConfig(InvalidConfig::TauOutOfRange(_)))
        ));
    }

    #[test]
    fn zero_arity_cap_is_rejected() {
        let cfg = Config {
            pre_pruning: vec![PrePruningRule::RestrictArity { max_in: 0, max_out: 3 }],
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn roundtrips_through_json() {
        let cfg = Config::default();
        let json = cfg.to_json();
        let back = Config::from_json(&json).unwrap();
        assert_eq!(back.tau, cfg.tau);
    }
}
