//! Error type for the crate. A plain enum with manual `Display`/`Error`
//! impls — no `thiserror`, matching the rest of the workspace.

use std::fmt;

/// Everything that can go wrong calling into this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EstMinerError {
    /// The input log failed a structural precondition.
    InvalidLog(InvalidLog),
    /// The supplied `Config` is internally inconsistent.
    InvalidConfig(InvalidConfig),
    /// A `solve_bool_lp` call could not reach a verdict.
    ///
    /// Non-fatal: the caller of [`crate::postprocess`] that hit this keeps
    /// the place in question rather than failing the whole run.
    LPSolverFailure(String),
    /// The search was cancelled via the shared cancellation flag before it
    /// finished exploring every root.
    Cancelled,
    /// A worker thread panicked while processing one root's subtree. The
    /// root's contribution is discarded; the run otherwise continues.
    WorkerPanic(String),
}

/// Why a log was rejected by [`crate::log::encode_log`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidLog {
    /// The log contains no traces at all.
    EmptyLog,
    /// Some trace in the log contains no events.
    EmptyTrace,
    /// The log mentions more distinct activities (including the injected
    /// `START`/`END` labels) than fit in a 64-bit mask.
    TooManyActivities(usize),
}

/// Why a [`crate::config::Config`] was rejected before a run starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidConfig {
    /// `tau` must lie in `(0.0, 1.0]`.
    TauOutOfRange(f32),
    /// A threshold parameter (e.g. an `InterestingPlaces` support
    /// threshold) must lie in `[0.0, 1.0]`.
    ThresholdOutOfRange { name: &'static str, value: f32 },
    /// A `RestrictArity` cap must be at least 1.
    ArityCapTooSmall { name: &'static str, value: usize },
    /// `parallelism` was set to 0.
    ZeroParallelism,
}

impl fmt::Display for EstMinerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EstMinerError::InvalidLog(e) => write!(f, "invalid log: {e}"),
            EstMinerError::InvalidConfig(e) => write!(f, "invalid config: {e}"),
            EstMinerError::LPSolverFailure(msg) => write!(f, "LP solver failure: {msg}"),
            EstMinerError::Cancelled => write!(f, "search was cancelled"),
            EstMinerError::WorkerPanic(msg) => write!(f, "worker panicked: {msg}"),
        }
    }
}

impl fmt::Display for InvalidLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidLog::EmptyLog => write!(f, "log contains no traces"),
            InvalidLog::EmptyTrace => write!(f, "log contains an empty trace"),
            InvalidLog::TooManyActivities(n) => {
                write!(f, "log has {n} distinct activities, more than the 64-bit mask width supports")
            }
        }
    }
}

impl fmt::Display for InvalidConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidConfig::TauOutOfRange(t) => write!(f, "tau={t} is not in (0.0, 1.0]"),
            InvalidConfig::ThresholdOutOfRange { name, value } => {
                write!(f, "{name}={value} is not in [0.0, 1.0]")
            }
            InvalidConfig::ArityCapTooSmall { name, value } => {
                write!(f, "{name}={value} must be at least 1")
            }
            InvalidConfig::ZeroParallelism => write!(f, "parallelism must be at least 1"),
        }
    }
}

impl std::error::Error for EstMinerError {}
impl std::error::Error for InvalidLog {}
impl std::error::Error for InvalidConfig {}

impl From<InvalidLog> for EstMinerError {
    fn from(e: InvalidLog) -> Self {
        EstMinerError::InvalidLog(e)
    }
}

impl From<InvalidConfig> for EstMinerError {
    fn from(e: InvalidConfig) -> Self {
        EstMinerError::InvalidConfig(e)
    }
}
