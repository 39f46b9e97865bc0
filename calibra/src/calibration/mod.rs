//! Message passing over cluster graphs.
//!
//! A [`CalibrationState`] owns every mutable quantity (cluster beliefs and directed messages).
//! [`calibrate`] runs one of three schedules over it:
//! * [`CalibrationPolicy::Exact`]: collect then distribute on a tree, exact in `2 × edges`
//!   messages,
//! * [`CalibrationPolicy::RoundRobin`]: a fixed schedule repeated until a pass changes nothing,
//! * [`CalibrationPolicy::Prioritized`]: always update the edge whose endpoints disagree most.
//!
//! Loopy schedules stop after a fixed number of message updates (by default ten per edge),
//! returning a best-effort state flagged as not converged.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cluster_graph::{ClusterGraph, ClusterId};
use crate::factor::Potential;
use crate::{CalibraError, Result};

mod exact;
mod prioritized;
mod round_robin;
mod state;

pub use state::{CalibrationState, Directed};

/// How messages are computed and absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MessageKind {
    /// Message: marginal of the cluster potential times every other incoming message.
    /// Beliefs are recomputed from scratch when stale.
    #[default]
    SumProduct,
    /// Message: marginal of the sender belief divided by the reverse message. Beliefs are
    /// updated in place by dividing out the previous message.
    BeliefUpdate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalibrationPolicy {
    /// Two-pass propagation on a tree, rooted at `root` (cluster 0 by default).
    Exact { root: Option<ClusterId> },
    RoundRobin,
    Prioritized,
}

impl Default for CalibrationPolicy {
    fn default() -> Self {
        CalibrationPolicy::Exact { root: None }
    }
}

/// Configuration of a calibration run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    pub policy: CalibrationPolicy,
    pub message_kind: MessageKind,
    /// A message whose distance from its previous value is at most this is not an update, and
    /// the prioritized schedule stops when no edge disagrees by more. Distances are
    /// [`Potential::distance`], linear in small differences of the normalized potentials.
    pub tolerance: f64,
    /// Maximum number of message updates, ten per edge when `None`.
    pub max_iterations: Option<usize>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            policy: CalibrationPolicy::default(),
            message_kind: MessageKind::default(),
            tolerance: 1e-10,
            max_iterations: None,
        }
    }
}

impl CalibrationConfig {
    pub fn exact() -> Self {
        Self::default()
    }
    pub fn round_robin() -> Self {
        Self {
            policy: CalibrationPolicy::RoundRobin,
            ..Self::default()
        }
    }
    pub fn prioritized() -> Self {
        Self {
            policy: CalibrationPolicy::Prioritized,
            ..Self::default()
        }
    }
    pub fn with_message_kind(self, message_kind: MessageKind) -> Self {
        Self {
            message_kind,
            ..self
        }
    }
    pub fn with_tolerance(self, tolerance: f64) -> Self {
        Self { tolerance, ..self }
    }
    pub fn with_max_iterations(self, max_iterations: usize) -> Self {
        Self {
            max_iterations: Some(max_iterations),
            ..self
        }
    }
    pub fn with_root(self, root: ClusterId) -> Self {
        Self {
            policy: CalibrationPolicy::Exact { root: Some(root) },
            ..self
        }
    }

    pub fn validate(self) -> Result<Self> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(CalibraError::InvalidConfig(
                "tolerance must be finite and >= 0".into(),
            ));
        }
        if self.max_iterations == Some(0) {
            return Err(CalibraError::InvalidConfig(
                "max_iterations must be > 0".into(),
            ));
        }
        Ok(self)
    }

    /// Maximum number of message updates on a graph with `num_edges` edges.
    pub fn iteration_cap(&self, num_edges: usize) -> usize {
        self.max_iterations.unwrap_or(10 * num_edges)
    }
}

/// Outcome of a calibration run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub policy: CalibrationPolicy,
    pub message_kind: MessageKind,
    /// Number of messages sent.
    pub iterations: usize,
    /// Round-robin passes (0 for the other policies).
    pub passes: usize,
    /// False when the iteration cap was hit first.
    pub converged: bool,
    pub max_iterations: usize,
}

/// Counts message updates against the iteration cap.
#[derive(Debug)]
pub(crate) struct Budget {
    cap: usize,
    used: usize,
}

impl Budget {
    fn new(cap: usize) -> Self {
        Self { cap, used: 0 }
    }
    /// Consumes one update, false once the cap is reached.
    pub(crate) fn take(&mut self) -> bool {
        if self.used >= self.cap {
            return false;
        }
        self.used += 1;
        true
    }
    pub(crate) fn used(&self) -> usize {
        self.used
    }
}

/// Outcome of a schedule, before it is turned into a [`CalibrationReport`].
#[derive(Debug, Default)]
pub(crate) struct Run {
    pub(crate) converged: bool,
    pub(crate) passes: usize,
}

/// Calibrates `state` (built for `graph`) with the schedule of `config`.
pub fn calibrate<P: Potential>(
    graph: &ClusterGraph<P>,
    state: &mut CalibrationState<P>,
    config: &CalibrationConfig,
) -> Result<CalibrationReport> {
    let config = config.validate()?;
    if state.message_kind() != config.message_kind {
        return Err(CalibraError::InvalidConfig(format!(
            "state was built for {:?} messages, configuration asks for {:?}",
            state.message_kind(),
            config.message_kind
        )));
    }
    let cap = config.iteration_cap(graph.num_edges());
    let mut budget = Budget::new(cap);
    let run = match config.policy {
        CalibrationPolicy::Exact { root } => {
            exact::calibrate(graph, state, root.unwrap_or(0), &mut budget)?
        }
        CalibrationPolicy::RoundRobin => {
            round_robin::calibrate(graph, state, config.tolerance, &mut budget)?
        }
        CalibrationPolicy::Prioritized => {
            prioritized::calibrate(graph, state, config.tolerance, &mut budget)?
        }
    };
    let report = CalibrationReport {
        policy: config.policy,
        message_kind: config.message_kind,
        iterations: budget.used(),
        passes: run.passes,
        converged: run.converged,
        max_iterations: cap,
    };
    if report.converged {
        info!(
            policy = ?report.policy,
            kind = ?report.message_kind,
            messages = report.iterations,
            "calibration converged"
        );
    } else {
        warn!(
            policy = ?report.policy,
            kind = ?report.message_kind,
            messages = report.iterations,
            cap,
            "calibration stopped at the iteration cap before converging"
        );
    }
    Ok(report)
}
