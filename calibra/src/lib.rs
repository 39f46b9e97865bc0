//! Exact and loopy inference over graphical models with discrete and Gaussian variables.
//!
//! The crate is layered, leaves first:
//! * [`scope`]: canonical variable ordering and linear index arithmetic,
//! * [`factor`]: discrete (table) and Gaussian (canonical form) factor algebra,
//! * [`graph`] and [`cluster_graph`]: moralization, triangulation, clique extraction and
//!   junction tree assembly,
//! * [`calibration`]: message passing over cluster graphs,
//! * [`inference`]: query answering on top of the previous layers.

pub mod calibration;
pub mod cluster_graph;
pub mod factor;
pub mod graph;
pub mod inference;
pub(crate) mod linalg;
pub mod scope;

pub use calibration::{
    calibrate, CalibrationConfig, CalibrationPolicy, CalibrationReport, CalibrationState,
    MessageKind,
};
pub use cluster_graph::{Cluster, ClusterGraph, ClusterId, Edge, EdgeId};
pub use factor::{DiscreteFactor, FactorSet, GaussianFactor, Potential};
pub use inference::{
    ClusterGraphInferencer, DiscreteQueries, Inferencer, NaiveInferencer, VariableElimination,
};
pub use scope::{IndexCoder, IndexMapper, Scope, Variable, VariableKind};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CalibraError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibraError {
    #[error("No variable named {0}.")]
    UnknownVariable(String),
    #[error("Variable {0} is not continuous, it cannot appear in a Gaussian factor.")]
    NotContinuous(String),
    #[error("Variable {0} is not discrete, it cannot appear in a table factor.")]
    NotDiscrete(String),
    #[error("Discrete variable {0} has no values.")]
    InvalidCardinality(String),
    #[error("Scope {inner:?} is not contained in scope {outer:?}.")]
    ScopeMismatch {
        inner: Vec<String>,
        outer: Vec<String>,
    },
    #[error("Wrong number of values: got {got}, expected {expected}.")]
    ValueCount { expected: usize, got: usize },
    #[error("Assignment {assignment:?} is out of range for cardinalities {cardinalities:?}.")]
    InvalidAssignment {
        assignment: Vec<usize>,
        cardinalities: Vec<usize>,
    },
    #[error("Potential values must be finite and non-negative (found {0}).")]
    InvalidPotential(f64),
    #[error("Incorrect dimension for {what}: expected {expected}, got {got}.")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("Division of non-zero value {numerator} by zero at index {index}.")]
    DivisionByZero { index: usize, numerator: f64 },
    #[error("Matrix is singular or not positive definite ({0}).")]
    Singular(&'static str),
    #[error("Cluster {cluster} is not an endpoint of edge {edge}.")]
    NotConnected { cluster: usize, edge: usize },
    #[error("The cluster graph is disconnected: {partitions} partitions remain.")]
    Disconnected { partitions: usize },
    #[error("Invalid elimination order: {0}")]
    EliminationOrder(String),
    #[error(
        "Projection {projection:?} and elimination order {order:?} do not partition the model scope {model:?}."
    )]
    EliminationScope {
        projection: Vec<String>,
        order: Vec<String>,
        model: Vec<String>,
    },
    #[error("Exact propagation requires a tree-shaped cluster graph.")]
    NotTree,
    #[error("No single cluster covers the query scope {0:?}.")]
    UncoveredQuery(Vec<String>),
    #[error("Unknown edge {0}.")]
    UnknownEdge(usize),
    #[error("Unknown cluster {0}.")]
    UnknownCluster(usize),
    #[error("Cluster {cluster} has no factor {factor}.")]
    UnknownFactor { cluster: usize, factor: usize },
    #[error("The calibration state is read-only.")]
    ReadOnly,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
