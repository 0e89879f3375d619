//! # Sweep Lab
//!
//! Seeded parameter sweeps of game-playing agents, from the grid of configurations to the plot
//! of one swept parameter.
//!
//! It provides:
//! - Grid generation over named axes, with filters, derived axes and role-swap doubling
//!   ([`grid`]), and the catalogue of Carcassonne sweeps ([`sweeps`])
//! - Submission of every `(configuration, seed)` pair to an execution backend ([`dispatch`]),
//!   including a local one running each unit as a separate OS process under cgroup limits
//!   ([`backend`])
//! - Extraction of numeric fields from the raw output of a run ([`extract`])
//! - Aggregation of seeded replicates into a results table ([`aggregate`])
//! - Recovery of the swept parameter from configuration names ([`recover`])
//!
//! Per-run problems (a missing field, an argument the solver cannot take, a name that does not
//! decode) are reported and logged, never fatal for the batch.
//!
//! # Documentation Overview
//!
//! - For the configuration identity and naming rules, see [`grid`].
//! - For dispatch behavior and the local worker pool, see
//!   [`Configuration`](crate::configuration::Configuration) and [`constraints`].
//! - For the error taxonomy, see [`error`].
//!
//! # Usage Example
//!
//! ```no_run
//! use sweep_lab::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let grid = Sweep::ExplorationTerms.build(ArgumentSharing::Legacy)?;
//!
//!     let constraints = ConstraintsBuilder::new().with_cpus_per_run(1).build()?;
//!     let config = Configuration::new().with_allow_uncontained(true);
//!     let backend = LocalBackend::new("results", constraints, config)?;
//!
//!     let mut dispatcher = RunDispatcher::new(backend, SolverCommand::java_jar("solver.jar"), config);
//!     dispatcher.dispatch(&grid);
//!     dispatcher.into_backend().wait_all();
//!
//!     let runs = load_store("results".as_ref(), &OutputExtractor::carcassonne()?)?;
//!     let aggregation = ResultAggregator::carcassonne().aggregate(&runs);
//!     let series = parameter_series(&aggregation.records, "expterm-", &["p1_points".into()]);
//!     println!("{:?}", series.series);
//!     Ok(())
//! }
//! ```
#![warn(missing_docs)]

pub use anyhow;

pub mod aggregate;
pub mod backend;
mod cgroup_manager;
pub mod configuration;
pub mod constraints;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod grid;
pub mod logger;
pub mod recover;
pub mod results;
pub mod sweeps;

/// Commonly used types and functions for quick access.
///
/// ```rust
/// use sweep_lab::prelude::*;
/// ```
pub mod prelude {
    pub use crate::aggregate::{read_csv, write_csv, CsvLayout, ResultAggregator};
    pub use crate::backend::LocalBackend;
    pub use crate::configuration::Configuration;
    pub use crate::constraints::ConstraintsBuilder;
    pub use crate::dispatch::{ExecutionBackend, RunDispatcher, SolverCommand};
    pub use crate::extract::OutputExtractor;
    pub use crate::grid::{Axis, GridBuilder, ParameterSpace, SweepGrid};
    pub use crate::recover::{decode_parameter, parameter_series};
    pub use crate::results::{load_store, RunResult};
    pub use crate::sweeps::{ArgumentSharing, Sweep};
}
