//! iATW - Interval-based time warping
//!
//! Aligns a query signal to a reference signal by splitting the reference
//! support into intervals and mapping each onto a span of the query. Interval
//! lengths are constant, bounded, relative or flexible, and the query begin
//! and end are fitted by minimizing losses over the warped signals.
//!
//! # Usage
//!
//! ```bash
//! iatw inspect --problem problem.toml
//! iatw evaluate --problem problem.toml --warping-path 11
//! iatw fit --problem problem.toml --output report.json
//! ```

pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod optimizer;
pub mod signal;
pub mod utils;

// Re-export commonly used types
pub use config::ProblemConfig;
pub use domain::errors::{DomainError, DomainResult};
pub use domain::model::{AlignmentModel, Interval, IntervalType, Parameter, Parameterized};
pub use domain::problem::AlignmentProblem;
pub use error::{IatwError, IatwResult};
pub use optimizer::{OptimizationReport, OptimizerConfig, ProjectedGradientDescent};
pub use signal::{SampledSignal, SharedSignal, Signal};
