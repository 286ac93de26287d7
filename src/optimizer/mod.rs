//! Projected gradient descent over the trainable model parameters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::model::Parameterized;
use crate::domain::problem::AlignmentProblem;
use crate::domain::rules::ConstraintChecker;
use crate::error::{IatwError, IatwResult};

/// Step size and stopping settings for [`ProjectedGradientDescent`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Initial step length along the negative gradient
    pub learning_rate: f64,
    /// Upper limit on accepted steps
    pub max_iterations: usize,
    /// Stop once an accepted step improves the objective by less than this
    pub tolerance: f64,
    /// Relative finite-difference step
    pub fd_step: f64,
    /// Step halvings tried before giving up on an iteration
    pub max_backtracks: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.01,
            max_iterations: 200,
            tolerance: 1e-9,
            fd_step: 1e-6,
            max_backtracks: 20,
        }
    }
}

impl OptimizerConfig {
    fn validate(&self) -> IatwResult<()> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.learning_rate) {
            return Err(IatwError::ConfigError {
                message: format!("learning_rate must be positive, got {}", self.learning_rate),
            });
        }
        if !positive(self.fd_step) {
            return Err(IatwError::ConfigError {
                message: format!("fd_step must be positive, got {}", self.fd_step),
            });
        }
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(IatwError::ConfigError {
                message: format!("tolerance must be non-negative, got {}", self.tolerance),
            });
        }
        Ok(())
    }
}

/// Outcome of a fit
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationReport {
    pub iterations: usize,
    pub initial_objective: f64,
    pub final_objective: f64,
    pub converged: bool,
    /// Final trainable values keyed `{name}_{position}`
    pub parameters: BTreeMap<String, Option<f64>>,
    pub elapsed_ms: u128,
    pub finished_at: DateTime<Utc>,
}

/// Gradient descent with box projection and backtracking.
///
/// Gradients come from central differences of the problem objective. A step
/// is only accepted when the objective decreases and the model stays feasible.
#[derive(Debug, Clone, Default)]
pub struct ProjectedGradientDescent {
    config: OptimizerConfig,
}

impl ProjectedGradientDescent {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Fit the trainable model parameters of `problem` in place
    pub fn minimize(&self, problem: &mut AlignmentProblem) -> IatwResult<OptimizationReport> {
        self.config.validate()?;
        let started = Instant::now();

        let violations = ConstraintChecker::check(problem.model());
        if !violations.is_empty() {
            let reasons: Vec<String> = violations.iter().map(|v| v.to_string()).collect();
            return Err(IatwError::OptimizationError {
                message: format!("initial parameters are infeasible: {}", reasons.join("; ")),
            });
        }

        let mut x = problem.model().trainable_values();
        let initial_objective = problem.objective()?;
        let mut objective = initial_objective;

        info!(
            parameters = x.len(),
            objective = initial_objective,
            "Starting projected gradient descent"
        );

        let mut iterations = 0;
        let mut converged = x.is_empty();
        let mut step = self.config.learning_rate;

        while !converged && iterations < self.config.max_iterations {
            let gradient = self.gradient(problem, &x, objective)?;
            if gradient.iter().all(|g| *g == 0.0) {
                converged = true;
                break;
            }

            let mut accepted = None;
            for _ in 0..=self.config.max_backtracks {
                let candidate: Vec<f64> = problem
                    .model()
                    .trainable_params()
                    .into_iter()
                    .zip(x.iter().zip(&gradient))
                    .map(|(p, (xi, gi))| p.project(xi - step * gi))
                    .collect();
                if let Some(value) = try_point(problem, &candidate) {
                    if value < objective {
                        accepted = Some((candidate, value));
                        break;
                    }
                }
                step /= 2.0;
            }

            let Some((candidate, value)) = accepted else {
                warn!(iteration = iterations, step, "No descent step found, stopping");
                converged = true;
                break;
            };

            iterations += 1;
            let improvement = objective - value;
            debug!(iteration = iterations, objective = value, improvement, step, "Accepted step");

            x = candidate;
            objective = value;
            step *= 2.0;
            if improvement < self.config.tolerance {
                converged = true;
            }
        }

        problem.set_trainable_values(&x)?;

        let report = OptimizationReport {
            iterations,
            initial_objective,
            final_objective: objective,
            converged,
            parameters: problem.model().trainable_params_as_dict(),
            elapsed_ms: started.elapsed().as_millis(),
            finished_at: Utc::now(),
        };
        info!(
            iterations = report.iterations,
            objective = report.final_objective,
            converged = report.converged,
            "Optimization finished"
        );
        Ok(report)
    }

    /// Finite-difference gradient at `x`; `f_x` is the objective there
    fn gradient(&self, problem: &mut AlignmentProblem, x: &[f64], f_x: f64) -> IatwResult<Vec<f64>> {
        let mut gradient = Vec::with_capacity(x.len());
        let mut shifted = x.to_vec();

        for i in 0..x.len() {
            let h = self.config.fd_step * x[i].abs().max(1.0);

            shifted[i] = x[i] + h;
            let forward = try_point(problem, &shifted);
            shifted[i] = x[i] - h;
            let backward = try_point(problem, &shifted);
            shifted[i] = x[i];

            let g = match (forward, backward) {
                (Some(f), Some(b)) => (f - b) / (2.0 * h),
                (Some(f), None) => (f - f_x) / h,
                (None, Some(b)) => (f_x - b) / h,
                (None, None) => 0.0,
            };
            gradient.push(g);
        }

        problem.set_trainable_values(x)?;
        Ok(gradient)
    }
}

/// Objective at `values`, or `None` when the point is infeasible or cannot be evaluated
fn try_point(problem: &mut AlignmentProblem, values: &[f64]) -> Option<f64> {
    problem.set_trainable_values(values).ok()?;
    if !ConstraintChecker::is_feasible(problem.model()) {
        return None;
    }
    problem.objective().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{AlignmentModel, Interval, Parameter};
    use std::sync::Arc;

    fn shifted_problem(begin: f64, end: f64) -> AlignmentProblem {
        let mut model = AlignmentModel::new(
            Arc::new(f64::sin),
            Arc::new(|t: f64| (t - 0.5).sin()),
            Parameter::new("ref_begin").with_value(0.0).with_bounds(0.0, 1.0).fixed(),
            Parameter::new("b").with_value(begin).with_bounds(0.0, 1.0),
            Parameter::new("e").with_value(end).with_bounds(1.0, 3.0),
            None,
        )
        .unwrap();
        model.add_interval(Interval::flexible(1.0).unwrap(), None).unwrap();

        let mut problem = AlignmentProblem::new(model);
        problem.add_interval_pair_loss(0, 0, None).unwrap();
        problem
    }

    #[test]
    fn test_recovers_shift() {
        let mut problem = shifted_problem(0.3, 1.3);
        let optimizer = ProjectedGradientDescent::new(OptimizerConfig {
            learning_rate: 1e-3,
            max_iterations: 500,
            tolerance: 1e-12,
            ..OptimizerConfig::default()
        });

        let report = optimizer.minimize(&mut problem).unwrap();
        assert!(report.final_objective < report.initial_objective);
        assert!(report.iterations > 0);

        let model = problem.model();
        let b = model.qry_begin().value.unwrap();
        let e = model.qry_end().value.unwrap();
        assert!((b - 0.5).abs() < 0.05, "begin = {}", b);
        assert!((e - 1.5).abs() < 0.05, "end = {}", e);
        assert_eq!(report.parameters.len(), 2);
    }

    #[test]
    fn test_respects_bounds() {
        // The best end (1.5) lies above the upper bound of 1.2
        let mut model = AlignmentModel::new(
            Arc::new(f64::sin),
            Arc::new(|t: f64| (t - 0.5).sin()),
            Parameter::new("ref_begin").with_value(0.0).with_bounds(0.0, 1.0).fixed(),
            Parameter::new("b").with_value(0.3).with_bounds(0.0, 1.0),
            Parameter::new("e").with_value(1.1).with_bounds(1.0, 1.2),
            None,
        )
        .unwrap();
        model.add_interval(Interval::flexible(1.0).unwrap(), None).unwrap();
        let mut problem = AlignmentProblem::new(model);
        problem.add_interval_pair_loss(0, 0, None).unwrap();

        let report = ProjectedGradientDescent::default().minimize(&mut problem).unwrap();
        let e = problem.model().qry_end().value.unwrap();
        // Steps past the bound are clamped onto it
        assert!((e - 1.2).abs() < 1e-6, "e = {}", e);
        assert!(report.final_objective <= report.initial_objective);
    }

    #[test]
    fn test_nothing_to_train() {
        let mut model = AlignmentModel::new(
            Arc::new(f64::sin),
            Arc::new(f64::sin),
            Parameter::new("ref_begin").with_value(0.0).with_bounds(0.0, 1.0).fixed(),
            Parameter::new("b").with_value(0.0).with_bounds(0.0, 1.0).fixed(),
            Parameter::new("e").with_value(1.0).with_bounds(0.0, 1.0).fixed(),
            None,
        )
        .unwrap();
        model.add_interval(Interval::flexible(1.0).unwrap(), None).unwrap();
        let mut problem = AlignmentProblem::new(model);
        problem.add_interval_pair_loss(0, 0, None).unwrap();

        let report = ProjectedGradientDescent::default().minimize(&mut problem).unwrap();
        assert_eq!(report.iterations, 0);
        assert!(report.converged);
        assert!(report.parameters.is_empty());
        assert_eq!(report.initial_objective, report.final_objective);
    }

    #[test]
    fn test_infeasible_start() {
        let mut problem = shifted_problem(0.3, 1.3);
        problem.set_trainable_values(&[2.0, 2.5]).unwrap();

        let err = ProjectedGradientDescent::default().minimize(&mut problem).unwrap_err();
        assert!(matches!(err, IatwError::OptimizationError { .. }));
    }

    #[test]
    fn test_rejects_bad_config() {
        let mut problem = shifted_problem(0.3, 1.3);
        let optimizer = ProjectedGradientDescent::new(OptimizerConfig {
            learning_rate: 0.0,
            ..OptimizerConfig::default()
        });
        assert!(matches!(
            optimizer.minimize(&mut problem),
            Err(IatwError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_config_defaults_from_partial_toml() {
        let config: OptimizerConfig = toml::from_str("max_iterations = 10").unwrap();
        assert_eq!(config.max_iterations, 10);
        assert_eq!(config.learning_rate, 0.01);
    }
}
