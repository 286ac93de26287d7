// Domain rules - Inequality constraints on the alignment model

use serde::Serialize;
use std::fmt;

use crate::domain::model::*;

/// Slack allowed before a constraint counts as violated
const TOLERANCE: f64 = 1e-9;

/// A broken inequality constraint
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConstraintViolation {
    /// The query begin lies after the query end
    BeginAfterEnd { begin: f64, end: f64 },
    /// Fixed-length intervals need more than the query span offers
    NegativeAvailableLength { available: f64 },
    /// The query intervals leave the query support
    OutsideQuerySupport { begin: f64, end: f64, support: (f64, f64) },
    /// A parameter value lies outside its box bounds
    ParameterOutOfBounds { name: String, value: f64 },
    /// A derived quantity could not be computed
    Undefined { reason: String },
}

impl fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintViolation::BeginAfterEnd { begin, end } => {
                write!(f, "query begin {} lies after query end {}", begin, end)
            }
            ConstraintViolation::NegativeAvailableLength { available } => {
                write!(f, "available query length is negative ({})", available)
            }
            ConstraintViolation::OutsideQuerySupport { begin, end, support } => write!(
                f,
                "query intervals span [{}, {}] outside the support [{}, {}]",
                begin, end, support.0, support.1
            ),
            ConstraintViolation::ParameterOutOfBounds { name, value } => {
                write!(f, "parameter '{}' = {} is outside its bounds", name, value)
            }
            ConstraintViolation::Undefined { reason } => write!(f, "{}", reason),
        }
    }
}

/// Business rules for feasible model states
pub struct ConstraintChecker;

impl ConstraintChecker {
    /// All violated constraints of `model`; empty when feasible
    pub fn check(model: &AlignmentModel) -> Vec<ConstraintViolation> {
        let mut violations = Self::check_parameter_bounds(model);

        if model.gamma_d().is_none() {
            if let (Some(begin), Some(end)) = (model.qry_begin().value, model.qry_end().value) {
                if begin > end {
                    // Nothing below is defined in this state
                    violations.push(ConstraintViolation::BeginAfterEnd { begin, end });
                    return violations;
                }
            }
        }

        if model.num_intervals() == 0 {
            return violations;
        }

        match model.available_length() {
            Ok(available) if available < -TOLERANCE => {
                violations.push(ConstraintViolation::NegativeAvailableLength { available })
            }
            Ok(_) => {}
            Err(e) => violations.push(ConstraintViolation::Undefined {
                reason: e.to_string(),
            }),
        }

        match (model.beta_l(), model.interval_lengths()) {
            (Ok(begin), Ok(lengths)) => {
                let end = begin + lengths.iter().sum::<f64>();
                let support = model.qry_supp();
                if begin < support.0 - TOLERANCE || end > support.1 + TOLERANCE {
                    violations.push(ConstraintViolation::OutsideQuerySupport { begin, end, support });
                }
            }
            (Err(e), _) | (_, Err(e)) => violations.push(ConstraintViolation::Undefined {
                reason: e.to_string(),
            }),
        }

        violations
    }

    /// Whether `model` satisfies every constraint
    pub fn is_feasible(model: &AlignmentModel) -> bool {
        Self::check(model).is_empty()
    }

    fn check_parameter_bounds(model: &AlignmentModel) -> Vec<ConstraintViolation> {
        model
            .params()
            .into_iter()
            .filter_map(|p| {
                let value = p.value?;
                let below = p.lower_bound.map_or(false, |lb| value < lb - TOLERANCE);
                let above = p.upper_bound.map_or(false, |ub| value > ub + TOLERANCE);
                (below || above).then(|| ConstraintViolation::ParameterOutOfBounds {
                    name: p.name.clone(),
                    value,
                })
            })
            .collect()
    }
}
