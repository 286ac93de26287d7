// Domain models - Parameters, intervals and the alignment model

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::errors::{DomainError, DomainResult};

mod alignment;

pub use alignment::AlignmentModel;

/// A named scalar with optional box bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: Option<f64>,
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
    pub is_trainable: bool,
}

impl Parameter {
    /// Create a trainable parameter without value or bounds
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            lower_bound: None,
            upper_bound: None,
            is_trainable: true,
        }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.set_bounds(lower, upper);
        self
    }

    pub fn trainable(mut self, is_trainable: bool) -> Self {
        self.is_trainable = is_trainable;
        self
    }

    /// Mark as not trainable
    pub fn fixed(self) -> Self {
        self.trainable(false)
    }

    pub fn bounds(&self) -> (Option<f64>, Option<f64>) {
        (self.lower_bound, self.upper_bound)
    }

    pub fn set_bounds(&mut self, lower: f64, upper: f64) {
        self.lower_bound = Some(lower);
        self.upper_bound = Some(upper);
    }

    /// Value, or an error naming the parameter when it is unset
    pub fn require_value(&self) -> DomainResult<f64> {
        self.value.ok_or_else(|| {
            DomainError::InvalidParameter(format!("Parameter '{}' has no value", self.name))
        })
    }

    /// Check whether the value lies within both bounds.
    ///
    /// Fails when the value or a bound is missing or NaN.
    pub fn is_within_bounds(&self) -> DomainResult<bool> {
        let (lb, ub, v) = match (self.lower_bound, self.upper_bound, self.value) {
            (Some(lb), Some(ub), Some(v)) => (lb, ub, v),
            _ => {
                return Err(DomainError::InvalidParameter(format!(
                    "Cannot check if '{}' is within bounds if they are not set or value is not present",
                    self.name
                )))
            }
        };

        if [lb, ub, v].iter().any(|x| x.is_nan()) {
            return Err(DomainError::InvalidParameter(format!(
                "Cannot check bounds of '{}' if any value is NaN",
                self.name
            )));
        }
        Ok(v >= lb && v <= ub)
    }

    /// Clamp `v` into whichever bounds are set
    pub fn project(&self, v: f64) -> f64 {
        let mut v = v;
        if let Some(lb) = self.lower_bound {
            v = v.max(lb);
        }
        if let Some(ub) = self.upper_bound {
            v = v.min(ub);
        }
        v
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{:.6}", v));
        write!(
            f,
            "{} = {} [{}, {}]{}",
            self.name,
            show(self.value),
            show(self.lower_bound),
            show(self.upper_bound),
            if self.is_trainable { "" } else { " (fixed)" }
        )
    }
}

/// Anything that exposes parameters
pub trait Parameterized {
    /// All parameters, in a stable order
    fn params(&self) -> Vec<&Parameter>;

    /// The subset of `params` that an optimizer may change
    fn trainable_params(&self) -> Vec<&Parameter> {
        self.params()
            .into_iter()
            .filter(|p| p.is_trainable)
            .collect()
    }
}

/// How an interval's query length is determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum IntervalType {
    /// Fixed length
    Constant,
    /// Trainable length within box bounds
    MinMax,
    /// Takes up the whole available length
    Flexible,
    /// Share of the available length, weighted by a trainable ratio
    Relative,
}

impl IntervalType {
    /// Parse an interval type from its name
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "constant" => Ok(IntervalType::Constant),
            "min_max" | "minmax" => Ok(IntervalType::MinMax),
            "flexible" => Ok(IntervalType::Flexible),
            "relative" => Ok(IntervalType::Relative),
            _ => Err(DomainError::BadArgs(format!("Invalid interval type: {}", s))),
        }
    }
}

impl TryFrom<String> for IntervalType {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl fmt::Display for IntervalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IntervalType::Constant => "constant",
            IntervalType::MinMax => "min_max",
            IntervalType::Flexible => "flexible",
            IntervalType::Relative => "relative",
        };
        write!(f, "{}", name)
    }
}

fn check_ref_length(ref_length: f64) -> DomainResult<()> {
    if ref_length.is_nan() || ref_length <= 0.0 {
        return Err(DomainError::InvalidInterval(
            "The reference length must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

fn check_length(length: f64) -> DomainResult<()> {
    if length.is_nan() || length < 0.0 {
        return Err(DomainError::InvalidInterval(
            "You must not pass NaN or a negative value for the length".to_string(),
        ));
    }
    Ok(())
}

/// One segment of the alignment: a span of the reference matched to a span of the query.
///
/// The query length of relative and flexible intervals depends on the rest of
/// the model; see [`AlignmentModel::interval_length`].
#[derive(Debug, Clone, PartialEq)]
pub struct Interval {
    interval_type: IntervalType,
    ref_length: f64,
    length: Option<Parameter>,
}

impl Interval {
    /// Interval with a fixed query length
    pub fn constant(ref_length: f64, length: f64) -> DomainResult<Self> {
        check_ref_length(ref_length)?;
        check_length(length)?;
        Ok(Self {
            interval_type: IntervalType::Constant,
            ref_length,
            length: Some(
                Parameter::new("len")
                    .with_value(length)
                    .with_bounds(length, length)
                    .fixed(),
            ),
        })
    }

    /// Interval whose query length is trainable, optionally within `(min, max)`.
    ///
    /// The box bounds only bound the optimizer; inequality constraints between
    /// intervals are checked by [`crate::domain::rules::ConstraintChecker`].
    pub fn min_max(
        ref_length: f64,
        length: f64,
        min_max_lengths: Option<(f64, f64)>,
    ) -> DomainResult<Self> {
        check_ref_length(ref_length)?;
        check_length(length)?;
        let mut interval = Self {
            interval_type: IntervalType::MinMax,
            ref_length,
            length: Some(Parameter::new("len").with_value(length)),
        };
        if let Some(mm) = min_max_lengths {
            interval.set_min_max_lengths(mm)?;
        }
        Ok(interval)
    }

    /// Interval taking a share of the available query length.
    ///
    /// `rel_length` is a non-negative weight; an unset weight counts as 0.
    pub fn relative(ref_length: f64, rel_length: Option<f64>) -> DomainResult<Self> {
        check_ref_length(ref_length)?;
        let mut param = Parameter::new("rel_len");
        param.lower_bound = Some(0.0);
        if let Some(r) = rel_length {
            check_length(r)?;
            param.value = Some(r);
        }
        Ok(Self {
            interval_type: IntervalType::Relative,
            ref_length,
            length: Some(param),
        })
    }

    /// Interval taking up all of the available query length
    pub fn flexible(ref_length: f64) -> DomainResult<Self> {
        check_ref_length(ref_length)?;
        Ok(Self {
            interval_type: IntervalType::Flexible,
            ref_length,
            length: None,
        })
    }

    pub fn interval_type(&self) -> IntervalType {
        self.interval_type
    }

    pub fn ref_length(&self) -> f64 {
        self.ref_length
    }

    pub fn set_ref_length(&mut self, value: f64) -> DomainResult<&mut Self> {
        check_ref_length(value)?;
        self.ref_length = value;
        Ok(self)
    }

    /// The length (or, for relative intervals, the weight) parameter
    pub fn length_param(&self) -> Option<&Parameter> {
        self.length.as_ref()
    }

    pub(crate) fn length_param_mut(&mut self) -> Option<&mut Parameter> {
        self.length.as_mut()
    }

    /// Stored length for constant and min/max intervals
    pub fn stored_length(&self) -> DomainResult<f64> {
        match (&self.interval_type, &self.length) {
            (IntervalType::Constant | IntervalType::MinMax, Some(p)) => p.require_value(),
            _ => Err(DomainError::InvalidInterval(format!(
                "A {} interval has no stored length",
                self.interval_type
            ))),
        }
    }

    /// Ratio of a relative interval; unset counts as 0
    pub fn rel_length(&self) -> Option<f64> {
        match (&self.interval_type, &self.length) {
            (IntervalType::Relative, Some(p)) => Some(p.value.unwrap_or(0.0)),
            _ => None,
        }
    }

    /// Set the length (constant, min/max) or weight (relative)
    pub fn set_length(&mut self, value: f64) -> DomainResult<&mut Self> {
        if self.interval_type == IntervalType::Flexible {
            return Err(DomainError::InvalidInterval(
                "A flexible interval cannot have an explicit length".to_string(),
            ));
        }
        check_length(value)?;

        let constant = self.interval_type == IntervalType::Constant;
        if let Some(p) = self.length.as_mut() {
            p.value = Some(value);
            if constant {
                p.set_bounds(value, value);
            }
        }
        Ok(self)
    }

    /// Box bounds of a min/max interval
    pub fn min_max_lengths(&self) -> Option<(Option<f64>, Option<f64>)> {
        match self.interval_type {
            IntervalType::MinMax => self.length.as_ref().map(|p| p.bounds()),
            _ => None,
        }
    }

    pub fn set_min_max_lengths(&mut self, min_max: (f64, f64)) -> DomainResult<&mut Self> {
        if self.interval_type != IntervalType::MinMax {
            return Err(DomainError::InvalidInterval(format!(
                "Only min/max intervals have length bounds, this one is {}",
                self.interval_type
            )));
        }
        let (min, max) = min_max;
        if min.is_nan() || max.is_nan() {
            return Err(DomainError::InvalidInterval(
                "Neither length must be NaN".to_string(),
            ));
        }
        if min >= max {
            return Err(DomainError::InvalidInterval(
                "Minimum is larger than or equal to maximum".to_string(),
            ));
        }

        let length = self.stored_length()?;
        if length < min || length > max {
            return Err(DomainError::InvalidInterval(
                "Current length is outside bounds".to_string(),
            ));
        }

        if let Some(p) = self.length.as_mut() {
            p.set_bounds(min, max);
        }
        Ok(self)
    }
}

impl Parameterized for Interval {
    fn params(&self) -> Vec<&Parameter> {
        self.length.iter().collect()
    }
}

#[cfg(test)]
mod tests;
