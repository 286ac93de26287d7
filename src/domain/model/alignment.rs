// Alignment model - Reference/query supports, intervals and the derived lengths

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use super::{Interval, IntervalType, Parameter, Parameterized};
use crate::domain::errors::{DomainError, DomainResult};
use crate::signal::SharedSignal;

/// Slack allowed when comparing accumulated reference lengths against the support
const LENGTH_TOLERANCE: f64 = 1e-9;

/// Maps consecutive reference intervals onto consecutive query intervals.
///
/// The reference side is fixed: it starts at `ref_begin` and each interval
/// advances by its reference length. The query side starts at `β_L` (derived
/// from the `begin`/`end` parameters) and each interval advances by its
/// query length, which may depend on the other intervals.
#[derive(Clone)]
pub struct AlignmentModel {
    f_ref: SharedSignal,
    f_qry: SharedSignal,
    ref_begin: Parameter,
    qry_begin: Parameter,
    qry_end: Parameter,
    gamma_d: Option<f64>,
    intervals: Vec<Interval>,
}

impl AlignmentModel {
    /// Create a model without intervals.
    ///
    /// `ref_begin` must carry a value within its bounds; its bounds become the
    /// reference support. The query support spans from the lower bound of
    /// `qry_begin` to the upper bound of `qry_end`. `gamma_d`, when given, is
    /// the minimum query duration enforced by the model itself.
    pub fn new(
        f_ref: SharedSignal,
        f_qry: SharedSignal,
        ref_begin: Parameter,
        mut qry_begin: Parameter,
        mut qry_end: Parameter,
        gamma_d: Option<f64>,
    ) -> DomainResult<Self> {
        let (b_lb, e_ub) = match (qry_begin.lower_bound, qry_end.upper_bound) {
            (Some(lb), Some(ub)) => (lb, ub),
            _ => {
                return Err(DomainError::InvalidSupport(
                    "The query support needs a lower bound on begin and an upper bound on end"
                        .to_string(),
                ))
            }
        };
        if b_lb.is_nan() || e_ub.is_nan() || b_lb >= e_ub {
            // begin-upper and end-lower are not part of the support
            return Err(DomainError::InvalidSupport(
                "begin/end bounds misconfigured".to_string(),
            ));
        }
        qry_begin.require_value()?;
        qry_end.require_value()?;

        if let Some(gamma_d) = gamma_d {
            if gamma_d.is_nan() || gamma_d < 0.0 || gamma_d > e_ub - b_lb {
                return Err(DomainError::BadArgs(format!(
                    "gamma_d must lie within [0, {}], got {}",
                    e_ub - b_lb,
                    gamma_d
                )));
            }
        }

        qry_begin.name = "begin".to_string();
        qry_end.name = "end".to_string();

        let mut model = Self {
            f_ref,
            f_qry,
            ref_begin: Parameter::new("ref_begin"),
            qry_begin,
            qry_end,
            gamma_d,
            intervals: Vec::new(),
        };
        model.set_ref_begin(ref_begin)?;
        Ok(model)
    }

    pub fn f_ref(&self) -> &SharedSignal {
        &self.f_ref
    }

    pub fn f_qry(&self) -> &SharedSignal {
        &self.f_qry
    }

    pub fn gamma_d(&self) -> Option<f64> {
        self.gamma_d
    }

    pub fn ref_begin(&self) -> &Parameter {
        &self.ref_begin
    }

    /// Replace the reference begin; its bounds become the reference support
    pub fn set_ref_begin(&mut self, value: Parameter) -> DomainResult<&mut Self> {
        match value.value {
            Some(v) if !v.is_nan() => {}
            _ => {
                return Err(DomainError::InvalidParameter(
                    "A concrete begin is required".to_string(),
                ))
            }
        }
        if !value.is_within_bounds()? {
            return Err(DomainError::InvalidParameter(
                "The begin is not within bounds".to_string(),
            ));
        }

        let (lo, hi) = (
            value.lower_bound.unwrap_or(f64::NAN),
            value.upper_bound.unwrap_or(f64::NAN),
        );
        if lo >= hi {
            return Err(DomainError::InvalidSupport(
                "The reference support is ill-defined".to_string(),
            ));
        }
        self.ref_begin = value;
        Ok(self)
    }

    pub fn qry_begin(&self) -> &Parameter {
        &self.qry_begin
    }

    pub fn qry_end(&self) -> &Parameter {
        &self.qry_end
    }

    /// Reference support `(lower, upper)`, the bounds of `ref_begin`
    pub fn ref_supp(&self) -> (f64, f64) {
        (
            self.ref_begin.lower_bound.unwrap_or(f64::NAN),
            self.ref_begin.upper_bound.unwrap_or(f64::NAN),
        )
    }

    pub fn set_ref_supp(&mut self, value: (f64, f64)) -> DomainResult<&mut Self> {
        if value.0.is_nan() || value.1.is_nan() || value.0 >= value.1 {
            return Err(DomainError::InvalidSupport(
                "The reference support is ill-defined".to_string(),
            ));
        }
        self.ref_begin.set_bounds(value.0, value.1);
        Ok(self)
    }

    /// Query support: lower bound of begin to upper bound of end
    pub fn qry_supp(&self) -> (f64, f64) {
        (
            self.qry_begin.lower_bound.unwrap_or(f64::NAN),
            self.qry_end.upper_bound.unwrap_or(f64::NAN),
        )
    }

    /// Intervals in order, optionally only those of one type
    pub fn intervals(&self, interval_type: Option<IntervalType>) -> Vec<&Interval> {
        self.intervals
            .iter()
            .filter(|i| interval_type.map_or(true, |t| i.interval_type() == t))
            .collect()
    }

    pub fn interval(&self, idx: usize) -> DomainResult<&Interval> {
        self.intervals.get(idx).ok_or_else(|| Self::no_interval(idx, self.intervals.len()))
    }

    fn no_interval(idx: usize, count: usize) -> DomainError {
        DomainError::OutOfRange(format!(
            "Interval index {} is out of bounds, the model has {} intervals",
            idx, count
        ))
    }

    pub fn has_flexible_interval(&self) -> bool {
        self.count_of(IntervalType::Flexible) == 1
    }

    fn count_of(&self, interval_type: IntervalType) -> usize {
        self.intervals
            .iter()
            .filter(|i| i.interval_type() == interval_type)
            .count()
    }

    /// Insert an interval at `idx` (or append when `None` or past the end)
    pub fn add_interval(&mut self, interval: Interval, idx: Option<usize>) -> DomainResult<&mut Self> {
        let kind = interval.interval_type();
        if kind == IntervalType::Flexible && self.has_flexible_interval() {
            return Err(DomainError::InvalidInterval(
                "A model can only have zero to one flexible intervals".to_string(),
            ));
        }
        let claims_rest = |t: IntervalType| matches!(t, IntervalType::Flexible | IntervalType::Relative);
        if claims_rest(kind)
            && self
                .intervals
                .iter()
                .any(|i| claims_rest(i.interval_type()) && i.interval_type() != kind)
        {
            return Err(DomainError::InvalidInterval(
                "Flexible and relative intervals cannot share the available length".to_string(),
            ));
        }

        // Check reference support
        let (lo, hi) = self.ref_supp();
        let ref_length = hi - lo;
        let used_ref_length: f64 = self.intervals.iter().map(|i| i.ref_length()).sum();
        let excess = used_ref_length + interval.ref_length() - ref_length;
        if excess > LENGTH_TOLERANCE {
            return Err(DomainError::InvalidInterval(format!(
                "Cannot add interval as reference-length would exceed the available length of {} by {}",
                ref_length, excess
            )));
        }

        let idx = idx.unwrap_or(self.intervals.len()).min(self.intervals.len());
        debug!(index = idx, interval_type = %kind, ref_length = interval.ref_length(), "Adding interval");
        self.intervals.insert(idx, interval);
        Ok(self)
    }

    pub fn is_open_begin(&self) -> bool {
        self.qry_begin.is_trainable
    }

    pub fn is_open_end(&self) -> bool {
        self.qry_end.is_trainable
    }

    /// Total number of intervals (P)
    pub fn num_intervals(&self) -> usize {
        self.intervals.len()
    }

    /// Reference boundaries θ_b: `ref_begin` followed by the running sum of reference lengths
    pub fn reference_boundaries(&self) -> Vec<f64> {
        let mut t = Vec::with_capacity(self.intervals.len() + 1);
        let mut current = self.ref_begin.value.unwrap_or(f64::NAN);
        t.push(current);
        for interval in &self.intervals {
            current += interval.ref_length();
            t.push(current);
        }
        t
    }

    /// Index κ(x) of the interval whose reference span contains `x`
    pub fn interval_index_for(&self, x: f64) -> DomainResult<usize> {
        if self.intervals.is_empty() {
            return Err(DomainError::IllegalState(
                "The model has no intervals".to_string(),
            ));
        }
        let t = self.reference_boundaries();
        let last = t[t.len() - 1];
        if x.is_nan() || x < t[0] || x > last {
            return Err(DomainError::OutOfRange(format!(
                "x={} is out of range, needs to be {} <= x <= {}.",
                x, t[0], last
            )));
        }

        for idx in 0..self.intervals.len() - 1 {
            if x >= t[idx] && x < t[idx + 1] {
                return Ok(idx);
            }
        }
        Ok(self.intervals.len() - 1)
    }

    /// Begin of the query side β_L
    pub fn beta_l(&self) -> DomainResult<f64> {
        let (b, e) = self.begin_end()?;
        match self.gamma_d {
            // Handled by optimizer + external constraints
            None => Ok(b),
            Some(gamma_d) => {
                let b_lb = self.qry_begin.lower_bound.unwrap_or(f64::NEG_INFINITY);
                let e_ub = self.qry_end.upper_bound.unwrap_or(f64::INFINITY);
                Ok((e_ub - gamma_d).min(b_lb.max(b.min(e))))
            }
        }
    }

    /// End of the query side β_U
    pub fn beta_u(&self) -> DomainResult<f64> {
        let (b, e) = self.begin_end()?;
        match self.gamma_d {
            None => Ok(e),
            Some(gamma_d) => {
                let b_lb = self.qry_begin.lower_bound.unwrap_or(f64::NEG_INFINITY);
                let e_ub = self.qry_end.upper_bound.unwrap_or(f64::INFINITY);
                Ok((b_lb + gamma_d).max(e_ub.min(b.max(e))))
            }
        }
    }

    fn begin_end(&self) -> DomainResult<(f64, f64)> {
        let b = self.qry_begin.require_value()?;
        let e = self.qry_end.require_value()?;
        if self.gamma_d.is_none() && b > e {
            return Err(DomainError::IllegalState(
                "end comes before begin; check inequality constraints".to_string(),
            ));
        }
        Ok((b, e))
    }

    /// Query length ρ left over for relative and flexible intervals
    pub fn available_length(&self) -> DomainResult<f64> {
        let mut fixed = 0.0;
        for interval in &self.intervals {
            if matches!(
                interval.interval_type(),
                IntervalType::Constant | IntervalType::MinMax
            ) {
                fixed += interval.stored_length()?;
            }
        }
        Ok(self.beta_u()? - self.beta_l()? - fixed)
    }

    /// Ratios r of the relative intervals
    pub fn relative_lengths(&self) -> Vec<f64> {
        self.intervals
            .iter()
            .filter_map(|i| i.rel_length())
            .collect()
    }

    /// μ_R: equal share for every relative interval when all ratios are zero
    pub fn mu_r(&self) -> f64 {
        let r = self.relative_lengths();
        if !r.is_empty() && r.iter().sum::<f64>() == 0.0 {
            1.0 / r.len() as f64
        } else {
            0.0
        }
    }

    /// ϑ_R: ratios shifted by μ_R
    pub fn vartheta_r(&self) -> Vec<f64> {
        let mu = self.mu_r();
        self.relative_lengths().into_iter().map(|r| r + mu).collect()
    }

    /// Query length of interval `idx`
    pub fn interval_length(&self, idx: usize) -> DomainResult<f64> {
        let interval = self.interval(idx)?;
        match interval.interval_type() {
            IntervalType::Constant | IntervalType::MinMax => interval.stored_length(),
            IntervalType::Flexible => self.available_length(),
            IntervalType::Relative => {
                let r = interval.rel_length().unwrap_or(0.0);
                let total: f64 = self.vartheta_r().iter().sum();
                Ok((r + self.mu_r()) * self.available_length()? / total)
            }
        }
    }

    /// Query lengths of all intervals, in order
    pub fn interval_lengths(&self) -> DomainResult<Vec<f64>> {
        (0..self.intervals.len())
            .map(|idx| self.interval_length(idx))
            .collect()
    }

    /// Offset φ of interval `idx` from β_L: the lengths of all preceding intervals
    pub fn interval_offset(&self, idx: usize) -> DomainResult<f64> {
        self.interval(idx)?;
        let mut offset = 0.0;
        for j in 0..idx {
            offset += self.interval_length(j)?;
        }
        Ok(offset)
    }

    /// Trainable parameter values keyed `{name}_{position}`
    pub fn trainable_params_as_dict(&self) -> BTreeMap<String, Option<f64>> {
        self.trainable_dict(|p| p.value)
    }

    pub fn lower_bounds_as_dict(&self) -> BTreeMap<String, Option<f64>> {
        self.trainable_dict(|p| p.lower_bound)
    }

    pub fn upper_bounds_as_dict(&self) -> BTreeMap<String, Option<f64>> {
        self.trainable_dict(|p| p.upper_bound)
    }

    fn trainable_dict<F>(&self, pick: F) -> BTreeMap<String, Option<f64>>
    where
        F: Fn(&Parameter) -> Option<f64>,
    {
        self.trainable_params()
            .into_iter()
            .enumerate()
            .map(|(idx, p)| (format!("{}_{}", p.name, idx + 1), pick(p)))
            .collect()
    }

    fn params_mut(&mut self) -> Vec<&mut Parameter> {
        let mut params: Vec<&mut Parameter> = vec![&mut self.qry_begin, &mut self.qry_end];
        params.extend(
            self.intervals
                .iter_mut()
                .filter_map(|i| i.length_param_mut()),
        );
        params
    }

    /// Current values of the trainable parameters; unset values read as 0
    pub fn trainable_values(&self) -> Vec<f64> {
        self.trainable_params()
            .into_iter()
            .map(|p| p.value.unwrap_or(0.0))
            .collect()
    }

    /// Overwrite the trainable parameters, in `trainable_params` order
    pub fn set_trainable_values(&mut self, values: &[f64]) -> DomainResult<()> {
        let mut params: Vec<&mut Parameter> = self
            .params_mut()
            .into_iter()
            .filter(|p| p.is_trainable)
            .collect();
        if params.len() != values.len() {
            return Err(DomainError::BadArgs(format!(
                "Expected {} trainable values, got {}",
                params.len(),
                values.len()
            )));
        }
        if let Some(idx) = values.iter().position(|v| v.is_nan()) {
            return Err(DomainError::InvalidParameter(format!(
                "Value for '{}' is NaN",
                params[idx].name
            )));
        }

        for (param, &value) in params.iter_mut().zip(values) {
            param.value = Some(value);
        }
        Ok(())
    }
}

impl Parameterized for AlignmentModel {
    fn params(&self) -> Vec<&Parameter> {
        let mut params = vec![&self.qry_begin, &self.qry_end];
        params.extend(self.intervals.iter().flat_map(|i| i.params()));
        params
    }
}

impl fmt::Debug for AlignmentModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlignmentModel")
            .field("ref_begin", &self.ref_begin)
            .field("qry_begin", &self.qry_begin)
            .field("qry_end", &self.qry_end)
            .field("gamma_d", &self.gamma_d)
            .field("intervals", &self.intervals)
            .finish_non_exhaustive()
    }
}
