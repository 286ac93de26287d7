// Interval kernels - Map reference time onto query time, interval by interval

use std::fmt;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::model::{AlignmentModel, Parameter, Parameterized};

/// A warping of one query interval, viewed from the reference side
pub trait IntervalKernel: Parameterized + fmt::Debug + Send + Sync {
    /// Index of the query interval this kernel warps
    fn qry_idx(&self) -> usize;

    /// Indexes of the reference intervals this kernel reads from
    fn ref_idxs(&self) -> Vec<usize>;

    /// Reference span `(t_b, t_e)` the kernel is defined on
    fn ref_support(&self, model: &AlignmentModel) -> DomainResult<(f64, f64)>;

    /// Query span the kernel maps into
    fn qry_support(&self, model: &AlignmentModel) -> DomainResult<(f64, f64)>;

    /// Query time matched to reference time `x`
    fn warp(&self, model: &AlignmentModel, x: f64) -> DomainResult<f64>;

    /// Warped query signal at reference time `x`
    fn evaluate(&self, model: &AlignmentModel, x: f64) -> DomainResult<f64> {
        let t = self.warp(model, x)?;
        Ok(model.f_qry().value_at(t))
    }
}

/// Query begin s_b of interval `qry_idx`: β_L plus the interval's offset
pub fn source_begin(model: &AlignmentModel, qry_idx: usize) -> DomainResult<f64> {
    Ok(model.beta_l()? + model.interval_offset(qry_idx)?)
}

/// Linear map from a reference interval onto a query interval
#[derive(Debug, Clone, PartialEq)]
pub struct LinearWarpingKernel {
    qry_idx: usize,
    ref_idx: usize,
}

impl LinearWarpingKernel {
    /// Warp query interval `qry_idx` against reference interval `ref_idx` (same index when `None`)
    pub fn new(qry_idx: usize, ref_idx: Option<usize>) -> Self {
        Self {
            qry_idx,
            ref_idx: ref_idx.unwrap_or(qry_idx),
        }
    }

    pub fn ref_idx(&self) -> usize {
        self.ref_idx
    }

    /// Width Δt of the reference support
    pub fn delta_t(&self, model: &AlignmentModel) -> DomainResult<f64> {
        let (t_b, t_e) = self.ref_support(model)?;
        Ok(t_e - t_b)
    }
}

impl Parameterized for LinearWarpingKernel {
    fn params(&self) -> Vec<&Parameter> {
        Vec::new()
    }
}

impl IntervalKernel for LinearWarpingKernel {
    fn qry_idx(&self) -> usize {
        self.qry_idx
    }

    fn ref_idxs(&self) -> Vec<usize> {
        vec![self.ref_idx]
    }

    fn ref_support(&self, model: &AlignmentModel) -> DomainResult<(f64, f64)> {
        let tb = model.reference_boundaries();
        if self.ref_idx + 1 >= tb.len() {
            return Err(DomainError::OutOfRange(format!(
                "Reference interval {} does not exist, the model has {} intervals",
                self.ref_idx,
                model.num_intervals()
            )));
        }
        Ok((tb[self.ref_idx], tb[self.ref_idx + 1]))
    }

    fn qry_support(&self, model: &AlignmentModel) -> DomainResult<(f64, f64)> {
        let s_b = source_begin(model, self.qry_idx)?;
        Ok((s_b, s_b + model.interval_length(self.qry_idx)?))
    }

    fn warp(&self, model: &AlignmentModel, x: f64) -> DomainResult<f64> {
        let (t_b, t_e) = self.ref_support(model)?;
        if x.is_nan() || x < t_b || x > t_e {
            return Err(DomainError::OutOfRange(format!(
                "x={} is outside bounds [{}, {}] for this interval",
                x, t_b, t_e
            )));
        }
        let s_b = source_begin(model, self.qry_idx)?;
        let length = model.interval_length(self.qry_idx)?;
        Ok(s_b + length * (x - t_b) / (t_e - t_b))
    }
}

/// Composition `outer ∘ inner` of two kernels on the same query interval
#[derive(Debug)]
pub struct CompositeKernel {
    outer: Box<dyn IntervalKernel>,
    inner: Box<dyn IntervalKernel>,
}

impl CompositeKernel {
    pub fn new(outer: Box<dyn IntervalKernel>, inner: Box<dyn IntervalKernel>) -> DomainResult<Self> {
        if outer.qry_idx() != inner.qry_idx() {
            return Err(DomainError::InvalidKernel(format!(
                "Both kernels must refer to the same query interval, got {} and {}",
                outer.qry_idx(),
                inner.qry_idx()
            )));
        }
        Ok(Self { outer, inner })
    }

    pub fn outer(&self) -> &dyn IntervalKernel {
        self.outer.as_ref()
    }

    pub fn inner(&self) -> &dyn IntervalKernel {
        self.inner.as_ref()
    }
}

impl Parameterized for CompositeKernel {
    fn params(&self) -> Vec<&Parameter> {
        let mut params = self.outer.params();
        params.extend(self.inner.params());
        params
    }
}

impl IntervalKernel for CompositeKernel {
    fn qry_idx(&self) -> usize {
        self.outer.qry_idx()
    }

    fn ref_idxs(&self) -> Vec<usize> {
        self.inner.ref_idxs()
    }

    fn ref_support(&self, model: &AlignmentModel) -> DomainResult<(f64, f64)> {
        self.inner.ref_support(model)
    }

    fn qry_support(&self, model: &AlignmentModel) -> DomainResult<(f64, f64)> {
        self.outer.qry_support(model)
    }

    fn warp(&self, model: &AlignmentModel, x: f64) -> DomainResult<f64> {
        let y = self.inner.warp(model, x)?;
        self.outer.warp(model, y)
    }
}

/// Marks a kernel as matching against several reference intervals.
///
/// Evaluation is delegated to the wrapped kernel.
#[derive(Debug)]
pub struct MultiReferenceKernel {
    wrapped: Box<dyn IntervalKernel>,
    ref_indexes: Vec<usize>,
}

impl MultiReferenceKernel {
    pub fn new(wrapped: Box<dyn IntervalKernel>, ref_indexes: Vec<usize>) -> DomainResult<Self> {
        if ref_indexes.is_empty() {
            return Err(DomainError::InvalidKernel(
                "Need one or more reference indexes.".to_string(),
            ));
        }
        Ok(Self {
            wrapped,
            ref_indexes,
        })
    }

    pub fn wrapped_kernel(&self) -> &dyn IntervalKernel {
        self.wrapped.as_ref()
    }

    pub fn ref_indexes(&self) -> &[usize] {
        &self.ref_indexes
    }
}

impl Parameterized for MultiReferenceKernel {
    fn params(&self) -> Vec<&Parameter> {
        self.wrapped.params()
    }
}

impl IntervalKernel for MultiReferenceKernel {
    fn qry_idx(&self) -> usize {
        self.wrapped.qry_idx()
    }

    fn ref_idxs(&self) -> Vec<usize> {
        self.ref_indexes.clone()
    }

    fn ref_support(&self, model: &AlignmentModel) -> DomainResult<(f64, f64)> {
        self.wrapped.ref_support(model)
    }

    fn qry_support(&self, model: &AlignmentModel) -> DomainResult<(f64, f64)> {
        self.wrapped.qry_support(model)
    }

    fn warp(&self, model: &AlignmentModel, x: f64) -> DomainResult<f64> {
        self.wrapped.warp(model, x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Interval;
    use std::sync::Arc;

    fn create_model() -> AlignmentModel {
        let mut model = AlignmentModel::new(
            Arc::new(|x: f64| x),
            Arc::new(|x: f64| 2.0 * x),
            Parameter::new("ref_begin").with_value(0.0).with_bounds(0.0, 1.0).fixed(),
            Parameter::new("b").with_value(0.0).with_bounds(0.0, 1.0),
            Parameter::new("e").with_value(2.0).with_bounds(1.0, 3.0),
            None,
        )
        .unwrap();
        model.add_interval(Interval::constant(0.5, 0.5).unwrap(), None).unwrap();
        model.add_interval(Interval::constant(0.5, 1.5).unwrap(), None).unwrap();
        model
    }

    #[test]
    fn test_linear_warping_supports() {
        let model = create_model();
        let k = LinearWarpingKernel::new(1, None);
        assert_eq!(k.ref_idx(), 1);
        assert_eq!(k.ref_support(&model).unwrap(), (0.5, 1.0));
        assert_eq!(k.qry_support(&model).unwrap(), (0.5, 2.0));
        assert_eq!(k.delta_t(&model).unwrap(), 0.5);
        assert!(k.params().is_empty());
    }

    #[test]
    fn test_linear_warping_maps_endpoints() {
        let model = create_model();
        let k = LinearWarpingKernel::new(1, None);
        assert_eq!(k.warp(&model, 0.5).unwrap(), 0.5);
        assert_eq!(k.warp(&model, 0.75).unwrap(), 1.25);
        assert_eq!(k.warp(&model, 1.0).unwrap(), 2.0);
        assert_eq!(k.evaluate(&model, 0.75).unwrap(), 2.5);
    }

    #[test]
    fn test_linear_warping_rejects_outside_support() {
        let model = create_model();
        let k = LinearWarpingKernel::new(0, None);
        assert!(matches!(k.warp(&model, 0.75), Err(DomainError::OutOfRange(_))));
        assert!(LinearWarpingKernel::new(5, None).ref_support(&model).is_err());
    }

    #[test]
    fn test_cross_reference_kernel() {
        let model = create_model();
        // Query interval 0 against reference interval 1
        let k = LinearWarpingKernel::new(0, Some(1));
        assert_eq!(k.ref_support(&model).unwrap(), (0.5, 1.0));
        assert_eq!(k.qry_support(&model).unwrap(), (0.0, 0.5));
        assert_eq!(k.warp(&model, 0.75).unwrap(), 0.25);
    }

    #[test]
    fn test_composite_kernel() {
        let mut model = AlignmentModel::new(
            Arc::new(|x: f64| x),
            Arc::new(|x: f64| x),
            Parameter::new("ref_begin").with_value(0.0).with_bounds(0.0, 2.0),
            Parameter::new("b").with_value(0.0).with_bounds(0.0, 1.0),
            Parameter::new("e").with_value(1.0).with_bounds(0.0, 1.0),
            None,
        )
        .unwrap();
        model.add_interval(Interval::constant(2.0, 1.0).unwrap(), None).unwrap();

        let composite = CompositeKernel::new(
            Box::new(LinearWarpingKernel::new(0, None)),
            Box::new(LinearWarpingKernel::new(0, None)),
        )
        .unwrap();
        assert_eq!(composite.qry_idx(), 0);
        assert_eq!(composite.warp(&model, 2.0).unwrap(), 0.5);
        assert_eq!(composite.evaluate(&model, 1.0).unwrap(), 0.25);
    }

    #[test]
    fn test_composite_requires_same_interval() {
        let result = CompositeKernel::new(
            Box::new(LinearWarpingKernel::new(0, None)),
            Box::new(LinearWarpingKernel::new(1, None)),
        );
        assert!(matches!(result, Err(DomainError::InvalidKernel(_))));
    }

    #[test]
    fn test_multi_reference_kernel() {
        let model = create_model();
        assert!(MultiReferenceKernel::new(Box::new(LinearWarpingKernel::new(1, None)), vec![]).is_err());

        let k = MultiReferenceKernel::new(Box::new(LinearWarpingKernel::new(1, None)), vec![0, 1]).unwrap();
        assert_eq!(k.ref_indexes(), &[0, 1]);
        assert_eq!(k.ref_idxs(), vec![0, 1]);
        assert_eq!(k.qry_idx(), 1);
        assert_eq!(k.evaluate(&model, 0.75).unwrap(), 2.5);
        assert_eq!(k.wrapped_kernel().qry_idx(), 1);
    }
}
