// Losses - Scalar terms comparing the reference with the warped query

use std::cell::RefCell;
use std::fmt;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::kernels::IntervalKernel;
use crate::domain::model::{AlignmentModel, Parameter, Parameterized};
use crate::signal::integrate::composite_simpson_3_8;
use crate::signal::{linspace, SampledSignal, Signal};

/// A term of the alignment objective
pub trait Loss: Parameterized + fmt::Debug + Send + Sync {
    /// Short name used in reports
    fn name(&self) -> &str;

    /// Weight parameter, if any
    fn weight_param(&self) -> Option<&Parameter>;

    /// Multiplier applied to the loss; 1 without a weight parameter
    fn weight(&self) -> f64 {
        self.weight_param().and_then(|p| p.value).unwrap_or(1.0)
    }

    /// Unweighted loss values
    fn evaluate(&self, model: &AlignmentModel) -> DomainResult<Vec<f64>>;
}

fn kernel_loss_params<'a>(
    weight: &'a Option<Parameter>,
    kernel: &'a dyn IntervalKernel,
) -> Vec<&'a Parameter> {
    let mut params: Vec<&Parameter> = weight.iter().collect();
    params.extend(kernel.params());
    params
}

/// Residual sum of squares between the reference and the warped query.
///
/// Both signals are sampled once over their full supports when the loss is
/// created; evaluation interpolates those samples.
pub struct RssLoss {
    kernel: Box<dyn IntervalKernel>,
    weight: Option<Parameter>,
    resolution: usize,
    f_ref: SampledSignal,
    f_qry: SampledSignal,
}

impl RssLoss {
    /// Points compared per evaluation
    pub const DEFAULT_RESOLUTION: usize = 1_000;
    /// Points used to sample each signal up front
    pub const CACHE_SIZE: usize = 10_000;

    pub fn new(
        kernel: Box<dyn IntervalKernel>,
        weight: Option<Parameter>,
        model: &AlignmentModel,
    ) -> DomainResult<Self> {
        let f_ref = SampledSignal::from_signal(model.f_ref().as_ref(), model.ref_supp(), Self::CACHE_SIZE)?;
        let f_qry = SampledSignal::from_signal(model.f_qry().as_ref(), model.qry_supp(), Self::CACHE_SIZE)?;
        Ok(Self {
            kernel,
            weight,
            resolution: Self::DEFAULT_RESOLUTION,
            f_ref,
            f_qry,
        })
    }

    /// Compare `resolution` points per evaluation (at least 2)
    pub fn with_resolution(mut self, resolution: usize) -> DomainResult<Self> {
        if resolution < 2 {
            return Err(DomainError::BadArgs(
                "RSS resolution must be at least 2".to_string(),
            ));
        }
        self.resolution = resolution;
        Ok(self)
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn kernel(&self) -> &dyn IntervalKernel {
        self.kernel.as_ref()
    }
}

impl Parameterized for RssLoss {
    fn params(&self) -> Vec<&Parameter> {
        kernel_loss_params(&self.weight, self.kernel.as_ref())
    }
}

impl Loss for RssLoss {
    fn name(&self) -> &str {
        "rss"
    }

    fn weight_param(&self) -> Option<&Parameter> {
        self.weight.as_ref()
    }

    fn evaluate(&self, model: &AlignmentModel) -> DomainResult<Vec<f64>> {
        let (t_b, t_e) = self.kernel.ref_support(model)?;
        let mut rss = 0.0;
        for x in linspace(t_b, t_e, self.resolution) {
            let t = self.kernel.warp(model, x)?;
            let residual = self.f_ref.value_at(x) - self.f_qry.value_at(t);
            rss += residual * residual;
        }
        Ok(vec![rss])
    }
}

impl fmt::Debug for RssLoss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RssLoss")
            .field("kernel", &self.kernel)
            .field("weight", &self.weight)
            .field("resolution", &self.resolution)
            .finish_non_exhaustive()
    }
}

/// Integral of the squared difference between the reference and the warped query
#[derive(Debug)]
pub struct IntegratedSquaredErrorLoss {
    kernel: Box<dyn IntervalKernel>,
    weight: Option<Parameter>,
    panels: usize,
}

impl IntegratedSquaredErrorLoss {
    pub const DEFAULT_PANELS: usize = 64;

    pub fn new(kernel: Box<dyn IntervalKernel>, weight: Option<Parameter>) -> Self {
        Self {
            kernel,
            weight,
            panels: Self::DEFAULT_PANELS,
        }
    }

    pub fn with_panels(mut self, panels: usize) -> Self {
        self.panels = panels.max(1);
        self
    }

    pub fn kernel(&self) -> &dyn IntervalKernel {
        self.kernel.as_ref()
    }
}

impl Parameterized for IntegratedSquaredErrorLoss {
    fn params(&self) -> Vec<&Parameter> {
        kernel_loss_params(&self.weight, self.kernel.as_ref())
    }
}

impl Loss for IntegratedSquaredErrorLoss {
    fn name(&self) -> &str {
        "ise"
    }

    fn weight_param(&self) -> Option<&Parameter> {
        self.weight.as_ref()
    }

    fn evaluate(&self, model: &AlignmentModel) -> DomainResult<Vec<f64>> {
        let (t_b, t_e) = self.kernel.ref_support(model)?;
        let failure: RefCell<Option<DomainError>> = RefCell::new(None);

        let integrand = |x: f64| match self.kernel.warp(model, x) {
            Ok(t) => {
                let d = model.f_ref().value_at(x) - model.f_qry().value_at(t);
                d * d
            }
            Err(e) => {
                failure.borrow_mut().get_or_insert(e);
                0.0
            }
        };
        let value = composite_simpson_3_8(integrand, t_b, t_e, self.panels);

        match failure.into_inner() {
            Some(e) => Err(e),
            None => Ok(vec![value]),
        }
    }
}
