// Alignment problem - A model together with its kernels, losses and regularizers

use serde::Serialize;
use std::fmt;

use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::kernels::{IntervalKernel, LinearWarpingKernel};
use crate::domain::losses::{Loss, RssLoss};
use crate::domain::model::{AlignmentModel, Parameter, Parameterized};
use crate::signal::linspace;

/// Handle of a loss or regularizer within one problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LossId(u64);

impl fmt::Display for LossId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Whether a term is a loss or a regularizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TermKind {
    Loss,
    Regularizer,
}

/// Evaluated term of the objective
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermValue {
    pub id: LossId,
    pub kind: TermKind,
    pub name: String,
    pub weight: f64,
    pub values: Vec<f64>,
    /// `weight * sum(values)`
    pub weighted: f64,
}

/// The objective to minimize over the model's trainable parameters
pub struct AlignmentProblem {
    model: AlignmentModel,
    kernels: Vec<Box<dyn IntervalKernel>>,
    losses: Vec<(LossId, Box<dyn Loss>)>,
    regularizers: Vec<(LossId, Box<dyn Loss>)>,
    next_id: u64,
}

impl AlignmentProblem {
    pub fn new(model: AlignmentModel) -> Self {
        Self {
            model,
            kernels: Vec::new(),
            losses: Vec::new(),
            regularizers: Vec::new(),
            next_id: 0,
        }
    }

    pub fn model(&self) -> &AlignmentModel {
        &self.model
    }

    /// Mutable access to the model while no kernel or term is registered.
    ///
    /// Kernels and losses address intervals by position and sample the signals
    /// over the model's supports when built, so later edits would retarget them.
    pub fn model_mut(&mut self) -> DomainResult<&mut AlignmentModel> {
        if !self.kernels.is_empty() || !self.losses.is_empty() || !self.regularizers.is_empty() {
            return Err(DomainError::IllegalState(
                "The model cannot be changed once kernels or losses refer to its intervals".to_string(),
            ));
        }
        Ok(&mut self.model)
    }

    /// Replace the model's trainable values in `trainable_params` order
    pub fn set_trainable_values(&mut self, values: &[f64]) -> DomainResult<()> {
        self.model.set_trainable_values(values)
    }

    pub fn kernels(&self) -> impl Iterator<Item = &dyn IntervalKernel> {
        self.kernels.iter().map(|k| k.as_ref())
    }

    /// Kernel registered for query interval `qry_idx`
    pub fn kernel_for(&self, qry_idx: usize) -> Option<&dyn IntervalKernel> {
        self.kernels().find(|k| k.qry_idx() == qry_idx)
    }

    fn check_interval_index(&self, idx: usize, side: &str) -> DomainResult<()> {
        if idx >= self.model.num_intervals() {
            return Err(DomainError::OutOfRange(format!(
                "{} interval index {} is out of bounds, the model has {} intervals",
                side,
                idx,
                self.model.num_intervals()
            )));
        }
        Ok(())
    }

    /// Register the kernel of one query interval.
    ///
    /// Only one kernel may operate on a query interval; combine several with
    /// [`crate::domain::kernels::CompositeKernel`] or
    /// [`crate::domain::kernels::MultiReferenceKernel`].
    pub fn add_interval_pair_kernel(&mut self, kernel: Box<dyn IntervalKernel>) -> DomainResult<&mut Self> {
        self.check_interval_index(kernel.qry_idx(), "Query")?;
        for ref_idx in kernel.ref_idxs() {
            self.check_interval_index(ref_idx, "Reference")?;
        }
        if self.kernel_for(kernel.qry_idx()).is_some() {
            return Err(DomainError::InvalidKernel(format!(
                "Another kernel for query interval {} was added previously.",
                kernel.qry_idx()
            )));
        }

        debug!(qry_idx = kernel.qry_idx(), "Registered interval kernel");
        self.kernels.push(kernel);
        Ok(self)
    }

    /// Add an RSS loss comparing reference interval `ref_idx` with query interval `qry_idx`
    /// through a linear warping kernel.
    pub fn add_interval_pair_loss(
        &mut self,
        ref_idx: usize,
        qry_idx: usize,
        weight: Option<Parameter>,
    ) -> DomainResult<LossId> {
        self.check_interval_index(ref_idx, "Reference")?;
        self.check_interval_index(qry_idx, "Query")?;

        let kernel = LinearWarpingKernel::new(qry_idx, Some(ref_idx));
        let loss = RssLoss::new(Box::new(kernel), weight, &self.model)?;
        Ok(self.add_loss(Box::new(loss)))
    }

    fn allocate_id(&mut self) -> LossId {
        let id = LossId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn add_loss(&mut self, loss: Box<dyn Loss>) -> LossId {
        let id = self.allocate_id();
        debug!(%id, name = loss.name(), "Added loss");
        self.losses.push((id, loss));
        id
    }

    pub fn remove_loss(&mut self, id: LossId) -> DomainResult<Box<dyn Loss>> {
        Self::remove_term(&mut self.losses, id, "loss")
    }

    pub fn add_regularizer(&mut self, regularizer: Box<dyn Loss>) -> LossId {
        let id = self.allocate_id();
        debug!(%id, name = regularizer.name(), "Added regularizer");
        self.regularizers.push((id, regularizer));
        id
    }

    pub fn remove_regularizer(&mut self, id: LossId) -> DomainResult<Box<dyn Loss>> {
        Self::remove_term(&mut self.regularizers, id, "regularizer")
    }

    fn remove_term(
        terms: &mut Vec<(LossId, Box<dyn Loss>)>,
        id: LossId,
        what: &str,
    ) -> DomainResult<Box<dyn Loss>> {
        let pos = terms
            .iter()
            .position(|(term_id, _)| *term_id == id)
            .ok_or_else(|| DomainError::NotFound(format!("No {} with id {}", what, id)))?;
        Ok(terms.remove(pos).1)
    }

    pub fn losses(&self) -> Vec<(LossId, &dyn Loss)> {
        self.losses.iter().map(|(id, l)| (*id, l.as_ref())).collect()
    }

    pub fn regularizers(&self) -> Vec<(LossId, &dyn Loss)> {
        self.regularizers
            .iter()
            .map(|(id, l)| (*id, l.as_ref()))
            .collect()
    }

    /// Evaluate every loss and regularizer against the current model
    pub fn evaluate(&self) -> DomainResult<Vec<TermValue>> {
        let terms = self
            .losses
            .iter()
            .map(|(id, l)| (*id, TermKind::Loss, l))
            .chain(
                self.regularizers
                    .iter()
                    .map(|(id, l)| (*id, TermKind::Regularizer, l)),
            );

        let mut evaluated = Vec::with_capacity(self.losses.len() + self.regularizers.len());
        for (id, kind, term) in terms {
            let values = term.evaluate(&self.model)?;
            let weight = term.weight();
            let weighted = weight * values.iter().sum::<f64>();
            evaluated.push(TermValue {
                id,
                kind,
                name: term.name().to_string(),
                weight,
                values,
                weighted,
            });
        }
        Ok(evaluated)
    }

    /// Sum of all weighted terms
    pub fn objective(&self) -> DomainResult<f64> {
        Ok(self.evaluate()?.iter().map(|t| t.weighted).sum())
    }

    /// Query time matched to reference time `x`.
    ///
    /// Uses the first registered kernel whose reference support contains `x`,
    /// or a linear warp of the interval containing `x` onto itself.
    pub fn warp(&self, x: f64) -> DomainResult<f64> {
        let idx = self.model.interval_index_for(x)?;
        let covering = self.kernels().find(|k| {
            matches!(k.ref_support(&self.model), Ok((t_b, t_e)) if x >= t_b && x <= t_e)
        });
        match covering {
            Some(kernel) => kernel.warp(&self.model, x),
            None => LinearWarpingKernel::new(idx, None).warp(&self.model, x),
        }
    }

    /// `(reference time, query time)` pairs at `n` points across the reference intervals
    pub fn warping_path(&self, n: usize) -> DomainResult<Vec<(f64, f64)>> {
        let t = self.model.reference_boundaries();
        if t.len() < 2 {
            return Err(DomainError::IllegalState(
                "The model has no intervals".to_string(),
            ));
        }
        linspace(t[0], t[t.len() - 1], n)
            .into_iter()
            .map(|x| Ok((x, self.warp(x)?)))
            .collect()
    }
}

impl Parameterized for AlignmentProblem {
    fn params(&self) -> Vec<&Parameter> {
        let mut params = self.model.params();
        params.extend(self.kernels.iter().flat_map(|k| k.params()));
        params.extend(self.losses.iter().flat_map(|(_, l)| l.params()));
        params.extend(self.regularizers.iter().flat_map(|(_, r)| r.params()));
        params
    }
}

impl fmt::Debug for AlignmentProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlignmentProblem")
            .field("model", &self.model)
            .field("kernels", &self.kernels)
            .field("losses", &self.losses)
            .field("regularizers", &self.regularizers)
            .finish()
    }
}
