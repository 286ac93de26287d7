//! Problem files and settings precedence
//!
//! A problem file describes the two signals, the query parameters, the
//! intervals and the loss terms of one alignment. It may also carry optimizer
//! and logging settings. Settings are resolved with the precedence
//! CLI > environment > file > defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::domain::kernels::LinearWarpingKernel;
use crate::domain::losses::{IntegratedSquaredErrorLoss, Loss, RssLoss};
use crate::domain::model::{AlignmentModel, Interval, IntervalType, Parameter};
use crate::domain::problem::AlignmentProblem;
use crate::error::{IatwError, IatwResult};
use crate::optimizer::OptimizerConfig;
use crate::signal::{SampledSignal, SharedSignal};
use crate::utils::logging::{LogFormat, LogLevel, LoggingConfig};

/// Environment variables that override file settings
pub const ENV_LOG_LEVEL: &str = "IATW_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "IATW_LOG_FORMAT";
pub const ENV_MAX_ITERATIONS: &str = "IATW_MAX_ITERATIONS";
pub const ENV_LEARNING_RATE: &str = "IATW_LEARNING_RATE";

/// Where a signal's values come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalSpec {
    /// Inline samples, linearly interpolated
    Samples { x: Vec<f64>, y: Vec<f64> },
    /// Two-column sample file, relative to the problem file
    File { path: PathBuf },
    /// `amplitude * sin(frequency * x + phase) + offset`
    Sine {
        #[serde(default = "one")]
        amplitude: f64,
        #[serde(default = "one")]
        frequency: f64,
        #[serde(default)]
        phase: f64,
        #[serde(default)]
        offset: f64,
    },
    /// Polynomial with coefficients in ascending order
    Polynomial { coefficients: Vec<f64> },
}

fn one() -> f64 {
    1.0
}

fn yes() -> bool {
    true
}

impl SignalSpec {
    /// Build the signal, resolving file paths against `base_dir`
    pub fn build(&self, base_dir: &Path) -> IatwResult<SharedSignal> {
        let signal: SharedSignal = match self {
            SignalSpec::Samples { x, y } => Arc::new(SampledSignal::from_samples(x.clone(), y.clone())?),
            SignalSpec::File { path } => {
                let path = if path.is_absolute() {
                    path.clone()
                } else {
                    base_dir.join(path)
                };
                debug!("Reading samples from {}", path.display());
                let content = fs::read_to_string(&path)?;
                Arc::new(SampledSignal::parse(&content)?)
            }
            SignalSpec::Sine {
                amplitude,
                frequency,
                phase,
                offset,
            } => {
                let (a, w, p, o) = (*amplitude, *frequency, *phase, *offset);
                Arc::new(move |x: f64| a * (w * x + p).sin() + o)
            }
            SignalSpec::Polynomial { coefficients } => {
                if coefficients.is_empty() {
                    return Err(IatwError::ConfigError {
                        message: "A polynomial signal needs at least one coefficient".to_string(),
                    });
                }
                let coefficients = coefficients.clone();
                Arc::new(move |x: f64| coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c))
            }
        };
        Ok(signal)
    }
}

/// A parameter as written in a problem file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub value: f64,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    #[serde(default = "yes")]
    pub trainable: bool,
}

impl ParameterSpec {
    fn to_parameter(&self, name: &str) -> Parameter {
        Parameter {
            name: name.to_string(),
            value: Some(self.value),
            lower_bound: self.lower,
            upper_bound: self.upper,
            is_trainable: self.trainable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceConfig {
    pub signal: SignalSpec,
    /// Reference span `[begin, end]` the intervals partition
    pub support: (f64, f64),
    /// Where the first interval starts; defaults to the support start
    pub begin: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    pub signal: SignalSpec,
    pub begin: ParameterSpec,
    pub end: ParameterSpec,
    /// Minimum query span; allows begin and end to cross
    pub gamma_d: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalSpec {
    #[serde(rename = "type")]
    pub interval_type: IntervalType,
    pub ref_length: f64,
    /// Query length of constant and min/max intervals
    pub length: Option<f64>,
    /// Weight of relative intervals
    pub rel_length: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl IntervalSpec {
    fn to_interval(&self, idx: usize) -> IatwResult<Interval> {
        let require_length = || {
            self.length.ok_or_else(|| IatwError::ConfigError {
                message: format!("Interval {} ({}) needs a length", idx, self.interval_type),
            })
        };
        let interval = match self.interval_type {
            IntervalType::Constant => Interval::constant(self.ref_length, require_length()?)?,
            IntervalType::MinMax => {
                let min_max = match (self.min, self.max) {
                    (Some(min), Some(max)) => Some((min, max)),
                    (None, None) => None,
                    _ => {
                        return Err(IatwError::ConfigError {
                            message: format!("Interval {} needs both min and max, or neither", idx),
                        })
                    }
                };
                Interval::min_max(self.ref_length, require_length()?, min_max)?
            }
            IntervalType::Relative => Interval::relative(self.ref_length, self.rel_length)?,
            IntervalType::Flexible => Interval::flexible(self.ref_length)?,
        };
        Ok(interval)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LossKind {
    #[default]
    Rss,
    Ise,
}

/// A loss or regularizer term over one interval pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossSpec {
    #[serde(rename = "type", default)]
    pub kind: LossKind,
    pub qry_idx: usize,
    /// Reference interval; defaults to `qry_idx`
    pub ref_idx: Option<usize>,
    pub weight: Option<f64>,
    /// RSS points per evaluation
    pub resolution: Option<usize>,
    /// Simpson panels for the integrated loss
    pub panels: Option<usize>,
}

impl LossSpec {
    fn build(&self, problem: &mut AlignmentProblem) -> IatwResult<Box<dyn Loss>> {
        let ref_idx = self.ref_idx.unwrap_or(self.qry_idx);
        let num_intervals = problem.model().num_intervals();
        if self.qry_idx >= num_intervals || ref_idx >= num_intervals {
            return Err(IatwError::ConfigError {
                message: format!(
                    "Loss refers to interval pair ({}, {}) but the model has {} intervals",
                    ref_idx, self.qry_idx, num_intervals
                ),
            });
        }

        let kernel = LinearWarpingKernel::new(self.qry_idx, Some(ref_idx));
        if problem.kernel_for(self.qry_idx).is_none() {
            problem.add_interval_pair_kernel(Box::new(kernel.clone()))?;
        }

        let weight = self
            .weight
            .map(|w| Parameter::new("weight").with_value(w).fixed());
        let loss: Box<dyn Loss> = match self.kind {
            LossKind::Rss => {
                let mut loss = RssLoss::new(Box::new(kernel), weight, problem.model())?;
                if let Some(resolution) = self.resolution {
                    loss = loss.with_resolution(resolution)?;
                }
                Box::new(loss)
            }
            LossKind::Ise => {
                let mut loss = IntegratedSquaredErrorLoss::new(Box::new(kernel), weight);
                if let Some(panels) = self.panels {
                    loss = loss.with_panels(panels);
                }
                Box::new(loss)
            }
        };
        Ok(loss)
    }
}

/// Contents of a problem file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemConfig {
    pub reference: ReferenceConfig,
    pub query: QueryConfig,
    pub intervals: Vec<IntervalSpec>,
    #[serde(default)]
    pub losses: Vec<LossSpec>,
    #[serde(default)]
    pub regularizers: Vec<LossSpec>,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Directory relative sample paths are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl ProblemConfig {
    /// Load a problem file, picking the format from its extension
    pub fn load(path: &Path) -> IatwResult<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        let content = fs::read_to_string(path)?;
        let mut config = match extension.as_deref() {
            Some("toml") => Self::from_toml_str(&content)?,
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content)?,
            _ => {
                return Err(IatwError::UnsupportedFormat {
                    path: path.display().to_string(),
                })
            }
        };
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> IatwResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_yaml_str(content: &str) -> IatwResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Build the model described by this file
    pub fn build_model(&self) -> IatwResult<AlignmentModel> {
        let (lo, hi) = self.reference.support;
        let ref_begin = Parameter::new("ref_begin")
            .with_value(self.reference.begin.unwrap_or(lo))
            .with_bounds(lo, hi)
            .fixed();

        let mut model = AlignmentModel::new(
            self.reference.signal.build(&self.base_dir)?,
            self.query.signal.build(&self.base_dir)?,
            ref_begin,
            self.query.begin.to_parameter("begin"),
            self.query.end.to_parameter("end"),
            self.query.gamma_d,
        )?;

        for (idx, spec) in self.intervals.iter().enumerate() {
            model.add_interval(spec.to_interval(idx)?, None)?;
        }
        Ok(model)
    }

    /// Build the full problem: model, kernels, losses and regularizers
    pub fn build_problem(&self) -> IatwResult<AlignmentProblem> {
        let mut problem = AlignmentProblem::new(self.build_model()?);
        for spec in &self.losses {
            let loss = spec.build(&mut problem)?;
            problem.add_loss(loss);
        }
        for spec in &self.regularizers {
            let regularizer = spec.build(&mut problem)?;
            problem.add_regularizer(regularizer);
        }
        if problem.losses().is_empty() {
            return Err(IatwError::ConfigError {
                message: "The problem defines no losses".to_string(),
            });
        }

        debug!(
            intervals = problem.model().num_intervals(),
            losses = problem.losses().len(),
            regularizers = problem.regularizers().len(),
            "Problem built"
        );
        Ok(problem)
    }
}

/// Settings that may be overridden outside the problem file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsOverrides {
    pub log_level: Option<LogLevel>,
    pub log_format: Option<LogFormat>,
    pub max_iterations: Option<usize>,
    pub learning_rate: Option<f64>,
}

impl SettingsOverrides {
    /// Read the `IATW_*` environment variables
    pub fn from_env() -> IatwResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`, which maps a variable name to its value
    pub fn from_lookup<F>(lookup: F) -> IatwResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse_number = |key: &str| -> IatwResult<Option<f64>> {
            lookup(key)
                .map(|v| {
                    v.trim().parse::<f64>().map_err(|_| IatwError::ConfigError {
                        message: format!("{} must be a number, got '{}'", key, v),
                    })
                })
                .transpose()
        };

        let max_iterations = lookup(ENV_MAX_ITERATIONS)
            .map(|v| {
                v.trim().parse::<usize>().map_err(|_| IatwError::ConfigError {
                    message: format!("{} must be a non-negative integer, got '{}'", ENV_MAX_ITERATIONS, v),
                })
            })
            .transpose()?;

        Ok(Self {
            log_level: lookup(ENV_LOG_LEVEL).map(|v| v.parse()).transpose()?,
            log_format: lookup(ENV_LOG_FORMAT).map(|v| v.parse()).transpose()?,
            max_iterations,
            learning_rate: parse_number(ENV_LEARNING_RATE)?,
        })
    }

    /// Combine with `higher`, whose values win
    pub fn overridden_by(self, higher: SettingsOverrides) -> Self {
        Self {
            log_level: higher.log_level.or(self.log_level),
            log_format: higher.log_format.or(self.log_format),
            max_iterations: higher.max_iterations.or(self.max_iterations),
            learning_rate: higher.learning_rate.or(self.learning_rate),
        }
    }

    /// Write the overrides into the file settings
    pub fn apply(&self, config: &mut ProblemConfig) {
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
        if let Some(max_iterations) = self.max_iterations {
            config.optimizer.max_iterations = max_iterations;
        }
        if let Some(learning_rate) = self.learning_rate {
            config.optimizer.learning_rate = learning_rate;
        }
    }
}
