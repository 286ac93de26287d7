//! Signals, sampling grids and interpolation

use std::fmt;
use std::sync::Arc;

use crate::domain::errors::{DomainError, DomainResult};

pub mod integrate;

/// A real-valued function of time
pub trait Signal: Send + Sync {
    /// Value of the signal at `x`
    fn value_at(&self, x: f64) -> f64;
}

impl<F> Signal for F
where
    F: Fn(f64) -> f64 + Send + Sync,
{
    fn value_at(&self, x: f64) -> f64 {
        self(x)
    }
}

/// Shared handle to a signal
pub type SharedSignal = Arc<dyn Signal>;

/// `n` evenly spaced points from `a` to `b`, both included
pub fn linspace(a: f64, b: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![a],
        _ => {
            let step = (b - a) / (n - 1) as f64;
            let mut xs: Vec<f64> = (0..n).map(|k| a + k as f64 * step).collect();
            // Avoid drift on the last point
            xs[n - 1] = b;
            xs
        }
    }
}

/// A signal known only at sample points, linearly interpolated in between.
///
/// Outside the sampled range the first or last sample value is returned.
#[derive(Clone, PartialEq)]
pub struct SampledSignal {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl SampledSignal {
    /// Create from sample coordinates and values
    pub fn from_samples(xs: Vec<f64>, ys: Vec<f64>) -> DomainResult<Self> {
        if xs.len() != ys.len() {
            return Err(DomainError::InvalidSignal(format!(
                "Sample coordinates ({}) and values ({}) differ in length",
                xs.len(),
                ys.len()
            )));
        }
        if xs.len() < 2 {
            return Err(DomainError::InvalidSignal(
                "At least two samples are required".to_string(),
            ));
        }
        if xs.iter().chain(ys.iter()).any(|v| !v.is_finite()) {
            return Err(DomainError::InvalidSignal(
                "Samples must be finite".to_string(),
            ));
        }
        if xs.windows(2).any(|w| w[1] <= w[0]) {
            return Err(DomainError::InvalidSignal(
                "Sample coordinates must be strictly increasing".to_string(),
            ));
        }

        Ok(Self { xs, ys })
    }

    /// Sample `signal` at `n` evenly spaced points over `support`
    pub fn from_signal(signal: &dyn Signal, support: (f64, f64), n: usize) -> DomainResult<Self> {
        let (a, b) = support;
        if a.is_nan() || b.is_nan() || a >= b {
            return Err(DomainError::InvalidSupport(format!(
                "Cannot sample over ({}, {})",
                a, b
            )));
        }
        let xs = linspace(a, b, n);
        let ys = xs.iter().map(|&x| signal.value_at(x)).collect();
        Self::from_samples(xs, ys)
    }

    /// Parse two-column text: one `x,y` pair per line.
    ///
    /// Commas, semicolons and whitespace all separate columns. Blank lines and
    /// lines starting with `#` are skipped, and so is a non-numeric first line.
    pub fn parse(content: &str) -> DomainResult<Self> {
        let mut xs = Vec::new();
        let mut ys = Vec::new();

        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let columns: Vec<&str> = line
                .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .collect();
            if columns.len() != 2 {
                return Err(DomainError::InvalidSignal(format!(
                    "Line {}: expected two columns, found {}",
                    line_no + 1,
                    columns.len()
                )));
            }

            match (columns[0].parse::<f64>(), columns[1].parse::<f64>()) {
                (Ok(x), Ok(y)) => {
                    xs.push(x);
                    ys.push(y);
                }
                _ if xs.is_empty() => continue, // header
                _ => {
                    return Err(DomainError::InvalidSignal(format!(
                        "Line {}: cannot parse '{}' as numbers",
                        line_no + 1,
                        line
                    )))
                }
            }
        }

        Self::from_samples(xs, ys)
    }

    /// Sample coordinates
    pub fn xs(&self) -> &[f64] {
        &self.xs
    }

    /// Sample values
    pub fn ys(&self) -> &[f64] {
        &self.ys
    }

    /// Range covered by the samples
    pub fn support(&self) -> (f64, f64) {
        (self.xs[0], self.xs[self.xs.len() - 1])
    }

    fn interpolate(&self, x: f64) -> f64 {
        let last = self.xs.len() - 1;
        if x.is_nan() {
            return f64::NAN;
        }
        if x <= self.xs[0] {
            return self.ys[0];
        }
        if x >= self.xs[last] {
            return self.ys[last];
        }

        // First index whose coordinate is greater than x
        let hi = self.xs.partition_point(|&v| v <= x);
        let lo = hi - 1;
        let (x0, x1) = (self.xs[lo], self.xs[hi]);
        let (y0, y1) = (self.ys[lo], self.ys[hi]);
        y0 + (y1 - y0) * (x - x0) / (x1 - x0)
    }
}

impl Signal for SampledSignal {
    fn value_at(&self, x: f64) -> f64 {
        self.interpolate(x)
    }
}

impl fmt::Debug for SampledSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (a, b) = self.support();
        f.debug_struct("SampledSignal")
            .field("samples", &self.xs.len())
            .field("support", &(a, b))
            .finish()
    }
}
