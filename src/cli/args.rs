//! Command-line argument definitions

use clap::Args;
use std::path::PathBuf;

/// Arguments for the inspect command
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Problem file (.toml, .yaml or .yml)
    #[arg(short, long)]
    pub problem: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the evaluate command
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Problem file (.toml, .yaml or .yml)
    #[arg(short, long)]
    pub problem: PathBuf,

    /// Also sample the warping path at this many reference points
    #[arg(long, value_name = "POINTS")]
    pub warping_path: Option<usize>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the fit command
#[derive(Args, Debug)]
pub struct FitArgs {
    /// Problem file (.toml, .yaml or .yml)
    #[arg(short, long)]
    pub problem: PathBuf,

    /// Maximum number of accepted steps
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// Initial step length
    #[arg(long)]
    pub learning_rate: Option<f64>,

    /// Write the report as JSON to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}
