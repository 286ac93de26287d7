//! Command implementations

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::cli::args::{EvaluateArgs, FitArgs, InspectArgs};
use crate::config::{ProblemConfig, SettingsOverrides};
use crate::domain::losses::Loss;
use crate::domain::model::{AlignmentModel, IntervalType, Parameter, Parameterized};
use crate::domain::problem::{AlignmentProblem, LossId, TermValue};
use crate::domain::rules::{ConstraintChecker, ConstraintViolation};
use crate::optimizer::{OptimizationReport, ProjectedGradientDescent};
use crate::utils::Utils;
use crate::utils::logging::LoggingSystem;

/// One interval as shown by `inspect`
#[derive(Debug, Serialize)]
pub struct IntervalSummary {
    pub index: usize,
    pub interval_type: IntervalType,
    pub reference: (f64, f64),
    pub query: Option<(f64, f64)>,
}

/// Model overview printed by `inspect`
#[derive(Debug, Serialize)]
pub struct ModelSummary {
    pub reference_support: (f64, f64),
    pub query_support: (f64, f64),
    pub gamma_d: Option<f64>,
    pub beta_l: Option<f64>,
    pub beta_u: Option<f64>,
    pub available_length: Option<f64>,
    pub intervals: Vec<IntervalSummary>,
    pub parameters: Vec<Parameter>,
    pub losses: Vec<String>,
    pub regularizers: Vec<String>,
    pub violations: Vec<ConstraintViolation>,
}

impl ModelSummary {
    fn new(problem: &AlignmentProblem) -> Self {
        let model = problem.model();
        let boundaries = model.reference_boundaries();
        let intervals = model
            .intervals(None)
            .iter()
            .enumerate()
            .map(|(index, interval)| IntervalSummary {
                index,
                interval_type: interval.interval_type(),
                reference: (boundaries[index], boundaries[index + 1]),
                query: query_span(model, index),
            })
            .collect();

        Self {
            reference_support: model.ref_supp(),
            query_support: model.qry_supp(),
            gamma_d: model.gamma_d(),
            beta_l: model.beta_l().ok(),
            beta_u: model.beta_u().ok(),
            available_length: model.available_length().ok(),
            intervals,
            parameters: problem.params().into_iter().cloned().collect(),
            losses: describe_terms(problem.losses()),
            regularizers: describe_terms(problem.regularizers()),
            violations: ConstraintChecker::check(model),
        }
    }
}

fn describe_terms(terms: Vec<(LossId, &dyn Loss)>) -> Vec<String> {
    terms
        .into_iter()
        .map(|(id, term)| format!("{} {} (weight {})", id, term.name(), term.weight()))
        .collect()
}

fn query_span(model: &AlignmentModel, idx: usize) -> Option<(f64, f64)> {
    let begin = model.beta_l().ok()? + model.interval_offset(idx).ok()?;
    Some((begin, begin + model.interval_length(idx).ok()?))
}

/// Loss values printed by `evaluate`
#[derive(Debug, Serialize)]
pub struct EvaluationSummary {
    pub terms: Vec<TermValue>,
    pub objective: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warping_path: Option<Vec<(f64, f64)>>,
}

/// Load a problem file, resolve settings and start logging
fn load_problem(path: &Path, cli_overrides: SettingsOverrides) -> Result<ProblemConfig> {
    if !path.exists() {
        return Err(anyhow::anyhow!("Problem file does not exist: {}", path.display()));
    }

    let mut config = ProblemConfig::load(path)
        .with_context(|| format!("Failed to load problem file {}", path.display()))?;
    let env_overrides = SettingsOverrides::from_env().context("Invalid environment override")?;
    env_overrides.overridden_by(cli_overrides).apply(&mut config);

    LoggingSystem::new(config.logging.clone()).initialize();
    info!("Problem file: {}", path.display());
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output to JSON")?;
    println!("{}", json);
    Ok(())
}

/// Execute the inspect command
pub fn inspect(args: InspectArgs, overrides: SettingsOverrides) -> Result<()> {
    let config = load_problem(&args.problem, overrides)?;
    let problem = config.build_problem().context("Failed to build the alignment problem")?;

    let summary = ModelSummary::new(&problem);
    if args.json {
        print_json(&summary)?;
    } else {
        display_model_summary(&summary);
    }

    info!("Inspect operation completed successfully");
    Ok(())
}

/// Execute the evaluate command
pub fn evaluate(args: EvaluateArgs, overrides: SettingsOverrides) -> Result<()> {
    let config = load_problem(&args.problem, overrides)?;
    let problem = config.build_problem().context("Failed to build the alignment problem")?;

    let terms = problem.evaluate().context("Failed to evaluate the loss terms")?;
    let objective = terms.iter().map(|t| t.weighted).sum();
    let warping_path = args
        .warping_path
        .map(|n| problem.warping_path(n))
        .transpose()
        .context("Failed to sample the warping path")?;

    let summary = EvaluationSummary {
        terms,
        objective,
        warping_path,
    };
    if args.json {
        print_json(&summary)?;
    } else {
        display_evaluation(&summary);
    }

    info!("Evaluate operation completed successfully");
    Ok(())
}

/// Execute the fit command
pub fn fit(args: FitArgs, overrides: SettingsOverrides) -> Result<()> {
    let config = load_problem(&args.problem, overrides)?;
    let mut problem = config.build_problem().context("Failed to build the alignment problem")?;

    let optimizer = ProjectedGradientDescent::new(config.optimizer.clone());
    let report = optimizer
        .minimize(&mut problem)
        .context("Failed to fit the alignment parameters")?;
    if !report.converged {
        warn!(
            "Stopped after {} iterations without converging",
            report.iterations
        );
    }

    if let Some(output) = &args.output {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize the report")?;
        fs::write(output, json)
            .with_context(|| format!("Failed to write report to {}", output.display()))?;
        info!("Report written to {}", output.display());
    }

    if args.json {
        print_json(&report)?;
    } else {
        display_report(&report);
    }

    info!("Fit operation completed successfully");
    Ok(())
}

fn format_span(span: Option<(f64, f64)>) -> String {
    match span {
        Some((a, b)) => format!("[{:.6}, {:.6}]", a, b),
        None => "undefined".to_string(),
    }
}

fn format_value(value: Option<f64>) -> String {
    value.map_or_else(|| "unset".to_string(), |v| format!("{:.6}", v))
}

/// Display the model summary in human-readable format
fn display_model_summary(summary: &ModelSummary) {
    println!("Alignment Model");
    println!("===============");
    println!("Reference Support: {}", format_span(Some(summary.reference_support)));
    println!("Query Support: {}", format_span(Some(summary.query_support)));
    if let Some(gamma_d) = summary.gamma_d {
        println!("Minimum Query Span: {:.6}", gamma_d);
    }
    println!("Query Span: {}", format_span(summary.beta_l.zip(summary.beta_u)));
    println!("Available Length: {}", format_value(summary.available_length));
    println!();

    println!("Intervals:");
    for interval in &summary.intervals {
        println!(
            "  {} {}: reference {} -> query {}",
            interval.index,
            interval.interval_type,
            format_span(Some(interval.reference)),
            format_span(interval.query)
        );
    }
    println!();

    println!("Parameters:");
    for param in &summary.parameters {
        println!("  {}", param);
    }
    println!();

    println!("Losses:");
    for loss in &summary.losses {
        println!("  {}", loss);
    }
    if !summary.regularizers.is_empty() {
        println!("Regularizers:");
        for regularizer in &summary.regularizers {
            println!("  {}", regularizer);
        }
    }
    println!();

    if summary.violations.is_empty() {
        println!("Constraints: ✓ satisfied");
    } else {
        println!("Constraints: ✗ violated");
        for violation in &summary.violations {
            println!("  {}", violation);
        }
    }
}

/// Display loss values in human-readable format
fn display_evaluation(summary: &EvaluationSummary) {
    println!("Loss Terms");
    println!("==========");
    for term in &summary.terms {
        println!(
            "  {} {:?} {}: {:.9} x {} = {:.9}",
            term.id, term.kind, term.name, term.values.iter().sum::<f64>(), term.weight, term.weighted
        );
    }
    println!("Objective: {:.9}", summary.objective);

    if let Some(path) = &summary.warping_path {
        println!();
        println!("Warping Path:");
        for (x, t) in path {
            println!("  {:.6} -> {:.6}", x, t);
        }
    }
}

/// Display the optimization report in human-readable format
fn display_report(report: &OptimizationReport) {
    println!("Optimization Report");
    println!("===================");
    println!("Iterations: {}", report.iterations);
    println!("Converged: {}", if report.converged { "✓" } else { "✗" });
    println!("Initial Objective: {:.9}", report.initial_objective);
    println!("Final Objective: {:.9}", report.final_objective);
    println!(
        "Elapsed: {}",
        Utils::format_duration(std::time::Duration::from_millis(report.elapsed_ms as u64))
    );
    println!("Finished At: {}", report.finished_at.to_rfc3339());
    println!();

    println!("Parameters:");
    for (name, value) in &report.parameters {
        println!("  {}: {}", name, format_value(*value));
    }
}
