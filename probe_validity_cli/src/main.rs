use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{ArgAction, Parser, Subcommand, ValueHint};
use probe_validity::{
    polyline_length, Curve, CurveComparer, Point, Profile, ProfileConfig, ValidationDiagnostics,
    Verdict,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Probe curve validation CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a probe curve against a mannequin profile
    Validate(ValidateArgs),
    /// Report a mannequin profile's parameters and reference curve stats
    Inspect(InspectArgs),
}

#[derive(Parser, Debug)]
struct ValidateArgs {
    /// Mannequin profile JSON file
    #[arg(value_hint = ValueHint::FilePath)]
    profile: PathBuf,

    /// Probe curve JSON file (array of {x, y, z} points)
    #[arg(value_hint = ValueHint::FilePath)]
    probe: PathBuf,

    /// Override the profile's validity radius for this run
    #[arg(long)]
    radius: Option<f64>,

    /// Optional JSON report path
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Mannequin profile JSON file
    #[arg(value_hint = ValueHint::FilePath)]
    profile: PathBuf,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

/// On-disk profile document: the scalar parameters next to the reference
/// curve itself.
#[derive(Debug, Serialize, Deserialize)]
struct ProfileDocument {
    #[serde(flatten)]
    config: ProfileConfig,
    reference_curve: Curve,
}

#[derive(Serialize)]
struct ValidationReport<'a> {
    generated_at: DateTime<Utc>,
    profile_id: &'a str,
    verdict: Verdict,
    diagnostics: &'a ValidationDiagnostics,
    probe_curve: &'a [Point],
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = match &cli.command {
        Command::Validate(args) => {
            if args.verbose {
                "debug"
            } else {
                "info"
            }
        }
        Command::Inspect(args) => {
            if args.verbose {
                "debug"
            } else {
                "info"
            }
        }
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::Validate(args) => handle_validate(args),
        Command::Inspect(args) => handle_inspect(args),
    }
}

fn handle_validate(args: ValidateArgs) -> Result<()> {
    let profile = load_profile(&args.profile)?;
    let profile_id = profile.id().to_string();
    let probe = load_probe(&args.probe)?;
    info!(profile = %profile_id, points = probe.len(), "probe curve loaded");

    let mut comparer = CurveComparer::new();
    comparer.register_profile(profile);
    if let Some(radius) = args.radius {
        comparer.set_radius(&profile_id, radius);
        info!(radius, "validity radius overridden");
    }

    let verdict = comparer.classify(&profile_id, probe);
    if let Some(diag) = comparer.last_diagnostics() {
        info!(
            valid = diag.valid_points,
            invalid = diag.invalid_points,
            ignored = diag.ignored_points,
            "point classification summary"
        );
        if let Some(stats) = diag.intervals {
            info!(
                min = stats.min,
                max = stats.max,
                mean = stats.mean,
                median = stats.median,
                "consecutive point intervals"
            );
        }
        if let (Some(reference), Some(probe_len)) = (diag.reference_length, diag.probe_valid_length)
        {
            info!(
                reference_length = reference,
                probe_valid_length = probe_len,
                "segment lengths"
            );
        }
    }

    if let Some(path) = args.output {
        let diagnostics = comparer.last_diagnostics().cloned().unwrap_or_default();
        let curve = comparer.probe_curve().cloned().unwrap_or_default();
        let report = ValidationReport {
            generated_at: Utc::now(),
            profile_id: &profile_id,
            verdict,
            diagnostics: &diagnostics,
            probe_curve: &curve,
        };
        let json =
            serde_json::to_string_pretty(&report).context("failed to encode validation report")?;
        fs::write(&path, json)
            .with_context(|| format!("failed to write report: {}", path.display()))?;
        info!(path = %path.display(), "report written");
    }

    println!("{verdict:?}");
    Ok(())
}

fn handle_inspect(args: InspectArgs) -> Result<()> {
    let profile = load_profile(&args.profile)?;
    let curve = profile.reference_curve();
    println!("id:                  {}", profile.id());
    println!("points:              {}", curve.len());
    if let (Some(first), Some(last)) = (curve.first(), curve.last()) {
        println!("axis range:          {} .. {}", first.y, last.y);
    }
    println!("reference length:    {}", polyline_length(curve));
    println!("radius:              {}", profile.radius());
    let anchor = profile.anchor();
    println!(
        "anchor:              ({}, {}, {})",
        anchor.x, anchor.y, anchor.z
    );
    println!("axis upper bound:    {}", profile.axis_upper_bound());
    println!("length tolerance:    {}", profile.length_tolerance());
    println!("max interval median: {}", profile.max_interval_median());
    Ok(())
}

fn load_profile(path: &Path) -> Result<Profile> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read profile file: {}", path.display()))?;
    let document: ProfileDocument = serde_json::from_str(&data)
        .with_context(|| format!("failed to parse profile JSON: {}", path.display()))?;
    Profile::new(document.config, document.reference_curve)
        .with_context(|| format!("invalid profile definition: {}", path.display()))
}

fn load_probe(path: &Path) -> Result<Curve> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read probe file: {}", path.display()))?;
    let curve: Curve = serde_json::from_str(&data)
        .with_context(|| format!("failed to parse probe JSON: {}", path.display()))?;
    Ok(curve)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PROFILE_JSON: &str = r#"{
        "id": "BOB001",
        "radius": 2.0,
        "anchor": {"x": 2.1306, "y": -17.9064, "z": -2.1112},
        "axis_upper_bound": 23.0,
        "length_tolerance": 0.15,
        "max_interval_median": 2.0,
        "reference_curve": [
            {"x": 0.0, "y": -15.0, "z": 0.0},
            {"x": 0.5, "y": -10.0, "z": 0.2},
            {"x": 1.0, "y": 0.0, "z": 0.4}
        ]
    }"#;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn load_profile_reads_a_document() {
        let file = write_temp(PROFILE_JSON);
        let profile = load_profile(file.path()).unwrap();
        assert_eq!(profile.id(), "BOB001");
        assert_eq!(profile.reference_curve().len(), 3);
        assert_eq!(profile.radius(), 2.0);
    }

    #[test]
    fn load_profile_rejects_an_invalid_document() {
        let file = write_temp(r#"{"id": "BOB001"}"#);
        assert!(load_profile(file.path()).is_err());
    }

    #[test]
    fn load_probe_defaults_point_status() {
        let file = write_temp(r#"[{"x": 0.0, "y": -17.9, "z": 0.0}, {"x": 0.5, "y": -10.0, "z": 0.2}]"#);
        let probe = load_probe(file.path()).unwrap();
        assert_eq!(probe.len(), 2);
        assert_eq!(probe[0].status, probe_validity::PointStatus::NotTested);
    }
}
