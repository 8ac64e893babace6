//! CLI argument parsing for the reconciliation job.
//!
//! The CLI is intentionally thin: it wires configuration, store, and roster
//! client together without embedding policy, so the same core logic can be
//! driven from tests or another host.
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Root CLI entrypoint for the enrolment reconciler.
///
/// Keeping a single `RootArgs` type makes command routing obvious and avoids
/// hidden defaults in subcommand constructors.
#[derive(Parser, Debug)]
#[command(
    name = "daisy-enrol",
    version,
    about = "Reconcile course enrolments against the Daisy REST API",
    after_help = "Commands:\n  run --config <FILE> --store <FILE>    Reconcile every configured course\n  check --config <FILE>                 Validate a configuration file\n  check --stub                          Print a configuration template\n\nExamples:\n  daisy-enrol run --config enrol.json --store store.json\n  daisy-enrol run --config enrol.json --store store.json --mode program\n  daisy-enrol run --config enrol.json --store store.json --out report.json\n  daisy-enrol check --config enrol.json\n  daisy-enrol check --stub > enrol.json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    Run(RunArgs),
    Check(CheckArgs),
}

/// Which roster listing backs the courses' id-number branches.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterMode {
    /// Course-segment participant listings
    Course,
    /// Program admission listings
    Program,
}

/// Run command inputs for one reconciliation pass.
#[derive(Parser, Debug)]
#[command(about = "Reconcile every configured course against the roster source")]
pub struct RunArgs {
    /// Reconciler configuration file (JSON)
    #[arg(long, value_name = "FILE")]
    pub config: PathBuf,

    /// Enrolment store snapshot (JSON), updated in place
    #[arg(long, value_name = "FILE")]
    pub store: PathBuf,

    /// Roster listing to reconcile against
    #[arg(long, value_enum, default_value_t = RosterMode::Course)]
    pub mode: RosterMode,

    /// Optional output path for the machine-readable run report
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}

/// Check command inputs for configuration validation.
#[derive(Parser, Debug)]
#[command(about = "Validate a configuration file or print a template")]
pub struct CheckArgs {
    /// Reconciler configuration file (JSON)
    #[arg(long, value_name = "FILE", conflicts_with = "stub")]
    pub config: Option<PathBuf>,

    /// Print a configuration template and exit
    #[arg(long)]
    pub stub: bool,
}
