use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::Path;
use tracing_subscriber::EnvFilter;

use daisy_enrol::cli::{CheckArgs, Command, RootArgs, RosterMode, RunArgs};
use daisy_enrol::config::{config_stub, load_config};
use daisy_enrol::confirm::ConfirmationPolicy;
use daisy_enrol::diagnostics::RunSummary;
use daisy_enrol::notify::LogNotifier;
use daisy_enrol::orchestrator::{Orchestrator, RosterFilter};
use daisy_enrol::roster::RestRosterClient;
use daisy_enrol::store::JsonStore;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = RootArgs::parse();
    match cli.command {
        Command::Run(args) => cmd_run(args),
        Command::Check(args) => cmd_check(args),
    }
}

fn cmd_run(args: RunArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let mut store = JsonStore::load(&args.store)?;
    let roster = RestRosterClient::new(&config);
    let mut notifier = LogNotifier::new(config.error_receiver.clone());

    let interactive = std::io::stdin().is_terminal();
    let policy = ConfirmationPolicy::for_run(&config, interactive);
    let filter = match args.mode {
        RosterMode::Course => RosterFilter::Course,
        RosterMode::Program => RosterFilter::Program,
    };

    let result = Orchestrator::new(
        &config,
        &roster,
        &mut store,
        &mut notifier,
        policy,
        interactive,
    )
    .run(filter);

    // Persist whatever was applied before a mid-run abort; courses already
    // reconciled stay reconciled.
    store.persist()?;
    let summary = result?;

    if let Some(out) = &args.out {
        write_report(out, &summary)?;
        println!("Wrote run report to {}", out.display());
    }
    print_summary(&summary);
    Ok(())
}

fn cmd_check(args: CheckArgs) -> Result<()> {
    if args.stub {
        println!("{}", config_stub());
        return Ok(());
    }
    let path = args
        .config
        .context("pass --config <FILE> to validate, or --stub for a template")?;
    let config = load_config(&path)?;
    println!(
        "Configuration ok: resource {} at {}, automatic enrolment {}",
        config.course_resource,
        config.api_base_url,
        if config.automatic_enrolment { "on" } else { "off" }
    );
    Ok(())
}

fn write_report(path: &Path, summary: &RunSummary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary).context("serialize run report")?;
    std::fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    for report in &summary.courses {
        println!(
            "{}: enrolled {}, unenrolled {}, created {}, errors {}",
            report.course_name,
            report.enrolled.len(),
            report.unenrolled.len(),
            report.created.len(),
            report.error_messages().len()
        );
    }
}
