//! Worker lifecycle commands

use colored::Colorize;
use serde::Serialize;

use crate::cli::args::GlobalOptions;
use crate::cli::context::WorkerContext;
use crate::error::Result;
use crate::models::display::format_unix_timestamp;
use crate::output;
use crate::worker::ActivationReport;
use crate::worker::lifecycle::Registration;

/// Install the configured generation
pub async fn install(opts: &GlobalOptions) -> Result<()> {
    let mut ctx = WorkerContext::new(opts)?;
    let report = ctx.worker.install().await?;
    ctx.finish().await;

    if opts.is_json() {
        return output::print_json(&report);
    }

    println!(
        "{} Installed generation {} ({} shell assets cached)",
        "✓".green(),
        report.generation.bold(),
        report.assets_cached
    );
    if let Some(activation) = &report.activation {
        print_activation(activation);
    }
    Ok(())
}

/// Activate the waiting generation
pub async fn activate(opts: &GlobalOptions) -> Result<()> {
    let mut ctx = WorkerContext::new(opts)?;
    let report = ctx.worker.activate().await?;
    ctx.finish().await;

    if opts.is_json() {
        return output::print_json(&report);
    }
    print_activation(&report);
    Ok(())
}

/// Promote a waiting generation
pub async fn skip_waiting(opts: &GlobalOptions) -> Result<()> {
    let mut ctx = WorkerContext::new(opts)?;
    let report = ctx.worker.skip_waiting().await?;
    ctx.finish().await;

    if opts.is_json() {
        return output::print_json(&report);
    }
    match report {
        Some(activation) => print_activation(&activation),
        None => println!("{} No waiting worker", "○".dimmed()),
    }
    Ok(())
}

#[derive(Serialize)]
struct StateView {
    #[serde(flatten)]
    registration: Registration,
    configured_generation: String,
    clients_controlled: bool,
}

/// Show the persisted registration
pub fn state(opts: &GlobalOptions) -> Result<()> {
    let ctx = WorkerContext::new(opts)?;
    let registration = ctx.worker.registration();
    let configured = ctx.worker.config().cache.generation.clone();

    if opts.is_json() {
        return output::print_json(&StateView {
            clients_controlled: registration.active_generation.is_some(),
            registration,
            configured_generation: configured,
        });
    }

    println!("{}\n", "Worker Registration".bold());
    println!("State:       {}", registration.state.as_str().bold());
    match &registration.active_generation {
        Some(active) if *active == configured => {
            println!("{} Active generation: {}", "✓".green(), active)
        }
        Some(active) => println!(
            "{} Active generation: {} (configured: {})",
            "⚠".yellow(),
            active,
            configured
        ),
        None => {
            println!("{} No active generation", "✗".red());
            println!("  → Run 'nhka-offline install' to install {}", configured);
        }
    }
    if let Some(waiting) = &registration.waiting_generation {
        println!("{} Waiting generation: {}", "○".dimmed(), waiting);
    }
    println!(
        "Updated:     {}",
        format_unix_timestamp(registration.updated_at.timestamp())
    );
    Ok(())
}

fn print_activation(report: &ActivationReport) {
    println!(
        "{} Activated generation {}",
        "✓".green(),
        report.generation.bold()
    );
    if report.deleted_caches.is_empty() {
        println!("  No old caches to delete");
    } else {
        for name in &report.deleted_caches {
            println!("  Deleted old cache: {}", name.dimmed());
        }
    }
    println!("  Claimed {} client(s)", report.claimed_clients);
}
