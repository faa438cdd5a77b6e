//! Caseload CLI - headless commands over the caseload data layer.
//!
//! Useful for checking store connectivity and triggering billing draft
//! generation without a UI.

use std::io;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use caseload_core::models::ClaimStatus;
use caseload_core::{Config, Registry, StoreMode};

const USAGE: &str = "\
Usage: caseload <command> [options]

Commands:
  status                 Show store mode, cache ages and last draft sync
  students [--json]      List students
  teachers [--json]      List teachers
  authorizations [--json]
                         List authorizations
  claims [--force-sync] [--json]
                         Generate pending drafts, then list billing claims
  sync [--force]         Run billing draft generation";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        eprintln!("{}", USAGE);
        return Ok(());
    };
    let has_flag = |flag: &str| args.iter().skip(1).any(|a| a == flag);

    let config = Config::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        Config::default()
    });
    let registry = Registry::from_config(&config).context("Failed to set up data store")?;
    info!(mode = ?registry.mode(), command, "Caseload CLI starting");

    match command {
        "status" => print_status(&registry).await,
        "students" => {
            let students = registry.students().load(false).await?;
            if has_flag("--json") {
                return print_json(&students);
            }
            for s in &students {
                println!("{:<10} {:<24} {:<14} {}", s.student_id, s.name, s.display_grade(), s.school);
            }
            println!("{} students", students.len());
            Ok(())
        }
        "teachers" => {
            let teachers = registry.teachers().load(false).await?;
            if has_flag("--json") {
                return print_json(&teachers);
            }
            for t in &teachers {
                println!("{:<24} {:<32} {}", t.name, t.email, t.school);
            }
            println!("{} teachers", teachers.len());
            Ok(())
        }
        "authorizations" => {
            let auths = registry.authorizations().load(false).await?;
            if has_flag("--json") {
                return print_json(&auths);
            }
            for a in &auths {
                println!(
                    "{:<12} {:<24} {:<16} {:>4} units  expires {}",
                    a.authorization_number,
                    a.student_name(),
                    a.payer_name,
                    a.total_units,
                    a.expires_on
                );
            }
            println!("{} authorizations", auths.len());
            Ok(())
        }
        "claims" => {
            let snapshot = registry.claims().load(has_flag("--force-sync")).await?;
            if let Some(err) = &snapshot.sync_error {
                eprintln!("Warning: draft generation failed: {}", err);
            }
            if has_flag("--json") {
                return print_json(&snapshot.claims);
            }
            for c in &snapshot.claims {
                println!(
                    "{}  {:<24} {} x{:<3} {:>9.2}  {}",
                    c.session_date, c.student_name, c.cpt_code, c.units, c.amount, c.status
                );
            }
            println!(
                "{} claims ({} draft)",
                snapshot.claims.len(),
                snapshot.count_with_status(ClaimStatus::Draft)
            );
            Ok(())
        }
        "sync" => {
            let gate = registry.draft_sync();
            let force = has_flag("--force");
            if !force && !gate.is_due() {
                println!("Draft sync skipped: last run within {}s", gate.interval().as_secs());
                return Ok(());
            }
            gate.run_gated(force)
                .await
                .context("Billing draft generation failed")?;
            println!("Billing drafts generated");
            Ok(())
        }
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}\n\n{}", other, USAGE);
            std::process::exit(2);
        }
    }
}

async fn print_status(registry: &Registry) -> Result<()> {
    let mode = match registry.mode() {
        StoreMode::Remote => "remote",
        StoreMode::Fallback => "fallback (no store configured)",
    };
    println!("{:<16}{}", "store:", mode);

    // Warm the caches so the ages reflect this process
    registry.students().load(false).await?;
    registry.teachers().load(false).await?;
    registry.authorizations().load(false).await?;

    let status = registry.status();
    let rows = [
        (registry.students_loader().name(), registry.students_loader().ttl(), &status.students),
        (registry.teachers_loader().name(), registry.teachers_loader().ttl(), &status.teachers),
        (
            registry.authorizations_loader().name(),
            registry.authorizations_loader().ttl(),
            &status.authorizations,
        ),
    ];
    for (name, ttl, age) in rows {
        println!(
            "{:<16}{} (ttl {}s)",
            format!("{}:", name),
            age.as_deref().unwrap_or("not cached"),
            ttl.as_secs()
        );
    }

    let gate = registry.draft_sync();
    println!(
        "{:<16}{} (interval {}s)",
        format!("{}:", gate.name()),
        status.draft_sync_age(),
        gate.interval().as_secs()
    );
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
