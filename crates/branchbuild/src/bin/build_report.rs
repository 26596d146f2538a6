//! # Build Report
//!
//! Loads a project, applies a build and prints balances, budgets and
//! configuration problems.
//!
//! ```text
//! build_report <project.json> [item ids | build code ...]
//! build_report <project.json> --settings engine.toml fire, potion, potion
//! ```

use std::process::ExitCode;

use branchbuild::{Engine, EngineSettings, Project};

fn main() -> ExitCode {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("usage: build_report <project.json> [--settings <file.toml>] [item ids ...]");
        return ExitCode::from(2);
    }
    let project_path = args.remove(0);

    let mut settings = EngineSettings::default();
    if let Some(pos) = args.iter().position(|a| a == "--settings") {
        let Some(path) = args.get(pos + 1).cloned() else {
            eprintln!("--settings needs a file");
            return ExitCode::from(2);
        };
        args.drain(pos..=pos + 1);
        settings = match EngineSettings::from_path(&path) {
            Ok(settings) => settings,
            Err(err) => {
                eprintln!("settings: {err}");
                return ExitCode::FAILURE;
            }
        };
    }

    let project = match Project::from_path(&project_path) {
        Ok(project) => project,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let mut engine = Engine::with_settings(project, settings);

    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║  BUILD REPORT: {:<44}║", engine.catalog().project().title().unwrap_or("untitled"));
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();

    let issues = engine.catalog().lint();
    if !issues.is_empty() {
        println!("Configuration issues:");
        for issue in &issues {
            println!("  ⚠ {issue}");
        }
        println!();
    }

    let code = args.join(" ");
    let loaded = engine.apply_build_code(&code);
    let report = engine.last_report().clone();
    let requested = code
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .count();
    println!("Loaded {loaded} of {requested} requested ids");
    if !report.removed.is_empty() {
        println!("Removed by cleanup: {}", report.removed.join(", "));
    }
    if !report.forced.is_empty() {
        println!("Added by effects:   {}", report.forced.join(", "));
    }
    if !report.converged {
        println!("⚠ cleanup did not settle after {} passes", report.cleanup_passes);
    }
    println!();

    println!("Selected:");
    for (id, quantity) in engine.state().selected.iter() {
        let name = engine.find_item(id).map_or(id, |item| item.display_name());
        let prices: Vec<String> = engine
            .cost_breakdown(id)
            .unwrap_or_default()
            .into_iter()
            .map(|c| {
                if c.modifiers.is_empty() {
                    format!("{} {}", c.value, c.currency)
                } else {
                    format!("{} {} ({})", c.value, c.currency, c.modifiers.join(" "))
                }
            })
            .collect();
        println!("  {name} x{quantity}  {}", prices.join(", "));
    }
    println!();

    println!("Balances:");
    for (currency, balance) in &engine.state().currencies {
        println!("  {currency:<16} {balance:>8}");
    }

    if !engine.state().budgets.is_empty() {
        println!();
        println!("Budgets:");
        for (group, budget) in &engine.state().budgets {
            println!(
                "  {group:<16} {:>4} / {:<4} ({} left)",
                budget.used, budget.total, budget.remaining
            );
        }
    }

    println!();
    println!("Build code: {}", engine.build_code());
    match engine.export_state_json() {
        Ok(json) => println!("Snapshot:   {json}"),
        Err(err) => eprintln!("snapshot: {err}"),
    }

    ExitCode::SUCCESS
}
