use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use linkforge_core::data::Database;
use linkforge_core::model::{Page, PipelineStatus, Scope, ScopeKey};
use linkforge_core::pipeline::{Orchestrator, PlannerSettings};
use linkforge_core::report::{
    ReportFormat, gather_report_data, generate_json_report, generate_text_report, save_report,
};
use linkforge_core::snapshot::SnapshotManager;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

// Helper functions shared by the plan and report handlers

/// Turn CLI scope arguments into a validated scope key.
pub fn parse_scope(
    project_id: i64,
    scope: &str,
    cluster_id: Option<i64>,
) -> Result<ScopeKey, String> {
    let scope = Scope::from_str(scope).ok_or_else(|| format!("Unknown scope '{scope}'"))?;
    let key = ScopeKey {
        project_id,
        scope,
        cluster_id,
    };
    key.validate()?;
    Ok(key)
}

/// Load and parse page records from a JSON file.
pub fn load_pages_from_file(path: &PathBuf) -> Result<Vec<Page>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read pages file {}: {}", path.display(), e))?;

    let pages: Vec<Page> = serde_json::from_str(&content)
        .map_err(|e| format!("Invalid pages file {}: {}", path.display(), e))?;

    if pages.is_empty() {
        return Err(format!("No pages found in {}", path.display()));
    }

    Ok(pages)
}

fn resolve_database(args: &ArgMatches) -> PathBuf {
    let raw = args.get_one::<String>("database").unwrap();
    let expanded = shellexpand::tilde(raw);
    let path = PathBuf::from(expanded.as_ref());
    if !Database::exists(&path) {
        eprintln!(
            "{} No database at {} (run `linkforge init` first)",
            "✗".red().bold(),
            path.display()
        );
        std::process::exit(1);
    }
    path
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt(msg: &str) -> String {
    print!("{} ", msg.bright_cyan().bold());
    io::stdout().flush().unwrap();
    let mut response = String::new();
    io::stdin().read_line(&mut response).unwrap();
    response.trim().to_lowercase()
}

pub fn handle_init(args: &ArgMatches) {
    print_divider();
    println!("{}", "  LINKFORGE INITIALIZATION".bright_white().bold());
    print_divider();
    println!();

    let db_path = args.get_one::<String>("PATH").unwrap();
    let force = args.get_flag("force");
    let expanded_config_dir = shellexpand::tilde(db_path);
    let config_dir = Path::new(expanded_config_dir.as_ref());
    let db_loc = config_dir.join("linkforge.db");
    let db_path = db_loc.as_path();

    println!("{} Parsed arguments", "✓".green().bold());
    println!(
        "{} Target: {}",
        "→".blue(),
        config_dir.display().to_string().bright_white()
    );
    println!();

    // Handle existing database in force mode
    if force && Database::exists(db_path) {
        println!(
            "{} Deleting existing database (force mode)",
            "→".yellow().bold()
        );
        Database::drop(db_path);
        println!("{} Existing database removed", "✓".green().bold());
        println!();
    }

    if Database::exists(db_path) && !force {
        println!("{}", "⚠ WARNING".yellow().bold());
        println!("Database already exists at:");
        println!(
            "  {} {}",
            "•".yellow(),
            db_path.display().to_string().bright_white()
        );
        println!();

        let response = print_prompt("Would you like to overwrite it? [y/N]:");
        println!();

        if response != "y" && response != "yes" {
            println!("{} Keeping existing database", "→".blue());
            println!();
            return;
        }
        Database::drop(db_path);
        println!("{} Existing database removed", "✓".green().bold());
        println!();
    }

    println!("{} Creating directory structure...", "→".blue());
    fs::create_dir_all(config_dir).expect("Failed to create config directory");
    println!(
        "  {} {}",
        "✓".green(),
        config_dir.display().to_string().bright_white()
    );

    println!("{} Creating database...", "→".blue());
    Database::new(db_path).expect("Failed to create database");

    println!();
    print_divider();
    println!("{}", "  INITIALIZATION COMPLETE".green().bold());
    print_divider();
    println!();
    println!(
        "{} Database: {}",
        "✓".green().bold(),
        db_path.display().to_string().bright_white()
    );
    println!();
}

pub fn handle_import(args: &ArgMatches) {
    let db_path = resolve_database(args);
    let file = args.get_one::<PathBuf>("file").unwrap();

    let pages = match load_pages_from_file(file) {
        Ok(pages) => pages,
        Err(e) => {
            eprintln!("{} {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    };

    let db = Database::new(&db_path).expect("Failed to open database");
    let mut imported = 0usize;
    let mut skipped = 0usize;
    for page in &pages {
        match db.insert_page(page) {
            Ok(_) => imported += 1,
            Err(e) => {
                eprintln!("{} Skipping {}: {}", "⚠".yellow(), page.url, e);
                skipped += 1;
            }
        }
    }

    println!(
        "{} Imported {} page(s){}",
        "✓".green().bold(),
        imported.to_string().bright_white(),
        if skipped > 0 {
            format!(" ({skipped} skipped)")
        } else {
            String::new()
        }
    );
}

pub async fn handle_plan(args: &ArgMatches) {
    // Initialize tracing for logging
    tracing_subscriber::fmt::init();

    let db_path = resolve_database(args);
    let project = *args.get_one::<i64>("project").unwrap();
    let scope = args.get_one::<String>("scope").unwrap();
    let cluster = args.get_one::<i64>("cluster").copied();

    let key = match parse_scope(project, scope, cluster) {
        Ok(key) => key,
        Err(e) => {
            eprintln!("{} {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    };

    let settings = PlannerSettings {
        fallback_endpoint: args.get_one::<Url>("fallback-url").cloned(),
        ..PlannerSettings::default()
    };
    let fallback_note = if settings.fallback_endpoint.is_some() {
        "llm fallback enabled"
    } else {
        "rule-based only"
    };

    println!("\n🔗 Planning links for {key}");
    println!("Injection: {fallback_note}\n");

    let orchestrator = Orchestrator::new(&db_path).with_settings(settings);
    if let Err(e) = orchestrator.trigger(key) {
        eprintln!("{} {}", "✗".red().bold(), e);
        std::process::exit(1);
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));

    loop {
        let progress = orchestrator.status(&key);
        match progress.status {
            PipelineStatus::Planning => {
                spinner.set_message(format!(
                    "step {}/6: {} ({}/{} pages)",
                    progress.current_step,
                    progress.step_label,
                    progress.pages_processed,
                    progress.total_pages,
                ));
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            PipelineStatus::Complete => {
                spinner.finish_and_clear();
                println!(
                    "{} Planning complete: {} link(s) placed",
                    "✓".green().bold(),
                    progress.total_links.to_string().bright_white()
                );
                if let Some(note) = progress.error {
                    println!("{} {}", "⚠".yellow(), note);
                }
                break;
            }
            PipelineStatus::Failed => {
                spinner.finish_and_clear();
                eprintln!(
                    "{} Planning failed: {}",
                    "✗".red().bold(),
                    progress.error.unwrap_or_else(|| "unknown error".to_string())
                );
                std::process::exit(1);
            }
            PipelineStatus::Idle => {
                spinner.finish_and_clear();
                eprintln!("{} Planning job never started", "✗".red().bold());
                std::process::exit(1);
            }
        }
    }
}

pub fn handle_report(args: &ArgMatches) {
    let db_path = resolve_database(args);
    let project = *args.get_one::<i64>("project").unwrap();
    let scope = args.get_one::<String>("scope").unwrap();
    let cluster = args.get_one::<i64>("cluster").copied();
    let format = args.get_one::<String>("format").unwrap();
    let output = args.get_one::<PathBuf>("output");

    let key = match parse_scope(project, scope, cluster) {
        Ok(key) => key,
        Err(e) => {
            eprintln!("{} {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    };

    let db = Database::new(&db_path).expect("Failed to open database");
    let data = match gather_report_data(&db, &key) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("{} Failed to gather report data: {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    };

    let content = match ReportFormat::from_str(format) {
        Some(ReportFormat::Text) => generate_text_report(&data),
        Some(ReportFormat::Json) => {
            generate_json_report(&data).expect("Failed to serialize report")
        }
        None => {
            eprintln!("{} Unknown report format '{}'", "✗".red().bold(), format);
            std::process::exit(1);
        }
    };

    match output {
        Some(path) => {
            if let Err(e) = save_report(&content, path) {
                eprintln!("{} Failed to save report: {}", "✗".red().bold(), e);
                std::process::exit(1);
            }
            println!(
                "{} Report saved to {}",
                "✓".green().bold(),
                path.display().to_string().bright_white()
            );
        }
        None => print!("{content}"),
    }
}

pub fn handle_restore(args: &ArgMatches) {
    let db_path = resolve_database(args);
    let snapshot_id = args.get_one::<String>("snapshot").unwrap();

    let db = Database::new(&db_path).expect("Failed to open database");
    match SnapshotManager::new(&db).restore(snapshot_id) {
        Ok(()) => {
            println!(
                "{} Restored snapshot {}",
                "✓".green().bold(),
                snapshot_id.bright_white()
            );
        }
        Err(e) => {
            eprintln!("{} Restore failed: {}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    }
}
