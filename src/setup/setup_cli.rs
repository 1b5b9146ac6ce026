use clap::{Parser, Subcommand};
use lexicon_backend::config::Config;
use lexicon_backend::engine::events::LogPublisher;
use lexicon_backend::engine::ModerationEngine;
use lexicon_backend::models::contribution_models::LeaderboardWindow;
use lexicon_backend::models::db_operations::SqliteStore;
use lexicon_backend::models::Role;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "setup_cli", author, version, about = "A CLI for setting up and maintaining the moderation database.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Reverts expired temporary actions and flushes undelivered events.
    Sweep,
    Leaderboard {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

#[derive(Subcommand, Debug)]
enum DbAction {
    Setup,
}

#[derive(Subcommand, Debug)]
enum UserAction {
    Create {
        #[arg(long)]
        username: String,
        #[arg(long, default_value = "user")]
        role: String,
    },
    List,
}

fn main() {
    let cli = Cli::parse();

    let config = Config::from_env(&cli.env_file)
        .expect("FATAL: Failed to load or parse configuration.");
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(&config.log_level));

    match &cli.command {
        Commands::Db { action } => match action {
            DbAction::Setup => setup_moderation_database(&config),
        },
        Commands::User { action } => match action {
            UserAction::Create { username, role } => create_user(&config, username, role),
            UserAction::List => list_users(&config),
        },
        Commands::Sweep => run_sweep(&config),
        Commands::Leaderboard { limit } => show_leaderboard(&config, *limit),
    }
}

fn setup_moderation_database(config: &Config) {
    let db_path = config.moderation_db_path();
    println!("\nSetting up moderation database at '{}'...", db_path.display());

    if let Some(parent_dir) = db_path.parent() {
        if let Err(e) = fs::create_dir_all(parent_dir) {
            eprintln!("❌ Error: Could not create database directory: {}", e);
            return;
        }
    }

    match SqliteStore::open(&db_path).and_then(|store| store.initialize()) {
        Ok(()) => println!("✅ Moderation database setup completed successfully."),
        Err(e) => eprintln!("❌ Error setting up moderation database: {}", e),
    }
}

/// Opens the existing database, or explains how to create it.
fn open_store(config: &Config) -> Option<SqliteStore> {
    let db_path = config.moderation_db_path();
    if !db_path.exists() {
        eprintln!(
            "❌ Error: Moderation database not found at '{}'. Please run `setup_cli db setup` first.",
            db_path.display()
        );
        return None;
    }
    match SqliteStore::open(&db_path) {
        Ok(store) => Some(store),
        Err(e) => {
            eprintln!("❌ Error: Could not open moderation database: {}", e);
            None
        }
    }
}

fn create_user(config: &Config, username: &str, role: &str) {
    let role = match role.parse::<Role>() {
        Ok(role) => role,
        Err(e) => {
            eprintln!("❌ Error: {}. Use one of admin, moderator, expert, contributor, user.", e);
            return;
        }
    };
    let Some(store) = open_store(config) else { return };

    match store.create_user(username.trim(), role) {
        Ok(user) => println!("✅ User '{}' created with id {} and role '{}'.", user.username, user.id, user.role),
        Err(e) => eprintln!("❌ Error creating user (username may already exist): {}", e),
    }
}

fn list_users(config: &Config) {
    let Some(store) = open_store(config) else { return };

    match store.list_users() {
        Ok(users) if users.is_empty() => println!("No users found."),
        Ok(users) => {
            println!("\n--- Users ---");
            for user in users {
                println!(
                    "{:>5}  {:<24} {:<12} {:<8} points={} warnings={}",
                    user.id,
                    user.username,
                    user.role,
                    if user.is_active { "active" } else { "inactive" },
                    user.points,
                    user.warning_count
                );
            }
        }
        Err(e) => eprintln!("❌ Error listing users: {}", e),
    }
}

fn build_engine(config: &Config) -> Option<ModerationEngine<SqliteStore>> {
    let store = open_store(config)?;
    Some(ModerationEngine::new(store, Arc::new(LogPublisher), config.moderation.clone()))
}

fn run_sweep(config: &Config) {
    let Some(engine) = build_engine(config) else { return };

    match engine.run_maintenance() {
        Ok(report) => println!(
            "✅ Sweep finished: {} expired, {} reverted, {} skipped, {} failed; {} events delivered.",
            report.sweep.expired,
            report.sweep.reverted,
            report.sweep.skipped,
            report.sweep.failed,
            report.events_delivered
        ),
        Err(e) => eprintln!("❌ Error running sweep: {}", e),
    }
}

fn show_leaderboard(config: &Config, limit: u32) {
    let Some(engine) = build_engine(config) else { return };

    match engine.leaderboard(LeaderboardWindow::default(), limit.max(1)) {
        Ok(entries) if entries.is_empty() => println!("No approved contributions yet."),
        Ok(entries) => {
            println!("\n--- Leaderboard ---");
            for (rank, entry) in entries.iter().enumerate() {
                println!(
                    "{:>3}. user {:<8} {:>6} points  ({} contributions)",
                    rank + 1,
                    entry.user_id,
                    entry.points,
                    entry.contributions
                );
            }
        }
        Err(e) => eprintln!("❌ Error reading leaderboard: {}", e),
    }
}
