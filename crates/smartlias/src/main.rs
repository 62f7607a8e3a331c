//! `smartlias` - server and admin CLI
//!
//! This binary runs the barangay resident-services API and provides a few
//! maintenance commands that work directly against the configured store.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use smartlias::auth::NewAccount;
use smartlias::cli::{AdminCommand, Cli, Command, ConfigCommand, ResidentsCommand};
use smartlias::clock::SystemClock;
use smartlias::http::{serve, AppState};
use smartlias::model::Role;
use smartlias::residents::ResidentQuery;
use smartlias::storage::open_store;
use smartlias::{init_logging, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    match cli.command {
        // Config commands must work even when the file is broken.
        Command::Config(config_cmd) => handle_config(cli.config, &config_cmd)?,
        Command::Serve(serve_cmd) => {
            let config = load_config(cli.config)?;
            let bind = serve_cmd.bind.unwrap_or_else(|| config.server.bind.clone());
            let state = build_state(&config)?;
            serve(state, &bind, &config.server.cors_origins).await?;
        }
        Command::Admin(admin_cmd) => handle_admin(&load_config(cli.config)?, &admin_cmd)?,
        Command::Residents(residents_cmd) => {
            handle_residents(&load_config(cli.config)?, residents_cmd)?;
        }
    }
    Ok(())
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    Config::load_from(path).context("loading configuration")
}

fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let store = open_store(config).context("opening storage")?;
    Ok(AppState::new(config, store, Arc::new(SystemClock))?)
}

fn handle_admin(config: &Config, cmd: &AdminCommand) -> anyhow::Result<()> {
    match cmd {
        AdminCommand::Create {
            first_name,
            last_name,
            pin,
        } => {
            let state = build_state(config)?;
            let user = state.auth.register(&NewAccount {
                first_name,
                last_name,
                role: Role::Admin,
                pin,
                pin_changed: true,
            })?;
            println!("Created admin account: {}", user.username);
        }
    }
    Ok(())
}

fn handle_residents(config: &Config, cmd: ResidentsCommand) -> anyhow::Result<()> {
    let state = build_state(config)?;
    match cmd {
        ResidentsCommand::List {
            search,
            limit,
            json,
        } => {
            let query = ResidentQuery::new(search.as_deref(), Some(1), Some(limit))?;
            let page = state.residents.list(&query)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&page)?);
            } else {
                println!("{:<8} {:<32} {:>4}  ADDRESS", "ID", "NAME", "AGE");
                for view in &page.residents {
                    let age = view.age.map_or_else(|| "-".to_string(), |a| a.to_string());
                    println!(
                        "{:<8} {:<32} {:>4}  {}",
                        view.display_id,
                        view.resident.full_name(),
                        age,
                        view.resident.address
                    );
                }
                println!();
                println!("Showing {} of {} residents", page.residents.len(), page.total);
            }
        }
        ResidentsCommand::Stats => {
            let stats = state.residents.stats()?;
            println!("Active residents:      {}", stats.total);
            println!("Added in last 30 days: {}", stats.recent_count);
        }
    }
    Ok(())
}

fn handle_config(path: Option<PathBuf>, cmd: &ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = Config::load_from(path)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Server]");
                println!("  Bind:               {}", config.server.bind);
                println!("  Development:        {}", config.server.development);
                println!(
                    "  CORS origins:       {}",
                    config.server.cors_origins.join(", ")
                );
                println!();
                println!("[Storage]");
                println!("  Backend:            {:?}", config.storage.backend);
                println!("  Database path:      {}", config.database_path().display());
                println!("  Data directory:     {}", config.data_dir().display());
                println!();
                println!("[Auth]");
                println!("  Max attempts:       {}", config.auth.max_attempts);
                println!("  Lockout (minutes):  {}", config.auth.lockout_minutes);
                println!("  Session (hours):    {}", config.auth.session_ttl_hours);
                println!();
                println!("[SMS]");
                println!("  Enabled:            {}", config.sms.enabled);
                println!("  Provider:           {:?}", config.sms.provider);
                println!("  Sender name:        {}", config.sms.sender_name);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.clone().or(path).unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
