mod cli;
mod config;
mod db;
mod models;
mod prayer_times;
mod tasks;
mod utils;

use anyhow::{Context, Result};
use clap::Parser;
use rusqlite::Connection;

use cli::args::{Cli, Commands};
use cli::handlers::{self, Services};
use config::AppConfig;
use db::migrations::run_migrations;
use prayer_times::client::HttpClient;
use prayer_times::file_cache::FileCache;

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let mut config = AppConfig::load().context("Loading config")?;

    // Ensure data directory exists and open DB
    AppConfig::ensure_data_dir()?;
    let db_path = AppConfig::db_path()?;
    let conn = Connection::open(&db_path)
        .with_context(|| format!("Opening database at {:?}", db_path))?;

    // WAL lets the background prefetch write while we read
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;

    run_migrations(&conn)?;

    let files = FileCache::open(AppConfig::cache_dir()?)?;
    let client = HttpClient::new(&config.network)?;
    let services = Services {
        conn: &conn,
        files: &files,
        client: &client,
        db_path,
    };

    match cli.command {
        Some(Commands::Times { date }) => {
            handlers::handle_times(&services, &config, date.as_deref())?;
        }
        Some(Commands::Prefetch { days }) => {
            handlers::handle_prefetch(&services, &config, days)?;
        }
        Some(Commands::Location { action }) => {
            handlers::handle_location(&services, &mut config, &action)?;
        }
        Some(Commands::Method { action }) => {
            handlers::handle_method(&mut config, &action)?;
        }
        Some(Commands::Task { action }) => {
            handlers::handle_task(&services, &config, &action)?;
        }
        Some(Commands::Cache { action }) => {
            handlers::handle_cache(&services, &action)?;
        }
        Some(Commands::Settings { action }) => {
            handlers::handle_settings(&services, &mut config, &action)?;
        }
        // No subcommand → today's times
        None => {
            handlers::handle_times(&services, &config, None)?;
        }
    }

    Ok(())
}
