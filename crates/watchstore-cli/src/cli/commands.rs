//! # CLI Layer
//!
//! The CLI layer is the **only** place in the codebase that:
//! - Knows about terminal I/O (stdout, stderr)
//! - Builds the async runtime
//! - Turns errors into exit codes (via `main`)
//!
//! Handlers open the store, call one library operation, close the store so
//! background writes land, and print.

use super::setup::{init_logging, parse_cli, Cli, Commands};
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use watchstore::init::{self, initialize};
use watchstore::keys::Namespace;
use watchstore::migrate;
use watchstore::model::ListType;
use watchstore::store::UserStore;

pub fn run() -> Result<()> {
    let cli = parse_cli();
    init_logging(cli.verbose);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(dispatch(cli))
}

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Migrate { file, report } => handle_migrate(&file, report),
        Commands::Import { user, file } => handle_import(cli.data, &user, &file).await,
        Commands::Export { user } => handle_export(cli.data, &user).await,
        Commands::Status { user } => handle_status(cli.data, &user).await,
        Commands::Keys { user } => handle_keys(cli.data, &user).await,
        Commands::Clear { user } => handle_clear(cli.data, &user).await,
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn handle_migrate(file: &Path, report: bool) -> Result<()> {
    let data = read_json(file)?;
    let migrated = migrate::migrate(Some(&data))?;
    debug!(file = %file.display(), from = %migrated.report.from, steps = migrated.report.applied.len(), "migrated offline");
    if report {
        print_json(&migrated.report)
    } else {
        print_json(&migrated.data)
    }
}

async fn handle_import(data_dir: Option<PathBuf>, user: &str, file: &Path) -> Result<()> {
    let data = read_json(file)?;
    let migrated = migrate::migrate(Some(&data))?;

    let ctx = initialize(user, data_dir).await?;
    let loaded = ctx.store.migrate_from_old_structure(&migrated.data);
    ctx.store.close().await;
    loaded?;
    info!(user, from = %migrated.report.from, "imported blob");

    println!(
        "Imported {} into user {} (schema {}, {} migration step(s))",
        file.display(),
        user,
        migrated.report.from,
        migrated.report.applied.len()
    );
    Ok(())
}

async fn handle_export(data_dir: Option<PathBuf>, user: &str) -> Result<()> {
    let ctx = initialize(user, data_dir).await?;
    let exported = ctx.store.load_to_old_format();
    ctx.store.close().await;
    print_json(&exported?)
}

async fn handle_status(data_dir: Option<PathBuf>, user: &str) -> Result<()> {
    let ctx = initialize(user, data_dir).await?;
    let lines = status_lines(&ctx.store)?;
    ctx.store.close().await;
    for line in lines {
        println!("{}", line);
    }
    Ok(())
}

fn status_lines(store: &UserStore) -> Result<Vec<String>> {
    let count = |value: &Value| {
        value
            .as_object()
            .map(|m| m.len())
            .or_else(|| value.as_array().map(Vec::len))
            .unwrap_or(0)
    };

    let version = store
        .get_meta()
        .map(|meta| meta.version)
        .unwrap_or_else(|| "none".to_string());
    let mut lines = vec![format!("user: {}", store.user_id()), format!("version: {}", version)];
    for list in ListType::ALL {
        lines.push(format!("{}: {}", list, store.get_list(list).len()));
    }

    let old = store.load_to_old_format()?;
    lines.push(format!("movie_reviews: {}", count(&old["movies"]["reviews"])));
    lines.push(format!("season_reviews: {}", count(&old["tvShows"]["seasonReviews"])));
    lines.push(format!("shows_with_episodes: {}", count(&old["tvShows"]["episodes"])));
    lines.push(format!("recent_searches: {}", count(&old["search"]["recent"])));
    Ok(lines)
}

async fn handle_keys(data_dir: Option<PathBuf>, user: &str) -> Result<()> {
    let data_dir = init::resolve_data_dir(data_dir)?;
    let driver = init::local_driver(&data_dir);
    let ns = Namespace::new(user);

    let keys = driver.list_keys(ns.prefix()).await?;
    debug!(user, data_dir = %data_dir.display(), found = keys.len(), "listed keys");
    for key in keys.iter().filter(|key| ns.parse(key).is_some()) {
        println!("{}", key);
    }
    Ok(())
}

async fn handle_clear(data_dir: Option<PathBuf>, user: &str) -> Result<()> {
    let ctx = initialize(user, data_dir).await?;
    let cleared = ctx.store.clear_all().await;
    ctx.store.close().await;
    cleared?;
    info!(user, "cleared store");
    println!("Cleared store for user {}", user);
    Ok(())
}
