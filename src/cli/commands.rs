use anyhow::{Context, Result};
use chrono::{Local, Utc};
use colored::Colorize;
use std::path::PathBuf;

use crate::{
    app::{init_config, Config},
    cache::{current_fingerprint, describe_snapshot, SnapshotStore},
};

use super::{Cli, Commands};

/// Handle CLI subcommands
pub fn handle_command(cli: &Cli, config: &Config) -> Result<()> {
    match &cli.command {
        Commands::Init => {
            match init_config(cli.config.clone())? {
                Some(path) => println!("Created default configuration at: {}", path.display()),
                None => println!("Configuration already exists"),
            }
            Ok(())
        }
        Commands::Fingerprint {
            address,
            port,
            username,
        } => {
            println!("{}", current_fingerprint(address, *port, username));
            Ok(())
        }
        Commands::Status { id } => {
            let store = open_store(cli, config)?;
            println!("{}", store.describe(id));
            Ok(())
        }
        Commands::List => list_snapshots(&open_store(cli, config)?),
        Commands::Show { id } => show_snapshot(&open_store(cli, config)?, id),
        Commands::Invalidate { id } => invalidate(&open_store(cli, config)?, id),
        Commands::Sweep => {
            sweep(&open_store(cli, config)?);
            Ok(())
        }
    }
}

/// Open the store from `--cache-dir`, falling back to configuration
fn open_store(cli: &Cli, config: &Config) -> Result<SnapshotStore> {
    let dir: PathBuf = match &cli.cache_dir {
        Some(dir) => dir.clone(),
        None => config.cache.cache_directory()?,
    };
    SnapshotStore::new(dir.clone())
        .with_context(|| format!("Failed to open cache directory {}", dir.display()))
}

fn list_snapshots(store: &SnapshotStore) -> Result<()> {
    let summaries = store.list();
    if summaries.is_empty() {
        println!("No snapshots in {}", store.cache_dir().display());
        return Ok(());
    }

    let now = Utc::now();
    for summary in summaries {
        let status = if now >= summary.expires_at {
            "expired".red()
        } else {
            "valid".green()
        };
        println!(
            "  • {} ({}) [{}] {} files, {} dirs, {}",
            summary.repository_id.bold(),
            summary.repository_name,
            status,
            summary.total_files,
            summary.total_directories,
            format_bytes(summary.total_size_bytes)
        );
    }
    Ok(())
}

fn show_snapshot(store: &SnapshotStore, id: &str) -> Result<()> {
    // Use the typed load so a broken record is reported, not hidden
    let snapshot = match store.try_load(id) {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => {
            println!("No cache available");
            return Ok(());
        }
        Err(e) if e.is_malformed() => {
            println!("{} {}", "[WARNING]".yellow(), e);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!("{} ({})", snapshot.repository_name.bold(), snapshot.repository_id);
    println!("  {}", describe_snapshot(&snapshot, Utc::now()));
    println!(
        "  Scanned: {}",
        snapshot.last_scanned.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
    );
    println!(
        "  Expires: {}",
        snapshot.expires_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
    );
    println!("  Fingerprint: {}", snapshot.identity_fingerprint);
    println!(
        "  Totals: {} files, {} directories, {}",
        snapshot.total_files,
        snapshot.total_directories,
        format_bytes(snapshot.total_size_bytes)
    );
    println!("  Directories:");
    for (path, children) in &snapshot.directory_index {
        println!("    {} ({} entries)", path, children.len());
    }
    Ok(())
}

fn invalidate(store: &SnapshotStore, id: &str) -> Result<()> {
    if store.try_invalidate(id)? {
        println!("{} Removed snapshot for {}", "[OK]".green(), id);
    } else {
        println!("No snapshot for {}", id);
    }
    Ok(())
}

fn sweep(store: &SnapshotStore) {
    let report = store.clear_expired();
    println!(
        "{} Deleted {} expired, kept {} valid",
        "[OK]".green(),
        report.deleted,
        report.retained
    );
    if report.unreadable > 0 {
        println!(
            "{} Left {} unreadable record(s) in place",
            "[WARNING]".yellow(),
            report.unreadable
        );
    }
}

/// Human-readable byte count
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}
