// src/commands.rs
//! Command handlers for the rhel2centos CLI

use anyhow::{bail, Result};
use rhel2centos::lock::RunLock;
use rhel2centos::status::StatusDocument;
use rhel2centos::{Migration, MigrationConfig, RunOutcome, Stage, StatusStore, SystemRunner, COMPLETION_KEY};
use std::fmt::Write;
use std::path::Path;
use tracing::info;

/// Run (or resume) the migration
pub fn cmd_run(config: &MigrationConfig) -> Result<RunOutcome> {
    // rpm, yum and grub2-mkconfig always act on the running system
    if config.root != Path::new("/") {
        bail!(
            "Refusing to migrate with root {}: package and boot tools act on the live system",
            config.root.display()
        );
    }

    let euid = nix::unistd::geteuid().as_raw();
    let store = StatusStore::open(&config.status_file);

    // Unprivileged runs cannot create the lock and will stop before any stage
    let _lock = if euid == 0 {
        match RunLock::try_acquire(&config.lock_file)? {
            Some(lock) => Some(lock),
            None => {
                let holder = RunLock::holder_pid(&config.lock_file)
                    .map(|pid| format!(" (pid {})", pid))
                    .unwrap_or_default();
                bail!("Another migration is already running{}", holder);
            }
        }
    } else {
        None
    };

    if euid == 0 {
        if let Some(legacy) = &config.legacy_status_file {
            store.adopt(legacy)?;
        }
    }

    info!("Using status document {}", store.path().display());
    let mut migration = Migration::new(config, &store, SystemRunner, euid);
    let outcome = migration.run()?;
    info!("Migration {}", migration.state());
    Ok(outcome)
}

/// Print the completion state of every stage
pub fn cmd_status(config: &MigrationConfig) -> Result<()> {
    let store = StatusStore::open(&config.status_file);
    let doc = store.load()?;

    print!("{}", render_status(store.path(), &doc));
    if let Some(legacy) = &config.legacy_status_file {
        if !store.path().exists() && legacy.exists() {
            println!(
                "Progress recorded at {} will be imported by the next run",
                legacy.display()
            );
        }
    }
    Ok(())
}

fn render_status(path: &Path, doc: &StatusDocument) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Status document: {}", path.display());
    for stage in Stage::all() {
        let done = doc.get(stage.key()).copied().unwrap_or(false);
        let note = if stage.is_required() { "" } else { " (conditional)" };
        let _ = writeln!(
            out,
            "  [{}] {:<40} {}{}",
            mark(done),
            stage.key(),
            stage.name(),
            note
        );
    }
    let done = doc.get(COMPLETION_KEY).copied().unwrap_or(false);
    let _ = writeln!(out, "  [{}] {:<40} Migration finished", mark(done), COMPLETION_KEY);

    let unknown: Vec<(&String, &bool)> = doc
        .iter()
        .filter(|(k, _)| k.as_str() != COMPLETION_KEY && Stage::from_key(k).is_none())
        .collect();
    if !unknown.is_empty() {
        let _ = writeln!(out, "Unrecognized keys:");
        for (key, value) in unknown {
            let _ = writeln!(out, "  {} = {}", key, value);
        }
    }
    out
}

fn mark(done: bool) -> &'static str {
    if done { "x" } else { " " }
}

/// Clear stage keys so the stages run again
pub fn cmd_reset(config: &MigrationConfig, stages: &[String]) -> Result<()> {
    let store = StatusStore::open(&config.status_file);
    for (key, cleared) in reset_stages(&store, stages)? {
        if cleared {
            info!("Cleared stage '{}'", key);
            println!("Cleared: {}", key);
        } else {
            println!("Not set: {}", key);
        }
    }
    Ok(())
}

/// Validate every key before clearing any; returns `(key, was_set)` pairs
fn reset_stages<'k>(store: &StatusStore, stages: &'k [String]) -> Result<Vec<(&'k str, bool)>> {
    for key in stages {
        if key != COMPLETION_KEY && Stage::from_key(key).is_none() {
            bail!("Unknown stage '{}' (run `rhel2centos status` for the list)", key);
        }
    }

    let mut results = Vec::with_capacity(stages.len());
    for key in stages {
        results.push((key.as_str(), store.clear_stage(key)?));
    }
    Ok(results)
}
