//! Basic configuration manager usage example
//!
//! Demonstrates pushing writer and rule configurations at runtime and
//! logging through the rewired categories.
//!
//! Run with: cargo run --example basic_usage

use log_config_manager::prelude::*;
use log_config_manager::registry::payload::{LOG_FILE, LOG_FILE_SIZE, LOG_LEVEL, LOG_NAMES, LOG_PATTERN};
use std::sync::Arc;

fn main() -> Result<()> {
    println!("=== Log Config Manager - Basic Usage Example ===\n");

    let root_dir = std::env::temp_dir().join("log_config_manager_demo");
    let context = Arc::new(LoggerContext::new());
    let manager = LogConfigManager::builder()
        .settings(ManagerSettings::new().root_dir(&root_dir))
        .engine(context.clone())
        .build()?;

    println!("1. Default rule logs INFO and above to the console:");
    context.log("org.example", LogLevel::Info, "Info message (visible)");
    context.log("org.example", LogLevel::Debug, "Debug message (hidden)");

    println!("\n2. A rotating writer and a DEBUG rule for the database layer:");
    manager.update_writer(
        "writer.db",
        Some(&ConfigPayload::new().with(LOG_FILE, "logs/db.log").with(LOG_FILE_SIZE, "10mb")),
    )?;
    manager.update_config(
        "rule.db",
        Some(
            &ConfigPayload::new()
                .with(LOG_LEVEL, "DEBUG")
                .with(LOG_NAMES, "org.example.db, org.example.cache")
                .with(LOG_FILE, "writer.db"),
        ),
    )?;
    context.log("org.example.db.pool", LogLevel::Debug, "Connection acquired");
    context.flush();
    println!("   Written to {}", root_dir.join("logs/db.log").display());

    println!("\n3. Legacy patterns are translated:");
    manager.update_config(
        "rule.legacy",
        Some(
            &ConfigPayload::new()
                .with(LOG_LEVEL, "WARN")
                .with(LOG_NAMES, "org.legacy")
                .with(LOG_PATTERN, "{0,date,dd.MM.yyyy} *{4}* [{2}] {3} {5}"),
        ),
    )?;
    if let Some(rule) = manager.config("rule.legacy") {
        println!("   {}", rule.pattern);
    }

    println!("\n4. Status snapshot:");
    println!("{}", manager.snapshot().to_json()?);

    manager.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);
    println!("\n=== Example completed successfully! ===");

    Ok(())
}
