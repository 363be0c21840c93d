use anyhow::{anyhow, Context, Result};
use bindery_editor::Schema;
use bindery_sync::{AppConfig, SyncOrchestrator};
use colored::Colorize;
use serde_json::Value;
use std::path::Path;
use tracing::debug;

/// Load config and schema from `cwd`, then fetch the data
pub async fn open(cwd: &Path) -> Result<SyncOrchestrator> {
    let config = AppConfig::load(cwd)?;
    let schema_path = config.template_path(cwd);

    let content = std::fs::read_to_string(&schema_path)
        .with_context(|| format!("Cannot read schema {}", schema_path.display()))?;
    let schema: Schema = serde_json::from_str(&content)
        .with_context(|| format!("Invalid schema {}", schema_path.display()))?;

    let mut sync = SyncOrchestrator::open(config, &schema, cwd)?;
    sync.process_signals().await?;
    report_notices(&mut sync);

    debug!(permissions = sync.permission_summary(), "Project opened");
    Ok(sync)
}

/// Enter edit mode, failing when editing is not offered
pub fn begin_edit(sync: &mut SyncOrchestrator) -> Result<()> {
    if !sync.edit()? {
        return Err(anyhow!(
            "Editing is not permitted (permissions: {})",
            sync.permission_summary()
        ));
    }
    Ok(())
}

/// Save and print the outcome
pub async fn save(sync: &mut SyncOrchestrator) -> Result<()> {
    match sync.save().await {
        Ok(Some(_)) => {
            println!("  {} Saved", "✓".green());
            Ok(())
        }
        Ok(None) => {
            println!("  {} No storage configured, nothing saved", "⚠️".yellow());
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

pub fn report_notices(sync: &mut SyncOrchestrator) {
    for message in sync.notices().messages() {
        eprintln!("{} {}", "⚠️".yellow(), message);
    }
}

/// Interpret a command-line value as JSON, falling back to a plain string
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
