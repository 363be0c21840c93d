use crate::project;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::Path;

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Dotted path of the value (`title`, `tasks.0.done`)
    pub path: String,

    /// New value, parsed as JSON when possible
    pub value: String,
}

pub async fn set(args: SetArgs, cwd: &str) -> Result<()> {
    let mut sync = project::open(Path::new(cwd)).await?;
    project::begin_edit(&mut sync)?;

    let value = project::parse_value(&args.value);
    if !sync.set_value(&args.path, value.clone())? {
        println!("  {} {} unchanged", "✓".green(), args.path.bright_white());
        return Ok(());
    }

    println!("  {} {} = {}", "✓".green(), args.path.bright_white(), value);
    project::save(&mut sync).await
}
