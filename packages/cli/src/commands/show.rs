use crate::project;
use anyhow::Result;
use bindery_editor::{format_path, NodeKind};
use clap::Args;
use colored::Colorize;
use std::path::Path;

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Print the serialized record instead of a field listing
    #[arg(long)]
    pub json: bool,
}

pub async fn show(args: ShowArgs, cwd: &str) -> Result<()> {
    let sync = project::open(Path::new(cwd)).await?;

    if args.json {
        let (_, data_string) = sync.session().snapshot()?;
        println!("{}", data_string);
        return Ok(());
    }

    println!(
        "{} {}",
        "📄".bright_blue(),
        sync.config().id.bright_blue().bold()
    );

    let session = sync.session();
    session.walk(|node, path| {
        match &node.kind {
            NodeKind::Primitive(primitive) => {
                let label = match format_path(path) {
                    p if p.is_empty() => "(value)".to_string(),
                    p => p,
                };
                println!("  {} = {}", label.bright_white(), primitive.value());
            }
            NodeKind::Collection(collection) if collection.is_empty() => {
                println!("  {} {}", format_path(path).bright_white(), "(empty)".dimmed());
            }
            _ => {}
        }
        true
    });

    println!();
    println!("Permissions: {}", sync.permission_summary());
    if let Some(status) = sync.status_line() {
        println!("{}", status);
    }

    Ok(())
}
