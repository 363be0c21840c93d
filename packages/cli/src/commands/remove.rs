use crate::project;
use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use std::path::Path;

#[derive(Debug, Args)]
pub struct RemoveArgs {
    /// Collection to remove from
    pub collection: String,

    /// Index of the item
    pub index: usize,
}

pub async fn remove(args: RemoveArgs, cwd: &str) -> Result<()> {
    let mut sync = project::open(Path::new(cwd)).await?;
    project::begin_edit(&mut sync)?;

    let tree = sync.session().tree();
    let collection = tree.resolve(&args.collection)?;
    let item = tree
        .collection(collection)?
        .items()
        .get(args.index)
        .map(|item| item.node)
        .ok_or_else(|| anyhow!("{} has no item {}", args.collection, args.index))?;

    sync.session_mut().delete_item(collection, item).await?;

    println!(
        "  {} Removed {}.{}",
        "✓".green(),
        args.collection.bright_white(),
        args.index
    );
    project::save(&mut sync).await
}
