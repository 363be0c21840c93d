use crate::project;
use anyhow::{anyhow, Result};
use bindery_editor::{format_path, NodeKind};
use clap::Args;
use colored::Colorize;
use std::path::Path;

#[derive(Debug, Args)]
pub struct AddArgs {
    /// Collection to add to (`tasks`, `people.0.pets`)
    pub collection: String,

    /// Fields as `key=value`, or a single value for a list of plain values
    pub fields: Vec<String>,
}

pub async fn add(args: AddArgs, cwd: &str) -> Result<()> {
    let mut sync = project::open(Path::new(cwd)).await?;
    project::begin_edit(&mut sync)?;

    let collection = sync.session().tree().resolve(&args.collection)?;
    if sync.session().tree().collection(collection).is_err() {
        return Err(anyhow!("{} is not a collection", args.collection));
    }

    let item = sync.session_mut().add_item(collection)?;
    let item_path = format_path(&sync.session().tree().path_of(item)?);
    let is_value = matches!(
        sync.session().tree().node(item)?.kind,
        NodeKind::Primitive(_)
    );

    if is_value {
        let [value] = args.fields.as_slice() else {
            return Err(anyhow!("Expected exactly one value for {}", args.collection));
        };
        sync.set_value(&item_path, project::parse_value(value))?;
    } else {
        for field in &args.fields {
            let (key, value) = field
                .split_once('=')
                .ok_or_else(|| anyhow!("Expected key=value, got {}", field))?;
            sync.set_value(&format!("{}.{}", item_path, key), project::parse_value(value))?;
        }
    }

    println!("  {} Added {}", "✓".green(), item_path.bright_white());
    project::save(&mut sync).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{init, remove, set, InitArgs, RemoveArgs, SetArgs};
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn stored(dir: &TempDir) -> Value {
        let content = std::fs::read_to_string(dir.path().join("data.json")).unwrap();
        serde_json::from_str(&content).unwrap()
    }

    #[tokio::test]
    async fn test_add_set_remove_round_trip() {
        let dir = TempDir::new().unwrap();
        let cwd = dir.path().display().to_string();
        init(
            InitArgs {
                id: "data".to_string(),
                storage: "data.json".to_string(),
                force: false,
            },
            &cwd,
        )
        .unwrap();

        add(
            AddArgs {
                collection: "tasks".to_string(),
                fields: vec!["text=write docs".to_string()],
            },
            &cwd,
        )
        .await
        .unwrap();
        add(
            AddArgs {
                collection: "tasks".to_string(),
                fields: vec!["text=ship".to_string(), "done=true".to_string()],
            },
            &cwd,
        )
        .await
        .unwrap();

        assert_eq!(
            stored(&dir)["tasks"],
            json!([
                { "text": "Try bindery", "done": false },
                { "text": "write docs", "done": false },
                { "text": "ship", "done": true }
            ])
        );

        set(
            SetArgs {
                path: "title".to_string(),
                value: "Chores".to_string(),
            },
            &cwd,
        )
        .await
        .unwrap();
        remove(
            RemoveArgs {
                collection: "tasks".to_string(),
                index: 0,
            },
            &cwd,
        )
        .await
        .unwrap();

        assert_eq!(
            stored(&dir),
            json!({
                "title": "Chores",
                "tasks": [
                    { "text": "write docs", "done": false },
                    { "text": "ship", "done": true }
                ]
            })
        );
    }

    #[tokio::test]
    async fn test_add_rejects_malformed_field() {
        let dir = TempDir::new().unwrap();
        let cwd = dir.path().display().to_string();
        init(
            InitArgs {
                id: "data".to_string(),
                storage: "data.json".to_string(),
                force: false,
            },
            &cwd,
        )
        .unwrap();

        let err = add(
            AddArgs {
                collection: "tasks".to_string(),
                fields: vec!["oops".to_string()],
            },
            &cwd,
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("key=value"));
        assert_eq!(stored(&dir)["tasks"].as_array().map(Vec::len), Some(1));
    }
}
