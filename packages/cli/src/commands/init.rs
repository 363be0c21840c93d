use anyhow::Result;
use bindery_editor::{to_data_string, Schema, Template};
use bindery_sync::{AppConfig, BackendSpec, DEFAULT_CONFIG_NAME};
use clap::Args;
use colored::Colorize;
use serde_json::{json, Value};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Data set identifier
    #[arg(short, long, default_value = "data")]
    pub id: String,

    /// Storage file (or `memory:<id>`, or `none`)
    #[arg(short, long, default_value = "data.json")]
    pub storage: String,

    /// Force overwrite existing config
    #[arg(short, long)]
    pub force: bool,
}

fn example_schema() -> Schema {
    Schema::scope(vec![
        Schema::primitive_with_default("title", json!("My list")),
        Schema::collection(Template::new(
            "tasks",
            Schema::scope(vec![
                Schema::primitive("text"),
                Schema::primitive_with_default("done", json!(false)),
            ]),
        )),
    ])
}

fn example_data() -> Value {
    json!({
        "title": "My list",
        "tasks": [{ "text": "Try bindery", "done": false }]
    })
}

pub fn init(args: InitArgs, cwd: &str) -> Result<()> {
    let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);

    if config_path.exists() && !args.force {
        println!(
            "{} {} already exists",
            "⚠️".yellow(),
            DEFAULT_CONFIG_NAME.bright_white()
        );
        println!("Use --force to overwrite");
        return Ok(());
    }

    println!("{}", "📝 Initializing Bindery project...".bright_blue().bold());

    let config = AppConfig {
        id: args.id,
        storage: Some(args.storage.clone()),
        ..AppConfig::default()
    };

    let schema_path = config.template_path(&PathBuf::from(cwd));
    if !schema_path.exists() || args.force {
        fs::write(&schema_path, to_data_string(&serde_json::to_value(example_schema())?)?)?;
        println!("  {} Created {}", "✓".green(), config.template);
    }

    if let BackendSpec::File(path) = config.storage_spec() {
        let data_path = PathBuf::from(cwd).join(&path);
        if !data_path.exists() {
            fs::write(&data_path, to_data_string(&example_data())?)?;
            println!("  {} Created {}", "✓".green(), path.display());
        }
    }

    fs::write(&config_path, serde_json::to_string_pretty(&config)?)?;
    println!("  {} Created {}", "✓".green(), DEFAULT_CONFIG_NAME);

    println!();
    println!("{}", "✨ Project initialized!".green().bold());
    println!();
    println!("Next steps:");
    println!("  1. Describe your data in {}", config.template.bright_white());
    println!(
        "  2. Run {} to add an item",
        "bindery add tasks text=hello".bright_white()
    );
    println!("  3. Run {} to see the data", "bindery show".bright_white());

    Ok(())
}
