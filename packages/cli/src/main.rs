mod commands;
mod project;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{add, init, remove, set, show, AddArgs, InitArgs, RemoveArgs, SetArgs, ShowArgs};
use tracing_subscriber::EnvFilter;

/// Bindery CLI - edit structured data bound to a template
#[derive(Parser, Debug)]
#[command(name = "bindery")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log sync activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize a new Bindery project
    Init(InitArgs),

    /// Print the current data
    Show(ShowArgs),

    /// Add an item to a collection and save
    Add(AddArgs),

    /// Delete an item from a collection and save
    Remove(RemoveArgs),

    /// Set a value and save
    Set(SetArgs),
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cwd = match std::env::current_dir() {
        Ok(dir) => dir.display().to_string(),
        Err(err) => {
            eprintln!("{} Cannot get current directory: {}", "Error:".red().bold(), err);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Command::Init(args) => init(args, &cwd),
        Command::Show(args) => show(args, &cwd).await,
        Command::Add(args) => add(args, &cwd).await,
        Command::Remove(args) => remove(args, &cwd).await,
        Command::Set(args) => set(args, &cwd).await,
    };

    if let Err(err) = result {
        eprintln!();
        eprintln!("{} {}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
