mod app;
mod change;
mod config;
mod git;
mod monitor;
mod tree;
mod ui;
mod workspace;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use workspace::{DiffRange, WorkspaceManager};

#[derive(Parser, Debug)]
#[command(name = "changeview")]
#[command(about = "Browse git changes as a directory tree", long_about = None)]
struct Args {
    /// Repository (or any directory inside it) to open
    #[arg(value_name = "DIR")]
    directory: Option<PathBuf>,

    /// Config file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Left side of the comparison: "head", "workspace" or any revision
    #[arg(short, long, env = "CHANGEVIEW_LEFT")]
    left: Option<String>,

    /// Right side of the comparison: "head", "workspace" or any revision
    #[arg(short, long, env = "CHANGEVIEW_RIGHT")]
    right: Option<String>,

    /// Print the change tree and exit instead of opening the interface
    #[arg(short, long)]
    print: bool,

    /// With --print, emit the tree as JSON
    #[arg(long, requires = "print")]
    json: bool,

    /// Write the effective configuration (to --config or the user config) and exit
    #[arg(long)]
    save_config: bool,
}

fn init_logging(args: &Args, config: &config::AppConfig) -> Result<()> {
    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };

    if args.print || args.save_config {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return Ok(());
    }

    // The interface owns the terminal, so interactive logs go to a file.
    let log_path = config.general.log_path();
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("cannot open log file {}", log_path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Arc::new(log_file))
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = config::load_config(args.config.clone())?;
    init_logging(&args, &config)?;

    if let Some(ref left) = args.left {
        config.git.default_left = left.clone();
    }
    if let Some(ref right) = args.right {
        config.git.default_right = right.clone();
    }

    if args.save_config {
        let path = config::save_config(&config, args.config.clone())?;
        println!("Configuration written to {}", path.display());
        return Ok(());
    }

    // Determine project directory
    let project_dir = args
        .directory
        .clone()
        .or_else(|| config.general.project_dir.clone())
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let workspace = WorkspaceManager::new(project_dir, &config.git)?;

    if args.print {
        return print_tree(workspace, args.json).await;
    }

    let mut app = app::ChangeApp::new(config, workspace)?;
    app.run().await?;

    Ok(())
}

async fn print_tree(mut workspace: WorkspaceManager, json: bool) -> Result<()> {
    if !workspace.is_git_repo() {
        anyhow::bail!("{} is not inside a git repository", workspace.project_dir().display());
    }
    workspace.refresh().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(workspace.tree())?);
    } else {
        let range: &DiffRange = workspace.range();
        println!("{} ({} changes)", range, workspace.changes().len());
        print!("{}", tree::render_text(workspace.tree()));
    }

    Ok(())
}
