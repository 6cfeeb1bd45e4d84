mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    board::BoardSubcommand, config::ConfigSubcommand, gate::GateSubcommand,
    stage::StageSubcommand, sync::SyncArgs,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "dealsync",
    about = "Sync Pipedrive deals to a Notion opportunity board, enforcing stage readiness gates",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .dealsync/ or .git/)
    #[arg(long, global = true, env = "DEALSYNC_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .dealsync/config.yaml and the reports directory
    Init,

    /// Reconcile CRM deals into the board (dry run unless --apply)
    Sync(SyncArgs),

    /// Inspect the stage order and the CRM label mapping
    Stage {
        #[command(subcommand)]
        subcommand: StageSubcommand,
    },

    /// Evaluate readiness gates offline
    Gate {
        #[command(subcommand)]
        subcommand: GateSubcommand,
    },

    /// Show or validate the config
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Manage the Notion board itself
    Board {
        #[command(subcommand)]
        subcommand: BoardSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Sync(_) | Commands::Board { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Sync(args) => cmd::sync::run(&root, args, cli.json),
        Commands::Stage { subcommand } => cmd::stage::run(&root, subcommand, cli.json),
        Commands::Gate { subcommand } => cmd::gate::run(&root, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
        Commands::Board { subcommand } => cmd::board::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
