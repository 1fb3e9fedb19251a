use clap::{Parser, Subcommand};
use tasktally_core::{Config, OpContext};

mod commands;

#[derive(Parser)]
#[command(name = "tasktally", version, about = "Points-based task tracker")]
struct Cli {
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Per-operation timeout in milliseconds (0 disables; default from config)
    #[arg(long, global = true, value_name = "MS")]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Task management
    Task {
        #[command(subcommand)]
        action: commands::task::TaskAction,
    },
    /// Record a completion of a task
    Complete {
        /// Task ID
        task_id: i64,
    },
    /// Completion history
    History {
        #[command(subcommand)]
        action: commands::history::HistoryAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Database inspection
    Db {
        #[command(subcommand)]
        action: commands::db::DbAction,
    },
}

fn log_filter(config_filter: Option<&str>) -> tracing_subscriber::EnvFilter {
    let level = std::env::var("RUST_LOG")
        .ok()
        .or_else(|| config_filter.map(str::to_string))
        .unwrap_or_else(|| "warn".to_string());

    tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
}

async fn run(cli: Cli, root: OpContext) -> Result<(), Box<dyn std::error::Error>> {
    let opts = commands::GlobalOpts {
        json: cli.json,
        timeout_ms: cli.timeout_ms,
    };

    match cli.command {
        Commands::Config { action } => commands::config::run(action, &opts),
        Commands::Task { action } => {
            let session = commands::Session::open(&opts, root)?;
            commands::task::run(action, &session).await
        }
        Commands::Complete { task_id } => {
            let session = commands::Session::open(&opts, root)?;
            commands::history::complete(task_id, &session).await
        }
        Commands::History { action } => {
            let session = commands::Session::open(&opts, root)?;
            commands::history::run(action, &session).await
        }
        Commands::Db { action } => {
            let session = commands::Session::open(&opts, root)?;
            commands::db::run(action, &session)
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = Config::load();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(
            config.as_ref().ok().map(|c| c.logging.filter.as_str()),
        ))
        .with_writer(std::io::stderr)
        .init();

    let root = OpContext::background();
    let interrupt = root.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling");
            interrupt.cancel();
        }
    });

    if let Err(e) = run(cli, root).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
