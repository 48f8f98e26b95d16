use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "remindly-cli", version, about = "Remindly CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the reminder engine until interrupted
    Run(commands::run::RunArgs),
    /// Add a reminder
    Add(commands::add::AddArgs),
    /// List reminders
    List {
        /// Show finished reminders instead of upcoming ones
        #[arg(long)]
        past: bool,
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a reminder
    Remove {
        /// Reminder number, as shown by `list`
        id: u32,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run(args) => commands::run::run(args),
        Commands::Add(args) => commands::add::run(args),
        Commands::List { past, json } => commands::list::run(past, json),
        Commands::Remove { id } => commands::remove::run(id),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
