use clap::{Parser, Subcommand};

mod commands;
mod logging;

#[derive(Parser)]
#[command(name = "paycoffee", version, about = "PayCoffee donation session CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a donation page session
    Session {
        #[command(subcommand)]
        action: commands::session::SessionAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Fetch the supporter feed once
    Feed {
        /// Print the feed state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Countdown utilities
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
}

fn main() {
    logging::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Session { action } => commands::session::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Feed { json } => commands::feed::run(json),
        Commands::Timer { action } => commands::timer::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
