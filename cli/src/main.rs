use clap::{Parser, Subcommand};

mod commands;
mod util;

use commands::admin::AdminCommands;

#[derive(Parser)]
#[command(name = "bureau", version, about = "Bureau CLI: call gateway tools from the shell")]
struct Cli {
    /// Gateway base URL
    #[arg(long, env = "BUREAU_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    /// API key (falls back to BUREAU_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway health
    Health,
    /// List the tools the gateway exposes
    Tools,
    /// Invoke a tool
    Call {
        /// Tool name (e.g. "create_task")
        tool: String,
        /// Tool parameters as a JSON object
        #[arg(long, default_value = "{}")]
        params: String,
    },
    /// Local administration
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Health => commands::health::run(&cli.api_url).await,
        Commands::Tools => commands::tools::run(&cli.api_url, cli.api_key.as_deref()).await,
        Commands::Call { tool, params } => {
            commands::call::run(&cli.api_url, cli.api_key.as_deref(), &tool, &params).await
        }
        Commands::Admin { command } => commands::admin::run(command),
    };

    std::process::exit(code);
}
