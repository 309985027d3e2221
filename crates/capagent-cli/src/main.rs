//! CLI entry point.

use clap::Parser;

use capagent_cli::{Cli, Commands, init_logging, load_config, run_speak};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Speak(args) => {
            let config = load_config(cli.config.as_deref(), args.error_policy)?;
            let summary = run_speak(config, &args).await?;
            summary.print();
            if let Some(state) = &summary.final_state {
                tracing::info!(%state, "Final SpeechState");
            }
        }
        Commands::Config { error_policy } => {
            let config = load_config(cli.config.as_deref(), error_policy)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }
    Ok(())
}
