mod cli;
mod commands;
mod config;
mod error;
mod logging;
mod utils;

use crate::cli::{Cli, Commands};
use crate::error::{CliError, Result};
use clap::Parser;
use sdatools::engine::error::EngineError;
use tracing::{debug, error, info};

const DISCONNECTED_STATES_MESSAGE: &str = "ERROR:
     Set allow_disconnected=False but found disconnected states
     Decrease number of cluster (Suggested)
     Set allow_disconnected=True (Not suggested)";

#[tokio::main]
async fn main() {
    if let Err(e) = run_app().await {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        match &e {
            CliError::SdaCore(EngineError::DisconnectedStates { .. }) => {
                eprintln!("{}", DISCONNECTED_STATES_MESSAGE);
            }
            _ => eprintln!("\n❌ Error: {}", e),
        }
        std::process::exit(e.exit_code());
    }
}

async fn run_app() -> Result<()> {
    let cli = Cli::parse();
    logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.as_deref())?;

    let (panic_hook, eyre_hook) = color_eyre::config::HookBuilder::default().into_hooks();
    eyre_hook.install().map_err(|e| CliError::Other(e.into()))?;
    std::panic::set_hook(Box::new(move |pi| {
        error!("{}", panic_hook.panic_report(pi));
    }));

    info!("sdatools v{} starting up.", env!("CARGO_PKG_VERSION"));
    debug!("Full CLI arguments parsed: {:?}", &cli);

    if let Some(num_threads) = cli.threads {
        info!("Setting Rayon global thread pool to {} threads.", num_threads);
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
            .map_err(|e| CliError::Other(anyhow::anyhow!("Failed to build global thread pool: {}", e)))?;
    }

    let workdir = cli.workdir;
    let command_result = match cli.command {
        Commands::Diffusion(args) => {
            info!("Dispatching to 'diffusion' command.");
            commands::diffusion::run(args).await
        }
        Commands::Encounters(args) => {
            info!("Dispatching to 'encounters' command.");
            commands::encounters::run(args, &workdir).await
        }
        Commands::Align(args) => {
            info!("Dispatching to 'align' command.");
            commands::frames::align(args, &workdir).await
        }
        Commands::Xyz(args) => {
            info!("Dispatching to 'xyz' command.");
            commands::frames::xyz(args, &workdir).await
        }
        Commands::Msm(args) => {
            info!("Dispatching to 'msm' command.");
            commands::msm::run(args).await
        }
        Commands::Contacts(args) => {
            info!("Dispatching to 'contacts' command.");
            commands::contacts::run(args).await
        }
        Commands::Distance(args) => {
            info!("Dispatching to 'distance' command.");
            commands::distance::run(args).await
        }
        Commands::Assemble(args) => {
            info!("Dispatching to 'assemble' command.");
            commands::assemble::run(args).await
        }
        Commands::HydroPlot(args) => {
            info!("Dispatching to 'hydro-plot' command.");
            commands::hydro::run(args).await
        }
        Commands::Transform(args) => {
            info!("Dispatching to 'transform' command.");
            commands::transform::run(args).await
        }
        Commands::Density(args) => commands::density::run_density(args),
        Commands::Molecules(args) => commands::density::run_molecules(args),
    };

    match &command_result {
        Ok(()) => info!("Command completed successfully."),
        Err(e) => error!("Command failed: {}", e),
    }
    command_result
}
