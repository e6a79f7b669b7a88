use crate::cli::DiffusionArgs;
use crate::config::PartialToolConfig;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use sdatools::{engine::progress::ProgressReporter, workflows};
use tracing::{info, warn};

pub async fn run(args: DiffusionArgs) -> Result<()> {
    let partial_config = PartialToolConfig::load(args.config.as_deref())?;
    info!("Merging configuration from file and CLI arguments...");
    let final_config = partial_config.diffusion_config(&args)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Fitting diffusion coefficients under {}...", final_config.root.display());
    let result = tokio::task::block_in_place(|| workflows::diffusion::run(&final_config, &reporter))?;

    if result.coefficients.is_empty() {
        warn!("No assoc_<N>gL folders with trajectories were found.");
        println!("Warning: no densities to report.");
        return Ok(());
    }

    for point in &result.coefficients {
        println!(
            "  {:>6} g/L  D = {:.6e}  ({} trajectories)",
            point.density, point.coefficient, point.trajectories
        );
    }
    println!("✓ Table written to: {}", result.output_file.display());
    println!("✓ Figure written to: {}", result.figure.display());
    Ok(())
}
