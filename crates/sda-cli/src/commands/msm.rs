use crate::cli::{MsmArgs, MsmBuildArgs, MsmCommands, MsmValidateArgs};
use crate::config::PartialToolConfig;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use sdatools::{engine::progress::ProgressReporter, workflows};
use tracing::info;

pub async fn run(args: MsmArgs) -> Result<()> {
    match args.command {
        MsmCommands::Build(build) => run_build(build).await,
        MsmCommands::Validate(validate) => run_validate(validate).await,
    }
}

async fn run_build(args: MsmBuildArgs) -> Result<()> {
    let partial_config = PartialToolConfig::load(args.config.as_deref())?;
    info!("Merging configuration from file and CLI arguments...");
    let final_config = partial_config.msm_config(&args)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Building a Markov state model with {} clusters at lag {}...",
        final_config.clustering.num_clusters, final_config.lagtime
    );
    let result = tokio::task::block_in_place(|| workflows::msm::run(&final_config, &reporter))?;

    println!(
        "✓ {} states from {} trajectories ({} frames), reversible: {}",
        result.model.n_states(),
        result.trajectories,
        result.frames,
        result.model.is_reversible()
    );
    println!("  Model outputs written to: {}", result.output_folder.display());
    Ok(())
}

async fn run_validate(args: MsmValidateArgs) -> Result<()> {
    let partial_config = PartialToolConfig::load(args.config.as_deref())?;
    info!("Merging configuration from file and CLI arguments...");
    let final_config = partial_config.validation_config(&args)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Validating over runs {:?} with lag times {:?}...",
        final_config.encounter_runs, final_config.lagtimes
    );
    let result = tokio::task::block_in_place(|| workflows::validate::run(&final_config, &reporter))?;

    println!(
        "✓ WCSS for {} cluster counts, timescales at {} lag times, {} Chapman-Kolmogorov sets",
        result.wcss.len(),
        result.timescales.len(),
        result.ck_sets.len()
    );
    println!("  Figures written to: {}", result.output_folder.display());
    Ok(())
}
