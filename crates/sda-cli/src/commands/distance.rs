use crate::cli::DistanceArgs;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use sdatools::{
    engine::{config::ReactionConfig, progress::ProgressReporter},
    workflows,
};

pub async fn run(args: DistanceArgs) -> Result<()> {
    let config = ReactionConfig {
        sda_input: args.sda_input,
        trajectory: args.trajectory,
        reaction_file: args.reaction_file,
        protein: args.protein,
        output_folder: args.output,
        bins: args.bins,
    };
    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Measuring crowder distances to the reaction atoms...");
    let result = tokio::task::block_in_place(|| workflows::distance::run(&config, &reporter))?;

    let closest = result.minima.iter().copied().fold(f64::INFINITY, f64::min);
    println!("✓ {} frames, closest approach {:.3} Å", result.minima.len(), closest);
    println!("  Table:     {}", result.table.display());
    println!("  Histogram: {}", result.histogram.display());
    Ok(())
}
