use crate::cli::AssembleArgs;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use sdatools::{
    engine::{config::AssemblyConfigBuilder, progress::ProgressReporter},
    workflows,
};

pub async fn run(args: AssembleArgs) -> Result<()> {
    let mut builder = AssemblyConfigBuilder::new()
        .first_molecule(args.first_molecule)
        .second_molecule(args.second_molecule)
        .max_bounded(args.max_bounded)
        .num_replica(args.num_replica)
        .seed(args.seed)
        .keep_chains(args.keep_chains)
        .output_root(args.output);
    if let Some(step) = args.step {
        builder = builder.step(step);
    }
    if let Some(threshold) = args.clash_threshold {
        builder = builder.clash_threshold(threshold);
    }
    let config = builder.build()?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Assembling complexes with up to {} bound molecules...", config.max_bounded);
    let result = tokio::task::block_in_place(|| workflows::assemble::run(&config, &reporter))?;

    for (folder, count) in &result.folders {
        println!("  {} complexes in {}", count, folder.display());
    }
    println!("✓ Assembly complete.");
    Ok(())
}
