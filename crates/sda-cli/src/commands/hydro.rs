use crate::cli::HydroPlotArgs;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use sdatools::{
    engine::{config::HydroConfig, progress::ProgressReporter},
    workflows,
};

pub async fn run(args: HydroPlotArgs) -> Result<()> {
    let config = HydroConfig {
        folder: args.folder,
        max_bounded: args.max_bounded,
        d_zero: args.d_zero,
        output_prefix: args.output,
    };
    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    let result = tokio::task::block_in_place(|| workflows::hydro::run(&config, &reporter))?;
    for point in &result.series {
        println!("  {:>3} bound  {:.4e} ± {:.4e}", point.bound, point.mean, point.std);
    }
    println!("✓ Table written to: {}", result.table.display());
    println!("✓ Figure written to: {}", result.figure.display());
    Ok(())
}
