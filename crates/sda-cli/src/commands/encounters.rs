use crate::cli::{EncountersArgs, EncountersCommands};
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use sdatools::{
    engine::{config::EncounterConfig, progress::ProgressReporter},
    workflows,
};
use std::path::Path;
use tracing::info;

pub async fn run(args: EncountersArgs, workdir: &Path) -> Result<()> {
    match args.command {
        EncountersCommands::Extract {
            sda_input,
            protein_pdb,
            ligand_pdb,
            cutoff,
        } => {
            let config = EncounterConfig {
                sda_input,
                protein_pdb,
                ligand_pdb,
                cutoff,
                workdir: workdir.to_path_buf(),
            };
            let progress_handler = CliProgressHandler::new();
            let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

            println!("Extracting encounter trajectories...");
            let result = tokio::task::block_in_place(|| workflows::encounters::run(&config, &reporter))?;
            println!(
                "✓ {} of {} encountered trajectories written to: {}",
                result.files.len(),
                result.encounters_found,
                result.output_folder.display()
            );
        }
        EncountersCommands::Select {
            total_solutes,
            strip,
            files,
        } => {
            info!("Inspecting {} complexes files", files.len());
            let selected = tokio::task::block_in_place(|| workflows::encounters::select(&files, total_solutes, &strip))?;
            println!("{}", selected.join(" "));
        }
    }
    Ok(())
}
