use crate::cli::{AlignArgs, XyzArgs};
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use sdatools::{
    engine::{config::FrameConfig, progress::ProgressReporter},
    workflows,
};
use std::path::Path;

pub async fn align(args: AlignArgs, workdir: &Path) -> Result<()> {
    let config = FrameConfig {
        sda_input: args.sda_input,
        workdir: workdir.to_path_buf(),
        ligand_pdb: None,
        protein_pdb: None,
    };
    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Moving encounter files into the protein frame...");
    let result = tokio::task::block_in_place(|| workflows::align::run(&config, &reporter))?;
    println!(
        "✓ {} files written to: {}",
        result.files.len(),
        result.output_folder.display()
    );
    Ok(())
}

pub async fn xyz(args: XyzArgs, workdir: &Path) -> Result<()> {
    let config = FrameConfig {
        sda_input: args.sda_input,
        workdir: workdir.to_path_buf(),
        ligand_pdb: Some(args.ligand_pdb),
        protein_pdb: Some(args.protein_pdb),
    };
    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Tracking the ligand centre in the protein frame...");
    let result = tokio::task::block_in_place(|| workflows::xyz::run(&config, &reporter))?;
    let points: usize = result.frames.iter().sum();
    println!(
        "✓ {} points from {} files written to: {}",
        points,
        result.frames.len(),
        result.xyz_folder.display()
    );
    println!("  VMD structures written to: {}", result.vmd_folder.display());
    Ok(())
}
