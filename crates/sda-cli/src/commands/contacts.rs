use crate::cli::{ContactsArgs, ContactsCommands, ContactsMonitorArgs};
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use sdatools::{
    engine::{config::ContactsConfigBuilder, progress::ProgressReporter},
    workflows,
};
use tracing::warn;

pub async fn run(args: ContactsArgs) -> Result<()> {
    match args.command {
        ContactsCommands::Monitor(monitor) => run_monitor(monitor).await,
        ContactsCommands::Merge { folder, files_name } => {
            let result = tokio::task::block_in_place(|| workflows::contacts::merge(&folder, &files_name))?;
            if result.files_merged == 0 {
                warn!("No arrays matching '{}' in {}", files_name, folder.display());
            }
            println!(
                "✓ {} arrays merged into: {}",
                result.files_merged,
                result.output_file.display()
            );
            Ok(())
        }
    }
}

async fn run_monitor(args: ContactsMonitorArgs) -> Result<()> {
    let config = ContactsConfigBuilder::new()
        .sda_input(args.sda_input)
        .trajectory(args.trajectory)
        .molecule_pdb(args.molecule)
        .crowder_pdb(args.crowder)
        .molecule_solute(args.molecule_solute)
        .prescreen_distance(args.prescreen_distance)
        .contact_distance(args.contact_distance)
        .output_folder(args.output)
        .build()?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Monitoring contacts of solute {}...", config.molecule_solute);
    let result = tokio::task::block_in_place(|| workflows::contacts::monitor(&config, &reporter))?;

    let total: f64 = result.summary.residue_contacts.iter().sum();
    println!(
        "✓ {} residue contacts, {} bound episodes",
        total,
        result.summary.bound_times.len()
    );
    println!("  Residue contacts: {}", result.residue_contacts_file.display());
    println!("  Bound times:      {}", result.bound_times_file.display());
    Ok(())
}
