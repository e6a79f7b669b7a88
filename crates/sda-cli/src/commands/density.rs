use crate::cli::{DensityArgs, MoleculesArgs};
use crate::error::Result;
use sdatools::engine::density;

pub fn run_density(args: DensityArgs) -> Result<()> {
    let value = density::density(args.box_size, args.molecular_weight, args.num_molecules)?;
    println!("{}", value);
    Ok(())
}

pub fn run_molecules(args: MoleculesArgs) -> Result<()> {
    let value = density::molecules(args.density, args.molecular_weight, args.box_size)?;
    println!("{}", value);
    Ok(())
}
