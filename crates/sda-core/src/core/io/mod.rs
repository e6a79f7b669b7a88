//! Readers and writers for the file formats produced and consumed by SDA runs.
//!
//! Structure formats share the [`traits::StructureFile`] interface. The SDA-specific
//! text formats ([`sda_input`], [`trajectory`], [`complexes`]) are line oriented and
//! keep raw lines around wherever a tool rewrites them in place.

pub mod complexes;
pub mod figures;
pub mod npy;
pub mod pdb;
pub mod pqr;
pub mod sda_input;
pub mod table;
pub mod traits;
pub mod trajectory;
pub mod xyz;

use crate::core::models::structure::Structure;
use std::path::Path;
use thiserror::Error;
use traits::StructureFile;

#[derive(Debug, Error)]
pub enum StructureReadError {
    #[error(transparent)]
    Pdb(#[from] pdb::PdbError),
    #[error(transparent)]
    Pqr(#[from] pqr::PqrError),
}

/// Reads a PDB or PQR structure, chosen by the `.pqr` extension.
pub fn read_structure<P: AsRef<Path>>(path: P) -> Result<Structure, StructureReadError> {
    let path = path.as_ref();
    let is_pqr = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pqr"));
    if is_pqr {
        Ok(pqr::PqrFile::read_from_path(path)?)
    } else {
        Ok(pdb::PdbFile::read_from_path(path)?)
    }
}
