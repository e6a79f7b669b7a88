//! # Core Module
//!
//! Data models, file formats and geometry shared by every tool.
//!
//! - **Structures** ([`models`]) - Atoms and whole structures read from PDB/PQR files
//! - **File I/O** ([`io`]) - SDA input, trajectory and complexes files, structures,
//!   point files, NumPy arrays and figures
//! - **Geometry** ([`utils`]) - Periodic boundaries, rotation bases and centres

pub mod io;
pub mod models;
pub mod utils;
