//! # SDA Tools Core Library
//!
//! Post-processing of SDA (Simulation of Diffusional Association) Brownian-dynamics
//! output: trajectory unwrapping and diffusion coefficients, encounter extraction,
//! ligand reference-frame transforms, Markov state models of ligand diffusion,
//! crowder contact statistics and construction of test complexes.
//!
//! ## Layout
//!
//! - **[`core`]: Formats and models.** Stateless structure models, readers and writers
//!   for the SDA input, trajectory and complexes files, PDB/PQR, XYZ point files, NumPy
//!   arrays and SVG figures, plus shared geometry.
//!
//! - **[`engine`]: Algorithms.** Unwrapping, MSD fitting, encounter state machine,
//!   k-means clustering, Markov state model estimation and validation, contact
//!   monitoring and complex assembly. Every algorithm works on in-memory data.
//!
//! - **[`workflows`]: Tools.** One batch procedure per command-line tool. A workflow
//!   reads its inputs, runs the engine and writes the conventional output folders, so
//!   the tools chain by folder naming exactly as the surrounding scripts expect.

pub mod core;
pub mod engine;
pub mod workflows;
