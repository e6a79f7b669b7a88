//! # Structure Models
//!
//! A structure is a flat, file-ordered list of atoms. Residue and chain membership
//! is carried on each atom, which is all the post-processing tools need: centres,
//! rigid-body moves, residue lookups for contact counting and renumbering when two
//! molecules are merged.
//!
//! - [`atom`] - Atom records and element data
//! - [`structure`] - Whole structures with centre, transform and merge operations

pub mod atom;
pub mod structure;
