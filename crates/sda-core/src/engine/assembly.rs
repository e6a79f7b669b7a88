use super::error::EngineError;
use crate::core::models::structure::Structure;
use crate::core::utils::geometry::{any_pair_within, random_unit_vector};
use rand::Rng;
use tracing::trace;

/// How the two molecules of a complex are written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainLayout {
    /// Everything in one chain; the second molecule's residues are renumbered.
    Single(char),
    /// Each molecule keeps its chains; clashing chain identifiers of the second
    /// molecule are renamed to the first free upper-case letter.
    Separate,
}

/// Docks `mol2` against `mol1` along a random direction.
///
/// `mol2`'s heavy-atom centre is first placed one `step` away from `mol1`'s along a
/// random unit vector, then pushed outward in `step` increments until no heavy-atom
/// pair is closer than `clash_threshold`.
pub fn combine<R: Rng + ?Sized>(
    mol1: &Structure,
    mol2: &Structure,
    step: f64,
    clash_threshold: f64,
    layout: ChainLayout,
    rng: &mut R,
) -> Result<Structure, EngineError> {
    if step <= 0.0 {
        return Err(EngineError::InvalidInput(format!("step must be positive, got {}", step)));
    }
    let c1 = mol1
        .heavy_center_of_geometry()
        .ok_or_else(|| EngineError::InvalidInput("first molecule has no heavy atoms".into()))?;
    let c2 = mol2
        .heavy_center_of_geometry()
        .ok_or_else(|| EngineError::InvalidInput("second molecule has no heavy atoms".into()))?;

    let direction = random_unit_vector(rng);
    let increment = direction * step;
    let mut moved = mol2.clone();
    moved.translate(&(increment - c2.coords + c1.coords));

    let fixed = mol1.heavy_atom_positions();
    let mut pushes = 0usize;
    while any_pair_within(&fixed, &moved.heavy_atom_positions(), clash_threshold) {
        moved.translate(&increment);
        pushes += 1;
    }
    trace!(pushes, distance = step * (pushes + 1) as f64, "Second molecule placed");

    match layout {
        ChainLayout::Single(chain) => Ok(mol1.merge_single_chain(&moved, chain)),
        ChainLayout::Separate => {
            let mut used = mol1.chain_ids();
            moved.rename_conflicting_chains(&mut used).ok_or_else(|| {
                EngineError::InvalidInput("ran out of chain identifiers".into())
            })?;
            let mut atoms: Vec<_> = mol1.atoms().iter().chain(moved.atoms()).cloned().collect();
            for (serial, atom) in atoms.iter_mut().enumerate() {
                atom.serial = serial + 1;
            }
            Ok(Structure::from_atoms(atoms))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use nalgebra::Point3;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn blob(chain: char, res_seq: isize, center: [f64; 3]) -> Structure {
        let offsets = [[0.0, 0.0, 0.0], [1.5, 0.0, 0.0], [0.0, 1.5, 0.0], [0.0, 0.0, 1.5]];
        Structure::from_atoms(
            offsets
                .iter()
                .enumerate()
                .map(|(i, o)| {
                    Atom::new(
                        &format!("C{}", i + 1),
                        "LIG",
                        res_seq,
                        Point3::new(center[0] + o[0], center[1] + o[1], center[2] + o[2]),
                    )
                    .with_element("C")
                    .with_chain(chain)
                })
                .collect(),
        )
    }

    fn min_distance(a: &Structure, b: &Structure) -> f64 {
        let mut best = f64::INFINITY;
        for p in a.positions() {
            for q in b.positions() {
                best = best.min((p - q).norm());
            }
        }
        best
    }

    #[test]
    fn placed_molecule_does_not_clash() {
        let mol1 = blob('A', 1, [0.0; 3]);
        let mol2 = blob('A', 1, [30.0, 0.0, 0.0]);
        let mut rng = StdRng::seed_from_u64(4);
        let complex = combine(&mol1, &mol2, 1.0, 1.5, ChainLayout::Single('A'), &mut rng).unwrap();
        assert_eq!(complex.len(), 8);
        let (first, second) = complex.atoms().split_at(4);
        let first = Structure::from_atoms(first.to_vec());
        let second = Structure::from_atoms(second.to_vec());
        assert!(min_distance(&first, &second) >= 1.5);
        // It only moves outward from the first molecule, so it ends up close by.
        assert!(min_distance(&first, &second) < 1.5 + 1.0 + 1e-9);
        assert!(complex.atoms().iter().all(|a| a.chain_id == 'A'));
        assert_eq!(complex.atoms()[4].res_seq, 2);
        assert_eq!(complex.atoms()[7].serial, 8);
    }

    #[test]
    fn same_seed_gives_same_complex() {
        let mol1 = blob('A', 1, [0.0; 3]);
        let mol2 = blob('B', 5, [0.0; 3]);
        let a = combine(&mol1, &mol2, 1.0, 1.5, ChainLayout::Single('A'), &mut StdRng::seed_from_u64(9)).unwrap();
        let b = combine(&mol1, &mol2, 1.0, 1.5, ChainLayout::Single('A'), &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn separate_layout_renames_clashing_chains() {
        let mol1 = blob('A', 1, [0.0; 3]);
        let mol2 = blob('A', 1, [0.0; 3]);
        let mut rng = StdRng::seed_from_u64(1);
        let complex = combine(&mol1, &mol2, 1.0, 1.5, ChainLayout::Separate, &mut rng).unwrap();
        assert_eq!(complex.chain_ids().into_iter().collect::<Vec<_>>(), vec!['A', 'B']);
        assert_eq!(complex.atoms()[4].res_seq, 1);
        assert_eq!(complex.residue_count(), 2);
    }

    #[test]
    fn rejects_non_positive_step() {
        let mol = blob('A', 1, [0.0; 3]);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(combine(&mol, &mol, 0.0, 1.5, ChainLayout::Single('A'), &mut rng).is_err());
    }
}
