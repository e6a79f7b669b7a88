use super::atom::Atom;
use crate::core::utils::geometry::{center_of_geometry, center_of_mass};
use nalgebra::{Matrix3, Point3, Vector3};
use std::collections::BTreeSet;

/// A molecular structure in file order.
///
/// Atoms keep their own residue and chain labels. Residue *indices* are the 0-based
/// ordinal of each residue in file order, counting a new residue whenever the
/// chain, sequence number or insertion code changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Structure {
    atoms: Vec<Atom>,
    residue_index: Vec<usize>,
}

impl Structure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_atoms(atoms: Vec<Atom>) -> Self {
        let mut structure = Self {
            atoms,
            residue_index: Vec::new(),
        };
        structure.reindex_residues();
        structure
    }

    pub fn push(&mut self, atom: Atom) {
        let next = match (self.atoms.last(), self.residue_index.last()) {
            (Some(prev), Some(&idx)) if same_residue(prev, &atom) => idx,
            (Some(_), Some(&idx)) => idx + 1,
            _ => 0,
        };
        self.atoms.push(atom);
        self.residue_index.push(next);
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn atoms_mut(&mut self) -> &mut [Atom] {
        &mut self.atoms
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// 0-based residue ordinal of the atom at `atom_index`.
    pub fn residue_index(&self, atom_index: usize) -> Option<usize> {
        self.residue_index.get(atom_index).copied()
    }

    /// Number of distinct residues in file order.
    pub fn residue_count(&self) -> usize {
        self.residue_index.last().map_or(0, |&idx| idx + 1)
    }

    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.atoms.iter().map(|a| a.position).collect()
    }

    pub fn heavy_atom_positions(&self) -> Vec<Point3<f64>> {
        self.atoms
            .iter()
            .filter(|a| !a.is_hydrogen())
            .map(|a| a.position)
            .collect()
    }

    pub fn center_of_geometry(&self) -> Option<Point3<f64>> {
        center_of_geometry(&self.positions())
    }

    /// Centre of geometry of the non-hydrogen atoms.
    pub fn heavy_center_of_geometry(&self) -> Option<Point3<f64>> {
        center_of_geometry(&self.heavy_atom_positions())
    }

    pub fn center_of_mass(&self) -> Option<Point3<f64>> {
        let masses: Vec<f64> = self.atoms.iter().map(Atom::mass).collect();
        center_of_mass(&self.positions(), &masses)
    }

    pub fn translate(&mut self, shift: &Vector3<f64>) {
        for atom in &mut self.atoms {
            atom.position += shift;
        }
    }

    /// Applies `rotation` about the origin to every atom.
    pub fn rotate(&mut self, rotation: &Matrix3<f64>) {
        for atom in &mut self.atoms {
            atom.position = Point3::from(rotation * atom.position.coords);
        }
    }

    /// Atom positions relative to `origin`, the body-frame template used to place
    /// rigid solutes from trajectory poses.
    pub fn body_frame(&self, origin: &Point3<f64>) -> Vec<Vector3<f64>> {
        self.atoms.iter().map(|a| a.position - origin).collect()
    }

    pub fn max_res_seq(&self) -> Option<isize> {
        self.atoms.iter().map(|a| a.res_seq).max()
    }

    pub fn chain_ids(&self) -> BTreeSet<char> {
        self.atoms.iter().map(|a| a.chain_id).collect()
    }

    /// Merges `other` after `self` into a single chain.
    ///
    /// Atoms of `self` keep their residue numbers. Each residue of `other` gets a fresh
    /// number counting up from the highest residue number of `self`, so residues never
    /// collide. Serials are rewritten sequentially from 1.
    pub fn merge_single_chain(&self, other: &Structure, chain_id: char) -> Structure {
        let mut merged = Structure::new();
        for atom in &self.atoms {
            merged.push(atom.clone().with_chain(chain_id));
        }

        let mut next_seq = self.max_res_seq().unwrap_or(0);
        let mut last_index = None;
        for (i, atom) in other.atoms.iter().enumerate() {
            let idx = other.residue_index[i];
            if last_index != Some(idx) {
                next_seq += 1;
                last_index = Some(idx);
            }
            let mut moved = atom.clone().with_chain(chain_id);
            moved.res_seq = next_seq;
            moved.i_code = ' ';
            merged.push(moved);
        }

        for (serial, atom) in merged.atoms.iter_mut().enumerate() {
            atom.serial = serial + 1;
        }
        merged
    }

    /// Renames every chain of `self` whose identifier is already in `used` to the first
    /// free upper-case letter, recording each identifier it ends up using.
    ///
    /// Returns `None` when all 26 letters are taken.
    pub fn rename_conflicting_chains(&mut self, used: &mut BTreeSet<char>) -> Option<()> {
        let originals: Vec<char> = self.chain_ids().into_iter().collect();
        for chain in originals {
            let target = if used.contains(&chain) {
                let free = available_chain_id(used)?;
                used.insert(free);
                free
            } else {
                used.insert(chain);
                chain
            };
            if target != chain {
                for atom in self.atoms.iter_mut().filter(|a| a.chain_id == chain) {
                    atom.chain_id = target;
                }
            }
        }
        Some(())
    }

    fn reindex_residues(&mut self) {
        self.residue_index.clear();
        let mut current = 0usize;
        for i in 0..self.atoms.len() {
            if i > 0 && !same_residue(&self.atoms[i - 1], &self.atoms[i]) {
                current += 1;
            }
            self.residue_index.push(current);
        }
    }
}

/// First upper-case letter not present in `used`.
pub fn available_chain_id(used: &BTreeSet<char>) -> Option<char> {
    ('A'..='Z').find(|c| !used.contains(c))
}

fn same_residue(a: &Atom, b: &Atom) -> bool {
    a.chain_id == b.chain_id && a.res_seq == b.res_seq && a.i_code == b.i_code
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(name: &str, chain: char, res_seq: isize, pos: [f64; 3]) -> Atom {
        Atom::new(name, "ALA", res_seq, Point3::new(pos[0], pos[1], pos[2])).with_chain(chain)
    }

    fn two_residue_structure() -> Structure {
        Structure::from_atoms(vec![
            atom("N", 'A', 1, [0.0, 0.0, 0.0]),
            atom("CA", 'A', 1, [2.0, 0.0, 0.0]),
            atom("H", 'A', 1, [9.0, 9.0, 9.0]),
            atom("N", 'A', 2, [4.0, 0.0, 0.0]),
        ])
    }

    #[test]
    fn residue_indices_follow_file_order() {
        let s = two_residue_structure();
        assert_eq!(s.residue_index(0), Some(0));
        assert_eq!(s.residue_index(2), Some(0));
        assert_eq!(s.residue_index(3), Some(1));
        assert_eq!(s.residue_count(), 2);
        assert_eq!(s.residue_index(4), None);
    }

    #[test]
    fn push_continues_residue_numbering() {
        let mut s = two_residue_structure();
        s.push(atom("CA", 'A', 2, [5.0, 0.0, 0.0]));
        s.push(atom("N", 'B', 2, [6.0, 0.0, 0.0]));
        assert_eq!(s.residue_index(4), Some(1));
        assert_eq!(s.residue_index(5), Some(2));
    }

    #[test]
    fn heavy_center_ignores_hydrogens() {
        let s = two_residue_structure();
        let center = s.heavy_center_of_geometry().unwrap();
        assert!((center.x - 2.0).abs() < 1e-12);
        assert!(center.y.abs() < 1e-12);
    }

    #[test]
    fn translate_and_rotate_move_every_atom() {
        let mut s = two_residue_structure();
        s.translate(&Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(s.atoms()[0].position, Point3::new(1.0, 0.0, 0.0));
        let quarter_turn = Matrix3::new(0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0);
        s.rotate(&quarter_turn);
        assert!((s.atoms()[0].position.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn merge_renumbers_second_structure_residues() {
        let first = two_residue_structure();
        let second = Structure::from_atoms(vec![
            atom("C1", 'B', 7, [0.0, 0.0, 0.0]),
            atom("C2", 'B', 7, [1.0, 0.0, 0.0]),
            atom("C1", 'B', 8, [2.0, 0.0, 0.0]),
        ]);
        let merged = first.merge_single_chain(&second, 'A');
        assert_eq!(merged.len(), 7);
        let seqs: Vec<isize> = merged.atoms().iter().map(|a| a.res_seq).collect();
        assert_eq!(seqs, vec![1, 1, 1, 2, 3, 3, 4]);
        assert!(merged.atoms().iter().all(|a| a.chain_id == 'A'));
        assert_eq!(merged.atoms()[6].serial, 7);
        assert_eq!(merged.residue_count(), 4);
    }

    #[test]
    fn conflicting_chains_get_first_free_letter() {
        let mut s = Structure::from_atoms(vec![atom("N", 'A', 1, [0.0; 3])]);
        let mut used: BTreeSet<char> = ['A', 'B'].into_iter().collect();
        s.rename_conflicting_chains(&mut used).unwrap();
        assert_eq!(s.atoms()[0].chain_id, 'C');
        assert!(used.contains(&'C'));
    }

    #[test]
    fn available_chain_id_exhausts_alphabet() {
        let all: BTreeSet<char> = ('A'..='Z').collect();
        assert_eq!(available_chain_id(&all), None);
    }
}
