use nalgebra::Point3;
use std::str::FromStr;

/// Distinguishes standard residue records from hetero groups in PDB output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RecordKind {
    #[default]
    Atom,
    Hetatm,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Atom => "ATOM",
            RecordKind::Hetatm => "HETATM",
        }
    }
}

impl FromStr for RecordKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ATOM" => Ok(RecordKind::Atom),
            "HETATM" => Ok(RecordKind::Hetatm),
            _ => Err(()),
        }
    }
}

/// Represents a single atom record of a structure file.
///
/// Residue and chain membership are stored on the atom itself; the owning
/// [`Structure`](super::structure::Structure) derives residue indices from the
/// order in which these labels change.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Record type used when the atom is written back to PDB.
    pub record: RecordKind,
    /// Serial number as read from the file.
    pub serial: usize,
    /// Atom name (e.g. "CA", "CL").
    pub name: String,
    /// Residue name (e.g. "ALA", "BEN").
    pub res_name: String,
    /// Single-character chain identifier.
    pub chain_id: char,
    /// Residue sequence number.
    pub res_seq: isize,
    /// Insertion code, `' '` when absent.
    pub i_code: char,
    /// Cartesian position in Angstroms.
    pub position: Point3<f64>,
    /// Occupancy column.
    pub occupancy: f64,
    /// Temperature factor column.
    pub b_factor: f64,
    /// Element symbol, upper-case (e.g. "C", "CL").
    pub element: String,
    /// Partial charge, only populated by PQR input.
    pub charge: f64,
    /// Atomic radius, only populated by PQR input.
    pub radius: f64,
}

impl Atom {
    /// Creates a new `Atom` with default bookkeeping fields.
    ///
    /// The element is inferred from the atom name; use [`Atom::with_element`] to
    /// override it when the file provides an explicit element column.
    pub fn new(name: &str, res_name: &str, res_seq: isize, position: Point3<f64>) -> Self {
        Self {
            record: RecordKind::Atom,
            serial: 0,
            name: name.to_string(),
            res_name: res_name.to_string(),
            chain_id: 'A',
            res_seq,
            i_code: ' ',
            position,
            occupancy: 1.0,
            b_factor: 0.0,
            element: infer_element(name),
            charge: 0.0,
            radius: 0.0,
        }
    }

    pub fn with_element(mut self, element: &str) -> Self {
        if !element.trim().is_empty() {
            self.element = element.trim().to_ascii_uppercase();
        }
        self
    }

    pub fn with_chain(mut self, chain_id: char) -> Self {
        self.chain_id = chain_id;
        self
    }

    pub fn is_hydrogen(&self) -> bool {
        self.element == "H" || self.element == "D"
    }

    /// Atomic mass in Daltons, 1.0 for elements missing from the table.
    pub fn mass(&self) -> f64 {
        element_mass(&self.element).unwrap_or(1.0)
    }
}

/// Infers an element symbol from a PDB atom name.
///
/// Leading digits are skipped (e.g. "1HB" is a hydrogen). Only the halogens CL and
/// BR are read as two-letter elements; "CA" stays an alpha carbon.
pub fn infer_element(name: &str) -> String {
    let upper: String = name
        .trim()
        .chars()
        .skip_while(|c| c.is_ascii_digit())
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();
    if upper.starts_with("CL") || upper.starts_with("BR") {
        return upper[..2].to_string();
    }
    upper.chars().next().map(|c| c.to_string()).unwrap_or_default()
}

/// Standard atomic weights for the elements found in SDA structure files.
pub fn element_mass(element: &str) -> Option<f64> {
    let mass = match element {
        "H" => 1.008,
        "D" => 2.014,
        "C" => 12.011,
        "N" => 14.007,
        "O" => 15.999,
        "F" => 18.998,
        "NA" => 22.990,
        "MG" => 24.305,
        "P" => 30.974,
        "S" => 32.06,
        "CL" => 35.45,
        "K" => 39.098,
        "CA" => 40.078,
        "MN" => 54.938,
        "FE" => 55.845,
        "CU" => 63.546,
        "ZN" => 65.38,
        "SE" => 78.971,
        "BR" => 79.904,
        "I" => 126.904,
        _ => return None,
    };
    Some(mass)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_atom_infers_element_from_name() {
        let atom = Atom::new("CA", "ALA", 1, Point3::new(1.0, 2.0, 3.0));
        assert_eq!(atom.element, "C");
        assert_eq!(atom.chain_id, 'A');
        assert_eq!(atom.occupancy, 1.0);
    }

    #[test]
    fn explicit_element_overrides_inference() {
        let atom = Atom::new("CA", "CA", 1, Point3::origin()).with_element("ca");
        assert_eq!(atom.element, "CA");
        assert!((atom.mass() - 40.078).abs() < 1e-9);
    }

    #[test]
    fn infer_element_handles_numeric_prefixes_and_halogens() {
        assert_eq!(infer_element("1HB"), "H");
        assert_eq!(infer_element("CL"), "CL");
        assert_eq!(infer_element("CL1"), "CL");
        assert_eq!(infer_element("OXT"), "O");
        assert_eq!(infer_element(""), "");
    }

    #[test]
    fn hydrogen_detection_uses_element() {
        let h = Atom::new("HN", "ALA", 1, Point3::origin());
        let n = Atom::new("N", "ALA", 1, Point3::origin());
        assert!(h.is_hydrogen());
        assert!(!n.is_hydrogen());
    }

    #[test]
    fn unknown_element_mass_falls_back_to_unity() {
        let atom = Atom::new("X", "UNK", 1, Point3::origin());
        assert_eq!(atom.mass(), 1.0);
    }

    #[test]
    fn record_kind_parses_and_prints() {
        assert_eq!("HETATM".parse::<RecordKind>(), Ok(RecordKind::Hetatm));
        assert_eq!(RecordKind::Atom.as_str(), "ATOM");
        assert!("REMARK".parse::<RecordKind>().is_err());
    }
}
