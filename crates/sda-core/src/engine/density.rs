//! Conversions between crowder counts and mass densities in a cubic box.

use super::error::EngineError;

pub const GRAMS_PER_DALTON: f64 = 1.66053906660e-24;
pub const CUBIC_ANGSTROMS_PER_LITER: f64 = 1e27;

fn box_volume_liters(box_size: f64) -> f64 {
    box_size.powi(3) / CUBIC_ANGSTROMS_PER_LITER
}

fn check(box_size: f64, molecular_weight: f64) -> Result<(), EngineError> {
    if box_size.is_nan() || box_size <= 0.0 {
        return Err(EngineError::InvalidInput(format!(
            "box size must be positive, got {}",
            box_size
        )));
    }
    if molecular_weight.is_nan() || molecular_weight <= 0.0 {
        return Err(EngineError::InvalidInput(format!(
            "molecular weight must be positive, got {}",
            molecular_weight
        )));
    }
    Ok(())
}

/// Density in g/L of `molecules` copies of a `molecular_weight` Da molecule in a cube of
/// side `box_size` Å.
pub fn density(box_size: f64, molecular_weight: f64, molecules: u64) -> Result<f64, EngineError> {
    check(box_size, molecular_weight)?;
    Ok(molecules as f64 * molecular_weight * GRAMS_PER_DALTON / box_volume_liters(box_size))
}

/// Number of molecules (not rounded) that gives `density` g/L in the cube.
pub fn molecules(density: f64, molecular_weight: f64, box_size: f64) -> Result<f64, EngineError> {
    check(box_size, molecular_weight)?;
    Ok(density * box_volume_liters(box_size) / (molecular_weight * GRAMS_PER_DALTON))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn density_and_molecules_are_inverse() {
        let d = density(300.0, 66_500.0, 100).unwrap();
        assert!((d - 408.98).abs() < 0.01, "{}", d);
        let n = molecules(d, 66_500.0, 300.0).unwrap();
        assert!((n - 100.0).abs() < 1e-9);
    }

    #[test]
    fn empty_box_has_zero_density() {
        assert_eq!(density(100.0, 1000.0, 0).unwrap(), 0.0);
    }

    #[test]
    fn non_positive_inputs_are_rejected() {
        assert!(matches!(density(0.0, 1.0, 1), Err(EngineError::InvalidInput(_))));
        assert!(matches!(molecules(1.0, -5.0, 10.0), Err(EngineError::InvalidInput(_))));
        assert!(density(f64::NAN, 1.0, 1).is_err());
    }
}
