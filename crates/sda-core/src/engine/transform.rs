use super::config::RotationSpec;
use super::error::EngineError;
use crate::core::models::structure::Structure;
use crate::core::utils::geometry::rotation_from_euler_xyz_degrees;
use nalgebra::{Matrix3, Vector3};

impl RotationSpec {
    pub fn matrix(&self) -> Option<Matrix3<f64>> {
        match self {
            RotationSpec::None => None,
            RotationSpec::Matrix(m) => Some(*m),
            RotationSpec::EulerXyzDegrees(angles) => {
                Some(*rotation_from_euler_xyz_degrees(angles.x, angles.y, angles.z).matrix())
            }
        }
    }
}

/// Moves the mass-weighted centre to the origin, applies the rotation about it and
/// translates the structure so its centre of mass lands on `target_com`.
pub fn apply_transform(
    structure: &mut Structure,
    target_com: &Vector3<f64>,
    rotation: &RotationSpec,
) -> Result<(), EngineError> {
    let com = structure
        .center_of_mass()
        .ok_or_else(|| EngineError::InvalidInput("structure has no atoms".into()))?;
    structure.translate(&-com.coords);
    if let Some(m) = rotation.matrix() {
        structure.rotate(&m);
    }
    structure.translate(target_com);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use nalgebra::Point3;

    fn dumbbell() -> Structure {
        Structure::from_atoms(vec![
            Atom::new("C1", "MOL", 1, Point3::new(1.0, 1.0, 1.0)).with_element("C"),
            Atom::new("O1", "MOL", 1, Point3::new(3.0, 1.0, 1.0)).with_element("O"),
        ])
    }

    #[test]
    fn lands_on_target_centre_of_mass() {
        let mut s = dumbbell();
        let target = Vector3::new(10.0, -5.0, 2.0);
        apply_transform(&mut s, &target, &RotationSpec::None).unwrap();
        let com = s.center_of_mass().unwrap();
        assert!((com.coords - target).norm() < 1e-9);
        // Spacing is preserved.
        assert!(((s.atoms()[1].position - s.atoms()[0].position).norm() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn euler_rotation_about_z() {
        let mut s = dumbbell();
        let spec = RotationSpec::EulerXyzDegrees(Vector3::new(0.0, 0.0, 90.0));
        apply_transform(&mut s, &Vector3::zeros(), &spec).unwrap();
        let bond = s.atoms()[1].position - s.atoms()[0].position;
        assert!((bond - Vector3::new(0.0, 2.0, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn explicit_matrix_is_used_as_given() {
        let mut s = dumbbell();
        let flip = Matrix3::new(-1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0);
        apply_transform(&mut s, &Vector3::zeros(), &RotationSpec::Matrix(flip)).unwrap();
        assert!(s.atoms()[1].position.x < s.atoms()[0].position.x);
    }

    #[test]
    fn empty_structure_is_rejected() {
        let mut s = Structure::new();
        assert!(apply_transform(&mut s, &Vector3::zeros(), &RotationSpec::None).is_err());
    }
}
