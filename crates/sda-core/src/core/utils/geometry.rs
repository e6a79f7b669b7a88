use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::{Matrix3, Point3, Rotation3, Vector3};
use rand::Rng;
use std::f64::consts::PI;

/// Axis-aligned simulation box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxBounds {
    pub min: Vector3<f64>,
    pub max: Vector3<f64>,
}

impl BoxBounds {
    pub fn new(min: Vector3<f64>, max: Vector3<f64>) -> Self {
        Self { min, max }
    }

    /// A cube spanning `[0, length]` on every axis.
    pub fn cubic(length: f64) -> Self {
        Self {
            min: Vector3::zeros(),
            max: Vector3::repeat(length),
        }
    }

    pub fn lengths(&self) -> Vector3<f64> {
        self.max - self.min
    }
}

/// Mean position of a point set, `None` when empty.
pub fn center_of_geometry(points: &[Point3<f64>]) -> Option<Point3<f64>> {
    if points.is_empty() {
        return None;
    }
    let sum = points
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords);
    Some(Point3::from(sum / points.len() as f64))
}

/// Mass-weighted mean position, `None` when empty or when the total mass is zero.
pub fn center_of_mass(points: &[Point3<f64>], masses: &[f64]) -> Option<Point3<f64>> {
    if points.is_empty() || points.len() != masses.len() {
        return None;
    }
    let total: f64 = masses.iter().sum();
    if total == 0.0 {
        return None;
    }
    let sum = points
        .iter()
        .zip(masses)
        .fold(Vector3::zeros(), |acc, (p, m)| acc + p.coords * *m);
    Some(Point3::from(sum / total))
}

/// Minimum-image convention for a displacement in a cubic box of side `length`.
pub fn minimum_image(delta: &Vector3<f64>, length: f64) -> Vector3<f64> {
    delta.map(|d| d - length * (d / length).round())
}

/// Distance between two points under periodic boundaries.
pub fn pbc_distance(a: &Point3<f64>, b: &Point3<f64>, length: f64) -> f64 {
    minimum_image(&(a - b), length).norm()
}

/// Rebuilds the body-to-lab rotation from the two basis vectors stored in SDA files.
///
/// The third basis vector is `r1 x r2`. The file stores the matrix column-major, so the
/// three vectors are the columns of the returned rotation.
pub fn rotation_from_basis(r1: &Vector3<f64>, r2: &Vector3<f64>) -> Matrix3<f64> {
    let r3 = r1.cross(r2);
    Matrix3::from_columns(&[*r1, *r2, r3])
}

/// Uniformly distributed direction on the unit sphere.
pub fn random_unit_vector<R: Rng + ?Sized>(rng: &mut R) -> Vector3<f64> {
    let phi = rng.gen_range(0.0..2.0 * PI);
    let cos_theta: f64 = rng.gen_range(-1.0..=1.0);
    let theta = cos_theta.acos();
    Vector3::new(
        theta.sin() * phi.cos(),
        theta.sin() * phi.sin(),
        theta.cos(),
    )
}

/// Extrinsic x-y-z rotation from angles in degrees (roll about x, then pitch about y,
/// then yaw about z, all in the fixed frame).
pub fn rotation_from_euler_xyz_degrees(roll: f64, pitch: f64, yaw: f64) -> Rotation3<f64> {
    Rotation3::from_euler_angles(roll.to_radians(), pitch.to_radians(), yaw.to_radians())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairDistance {
    pub distance: f64,
    pub index_a: usize,
    pub index_b: usize,
}

/// Shortest distance between any point of `a` and any point of `b`.
///
/// Builds a k-d tree over `b` and queries every point of `a`; ties keep the first
/// point of `a`. Returns `None` when either set is empty.
pub fn min_pair_distance(a: &[Point3<f64>], b: &[Point3<f64>]) -> Option<PairDistance> {
    if a.is_empty() || b.is_empty() {
        return None;
    }
    let tree = build_tree(b);
    let mut best: Option<PairDistance> = None;
    for (i, p) in a.iter().enumerate() {
        let nearest = tree.nearest_one::<SquaredEuclidean>(&[p.x, p.y, p.z]);
        if best.is_none_or(|current| nearest.distance < current.distance * current.distance) {
            best = Some(PairDistance {
                distance: nearest.distance.sqrt(),
                index_a: i,
                index_b: nearest.item as usize,
            });
        }
    }
    best
}

/// True when any point of `a` lies closer than `threshold` to any point of `b`.
pub fn any_pair_within(a: &[Point3<f64>], b: &[Point3<f64>], threshold: f64) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    let tree = build_tree(b);
    let threshold_sq = threshold * threshold;
    a.iter().any(|p| {
        tree.nearest_one::<SquaredEuclidean>(&[p.x, p.y, p.z])
            .distance
            < threshold_sq
    })
}

fn build_tree(points: &[Point3<f64>]) -> KdTree<f64, 3> {
    let coords: Vec<[f64; 3]> = points.iter().map(|p| [p.x, p.y, p.z]).collect();
    (&coords).into()
}
