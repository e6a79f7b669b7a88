use crate::core::utils::geometry::BoxBounds;
use nalgebra::{Point3, Vector3};

/// Removes periodic-boundary jumps from a wrapped time series.
///
/// A displacement of more than half a box length between consecutive frames counts
/// as a boundary crossing on that axis. Frame 0 is returned unchanged; every later
/// frame is shifted by the accumulated crossings times the box length.
pub fn unwrap_positions(positions: &[Point3<f64>], bounds: &BoxBounds) -> Vec<Point3<f64>> {
    let lengths = bounds.lengths();
    let half = lengths / 2.0;
    let mut crossings = Vector3::<f64>::zeros();
    let mut unwrapped = Vec::with_capacity(positions.len());

    for (t, p) in positions.iter().enumerate() {
        if t > 0 {
            let d = p - positions[t - 1];
            for axis in 0..3 {
                if d[axis] > half[axis] {
                    crossings[axis] -= 1.0;
                } else if d[axis] < -half[axis] {
                    crossings[axis] += 1.0;
                }
            }
        }
        unwrapped.push(p + crossings.component_mul(&lengths));
    }
    unwrapped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64, z: f64) -> Point3<f64> {
        Point3::new(x, y, z)
    }

    #[test]
    fn continuous_path_is_untouched() {
        let bounds = BoxBounds::cubic(100.0);
        let path = vec![p(10.0, 10.0, 10.0), p(12.0, 9.0, 10.5), p(15.0, 8.0, 11.0)];
        assert_eq!(unwrap_positions(&path, &bounds), path);
    }

    #[test]
    fn crossing_the_upper_face_continues_outside_the_box() {
        let bounds = BoxBounds::cubic(100.0);
        let path = vec![p(98.0, 50.0, 50.0), p(2.0, 50.0, 50.0), p(5.0, 50.0, 50.0)];
        let unwrapped = unwrap_positions(&path, &bounds);
        assert_eq!(unwrapped[0], p(98.0, 50.0, 50.0));
        assert_eq!(unwrapped[1], p(102.0, 50.0, 50.0));
        assert_eq!(unwrapped[2], p(105.0, 50.0, 50.0));
    }

    #[test]
    fn crossing_back_and_forth_restores_the_counter() {
        let bounds = BoxBounds::cubic(100.0);
        let path = vec![p(50.0, 1.0, 50.0), p(50.0, 99.0, 50.0), p(50.0, 1.0, 50.0)];
        let unwrapped = unwrap_positions(&path, &bounds);
        assert_eq!(unwrapped[1].y, -1.0);
        assert_eq!(unwrapped[2].y, 1.0);
    }

    #[test]
    fn short_inputs_are_returned_as_is() {
        let bounds = BoxBounds::cubic(10.0);
        assert!(unwrap_positions(&[], &bounds).is_empty());
        assert_eq!(unwrap_positions(&[p(9.0, 9.0, 9.0)], &bounds), vec![p(9.0, 9.0, 9.0)]);
    }
}
