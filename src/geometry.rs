//! Vector and quaternion helpers shared by the dynamics model, the course generator and the
//! observation encoder. All functions are pure.
use nalgebra::{UnitQuaternion, Vector3};

/// Rotates a vector by a unit quaternion
/// # Arguments
/// * `q` - The rotation
/// * `v` - The vector to rotate
/// # Returns
/// * The rotated vector
#[inline]
pub fn quat_rotate(q: &UnitQuaternion<f32>, v: &Vector3<f32>) -> Vector3<f32> {
    q.transform_vector(v)
}

/// Inverse of a unit quaternion, i.e. the world-to-body rotation of a body-to-world attitude
#[inline]
pub fn quat_inverse(q: &UnitQuaternion<f32>) -> UnitQuaternion<f32> {
    q.inverse()
}

/// Scales `v` down so that its norm does not exceed `max_norm`
/// # Arguments
/// * `v` - The vector to clamp
/// * `max_norm` - The largest allowed norm
/// # Returns
/// * `v` itself if it is short enough, otherwise `v` rescaled to `max_norm`
#[inline]
pub fn clamp_norm(v: Vector3<f32>, max_norm: f32) -> Vector3<f32> {
    let norm = v.norm();
    if norm > max_norm && norm > 0.0 {
        v * (max_norm / norm)
    } else {
        v
    }
}

/// Unit vector pointing along the given yaw (about +z) and pitch (above the xy plane)
#[inline]
pub fn direction_from_yaw_pitch(yaw: f32, pitch: f32) -> Vector3<f32> {
    Vector3::new(
        pitch.cos() * yaw.cos(),
        pitch.cos() * yaw.sin(),
        pitch.sin(),
    )
}

/// Two unit vectors that together with `normal` form a right-handed orthonormal basis
/// # Arguments
/// * `normal` - A unit vector
/// # Returns
/// * A tuple `(u, v)` with `u x v = normal`
pub fn perpendicular_basis(normal: &Vector3<f32>) -> (Vector3<f32>, Vector3<f32>) {
    // pick the world axis least aligned with the normal to avoid a degenerate cross product
    let helper = if normal.z.abs() < 0.9 {
        Vector3::z()
    } else {
        Vector3::x()
    };
    let u = helper.cross(normal).normalize();
    let v = normal.cross(&u);
    (u, v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_rotate_then_inverse_is_identity() {
        let q = UnitQuaternion::from_euler_angles(0.3, -0.7, 1.9);
        let v = Vector3::new(1.0, -2.0, 0.5);
        let back = quat_rotate(&quat_inverse(&q), &quat_rotate(&q, &v));
        assert!((back - v).norm() < 1e-5);
    }

    #[test]
    fn test_quarter_turn_about_z() {
        let q = UnitQuaternion::from_euler_angles(0.0, 0.0, FRAC_PI_2);
        let rotated = quat_rotate(&q, &Vector3::x());
        assert!((rotated - Vector3::y()).norm() < 1e-6);
    }

    #[test]
    fn test_clamp_norm() {
        let v = Vector3::new(3.0, 4.0, 0.0);
        assert_eq!(clamp_norm(v, 10.0), v);
        let clamped = clamp_norm(v, 1.0);
        assert!((clamped.norm() - 1.0).abs() < 1e-6);
        assert!((clamped - Vector3::new(0.6, 0.8, 0.0)).norm() < 1e-6);
        assert_eq!(clamp_norm(Vector3::zeros(), 0.0), Vector3::zeros());
    }

    #[test]
    fn test_direction_is_unit() {
        for &(yaw, pitch) in &[(0.0, 0.0), (2.5, 0.3), (-1.0, -0.3), (3.1, 1.2)] {
            let d = direction_from_yaw_pitch(yaw, pitch);
            assert!((d.norm() - 1.0).abs() < 1e-6);
        }
        assert!((direction_from_yaw_pitch(0.0, 0.0) - Vector3::x()).norm() < 1e-6);
    }

    #[test]
    fn test_perpendicular_basis_is_orthonormal() {
        for normal in [
            Vector3::x(),
            Vector3::z(),
            -Vector3::z(),
            Vector3::new(1.0, 1.0, 1.0).normalize(),
        ] {
            let (u, v) = perpendicular_basis(&normal);
            assert!((u.norm() - 1.0).abs() < 1e-5);
            assert!((v.norm() - 1.0).abs() < 1e-5);
            assert!(u.dot(&normal).abs() < 1e-5);
            assert!(v.dot(&normal).abs() < 1e-5);
            assert!((u.cross(&v) - normal).norm() < 1e-5);
        }
    }
}
