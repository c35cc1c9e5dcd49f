use glam::{Mat3, Mat4, Vec3};

use super::rotation::{axis_angle3, rotate, rotation_matrix};

/// A rigid placement: translation plus a rotation vector (axis times angle).
///
/// Composition follows `global = anchor ∘ local`: the local translation is
/// rotated into the anchor's frame before being added.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub translation: Vec3,
    pub rotation: Vec3,
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Vec3::ZERO,
    };

    pub fn new(translation: Vec3, rotation: Vec3) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn from_rotation(rotation: Vec3) -> Self {
        Self {
            rotation,
            ..Self::IDENTITY
        }
    }

    pub fn rotation_matrix(&self) -> Mat3 {
        rotation_matrix(self.rotation)
    }

    /// Homogeneous matrix for presentation layers.
    pub fn to_matrix(&self) -> Mat4 {
        let mut m = Mat4::from_mat3(self.rotation_matrix());
        m.w_axis = self.translation.extend(1.0);
        m
    }

    pub fn x_axis(&self) -> Vec3 {
        self.rotation_matrix().x_axis
    }

    pub fn y_axis(&self) -> Vec3 {
        self.rotation_matrix().y_axis
    }

    pub fn z_axis(&self) -> Vec3 {
        self.rotation_matrix().z_axis
    }

    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.translation + rotate(point, self.rotation)
    }

    pub fn transform_direction(&self, direction: Vec3) -> Vec3 {
        rotate(direction, self.rotation)
    }

    /// Places `local`, expressed in this pose's frame, into the parent frame.
    pub fn compose(&self, local: &Pose) -> Pose {
        let r = self.rotation_matrix();
        Pose {
            translation: self.translation + r * local.translation,
            rotation: axis_angle3(r * local.rotation_matrix()),
        }
    }

    pub fn inverse(&self) -> Pose {
        Pose {
            translation: -rotate(self.translation, -self.rotation),
            rotation: -self.rotation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn compose_rotates_local_translation() {
        let anchor = Pose::new(Vec3::new(1.0, 2.0, 3.0), Vec3::Z * FRAC_PI_2);
        let local = Pose::from_translation(Vec3::X);
        let global = anchor.compose(&local);
        assert_abs_diff_eq!(global.translation.x, 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(global.translation.y, 3.0, epsilon = 1e-6);
        assert_abs_diff_eq!(global.translation.z, 3.0, epsilon = 1e-6);
    }

    #[test]
    fn inverse_cancels() {
        let pose = Pose::new(Vec3::new(0.5, -1.0, 2.0), Vec3::new(0.3, 0.4, -0.2));
        let identity = pose.compose(&pose.inverse());
        assert_abs_diff_eq!(identity.translation.length(), 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(identity.rotation.length(), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn matrix_matches_point_transform() {
        let pose = Pose::new(Vec3::new(0.5, -1.0, 2.0), Vec3::new(0.3, 0.4, -0.2));
        let p = Vec3::new(1.0, 2.0, 3.0);
        let a = pose.to_matrix().transform_point3(p);
        let b = pose.transform_point(p);
        assert_abs_diff_eq!(a.distance(b), 0.0, epsilon = 1e-5);
    }
}
