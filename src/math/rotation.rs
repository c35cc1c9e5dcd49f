use glam::{Mat3, Quat, Vec2, Vec3};
use rand::Rng;
use std::f32::consts::{PI, TAU};

/// Rotation vectors shorter than this are treated as the identity.
pub const ANGLE_EPSILON: f32 = 1e-7;

/// An axis-angle rotation whose unit axis is stored as spherical angles
/// `[theta, phi]`: `theta` is measured from +Z, `phi` around +Z from +X.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisAngle {
    pub axis: Vec2,
    pub angle: f32,
}

impl AxisAngle {
    pub const IDENTITY: Self = Self {
        axis: Vec2::ZERO,
        angle: 0.0,
    };

    pub fn new(theta: f32, phi: f32, angle: f32) -> Self {
        Self {
            axis: Vec2::new(theta, phi),
            angle,
        }
    }

    /// Rotation by `angle` about the unit vector `axis`.
    ///
    /// A zero-length axis yields the identity.
    pub fn from_axis(axis: Vec3, angle: f32) -> Self {
        let length = axis.length();
        if length < ANGLE_EPSILON {
            return Self::IDENTITY;
        }
        let n = axis / length;
        Self::new(n.z.clamp(-1.0, 1.0).acos(), n.y.atan2(n.x), angle)
    }

    /// Splits a rotation vector `w` into axis `w / |w|` and angle `|w|`.
    pub fn from_rotation_vector(w: Vec3) -> Self {
        let angle = w.length();
        if angle < ANGLE_EPSILON {
            return Self::IDENTITY;
        }
        Self::from_axis(w / angle, angle)
    }

    pub fn from_matrix(m: Mat3) -> Self {
        Self::from_rotation_vector(axis_angle3(m))
    }

    pub fn theta(&self) -> f32 {
        self.axis.x
    }

    pub fn phi(&self) -> f32 {
        self.axis.y
    }

    pub fn unit_axis(&self) -> Vec3 {
        spherical_to_unit(self.theta(), self.phi())
    }

    pub fn to_rotation_vector(&self) -> Vec3 {
        self.unit_axis() * self.angle
    }

    pub fn to_matrix(&self) -> Mat3 {
        Mat3::from_axis_angle(self.unit_axis(), self.angle)
    }

    /// The rotated X, Y and Z axes of the frame this rotation describes.
    pub fn coordinate_axes(&self) -> [Vec3; 3] {
        let m = self.to_matrix();
        [m.x_axis, m.y_axis, m.z_axis]
    }

    /// Wraps the angle into `[0, 2π)`.
    pub fn clamp_angle(&mut self) {
        self.angle = self.angle.rem_euclid(TAU);
    }

    /// Reorients the frame described by this rotation.
    ///
    /// The frame's Z axis is moved to a point sampled uniformly from the
    /// spherical cap of geodesic radius `d_arc` around it, then the frame is
    /// spun about its new Z axis by an angle drawn uniformly from
    /// `[-d_polar, d_polar]`.
    pub fn perturb<R: Rng + ?Sized>(&mut self, rng: &mut R, d_arc: f32, d_polar: f32) {
        let frame = self.to_matrix();
        let cos_max = d_arc.abs().min(PI).cos();
        let tilt_angle = rng.gen_range(cos_max..=1.0_f32).clamp(-1.0, 1.0).acos();
        let azimuth = rng.gen_range(0.0..TAU);

        let tilt_axis = frame * Vec3::new(azimuth.cos(), azimuth.sin(), 0.0);
        let tilt = Mat3::from_axis_angle(tilt_axis.normalize(), tilt_angle);
        let new_z = (tilt * frame.z_axis).normalize();

        let spin_angle = if d_polar.abs() > 0.0 {
            rng.gen_range(-d_polar.abs()..=d_polar.abs())
        } else {
            0.0
        };
        let spin = Mat3::from_axis_angle(new_z, spin_angle);

        *self = Self::from_matrix(spin * tilt * frame);
    }

    /// ∂R/∂theta for the current parameters.
    pub fn d_theta(&self) -> Mat3 {
        let (theta, phi) = (self.theta(), self.phi());
        let dn = Vec3::new(
            theta.cos() * phi.cos(),
            theta.cos() * phi.sin(),
            -theta.sin(),
        );
        self.d_axis(dn)
    }

    /// ∂R/∂phi for the current parameters.
    pub fn d_phi(&self) -> Mat3 {
        let (theta, phi) = (self.theta(), self.phi());
        let dn = Vec3::new(-theta.sin() * phi.sin(), theta.sin() * phi.cos(), 0.0);
        self.d_axis(dn)
    }

    /// ∂R/∂angle for the current parameters.
    pub fn d_angle(&self) -> Mat3 {
        let k = skew(self.unit_axis());
        k * self.angle.cos() + (k * k) * self.angle.sin()
    }

    // R = I + sin(a) K + (1 - cos(a)) K², differentiated through K = [n]x.
    fn d_axis(&self, dn: Vec3) -> Mat3 {
        let k = skew(self.unit_axis());
        let dk = skew(dn);
        dk * self.angle.sin() + (dk * k + k * dk) * (1.0 - self.angle.cos())
    }
}

impl From<Vec3> for AxisAngle {
    fn from(w: Vec3) -> Self {
        Self::from_rotation_vector(w)
    }
}

impl From<AxisAngle> for Vec3 {
    fn from(rotation: AxisAngle) -> Self {
        rotation.to_rotation_vector()
    }
}

fn spherical_to_unit(theta: f32, phi: f32) -> Vec3 {
    Vec3::new(
        theta.sin() * phi.cos(),
        theta.sin() * phi.sin(),
        theta.cos(),
    )
}

/// Cross-product matrix: `skew(v) * u == v.cross(u)`.
pub fn skew(v: Vec3) -> Mat3 {
    Mat3::from_cols(
        Vec3::new(0.0, v.z, -v.y),
        Vec3::new(-v.z, 0.0, v.x),
        Vec3::new(v.y, -v.x, 0.0),
    )
}

/// Rotation matrix of the rotation vector `w` (axis `w / |w|`, angle `|w|`).
pub fn rotation_matrix(w: Vec3) -> Mat3 {
    let angle = w.length();
    if angle < ANGLE_EPSILON {
        return Mat3::IDENTITY;
    }
    Mat3::from_axis_angle(w / angle, angle)
}

/// Rotation vector of the rotation matrix `m`, with angle in `[0, π]`.
pub fn axis_angle3(m: Mat3) -> Vec3 {
    let mut q = Quat::from_mat3(&m).normalize();
    if q.w < 0.0 {
        q = -q;
    }
    q.to_scaled_axis()
}

pub fn axis_angle2(m: Mat3) -> AxisAngle {
    AxisAngle::from_matrix(m)
}

/// Rotates `v` by the rotation vector `w`.
pub fn rotate(v: Vec3, w: Vec3) -> Vec3 {
    rotation_matrix(w) * v
}

/// Rotation vector of applying `w0` first, then `w1`.
pub fn compose_rotation(w0: Vec3, w1: Vec3) -> Vec3 {
    axis_angle3(rotation_matrix(w1) * rotation_matrix(w0))
}

/// Shortest rotation vector taking the direction of `from` onto `to`.
pub fn align_vectors(from: Vec3, to: Vec3) -> Vec3 {
    let (Some(a), Some(b)) = (from.try_normalize(), to.try_normalize()) else {
        return Vec3::ZERO;
    };
    let cross = a.cross(b);
    let sin = cross.length();
    let cos = a.dot(b);
    if sin < ANGLE_EPSILON {
        if cos > 0.0 {
            return Vec3::ZERO;
        }
        return a.any_orthonormal_vector() * PI;
    }
    cross / sin * sin.atan2(cos)
}

/// Rotation vector taking +Z onto `axis`.
pub fn align_z(axis: Vec3) -> Vec3 {
    align_vectors(Vec3::Z, axis)
}

/// Rotation vector of the frame whose Z axis is `z` and whose Y axis is the
/// component of `y` orthogonal to `z`.
pub fn align_zy(z: Vec3, y: Vec3) -> Vec3 {
    let Some(zn) = z.try_normalize() else {
        return Vec3::ZERO;
    };
    let Some(x) = y.cross(zn).try_normalize() else {
        return align_z(zn);
    };
    let yn = zn.cross(x);
    axis_angle3(Mat3::from_cols(x, yn, zn))
}
