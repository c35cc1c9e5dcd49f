//! Math utilities module
//!
//! Axis-angle rotation helpers and the rigid [`Pose`] shared by every
//! skeleton component.

pub mod rotation;
mod transform;

pub use rotation::{
    align_vectors, align_z, align_zy, axis_angle2, axis_angle3, compose_rotation, rotate,
    rotation_matrix, AxisAngle,
};
pub use transform::Pose;

// Re-export commonly used glam types
pub use glam::{Mat3, Mat4, Vec2, Vec3};
