use std::f32::consts::TAU;

use glam::Vec3;

use crate::math::Pose;

/// Closed curves over `t ∈ [0, 1)`, drawn in the XY plane unless noted.
#[derive(Debug, Clone, Copy)]
pub enum Parameterization {
    /// Unit circle.
    Circle,
    /// Polar `r = 1 - cos(2πt)`; the cusp sits at the origin.
    Cardioid,
    /// Lemniscate of Bernoulli with half-width 1.
    Lemniscate,
    /// Unit-radius helix rising from `z = 0` to `z = 1`.
    Helix { turns: f32 },
    Custom(fn(f32) -> Vec3),
}

impl Parameterization {
    pub fn evaluate(&self, t: f32) -> Vec3 {
        let s = TAU * t;
        match *self {
            Self::Circle => Vec3::new(s.cos(), s.sin(), 0.0),
            Self::Cardioid => {
                let r = 1.0 - s.cos();
                Vec3::new(r * s.cos(), r * s.sin(), 0.0)
            }
            Self::Lemniscate => {
                let d = 1.0 + s.sin() * s.sin();
                Vec3::new(s.cos() / d, s.sin() * s.cos() / d, 0.0)
            }
            Self::Helix { turns } => {
                let a = s * turns;
                Vec3::new(a.cos(), a.sin(), t)
            }
            Self::Custom(f) => f(t),
        }
    }
}

/// A parametric target path with a cursor, placed in the world by `pose`.
#[derive(Debug, Clone)]
pub struct Path {
    parameterization: Parameterization,
    pose: Pose,
    scale: f32,
    t: f32,
}

impl Path {
    pub fn new(parameterization: Parameterization, scale: f32) -> Self {
        Self {
            parameterization,
            pose: Pose::IDENTITY,
            scale,
            t: 0.0,
        }
    }

    pub fn with_pose(mut self, pose: Pose) -> Self {
        self.pose = pose;
        self
    }

    pub fn set_parameterization(&mut self, parameterization: Parameterization) {
        self.parameterization = parameterization;
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn t(&self) -> f32 {
        self.t
    }

    pub fn set_t(&mut self, t: f32) {
        let t = t.rem_euclid(1.0);
        // Tiny negative inputs round up to exactly 1.0.
        self.t = if t >= 1.0 { 0.0 } else { t };
    }

    /// World-space point at parameter `t`.
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.pose
            .transform_point(self.parameterization.evaluate(t) * self.scale)
    }

    /// Advances the cursor by `dt`, wrapping into `[0, 1)`, and returns the
    /// point under it.
    pub fn step_t(&mut self, dt: f32) -> Vec3 {
        self.set_t(self.t + dt);
        self.point_at(self.t)
    }

    /// `segments + 1` evenly spaced points from `t = 0` to `t = 1`.
    pub fn sample(&self, segments: usize) -> Vec<Vec3> {
        let segments = segments.max(1);
        (0..=segments)
            .map(|i| self.point_at(i as f32 / segments as f32))
            .collect()
    }
}
