//! Inverse Kinematics module
//!
//! Jacobian-based solvers: [`Arm`] for a standalone serial chain and [`Body`]
//! for greedy route-and-nudge over a [`Rig`](crate::skeleton::Rig), plus the
//! [`Path`] targets that drive them.

mod arm;
mod body;
pub mod jacobian;
mod path;

pub use arm::{Arm, ArmConfig, ArmJoint};
pub use body::{Body, NudgeConfig};
pub use path::{Parameterization, Path};
