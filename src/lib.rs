//! # rig-ik
//!
//! An articulated skeleton model with forward kinematics and Jacobian-based
//! inverse kinematics.
//!
//! ## Features
//! - Bone / joint / socket graph stored in an arena with stable handles
//! - Pin, ball and prismatic articulations driven by socket parameters
//! - One-hop pose propagation and full forward-kinematics passes
//! - Serial [`Arm`](ik::Arm) with analytic and numeric Jacobians
//! - Greedy route-and-nudge IK over a whole rig via [`Body`](ik::Body)
//!
//! ## Example
//! ```rust
//! use rig_ik::ik::{Body, NudgeConfig};
//! use rig_ik::skeleton::{JointType, RigBuilder};
//! use glam::Vec3;
//!
//! // Build a two-link chain
//! let mut chain = RigBuilder::new()
//!     .add_segment_with_params(JointType::Ball, 1.0, &[(0, 1.2), (2, 0.4)])
//!     .add_segment(JointType::Ball, 1.0)
//!     .build();
//!
//! // Hold the root still and pull the tip toward a target
//! let mut body = Body::new(chain.root()).with_config(NudgeConfig::default().with_step(0.01));
//! body.anchor(&chain.rig, chain.root().into(), true, true);
//! let moved = body.set_translation(&mut chain.rig, chain.tip.into(), Vec3::new(1.0, 0.0, 1.5));
//! assert!(moved);
//! ```

pub mod error;
pub mod ik;
pub mod math;
pub mod skeleton;
pub mod tree;

pub use error::{RigError, RigResult};
pub use ik::{Arm, ArmConfig, Body, NudgeConfig, Parameterization, Path};
pub use math::{AxisAngle, Pose};
pub use skeleton::{
    BoneId, ComponentId, ConnectionId, JointId, JointType, Rig, RigBuilder, Skeleton, SocketId,
};
pub use tree::{NodeId, Tree};
