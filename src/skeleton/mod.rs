//! Skeleton module
//!
//! Bones, joints and sockets stored in a [`Rig`] arena, plus the traversal
//! and forward-kinematics passes that keep their global poses consistent.

mod builder;
mod component;
mod connection;
mod rig;
mod routing;
#[allow(clippy::module_inception)]
mod skeleton;

pub use builder::{BuiltChain, RigBuilder};
pub use component::{BoneId, ComponentId, ConnectionId, JointId, JointType, SocketId};
pub use connection::{Bone, Connection, Joint, Socket};
pub use rig::Rig;
pub use skeleton::{Skeleton, SkeletonId};
