use std::collections::BTreeMap;

use glam::Vec3;

use crate::math::{AxisAngle, Pose};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct BoneId(pub(crate) u32);

#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct JointId(pub(crate) u32);

#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SocketId(pub(crate) u32);

/// A joint or a socket.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ConnectionId {
    Joint(JointId),
    Socket(SocketId),
}

/// Any node of the bone/connection graph.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ComponentId {
    Bone(BoneId),
    Joint(JointId),
    Socket(SocketId),
}

impl ComponentId {
    pub fn as_bone(self) -> Option<BoneId> {
        match self {
            Self::Bone(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_connection(self) -> Option<ConnectionId> {
        match self {
            Self::Bone(_) => None,
            Self::Joint(id) => Some(ConnectionId::Joint(id)),
            Self::Socket(id) => Some(ConnectionId::Socket(id)),
        }
    }
}

impl From<BoneId> for ComponentId {
    fn from(id: BoneId) -> Self {
        Self::Bone(id)
    }
}

impl From<JointId> for ComponentId {
    fn from(id: JointId) -> Self {
        Self::Joint(id)
    }
}

impl From<SocketId> for ComponentId {
    fn from(id: SocketId) -> Self {
        Self::Socket(id)
    }
}

impl From<ConnectionId> for ComponentId {
    fn from(id: ConnectionId) -> Self {
        match id {
            ConnectionId::Joint(id) => Self::Joint(id),
            ConnectionId::Socket(id) => Self::Socket(id),
        }
    }
}

impl From<JointId> for ConnectionId {
    fn from(id: JointId) -> Self {
        Self::Joint(id)
    }
}

impl From<SocketId> for ConnectionId {
    fn from(id: SocketId) -> Self {
        Self::Socket(id)
    }
}

/// The articulation a joint/socket pair forms. Only connections of the same
/// type can be coupled.
///
/// Parameters are keyed by small indices:
/// - `Pin`: `0` rotation angle about the socket's Z axis.
/// - `Ball`: `0` axis theta, `1` axis phi, `2` rotation angle about that axis.
/// - `Prismatic`: `0` slide distance along the socket's Z axis.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum JointType {
    Pin,
    Ball,
    Prismatic,
}

impl JointType {
    pub const PIN_ANGLE: u8 = 0;
    pub const BALL_THETA: u8 = 0;
    pub const BALL_PHI: u8 = 1;
    pub const BALL_ANGLE: u8 = 2;
    pub const PRISMATIC_OFFSET: u8 = 0;

    pub fn param_count(self) -> usize {
        match self {
            Self::Pin | Self::Prismatic => 1,
            Self::Ball => 3,
        }
    }

    /// Keys this joint type responds to, in ascending order.
    pub fn param_keys(self) -> impl Iterator<Item = u8> {
        0..self.param_count() as u8
    }

    /// Placement of the joint in the socket's frame for the given
    /// parameters. Missing keys read as zero.
    pub fn transform_from_params(self, params: &BTreeMap<u8, f32>) -> Pose {
        let get = |key: u8| params.get(&key).copied().unwrap_or(0.0);
        match self {
            Self::Pin => Pose::from_rotation(Vec3::Z * get(Self::PIN_ANGLE)),
            Self::Ball => Pose::from_rotation(
                AxisAngle::new(
                    get(Self::BALL_THETA),
                    get(Self::BALL_PHI),
                    get(Self::BALL_ANGLE),
                )
                .to_rotation_vector(),
            ),
            Self::Prismatic => Pose::from_translation(Vec3::Z * get(Self::PRISMATIC_OFFSET)),
        }
    }

    /// Recovers parameters from a socket-to-joint placement. Components the
    /// joint type cannot express are dropped.
    pub fn params_from_transform(self, to_joint: &Pose) -> BTreeMap<u8, f32> {
        match self {
            Self::Pin => BTreeMap::from([(Self::PIN_ANGLE, to_joint.rotation.dot(Vec3::Z))]),
            Self::Ball => {
                let rotation = AxisAngle::from_rotation_vector(to_joint.rotation);
                BTreeMap::from([
                    (Self::BALL_THETA, rotation.theta()),
                    (Self::BALL_PHI, rotation.phi()),
                    (Self::BALL_ANGLE, rotation.angle),
                ])
            }
            Self::Prismatic => {
                BTreeMap::from([(Self::PRISMATIC_OFFSET, to_joint.translation.dot(Vec3::Z))])
            }
        }
    }
}
