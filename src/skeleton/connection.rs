use std::collections::{BTreeMap, BTreeSet};
use std::f32::consts::PI;

use glam::Vec3;
use rand::Rng;

use super::component::{BoneId, JointId, JointType, SocketId};
use super::skeleton::SkeletonId;
use crate::math::{AxisAngle, Pose};

/// Cap radius and spin range of a unit-scale ball perturbation.
const PERTURB_ARC: f32 = PI / 16.0;
const PERTURB_POLAR: f32 = PI / 16.0;
const PERTURB_SLIDE: f32 = 0.05;

#[derive(Debug, Clone, Default)]
pub struct Bone {
    pub(crate) pose: Pose,
    pub(crate) label: Option<String>,
    pub(crate) joints: BTreeSet<JointId>,
    pub(crate) sockets: BTreeSet<SocketId>,
    pub(crate) skeleton: Option<SkeletonId>,
}

impl Bone {
    pub fn global_pose(&self) -> Pose {
        self.pose
    }

    pub fn global_translation(&self) -> Vec3 {
        self.pose.translation
    }

    pub fn global_rotation(&self) -> Vec3 {
        self.pose.rotation
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or("")
    }

    pub fn joints(&self) -> &BTreeSet<JointId> {
        &self.joints
    }

    pub fn sockets(&self) -> &BTreeSet<SocketId> {
        &self.sockets
    }

    pub fn skeleton(&self) -> Option<SkeletonId> {
        self.skeleton
    }
}

/// State shared by joints and sockets: the anchoring bone and the fixed
/// offset from that bone's frame.
#[derive(Debug, Clone)]
pub struct Connection {
    pub(crate) pose: Pose,
    pub(crate) bone: Option<BoneId>,
    pub(crate) offset: Pose,
    pub(crate) joint_type: JointType,
}

impl Connection {
    pub(crate) fn new(joint_type: JointType, offset: Pose) -> Self {
        Self {
            pose: Pose::IDENTITY,
            bone: None,
            offset,
            joint_type,
        }
    }

    pub fn bone(&self) -> Option<BoneId> {
        self.bone
    }

    pub fn joint_type(&self) -> JointType {
        self.joint_type
    }

    pub fn global_pose(&self) -> Pose {
        self.pose
    }

    pub fn global_translation(&self) -> Vec3 {
        self.pose.translation
    }

    pub fn global_rotation(&self) -> Vec3 {
        self.pose.rotation
    }

    pub fn offset(&self) -> Pose {
        self.offset
    }

    pub fn translation_from_bone(&self) -> Vec3 {
        self.offset.translation
    }

    pub fn rotation_from_bone(&self) -> Vec3 {
        self.offset.rotation
    }

    pub fn translation_to_bone(&self) -> Vec3 {
        self.offset.inverse().translation
    }

    pub fn rotation_to_bone(&self) -> Vec3 {
        -self.offset.rotation
    }
}

#[derive(Debug, Clone)]
pub struct Joint {
    pub(crate) connection: Connection,
    pub(crate) socket: Option<SocketId>,
}

impl Joint {
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn socket(&self) -> Option<SocketId> {
        self.socket
    }
}

/// The parameterised half of an articulation. The socket owns the
/// parameters; the coupled joint sits at `to_joint` in the socket's frame.
#[derive(Debug, Clone)]
pub struct Socket {
    pub(crate) connection: Connection,
    pub(crate) joint: Option<JointId>,
    to_joint: Pose,
    params: BTreeMap<u8, f32>,
    constraints: BTreeMap<u8, f32>,
    stashed: BTreeMap<u8, f32>,
}

impl Socket {
    pub(crate) fn new(connection: Connection) -> Self {
        let params: BTreeMap<u8, f32> = connection
            .joint_type
            .param_keys()
            .map(|key| (key, 0.0))
            .collect();
        let mut socket = Self {
            connection,
            joint: None,
            to_joint: Pose::IDENTITY,
            stashed: params.clone(),
            params,
            constraints: BTreeMap::new(),
        };
        socket.build_transforms_from_params();
        socket
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn joint(&self) -> Option<JointId> {
        self.joint
    }

    pub fn joint_type(&self) -> JointType {
        self.connection.joint_type
    }

    pub fn params(&self) -> &BTreeMap<u8, f32> {
        &self.params
    }

    pub fn adjustable_params(&self) -> BTreeMap<u8, f32> {
        self.joint_type()
            .param_keys()
            .map(|key| (key, self.param(key).unwrap_or(0.0)))
            .collect()
    }

    pub fn param(&self, key: u8) -> Option<f32> {
        self.params.get(&key).copied()
    }

    pub fn constraint(&self, key: u8) -> Option<f32> {
        self.constraints.get(&key).copied()
    }

    /// Limits `|param[key]|` to `limit`. Applied on the next parameter change
    /// and immediately to the current value.
    pub fn set_constraint(&mut self, key: u8, limit: f32) {
        self.constraints.insert(key, limit.abs());
        self.constrain_params();
        self.build_transforms_from_params();
    }

    pub fn clear_constraint(&mut self, key: u8) {
        self.constraints.remove(&key);
    }

    /// Merges `params` into the current parameters. Keys the joint type does
    /// not use are ignored.
    pub fn set_params(&mut self, params: &BTreeMap<u8, f32>) {
        let count = self.joint_type().param_count();
        for (&key, &value) in params {
            if usize::from(key) < count {
                self.params.insert(key, value);
            }
        }
        self.constrain_params();
        self.build_transforms_from_params();
    }

    pub fn set_param(&mut self, key: u8, value: f32) {
        self.set_params(&BTreeMap::from([(key, value)]));
    }

    pub fn constrain_params(&mut self) {
        for (key, limit) in &self.constraints {
            if let Some(value) = self.params.get_mut(key) {
                *value = value.clamp(-limit, *limit);
            }
        }
    }

    pub fn backup(&mut self) {
        self.stashed = self.params.clone();
    }

    pub fn restore(&mut self) {
        self.params = self.stashed.clone();
        self.build_transforms_from_params();
    }

    /// Randomly moves the parameters by an amount proportional to `scale`.
    pub fn perturb_joint<R: Rng + ?Sized>(&mut self, rng: &mut R, scale: f32) {
        let scale = scale.abs();
        let jitter = |rng: &mut R, range: f32| {
            if range > 0.0 {
                rng.gen_range(-range..=range)
            } else {
                0.0
            }
        };
        match self.joint_type() {
            JointType::Ball => {
                let mut rotation = AxisAngle::new(
                    self.param(JointType::BALL_THETA).unwrap_or(0.0),
                    self.param(JointType::BALL_PHI).unwrap_or(0.0),
                    self.param(JointType::BALL_ANGLE).unwrap_or(0.0),
                );
                rotation.perturb(rng, scale * PERTURB_ARC, scale * PERTURB_POLAR);
                self.set_params(&BTreeMap::from([
                    (JointType::BALL_THETA, rotation.theta()),
                    (JointType::BALL_PHI, rotation.phi()),
                    (JointType::BALL_ANGLE, rotation.angle),
                ]));
            }
            JointType::Pin => {
                let angle = self.param(JointType::PIN_ANGLE).unwrap_or(0.0);
                let delta = jitter(rng, scale * PERTURB_POLAR);
                self.set_param(JointType::PIN_ANGLE, angle + delta);
            }
            JointType::Prismatic => {
                let offset = self.param(JointType::PRISMATIC_OFFSET).unwrap_or(0.0);
                let delta = jitter(rng, scale * PERTURB_SLIDE);
                self.set_param(JointType::PRISMATIC_OFFSET, offset + delta);
            }
        }
    }

    pub fn build_transforms_from_params(&mut self) {
        self.to_joint = self.joint_type().transform_from_params(&self.params);
    }

    pub fn build_params_from_transforms(&mut self) {
        self.params = self.joint_type().params_from_transform(&self.to_joint);
    }

    pub fn to_joint(&self) -> Pose {
        self.to_joint
    }

    pub fn translation_to_joint(&self) -> Vec3 {
        self.to_joint.translation
    }

    pub fn rotation_to_joint(&self) -> Vec3 {
        self.to_joint.rotation
    }

    pub fn translation_from_joint(&self) -> Vec3 {
        self.to_joint.inverse().translation
    }

    pub fn rotation_from_joint(&self) -> Vec3 {
        -self.to_joint.rotation
    }
}
