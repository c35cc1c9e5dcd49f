use std::collections::BTreeMap;
use std::f32::consts::FRAC_PI_2;

use glam::Vec3;

use super::component::{BoneId, JointId, JointType, SocketId};
use super::rig::Rig;
use crate::math::Pose;

/// A linear chain produced by [`RigBuilder`].
///
/// `sockets[i]` sits on `bones[i]` and is coupled to `joints[i]` on
/// `bones[i + 1]`. `tip` is an uncoupled socket at the far end of the last
/// bone, usable as an end-effector.
#[derive(Debug, Clone)]
pub struct BuiltChain {
    pub rig: Rig,
    pub bones: Vec<BoneId>,
    pub sockets: Vec<SocketId>,
    pub joints: Vec<JointId>,
    pub tip: SocketId,
}

impl BuiltChain {
    pub fn root(&self) -> BoneId {
        self.bones[0]
    }

    pub fn last_bone(&self) -> BoneId {
        self.bones[self.bones.len() - 1]
    }
}

#[derive(Debug, Clone)]
struct Segment {
    joint_type: JointType,
    length: f32,
    params: BTreeMap<u8, f32>,
    constraints: BTreeMap<u8, f32>,
}

/// Builds a chain of bones running along each bone's local +Z, each one
/// `length` long and hung from the previous bone's far end.
///
/// Pin sockets are turned a quarter turn about -X so the hinge axis is the
/// bone's Y axis rather than its length.
#[derive(Debug, Clone)]
pub struct RigBuilder {
    root_pose: Pose,
    root_length: f32,
    segments: Vec<Segment>,
    tip_type: JointType,
}

impl RigBuilder {
    pub fn new() -> Self {
        Self {
            root_pose: Pose::IDENTITY,
            root_length: 1.0,
            segments: Vec::new(),
            tip_type: JointType::Ball,
        }
    }

    pub fn root_pose(mut self, pose: Pose) -> Self {
        self.root_pose = pose;
        self
    }

    pub fn root_length(mut self, length: f32) -> Self {
        self.root_length = length;
        self
    }

    pub fn tip_type(mut self, joint_type: JointType) -> Self {
        self.tip_type = joint_type;
        self
    }

    pub fn add_segment(mut self, joint_type: JointType, length: f32) -> Self {
        self.segments.push(Segment {
            joint_type,
            length,
            params: BTreeMap::new(),
            constraints: BTreeMap::new(),
        });
        self
    }

    pub fn add_segment_with_params(
        mut self,
        joint_type: JointType,
        length: f32,
        params: &[(u8, f32)],
    ) -> Self {
        self = self.add_segment(joint_type, length);
        if let Some(segment) = self.segments.last_mut() {
            segment.params.extend(params.iter().copied());
        }
        self
    }

    /// Limits parameter `key` of the most recently added segment.
    pub fn constrain(mut self, key: u8, limit: f32) -> Self {
        if let Some(segment) = self.segments.last_mut() {
            segment.constraints.insert(key, limit);
        }
        self
    }

    pub fn build(self) -> BuiltChain {
        let mut rig = Rig::new();
        let root = rig.add_labeled_bone("root", self.root_pose);
        let mut bones = vec![root];
        let mut sockets = Vec::with_capacity(self.segments.len());
        let mut joints = Vec::with_capacity(self.segments.len());

        let mut previous_length = self.root_length;
        for (i, segment) in self.segments.iter().enumerate() {
            let parent = bones[bones.len() - 1];
            let hinge = hinge_rotation(segment.joint_type);
            let socket = rig.add_socket(
                segment.joint_type,
                Some(parent),
                Pose::new(Vec3::Z * previous_length, hinge),
            );
            let bone = rig.add_labeled_bone(format!("link{}", i + 1), Pose::IDENTITY);
            let joint = rig.add_joint(segment.joint_type, Some(bone), Pose::from_rotation(hinge));
            if !rig.couple(joint, socket) {
                log::warn!("segment {} left uncoupled", i + 1);
            }

            if let Some(s) = rig.socket_mut(socket) {
                for (&key, &limit) in &segment.constraints {
                    s.set_constraint(key, limit);
                }
                s.set_params(&segment.params);
            }

            bones.push(bone);
            sockets.push(socket);
            joints.push(joint);
            previous_length = segment.length;
        }

        let last = bones[bones.len() - 1];
        let tip = rig.add_socket(
            self.tip_type,
            Some(last),
            Pose::from_translation(Vec3::Z * previous_length),
        );

        let tree = rig.component_tree(root.into());
        rig.update_globals(&tree);
        log::debug!("built chain of {} bones", bones.len());

        BuiltChain {
            rig,
            bones,
            sockets,
            joints,
            tip,
        }
    }
}

impl Default for RigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn hinge_rotation(joint_type: JointType) -> Vec3 {
    match joint_type {
        JointType::Pin => Vec3::NEG_X * FRAC_PI_2,
        JointType::Ball | JointType::Prismatic => Vec3::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use crate::skeleton::ComponentId;

    #[test]
    fn straight_chain_reaches_total_length() {
        let chain = RigBuilder::new()
            .root_pose(Pose::from_translation(Vec3::X))
            .add_segment(JointType::Ball, 1.0)
            .add_segment(JointType::Prismatic, 2.0)
            .build();
        assert_eq!(chain.bones.len(), 3);
        assert_eq!(chain.sockets.len(), 2);
        let tip = chain.rig.global_translation(chain.tip.into()).unwrap();
        assert_abs_diff_eq!(tip.distance(Vec3::new(1.0, 0.0, 4.0)), 0.0, epsilon = 1e-5);
        assert!(chain.rig.is_consistent());
        assert_eq!(chain.rig.socket(chain.tip).unwrap().joint(), None);
    }

    #[test]
    fn every_segment_is_coupled_to_its_parent() {
        let chain = RigBuilder::new()
            .add_segment(JointType::Pin, 1.0)
            .add_segment(JointType::Ball, 1.0)
            .add_segment(JointType::Prismatic, 1.0)
            .build();
        for (i, (&socket, &joint)) in chain.sockets.iter().zip(&chain.joints).enumerate() {
            assert_eq!(chain.rig.socket(socket).unwrap().joint(), Some(joint));
            assert_eq!(chain.rig.opposing_bone(socket.into()), Some(chain.bones[i + 1]));
        }
    }

    #[test]
    fn pin_segments_hinge_about_bone_y() {
        let chain = RigBuilder::new()
            .add_segment_with_params(JointType::Pin, 1.0, &[(JointType::PIN_ANGLE, FRAC_PI_2)])
            .build();
        // The second bone swings from +Z to +X about +Y.
        let tip = chain.rig.global_translation(chain.tip.into()).unwrap();
        assert_abs_diff_eq!(tip.distance(Vec3::new(1.0, 0.0, 1.0)), 0.0, epsilon = 1e-5);
        let bone = chain.rig.global_translation(ComponentId::Bone(chain.last_bone())).unwrap();
        assert_abs_diff_eq!(bone.distance(Vec3::Z), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn constraints_apply_before_params() {
        let chain = RigBuilder::new()
            .add_segment_with_params(JointType::Prismatic, 1.0, &[(0, 3.0)])
            .constrain(JointType::PRISMATIC_OFFSET, 0.5)
            .build();
        let socket = chain.rig.socket(chain.sockets[0]).unwrap();
        assert_eq!(socket.param(JointType::PRISMATIC_OFFSET), Some(0.5));
    }
}
