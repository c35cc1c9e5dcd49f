use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::f32::consts::PI;

use glam::Vec3;

use super::jacobian::{central_difference, pseudo_inverse_step};
use crate::error::RigResult;
use crate::math::Pose;
use crate::skeleton::{BoneId, ComponentId, ConnectionId, JointId, Rig, SocketId};

#[derive(Debug, Clone, Copy)]
pub struct NudgeConfig {
    /// Distance the effector is asked to move per call.
    pub step: f32,
    pub epsilon: f32,
    pub pinv_tolerance: f32,
}

impl Default for NudgeConfig {
    fn default() -> Self {
        Self {
            step: 1e-4,
            epsilon: PI / 128.0,
            pinv_tolerance: 1e-4,
        }
    }
}

impl NudgeConfig {
    pub fn with_step(mut self, step: f32) -> Self {
        self.step = step;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f32) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_pinv_tolerance(mut self, tolerance: f32) -> Self {
        self.pinv_tolerance = tolerance;
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct Hop {
    socket: SocketId,
    joint: JointId,
    /// The joint is on the effector's side of the pair.
    joint_is_near: bool,
}

/// Drives a rig by small greedy nudges against a set of anchored
/// components.
#[derive(Debug, Clone)]
pub struct Body {
    root: BoneId,
    anchored_translations: BTreeMap<ComponentId, Vec3>,
    anchored_rotations: BTreeMap<ComponentId, Vec3>,
    config: NudgeConfig,
}

impl Body {
    pub fn new(root: BoneId) -> Self {
        Self {
            root,
            anchored_translations: BTreeMap::new(),
            anchored_rotations: BTreeMap::new(),
            config: NudgeConfig::default(),
        }
    }

    pub fn with_config(mut self, config: NudgeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn root(&self) -> BoneId {
        self.root
    }

    pub fn config(&self) -> &NudgeConfig {
        &self.config
    }

    /// Pins `component` at its current translation and/or rotation. Passing
    /// `false` for either releases that part.
    pub fn anchor(&mut self, rig: &Rig, component: ComponentId, t_fixed: bool, w_fixed: bool) {
        let Some(pose) = rig.global_pose(component) else {
            return;
        };
        if t_fixed {
            self.anchored_translations.insert(component, pose.translation);
        } else {
            self.anchored_translations.remove(&component);
        }
        if w_fixed {
            self.anchored_rotations.insert(component, pose.rotation);
        } else {
            self.anchored_rotations.remove(&component);
        }
    }

    pub fn unanchor(&mut self, component: ComponentId) {
        self.anchored_translations.remove(&component);
        self.anchored_rotations.remove(&component);
    }

    pub fn anchors(&self) -> BTreeSet<ComponentId> {
        self.anchored_translations
            .keys()
            .chain(self.anchored_rotations.keys())
            .copied()
            .collect()
    }

    pub fn is_anchored(&self, component: ComponentId) -> bool {
        self.anchored_translations.contains_key(&component)
            || self.anchored_rotations.contains_key(&component)
    }

    /// Full forward kinematics with every anchor restored to its recorded
    /// pose. Each connected piece is propagated from its first anchor, or
    /// from the root bone when nothing is anchored.
    pub fn hard_update(&self, rig: &mut Rig) {
        let anchors = self.anchors();
        if anchors.is_empty() {
            let tree = rig.component_tree(self.root.into());
            rig.update_globals(&tree);
            return;
        }
        for &anchor in &anchors {
            self.restore_anchor(rig, anchor);
        }
        let mut placed: HashSet<ComponentId> = HashSet::new();
        for anchor in anchors {
            if placed.contains(&anchor) {
                continue;
            }
            let tree = rig.component_tree(anchor);
            rig.update_globals(&tree);
            placed.extend(tree.bfs_data_sequence().into_iter().copied());
        }
    }

    fn restore_anchor(&self, rig: &mut Rig, anchor: ComponentId) {
        let Some(current) = rig.global_pose(anchor) else {
            return;
        };
        let pose = Pose::new(
            self.anchored_translations
                .get(&anchor)
                .copied()
                .unwrap_or(current.translation),
            self.anchored_rotations
                .get(&anchor)
                .copied()
                .unwrap_or(current.rotation),
        );
        rig.set_global_pose(anchor, pose);
    }

    fn anchored_bones(&self, rig: &Rig) -> BTreeSet<BoneId> {
        self.anchors()
            .into_iter()
            .filter_map(|anchor| match anchor {
                ComponentId::Bone(bone) => Some(bone),
                _ => anchor
                    .as_connection()
                    .and_then(|conn| rig.connection(conn))
                    .and_then(|conn| conn.bone()),
            })
            .collect()
    }

    /// Whether changing `hop`'s parameters would drag an anchor along with
    /// the effector.
    fn moves_an_anchor(rig: &Rig, hop: Hop, anchored: &BTreeSet<BoneId>) -> bool {
        let near: ConnectionId = if hop.joint_is_near {
            hop.joint.into()
        } else {
            hop.socket.into()
        };
        let Some(bone) = rig.connection(near).and_then(|conn| conn.bone()) else {
            return true;
        };
        rig.reachable_bones(bone, Some(near))
            .iter()
            .any(|b| anchored.contains(b))
    }

    /// Sockets a nudge of `effector` would adjust, nearest first, each once.
    /// Pairs whose effector side holds an anchor are left out.
    pub fn route_sockets(&self, rig: &Rig, effector: ComponentId) -> Vec<SocketId> {
        self.route(rig, effector).iter().map(|hop| hop.socket).collect()
    }

    fn route(&self, rig: &Rig, effector: ComponentId) -> Vec<Hop> {
        let tree = rig.build_tree_to_targets(effector, &self.anchors());
        let anchored = self.anchored_bones(rig);
        let mut seen = HashSet::new();
        let mut hops = Vec::new();
        for node in tree.dfs_sequence() {
            let Some(parent) = tree.parent(node) else {
                continue;
            };
            let (Some(&near), Some(&far)) = (tree.data(parent), tree.data(node)) else {
                continue;
            };
            let hop = match (near, far) {
                (ComponentId::Joint(joint), ComponentId::Socket(socket)) => Hop {
                    socket,
                    joint,
                    joint_is_near: true,
                },
                (ComponentId::Socket(socket), ComponentId::Joint(joint)) => Hop {
                    socket,
                    joint,
                    joint_is_near: false,
                },
                _ => continue,
            };
            if Self::moves_an_anchor(rig, hop, &anchored) {
                log::trace!("{:?} would move an anchor, leaving it", hop.socket);
                continue;
            }
            if seen.insert(hop.socket) {
                hops.push(hop);
            }
        }
        hops
    }

    /// Nudges `effector` one step toward `target`.
    ///
    /// Every coupled pair on the routes from the effector to the anchors gets
    /// one least-squares parameter update, followed by forward kinematics.
    /// Returns `false` without touching the rig when the effector is
    /// anchored or unknown, already at `target`, or there are no anchors.
    pub fn set_translation(&self, rig: &mut Rig, effector: ComponentId, target: Vec3) -> bool {
        if self.is_anchored(effector) {
            log::debug!("refusing to nudge anchored {effector:?}");
            return false;
        }
        let Some(current) = rig.global_translation(effector) else {
            return false;
        };
        let Some(direction) = (target - current).try_normalize() else {
            log::debug!("{effector:?} is already at its target");
            return false;
        };
        if self.anchors().is_empty() {
            log::debug!("no anchors to push {effector:?} against");
            return false;
        }

        let displacement = direction * self.config.step;
        for hop in self.route(rig, effector) {
            if let Err(err) = self.nudge_hop(rig, effector, hop, displacement) {
                log::warn!("skipping {:?}: {err}", hop.socket);
            }
            self.hard_update(rig);
        }
        self.hard_update(rig);
        true
    }

    /// Updates one socket's parameters so the effector moves by
    /// `displacement`, holding the pair's far side still.
    fn nudge_hop(&self, rig: &mut Rig, effector: ComponentId, hop: Hop, displacement: Vec3) -> RigResult<()> {
        let (near, far): (ConnectionId, ConnectionId) = if hop.joint_is_near {
            (hop.joint.into(), hop.socket.into())
        } else {
            (hop.socket.into(), hop.joint.into())
        };
        let (Some(effector_t), Some(near_pose), Some(far_pose), Some(socket)) = (
            rig.global_translation(effector),
            rig.global_pose(near.into()),
            rig.global_pose(far.into()),
            rig.socket(hop.socket),
        ) else {
            return Ok(());
        };

        let local = near_pose.inverse().transform_point(effector_t);
        let joint_type = socket.joint_type();
        let keys: Vec<u8> = joint_type.param_keys().collect();
        let params: Vec<f32> = keys.iter().map(|&k| socket.param(k).unwrap_or(0.0)).collect();

        let place = |p: &[f32]| {
            let map: BTreeMap<u8, f32> = keys.iter().copied().zip(p.iter().copied()).collect();
            let to_joint = joint_type.transform_from_params(&map);
            let far_to_near = if hop.joint_is_near {
                to_joint
            } else {
                to_joint.inverse()
            };
            far_pose.compose(&far_to_near).transform_point(local)
        };
        let jacobian = central_difference(&params, self.config.epsilon, place);
        let step = pseudo_inverse_step(&jacobian, displacement, self.config.pinv_tolerance)?;

        let updated: BTreeMap<u8, f32> = keys
            .iter()
            .zip(params.iter().zip(&step))
            .map(|(&k, (p, d))| (k, p + d))
            .collect();
        log::trace!("{:?} params {params:?} -> {updated:?}", hop.socket);
        if let Some(socket) = rig.socket_mut(hop.socket) {
            socket.set_params(&updated);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::{BuiltChain, JointType, RigBuilder};
    use approx::assert_abs_diff_eq;
    use std::f32::consts::FRAC_PI_2;

    fn bent_chain() -> BuiltChain {
        RigBuilder::new()
            .add_segment_with_params(
                JointType::Ball,
                1.0,
                &[(JointType::BALL_THETA, FRAC_PI_2), (JointType::BALL_ANGLE, 0.3)],
            )
            .add_segment_with_params(
                JointType::Ball,
                1.0,
                &[
                    (JointType::BALL_THETA, FRAC_PI_2),
                    (JointType::BALL_PHI, FRAC_PI_2),
                    (JointType::BALL_ANGLE, 0.2),
                ],
            )
            .build()
    }

    fn anchored_body(chain: &BuiltChain) -> Body {
        let mut body = Body::new(chain.root()).with_config(NudgeConfig::default().with_step(0.01));
        body.anchor(&chain.rig, chain.root().into(), true, true);
        body
    }

    #[test]
    fn anchors_track_both_maps() {
        let chain = bent_chain();
        let mut body = Body::new(chain.root());
        let tip: ComponentId = chain.tip.into();
        body.anchor(&chain.rig, tip, true, false);
        assert!(body.is_anchored(tip));
        body.anchor(&chain.rig, tip, false, true);
        assert!(body.is_anchored(tip));
        assert_eq!(body.anchors().len(), 1);
        body.unanchor(tip);
        assert!(!body.is_anchored(tip));
        assert!(body.anchors().is_empty());
    }

    #[test]
    fn route_visits_each_socket_once_from_the_effector() {
        let chain = bent_chain();
        let body = anchored_body(&chain);
        let route = body.route_sockets(&chain.rig, chain.tip.into());
        assert_eq!(route, vec![chain.sockets[1], chain.sockets[0]]);
    }

    #[test]
    fn anchored_effector_is_rejected() {
        let mut chain = bent_chain();
        let body = anchored_body(&chain);
        let before: Vec<_> = chain.rig.poses().collect();
        let root = chain.root();
        assert!(!body.set_translation(&mut chain.rig, root.into(), Vec3::ONE));
        let after: Vec<_> = chain.rig.poses().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn zero_displacement_and_missing_anchors_are_rejected() {
        let mut chain = bent_chain();
        let tip: ComponentId = chain.tip.into();
        let here = chain.rig.global_translation(tip).unwrap();

        let body = anchored_body(&chain);
        assert!(!body.set_translation(&mut chain.rig, tip, here));

        let loose = Body::new(chain.root());
        assert!(!loose.set_translation(&mut chain.rig, tip, here + Vec3::X));
    }

    #[test]
    fn single_nudge_moves_tip_toward_target() {
        let mut chain = bent_chain();
        let body = anchored_body(&chain);
        let tip: ComponentId = chain.tip.into();
        let target = Vec3::new(0.8, 0.6, 1.8);
        let before = chain.rig.global_translation(tip).unwrap().distance(target);

        assert!(body.set_translation(&mut chain.rig, tip, target));
        let after = chain.rig.global_translation(tip).unwrap().distance(target);
        assert!(after < before, "{after} >= {before}");
    }

    #[test]
    fn hard_update_restores_anchor_pose() {
        let mut chain = bent_chain();
        let body = anchored_body(&chain);
        let root: ComponentId = chain.root().into();
        chain
            .rig
            .set_global_pose(root, Pose::from_translation(Vec3::new(5.0, 0.0, 0.0)));
        body.hard_update(&mut chain.rig);

        assert_eq!(chain.rig.global_pose(root), Some(Pose::IDENTITY));
        let first_socket = chain.rig.global_translation(chain.sockets[0].into()).unwrap();
        assert_abs_diff_eq!(first_socket.distance(Vec3::Z), 0.0, epsilon = 1e-6);
    }

    fn three_links() -> BuiltChain {
        RigBuilder::new()
            .add_segment_with_params(
                JointType::Ball,
                1.0,
                &[(JointType::BALL_THETA, FRAC_PI_2), (JointType::BALL_ANGLE, 0.3)],
            )
            .add_segment_with_params(
                JointType::Ball,
                1.0,
                &[(JointType::BALL_THETA, FRAC_PI_2), (JointType::BALL_ANGLE, -0.4)],
            )
            .add_segment_with_params(
                JointType::Ball,
                1.0,
                &[(JointType::BALL_THETA, FRAC_PI_2), (JointType::BALL_PHI, FRAC_PI_2), (JointType::BALL_ANGLE, 0.2)],
            )
            .build()
    }

    fn assert_pose_held(rig: &Rig, id: ComponentId, before: Pose) {
        let after = rig.global_pose(id).unwrap();
        assert_abs_diff_eq!(after.translation.distance(before.translation), 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(after.rotation.distance(before.rotation), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn bone_between_two_anchors_stays_put() {
        let mut chain = three_links();
        let (first, last): (ComponentId, ComponentId) = (chain.root().into(), chain.last_bone().into());
        let middle: ComponentId = chain.bones[2].into();
        let mut body = Body::new(chain.root()).with_config(NudgeConfig::default().with_step(0.01));
        body.anchor(&chain.rig, first, true, true);
        body.anchor(&chain.rig, last, true, true);
        let (first_pose, last_pose) = (chain.rig.global_pose(first).unwrap(), chain.rig.global_pose(last).unwrap());

        assert!(body.route_sockets(&chain.rig, middle).is_empty());
        let target = chain.rig.global_translation(middle).unwrap() + Vec3::new(0.5, 0.5, 0.0);
        for _ in 0..20 {
            body.set_translation(&mut chain.rig, middle, target);
        }
        assert_pose_held(&chain.rig, first, first_pose);
        assert_pose_held(&chain.rig, last, last_pose);
    }

    #[test]
    fn nudge_skips_pairs_behind_a_second_anchor() {
        let mut chain = three_links();
        let anchors: [ComponentId; 2] = [chain.bones[0].into(), chain.bones[1].into()];
        let mut body = Body::new(chain.root()).with_config(NudgeConfig::default().with_step(0.01));
        for anchor in anchors {
            body.anchor(&chain.rig, anchor, true, true);
        }
        let held: Vec<Pose> = anchors.iter().map(|&a| chain.rig.global_pose(a).unwrap()).collect();

        let tip: ComponentId = chain.tip.into();
        assert_eq!(body.route_sockets(&chain.rig, tip), vec![chain.sockets[2], chain.sockets[1]]);

        let target = chain.rig.global_translation(tip).unwrap() + Vec3::new(0.3, 0.3, -0.3);
        let start = chain.rig.global_translation(tip).unwrap().distance(target);
        for _ in 0..50 {
            body.set_translation(&mut chain.rig, tip, target);
        }
        let end = chain.rig.global_translation(tip).unwrap().distance(target);
        assert!(end < start, "{end} >= {start}");
        for (&anchor, &pose) in anchors.iter().zip(&held) {
            assert_pose_held(&chain.rig, anchor, pose);
        }
    }

    #[test]
    fn hard_update_places_every_anchored_piece() {
        let mut chain = bent_chain();
        chain.rig.detach(chain.sockets[1].into());
        let last: ComponentId = chain.last_bone().into();
        let mut body = anchored_body(&chain);
        body.anchor(&chain.rig, last, true, true);
        let held = chain.rig.global_pose(last).unwrap();

        chain.rig.set_global_pose(last, Pose::from_translation(Vec3::ONE));
        body.hard_update(&mut chain.rig);
        assert_eq!(chain.rig.global_pose(last), Some(held));
        let tip = chain.rig.global_translation(chain.tip.into()).unwrap();
        assert_abs_diff_eq!(tip.distance(held.transform_point(Vec3::Z)), 0.0, epsilon = 1e-5);
    }
}
