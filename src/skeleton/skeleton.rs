use rand::Rng;

use super::component::{BoneId, ComponentId, JointId, SocketId};
use super::rig::Rig;
use crate::tree::Tree;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SkeletonId(pub(crate) u32);

/// Membership view over the bones reachable from a root bone.
///
/// The view owns nothing. Creating a skeleton stamps its id on every
/// reachable bone, which also takes those bones out of any earlier view.
#[derive(Debug, Clone)]
pub struct Skeleton {
    id: SkeletonId,
    root: BoneId,
}

impl Skeleton {
    pub fn new(rig: &mut Rig, root: BoneId) -> Self {
        let id = rig.next_skeleton_id();
        for bone in rig.reachable_bones(root, None) {
            if let Some(b) = rig.bone_mut(bone) {
                b.skeleton = Some(id);
            }
        }
        Self { id, root }
    }

    pub fn id(&self) -> SkeletonId {
        self.id
    }

    pub fn root(&self) -> BoneId {
        self.root
    }

    pub fn bones(&self, rig: &Rig) -> Vec<BoneId> {
        rig.bone_ids()
            .filter(|&b| rig.bone(b).and_then(|bone| bone.skeleton()) == Some(self.id))
            .collect()
    }

    pub fn contains(&self, rig: &Rig, bone: BoneId) -> bool {
        rig.bone(bone).and_then(|b| b.skeleton()) == Some(self.id)
    }

    pub fn sockets(&self, rig: &Rig) -> Vec<SocketId> {
        self.bones(rig)
            .into_iter()
            .filter_map(|b| rig.bone(b))
            .flat_map(|b| b.sockets().iter().copied())
            .collect()
    }

    pub fn joints(&self, rig: &Rig) -> Vec<JointId> {
        self.bones(rig)
            .into_iter()
            .filter_map(|b| rig.bone(b))
            .flat_map(|b| b.joints().iter().copied())
            .collect()
    }

    /// Coupled pairs whose socket belongs to this skeleton.
    pub fn socket_joints(&self, rig: &Rig) -> Vec<(SocketId, JointId)> {
        self.sockets(rig)
            .into_iter()
            .filter_map(|s| Some((s, rig.socket(s)?.joint()?)))
            .collect()
    }

    /// Forward kinematics from the root bone, or over `tree` when given.
    pub fn update_globals(&self, rig: &mut Rig, tree: Option<&Tree<ComponentId>>) {
        match tree {
            Some(tree) => rig.update_globals(tree),
            None => {
                let tree = rig.component_tree(self.root.into());
                rig.update_globals(&tree);
            }
        }
    }

    /// Perturbs every socket by `amplitude`, then re-runs forward kinematics.
    pub fn jiggle<R: Rng + ?Sized>(&self, rig: &mut Rig, rng: &mut R, amplitude: f32) {
        for socket in self.sockets(rig) {
            if let Some(s) = rig.socket_mut(socket) {
                s.perturb_joint(rng, amplitude);
            }
        }
        self.update_globals(rig, None);
    }
}
