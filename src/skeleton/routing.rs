use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use super::component::{ComponentId, ConnectionId};
use super::rig::Rig;
use crate::tree::{NodeId, Tree};

impl Rig {
    /// Tree of shortest routes from `from` to every reachable component in
    /// `targets`. Branches leading to no target are pruned away, so the
    /// leaves are targets and every interior node lies on some route.
    ///
    /// Returns an empty tree when `targets` is empty or `from` is unknown.
    pub fn build_tree_to_targets(
        &self,
        from: ComponentId,
        targets: &BTreeSet<ComponentId>,
    ) -> Tree<ComponentId> {
        if targets.is_empty() || !self.contains(from) {
            return Tree::empty();
        }
        let mut tree = Tree::new(from);
        let Some(root) = tree.root() else {
            return tree;
        };

        let mut found: HashMap<ComponentId, NodeId> = HashMap::new();
        if targets.contains(&from) {
            found.insert(from, root);
        }
        let mut visited: HashSet<ComponentId> = HashSet::from([from]);
        let mut queue = VecDeque::from([(root, from)]);

        while found.len() < targets.len() {
            let Some((node, id)) = queue.pop_front() else {
                break;
            };
            for next in self.connected_components(id) {
                if !visited.insert(next) {
                    continue;
                }
                let Some(child) = tree.add_child(node, next) else {
                    continue;
                };
                if targets.contains(&next) {
                    found.insert(next, child);
                }
                queue.push_back((child, next));
            }
        }

        if found.len() < targets.len() {
            log::trace!(
                "{} of {} targets reachable from {from:?}",
                found.len(),
                targets.len()
            );
        }
        let leafset: HashSet<NodeId> = found.into_values().collect();
        tree.prune_to_leafset(&leafset);
        if leafset.is_empty() {
            return Tree::empty();
        }
        tree
    }

    /// Spanning tree grown from `conn` across its pairing, away from the bone
    /// it is attached to. Empty when `conn` is not coupled.
    pub fn connection_tree(&self, conn: ConnectionId) -> Tree<ComponentId> {
        match self.opposing_connection(conn) {
            Some(partner) => self.tree_towards(conn.into(), &[partner.into()]),
            None => Tree::empty(),
        }
    }

    /// Spanning tree grown from `conn` into the bone it is attached to,
    /// never crossing its pairing.
    pub fn bone_tree(&self, conn: ConnectionId) -> Tree<ComponentId> {
        match self.connection(conn).and_then(|c| c.bone()) {
            Some(bone) => self.tree_towards(conn.into(), &[bone.into()]),
            None => Tree::empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Pose;
    use crate::skeleton::{BoneId, JointType};
    use glam::Vec3;

    /// A - B - C - D - E joined by ball pairs, plus F hanging off B.
    fn branched() -> (Rig, Vec<BoneId>) {
        let mut rig = Rig::new();
        let bones: Vec<BoneId> = (0..6).map(|_| rig.add_bone(Pose::IDENTITY)).collect();
        let link = |rig: &mut Rig, parent: BoneId, child: BoneId| {
            let s = rig.add_socket(JointType::Ball, Some(parent), Pose::from_translation(Vec3::Z));
            let j = rig.add_joint(JointType::Ball, Some(child), Pose::IDENTITY);
            assert!(rig.couple(j, s));
        };
        for pair in bones[..5].windows(2) {
            link(&mut rig, pair[0], pair[1]);
        }
        link(&mut rig, bones[1], bones[5]);
        (rig, bones)
    }

    fn bone_leaves(tree: &Tree<ComponentId>) -> BTreeSet<BoneId> {
        tree.leaves()
            .into_iter()
            .filter_map(|n| tree.data(n).and_then(|id| id.as_bone()))
            .collect()
    }

    #[test]
    fn no_targets_gives_empty_tree() {
        let (rig, bones) = branched();
        let tree = rig.build_tree_to_targets(bones[0].into(), &BTreeSet::new());
        assert!(tree.is_empty());
    }

    #[test]
    fn routes_keep_only_target_branches() {
        let (rig, bones) = branched();
        let targets = BTreeSet::from([ComponentId::Bone(bones[2]), ComponentId::Bone(bones[4])]);
        let tree = rig.build_tree_to_targets(bones[0].into(), &targets);

        assert_eq!(bone_leaves(&tree), BTreeSet::from([bones[4]]));
        assert!(tree.find(|&id| id == ComponentId::Bone(bones[2])).is_some());
        assert!(tree.find(|&id| id == ComponentId::Bone(bones[5])).is_none());
        // Four links of socket, joint and far bone after the root.
        assert_eq!(tree.len(), 13);
    }

    #[test]
    fn unreachable_targets_give_empty_tree() {
        let (mut rig, bones) = branched();
        let lonely = rig.add_bone(Pose::IDENTITY);
        let targets = BTreeSet::from([ComponentId::Bone(lonely)]);
        assert!(rig.build_tree_to_targets(bones[0].into(), &targets).is_empty());
    }

    #[test]
    fn connection_and_bone_trees_split_at_the_pairing() {
        let (rig, bones) = branched();
        let s = rig.connections(bones[0])[0];
        let outward = rig.connection_tree(s);
        let inward = rig.bone_tree(s);
        assert!(outward.find(|&id| id == ComponentId::Bone(bones[4])).is_some());
        assert!(outward.find(|&id| id == ComponentId::Bone(bones[0])).is_none());
        assert_eq!(inward.len(), 2);
    }
}
