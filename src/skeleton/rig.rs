use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use glam::Vec3;

use super::component::{BoneId, ComponentId, ConnectionId, JointId, JointType, SocketId};
use super::connection::{Bone, Connection, Joint, Socket};
use super::skeleton::SkeletonId;
use crate::math::Pose;
use crate::tree::{NodeId, Tree};

/// Arena owning every bone, joint and socket of a scene.
///
/// Components are addressed by stable handles. Every mutation of the
/// bone/connection and joint/socket links goes through this type, which keeps
/// both directions of each link in step.
#[derive(Debug, Clone, Default)]
pub struct Rig {
    bones: Vec<Option<Bone>>,
    joints: Vec<Option<Joint>>,
    sockets: Vec<Option<Socket>>,
    next_skeleton: u32,
}

impl Rig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bone(&mut self, pose: Pose) -> BoneId {
        let id = BoneId(self.bones.len() as u32);
        self.bones.push(Some(Bone {
            pose,
            ..Bone::default()
        }));
        id
    }

    pub fn add_labeled_bone(&mut self, label: impl Into<String>, pose: Pose) -> BoneId {
        let id = self.add_bone(pose);
        if let Some(bone) = self.bone_mut(id) {
            bone.label = Some(label.into());
        }
        id
    }

    pub fn add_joint(&mut self, joint_type: JointType, bone: Option<BoneId>, offset: Pose) -> JointId {
        let id = JointId(self.joints.len() as u32);
        self.joints.push(Some(Joint {
            connection: Connection::new(joint_type, offset),
            socket: None,
        }));
        if let Some(bone) = bone {
            self.attach(id.into(), bone);
        }
        id
    }

    pub fn add_socket(&mut self, joint_type: JointType, bone: Option<BoneId>, offset: Pose) -> SocketId {
        let id = SocketId(self.sockets.len() as u32);
        self.sockets
            .push(Some(Socket::new(Connection::new(joint_type, offset))));
        if let Some(bone) = bone {
            self.attach(id.into(), bone);
        }
        id
    }

    pub fn bone(&self, id: BoneId) -> Option<&Bone> {
        self.bones.get(id.0 as usize).and_then(Option::as_ref)
    }

    pub(crate) fn bone_mut(&mut self, id: BoneId) -> Option<&mut Bone> {
        self.bones.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    pub fn joint(&self, id: JointId) -> Option<&Joint> {
        self.joints.get(id.0 as usize).and_then(Option::as_ref)
    }

    fn joint_mut(&mut self, id: JointId) -> Option<&mut Joint> {
        self.joints.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    pub fn socket(&self, id: SocketId) -> Option<&Socket> {
        self.sockets.get(id.0 as usize).and_then(Option::as_ref)
    }

    /// Parameter edits through this handle take effect on global poses at the
    /// next forward-kinematics pass.
    pub fn socket_mut(&mut self, id: SocketId) -> Option<&mut Socket> {
        self.sockets.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        match id {
            ConnectionId::Joint(j) => self.joint(j).map(|j| &j.connection),
            ConnectionId::Socket(s) => self.socket(s).map(|s| &s.connection),
        }
    }

    fn connection_mut(&mut self, id: ConnectionId) -> Option<&mut Connection> {
        match id {
            ConnectionId::Joint(j) => self.joint_mut(j).map(|j| &mut j.connection),
            ConnectionId::Socket(s) => self.socket_mut(s).map(|s| &mut s.connection),
        }
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        match id {
            ComponentId::Bone(b) => self.bone(b).is_some(),
            ComponentId::Joint(j) => self.joint(j).is_some(),
            ComponentId::Socket(s) => self.socket(s).is_some(),
        }
    }

    pub fn bone_ids(&self) -> impl Iterator<Item = BoneId> + '_ {
        self.bones
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_some())
            .map(|(i, _)| BoneId(i as u32))
    }

    pub fn joint_ids(&self) -> impl Iterator<Item = JointId> + '_ {
        self.joints
            .iter()
            .enumerate()
            .filter(|(_, j)| j.is_some())
            .map(|(i, _)| JointId(i as u32))
    }

    pub fn socket_ids(&self) -> impl Iterator<Item = SocketId> + '_ {
        self.sockets
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(i, _)| SocketId(i as u32))
    }

    pub(crate) fn next_skeleton_id(&mut self) -> SkeletonId {
        let id = SkeletonId(self.next_skeleton);
        self.next_skeleton += 1;
        id
    }

    // ---- attachment -------------------------------------------------------

    /// Anchors `conn` to `bone`. Leaving a previous bone decouples it first,
    /// as `detach` does. The global pose is rebuilt from the bone's.
    pub fn attach(&mut self, conn: ConnectionId, bone: BoneId) -> bool {
        let Some(previous) = self.connection(conn).map(Connection::bone) else {
            return false;
        };
        let Some(bone_pose) = self.bone(bone).map(|b| b.pose) else {
            return false;
        };
        if previous == Some(bone) {
            return true;
        }
        if let Some(previous) = previous {
            self.decouple(conn);
            self.unlink_from_bone(conn, previous);
        }

        if let Some(b) = self.bone_mut(bone) {
            match conn {
                ConnectionId::Joint(j) => b.joints.insert(j),
                ConnectionId::Socket(s) => b.sockets.insert(s),
            };
        }
        if let Some(c) = self.connection_mut(conn) {
            c.bone = Some(bone);
            c.pose = bone_pose.compose(&c.offset);
        }
        debug_assert!(self.is_consistent());
        true
    }

    /// Releases `conn` from its bone, decoupling it first. Returns whether it
    /// was attached.
    pub fn detach(&mut self, conn: ConnectionId) -> bool {
        let Some(Some(bone)) = self.connection(conn).map(Connection::bone) else {
            return false;
        };
        self.decouple(conn);
        self.unlink_from_bone(conn, bone);
        if let Some(c) = self.connection_mut(conn) {
            c.bone = None;
        }
        debug_assert!(self.is_consistent());
        true
    }

    fn unlink_from_bone(&mut self, conn: ConnectionId, bone: BoneId) {
        if let Some(b) = self.bone_mut(bone) {
            match conn {
                ConnectionId::Joint(j) => b.joints.remove(&j),
                ConnectionId::Socket(s) => b.sockets.remove(&s),
            };
        }
    }

    // ---- coupling ---------------------------------------------------------

    /// Pairs `joint` with `socket`. Rejected when the joint types differ or
    /// either side is not attached to a bone. Existing pairings of either side
    /// are severed first.
    pub fn couple(&mut self, joint: JointId, socket: SocketId) -> bool {
        let (Some(j), Some(s)) = (self.joint(joint), self.socket(socket)) else {
            return false;
        };
        if j.socket == Some(socket) {
            return true;
        }
        if j.connection.joint_type != s.connection.joint_type {
            log::debug!(
                "refusing to couple {:?} ({:?}) with {:?} ({:?}): type mismatch",
                joint,
                j.connection.joint_type,
                socket,
                s.connection.joint_type
            );
            return false;
        }
        if j.connection.bone.is_none() || s.connection.bone.is_none() {
            log::debug!("refusing to couple {joint:?} with {socket:?}: detached connection");
            return false;
        }

        self.decouple(joint.into());
        self.decouple(socket.into());
        if let Some(j) = self.joint_mut(joint) {
            j.socket = Some(socket);
        }
        if let Some(s) = self.socket_mut(socket) {
            s.joint = Some(joint);
        }
        debug_assert!(self.is_consistent());
        true
    }

    /// Severs the pairing of `conn`, keeping both bone attachments. Returns
    /// the former partner.
    pub fn decouple(&mut self, conn: ConnectionId) -> Option<ConnectionId> {
        let partner = self.opposing_connection(conn)?;
        let (joint, socket) = match (conn, partner) {
            (ConnectionId::Joint(j), ConnectionId::Socket(s))
            | (ConnectionId::Socket(s), ConnectionId::Joint(j)) => (j, s),
            _ => return None,
        };
        if let Some(j) = self.joint_mut(joint) {
            j.socket = None;
        }
        if let Some(s) = self.socket_mut(socket) {
            s.joint = None;
        }
        Some(partner)
    }

    pub fn opposing_connection(&self, conn: ConnectionId) -> Option<ConnectionId> {
        match conn {
            ConnectionId::Joint(j) => self.joint(j)?.socket.map(ConnectionId::Socket),
            ConnectionId::Socket(s) => self.socket(s)?.joint.map(ConnectionId::Joint),
        }
    }

    pub fn opposing_bone(&self, conn: ConnectionId) -> Option<BoneId> {
        let partner = self.opposing_connection(conn)?;
        self.connection(partner)?.bone
    }

    // ---- adjacency --------------------------------------------------------

    pub fn connections(&self, bone: BoneId) -> Vec<ConnectionId> {
        let Some(b) = self.bone(bone) else {
            return Vec::new();
        };
        b.joints
            .iter()
            .map(|&j| ConnectionId::Joint(j))
            .chain(b.sockets.iter().map(|&s| ConnectionId::Socket(s)))
            .collect()
    }

    pub fn has_connection(&self, bone: BoneId, conn: ConnectionId) -> bool {
        self.connection(conn).and_then(Connection::bone) == Some(bone)
    }

    /// Components one hop away: a bone's connections, or a connection's bone
    /// followed by its partner.
    pub fn connected_components(&self, id: ComponentId) -> Vec<ComponentId> {
        match id.as_connection() {
            None => match id.as_bone() {
                Some(b) => self
                    .connections(b)
                    .into_iter()
                    .map(ComponentId::from)
                    .collect(),
                None => Vec::new(),
            },
            Some(conn) => {
                let Some(c) = self.connection(conn) else {
                    return Vec::new();
                };
                c.bone
                    .map(ComponentId::Bone)
                    .into_iter()
                    .chain(self.opposing_connection(conn).map(Into::into))
                    .collect()
            }
        }
    }

    pub fn get_connection_to_bone(&self, from: BoneId, to: BoneId) -> Option<ConnectionId> {
        self.connections(from)
            .into_iter()
            .find(|&c| self.opposing_bone(c) == Some(to))
    }

    /// Neighbouring bones of `bone`, each keyed to the connection on `bone`
    /// that reaches it.
    pub fn connection_to_bones(&self, bone: BoneId) -> BTreeMap<BoneId, ConnectionId> {
        let mut map = BTreeMap::new();
        for conn in self.connections(bone) {
            if let Some(other) = self.opposing_bone(conn) {
                map.entry(other).or_insert(conn);
            }
        }
        map
    }

    /// Connected component of the bone graph containing `bone`. Traversal
    /// never crosses `exclude` (in either direction of its pairing).
    pub fn reachable_bones(&self, bone: BoneId, exclude: Option<ConnectionId>) -> BTreeSet<BoneId> {
        self.reachable_bone_paths(bone, exclude).into_keys().collect()
    }

    pub fn reachable_bone_paths(
        &self,
        bone: BoneId,
        exclude: Option<ConnectionId>,
    ) -> BTreeMap<BoneId, Vec<ConnectionId>> {
        let mut paths = BTreeMap::new();
        if self.bone(bone).is_none() {
            return paths;
        }
        let blocked: HashSet<ConnectionId> = exclude
            .into_iter()
            .chain(exclude.and_then(|c| self.opposing_connection(c)))
            .collect();

        paths.insert(bone, Vec::new());
        let mut queue = VecDeque::from([bone]);
        while let Some(current) = queue.pop_front() {
            for conn in self.connections(current) {
                if blocked.contains(&conn) {
                    continue;
                }
                let Some(partner) = self.opposing_connection(conn) else {
                    continue;
                };
                let Some(next) = self.connection(partner).and_then(Connection::bone) else {
                    continue;
                };
                if paths.contains_key(&next) {
                    continue;
                }
                let mut route = paths.get(&current).cloned().unwrap_or_default();
                route.push(conn);
                route.push(partner);
                paths.insert(next, route);
                queue.push_back(next);
            }
        }
        paths
    }

    // ---- poses ------------------------------------------------------------

    pub fn global_pose(&self, id: ComponentId) -> Option<Pose> {
        match id {
            ComponentId::Bone(b) => self.bone(b).map(|b| b.pose),
            ComponentId::Joint(j) => self.joint(j).map(|j| j.connection.pose),
            ComponentId::Socket(s) => self.socket(s).map(|s| s.connection.pose),
        }
    }

    pub fn global_translation(&self, id: ComponentId) -> Option<Vec3> {
        self.global_pose(id).map(|p| p.translation)
    }

    pub fn global_rotation(&self, id: ComponentId) -> Option<Vec3> {
        self.global_pose(id).map(|p| p.rotation)
    }

    pub fn set_global_pose(&mut self, id: ComponentId, pose: Pose) -> bool {
        let slot = match id {
            ComponentId::Bone(b) => self.bone_mut(b).map(|b| &mut b.pose),
            ComponentId::Joint(j) => self.joint_mut(j).map(|j| &mut j.connection.pose),
            ComponentId::Socket(s) => self.socket_mut(s).map(|s| &mut s.connection.pose),
        };
        match slot {
            Some(slot) => {
                *slot = pose;
                true
            }
            None => false,
        }
    }

    /// Sets `id`'s global pose, then re-places its direct neighbours from
    /// their fixed offsets: a bone moves all its connections, a connection
    /// moves its bone. Does not recurse further.
    pub fn local_update_global_pose(&mut self, id: ComponentId, translation: Vec3, rotation: Vec3) -> bool {
        let pose = Pose::new(translation, rotation);
        if !self.set_global_pose(id, pose) {
            return false;
        }
        match id {
            ComponentId::Bone(b) => {
                for conn in self.connections(b) {
                    if let Some(c) = self.connection_mut(conn) {
                        c.pose = pose.compose(&c.offset);
                    }
                }
            }
            ComponentId::Joint(_) | ComponentId::Socket(_) => {
                let Some(conn) = id.as_connection() else {
                    return true;
                };
                let Some(c) = self.connection(conn) else {
                    return true;
                };
                if let Some(bone) = c.bone {
                    let bone_pose = pose.compose(&c.offset.inverse());
                    self.set_global_pose(bone.into(), bone_pose);
                }
            }
        }
        true
    }

    /// Pose of `to` expressed in `from`'s frame, for adjacent components.
    pub fn relative_pose(&self, from: ComponentId, to: ComponentId) -> Option<Pose> {
        match (from, to) {
            (ComponentId::Bone(b), _) => {
                let conn = to.as_connection()?;
                self.has_connection(b, conn)
                    .then(|| self.connection(conn).map(Connection::offset))?
            }
            (_, ComponentId::Bone(b)) => {
                let conn = from.as_connection()?;
                self.has_connection(b, conn)
                    .then(|| self.connection(conn).map(|c| c.offset.inverse()))?
            }
            (ComponentId::Socket(s), ComponentId::Joint(j)) => {
                let socket = self.socket(s)?;
                (socket.joint == Some(j)).then(|| socket.to_joint())
            }
            (ComponentId::Joint(j), ComponentId::Socket(s)) => {
                let socket = self.socket(s)?;
                (socket.joint == Some(j)).then(|| socket.to_joint().inverse())
            }
            _ => None,
        }
    }

    /// Forward kinematics over `tree`. The root's pose is taken as correct;
    /// every other node is placed from its parent in pre-order.
    pub fn update_globals(&mut self, tree: &Tree<ComponentId>) {
        for node in tree.preorder() {
            let Some(parent) = tree.parent(node) else {
                continue;
            };
            let (Some(&parent_id), Some(&child_id)) = (tree.data(parent), tree.data(node)) else {
                continue;
            };
            let Some(parent_pose) = self.global_pose(parent_id) else {
                continue;
            };
            match self.relative_pose(parent_id, child_id) {
                Some(relative) => {
                    self.set_global_pose(child_id, parent_pose.compose(&relative));
                }
                None => log::warn!("{parent_id:?} and {child_id:?} are not adjacent"),
            }
        }
    }

    pub fn poses(&self) -> impl Iterator<Item = (ComponentId, Pose)> + '_ {
        let bones = self
            .bone_ids()
            .filter_map(|b| self.bone(b).map(|bone| (ComponentId::Bone(b), bone.pose)));
        let joints = self
            .joint_ids()
            .filter_map(|j| self.joint(j).map(|joint| (ComponentId::Joint(j), joint.connection.pose)));
        let sockets = self
            .socket_ids()
            .filter_map(|s| self.socket(s).map(|socket| (ComponentId::Socket(s), socket.connection.pose)));
        bones.chain(joints).chain(sockets)
    }

    // ---- lifecycle --------------------------------------------------------

    pub fn remove_bone(&mut self, bone: BoneId) -> Option<Bone> {
        for conn in self.connections(bone) {
            self.detach(conn);
        }
        self.bones.get_mut(bone.0 as usize).and_then(Option::take)
    }

    pub fn remove_connection(&mut self, conn: ConnectionId) -> bool {
        self.decouple(conn);
        self.detach(conn);
        match conn {
            ConnectionId::Joint(j) => self
                .joints
                .get_mut(j.0 as usize)
                .and_then(Option::take)
                .is_some(),
            ConnectionId::Socket(s) => self
                .sockets
                .get_mut(s.0 as usize)
                .and_then(Option::take)
                .is_some(),
        }
    }

    /// Both directions of every bone/connection and joint/socket link agree.
    pub fn is_consistent(&self) -> bool {
        let bones_ok = self.bone_ids().all(|b| {
            self.connections(b)
                .into_iter()
                .all(|c| self.connection(c).and_then(Connection::bone) == Some(b))
        });
        let joints_ok = self.joint_ids().all(|j| {
            let Some(joint) = self.joint(j) else {
                return false;
            };
            let anchored = joint.connection.bone.map_or(true, |b| {
                self.bone(b).map_or(false, |bone| bone.joints.contains(&j))
            });
            let paired = joint
                .socket
                .map_or(true, |s| self.socket(s).and_then(Socket::joint) == Some(j));
            anchored && paired
        });
        let sockets_ok = self.socket_ids().all(|s| {
            let Some(socket) = self.socket(s) else {
                return false;
            };
            let anchored = socket.connection.bone.map_or(true, |b| {
                self.bone(b).map_or(false, |bone| bone.sockets.contains(&s))
            });
            let paired = socket
                .joint
                .map_or(true, |j| self.joint(j).and_then(Joint::socket) == Some(s));
            anchored && paired
        });
        bones_ok && joints_ok && sockets_ok
    }

    // ---- spanning trees ---------------------------------------------------

    pub fn component_tree(&self, root: ComponentId) -> Tree<ComponentId> {
        self.spanning_tree(root, None)
    }

    /// Spanning tree from `root` whose first hops are limited to
    /// `first_hops`. Used to grow a tree out of one side of a connection.
    pub fn tree_towards(&self, root: ComponentId, first_hops: &[ComponentId]) -> Tree<ComponentId> {
        self.spanning_tree(root, Some(first_hops))
    }

    fn spanning_tree(&self, root: ComponentId, first_hops: Option<&[ComponentId]>) -> Tree<ComponentId> {
        if !self.contains(root) {
            return Tree::empty();
        }
        let mut tree = Tree::new(root);
        let Some(root_node) = tree.root() else {
            return tree;
        };
        let mut visited: HashSet<ComponentId> = HashSet::from([root]);
        let mut queue: VecDeque<(NodeId, ComponentId)> = VecDeque::from([(root_node, root)]);

        while let Some((node, id)) = queue.pop_front() {
            for next in self.connected_components(id) {
                if node == root_node && first_hops.map_or(false, |hops| !hops.contains(&next)) {
                    continue;
                }
                if !visited.insert(next) {
                    continue;
                }
                if let Some(child) = tree.add_child(node, next) {
                    queue.push_back((child, next));
                }
            }
        }
        tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f32::consts::FRAC_PI_2;

    /// Three bones in a line, A -socket/joint- B -socket/joint- C.
    fn line() -> (Rig, [BoneId; 3], [SocketId; 2], [JointId; 2]) {
        let mut rig = Rig::new();
        let a = rig.add_labeled_bone("a", Pose::IDENTITY);
        let b = rig.add_labeled_bone("b", Pose::IDENTITY);
        let c = rig.add_labeled_bone("c", Pose::IDENTITY);
        let offset = Pose::from_translation(Vec3::Z);
        let s0 = rig.add_socket(JointType::Ball, Some(a), offset);
        let j0 = rig.add_joint(JointType::Ball, Some(b), Pose::IDENTITY);
        let s1 = rig.add_socket(JointType::Ball, Some(b), offset);
        let j1 = rig.add_joint(JointType::Ball, Some(c), Pose::IDENTITY);
        assert!(rig.couple(j0, s0));
        assert!(rig.couple(j1, s1));
        (rig, [a, b, c], [s0, s1], [j0, j1])
    }

    #[test]
    fn attach_moves_connection_between_bones() {
        let mut rig = Rig::new();
        let a = rig.add_bone(Pose::IDENTITY);
        let b = rig.add_bone(Pose::from_translation(Vec3::X));
        let j = rig.add_joint(JointType::Pin, Some(a), Pose::from_translation(Vec3::Y));
        assert!(rig.bone(a).unwrap().joints().contains(&j));

        assert!(rig.attach(j.into(), b));
        assert!(!rig.bone(a).unwrap().joints().contains(&j));
        assert!(rig.bone(b).unwrap().joints().contains(&j));
        assert_eq!(rig.joint(j).unwrap().connection().bone(), Some(b));
        assert_eq!(
            rig.global_translation(j.into()),
            Some(Vec3::new(1.0, 1.0, 0.0))
        );
        assert!(rig.is_consistent());
    }

    #[test]
    fn moving_a_coupled_connection_decouples_it() {
        let (mut rig, [a, b, c], [s0, _], [j0, _]) = line();
        assert!(rig.attach(j0.into(), c));
        assert_eq!(rig.joint(j0).unwrap().socket(), None);
        assert_eq!(rig.socket(s0).unwrap().joint(), None);
        assert_eq!(rig.reachable_bones(a, None), BTreeSet::from([a]));
        assert!(!rig.reachable_bones(c, None).contains(&a));
        assert!(rig.bone(b).unwrap().joints().is_empty());
        assert!(rig.is_consistent());
    }

    #[test]
    fn couple_rejects_mismatched_types() {
        let mut rig = Rig::new();
        let a = rig.add_bone(Pose::IDENTITY);
        let b = rig.add_bone(Pose::IDENTITY);
        let j = rig.add_joint(JointType::Pin, Some(a), Pose::IDENTITY);
        let s = rig.add_socket(JointType::Ball, Some(b), Pose::IDENTITY);
        assert!(!rig.couple(j, s));
        assert_eq!(rig.joint(j).unwrap().socket(), None);
        assert_eq!(rig.socket(s).unwrap().joint(), None);
    }

    #[test]
    fn couple_rejects_detached_connections() {
        let mut rig = Rig::new();
        let a = rig.add_bone(Pose::IDENTITY);
        let j = rig.add_joint(JointType::Ball, None, Pose::IDENTITY);
        let s = rig.add_socket(JointType::Ball, Some(a), Pose::IDENTITY);
        assert!(!rig.couple(j, s));
        assert_eq!(rig.opposing_connection(s.into()), None);
    }

    #[test]
    fn pairing_is_symmetric_and_decouple_keeps_bones() {
        let (mut rig, [a, b, _], [s0, _], [j0, _]) = line();
        assert_eq!(rig.joint(j0).unwrap().socket(), Some(s0));
        assert_eq!(rig.socket(s0).unwrap().joint(), Some(j0));
        assert_eq!(rig.opposing_bone(s0.into()), Some(b));

        assert_eq!(rig.decouple(j0.into()), Some(ConnectionId::Socket(s0)));
        assert_eq!(rig.joint(j0).unwrap().socket(), None);
        assert_eq!(rig.socket(s0).unwrap().joint(), None);
        assert_eq!(rig.joint(j0).unwrap().connection().bone(), Some(b));
        assert_eq!(rig.socket(s0).unwrap().connection().bone(), Some(a));
        assert!(rig.is_consistent());
    }

    #[test]
    fn recoupling_releases_previous_partner() {
        let (mut rig, [a, ..], [s0, _], [j0, _]) = line();
        let extra = rig.add_socket(JointType::Ball, Some(a), Pose::IDENTITY);
        assert!(rig.couple(j0, extra));
        assert_eq!(rig.socket(s0).unwrap().joint(), None);
        assert_eq!(rig.socket(extra).unwrap().joint(), Some(j0));
        assert!(rig.is_consistent());
    }

    #[test]
    fn detach_decouples_first() {
        let (mut rig, [_, b, _], [s0, _], [j0, _]) = line();
        assert!(rig.detach(j0.into()));
        assert_eq!(rig.joint(j0).unwrap().connection().bone(), None);
        assert_eq!(rig.socket(s0).unwrap().joint(), None);
        assert!(!rig.bone(b).unwrap().joints().contains(&j0));
        assert!(!rig.detach(j0.into()));
    }

    #[test]
    fn reachability_shrinks_when_links_break() {
        let (mut rig, [a, b, c], [s0, _], _) = line();
        assert_eq!(rig.reachable_bones(a, None), BTreeSet::from([a, b, c]));
        assert_eq!(rig.reachable_bones(a, Some(s0.into())), BTreeSet::from([a]));

        rig.decouple(s0.into());
        assert_eq!(rig.reachable_bones(a, None), BTreeSet::from([a]));
        assert_eq!(rig.reachable_bones(b, None), BTreeSet::from([b, c]));
    }

    #[test]
    fn bone_paths_list_connections_crossed() {
        let (rig, [a, b, c], [s0, s1], [j0, j1]) = line();
        let paths = rig.reachable_bone_paths(a, None);
        assert_eq!(paths[&a], Vec::new());
        assert_eq!(paths[&b], vec![s0.into(), j0.into()]);
        assert_eq!(paths[&c], vec![s0.into(), j0.into(), s1.into(), j1.into()]);
        assert_eq!(rig.get_connection_to_bone(b, a), Some(j0.into()));
        assert_eq!(rig.get_connection_to_bone(a, c), None);
        assert_eq!(
            rig.connection_to_bones(b),
            BTreeMap::from([(a, j0.into()), (c, s1.into())])
        );
    }

    #[test]
    fn connected_components_put_bone_first() {
        let (rig, [a, b, _], [s0, s1], [j0, _]) = line();
        assert_eq!(
            rig.connected_components(s0.into()),
            vec![ComponentId::Bone(a), ComponentId::Joint(j0)]
        );
        assert_eq!(
            rig.connected_components(b.into()),
            vec![ComponentId::Joint(j0), ComponentId::Socket(s1)]
        );
    }

    #[test]
    fn local_update_places_connections_exactly() {
        let mut rig = Rig::new();
        let bone = rig.add_bone(Pose::IDENTITY);
        let offset = Pose::new(Vec3::new(0.5, 0.0, 1.0), Vec3::new(0.0, 0.2, 0.0));
        let s = rig.add_socket(JointType::Pin, Some(bone), offset);

        let t = Vec3::new(1.0, -2.0, 0.5);
        let w = Vec3::new(0.0, 0.0, FRAC_PI_2);
        assert!(rig.local_update_global_pose(bone.into(), t, w));

        let expected = t + crate::math::rotate(offset.translation, w);
        let actual = rig.global_translation(s.into()).unwrap();
        assert_abs_diff_eq!(actual.distance(expected), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn local_update_from_connection_moves_its_bone() {
        let mut rig = Rig::new();
        let bone = rig.add_bone(Pose::IDENTITY);
        let j = rig.add_joint(JointType::Ball, Some(bone), Pose::from_translation(Vec3::Z));
        rig.local_update_global_pose(j.into(), Vec3::new(0.0, 0.0, 3.0), Vec3::ZERO);
        let t = rig.global_translation(bone.into()).unwrap();
        assert_abs_diff_eq!(t.distance(Vec3::new(0.0, 0.0, 2.0)), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn forward_kinematics_follows_socket_params() {
        let (mut rig, [a, _, c], [s0, s1], _) = line();
        for s in [s0, s1] {
            rig.socket_mut(s)
                .unwrap()
                .set_params(&BTreeMap::from([(0, FRAC_PI_2), (1, 0.0), (2, FRAC_PI_2)]));
        }
        let tree = rig.component_tree(a.into());
        assert_eq!(tree.len(), 7);
        rig.update_globals(&tree);

        // A quarter turn about X sends the second link along -Y.
        let tip = rig.global_translation(c.into()).unwrap();
        assert_abs_diff_eq!(tip.distance(Vec3::new(0.0, -1.0, 1.0)), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn forward_kinematics_is_idempotent() {
        let (mut rig, [a, ..], [s0, _], _) = line();
        rig.socket_mut(s0).unwrap().set_param(JointType::BALL_ANGLE, 0.7);
        let tree = rig.component_tree(a.into());
        rig.update_globals(&tree);
        let first: Vec<_> = rig.poses().collect();
        rig.update_globals(&tree);
        let second: Vec<_> = rig.poses().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn relative_pose_requires_adjacency() {
        let (rig, [a, _, c], [s0, _], [j0, _]) = line();
        assert_eq!(
            rig.relative_pose(a.into(), s0.into()),
            Some(Pose::from_translation(Vec3::Z))
        );
        assert_eq!(rig.relative_pose(s0.into(), j0.into()), Some(Pose::IDENTITY));
        assert_eq!(rig.relative_pose(c.into(), s0.into()), None);
    }

    #[test]
    fn tree_towards_grows_one_side_only() {
        let (rig, [a, b, _], [s0, _], [j0, _]) = line();
        let tree = rig.tree_towards(j0.into(), &[b.into()]);
        assert!(tree.find(|&id| id == ComponentId::Bone(a)).is_none());
        assert!(tree.find(|&id| id == ComponentId::Socket(s0)).is_none());
        assert_eq!(tree.len(), 5);
    }

    #[test]
    fn removing_a_bone_detaches_its_connections() {
        let (mut rig, [_, b, _], [s0, s1], [j0, j1]) = line();
        assert!(rig.remove_bone(b).is_some());
        assert!(rig.bone(b).is_none());
        assert_eq!(rig.joint(j0).unwrap().connection().bone(), None);
        assert_eq!(rig.socket(s0).unwrap().joint(), None);
        assert_eq!(rig.joint(j1).unwrap().socket(), None);
        assert_eq!(rig.socket(s1).unwrap().connection().bone(), None);
        assert!(rig.is_consistent());

        assert!(rig.remove_connection(s0.into()));
        assert!(rig.socket(s0).is_none());
        assert!(!rig.remove_connection(s0.into()));
    }
}
