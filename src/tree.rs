//! Arena-indexed rooted tree used for transient routing queries.
//!
//! Nodes are addressed by [`NodeId`]. Removing a node unlinks it from its
//! parent and invalidates its whole subtree; ids are never reused within one
//! tree, so a stale id simply stops resolving.

use std::collections::{HashSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct Node<T> {
    data: T,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    depth: usize,
    live: bool,
}

#[derive(Debug, Clone)]
pub struct Tree<T> {
    nodes: Vec<Node<T>>,
    root: Option<NodeId>,
}

impl<T> Default for Tree<T> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
        }
    }
}

impl<T> Tree<T> {
    pub fn new(root: T) -> Self {
        Self {
            nodes: vec![Node {
                data: root,
                parent: None,
                children: Vec::new(),
                depth: 0,
                live: true,
            }],
            root: Some(NodeId(0)),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.live).count()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.node(node).is_some()
    }

    fn node(&self, id: NodeId) -> Option<&Node<T>> {
        self.nodes.get(id.0).filter(|n| n.live)
    }

    /// Appends a child under `parent`. Returns `None` if `parent` is not in
    /// the tree.
    pub fn add_child(&mut self, parent: NodeId, data: T) -> Option<NodeId> {
        let depth = self.node(parent)?.depth + 1;
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            parent: Some(parent),
            children: Vec::new(),
            depth,
            live: true,
        });
        self.nodes[parent.0].children.push(id);
        Some(id)
    }

    pub fn data(&self, node: NodeId) -> Option<&T> {
        self.node(node).map(|n| &n.data)
    }

    pub fn data_mut(&mut self, node: NodeId) -> Option<&mut T> {
        self.nodes
            .get_mut(node.0)
            .filter(|n| n.live)
            .map(|n| &mut n.data)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).and_then(|n| n.parent)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.node(node).map_or(&[], |n| n.children.as_slice())
    }

    pub fn depth(&self, node: NodeId) -> Option<usize> {
        self.node(node).map(|n| n.depth)
    }

    /// Walks from `node`'s parent up to the root.
    pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(node), move |&n| self.parent(n))
    }

    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.ancestors(node).any(|a| a == ancestor)
    }

    /// Unlinks `node` from its parent, then drops it and every descendant.
    pub fn remove(&mut self, node: NodeId) {
        if !self.contains(node) {
            return;
        }
        if let Some(parent) = self.nodes[node.0].parent {
            self.nodes[parent.0].children.retain(|&c| c != node);
        } else {
            self.root = None;
        }

        let mut doomed = vec![node];
        while let Some(id) = doomed.pop() {
            let entry = &mut self.nodes[id.0];
            entry.live = false;
            entry.parent = None;
            doomed.append(&mut entry.children);
        }
    }

    /// Moves `node` and its subtree under `new_parent`.
    ///
    /// Returns `false` (and changes nothing) when `new_parent` lies inside the
    /// moved subtree or either node is missing.
    pub fn reparent(&mut self, node: NodeId, new_parent: NodeId) -> bool {
        if !self.contains(node)
            || !self.contains(new_parent)
            || node == new_parent
            || self.is_ancestor(node, new_parent)
        {
            return false;
        }
        match self.nodes[node.0].parent {
            Some(old) => self.nodes[old.0].children.retain(|&c| c != node),
            // Only reachable when `node` is the root, which is an ancestor of
            // every other live node.
            None => return false,
        }
        self.nodes[node.0].parent = Some(new_parent);
        self.nodes[new_parent.0].children.push(node);

        let base = self.nodes[new_parent.0].depth + 1;
        let mut queue = vec![(node, base)];
        while let Some((id, depth)) = queue.pop() {
            self.nodes[id.0].depth = depth;
            queue.extend(self.nodes[id.0].children.iter().map(|&c| (c, depth + 1)));
        }
        true
    }

    /// Euler-tour order: a leaf appears once, an internal node appears once
    /// on entry and once more after each of its children.
    pub fn dfs_sequence(&self) -> Vec<NodeId> {
        let Some(root) = self.root else {
            return Vec::new();
        };
        let mut sequence = vec![root];
        let mut stack = vec![(root, 0usize)];
        while let Some((node, next)) = stack.last_mut() {
            let children = self.children(*node);
            if *next < children.len() {
                let child = children[*next];
                *next += 1;
                sequence.push(child);
                stack.push((child, 0));
            } else {
                stack.pop();
                if let Some((parent, _)) = stack.last() {
                    sequence.push(*parent);
                }
            }
        }
        sequence
    }

    pub fn bfs_sequence(&self) -> Vec<NodeId> {
        let Some(root) = self.root else {
            return Vec::new();
        };
        let mut sequence = Vec::new();
        let mut queue = VecDeque::from([root]);
        while let Some(node) = queue.pop_front() {
            sequence.push(node);
            queue.extend(self.children(node).iter().copied());
        }
        sequence
    }

    pub fn bfs_data_sequence(&self) -> Vec<&T> {
        self.bfs_sequence()
            .into_iter()
            .filter_map(|n| self.data(n))
            .collect()
    }

    /// Pre-order traversal: every node exactly once, parents before children.
    pub fn preorder(&self) -> Vec<NodeId> {
        let Some(root) = self.root else {
            return Vec::new();
        };
        let mut sequence = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            sequence.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        sequence
    }

    /// Leaves in left-to-right order.
    pub fn leaves(&self) -> Vec<NodeId> {
        self.preorder()
            .into_iter()
            .filter(|&n| self.children(n).is_empty())
            .collect()
    }

    pub fn left_most_leaf(&self) -> Option<NodeId> {
        let mut node = self.root?;
        while let Some(&first) = self.children(node).first() {
            node = first;
        }
        Some(node)
    }

    pub fn path_to_left_most_leaf(&self) -> Vec<NodeId> {
        let Some(mut node) = self.root else {
            return Vec::new();
        };
        let mut path = vec![node];
        while let Some(&first) = self.children(node).first() {
            node = first;
            path.push(node);
        }
        path
    }

    /// Number of generations below `node` (0 for a leaf).
    pub fn descendant_generations(&self, node: NodeId) -> usize {
        self.children(node)
            .iter()
            .map(|&c| 1 + self.descendant_generations(c))
            .max()
            .unwrap_or(0)
    }

    /// Ancestors of `node` that branch into more than one child, nearest first.
    pub fn upstream_forks(&self, node: NodeId) -> Vec<NodeId> {
        self.ancestors(node)
            .filter(|&a| self.children(a).len() > 1)
            .collect()
    }

    /// Path from `from` to `to` through their deepest common ancestor, both
    /// ends included. Empty if either node is missing.
    pub fn find_path(&self, from: NodeId, to: NodeId) -> Vec<NodeId> {
        if !self.contains(from) || !self.contains(to) {
            return Vec::new();
        }
        let up: Vec<NodeId> = std::iter::once(from).chain(self.ancestors(from)).collect();
        let mut down: Vec<NodeId> = std::iter::once(to).chain(self.ancestors(to)).collect();

        let Some(meet) = up.iter().position(|n| down.contains(n)) else {
            return Vec::new();
        };
        let common = up[meet];
        let Some(split) = down.iter().position(|&n| n == common) else {
            return Vec::new();
        };
        down.truncate(split);
        down.reverse();

        let mut path = up[..=meet].to_vec();
        path.extend(down);
        path
    }

    /// Removes every branch that leads to none of `targets`. Targets and all
    /// of their ancestors survive; descendants of a target survive only when
    /// they lead to another target.
    pub fn prune_to_leafset(&mut self, targets: &HashSet<NodeId>) {
        let mut keep: HashSet<NodeId> = HashSet::new();
        if let Some(root) = self.root {
            keep.insert(root);
        }
        for &target in targets {
            if self.contains(target) {
                keep.insert(target);
                keep.extend(self.ancestors(target));
            }
        }
        let doomed: Vec<NodeId> = self
            .bfs_sequence()
            .into_iter()
            .filter(|n| !keep.contains(n))
            .filter(|&n| self.parent(n).map_or(false, |p| keep.contains(&p)))
            .collect();
        for node in doomed {
            self.remove(node);
        }
    }

    pub fn find(&self, mut predicate: impl FnMut(&T) -> bool) -> Option<NodeId> {
        self.bfs_sequence()
            .into_iter()
            .find(|&n| self.data(n).map_or(false, &mut predicate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_tree() -> (Tree<char>, Vec<NodeId>) {
        let mut tree = Tree::new('A');
        let mut ids = vec![tree.root().unwrap()];
        for label in ['B', 'C', 'D', 'E'] {
            let parent = *ids.last().unwrap();
            ids.push(tree.add_child(parent, label).unwrap());
        }
        (tree, ids)
    }

    #[test]
    fn empty_tree_yields_empty_sequences() {
        let tree: Tree<u32> = Tree::empty();
        assert!(tree.is_empty());
        assert!(tree.dfs_sequence().is_empty());
        assert!(tree.bfs_sequence().is_empty());
        assert!(tree.leaves().is_empty());
        assert!(tree.path_to_left_most_leaf().is_empty());
        assert_eq!(tree.left_most_leaf(), None);
    }

    #[test]
    fn dfs_repeats_internal_nodes_once_per_child() {
        let mut tree = Tree::new("root");
        let root = tree.root().unwrap();
        let a = tree.add_child(root, "a").unwrap();
        let b = tree.add_child(root, "b").unwrap();
        let a1 = tree.add_child(a, "a1").unwrap();
        let a2 = tree.add_child(a, "a2").unwrap();

        assert_eq!(tree.dfs_sequence(), vec![root, a, a1, a, a2, a, root, b, root]);
        assert_eq!(tree.bfs_sequence(), vec![root, a, b, a1, a2]);
        assert_eq!(tree.leaves(), vec![a1, a2, b]);
        assert_eq!(tree.path_to_left_most_leaf(), vec![root, a, a1]);
        assert_eq!(tree.descendant_generations(root), 2);
        assert_eq!(tree.upstream_forks(a1), vec![a, root]);
    }

    #[test]
    fn prune_keeps_ancestor_chains_of_targets() {
        let (mut tree, ids) = path_tree();
        let side = tree.add_child(ids[1], 'F').unwrap();
        let tail = tree.add_child(ids[4], 'G').unwrap();

        let targets = HashSet::from([ids[2], ids[4]]);
        tree.prune_to_leafset(&targets);

        assert!(!tree.contains(side));
        assert!(!tree.contains(tail));
        assert_eq!(tree.len(), 5);
        assert_eq!(tree.leaves(), vec![ids[4]]);
        assert_eq!(tree.find_path(ids[0], ids[2]), ids[..3].to_vec());
        assert_eq!(tree.find_path(ids[0], ids[4]), ids.clone());
    }

    #[test]
    fn find_path_crosses_common_ancestor() {
        let mut tree = Tree::new(0);
        let root = tree.root().unwrap();
        let left = tree.add_child(root, 1).unwrap();
        let right = tree.add_child(root, 2).unwrap();
        let deep = tree.add_child(right, 3).unwrap();

        assert_eq!(tree.find_path(left, deep), vec![left, root, right, deep]);
        assert_eq!(tree.find_path(deep, deep), vec![deep]);
    }

    #[test]
    fn remove_unlinks_subtree() {
        let (mut tree, ids) = path_tree();
        tree.remove(ids[2]);
        assert_eq!(tree.len(), 2);
        assert!(tree.children(ids[1]).is_empty());
        assert!(!tree.contains(ids[4]));
        assert_eq!(tree.data(ids[3]), None);

        tree.remove(ids[0]);
        assert!(tree.is_empty());
        assert!(tree.dfs_sequence().is_empty());
    }

    #[test]
    fn reparent_updates_depths_and_rejects_cycles() {
        let (mut tree, ids) = path_tree();
        assert!(!tree.reparent(ids[1], ids[3]));
        assert!(tree.reparent(ids[3], ids[0]));
        assert_eq!(tree.depth(ids[3]), Some(1));
        assert_eq!(tree.depth(ids[4]), Some(2));
        assert_eq!(tree.children(ids[2]), &[] as &[NodeId]);
    }
}
