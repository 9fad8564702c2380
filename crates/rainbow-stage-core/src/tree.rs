//! Uid-addressed node tree and its query layer.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::types::{Node, NodeUid, ROOT_NODE_UID};

/// Flat map from uid to node. The root is always present.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeTree {
    nodes: HashMap<NodeUid, Node>,
}

impl NodeTree {
    pub fn with_root(root: Node) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(root.uid.clone(), root);
        Self { nodes }
    }

    pub fn get(&self, uid: &str) -> Option<&Node> {
        self.nodes.get(uid)
    }

    pub fn get_mut(&mut self, uid: &str) -> Option<&mut Node> {
        self.nodes.get_mut(uid)
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.nodes.contains_key(uid)
    }

    /// Insert a node as is. Links are the caller's responsibility.
    pub fn insert(&mut self, node: Node) -> Option<Node> {
        self.nodes.insert(node.uid.clone(), node)
    }

    /// Insert `node` as the last child of `parent_uid`.
    ///
    /// Sets the child's `parent_uid` and clears the parent's `is_entity`.
    /// Returns false (and inserts nothing) if the parent is unknown.
    pub fn attach(&mut self, parent_uid: &NodeUid, mut node: Node) -> bool {
        let Some(parent) = self.nodes.get_mut(parent_uid) else {
            tracing::warn!(%parent_uid, uid = %node.uid, "attach to unknown parent");
            return false;
        };
        parent.children.push(node.uid.clone());
        parent.is_entity = false;
        node.parent_uid = Some(parent_uid.clone());
        self.nodes.insert(node.uid.clone(), node);
        true
    }

    pub fn root(&self) -> Option<&Node> {
        self.nodes.get(ROOT_NODE_UID)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Copy of the tree without invalid (text and doctype) nodes.
    ///
    /// Removed nodes are also dropped from their parents' `children`.
    pub fn valid_tree(&self) -> NodeTree {
        let nodes = self
            .nodes
            .values()
            .filter(|node| node.valid())
            .map(|node| {
                let mut node = node.clone();
                node.children
                    .retain(|child| self.nodes.get(child).is_some_and(Node::valid));
                (node.uid.clone(), node)
            })
            .collect();
        NodeTree { nodes }
    }

    /// Uids of the ancestors of `uid`, nearest first. Excludes `uid` itself.
    pub fn ancestors(&self, uid: &str) -> Vec<NodeUid> {
        let mut out = Vec::new();
        let mut current = self.get(uid).and_then(|node| node.parent_uid.clone());
        while let Some(parent_uid) = current {
            // A malformed tree must not loop forever.
            if out.contains(&parent_uid) {
                break;
            }
            current = self.get(&parent_uid).and_then(|node| node.parent_uid.clone());
            out.push(parent_uid);
        }
        out
    }

    /// Whether `ancestor` is a strict ancestor of `uid`.
    pub fn is_descendant_of(&self, uid: &str, ancestor: &str) -> bool {
        self.ancestors(uid).iter().any(|a| a == ancestor)
    }

    /// Nearest ancestor-or-self of `uid` whose parent is the `body` element.
    pub fn body_level_uid(&self, uid: &str) -> Option<NodeUid> {
        let mut current = self.get(uid)?;
        loop {
            let parent = self.get(current.parent_uid.as_deref()?)?;
            if parent.data.tag_name() == "body" {
                return Some(current.uid.clone());
            }
            current = parent;
        }
    }

    pub fn has_text_child(&self, uid: &str) -> bool {
        self.get(uid).is_some_and(|node| {
            node.children
                .iter()
                .filter_map(|child| self.get(child))
                .any(|child| child.data.is_text())
        })
    }

    /// Whether any strict descendant of `uid` satisfies `pred`.
    pub fn any_descendant(&self, uid: &str, mut pred: impl FnMut(&Node) -> bool) -> bool {
        subtree_uids_bfs(uid, self)
            .iter()
            .skip(1)
            .filter_map(|d| self.get(d))
            .any(|node| pred(node))
    }
}

/// Uids of the subtree rooted at `root_uid`, breadth-first, starting with
/// `root_uid` itself. Empty if it is not in the tree.
pub fn subtree_uids_bfs(root_uid: &str, tree: &NodeTree) -> Vec<NodeUid> {
    let Some(start) = tree.get(root_uid) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let mut queue = VecDeque::from([start.uid.clone()]);
    while let Some(uid) = queue.pop_front() {
        if let Some(node) = tree.get(&uid) {
            queue.extend(node.children.iter().cloned());
        }
        out.push(uid);
    }
    out
}

/// Filter `candidates` down to uids of real nodes in `tree`.
///
/// Keeps input order. Drops unknown uids, the root, and repeats.
pub fn valid_uids<I, U>(tree: &NodeTree, candidates: I) -> Vec<NodeUid>
where
    I: IntoIterator<Item = U>,
    U: AsRef<str>,
{
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter_map(|uid| {
            let uid = uid.as_ref();
            let node = tree.get(uid)?;
            (!node.is_root() && seen.insert(node.uid.clone())).then(|| node.uid.clone())
        })
        .collect()
}
