//! Directory view over index names, for staging batch renames and deletes.
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]. A detached
//! node stays in the arena but is no longer reachable from the root, so it
//! drops out of [`NameTree::to_names`].

use crate::digest::Digest;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Handle of a node in a [`NameTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct Node {
    name: String,
    parent: Option<NodeId>,
    children: BTreeMap<String, NodeId>,
    digest: Option<Digest>,
}

/// Result of moving or renaming a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The node now lives at the new place.
    Moved,
    /// The target already held the same digest; the moved node was dropped.
    Discarded,
    /// The target name is taken by something else. Nothing changed.
    Collision,
    /// Moving the root, into its own subtree, or to an empty name.
    Invalid,
}

/// Arena-backed tree of `/`-separated names.
///
/// # Examples
///
/// ```
/// use cairn_core::{Digest, NameTree};
///
/// let d = Digest::of_bytes(b"x");
/// let mut tree = NameTree::from_names([("old/a.txt", &d)]);
/// let file = tree.lookup("old/a.txt").unwrap();
/// let dest = tree.mkdir("new");
/// tree.move_into(file, dest);
///
/// assert_eq!(tree.to_names().keys().collect::<Vec<_>>(), vec!["new/a.txt"]);
/// ```
#[derive(Debug, Clone)]
pub struct NameTree {
    nodes: Vec<Node>,
}

impl Default for NameTree {
    fn default() -> Self {
        Self::new()
    }
}

impl NameTree {
    /// An empty tree holding only the root directory.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                name: String::new(),
                parent: None,
                children: BTreeMap::new(),
                digest: None,
            }],
        }
    }

    /// Builds a tree from `(name, digest)` pairs.
    pub fn from_names<'a, I>(names: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a Digest)>,
    {
        let mut tree = Self::new();
        for (name, digest) in names {
            let id = tree.mkdir(name);
            tree.nodes[id.0].digest = Some(*digest);
        }
        tree
    }

    /// The root directory.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Finds the node for `path`.
    pub fn lookup(&self, path: &str) -> Option<NodeId> {
        let mut node = self.root();
        for part in split(path) {
            node = *self.nodes[node.0].children.get(part)?;
        }
        Some(node)
    }

    /// Returns the node for `path`, creating missing directories on the way.
    pub fn mkdir(&mut self, path: &str) -> NodeId {
        let mut node = self.root();
        for part in split(path) {
            node = match self.nodes[node.0].children.get(part) {
                Some(&child) => child,
                None => self.push_child(node, part),
            };
        }
        node
    }

    fn push_child(&mut self, parent: NodeId, name: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name: name.to_string(),
            parent: Some(parent),
            children: BTreeMap::new(),
            digest: None,
        });
        self.nodes[parent.0].children.insert(name.to_string(), id);
        id
    }

    /// Last path component of a node.
    pub fn name(&self, id: NodeId) -> &str {
        &self.nodes[id.0].name
    }

    /// Parent handle; `None` for the root and for detached nodes.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Digest of a file node.
    pub fn digest(&self, id: NodeId) -> Option<Digest> {
        self.nodes[id.0].digest
    }

    /// Children in name order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = (&str, NodeId)> + '_ {
        self.nodes[id.0]
            .children
            .iter()
            .map(|(name, &child)| (name.as_str(), child))
    }

    /// Full `/`-joined path of a node.
    pub fn path_of(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        let mut node = id;
        while let Some(parent) = self.nodes[node.0].parent {
            parts.push(self.nodes[node.0].name.as_str());
            node = parent;
        }
        parts.reverse();
        parts.join("/")
    }

    /// Moves `node` into directory `dir`, keeping its name.
    pub fn move_into(&mut self, node: NodeId, dir: NodeId) -> MoveOutcome {
        let name = self.nodes[node.0].name.clone();
        self.move_to(node, dir, &name)
    }

    /// Renames `node` within its current directory.
    pub fn rename(&mut self, node: NodeId, new_name: &str) -> MoveOutcome {
        match self.nodes[node.0].parent {
            Some(parent) => self.move_to(node, parent, new_name),
            None => MoveOutcome::Invalid,
        }
    }

    /// Moves `node` into `dir` under `new_name`.
    ///
    /// When `new_name` is taken: a file with the same digest absorbs the moved
    /// node, anything else is a collision that is logged and skipped.
    pub fn move_to(&mut self, node: NodeId, dir: NodeId, new_name: &str) -> MoveOutcome {
        let Some(old_parent) = self.nodes[node.0].parent else {
            return MoveOutcome::Invalid;
        };
        if new_name.is_empty() || new_name.contains('/') || self.is_within(dir, node) {
            return MoveOutcome::Invalid;
        }

        if let Some(&existing) = self.nodes[dir.0].children.get(new_name) {
            if existing == node {
                return MoveOutcome::Moved;
            }
            let ours = self.nodes[node.0].digest;
            let theirs = self.nodes[existing.0].digest;
            if ours.is_some() && ours == theirs {
                debug!(name = new_name, "discarding duplicate");
                self.detach(node);
                return MoveOutcome::Discarded;
            }
            warn!(
                from = %self.path_of(node),
                to = %self.path_of(existing),
                "name collision, skipping move"
            );
            return MoveOutcome::Collision;
        }

        let old_name = std::mem::replace(&mut self.nodes[node.0].name, new_name.to_string());
        self.nodes[old_parent.0].children.remove(&old_name);
        self.nodes[dir.0].children.insert(new_name.to_string(), node);
        self.nodes[node.0].parent = Some(dir);
        MoveOutcome::Moved
    }

    /// Detaches `node` and everything below it. Returns the digests that
    /// were reachable through it.
    pub fn remove(&mut self, node: NodeId) -> Vec<Digest> {
        if node == self.root() {
            return Vec::new();
        }
        let removed = self.collect(node).into_values().collect();
        self.detach(node);
        removed
    }

    /// Flattens the tree back into a name map.
    pub fn to_names(&self) -> BTreeMap<String, Digest> {
        self.collect(self.root())
    }

    fn collect(&self, start: NodeId) -> BTreeMap<String, Digest> {
        let mut names = BTreeMap::new();
        let mut todo = vec![start];
        while let Some(id) = todo.pop() {
            let node = &self.nodes[id.0];
            if let Some(digest) = node.digest {
                names.insert(self.path_of(id), digest);
            }
            todo.extend(node.children.values().copied());
        }
        names
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            let name = self.nodes[node.0].name.clone();
            self.nodes[parent.0].children.remove(&name);
        }
    }

    /// True when `id` is `ancestor` or lies below it.
    fn is_within(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut node = Some(id);
        while let Some(n) = node {
            if n == ancestor {
                return true;
            }
            node = self.nodes[n.0].parent;
        }
        false
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|p| !p.is_empty())
}
