//! # Phylogenetic Tree
//!
//! Arena-allocated rooted tree. Nodes live in a flat `Vec` and refer to each
//! other through [`NodeIdx`], so traversals are plain index loops without
//! `Rc`/`RefCell` plumbing.
//!
//! The tree is immutable once built. Every internal node carries a unique
//! name; unnamed internal nodes are labelled `NODE_0000000`, `NODE_0000001`,
//! ... in pre-order when the tree is constructed.

use std::collections::HashMap;

use crate::error::{PangoError, Result};

/// Zero-cost newtype for node indices
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NodeIdx(pub u32);

impl NodeIdx {
    pub fn new(idx: u32) -> Self {
        Self(idx)
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl TryFrom<usize> for NodeIdx {
    type Error = PangoError;

    fn try_from(idx: usize) -> Result<Self> {
        u32::try_from(idx)
            .map(Self)
            .map_err(|_| PangoError::invalid_data(format!("node index {} exceeds u32 range", idx)))
    }
}

impl From<NodeIdx> for usize {
    fn from(idx: NodeIdx) -> usize {
        idx.0 as usize
    }
}

/// A single clade
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Node {
    /// Label; always `Some` for internal nodes after [`Tree::new`]
    pub name: Option<String>,
    pub parent: Option<NodeIdx>,
    pub children: Vec<NodeIdx>,
    pub branch_length: Option<f64>,
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Rooted tree with a name index
#[derive(Clone, Debug)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeIdx,
    name_to_idx: HashMap<String, NodeIdx>,
}

impl Tree {
    /// Finalize an arena into a tree.
    ///
    /// Names unnamed internal nodes and rejects duplicate labels.
    pub fn new(mut nodes: Vec<Node>, root: NodeIdx) -> Result<Self> {
        if root.as_usize() >= nodes.len() {
            return Err(PangoError::invalid_data(format!(
                "root index {} out of range for {} nodes",
                root.0,
                nodes.len()
            )));
        }

        let order = pre_order_from(&nodes, root);
        let mut next_internal = 0usize;
        for &idx in &order {
            let node = &mut nodes[idx.as_usize()];
            if !node.is_leaf() && node.name.is_none() {
                node.name = Some(format!("NODE_{:07}", next_internal));
                next_internal += 1;
            }
        }

        let mut name_to_idx = HashMap::with_capacity(nodes.len());
        for &idx in &order {
            if let Some(name) = &nodes[idx.as_usize()].name {
                if name_to_idx.insert(name.clone(), idx).is_some() {
                    return Err(PangoError::DuplicateNodeName { name: name.clone() });
                }
            }
        }

        Ok(Self {
            nodes,
            root,
            name_to_idx,
        })
    }

    /// Total number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> NodeIdx {
        self.root
    }

    #[inline]
    pub fn node(&self, idx: NodeIdx) -> &Node {
        &self.nodes[idx.as_usize()]
    }

    #[inline]
    pub fn name(&self, idx: NodeIdx) -> Option<&str> {
        self.nodes[idx.as_usize()].name.as_deref()
    }

    #[inline]
    pub fn children(&self, idx: NodeIdx) -> &[NodeIdx] {
        &self.nodes[idx.as_usize()].children
    }

    #[inline]
    pub fn is_leaf(&self, idx: NodeIdx) -> bool {
        self.nodes[idx.as_usize()].is_leaf()
    }

    /// Look up a node by label
    pub fn find(&self, name: &str) -> Option<NodeIdx> {
        self.name_to_idx.get(name).copied()
    }

    /// All nodes, parents before children, children left to right
    pub fn pre_order(&self) -> Vec<NodeIdx> {
        pre_order_from(&self.nodes, self.root)
    }

    /// All nodes, children before parents
    pub fn post_order(&self) -> Vec<NodeIdx> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(self.root, false)];
        while let Some((idx, expanded)) = stack.pop() {
            if expanded {
                order.push(idx);
                continue;
            }
            stack.push((idx, true));
            for &child in self.children(idx).iter().rev() {
                stack.push((child, false));
            }
        }
        order
    }

    /// Internal nodes in pre-order
    pub fn internal_nodes(&self) -> Vec<NodeIdx> {
        self.pre_order()
            .into_iter()
            .filter(|&idx| !self.is_leaf(idx))
            .collect()
    }

    /// Leaves, left to right
    pub fn leaves(&self) -> Vec<NodeIdx> {
        self.pre_order()
            .into_iter()
            .filter(|&idx| self.is_leaf(idx))
            .collect()
    }

    /// Number of leaves
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Names of every named leaf below `idx`, left to right.
    ///
    /// A leaf passed in directly yields its own name.
    pub fn descendant_leaf_names(&self, idx: NodeIdx) -> Vec<&str> {
        pre_order_from(&self.nodes, idx)
            .into_iter()
            .filter(|&i| self.is_leaf(i))
            .filter_map(|i| self.name(i))
            .collect()
    }
}

fn pre_order_from(nodes: &[Node], start: NodeIdx) -> Vec<NodeIdx> {
    let mut order = Vec::new();
    let mut stack = vec![start];
    while let Some(idx) = stack.pop() {
        order.push(idx);
        for &child in nodes[idx.as_usize()].children.iter().rev() {
            stack.push(child);
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    /// ((a,b)X,(c,d),e)root
    fn small_tree() -> Tree {
        let mut nodes = vec![Node::default(); 8];
        let link = |nodes: &mut Vec<Node>, parent: usize, child: usize| {
            nodes[parent].children.push(NodeIdx::try_from(child).unwrap());
            nodes[child].parent = Some(NodeIdx::try_from(parent).unwrap());
        };
        nodes[0].name = Some("root".to_string());
        nodes[1].name = Some("X".to_string());
        for (i, name) in [(2, "a"), (3, "b"), (5, "c"), (6, "d"), (7, "e")] {
            nodes[i].name = Some(name.to_string());
        }
        link(&mut nodes, 0, 1);
        link(&mut nodes, 1, 2);
        link(&mut nodes, 1, 3);
        link(&mut nodes, 0, 4);
        link(&mut nodes, 4, 5);
        link(&mut nodes, 4, 6);
        link(&mut nodes, 0, 7);
        Tree::new(nodes, NodeIdx::new(0)).unwrap()
    }

    #[test]
    fn test_node_idx_conversion_is_checked() {
        assert_eq!(NodeIdx::try_from(7usize).unwrap(), NodeIdx::new(7));
        assert_eq!(usize::from(NodeIdx::new(u32::MAX)), u32::MAX as usize);
        #[cfg(target_pointer_width = "64")]
        assert!(matches!(
            NodeIdx::try_from(u32::MAX as usize + 1),
            Err(PangoError::InvalidData { .. })
        ));
    }

    #[test]
    fn test_unnamed_internal_nodes_get_names() {
        let tree = small_tree();
        assert_eq!(tree.name(NodeIdx::new(4)), Some("NODE_0000000"));
        assert_eq!(tree.find("NODE_0000000"), Some(NodeIdx::new(4)));
    }

    #[test]
    fn test_internal_nodes_pre_order() {
        let tree = small_tree();
        let names: Vec<&str> = tree
            .internal_nodes()
            .into_iter()
            .filter_map(|i| tree.name(i))
            .collect();
        assert_eq!(names, vec!["root", "X", "NODE_0000000"]);
    }

    #[test]
    fn test_post_order_children_first() {
        let tree = small_tree();
        let order = tree.post_order();
        assert_eq!(order.len(), 8);
        assert_eq!(*order.last().unwrap(), tree.root());
        let pos = |i: usize| order.iter().position(|&x| x == NodeIdx::new(i as u32)).unwrap();
        assert!(pos(2) < pos(1));
        assert!(pos(3) < pos(1));
        assert!(pos(1) < pos(0));
        assert!(pos(5) < pos(4));
    }

    #[test]
    fn test_descendant_leaf_names() {
        let tree = small_tree();
        assert_eq!(tree.descendant_leaf_names(tree.root()), vec!["a", "b", "c", "d", "e"]);
        assert_eq!(tree.descendant_leaf_names(NodeIdx::new(1)), vec!["a", "b"]);
        assert_eq!(tree.descendant_leaf_names(NodeIdx::new(7)), vec!["e"]);
        assert_eq!(tree.n_leaves(), 5);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut nodes = vec![Node::default(); 3];
        nodes[0].children = vec![NodeIdx::new(1), NodeIdx::new(2)];
        nodes[1].name = Some("dup".to_string());
        nodes[2].name = Some("dup".to_string());
        let err = Tree::new(nodes, NodeIdx::new(0)).unwrap_err();
        assert!(matches!(err, PangoError::DuplicateNodeName { name } if name == "dup"));
    }
}
