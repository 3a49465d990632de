use std::fmt;

use generational_arena::{Arena, Index};
use termtree::Tree;
use tracing::instrument;

use crate::domain::entities::{ClusterGraph, NodeId};

/// Data payload for core tree nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    /// Node in the originating graph
    pub node: NodeId,
    /// Display name, e.g. `K2C1`
    pub name: String,
    pub size: usize,
    /// In-proportion of the core edge leading here, `None` for roots
    pub in_proportion: Option<f64>,
}

impl fmt::Display for NodeData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.in_proportion {
            Some(p) => write!(f, "{} (n={}, p={:.2})", self.name, self.size, p),
            None => write!(f, "{} (n={})", self.name, self.size),
        }
    }
}

/// Tree node in the arena-based hierarchy structure.
#[derive(Debug)]
pub struct TreeNode {
    pub data: NodeData,
    /// Index of parent node in the arena, None for root nodes
    pub parent: Option<Index>,
    /// Indices of child nodes in the arena
    pub children: Vec<Index>,
}

/// Spanning tree of a clustering graph that keeps only core edges.
///
/// Each node hangs under the cluster that contributed the largest share of
/// its samples. Nodes without a core incoming edge start a tree of their own.
#[derive(Debug)]
pub struct CoreTree {
    arena: Arena<TreeNode>,
    root: Option<Index>,
}

impl Default for CoreTree {
    fn default() -> Self {
        Self::new()
    }
}

impl CoreTree {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            root: None,
        }
    }

    /// Build one core tree per root node, roots in graph order.
    #[instrument(level = "debug", skip(graph))]
    pub fn from_graph(graph: &ClusterGraph) -> Vec<CoreTree> {
        let mut children: Vec<Vec<(NodeId, f64)>> = vec![Vec::new(); graph.nodes.len()];
        let mut has_parent = vec![false; graph.nodes.len()];
        for edge in graph.edges.iter().filter(|e| e.is_core) {
            children[edge.source].push((edge.target, edge.in_proportion));
            has_parent[edge.target] = true;
        }

        (0..graph.nodes.len())
            .filter(|&id| !has_parent[id])
            .map(|root| {
                let mut tree = CoreTree::new();
                let mut stack = vec![(root, None, None)];
                while let Some((id, proportion, parent_idx)) = stack.pop() {
                    let node = &graph.nodes[id];
                    let data = NodeData {
                        node: id,
                        name: node.name.clone(),
                        size: node.size,
                        in_proportion: proportion,
                    };
                    let idx = tree.insert_node(data, parent_idx);
                    // Reverse so children come out in graph order.
                    for &(child, p) in children[id].iter().rev() {
                        stack.push((child, Some(p), Some(idx)));
                    }
                }
                tree
            })
            .collect()
    }

    #[instrument(level = "trace", skip(self))]
    pub fn insert_node(&mut self, data: NodeData, parent: Option<Index>) -> Index {
        let node = TreeNode {
            data,
            parent,
            children: Vec::new(),
        };
        let node_idx = self.arena.insert(node);

        if let Some(parent_idx) = parent {
            if let Some(parent) = self.arena.get_mut(parent_idx) {
                parent.children.push(node_idx);
            }
        } else {
            self.root = Some(node_idx);
        }

        node_idx
    }

    pub fn get_node(&self, idx: Index) -> Option<&TreeNode> {
        self.arena.get(idx)
    }

    pub fn root(&self) -> Option<Index> {
        self.root
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn iter(&self) -> TreeIterator<'_> {
        TreeIterator::new(self)
    }

    pub fn iter_postorder(&self) -> PostOrderIterator<'_> {
        PostOrderIterator::new(self)
    }

    pub fn depth(&self) -> usize {
        self.root.map(|root| self.calculate_depth(root)).unwrap_or(0)
    }

    fn calculate_depth(&self, node_idx: Index) -> usize {
        if let Some(node) = self.get_node(node_idx) {
            1 + node
                .children
                .iter()
                .map(|&child| self.calculate_depth(child))
                .max()
                .unwrap_or(0)
        } else {
            0
        }
    }

    /// Names of all leaf nodes, left to right.
    pub fn leaf_nodes(&self) -> Vec<String> {
        self.iter()
            .filter(|(_, node)| node.children.is_empty())
            .map(|(_, node)| node.data.name.clone())
            .collect()
    }

    /// Render for terminal display.
    pub fn to_termtree(&self) -> Tree<String> {
        fn build(tree: &CoreTree, idx: Index) -> Tree<String> {
            match tree.get_node(idx) {
                Some(node) => Tree::new(node.data.to_string()).with_leaves(
                    node.children
                        .iter()
                        .map(|&child| build(tree, child))
                        .collect::<Vec<_>>(),
                ),
                None => Tree::new(String::new()),
            }
        }

        match self.root {
            Some(root) => build(self, root),
            None => Tree::new("Empty tree".to_string()),
        }
    }
}

pub struct TreeIterator<'a> {
    tree: &'a CoreTree,
    stack: Vec<Index>,
}

impl<'a> TreeIterator<'a> {
    fn new(tree: &'a CoreTree) -> Self {
        let mut stack = Vec::new();
        if let Some(root) = tree.root() {
            stack.push(root);
        }
        Self { tree, stack }
    }
}

impl<'a> Iterator for TreeIterator<'a> {
    type Item = (Index, &'a TreeNode);

    fn next(&mut self) -> Option<Self::Item> {
        let current_idx = self.stack.pop()?;
        let node = self.tree.get_node(current_idx)?;
        // Push children in reverse order for left-to-right traversal
        for &child in node.children.iter().rev() {
            self.stack.push(child);
        }
        Some((current_idx, node))
    }
}

pub struct PostOrderIterator<'a> {
    tree: &'a CoreTree,
    stack: Vec<(Index, bool)>,
}

impl<'a> PostOrderIterator<'a> {
    fn new(tree: &'a CoreTree) -> Self {
        let mut stack = Vec::new();
        if let Some(root) = tree.root() {
            stack.push((root, false));
        }
        Self { tree, stack }
    }
}

impl<'a> Iterator for PostOrderIterator<'a> {
    type Item = (Index, &'a TreeNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((current_idx, visited)) = self.stack.pop() {
            if let Some(node) = self.tree.get_node(current_idx) {
                if !visited {
                    self.stack.push((current_idx, true));
                    for &child in node.children.iter().rev() {
                        self.stack.push((child, false));
                    }
                } else {
                    return Some((current_idx, node));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::builder::{ColumnSelection, TreeBuilder, TreeOptions};
    use crate::domain::table::{MissingValues, Table};

    fn graph() -> ClusterGraph {
        let missing = MissingValues::default();
        let table = Table::from_columns(vec![
            ("K1", missing.cells(&["1", "1", "1", "1", "1", "1"])),
            ("K2", missing.cells(&["1", "1", "1", "2", "2", "2"])),
            ("K3", missing.cells(&["1", "1", "2", "3", "3", "3"])),
        ])
        .unwrap();
        TreeBuilder::new(TreeOptions::new(ColumnSelection::by_prefix("K")))
            .build(&table)
            .unwrap()
    }

    #[test]
    fn given_nested_clusterings_when_building_core_tree_then_single_tree() {
        let trees = CoreTree::from_graph(&graph());

        assert_eq!(trees.len(), 1);
        assert_eq!(trees[0].len(), 6);
        assert_eq!(trees[0].depth(), 3);
        assert_eq!(trees[0].leaf_nodes(), vec!["K3C1", "K3C2", "K3C3"]);
    }

    #[test]
    fn given_core_tree_when_iterating_postorder_then_root_comes_last() {
        let trees = CoreTree::from_graph(&graph());

        let names: Vec<String> = trees[0]
            .iter_postorder()
            .map(|(_, n)| n.data.name.clone())
            .collect();

        assert_eq!(names.first().map(String::as_str), Some("K3C1"));
        assert_eq!(names.last().map(String::as_str), Some("K1C1"));
    }

    #[test]
    fn given_core_tree_when_rendering_then_shows_sizes() {
        let trees = CoreTree::from_graph(&graph());

        let rendered = trees[0].to_termtree().to_string();

        assert!(rendered.starts_with("K1C1 (n=6)"));
        assert!(rendered.contains("K2C2 (n=3, p=1.00)"));
    }

    #[test]
    fn given_empty_tree_when_rendering_then_placeholder() {
        let tree = CoreTree::new();
        assert!(tree.is_empty());
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.to_termtree().to_string().trim(), "Empty tree");
    }
}
