//! Domain entities: labels, attribute values, nodes, edges and the graph

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Position of a node in [`ClusterGraph::nodes`].
pub type NodeId = usize;

/// A discrete cluster label.
///
/// Integer-valued cells (`"3"`, `"3.0"`) become [`Label::Int`], everything else
/// [`Label::Text`]. Fractional numbers are not labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Label {
    Int(i64),
    Text(String),
}

impl Label {
    /// Parse a raw cell into a label.
    ///
    /// Returns `None` when the cell is a finite number with a fractional part,
    /// which cannot identify a cluster.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if let Ok(i) = trimmed.parse::<i64>() {
            return Some(Label::Int(i));
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            if f.is_finite() {
                if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    return Some(Label::Int(f as i64));
                }
                return None;
            }
        }
        Some(Label::Text(trimmed.to_string()))
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Label::Int(i) => Some(*i),
            Label::Text(_) => None,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Int(i) => write!(f, "{}", i),
            Label::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Label {
    fn from(value: i64) -> Self {
        Label::Int(value)
    }
}

impl From<&str> for Label {
    fn from(value: &str) -> Self {
        Label::Text(value.to_string())
    }
}

/// An attribute cell: numeric or categorical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl Value {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<f64>() {
            Ok(f) if f.is_finite() => Value::Number(f),
            _ => Value::Text(trimmed.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(_) => None,
        }
    }

    /// Natural order: numbers ascending, then text lexicographically.
    pub fn natural_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
            (Value::Number(_), Value::Text(_)) => Ordering::Less,
            (Value::Text(_), Value::Number(_)) => Ordering::Greater,
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

/// One clustering column in resolution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Position in the resolution sequence (0 = coarsest)
    pub index: usize,
    /// Resolution name, the column name without prefix/suffix
    pub name: String,
    /// Column the labels were read from
    pub column: String,
}

/// A cluster at a given resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterNode {
    /// Index into [`ClusterGraph::resolutions`]
    pub resolution: usize,
    pub cluster: Label,
    /// Display name, `{column}C{cluster}`
    pub name: String,
    /// Number of samples assigned to this cluster
    pub size: usize,
    /// SC3 stability index in [0, 1]
    pub sc3_stability: f64,
    /// Aggregated attributes keyed `{function}_{attribute}`; `None` when no
    /// sample of the node has a value
    pub aggregates: BTreeMap<String, Option<Value>>,
}

/// Sample flow between adjacent resolutions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterEdge {
    pub source: NodeId,
    pub target: NodeId,
    /// Samples present in both source and target cluster
    pub count: usize,
    /// `count / target.size`
    pub in_proportion: f64,
    /// Highest in-proportion edge into the target
    pub is_core: bool,
}

/// Per-resolution counts, used by the summary output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionSummary {
    pub name: String,
    pub nodes: usize,
    pub samples: usize,
    pub incoming_edges: usize,
}

/// Clustering tree: nodes grouped by resolution, edges between adjacent
/// resolutions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClusterGraph {
    pub resolutions: Vec<Resolution>,
    pub nodes: Vec<ClusterNode>,
    pub edges: Vec<ClusterEdge>,
}

impl ClusterGraph {
    pub fn node(&self, id: NodeId) -> Option<&ClusterNode> {
        self.nodes.get(id)
    }

    /// Nodes of one resolution, in label order.
    pub fn nodes_at(&self, resolution: usize) -> impl Iterator<Item = (NodeId, &ClusterNode)> {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, n)| n.resolution == resolution)
    }

    /// Look up a node by resolution index and label.
    pub fn find_node(&self, resolution: usize, cluster: &Label) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.resolution == resolution && &n.cluster == cluster)
    }

    /// Look up a node by its display name.
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.name == name)
    }

    pub fn incoming(&self, target: NodeId) -> impl Iterator<Item = &ClusterEdge> {
        self.edges.iter().filter(move |e| e.target == target)
    }

    pub fn outgoing(&self, source: NodeId) -> impl Iterator<Item = &ClusterEdge> {
        self.edges.iter().filter(move |e| e.source == source)
    }

    /// Source of the core edge into `target`, if any.
    pub fn core_parent(&self, target: NodeId) -> Option<NodeId> {
        self.incoming(target).find(|e| e.is_core).map(|e| e.source)
    }

    /// Drop edges with `count < min_count` or `in_proportion < min_proportion`.
    ///
    /// Returns the number of removed edges.
    pub fn filter_edges(&mut self, min_count: usize, min_proportion: f64) -> usize {
        let before = self.edges.len();
        self.edges
            .retain(|e| e.count >= min_count && e.in_proportion >= min_proportion);
        before - self.edges.len()
    }

    pub fn summary(&self) -> Vec<ResolutionSummary> {
        self.resolutions
            .iter()
            .map(|r| {
                let ids: Vec<NodeId> = self.nodes_at(r.index).map(|(id, _)| id).collect();
                ResolutionSummary {
                    name: r.column.clone(),
                    nodes: ids.len(),
                    samples: ids.iter().map(|&id| self.nodes[id].size).sum(),
                    incoming_edges: self
                        .edges
                        .iter()
                        .filter(|e| ids.contains(&e.target))
                        .count(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_integer_like_cells_when_parsing_label_then_returns_int() {
        assert_eq!(Label::parse("3"), Some(Label::Int(3)));
        assert_eq!(Label::parse(" 3.0 "), Some(Label::Int(3)));
        assert_eq!(Label::parse("-1"), Some(Label::Int(-1)));
    }

    #[test]
    fn given_fractional_cell_when_parsing_label_then_rejects() {
        assert_eq!(Label::parse("0.53"), None);
    }

    #[test]
    fn given_text_cell_when_parsing_label_then_returns_text() {
        assert_eq!(Label::parse("B cells"), Some(Label::Text("B cells".into())));
    }

    #[test]
    fn given_mixed_values_when_sorting_naturally_then_numbers_come_first() {
        let mut values = vec![
            Value::Text("b".into()),
            Value::Number(2.0),
            Value::Text("a".into()),
            Value::Number(-1.0),
        ];
        values.sort_by(Value::natural_cmp);
        assert_eq!(
            values,
            vec![
                Value::Number(-1.0),
                Value::Number(2.0),
                Value::Text("a".into()),
                Value::Text("b".into()),
            ]
        );
    }

    #[test]
    fn given_graph_when_filtering_edges_then_removes_weak_edges() {
        let node = |resolution, cluster: i64| ClusterNode {
            resolution,
            cluster: Label::Int(cluster),
            name: format!("K{}C{}", resolution, cluster),
            size: 5,
            sc3_stability: 0.0,
            aggregates: BTreeMap::new(),
        };
        let mut graph = ClusterGraph {
            resolutions: vec![],
            nodes: vec![node(0, 1), node(1, 1)],
            edges: vec![
                ClusterEdge {
                    source: 0,
                    target: 1,
                    count: 4,
                    in_proportion: 0.8,
                    is_core: true,
                },
                ClusterEdge {
                    source: 0,
                    target: 1,
                    count: 1,
                    in_proportion: 0.2,
                    is_core: false,
                },
            ],
        };

        let removed = graph.filter_edges(2, 0.0);

        assert_eq!(removed, 1);
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.core_parent(1), Some(0));
    }
}
