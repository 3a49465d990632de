//! Graph exports for external layout and rendering tools
//!
//! - JSON: full node and edge tables
//! - DOT: Graphviz input, one rank per resolution
//! - Text: core trees drawn with `termtree`

use std::collections::BTreeMap;
use std::fmt::{self, Write};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{
    AggregateRequest, Aggregation, ClusterGraph, ClusterNode, CoreTree, Label, Resolution, Value,
};

/// Output format of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Dot,
    Text,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExportFormat::Json => "json",
            ExportFormat::Dot => "dot",
            ExportFormat::Text => "text",
        })
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "dot" => Ok(ExportFormat::Dot),
            "text" | "txt" => Ok(ExportFormat::Text),
            other => Err(format!("unknown format '{}': use json, dot or text", other)),
        }
    }
}

/// Layout requested from the downstream renderer. Not interpreted here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    #[default]
    Tree,
    Sugiyama,
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Layout::Tree => "tree",
            Layout::Sugiyama => "sugiyama",
        })
    }
}

impl FromStr for Layout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tree" => Ok(Layout::Tree),
            "sugiyama" => Ok(Layout::Sugiyama),
            other => Err(format!("unknown layout '{}': use tree or sugiyama", other)),
        }
    }
}

/// A static value or one driven by a node aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AestheticSpec {
    Static { value: String },
    Attribute { attribute: String, function: Aggregation },
}

impl AestheticSpec {
    /// The aggregation a data-driven aesthetic depends on.
    pub fn request(&self) -> Option<AggregateRequest> {
        match self {
            AestheticSpec::Static { .. } => None,
            AestheticSpec::Attribute {
                attribute,
                function,
            } => Some(AggregateRequest::new(attribute.clone(), *function)),
        }
    }

    /// Resolve for one node; `None` when the aggregate is missing.
    pub fn resolve(&self, node: &ClusterNode) -> Option<String> {
        match self {
            AestheticSpec::Static { value } => Some(value.clone()),
            AestheticSpec::Attribute { .. } => {
                let key = self.request()?.key();
                node.aggregates
                    .get(&key)
                    .and_then(Option::as_ref)
                    .map(format_value)
            }
        }
    }
}

/// Node and edge aesthetic overrides passed through to renderers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Aesthetics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_colour: Option<AestheticSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_size: Option<AestheticSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_alpha: Option<AestheticSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_text: Option<AestheticSpec>,
}

impl Aesthetics {
    fn specs(&self) -> impl Iterator<Item = &AestheticSpec> {
        [
            &self.node_colour,
            &self.node_size,
            &self.node_alpha,
            &self.node_text,
        ]
        .into_iter()
        .flatten()
    }

    /// Aggregations required by data-driven aesthetics.
    pub fn requests(&self) -> Vec<AggregateRequest> {
        self.specs().filter_map(AestheticSpec::request).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderOptions {
    pub format: ExportFormat,
    pub layout: Layout,
    pub aesthetics: Aesthetics,
}

pub fn render(graph: &ClusterGraph, options: &RenderOptions) -> ApplicationResult<String> {
    match options.format {
        ExportFormat::Json => to_json(graph, options),
        ExportFormat::Dot => Ok(to_dot(graph, options)),
        ExportFormat::Text => Ok(to_text(graph)),
    }
}

#[derive(Serialize)]
struct GraphExport<'a> {
    layout: Layout,
    resolutions: &'a [Resolution],
    nodes: Vec<NodeExport<'a>>,
    edges: Vec<EdgeExport<'a>>,
    aesthetics: BTreeMap<&'static str, BTreeMap<&'a str, Option<String>>>,
}

#[derive(Serialize)]
struct NodeExport<'a> {
    name: &'a str,
    resolution: &'a str,
    cluster: &'a Label,
    size: usize,
    sc3_stability: f64,
    aggregates: &'a BTreeMap<String, Option<Value>>,
}

#[derive(Serialize)]
struct EdgeExport<'a> {
    source: &'a str,
    target: &'a str,
    count: usize,
    in_proportion: f64,
    is_core: bool,
}

fn to_json(graph: &ClusterGraph, options: &RenderOptions) -> ApplicationResult<String> {
    let nodes = graph
        .nodes
        .iter()
        .map(|n| NodeExport {
            name: &n.name,
            resolution: &graph.resolutions[n.resolution].name,
            cluster: &n.cluster,
            size: n.size,
            sc3_stability: n.sc3_stability,
            aggregates: &n.aggregates,
        })
        .collect();
    let edges = graph
        .edges
        .iter()
        .map(|e| EdgeExport {
            source: &graph.nodes[e.source].name,
            target: &graph.nodes[e.target].name,
            count: e.count,
            in_proportion: e.in_proportion,
            is_core: e.is_core,
        })
        .collect();

    let a = &options.aesthetics;
    let mut aesthetics = BTreeMap::new();
    for (name, spec) in [
        ("node_colour", &a.node_colour),
        ("node_size", &a.node_size),
        ("node_alpha", &a.node_alpha),
        ("node_text", &a.node_text),
    ] {
        if let Some(spec) = spec {
            let per_node = graph
                .nodes
                .iter()
                .map(|n| (n.name.as_str(), spec.resolve(n)))
                .collect();
            aesthetics.insert(name, per_node);
        }
    }

    let export = GraphExport {
        layout: options.layout,
        resolutions: &graph.resolutions,
        nodes,
        edges,
        aesthetics,
    };
    serde_json::to_string_pretty(&export).map_err(|e| ApplicationError::Render {
        message: format!("serialize graph: {}", e),
    })
}

fn to_dot(graph: &ClusterGraph, options: &RenderOptions) -> String {
    let max_count = graph.edges.iter().map(|e| e.count).max().unwrap_or(1).max(1) as f64;
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(out, "digraph clustree {{");
    let _ = writeln!(out, "  // layout: {}", options.layout);
    let _ = writeln!(out, "  rankdir=TB;");
    let _ = writeln!(out, "  node [shape=circle];");

    for resolution in &graph.resolutions {
        let _ = writeln!(out, "  subgraph \"res_{}\" {{", escape(&resolution.name));
        let _ = writeln!(out, "    rank=same;");
        for (_, node) in graph.nodes_at(resolution.index) {
            let label = options
                .aesthetics
                .node_text
                .as_ref()
                .and_then(|spec| spec.resolve(node))
                .map(|text| escape(&text))
                .unwrap_or_else(|| format!("{}\\nn={}", escape(&node.cluster.to_string()), node.size));
            let mut attrs = format!("label=\"{}\"", label);
            if let Some(colour) = options
                .aesthetics
                .node_colour
                .as_ref()
                .and_then(|spec| spec.resolve(node))
            {
                let _ = write!(attrs, ", style=filled, fillcolor=\"{}\"", escape(&colour));
            }
            let _ = writeln!(out, "    \"{}\" [{}];", escape(&node.name), attrs);
        }
        let _ = writeln!(out, "  }}");
    }

    for edge in &graph.edges {
        let penwidth = 1.0 + 4.0 * edge.count as f64 / max_count;
        let _ = writeln!(
            out,
            "  \"{}\" -> \"{}\" [label=\"{}\", penwidth={:.2}, style={}];",
            escape(&graph.nodes[edge.source].name),
            escape(&graph.nodes[edge.target].name),
            edge.count,
            penwidth,
            if edge.is_core { "solid" } else { "dashed" }
        );
    }
    out.push_str("}\n");
    out
}

fn to_text(graph: &ClusterGraph) -> String {
    CoreTree::from_graph(graph)
        .iter()
        .map(|tree| tree.to_termtree().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Number(n) if n.fract() == 0.0 => format!("{}", *n as i64),
        Value::Number(n) => format!("{:.3}", n),
        Value::Text(s) => s.clone(),
    }
}
