//! Tree builder: turns per-sample clusterings at increasing resolution into a
//! clustering tree.

use std::collections::{BTreeMap, HashMap, HashSet};

use regex::Regex;
use tracing::{debug, instrument, warn};

use crate::domain::aggregate::AggregateRequest;
use crate::domain::entities::{
    ClusterEdge, ClusterGraph, ClusterNode, Label, NodeId, Resolution, Value,
};
use crate::domain::error::{ConfigurationError, DataError, DomainResult};
use crate::domain::stability::sc3_stability;
use crate::domain::table::ClusteringSource;

/// Which columns hold clusterings, in resolution order.
///
/// An explicit `columns` list wins over `prefix`/`suffix` matching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSelection {
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    pub columns: Vec<String>,
}

impl ColumnSelection {
    pub fn by_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            ..Default::default()
        }
    }

    pub fn by_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    /// Resolve the selection against the available column names.
    pub fn resolve(&self, available: &[String]) -> DomainResult<Vec<Resolution>> {
        let selected: Vec<(String, String)> = if !self.columns.is_empty() {
            self.explicit(available)?
        } else if let Some(prefix) = self.prefix.as_deref().filter(|p| !p.is_empty()) {
            self.matching(prefix, available)?
        } else {
            return Err(ConfigurationError::EmptySelection.into());
        };

        if selected.len() < 2 {
            return Err(ConfigurationError::TooFewResolutions {
                found: selected.len(),
            }
            .into());
        }

        Ok(selected
            .into_iter()
            .enumerate()
            .map(|(index, (name, column))| Resolution {
                index,
                name,
                column,
            })
            .collect())
    }

    fn explicit(&self, available: &[String]) -> DomainResult<Vec<(String, String)>> {
        let mut selected: Vec<(String, String)> = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            if !available.contains(column) {
                return Err(ConfigurationError::ColumnNotFound(column.clone()).into());
            }
            if selected.iter().any(|(_, c)| c == column) {
                return Err(ConfigurationError::DuplicateColumn(column.clone()).into());
            }
            selected.push((self.strip(column), column.clone()));
        }
        Ok(selected)
    }

    fn matching(&self, prefix: &str, available: &[String]) -> DomainResult<Vec<(String, String)>> {
        let suffix = self.suffix.as_deref().unwrap_or("");
        let pattern = format!("^{}(.+){}$", regex::escape(prefix), regex::escape(suffix));
        let re = Regex::new(&pattern).map_err(|e| ConfigurationError::InvalidParameter {
            name: "prefix",
            message: e.to_string(),
        })?;

        let mut selected: Vec<(String, String)> = available
            .iter()
            .filter_map(|column| {
                re.captures(column)
                    .and_then(|caps| caps.get(1))
                    .map(|m| (m.as_str().to_string(), column.clone()))
            })
            .collect();
        if selected.is_empty() {
            return Err(ConfigurationError::NoMatchingColumns {
                prefix: prefix.to_string(),
            }
            .into());
        }

        // Resolution names that are all numeric order the columns, otherwise
        // table order is kept.
        let numeric: Option<Vec<f64>> = selected
            .iter()
            .map(|(name, _)| name.parse::<f64>().ok())
            .collect();
        if let Some(keys) = numeric {
            let mut keyed: Vec<(f64, (String, String))> = keys.into_iter().zip(selected).collect();
            keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
            selected = keyed.into_iter().map(|(_, s)| s).collect();
        }
        debug!("prefix '{}' selected {} columns", prefix, selected.len());
        Ok(selected)
    }

    fn strip(&self, column: &str) -> String {
        let mut name = column;
        if let Some(prefix) = self.prefix.as_deref() {
            name = name.strip_prefix(prefix).unwrap_or(name);
        }
        if let Some(suffix) = self.suffix.as_deref() {
            name = name.strip_suffix(suffix).unwrap_or(name);
        }
        if name.is_empty() {
            column.to_string()
        } else {
            name.to_string()
        }
    }
}

/// Minimum edge statistics; edges below either bound are dropped.
///
/// The default keeps every edge.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EdgeFilter {
    pub min_count: usize,
    pub min_proportion: f64,
}

impl EdgeFilter {
    pub fn validate(&self) -> DomainResult<()> {
        if !(0.0..=1.0).contains(&self.min_proportion) {
            return Err(ConfigurationError::InvalidParameter {
                name: "prop_filter",
                message: format!("must be within [0, 1], got {}", self.min_proportion),
            }
            .into());
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.min_count > 0 || self.min_proportion > 0.0
    }
}

/// Everything the builder needs besides the data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeOptions {
    pub selection: ColumnSelection,
    pub aggregations: Vec<AggregateRequest>,
    pub filter: EdgeFilter,
}

impl TreeOptions {
    pub fn new(selection: ColumnSelection) -> Self {
        Self {
            selection,
            ..Default::default()
        }
    }

    pub fn with_aggregation(mut self, request: AggregateRequest) -> Self {
        if !self.aggregations.contains(&request) {
            self.aggregations.push(request);
        }
        self
    }

    pub fn with_filter(mut self, filter: EdgeFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// Samples of one resolution grouped by label.
#[derive(Debug, Clone)]
pub(crate) struct Partition {
    /// Distinct labels in node order
    pub(crate) labels: Vec<Label>,
    /// Cluster index per sample, `None` when the label is missing
    pub(crate) assignment: Vec<Option<usize>>,
    /// Sample indices per cluster
    pub(crate) members: Vec<Vec<usize>>,
}

impl Partition {
    /// Group samples by label. Integer labels sort ascending; any text label
    /// keeps first-seen order for the whole column.
    pub(crate) fn from_labels(column: &str, raw: Vec<Option<Label>>) -> Self {
        let mut labels: Vec<Label> = Vec::new();
        let mut seen: HashSet<&Label> = HashSet::new();
        for label in raw.iter().flatten() {
            if seen.insert(label) {
                labels.push(label.clone());
            }
        }
        if labels.iter().all(|l| l.as_int().is_some()) {
            labels.sort_by_key(|l| l.as_int());
        }

        let index: HashMap<&Label, usize> =
            labels.iter().enumerate().map(|(i, l)| (l, i)).collect();
        let mut members: Vec<Vec<usize>> = vec![Vec::new(); labels.len()];
        let assignment: Vec<Option<usize>> = raw
            .iter()
            .enumerate()
            .map(|(sample, label)| {
                label.as_ref().map(|l| {
                    let cluster = index[l];
                    members[cluster].push(sample);
                    cluster
                })
            })
            .collect();

        let labelled = assignment.iter().flatten().count();
        if labelled > 1 && labels.len() == labelled {
            warn!(
                "column '{}': every sample forms its own cluster, labels may not be discrete",
                column
            );
        }

        Self {
            labels,
            assignment,
            members,
        }
    }
}

/// Builds a [`ClusterGraph`] from any [`ClusteringSource`].
#[derive(Debug, Clone, Default)]
pub struct TreeBuilder {
    options: TreeOptions,
}

impl TreeBuilder {
    pub fn new(options: TreeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &TreeOptions {
        &self.options
    }

    /// Build the clustering tree.
    ///
    /// All inputs are validated before any statistic is computed; the result
    /// is either a complete graph or an error.
    #[instrument(level = "debug", skip(self, source))]
    pub fn build<S: ClusteringSource + ?Sized>(&self, source: &S) -> DomainResult<ClusterGraph> {
        self.options.filter.validate()?;
        if source.n_samples() == 0 {
            return Err(DataError::EmptyTable.into());
        }

        let resolutions = self.options.selection.resolve(&source.column_names())?;
        let attributes = self.load_attributes(source)?;

        let partitions: Vec<Partition> = resolutions
            .iter()
            .map(|r| {
                let labels = source.resolution_column(&r.column)?;
                Ok(Partition::from_labels(&r.column, labels))
            })
            .collect::<DomainResult<_>>()?;

        let stability = sc3_stability(&partitions);

        let mut offsets: Vec<NodeId> = Vec::with_capacity(partitions.len());
        let mut nodes: Vec<ClusterNode> = Vec::new();
        for (resolution, partition) in resolutions.iter().zip(&partitions) {
            offsets.push(nodes.len());
            for (cluster, label) in partition.labels.iter().enumerate() {
                let members = &partition.members[cluster];
                nodes.push(ClusterNode {
                    resolution: resolution.index,
                    cluster: label.clone(),
                    name: format!("{}C{}", resolution.column, label),
                    size: members.len(),
                    sc3_stability: stability[resolution.index][cluster],
                    aggregates: self.aggregate(members, &attributes),
                });
            }
        }

        let mut edges: Vec<ClusterEdge> = Vec::new();
        for i in 1..partitions.len() {
            edges.extend(adjacent_edges(
                &partitions[i - 1],
                &partitions[i],
                offsets[i - 1],
                offsets[i],
            ));
        }
        mark_core_edges(&mut edges);

        let mut graph = ClusterGraph {
            resolutions,
            nodes,
            edges,
        };
        if self.options.filter.is_active() {
            let removed = graph.filter_edges(
                self.options.filter.min_count,
                self.options.filter.min_proportion,
            );
            debug!("edge filter removed {} edges", removed);
        }

        debug!(
            "built graph: {} resolutions, {} nodes, {} edges",
            graph.resolutions.len(),
            graph.nodes.len(),
            graph.edges.len()
        );
        Ok(graph)
    }

    /// Read and type-check every attribute column referenced by a request.
    fn load_attributes<S: ClusteringSource + ?Sized>(
        &self,
        source: &S,
    ) -> DomainResult<BTreeMap<String, Vec<Option<Value>>>> {
        let mut attributes = BTreeMap::new();
        for request in &self.options.aggregations {
            if !attributes.contains_key(&request.attribute) {
                let values = source.attribute_column(&request.attribute)?;
                attributes.insert(request.attribute.clone(), values);
            }
            let values = &attributes[&request.attribute];
            if request.function.requires_numeric()
                && values.iter().flatten().any(|v| v.as_number().is_none())
            {
                return Err(ConfigurationError::NonNumericAttribute {
                    column: request.attribute.clone(),
                    function: request.function.to_string(),
                }
                .into());
            }
        }
        Ok(attributes)
    }

    fn aggregate(
        &self,
        members: &[usize],
        attributes: &BTreeMap<String, Vec<Option<Value>>>,
    ) -> BTreeMap<String, Option<Value>> {
        self.options
            .aggregations
            .iter()
            .map(|request| {
                let column = &attributes[&request.attribute];
                let values: Vec<&Value> = members
                    .iter()
                    .filter_map(|&sample| column[sample].as_ref())
                    .collect();
                (request.key(), request.function.apply(&values))
            })
            .collect()
    }
}

/// Joint partition of two adjacent resolutions.
fn adjacent_edges(
    source: &Partition,
    target: &Partition,
    source_offset: NodeId,
    target_offset: NodeId,
) -> Vec<ClusterEdge> {
    let mut counts: BTreeMap<(usize, usize), usize> = BTreeMap::new();
    for (from, to) in source.assignment.iter().zip(&target.assignment) {
        if let (Some(from), Some(to)) = (from, to) {
            *counts.entry((*from, *to)).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .map(|((from, to), count)| ClusterEdge {
            source: source_offset + from,
            target: target_offset + to,
            count,
            in_proportion: count as f64 / target.members[to].len() as f64,
            is_core: false,
        })
        .collect()
}

/// Flag the highest in-proportion edge into each target; ties keep the edge
/// whose source comes first.
fn mark_core_edges(edges: &mut [ClusterEdge]) {
    let mut best: HashMap<NodeId, usize> = HashMap::new();
    for (i, edge) in edges.iter().enumerate() {
        match best.get(&edge.target) {
            Some(&j) if edges[j].in_proportion >= edge.in_proportion => {}
            _ => {
                best.insert(edge.target, i);
            }
        }
    }
    for i in best.into_values() {
        edges[i].is_core = true;
    }
}
