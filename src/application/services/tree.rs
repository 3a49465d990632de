//! Clustering tree service
//!
//! Loads sample tables through the filesystem boundary, builds the graph
//! with the configured options and renders exports.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::application::export::{render, ExportFormat};
use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::config::Settings;
use crate::domain::{ClusterGraph, CoreTree, ResolutionSummary, Table, TreeBuilder};
use crate::infrastructure::traits::FileSystem;

/// Service building clustering trees from CSV files.
pub struct TreeService {
    fs: Arc<dyn FileSystem>,
    settings: Arc<Settings>,
}

impl TreeService {
    pub fn new(fs: Arc<dyn FileSystem>, settings: Arc<Settings>) -> Self {
        Self { fs, settings }
    }

    /// Read a CSV file into a table, honoring the configured missing tokens.
    #[instrument(level = "debug", skip(self))]
    pub fn load_table(&self, input: &Path) -> ApplicationResult<Table> {
        if !self.fs.exists(input) {
            return Err(ApplicationError::InputNotFound(input.to_path_buf()));
        }
        let text = self
            .fs
            .read_to_string(input)
            .with_path_context("read clusterings", input)?;
        let table = Table::from_csv(&text, &self.settings.missing_values())?;
        debug!(
            "load_table: {} samples, {} columns",
            table.n_rows(),
            table.names().len()
        );
        Ok(table)
    }

    /// Build the clustering tree for a CSV file.
    #[instrument(level = "debug", skip(self))]
    pub fn build(&self, input: &Path) -> ApplicationResult<ClusterGraph> {
        // Options first: a bad configuration fails before any I/O.
        let options = self.settings.tree_options()?;
        let table = self.load_table(input)?;
        let graph = TreeBuilder::new(options).build(&table)?;
        info!(
            "built clustering tree from {}: {} nodes, {} edges",
            input.display(),
            graph.nodes.len(),
            graph.edges.len()
        );
        Ok(graph)
    }

    /// Render a graph in the given format, falling back to the configured one.
    pub fn export(
        &self,
        graph: &ClusterGraph,
        format: Option<ExportFormat>,
    ) -> ApplicationResult<String> {
        render(graph, &self.settings.render_options(format))
    }

    pub fn write_export(&self, output: &Path, content: &str) -> ApplicationResult<()> {
        self.fs
            .ensure_parent(output)
            .and_then(|_| self.fs.write(output, content))
            .map_err(|source| ApplicationError::CannotCreate {
                path: output.to_path_buf(),
                source,
            })?;
        info!("wrote {}", output.display());
        Ok(())
    }

    pub fn core_trees(&self, graph: &ClusterGraph) -> Vec<CoreTree> {
        CoreTree::from_graph(graph)
    }

    pub fn summary(&self, graph: &ClusterGraph) -> Vec<ResolutionSummary> {
        graph.summary()
    }
}
