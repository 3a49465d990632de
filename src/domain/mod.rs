//! Domain layer: clustering-tree model and construction
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod aggregate;
pub mod arena;
pub mod builder;
pub mod entities;
pub mod error;
mod stability;
pub mod table;

pub use aggregate::{AggregateRequest, Aggregation};
pub use arena::{CoreTree, NodeData, TreeNode};
pub use builder::{ColumnSelection, EdgeFilter, TreeBuilder, TreeOptions};
pub use entities::*;
pub use error::{ConfigurationError, DataError, DomainError, DomainResult};
pub use table::{ClusteringSource, MissingValues, Table};
