//! clustree: clustering trees from clusterings at increasing resolution
//!
//! Layered architecture:
//! - `domain`: tree model, builder, aggregations (no I/O)
//! - `application`: services and exports
//! - `infrastructure`: filesystem boundary and dependency wiring
//! - `cli`: argument parsing and command dispatch

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
