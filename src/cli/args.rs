//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

use crate::application::export::{ExportFormat, Layout};
use crate::config::{merge_array, Settings};

/// Clustering trees: how clusters split and merge as resolution increases
#[derive(Parser, Debug)]
#[command(name = "clustree")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug output, repeat for more (-d info, -dd debug, -ddd trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub debug: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the clustering tree and export nodes and edges
    Build {
        #[command(flatten)]
        input: InputArgs,

        /// Export format
        #[arg(short, long, value_name = "json|dot|text")]
        format: Option<ExportFormat>,

        /// Write the export here instead of stdout
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,

        /// Drop edges with fewer samples
        #[arg(long, value_name = "N")]
        count_filter: Option<usize>,

        /// Drop edges with a smaller in-proportion
        #[arg(long, value_name = "P")]
        prop_filter: Option<f64>,

        /// Layout hint passed to renderers
        #[arg(long, value_name = "tree|sugiyama")]
        layout: Option<Layout>,
    },

    /// Show core trees (each cluster under its main parent)
    Tree {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Show per-resolution node and edge counts
    Summary {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Input table and column selection shared by the tree commands.
#[derive(Args, Debug, Clone, Default)]
pub struct InputArgs {
    /// CSV file, one row per sample
    #[arg(value_hint = ValueHint::FilePath)]
    pub csv: PathBuf,

    /// Prefix of the clustering columns, e.g. K or res.
    #[arg(short, long)]
    pub prefix: Option<String>,

    /// Suffix of the clustering columns
    #[arg(short, long)]
    pub suffix: Option<String>,

    /// Clustering columns in resolution order (overrides --prefix)
    #[arg(short, long, value_delimiter = ',')]
    pub columns: Vec<String>,

    /// Per-node aggregation as attribute:function (repeatable)
    #[arg(short, long = "aggregate", value_name = "ATTR:FN")]
    pub aggregate: Vec<String>,
}

impl InputArgs {
    /// Apply command line flags on top of loaded settings.
    ///
    /// A selection given here replaces the configured one entirely.
    pub fn apply(&self, settings: &mut Settings) {
        if !self.columns.is_empty() {
            settings.selection.columns = self.columns.clone();
            settings.selection.prefix = None;
        } else if let Some(prefix) = &self.prefix {
            settings.selection.prefix = Some(prefix.clone());
            settings.selection.columns.clear();
        }
        if let Some(suffix) = &self.suffix {
            settings.selection.suffix = Some(suffix.clone());
        }
        settings.aggregations = merge_array(&settings.aggregations, &self.aggregate);
    }
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show {
        /// Directory whose .clustree.toml is merged in (default: cwd)
        #[arg(value_hint = ValueHint::DirPath)]
        dir: Option<PathBuf>,
    },

    /// Create config template
    Init {
        /// Create global config
        #[arg(short, long)]
        global: bool,

        /// Directory for the local config (default: cwd)
        #[arg(value_hint = ValueHint::DirPath)]
        dir: Option<PathBuf>,
    },

    /// Show config paths
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_build_flags_when_parsing_then_all_fields_set() {
        let cli = Cli::try_parse_from([
            "clustree",
            "-dd",
            "build",
            "cells.csv",
            "--prefix",
            "K",
            "-a",
            "age:mean",
            "-a",
            "tissue:mode",
            "--format",
            "dot",
            "--count-filter",
            "2",
            "--prop-filter",
            "0.1",
        ])
        .expect("parse");

        assert_eq!(cli.debug, 2);
        match cli.command {
            Some(Commands::Build {
                input,
                format,
                count_filter,
                prop_filter,
                ..
            }) => {
                assert_eq!(input.csv, PathBuf::from("cells.csv"));
                assert_eq!(input.prefix.as_deref(), Some("K"));
                assert_eq!(input.aggregate, vec!["age:mean", "tissue:mode"]);
                assert_eq!(format, Some(ExportFormat::Dot));
                assert_eq!(count_filter, Some(2));
                assert_eq!(prop_filter, Some(0.1));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn given_unknown_format_when_parsing_then_error() {
        let result = Cli::try_parse_from(["clustree", "build", "cells.csv", "-f", "png"]);
        assert!(result.is_err());
    }

    #[test]
    fn given_columns_when_applying_then_replace_configured_prefix() {
        let mut settings = Settings::default();
        settings.selection.prefix = Some("K".into());
        let input = InputArgs {
            columns: vec!["a".into(), "b".into()],
            ..Default::default()
        };

        input.apply(&mut settings);

        assert_eq!(settings.selection.prefix, None);
        assert_eq!(settings.selection.columns, vec!["a", "b"]);
    }

    #[test]
    fn given_aggregates_when_applying_then_union_with_configured() {
        let mut settings = Settings {
            aggregations: vec!["age:mean".into()],
            ..Default::default()
        };
        let input = InputArgs {
            aggregate: vec!["age:mean".into(), "!age:mean".into(), "age:max".into()],
            ..Default::default()
        };

        input.apply(&mut settings);

        assert_eq!(settings.aggregations, vec!["age:max"]);
    }
}
