//! Command dispatch: loads settings, wires services, prints results

use std::io;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::{generate, Shell};
use tracing::{debug, instrument};

use crate::application::export::{ExportFormat, Layout};
use crate::application::ApplicationError;
use crate::cli::args::{Cli, Commands, ConfigCommands, InputArgs};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{global_config_path, local_config_path, Settings};
use crate::infrastructure::di::ServiceContainer;
use crate::util::path::parent_dir;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    match &cli.command {
        Some(Commands::Build {
            input,
            format,
            output,
            count_filter,
            prop_filter,
            layout,
        }) => {
            let overrides = BuildOverrides {
                format: *format,
                output: output.clone(),
                count_filter: *count_filter,
                prop_filter: *prop_filter,
                layout: *layout,
            };
            cmd_build(input, overrides)
        }
        Some(Commands::Tree { input }) => cmd_tree(input),
        Some(Commands::Summary { input }) => cmd_summary(input),
        Some(Commands::Config { command }) => cmd_config(command),
        Some(Commands::Completion { shell }) => {
            cmd_completion(*shell);
            Ok(())
        }
        None => Err(CliError::Usage(
            "no command given, see 'clustree --help'".into(),
        )),
    }
}

/// Flags only the build command takes.
#[derive(Debug, Default)]
struct BuildOverrides {
    format: Option<ExportFormat>,
    output: Option<PathBuf>,
    count_filter: Option<usize>,
    prop_filter: Option<f64>,
    layout: Option<Layout>,
}

impl BuildOverrides {
    fn apply(&self, settings: &mut Settings) {
        if let Some(format) = self.format {
            settings.output.format = format;
        }
        if let Some(path) = &self.output {
            settings.output.path = Some(path.clone());
        }
        if let Some(count) = self.count_filter {
            settings.filters.count = count;
        }
        if let Some(proportion) = self.prop_filter {
            settings.filters.proportion = proportion;
        }
        if let Some(layout) = self.layout {
            settings.layout = layout;
        }
    }
}

/// Settings for a tree command: config layers next to the input, then flags.
fn load_settings(input: &InputArgs) -> CliResult<Settings> {
    let input_dir = parent_dir(&input.csv);
    let mut settings = Settings::load(Some(input_dir.as_path()))?;
    input.apply(&mut settings);
    debug!("effective settings: {:?}", settings);
    Ok(settings)
}

#[instrument(skip(overrides))]
fn cmd_build(input: &InputArgs, overrides: BuildOverrides) -> CliResult<()> {
    let mut settings = load_settings(input)?;
    overrides.apply(&mut settings);
    let container = ServiceContainer::new(settings);

    let graph = container.tree.build(&input.csv)?;
    let content = container.tree.export(&graph, None)?;

    match &container.settings.output.path {
        Some(path) => {
            container.tree.write_export(path, &content)?;
            output::action("Wrote", &path.display());
        }
        None => output::info(content.trim_end()),
    }
    Ok(())
}

#[instrument]
fn cmd_tree(input: &InputArgs) -> CliResult<()> {
    let container = ServiceContainer::new(load_settings(input)?);

    let graph = container.tree.build(&input.csv)?;
    for tree in container.tree.core_trees(&graph) {
        output::info(&tree.to_termtree());
    }
    Ok(())
}

#[instrument]
fn cmd_summary(input: &InputArgs) -> CliResult<()> {
    let container = ServiceContainer::new(load_settings(input)?);

    let graph = container.tree.build(&input.csv)?;
    output::header(&format!(
        "{}: {} resolutions, {} nodes, {} edges",
        input.csv.display(),
        graph.resolutions.len(),
        graph.nodes.len(),
        graph.edges.len()
    ));
    for row in container.tree.summary(&graph) {
        output::detail(&format!(
            "{:<16} nodes={:<4} samples={:<8} incoming_edges={}",
            row.name, row.nodes, row.samples, row.incoming_edges
        ));
    }
    Ok(())
}

fn cmd_config(command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show { dir } => {
            let dir = dir.clone().unwrap_or_else(|| PathBuf::from("."));
            let settings = Settings::load(Some(dir.as_path()))?;
            output::info(&settings.to_toml()?);
            Ok(())
        }
        ConfigCommands::Init { global, dir } => {
            let path = if *global {
                global_config_path().ok_or_else(|| {
                    CliError::Usage("cannot determine global config directory".into())
                })?
            } else {
                local_config_path(dir.as_deref().unwrap_or(Path::new(".")))
            };
            init_config(&path)
        }
        ConfigCommands::Path => {
            match global_config_path() {
                Some(path) => output::detail(&format!(
                    "global: {} ({})",
                    path.display(),
                    existence(&path)
                )),
                None => output::detail(&"global: unavailable"),
            }
            let local = local_config_path(Path::new("."));
            output::detail(&format!(
                "local:  {} ({})",
                local.display(),
                existence(&local)
            ));
            Ok(())
        }
    }
}

fn init_config(path: &Path) -> CliResult<()> {
    if path.exists() {
        return Err(CliError::Usage(format!(
            "config already exists: {}",
            path.display()
        )));
    }
    let created = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or(Ok(()), std::fs::create_dir_all)
        .and_then(|_| std::fs::write(path, Settings::template()));
    created.map_err(|source| ApplicationError::CannotCreate {
        path: path.to_path_buf(),
        source,
    })?;
    output::success(&format!("created {}", path.display()));
    Ok(())
}

fn existence(path: &Path) -> &'static str {
    if path.exists() {
        "exists"
    } else {
        "not found"
    }
}

fn cmd_completion(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}
