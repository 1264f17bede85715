//! The command line interface for the layout engine.
use crate::generation::CancellationToken;
use crate::id::LayoutID;
use crate::input::{Project, load_project};
use crate::jobs::LayoutQueue;
use crate::layout::{Layout, LayoutStatus};
use crate::log;
use crate::output::metadata::{RunInfo, write_metadata};
use crate::output::{
    CsvPublisher, create_output_directory, get_output_dir, write_variant_comparison,
    write_violations,
};
use crate::publish::{LayoutPublisher, LoggingPublisher};
use crate::settings::Settings;
use crate::site::SiteData;
use crate::strategy::Strategy;
use ::log::{info, warn};
use anyhow::{Context, Result};
use chrono::Local;
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod demo;
use demo::DemoSubcommands;
pub mod settings;
use settings::SettingsSubcommands;

/// The command line interface for the layout engine.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
    /// Flag to provide the CLI docs as markdown
    #[arg(long, hide = true)]
    markdown_help: bool,
}

/// Options for commands which write output files
#[derive(Args, Default)]
pub struct OutputOpts {
    /// Directory for output files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory if it already exists
    #[arg(long)]
    pub overwrite: bool,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Generate a layout for a project.
    Generate {
        /// Path to the project directory.
        project_dir: PathBuf,
        /// The strategy to generate with.
        #[arg(long, default_value_t)]
        strategy: Strategy,
        /// Output options
        #[command(flatten)]
        opts: OutputOpts,
    },
    /// Generate and compare one layout per strategy.
    Variants {
        /// Path to the project directory.
        project_dir: PathBuf,
        /// Output options
        #[command(flatten)]
        opts: OutputOpts,
    },
    /// Validate a project.
    Validate {
        /// Path to the project directory.
        project_dir: PathBuf,
    },
    /// Manage demo projects.
    Demo {
        /// The available subcommands for managing demo projects.
        #[command(subcommand)]
        subcommand: DemoSubcommands,
    },
    /// Manage the program settings file.
    Settings {
        /// The available subcommands for the settings file.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Generate {
                project_dir,
                strategy,
                opts,
            } => handle_generate_command(&project_dir, strategy, &opts, None),
            Self::Variants { project_dir, opts } => {
                handle_variants_command(&project_dir, &opts, None)
            }
            Self::Validate { project_dir } => handle_validate_command(&project_dir, None),
            Self::Demo { subcommand } => subcommand.execute(),
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse CLI arguments and run the requested command
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Invoked as: `$ sitelayout --markdown-help`
    if cli.markdown_help {
        clap_markdown::print_help_markdown::<Cli>();
        return Ok(());
    }

    let Some(command) = cli.command else {
        let help_str = Cli::command().render_long_help().to_string();
        println!("{help_str}");
        return Ok(());
    };

    command.execute()
}

/// Load program settings, if not provided
fn load_settings(settings: Option<Settings>) -> Result<Settings> {
    match settings {
        Some(settings) => Ok(settings),
        None => Settings::load().context("Failed to load settings."),
    }
}

/// Initialise the program logger unless an earlier command in this process already did
fn init_logger(settings: &Settings, log_file_path: Option<&Path>) -> Result<()> {
    if log::is_logger_initialised() {
        return Ok(());
    }

    log::init(Some(settings.log_level.as_str()), log_file_path)
        .context("Failed to initialise logging.")
}

/// Create the output directory, start logging to it and load the project
fn prepare_run(
    project_path: &Path,
    opts: &OutputOpts,
    settings: &Settings,
) -> Result<(Project, PathBuf)> {
    let output_path = match opts.output_dir.clone() {
        Some(p) => p,
        None => get_output_dir(project_path)?,
    };

    let overwrite = create_output_directory(&output_path, opts.overwrite || settings.overwrite)
        .with_context(|| {
            format!(
                "Failed to create output directory: {}",
                output_path.display()
            )
        })?;

    init_logger(settings, Some(&output_path))?;

    let project = load_project(project_path).context("Failed to load project.")?;
    info!("Loaded project from {}", project_path.display());
    info!("Output folder: {}", output_path.display());

    // NB: We have to wait until the logger is initialised to display this warning
    if overwrite {
        warn!("Output folder will be overwritten");
    }

    Ok((project, output_path))
}

/// Publish layouts to the output folder and the log
fn publish_layouts<'a, I>(output_path: &Path, site_data: &SiteData, layouts: I) -> Result<()>
where
    I: IntoIterator<Item = &'a Layout>,
{
    let mut publishers: Vec<Box<dyn LayoutPublisher>> = vec![
        Box::new(CsvPublisher::create(output_path)?),
        Box::new(LoggingPublisher),
    ];
    for layout in layouts {
        for publisher in &mut publishers {
            publisher.publish(site_data, layout)?;
        }
    }
    for publisher in &mut publishers {
        publisher.flush()?;
    }

    Ok(())
}

/// Check completed layouts against the project's jurisdiction and write any violations.
///
/// Nothing is written if the project names no jurisdiction.
fn check_layouts<'a, I>(project: &Project, output_path: &Path, layouts: I) -> Result<()>
where
    I: IntoIterator<Item = &'a Layout>,
{
    let request = project.request();
    let Some(jurisdiction) = request.jurisdiction.as_deref() else {
        return Ok(());
    };

    let mut violations: Vec<(&LayoutID, _)> = Vec::new();
    for layout in layouts {
        if layout.status() != LayoutStatus::Completed {
            continue;
        }

        let found = project
            .engine
            .check_compliance(layout, &project.site_data, &request)?;
        if found.is_empty() {
            info!("Layout {} complies with the {jurisdiction} rules", layout.id);
        } else {
            warn!(
                "Layout {} has {} violations of the {jurisdiction} rules",
                layout.id,
                found.len()
            );
        }
        violations.extend(found.into_iter().map(|v| (&layout.id, v)));
    }

    write_violations(output_path, violations.iter().map(|(id, v)| (*id, v)))
}

/// Handle the `generate` command.
pub fn handle_generate_command(
    project_path: &Path,
    strategy: Strategy,
    opts: &OutputOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let started = Local::now();
    let settings = load_settings(settings)?;
    let (project, output_path) = prepare_run(project_path, opts, &settings)?;

    let request = project.request();
    let site_data = Arc::new(project.site_data.clone());
    let queue = LayoutQueue::new();
    queue.submit(Arc::clone(&site_data), request.clone(), strategy)?;
    queue.run_workers(&project.engine, 1);
    let layout = queue
        .layout(&request.layout_id)
        .with_context(|| format!("Layout {} was not generated", request.layout_id))?;

    publish_layouts(&output_path, &site_data, [&layout])?;
    check_layouts(&project, &output_path, [&layout])?;
    let run = RunInfo {
        command: "generate",
        project_path,
        started,
        workers: 1,
    };
    write_metadata(&output_path, &run, &project, [&layout])?;

    match layout.status() {
        LayoutStatus::Completed => info!("Layout generation complete!"),
        status => warn!("Layout {} {status}", layout.id),
    }

    Ok(())
}

/// Handle the `variants` command.
pub fn handle_variants_command(
    project_path: &Path,
    opts: &OutputOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let started = Local::now();
    let settings = load_settings(settings)?;
    let (project, output_path) = prepare_run(project_path, opts, &settings)?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(settings.worker_count())
        .build()
        .context("Failed to start worker threads.")?;
    let request = project.request();
    let variant_set = pool.install(|| {
        project.engine.generate_variants(
            &project.site_data,
            &request,
            project.strategies(),
            &CancellationToken::new(),
        )
    });

    let layouts: Vec<_> = variant_set.variants.iter().map(|v| &v.layout).collect();
    publish_layouts(&output_path, &project.site_data, layouts.iter().copied())?;
    write_variant_comparison(&output_path, &variant_set.comparison)?;
    check_layouts(&project, &output_path, layouts.iter().copied())?;
    let run = RunInfo {
        command: "variants",
        project_path,
        started,
        workers: pool.current_num_threads(),
    };
    write_metadata(&output_path, &run, &project, layouts.iter().copied())?;
    info!("Generated {} variants", layouts.len());

    Ok(())
}

/// Handle the `validate` command.
pub fn handle_validate_command(project_path: &Path, settings: Option<Settings>) -> Result<()> {
    let settings = load_settings(settings)?;

    // We won't save log files when running the validate command
    init_logger(&settings, None)?;

    load_project(project_path).context("Failed to validate project.")?;
    info!("Project validation successful!");

    Ok(())
}
