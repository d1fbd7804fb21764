//! Graphs command line
//!
//! Headless access to the project engine: build projects from data files,
//! inspect and migrate project files, and export their datasets.
//!
//! Exit codes: 0 success, 1 parse error, 2 incompatible project, 3 IO error.

use anyhow::Context;
use clap::{Parser, Subcommand};
use graphs_core::{
    config::{self, AppState, Preferences},
    error::GraphsError,
    export,
    item::Item,
    project::{self, Project},
    ProjectEngine,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "graphs", version, about = "Create and inspect Graphs projects")]
struct Cli {
    /// Also write a daily rolling log file to the app data directory
    #[arg(long, global = true)]
    log_file: bool,

    /// Preferences file to use instead of the stored one
    #[arg(long, global = true)]
    preferences: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import data files into a new project
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Project file to write, `.graphs` is appended when there is no extension
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Describe a project file
    Info { project: PathBuf },
    /// Write every dataset of a project as a text file
    Export {
        project: PathBuf,
        directory: PathBuf,
        /// Start each file with an `xlabel<TAB>ylabel` line
        #[arg(long)]
        header: bool,
    },
    /// Rewrite a project in the current format
    Migrate {
        project: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn init_logging(log_file: bool) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let (file_layer, guard) = match log_file.then(config::ensure_app_data_dir) {
        Some(Ok(dir)) => {
            let appender = tracing_appender::rolling::daily(dir.join("logs"), "graphs.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        Some(Err(e)) => {
            eprintln!("Not writing a log file: {}", e);
            (None, None)
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,graphs_core=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    guard
}

fn load_preferences(path: Option<&PathBuf>) -> anyhow::Result<Preferences> {
    match path {
        Some(path) => Preferences::load_from(path)
            .with_context(|| format!("Loading preferences from {}", path.display())),
        None => Ok(Preferences::load_or_default()),
    }
}

fn describe(item: &Item) -> String {
    match item.xdata() {
        Some(x) => format!("{} points", x.len()),
        None => item
            .equation_item()
            .map(|e| format!("y = {}", e.equation))
            .unwrap_or_default(),
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let preferences = load_preferences(cli.preferences.as_ref())?;
    let max_states = preferences.history.max_states;

    match cli.command {
        Command::Import { files, mut output } => {
            if output.extension().is_none() {
                output.set_extension(config::PROJECT_FILE_EXTENSION);
            }
            let mut engine = ProjectEngine::new(preferences, Default::default());
            engine.import(&files)?;
            engine.save(Some(&output))?;
            println!(
                "Wrote {} items to {}",
                engine.items().len(),
                output.display()
            );
            let mut state = AppState::load_or_default();
            state.add_recent_project(&output, &engine.project_name());
            if let Err(e) = state.save() {
                tracing::warn!("Could not update recent projects: {}", e);
            }
        }
        Command::Info { project: path } => {
            let dict = project::read_dict(&path)?;
            let version = project::migrate::project_version(&dict)?;
            let project = Project::from_dict(dict, max_states)?;
            println!("{}", path.display());
            println!("  format version: {}", version);
            let figure = &project.model.figure;
            if !figure.title.is_empty() {
                println!("  title: {}", figure.title);
            }
            println!("  items:");
            for item in &project.model.items {
                println!(
                    "    {} [{}] {}",
                    item.name,
                    item.item_type().as_str(),
                    describe(item)
                );
            }
            println!(
                "  history: {} states at {}",
                project.history.states().len(),
                project.history.position()
            );
        }
        Command::Export {
            project: path,
            directory,
            header,
        } => {
            let project = project::load(&path, max_states)?;
            let items: Vec<&Item> = project.model.items.iter().collect();
            let written = export::export_items(&items, &directory, header)?;
            println!("Exported {} datasets to {}", written.len(), directory.display());
        }
        Command::Migrate {
            project: path,
            output,
        } => {
            let project = project::load(&path, max_states)?;
            project::write_dict(&output, &project.to_dict()?)?;
            println!("Wrote {}", output.display());
        }
    }
    Ok(())
}

fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<GraphsError>().map(GraphsError::root) {
        Some(GraphsError::ProjectIncompatible(_)) => 2,
        Some(GraphsError::Io(_)) => 3,
        _ => 1,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_logging(cli.log_file);
    tracing::debug!("Running {:?}", cli.command);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}
