use anyhow::{Context, Result};
use clap::Parser;
use dpseg::cli::{Cli, Commands, ConfigAction, RunArgs};
use dpseg::config::{Config, DEFAULT_CONFIG_FILE};
use dpseg::manager::Manager;
use log::{LevelFilter, info};
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    match cli.command {
        Commands::Train { run } => {
            let config = run_config(cli.config.as_deref(), &run)?;
            let mut manager = Manager::new(config);
            manager
                .load_bounds(&run.list)
                .with_context(|| format!("Failed to load {}", run.list.display()))?;
            run_sweeps(&mut manager, &run.results)?;
        }
        Commands::Resume {
            snapshot,
            threshold,
            run,
        } => {
            let config = run_config(cli.config.as_deref(), &run)?;
            let mut manager = Manager::new(config);
            manager
                .load_snapshot(&snapshot, &run.list, threshold)
                .with_context(|| {
                    format!(
                        "Failed to resume from {} with {}",
                        snapshot.display(),
                        run.list.display()
                    )
                })?;
            run_sweeps(&mut manager, &run.results)?;
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref())?;
        }
    }

    Ok(())
}

/// Map `-q`/`-v` onto a log level. `RUST_LOG` wins when set.
fn init_logging(quiet: bool, verbose: u8) {
    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .parse_default_env()
        .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. `dpseg.toml` in the working directory
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => Config::load_or_default(&PathBuf::from(DEFAULT_CONFIG_FILE))?,
    };
    Ok(config.with_env_overrides())
}

/// Configuration for a sampling run, with command-line overrides applied.
fn run_config(custom_path: Option<&Path>, run: &RunArgs) -> Result<Config> {
    let mut config = load_config(custom_path)?;
    let training = &mut config.training;
    if let Some(iterations) = run.iterations {
        training.iterations = iterations;
    }
    if let Some(group_size) = run.group_size {
        training.group_size = group_size;
    }
    if run.seed.is_some() {
        training.seed = run.seed;
    }
    if run.no_precompute {
        training.precompute = false;
    }
    config.validate()?;
    Ok(config)
}

fn run_sweeps(manager: &mut Manager, results: &Path) -> Result<()> {
    let iterations = manager.config().training.iterations;
    info!(
        "dpseg {}: {} sweeps into {}",
        dpseg::version_string(),
        iterations,
        results.display()
    );
    manager
        .gibbs_sampling(iterations, results)
        .context("Gibbs sampling stopped")?;
    let corpus = manager.corpus();
    info!(
        "Finished: {} clusters, {} segments",
        corpus.cluster_count(),
        corpus.segment_count()
    );
    Ok(())
}

fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(custom_path)?;
            print!("{}", config.to_toml_string()?);
        }
        ConfigAction::Check { path } => {
            Config::load(&path)
                .with_context(|| format!("Invalid configuration {}", path.display()))?;
            println!("{} is valid", path.display());
        }
    }
    Ok(())
}
