//! Jenga - resumable WeiDU mod-build installer.
//!
//! Command line entry point. Every command is a thin wrapper over the
//! library: it loads the configuration, calls one service and reports the
//! result. Builds exit with 0 on completion or a user halt and 1 on failure.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand, ValueEnum};
use jenga::config::{self, ConfigManager};
use jenga::models::{BuildFileFormat, BuildPlan, GameDirKind, JengaConfig, RunConfig, RunOverrides};
use jenga::services::{
    AliasRegistry, ArchiveUnpacker, BuildEngine, BuildOutcome, ModIndex, ProcessRunner, build_order,
    convert_weidu_log, extract_all, game_dir, resume_start_index,
};
use jenga::ui::ConsolePrompter;
use jenga::{APP_NAME, VERSION};

#[derive(Parser)]
#[command(name = "jenga")]
#[command(version)]
#[command(about = "Automated, resumable WeiDU mod-build installer for Infinity Engine games")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration directory (defaults to the per-user config dir)
    #[arg(long, env = "JENGA_CONFIG_DIR", global = true)]
    config_dir: Option<Utf8PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Install every mod of a build file from the start
    RunFullBuild {
        /// Path to the build file (JSON or YAML)
        build_file: Utf8PathBuf,

        /// Game directory to install into, overriding the configured one
        #[arg(long)]
        game_dir: Option<Utf8PathBuf>,

        /// Skip mods that weidu.log shows as installed identically
        #[arg(long)]
        skip_installed_mods: bool,
    },

    /// Continue a build from its latest checkpoint
    ResumePartialBuild {
        /// Path to the build file (JSON or YAML)
        build_file: Utf8PathBuf,

        /// Checkpoint to resume from (defaults to the newest one of the build)
        #[arg(long)]
        state_file: Option<Utf8PathBuf>,

        /// Game directory to install into, overriding the configured one
        #[arg(long)]
        game_dir: Option<Utf8PathBuf>,

        /// Skip mods that weidu.log shows as installed identically
        #[arg(long)]
        skip_installed_mods: bool,
    },

    /// Turn a game's weidu.log into a build file
    ConvertWeiduLog {
        /// Path to weidu.log
        weidu_log: Utf8PathBuf,

        /// Output format of the build file
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,

        /// Directory to write the build file to (defaults to the log's directory)
        #[arg(long)]
        output_dir: Option<Utf8PathBuf>,
    },

    /// Write the editable build-order view of a build file
    ConvertBuildFileToBuildOrderFile {
        build_file: Utf8PathBuf,
        output: Option<Utf8PathBuf>,
    },

    /// Reorder a build file by an edited build-order file
    ReorderBuildFile {
        build_file: Utf8PathBuf,
        build_order_file: Utf8PathBuf,
        output: Option<Utf8PathBuf>,
    },

    /// Extract every archive of the zipped-mod cache
    ExtractZippedMods {
        /// Only extract archives whose name contains this text
        #[arg(long)]
        filter: Option<String>,
    },

    /// Rebuild the mod index from the extracted-mod cache
    PopulateModIndex,

    /// Extract every archive, then rebuild the mod index
    ExtractAndPopulate,

    /// Replace a game directory with its configured clean copy
    OverwriteGameDir {
        /// Game name or alias (e.g. bgee, bg2ee, "Baldur's Gate")
        game: String,

        /// Use the EET source directory instead of the clean source
        #[arg(long)]
        eet: bool,
    },

    /// Print the effective configuration as YAML
    PrintConfig,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

impl From<OutputFormat> for BuildFileFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => BuildFileFormat::Json,
            OutputFormat::Yaml => BuildFileFormat::Yaml,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            1
        }
    };
    std::process::exit(code);
}

/// Set up logging and dispatch. The log guard is dropped before the process exits.
fn run(cli: Cli) -> Result<i32> {
    let log_dir = config::default_log_dir()?;
    let _guard = jenga::logging::setup_logging_with_console(&log_dir, APP_NAME, cli.debug, true)?;
    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let manager = match &cli.config_dir {
        Some(dir) => ConfigManager::new(dir)?,
        None => ConfigManager::for_user()?,
    };

    let result = dispatch(cli.command, &manager);
    if let Err(err) = &result {
        tracing::error!("{:#}", err);
    }
    result
}

fn dispatch(command: Commands, manager: &ConfigManager) -> Result<i32> {
    match command {
        Commands::RunFullBuild {
            build_file,
            game_dir,
            skip_installed_mods,
        } => {
            let overrides = RunOverrides {
                game_dir,
                skip_installed_mods,
            };
            install_build(manager, &build_file, &overrides, None)
        }
        Commands::ResumePartialBuild {
            build_file,
            state_file,
            game_dir,
            skip_installed_mods,
        } => {
            let overrides = RunOverrides {
                game_dir,
                skip_installed_mods,
            };
            install_build(manager, &build_file, &overrides, Some(state_file.as_deref()))
        }
        Commands::ConvertWeiduLog {
            weidu_log,
            format,
            output_dir,
        } => {
            let out = convert_weidu_log(&weidu_log, format.into(), output_dir.as_deref())?;
            println!("Build file written to {}", out);
            Ok(0)
        }
        Commands::ConvertBuildFileToBuildOrderFile { build_file, output } => {
            let out = build_order::build_file_to_build_order_file(&build_file, output.as_deref())?;
            println!("Build order file written to {}", out);
            Ok(0)
        }
        Commands::ReorderBuildFile {
            build_file,
            build_order_file,
            output,
        } => {
            let out =
                build_order::reorder_build_file(&build_file, &build_order_file, output.as_deref())?;
            println!("Reordered build file written to {}", out);
            Ok(0)
        }
        Commands::ExtractZippedMods { filter } => {
            let config = manager.load_config()?;
            extract_zipped_mods(&config, filter.as_deref())
        }
        Commands::PopulateModIndex => {
            let config = manager.load_config()?;
            populate_mod_index(manager, &config)?;
            Ok(0)
        }
        Commands::ExtractAndPopulate => {
            let config = manager.load_config()?;
            let code = extract_zipped_mods(&config, None)?;
            populate_mod_index(manager, &config)?;
            Ok(code)
        }
        Commands::OverwriteGameDir { game, eet } => {
            let config = manager.load_config()?;
            let source_kind = if eet {
                GameDirKind::EetSource
            } else {
                GameDirKind::CleanSource
            };
            let mut prompter = ConsolePrompter::stdio();
            let target = game_dir::overwrite_game_dir(&config, &game, source_kind, &mut prompter)?;
            println!("{} has been overwritten", target);
            Ok(0)
        }
        Commands::PrintConfig => {
            let config = manager.load_config()?;
            let yaml =
                serde_yaml_ng::to_string(&config).context("Failed to serialize config to YAML")?;
            println!("# {}", manager.config_path());
            print!("{}", yaml);
            Ok(0)
        }
    }
}

/// Run a build. `resume` is `None` for a full build and `Some(state_file)`
/// for a resumed one.
fn install_build(
    manager: &ConfigManager,
    build_file: &Utf8Path,
    overrides: &RunOverrides,
    resume: Option<Option<&Utf8Path>>,
) -> Result<i32> {
    let config = manager.load_config()?;
    let plan = BuildPlan::load(build_file)?;
    let run = RunConfig::resolve(&plan.config, &config, overrides)?;

    let start_index = match resume {
        Some(state_file) => resume_start_index(&run, state_file)?,
        None => 0,
    };

    let runner = ProcessRunner::new();
    let unpacker = ArchiveUnpacker::new();
    let mut prompter = ConsolePrompter::stdio();

    let mut engine = BuildEngine::new(&config, &run, &runner, &unpacker, &mut prompter)
        .with_aliases(manager.load_aliases()?);
    if run.prefer_index {
        engine = engine.with_index(manager.load_mod_index()?);
    }

    println!("Checkpoints for this run: {}", engine.checkpoint_path());
    let outcome = engine.run(&plan, start_index)?;
    engine.metrics().log_summary();

    match &outcome {
        BuildOutcome::Completed { .. } => {
            println!("Build '{}' completed.", run.build_name);
        }
        BuildOutcome::Halted {
            reason,
            mod_name,
            checkpoint,
            ..
        } => {
            println!("Build '{}' halted at {}: {}", run.build_name, mod_name, reason);
            println!("Resume with the checkpoint at {}", checkpoint);
        }
    }
    Ok(outcome.exit_code())
}

fn extract_zipped_mods(config: &JengaConfig, filter: Option<&str>) -> Result<i32> {
    let zipped_dir = config.demand_zipped_mod_cache_dir()?;
    let extracted_dir = config.demand_extracted_mod_cache_dir()?;
    let report = extract_all(zipped_dir, extracted_dir, filter, &ArchiveUnpacker::new())?;

    println!("Extracted {} archive(s)", report.extracted.len());
    for result in &report.extracted {
        println!("  {} -> {}", result.archive_file_name, result.mod_folder);
    }
    if report.failed.is_empty() {
        return Ok(0);
    }
    println!("Failed to extract {} archive(s)", report.failed.len());
    for (archive, reason) in &report.failed {
        println!("  {}: {}", archive, reason);
    }
    Ok(1)
}

fn populate_mod_index(manager: &ConfigManager, config: &JengaConfig) -> Result<()> {
    let extracted_dir = config.demand_extracted_mod_cache_dir()?;
    let mut aliases = AliasRegistry::with_builtin();
    let index = ModIndex::populate(extracted_dir, &mut aliases)?;
    manager.save_mod_index(&index, &aliases)?;
    println!("Indexed {} mod(s) into {}", index.len(), manager.mod_index_path());
    Ok(())
}
