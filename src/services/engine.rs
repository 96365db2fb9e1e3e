//! The build engine: installs the steps of a build plan in order.
//!
//! Every step runs the same sequence: manual-install gate, already-installed
//! check (with uninstall of a diverging installation), language sync,
//! resolution, pre-install fixes, command construction, installer run,
//! result handling, post-install fixes and the pause gate.
//!
//! The engine writes a checkpoint when it starts and before every halt, so
//! a halted build can always be resumed where it stopped.

use crate::metrics::BuildMetrics;
use crate::models::{BuildPlan, JengaConfig, ModStep, RunConfig};
use crate::services::aliases::AliasRegistry;
use crate::services::archive::Unpacker;
use crate::services::fixes::{FixContext, FixRegistry, hook_failed};
use crate::services::mod_index::ModIndex;
use crate::services::resolver::{ModResolver, ResolvedMod};
use crate::services::weidu::{
    self, InstallRequest, InstallationStatus, InstallerRunner, install_argv, installer_log_name,
    uninstall_argv,
};
use crate::services::weidu_log::{InstalledMods, installed_identically};
use crate::state::CheckpointStore;
use crate::ui::{Decision, Gate, Prompter};
use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use std::time::Instant;

/// Why a build stopped before its last step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// Halt chosen at the manual-install or pause gate.
    UserRequest,
    /// Terminate chosen at a pre-install fix prompt.
    FixTerminated,
    InstallFailed,
    /// The user declined to continue after installer warnings.
    Warnings,
    ResolutionFailed,
    UninstallFailed,
}

impl HaltReason {
    /// Whether the halt is a failure rather than the user's choice.
    pub fn is_failure(self) -> bool {
        !matches!(self, HaltReason::UserRequest | HaltReason::FixTerminated)
    }
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            HaltReason::UserRequest => "halted on user request",
            HaltReason::FixTerminated => "terminated at a pre-install fix",
            HaltReason::InstallFailed => "installation failed",
            HaltReason::Warnings => "halted after installer warnings",
            HaltReason::ResolutionFailed => "mod files could not be resolved",
            HaltReason::UninstallFailed => "uninstallation failed or was declined",
        };
        f.write_str(text)
    }
}

/// How a build run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Completed {
        checkpoint: Utf8PathBuf,
    },
    Halted {
        reason: HaltReason,
        mod_name: String,
        checkpoint: Utf8PathBuf,
        last_mod_index: i64,
    },
}

impl BuildOutcome {
    /// Process exit status: 0 for completion and user halts, 1 for failures.
    pub fn exit_code(&self) -> i32 {
        match self {
            BuildOutcome::Completed { .. } => 0,
            BuildOutcome::Halted { reason, .. } if reason.is_failure() => 1,
            BuildOutcome::Halted { .. } => 0,
        }
    }

    pub fn checkpoint(&self) -> &Utf8Path {
        match self {
            BuildOutcome::Completed { checkpoint } | BuildOutcome::Halted { checkpoint, .. } => {
                checkpoint
            }
        }
    }
}

enum StepOutcome {
    Advanced,
    Halt {
        reason: HaltReason,
        last_mod_index: i64,
    },
}

/// Index of the first step to process when resuming `run`.
///
/// Reads `state_file` when given, else the newest checkpoint of the build in
/// the game directory.
pub fn resume_start_index(run: &RunConfig, state_file: Option<&Utf8Path>) -> Result<usize> {
    let path = match state_file {
        Some(path) => path.to_path_buf(),
        None => CheckpointStore::find_latest(&run.game_dir, &run.build_name)?,
    };
    let state = CheckpointStore::read(&path)?;
    if state.build_name != run.build_name {
        tracing::warn!(
            "Checkpoint {} belongs to build '{}', not '{}'",
            path,
            state.build_name,
            run.build_name
        );
    }
    tracing::info!(
        "Resuming build '{}' at step {} from {}",
        run.build_name,
        state.resume_index(),
        path
    );
    Ok(state.resume_index())
}

pub struct BuildEngine<'a> {
    config: &'a JengaConfig,
    run: &'a RunConfig,
    runner: &'a dyn InstallerRunner,
    unpacker: &'a dyn Unpacker,
    prompter: &'a mut dyn Prompter,
    aliases: AliasRegistry,
    index: ModIndex,
    fixes: FixRegistry,
    checkpoint: CheckpointStore,
    metrics: BuildMetrics,
}

impl<'a> BuildEngine<'a> {
    /// An engine with the built-in aliases and fixes, an empty mod index and
    /// a fresh checkpoint file in the game directory.
    pub fn new(
        config: &'a JengaConfig,
        run: &'a RunConfig,
        runner: &'a dyn InstallerRunner,
        unpacker: &'a dyn Unpacker,
        prompter: &'a mut dyn Prompter,
    ) -> Self {
        Self {
            config,
            run,
            runner,
            unpacker,
            prompter,
            aliases: AliasRegistry::with_builtin(),
            index: ModIndex::new(),
            fixes: FixRegistry::builtin(),
            checkpoint: CheckpointStore::create(&run.game_dir, &run.build_name),
            metrics: BuildMetrics::new(),
        }
    }

    pub fn with_aliases(mut self, aliases: AliasRegistry) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn with_index(mut self, index: ModIndex) -> Self {
        self.index = index;
        self
    }

    pub fn with_fixes(mut self, fixes: FixRegistry) -> Self {
        self.fixes = fixes;
        self
    }

    pub fn with_checkpoint_store(mut self, checkpoint: CheckpointStore) -> Self {
        self.checkpoint = checkpoint;
        self
    }

    pub fn checkpoint_path(&self) -> &Utf8Path {
        self.checkpoint.path()
    }

    pub fn metrics(&self) -> &BuildMetrics {
        &self.metrics
    }

    fn save_checkpoint(&self, last_mod_index: i64) -> Result<()> {
        self.checkpoint.save(last_mod_index)?;
        self.metrics.record_checkpoint();
        Ok(())
    }

    /// Install the steps of `plan` from `start_index` on.
    ///
    /// Errors other than the halts described by [`BuildOutcome`] still write
    /// a checkpoint before they propagate.
    pub fn run(&mut self, plan: &BuildPlan, start_index: usize) -> Result<BuildOutcome> {
        let weidu = self.config.demand_weidu_exec_path()?.to_path_buf();
        let installed = if self.run.skip_installed {
            Some(InstalledMods::from_game_dir(&self.run.game_dir)?)
        } else {
            None
        };

        tracing::info!(
            "Starting build '{}' into {} at step {} of {}",
            self.run.build_name,
            self.run.game_dir,
            start_index,
            plan.mods.len()
        );
        self.save_checkpoint(start_index as i64 - 1)?;

        for (i, step) in plan.mods.iter().enumerate().skip(start_index) {
            tracing::info!(
                "[{}/{}] Processing {} {} (components: {})",
                i + 1,
                plan.mods.len(),
                step.name(),
                step.version(),
                step.install_list()
            );
            let outcome = match self.process(i, step, &weidu, installed.as_ref()) {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::error!("Build stopped at {}: {:#}", step.name(), err);
                    self.save_checkpoint(i as i64 - 1)?;
                    tracing::info!("Build state saved to {}", self.checkpoint.path());
                    return Err(err);
                }
            };
            let (reason, last_mod_index) = match outcome {
                StepOutcome::Advanced => {
                    self.save_checkpoint(i as i64)?;
                    continue;
                }
                StepOutcome::Halt {
                    reason,
                    last_mod_index,
                } => (reason, last_mod_index),
            };
            self.save_checkpoint(last_mod_index)?;
            if reason.is_failure() {
                self.metrics.record_failed();
                tracing::error!("Build '{}' {} at {}", self.run.build_name, reason, step.name());
            } else {
                tracing::info!("Build '{}' {} at {}", self.run.build_name, reason, step.name());
            }
            tracing::info!("Build state saved to {}", self.checkpoint.path());
            self.metrics.log_summary();
            return Ok(BuildOutcome::Halted {
                reason,
                mod_name: step.name().to_string(),
                checkpoint: self.checkpoint.path().to_path_buf(),
                last_mod_index,
            });
        }

        self.save_checkpoint(plan.mods.len() as i64 - 1)?;
        tracing::info!("Build '{}' completed", self.run.build_name);
        self.metrics.log_summary();
        Ok(BuildOutcome::Completed {
            checkpoint: self.checkpoint.path().to_path_buf(),
        })
    }

    fn process(
        &mut self,
        i: usize,
        step: &ModStep,
        weidu: &Utf8Path,
        installed: Option<&InstalledMods>,
    ) -> Result<StepOutcome> {
        let name = step.name();
        let previous = i as i64 - 1;
        let current = i as i64;
        let run = self.run;
        let game_dir = &run.game_dir;

        if step.is_manual_install() {
            match self.prompter.ask(&Gate::ManualInstall { mod_name: name }) {
                Decision::Skip => {
                    tracing::info!("Skipping {} at the user's request", name);
                    self.metrics.record_skipped();
                    return Ok(StepOutcome::Advanced);
                }
                Decision::Force => tracing::info!("Forcing automatic installation of {}", name),
                _ => {
                    return Ok(StepOutcome::Halt {
                        reason: HaltReason::UserRequest,
                        last_mod_index: current,
                    });
                }
            }
        }

        if let Some(record) = installed.and_then(|mods| mods.find(name, &self.aliases)) {
            if installed_identically(step, record) {
                tracing::info!("{} is already installed identically; skipping", name);
                self.metrics.record_skipped();
                return Ok(StepOutcome::Advanced);
            }
            tracing::info!("{} is installed differently; uninstalling it first", name);
            let argv = uninstall_argv(weidu, &record.tp2_rel_fpath);
            let command = argv.join(" ");
            let gate = Gate::ConfirmUninstall {
                mod_name: name,
                command: &command,
            };
            if self.prompter.ask(&gate) != Decision::Yes {
                tracing::warn!("Uninstallation of {} declined", name);
                return Ok(StepOutcome::Halt {
                    reason: HaltReason::UninstallFailed,
                    last_mod_index: previous,
                });
            }
            let log_file = game_dir.join(installer_log_name(name));
            let code = self.runner.run(&argv, game_dir, &log_file)?;
            if code != 0 {
                tracing::error!("Uninstalling {} failed with exit code {}", name, code);
                return Ok(StepOutcome::Halt {
                    reason: HaltReason::UninstallFailed,
                    last_mod_index: previous,
                });
            }
            tracing::info!("{} uninstalled", name);
            self.metrics.record_uninstalled();
        }

        if run.force_lang {
            weidu::update_weidu_conf(game_dir, &run.lang)?;
        }

        let resolver = ModResolver::new(self.config, &self.aliases, &self.index, self.unpacker);
        let ResolvedMod {
            mod_dir,
            definition_file,
            source,
        } = match resolver.resolve(step, run, &mut *self.prompter) {
            Ok(resolved) => resolved,
            Err(err) => {
                tracing::error!("Could not resolve {}: {:#}", name, err);
                return Ok(StepOutcome::Halt {
                    reason: HaltReason::ResolutionFailed,
                    last_mod_index: previous,
                });
            }
        };
        tracing::info!(
            "Resolved {} from {:?}: folder {}, definition {}",
            name,
            source,
            mod_dir,
            definition_file
        );

        let ctx = FixContext {
            mod_name: name,
            config: self.config,
            run,
        };
        for hook in self.fixes.prefix_hooks(name, &self.aliases) {
            if self.config.confirm_pre_install_fixes {
                let gate = Gate::PreFix {
                    mod_name: name,
                    fix: hook.name(),
                };
                match self.prompter.ask(&gate) {
                    Decision::Yes => {}
                    Decision::Halt => {
                        return Ok(StepOutcome::Halt {
                            reason: HaltReason::FixTerminated,
                            last_mod_index: previous,
                        });
                    }
                    _ => {
                        tracing::info!("Skipping {} for {}", hook.name(), name);
                        continue;
                    }
                }
            }
            hook.apply(&mod_dir, &definition_file, &ctx)
                .map_err(|err| hook_failed(hook.name(), name, err))?;
            tracing::info!("Applied {} to {}", hook.name(), name);
            self.metrics.record_fix_applied();
        }

        let log_file = game_dir.join(installer_log_name(name));
        let request = InstallRequest {
            weidu,
            definition_file: &definition_file,
            game_dir,
            log_file: &log_file,
            language_int: step.language_int(),
            install_list: step.install_list(),
            lang: &run.lang,
        };
        let mut argv = install_argv(&request);
        for hook in self.fixes.command_hooks(name, &self.aliases) {
            argv = hook
                .apply(argv, &ctx)
                .map_err(|err| hook_failed(hook.name(), name, err))?;
            self.metrics.record_fix_applied();
        }

        weidu::prepare_installer(weidu, &definition_file, &mod_dir)?;
        let started = Instant::now();
        let code = self.runner.run(&argv, game_dir, &log_file)?;
        self.metrics.record_install_time(started.elapsed());

        match InstallationStatus::from_exit_code(code) {
            InstallationStatus::Success => {}
            InstallationStatus::Warnings => {
                self.metrics.record_warnings();
                tracing::warn!("{} installed with warnings", name);
                if self.prompter.ask(&Gate::ContinueAfterWarnings { mod_name: name })
                    != Decision::Continue
                {
                    self.metrics.record_installed();
                    return Ok(StepOutcome::Halt {
                        reason: HaltReason::Warnings,
                        last_mod_index: current,
                    });
                }
            }
            InstallationStatus::Failure => {
                tracing::error!("Installing {} failed with exit code {}", name, code);
                return Ok(StepOutcome::Halt {
                    reason: HaltReason::InstallFailed,
                    last_mod_index: previous,
                });
            }
        }
        self.metrics.record_installed();
        tracing::info!("{} installed successfully", name);

        for hook in self.fixes.postfix_hooks(name, &self.aliases) {
            hook.apply(&mod_dir, &definition_file, &ctx)
                .map_err(|err| hook_failed(hook.name(), name, err))?;
            tracing::info!("Applied {} to {}", hook.name(), name);
            self.metrics.record_fix_applied();
        }

        if let Some(interval) = run.pause_interval {
            if (i + 1) % interval == 0
                && self.prompter.ask(&Gate::Pause { completed: i + 1 }) != Decision::Continue
            {
                return Ok(StepOutcome::Halt {
                    reason: HaltReason::UserRequest,
                    last_mod_index: current,
                });
            }
        }

        Ok(StepOutcome::Advanced)
    }
}
