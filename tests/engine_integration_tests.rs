//! Integration tests for BuildEngine
//!
//! The installer is mocked, every gate is answered by a ScriptedPrompter and
//! mods are resolved from a temporary extracted-mods directory. These tests
//! verify:
//! - Checkpoints written on failures, warnings, pauses and completion
//! - Resuming from a checkpoint skips finished steps
//! - Manual-install, uninstall and skip-installed handling
//! - Fix hooks around the installer, with and without confirmation

use camino::{Utf8Path, Utf8PathBuf};
use jenga::JengaError;
use jenga::models::{BuildPlan, BuildSettings, Component, JengaConfig, ModStep, RunConfig, RunOverrides};
use jenga::services::{
    BuildEngine, BuildOutcome, CommandFix, FileFix, Fix, FixContext, FixRegistry, HaltReason,
    InstallerRunner, Unpacker, resume_start_index,
};
use jenga::state::CheckpointStore;
use jenga::ui::{Decision, GateKind, ScriptedPrompter};
use mockall::mock;
use std::fs;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

mock! {
    Runner {}
    impl InstallerRunner for Runner {
        fn run(&self, argv: &[String], cwd: &Utf8Path, log_file: &Utf8Path) -> anyhow::Result<i32>;
    }
}

struct NoUnpack;

impl Unpacker for NoUnpack {
    fn unpack(&self, archive: &Utf8Path, _dest: &Utf8Path) -> anyhow::Result<()> {
        anyhow::bail!("unexpected unpack of {}", archive)
    }
}

struct Workspace {
    _temp_dir: TempDir,
    game: Utf8PathBuf,
    config: JengaConfig,
}

impl Workspace {
    /// A game directory, an installer file and an extracted-mods directory
    /// holding `eet`, `lucy` and `crucible`.
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let game = root.join("game");
        let extracted = root.join("extracted");
        fs::create_dir_all(&game).unwrap();
        for (folder, tp2) in [("eet", "eet.tp2"), ("lucy", "setup-lucy.tp2"), ("crucible", "crucible.tp2")] {
            fs::create_dir_all(extracted.join(folder)).unwrap();
            fs::write(extracted.join(folder).join(tp2), "BACKUP ~backup~").unwrap();
        }
        let weidu = root.join("weidu");
        fs::write(&weidu, "").unwrap();

        let config = JengaConfig {
            weidu_exec_path: Some(weidu),
            extracted_mod_cache_dir_path: Some(extracted),
            ..Default::default()
        };
        Self {
            _temp_dir: temp_dir,
            game,
            config,
        }
    }

    fn run_config(&self, settings: BuildSettings) -> RunConfig {
        let overrides = RunOverrides {
            game_dir: Some(self.game.clone()),
            ..Default::default()
        };
        RunConfig::resolve(&settings, &self.config, &overrides).unwrap()
    }

    fn checkpoint(&self, name: &str) -> CheckpointStore {
        CheckpointStore::at(self.game.join(name), "eet_core")
    }
}

fn settings() -> BuildSettings {
    BuildSettings {
        build_name: "eet_core".to_string(),
        ..Default::default()
    }
}

fn step(name: &str) -> ModStep {
    ModStep::new(name, "1.0", 0, vec![Component::new("0", format!("{} main", name))]).unwrap()
}

fn plan(steps: Vec<ModStep>) -> BuildPlan {
    BuildPlan {
        config: settings(),
        mods: steps,
    }
}

/// A runner that records the definition file of every call and answers with
/// `exit_code(definition)`.
fn recording_runner(
    calls: Arc<Mutex<Vec<String>>>,
    exit_code: fn(&str) -> i32,
) -> MockRunner {
    let mut runner = MockRunner::new();
    runner.expect_run().returning(move |argv, _, _| {
        let definition = argv[1].clone();
        calls.lock().unwrap().push(definition.clone());
        Ok(exit_code(&definition))
    });
    runner
}

#[test]
fn test_full_build_completes() {
    let ws = Workspace::new();
    let run = ws.run_config(settings());
    let calls = Arc::new(Mutex::new(Vec::new()));
    let runner = recording_runner(calls.clone(), |_| 0);
    let mut prompter = ScriptedPrompter::default();

    let outcome = {
        let mut engine = BuildEngine::new(&ws.config, &run, &runner, &NoUnpack, &mut prompter)
            .with_checkpoint_store(ws.checkpoint("state.json"));
        let outcome = engine
            .run(&plan(vec![step("eet"), step("lucy"), step("crucible")]), 0)
            .unwrap();
        assert_eq!(engine.metrics().installed(), 3);
        outcome
    };

    assert!(matches!(outcome, BuildOutcome::Completed { .. }));
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(CheckpointStore::read(outcome.checkpoint()).unwrap().last_mod_index, 2);
    assert_eq!(
        *calls.lock().unwrap(),
        vec!["eet/eet.tp2", "lucy/setup-lucy.tp2", "crucible/crucible.tp2"]
    );
    assert!(ws.game.join("lucy/setup-lucy.tp2").is_file());
    assert!(prompter.asked().is_empty());
}

#[test]
fn test_install_failure_checkpoints_previous_step_and_resumes() {
    let ws = Workspace::new();
    let run = ws.run_config(settings());
    let build = plan(vec![step("eet"), step("lucy"), step("crucible")]);

    let calls = Arc::new(Mutex::new(Vec::new()));
    let runner = recording_runner(calls.clone(), |def| if def.contains("lucy") { 6 } else { 0 });
    let mut prompter = ScriptedPrompter::default();
    let outcome = BuildEngine::new(&ws.config, &run, &runner, &NoUnpack, &mut prompter)
        .with_checkpoint_store(ws.checkpoint("first.json"))
        .run(&build, 0)
        .unwrap();

    match &outcome {
        BuildOutcome::Halted {
            reason,
            mod_name,
            last_mod_index,
            ..
        } => {
            assert_eq!(*reason, HaltReason::InstallFailed);
            assert_eq!(mod_name, "lucy");
            assert_eq!(*last_mod_index, 0);
        }
        other => panic!("expected a halt, got {:?}", other),
    }
    assert_eq!(outcome.exit_code(), 1);
    assert_eq!(CheckpointStore::read(outcome.checkpoint()).unwrap().last_mod_index, 0);
    assert_eq!(calls.lock().unwrap().len(), 2);

    let start = resume_start_index(&run, Some(outcome.checkpoint())).unwrap();
    assert_eq!(start, 1);

    let resumed_calls = Arc::new(Mutex::new(Vec::new()));
    let runner = recording_runner(resumed_calls.clone(), |_| 0);
    let mut prompter = ScriptedPrompter::default();
    let resumed = BuildEngine::new(&ws.config, &run, &runner, &NoUnpack, &mut prompter)
        .with_checkpoint_store(ws.checkpoint("second.json"))
        .run(&build, start)
        .unwrap();

    assert_eq!(resumed.exit_code(), 0);
    assert_eq!(
        *resumed_calls.lock().unwrap(),
        vec!["lucy/setup-lucy.tp2", "crucible/crucible.tp2"]
    );
    assert_eq!(CheckpointStore::read(resumed.checkpoint()).unwrap().last_mod_index, 2);
}

#[test]
fn test_resume_finds_latest_checkpoint_in_game_dir() {
    let ws = Workspace::new();
    let run = ws.run_config(settings());
    CheckpointStore::at(ws.game.join("jenga_state_eet_core_20240301_101500.json"), "eet_core")
        .save(0)
        .unwrap();
    CheckpointStore::at(ws.game.join("jenga_state_eet_core_20240302_090000.json"), "eet_core")
        .save(1)
        .unwrap();

    assert_eq!(resume_start_index(&run, None).unwrap(), 2);
}

#[test]
fn test_halt_on_warnings_checkpoints_current_step() {
    let ws = Workspace::new();
    let run = ws.run_config(settings());
    let runner = recording_runner(Arc::new(Mutex::new(Vec::new())), |def| {
        if def.contains("lucy") { 3 } else { 0 }
    });
    let mut prompter = ScriptedPrompter::new([Decision::Halt]);

    let outcome = BuildEngine::new(&ws.config, &run, &runner, &NoUnpack, &mut prompter)
        .with_checkpoint_store(ws.checkpoint("state.json"))
        .run(&plan(vec![step("eet"), step("lucy"), step("crucible")]), 0)
        .unwrap();

    assert!(matches!(
        outcome,
        BuildOutcome::Halted {
            reason: HaltReason::Warnings,
            last_mod_index: 1,
            ..
        }
    ));
    assert_eq!(outcome.exit_code(), 1);
    assert_eq!(CheckpointStore::read(outcome.checkpoint()).unwrap().last_mod_index, 1);
    assert_eq!(prompter.asked(), &[GateKind::ContinueAfterWarnings]);
}

#[test]
fn test_continue_after_warnings() {
    let ws = Workspace::new();
    let run = ws.run_config(settings());
    let runner = recording_runner(Arc::new(Mutex::new(Vec::new())), |_| 3);
    let mut prompter = ScriptedPrompter::new([Decision::Continue, Decision::Continue]);

    let outcome = BuildEngine::new(&ws.config, &run, &runner, &NoUnpack, &mut prompter)
        .with_checkpoint_store(ws.checkpoint("state.json"))
        .run(&plan(vec![step("eet"), step("lucy")]), 0)
        .unwrap();

    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(prompter.remaining(), 0);
}

#[test]
fn test_manual_install_skip_advances() {
    let ws = Workspace::new();
    let run = ws.run_config(settings());
    let calls = Arc::new(Mutex::new(Vec::new()));
    let runner = recording_runner(calls.clone(), |_| 0);
    let mut prompter = ScriptedPrompter::new([Decision::Skip]);

    let outcome = BuildEngine::new(&ws.config, &run, &runner, &NoUnpack, &mut prompter)
        .with_checkpoint_store(ws.checkpoint("state.json"))
        .run(
            &plan(vec![step("eet").with_manual_install(true), step("lucy")]),
            0,
        )
        .unwrap();

    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(*calls.lock().unwrap(), vec!["lucy/setup-lucy.tp2"]);
    assert_eq!(prompter.asked(), &[GateKind::ManualInstall]);
}

#[test]
fn test_manual_install_halt_checkpoints_current_step() {
    let ws = Workspace::new();
    let run = ws.run_config(settings());
    let mut runner = MockRunner::new();
    runner.expect_run().times(1).returning(|_, _, _| Ok(0));
    let mut prompter = ScriptedPrompter::new([Decision::Halt]);

    let outcome = BuildEngine::new(&ws.config, &run, &runner, &NoUnpack, &mut prompter)
        .with_checkpoint_store(ws.checkpoint("state.json"))
        .run(
            &plan(vec![step("eet"), step("lucy").with_manual_install(true)]),
            0,
        )
        .unwrap();

    assert!(matches!(
        outcome,
        BuildOutcome::Halted {
            reason: HaltReason::UserRequest,
            last_mod_index: 1,
            ..
        }
    ));
    assert_eq!(outcome.exit_code(), 0);
}

#[test]
fn test_pause_halt_is_user_request() {
    let ws = Workspace::new();
    let run = ws.run_config(BuildSettings {
        pause_every_x_mods: Some(2),
        ..settings()
    });
    let calls = Arc::new(Mutex::new(Vec::new()));
    let runner = recording_runner(calls.clone(), |_| 0);
    let mut prompter = ScriptedPrompter::new([Decision::Halt]);

    let outcome = BuildEngine::new(&ws.config, &run, &runner, &NoUnpack, &mut prompter)
        .with_checkpoint_store(ws.checkpoint("state.json"))
        .run(&plan(vec![step("eet"), step("lucy"), step("crucible")]), 0)
        .unwrap();

    assert!(matches!(
        outcome,
        BuildOutcome::Halted {
            reason: HaltReason::UserRequest,
            last_mod_index: 1,
            ..
        }
    ));
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(calls.lock().unwrap().len(), 2);
    assert_eq!(prompter.asked(), &[GateKind::Pause]);
}

#[test]
fn test_unresolvable_mod_halts_before_it() {
    let ws = Workspace::new();
    let run = ws.run_config(settings());
    let mut runner = MockRunner::new();
    runner.expect_run().times(1).returning(|_, _, _| Ok(0));
    let mut prompter = ScriptedPrompter::default();

    let outcome = BuildEngine::new(&ws.config, &run, &runner, &NoUnpack, &mut prompter)
        .with_checkpoint_store(ws.checkpoint("state.json"))
        .run(&plan(vec![step("eet"), step("zzqqxxvv")]), 0)
        .unwrap();

    assert!(matches!(
        outcome,
        BuildOutcome::Halted {
            reason: HaltReason::ResolutionFailed,
            last_mod_index: 0,
            ..
        }
    ));
    assert_eq!(outcome.exit_code(), 1);
}

#[test]
fn test_skip_installed_and_uninstall_changed() {
    let ws = Workspace::new();
    fs::write(
        ws.game.join("weidu.log"),
        "// Log of Currently Installed WeiDU Mods\n\
         ~EET/EET.TP2~ #0 #0 // eet main: 1.0\n\
         ~LUCY/SETUP-LUCY.TP2~ #0 #0 // lucy main: 0.9\n",
    )
    .unwrap();
    let run = ws.run_config(BuildSettings {
        skip_installed_mods: true,
        ..settings()
    });
    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut runner = MockRunner::new();
    let recorded = calls.clone();
    runner.expect_run().returning(move |argv, _, _| {
        recorded.lock().unwrap().push(argv[1..].join(" "));
        Ok(0)
    });
    let mut prompter = ScriptedPrompter::new([Decision::Yes]);

    let outcome = BuildEngine::new(&ws.config, &run, &runner, &NoUnpack, &mut prompter)
        .with_fixes(FixRegistry::new())
        .with_checkpoint_store(ws.checkpoint("state.json"))
        .run(&plan(vec![step("eet"), step("lucy")]), 0)
        .unwrap();

    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(prompter.asked(), &[GateKind::ConfirmUninstall]);
    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].starts_with("LUCY/SETUP-LUCY.TP2"));
    assert!(calls[0].contains("--uninstall"));
    assert!(calls[1].starts_with("lucy/setup-lucy.tp2"));
}

#[test]
fn test_declined_uninstall_halts_before_step() {
    let ws = Workspace::new();
    fs::write(
        ws.game.join("weidu.log"),
        "~LUCY/SETUP-LUCY.TP2~ #0 #0 // lucy main: 0.9\n",
    )
    .unwrap();
    let run = ws.run_config(BuildSettings {
        skip_installed_mods: true,
        ..settings()
    });
    let mut runner = MockRunner::new();
    runner.expect_run().times(1).returning(|_, _, _| Ok(0));
    let mut prompter = ScriptedPrompter::new([Decision::No]);

    let outcome = BuildEngine::new(&ws.config, &run, &runner, &NoUnpack, &mut prompter)
        .with_checkpoint_store(ws.checkpoint("state.json"))
        .run(&plan(vec![step("eet"), step("lucy")]), 0)
        .unwrap();

    assert!(matches!(
        outcome,
        BuildOutcome::Halted {
            reason: HaltReason::UninstallFailed,
            last_mod_index: 0,
            ..
        }
    ));
}

#[test]
fn test_force_lang_writes_weidu_conf() {
    let ws = Workspace::new();
    let run = ws.run_config(BuildSettings {
        lang: Some("de_de".to_string()),
        force_lang_in_weidu_conf: true,
        ..settings()
    });
    let runner = recording_runner(Arc::new(Mutex::new(Vec::new())), |_| 0);
    let mut prompter = ScriptedPrompter::default();

    BuildEngine::new(&ws.config, &run, &runner, &NoUnpack, &mut prompter)
        .with_checkpoint_store(ws.checkpoint("state.json"))
        .run(&plan(vec![step("eet")]), 0)
        .unwrap();

    let conf = fs::read_to_string(ws.game.join("weidu.conf")).unwrap();
    assert!(conf.contains("lang_dir = de_de"));
}

#[test]
fn test_checkpoint_advances_after_each_finished_step() {
    let ws = Workspace::new();
    let run = ws.run_config(settings());
    let state_file = ws.game.join("state.json");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut runner = MockRunner::new();
    let (recorded, path) = (seen.clone(), state_file.clone());
    runner.expect_run().returning(move |_, _, _| {
        let state = CheckpointStore::read(&path).unwrap();
        recorded.lock().unwrap().push(state.last_mod_index);
        Ok(0)
    });
    let mut prompter = ScriptedPrompter::new([Decision::Skip]);

    let outcome = BuildEngine::new(&ws.config, &run, &runner, &NoUnpack, &mut prompter)
        .with_checkpoint_store(ws.checkpoint("state.json"))
        .run(
            &plan(vec![
                step("eet"),
                step("lucy").with_manual_install(true),
                step("crucible"),
            ]),
            0,
        )
        .unwrap();

    assert_eq!(outcome.exit_code(), 0);
    // crucible starts after the skipped lucy has advanced the checkpoint
    assert_eq!(*seen.lock().unwrap(), vec![-1, 1]);
    assert_eq!(CheckpointStore::read(&state_file).unwrap().last_mod_index, 2);
}

/// Records `"<label> <mod>"` when applied, or fails when `fail` is set.
#[derive(Debug)]
struct RecordingFix {
    label: &'static str,
    events: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl RecordingFix {
    fn boxed(label: &'static str, events: &Arc<Mutex<Vec<String>>>) -> Box<Self> {
        Box::new(Self {
            label,
            events: events.clone(),
            fail: false,
        })
    }
}

impl FileFix for RecordingFix {
    fn name(&self) -> &str {
        self.label
    }

    fn apply(
        &self,
        mod_dir: &Utf8Path,
        definition_file: &Utf8Path,
        ctx: &FixContext<'_>,
    ) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("cannot patch {}", definition_file);
        }
        assert!(mod_dir.is_dir());
        assert!(definition_file.is_file());
        self.events
            .lock()
            .unwrap()
            .push(format!("{} {}", self.label, ctx.mod_name));
        Ok(())
    }
}

#[derive(Debug)]
struct AppendFlag {
    flag: &'static str,
    events: Arc<Mutex<Vec<String>>>,
}

impl CommandFix for AppendFlag {
    fn name(&self) -> &str {
        "append-flag"
    }

    fn apply(&self, mut argv: Vec<String>, ctx: &FixContext<'_>) -> anyhow::Result<Vec<String>> {
        self.events
            .lock()
            .unwrap()
            .push(format!("command {}", ctx.mod_name));
        argv.push(self.flag.to_string());
        Ok(argv)
    }
}

/// A runner that logs `"install <definition> <last arg>"` into `events`.
fn event_runner(events: &Arc<Mutex<Vec<String>>>) -> MockRunner {
    let events = events.clone();
    let mut runner = MockRunner::new();
    runner.expect_run().returning(move |argv, _, _| {
        let last = argv.last().cloned().unwrap_or_default();
        events
            .lock()
            .unwrap()
            .push(format!("install {} {}", argv[1], last));
        Ok(0)
    });
    runner
}

#[test]
fn test_fix_hooks_run_around_the_installer() {
    let ws = Workspace::new();
    let run = ws.run_config(settings());
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut fixes = FixRegistry::new();
    fixes.register("lucy", Fix::Postfix(RecordingFix::boxed("post", &events)));
    fixes.register(
        "lucy",
        Fix::Command(Box::new(AppendFlag {
            flag: "--print-backtrace",
            events: events.clone(),
        })),
    );
    fixes.register("lucy", Fix::Prefix(RecordingFix::boxed("pre", &events)));
    let runner = event_runner(&events);
    let mut prompter = ScriptedPrompter::default();

    let outcome = BuildEngine::new(&ws.config, &run, &runner, &NoUnpack, &mut prompter)
        .with_fixes(fixes)
        .with_checkpoint_store(ws.checkpoint("state.json"))
        .run(&plan(vec![step("eet"), step("lucy")]), 0)
        .unwrap();

    assert_eq!(outcome.exit_code(), 0);
    let events = events.lock().unwrap();
    assert_eq!(events.len(), 5);
    assert!(events[0].starts_with("install eet/eet.tp2"));
    assert!(!events[0].ends_with("--print-backtrace"));
    assert_eq!(
        events[1..],
        [
            "pre lucy",
            "command lucy",
            "install lucy/setup-lucy.tp2 --print-backtrace",
            "post lucy",
        ]
    );
    assert!(prompter.asked().is_empty());
}

#[test]
fn test_failing_fix_checkpoints_previous_step_and_propagates() {
    let ws = Workspace::new();
    let run = ws.run_config(settings());
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut fixes = FixRegistry::new();
    fixes.register(
        "eet",
        Fix::Command(Box::new(AppendFlag {
            flag: "--quick-log",
            events: events.clone(),
        })),
    );
    fixes.register(
        "lucy",
        Fix::Prefix(Box::new(RecordingFix {
            label: "boom",
            events: events.clone(),
            fail: true,
        })),
    );
    let runner = event_runner(&events);
    let mut prompter = ScriptedPrompter::default();

    let err = BuildEngine::new(&ws.config, &run, &runner, &NoUnpack, &mut prompter)
        .with_fixes(fixes)
        .with_checkpoint_store(ws.checkpoint("state.json"))
        .run(&plan(vec![step("eet"), step("lucy"), step("crucible")]), 0)
        .unwrap_err();

    match err.downcast_ref::<JengaError>() {
        Some(JengaError::HookFailed { fix, mod_name, .. }) => {
            assert_eq!(fix, "boom");
            assert_eq!(mod_name, "lucy");
        }
        other => panic!("expected a hook failure, got {:?}", other),
    }
    assert_eq!(
        *events.lock().unwrap(),
        vec!["command eet", "install eet/eet.tp2 --quick-log"]
    );
    let state = CheckpointStore::read(&ws.game.join("state.json")).unwrap();
    assert_eq!(state.last_mod_index, 0);
}

#[test]
fn test_confirmed_fixes_apply_or_skip_per_answer() {
    let mut ws = Workspace::new();
    ws.config.confirm_pre_install_fixes = true;
    let run = ws.run_config(settings());
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut fixes = FixRegistry::new();
    fixes.register("lucy", Fix::Prefix(RecordingFix::boxed("first", &events)));
    fixes.register("lucy", Fix::Prefix(RecordingFix::boxed("second", &events)));
    let runner = event_runner(&events);
    let mut prompter = ScriptedPrompter::new([Decision::Yes, Decision::Skip]);

    let outcome = BuildEngine::new(&ws.config, &run, &runner, &NoUnpack, &mut prompter)
        .with_fixes(fixes)
        .with_checkpoint_store(ws.checkpoint("state.json"))
        .run(&plan(vec![step("lucy")]), 0)
        .unwrap();

    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(prompter.asked(), &[GateKind::PreFix, GateKind::PreFix]);
    let events = events.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0], "first lucy");
    assert!(events[1].starts_with("install lucy/setup-lucy.tp2"));
}

#[test]
fn test_terminating_at_fix_gate_halts_before_step() {
    let mut ws = Workspace::new();
    ws.config.confirm_pre_install_fixes = true;
    let run = ws.run_config(settings());
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut fixes = FixRegistry::new();
    fixes.register("lucy", Fix::Prefix(RecordingFix::boxed("pre", &events)));
    let runner = event_runner(&events);
    let mut prompter = ScriptedPrompter::new([Decision::Halt]);

    let outcome = BuildEngine::new(&ws.config, &run, &runner, &NoUnpack, &mut prompter)
        .with_fixes(fixes)
        .with_checkpoint_store(ws.checkpoint("state.json"))
        .run(&plan(vec![step("eet"), step("lucy"), step("crucible")]), 0)
        .unwrap();

    assert!(matches!(
        outcome,
        BuildOutcome::Halted {
            reason: HaltReason::FixTerminated,
            last_mod_index: 0,
            ..
        }
    ));
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(CheckpointStore::read(outcome.checkpoint()).unwrap().last_mod_index, 0);
    let events = events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert!(events[0].starts_with("install eet/eet.tp2"));
}
