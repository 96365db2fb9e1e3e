//! Driving the WeiDU installer.
//!
//! Builds installer command lines, runs them with output streamed to the
//! console and a per-mod log file, and maps exit codes to
//! [`InstallationStatus`].

use anyhow::{Context, Result, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs::{self, OpenOptions};
use std::io::{self, Read, Write};
use std::process::{Command, Stdio};

use crate::services::fsutil;

pub const WEIDU_CONF_FILE: &str = "weidu.conf";

/// Exit code WeiDU returns when it installed with warnings.
const WARNINGS_EXIT_CODE: i32 = 3;

/// How an installer run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallationStatus {
    Success,
    Warnings,
    Failure,
}

impl InstallationStatus {
    pub fn from_exit_code(code: i32) -> Self {
        match code {
            0 => InstallationStatus::Success,
            WARNINGS_EXIT_CODE => InstallationStatus::Warnings,
            _ => InstallationStatus::Failure,
        }
    }
}

/// Everything needed to build one install command line.
#[derive(Debug, Clone, Copy)]
pub struct InstallRequest<'a> {
    pub weidu: &'a Utf8Path,
    pub definition_file: &'a Utf8Path,
    pub game_dir: &'a Utf8Path,
    pub log_file: &'a Utf8Path,
    pub language_int: u32,
    pub install_list: &'a str,
    pub lang: &'a str,
}

/// `path` relative to `base` when it lies under it, else `path` unchanged.
pub fn relative_to(path: &Utf8Path, base: &Utf8Path) -> Utf8PathBuf {
    path.strip_prefix(base)
        .map(Utf8Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Installer arguments for one mod step, executable first.
pub fn install_argv(request: &InstallRequest<'_>) -> Vec<String> {
    let definition = relative_to(request.definition_file, request.game_dir);
    vec![
        request.weidu.to_string(),
        definition.to_string(),
        "--no-exit-pause".to_string(),
        "--game".to_string(),
        request.game_dir.to_string(),
        "--log".to_string(),
        request.log_file.to_string(),
        "--language".to_string(),
        request.language_int.to_string(),
        "--skip-at-view".to_string(),
        "--force-install-list".to_string(),
        request.install_list.to_string(),
        "--use-lang".to_string(),
        request.lang.to_string(),
    ]
}

pub fn uninstall_argv(weidu: &Utf8Path, definition_rel_path: &str) -> Vec<String> {
    vec![
        weidu.to_string(),
        definition_rel_path.to_string(),
        "--no-exit-pause".to_string(),
        "--uninstall".to_string(),
    ]
}

/// Per-mod installer log file name: `setup-<name>.debug`, lower-cased with
/// spaces turned into underscores.
pub fn installer_log_name(mod_name: &str) -> String {
    format!("setup-{}.debug", mod_name.to_lowercase().replace(' ', "_"))
}

/// Make the installer and definition file executable and the mod folder writable.
pub fn prepare_installer(weidu: &Utf8Path, definition_file: &Utf8Path, mod_dir: &Utf8Path) -> Result<()> {
    fsutil::make_executable(weidu)?;
    fsutil::make_executable(definition_file)?;
    fsutil::make_writable(mod_dir);
    Ok(())
}

/// Set `lang_dir = <lang>` in the game's `weidu.conf`.
///
/// Replaces an existing `lang_dir` line, otherwise appends one; creates the
/// file if the game has none.
pub fn update_weidu_conf(game_dir: &Utf8Path, lang: &str) -> Result<()> {
    let path = game_dir.join(WEIDU_CONF_FILE);
    let directive = format!("lang_dir = {}", lang);
    tracing::info!("Setting '{}' in {}", directive, path);

    let mut lines: Vec<String> = if path.is_file() {
        fsutil::read_text(&path)?.lines().map(str::to_string).collect()
    } else {
        Vec::new()
    };
    match lines.iter_mut().find(|line| line.starts_with("lang_dir =")) {
        Some(line) => *line = directive,
        None => lines.push(directive),
    }

    let mut contents = lines.join("\n");
    contents.push('\n');
    fs::write(&path, contents).with_context(|| format!("Failed to write {}", path))
}

/// Capability: run an installer command to completion.
pub trait InstallerRunner {
    /// Run `argv` in `cwd`, appending its combined output to `log_file`.
    /// Returns the process exit code.
    fn run(&self, argv: &[String], cwd: &Utf8Path, log_file: &Utf8Path) -> Result<i32>;
}

/// Runs the installer as a child process, teeing its output to the console.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

impl InstallerRunner for ProcessRunner {
    fn run(&self, argv: &[String], cwd: &Utf8Path, log_file: &Utf8Path) -> Result<i32> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| anyhow!("Installer command line is empty"))?;
        tracing::info!("Running installer: {}", argv.join(" "));

        let (mut reader, writer) = io::pipe().context("Failed to create output pipe")?;
        let writer_err = writer
            .try_clone()
            .context("Failed to duplicate output pipe")?;

        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::inherit())
            .stdout(writer)
            .stderr(writer_err);
        let mut child = command
            .spawn()
            .with_context(|| format!("Failed to start installer {}", program))?;
        // Our copies of the write end must close or the read below never ends.
        drop(command);

        let mut log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .with_context(|| format!("Failed to open installer log {}", log_file))?;
        let mut console = io::stdout().lock();
        let mut buf = [0u8; 8192];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err).context("Failed to read installer output"),
            };
            console.write_all(&buf[..n]).context("Failed to echo installer output")?;
            console.flush().ok();
            log.write_all(&buf[..n])
                .with_context(|| format!("Failed to write installer log {}", log_file))?;
        }

        let status = child.wait().context("Failed to wait for installer")?;
        let code = status.code().unwrap_or(-1);
        tracing::info!("Installer exited with code {}", code);
        Ok(code)
    }
}
