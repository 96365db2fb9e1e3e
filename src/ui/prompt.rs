// Interactive decision points
//
// Every place a build blocks on the user is a `Gate`. The engine asks a
// `Prompter` and acts on the returned `Decision`, so builds can run against
// the console or, in tests, against a scripted list of answers.

use camino::Utf8Path;
use std::collections::VecDeque;
use std::fmt;
use std::io::{self, BufRead, Write};

/// Phrase that must be typed to overwrite a whole game directory.
pub const OVERWRITE_CONFIRMATION: &str = "I confirm";

/// A blocking question put to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate<'a> {
    /// Step flagged for manual installation: halt, skip or force.
    ManualInstall { mod_name: &'a str },
    /// Uninstall a mod installed differently from the plan.
    ConfirmUninstall { mod_name: &'a str, command: &'a str },
    /// Use the archive the fuzzy search picked for a mod.
    ConfirmArchive { mod_name: &'a str, archive: &'a Utf8Path },
    /// The installer finished with warnings.
    ContinueAfterWarnings { mod_name: &'a str },
    /// Apply, skip or terminate on a pre-install fix.
    PreFix { mod_name: &'a str, fix: &'a str },
    /// Periodic pause after `completed` steps.
    Pause { completed: usize },
    DeleteExisting { path: &'a Utf8Path },
    OverwriteDirectory { target: &'a Utf8Path, source: &'a Utf8Path },
}

/// Gate discriminant, for recording which questions were asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateKind {
    ManualInstall,
    ConfirmUninstall,
    ConfirmArchive,
    ContinueAfterWarnings,
    PreFix,
    Pause,
    DeleteExisting,
    OverwriteDirectory,
}

/// The user's answer to a [`Gate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Continue,
    Halt,
    Skip,
    Force,
    Yes,
    No,
}

impl Gate<'_> {
    pub fn kind(&self) -> GateKind {
        match self {
            Gate::ManualInstall { .. } => GateKind::ManualInstall,
            Gate::ConfirmUninstall { .. } => GateKind::ConfirmUninstall,
            Gate::ConfirmArchive { .. } => GateKind::ConfirmArchive,
            Gate::ContinueAfterWarnings { .. } => GateKind::ContinueAfterWarnings,
            Gate::PreFix { .. } => GateKind::PreFix,
            Gate::Pause { .. } => GateKind::Pause,
            Gate::DeleteExisting { .. } => GateKind::DeleteExisting,
            Gate::OverwriteDirectory { .. } => GateKind::OverwriteDirectory,
        }
    }

    /// Answer assumed when no input is available: never the destructive one.
    pub fn default_decision(&self) -> Decision {
        match self {
            Gate::ManualInstall { .. } | Gate::ContinueAfterWarnings { .. } | Gate::Pause { .. } => {
                Decision::Halt
            }
            Gate::PreFix { .. } => Decision::Skip,
            Gate::ConfirmUninstall { .. }
            | Gate::ConfirmArchive { .. }
            | Gate::DeleteExisting { .. }
            | Gate::OverwriteDirectory { .. } => Decision::No,
        }
    }

    /// Interpret a typed answer. `None` asks the question again.
    pub fn parse_answer(&self, input: &str) -> Option<Decision> {
        let answer = input.trim().to_lowercase();
        let yes = matches!(answer.as_str(), "y" | "yes");
        match self {
            Gate::ManualInstall { .. } => match answer.as_str() {
                "m" | "manual" => Some(Decision::Halt),
                "s" | "skip" => Some(Decision::Skip),
                "f" | "force" => Some(Decision::Force),
                _ => None,
            },
            Gate::ContinueAfterWarnings { .. } => {
                Some(if yes { Decision::Continue } else { Decision::Halt })
            }
            Gate::Pause { .. } => Some(if yes || answer.is_empty() {
                Decision::Continue
            } else {
                Decision::Halt
            }),
            Gate::PreFix { .. } => Some(match answer.as_str() {
                "y" | "yes" => Decision::Yes,
                "t" | "terminate" => Decision::Halt,
                _ => Decision::Skip,
            }),
            Gate::OverwriteDirectory { .. } => Some(
                if input.trim() == OVERWRITE_CONFIRMATION {
                    Decision::Yes
                } else {
                    Decision::No
                },
            ),
            Gate::ConfirmUninstall { .. } | Gate::ConfirmArchive { .. } | Gate::DeleteExisting { .. } => {
                Some(if yes { Decision::Yes } else { Decision::No })
            }
        }
    }
}

impl fmt::Display for Gate<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gate::ManualInstall { mod_name } => write!(
                f,
                "{} must be installed manually. Type 'm'/'manual' to halt the build and \
                 install it yourself, 's'/'skip' to skip it, or 'f'/'force' to force an \
                 automatic installation:",
                mod_name
            ),
            Gate::ConfirmUninstall { mod_name, command } => write!(
                f,
                "{} is installed with a different version or components. About to run:\n  {}\n\
                 Type 'y'/'yes' to uninstall it:",
                mod_name, command
            ),
            Gate::ConfirmArchive { mod_name, archive } => write!(
                f,
                "Archive {} was matched for {}. Type 'y'/'yes' to use it:",
                archive, mod_name
            ),
            Gate::ContinueAfterWarnings { mod_name } => write!(
                f,
                "{} was installed with warnings. Type 'y'/'yes' to continue the build, \
                 anything else to halt:",
                mod_name
            ),
            Gate::PreFix { mod_name, fix } => write!(
                f,
                "Should {} be applied to {}? Type 'y'/'yes' to apply, 't'/'terminate' to \
                 halt the build, anything else to skip:",
                fix, mod_name
            ),
            Gate::Pause { completed } => write!(
                f,
                "Paused after {} mods. Press Enter or type 'y'/'yes' to continue, anything \
                 else to halt:",
                completed
            ),
            Gate::DeleteExisting { path } => {
                write!(f, "{} already exists. Type 'y'/'yes' to delete it:", path)
            }
            Gate::OverwriteDirectory { target, source } => write!(
                f,
                "This deletes {} entirely and replaces it with a copy of {}. \
                 Type '{}' to proceed:",
                target, source, OVERWRITE_CONFIRMATION
            ),
        }
    }
}

/// Capability: answer gates.
pub trait Prompter {
    fn ask(&mut self, gate: &Gate<'_>) -> Decision;
}

/// Asks on a terminal (or any line-oriented reader/writer pair).
pub struct ConsolePrompter<R, W> {
    input: R,
    output: W,
}

impl ConsolePrompter<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsolePrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Prompter for ConsolePrompter<R, W> {
    fn ask(&mut self, gate: &Gate<'_>) -> Decision {
        loop {
            if writeln!(self.output, "{}", gate).and_then(|_| self.output.flush()).is_err() {
                return gate.default_decision();
            }
            let mut line = String::new();
            match self.input.read_line(&mut line) {
                Ok(0) | Err(_) => {
                    tracing::warn!("No answer available for {:?}; assuming the safe choice", gate.kind());
                    return gate.default_decision();
                }
                Ok(_) => {}
            }
            if let Some(decision) = gate.parse_answer(&line) {
                tracing::debug!("{:?} answered with {:?}", gate.kind(), decision);
                return decision;
            }
        }
    }
}

/// Answers gates from a fixed script, recording each gate asked.
///
/// Once the script runs out every gate gets its default decision.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<Decision>,
    asked: Vec<GateKind>,
}

impl ScriptedPrompter {
    pub fn new(answers: impl IntoIterator<Item = Decision>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            asked: Vec::new(),
        }
    }

    pub fn asked(&self) -> &[GateKind] {
        &self.asked
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, gate: &Gate<'_>) -> Decision {
        self.asked.push(gate.kind());
        self.answers
            .pop_front()
            .unwrap_or_else(|| gate.default_decision())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_manual_gate_reasks_until_valid() {
        let input = Cursor::new("x\n\nS\n");
        let mut output = Vec::new();
        let mut prompter = ConsolePrompter::new(input, &mut output);

        let decision = prompter.ask(&Gate::ManualInstall { mod_name: "lucy" });
        assert_eq!(decision, Decision::Skip);
        let printed = String::from_utf8(output).unwrap();
        assert_eq!(printed.matches("installed manually").count(), 3);
    }

    #[test]
    fn test_pause_accepts_empty_line() {
        let gate = Gate::Pause { completed: 5 };
        assert_eq!(gate.parse_answer("\n"), Some(Decision::Continue));
        assert_eq!(gate.parse_answer("YES"), Some(Decision::Continue));
        assert_eq!(gate.parse_answer("n"), Some(Decision::Halt));
    }

    #[test]
    fn test_overwrite_needs_phrase() {
        let target = Utf8Path::new("/games/bgee");
        let gate = Gate::OverwriteDirectory {
            target,
            source: Utf8Path::new("/clean/bgee"),
        };
        assert_eq!(gate.parse_answer("y"), Some(Decision::No));
        assert_eq!(gate.parse_answer("  I confirm\n"), Some(Decision::Yes));
        assert_eq!(gate.parse_answer("i confirm"), Some(Decision::No));
        assert_eq!(gate.parse_answer("I CONFIRM"), Some(Decision::No));
    }

    #[test]
    fn test_manual_gate_accepts_full_words() {
        let gate = Gate::ManualInstall { mod_name: "lucy" };
        assert_eq!(gate.parse_answer("manual"), Some(Decision::Halt));
        assert_eq!(gate.parse_answer("Skip\n"), Some(Decision::Skip));
        assert_eq!(gate.parse_answer("FORCE"), Some(Decision::Force));
        assert_eq!(gate.parse_answer("f"), Some(Decision::Force));
        assert_eq!(gate.parse_answer("forced"), None);
    }

    #[test]
    fn test_prefix_answers() {
        let gate = Gate::PreFix {
            mod_name: "anotherfinehell",
            fix: "mirror-backslashes",
        };
        assert_eq!(gate.parse_answer("y"), Some(Decision::Yes));
        assert_eq!(gate.parse_answer("terminate"), Some(Decision::Halt));
        assert_eq!(gate.parse_answer("whatever"), Some(Decision::Skip));
    }

    #[test]
    fn test_eof_gives_default() {
        let mut prompter = ConsolePrompter::new(Cursor::new(""), Vec::new());
        let gate = Gate::ContinueAfterWarnings { mod_name: "eet" };
        assert_eq!(prompter.ask(&gate), Decision::Halt);
    }

    #[test]
    fn test_scripted_prompter_records_and_defaults() {
        let mut prompter = ScriptedPrompter::new([Decision::Yes]);
        let path = Utf8Path::new("/x");
        assert_eq!(prompter.ask(&Gate::DeleteExisting { path }), Decision::Yes);
        assert_eq!(prompter.ask(&Gate::Pause { completed: 1 }), Decision::Halt);
        assert_eq!(
            prompter.asked(),
            &[GateKind::DeleteExisting, GateKind::Pause]
        );
        assert_eq!(prompter.remaining(), 0);
    }
}
