// UI module - console interaction
//
// This module contains:
// - Prompter: the capability the build engine asks at every blocking gate
// - ConsolePrompter / ScriptedPrompter: terminal and headless implementations

pub mod prompt;

pub use prompt::{ConsolePrompter, Decision, Gate, GateKind, OVERWRITE_CONFIRMATION, Prompter, ScriptedPrompter};
