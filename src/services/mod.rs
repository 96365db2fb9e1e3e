//! Services module - the business logic of mod builds.
//!
//! Nothing here talks to the terminal directly: blocking questions go
//! through the [`Prompter`](crate::ui::Prompter) capability, installer runs
//! through [`InstallerRunner`](weidu::InstallerRunner) and archive unpacking
//! through [`Unpacker`](archive::Unpacker), so every service can be driven
//! headlessly in tests.
//!
//! # Components
//!
//! - Name handling: [`matching`] (fuzzy scoring and on-disk location),
//!   [`aliases`] (alias registry), [`naming`] (version and affix peeling)
//! - Mod sources: [`archive`] (unpacking), [`classifier`] (archive shapes and
//!   extraction), [`mod_index`] (offline index of extracted mods),
//!   [`resolver`] (locating a mod and copying it into the game)
//! - Installation: [`weidu`] (installer command lines and runs),
//!   [`weidu_log`] (what is installed), [`fixes`] (per-mod hooks),
//!   [`engine`] (the build state machine)
//! - Tools: [`build_order`] (reordering builds), [`game_dir`] (resetting a
//!   game directory), [`fsutil`] (copying, deleting, decoding)

pub mod aliases;
pub mod archive;
pub mod build_order;
pub mod classifier;
pub mod engine;
pub mod fixes;
pub mod fsutil;
pub mod game_dir;
pub mod matching;
pub mod mod_index;
pub mod naming;
pub mod resolver;
pub mod weidu;
pub mod weidu_log;

pub use aliases::AliasRegistry;
pub use archive::{ArchiveUnpacker, Unpacker};
pub use classifier::{BulkExtractionReport, ExtractionResult, classify, extract_all, extract_archive};
pub use engine::{BuildEngine, BuildOutcome, HaltReason, resume_start_index};
pub use fixes::{CommandFix, FileFix, Fix, FixContext, FixRegistry};
pub use matching::{FuzzyLocator, SearchKind, find_best};
pub use mod_index::ModIndex;
pub use resolver::{ModResolver, ResolutionSource, ResolvedMod};
pub use weidu::{InstallationStatus, InstallerRunner, ProcessRunner};
pub use weidu_log::{InstalledMods, convert_weidu_log, installed_identically};
