use thiserror::Error;

/// Errors raised by jenga's library layer.
///
/// Application code wraps these in `anyhow::Error`; callers that need to
/// react to a specific failure (bulk extraction, the build engine) recover
/// the variant with `downcast_ref::<JengaError>()`.
#[derive(Error, Debug)]
pub enum JengaError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Could not find mod '{0}' in any configured source")]
    ModNotFound(String),

    #[error("Malformed mod archive {archive}: {reason}")]
    MalformedArchive { archive: String, reason: String },

    #[error("No state file found for build '{build_name}' in {search_dir}")]
    NoStateFileFound {
        build_name: String,
        search_dir: String,
    },

    #[error("Extracted mod directory {path} is ill-formed: {reason}")]
    IllformedExtractedModDir { path: String, reason: String },

    #[error("Unsupported archive format: {0}")]
    UnsupportedArchive(String),

    #[error("Fix '{fix}' failed for mod '{mod_name}': {reason}")]
    HookFailed {
        fix: String,
        mod_name: String,
        reason: String,
    },
}

impl JengaError {
    /// Shorthand for a [`JengaError::Configuration`] built from anything printable.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn malformed(archive: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedArchive {
            archive: archive.into(),
            reason: reason.into(),
        }
    }
}
