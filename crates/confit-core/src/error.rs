use crate::engine::HookError;
use crate::loader::LoaderError;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Core error type for confit operations.
///
/// Nothing here is retried: every failure is surfaced to the caller (or, in
/// watch mode, to the registered rebuild callback).
#[derive(Error, Debug)]
pub enum Error {
    /// The entry path does not look like a loadable script. Checked eagerly,
    /// before any bundler work is performed.
    #[error("{path}: not a loadable script (expected .js/.mjs/.cjs/.ts/.mts/.cts/.jsx/.tsx)")]
    UnsupportedEntry { path: PathBuf },

    /// The bundler engine reported a structured failure.
    #[error(transparent)]
    Build(#[from] BuildFailure),

    /// The engine reported success but returned no output file. This is an
    /// invariant violation under correct engine configuration.
    #[error("bundler reported success but produced no output file")]
    MissingArtifact,

    /// The host loader threw. The temporary artifact was already removed.
    #[error("failed to load bundled artifact {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: LoaderError,
    },

    #[error("failed to write bundled artifact {path}: {source}")]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to remove bundled artifact {path}: {source}")]
    ArtifactRemove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error(transparent)]
    Hook(#[from] HookError),

    #[error("failed to set up watch session: {0}")]
    Watch(String),

    /// The watch session's event channel closed before the first build
    /// completed.
    #[error("watch session closed before the first build completed")]
    WatchClosed,
}

/// Structured failure from one bundler invocation.
///
/// Errors and warnings are kept separate so callers can report them
/// independently; the whole value is surfaced verbatim, never retried.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildFailure {
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl BuildFailure {
    /// Failure with a single error message and no warnings.
    #[must_use]
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            errors: vec![Diagnostic::new(text)],
            warnings: Vec::new(),
        }
    }
}

impl fmt::Display for BuildFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "build failed with {} error(s), {} warning(s)",
            self.errors.len(),
            self.warnings.len()
        )?;
        if let Some(first) = self.errors.first() {
            write!(f, ": {first}")?;
        }
        Ok(())
    }
}

impl std::error::Error for BuildFailure {}

/// One error or warning entry from the bundler engine.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub text: String,
    pub location: Option<DiagnosticLocation>,
}

impl Diagnostic {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            location: None,
        }
    }

    #[must_use]
    pub fn at(text: impl Into<String>, file: impl Into<PathBuf>, line: u32, column: u32) -> Self {
        Self {
            text: text.into(),
            location: Some(DiagnosticLocation {
                file: file.into(),
                line,
                column,
            }),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(
                f,
                "{} ({}:{}:{})",
                self.text,
                loc.file.display(),
                loc.line,
                loc.column
            ),
            None => write!(f, "{}", self.text),
        }
    }
}

/// Source position attached to a [`Diagnostic`].
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticLocation {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
}
