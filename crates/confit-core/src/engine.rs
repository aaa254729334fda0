//! Boundary with the external bundler engine.
//!
//! The pipeline does not bundle anything itself. It hands a [`BuildConfig`]
//! and an ordered [`HookSet`] to a [`BundlerEngine`] and consumes the
//! in-memory [`BuildArtifact`] the engine returns. The engine is required to
//! call back into the hook set for every candidate import (`resolve`) and
//! every file it reads (`load`); that callback contract is what the
//! resolution policy and file-scope injection plug into.

use crate::error::{BuildFailure, Diagnostic, Error};
use crate::request::ModuleFormat;
use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Configuration handed to the engine for one build.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// The single entry point, absolute.
    pub entry: PathBuf,
    /// Working directory for the build.
    pub cwd: PathBuf,
    /// Output module format.
    pub format: ModuleFormat,
    /// Target platform.
    pub platform: Platform,
    /// Source map mode.
    pub sourcemap: SourceMapMode,
    /// Collect the dependency metafile ([`BuildArtifact::inputs`]).
    pub metafile: bool,
    /// Whether the engine writes outputs to disk. The pipeline always builds
    /// in memory and owns the final write itself.
    pub write: bool,
    /// Identifier replacements the engine applies project-wide, in order.
    pub define: Vec<(String, String)>,
    /// Pass-through engine options the pipeline does not interpret.
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl BuildConfig {
    /// Config for one in-memory build: platform node, inline source maps,
    /// metafile collection on.
    #[must_use]
    pub fn new(entry: PathBuf, cwd: PathBuf, format: ModuleFormat) -> Self {
        Self {
            entry,
            cwd,
            format,
            platform: Platform::Node,
            sourcemap: SourceMapMode::Inline,
            metafile: true,
            write: false,
            define: Vec::new(),
            extra: BTreeMap::new(),
        }
    }
}

/// Target platform for a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Platform {
    #[default]
    Node,
    Browser,
    Neutral,
}

/// How the engine emits source maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceMapMode {
    /// Appended to the generated text. The pipeline's only mode: the
    /// artifact must stay a single self-contained file.
    #[default]
    Inline,
    External,
    Off,
}

/// In-memory output of one engine invocation. Owned by the orchestration
/// step for the lifetime of one extraction, never retained after the
/// temporary artifact is written.
#[derive(Debug, Clone, Default)]
pub struct BuildArtifact {
    /// Generated output files. Exactly one is expected for a single entry
    /// point; an empty list is an invariant violation surfaced as
    /// [`Error::MissingArtifact`].
    pub outputs: Vec<String>,
    /// Every source file that contributed to the bundle, including the
    /// entry (the dependency metafile). Paths may be cwd-relative.
    pub inputs: Vec<PathBuf>,
    /// Non-fatal diagnostics.
    pub warnings: Vec<Diagnostic>,
}

/// Result of one build, successful or not.
pub type BuildOutcome = Result<BuildArtifact, BuildFailure>;

/// Future returned by [`BundlerEngine::build`].
pub type BuildFuture = BoxFuture<'static, BuildOutcome>;

/// The external bundler.
///
/// Implementations must consult `hooks.resolve` for every candidate import
/// and `hooks.load` for every file they read, before their own resolution
/// and loading.
pub trait BundlerEngine: Send + Sync {
    /// Run one build.
    fn build(&self, config: BuildConfig, hooks: Arc<HookSet>) -> BuildFuture;

    /// Open a long-lived watch session that rebuilds on source changes and
    /// delivers one [`BuildOutcome`] per completed build, starting with the
    /// initial one. Rebuilds are serialized by the session.
    ///
    /// Engines without a native watch context can be wrapped in
    /// [`crate::watch::FsWatchedEngine`].
    fn watch(&self, config: BuildConfig, hooks: Arc<HookSet>) -> Result<WatchSession, Error>;
}

/// A live watch session: a serialized stream of build outcomes plus an
/// optional guard keeping the engine's watcher alive.
///
/// There is no stop operation; the session ends when the engine closes the
/// channel or the session (and its guard) is dropped.
pub struct WatchSession {
    events: mpsc::UnboundedReceiver<BuildOutcome>,
    _guard: Option<Box<dyn std::any::Any + Send>>,
}

impl WatchSession {
    #[must_use]
    pub fn new(events: mpsc::UnboundedReceiver<BuildOutcome>) -> Self {
        Self {
            events,
            _guard: None,
        }
    }

    /// Session that keeps `guard` alive for its own lifetime (typically the
    /// engine's watcher handle or the sending half of the channel).
    #[must_use]
    pub fn with_guard(
        events: mpsc::UnboundedReceiver<BuildOutcome>,
        guard: Box<dyn std::any::Any + Send>,
    ) -> Self {
        Self {
            events,
            _guard: Some(guard),
        }
    }

    /// Next completed build, `None` once the session is closed.
    pub async fn next_outcome(&mut self) -> Option<BuildOutcome> {
        self.events.recv().await
    }
}

/// Result type for hook methods.
pub type HookResult<T> = Result<T, HookError>;

/// Error raised by a build hook.
#[derive(Debug)]
pub struct HookError {
    /// Hook name that failed.
    pub hook: String,
    /// Stage that failed (`setup`, `resolve`, `load`).
    pub stage: &'static str,
    pub message: String,
}

impl HookError {
    #[must_use]
    pub fn new(hook: impl Into<String>, stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            hook: hook.into(),
            stage,
            message: message.into(),
        }
    }
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.hook, self.stage, self.message)
    }
}

impl std::error::Error for HookError {}

/// Arguments to the resolve hook: one candidate import.
#[derive(Debug, Clone, Copy)]
pub struct ResolveArgs<'a> {
    /// The import specifier as written in the source.
    pub specifier: &'a str,
    /// The file containing the import, if any.
    pub importer: Option<&'a Path>,
    /// Directory to resolve relative specifiers against.
    pub resolve_dir: &'a Path,
}

/// Result of the resolve hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImport {
    /// Resolved specifier: a file path, a URL, or the original specifier
    /// left untouched for the host loader.
    pub path: String,
    /// Whether the import stays external (not bundled).
    pub external: bool,
}

impl ResolvedImport {
    /// An import the engine should bundle from `path`.
    #[must_use]
    pub fn resolved(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            external: false,
        }
    }

    /// An import left for the host loader.
    #[must_use]
    pub fn external(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            external: true,
        }
    }
}

/// Result of the load hook: rewritten file contents plus the syntax loader
/// the engine should parse them with.
#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub contents: String,
    pub loader: SourceLoader,
}

/// Syntax loader for a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLoader {
    Js,
    Jsx,
    Ts,
    Tsx,
}

/// An extension point the engine calls back into during a build.
///
/// All methods default to "not handled" so hooks only implement the stages
/// they care about.
pub trait BuildHook: Send + Sync {
    /// Hook name for error messages.
    fn name(&self) -> &str;

    /// Called once before the build; may mutate the config (e.g. the define
    /// table).
    fn setup(&self, _config: &mut BuildConfig) -> HookResult<()> {
        Ok(())
    }

    /// Decide one import. Return `Some` to handle it, `None` to let the next
    /// hook or the engine's own resolution take over.
    fn resolve(&self, _args: &ResolveArgs<'_>) -> HookResult<Option<ResolvedImport>> {
        Ok(None)
    }

    /// Provide (possibly rewritten) contents for a file. Return `None` to
    /// let the next hook or the engine's own reader take over.
    fn load(&self, _path: &Path) -> HookResult<Option<LoadedSource>> {
        Ok(None)
    }
}

/// Ordered hook dispatch: first hook returning `Some` wins.
#[derive(Default)]
pub struct HookSet {
    hooks: Vec<Box<dyn BuildHook>>,
}

impl HookSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook. Earlier hooks take precedence.
    pub fn add(&mut self, hook: Box<dyn BuildHook>) {
        self.hooks.push(hook);
    }

    /// Run every hook's setup stage against the config, in order.
    pub fn setup(&self, config: &mut BuildConfig) -> HookResult<()> {
        for hook in &self.hooks {
            hook.setup(config)?;
        }
        Ok(())
    }

    /// Resolve one import through the hooks.
    pub fn resolve(&self, args: &ResolveArgs<'_>) -> HookResult<Option<ResolvedImport>> {
        for hook in &self.hooks {
            if let Some(result) = hook.resolve(args)? {
                return Ok(Some(result));
            }
        }
        Ok(None)
    }

    /// Load one file through the hooks.
    pub fn load(&self, path: &Path) -> HookResult<Option<LoadedSource>> {
        for hook in &self.hooks {
            if let Some(result) = hook.load(path)? {
                return Ok(Some(result));
            }
        }
        Ok(None)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}
