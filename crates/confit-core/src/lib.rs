#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

//! Bundle a config file (and the local files it imports) into a single
//! artifact with an external bundler engine, load the artifact through the
//! host runtime, and hand back the evaluated module plus the list of source
//! files that went into it.
//!
//! The pipeline itself contains no bundler and no JavaScript runtime: both
//! are trait boundaries ([`BundlerEngine`], [`ModuleLoader`]) supplied by the
//! caller. What lives here is the policy between them: which imports get
//! inlined versus left external, how file-scope pseudo-globals survive
//! relocation, where the temporary artifact goes and the guarantee that it
//! is cleaned up, and the watch loop that keeps rebuilding as sources
//! change.

pub mod engine;
pub mod error;
pub mod host;
pub mod loader;
pub mod paths;
pub mod policy;
pub mod request;
pub mod scope;
pub mod tsconfig;
pub mod watch;

pub use engine::{
    BuildArtifact, BuildConfig, BuildHook, BuildOutcome, BundlerEngine, HookError, HookResult,
    HookSet, LoadedSource, ResolveArgs, ResolvedImport, SourceLoader, WatchSession,
};
pub use error::{BuildFailure, Diagnostic, Error};
pub use host::{BundleHost, LoadedBundle};
pub use loader::{LoaderError, ModuleLoader, NodeLoader};
pub use policy::{ExternalPolicy, Pattern, ResolutionDecision};
pub use request::{infer_format, BundleRequest, ModuleFormat, OutputPathFn, PRESERVE_ENV_VAR};
pub use scope::FileScopeHook;
pub use tsconfig::{alias_matchers, load_tsconfig, TsConfig};
pub use watch::{FsWatchedEngine, RebuildCallback, RebuildEvent};
