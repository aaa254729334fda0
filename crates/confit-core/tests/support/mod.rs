#![allow(dead_code)]

//! Test doubles for the two external collaborators: a minimal bundler engine
//! that honors the hook contract, a scripted engine for failure injection,
//! and a loader that records what it was asked to load.

use confit_core::engine::{
    BuildArtifact, BuildConfig, BuildFuture, BundlerEngine, HookSet, ResolveArgs, WatchSession,
};
use confit_core::error::{BuildFailure, Error};
use confit_core::loader::{LoadFuture, ModuleLoader};
use confit_core::paths;
use confit_core::request::ModuleFormat;
use futures::FutureExt;
use regex_lite::Regex;
use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// A toy bundler: walks the import graph from the entry, consulting the hook
/// set for every import and file read the way a real engine must, and
/// concatenates the inlined sources into one output. External imports are
/// recorded as `// external: <path>` marker lines in the output text.
pub struct FakeEngine {
    aliases: Vec<(String, PathBuf)>,
    pub build_calls: Arc<AtomicUsize>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            aliases: Vec::new(),
            build_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Map specifiers starting with `prefix` to files under `root`, the way
    /// a real engine applies tsconfig path aliases.
    pub fn with_alias(mut self, prefix: &str, root: impl Into<PathBuf>) -> Self {
        self.aliases.push((prefix.to_string(), root.into()));
        self
    }

    fn resolve_with_extensions(candidate: PathBuf) -> Option<PathBuf> {
        if candidate.is_file() {
            return Some(candidate);
        }
        for ext in ["ts", "js", "mjs", "cjs"] {
            let with_ext = PathBuf::from(format!("{}.{ext}", candidate.display()));
            if with_ext.is_file() {
                return Some(with_ext);
            }
        }
        None
    }

    fn resolve_inline(&self, specifier: &str, resolve_dir: &Path) -> Option<PathBuf> {
        for (prefix, root) in &self.aliases {
            if let Some(rest) = specifier.strip_prefix(prefix.as_str()) {
                let candidate = if rest.is_empty() {
                    root.clone()
                } else {
                    root.join(rest)
                };
                return Self::resolve_with_extensions(candidate);
            }
        }
        if specifier.starts_with('.') {
            return Self::resolve_with_extensions(paths::normalize(&resolve_dir.join(specifier)));
        }
        if Path::new(specifier).is_absolute() {
            return Self::resolve_with_extensions(PathBuf::from(specifier));
        }
        None
    }

    fn run(&self, config: &BuildConfig, hooks: &HookSet) -> Result<BuildArtifact, BuildFailure> {
        let import_re = Regex::new(r#"(?:from\s*|require\(|import\()\s*["']([^"']+)["']"#)
            .map_err(|e| BuildFailure::message(e.to_string()))?;

        let mut output = String::new();
        let mut inputs: Vec<PathBuf> = Vec::new();
        let mut visited: BTreeSet<PathBuf> = BTreeSet::new();
        let mut queue: VecDeque<PathBuf> = VecDeque::from([config.entry.clone()]);

        while let Some(file) = queue.pop_front() {
            if !visited.insert(file.clone()) {
                continue;
            }
            let loaded = hooks
                .load(&file)
                .map_err(|e| BuildFailure::message(e.to_string()))?;
            let mut contents = match loaded {
                Some(source) => source.contents,
                None => std::fs::read_to_string(&file)
                    .map_err(|e| BuildFailure::message(format!("{}: {e}", file.display())))?,
            };
            for (key, value) in &config.define {
                contents = contents.replace(key, value);
            }
            inputs.push(file.clone());

            let resolve_dir = file.parent().unwrap_or(Path::new("/")).to_path_buf();
            for capture in import_re.captures_iter(&contents) {
                let specifier = capture[1].to_string();
                let args = ResolveArgs {
                    specifier: &specifier,
                    importer: Some(&file),
                    resolve_dir: &resolve_dir,
                };
                let hook_result = hooks
                    .resolve(&args)
                    .map_err(|e| BuildFailure::message(e.to_string()))?;
                match hook_result {
                    Some(resolved) if resolved.external => {
                        output.push_str(&format!("// external: {}\n", resolved.path));
                    }
                    Some(resolved) => {
                        queue.push_back(PathBuf::from(resolved.path));
                    }
                    None => match self.resolve_inline(&specifier, &resolve_dir) {
                        Some(path) => queue.push_back(path),
                        None => {
                            return Err(BuildFailure::message(format!(
                                "cannot resolve {specifier} from {}",
                                resolve_dir.display()
                            )));
                        }
                    },
                }
            }
            output.push_str(&contents);
            output.push('\n');
        }

        Ok(BuildArtifact {
            outputs: vec![output],
            inputs,
            warnings: Vec::new(),
        })
    }
}

impl BundlerEngine for FakeEngine {
    fn build(&self, config: BuildConfig, hooks: Arc<HookSet>) -> BuildFuture {
        self.build_calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self.run(&config, &hooks);
        async move { outcome }.boxed()
    }

    fn watch(&self, _config: BuildConfig, _hooks: Arc<HookSet>) -> Result<WatchSession, Error> {
        Err(Error::Watch("FakeEngine has no native watch".into()))
    }
}

/// Engine replaying a fixed sequence of outcomes, for failure injection and
/// watch-stream scenarios.
pub struct ScriptedEngine {
    outcomes: Mutex<VecDeque<Result<BuildArtifact, BuildFailure>>>,
}

impl ScriptedEngine {
    pub fn new(outcomes: Vec<Result<BuildArtifact, BuildFailure>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
        }
    }
}

impl BundlerEngine for ScriptedEngine {
    fn build(&self, _config: BuildConfig, _hooks: Arc<HookSet>) -> BuildFuture {
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BuildFailure::message("no scripted outcome left")));
        async move { outcome }.boxed()
    }

    fn watch(&self, _config: BuildConfig, _hooks: Arc<HookSet>) -> Result<WatchSession, Error> {
        let (tx, rx) = mpsc::unbounded_channel();
        for outcome in self.outcomes.lock().unwrap().drain(..) {
            let _ = tx.send(outcome);
        }
        // Dropping the sender closes the session after the scripted outcomes.
        Ok(WatchSession::new(rx))
    }
}

/// What [`RecordingLoader`] saw for one load call.
#[derive(Debug, Clone)]
pub struct LoadRecord {
    pub target: String,
    pub format: ModuleFormat,
    pub path: PathBuf,
    /// Artifact contents read at load time; `None` if the file was missing.
    pub artifact_text: Option<String>,
}

/// Loader double: records every call (including the artifact text as it
/// existed on disk at load time) and returns a canned result.
pub struct RecordingLoader {
    pub records: Arc<Mutex<Vec<LoadRecord>>>,
    result: Result<serde_json::Value, String>,
}

impl RecordingLoader {
    pub fn returning(module: serde_json::Value) -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            result: Ok(module),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            result: Err(message.to_string()),
        }
    }

    fn target_path(target: &str) -> PathBuf {
        match url::Url::parse(target) {
            Ok(url) if url.scheme() == "file" => {
                url.to_file_path().unwrap_or_else(|()| PathBuf::from(target))
            }
            _ => PathBuf::from(target),
        }
    }
}

impl ModuleLoader for RecordingLoader {
    fn load(&self, target: &str, format: ModuleFormat) -> LoadFuture {
        let path = Self::target_path(target);
        self.records.lock().unwrap().push(LoadRecord {
            target: target.to_string(),
            format,
            path: path.clone(),
            artifact_text: std::fs::read_to_string(&path).ok(),
        });
        let result = self.result.clone();
        async move { result.map_err(Into::into) }.boxed()
    }
}
