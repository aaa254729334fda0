//! The caller-facing request value and module-format inference.

use crate::engine::BuildHook;
use crate::policy::Pattern;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Environment toggle: when set, temporary artifacts are preserved by
/// default. Read once at request construction; everything downstream works
/// from the explicit [`BundleRequest::preserve_artifact`] field.
pub const PRESERVE_ENV_VAR: &str = "CONFIT_PRESERVE";

/// Module format of the bundled artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleFormat {
    Esm,
    Cjs,
}

impl ModuleFormat {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Esm => "esm",
            Self::Cjs => "cjs",
        }
    }

    /// Extension for the temporary artifact, chosen so the host loader picks
    /// the right module system from the filename alone.
    #[must_use]
    pub fn artifact_extension(self) -> &'static str {
        match self {
            Self::Esm => "mjs",
            Self::Cjs => "cjs",
        }
    }
}

/// Computes the output path for one build, given the entry and format.
pub type OutputPathFn = Arc<dyn Fn(&Path, ModuleFormat) -> PathBuf + Send + Sync>;

/// Everything one bundle-and-load call needs. Process-wide state (working
/// directory, the preserve toggle) is captured as explicit fields at
/// construction instead of being read ambiently during the call.
pub struct BundleRequest {
    /// Path of the entry file to bundle and load.
    pub entry: PathBuf,
    /// Working directory for the build.
    pub cwd: PathBuf,
    /// Specifiers left external as-is.
    pub external: Vec<Pattern>,
    /// Specifiers inlined even when the node-modules default would
    /// externalize them.
    pub not_external: Vec<Pattern>,
    /// Externalize imports resolved under a node_modules directory.
    pub external_node_modules: bool,
    /// Explicit format override; inferred from the entry when `None`.
    pub format: Option<ModuleFormat>,
    /// Configuration filename to search for path aliases.
    pub tsconfig: Option<String>,
    /// Keep the temporary artifact on disk after loading.
    pub preserve_artifact: bool,
    /// Custom output path; defaults to [`default_output_path`].
    pub output_path: Option<OutputPathFn>,
    /// User hooks, installed after the built-in policy and injection hooks.
    pub hooks: Vec<Box<dyn BuildHook>>,
    /// Pass-through engine options.
    pub engine_options: BTreeMap<String, serde_json::Value>,
}

impl BundleRequest {
    #[must_use]
    pub fn new(entry: impl Into<PathBuf>) -> Self {
        Self {
            entry: entry.into(),
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            external: Vec::new(),
            not_external: Vec::new(),
            external_node_modules: true,
            format: None,
            tsconfig: None,
            preserve_artifact: std::env::var_os(PRESERVE_ENV_VAR).is_some(),
            output_path: None,
            hooks: Vec::new(),
            engine_options: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    #[must_use]
    pub fn with_external(mut self, pattern: impl Into<Pattern>) -> Self {
        self.external.push(pattern.into());
        self
    }

    #[must_use]
    pub fn with_not_external(mut self, pattern: impl Into<Pattern>) -> Self {
        self.not_external.push(pattern.into());
        self
    }

    #[must_use]
    pub fn with_external_node_modules(mut self, on: bool) -> Self {
        self.external_node_modules = on;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: ModuleFormat) -> Self {
        self.format = Some(format);
        self
    }

    #[must_use]
    pub fn with_tsconfig(mut self, filename: impl Into<String>) -> Self {
        self.tsconfig = Some(filename.into());
        self
    }

    #[must_use]
    pub fn with_preserved_artifact(mut self, preserve: bool) -> Self {
        self.preserve_artifact = preserve;
        self
    }

    #[must_use]
    pub fn with_output_path(mut self, f: OutputPathFn) -> Self {
        self.output_path = Some(f);
        self
    }

    #[must_use]
    pub fn with_hook(mut self, hook: Box<dyn BuildHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    #[must_use]
    pub fn with_engine_option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.engine_options.insert(key.into(), value);
        self
    }
}

/// Minimal package manifest view for format inference.
#[derive(Debug, Deserialize, Default)]
struct PackageJson {
    #[serde(rename = "type")]
    pkg_type: Option<String>,
}

/// Infer the module format from the entry extension, falling back to the
/// nearest package manifest's module-type declaration: `.mjs`/`.mts` force
/// ES modules, `.cjs`/`.cts` force CommonJS, and everything else follows
/// `"type": "module"`, defaulting to CommonJS.
#[must_use]
pub fn infer_format(entry: &Path) -> ModuleFormat {
    match entry.extension().and_then(|e| e.to_str()) {
        Some("mjs" | "mts") => ModuleFormat::Esm,
        Some("cjs" | "cts") => ModuleFormat::Cjs,
        _ => {
            if nearest_package_type(entry).as_deref() == Some("module") {
                ModuleFormat::Esm
            } else {
                ModuleFormat::Cjs
            }
        }
    }
}

fn nearest_package_type(entry: &Path) -> Option<String> {
    let mut dir = entry.parent()?.to_path_buf();
    loop {
        let manifest = dir.join("package.json");
        if manifest.is_file() {
            let text = std::fs::read_to_string(&manifest).ok()?;
            let pkg: PackageJson = serde_json::from_str(&text).ok()?;
            return pkg.pkg_type;
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// Default output path: a sibling of the entry carrying a fresh random
/// token, so a loader that caches by path never sees a stale artifact.
#[must_use]
pub fn default_output_path(entry: &Path, format: ModuleFormat) -> PathBuf {
    let stem = entry
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("bundle");
    entry.with_file_name(format!(
        "{stem}.bundled_{}.{}",
        confit_util::id::random_token(),
        format.artifact_extension()
    ))
}
