//! File-scope constant injection.
//!
//! Bundling concatenates many files into one artifact whose path matches no
//! original source file, so `__dirname`, `__filename` and `import.meta.url`
//! would otherwise point at the relocated temporary artifact. The fix is
//! scope-local: every loaded file gets three constants bound to values
//! computed from its own absolute path, and the engine's define table
//! substitutes reserved identifiers for the pseudo-globals project-wide, so
//! each file reads its own constants.

use crate::engine::{BuildConfig, BuildHook, HookError, HookResult, LoadedSource, SourceLoader};
use crate::paths;
use std::path::Path;

const DIRNAME_VAR: &str = "__confit_injected_dirname";
const FILENAME_VAR: &str = "__confit_injected_filename";
const IMPORT_META_URL_VAR: &str = "__confit_injected_import_meta_url";

/// Hook injecting per-file constants for the location pseudo-globals.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileScopeHook;

impl FileScopeHook {
    /// Constant declarations for one file. Joined without newlines so the
    /// file's own source positions survive for the inline source map.
    fn header(path: &Path) -> HookResult<String> {
        let url = paths::file_url(path).ok_or_else(|| {
            HookError::new(
                "confit:inject-file-scope",
                "load",
                format!("not an absolute path: {}", path.display()),
            )
        })?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let quote = |s: &str| {
            serde_json::to_string(s).map_err(|e| {
                HookError::new("confit:inject-file-scope", "load", e.to_string())
            })
        };
        Ok(format!(
            "const {FILENAME_VAR} = {};const {DIRNAME_VAR} = {};const {IMPORT_META_URL_VAR} = {};",
            quote(&path.display().to_string())?,
            quote(&dir.display().to_string())?,
            quote(url.as_str())?,
        ))
    }
}

impl BuildHook for FileScopeHook {
    fn name(&self) -> &str {
        "confit:inject-file-scope"
    }

    fn setup(&self, config: &mut BuildConfig) -> HookResult<()> {
        config.define.push(("__dirname".into(), DIRNAME_VAR.into()));
        config
            .define
            .push(("__filename".into(), FILENAME_VAR.into()));
        config
            .define
            .push(("import.meta.url".into(), IMPORT_META_URL_VAR.into()));
        Ok(())
    }

    fn load(&self, path: &Path) -> HookResult<Option<LoadedSource>> {
        if !paths::is_script_path(path) {
            return Ok(None);
        }
        let contents = confit_util::fs::read_to_string_lossy(path)
            .map_err(|e| HookError::new(self.name(), "load", e.to_string()))?;
        Ok(Some(LoadedSource {
            contents: format!("{}{}", Self::header(path)?, contents),
            loader: infer_loader(path),
        }))
    }
}

/// Syntax loader for a file, chosen purely from its extension. The `.mjs` /
/// `.cjs` and `.mts` / `.cts` variants carry no syntax of their own.
#[must_use]
pub fn infer_loader(path: &Path) -> SourceLoader {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ts" | "mts" | "cts") => SourceLoader::Ts,
        Some("jsx") => SourceLoader::Jsx,
        Some("tsx") => SourceLoader::Tsx,
        _ => SourceLoader::Js,
    }
}
