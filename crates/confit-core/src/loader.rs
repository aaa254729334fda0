//! Boundary with the host module loader.
//!
//! Loading the bundled artifact is the host runtime's job, not the
//! pipeline's: the artifact must run with the caller's installed packages and
//! platform modules available. [`NodeLoader`] is the stock implementation,
//! evaluating the artifact in a child `node` process and shipping the module
//! namespace back as JSON.

use crate::request::ModuleFormat;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::path::PathBuf;
use tokio::process::Command;

/// Opaque loader failure, carried verbatim into [`crate::Error::Load`].
pub type LoaderError = Box<dyn std::error::Error + Send + Sync>;

/// Future returned by [`ModuleLoader::load`].
pub type LoadFuture = BoxFuture<'static, Result<serde_json::Value, LoaderError>>;

/// Loads one on-disk artifact into the host runtime and returns the module
/// namespace it evaluates to.
///
/// `target` is a file URL for [`ModuleFormat::Esm`] and a plain path for
/// [`ModuleFormat::Cjs`].
pub trait ModuleLoader: Send + Sync {
    fn load(&self, target: &str, format: ModuleFormat) -> LoadFuture;
}

/// [`ModuleLoader`] backed by a `node` child process.
pub struct NodeLoader {
    program: PathBuf,
}

impl NodeLoader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("node"),
        }
    }

    /// Use a specific runtime binary instead of `node` from `PATH`.
    #[must_use]
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Evaluation snippet for one load. The namespace is written on its own
    /// line after a leading newline, so module-level output on stdout does
    /// not corrupt the result.
    fn eval_snippet(target: &str, format: ModuleFormat) -> String {
        let quoted = serde_json::to_string(target)
            .unwrap_or_else(|_| format!("{target:?}"));
        match format {
            ModuleFormat::Esm => format!(
                "import({quoted}).then((m) => {{ \
                 process.stdout.write('\\n' + JSON.stringify(m ?? null)); \
                 }}).catch((err) => {{ console.error(err); process.exit(1); }});"
            ),
            ModuleFormat::Cjs => format!(
                "const m = require({quoted}); \
                 process.stdout.write('\\n' + JSON.stringify(m ?? null));"
            ),
        }
    }
}

impl Default for NodeLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleLoader for NodeLoader {
    fn load(&self, target: &str, format: ModuleFormat) -> LoadFuture {
        let program = self.program.clone();
        let snippet = Self::eval_snippet(target, format);
        async move {
            let mut command = Command::new(&program);
            if format == ModuleFormat::Esm {
                command.arg("--input-type=module");
            }
            let output = command.arg("-e").arg(&snippet).output().await?;
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(format!(
                    "loader process exited with {}: {}",
                    output.status,
                    stderr.trim()
                )
                .into());
            }
            let stdout = String::from_utf8_lossy(&output.stdout);
            let last_line = stdout.lines().last().unwrap_or("null");
            Ok(serde_json::from_str(last_line)?)
        }
        .boxed()
    }
}
