//! Orchestration: prepare a build plan, run the engine, write the temporary
//! artifact, load it through the host loader, and always clean up.

use crate::engine::{BuildArtifact, BuildConfig, BundlerEngine, HookSet};
use crate::error::{BuildFailure, Error};
use crate::loader::{ModuleLoader, NodeLoader};
use crate::paths;
use crate::policy::{ExternalPolicy, Pattern};
use crate::request::{default_output_path, infer_format, BundleRequest, ModuleFormat, OutputPathFn};
use crate::scope::FileScopeHook;
use crate::tsconfig::{alias_matchers, load_tsconfig};
use crate::watch::{RebuildCallback, RebuildEvent};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of one successful bundle-and-load call.
#[derive(Debug, Clone)]
pub struct LoadedBundle {
    /// The module namespace the artifact evaluated to.
    pub module: serde_json::Value,
    /// Every source file that contributed to the bundle, absolute, sorted,
    /// deduplicated. Suitable as a watch list.
    pub dependencies: Vec<PathBuf>,
}

/// Ties a [`BundlerEngine`] and a [`ModuleLoader`] together into the
/// bundle-and-load pipeline.
pub struct BundleHost {
    engine: Arc<dyn BundlerEngine>,
    loader: Arc<dyn ModuleLoader>,
}

impl BundleHost {
    /// Host using the given engine and the stock [`NodeLoader`].
    #[must_use]
    pub fn new(engine: Arc<dyn BundlerEngine>) -> Self {
        Self {
            engine,
            loader: Arc::new(NodeLoader::new()),
        }
    }

    #[must_use]
    pub fn with_loader(mut self, loader: Arc<dyn ModuleLoader>) -> Self {
        self.loader = loader;
        self
    }

    /// Bundle the request's entry once and load the artifact.
    ///
    /// The temporary artifact is removed on every path, including load
    /// failure, unless the request preserves it.
    pub async fn load(&self, request: BundleRequest) -> Result<LoadedBundle, Error> {
        let plan = Plan::prepare(request)?;
        info!(entry = %plan.entry.display(), format = plan.format.as_str(), "bundling");
        let artifact = self
            .engine
            .build(plan.config.clone(), Arc::clone(&plan.hooks))
            .await?;
        extract_and_load(&self.loader, &plan, &artifact).await
    }

    /// Bundle the entry and keep rebuilding it as its sources change.
    ///
    /// The first build resolves this call; every later build (or failure) is
    /// delivered to `on_rebuild`. The background task runs until the engine
    /// closes the session or the process exits.
    pub async fn watch(
        &self,
        request: BundleRequest,
        mut on_rebuild: RebuildCallback,
    ) -> Result<LoadedBundle, Error> {
        let plan = Plan::prepare(request)?;
        info!(entry = %plan.entry.display(), "watching");
        let mut session = self
            .engine
            .watch(plan.config.clone(), Arc::clone(&plan.hooks))?;

        let first = session.next_outcome().await.ok_or(Error::WatchClosed)?;
        let artifact = first?;
        let initial = extract_and_load(&self.loader, &plan, &artifact).await?;

        let loader = Arc::clone(&self.loader);
        tokio::spawn(async move {
            while let Some(outcome) = session.next_outcome().await {
                let event = match outcome {
                    Err(failure) => RebuildEvent::Failed(failure),
                    Ok(artifact) => match extract_and_load(&loader, &plan, &artifact).await {
                        Ok(bundle) => RebuildEvent::Loaded(bundle),
                        Err(Error::Build(failure)) => RebuildEvent::Failed(failure),
                        Err(other) => {
                            warn!(error = %other, "rebuild failed after bundling");
                            RebuildEvent::Failed(BuildFailure::message(other.to_string()))
                        }
                    },
                };
                on_rebuild(event);
            }
            debug!("watch session closed");
        });

        Ok(initial)
    }
}

/// Everything derived from one request before the engine runs: the build
/// config, the assembled hook set, and the extraction parameters.
struct Plan {
    config: BuildConfig,
    hooks: Arc<HookSet>,
    format: ModuleFormat,
    entry: PathBuf,
    cwd: PathBuf,
    preserve: bool,
    output_path: Option<OutputPathFn>,
}

impl Plan {
    fn prepare(request: BundleRequest) -> Result<Self, Error> {
        let cwd = request.cwd;
        let entry = absolutize(&request.entry, &cwd);
        if !paths::is_script_path(&entry) {
            return Err(Error::UnsupportedEntry { path: entry });
        }
        let format = request.format.unwrap_or_else(|| infer_format(&entry));

        // Path aliases widen the not-external allowance so aliased internal
        // modules stay inlined.
        let mut not_external = request.not_external;
        let filename = request.tsconfig.as_deref().unwrap_or("tsconfig.json");
        if let Some(config) = load_tsconfig(&cwd, filename)? {
            let aliases = alias_matchers(&config.data);
            if !aliases.is_empty() {
                debug!(
                    path = %config.path.display(),
                    count = aliases.len(),
                    "applying path aliases"
                );
                not_external.extend(aliases.into_iter().map(Pattern::Regex));
            }
        }

        let mut hooks = HookSet::new();
        hooks.add(Box::new(ExternalPolicy::new(
            request.external,
            not_external,
            request.external_node_modules,
        )));
        hooks.add(Box::new(FileScopeHook));
        for hook in request.hooks {
            hooks.add(hook);
        }

        let mut config = BuildConfig::new(entry.clone(), cwd.clone(), format);
        config.extra = request.engine_options;
        hooks.setup(&mut config)?;

        Ok(Self {
            config,
            hooks: Arc::new(hooks),
            format,
            entry,
            cwd,
            preserve: request.preserve_artifact,
            output_path: request.output_path,
        })
    }
}

/// Write the artifact to its unique temporary path, load it, remove it, and
/// assemble the dependency list.
async fn extract_and_load(
    loader: &Arc<dyn ModuleLoader>,
    plan: &Plan,
    artifact: &BuildArtifact,
) -> Result<LoadedBundle, Error> {
    let text = artifact.outputs.first().ok_or(Error::MissingArtifact)?;

    let outfile = match &plan.output_path {
        Some(f) => absolutize(&f(&plan.entry, plan.format), &plan.cwd),
        None => default_output_path(&plan.entry, plan.format),
    };
    let guard = TempArtifact::write(&outfile, text.as_bytes())?;
    debug!(artifact = %outfile.display(), bytes = text.len(), "artifact written");

    let target = match plan.format {
        ModuleFormat::Esm => paths::file_url(&outfile)
            .map(String::from)
            .ok_or_else(|| Error::ArtifactWrite {
                path: outfile.clone(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "output path is not absolute"),
            })?,
        ModuleFormat::Cjs => outfile.display().to_string(),
    };

    let loaded = loader.load(&target, plan.format).await;

    if plan.preserve {
        guard.keep();
    } else if let Err(remove_err) = guard.remove() {
        if loaded.is_ok() {
            return Err(Error::ArtifactRemove {
                path: outfile,
                source: remove_err,
            });
        }
        // The load error is the primary failure; the leaked artifact is
        // only worth a warning.
        warn!(
            artifact = %outfile.display(),
            error = %remove_err,
            "failed to remove artifact after load failure"
        );
    }

    let module = loaded.map_err(|source| Error::Load {
        path: outfile,
        source,
    })?;

    let mut dependencies: Vec<PathBuf> = artifact
        .inputs
        .iter()
        .map(|p| absolutize(p, &plan.cwd))
        .collect();
    dependencies.sort();
    dependencies.dedup();

    Ok(LoadedBundle {
        module,
        dependencies,
    })
}

fn absolutize(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        paths::normalize(path)
    } else {
        paths::normalize(&cwd.join(path))
    }
}

/// Owns the on-disk temporary artifact; the `Drop` impl is a backstop so the
/// file is removed even when extraction unwinds early.
struct TempArtifact {
    path: PathBuf,
    armed: bool,
}

impl TempArtifact {
    fn write(path: &Path, bytes: &[u8]) -> Result<Self, Error> {
        confit_util::fs::atomic_write(path, bytes).map_err(|source| Error::ArtifactWrite {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            armed: true,
        })
    }

    /// Leave the artifact on disk.
    fn keep(mut self) {
        self.armed = false;
    }

    /// Remove now and surface the error, instead of swallowing it in `Drop`.
    fn remove(mut self) -> io::Result<()> {
        self.armed = false;
        std::fs::remove_file(&self.path)
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!(artifact = %self.path.display(), error = %e, "failed to remove artifact");
            }
        }
    }
}
