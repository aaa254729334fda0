//! Filesystem-driven watch support.
//!
//! [`FsWatchedEngine`] adapts any [`BundlerEngine`] that only knows how to
//! build once into one that satisfies the watch contract: it runs a build,
//! watches every input file the build reported, and rebuilds when one
//! changes. Bursts of events (editor save patterns, `git checkout`) are
//! coalesced into a single rebuild.

use crate::engine::{BuildConfig, BuildOutcome, BundlerEngine, HookSet, WatchSession};
use crate::error::{BuildFailure, Error};
use crate::host::LoadedBundle;
use crate::paths;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const COALESCE_WINDOW: Duration = Duration::from_millis(50);

/// Outcome of one rebuild in watch mode, delivered to the callback.
pub enum RebuildEvent {
    /// The rebuild (or the subsequent load) failed. Watching continues.
    Failed(BuildFailure),
    /// The rebuilt artifact loaded successfully.
    Loaded(LoadedBundle),
}

/// Callback invoked once per completed rebuild.
pub type RebuildCallback = Box<dyn FnMut(RebuildEvent) + Send>;

/// Wraps a build-only engine with a filesystem watcher.
pub struct FsWatchedEngine<E> {
    inner: Arc<E>,
}

impl<E> FsWatchedEngine<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }
}

fn is_relevant(kind: &notify::EventKind) -> bool {
    matches!(
        kind,
        notify::EventKind::Create(_) | notify::EventKind::Modify(_) | notify::EventKind::Remove(_)
    )
}

impl<E: BundlerEngine + 'static> BundlerEngine for FsWatchedEngine<E> {
    fn build(&self, config: BuildConfig, hooks: Arc<HookSet>) -> crate::engine::BuildFuture {
        self.inner.build(config, hooks)
    }

    fn watch(&self, config: BuildConfig, hooks: Arc<HookSet>) -> Result<WatchSession, Error> {
        let (event_tx, event_rx) = mpsc::unbounded_channel::<BuildOutcome>();
        let (fs_tx, mut fs_rx) = mpsc::unbounded_channel::<Vec<PathBuf>>();

        let mut watcher =
            RecommendedWatcher::new(
                move |result: Result<notify::Event, notify::Error>| match result {
                    Ok(event) if is_relevant(&event.kind) => {
                        let _ = fs_tx.send(event.paths);
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "watch error"),
                },
                notify::Config::default(),
            )
            .map_err(|e| Error::Watch(e.to_string()))?;

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut watched_dirs: BTreeSet<PathBuf> = BTreeSet::new();
            loop {
                let outcome = inner.build(config.clone(), Arc::clone(&hooks)).await;

                // The input set can change between builds (new imports, a
                // build error hiding part of the graph), so the watch list
                // is refreshed after every build. On failure only the entry
                // is certain to matter.
                let inputs: BTreeSet<PathBuf> = match &outcome {
                    Ok(artifact) => artifact
                        .inputs
                        .iter()
                        .map(|p| {
                            if p.is_absolute() {
                                paths::normalize(p)
                            } else {
                                paths::normalize(&config.cwd.join(p))
                            }
                        })
                        .collect(),
                    Err(_) => std::iter::once(config.entry.clone()).collect(),
                };
                for dir in inputs.iter().filter_map(|p| p.parent()) {
                    if watched_dirs.insert(dir.to_path_buf()) {
                        if let Err(e) = watcher.watch(dir, RecursiveMode::NonRecursive) {
                            warn!(dir = %dir.display(), error = %e, "failed to watch directory");
                        }
                    }
                }

                if event_tx.send(outcome).is_err() {
                    debug!("watch session dropped");
                    return;
                }

                // Wait for a change to a known input, then absorb the rest
                // of the burst before rebuilding.
                loop {
                    let Some(changed) = fs_rx.recv().await else {
                        return;
                    };
                    if changed
                        .iter()
                        .any(|p| inputs.contains(&paths::normalize(p)))
                    {
                        break;
                    }
                }
                tokio::time::sleep(COALESCE_WINDOW).await;
                while fs_rx.try_recv().is_ok() {}
                info!(entry = %config.entry.display(), "change detected, rebuilding");
            }
        });

        Ok(WatchSession::new(event_rx))
    }
}
