//! Watch-mode tests: the scripted outcome stream and the filesystem-driven
//! engine adapter.

mod support;

use confit_core::engine::BuildArtifact;
use confit_core::error::{BuildFailure, Error};
use confit_core::host::BundleHost;
use confit_core::request::BundleRequest;
use confit_core::watch::{FsWatchedEngine, RebuildEvent};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use support::{FakeEngine, RecordingLoader, ScriptedEngine};
use tempfile::tempdir;
use tokio::sync::mpsc;
use tokio::time::timeout;

fn artifact(entry: &Path, text: &str) -> BuildArtifact {
    BuildArtifact {
        outputs: vec![text.to_string()],
        inputs: vec![entry.to_path_buf()],
        warnings: Vec::new(),
    }
}

/// Callback that forwards every rebuild event into a channel the test can
/// await on.
fn channel_callback() -> (
    Box<dyn FnMut(RebuildEvent) + Send>,
    mpsc::UnboundedReceiver<RebuildEvent>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        Box::new(move |event| {
            let _ = tx.send(event);
        }),
        rx,
    )
}

#[tokio::test]
async fn test_watch_resolves_initially_then_reports_rebuilds() {
    let dir = tempdir().unwrap();
    let entry = dir.path().join("conf.ts");
    std::fs::write(&entry, "export default 1;\n").unwrap();

    let engine = ScriptedEngine::new(vec![
        Ok(artifact(&entry, "module.exports = 1;\n")),
        Err(BuildFailure::message("syntax error after edit")),
        Ok(artifact(&entry, "module.exports = 2;\n")),
    ]);
    let loader = RecordingLoader::returning(json!({ "default": 1 }));
    let host = BundleHost::new(Arc::new(engine)).with_loader(Arc::new(loader));

    let (callback, mut events) = channel_callback();
    let request = BundleRequest::new(&entry).with_cwd(dir.path());
    let initial = host.watch(request, callback).await.unwrap();
    assert_eq!(initial.module, json!({ "default": 1 }));
    assert_eq!(initial.dependencies, vec![entry.clone()]);

    let first = timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    match first {
        RebuildEvent::Failed(failure) => {
            assert_eq!(failure.errors[0].text, "syntax error after edit");
        }
        RebuildEvent::Loaded(_) => panic!("expected the failed rebuild first"),
    }

    let second = timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    match second {
        RebuildEvent::Loaded(bundle) => assert_eq!(bundle.dependencies, vec![entry]),
        RebuildEvent::Failed(f) => panic!("expected a successful rebuild, got {f}"),
    }
}

#[tokio::test]
async fn test_watch_rejects_when_initial_build_fails() {
    let dir = tempdir().unwrap();
    let entry = dir.path().join("conf.ts");
    std::fs::write(&entry, "export default ???;\n").unwrap();

    let engine = ScriptedEngine::new(vec![Err(BuildFailure::message("unexpected token"))]);
    let host = BundleHost::new(Arc::new(engine))
        .with_loader(Arc::new(RecordingLoader::returning(json!(null))));

    let (callback, _events) = channel_callback();
    let request = BundleRequest::new(&entry).with_cwd(dir.path());
    let err = host.watch(request, callback).await.unwrap_err();
    assert!(matches!(err, Error::Build(_)));
}

#[tokio::test]
async fn test_watch_closed_before_first_build() {
    let dir = tempdir().unwrap();
    let entry = dir.path().join("conf.ts");
    std::fs::write(&entry, "export default 1;\n").unwrap();

    let engine = ScriptedEngine::new(Vec::new());
    let host = BundleHost::new(Arc::new(engine))
        .with_loader(Arc::new(RecordingLoader::returning(json!(null))));

    let (callback, _events) = channel_callback();
    let request = BundleRequest::new(&entry).with_cwd(dir.path());
    let err = host.watch(request, callback).await.unwrap_err();
    assert!(matches!(err, Error::WatchClosed));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_fs_watched_engine_rebuilds_on_change() {
    let dir = tempdir().unwrap();
    let entry = dir.path().join("conf.ts");
    std::fs::write(&entry, "export default { port: 3000 };\n").unwrap();

    let engine = FsWatchedEngine::new(FakeEngine::new());
    let loader = RecordingLoader::returning(json!(null));
    let records = Arc::clone(&loader.records);
    let host = BundleHost::new(Arc::new(engine)).with_loader(Arc::new(loader));

    let (callback, mut events) = channel_callback();
    let request = BundleRequest::new(&entry).with_cwd(dir.path());
    let initial = host.watch(request, callback).await.unwrap();
    assert_eq!(initial.dependencies, vec![entry.clone()]);

    // Give the platform watcher a moment to settle before editing.
    tokio::time::sleep(Duration::from_millis(200)).await;
    std::fs::write(&entry, "export default { port: 4000 };\n").unwrap();

    let event = timeout(Duration::from_secs(10), events.recv())
        .await
        .expect("no rebuild within the timeout")
        .expect("watch task exited");
    match event {
        RebuildEvent::Loaded(bundle) => {
            assert_eq!(bundle.dependencies, vec![entry.clone()]);
        }
        RebuildEvent::Failed(f) => panic!("rebuild failed: {f}"),
    }

    let records = records.lock().unwrap();
    assert_eq!(records.len(), 2);
    let rebuilt = records[1].artifact_text.as_deref().unwrap();
    assert!(rebuilt.contains("port: 4000"));
    // Both temporary artifacts were cleaned up.
    let leftovers: Vec<PathBuf> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p != &entry)
        .collect();
    assert!(leftovers.is_empty(), "leftover files: {leftovers:?}");
}
