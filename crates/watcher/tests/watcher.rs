//! End-to-end watcher tests against a real temp directory: raw notifications
//! from actual file writes, through debouncing, out the broadcast channels.

use std::fs;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout};

use notevault_config::WatcherConfig;
use notevault_watcher::{ChangeKind, FileChangeEvent, VaultLayout, VaultWatcher, WatchError};

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Short debounce so tests stay fast, with a self-write window that still
/// comfortably outlives it.
fn fast_config() -> WatcherConfig {
    WatcherConfig {
        debounce_ms: 150,
        self_write_window_ms: 1000,
    }
}

fn start_watcher() -> (TempDir, VaultWatcher) {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let layout = Arc::new(VaultLayout::new(dir.path()));
    let mut watcher = VaultWatcher::new(layout, &fast_config());
    watcher.start().unwrap();
    (dir, watcher)
}

async fn recv_event(rx: &mut broadcast::Receiver<FileChangeEvent>) -> FileChangeEvent {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a change event")
        .expect("change channel closed")
}

async fn assert_quiet(rx: &mut broadcast::Receiver<FileChangeEvent>, wait: Duration) {
    if let Ok(received) = timeout(wait, rx.recv()).await {
        panic!("expected no event, got {received:?}");
    }
}

#[tokio::test]
async fn external_write_emits_a_single_coalesced_event() {
    let (_dir, mut watcher) = start_watcher();
    let mut rx = watcher.subscribe_document_changes();

    // One save produces several raw notifications (create, data, close);
    // they must collapse into one event for the path.
    fs::write(
        watcher.layout().documents_dir().join("doc123.json"),
        br#"{"title":"hello"}"#,
    )
    .unwrap();

    let event = recv_event(&mut rx).await;
    assert_eq!(event.path, watcher.layout().documents_dir().join("doc123.json"));
    assert_eq!(event.doc_id, "doc123");
    assert!(!event.is_index);
    assert!(
        matches!(event.kind, ChangeKind::Create | ChangeKind::Write),
        "unexpected kind {:?}",
        event.kind
    );

    assert_quiet(&mut rx, Duration::from_millis(600)).await;
    watcher.stop().await;
}

#[tokio::test]
async fn burst_of_writes_flushes_one_event_per_path() {
    let (_dir, mut watcher) = start_watcher();
    let mut rx = watcher.subscribe_document_changes();

    for name in ["a.json", "b.json", "c.json"] {
        fs::write(watcher.layout().documents_dir().join(name), b"{}").unwrap();
    }

    let mut doc_ids = vec![
        recv_event(&mut rx).await.doc_id,
        recv_event(&mut rx).await.doc_id,
        recv_event(&mut rx).await.doc_id,
    ];
    doc_ids.sort();
    assert_eq!(doc_ids, ["a", "b", "c"]);

    assert_quiet(&mut rx, Duration::from_millis(400)).await;
    watcher.stop().await;
}

#[tokio::test]
async fn marked_writes_are_suppressed_until_the_window_expires() {
    let (_dir, mut watcher) = start_watcher();
    let mut rx = watcher.subscribe_document_changes();
    let path = watcher.layout().documents_dir().join("own.json");

    // The application's own save must not echo back. The shared tracker
    // handle sees the same record the convenience method wrote.
    watcher.mark_write(&path);
    assert!(watcher.write_tracker().is_recent_write(&path));
    fs::write(&path, b"{}").unwrap();
    assert_quiet(&mut rx, Duration::from_millis(700)).await;

    // Past the window, an external edit of the same path surfaces again.
    sleep(Duration::from_millis(500)).await;
    fs::write(&path, br#"{"edited":true}"#).unwrap();
    let event = recv_event(&mut rx).await;
    assert_eq!(event.doc_id, "own");
    assert_eq!(event.kind, ChangeKind::Write);

    watcher.stop().await;
}

#[tokio::test]
async fn index_file_changes_route_to_the_index_channel() {
    let (_dir, mut watcher) = start_watcher();
    let mut document_rx = watcher.subscribe_document_changes();
    let mut index_rx = watcher.subscribe_index_changes();

    fs::write(watcher.layout().index_file(), b"{}").unwrap();

    let event = recv_event(&mut index_rx).await;
    assert!(event.is_index);
    assert_eq!(event.doc_id, "");
    assert_eq!(event.path, watcher.layout().index_file());

    assert_quiet(&mut document_rx, Duration::from_millis(300)).await;
    watcher.stop().await;
}

#[tokio::test]
async fn callback_receives_the_broadcast_payload() {
    let (_dir, mut watcher) = start_watcher();
    let mut rx = watcher.subscribe_document_changes();

    let seen: Arc<Mutex<Vec<FileChangeEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    watcher.on_document_changed(Arc::new(move |event| {
        sink.lock().unwrap().push(event.clone());
    }));

    fs::write(watcher.layout().documents_dir().join("cb.json"), b"{}").unwrap();

    let broadcast_event = recv_event(&mut rx).await;
    assert_eq!(*seen.lock().unwrap(), vec![broadcast_event]);
    watcher.stop().await;
}

#[tokio::test]
async fn stop_discards_events_still_inside_the_debounce_window() {
    let (_dir, mut watcher) = start_watcher();
    let mut rx = watcher.subscribe_document_changes();

    fs::write(watcher.layout().documents_dir().join("late.json"), b"{}").unwrap();
    sleep(Duration::from_millis(50)).await;
    watcher.stop().await;
    assert!(!watcher.is_running());

    assert_quiet(&mut rx, Duration::from_millis(600)).await;
}

#[tokio::test]
async fn start_is_rejected_while_running_but_restart_works() {
    let (_dir, mut watcher) = start_watcher();
    assert!(matches!(watcher.start(), Err(WatchError::AlreadyRunning)));
    assert!(watcher.is_running());

    watcher.stop().await;
    assert!(!watcher.is_running());

    watcher.start().unwrap();
    assert!(watcher.is_running());
    let mut rx = watcher.subscribe_document_changes();
    fs::write(watcher.layout().documents_dir().join("reborn.json"), b"{}").unwrap();
    assert_eq!(recv_event(&mut rx).await.doc_id, "reborn");
    watcher.stop().await;
}

#[tokio::test]
async fn removal_surfaces_as_a_remove_event() {
    let (_dir, mut watcher) = start_watcher();
    let mut rx = watcher.subscribe_document_changes();
    let path = watcher.layout().documents_dir().join("going.json");

    fs::write(&path, b"{}").unwrap();
    let created = recv_event(&mut rx).await;
    assert_eq!(created.doc_id, "going");

    fs::remove_file(&path).unwrap();
    let removed = recv_event(&mut rx).await;
    assert_eq!(removed.kind, ChangeKind::Remove);
    assert_eq!(removed.doc_id, "going");
    watcher.stop().await;
}

#[tokio::test]
async fn files_with_other_extensions_never_surface() {
    let (_dir, mut watcher) = start_watcher();
    let mut rx = watcher.subscribe_document_changes();

    fs::write(watcher.layout().documents_dir().join("notes.txt"), b"hi").unwrap();
    assert_quiet(&mut rx, Duration::from_millis(600)).await;
    watcher.stop().await;
}

#[tokio::test]
async fn start_creates_a_missing_documents_directory() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let layout = Arc::new(VaultLayout::new(dir.path()));
    assert!(!layout.documents_dir().exists());

    let mut watcher = VaultWatcher::new(Arc::clone(&layout), &fast_config());
    watcher.start().unwrap();
    assert!(layout.documents_dir().exists());
    watcher.stop().await;
}
