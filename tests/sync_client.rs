use rusty_todo_web::models::{CategoryRecord, Todo};
use rusty_todo_web::server::{self, AppState};
use rusty_todo_web::storage::{JsonStorage, MemoryStorage, Store};
use rusty_todo_web::sync::{SyncClient, SyncError};
use std::sync::Arc;
use tempfile::TempDir;

const PASSWORD: &str = "remote-pw";

/// Starts a server on an ephemeral port in a background thread and returns
/// its base URL together with the remote store.
fn start_server() -> (String, Arc<MemoryStorage>) {
    let remote = Arc::new(MemoryStorage::new());
    let state = AppState::new(remote.clone(), PASSWORD);

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();

    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            server::run(listener, state).await.unwrap();
        });
    });

    (format!("http://{}", addr), remote)
}

fn seed(store: &dyn Store) {
    let mut urgent = Todo::new(2, "call the plumber").unwrap();
    urgent.urgent = true;
    store
        .put_category(
            "home",
            &CategoryRecord::new(vec![Todo::new(1, "water plants").unwrap(), urgent], 3),
        )
        .unwrap();
    store
        .put_category("work", &CategoryRecord::new(vec![Todo::new(5, "review").unwrap()], 6))
        .unwrap();
}

#[test]
fn sync_copies_every_local_category() {
    let (url, remote) = start_server();
    let dir = TempDir::new().unwrap();
    let local = JsonStorage::new(dir.path()).unwrap();
    seed(&local);

    let report = SyncClient::new(&url).sync_store(&local, PASSWORD).unwrap();

    assert_eq!(report.categories, vec!["home", "work"]);
    assert_eq!(report.message.as_deref(), Some("Synced 2 categories to memory"));
    assert_eq!(remote.snapshot().unwrap(), local.snapshot().unwrap());
}

#[test]
fn sync_replaces_remote_category_but_keeps_others() {
    let (url, remote) = start_server();
    remote
        .put_category("home", &CategoryRecord::new(vec![Todo::new(9, "stale").unwrap()], 10))
        .unwrap();
    remote
        .put_category("remote-only", &CategoryRecord::new(vec![Todo::new(1, "keep").unwrap()], 2))
        .unwrap();

    let local = MemoryStorage::new();
    seed(&local);
    SyncClient::new(&url).sync_store(&local, PASSWORD).unwrap();

    assert_eq!(remote.get_category("home").unwrap(), local.get_category("home").unwrap());
    assert_eq!(remote.get_category("remote-only").unwrap().todos[0].text, "keep");
}

#[test]
fn wrong_password_fails_login_and_uploads_nothing() {
    let (url, remote) = start_server();
    let local = MemoryStorage::new();
    seed(&local);

    let err = SyncClient::new(&url).sync_store(&local, "wrong").unwrap_err();

    match err {
        SyncError::LoginFailed { status, .. } => assert_eq!(status, 401),
        other => panic!("expected login failure, got {:?}", other),
    }
    assert!(remote.list_categories().unwrap().is_empty());
}

#[test]
fn upload_with_bad_token_is_rejected() {
    let (url, _remote) = start_server();
    let client = SyncClient::new(&url);
    let local = MemoryStorage::new();
    seed(&local);
    let upload = rusty_todo_web::transfer::SyncUpload {
        data: local.snapshot().unwrap(),
    };

    let err = client.upload("not-the-password", &upload).unwrap_err();
    assert!(matches!(err, SyncError::UploadFailed { status: 401, .. }));
}

#[test]
fn unreachable_server_is_a_transport_error() {
    let local = MemoryStorage::new();
    seed(&local);
    let err = SyncClient::new("http://127.0.0.1:9").sync_store(&local, PASSWORD).unwrap_err();
    assert!(matches!(err, SyncError::Transport(_)));
}
