//! Integration tests for the sync orchestrator

use bindery_common::Action;
use bindery_editor::{EditSession, Schema, Surface, Template, Tree};
use bindery_sync::{
    AppConfig, Backend, BackendError, FileBackend, LoadOutcome, MemoryBackend, SyncError,
    SyncEvent, SyncOrchestrator,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn todo_schema() -> Schema {
    Schema::scope(vec![
        Schema::primitive("owner"),
        Schema::collection(Template::new(
            "todos",
            Schema::scope(vec![Schema::primitive("text")]),
        )),
    ])
}

fn build(
    schema: &Schema,
    config: AppConfig,
    storage: Option<Arc<dyn Backend>>,
    source: Option<Arc<dyn Backend>>,
) -> SyncOrchestrator {
    let tree = Tree::build(schema, Surface::default()).unwrap();
    SyncOrchestrator::new(config, EditSession::new(tree), storage, source)
}

async fn started(backend: Arc<MemoryBackend>) -> SyncOrchestrator {
    let mut sync = build(&todo_schema(), AppConfig::default(), Some(backend), None);
    sync.process_signals().await.unwrap();
    sync
}

fn data(sync: &SyncOrchestrator) -> Value {
    sync.session().get_data(&Default::default()).unwrap()
}

#[tokio::test]
async fn test_load_not_found_renders_empty_silently() {
    let backend = Arc::new(MemoryBackend::new("memory"));
    backend.fail_next_get(BackendError::http(404, "Not Found"));
    let mut sync = started(backend).await;

    assert_eq!(data(&sync), json!({ "owner": null, "todos": [] }));
    assert!(sync.notices().visible().is_empty());

    assert_eq!(sync.load().await.unwrap(), LoadOutcome::Empty);
    assert!(sync.notices().visible().is_empty());
}

#[tokio::test]
async fn test_load_corrupted_text_raises_one_error() {
    let backend = Arc::new(MemoryBackend::new("memory").with_text("{bad json"));
    let mut sync = build(&todo_schema(), AppConfig::default(), Some(backend), None);
    let mut events = sync.subscribe();

    sync.process_signals().await.unwrap();

    assert_eq!(sync.notices().messages(), vec!["The data is corrupted."]);
    assert_eq!(data(&sync), json!({ "owner": null, "todos": [] }));
    assert_eq!(events.try_recv().unwrap(), SyncEvent::Loaded);
    assert_eq!(sync.status(), None);
}

#[tokio::test]
async fn test_load_whitespace_text_is_corrupted() {
    let backend = Arc::new(MemoryBackend::new("memory").with_text("  \n"));
    let mut sync = started(backend).await;

    assert_eq!(sync.notices().messages(), vec!["The data is corrupted."]);
    assert_eq!(data(&sync), json!({ "owner": null, "todos": [] }));
}

#[tokio::test]
async fn test_load_parses_text_records() {
    let backend = Arc::new(
        MemoryBackend::new("memory").with_text(r#"{ "owner": "ada", "todos": [{ "text": "a" }] }"#),
    );
    let sync = started(backend).await;

    assert_eq!(
        data(&sync),
        json!({ "owner": "ada", "todos": [{ "text": "a" }] })
    );
}

#[tokio::test]
async fn test_load_failure_shows_notice_and_keeps_tree() {
    let backend = Arc::new(MemoryBackend::new("memory").with_data(json!({ "owner": "ada" })));
    let mut sync = started(backend.clone()).await;

    backend.fail_next_get(BackendError::http(503, "Unavailable"));
    let outcome = sync.load().await.unwrap();

    assert!(matches!(outcome, LoadOutcome::Failed(SyncError::Transport { .. })));
    assert_eq!(sync.notices().messages(), vec!["The data could not be loaded."]);
    assert_eq!(data(&sync)["owner"], json!("ada"));
}

#[tokio::test]
async fn test_load_falls_back_to_source() {
    let storage = Arc::new(MemoryBackend::new("storage"));
    storage.fail_next_get(BackendError::http(500, "Server Error"));
    let source = Arc::new(MemoryBackend::read_only("source").with_data(json!({ "owner": "seed" })));

    let mut sync = build(
        &todo_schema(),
        AppConfig::default(),
        Some(storage.clone()),
        Some(source.clone()),
    );
    sync.process_signals().await.unwrap();

    assert_eq!(storage.get_count(), 1);
    assert_eq!(source.get_count(), 1);
    assert_eq!(data(&sync)["owner"], json!("seed"));
    assert!(sync.notices().visible().is_empty());
}

#[tokio::test]
async fn test_rejected_write_keeps_unsaved_changes() {
    let backend = Arc::new(MemoryBackend::new("memory"));
    let mut sync = started(backend.clone()).await;

    sync.edit().unwrap();
    sync.set_value("owner", json!("grace")).unwrap();
    backend.fail_next_put(BackendError::http(500, "Server Error"));

    let error = sync.save().await.unwrap_err();

    let message = error.to_string();
    assert!(message.contains("500"));
    assert!(message.contains("Server Error"));
    assert!(sync.unsaved_changes());
    assert!(sync.session().is_editing());
    assert_eq!(sync.status(), None);
    assert_eq!(sync.last_saved(), None);
    assert_eq!(sync.notices().messages(), vec![message]);
}

#[tokio::test]
async fn test_save_commits_after_confirmation() {
    let backend = Arc::new(MemoryBackend::new("memory"));
    let mut sync = started(backend.clone()).await;
    let mut events = sync.subscribe();

    sync.edit().unwrap();
    let todos = sync.session().tree().resolve("todos").unwrap();
    sync.session_mut().add_item(todos).unwrap();
    sync.set_value("todos.0.text", json!("keep")).unwrap();
    let doomed = sync.session_mut().add_item(todos).unwrap();
    sync.session_mut().delete_item(todos, doomed).await.unwrap();

    let record = sync.save().await.unwrap().unwrap();

    let expected = json!({ "owner": null, "todos": [{ "text": "keep" }] });
    assert_eq!(record.data, expected);
    assert_eq!(backend.data(), Some(expected.clone()));
    assert!(record.data_string.starts_with("{\n\t"));
    assert!(!sync.unsaved_changes());
    assert!(sync.last_saved().is_some());
    assert_eq!(sync.session().tree().collection(todos).unwrap().len(), 1);

    assert!(matches!(events.try_recv().unwrap(), SyncEvent::DataChange { .. }));
    assert_eq!(
        events.try_recv().unwrap(),
        SyncEvent::Saved {
            data: expected,
            data_string: record.data_string.clone()
        }
    );
}

#[tokio::test]
async fn test_revert_never_touches_backend() {
    let backend = Arc::new(MemoryBackend::new("memory").with_data(json!({ "owner": "ada" })));
    let mut sync = started(backend.clone()).await;

    sync.edit().unwrap();
    sync.set_value("owner", json!("eve")).unwrap();
    sync.revert().unwrap();

    assert_eq!(data(&sync)["owner"], json!("ada"));
    assert_eq!(backend.put_count(), 0);
    assert_eq!(backend.get_count(), 1);
}

#[tokio::test]
async fn test_clear_stores_null_then_empties_tree() {
    let backend = Arc::new(
        MemoryBackend::new("memory").with_data(json!({ "owner": "ada", "todos": [{ "text": "x" }] })),
    );
    let mut sync = started(backend.clone()).await;

    assert!(!sync.clear(|_| false).await.unwrap());
    assert_eq!(backend.put_count(), 0);

    let mut prompt = String::new();
    let cleared = sync
        .clear(|message| {
            prompt = message.to_string();
            true
        })
        .await
        .unwrap();

    assert!(cleared);
    assert_eq!(prompt, "This will delete all your data. Are you sure?");
    assert_eq!(backend.data(), Some(Value::Null));
    assert_eq!(data(&sync), json!({ "owner": null, "todos": [] }));
}

#[tokio::test]
async fn test_clear_requires_delete_permission() {
    let backend = Arc::new(MemoryBackend::new("memory"));
    let mut sync = started(backend.clone()).await;
    backend.permissions().set(Action::Delete, false);

    assert!(!sync.clear(|_| true).await.unwrap());
    assert_eq!(backend.put_count(), 0);
}

#[tokio::test]
async fn test_login_and_logout_events() {
    let backend = Arc::new(MemoryBackend::new("cloud").with_user("ada"));
    let mut sync = started(backend.clone()).await;
    let mut events = sync.subscribe();
    assert!(sync.affordances().login);

    assert!(sync.login().await.unwrap());

    assert_eq!(
        events.try_recv().unwrap(),
        SyncEvent::Login {
            backend: "cloud".to_string(),
            name: "ada".to_string()
        }
    );
    assert_eq!(
        sync.status_line().as_deref(),
        Some("Logged in to cloud as ada")
    );
    assert!(!sync.affordances().login);
    assert!(sync.affordances().logout);

    sync.logout().await.unwrap();

    assert_eq!(
        events.try_recv().unwrap(),
        SyncEvent::Logout {
            backend: "cloud".to_string()
        }
    );
    assert_eq!(sync.status_line(), None);
    assert!(sync.affordances().login);
}

#[tokio::test]
async fn test_store_logs_in_before_put() {
    let backend = Arc::new(MemoryBackend::new("cloud").with_user("ada"));
    let mut sync = started(backend.clone()).await;

    assert!(sync.affordances().login);

    sync.store().await.unwrap();

    assert_eq!(backend.login_count(), 1);
    assert_eq!(backend.put_count(), 1);
    assert!(sync.status_line().is_some());
    assert!(!sync.affordances().login);
    assert!(sync.affordances().logout);
}

#[tokio::test(start_paused = true)]
async fn test_auto_save_without_edit_mode() {
    let schema = Schema::scope(vec![
        Schema::primitive("done").always_editable(),
        Schema::primitive("note").always_editable(),
    ]);
    let backend = Arc::new(MemoryBackend::new("memory"));
    let mut sync = build(&schema, AppConfig::default(), Some(backend.clone()), None);
    sync.process_signals().await.unwrap();

    assert!(!sync.needs_edit());
    assert!(!sync.affordances().save);

    sync.set_value("done", json!(true)).unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    sync.set_value("note", json!("first")).unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;
    sync.set_value("note", json!("second")).unwrap();

    tokio::time::sleep(Duration::from_millis(2900)).await;
    sync.process_signals().await.unwrap();
    assert_eq!(backend.put_count(), 0);

    tokio::time::sleep(Duration::from_millis(200)).await;
    sync.process_signals().await.unwrap();

    assert_eq!(backend.put_count(), 1);
    assert_eq!(
        backend.data(),
        Some(json!({ "done": true, "note": "second" }))
    );
}

#[tokio::test]
async fn test_file_backend_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("todos.json");

    let storage: Arc<dyn Backend> = Arc::new(FileBackend::new(&path));
    let mut sync = build(&todo_schema(), AppConfig::default(), Some(storage), None);
    sync.process_signals().await.unwrap();
    assert!(sync.notices().visible().is_empty());

    sync.edit().unwrap();
    sync.set_value("owner", json!("ada")).unwrap();
    sync.save().await.unwrap();

    let storage: Arc<dyn Backend> = Arc::new(FileBackend::new(&path));
    let reopened = {
        let mut sync = build(&todo_schema(), AppConfig::default(), Some(storage), None);
        sync.process_signals().await.unwrap();
        sync
    };
    assert_eq!(data(&reopened)["owner"], json!("ada"));
}
