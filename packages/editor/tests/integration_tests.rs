//! Integration tests for editor crate

use bindery_editor::{
    ControlOutcome, DataOptions, EditSession, Schema, SessionState, Surface, Template, Tree,
};
use serde_json::{json, Value};
use std::time::Duration;

fn task_schema(template: Template) -> Schema {
    Schema::scope(vec![
        Schema::primitive_with_default("list", json!("Tasks")),
        Schema::collection(template),
    ])
}

fn tasks() -> Template {
    Template::new(
        "tasks",
        Schema::scope(vec![
            Schema::primitive("title"),
            Schema::primitive_with_default("done", json!(false)),
        ]),
    )
}

fn session_with(template: Template) -> EditSession {
    let tree = Tree::build(&task_schema(template), Surface::default()).unwrap();
    EditSession::new(tree)
}

fn data(session: &EditSession) -> Value {
    session.get_data(&DataOptions::default()).unwrap()
}

#[test]
fn test_successive_adds_serialize_in_call_order() {
    let mut session = session_with(tasks());
    session.edit().unwrap();
    let collection = session.tree().resolve("tasks").unwrap();

    session.add_item(collection).unwrap();
    session.set_value("tasks.0.title", json!("first")).unwrap();
    session.add_item(collection).unwrap();
    session.set_value("tasks.1.title", json!("second")).unwrap();

    assert_eq!(
        data(&session)["tasks"],
        json!([
            { "title": "first", "done": false },
            { "title": "second", "done": false }
        ])
    );
}

#[test]
fn test_required_collection_gets_one_item_on_edit() {
    let mut session = session_with(tasks().required());
    let collection = session.tree().resolve("tasks").unwrap();
    assert!(session.tree().collection(collection).unwrap().is_empty());

    session.edit().unwrap();

    let items = session.tree().collection(collection).unwrap().items().to_vec();
    assert_eq!(items.len(), 1);
    assert!(session.tree().node(items[0].node).unwrap().editing);
}

#[test]
fn test_cancel_keeps_saved_item_with_reverted_fields() {
    let mut session = session_with(tasks());
    session
        .render(Some(&json!({ "tasks": [{ "title": "write docs", "done": false }] })))
        .unwrap();
    let collection = session.tree().resolve("tasks").unwrap();

    session.edit().unwrap();
    session.set_value("tasks.0.done", json!(true)).unwrap();
    session.add_item(collection).unwrap();
    session.set_value("tasks.1.title", json!("draft")).unwrap();
    assert!(session.unsaved_changes());

    session.revert().unwrap();

    assert_eq!(
        data(&session)["tasks"],
        json!([{ "title": "write docs", "done": false }])
    );
    assert_eq!(session.tree().collection(collection).unwrap().len(), 1);
    assert!(!session.unsaved_changes());
}

#[tokio::test]
async fn test_deleted_item_cannot_be_resurrected_after_commit() {
    let mut session = session_with(tasks());
    session.edit().unwrap();
    let collection = session.tree().resolve("tasks").unwrap();

    let item = session.add_item(collection).unwrap();
    assert!(session.delete_item(collection, item).await.unwrap());

    session.commit().unwrap();
    session.revert().unwrap();

    assert!(session.tree().collection(collection).unwrap().is_empty());
    assert_eq!(data(&session)["tasks"], json!([]));
}

#[tokio::test]
async fn test_revert_after_delete_restores_item() {
    let mut session = session_with(tasks());
    session
        .render(Some(&json!({ "tasks": [{ "title": "keep", "done": true }] })))
        .unwrap();
    let collection = session.tree().resolve("tasks").unwrap();
    let item = session.tree().resolve("tasks.0").unwrap();

    session.edit().unwrap();
    session.delete_item(collection, item).await.unwrap();
    assert_eq!(data(&session)["tasks"], json!([]));

    session.revert().unwrap();

    let entry = &session.tree().collection(collection).unwrap().items()[0];
    assert!(!entry.deleted);
    assert_eq!(
        data(&session)["tasks"],
        json!([{ "title": "keep", "done": true }])
    );
}

#[test]
fn test_render_sequence_length_and_order() {
    let mut session = session_with(tasks());
    let records: Vec<Value> = (0..5)
        .map(|i| json!({ "title": format!("t{}", i), "done": false }))
        .collect();

    session
        .render(Some(&json!({ "tasks": records.clone() })))
        .unwrap();

    assert_eq!(data(&session)["tasks"], Value::Array(records));
}

#[test]
fn test_bottom_up_collection_prepends() {
    let mut session = session_with(tasks().bottom_up(true));
    session.edit().unwrap();
    let collection = session.tree().resolve("tasks").unwrap();

    session.add_item(collection).unwrap();
    session.set_value("tasks.0.title", json!("older")).unwrap();
    session.add_item(collection).unwrap();
    session.set_value("tasks.0.title", json!("newer")).unwrap();

    let titles: Vec<Value> = data(&session)["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["title"].clone())
        .collect();
    assert_eq!(titles, vec![json!("newer"), json!("older")]);
}

#[tokio::test(start_paused = true)]
async fn test_delete_control_waits_for_fade() {
    let tree = Tree::build(
        &task_schema(tasks()),
        Surface::new(Duration::from_millis(400)),
    )
    .unwrap();
    let mut session = EditSession::new(tree);
    session
        .render(Some(&json!({ "tasks": [{ "title": "fade me" }] })))
        .unwrap();
    session.edit().unwrap();

    let collection = session.tree().resolve("tasks").unwrap();
    let item = session.tree().collection(collection).unwrap().items()[0].clone();

    let start = tokio::time::Instant::now();
    let outcome = session
        .activate(item.controls.delete, |message| {
            message == "Are you sure you want to delete this task?"
        })
        .await
        .unwrap();

    assert_eq!(outcome, ControlOutcome::Deleted(item.node));
    assert!(start.elapsed() >= Duration::from_millis(400));
    assert!(session.tree().surface().get(item.anchor).unwrap().hidden);
}

#[tokio::test]
async fn test_add_sibling_control_inserts_after_item() {
    let mut session = session_with(tasks());
    session
        .render(Some(&json!({ "tasks": [{ "title": "a" }, { "title": "c" }] })))
        .unwrap();
    session.edit().unwrap();

    let collection = session.tree().resolve("tasks").unwrap();
    let first = session.tree().collection(collection).unwrap().items()[0].clone();

    let ControlOutcome::Added(_) = session.activate(first.controls.add, |_| true).await.unwrap()
    else {
        panic!("Expected an added item");
    };
    session.set_value("tasks.1.title", json!("b")).unwrap();

    let titles: Vec<Value> = data(&session)["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["title"].clone())
        .collect();
    assert_eq!(titles, vec![json!("a"), json!("b"), json!("c")]);
    assert_eq!(session.state(), SessionState::Editing);
}

#[test]
fn test_schema_loaded_from_json() {
    let schema: Schema = serde_json::from_value(json!({
        "kind": "scope",
        "children": [
            { "kind": "primitive", "property": "name" },
            {
                "kind": "collection",
                "property": "favoriteColors",
                "item": { "kind": "primitive" }
            }
        ]
    }))
    .unwrap();

    let mut session = EditSession::new(Tree::build(&schema, Surface::default()).unwrap());
    session
        .render(Some(&json!({ "name": "Ada", "favoriteColors": ["red", null, "blue"] })))
        .unwrap();

    let colors = session.tree().resolve("favoriteColors").unwrap();
    assert_eq!(
        session.tree().collection(colors).unwrap().name(),
        "favorite colors"
    );
    assert_eq!(data(&session)["favoriteColors"], json!(["red", "blue"]));
}
