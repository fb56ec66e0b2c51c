use super::*;
use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, AtomicI64, Ordering},
        Arc,
    },
};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde_json::{json, Value};
use shared::{domain::EntityId, protocol::ResponseEnvelope};
use tokio::{net::TcpListener, sync::Mutex};

fn set(field: &str, value: &str) -> EntityAction {
    EntityAction::Set {
        field: field.into(),
        value: value.into(),
    }
}

async fn fill_race(session: &mut EditorSession) {
    for (field, value) in [
        ("winnerName", "Lewis Hamilton"),
        ("winnerTime", "1:25:16"),
        ("grandPrix", "British Grand Prix"),
        ("numberOfLaps", "52"),
    ] {
        session
            .apply(EntityKind::Race, set(field, value))
            .await
            .expect("set");
    }
}

#[tokio::test]
async fn commit_reports_missing_fields_then_creates() {
    let mut session = EditorSession::offline();

    let rejected = session
        .apply(EntityKind::Race, EntityAction::Commit)
        .await
        .expect("commit");
    assert!(rejected.contains("not saved"));
    assert!(session.races().is_empty());

    fill_race(&mut session).await;
    let created = session
        .apply(EntityKind::Race, EntityAction::Commit)
        .await
        .expect("commit");
    assert_eq!(created, "created race 1");
    assert_eq!(session.races().entities()[0].number_of_laps, 52);
    assert_eq!(session.races().draft(), &Race::default());
}

#[tokio::test]
async fn kinds_are_edited_independently() {
    let mut session = EditorSession::offline();
    session
        .apply(EntityKind::Driver, set("name", "Max"))
        .await
        .expect("set");

    assert_eq!(session.drivers().draft().name, "Max");
    assert_eq!(session.teams().draft(), &Team::default());
}

#[tokio::test]
async fn unknown_field_is_an_error() {
    let mut session = EditorSession::offline();
    let err = session
        .apply(EntityKind::Team, set("engine", "V6"))
        .await
        .expect_err("unknown field");
    assert_eq!(err.to_string(), "team has no field 'engine'");
}

#[tokio::test]
async fn edit_update_and_delete_flow() {
    let mut session = EditorSession::offline();
    fill_race(&mut session).await;
    session
        .apply(EntityKind::Race, EntityAction::Commit)
        .await
        .expect("commit");

    session
        .apply(EntityKind::Race, EntityAction::Edit { id: EntityId(1) })
        .await
        .expect("edit");
    session
        .apply(EntityKind::Race, set("numberOfLaps", "53"))
        .await
        .expect("set");
    let updated = session
        .apply(EntityKind::Race, EntityAction::Commit)
        .await
        .expect("commit");
    assert_eq!(updated, "updated race 1");
    assert_eq!(session.races().len(), 1);
    assert_eq!(session.races().entities()[0].number_of_laps, 53);

    session
        .apply(EntityKind::Race, EntityAction::Delete { id: EntityId(1) })
        .await
        .expect("delete");
    assert!(session
        .apply(EntityKind::Race, EntityAction::Delete { id: EntityId(1) })
        .await
        .is_err());
    let listed = session
        .apply(EntityKind::Race, EntityAction::List)
        .await
        .expect("list");
    assert_eq!(listed, "no races yet");
}

#[tokio::test]
async fn show_lists_outstanding_labels() {
    let mut session = EditorSession::offline();
    session
        .apply(EntityKind::Team, set("manufacturer", "McLaren"))
        .await
        .expect("set");
    let shown = session
        .apply(EntityKind::Team, EntityAction::Show)
        .await
        .expect("show");
    assert!(shown.starts_with("team draft (creating):"));
    assert!(shown.ends_with("still required: Image, Driver 1, Driver 2"));
}

#[tokio::test]
async fn image_is_loaded_as_data_url() {
    let dir = std::env::temp_dir().join(format!("editor-image-{}", std::process::id()));
    tokio::fs::create_dir_all(&dir).await.expect("dir");
    let path = dir.join("car.png");
    tokio::fs::write(&path, b"abc").await.expect("write");

    let mut session = EditorSession::offline();
    session
        .apply(EntityKind::Team, EntityAction::Image { path: path.clone() })
        .await
        .expect("image");
    assert_eq!(session.teams().draft().image, "data:image/png;base64,YWJj");

    let err = session
        .apply(EntityKind::Race, EntityAction::Image { path })
        .await
        .expect_err("races have no image");
    assert_eq!(err.to_string(), "race has no image field");

    let missing = session
        .apply(
            EntityKind::Driver,
            EntityAction::Image {
                path: PathBuf::from("/definitely/not/here.png"),
            },
        )
        .await;
    assert!(missing.is_err());

    tokio::fs::remove_dir_all(&dir).await.expect("cleanup");
}

#[derive(Clone, Default)]
struct StubServer {
    collections: Arc<Mutex<HashMap<String, Vec<Value>>>>,
    next_id: Arc<AtomicI64>,
    failing: Arc<AtomicBool>,
}

impl StubServer {
    async fn seed(&self, collection: &str, record: Value) {
        self.collections
            .lock()
            .await
            .entry(collection.to_string())
            .or_default()
            .push(record);
    }

    async fn records(&self, collection: &str) -> Vec<Value> {
        self.collections
            .lock()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    fn locked(&self) -> Option<(StatusCode, Json<ResponseEnvelope>)> {
        self.failing.load(Ordering::SeqCst).then(|| {
            reply(ResponseEnvelope::failure(
                500,
                "database is locked",
                json!("write failed"),
            ))
        })
    }
}

fn reply(envelope: ResponseEnvelope) -> (StatusCode, Json<ResponseEnvelope>) {
    let status =
        StatusCode::from_u16(envelope.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(envelope))
}

async fn stub_list(
    State(stub): State<StubServer>,
    Path(collection): Path<String>,
) -> (StatusCode, Json<ResponseEnvelope>) {
    reply(ResponseEnvelope::ok(Value::Array(
        stub.records(&collection).await,
    )))
}

async fn stub_create(
    State(stub): State<StubServer>,
    Path(collection): Path<String>,
    Json(mut record): Json<Value>,
) -> (StatusCode, Json<ResponseEnvelope>) {
    if let Some(locked) = stub.locked() {
        return locked;
    }
    record["id"] = json!(100 + stub.next_id.fetch_add(1, Ordering::SeqCst));
    stub.seed(&collection, record.clone()).await;
    reply(ResponseEnvelope::created(record))
}

async fn stub_update(
    State(stub): State<StubServer>,
    Path((collection, id)): Path<(String, i64)>,
    Json(record): Json<Value>,
) -> (StatusCode, Json<ResponseEnvelope>) {
    if let Some(locked) = stub.locked() {
        return locked;
    }
    let mut collections = stub.collections.lock().await;
    let records = collections.entry(collection).or_default();
    match records.iter_mut().find(|stored| stored["id"] == json!(id)) {
        Some(slot) => {
            *slot = record.clone();
            reply(ResponseEnvelope::ok(record))
        }
        None => reply(ResponseEnvelope::failure(400, "not found", json!(""))),
    }
}

async fn stub_delete(
    State(stub): State<StubServer>,
    Path((collection, id)): Path<(String, i64)>,
) -> (StatusCode, Json<ResponseEnvelope>) {
    if let Some(locked) = stub.locked() {
        return locked;
    }
    let mut collections = stub.collections.lock().await;
    let records = collections.entry(collection).or_default();
    let before = records.len();
    records.retain(|stored| stored["id"] != json!(id));
    if records.len() == before {
        return reply(ResponseEnvelope::failure(400, "not found", json!("")));
    }
    reply(ResponseEnvelope::ok(json!({ "id": id })))
}

async fn spawn_stub_server() -> (String, StubServer) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let stub = StubServer::default();
    let app = Router::new()
        .route("/api/:collection", get(stub_list).post(stub_create))
        .route("/api/:collection/:id", put(stub_update).delete(stub_delete))
        .with_state(stub.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), stub)
}

async fn remote_session(url: &str) -> EditorSession {
    let client = RacingClient::new(url).expect("client");
    let mut session = EditorSession::with_remote(client);
    session.load_remote().await.expect("load");
    session
}

fn seeded_driver() -> Value {
    json!({
        "id": 7,
        "name": "Fernando",
        "age": 42,
        "nationality": "Spanish",
        "image": "data:image/png;base64,AA=="
    })
}

#[tokio::test]
async fn remote_session_loads_server_collections() {
    let (url, stub) = spawn_stub_server().await;
    stub.seed("drivers", seeded_driver()).await;

    let session = remote_session(&url).await;
    assert_eq!(session.drivers().len(), 1);
    assert_eq!(
        session.drivers().get(EntityId(7)).map(|d| d.name.as_str()),
        Some("Fernando")
    );
    assert!(session.races().is_empty());
    assert!(session.teams().is_empty());
}

#[tokio::test]
async fn remote_commit_adopts_server_id() {
    let (url, stub) = spawn_stub_server().await;
    let mut session = remote_session(&url).await;

    fill_race(&mut session).await;
    let created = session
        .apply(EntityKind::Race, EntityAction::Commit)
        .await
        .expect("commit");
    assert_eq!(created, "created race 100 on server");

    let ids: Vec<_> = session.races().entities().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![Some(EntityId(100))]);
    assert_eq!(session.races().draft(), &Race::default());
    assert_eq!(stub.records("races").await.len(), 1);
}

#[tokio::test]
async fn remote_edit_is_pushed_as_update() {
    let (url, stub) = spawn_stub_server().await;
    stub.seed("drivers", seeded_driver()).await;
    let mut session = remote_session(&url).await;

    session
        .apply(EntityKind::Driver, EntityAction::Edit { id: EntityId(7) })
        .await
        .expect("edit");
    session
        .apply(EntityKind::Driver, set("age", "43"))
        .await
        .expect("set");
    let updated = session
        .apply(EntityKind::Driver, EntityAction::Commit)
        .await
        .expect("commit");
    assert_eq!(updated, "updated driver 7 on server");
    assert_eq!(stub.records("drivers").await[0]["age"], json!(43));
    assert_eq!(session.drivers().get(EntityId(7)).map(|d| d.age), Some(43));
}

#[tokio::test]
async fn rejected_remote_commit_leaves_store_and_draft_intact() {
    let (url, stub) = spawn_stub_server().await;
    let mut session = remote_session(&url).await;
    fill_race(&mut session).await;

    stub.failing.store(true, Ordering::SeqCst);
    let err = session
        .apply(EntityKind::Race, EntityAction::Commit)
        .await
        .expect_err("server rejects");
    assert!(format!("{err:#}").contains("database is locked"));
    assert!(session.races().is_empty());
    assert_eq!(session.races().draft().grand_prix, "British Grand Prix");
    assert!(stub.records("races").await.is_empty());

    stub.failing.store(false, Ordering::SeqCst);
    let created = session
        .apply(EntityKind::Race, EntityAction::Commit)
        .await
        .expect("retry");
    assert_eq!(created, "created race 100 on server");
    assert_eq!(session.races().len(), 1);
}

#[tokio::test]
async fn rejected_remote_delete_keeps_local_entity() {
    let (url, stub) = spawn_stub_server().await;
    stub.seed("drivers", seeded_driver()).await;
    let mut session = remote_session(&url).await;

    stub.failing.store(true, Ordering::SeqCst);
    let err = session
        .apply(EntityKind::Driver, EntityAction::Delete { id: EntityId(7) })
        .await
        .expect_err("server rejects");
    assert!(format!("{err:#}").contains("server kept driver 7"));
    assert!(session.drivers().get(EntityId(7)).is_some());
    assert_eq!(stub.records("drivers").await.len(), 1);

    stub.failing.store(false, Ordering::SeqCst);
    session
        .apply(EntityKind::Driver, EntityAction::Delete { id: EntityId(7) })
        .await
        .expect("delete");
    assert!(session.drivers().is_empty());
    assert!(stub.records("drivers").await.is_empty());
}
