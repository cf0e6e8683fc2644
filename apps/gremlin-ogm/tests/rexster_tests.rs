//! Integration tests for the Rexster client against a mock server.
//!
//! The mock is a real axum HTTP server on a background tokio runtime, so the
//! blocking client goes through actual sockets, headers and status codes.

#![allow(clippy::unwrap_used, clippy::panic)]

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::post;
use axum::Json;
use gremlin_ogm::bootstrap;
use gremlin_ogm::spec_sync;
use gremlin_ogm::{ConnectionConfig, RexsterClient};
use gremlin_ogm_core::{
    ElementId, FieldDescriptor, Model, ModelRegistry, OgmError, Params, QueryExecutor,
    SchemaBuilder, Session, WireValue,
};
use serde_json::{Value, json};
use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex};

// =============================================================================
// MOCK REXSTER
// =============================================================================

/// One request as the server saw it.
#[derive(Debug, Clone)]
struct Captured {
    graph: String,
    script: String,
    params: Value,
    authorization: Option<String>,
}

#[derive(Default)]
struct MockState {
    requests: Vec<Captured>,
    responses: VecDeque<(StatusCode, Value)>,
    indexed: BTreeSet<String>,
}

type Shared = Arc<Mutex<MockState>>;

async fn gremlin(
    State(state): State<Shared>,
    Path(graph): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let script = body["script"].as_str().unwrap_or_default().to_string();
    let params = body["params"].clone();
    let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
    state.requests.push(Captured {
        graph,
        script: script.clone(),
        params: params.clone(),
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from),
    });

    if script.ends_with("g.getIndexedKeys(Vertex.class)") {
        let keys: Vec<Value> = state.indexed.iter().cloned().map(Value::String).collect();
        return (StatusCode::OK, Json(json!({ "results": keys })));
    }
    if script.starts_with("g.createKeyIndex(") {
        if let Some(key) = params["keyname"].as_str() {
            state.indexed.insert(key.to_string());
        }
        return (StatusCode::OK, Json(json!({ "results": null })));
    }

    let (status, body) = state
        .responses
        .pop_front()
        .unwrap_or((StatusCode::OK, json!({ "results": [] })));
    (status, Json(body))
}

struct MockRexster {
    port: u16,
    state: Shared,
}

impl MockRexster {
    fn start() -> Self {
        let state: Shared = Arc::default();
        let server_state = Arc::clone(&state);
        let (tx, rx) = std::sync::mpsc::channel();

        std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
                tx.send(listener.local_addr().unwrap().port()).unwrap();
                let app = Router::new()
                    .route("/graphs/{graph}/tp/gremlin", post(gremlin))
                    .with_state(server_state);
                axum::serve(listener, app).await.unwrap();
            });
        });

        let port = rx.recv().unwrap();
        Self { port, state }
    }

    fn host(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    fn client(&self) -> RexsterClient {
        RexsterClient::new(&self.config()).unwrap()
    }

    fn config(&self) -> ConnectionConfig {
        ConnectionConfig {
            hosts: vec![self.host()],
            graph: "testgraph".to_string(),
            timeout_secs: 5,
            ..ConnectionConfig::default()
        }
    }

    fn respond(&self, status: StatusCode, body: Value) {
        self.lock().responses.push_back((status, body));
    }

    fn requests(&self) -> Vec<Captured> {
        self.lock().requests.clone()
    }

    fn last(&self) -> Captured {
        self.requests().pop().unwrap()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn params(pairs: &[(&str, Value)]) -> Params {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

// =============================================================================
// TRANSPORT
// =============================================================================

#[test]
fn transactional_scripts_roll_back_first() {
    let server = MockRexster::start();
    let client = server.client();

    client
        .execute("g.V.count()", &params(&[("a", json!(1))]))
        .unwrap();

    let request = server.last();
    assert_eq!(request.graph, "testgraph");
    assert_eq!(request.script, "g.stopTransaction(FAILURE)\ng.V.count()");
    assert_eq!(request.params, json!({ "a": 1 }));
    assert_eq!(request.authorization, None);
}

#[test]
fn non_transactional_scripts_are_sent_verbatim() {
    let server = MockRexster::start();
    let client = server.client();

    client
        .execute_script("g.V.count()", &Params::new(), false)
        .unwrap();
    assert_eq!(server.last().script, "g.V.count()");
}

#[test]
fn results_are_unwrapped() {
    let server = MockRexster::start();
    let client = server.client();

    server.respond(StatusCode::OK, json!({ "results": [1, 2, 3], "success": true }));
    server.respond(StatusCode::OK, json!({ "results": null }));
    server.respond(StatusCode::OK, json!({ "results": 42 }));

    assert_eq!(client.execute("x", &Params::new()).unwrap(), vec![json!(1), json!(2), json!(3)]);
    assert!(client.execute("x", &Params::new()).unwrap().is_empty());
    assert_eq!(client.execute("x", &Params::new()).unwrap(), vec![json!(42)]);
}

#[test]
fn server_errors_carry_the_error_message() {
    let server = MockRexster::start();
    let client = server.client();

    server.respond(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "error": "javax.script.ScriptException: No such property: foo" }),
    );
    let err = client.execute("foo", &Params::new()).unwrap_err();
    assert!(err.is_query_failure());
    assert!(matches!(err, OgmError::Query(m) if m.contains("No such property: foo")));

    server.respond(StatusCode::BAD_REQUEST, json!({ "message": "bad" }));
    let err = client.execute("foo", &Params::new()).unwrap_err();
    assert!(matches!(err, OgmError::Query(m) if m.contains("bad")));
}

#[test]
fn missing_results_field_is_a_deserialization_error() {
    let server = MockRexster::start();
    let client = server.client();

    server.respond(StatusCode::OK, json!({ "success": true }));
    assert!(matches!(
        client.execute("x", &Params::new()),
        Err(OgmError::Deserialization(_))
    ));
}

#[test]
fn basic_auth_is_sent_when_configured() {
    let server = MockRexster::start();
    let config = ConnectionConfig {
        username: Some("admin".into()),
        password: Some("secret".into()),
        ..server.config()
    };
    let client = RexsterClient::new(&config).unwrap();

    client.execute("1", &Params::new()).unwrap();
    assert_eq!(
        server.last().authorization.as_deref(),
        Some("Basic YWRtaW46c2VjcmV0")
    );
}

#[test]
fn hosts_are_used_in_turn() {
    let first = MockRexster::start();
    let second = MockRexster::start();
    let config = ConnectionConfig {
        hosts: vec![first.host(), second.host()],
        ..first.config()
    };
    let client = RexsterClient::new(&config).unwrap();

    client.execute("1", &Params::new()).unwrap();
    client.execute("2", &Params::new()).unwrap();
    assert_eq!(first.requests().len(), 1);
    assert_eq!(second.requests().len(), 1);
}

#[test]
fn unreachable_host_is_a_query_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = ConnectionConfig {
        hosts: vec![format!("127.0.0.1:{port}")],
        timeout_secs: 2,
        ..ConnectionConfig::default()
    };
    let client = RexsterClient::new(&config).unwrap();
    assert!(matches!(
        client.execute("1", &Params::new()),
        Err(OgmError::Query(m)) if m.contains("cannot reach Rexster")
    ));
}

// =============================================================================
// BOOTSTRAP
// =============================================================================

#[test]
fn bootstrap_creates_missing_indices_once() {
    let server = MockRexster::start();
    let client = server.client();
    server.lock().indexed.insert("vid".to_string());

    let mut registry = ModelRegistry::new();
    registry
        .register(SchemaBuilder::vertex("Person").field(FieldDescriptor::text("name")))
        .unwrap();

    let created = bootstrap::prepare_graph(&client, &registry, true).unwrap();
    assert_eq!(created, vec!["element_type", "name"]);

    let creates: Vec<Captured> = server
        .requests()
        .into_iter()
        .filter(|r| r.script.contains("createKeyIndex"))
        .collect();
    assert_eq!(creates.len(), 2);
    // index creation runs outside a transaction
    assert!(creates.iter().all(|r| r.script.starts_with("g.createKeyIndex(")));
    assert_eq!(creates[0].params, json!({ "keyname": "element_type" }));

    assert!(bootstrap::prepare_graph(&client, &registry, true).unwrap().is_empty());
}

#[test]
fn ensure_key_index_reports_existing_keys() {
    let server = MockRexster::start();
    let client = server.client();

    assert!(bootstrap::ensure_key_index(&client, "vid").unwrap());
    assert!(!bootstrap::ensure_key_index(&client, "vid").unwrap());
}

// =============================================================================
// TYPE SYNC
// =============================================================================

#[test]
fn sync_sends_one_committed_script() {
    let server = MockRexster::start();
    let client = server.client();
    let statements = spec_sync::parse_str(
        r#"[
            {"type": "property", "name": "updated_at", "data_type": "Integer", "functional": true},
            {"type": "edge", "label": "subscribed_to", "primary_key": "updated_at"}
        ]"#,
    )
    .unwrap();

    spec_sync::sync(&client, &statements).unwrap();

    let script = server.last().script;
    let lines: Vec<&str> = script.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "g.stopTransaction(FAILURE)");
    assert!(lines[1].starts_with("updated_at = g.makeType()"));
    assert!(lines[2].contains("primaryKey(updated_at)"));
    assert_eq!(lines[3], "g.stopTransaction(SUCCESS)");
}

#[test]
fn existing_types_passes_names_as_parameters() {
    let server = MockRexster::start();
    let client = server.client();
    let statements = spec_sync::parse_str(
        r#"[
            {"type": "property", "name": "at", "data_type": "Long"},
            {"type": "edge", "label": "likes"}
        ]"#,
    )
    .unwrap();

    server.respond(StatusCode::OK, json!({ "results": ["at"] }));
    let existing = spec_sync::existing_types(&client, &statements).unwrap();

    assert_eq!(existing, vec!["at"]);
    assert_eq!(server.last().params, json!({ "names": ["at", "likes"] }));
}

// =============================================================================
// SESSION OVER HTTP
// =============================================================================

#[test]
fn session_round_trip_through_rexster() {
    let server = MockRexster::start();
    let mut registry = ModelRegistry::new();
    registry
        .register(
            SchemaBuilder::vertex("Person")
                .field(FieldDescriptor::text("name").required(true))
                .field(FieldDescriptor::integer("age").db_field("years")),
        )
        .unwrap();
    let session = Session::new(server.client(), Arc::new(registry));

    server.respond(StatusCode::OK, json!({ "results": [{ "_id": 12, "_type": "vertex" }] }));
    let person = session
        .create_vertex("person", [("name", WireValue::from("Ada")), ("age", WireValue::Int(36))])
        .unwrap();
    assert_eq!(person.eid(), Some(&ElementId::Int(12)));

    let save = server.last();
    assert!(save.script.starts_with("g.stopTransaction(FAILURE)\nv = g.addVertex()"));
    assert_eq!(save.params["name_val"], json!("Ada"));
    assert_eq!(save.params["age_val"], json!(36));

    let vid = person.vid().unwrap();
    server.respond(
        StatusCode::OK,
        json!({ "results": [[{
            "_id": 12,
            "_type": "vertex",
            "element_type": "person",
            "vid": vid,
            "name": "Ada",
            "years": 36
        }]] }),
    );
    let fetched = session.get_vertex(&vid).unwrap();
    assert_eq!(fetched.get("age").unwrap(), Some(WireValue::Int(36)));
    assert_eq!(server.last().params["vids"], json!([vid]));

    server.respond(StatusCode::OK, json!({ "results": [[]] }));
    assert!(matches!(
        session.get_vertex(&vid),
        Err(OgmError::NotFound(missing)) if missing == vid
    ));
}
