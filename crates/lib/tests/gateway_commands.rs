//! Integration test: gateway router with a fake interpretation service and the in-memory broker.
//! The fake answers according to the submitted text so one server covers every route.

use aloy::broker::{MemoryPublisher, ALARM_QUEUE, LAMP_QUEUE};
use aloy::config::Config;
use aloy::dispatch::Dispatcher;
use aloy::gateway::{self, GatewayState, REQUEST_ID_HEADER};
use aloy::interpreter::HttpInterpreter;
use axum::{routing::post, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

async fn fake_interpret(Json(body): Json<Value>) -> Json<Value> {
    let text = body.get("message").and_then(|v| v.as_str()).unwrap_or("");
    let answer = match text {
        "alarm" => json!({
            "type": "set_alarm",
            "data": {"time":"07:00","date":"2024-01-01","repeat":"none","days":"","label":"wake"},
            "message": "alarm set for 07:00",
        }),
        "broken alarm" => json!({ "type": "set_alarm", "data": "07:00", "message": "?" }),
        "lamp" => json!({
            "type": "lamp_control",
            "data": {"action":"set_color","room":"kitchen","color":"blue"},
            "message": "ok",
        }),
        "slow lamp" => {
            tokio::time::sleep(Duration::from_millis(500)).await;
            json!({
                "type": "lamp_control",
                "data": {"action":"turn_on","room":"hall"},
                "message": "ok",
            })
        }
        "music" => json!({ "type": "play_music", "data": {}, "message": "no idea" }),
        _ => json!({ "type": "conversa", "data": {}, "message": "hello" }),
    };
    Json(answer)
}

struct Harness {
    base: String,
    publisher: MemoryPublisher,
    client: reqwest::Client,
}

async fn start() -> Harness {
    let nlp = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind nlp");
    let nlp_url = format!("http://{}/interpret", nlp.local_addr().expect("nlp addr"));
    tokio::spawn(async move {
        let app = Router::new().route("/interpret", post(fake_interpret));
        let _ = axum::serve(nlp, app).await;
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind gateway");
    let addr = listener.local_addr().expect("gateway addr");
    let mut config = Config::default();
    config.gateway.bind = "127.0.0.1".to_string();
    config.gateway.port = addr.port();
    config.interpreter.url = nlp_url.clone();

    let publisher = MemoryPublisher::new();
    let dispatcher = Dispatcher::new(
        Arc::new(HttpInterpreter::new(nlp_url, Duration::from_secs(5), true)),
        Arc::new(publisher.clone()),
    );
    let state = GatewayState::new(config, dispatcher);
    tokio::spawn(async move {
        let _ = gateway::serve(listener, state, std::future::pending()).await;
    });

    Harness {
        base: format!("http://{}", addr),
        publisher,
        client: reqwest::Client::new(),
    }
}

impl Harness {
    async fn submit(&self, message: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/commands", self.base))
            .json(&json!({ "message": message }))
            .send()
            .await
            .expect("POST /commands")
    }
}

#[tokio::test]
async fn health_reports_running_and_broker() {
    let h = start().await;
    let resp = h.client.get(format!("{}/", h.base)).send().await.expect("GET /");
    assert!(resp.status().is_success());
    let json: Value = resp.json().await.expect("parse JSON");
    assert_eq!(json.get("runtime").and_then(|v| v.as_str()), Some("running"));
    assert_eq!(json.get("broker").and_then(|v| v.as_str()), Some("memory"));
    assert_eq!(json.get("brokerConnected").and_then(|v| v.as_bool()), Some(true));
}

#[tokio::test]
async fn alarm_is_queued_and_acknowledged() {
    let h = start().await;
    let resp = h.submit("alarm").await;
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    assert!(resp.headers().get(REQUEST_ID_HEADER).is_some());
    let json: Value = resp.json().await.expect("parse JSON");
    assert_eq!(json, json!({ "status": "success", "message": "alarm set for 07:00" }));

    let sent = h.publisher.published_to(ALARM_QUEUE).await;
    assert_eq!(sent.len(), 1);
    let body: Value = serde_json::from_slice(&sent[0].body).expect("alarm body");
    assert_eq!(
        body,
        json!({"time":"07:00","date":"2024-01-01","repeat":"none","days":"","label":"wake"})
    );
}

#[tokio::test]
async fn lamp_reply_is_formatted() {
    let h = start().await;
    let json: Value = h.submit("lamp").await.json().await.expect("parse JSON");
    assert_eq!(json.get("status").and_then(|v| v.as_str()), Some("ok"));
    assert_eq!(
        json.get("message").and_then(|v| v.as_str()),
        Some("lamp in kitchen changed color to blue")
    );
    assert_eq!(h.publisher.published_to(LAMP_QUEUE).await.len(), 1);
}

#[tokio::test]
async fn conversation_and_unknown_do_not_publish() {
    let h = start().await;
    let json: Value = h.submit("how are you").await.json().await.expect("parse JSON");
    assert_eq!(json, json!({ "status": "ok", "message": "hello" }));
    let json: Value = h.submit("music").await.json().await.expect("parse JSON");
    assert_eq!(json, json!({ "status": "unknown", "message": "no idea" }));
    assert!(h.publisher.published().await.is_empty());
}

#[tokio::test]
async fn empty_message_is_bad_request() {
    let h = start().await;
    let resp = h.submit("  ").await;
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    assert_eq!(resp.text().await.expect("body"), "empty message");
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let h = start().await;
    let resp = h
        .client
        .post(format!("{}/commands", h.base))
        .header("content-type", "application/json")
        .body("{\"msg\": 1}")
        .send()
        .await
        .expect("POST /commands");
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn decoding_and_broker_failures_are_server_errors() {
    let h = start().await;
    let resp = h.submit("broken alarm").await;
    assert_eq!(resp.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    assert!(resp.text().await.expect("body").contains("decoding set_alarm payload"));

    h.publisher.set_failing(true);
    let resp = h.submit("lamp").await;
    assert_eq!(resp.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);

    h.publisher.set_failing(false);
    let resp = h.submit("lamp").await;
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    assert_eq!(h.publisher.published().await.len(), 1);
}

#[tokio::test]
async fn incoming_request_id_is_echoed() {
    let h = start().await;
    let resp = h
        .client
        .post(format!("{}/commands", h.base))
        .header(REQUEST_ID_HEADER, "req-42")
        .json(&json!({ "message": "hi" }))
        .send()
        .await
        .expect("POST /commands");
    assert_eq!(
        resp.headers().get(REQUEST_ID_HEADER).and_then(|v| v.to_str().ok()),
        Some("req-42")
    );
}

#[tokio::test]
async fn command_completes_after_client_hangs_up() {
    let h = start().await;
    let impatient = reqwest::Client::builder()
        .timeout(Duration::from_millis(100))
        .build()
        .expect("client");
    let sent = impatient
        .post(format!("{}/commands", h.base))
        .json(&json!({ "message": "slow lamp" }))
        .send()
        .await;
    assert!(sent.is_err());

    tokio::time::sleep(Duration::from_millis(1500)).await;
    let published = h.publisher.published_to(LAMP_QUEUE).await;
    assert_eq!(published.len(), 1);
    let body: Value = serde_json::from_slice(&published[0].body).expect("lamp body");
    assert_eq!(body, json!({"action":"turn_on","room":"hall"}));
}
