use axum::{
	body::{self, Body},
	http::{Request, StatusCode, header},
};
use serde_json::Value;
use tower::util::ServiceExt;

use tome_api::{routes, state::AppState};
use tome_testkit::{sample_corpus, service_with, stubs::stub_providers, test_config};

fn test_router() -> axum::Router {
	let service = service_with(test_config(), sample_corpus(), stub_providers());

	routes::router(AppState::with_service(service))
}

fn json_request(uri: &str, payload: Value) -> Request<Body> {
	Request::builder()
		.method("POST")
		.uri(uri)
		.header(header::CONTENT_TYPE, "application/json")
		.body(Body::from(payload.to_string()))
		.expect("request build failed")
}

async fn json_body(response: axum::response::Response) -> Value {
	let bytes =
		body::to_bytes(response.into_body(), usize::MAX).await.expect("body read failed");

	serde_json::from_slice(&bytes).expect("body is not JSON")
}

#[tokio::test]
async fn health_returns_ok() {
	let response = test_router()
		.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
		.await
		.expect("request failed");

	assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn search_returns_ranked_items() {
	let response = test_router()
		.oneshot(json_request(
			"/v1/search",
			serde_json::json!({ "query": "habit loop cue reward" }),
		))
		.await
		.expect("request failed");

	assert_eq!(response.status(), StatusCode::OK);

	let json = json_body(response).await;
	let items = json["items"].as_array().expect("items missing");

	assert!(!items.is_empty());
	assert_eq!(items[0]["id"], 0);
}

#[tokio::test]
async fn blank_query_yields_bad_request() {
	let response = test_router()
		.oneshot(json_request("/v1/search", serde_json::json!({ "query": "  " })))
		.await
		.expect("request failed");

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);

	let json = json_body(response).await;

	assert_eq!(json["error_code"], "invalid_request");
}

#[tokio::test]
async fn ask_returns_answer_with_sources() {
	let response = test_router()
		.oneshot(json_request(
			"/v1/ask",
			serde_json::json!({ "query": "what is habit stacking" }),
		))
		.await
		.expect("request failed");

	assert_eq!(response.status(), StatusCode::OK);

	let json = json_body(response).await;

	assert!(json["answer"].as_str().expect("answer missing").contains("habit stacking"));
	assert!(!json["sources"].as_array().expect("sources missing").is_empty());
}

#[tokio::test]
async fn agent_returns_a_session_result() {
	let response = test_router()
		.oneshot(json_request(
			"/v1/agent",
			serde_json::json!({ "query": "what is the habit loop" }),
		))
		.await
		.expect("request failed");

	assert_eq!(response.status(), StatusCode::OK);

	let json = json_body(response).await;

	assert_eq!(json["query_type"], "simple");
	assert_eq!(json["iterations"], 1);
	assert!(json["session_id"].as_str().is_some());
}

#[tokio::test]
async fn agent_stream_emits_server_sent_events() {
	let response = test_router()
		.oneshot(json_request(
			"/v1/agent/stream",
			serde_json::json!({ "query": "what is the habit loop" }),
		))
		.await
		.expect("request failed");

	assert_eq!(response.status(), StatusCode::OK);
	assert!(
		response
			.headers()
			.get(header::CONTENT_TYPE)
			.and_then(|value| value.to_str().ok())
			.is_some_and(|value| value.starts_with("text/event-stream"))
	);

	let bytes =
		body::to_bytes(response.into_body(), usize::MAX).await.expect("body read failed");
	let body = String::from_utf8_lossy(&bytes);

	assert!(body.contains("\"event\":\"decompose\""));
	assert!(body.contains("\"event\":\"done\""));
}
