use std::convert::Infallible;

use axum::{
	Json, Router,
	extract::State,
	http::StatusCode,
	response::{
		IntoResponse, Response,
		sse::{Event, KeepAlive, Sse},
	},
	routing::{get, post},
};
use futures::{Stream, StreamExt};
use serde::Serialize;
use tome_service::{AgentEvent, AskRequest, ServiceError};

pub fn router(state: crate::state::AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/search", post(search))
		.route("/v1/ask", post(ask))
		.route("/v1/agent", post(agent))
		.route("/v1/agent/stream", post(agent_stream))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn search(
	State(state): State<crate::state::AppState>,
	Json(payload): Json<tome_service::SearchRequest>,
) -> Result<Json<tome_service::SearchResponse>, ApiError> {
	let response = state.service.search(payload).await?;

	Ok(Json(response))
}

async fn ask(
	State(state): State<crate::state::AppState>,
	Json(payload): Json<AskRequest>,
) -> Result<Json<tome_service::AskResponse>, ApiError> {
	let response = state.service.ask(payload).await?;

	Ok(Json(response))
}

async fn agent(
	State(state): State<crate::state::AppState>,
	Json(payload): Json<AskRequest>,
) -> Result<Json<tome_service::AgenticResult>, ApiError> {
	let response = state.service.agent_ask(payload).await?;

	Ok(Json(response))
}

async fn agent_stream(
	State(state): State<crate::state::AppState>,
	Json(payload): Json<AskRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
	let events = state.service.clone().agent_ask_stream(payload.query).map(|event| {
		let event = match Event::default().json_data(&event) {
			Ok(event) => event,
			Err(err) => {
				tracing::warn!(error = %err, "Failed to serialize agent event.");

				Event::default().json_data(&AgentEvent::Error {
					message: "event serialization failed".to_string(),
				})
				.unwrap_or_default()
			},
		};

		Ok(event)
	});

	Sse::new(events).keep_alive(KeepAlive::default())
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		let (status, error_code) = match &err {
			ServiceError::InvalidRequest { .. } => {
				(StatusCode::BAD_REQUEST, "invalid_request")
			},
			ServiceError::Provider { .. } => (StatusCode::BAD_GATEWAY, "provider_error"),
			ServiceError::Index { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "index_error"),
		};

		Self { status, error_code: error_code.to_string(), message: err.to_string() }
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}
