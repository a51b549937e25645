//! HTTP and WebSocket server for the coordinator's external interface.
//!
//! This module provides the `axum` router backing spec section 6: the three
//! HTTP operations plus the listen-only WebSocket stream of approval-flow
//! events.

use axum::{
	extract::{Query, State},
	response::{IntoResponse, Json},
	routing::{get, post},
	Router,
};
use coordinator_core::Coordinator;
use coordinator_types::api::{
	CoordinatorApiError, RequestTransactionRequest, RequestTransactionResponse, SoftCancelsRequest,
	SoftCancelsResponse,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

mod ws;

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Reference to the coordinator engine for processing requests.
	pub coordinator: Arc<Coordinator>,
}

/// A `chainId` query parameter, shared by all three HTTP operations and the
/// WebSocket route.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainIdQuery {
	pub chain_id: u64,
}

/// Starts the HTTP server for the coordinator API.
pub async fn start_server(
	http_port: u16,
	coordinator: Arc<Coordinator>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app_state = AppState { coordinator };

	let app = Router::new()
		.nest(
			"/v2",
			Router::new()
				.route("/configuration", get(handle_configuration))
				.route("/request_transaction", post(handle_request_transaction))
				.route("/soft_cancels", post(handle_soft_cancels))
				.route("/requests", get(ws::handle_upgrade)),
		)
		.layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
		.with_state(app_state);

	let bind_address = format!("0.0.0.0:{}", http_port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!(%bind_address, "coordinator API server starting");

	axum::serve(listener, app).await?;

	Ok(())
}

/// Handles `GET /v2/configuration`.
async fn handle_configuration(State(state): State<AppState>) -> impl IntoResponse {
	Json(state.coordinator.configuration_response())
}

/// Handles `POST /v2/request_transaction?chainId=<int>`.
async fn handle_request_transaction(
	State(state): State<AppState>,
	Query(query): Query<ChainIdQuery>,
	Json(request): Json<RequestTransactionRequest>,
) -> Result<Json<RequestTransactionResponse>, CoordinatorApiError> {
	match state
		.coordinator
		.request_transaction(query.chain_id, request)
		.await
	{
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!(error = %e, "request_transaction rejected");
			Err(e)
		}
	}
}

/// Handles `POST /v2/soft_cancels?chainId=<int>`.
async fn handle_soft_cancels(
	State(state): State<AppState>,
	Query(query): Query<ChainIdQuery>,
	Json(request): Json<SoftCancelsRequest>,
) -> Result<Json<SoftCancelsResponse>, CoordinatorApiError> {
	match state.coordinator.soft_cancels(query.chain_id, request).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!(error = %e, "soft_cancels rejected");
			Err(e)
		}
	}
}
