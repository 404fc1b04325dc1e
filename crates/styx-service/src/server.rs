//! HTTP server for the Styx API.
//!
//! Every route is nested under `/api` and shares one [`AppState`] holding
//! the engine.

use axum::{
	extract::{DefaultBodyLimit, Path, State},
	http::HeaderValue,
	response::Json,
	routing::{get, post},
	Router,
};
use alloy_primitives::Address;
use std::sync::Arc;
use std::time::Duration;
use styx_codec::Instruction;
use styx_config::ApiConfig;
use styx_core::SwapEngine;
use styx_types::{
	APIError, DecodeRequest, EncodeResponse, ExecuteRequest, ExecuteResponse, QuoteRequest,
	QuoteResponse, RegisterTokenRequest, SettlementRecord, TokenResponse,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	pub engine: Arc<SwapEngine>,
	/// Caller identity for relayed instructions.
	pub relayer: Option<Address>,
}

/// Builds the router with every `/api` route.
pub fn router(state: AppState, api_config: &ApiConfig) -> Router {
	Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/execute", post(handle_execute))
				.route("/encode", post(handle_encode))
				.route("/decode", post(handle_decode))
				.route("/quote", post(handle_quote))
				.route("/tokens", post(handle_register_token))
				.route("/tokens/{index}", get(handle_get_token))
				.route("/settlements/{id}", get(handle_get_settlement)),
		)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(cors_layer(api_config))
				.layer(TimeoutLayer::new(Duration::from_secs(api_config.timeout_seconds)))
				.layer(DefaultBodyLimit::max(api_config.max_request_size)),
		)
		.with_state(state)
}

fn cors_layer(api_config: &ApiConfig) -> CorsLayer {
	let Some(cors) = &api_config.cors else {
		return CorsLayer::permissive();
	};
	let origins: Vec<HeaderValue> = cors
		.allowed_origins
		.iter()
		.filter_map(|origin| match origin.parse::<HeaderValue>() {
			Ok(value) => Some(value),
			Err(e) => {
				tracing::warn!(%origin, error = %e, "Ignoring invalid CORS origin");
				None
			},
		})
		.collect();
	CorsLayer::new().allow_origin(AllowOrigin::list(origins))
}

/// Starts the HTTP server and serves until the listener fails.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<SwapEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	if api_config.relayer.is_none() {
		tracing::warn!("No api.relayer configured; /api/execute will refuse requests");
	}
	let app = router(
		AppState {
			engine,
			relayer: api_config.relayer,
		},
		&api_config,
	);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Styx API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

/// Handles POST /api/execute requests.
async fn handle_execute(
	State(state): State<AppState>,
	Json(request): Json<ExecuteRequest>,
) -> Result<Json<ExecuteResponse>, APIError> {
	match crate::apis::execute::process_execute_request(request, &state.engine, state.relayer)
		.await
	{
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("Execute request failed: {}", e);
			Err(e)
		},
	}
}

/// Handles POST /api/encode requests.
async fn handle_encode(
	Json(instruction): Json<Instruction>,
) -> Result<Json<EncodeResponse>, APIError> {
	crate::apis::codec::process_encode_request(instruction).map(Json)
}

/// Handles POST /api/decode requests.
async fn handle_decode(
	Json(request): Json<DecodeRequest>,
) -> Result<Json<Instruction>, APIError> {
	crate::apis::codec::process_decode_request(request).map(Json)
}

/// Handles POST /api/quote requests.
async fn handle_quote(
	State(state): State<AppState>,
	Json(request): Json<QuoteRequest>,
) -> Result<Json<QuoteResponse>, APIError> {
	match crate::apis::quote::process_quote_request(request, &state.engine).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("Quote request failed: {}", e);
			Err(e)
		},
	}
}

/// Handles GET /api/tokens/{index} requests.
async fn handle_get_token(
	Path(index): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<TokenResponse>, APIError> {
	crate::apis::tokens::get_token(&index, &state.engine)
		.await
		.map(Json)
}

/// Handles POST /api/tokens requests.
async fn handle_register_token(
	State(state): State<AppState>,
	Json(request): Json<RegisterTokenRequest>,
) -> Result<Json<TokenResponse>, APIError> {
	crate::apis::tokens::register_token(request, &state.engine)
		.await
		.map(Json)
}

/// Handles GET /api/settlements/{id} requests.
async fn handle_get_settlement(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<SettlementRecord>, APIError> {
	match crate::apis::settlements::get_settlement_by_id(&id, &state.engine).await {
		Ok(record) => Ok(Json(record)),
		Err(e) => {
			tracing::debug!(%id, "Settlement lookup failed: {}", e);
			Err(e)
		},
	}
}
