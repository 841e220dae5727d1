//! HTTP API exposing the replica operations.

use axum::{
	extract::State,
	http::StatusCode,
	response::Json,
	routing::{delete, get, post},
	Router,
};
use oracle_core::{CoreError, OracleEngine};
use oracle_types::OperationResult;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

pub fn router(engine: Arc<OracleEngine>) -> Router {
	Router::new()
		.route("/health", get(health_check))
		.route("/prices", get(current_prices).post(record_sample))
		.route("/prices/update", post(update_contract))
		.route("/prices/old", delete(prune_old_samples))
		.with_state(engine)
		.layer(TraceLayer::new_for_http())
		.layer(CorsLayer::permissive())
}

pub async fn start_http_server(
	engine: Arc<OracleEngine>,
	host: String,
	port: u16,
) -> anyhow::Result<()> {
	let app = router(engine);

	let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
	info!("HTTP server listening on {}:{}", host, port);

	axum::serve(listener, app).await?;

	Ok(())
}

type ApiResponse = (StatusCode, Json<OperationResult>);

/// Uses the operation status as the HTTP status; failures become 500.
fn respond(engine: &OracleEngine, outcome: Result<OperationResult, CoreError>) -> ApiResponse {
	let result = outcome.unwrap_or_else(|e| engine.error_result(&e));
	let status = StatusCode::from_u16(result.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
	(status, Json(result))
}

async fn health_check(State(engine): State<Arc<OracleEngine>>) -> Json<serde_json::Value> {
	Json(serde_json::json!({
		"status": "ok",
		"replica": engine.replica(),
	}))
}

async fn current_prices(State(engine): State<Arc<OracleEngine>>) -> ApiResponse {
	respond(&engine, engine.current_prices().await)
}

async fn record_sample(State(engine): State<Arc<OracleEngine>>) -> ApiResponse {
	respond(&engine, engine.record_sample().await)
}

async fn update_contract(State(engine): State<Arc<OracleEngine>>) -> ApiResponse {
	respond(&engine, engine.evaluate_and_maybe_update().await)
}

async fn prune_old_samples(State(engine): State<Arc<OracleEngine>>) -> ApiResponse {
	respond(&engine, engine.prune_old_samples().await)
}
