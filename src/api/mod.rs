// REST API endpoints for the player service

use axum::{
    Extension, Router,
    extract::State,
    http::{StatusCode, header},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::get,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::{AdmissionGate, RequestIdentity, TrustAnchorService, admission_gate};
use crate::config::GateConfig;
use crate::players::{PlayerArgument, PlayerRecord, PlayerResponse, PlayerStore, PlayerStoreError};


/// Base path of the account routes.
pub const ACCOUNTS_PATH: &str = "/players/v1/accounts";

#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<AdmissionGate>,
    pub players: Arc<PlayerStore>,
    /// Identity allowed to create any player
    pub system_id: Option<String>,
}

impl AppState {
    /// Wire a gate for `certificate_pem` and an empty player store.
    ///
    /// The certificate is not parsed until first use.
    pub fn new(config: GateConfig, certificate_pem: impl Into<String>) -> Self {
        let anchors = Arc::new(TrustAnchorService::new(certificate_pem));
        Self {
            gate: Arc::new(AdmissionGate::new(&config, anchors)),
            players: Arc::new(PlayerStore::new()),
            system_id: config.system_id,
        }
    }
}

/// Build the router: `/health` outside the gate, every other path behind it.
pub fn create_router(state: AppState) -> Router {
    assemble(state, api_routes())
}

/// Routes served behind the admission gate.
fn api_routes() -> Router<AppState> {
    Router::new().route(ACCOUNTS_PATH, get(list_players).post(create_player))
}

/// Wrap `routes` (and the fallback) in the gate, then add the ungated health
/// check and the HTTP layers.
fn assemble(state: AppState, routes: Router<AppState>) -> Router {
    let gated = routes.layer(middleware::from_fn_with_state(
        state.gate.clone(),
        admission_gate,
    ));

    Router::new()
        .route("/health", get(health_check))
        .merge(gated)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let timestamp = chrono::Utc::now().to_rfc3339();

    match state.gate.anchors().ensure_loaded() {
        Ok(anchor) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "trustAnchor": {
                    "status": "loaded",
                    "subject": anchor.subject(),
                    "fingerprint": anchor.fingerprint(),
                },
                "players": state.players.len().await,
                "timestamp": timestamp,
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "trustAnchor": {
                    "status": "failed",
                    "error": e.to_string(),
                },
                "timestamp": timestamp,
            })),
        ),
    }
}

/// List all players, without their credentials.
///
/// Anonymous callers reach this through the plain-GET allowance of the gate.
async fn list_players(State(state): State<AppState>) -> Response {
    let players = state.players.list().await;
    if players.is_empty() {
        return StatusCode::NO_CONTENT.into_response();
    }

    let body: Vec<PlayerResponse> = players
        .iter()
        .map(PlayerResponse::without_credentials)
        .collect();
    Json(body).into_response()
}

/// Create a player. Only the player themself or the system identity may.
async fn create_player(
    State(state): State<AppState>,
    Extension(identity): Extension<RequestIdentity>,
    Json(argument): Json<PlayerArgument>,
) -> Result<Response, (StatusCode, Json<Value>)> {
    if !identity.may_act_for(argument.id.as_str(), state.system_id.as_deref()) {
        warn!(
            player_id = %argument.id,
            subject = ?identity.subject().map(|s| s.as_str()),
            "Player create refused: identity mismatch"
        );
        return Err(error_response(
            StatusCode::FORBIDDEN,
            "Player could not be created",
            "Authenticated id must match new player id",
        ));
    }

    let record = PlayerRecord::create(argument, &identity);
    let created = state.players.create(record).await.map_err(|e| match e {
        PlayerStoreError::Conflict(_) => error_response(
            StatusCode::CONFLICT,
            "Player could not be created",
            &e.to_string(),
        ),
    })?;

    info!(player_id = %created.id, "Player created");

    let location = format!("{}/{}", ACCOUNTS_PATH, created.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(PlayerResponse::with_credentials(&created)),
    )
        .into_response())
}

fn error_response(status: StatusCode, message: &str, more_info: &str) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(json!({
            "status": status.as_u16(),
            "message": message,
            "more_info": more_info,
        })),
    )
}
