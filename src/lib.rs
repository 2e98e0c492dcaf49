// Core modules
mod config;
mod players;
mod types;

pub mod api;
pub mod auth;

// Re-export key types and functions
pub use api::{AppState, create_router};
pub use auth::{
    AdmissionGate, CertificateError, RequestIdentity, TrustAnchor, TrustAnchorService,
    admission_gate,
};
pub use config::{GateConfig, normalize_pem, resolve_certificate_pem};
pub use players::{PlayerArgument, PlayerRecord, PlayerResponse, PlayerStore, PlayerStoreError};
pub use types::{ApiKey, CandidateToken, PlayerId, SubjectId};

use axum::Router;

/// Convenience function to create the fully wired player service.
///
/// The certificate is parsed on first use; call
/// [`TrustAnchorService::ensure_loaded`] through the returned state first to
/// fail fast at startup.
pub fn create_app(config: GateConfig, certificate_pem: impl Into<String>) -> (AppState, Router) {
    let state = AppState::new(config, certificate_pem);
    let router = create_router(state.clone());
    (state, router)
}
