//! Admission gate middleware.
//!
//! Runs in front of the player routes: loads the trust anchor, extracts and
//! verifies the token, applies the admission policy and either rejects the
//! request or hands it on with a [`RequestIdentity`] extension.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Method, Request, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, error, warn};

use crate::auth::anchor::{CertificateError, TrustAnchorService};
use crate::auth::context::RequestIdentity;
use crate::auth::decision::{AccessDecision, RejectReason, RouteSensitivity, decide};
use crate::auth::extractor::TokenExtractor;
use crate::auth::validator::{FailureReason, TokenValidator, VerificationOutcome};
use crate::config::GateConfig;

/// What the gate decided for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum GateVerdict {
    /// Run the downstream handler with this identity
    Proceed(RequestIdentity),
    /// Answer with the reject status, never reaching the handler
    Reject(RejectReason),
}

/// Shared state for the admission gate.
pub struct AdmissionGate {
    anchors: Arc<TrustAnchorService>,
    extractor: TokenExtractor,
    validator: TokenValidator,
    protected_marker: String,
    pass_through_claims: Vec<String>,
}

impl AdmissionGate {
    pub fn new(config: &GateConfig, anchors: Arc<TrustAnchorService>) -> Self {
        Self {
            anchors,
            extractor: TokenExtractor::new(&config.header_name, &config.query_param),
            validator: TokenValidator::new(),
            protected_marker: config.protected_marker.clone(),
            pass_through_claims: config.pass_through_claims.clone(),
        }
    }

    /// Get reference to the trust anchor service.
    pub fn anchors(&self) -> &Arc<TrustAnchorService> {
        &self.anchors
    }

    /// Decide what happens to a request.
    ///
    /// Only a trust anchor that cannot be loaded is an error; every
    /// credential problem is folded into the verdict.
    pub fn evaluate(
        &self,
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
    ) -> Result<GateVerdict, CertificateError> {
        let anchor = self.anchors.ensure_loaded()?;

        let path = uri.path();
        let query = uri.query();
        let has_query_string = query.is_some_and(|q| !q.is_empty());

        let outcome = match self.extractor.extract(headers, query) {
            Ok(candidate) => self.validator.verify(candidate.as_ref(), &anchor),
            Err(e) => {
                warn!(path = %path, method = %method, "{}", e);
                VerificationOutcome::Denied(FailureReason::AmbiguousSource)
            }
        };

        let denial = match &outcome {
            VerificationOutcome::Denied(reason) => Some(*reason),
            VerificationOutcome::Passed(_) => None,
        };

        let sensitivity = RouteSensitivity::classify(path, &self.protected_marker);

        let verdict = match decide(outcome, sensitivity, method, has_query_string) {
            AccessDecision::Admit(claims) => {
                debug!(path = %path, subject = %claims.subject(), "Request authenticated");
                GateVerdict::Proceed(RequestIdentity::authenticated(
                    claims,
                    self.pass_through_claims.as_slice(),
                ))
            }
            AccessDecision::AdmitAnonymous => {
                if let Some(reason) = denial.filter(|r| *r != FailureReason::NoCredential) {
                    debug!(path = %path, %reason, "Credential denied, continuing anonymously");
                }
                GateVerdict::Proceed(RequestIdentity::anonymous())
            }
            AccessDecision::Reject(reject) => {
                warn!(
                    path = %path,
                    method = %method,
                    status = reject.status().as_u16(),
                    reason = %denial.unwrap_or(FailureReason::NoCredential),
                    "Request rejected"
                );
                GateVerdict::Reject(reject)
            }
        };

        Ok(verdict)
    }
}

/// Admission gate middleware.
pub async fn admission_gate(
    State(gate): State<Arc<AdmissionGate>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let verdict = gate.evaluate(request.method(), request.uri(), request.headers());

    match verdict {
        Ok(GateVerdict::Proceed(identity)) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Ok(GateVerdict::Reject(reason)) => reason.status().into_response(),
        Err(e) => {
            error!("Trust anchor unavailable, refusing request: {}", e);
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}
