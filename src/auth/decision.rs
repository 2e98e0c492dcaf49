//! Route-sensitive admission policy.
//!
//! Account routes are protected, but anonymous plain browsing (a GET with no
//! query string) is still let through to them so unauthenticated clients can
//! discover players. Anything parameterized or mutating on a protected route
//! needs a verified identity.

use http::{Method, StatusCode};

use crate::auth::validator::{ClaimSet, FailureReason, VerificationOutcome};

/// Default path marker for the account-management namespace.
pub const DEFAULT_PROTECTED_MARKER: &str = "account";

/// How sensitive a route is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteSensitivity {
    Open,
    Protected,
}

impl RouteSensitivity {
    /// Classify a request path: protected when it contains `marker`.
    pub fn classify(path: &str, marker: &str) -> Self {
        if !marker.is_empty() && path.contains(marker) {
            Self::Protected
        } else {
            Self::Open
        }
    }
}

/// Why the gate refused a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Duplicate credential carriers
    AmbiguousSource,
    /// Protected route without a usable identity
    Forbidden,
}

impl RejectReason {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::AmbiguousSource => StatusCode::BAD_REQUEST,
            Self::Forbidden => StatusCode::FORBIDDEN,
        }
    }
}

/// What the gate does with a request.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessDecision {
    Admit(ClaimSet),
    AdmitAnonymous,
    Reject(RejectReason),
}

/// Combine a verification outcome with the request shape.
pub fn decide(
    outcome: VerificationOutcome,
    sensitivity: RouteSensitivity,
    method: &Method,
    has_query_string: bool,
) -> AccessDecision {
    let reason = match outcome {
        VerificationOutcome::Passed(claims) => return AccessDecision::Admit(claims),
        VerificationOutcome::Denied(reason) => reason,
    };

    if reason == FailureReason::AmbiguousSource {
        return AccessDecision::Reject(RejectReason::AmbiguousSource);
    }

    match sensitivity {
        RouteSensitivity::Open => AccessDecision::AdmitAnonymous,
        RouteSensitivity::Protected if method == Method::GET && !has_query_string => {
            AccessDecision::AdmitAnonymous
        }
        RouteSensitivity::Protected => AccessDecision::Reject(RejectReason::Forbidden),
    }
}
