//! Request admission gate.
//!
//! Every request to the player routes passes through the gate before it
//! reaches a handler:
//!
//! - **Trust anchor**: the issuer certificate is parsed once and shared
//! - **Extraction**: at most one token, from the `gameon-jwt` header or the
//!   `jwt` query parameter; duplicate carriers are a 400
//! - **Validation**: signature, required claims, expiry with a 60s grace
//! - **Decision**: account routes need an identity unless the request is a
//!   plain GET; other routes admit anonymously
//! - **Propagation**: admitted requests carry a [`RequestIdentity`]
//!
//! ## Usage
//!
//! ```ignore
//! let anchors = Arc::new(TrustAnchorService::new(pem));
//! let gate = Arc::new(AdmissionGate::new(&GateConfig::default(), anchors));
//!
//! let router = Router::new()
//!     .route("/players/v1/accounts", get(list_players))
//!     .layer(middleware::from_fn_with_state(gate, admission_gate));
//! ```

mod anchor;
mod context;
mod decision;
mod extractor;
mod gate;
mod test_support;
mod validator;

pub use anchor::{CertificateError, TrustAnchor, TrustAnchorService};
pub use context::{DEFAULT_PASS_THROUGH_CLAIMS, RequestIdentity};
pub use decision::{
    AccessDecision, DEFAULT_PROTECTED_MARKER, RejectReason, RouteSensitivity, decide,
};
pub use extractor::{
    AmbiguousSource, CredentialSource, DEFAULT_TOKEN_HEADER, DEFAULT_TOKEN_QUERY_PARAM,
    TokenExtractor, header_values, query_values, select,
};
pub use gate::{AdmissionGate, GateVerdict, admission_gate};
pub use validator::{
    ClaimSet, EXPIRY_GRACE_SECONDS, FailureReason, REQUIRED_CLAIMS, TokenValidator,
    VerificationOutcome,
};

#[cfg(test)]
pub(crate) use test_support::{IssuerKey, now, player_claims};
