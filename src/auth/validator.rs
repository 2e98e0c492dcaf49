//! Token verification against the trust anchor.

use std::fmt;

use jsonwebtoken::{Validation, decode, decode_header};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::auth::anchor::TrustAnchor;
use crate::types::{CandidateToken, SubjectId};

/// Seconds a token stays acceptable after its nominal expiry.
pub const EXPIRY_GRACE_SECONDS: i64 = 60;

/// Claims every accepted token must carry.
pub const REQUIRED_CLAIMS: [&str; 6] = ["sub", "aud", "name", "id", "exp", "iat"];

/// Claims decoded from a verified token.
///
/// Only [`TokenValidator`] builds these, after the signature and required
/// claims have been checked, so the subject is always present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClaimSet {
    subject: SubjectId,
    claims: Map<String, Value>,
}

impl ClaimSet {
    /// Verified `sub` claim.
    pub fn subject(&self) -> &SubjectId {
        &self.subject
    }

    /// Look up any claim by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// All decoded claims, verbatim.
    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }
}

/// Why a request carries no usable identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// No token was supplied (anonymous request)
    NoCredential,
    /// Duplicate credential carriers were supplied
    AmbiguousSource,
    /// Token could not be parsed or its signature does not match
    BadSignature,
    /// Token is past its expiry plus the grace period, or not yet valid
    Expired,
    /// A required claim is absent, or a time claim is not a number
    MissingRequiredClaim,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredential => write!(f, "no credential"),
            Self::AmbiguousSource => write!(f, "ambiguous credential source"),
            Self::BadSignature => write!(f, "bad signature"),
            Self::Expired => write!(f, "expired"),
            Self::MissingRequiredClaim => write!(f, "missing required claim"),
        }
    }
}

/// Result of verifying a (possibly absent) candidate token.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationOutcome {
    Passed(ClaimSet),
    Denied(FailureReason),
}

impl VerificationOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed(_))
    }
}

/// Verifies signed tokens. Stateless apart from its fixed policy.
#[derive(Debug, Clone)]
pub struct TokenValidator {
    grace_seconds: i64,
}

impl Default for TokenValidator {
    fn default() -> Self {
        Self {
            grace_seconds: EXPIRY_GRACE_SECONDS,
        }
    }
}

impl TokenValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Verify a candidate against the anchor using the current time.
    pub fn verify(
        &self,
        candidate: Option<&CandidateToken>,
        anchor: &TrustAnchor,
    ) -> VerificationOutcome {
        self.verify_at(candidate, anchor, chrono::Utc::now().timestamp())
    }

    /// Verify a candidate against the anchor at Unix time `now`.
    pub fn verify_at(
        &self,
        candidate: Option<&CandidateToken>,
        anchor: &TrustAnchor,
        now: i64,
    ) -> VerificationOutcome {
        let Some(candidate) = candidate else {
            return VerificationOutcome::Denied(FailureReason::NoCredential);
        };

        match self.check(candidate.as_str(), anchor, now) {
            Ok(claims) => VerificationOutcome::Passed(claims),
            Err(reason) => VerificationOutcome::Denied(reason),
        }
    }

    fn check(&self, token: &str, anchor: &TrustAnchor, now: i64) -> Result<ClaimSet, FailureReason> {
        let header = decode_header(token).map_err(|e| {
            debug!("Token header rejected: {}", e);
            FailureReason::BadSignature
        })?;

        if !anchor.accepts(header.alg) {
            debug!(algorithm = ?header.alg, "Token algorithm does not match trust anchor");
            return Err(FailureReason::BadSignature);
        }

        // Signature only; claim checks below use our own rules.
        let mut validation = Validation::new(header.alg);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;

        let data = decode::<Map<String, Value>>(token, anchor.decoding_key(), &validation)
            .map_err(|e| {
                debug!("Token signature rejected: {}", e);
                FailureReason::BadSignature
            })?;
        let claims = data.claims;

        if let Some(missing) = REQUIRED_CLAIMS.iter().find(|c| !claims.contains_key(**c)) {
            debug!(claim = %missing, "Token is missing a required claim");
            return Err(FailureReason::MissingRequiredClaim);
        }

        let subject = match claims.get("sub").and_then(Value::as_str) {
            Some(sub) if !sub.is_empty() => SubjectId::new(sub),
            _ => {
                debug!("Token subject is not a non-empty string");
                return Err(FailureReason::MissingRequiredClaim);
            }
        };

        let Some(exp) = claims.get("exp").and_then(numeric_date) else {
            debug!("Token expiry is not numeric");
            return Err(FailureReason::MissingRequiredClaim);
        };

        if claims.get("iat").and_then(numeric_date).is_none() {
            debug!("Token issued-at is not numeric");
            return Err(FailureReason::MissingRequiredClaim);
        }

        let nbf = match claims.get("nbf") {
            None => None,
            Some(value) => match numeric_date(value) {
                Some(nbf) => Some(nbf),
                None => {
                    debug!("Token not-before is not numeric");
                    return Err(FailureReason::MissingRequiredClaim);
                }
            },
        };

        if now > exp.saturating_add(self.grace_seconds) {
            debug!(subject = %subject, exp, now, "Token expired");
            return Err(FailureReason::Expired);
        }

        if nbf.is_some_and(|nbf| now.saturating_add(self.grace_seconds) < nbf) {
            debug!(subject = %subject, ?nbf, now, "Token not yet valid");
            return Err(FailureReason::Expired);
        }

        Ok(ClaimSet { subject, claims })
    }
}

/// Read a JWT NumericDate, which may be an integer or a fraction.
fn numeric_date(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f.floor() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_support::{IssuerKey, now, player_claims};
    use serde_json::json;

    fn verify(anchor: &TrustAnchor, token: &str) -> VerificationOutcome {
        TokenValidator::new().verify(Some(&CandidateToken::new(token)), anchor)
    }

    #[test]
    fn test_no_candidate_is_no_credential() {
        let issuer = IssuerKey::rsa();
        let outcome = TokenValidator::new().verify(None, &issuer.anchor());
        assert_eq!(
            outcome,
            VerificationOutcome::Denied(FailureReason::NoCredential)
        );
    }

    #[test]
    fn test_valid_rsa_token_passes() {
        let issuer = IssuerKey::rsa();
        let token = issuer.sign(&player_claims("p1", now() + 3600));

        match verify(&issuer.anchor(), &token) {
            VerificationOutcome::Passed(claims) => {
                assert_eq!(claims.subject().as_str(), "p1");
                assert_eq!(claims.get("name"), Some(&json!("n")));
                assert_eq!(claims.get("aud"), Some(&json!("x")));
            }
            other => panic!("expected Passed, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_ec_token_passes() {
        let issuer = IssuerKey::generate_ec();
        let token = issuer.sign(&player_claims("p1", now() + 3600));
        assert!(verify(&issuer.anchor(), &token).is_passed());
    }

    #[test]
    fn test_expired_within_grace_passes() {
        let issuer = IssuerKey::rsa();
        let token = issuer.sign(&player_claims("p1", now() - 30));
        assert!(verify(&issuer.anchor(), &token).is_passed());
    }

    #[test]
    fn test_expired_beyond_grace_is_denied() {
        let issuer = IssuerKey::rsa();
        let token = issuer.sign(&player_claims("p1", now() - 90));
        assert_eq!(
            verify(&issuer.anchor(), &token),
            VerificationOutcome::Denied(FailureReason::Expired)
        );
    }

    #[test]
    fn test_grace_boundary_is_inclusive() {
        let issuer = IssuerKey::rsa();
        let anchor = issuer.anchor();
        let exp = 1_700_000_000;
        let token = CandidateToken::new(issuer.sign(&player_claims("p1", exp)));
        let validator = TokenValidator::new();

        assert!(validator.verify_at(Some(&token), &anchor, exp + 60).is_passed());
        assert_eq!(
            validator.verify_at(Some(&token), &anchor, exp + 61),
            VerificationOutcome::Denied(FailureReason::Expired)
        );
    }

    #[test]
    fn test_other_key_is_bad_signature() {
        let trusted = IssuerKey::generate_ec();
        let attacker = IssuerKey::generate_ec();
        let token = attacker.sign(&player_claims("p1", now() + 3600));
        assert_eq!(
            verify(&trusted.anchor(), &token),
            VerificationOutcome::Denied(FailureReason::BadSignature)
        );
    }

    #[test]
    fn test_bad_signature_wins_over_claim_problems() {
        let trusted = IssuerKey::rsa();
        let attacker = IssuerKey::generate_ec();
        let token = attacker.sign(&json!({ "sub": "p1" }));
        assert_eq!(
            verify(&trusted.anchor(), &token),
            VerificationOutcome::Denied(FailureReason::BadSignature)
        );
    }

    #[test]
    fn test_hmac_token_is_bad_signature() {
        use jsonwebtoken::{EncodingKey, Header, encode};

        let issuer = IssuerKey::rsa();
        let token = encode(
            &Header::default(),
            &player_claims("p1", now() + 3600),
            &EncodingKey::from_secret(issuer.cert_pem.as_bytes()),
        )
        .unwrap();

        assert_eq!(
            verify(&issuer.anchor(), &token),
            VerificationOutcome::Denied(FailureReason::BadSignature)
        );
    }

    #[test]
    fn test_garbage_is_bad_signature() {
        let issuer = IssuerKey::rsa();
        assert_eq!(
            verify(&issuer.anchor(), "not-a-token"),
            VerificationOutcome::Denied(FailureReason::BadSignature)
        );
    }

    #[test]
    fn test_each_required_claim_is_enforced() {
        let issuer = IssuerKey::rsa();
        let anchor = issuer.anchor();

        for claim in REQUIRED_CLAIMS {
            let mut claims = player_claims("p1", now() + 3600);
            claims.as_object_mut().unwrap().remove(claim);
            let token = issuer.sign(&claims);
            assert_eq!(
                verify(&anchor, &token),
                VerificationOutcome::Denied(FailureReason::MissingRequiredClaim),
                "claim {} should be required",
                claim
            );
        }
    }

    #[test]
    fn test_non_numeric_expiry_is_missing_claim() {
        let issuer = IssuerKey::rsa();
        let mut claims = player_claims("p1", 0);
        claims["exp"] = json!("tomorrow");
        assert_eq!(
            verify(&issuer.anchor(), &issuer.sign(&claims)),
            VerificationOutcome::Denied(FailureReason::MissingRequiredClaim)
        );
    }

    #[test]
    fn test_non_numeric_issued_at_is_missing_claim() {
        let issuer = IssuerKey::rsa();
        let mut claims = player_claims("p1", now() + 3600);
        claims["iat"] = json!("yesterday");
        assert_eq!(
            verify(&issuer.anchor(), &issuer.sign(&claims)),
            VerificationOutcome::Denied(FailureReason::MissingRequiredClaim)
        );
    }

    #[test]
    fn test_future_not_before_is_denied() {
        let issuer = IssuerKey::rsa();
        let mut claims = player_claims("p1", now() + 3600);
        claims["nbf"] = json!(now() + 86_400);
        assert_eq!(
            verify(&issuer.anchor(), &issuer.sign(&claims)),
            VerificationOutcome::Denied(FailureReason::Expired)
        );

        claims["nbf"] = json!("soon");
        assert_eq!(
            verify(&issuer.anchor(), &issuer.sign(&claims)),
            VerificationOutcome::Denied(FailureReason::MissingRequiredClaim)
        );
    }

    #[test]
    fn test_not_before_allows_clock_skew() {
        let issuer = IssuerKey::rsa();
        let anchor = issuer.anchor();
        let nbf = 1_700_000_000;
        let mut claims = player_claims("p1", nbf + 3600);
        claims["nbf"] = json!(nbf);
        let token = CandidateToken::new(issuer.sign(&claims));
        let validator = TokenValidator::new();

        assert!(validator.verify_at(Some(&token), &anchor, nbf - 60).is_passed());
        assert_eq!(
            validator.verify_at(Some(&token), &anchor, nbf - 61),
            VerificationOutcome::Denied(FailureReason::Expired)
        );
    }

    #[test]
    fn test_domain_claims_are_kept_verbatim() {
        let issuer = IssuerKey::rsa();
        let mut claims = player_claims("p1", now() + 3600);
        claims["story"] = json!("a-story");
        claims["playerMode"] = json!("default");

        let VerificationOutcome::Passed(set) = verify(&issuer.anchor(), &issuer.sign(&claims))
        else {
            panic!("expected Passed");
        };
        assert_eq!(set.get("story"), Some(&json!("a-story")));
        assert_eq!(set.claims().len(), 8);
    }

    #[test]
    fn test_verification_is_idempotent() {
        let issuer = IssuerKey::rsa();
        let anchor = issuer.anchor();
        let token = issuer.sign(&player_claims("p1", now() + 3600));

        let first = verify(&anchor, &token);
        let second = verify(&anchor, &token);
        assert!(first.is_passed());
        assert_eq!(first, second);
    }

    #[test]
    fn test_fractional_expiry_is_accepted() {
        assert_eq!(numeric_date(&json!(1700000000.75)), Some(1_700_000_000));
        assert_eq!(numeric_date(&json!(42)), Some(42));
        assert_eq!(numeric_date(&json!(null)), None);
    }
}
