//! Request-scoped identity handed to downstream handlers.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::auth::validator::ClaimSet;
use crate::types::SubjectId;

/// Claims copied to the identity by default for downstream customization.
pub const DEFAULT_PASS_THROUGH_CLAIMS: [&str; 3] = ["story", "playerMode", "aud"];

/// Identity attached to an admitted request.
///
/// Either fully anonymous or fully populated from a verified token: the only
/// constructors are [`RequestIdentity::anonymous`] and
/// [`RequestIdentity::authenticated`]. It is immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestIdentity {
    subject: Option<SubjectId>,
    claims: Option<ClaimSet>,
    pass_through: BTreeMap<String, Value>,
}

impl RequestIdentity {
    /// Identity for a request admitted without a usable token.
    pub fn anonymous() -> Self {
        Self {
            subject: None,
            claims: None,
            pass_through: BTreeMap::new(),
        }
    }

    /// Identity for a verified token, copying the named pass-through claims.
    ///
    /// Pass-through claims absent from the token are skipped.
    pub fn authenticated<S: AsRef<str>>(claims: ClaimSet, pass_through_names: &[S]) -> Self {
        let pass_through = pass_through_names
            .iter()
            .filter_map(|name| {
                let name = name.as_ref();
                claims
                    .get(name)
                    .map(|value| (name.to_string(), value.clone()))
            })
            .collect();

        Self {
            subject: Some(claims.subject().clone()),
            claims: Some(claims),
            pass_through,
        }
    }

    /// Verified subject, if any.
    pub fn subject(&self) -> Option<&SubjectId> {
        self.subject.as_ref()
    }

    /// Full claim set, if any.
    pub fn claims(&self) -> Option<&ClaimSet> {
        self.claims.as_ref()
    }

    /// A configured pass-through claim, if the token carried it.
    pub fn pass_through(&self, name: &str) -> Option<&Value> {
        self.pass_through.get(name)
    }

    /// A pass-through claim rendered as text (strings unquoted).
    pub fn pass_through_str(&self, name: &str) -> Option<String> {
        self.pass_through(name).map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Check if this is an anonymous identity.
    pub fn is_anonymous(&self) -> bool {
        self.subject.is_none()
    }

    /// Whether the caller is `owner` or the configured system identity.
    pub fn may_act_for(&self, owner: &str, system_id: Option<&str>) -> bool {
        match &self.subject {
            Some(subject) => {
                subject.as_str() == owner || system_id.is_some_and(|id| subject.as_str() == id)
            }
            None => false,
        }
    }
}
