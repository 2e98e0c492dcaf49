//! NewType wrappers for strong typing throughout the gate.
//!
//! These types prevent accidental mixing of semantically different strings
//! (e.g., passing a raw token where a verified subject is expected).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to generate a NewType wrapper with standard trait implementations.
macro_rules! newtype_string {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the inner value as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner String.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

newtype_string!(
    /// Verified subject identifier taken from the `sub` claim of a token.
    ///
    /// Only the validator produces these from a token; downstream handlers
    /// compare them against player ids to authorize self-service operations.
    SubjectId
);

newtype_string!(
    /// Player record identifier (e.g., "github:1234").
    ///
    /// Serialized as `_id` in the player JSON documents.
    PlayerId
);

newtype_string!(
    /// Shared secret generated for a player when their record is created.
    ApiKey
);

/// Raw bearer token selected from a request, not yet verified.
///
/// Kept separate from the string newtypes so a token is never printed by
/// accident: `Debug` redacts the value.
#[derive(Clone, PartialEq, Eq)]
pub struct CandidateToken(String);

impl CandidateToken {
    /// Create a new candidate token.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the compact token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CandidateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CandidateToken(<{} bytes>)", self.0.len())
    }
}
