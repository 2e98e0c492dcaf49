//! Player records.
//!
//! The account routes behind the admission gate read and create these. The
//! store is in memory; records live as long as the process.

mod store;

pub use store::{PlayerStore, PlayerStoreError};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::RequestIdentity;
use crate::types::{ApiKey, PlayerId};

/// Request body for creating a player.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerArgument {
    #[serde(rename = "_id")]
    pub id: PlayerId,
    pub name: String,
    pub favorite_color: String,
}

/// Stored player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRecord {
    pub id: PlayerId,
    pub rev: String,
    pub name: String,
    pub favorite_color: String,
    pub story: Option<String>,
    pub player_mode: Option<String>,
    pub api_key: ApiKey,
}

impl PlayerRecord {
    /// Build a new record for `argument`, taking story and mode from the
    /// caller's token when it carried them.
    pub fn create(argument: PlayerArgument, identity: &RequestIdentity) -> Self {
        Self {
            id: argument.id,
            rev: String::new(),
            name: argument.name,
            favorite_color: argument.favorite_color,
            story: identity.pass_through_str("story"),
            player_mode: identity.pass_through_str("playerMode"),
            api_key: generate_api_key(),
        }
    }
}

/// Shared secret attached to a player.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub shared_secret: ApiKey,
}

/// Player as returned by the API.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerResponse {
    #[serde(rename = "_id")]
    pub id: PlayerId,
    #[serde(rename = "_rev")]
    pub rev: String,
    pub name: String,
    pub favorite_color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub story: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
}

impl PlayerResponse {
    /// Full view, including the shared secret.
    pub fn with_credentials(record: &PlayerRecord) -> Self {
        Self {
            credentials: Some(Credentials {
                shared_secret: record.api_key.clone(),
            }),
            ..Self::without_credentials(record)
        }
    }

    /// Public view used for listings.
    pub fn without_credentials(record: &PlayerRecord) -> Self {
        Self {
            id: record.id.clone(),
            rev: record.rev.clone(),
            name: record.name.clone(),
            favorite_color: record.favorite_color.clone(),
            story: record.story.clone(),
            player_mode: record.player_mode.clone(),
            credentials: None,
        }
    }
}

/// Generate a new player API key.
pub fn generate_api_key() -> ApiKey {
    ApiKey::new(format!(
        "{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    ))
}
