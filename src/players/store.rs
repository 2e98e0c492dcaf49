//! In-memory player store.

use std::collections::BTreeMap;
use std::fmt;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::players::PlayerRecord;
use crate::types::PlayerId;

/// Errors from the player store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerStoreError {
    /// A record with this id already exists
    Conflict(PlayerId),
}

impl fmt::Display for PlayerStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conflict(id) => write!(f, "Player {} already exists", id),
        }
    }
}

impl std::error::Error for PlayerStoreError {}

/// Player records keyed by id.
#[derive(Default)]
pub struct PlayerStore {
    players: RwLock<BTreeMap<PlayerId, PlayerRecord>>,
}

impl PlayerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All players, ordered by id.
    pub async fn list(&self) -> Vec<PlayerRecord> {
        self.players.read().await.values().cloned().collect()
    }

    pub async fn get(&self, id: &str) -> Option<PlayerRecord> {
        self.players.read().await.get(id).cloned()
    }

    /// Insert a new record, assigning its first revision.
    pub async fn create(&self, mut record: PlayerRecord) -> Result<PlayerRecord, PlayerStoreError> {
        let mut players = self.players.write().await;
        if players.contains_key(&record.id) {
            return Err(PlayerStoreError::Conflict(record.id));
        }

        record.rev = format!("1-{}", Uuid::new_v4().simple());
        players.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    pub async fn len(&self) -> usize {
        self.players.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.players.read().await.is_empty()
    }
}
