//! Position bookkeeping for fired opportunities
//!
//! Keyed by the natural key (pair, direction): at most one open position
//! per key. The opportunity task consults the store to skip records whose
//! key is already open. Neither the feed nor the detector touches it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::TradingPair;
use crate::core::types::{Direction, OpportunityRecord};

/// Natural key of a position
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PositionKey {
    pub pair: TradingPair,
    pub direction: Direction,
}

impl PositionKey {
    pub fn of(record: &OpportunityRecord) -> Self {
        Self {
            pair: record.pair.clone(),
            direction: record.direction,
        }
    }
}

/// Status of a tracked position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Open,
    Closed,
}

/// Position opened from a fired opportunity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionRecord {
    /// Id of the opportunity that opened it
    pub opportunity_id: Uuid,
    pub key: PositionKey,
    pub entry_spread: f64,
    /// Gross profit expected at entry, in quote currency
    pub expected_profit_quote: f64,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub status: PositionStatus,
}

impl PositionRecord {
    pub fn from_opportunity(record: &OpportunityRecord) -> Self {
        Self {
            opportunity_id: record.id,
            key: PositionKey::of(record),
            entry_spread: record.spread,
            expected_profit_quote: record.potential_profit_quote,
            opened_at: record.detected_at,
            closed_at: None,
            status: PositionStatus::Open,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Position already open for {pair} {direction}")]
    AlreadyOpen { pair: TradingPair, direction: Direction },

    #[error("Position not found")]
    NotFound,
}

/// Injectable position storage
#[async_trait]
pub trait PositionStore: Send + Sync {
    /// Open a position; fails if the key already has one open.
    async fn open_position(&self, position: PositionRecord) -> Result<(), StateError>;

    /// Mark the open position for `key` as closed and return it.
    async fn close_position(&self, key: &PositionKey) -> Result<PositionRecord, StateError>;

    async fn get(&self, key: &PositionKey) -> Option<PositionRecord>;

    async fn open_positions(&self) -> Vec<PositionRecord>;

    async fn has_open(&self, key: &PositionKey) -> bool {
        self.get(key).await.map(|p| p.is_open()).unwrap_or(false)
    }
}

/// Process-local store
#[derive(Debug, Default)]
pub struct InMemoryPositionStore {
    positions: RwLock<HashMap<PositionKey, PositionRecord>>,
}

impl InMemoryPositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_shared(self) -> Arc<dyn PositionStore> {
        Arc::new(self)
    }
}

#[async_trait]
impl PositionStore for InMemoryPositionStore {
    async fn open_position(&self, position: PositionRecord) -> Result<(), StateError> {
        let mut positions = self.positions.write().await;
        if let Some(existing) = positions.get(&position.key) {
            if existing.is_open() {
                return Err(StateError::AlreadyOpen {
                    pair: position.key.pair.clone(),
                    direction: position.key.direction,
                });
            }
        }
        positions.insert(position.key.clone(), position);
        Ok(())
    }

    async fn close_position(&self, key: &PositionKey) -> Result<PositionRecord, StateError> {
        let mut positions = self.positions.write().await;
        match positions.get_mut(key) {
            Some(position) if position.is_open() => {
                position.status = PositionStatus::Closed;
                position.closed_at = Some(Utc::now());
                Ok(position.clone())
            }
            _ => Err(StateError::NotFound),
        }
    }

    async fn get(&self, key: &PositionKey) -> Option<PositionRecord> {
        self.positions.read().await.get(key).cloned()
    }

    async fn open_positions(&self) -> Vec<PositionRecord> {
        let mut open: Vec<PositionRecord> = self
            .positions
            .read()
            .await
            .values()
            .filter(|p| p.is_open())
            .cloned()
            .collect();
        open.sort_by_key(|p| p.opened_at);
        open
    }
}
