//! Channel bundle for inter-task communication
//!
//! Feed callback -> opportunity task over a bounded mpsc channel, plus a
//! cancellation token shared by every long-running task.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::constants::OPPORTUNITY_CHANNEL_CAPACITY;
use crate::core::types::OpportunityRecord;

/// Bundle of all inter-task communication channels
#[derive(Debug)]
pub struct ChannelBundle {
    /// Detector (via feed callback) -> opportunity task
    pub opportunity_tx: mpsc::Sender<OpportunityRecord>,
    pub opportunity_rx: mpsc::Receiver<OpportunityRecord>,

    /// Shutdown: main -> all tasks
    pub cancel: CancellationToken,
}

impl ChannelBundle {
    pub fn new(capacity: usize) -> Self {
        let (opportunity_tx, opportunity_rx) = mpsc::channel(capacity);

        Self {
            opportunity_tx,
            opportunity_rx,
            cancel: CancellationToken::new(),
        }
    }
}

impl Default for ChannelBundle {
    fn default() -> Self {
        Self::new(OPPORTUNITY_CHANNEL_CAPACITY)
    }
}

/// Hand a fired record to the opportunity task without waiting.
///
/// Returns false when the record was dropped (channel full or closed).
pub fn forward_opportunity(
    tx: &mpsc::Sender<OpportunityRecord>,
    record: OpportunityRecord,
) -> bool {
    match tx.try_send(record) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(record)) => {
            warn!(
                pair = %record.pair,
                id = %record.id,
                "[TRADE] Opportunity channel full, dropping record"
            );
            false
        }
        Err(mpsc::error::TrySendError::Closed(record)) => {
            warn!(pair = %record.pair, "[TRADE] Opportunity channel closed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TradingPair;
    use crate::core::types::Direction;
    use chrono::Utc;
    use uuid::Uuid;

    fn record() -> OpportunityRecord {
        OpportunityRecord {
            id: Uuid::new_v4(),
            pair: TradingPair::parse("SOL/USDC").unwrap(),
            spot_price: 100.0,
            perp_price: 101.0,
            spread: 0.01,
            direction: Direction::BuySpotSellPerp,
            potential_profit_quote: 1.0,
            net_spread: 0.0085,
            profit_after_fees_quote: 0.85,
            detected_at: Utc::now(),
        }
    }

    #[test]
    fn test_channel_bundle_creation() {
        let bundle = ChannelBundle::new(50);
        assert!(!bundle.opportunity_tx.is_closed());
        assert!(!bundle.cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_forward_delivers() {
        let mut bundle = ChannelBundle::default();
        assert!(forward_opportunity(&bundle.opportunity_tx, record()));
        let received = bundle.opportunity_rx.recv().await.unwrap();
        assert_eq!(received.spread, 0.01);
    }

    #[test]
    fn test_forward_drops_when_full() {
        let bundle = ChannelBundle::new(1);
        assert!(forward_opportunity(&bundle.opportunity_tx, record()));
        assert!(!forward_opportunity(&bundle.opportunity_tx, record()));
    }

    #[test]
    fn test_forward_drops_when_closed() {
        let ChannelBundle {
            opportunity_tx,
            opportunity_rx,
            ..
        } = ChannelBundle::new(4);
        drop(opportunity_rx);
        assert!(!forward_opportunity(&opportunity_tx, record()));
    }
}
