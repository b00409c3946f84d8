// Chain State View - read-only snapshots of the tip
//
// Chain sync owns the write side (TipFeed); the relay only ever reads.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;

use super::{GasInfo, TipSummary};
use crate::message::TokenAmount;

/// Chain-state errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainStateError {
    #[error("No tip observed yet")]
    TipUnavailable,

    #[error("Tip height regressed from {current} to {proposed}")]
    HeightRegressed { current: u64, proposed: u64 },

    #[error("Chain state feed closed")]
    FeedClosed,
}

/// Write side of the chain state, held by the chain-sync collaborator
#[derive(Debug)]
pub struct TipFeed {
    sender: watch::Sender<Option<Arc<TipSummary>>>,
}

impl TipFeed {
    /// Publish a new tip. Heights may repeat but never go backwards.
    pub fn publish(&self, tip: TipSummary) -> Result<(), ChainStateError> {
        let mut result = Ok(());
        self.sender.send_if_modified(|current| {
            if let Some(current) = current {
                if tip.height < current.height {
                    result = Err(ChainStateError::HeightRegressed {
                        current: current.height,
                        proposed: tip.height,
                    });
                    return false;
                }
            }
            debug!(height = tip.height, base_fee = %tip.parent_base_fee, "new tip");
            *current = Some(Arc::new(tip.clone()));
            true
        });
        result
    }

    /// A new reader over this feed
    pub fn view(&self) -> ChainStateView {
        ChainStateView {
            receiver: self.sender.subscribe(),
        }
    }
}

/// Read-only accessor over the latest tip
#[derive(Clone, Debug)]
pub struct ChainStateView {
    receiver: watch::Receiver<Option<Arc<TipSummary>>>,
}

impl ChainStateView {
    /// Create a connected feed/view pair with no tip yet
    pub fn channel() -> (TipFeed, ChainStateView) {
        let (sender, receiver) = watch::channel(None);
        (TipFeed { sender }, ChainStateView { receiver })
    }

    /// The current tip summary
    pub fn tip(&self) -> Result<Arc<TipSummary>, ChainStateError> {
        self.receiver
            .borrow()
            .clone()
            .ok_or(ChainStateError::TipUnavailable)
    }

    pub fn height(&self) -> Result<u64, ChainStateError> {
        self.tip().map(|tip| tip.height)
    }

    pub fn parent_base_fee(&self) -> Result<TokenAmount, ChainStateError> {
        self.tip().map(|tip| tip.parent_base_fee)
    }

    pub fn gas_info(&self) -> Result<GasInfo, ChainStateError> {
        self.tip().map(|tip| tip.gas.clone())
    }

    /// Wait until the feed publishes a tip this view has not seen
    pub async fn changed(&mut self) -> Result<Arc<TipSummary>, ChainStateError> {
        self.receiver
            .changed()
            .await
            .map_err(|_| ChainStateError::FeedClosed)?;
        self.receiver
            .borrow_and_update()
            .clone()
            .ok_or(ChainStateError::TipUnavailable)
    }
}
