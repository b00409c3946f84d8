// Ingest - pools messages that arrive on joined topics

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::RelayService;
use crate::host::InboundMessage;
use crate::mpool::InsertOutcome;

/// Counters reported when the ingest task ends
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub accepted: u64,
    pub duplicates: u64,
    pub rejected: u64,
}

/// Drain `inbound` into the service's pool until the host closes the channel
pub fn spawn_ingest(
    service: Arc<RelayService>,
    mut inbound: mpsc::Receiver<InboundMessage>,
) -> JoinHandle<IngestStats> {
    tokio::spawn(async move {
        let mut stats = IngestStats::default();
        while let Some(message) = inbound.recv().await {
            match service.ingest(&message) {
                Ok((key, InsertOutcome::Added)) => {
                    stats.accepted += 1;
                    debug!(topic = %message.topic, %key, "pooled inbound message");
                }
                Ok((_, InsertOutcome::Duplicate)) => stats.duplicates += 1,
                Err(err) => {
                    stats.rejected += 1;
                    warn!(
                        topic = %message.topic,
                        source = ?message.source,
                        %err,
                        "dropping inbound message"
                    );
                }
            }
        }
        info!(?stats, "ingest stopped");
        stats
    })
}
