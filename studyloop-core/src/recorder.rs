use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use crate::store::ProgressStore;
use crate::write_behind::{BatchPolicy, WriteBehind};
use crate::{CardId, CardOutcome, ListId, UserId};

/// Distinct cards allowed in the buffer before an immediate flush.
pub const FLUSH_THRESHOLD: usize = 10;
/// Quiet period after the last buffered outcome before a timed flush.
pub const FLUSH_QUIET_DELAY: Duration = Duration::from_secs(5);

/// Write-buffered recorder for per-card study outcomes.
///
/// Decouples answer events from the progress store: outcomes coalesce
/// per card (the latest one wins) and land in batches, so one flush
/// bumps each aggregate at most once no matter how often the card was
/// retried inside the window. A failed flush is logged and its batch
/// dropped; the session keeps going.
pub struct ProgressRecorder {
    buffer: WriteBehind<CardId, CardOutcome>,
}

impl ProgressRecorder {
    pub fn new(store: Arc<dyn ProgressStore>, user: UserId, list: ListId) -> Self {
        Self::with_policy(
            store,
            user,
            list,
            BatchPolicy::new(FLUSH_THRESHOLD, FLUSH_QUIET_DELAY),
        )
    }

    pub fn with_policy(
        store: Arc<dyn ProgressStore>,
        user: UserId,
        list: ListId,
        policy: BatchPolicy,
    ) -> Self {
        let buffer = WriteBehind::spawn(policy, move |batch: Vec<(CardId, CardOutcome)>| {
            let store = store.clone();
            async move {
                let outcomes: Vec<CardOutcome> = batch.into_iter().map(|(_, o)| o).collect();
                debug!(count = outcomes.len(), "flushing study outcomes");
                if let Err(err) = store.record_outcomes(user, list, &outcomes).await {
                    warn!(%err, dropped = outcomes.len(), "progress flush failed");
                }
            }
        });
        Self { buffer }
    }

    /// Buffer the outcome for one card; a retry inside the flush window
    /// overwrites the earlier entry.
    pub fn record(&self, card: CardId, correct: bool) {
        self.buffer.push(
            card,
            CardOutcome {
                flashcard_id: card,
                correct,
                at: Utc::now(),
            },
        );
    }

    pub async fn flush(&self) {
        self.buffer.flush().await;
    }

    /// Final flush, called once on session completion or teardown.
    pub async fn close(&self) {
        self.buffer.close().await;
    }
}
