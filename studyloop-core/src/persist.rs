use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::warn;

use crate::store::{CheckpointStore, SessionStore};
use crate::write_behind::{BatchPolicy, WriteBehind};
use crate::{CardId, Checkpoint, ListId, SessionId};

/// Delay between a cursor change and the debounced write mirroring it.
pub const SAVE_DELAY: Duration = Duration::from_millis(500);

/// Snapshot of the live session's resumable state.
#[derive(Clone, Debug)]
pub struct MirrorState {
    pub cards_order: Vec<CardId>,
    pub current_index: usize,
    pub known: Vec<CardId>,
}

/// Debounced mirror of the live session's cursor and card order.
///
/// Every index change is reported; the write itself is held back by
/// [`SAVE_DELAY`] so stepping through cards quickly costs one write,
/// not one per step. Targets are optional in either direction: the
/// durable session row, the device-local checkpoint, or both. Write
/// failures are logged and absorbed.
pub struct SessionMirror {
    buffer: WriteBehind<(), MirrorState>,
    durable: Option<(Arc<dyn SessionStore>, SessionId)>,
    local: Option<(Arc<dyn CheckpointStore>, ListId)>,
}

impl SessionMirror {
    pub fn new(
        durable: Option<(Arc<dyn SessionStore>, SessionId)>,
        local: Option<(Arc<dyn CheckpointStore>, ListId)>,
    ) -> Self {
        Self::with_delay(durable, local, SAVE_DELAY)
    }

    pub fn with_delay(
        durable: Option<(Arc<dyn SessionStore>, SessionId)>,
        local: Option<(Arc<dyn CheckpointStore>, ListId)>,
        delay: Duration,
    ) -> Self {
        let durable_sink = durable.clone();
        let local_sink = local.clone();
        let buffer = WriteBehind::spawn(
            BatchPolicy::debounce(delay),
            move |mut batch: Vec<((), MirrorState)>| {
                // Single key, so coalescing leaves one entry per batch.
                let state = batch.pop().map(|(_, s)| s);
                let durable = durable_sink.clone();
                let local = local_sink.clone();
                async move {
                    let Some(state) = state else { return };
                    if let Some((store, id)) = durable {
                        if let Err(err) = store
                            .update_progress(id, &state.cards_order, state.current_index)
                            .await
                        {
                            warn!(%err, session = %id, "cursor save failed");
                        }
                    }
                    if let Some((store, list)) = local {
                        let checkpoint = Checkpoint {
                            position: state.current_index,
                            known: state.known,
                            saved_at: Utc::now(),
                        };
                        if let Err(err) = store.save(list, &checkpoint).await {
                            warn!(%err, %list, "checkpoint save failed");
                        }
                    }
                }
            },
        );
        Self {
            buffer,
            durable,
            local,
        }
    }

    pub fn is_durable(&self) -> bool {
        self.durable.is_some()
    }

    /// Report a cursor or order change; the write happens after the
    /// debounce delay unless more changes keep arriving.
    pub fn update(&self, state: MirrorState) {
        self.buffer.push((), state);
    }

    /// Flush the pending write, mark the durable row completed, and
    /// drop the local checkpoint. Consumes the mirror: this session is
    /// closed for good.
    pub async fn finish(self) {
        self.buffer.close().await;
        if let Some((store, id)) = &self.durable {
            if let Err(err) = store.mark_completed(*id).await {
                warn!(%err, session = %id, "completing session row failed");
            }
        }
        if let Some((store, list)) = &self.local {
            if let Err(err) = store.clear(*list).await {
                warn!(%err, %list, "clearing checkpoint failed");
            }
        }
    }

    /// Teardown without completion: flush the pending write once and
    /// stop the timer. The row stays resumable.
    pub async fn dispose(self) {
        self.buffer.close().await;
    }
}
