use crate::{
    CardId, CardOutcome, Checkpoint, CoreError, ListId, ProgressAggregate, Session, SessionId,
    StudyMode, UserId,
};
use async_trait::async_trait;

pub mod memory;

/// Durable home of resumable session rows.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, session: &Session) -> Result<(), CoreError>;
    async fn get(&self, id: SessionId) -> Result<Session, CoreError>;

    /// Most recently touched incomplete session for (user, list, mode).
    async fn latest_incomplete(
        &self,
        user: UserId,
        list: ListId,
        mode: StudyMode,
    ) -> Result<Option<Session>, CoreError>;

    async fn update_progress(
        &self,
        id: SessionId,
        cards_order: &[CardId],
        current_index: usize,
    ) -> Result<(), CoreError>;

    async fn mark_completed(&self, id: SessionId) -> Result<(), CoreError>;
}

/// Lifetime per-card counters, written batch-at-a-time.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Aggregates for (user, list) restricted to `ids`; cards with no
    /// history are simply absent from the result.
    async fn aggregates(
        &self,
        user: UserId,
        list: ListId,
        ids: &[CardId],
    ) -> Result<Vec<ProgressAggregate>, CoreError>;

    /// Fetch-or-create each aggregate and bump exactly one counter per
    /// outcome. The whole batch lands atomically.
    async fn record_outcomes(
        &self,
        user: UserId,
        list: ListId,
        outcomes: &[CardOutcome],
    ) -> Result<(), CoreError>;
}

/// Device-local continuity records, one per list.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self, list: ListId) -> Result<Option<Checkpoint>, CoreError>;
    async fn save(&self, list: ListId, checkpoint: &Checkpoint) -> Result<(), CoreError>;
    async fn clear(&self, list: ListId) -> Result<(), CoreError>;
}

/// Award hooks fired from inside a session. Failures are logged by the
/// caller and never interrupt study.
#[async_trait]
pub trait RewardSink: Send + Sync {
    async fn correct_answer(&self, user: UserId, card: CardId) -> Result<(), CoreError>;
    async fn session_complete(&self, user: UserId, list: Option<ListId>) -> Result<(), CoreError>;
}
