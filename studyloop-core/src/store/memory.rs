use crate::store::{CheckpointStore, ProgressStore, SessionStore};
use crate::{
    CardId, CardOutcome, Checkpoint, CoreError, ListId, ProgressAggregate, Session, SessionId,
    StudyMode, UserId,
};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
pub struct MemorySessionStore {
    rows: RwLock<HashMap<SessionId, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, session: &Session) -> Result<(), CoreError> {
        self.rows.write().insert(session.id, session.clone());
        Ok(())
    }

    async fn get(&self, id: SessionId) -> Result<Session, CoreError> {
        self.rows
            .read()
            .get(&id)
            .cloned()
            .ok_or(CoreError::NotFound("session"))
    }

    async fn latest_incomplete(
        &self,
        user: UserId,
        list: ListId,
        mode: StudyMode,
    ) -> Result<Option<Session>, CoreError> {
        Ok(self
            .rows
            .read()
            .values()
            .filter(|s| !s.completed && s.user_id == user && s.list_id == list && s.mode == mode)
            .max_by_key(|s| (s.updated_at, s.created_at))
            .cloned())
    }

    async fn update_progress(
        &self,
        id: SessionId,
        cards_order: &[CardId],
        current_index: usize,
    ) -> Result<(), CoreError> {
        let mut rows = self.rows.write();
        let Some(s) = rows.get_mut(&id) else {
            return Err(CoreError::NotFound("session"));
        };
        s.cards_order = cards_order.to_vec();
        s.current_index = current_index;
        s.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_completed(&self, id: SessionId) -> Result<(), CoreError> {
        let mut rows = self.rows.write();
        let Some(s) = rows.get_mut(&id) else {
            return Err(CoreError::NotFound("session"));
        };
        s.completed = true;
        s.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryProgressStore {
    rows: RwLock<HashMap<(UserId, CardId), ProgressAggregate>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn aggregates(
        &self,
        user: UserId,
        list: ListId,
        ids: &[CardId],
    ) -> Result<Vec<ProgressAggregate>, CoreError> {
        let rows = self.rows.read();
        Ok(ids
            .iter()
            .filter_map(|id| rows.get(&(user, *id)))
            .filter(|a| a.list_id == list)
            .cloned()
            .collect())
    }

    async fn record_outcomes(
        &self,
        user: UserId,
        list: ListId,
        outcomes: &[CardOutcome],
    ) -> Result<(), CoreError> {
        let mut rows = self.rows.write();
        for o in outcomes {
            let agg = rows
                .entry((user, o.flashcard_id))
                .or_insert_with(|| ProgressAggregate {
                    user_id: user,
                    flashcard_id: o.flashcard_id,
                    list_id: list,
                    correct_count: 0,
                    incorrect_count: 0,
                    last_reviewed: o.at,
                });
            if o.correct {
                agg.correct_count += 1;
            } else {
                agg.incorrect_count += 1;
            }
            agg.last_reviewed = o.at;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCheckpointStore {
    rows: RwLock<HashMap<ListId, Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, list: ListId) -> Result<Option<Checkpoint>, CoreError> {
        Ok(self.rows.read().get(&list).cloned())
    }

    async fn save(&self, list: ListId, checkpoint: &Checkpoint) -> Result<(), CoreError> {
        self.rows.write().insert(list, checkpoint.clone());
        Ok(())
    }

    async fn clear(&self, list: ListId) -> Result<(), CoreError> {
        self.rows.write().remove(&list);
        Ok(())
    }
}
