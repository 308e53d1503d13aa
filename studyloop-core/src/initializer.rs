use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::persist::SessionMirror;
use crate::recorder::ProgressRecorder;
use crate::scheduler::RoundScheduler;
use crate::session::{SessionParts, StudySession};
use crate::store::{CheckpointStore, ProgressStore, RewardSink, SessionStore};
use crate::{
    CardId, Flashcard, ListId, Session, StudyMode, StudyResult, UserId, Verdict, ROUND_SIZE,
};

/// Identity of one study set-up: the list, the mode, and the candidate
/// card set. Two requests with the same key describe the same session,
/// so holders of a live session can treat a repeated start as a no-op
/// instead of reinitializing.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionKey {
    list_id: Option<ListId>,
    mode: StudyMode,
    cards: Vec<CardId>,
}

impl SessionKey {
    pub fn new(
        list_id: Option<ListId>,
        mode: StudyMode,
        cards: impl IntoIterator<Item = CardId>,
    ) -> Self {
        let mut cards: Vec<CardId> = cards.into_iter().collect();
        cards.sort_unstable();
        cards.dedup();
        Self {
            list_id,
            mode,
            cards,
        }
    }
}

/// Everything needed to start (or resume) studying.
pub struct StartRequest {
    /// Studying anonymously leaves this `None`: no durable session, no
    /// recorded progress, no rewards.
    pub user: Option<UserId>,
    pub list_id: Option<ListId>,
    pub mode: StudyMode,
    pub cards: Vec<Flashcard>,
    /// Lift the round cap so bounded modes study every candidate per
    /// round. Linear mode ignores this.
    pub use_all_cards: bool,
    /// Restrict the candidates to these ids (starred cards).
    pub favorites: Option<HashSet<CardId>>,
}

impl StartRequest {
    pub fn key(&self) -> SessionKey {
        let ids = self.cards.iter().map(|c| c.id).filter(|id| match &self.favorites {
            Some(f) => f.contains(id),
            None => true,
        });
        SessionKey::new(self.list_id, self.mode, ids)
    }
}

/// Builds live sessions: resumes the saved one when there is one,
/// creates a durable one when it can, and falls back to an ephemeral
/// in-memory session when persistence is missing or down.
pub struct SessionInitializer {
    sessions: Arc<dyn SessionStore>,
    progress: Arc<dyn ProgressStore>,
    checkpoints: Option<Arc<dyn CheckpointStore>>,
    rewards: Option<Arc<dyn RewardSink>>,
}

impl SessionInitializer {
    pub fn new(sessions: Arc<dyn SessionStore>, progress: Arc<dyn ProgressStore>) -> Self {
        Self {
            sessions,
            progress,
            checkpoints: None,
            rewards: None,
        }
    }

    pub fn with_checkpoints(mut self, checkpoints: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = Some(checkpoints);
        self
    }

    pub fn with_rewards(mut self, rewards: Arc<dyn RewardSink>) -> Self {
        self.rewards = Some(rewards);
        self
    }

    /// Resolve this request into a live session. Never fails: a
    /// persistence outage degrades to an ephemeral session rather than
    /// blocking study.
    pub async fn start_or_resume(&self, req: StartRequest) -> StudySession {
        let StartRequest {
            user,
            list_id,
            mode,
            mut cards,
            use_all_cards,
            favorites,
        } = req;
        if let Some(ids) = &favorites {
            cards.retain(|c| ids.contains(&c.id));
        }
        let (Some(user), Some(list)) = (user, list_id) else {
            return self.ephemeral(user, list_id, mode, cards, use_all_cards).await;
        };
        match self.sessions.latest_incomplete(user, list, mode).await {
            Ok(Some(row)) => {
                if let Some(session) = self.resume(user, row, &cards, use_all_cards).await {
                    return session;
                }
                self.create(user, list, mode, cards, use_all_cards).await
            }
            Ok(None) => self.create(user, list, mode, cards, use_all_cards).await,
            Err(err) => {
                warn!(%err, "session lookup failed; studying without persistence");
                self.ephemeral(Some(user), Some(list), mode, cards, use_all_cards)
                    .await
            }
        }
    }

    /// Pick the saved session back up: order and cursor verbatim, minus
    /// any cards that left the list since. `None` means nothing of the
    /// saved order survived and the caller should start fresh.
    async fn resume(
        &self,
        user: UserId,
        row: Session,
        cards: &[Flashcard],
        use_all: bool,
    ) -> Option<StudySession> {
        let available: HashSet<CardId> = cards.iter().map(|c| c.id).collect();
        let order: Vec<CardId> = row
            .cards_order
            .iter()
            .copied()
            .filter(|id| available.contains(id))
            .collect();
        if order.is_empty() {
            warn!(session = %row.id, "saved order no longer matches the card set; starting fresh");
            return None;
        }
        let cursor = row.current_index.min(order.len() - 1);
        let rounds = if row.mode.is_linear() {
            None
        } else {
            let in_round: HashSet<CardId> = order.iter().copied().collect();
            let leftover: Vec<CardId> = cards
                .iter()
                .map(|c| c.id)
                .filter(|id| !in_round.contains(id))
                .collect();
            let ranked = self.rank_by_history(user, row.list_id, leftover).await;
            let cap = if use_all { cards.len().max(1) } else { ROUND_SIZE };
            Some(RoundScheduler::with_round_size(ranked, cap))
        };
        debug!(session = %row.id, index = cursor, "resuming saved session");
        Some(StudySession::from_parts(SessionParts {
            id: row.id,
            user: Some(user),
            list: Some(row.list_id),
            mode: row.mode,
            cards: cards.iter().map(|c| (c.id, c.clone())).collect(),
            order,
            cursor,
            results: HashMap::new(),
            rounds,
            recorder: Some(ProgressRecorder::new(self.progress.clone(), user, row.list_id)),
            mirror: Some(SessionMirror::new(
                Some((self.sessions.clone(), row.id)),
                None,
            )),
            rewards: self.rewards.clone(),
        }))
    }

    async fn create(
        &self,
        user: UserId,
        list: ListId,
        mode: StudyMode,
        cards: Vec<Flashcard>,
        use_all: bool,
    ) -> StudySession {
        let ids: Vec<CardId> = cards.iter().map(|c| c.id).collect();
        let (order, rounds) = if mode.is_linear() {
            (ids, None)
        } else {
            // Error-prone cards come first; the shuffle before ranking
            // breaks count ties randomly.
            let ranked = self.rank_by_history(user, list, ids).await;
            let cap = if use_all { ranked.len().max(1) } else { ROUND_SIZE };
            let order: Vec<CardId> = ranked.iter().take(cap).copied().collect();
            let scheduler = RoundScheduler::with_round_size(ranked.into_iter().skip(cap), cap);
            (order, Some(scheduler))
        };
        let row = Session::new(user, list, mode, order.clone());
        if let Err(err) = self.sessions.create(&row).await {
            warn!(%err, "session create failed; studying without persistence");
            return self.ephemeral(Some(user), Some(list), mode, cards, use_all).await;
        }
        debug!(session = %row.id, cards = order.len(), "created session");
        StudySession::from_parts(SessionParts {
            id: row.id,
            user: Some(user),
            list: Some(list),
            mode,
            cards: cards.into_iter().map(|c| (c.id, c)).collect(),
            order,
            cursor: 0,
            results: HashMap::new(),
            rounds,
            recorder: Some(ProgressRecorder::new(self.progress.clone(), user, list)),
            mirror: Some(SessionMirror::new(
                Some((self.sessions.clone(), row.id)),
                None,
            )),
            rewards: self.rewards.clone(),
        })
    }

    /// Session with no durable row. Bounded modes shuffle uniformly;
    /// the linear pass keeps the caller's order and picks up the local
    /// checkpoint when a checkpoint store is around.
    async fn ephemeral(
        &self,
        user: Option<UserId>,
        list: Option<ListId>,
        mode: StudyMode,
        cards: Vec<Flashcard>,
        use_all: bool,
    ) -> StudySession {
        let mut ids: Vec<CardId> = cards.iter().map(|c| c.id).collect();
        let (order, rounds) = if mode.is_linear() {
            (ids, None)
        } else {
            let mut rng = SmallRng::from_entropy();
            ids.shuffle(&mut rng);
            let cap = if use_all { ids.len().max(1) } else { ROUND_SIZE };
            let order: Vec<CardId> = ids.iter().take(cap).copied().collect();
            let scheduler = RoundScheduler::with_round_size(ids.into_iter().skip(cap), cap);
            (order, Some(scheduler))
        };

        let mut cursor = 0;
        let mut results: HashMap<CardId, StudyResult> = HashMap::new();
        let mut local = None;
        if mode.is_linear() {
            if let (Some(list), Some(store)) = (list, self.checkpoints.clone()) {
                match store.load(list).await {
                    Ok(Some(cp)) => {
                        cursor = cp.position.min(order.len().saturating_sub(1));
                        for id in cp.known {
                            if order.contains(&id) {
                                let mut r = StudyResult::new(id);
                                r.apply(Verdict::Correct);
                                results.insert(id, r);
                            }
                        }
                        debug!(%list, index = cursor, "restored local checkpoint");
                    }
                    Ok(None) => {}
                    Err(err) => warn!(%err, "checkpoint restore failed"),
                }
                local = Some((store, list));
            }
        }

        let recorder = match (user, list) {
            (Some(u), Some(l)) => Some(ProgressRecorder::new(self.progress.clone(), u, l)),
            _ => None,
        };
        StudySession::from_parts(SessionParts {
            id: Uuid::new_v4(),
            user,
            list,
            mode,
            cards: cards.into_iter().map(|c| (c.id, c)).collect(),
            order,
            cursor,
            results,
            rounds,
            recorder,
            mirror: local.map(|l| SessionMirror::new(None, Some(l))),
            rewards: self.rewards.clone(),
        })
    }

    /// Shuffle, then stable-sort by descending lifetime incorrect
    /// count. With history unavailable the shuffle order stands.
    async fn rank_by_history(&self, user: UserId, list: ListId, ids: Vec<CardId>) -> Vec<CardId> {
        let mut ranked = ids;
        if ranked.is_empty() {
            return ranked;
        }
        let mut rng = SmallRng::from_entropy();
        ranked.shuffle(&mut rng);
        let counts: HashMap<CardId, u32> = match self.progress.aggregates(user, list, &ranked).await
        {
            Ok(rows) => rows
                .into_iter()
                .map(|a| (a.flashcard_id, a.incorrect_count))
                .collect(),
            Err(err) => {
                warn!(%err, "progress history unavailable; keeping shuffle order");
                return ranked;
            }
        };
        ranked.sort_by_key(|id| Reverse(counts.get(id).copied().unwrap_or(0)));
        ranked
    }
}
