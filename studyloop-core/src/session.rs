use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::persist::{MirrorState, SessionMirror};
use crate::recorder::ProgressRecorder;
use crate::scheduler::RoundScheduler;
use crate::store::RewardSink;
use crate::{
    CardId, Flashcard, ListId, RoundSummary, SessionId, SessionSummary, StudyMode, StudyResult,
    UserId, Verdict,
};

/// Where the session stands. `RoundComplete` only occurs in the
/// bounded quiz modes, between exhausting one round and deciding on
/// the next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Active,
    RoundComplete,
    Finished,
}

/// Result of a step operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// The cursor now points at this card.
    Card(CardId),
    /// The round is exhausted; continuing is an explicit decision.
    RoundComplete(RoundSummary),
    Finished(SessionSummary),
}

pub(crate) struct SessionParts {
    pub id: SessionId,
    pub user: Option<UserId>,
    pub list: Option<ListId>,
    pub mode: StudyMode,
    pub cards: HashMap<CardId, Flashcard>,
    pub order: Vec<CardId>,
    pub cursor: usize,
    pub results: HashMap<CardId, StudyResult>,
    pub rounds: Option<RoundScheduler>,
    pub recorder: Option<ProgressRecorder>,
    pub mirror: Option<SessionMirror>,
    pub rewards: Option<Arc<dyn RewardSink>>,
}

/// A live study session.
///
/// Owns an exclusive copy of every mutable piece: cursor, pools,
/// results, write buffers. All operations work purely on memory and
/// report persistence trouble to the log instead of the caller, so
/// studying proceeds even when every store is down. While the phase is
/// `Active` the cursor always points inside the current order.
pub struct StudySession {
    id: SessionId,
    user: Option<UserId>,
    list: Option<ListId>,
    mode: StudyMode,
    cards: HashMap<CardId, Flashcard>,
    order: Vec<CardId>,
    cursor: usize,
    phase: SessionPhase,
    results: HashMap<CardId, StudyResult>,
    rounds: Option<RoundScheduler>,
    recorder: Option<ProgressRecorder>,
    mirror: Option<SessionMirror>,
    rewards: Option<Arc<dyn RewardSink>>,
    last_round_summary: Option<RoundSummary>,
}

impl StudySession {
    pub(crate) fn from_parts(parts: SessionParts) -> Self {
        let phase = if parts.order.is_empty() {
            SessionPhase::Finished
        } else {
            SessionPhase::Active
        };
        let cursor = parts.cursor.min(parts.order.len().saturating_sub(1));
        Self {
            id: parts.id,
            user: parts.user,
            list: parts.list,
            mode: parts.mode,
            cards: parts.cards,
            order: parts.order,
            cursor,
            phase,
            results: parts.results,
            rounds: parts.rounds,
            recorder: parts.recorder,
            mirror: parts.mirror,
            rewards: parts.rewards,
            last_round_summary: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn user(&self) -> Option<UserId> {
        self.user
    }

    pub fn list(&self) -> Option<ListId> {
        self.list
    }

    pub fn mode(&self) -> StudyMode {
        self.mode
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Whether this session is backed by a durable row.
    pub fn is_durable(&self) -> bool {
        self.mirror.as_ref().is_some_and(|m| m.is_durable())
    }

    /// Presentation order of the current round (or of the whole pass
    /// in linear mode).
    pub fn order(&self) -> &[CardId] {
        &self.order
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// (cursor, cards in the current order).
    pub fn position(&self) -> (usize, usize) {
        (self.cursor, self.order.len())
    }

    pub fn current(&self) -> Option<&Flashcard> {
        if self.phase != SessionPhase::Active {
            return None;
        }
        self.order.get(self.cursor).and_then(|id| self.cards.get(id))
    }

    pub fn round(&self) -> u32 {
        self.rounds.as_ref().map_or(1, |r| r.round())
    }

    pub fn unseen_remaining(&self) -> usize {
        self.rounds.as_ref().map_or(0, |r| r.unseen_len())
    }

    pub fn missed_remaining(&self) -> usize {
        self.rounds.as_ref().map_or(0, |r| r.missed_len())
    }

    /// Per-card results accumulated so far, one entry per card.
    pub fn results(&self) -> &HashMap<CardId, StudyResult> {
        &self.results
    }

    /// Summary of the round that just finished, while the phase is
    /// `RoundComplete`.
    pub fn round_summary(&self) -> Option<RoundSummary> {
        self.last_round_summary
    }

    pub fn summary(&self) -> SessionSummary {
        let mut s = SessionSummary {
            rounds: self.round(),
            cards_studied: self.results.len(),
            ..SessionSummary::default()
        };
        for r in self.results.values() {
            if r.skipped {
                s.skipped += 1;
            } else if r.correct {
                s.correct += 1;
            } else {
                s.missed += 1;
            }
        }
        s
    }

    /// Record the verdict for the current card, then advance. The write
    /// side is buffered; the step never waits on storage.
    pub async fn submit(&mut self, verdict: Verdict) -> Step {
        match self.phase {
            SessionPhase::Active => {}
            SessionPhase::RoundComplete => {
                return Step::RoundComplete(self.last_round_summary.unwrap_or_default())
            }
            SessionPhase::Finished => return Step::Finished(self.summary()),
        }
        let card = self.order[self.cursor];
        self.results
            .entry(card)
            .or_insert_with(|| StudyResult::new(card))
            .apply(verdict);
        if let Some(rounds) = self.rounds.as_mut() {
            rounds.note_outcome(card, verdict);
        }
        if verdict != Verdict::Skipped {
            if let Some(recorder) = &self.recorder {
                recorder.record(card, verdict == Verdict::Correct);
            }
        }
        if verdict == Verdict::Correct {
            self.award_correct(card);
        }
        self.step_forward().await
    }

    /// Move forward without recording anything (free browsing).
    pub async fn advance(&mut self) -> Step {
        match self.phase {
            SessionPhase::Active => self.step_forward().await,
            SessionPhase::RoundComplete => {
                Step::RoundComplete(self.last_round_summary.unwrap_or_default())
            }
            SessionPhase::Finished => Step::Finished(self.summary()),
        }
    }

    /// Move backward without recording; the cursor floors at zero.
    pub fn back(&mut self) -> usize {
        if self.phase == SessionPhase::Active && self.cursor > 0 {
            self.cursor -= 1;
            self.mirror_cursor();
        }
        self.cursor
    }

    /// The explicit continue decision after a completed round. Deals
    /// the next round, or confirms the session is done when dealing
    /// yields nothing.
    pub async fn next_round(&mut self) -> Step {
        match self.phase {
            SessionPhase::RoundComplete => {}
            SessionPhase::Active => return Step::Card(self.order[self.cursor]),
            SessionPhase::Finished => return Step::Finished(self.summary()),
        }
        let Some(rounds) = self.rounds.as_mut() else {
            return self.finish().await;
        };
        let next = rounds.next_round();
        if next.is_empty() {
            return self.finish().await;
        }
        self.order = next;
        self.cursor = 0;
        self.phase = SessionPhase::Active;
        self.last_round_summary = None;
        self.mirror_cursor();
        debug!(round = self.round(), cards = self.order.len(), "next round dealt");
        Step::Card(self.order[0])
    }

    /// Teardown mid-session: flush both buffers exactly once and stop
    /// their timers. A durable row stays resumable. Safe in any phase;
    /// finishing has already done all of this.
    pub async fn dispose(mut self) {
        if let Some(recorder) = self.recorder.take() {
            recorder.close().await;
        }
        if let Some(mirror) = self.mirror.take() {
            mirror.dispose().await;
        }
    }

    async fn step_forward(&mut self) -> Step {
        if self.cursor + 1 < self.order.len() {
            self.cursor += 1;
            self.mirror_cursor();
            return Step::Card(self.order[self.cursor]);
        }
        let Some(rounds) = self.rounds.as_ref() else {
            // Linear pass: the end of the order is the end of the session.
            return self.finish().await;
        };
        let summary = rounds.round_summary();
        self.phase = SessionPhase::RoundComplete;
        self.last_round_summary = Some(summary);
        debug!(
            round = summary.round,
            correct = summary.correct,
            missed = summary.missed,
            "round complete"
        );
        Step::RoundComplete(summary)
    }

    async fn finish(&mut self) -> Step {
        self.phase = SessionPhase::Finished;
        let summary = self.summary();
        if let Some(recorder) = self.recorder.take() {
            recorder.close().await;
        }
        if let Some(mirror) = self.mirror.take() {
            mirror.finish().await;
        }
        if let (Some(rewards), Some(user)) = (self.rewards.take(), self.user) {
            let list = self.list;
            tokio::spawn(async move {
                if let Err(err) = rewards.session_complete(user, list).await {
                    warn!(%err, "session completion reward failed");
                }
            });
        }
        debug!(
            rounds = summary.rounds,
            studied = summary.cards_studied,
            "session finished"
        );
        Step::Finished(summary)
    }

    fn award_correct(&self, card: CardId) {
        let (Some(rewards), Some(user)) = (self.rewards.clone(), self.user) else {
            return;
        };
        tokio::spawn(async move {
            if let Err(err) = rewards.correct_answer(user, card).await {
                warn!(%err, %card, "reward award failed");
            }
        });
    }

    fn mirror_cursor(&self) {
        if let Some(mirror) = &self.mirror {
            mirror.update(MirrorState {
                cards_order: self.order.clone(),
                current_index: self.cursor,
                known: self
                    .results
                    .values()
                    .filter(|r| r.correct)
                    .map(|r| r.flashcard_id)
                    .collect(),
            });
        }
    }
}
