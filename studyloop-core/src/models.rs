use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type CardId = Uuid;
pub type ListId = Uuid;
pub type UserId = Uuid;
pub type SessionId = Uuid;

/// Cards presented per round in the bounded quiz modes.
pub const ROUND_SIZE: usize = 10;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StudyMode {
    Flip,
    Write,
    Choice,
    Unscramble,
}

impl StudyMode {
    /// Flip browses the whole sequence in one linear pass; every other
    /// mode studies in bounded rounds.
    pub fn is_linear(&self) -> bool {
        matches!(self, StudyMode::Flip)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Flashcard {
    pub id: CardId,
    pub front: String,
    pub back: String,
    pub hint: Option<String>,
    pub variants: Vec<String>,
}

impl Flashcard {
    pub fn new(front: impl Into<String>, back: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            front: front.into(),
            back: back.into(),
            hint: None,
            variants: Vec::new(),
        }
    }
}

/// How the current card was answered. Skips are remembered in the
/// session result but never counted as studied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Correct,
    Incorrect,
    Skipped,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StudyResult {
    pub flashcard_id: CardId,
    pub correct: bool,
    pub skipped: bool,
    pub attempts: u32,
}

impl StudyResult {
    pub fn new(flashcard_id: CardId) -> Self {
        Self {
            flashcard_id,
            correct: false,
            skipped: false,
            attempts: 0,
        }
    }

    /// One logical entry per card per session: a repeat attempt mutates
    /// the entry in place and the flags reflect the latest verdict.
    pub fn apply(&mut self, verdict: Verdict) {
        self.attempts += 1;
        self.correct = verdict == Verdict::Correct;
        self.skipped = verdict == Verdict::Skipped;
    }
}

/// Durable session row: the resumable part of a study session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub list_id: ListId,
    pub mode: StudyMode,
    pub cards_order: Vec<CardId>,
    pub current_index: usize,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: UserId, list_id: ListId, mode: StudyMode, cards_order: Vec<CardId>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            list_id,
            mode,
            cards_order,
            current_index: 0,
            completed: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Lifetime per-card counters for one user, bumped batch-wise by the
/// progress recorder and read back to front-load error-prone cards.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgressAggregate {
    pub user_id: UserId,
    pub flashcard_id: CardId,
    pub list_id: ListId,
    pub correct_count: u32,
    pub incorrect_count: u32,
    pub last_reviewed: DateTime<Utc>,
}

/// One buffered outcome on its way to the progress store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CardOutcome {
    pub flashcard_id: CardId,
    pub correct: bool,
    pub at: DateTime<Utc>,
}

/// Device-local continuity record for a list: where the linear pass
/// stood and which cards were already answered correctly.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Checkpoint {
    pub position: usize,
    pub known: Vec<CardId>,
    pub saved_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RoundSummary {
    pub round: u32,
    pub studied: usize,
    pub correct: usize,
    pub missed: usize,
    pub skipped: usize,
    pub unseen_remaining: usize,
    pub missed_remaining: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub rounds: u32,
    pub cards_studied: usize,
    pub correct: usize,
    pub missed: usize,
    pub skipped: usize,
}
