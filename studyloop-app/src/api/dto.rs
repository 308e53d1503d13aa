use serde::{Deserialize, Serialize};
use uuid::Uuid;

use studyloop_core::{
    Flashcard, RoundSummary, SessionPhase, SessionSummary, Step, StudyMode, StudySession, Verdict,
};

use crate::content::CardIn;

#[derive(Deserialize)]
pub struct StartIn {
    pub user: Option<Uuid>,
    pub list_id: Option<Uuid>,
    pub mode: String,
    #[serde(default)]
    pub use_all_cards: bool,
    pub cards: Vec<CardIn>,
    #[serde(default)]
    pub starred: Option<Vec<Uuid>>,
}

#[derive(Deserialize)]
pub struct AnswerIn {
    pub verdict: String,
}

#[derive(Deserialize)]
pub struct NavigateIn {
    pub direction: String,
}

#[derive(Serialize)]
pub struct CardOut {
    pub id: Uuid,
    pub front: String,
    pub back: String,
    pub hint: Option<String>,
    pub variants: Vec<String>,
}

#[derive(Serialize)]
pub struct RoundOut {
    pub round: u32,
    pub studied: usize,
    pub correct: usize,
    pub missed: usize,
    pub skipped: usize,
    pub unseen_remaining: usize,
    pub missed_remaining: usize,
}

#[derive(Serialize)]
pub struct SummaryOut {
    pub rounds: u32,
    pub cards_studied: usize,
    pub correct: usize,
    pub missed: usize,
    pub skipped: usize,
}

#[derive(Serialize)]
pub struct SessionOut {
    pub id: Uuid,
    pub phase: &'static str,
    pub round: u32,
    pub index: usize,
    pub total: usize,
    pub durable: bool,
    pub unseen_remaining: usize,
    pub missed_remaining: usize,
    pub current: Option<CardOut>,
}

/// One step result: exactly one of `card`, `round`, `summary` is set,
/// matching `kind`.
#[derive(Serialize)]
pub struct StepOut {
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card: Option<CardOut>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round: Option<RoundOut>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<SummaryOut>,
}

pub fn parse_mode(s: &str) -> Option<StudyMode> {
    match s.to_lowercase().as_str() {
        "flip" => Some(StudyMode::Flip),
        "write" => Some(StudyMode::Write),
        "choice" => Some(StudyMode::Choice),
        "unscramble" => Some(StudyMode::Unscramble),
        _ => None,
    }
}

pub fn parse_verdict(s: &str) -> Option<Verdict> {
    match s.to_lowercase().as_str() {
        "correct" | "y" => Some(Verdict::Correct),
        "incorrect" | "n" => Some(Verdict::Incorrect),
        "skipped" | "skip" | "s" => Some(Verdict::Skipped),
        _ => None,
    }
}

pub fn session_out(s: &StudySession) -> SessionOut {
    let (index, total) = s.position();
    SessionOut {
        id: s.id(),
        phase: phase_str(s.phase()),
        round: s.round(),
        index,
        total,
        durable: s.is_durable(),
        unseen_remaining: s.unseen_remaining(),
        missed_remaining: s.missed_remaining(),
        current: s.current().map(card_out),
    }
}

/// After a `Step::Card` the cursor points at the stepped-to card, so
/// the full card comes straight off the session.
pub fn step_out(session: &StudySession, step: Step) -> StepOut {
    match step {
        Step::Card(_) => StepOut {
            kind: "card",
            card: session.current().map(card_out),
            round: None,
            summary: None,
        },
        Step::RoundComplete(s) => StepOut {
            kind: "round_complete",
            card: None,
            round: Some(round_out(s)),
            summary: None,
        },
        Step::Finished(s) => StepOut {
            kind: "finished",
            card: None,
            round: None,
            summary: Some(summary_out(s)),
        },
    }
}

fn card_out(card: &Flashcard) -> CardOut {
    CardOut {
        id: card.id,
        front: card.front.clone(),
        back: card.back.clone(),
        hint: card.hint.clone(),
        variants: card.variants.clone(),
    }
}

fn round_out(s: RoundSummary) -> RoundOut {
    RoundOut {
        round: s.round,
        studied: s.studied,
        correct: s.correct,
        missed: s.missed,
        skipped: s.skipped,
        unseen_remaining: s.unseen_remaining,
        missed_remaining: s.missed_remaining,
    }
}

fn summary_out(s: SessionSummary) -> SummaryOut {
    SummaryOut {
        rounds: s.rounds,
        cards_studied: s.cards_studied,
        correct: s.correct,
        missed: s.missed,
        skipped: s.skipped,
    }
}

fn phase_str(p: SessionPhase) -> &'static str {
    match p {
        SessionPhase::Active => "active",
        SessionPhase::RoundComplete => "round_complete",
        SessionPhase::Finished => "finished",
    }
}
