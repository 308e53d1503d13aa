use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use studyloop_core::store::memory::{MemoryProgressStore, MemorySessionStore};
use studyloop_core::store::{ProgressStore, RewardSink, SessionStore};
use studyloop_core::{
    CardId, CardOutcome, CoreError, Flashcard, ListId, ProgressAggregate, Session,
    SessionInitializer, SessionPhase, StartRequest, Step, StudyMode, UserId, Verdict,
};
use uuid::Uuid;

fn deck(n: usize) -> Vec<Flashcard> {
    (0..n)
        .map(|i| Flashcard::new(format!("q{i}"), format!("a{i}")))
        .collect()
}

fn engine() -> SessionInitializer {
    SessionInitializer::new(
        Arc::new(MemorySessionStore::new()),
        Arc::new(MemoryProgressStore::new()),
    )
}

fn anonymous(mode: StudyMode, cards: Vec<Flashcard>) -> StartRequest {
    StartRequest {
        user: None,
        list_id: None,
        mode,
        cards,
        use_all_cards: false,
        favorites: None,
    }
}

#[tokio::test]
async fn bounded_session_opens_with_first_round() {
    let cards = deck(25);
    let all: HashSet<CardId> = cards.iter().map(|c| c.id).collect();
    let session = engine()
        .start_or_resume(anonymous(StudyMode::Write, cards))
        .await;

    assert_eq!(session.phase(), SessionPhase::Active);
    assert_eq!(session.round(), 1);
    assert_eq!(session.order().len(), 10);
    assert_eq!(session.unseen_remaining(), 15);
    assert_eq!(session.missed_remaining(), 0);
    assert!(!session.is_durable());

    let dealt: HashSet<CardId> = session.order().iter().copied().collect();
    assert_eq!(dealt.len(), 10);
    assert!(dealt.is_subset(&all));
}

#[tokio::test]
async fn missed_cards_lead_the_second_round() {
    let mut session = engine()
        .start_or_resume(anonymous(StudyMode::Write, deck(25)))
        .await;

    let mut missed = Vec::new();
    let mut corrected = Vec::new();
    for i in 0..10 {
        let id = session.current().unwrap().id;
        let verdict = if i < 3 {
            missed.push(id);
            Verdict::Incorrect
        } else {
            corrected.push(id);
            Verdict::Correct
        };
        let step = session.submit(verdict).await;
        if i < 9 {
            assert!(matches!(step, Step::Card(_)));
        } else {
            let Step::RoundComplete(s) = step else {
                panic!("expected the round to complete");
            };
            assert_eq!(s.studied, 10);
            assert_eq!(s.correct, 7);
            assert_eq!(s.missed, 3);
            assert_eq!(s.missed_remaining, 3);
        }
    }

    assert_eq!(session.phase(), SessionPhase::RoundComplete);
    assert!(matches!(session.next_round().await, Step::Card(_)));
    assert_eq!(session.round(), 2);
    assert_eq!(session.order().len(), 10);
    assert_eq!(session.cursor(), 0);

    let round2: HashSet<CardId> = session.order().iter().copied().collect();
    for id in &missed {
        assert!(round2.contains(id), "missed card must be re-dealt");
    }
    for id in &corrected {
        assert!(!round2.contains(id), "corrected card must not return");
    }
    assert_eq!(session.unseen_remaining(), 8);
}

#[tokio::test]
async fn completion_needs_the_empty_deal() {
    let mut session = engine()
        .start_or_resume(anonymous(StudyMode::Choice, deck(10)))
        .await;

    for _ in 0..10 {
        session.submit(Verdict::Correct).await;
    }
    // Pools are drained, but the session is not finished yet.
    assert_eq!(session.phase(), SessionPhase::RoundComplete);
    assert_eq!(session.unseen_remaining(), 0);
    assert_eq!(session.missed_remaining(), 0);

    let Step::Finished(summary) = session.next_round().await else {
        panic!("empty deal should finish the session");
    };
    assert_eq!(session.phase(), SessionPhase::Finished);
    assert_eq!(summary.cards_studied, 10);
    assert_eq!(summary.correct, 10);
    assert_eq!(summary.missed, 0);
    assert!(session.current().is_none());
}

#[tokio::test]
async fn retrying_one_card_keeps_one_result() {
    let cards = deck(1);
    let id = cards[0].id;
    let mut session = engine()
        .start_or_resume(anonymous(StudyMode::Write, cards))
        .await;

    assert!(matches!(session.submit(Verdict::Incorrect).await, Step::RoundComplete(_)));
    let Step::Card(dealt) = session.next_round().await else {
        panic!("missed card must come back");
    };
    assert_eq!(dealt, id);

    assert!(matches!(session.submit(Verdict::Correct).await, Step::RoundComplete(_)));
    let Step::Finished(summary) = session.next_round().await else {
        panic!("corrected card leaves nothing to deal");
    };

    assert_eq!(summary.cards_studied, 1);
    assert_eq!(summary.correct, 1);
    assert_eq!(summary.missed, 0);
    let result = &session.results()[&id];
    assert_eq!(result.attempts, 2);
    assert!(result.correct);
}

#[tokio::test]
async fn linear_pass_finishes_without_round_stops() {
    let cards = deck(4);
    let order: Vec<CardId> = cards.iter().map(|c| c.id).collect();
    let mut session = engine()
        .start_or_resume(anonymous(StudyMode::Flip, cards))
        .await;

    // Linear keeps the caller's order.
    assert_eq!(session.order(), &order[..]);

    for i in 0..3 {
        let step = session.submit(Verdict::Correct).await;
        assert_eq!(step, Step::Card(order[i + 1]));
    }
    let Step::Finished(summary) = session.submit(Verdict::Correct).await else {
        panic!("last card ends the linear pass");
    };
    assert_eq!(summary.rounds, 1);
    assert_eq!(summary.cards_studied, 4);
}

#[tokio::test]
async fn navigation_records_nothing_and_stays_in_bounds() {
    let mut session = engine()
        .start_or_resume(anonymous(StudyMode::Flip, deck(6)))
        .await;

    assert_eq!(session.back(), 0, "back floors at zero");
    session.advance().await;
    session.advance().await;
    assert_eq!(session.cursor(), 2);
    assert_eq!(session.back(), 1);
    assert!(session.results().is_empty());

    let (cursor, total) = session.position();
    assert!(cursor < total);
}

#[tokio::test]
async fn skips_count_separately_and_stay_out_of_pools() {
    let mut session = engine()
        .start_or_resume(anonymous(StudyMode::Write, deck(3)))
        .await;

    session.submit(Verdict::Skipped).await;
    session.submit(Verdict::Correct).await;
    session.submit(Verdict::Correct).await;
    assert_eq!(session.missed_remaining(), 0);

    let Step::Finished(summary) = session.next_round().await else {
        panic!("nothing left to deal");
    };
    assert_eq!(summary.cards_studied, 3);
    assert_eq!(summary.correct, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.missed, 0);
}

// ===== Scenario: anonymous browsing produces zero write traffic =====

#[derive(Default)]
struct CountingSessionStore {
    inner: MemorySessionStore,
    writes: AtomicUsize,
    reads: AtomicUsize,
}

#[async_trait]
impl SessionStore for CountingSessionStore {
    async fn create(&self, session: &Session) -> Result<(), CoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.create(session).await
    }
    async fn get(&self, id: Uuid) -> Result<Session, CoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get(id).await
    }
    async fn latest_incomplete(
        &self,
        user: UserId,
        list: ListId,
        mode: StudyMode,
    ) -> Result<Option<Session>, CoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.latest_incomplete(user, list, mode).await
    }
    async fn update_progress(
        &self,
        id: Uuid,
        cards_order: &[CardId],
        current_index: usize,
    ) -> Result<(), CoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.update_progress(id, cards_order, current_index).await
    }
    async fn mark_completed(&self, id: Uuid) -> Result<(), CoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.mark_completed(id).await
    }
}

#[derive(Default)]
struct CountingProgressStore {
    inner: MemoryProgressStore,
    writes: AtomicUsize,
}

#[async_trait]
impl ProgressStore for CountingProgressStore {
    async fn aggregates(
        &self,
        user: UserId,
        list: ListId,
        ids: &[CardId],
    ) -> Result<Vec<ProgressAggregate>, CoreError> {
        self.inner.aggregates(user, list, ids).await
    }
    async fn record_outcomes(
        &self,
        user: UserId,
        list: ListId,
        outcomes: &[CardOutcome],
    ) -> Result<(), CoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.record_outcomes(user, list, outcomes).await
    }
}

#[tokio::test(start_paused = true)]
async fn anonymous_browsing_touches_no_store() {
    let sessions = Arc::new(CountingSessionStore::default());
    let progress = Arc::new(CountingProgressStore::default());
    let init = SessionInitializer::new(sessions.clone(), progress.clone());

    let mut session = init
        .start_or_resume(anonymous(StudyMode::Flip, deck(8)))
        .await;
    for _ in 0..5 {
        session.advance().await;
    }
    session.back();
    session.back();
    assert_eq!(session.cursor(), 3, "position lives in ephemeral state");

    session.dispose().await;
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(sessions.writes.load(Ordering::SeqCst), 0);
    assert_eq!(sessions.reads.load(Ordering::SeqCst), 0);
    assert_eq!(progress.writes.load(Ordering::SeqCst), 0);
}

// ===== Rewards =====

#[derive(Default)]
struct CountingRewards {
    correct: AtomicUsize,
    complete: AtomicUsize,
}

#[async_trait]
impl RewardSink for CountingRewards {
    async fn correct_answer(&self, _user: UserId, _card: CardId) -> Result<(), CoreError> {
        self.correct.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    async fn session_complete(&self, _user: UserId, _list: Option<ListId>) -> Result<(), CoreError> {
        self.complete.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn correct_answers_and_completion_pay_out() {
    let rewards = Arc::new(CountingRewards::default());
    let init = SessionInitializer::new(
        Arc::new(MemorySessionStore::new()),
        Arc::new(MemoryProgressStore::new()),
    )
    .with_rewards(rewards.clone());

    let mut session = init
        .start_or_resume(StartRequest {
            user: Some(Uuid::new_v4()),
            list_id: Some(Uuid::new_v4()),
            mode: StudyMode::Write,
            cards: deck(2),
            use_all_cards: false,
            favorites: None,
        })
        .await;

    session.submit(Verdict::Correct).await;
    session.submit(Verdict::Incorrect).await;
    session.next_round().await;
    session.submit(Verdict::Correct).await;
    session.next_round().await;
    assert_eq!(session.phase(), SessionPhase::Finished);

    // Awards run on spawned tasks; give them a tick.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(rewards.correct.load(Ordering::SeqCst), 2);
    assert_eq!(rewards.complete.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn anonymous_sessions_never_pay_out() {
    let rewards = Arc::new(CountingRewards::default());
    let init = SessionInitializer::new(
        Arc::new(MemorySessionStore::new()),
        Arc::new(MemoryProgressStore::new()),
    )
    .with_rewards(rewards.clone());

    let mut session = init
        .start_or_resume(anonymous(StudyMode::Write, deck(2)))
        .await;
    session.submit(Verdict::Correct).await;
    session.submit(Verdict::Correct).await;
    session.next_round().await;

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(rewards.correct.load(Ordering::SeqCst), 0);
    assert_eq!(rewards.complete.load(Ordering::SeqCst), 0);
}
