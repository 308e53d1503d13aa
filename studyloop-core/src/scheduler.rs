use crate::{CardId, RoundSummary, Verdict, ROUND_SIZE};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{HashMap, VecDeque};

/// Round scheduler for the bounded quiz modes.
///
/// Tracks two session-scoped pools: cards never presented, and cards
/// answered wrong that have not been corrected since. Rounds are dealt
/// missed-first up to the round size; priority only decides which ids
/// are included, the presentation order inside a round is a uniform
/// shuffle.
pub struct RoundScheduler {
    unseen: VecDeque<CardId>,
    missed: VecDeque<CardId>,
    round: u32,
    round_size: usize,
    round_results: HashMap<CardId, Verdict>,
    rng: SmallRng,
}

impl RoundScheduler {
    pub fn new(unseen: impl IntoIterator<Item = CardId>) -> Self {
        Self::with_rng(unseen, ROUND_SIZE, SmallRng::from_entropy())
    }

    pub fn with_round_size(unseen: impl IntoIterator<Item = CardId>, round_size: usize) -> Self {
        Self::with_rng(unseen, round_size, SmallRng::from_entropy())
    }

    /// Seeded variant for reproducible rounds.
    pub fn with_seed(
        unseen: impl IntoIterator<Item = CardId>,
        round_size: usize,
        seed: u64,
    ) -> Self {
        Self::with_rng(unseen, round_size, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(unseen: impl IntoIterator<Item = CardId>, round_size: usize, rng: SmallRng) -> Self {
        Self {
            unseen: unseen.into_iter().collect(),
            missed: VecDeque::new(),
            round: 1,
            round_size: round_size.max(1),
            round_results: HashMap::new(),
            rng,
        }
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn unseen_len(&self) -> usize {
        self.unseen.len()
    }

    pub fn missed_len(&self) -> usize {
        self.missed.len()
    }

    /// Both pools drained. Completion is still confirmed by
    /// [`next_round`](Self::next_round) coming back empty, not by this
    /// flag alone.
    pub fn is_exhausted(&self) -> bool {
        self.unseen.is_empty() && self.missed.is_empty()
    }

    /// Pool bookkeeping for one recorded answer. A wrong answer queues
    /// the card for a later round exactly once; answering it correctly
    /// before that round is dealt cancels the pending repeat. Skips
    /// touch neither pool.
    pub fn note_outcome(&mut self, id: CardId, verdict: Verdict) {
        match verdict {
            Verdict::Incorrect => {
                if !self.missed.contains(&id) {
                    self.missed.push_back(id);
                }
            }
            Verdict::Correct => {
                self.missed.retain(|c| *c != id);
            }
            Verdict::Skipped => {}
        }
        self.round_results.insert(id, verdict);
    }

    /// Deal the next round: up to `round_size` ids, missed cards first,
    /// backfilled from the unseen queue, shuffled as one set. An empty
    /// result means nothing is left to study.
    pub fn next_round(&mut self) -> Vec<CardId> {
        let take = self.round_size.min(self.missed.len() + self.unseen.len());
        let mut picked: Vec<CardId> = Vec::with_capacity(take);
        while picked.len() < self.round_size {
            match self.missed.pop_front() {
                Some(id) => picked.push(id),
                None => break,
            }
        }
        while picked.len() < self.round_size {
            match self.unseen.pop_front() {
                Some(id) => picked.push(id),
                None => break,
            }
        }
        if picked.is_empty() {
            return picked;
        }
        picked.shuffle(&mut self.rng);
        self.round += 1;
        self.round_results.clear();
        picked
    }

    /// Tally of the answers recorded since the current round started.
    pub fn round_summary(&self) -> RoundSummary {
        let mut summary = RoundSummary {
            round: self.round,
            studied: self.round_results.len(),
            unseen_remaining: self.unseen.len(),
            missed_remaining: self.missed.len(),
            ..RoundSummary::default()
        };
        for verdict in self.round_results.values() {
            match verdict {
                Verdict::Correct => summary.correct += 1,
                Verdict::Incorrect => summary.missed += 1,
                Verdict::Skipped => summary.skipped += 1,
            }
        }
        summary
    }
}
