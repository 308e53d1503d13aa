use async_trait::async_trait;
use tracing::{debug, info};

use studyloop_core::{CardId, CoreError, ListId, RewardSink, UserId};

/// Reward sink that just logs. Stands in for the points service the
/// deployed app awards through.
pub struct LogRewards;

#[async_trait]
impl RewardSink for LogRewards {
    async fn correct_answer(&self, user: UserId, card: CardId) -> Result<(), CoreError> {
        debug!(%user, %card, "correct answer");
        Ok(())
    }

    async fn session_complete(&self, user: UserId, list: Option<ListId>) -> Result<(), CoreError> {
        match list {
            Some(list) => info!(%user, %list, "session complete"),
            None => info!(%user, "session complete"),
        }
        Ok(())
    }
}
