use std::collections::HashSet;

use thiserror::Error;
use uuid::Uuid;

use crate::app::auth::AuthSession;
use crate::app::items::ItemService;
use crate::domain::item::Item;
use crate::domain::matching::{MatchCandidate, MatchId};
use crate::infra::db::Db;
use crate::infra::oracle::{
    MatchOracle, OracleError, Ranking, RankingCandidate, RankingTarget, MAX_RANKINGS,
};

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("item not found")]
    ItemNotFound,
    #[error("item belongs to another user")]
    NotOwner,
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[derive(Clone)]
pub struct MatchService {
    items: ItemService,
    oracle: MatchOracle,
}

impl MatchService {
    pub fn new(db: Db, oracle: MatchOracle) -> Self {
        Self {
            items: ItemService::new(db),
            oracle,
        }
    }

    /// Ranks the counterpart pool for an item the requester owns (admins may
    /// rank any item). Read-only: nothing is written, and an empty pool never
    /// reaches the oracle.
    pub async fn find_matches(
        &self,
        item_id: Uuid,
        requester: &AuthSession,
    ) -> Result<Vec<MatchCandidate>, MatchError> {
        let target = self
            .items
            .get(item_id)
            .await?
            .ok_or(MatchError::ItemNotFound)?;
        if target.user_id != requester.user_id && !requester.role.is_admin() {
            return Err(MatchError::NotOwner);
        }

        let pool = self.items.match_candidates(&target).await?;
        if pool.is_empty() {
            tracing::debug!(item_id = %target.id, "no match candidates, skipping oracle");
            return Ok(Vec::new());
        }

        let rankings = self.rank(&target, &pool).await?;
        let pool_ids: HashSet<Uuid> = pool.iter().map(|item| item.id).collect();
        let matches = select_matches(target.id, rankings, &pool_ids);

        tracing::info!(
            item_id = %target.id,
            pool = pool.len(),
            matches = matches.len(),
            "ranked match candidates"
        );
        Ok(matches)
    }

    async fn rank(&self, target: &Item, pool: &[Item]) -> Result<Vec<Ranking>, OracleError> {
        let ranking_target = RankingTarget {
            kind: target.kind(),
            title: &target.title,
            category: target.category,
            description: &target.description,
            location: &target.location,
        };
        let candidates: Vec<RankingCandidate<'_>> = pool
            .iter()
            .map(|item| RankingCandidate {
                id: item.id,
                title: &item.title,
                description: &item.description,
                location: &item.location,
            })
            .collect();

        self.oracle.rank(&ranking_target, &candidates).await
    }
}

/// Keeps the oracle's order, drops ids outside the pool and repeats, and
/// stops after the top entries.
pub fn select_matches(
    target_id: Uuid,
    rankings: Vec<Ranking>,
    pool_ids: &HashSet<Uuid>,
) -> Vec<MatchCandidate> {
    let mut seen = HashSet::new();
    rankings
        .into_iter()
        .filter(|ranking| pool_ids.contains(&ranking.item_id))
        .filter(|ranking| seen.insert(ranking.item_id))
        .take(MAX_RANKINGS)
        .map(|ranking| MatchCandidate {
            item_id: ranking.item_id,
            score: ranking.score.round().clamp(0.0, 100.0) as u8,
            reason: ranking.reason,
            match_id: MatchId::for_items(target_id, ranking.item_id),
        })
        .collect()
}
