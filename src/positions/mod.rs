//! Wallet positions and unclaimed winnings.
//!
//! Positions are per (battle, owner, creature) accounts. The program
//! pre-allocates some of them with an all-zero owner; those are treated as
//! absent. Winnings are paid pari-mutuel: a winning position is owed
//! `shares * total_pool / winning_pool`.

use crate::battle::{creature_name, BattleId, CREATURE_COUNT};
use crate::onchain::keys::OwnerKey;
use crate::onchain::source::{LedgerReader, SnapshotSource};
use crate::retry::FetchError;
use futures::future::join_all;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub creature: u8,
    pub owner: OwnerKey,
    pub shares: u64,
    pub claimed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnclaimedWinning {
    pub battle_id: BattleId,
    pub creature: u8,
    pub shares: u64,
    pub total_pool: u64,
    pub winning_pool: u64,
    pub estimated_payout: u64,
}

impl std::fmt::Display for UnclaimedWinning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "battle #{} {}: {} shares, ~{} lamports",
            self.battle_id,
            creature_name(usize::from(self.creature)),
            self.shares,
            self.estimated_payout
        )
    }
}

/// Pari-mutuel payout, rounded down. Zero when nobody backed the winner.
pub fn estimated_payout(shares: u64, winning_pool: u64, total_pool: u64) -> u64 {
    if winning_pool == 0 {
        return 0;
    }
    let owed = u128::from(shares) * u128::from(total_pool) / u128::from(winning_pool);
    u64::try_from(owed).unwrap_or(u64::MAX)
}

/// All live positions `owner` holds in one battle.
pub async fn fetch_positions<L: LedgerReader>(
    source: &SnapshotSource<L>,
    battle_id: BattleId,
    owner: &OwnerKey,
) -> Result<Vec<Position>, FetchError> {
    let reads = (0..CREATURE_COUNT as u8).map(|creature| source.fetch_position(battle_id, owner, creature));

    let mut positions = Vec::new();
    for result in join_all(reads).await {
        match result {
            Ok(p) if !p.owner.is_default() => positions.push(p),
            Ok(_) | Err(FetchError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(positions)
}

/// Walk the last `lookback` battles up to `current` for winnings `owner` has
/// not claimed. A battle that fails to read is skipped, not fatal.
pub async fn scan_unclaimed<L: LedgerReader>(
    source: &SnapshotSource<L>,
    current: BattleId,
    owner: &OwnerKey,
    lookback: u64,
) -> Vec<UnclaimedWinning> {
    let start = current.saturating_sub(lookback.saturating_sub(1));
    let mut winnings = Vec::new();

    for battle_id in start..=current {
        match scan_battle(source, battle_id, owner).await {
            Ok(Some(w)) => {
                info!(winning = %w, "unclaimed winnings");
                winnings.push(w);
            }
            Ok(None) => {}
            Err(e) => debug!(battle_id = battle_id, error = %e, "skipping battle in winnings scan"),
        }
    }

    winnings
}

async fn scan_battle<L: LedgerReader>(
    source: &SnapshotSource<L>,
    battle_id: BattleId,
    owner: &OwnerKey,
) -> Result<Option<UnclaimedWinning>, FetchError> {
    let battle = source.fetch_battle(battle_id).await?;
    // Draws and running battles pay nobody.
    let Some(winner) = battle.winner.filter(|_| battle.is_finished) else {
        return Ok(None);
    };
    let Ok(creature) = u8::try_from(winner) else {
        return Ok(None);
    };

    let position = match source.fetch_position(battle_id, owner, creature).await {
        Ok(p) => p,
        Err(FetchError::NotFound(_)) => return Ok(None),
        Err(e) => return Err(e),
    };
    if position.owner.is_default() || position.claimed || position.shares == 0 {
        return Ok(None);
    }

    let market = source.fetch_market(battle_id).await?;
    let winning_pool = market.pool(winner);

    Ok(Some(UnclaimedWinning {
        battle_id,
        creature,
        shares: position.shares,
        total_pool: market.total_pool,
        winning_pool,
        estimated_payout: estimated_payout(position.shares, winning_pool, market.total_pool),
    }))
}
