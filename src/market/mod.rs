//! Per-battle betting market state.
//!
//! Read-only mirror of the program's market account. Pricing and share
//! estimation live outside this crate; this only carries the pools.

use crate::battle::{creature_name, CREATURE_COUNT};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MarketSnapshot {
    /// Lamports staked per creature.
    pub pools: [u64; CREATURE_COUNT],
    /// Outstanding shares per creature.
    pub shares: [u64; CREATURE_COUNT],
    pub total_pool: u64,
    pub k_constant: u128,
}

impl MarketSnapshot {
    pub fn pool(&self, creature: usize) -> u64 {
        self.pools.get(creature).copied().unwrap_or(0)
    }

    /// Share of the total pool staked on `creature`, in basis points.
    pub fn pool_share_bps(&self, creature: usize) -> u64 {
        if self.total_pool == 0 {
            return 0;
        }
        let bps = u128::from(self.pool(creature)) * 10_000 / u128::from(self.total_pool);
        u64::try_from(bps).unwrap_or(u64::MAX)
    }
}

impl std::fmt::Display for MarketSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "total {}", self.total_pool)?;
        for (i, pool) in self.pools.iter().enumerate() {
            write!(f, " | {} {}", creature_name(i), pool)?;
        }
        Ok(())
    }
}
