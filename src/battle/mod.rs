//! Battle state as observed from the ledger, and what we infer from it.
//!
//! - `BattleSnapshot`: one immutable poll result, already normalized
//! - `events`: diffs two consecutive snapshots into a probable event log
//! - `log`: the bounded, time-decayed window the derived events land in

pub mod events;
pub mod log;

pub use events::{derive, BattleEvent, EventKind};
pub use log::{EventLog, LoggedEvent};

/// Ledger-side battle identifier.
pub type BattleId = u64;

/// Every battle has exactly four creatures.
pub const CREATURE_COUNT: usize = 4;

/// Display names, indexed by creature slot.
pub const CREATURE_NAMES: [&str; CREATURE_COUNT] = ["YETI", "MAPINGUARI", "ZMEY", "NAGA"];

/// Display name for a creature slot.
pub fn creature_name(index: usize) -> &'static str {
    CREATURE_NAMES.get(index).copied().unwrap_or("UNKNOWN")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Creature {
    pub hp: u64,
    pub max_hp: u64,
    pub alive: bool,
    /// Only used to break attribution ties.
    pub speed: u64,
}

/// Full observable state of one battle at one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BattleSnapshot {
    pub turn: u64,
    pub creatures: [Creature; CREATURE_COUNT],
    pub is_finished: bool,
    /// Only meaningful once finished. `None` is a draw.
    pub winner: Option<usize>,
}

impl BattleSnapshot {
    pub fn alive_count(&self) -> usize {
        self.creatures.iter().filter(|c| c.alive).count()
    }

    /// True when `self` cannot follow `previous` in one battle: the turn went
    /// back, a finished battle reopened, a dead creature revived, or hp grew.
    /// Lagging RPC nodes serve such snapshots.
    pub fn regresses_from(&self, previous: &BattleSnapshot) -> bool {
        if self.turn < previous.turn || (previous.is_finished && !self.is_finished) {
            return true;
        }
        previous
            .creatures
            .iter()
            .zip(self.creatures.iter())
            .any(|(before, after)| (!before.alive && after.alive) || after.hp > before.hp)
    }
}

impl std::fmt::Display for BattleSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "turn {} hp [", self.turn)?;
        for (i, c) in self.creatures.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", c.hp)?;
            if !c.alive {
                write!(f, "x")?;
            }
        }
        write!(f, "]")?;
        if self.is_finished {
            match self.winner {
                Some(w) => write!(f, " winner {}", creature_name(w))?,
                None => write!(f, " draw")?,
            }
        }
        Ok(())
    }
}
