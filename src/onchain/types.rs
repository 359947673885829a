//! Wire types for program accounts, and their normalization into plain values.
//!
//! RPC front-ends disagree on how large integers are serialized: some send JSON
//! numbers, some decimal strings, some `0x` hex (big-number `toJSON`). Every
//! integer goes through `WireInt` here so nothing past this module ever sees
//! the difference.

use crate::battle::{BattleSnapshot, Creature, CREATURE_COUNT};
use crate::market::MarketSnapshot;
use crate::onchain::keys::OwnerKey;
use crate::positions::Position;
use crate::retry::{classify_message, Classify, ErrorClass};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

/// Errors from a single raw account read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("account not found: {0}")]
    NotFound(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("ledger error: {0}")]
    Other(String),
}

impl LedgerError {
    /// Build an error from transport text, classifying it by content.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        match classify_message(&message) {
            ErrorClass::NotFound => LedgerError::NotFound(message),
            ErrorClass::RateLimited => LedgerError::RateLimited(message),
            ErrorClass::Other => LedgerError::Other(message),
        }
    }
}

impl Classify for LedgerError {
    fn class(&self) -> ErrorClass {
        match self {
            LedgerError::NotFound(_) => ErrorClass::NotFound,
            LedgerError::RateLimited(_) => ErrorClass::RateLimited,
            LedgerError::Other(_) => ErrorClass::Other,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("{field}: expected {expected} entries, got {got}")]
    Length {
        field: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("{field}: integer {value:?} out of range")]
    Range { field: &'static str, value: String },
    #[error("{field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// An integer as some RPC front-end chose to serialize it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum WireInt {
    Unsigned(u64),
    Signed(i64),
    Text(String),
}

impl WireInt {
    pub fn to_u128(&self, field: &'static str) -> Result<u128, DecodeError> {
        let range = |value: String| DecodeError::Range { field, value };
        match self {
            WireInt::Unsigned(v) => Ok(u128::from(*v)),
            WireInt::Signed(v) => u128::try_from(*v).map_err(|_| range(v.to_string())),
            WireInt::Text(s) => {
                let t = s.trim();
                let parsed = match t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
                    Some(hex) => u128::from_str_radix(hex, 16),
                    None => t.parse::<u128>(),
                };
                parsed.map_err(|_| range(s.clone()))
            }
        }
    }

    pub fn to_u64(&self, field: &'static str) -> Result<u64, DecodeError> {
        let wide = self.to_u128(field)?;
        u64::try_from(wide).map_err(|_| DecodeError::Range {
            field,
            value: wide.to_string(),
        })
    }
}

fn fixed<T: Clone>(field: &'static str, values: &[T]) -> Result<[T; CREATURE_COUNT], DecodeError> {
    <[T; CREATURE_COUNT]>::try_from(values.to_vec()).map_err(|v| DecodeError::Length {
        field,
        expected: CREATURE_COUNT,
        got: v.len(),
    })
}

fn fixed_ints(field: &'static str, values: &[WireInt]) -> Result<[u64; CREATURE_COUNT], DecodeError> {
    let values = fixed(field, values)?;
    let mut out = [0u64; CREATURE_COUNT];
    for (slot, v) in out.iter_mut().zip(values.iter()) {
        *slot = v.to_u64(field)?;
    }
    Ok(out)
}

// ─── Battle ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleAccount {
    pub current_turn: WireInt,
    pub creature_hp: Vec<WireInt>,
    pub creature_max_hp: Vec<WireInt>,
    pub is_alive: Vec<bool>,
    /// Early program versions did not store speed; missing means all zero.
    #[serde(default)]
    pub creature_speed: Option<Vec<WireInt>>,
    pub is_battle_over: bool,
    #[serde(default)]
    pub winner: Option<WireInt>,
}

impl TryFrom<BattleAccount> for BattleSnapshot {
    type Error = DecodeError;

    fn try_from(account: BattleAccount) -> Result<Self, Self::Error> {
        let hp = fixed_ints("creatureHp", &account.creature_hp)?;
        let max_hp = fixed_ints("creatureMaxHp", &account.creature_max_hp)?;
        let alive = fixed("isAlive", &account.is_alive)?;
        let speed = match &account.creature_speed {
            Some(speed) => fixed_ints("creatureSpeed", speed)?,
            None => [0; CREATURE_COUNT],
        };

        let mut creatures = [Creature {
            hp: 0,
            max_hp: 0,
            alive: false,
            speed: 0,
        }; CREATURE_COUNT];
        for (i, c) in creatures.iter_mut().enumerate() {
            *c = Creature {
                hp: hp[i],
                max_hp: max_hp[i],
                alive: alive[i],
                speed: speed[i],
            };
            if c.max_hp == 0 {
                return Err(DecodeError::Invalid {
                    field: "creatureMaxHp",
                    reason: format!("creature {i} has zero max hp"),
                });
            }
            // Dead creatures always sit at zero hp.
            if !c.alive && c.hp > 0 {
                return Err(DecodeError::Invalid {
                    field: "isAlive",
                    reason: format!("creature {i} is dead with {} hp", c.hp),
                });
            }
        }

        // The program leaves stale winner bytes around until the battle ends.
        let winner = match (&account.winner, account.is_battle_over) {
            (Some(w), true) => {
                let w = w.to_u64("winner")?;
                let index = usize::try_from(w)
                    .ok()
                    .filter(|i| *i < CREATURE_COUNT)
                    .ok_or_else(|| DecodeError::Range {
                        field: "winner",
                        value: w.to_string(),
                    })?;
                Some(index)
            }
            _ => None,
        };

        Ok(BattleSnapshot {
            turn: account.current_turn.to_u64("currentTurn")?,
            creatures,
            is_finished: account.is_battle_over,
            winner,
        })
    }
}

/// Account body for a battle, as the account endpoint serves it.
pub fn encode_battle(snapshot: &BattleSnapshot) -> Value {
    json!({
        "currentTurn": snapshot.turn,
        "creatureHp": snapshot.creatures.iter().map(|c| c.hp).collect::<Vec<_>>(),
        "creatureMaxHp": snapshot.creatures.iter().map(|c| c.max_hp).collect::<Vec<_>>(),
        "isAlive": snapshot.creatures.iter().map(|c| c.alive).collect::<Vec<_>>(),
        "creatureSpeed": snapshot.creatures.iter().map(|c| c.speed).collect::<Vec<_>>(),
        "isBattleOver": snapshot.is_finished,
        "winner": snapshot.winner,
    })
}

// ─── Market ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketAccount {
    pub creature0_pool: WireInt,
    pub creature1_pool: WireInt,
    pub creature2_pool: WireInt,
    pub creature3_pool: WireInt,
    pub creature0_shares: WireInt,
    pub creature1_shares: WireInt,
    pub creature2_shares: WireInt,
    pub creature3_shares: WireInt,
    pub total_pool: WireInt,
    pub k_constant: WireInt,
}

impl TryFrom<MarketAccount> for MarketSnapshot {
    type Error = DecodeError;

    fn try_from(m: MarketAccount) -> Result<Self, Self::Error> {
        Ok(MarketSnapshot {
            pools: [
                m.creature0_pool.to_u64("creature0Pool")?,
                m.creature1_pool.to_u64("creature1Pool")?,
                m.creature2_pool.to_u64("creature2Pool")?,
                m.creature3_pool.to_u64("creature3Pool")?,
            ],
            shares: [
                m.creature0_shares.to_u64("creature0Shares")?,
                m.creature1_shares.to_u64("creature1Shares")?,
                m.creature2_shares.to_u64("creature2Shares")?,
                m.creature3_shares.to_u64("creature3Shares")?,
            ],
            total_pool: m.total_pool.to_u64("totalPool")?,
            k_constant: m.k_constant.to_u128("kConstant")?,
        })
    }
}

pub fn encode_market(market: &MarketSnapshot) -> Value {
    json!({
        "creature0Pool": market.pools[0],
        "creature1Pool": market.pools[1],
        "creature2Pool": market.pools[2],
        "creature3Pool": market.pools[3],
        "creature0Shares": market.shares[0],
        "creature1Shares": market.shares[1],
        "creature2Shares": market.shares[2],
        "creature3Shares": market.shares[3],
        "totalPool": market.total_pool,
        // u128 does not fit a JSON number
        "kConstant": market.k_constant.to_string(),
    })
}

// ─── Position ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionAccount {
    pub user: String,
    pub amount: WireInt,
    #[serde(default)]
    pub claimed: bool,
}

impl PositionAccount {
    pub fn decode(self, creature: u8) -> Result<Position, DecodeError> {
        let owner: OwnerKey = self.user.parse().map_err(|e| DecodeError::Invalid {
            field: "user",
            reason: format!("{e}"),
        })?;
        Ok(Position {
            creature,
            owner,
            shares: self.amount.to_u64("amount")?,
            claimed: self.claimed,
        })
    }
}

pub fn encode_position(position: &Position) -> Value {
    json!({
        "user": position.owner.to_string(),
        "amount": position.shares,
        "claimed": position.claimed,
    })
}
