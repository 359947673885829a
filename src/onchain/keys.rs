//! Lookup keys for program accounts.
//!
//! A key is the seed list the program derives its account addresses from:
//! an ASCII namespace tag, then (where applicable) the battle id as 8
//! little-endian bytes, then for positions the owner's public key and one
//! creature-index byte. The byte layout is a contract with the program and
//! must not change.

use crate::battle::BattleId;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const BATTLE_SEED: &[u8] = b"battle";
pub const MARKET_SEED: &[u8] = b"market";
pub const POSITION_SEED: &[u8] = b"position";
pub const GLOBAL_SEED: &[u8] = b"global";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Battle,
    Market,
    Position,
    Global,
}

impl Namespace {
    pub fn tag(self) -> &'static [u8] {
        match self {
            Namespace::Battle => BATTLE_SEED,
            Namespace::Market => MARKET_SEED,
            Namespace::Position => POSITION_SEED,
            Namespace::Global => GLOBAL_SEED,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Battle => write!(f, "battle"),
            Namespace::Market => write!(f, "market"),
            Namespace::Position => write!(f, "position"),
            Namespace::Global => write!(f, "global"),
        }
    }
}

/// Battle id seed. Identical to the i64 two's-complement encoding for every
/// id the program can issue.
pub fn battle_id_seed(battle_id: BattleId) -> [u8; 8] {
    battle_id.to_le_bytes()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LookupKey {
    namespace: Namespace,
    seeds: Vec<Vec<u8>>,
}

impl LookupKey {
    pub fn battle(battle_id: BattleId) -> Self {
        Self {
            namespace: Namespace::Battle,
            seeds: vec![BATTLE_SEED.to_vec(), battle_id_seed(battle_id).to_vec()],
        }
    }

    pub fn market(battle_id: BattleId) -> Self {
        Self {
            namespace: Namespace::Market,
            seeds: vec![MARKET_SEED.to_vec(), battle_id_seed(battle_id).to_vec()],
        }
    }

    pub fn position(battle_id: BattleId, owner: &OwnerKey, creature: u8) -> Self {
        Self {
            namespace: Namespace::Position,
            seeds: vec![
                POSITION_SEED.to_vec(),
                battle_id_seed(battle_id).to_vec(),
                owner.as_bytes().to_vec(),
                vec![creature],
            ],
        }
    }

    pub fn global() -> Self {
        Self {
            namespace: Namespace::Global,
            seeds: vec![GLOBAL_SEED.to_vec()],
        }
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn seeds(&self) -> &[Vec<u8>] {
        &self.seeds
    }

    /// All seeds concatenated.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.seeds.concat()
    }

    /// Lowercase hex of `to_bytes`, the form the account endpoint takes.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.to_hex())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("owner key must be 64 hex chars, got {0}")]
    Length(usize),
    #[error("owner key is not valid hex")]
    Hex,
}

/// A 32-byte account owner (wallet public key).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OwnerKey([u8; 32]);

impl OwnerKey {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The all-zero key the program writes into never-initialized positions.
    pub fn is_default(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl FromStr for OwnerKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix("0x").unwrap_or(s);
        if s.len() != 64 {
            return Err(KeyError::Length(s.len()));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| KeyError::Hex)?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_battle_key_layout() {
        let key = LookupKey::battle(102);
        assert_eq!(key.namespace(), Namespace::Battle);
        assert_eq!(
            key.to_bytes(),
            vec![b'b', b'a', b't', b't', b'l', b'e', 102, 0, 0, 0, 0, 0, 0, 0]
        );
        assert_eq!(key.to_hex(), "626174746c656600000000000000");
        assert_eq!(key.seeds().len(), 2);
    }

    #[test]
    fn test_battle_id_is_little_endian() {
        assert_eq!(battle_id_seed(0x0102), [0x02, 0x01, 0, 0, 0, 0, 0, 0]);
        assert_eq!(battle_id_seed(0), [0; 8]);
        // matches the signed encoding
        assert_eq!(battle_id_seed(7), 7i64.to_le_bytes());
    }

    #[test]
    fn test_market_and_global_keys() {
        let market = LookupKey::market(5);
        assert_eq!(&market.to_bytes()[..6], b"market");
        assert_eq!(&market.to_bytes()[6..], &5u64.to_le_bytes());
        assert_eq!(LookupKey::global().to_bytes(), b"global".to_vec());
    }

    #[test]
    fn test_position_key_layout() {
        let owner = OwnerKey::new([0xab; 32]);
        let key = LookupKey::position(3, &owner, 2);
        let bytes = key.to_bytes();

        assert_eq!(bytes.len(), 8 + 8 + 32 + 1);
        assert_eq!(&bytes[..8], b"position");
        assert_eq!(&bytes[8..16], &3u64.to_le_bytes());
        assert_eq!(&bytes[16..48], &[0xab; 32]);
        assert_eq!(bytes[48], 2);
        assert_eq!(key.seeds().len(), 4);
    }

    #[test]
    fn test_owner_key_parse() {
        let hex = "ab".repeat(32);
        let owner: OwnerKey = hex.parse().unwrap();
        assert_eq!(owner, OwnerKey::new([0xab; 32]));
        assert_eq!(owner.to_string(), hex);

        let prefixed: OwnerKey = format!("0x{}", "00".repeat(32)).parse().unwrap();
        assert!(prefixed.is_default());

        assert_eq!("abcd".parse::<OwnerKey>(), Err(KeyError::Length(4)));
        assert_eq!("zz".repeat(32).parse::<OwnerKey>(), Err(KeyError::Hex));
        // uppercase is accepted, display is lowercase
        let upper: OwnerKey = "AB".repeat(32).parse().unwrap();
        assert_eq!(upper.to_string(), "ab".repeat(32));
    }
}
