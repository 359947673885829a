//! In-memory ledger for tests and offline runs.

use crate::battle::{BattleId, BattleSnapshot};
use crate::market::MarketSnapshot;
use crate::onchain::keys::LookupKey;
use crate::onchain::source::LedgerReader;
use crate::onchain::types::{encode_battle, encode_market, encode_position, LedgerError};
use crate::positions::Position;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct Inner {
    accounts: HashMap<Vec<u8>, Value>,
    /// Returned, in order, by the next reads regardless of key.
    failures: VecDeque<LedgerError>,
    reads: usize,
}

/// Shared handle: clones see the same accounts.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert(&self, key: &LookupKey, body: Value) {
        self.lock().accounts.insert(key.to_bytes(), body);
    }

    pub fn remove(&self, key: &LookupKey) {
        self.lock().accounts.remove(&key.to_bytes());
    }

    pub fn insert_battle(&self, battle_id: BattleId, snapshot: &BattleSnapshot) {
        self.insert(&LookupKey::battle(battle_id), encode_battle(snapshot));
    }

    pub fn insert_market(&self, battle_id: BattleId, market: &MarketSnapshot) {
        self.insert(&LookupKey::market(battle_id), encode_market(market));
    }

    pub fn insert_position(&self, battle_id: BattleId, position: &Position) {
        let key = LookupKey::position(battle_id, &position.owner, position.creature);
        self.insert(&key, encode_position(position));
    }

    /// Queue an error for the next read.
    pub fn fail_next(&self, err: LedgerError) {
        self.lock().failures.push_back(err);
    }

    /// Reads served so far, failed ones included.
    pub fn reads(&self) -> usize {
        self.lock().reads
    }
}

impl LedgerReader for MemoryLedger {
    async fn read_account(&self, key: &LookupKey) -> Result<Value, LedgerError> {
        let mut inner = self.lock();
        inner.reads += 1;
        if let Some(err) = inner.failures.pop_front() {
            return Err(err);
        }
        inner
            .accounts
            .get(&key.to_bytes())
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("Account does not exist {key}")))
    }
}
