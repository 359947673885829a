//! Snapshot source: key derivation + resilient read + decode.
//!
//! Holds no state between calls. Every read goes through
//! `retry_with_backoff`; decoding happens after the read and is never retried.

use crate::battle::{BattleId, BattleSnapshot};
use crate::market::MarketSnapshot;
use crate::onchain::keys::{LookupKey, OwnerKey};
use crate::onchain::types::{BattleAccount, LedgerError, MarketAccount, PositionAccount};
use crate::positions::Position;
use crate::retry::{retry_with_backoff, FetchError, RetryPolicy};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

/// Raw account reads by lookup key.
#[allow(async_fn_in_trait)]
pub trait LedgerReader {
    async fn read_account(&self, key: &LookupKey) -> Result<Value, LedgerError>;
}

/// Account reads over the HTTP account endpoint: `GET {base}/accounts/{hex_key}`.
#[derive(Clone)]
pub struct HttpLedger {
    base_url: String,
    http: Client,
}

impl HttpLedger {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, http: Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    fn account_url(&self, key: &LookupKey) -> String {
        format!("{}/accounts/{}", self.base_url, key.to_hex())
    }
}

impl LedgerReader for HttpLedger {
    async fn read_account(&self, key: &LookupKey) -> Result<Value, LedgerError> {
        let resp = self
            .http
            .get(self.account_url(key))
            .send()
            .await
            .map_err(|e| LedgerError::from_message(format!("request for {key} failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| LedgerError::from_message(format!("reading body for {key} failed: {e}")))?;
        account_body(key, status, &body)
    }
}

/// Map one account endpoint response onto an account body or a classified error.
fn account_body(key: &LookupKey, status: StatusCode, body: &str) -> Result<Value, LedgerError> {
    if status == StatusCode::NOT_FOUND {
        return Err(LedgerError::NotFound(key.to_string()));
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(LedgerError::RateLimited(format!("{status} for {key}")));
    }
    if !status.is_success() {
        return Err(LedgerError::from_message(format!("{status}: {body}")));
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|e| LedgerError::Other(format!("malformed account body for {key}: {e}")))?;

    // JSON-RPC style gateways report failures in-band with a 200.
    if let Some(err) = value.get("error") {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| err.to_string(), str::to_string);
        return Err(LedgerError::from_message(message));
    }

    Ok(value)
}

/// Typed, retried reads of battle, market and position accounts.
#[derive(Clone)]
pub struct SnapshotSource<L> {
    reader: L,
    policy: RetryPolicy,
}

impl<L: LedgerReader> SnapshotSource<L> {
    pub fn new(reader: L, policy: RetryPolicy) -> Self {
        Self { reader, policy }
    }

    pub fn reader(&self) -> &L {
        &self.reader
    }

    async fn read<A: DeserializeOwned>(&self, key: &LookupKey) -> Result<A, FetchError> {
        let value = retry_with_backoff(self.policy, || self.reader.read_account(key)).await?;
        serde_json::from_value(value)
            .map_err(|e| FetchError::Other(format!("failed to decode {} account: {e}", key.namespace())))
    }

    pub async fn fetch_battle(&self, battle_id: BattleId) -> Result<BattleSnapshot, FetchError> {
        let account: BattleAccount = self.read(&LookupKey::battle(battle_id)).await?;
        let snapshot =
            BattleSnapshot::try_from(account).map_err(|e| FetchError::Other(format!("battle {battle_id}: {e}")))?;
        debug!(battle_id = battle_id, snapshot = %snapshot, "battle snapshot");
        Ok(snapshot)
    }

    pub async fn fetch_market(&self, battle_id: BattleId) -> Result<MarketSnapshot, FetchError> {
        let account: MarketAccount = self.read(&LookupKey::market(battle_id)).await?;
        MarketSnapshot::try_from(account).map_err(|e| FetchError::Other(format!("market {battle_id}: {e}")))
    }

    pub async fn fetch_position(
        &self,
        battle_id: BattleId,
        owner: &OwnerKey,
        creature: u8,
    ) -> Result<Position, FetchError> {
        let account: PositionAccount = self.read(&LookupKey::position(battle_id, owner, creature)).await?;
        account
            .decode(creature)
            .map_err(|e| FetchError::Other(format!("position {battle_id}/{creature}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::fixtures::fresh;
    use crate::onchain::memory::MemoryLedger;
    use serde_json::json;
    use std::time::Duration;

    fn source(ledger: &MemoryLedger) -> SnapshotSource<MemoryLedger> {
        SnapshotSource::new(ledger.clone(), RetryPolicy::new(2, Duration::from_millis(10)))
    }

    #[test]
    fn test_account_url() {
        let ledger = HttpLedger::new("http://localhost:8899/");
        assert_eq!(
            ledger.account_url(&LookupKey::battle(1)),
            "http://localhost:8899/accounts/626174746c650100000000000000"
        );
    }

    #[test]
    fn test_account_body_status_mapping() {
        let key = LookupKey::battle(1);

        assert!(matches!(
            account_body(&key, StatusCode::NOT_FOUND, ""),
            Err(LedgerError::NotFound(_))
        ));
        assert!(matches!(
            account_body(&key, StatusCode::TOO_MANY_REQUESTS, ""),
            Err(LedgerError::RateLimited(_))
        ));
        // other statuses are classified by their body text
        assert!(matches!(
            account_body(&key, StatusCode::SERVICE_UNAVAILABLE, "Too many requests for a specific RPC call"),
            Err(LedgerError::RateLimited(_))
        ));
        assert!(matches!(
            account_body(&key, StatusCode::BAD_REQUEST, "could not find account"),
            Err(LedgerError::NotFound(_))
        ));
        assert!(matches!(
            account_body(&key, StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            Err(LedgerError::Other(_))
        ));
    }

    #[test]
    fn test_account_body_on_success() {
        let key = LookupKey::battle(1);

        assert_eq!(
            account_body(&key, StatusCode::OK, r#"{"currentTurn": 3}"#),
            Ok(json!({ "currentTurn": 3 }))
        );
        assert!(matches!(
            account_body(&key, StatusCode::OK, "<html>"),
            Err(LedgerError::Other(_))
        ));
        assert!(matches!(
            account_body(&key, StatusCode::OK, r#"{"error": {"code": -32000, "message": "Account does not exist"}}"#),
            Err(LedgerError::NotFound(_))
        ));
        assert!(matches!(
            account_body(&key, StatusCode::OK, r#"{"error": "429 Too Many Requests"}"#),
            Err(LedgerError::RateLimited(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_battle() {
        let ledger = MemoryLedger::new();
        ledger.insert_battle(4, &fresh(3));

        let snapshot = source(&ledger).fetch_battle(4).await.unwrap();
        assert_eq!(snapshot, fresh(3));
        assert_eq!(ledger.reads(), 1);
    }

    #[tokio::test]
    async fn test_missing_battle_is_not_found() {
        let ledger = MemoryLedger::new();
        let err = source(&ledger).fetch_battle(4).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_is_retried_through_source() {
        let ledger = MemoryLedger::new();
        ledger.insert_battle(4, &fresh(3));
        ledger.fail_next(LedgerError::RateLimited("429".into()));

        assert_eq!(source(&ledger).fetch_battle(4).await, Ok(fresh(3)));
        assert_eq!(ledger.reads(), 2);
    }

    #[tokio::test]
    async fn test_decode_failure_is_other() {
        let ledger = MemoryLedger::new();
        ledger.insert(&LookupKey::battle(4), json!({ "currentTurn": 1 }));

        let err = source(&ledger).fetch_battle(4).await.unwrap_err();
        assert!(matches!(err, FetchError::Other(_)));
        // decode errors are not retried
        assert_eq!(ledger.reads(), 1);
    }
}
