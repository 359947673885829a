//! Current-battle hint.
//!
//! The battle bot exposes `GET /current-battle` -> `{ "battleId": <int> }`.
//! It is only an accelerator: every failure (timeout, non-2xx, bad body)
//! reads as "no hint" and the tracker falls back to ledger probing.

use crate::battle::BattleId;
use crate::onchain::types::WireInt;
use reqwest::Client;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_HINT_TIMEOUT: Duration = Duration::from_secs(5);

#[allow(async_fn_in_trait)]
pub trait HintSource {
    async fn current_battle_id(&self) -> Option<BattleId>;
}

/// A disabled hint is just `None`.
impl<H: HintSource> HintSource for Option<H> {
    async fn current_battle_id(&self) -> Option<BattleId> {
        match self {
            Some(hint) => hint.current_battle_id().await,
            None => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrentBattle {
    battle_id: WireInt,
}

#[derive(Clone)]
pub struct HttpHint {
    url: String,
    http: Client,
}

impl HttpHint {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: format!("{}/current-battle", base_url.trim_end_matches('/')),
            http,
        })
    }
}

impl HintSource for HttpHint {
    async fn current_battle_id(&self) -> Option<BattleId> {
        let resp = match self.http.get(&self.url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                debug!(url = %self.url, error = %e, "hint request failed");
                return None;
            }
        };

        if !resp.status().is_success() {
            debug!(url = %self.url, status = %resp.status(), "hint endpoint returned error");
            return None;
        }

        match resp.json::<CurrentBattle>().await {
            Ok(body) => match body.battle_id.to_u64("battleId") {
                Ok(id) => Some(id),
                Err(e) => {
                    debug!(error = %e, "hint battle id unusable");
                    None
                }
            },
            Err(e) => {
                debug!(error = %e, "malformed hint body");
                None
            }
        }
    }
}

/// A hint whose answer is set by hand. Clones share the value.
#[derive(Debug, Clone, Default)]
pub struct StaticHint {
    value: Arc<Mutex<Option<BattleId>>>,
}

impl StaticHint {
    pub fn new(value: Option<BattleId>) -> Self {
        Self {
            value: Arc::new(Mutex::new(value)),
        }
    }

    pub fn set(&self, value: Option<BattleId>) {
        *self.value.lock().unwrap_or_else(|p| p.into_inner()) = value;
    }
}

impl HintSource for StaticHint {
    async fn current_battle_id(&self) -> Option<BattleId> {
        *self.value.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hint_url() {
        let hint = HttpHint::new("http://bot.local:3001/", DEFAULT_HINT_TIMEOUT).unwrap();
        assert_eq!(hint.url, "http://bot.local:3001/current-battle");
    }

    #[test]
    fn test_body_forms() {
        let body: CurrentBattle = serde_json::from_str(r#"{"battleId": 104}"#).unwrap();
        assert_eq!(body.battle_id.to_u64("battleId"), Ok(104));
        let body: CurrentBattle = serde_json::from_str(r#"{"battleId": "104"}"#).unwrap();
        assert_eq!(body.battle_id.to_u64("battleId"), Ok(104));
        assert!(serde_json::from_str::<CurrentBattle>(r#"{"error": "Bot API returned error"}"#).is_err());
    }

    #[tokio::test]
    async fn test_static_and_disabled_hints() {
        let hint = StaticHint::new(Some(6));
        let shared = hint.clone();
        assert_eq!(hint.current_battle_id().await, Some(6));
        shared.set(None);
        assert_eq!(hint.current_battle_id().await, None);

        let disabled: Option<StaticHint> = None;
        assert_eq!(disabled.current_battle_id().await, None);
        assert_eq!(Some(StaticHint::new(Some(3))).current_battle_id().await, Some(3));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_no_hint() {
        // nothing listens on port 9 locally
        let hint = HttpHint::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
        assert_eq!(hint.current_battle_id().await, None);
    }
}
