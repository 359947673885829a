//! Battle lifecycle tracking.
//!
//! Owns "which battle are we watching" and everything retained about it:
//! - Discovery: hint endpoint first, otherwise probe the ledger upward from a
//!   baseline for the newest live battle
//! - Tracking: re-fetch the active battle every tick, derive events against
//!   the previous snapshot, feed the retention window
//! - Advancement: once the battle is finished, look for a strictly newer
//!   battle id and switch to it, dropping the retained snapshot and log
//!
//! All state is mutated from the poll loop only. Readers get clones through
//! `subscribe()` / `view()`, never a live reference.

use crate::battle::{derive, BattleEvent, BattleId, BattleSnapshot, EventLog, LoggedEvent};
use crate::config::TrackerConfig;
use crate::hint::HintSource;
use crate::onchain::source::{LedgerReader, SnapshotSource};
use crate::retry::FetchError;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    /// Looking for a battle, or waiting for a known id to materialize.
    Discovering,
    Tracking(BattleId),
    /// Battle finished, no successor yet. Polling continues.
    Idle { battle_id: BattleId },
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Uninitialized => write!(f, "UNINITIALIZED"),
            Phase::Discovering => write!(f, "DISCOVERING"),
            Phase::Tracking(id) => write!(f, "TRACKING(#{id})"),
            Phase::Idle { battle_id } => write!(f, "IDLE(#{battle_id})"),
        }
    }
}

/// Read-only copy of the tracker state, published after every tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerView {
    pub phase: Phase,
    pub battle_id: Option<BattleId>,
    pub snapshot: Option<BattleSnapshot>,
    /// Newest first.
    pub log: Vec<LoggedEvent>,
    /// Last surfaced failure; cleared by the next successful fetch.
    pub error: Option<String>,
}

/// Events emitted by the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEvent {
    Discovered { battle_id: BattleId },
    Derived { battle_id: BattleId, event: BattleEvent },
    Advanced { from: BattleId, to: BattleId },
    Error { battle_id: Option<BattleId>, message: String },
}

pub struct BattleTracker<L, H> {
    config: TrackerConfig,
    source: SnapshotSource<L>,
    hint: H,
    phase: Phase,
    battle_id: Option<BattleId>,
    last_snapshot: Option<BattleSnapshot>,
    log: EventLog,
    error: Option<String>,
    view_tx: watch::Sender<TrackerView>,
    event_tx: Option<mpsc::UnboundedSender<TrackerEvent>>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<L: LedgerReader, H: HintSource> BattleTracker<L, H> {
    pub fn new(config: TrackerConfig, log: EventLog, source: SnapshotSource<L>, hint: H) -> Self {
        let (view_tx, _) = watch::channel(TrackerView {
            phase: Phase::Uninitialized,
            battle_id: None,
            snapshot: None,
            log: Vec::new(),
            error: None,
        });
        Self {
            config,
            source,
            hint,
            phase: Phase::Uninitialized,
            battle_id: None,
            last_snapshot: None,
            log,
            error: None,
            view_tx,
            event_tx: None,
            shutdown: None,
        }
    }

    /// Emit `TrackerEvent`s on `tx`.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<TrackerEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Once `shutdown` reads `true`, results of in-flight reads are dropped.
    pub fn attach_shutdown(&mut self, shutdown: watch::Receiver<bool>) {
        self.shutdown = Some(shutdown);
    }

    pub fn subscribe(&self) -> watch::Receiver<TrackerView> {
        self.view_tx.subscribe()
    }

    pub fn view(&self) -> TrackerView {
        TrackerView {
            phase: self.phase,
            battle_id: self.battle_id,
            snapshot: self.last_snapshot.clone(),
            log: self.log.to_vec(),
            error: self.error.clone(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn battle_id(&self) -> Option<BattleId> {
        self.battle_id
    }

    pub fn last_snapshot(&self) -> Option<&BattleSnapshot> {
        self.last_snapshot.as_ref()
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Poll on the configured interval until `shutdown` flips to `true`
    /// (or its sender goes away). Ticks never overlap.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        self.attach_shutdown(shutdown.clone());

        let mut ticker = tokio::time::interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            interval_ms = self.config.poll_interval_ms,
            "battle tracker started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }
            self.poll_once().await;
        }

        info!(battle_id = ?self.battle_id, "battle tracker stopped");
    }

    /// One full fetch/derive/append cycle.
    pub async fn poll_once(&mut self) {
        if self.torn_down() {
            return;
        }
        self.log.prune(Instant::now().into_std());

        match self.phase {
            Phase::Uninitialized | Phase::Discovering => self.discover().await,
            Phase::Tracking(id) | Phase::Idle { battle_id: id } => self.track(id).await,
        }

        if !self.torn_down() {
            self.view_tx.send_replace(self.view());
        }
    }

    fn torn_down(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    fn emit(&self, event: TrackerEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }

    async fn discover(&mut self) {
        self.phase = Phase::Discovering;

        let candidate = match self.battle_id {
            // Already chosen (e.g. a successor), waiting for it to exist.
            Some(id) => id,
            None => match self.find_candidate().await {
                Ok(Some(id)) => id,
                Ok(None) => {
                    debug!("no battle found yet");
                    return;
                }
                Err(e) => {
                    if !self.torn_down() {
                        self.surface(None, e);
                    }
                    return;
                }
            },
        };

        let result = self.source.fetch_battle(candidate).await;
        if self.torn_down() {
            return;
        }

        match result {
            Ok(snapshot) => {
                info!(battle_id = candidate, turn = snapshot.turn, "tracking battle");
                self.battle_id = Some(candidate);
                self.phase = Phase::Tracking(candidate);
                self.emit(TrackerEvent::Discovered { battle_id: candidate });
                self.accept(candidate, snapshot).await;
            }
            Err(FetchError::NotFound(_)) => {
                debug!(battle_id = candidate, "battle not materialized yet");
            }
            Err(e) => self.surface(Some(candidate), e),
        }
    }

    /// Hint first, then the ledger.
    async fn find_candidate(&self) -> Result<Option<BattleId>, FetchError> {
        if let Some(id) = self.hint.current_battle_id().await {
            debug!(battle_id = id, "battle id from hint");
            return Ok(Some(id));
        }
        self.probe().await
    }

    /// Highest live battle in the probe window, else the highest existing one.
    async fn probe(&self) -> Result<Option<BattleId>, FetchError> {
        let start = self.config.starting_battle_id;
        let end = start.saturating_add(self.config.probe_window);
        let mut latest = None;
        let mut latest_live = None;

        for id in start..end {
            match self.source.fetch_battle(id).await {
                Ok(snapshot) => {
                    latest = Some(id);
                    if !snapshot.is_finished {
                        latest_live = Some(id);
                    }
                }
                Err(FetchError::NotFound(_)) => break,
                Err(e) => return Err(e),
            }
        }

        let found = latest_live.or(latest);
        debug!(start = start, found = ?found, "probed ledger for battles");
        Ok(found)
    }

    async fn track(&mut self, battle_id: BattleId) {
        let result = self.source.fetch_battle(battle_id).await;
        if self.torn_down() {
            return;
        }

        match result {
            Ok(snapshot) => self.accept(battle_id, snapshot).await,
            // Usually a lagging RPC node; the next tick will tell.
            Err(FetchError::NotFound(e)) => debug!(battle_id = battle_id, error = %e, "battle account missing"),
            Err(e) => self.surface(Some(battle_id), e),
        }
    }

    /// Fold a freshly fetched snapshot in, then check for a successor.
    async fn accept(&mut self, battle_id: BattleId, snapshot: BattleSnapshot) {
        self.error = None;

        let regressed = self
            .last_snapshot
            .as_ref()
            .is_some_and(|last| snapshot.regresses_from(last));
        if regressed {
            warn!(battle_id = battle_id, turn = snapshot.turn, "stale snapshot behind the last one, ignoring");
        } else {
            let events = derive(self.last_snapshot.as_ref(), &snapshot);
            for event in &events {
                debug!(battle_id = battle_id, turn = event.turn, message = %event.message, "derived event");
                self.emit(TrackerEvent::Derived {
                    battle_id,
                    event: event.clone(),
                });
            }
            self.log.append(events, Instant::now().into_std());
            self.last_snapshot = Some(snapshot);
        }

        if self.last_snapshot.as_ref().is_some_and(|s| s.is_finished) {
            self.try_advance(battle_id).await;
        }
    }

    async fn try_advance(&mut self, current: BattleId) {
        let hinted = self.hint.current_battle_id().await;
        if self.torn_down() {
            return;
        }

        let successor = match hinted {
            Some(next) if next > current => Some(next),
            _ if self.config.probe_successor => self.probe_successor(current).await,
            _ => None,
        };
        if self.torn_down() {
            return;
        }

        match successor {
            Some(next) => self.advance(current, next),
            None => {
                if self.phase != (Phase::Idle { battle_id: current }) {
                    info!(battle_id = current, "battle over, waiting for the next one");
                }
                self.phase = Phase::Idle { battle_id: current };
            }
        }
    }

    async fn probe_successor(&self, current: BattleId) -> Option<BattleId> {
        let next = current.checked_add(1)?;
        match self.source.fetch_battle(next).await {
            Ok(_) => Some(next),
            Err(FetchError::NotFound(_)) => None,
            Err(e) => {
                debug!(battle_id = next, error = %e, "successor probe failed");
                None
            }
        }
    }

    fn advance(&mut self, from: BattleId, to: BattleId) {
        info!(from = from, to = to, "battle finished, switching to successor");
        self.battle_id = Some(to);
        self.last_snapshot = None;
        self.log.clear();
        self.error = None;
        self.phase = Phase::Discovering;
        self.emit(TrackerEvent::Advanced { from, to });
    }

    fn surface(&mut self, battle_id: Option<BattleId>, err: FetchError) {
        warn!(battle_id = ?battle_id, error = %err, "battle fetch failed");
        let message = err.to_string();
        self.error = Some(message.clone());
        self.emit(TrackerEvent::Error { battle_id, message });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::fixtures::{fresh, snapshot};
    use crate::battle::EventKind;
    use crate::hint::StaticHint;
    use crate::onchain::keys::LookupKey;
    use crate::onchain::memory::MemoryLedger;
    use crate::onchain::types::LedgerError;
    use crate::retry::RetryPolicy;
    use serde_json::Value;
    use std::time::Duration;

    const SPEEDS: [u64; 4] = [10, 20, 5, 1];

    fn tracker<L: LedgerReader, H: HintSource>(ledger: L, hint: H) -> BattleTracker<L, H> {
        BattleTracker::new(
            TrackerConfig::default(),
            EventLog::default(),
            SnapshotSource::new(ledger, RetryPolicy::new(2, Duration::from_millis(10))),
            hint,
        )
    }

    fn no_hint() -> Option<StaticHint> {
        None
    }

    fn finished(turn: u64, winner: usize) -> BattleSnapshot {
        let mut hp = [0; 4];
        let mut alive = [false; 4];
        hp[winner] = 40;
        alive[winner] = true;
        let mut s = snapshot(turn, hp, alive, SPEEDS, true);
        s.winner = Some(winner);
        s
    }

    /// Tracker sitting on a finished battle 5 with a conclusion in its log.
    async fn finished_battle_five(ledger: &MemoryLedger, hint: &StaticHint) -> BattleTracker<MemoryLedger, StaticHint> {
        ledger.insert_battle(5, &snapshot(9, [40, 0, 0, 20], [true, false, false, true], SPEEDS, false));
        hint.set(Some(5));
        let mut t = tracker(ledger.clone(), hint.clone());
        t.poll_once().await;
        assert_eq!(t.phase(), Phase::Tracking(5));

        ledger.insert_battle(5, &finished(10, 0));
        t.poll_once().await;
        t
    }

    #[tokio::test]
    async fn test_discovers_from_hint() {
        let ledger = MemoryLedger::new();
        ledger.insert_battle(7, &fresh(1));
        let mut t = tracker(ledger.clone(), StaticHint::new(Some(7)));

        t.poll_once().await;
        assert_eq!(t.phase(), Phase::Tracking(7));
        assert_eq!(t.battle_id(), Some(7));
        assert_eq!(t.last_snapshot(), Some(&fresh(1)));
        // first observation derives nothing
        assert!(t.log().is_empty());
        assert_eq!(ledger.reads(), 1);
    }

    #[tokio::test]
    async fn test_hinted_battle_not_materialized_stays_discovering() {
        let ledger = MemoryLedger::new();
        let mut t = tracker(ledger.clone(), StaticHint::new(Some(9)));

        t.poll_once().await;
        assert_eq!(t.phase(), Phase::Discovering);
        assert_eq!(t.battle_id(), None);
        assert_eq!(t.error(), None);

        ledger.insert_battle(9, &fresh(1));
        t.poll_once().await;
        assert_eq!(t.phase(), Phase::Tracking(9));
    }

    #[tokio::test]
    async fn test_probe_picks_highest_live_battle() {
        let ledger = MemoryLedger::new();
        ledger.insert_battle(1, &finished(10, 0));
        ledger.insert_battle(2, &finished(12, 3));
        ledger.insert_battle(3, &fresh(2));
        let mut t = tracker(ledger.clone(), no_hint());

        t.poll_once().await;
        assert_eq!(t.phase(), Phase::Tracking(3));
        // probe 1..=4 (4 missing), then the tracked read
        assert_eq!(ledger.reads(), 5);
    }

    #[tokio::test]
    async fn test_probe_falls_back_to_most_recent_finished() {
        let ledger = MemoryLedger::new();
        ledger.insert_battle(1, &finished(10, 0));
        ledger.insert_battle(2, &finished(12, 3));
        let mut t = tracker(ledger.clone(), no_hint());

        t.poll_once().await;
        assert_eq!(t.battle_id(), Some(2));
        // nothing newer on the ledger yet
        assert_eq!(t.phase(), Phase::Idle { battle_id: 2 });
    }

    #[tokio::test]
    async fn test_empty_ledger_keeps_discovering() {
        let ledger = MemoryLedger::new();
        let mut t = tracker(ledger.clone(), no_hint());

        t.poll_once().await;
        t.poll_once().await;
        assert_eq!(t.phase(), Phase::Discovering);
        assert_eq!(t.error(), None);
    }

    #[tokio::test]
    async fn test_derives_events_across_polls() {
        let ledger = MemoryLedger::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut t = tracker(ledger.clone(), StaticHint::new(Some(4))).with_events(tx);

        ledger.insert_battle(4, &snapshot(1, [100; 4], [true; 4], SPEEDS, false));
        t.poll_once().await;
        ledger.insert_battle(4, &snapshot(2, [100, 80, 100, 100], [true; 4], SPEEDS, false));
        t.poll_once().await;
        ledger.insert_battle(4, &snapshot(2, [100, 0, 100, 100], [true, false, true, true], SPEEDS, false));
        t.poll_once().await;
        // unchanged: nothing new
        t.poll_once().await;

        let messages: Vec<String> = t.log().iter().map(|e| e.event.message.clone()).collect();
        assert_eq!(
            messages,
            vec!["MAPINGUARI has been eliminated", "YETI claws MAPINGUARI for 20 damage"]
        );

        assert_eq!(rx.try_recv(), Ok(TrackerEvent::Discovered { battle_id: 4 }));
        let derived: Vec<EventKind> = std::iter::from_fn(|| rx.try_recv().ok())
            .filter_map(|e| match e {
                TrackerEvent::Derived { event, .. } => Some(event.kind),
                _ => None,
            })
            .collect();
        assert_eq!(
            derived,
            vec![
                EventKind::Action {
                    attacker: Some(0),
                    target: 1,
                    damage: 20
                },
                EventKind::Elimination { creature: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn test_advances_to_hinted_successor() {
        let ledger = MemoryLedger::new();
        let hint = StaticHint::new(None);
        let mut t = finished_battle_five(&ledger, &hint).await;
        // hint still says 5: stay put
        assert_eq!(t.phase(), Phase::Idle { battle_id: 5 });
        assert!(t.log().iter().any(|e| matches!(e.event.kind, EventKind::Conclusion { winner: Some(0) })));

        hint.set(Some(6));
        t.poll_once().await;

        assert_eq!(t.battle_id(), Some(6));
        assert_eq!(t.last_snapshot(), None);
        assert!(t.log().is_empty());
        assert_eq!(t.phase(), Phase::Discovering);

        // successor materializes: tracked from a clean baseline
        ledger.insert_battle(6, &fresh(1));
        t.poll_once().await;
        assert_eq!(t.phase(), Phase::Tracking(6));
        assert!(t.log().is_empty());
    }

    #[tokio::test]
    async fn test_stays_on_finished_battle_without_successor() {
        let ledger = MemoryLedger::new();
        let hint = StaticHint::new(None);
        let mut t = finished_battle_five(&ledger, &hint).await;

        // failing hint
        hint.set(None);
        t.poll_once().await;
        assert_eq!(t.battle_id(), Some(5));
        assert_eq!(t.phase(), Phase::Idle { battle_id: 5 });

        // older id from the hint is not a successor
        hint.set(Some(4));
        t.poll_once().await;
        assert_eq!(t.battle_id(), Some(5));

        // conclusion was logged once, idle polls add nothing
        let conclusions = t
            .log()
            .iter()
            .filter(|e| matches!(e.event.kind, EventKind::Conclusion { .. }))
            .count();
        assert_eq!(conclusions, 1);
    }

    #[tokio::test]
    async fn test_advances_by_ledger_probe_when_hint_is_silent() {
        let ledger = MemoryLedger::new();
        let hint = StaticHint::new(None);
        let mut t = finished_battle_five(&ledger, &hint).await;
        hint.set(None);

        ledger.insert_battle(6, &fresh(1));
        t.poll_once().await;
        assert_eq!(t.battle_id(), Some(6));
        assert!(t.log().is_empty());
    }

    #[tokio::test]
    async fn test_successor_probe_can_be_disabled() {
        let ledger = MemoryLedger::new();
        ledger.insert_battle(5, &finished(10, 0));
        ledger.insert_battle(6, &fresh(1));
        let mut config = TrackerConfig::default();
        config.probe_successor = false;
        let mut t = BattleTracker::new(
            config,
            EventLog::default(),
            SnapshotSource::new(ledger.clone(), RetryPolicy::default()),
            StaticHint::new(Some(5)),
        );

        t.poll_once().await;
        assert_eq!(t.phase(), Phase::Idle { battle_id: 5 });
    }

    #[tokio::test]
    async fn test_stale_snapshot_never_reopens_finished_battle() {
        let ledger = MemoryLedger::new();
        let hint = StaticHint::new(None);
        let mut t = finished_battle_five(&ledger, &hint).await;
        let before = t.log().len();

        ledger.insert_battle(5, &snapshot(9, [40, 0, 0, 20], [true, false, false, true], SPEEDS, false));
        t.poll_once().await;

        assert_eq!(t.phase(), Phase::Idle { battle_id: 5 });
        assert!(t.last_snapshot().is_some_and(|s| s.is_finished));
        assert_eq!(t.log().len(), before);
    }

    #[tokio::test]
    async fn test_lagging_snapshot_does_not_repeat_events() {
        let ledger = MemoryLedger::new();
        let mut t = tracker(ledger.clone(), StaticHint::new(Some(3)));
        let before = snapshot(1, [100; 4], [true; 4], SPEEDS, false);
        let after = snapshot(2, [100, 0, 100, 100], [true, false, true, true], SPEEDS, false);

        ledger.insert_battle(3, &before);
        t.poll_once().await;
        ledger.insert_battle(3, &after);
        t.poll_once().await;
        // a lagging node serves the older state, then catches up
        ledger.insert_battle(3, &before);
        t.poll_once().await;
        assert_eq!(t.last_snapshot(), Some(&after));
        ledger.insert_battle(3, &after);
        t.poll_once().await;

        let messages: Vec<&str> = t.log().iter().map(|e| e.event.message.as_str()).collect();
        assert_eq!(
            messages,
            vec!["MAPINGUARI has been eliminated", "YETI claws MAPINGUARI for 100 damage"]
        );
        assert_eq!(t.phase(), Phase::Tracking(3));
        assert_eq!(t.error(), None);
    }

    #[tokio::test]
    async fn test_not_found_while_tracking_is_swallowed() {
        let ledger = MemoryLedger::new();
        ledger.insert_battle(3, &fresh(1));
        let mut t = tracker(ledger.clone(), StaticHint::new(Some(3)));
        t.poll_once().await;

        ledger.remove(&LookupKey::battle(3));
        t.poll_once().await;
        assert_eq!(t.phase(), Phase::Tracking(3));
        assert_eq!(t.error(), None);
        assert_eq!(t.last_snapshot(), Some(&fresh(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_surfaces_and_clears() {
        let ledger = MemoryLedger::new();
        ledger.insert_battle(3, &fresh(1));
        let mut t = tracker(ledger.clone(), StaticHint::new(Some(3)));
        t.poll_once().await;

        for _ in 0..3 {
            ledger.fail_next(LedgerError::RateLimited("429 Too Many Requests".into()));
        }
        t.poll_once().await;
        assert!(t.error().is_some_and(|e| e.contains("rate limited")));
        assert_eq!(t.phase(), Phase::Tracking(3));
        assert_eq!(t.view().error, t.error().map(str::to_string));

        t.poll_once().await;
        assert_eq!(t.error(), None);
    }

    #[tokio::test]
    async fn test_other_failure_during_discovery_surfaces() {
        let ledger = MemoryLedger::new();
        ledger.fail_next(LedgerError::Other("connection reset".into()));
        let mut t = tracker(ledger.clone(), no_hint());

        t.poll_once().await;
        assert_eq!(t.phase(), Phase::Discovering);
        assert!(t.error().is_some());
        assert_eq!(ledger.reads(), 1);
    }

    #[tokio::test]
    async fn test_view_is_published_after_each_tick() {
        let ledger = MemoryLedger::new();
        ledger.insert_battle(2, &fresh(1));
        let mut t = tracker(ledger.clone(), StaticHint::new(Some(2)));
        let rx = t.subscribe();
        assert_eq!(rx.borrow().phase, Phase::Uninitialized);

        t.poll_once().await;
        let view = rx.borrow().clone();
        assert_eq!(view.phase, Phase::Tracking(2));
        assert_eq!(view.snapshot, Some(fresh(1)));
        assert_eq!(view, t.view());
    }

    /// Flips the shutdown flag while a read is in flight.
    #[derive(Clone)]
    struct TearDownOnRead {
        inner: MemoryLedger,
        shutdown: std::sync::Arc<watch::Sender<bool>>,
    }

    impl LedgerReader for TearDownOnRead {
        async fn read_account(&self, key: &LookupKey) -> Result<Value, LedgerError> {
            let result = self.inner.read_account(key).await;
            self.shutdown.send_replace(true);
            result
        }
    }

    #[tokio::test]
    async fn test_in_flight_result_discarded_after_teardown() {
        let ledger = MemoryLedger::new();
        ledger.insert_battle(3, &fresh(1));
        let (tx, rx) = watch::channel(false);
        let reader = TearDownOnRead {
            inner: ledger.clone(),
            shutdown: std::sync::Arc::new(tx),
        };
        let mut t = tracker(reader, StaticHint::new(Some(3)));
        t.attach_shutdown(rx);

        t.poll_once().await;
        assert_eq!(ledger.reads(), 1);
        assert_eq!(t.battle_id(), None);
        assert_eq!(t.last_snapshot(), None);

        // torn down: no more reads
        t.poll_once().await;
        assert_eq!(ledger.reads(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_polls_on_interval_until_shutdown() {
        let ledger = MemoryLedger::new();
        ledger.insert_battle(3, &fresh(1));
        let t = tracker(ledger.clone(), StaticHint::new(Some(3)));
        let view = t.subscribe();
        let (tx, rx) = watch::channel(false);

        let stop = async {
            tokio::time::sleep(Duration::from_secs(11)).await;
            tx.send_replace(true);
        };
        tokio::join!(t.run(rx), stop);

        // ticks at 0s, 5s and 10s
        assert_eq!(ledger.reads(), 3);
        assert_eq!(view.borrow().phase, Phase::Tracking(3));
    }

    #[tokio::test]
    async fn test_run_returns_immediately_when_already_stopped() {
        let ledger = MemoryLedger::new();
        let t = tracker(ledger.clone(), no_hint());
        let (_tx, rx) = watch::channel(true);

        t.run(rx).await;
        assert_eq!(ledger.reads(), 0);
    }
}
