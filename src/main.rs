use arena_watch::battle::BattleId;
use arena_watch::config::Config;
use arena_watch::hint::HttpHint;
use arena_watch::lifecycle::{BattleTracker, Phase, TrackerEvent, TrackerView};
use arena_watch::onchain::{HttpLedger, LedgerReader, OwnerKey, SnapshotSource};
use arena_watch::positions::scan_unclaimed;
use std::collections::HashSet;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

const CONFIG_PATH: &str = "arena.toml";

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let config_path = Path::new(CONFIG_PATH);
    let from_file = config_path.exists();
    let config = if from_file {
        Config::load(config_path)?
    } else {
        Config::from_env()?
    };

    // Initialize logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .init();
    }

    info!("arena-watch v{} starting", env!("CARGO_PKG_VERSION"));
    if !from_file {
        info!("no {CONFIG_PATH} found, using env-only config");
    }

    // --- Ledger + hint ---
    let source = SnapshotSource::new(HttpLedger::new(config.ledger.url.clone()), config.retry.policy());
    info!(url = %config.ledger.url, "ledger endpoint");

    let hint = if config.hint.enabled() {
        info!(url = %config.hint.url, "current-battle hint enabled");
        Some(HttpHint::new(&config.hint.url, config.hint.timeout())?)
    } else {
        warn!("no hint endpoint configured, discovering battles by ledger probe only (set ARENA_HINT_URL)");
        None
    };

    let owner = config.wallet.owner_key()?;

    // --- Tracker ---
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let tracker = BattleTracker::new(config.tracker.clone(), config.log.build(), source.clone(), hint)
        .with_events(event_tx);
    let view = tracker.subscribe();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let ctrl_c = shutdown_on(tokio::signal::ctrl_c(), &shutdown_tx);

    tokio::join!(
        tracker.run(shutdown_rx.clone()),
        report_events(event_rx, view.clone()),
        watch_winnings(
            &source,
            owner,
            config.wallet.lookback,
            config.wallet.scan_interval(),
            view,
            shutdown_rx
        ),
        ctrl_c,
    );

    Ok(())
}

/// Flip `shutdown` once `signal` fires. If the signal cannot be listened
/// for, never flip it: the watcher then runs until killed.
async fn shutdown_on<F>(signal: F, shutdown: &watch::Sender<bool>)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutting down...");
    shutdown.send_replace(true);
}

/// Print derived events and phase changes until the tracker goes away.
async fn report_events(mut events: mpsc::UnboundedReceiver<TrackerEvent>, mut view: watch::Receiver<TrackerView>) {
    let mut last_phase = Phase::Uninitialized;
    let mut view_open = true;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    TrackerEvent::Discovered { battle_id } => info!(battle_id = battle_id, "watching battle"),
                    TrackerEvent::Derived { battle_id, event } => println!("[#{battle_id}] {event}"),
                    TrackerEvent::Advanced { from, to } => info!(from = from, to = to, "advanced to next battle"),
                    TrackerEvent::Error { battle_id, message } => {
                        warn!(battle_id = ?battle_id, error = %message, "tracker error")
                    }
                }
            }
            changed = view.changed(), if view_open => {
                if changed.is_err() {
                    view_open = false;
                    continue;
                }
                let phase = view.borrow_and_update().phase;
                if phase != last_phase {
                    info!(from = %last_phase, to = %phase, "tracker phase changed");
                    last_phase = phase;
                }
            }
        }
    }
}

/// Periodically scan recent battles for winnings `owner` has not claimed.
/// Returns at once when no wallet is configured.
async fn watch_winnings<L: LedgerReader>(
    source: &SnapshotSource<L>,
    owner: Option<OwnerKey>,
    lookback: u64,
    interval: Duration,
    view: watch::Receiver<TrackerView>,
    mut shutdown: watch::Receiver<bool>,
) {
    let Some(owner) = owner else {
        return;
    };
    info!(owner = %owner, lookback = lookback, "winnings scan enabled");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut reported: HashSet<(BattleId, u8)> = HashSet::new();

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

        let current = view.borrow().battle_id;
        let Some(current) = current else {
            continue;
        };

        let winnings = scan_unclaimed(source, current, &owner, lookback).await;
        let mut still_open = HashSet::new();
        for w in &winnings {
            let key = (w.battle_id, w.creature);
            if !reported.contains(&key) {
                println!("unclaimed: {w}");
            }
            still_open.insert(key);
        }
        reported = still_open;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_signal_flips_shutdown() {
        let (tx, rx) = watch::channel(false);
        shutdown_on(async { Ok(()) }, &tx).await;
        assert!(*rx.borrow());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_signal_listener_keeps_running() {
        let (tx, rx) = watch::channel(false);
        let failed = async { Err(std::io::Error::other("no signal driver")) };

        let waited = tokio::time::timeout(Duration::from_secs(60), shutdown_on(failed, &tx)).await;
        assert!(waited.is_err());
        assert!(!*rx.borrow());
    }
}
