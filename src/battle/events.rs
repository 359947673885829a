//! Event derivation: what probably happened between two polls.
//!
//! The ledger only ever shows us before/after snapshots. Hp drops, deaths and
//! the finished flag are observable; who hit whom is not recorded anywhere.
//! Attackers are therefore assigned by a fixed, deterministic heuristic:
//!
//! 1. creatures alive in the previous snapshot are ordered by descending speed
//!    (ties go to the lower slot)
//! 2. damage events are taken in slot order of their targets
//! 3. damage event `k` is attributed to the `k`-th creature (cycling) in that
//!    order, skipping the target itself
//!
//! The output is a plausible reconstruction, not ground truth. Tests pin the
//! exact rule so the log stays stable across releases.

use super::{creature_name, BattleSnapshot, CREATURE_COUNT};

/// Cosmetic verbs, picked by `(attacker + turn) % len`.
pub const ACTION_VERBS: [&str; 6] = ["strikes", "bites", "claws", "slams", "mauls", "gores"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// A hit, or a synthetic miss when `damage == 0`.
    Action {
        attacker: Option<usize>,
        target: usize,
        damage: u64,
    },
    Elimination {
        creature: usize,
    },
    /// `winner == None` is a draw.
    Conclusion {
        winner: Option<usize>,
    },
}

/// One inferred, human-readable event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BattleEvent {
    pub turn: u64,
    pub kind: EventKind,
    pub message: String,
}

impl BattleEvent {
    /// Creature slots this event is about, attacker first.
    pub fn subjects(&self) -> Vec<usize> {
        match &self.kind {
            EventKind::Action { attacker, target, .. } => attacker.iter().copied().chain([*target]).collect(),
            EventKind::Elimination { creature } => vec![*creature],
            EventKind::Conclusion { winner } => winner.iter().copied().collect(),
        }
    }

    pub fn is_action(&self) -> bool {
        matches!(self.kind, EventKind::Action { .. })
    }
}

impl std::fmt::Display for BattleEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T{} {}", self.turn, self.message)
    }
}

/// Diff two consecutive snapshots of the same battle.
///
/// Returns actions, then eliminations, then the conclusion. Nothing is derived
/// without a baseline, and nothing is derived twice from an unchanged pair.
pub fn derive(previous: Option<&BattleSnapshot>, current: &BattleSnapshot) -> Vec<BattleEvent> {
    let Some(previous) = previous else {
        return Vec::new();
    };

    let mut events = Vec::new();

    // Same turn (or a lagging node): actions are not inferable from this pair.
    if current.turn > previous.turn {
        infer_actions(previous, current, &mut events);
    }

    for (index, (before, after)) in previous.creatures.iter().zip(current.creatures.iter()).enumerate() {
        if before.alive && !after.alive {
            events.push(BattleEvent {
                turn: current.turn,
                kind: EventKind::Elimination { creature: index },
                message: format!("{} has been eliminated", creature_name(index)),
            });
        }
    }

    if !previous.is_finished && current.is_finished {
        let message = match current.winner {
            Some(w) => format!("{} wins the battle", creature_name(w)),
            None => "The battle ends in a draw".to_string(),
        };
        events.push(BattleEvent {
            turn: current.turn,
            kind: EventKind::Conclusion { winner: current.winner },
            message,
        });
    }

    events
}

/// Slots alive in `snapshot`, fastest first.
fn attack_order(snapshot: &BattleSnapshot) -> Vec<usize> {
    let mut order: Vec<usize> = (0..CREATURE_COUNT)
        .filter(|&i| snapshot.creatures.get(i).is_some_and(|c| c.alive))
        .collect();
    order.sort_by(|&a, &b| {
        let speed = |i: usize| snapshot.creatures.get(i).map_or(0, |c| c.speed);
        speed(b).cmp(&speed(a)).then(a.cmp(&b))
    });
    order
}

fn verb(attacker: Option<usize>, turn: u64) -> &'static str {
    let slot = attacker.unwrap_or(0) as u64;
    let idx = (slot.wrapping_add(turn) % ACTION_VERBS.len() as u64) as usize;
    ACTION_VERBS.get(idx).copied().unwrap_or("strikes")
}

fn infer_actions(previous: &BattleSnapshot, current: &BattleSnapshot, events: &mut Vec<BattleEvent>) {
    let order = attack_order(previous);
    let turn = current.turn;

    let damaged: Vec<(usize, u64)> = previous
        .creatures
        .iter()
        .zip(current.creatures.iter())
        .enumerate()
        .filter(|(_, (before, after))| before.alive && after.hp < before.hp)
        .map(|(i, (before, after))| (i, before.hp - after.hp))
        .collect();

    if damaged.is_empty() {
        // Quiet turn: keep the log alive with a miss between the two fastest.
        if let [attacker, target, ..] = order.as_slice() {
            events.push(BattleEvent {
                turn,
                kind: EventKind::Action {
                    attacker: Some(*attacker),
                    target: *target,
                    damage: 0,
                },
                message: format!(
                    "{} {} at {} but misses",
                    creature_name(*attacker),
                    verb(Some(*attacker), turn),
                    creature_name(*target)
                ),
            });
        }
        return;
    }

    for (k, (target, damage)) in damaged.into_iter().enumerate() {
        let candidates: Vec<usize> = order.iter().copied().filter(|&i| i != target).collect();
        let attacker = k
            .checked_rem(candidates.len())
            .and_then(|j| candidates.get(j))
            .copied();

        let message = match attacker {
            Some(a) => format!(
                "{} {} {} for {} damage",
                creature_name(a),
                verb(Some(a), turn),
                creature_name(target),
                damage
            ),
            None => format!("{} takes {} damage", creature_name(target), damage),
        };

        events.push(BattleEvent {
            turn,
            kind: EventKind::Action {
                attacker,
                target,
                damage,
            },
            message,
        });
    }
}
