//! Read-only mirror of an on-chain creature battle.
//!
//! Polls the ledger for the active battle, derives a human-readable event log
//! from consecutive snapshots, and follows the arena from one battle to the next.

pub mod battle;
pub mod config;
pub mod hint;
pub mod lifecycle;
pub mod market;
pub mod onchain;
pub mod positions;
pub mod retry;
