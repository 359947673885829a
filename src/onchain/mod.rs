//! Ledger access for the arena program.
//!
//! The program's accounts are only reachable through query reads by key;
//! there is no event subscription. This module covers:
//! 1. Lookup keys (`keys`): seed layouts for battle, market, position and global accounts
//! 2. Wire types (`types`): account bodies and integer normalization
//! 3. Readers (`source`): the `LedgerReader` seam, the HTTP reader, and the
//!    retried, typed `SnapshotSource`
//! 4. `memory`: an in-memory reader for tests and offline runs

pub mod keys;
pub mod memory;
pub mod source;
pub mod types;

pub use keys::{LookupKey, OwnerKey};
pub use memory::MemoryLedger;
pub use source::{HttpLedger, LedgerReader, SnapshotSource};
pub use types::LedgerError;
