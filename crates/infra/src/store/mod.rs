//! Wallet + transaction storage boundary.
//!
//! Balance changes happen only through scoped atomic units
//! ([`LedgerStore::transact`]); reads never take wallet locks.

pub mod in_memory;
pub mod postgres;
pub mod query;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;
pub use query::{DEFAULT_LIMIT, MAX_LIMIT, Page, TransactionPage};
pub use r#trait::{Committed, Decide, LedgerStore};
