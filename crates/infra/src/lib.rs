//! Infrastructure layer: storage backends, the ledger engine, queries and config.

pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod queries;
pub mod store;


pub use config::{AppConfig, ConfigError};
pub use engine::{ApplyTransaction, CreateWallet, LedgerEngine, RetryPolicy, TransactionApplied, WalletCreated};
pub use error::{LedgerError, StoreError};
pub use queries::{CsvExport, LedgerQueries};
pub use store::{InMemoryLedgerStore, LedgerStore, Page, PostgresLedgerStore, TransactionPage};
