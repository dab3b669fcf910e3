//! Wallet ledger domain (balance-stamped, append-only transaction log).
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns. Stores call
//! into [`Wallet::open`] and [`Wallet::post`] from inside their atomic units.

pub mod transaction;
pub mod validation;
pub mod wallet;

pub use transaction::{Transaction, TransactionType, replay};
pub use validation::{Description, WalletName};
pub use wallet::{Posting, Wallet, SETUP_DESCRIPTION};
