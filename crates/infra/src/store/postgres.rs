//! Postgres-backed ledger store.
//!
//! Balance changes run inside one database transaction that takes the wallet
//! row with `SELECT ... FOR UPDATE`, so concurrent units on the same wallet
//! queue on the row lock while other wallets proceed untouched.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database | `40001` | `Conflict` | Serialization failure |
//! | Database | `40P01` | `Conflict` | Deadlock detected |
//! | Database | `23505` | `Conflict` | Duplicate wallet or transaction id |
//! | Database | `23514` | `Backend` | Check constraint (e.g. negative balance) |
//! | Database | Any other | `Backend` | Other database errors |
//! | PoolClosed / PoolTimedOut / Io | N/A | `Backend` | Connection failures |

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction as PgTransaction};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{Span, instrument};

use tally_core::{Money, TransactionId, WalletId};
use tally_ledger::{Transaction, TransactionType, Wallet};

use super::query::{Page, TransactionPage};
use super::r#trait::{Committed, Decide, LedgerStore};
use crate::error::StoreError;

const SCHEMA: &str = include_str!("schema.sql");

/// Postgres-backed ledger store.
///
/// `Send + Sync`; all access goes through the SQLx connection pool.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: Arc<PgPool>,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables, constraints and indexes if they are missing.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    async fn begin_snapshot(&self) -> Result<PgTransaction<'static, Postgres>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_isolation", e))?;
        Ok(tx)
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    #[instrument(skip_all, fields(wallet_id = %wallet.id), err)]
    async fn create_wallet(&self, wallet: &Wallet, setup: &Transaction) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO wallets (id, name, balance, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(wallet.id.as_uuid())
        .bind(&wallet.name)
        .bind(wallet.balance.as_decimal())
        .bind(wallet.created_at)
        .bind(wallet.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_wallet", e))?;

        insert_transaction(&mut tx, setup).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(wallet_id = %wallet_id), err)]
    async fn get_wallet(&self, wallet_id: WalletId) -> Result<Option<Wallet>, StoreError> {
        let row = sqlx::query("SELECT id, name, balance, created_at, updated_at FROM wallets WHERE id = $1")
            .bind(wallet_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_wallet", e))?;

        match row {
            Some(row) => Ok(Some(Wallet::try_from(decode::<WalletRow>(&row)?)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, decide), fields(wallet_id = %wallet_id), err)]
    async fn transact(&self, wallet_id: WalletId, decide: Decide<'_>) -> Result<Committed, StoreError> {
        // Dropping `tx` on any early return rolls the unit back.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let row = sqlx::query("SELECT id, name, balance, created_at, updated_at FROM wallets WHERE id = $1 FOR UPDATE")
            .bind(wallet_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_wallet", e))?;

        let Some(row) = row else {
            return Err(StoreError::NotFound);
        };
        let current: Wallet = decode::<WalletRow>(&row)?.try_into()?;

        let transaction = decide(&current).map_err(StoreError::Rejected)?;
        let mut wallet = current;
        wallet.apply(&transaction).map_err(StoreError::Rejected)?;

        sqlx::query("UPDATE wallets SET balance = $2, updated_at = $3 WHERE id = $1")
            .bind(wallet.id.as_uuid())
            .bind(wallet.balance.as_decimal())
            .bind(wallet.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_balance", e))?;

        insert_transaction(&mut tx, &transaction).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(Committed { wallet, transaction })
    }

    #[instrument(skip(self), fields(wallet_id = %wallet_id, total = tracing::field::Empty), err)]
    async fn page_transactions(
        &self,
        wallet_id: WalletId,
        page: Page,
    ) -> Result<Option<TransactionPage>, StoreError> {
        let mut tx = self.begin_snapshot().await?;

        if !wallet_exists(&mut tx, wallet_id).await? {
            return Ok(None);
        }

        let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM transactions WHERE wallet_id = $1")
            .bind(wallet_id.as_uuid())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("count_transactions", e))?
            .try_get("total")
            .map_err(|e| StoreError::Backend(format!("failed to read total: {e}")))?;

        let rows = sqlx::query(
            r#"
            SELECT id, wallet_id, amount, type, balance_after, description, created_at
            FROM transactions
            WHERE wallet_id = $1
            ORDER BY created_at DESC, seq DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(wallet_id.as_uuid())
        .bind(i64::from(page.limit()))
        .bind(i64::try_from(page.skip()).unwrap_or(i64::MAX))
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("page_transactions", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Span::current().record("total", total);
        Ok(Some(TransactionPage {
            items: decode_transactions(&rows)?,
            total: total.max(0) as u64,
        }))
    }

    #[instrument(skip(self), fields(wallet_id = %wallet_id), err)]
    async fn all_transactions(&self, wallet_id: WalletId) -> Result<Option<Vec<Transaction>>, StoreError> {
        let mut tx = self.begin_snapshot().await?;

        if !wallet_exists(&mut tx, wallet_id).await? {
            return Ok(None);
        }

        let rows = sqlx::query(
            r#"
            SELECT id, wallet_id, amount, type, balance_after, description, created_at
            FROM transactions
            WHERE wallet_id = $1
            ORDER BY created_at DESC, seq DESC
            "#,
        )
        .bind(wallet_id.as_uuid())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("all_transactions", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        decode_transactions(&rows).map(Some)
    }
}

async fn insert_transaction(
    tx: &mut PgTransaction<'_, Postgres>,
    transaction: &Transaction,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO transactions (id, wallet_id, amount, type, balance_after, description, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(transaction.id.as_uuid())
    .bind(transaction.wallet_id.as_uuid())
    .bind(transaction.amount.as_decimal())
    .bind(transaction.kind.as_str())
    .bind(transaction.balance_after.as_decimal())
    .bind(&transaction.description)
    .bind(transaction.created_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_transaction", e))?;
    Ok(())
}

async fn wallet_exists(tx: &mut PgTransaction<'_, Postgres>, wallet_id: WalletId) -> Result<bool, StoreError> {
    let row = sqlx::query("SELECT 1 AS present FROM wallets WHERE id = $1")
        .bind(wallet_id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("wallet_exists", e))?;
    Ok(row.is_some())
}

fn decode<T>(row: &PgRow) -> Result<T, StoreError>
where
    T: for<'r> FromRow<'r, PgRow>,
{
    T::from_row(row).map_err(|e| StoreError::Backend(format!("failed to decode row: {e}")))
}

fn decode_transactions(rows: &[PgRow]) -> Result<Vec<Transaction>, StoreError> {
    rows.iter()
        .map(|row| Transaction::try_from(decode::<TransactionRow>(row)?))
        .collect()
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("40001") | Some("40P01") | Some("23505") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => StoreError::Backend(format!("connection pool closed in {operation}")),
        sqlx::Error::PoolTimedOut => {
            StoreError::Backend(format!("timed out waiting for a connection in {operation}"))
        }
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}

fn money(column: &str, value: Decimal) -> Result<Money, StoreError> {
    Money::from_decimal(value)
        .map_err(|e| StoreError::Backend(format!("column {column} holds an invalid amount: {e}")))
}

// SQLx row types

#[derive(Debug)]
struct WalletRow {
    id: uuid::Uuid,
    name: String,
    balance: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for WalletRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(WalletRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            balance: row.try_get("balance")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<WalletRow> for Wallet {
    type Error = StoreError;

    fn try_from(row: WalletRow) -> Result<Self, Self::Error> {
        Ok(Wallet {
            id: WalletId::from_uuid(row.id),
            name: row.name,
            balance: money("balance", row.balance)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug)]
struct TransactionRow {
    id: uuid::Uuid,
    wallet_id: uuid::Uuid,
    amount: Decimal,
    kind: String,
    balance_after: Decimal,
    description: String,
    created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for TransactionRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(TransactionRow {
            id: row.try_get("id")?,
            wallet_id: row.try_get("wallet_id")?,
            amount: row.try_get("amount")?,
            kind: row.try_get("type")?,
            balance_after: row.try_get("balance_after")?,
            description: row.try_get("description")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(Transaction {
            id: TransactionId::from_uuid(row.id),
            wallet_id: WalletId::from_uuid(row.wallet_id),
            amount: money("amount", row.amount)?,
            kind: TransactionType::parse(&row.kind)
                .map_err(|e| StoreError::Backend(format!("column type: {e}")))?,
            balance_after: money("balance_after", row.balance_after)?,
            description: row.description,
            created_at: row.created_at,
        })
    }
}
