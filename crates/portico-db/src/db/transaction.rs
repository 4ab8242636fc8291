//! Database transaction utilities
//!
//! Multi-statement writes (organization plus owner membership, invitation redemption)
//! run inside a `TransactionGuard`.

use anyhow::{Context, Result};
use sqlx::{PgPool, Postgres, Transaction};
use std::ops::{Deref, DerefMut};
use std::time::Duration;

/// A database transaction wrapper with explicit commit/rollback.
///
/// Dropping the guard without committing rolls the transaction back (sqlx issues the
/// rollback when the connection returns to the pool).
///
/// # Example
///
/// ```ignore
/// use portico_db::TransactionGuard;
///
/// async fn example(pool: &sqlx::PgPool) -> anyhow::Result<()> {
///     let mut tx = TransactionGuard::begin(pool).await?;
///     sqlx::query("INSERT INTO ...").execute(&mut **tx).await?;
///     tx.commit().await?;
///     Ok(())
/// }
/// ```
pub struct TransactionGuard {
    transaction: Transaction<'static, Postgres>,
}

impl TransactionGuard {
    /// Begin a new database transaction
    pub async fn begin(pool: &PgPool) -> Result<Self> {
        let transaction = pool
            .begin()
            .await
            .context("Failed to begin database transaction")?;

        Ok(Self { transaction })
    }

    /// Begin a transaction whose statements are cancelled by Postgres after `timeout`.
    pub async fn begin_with_timeout(pool: &PgPool, timeout: Duration) -> Result<Self> {
        let mut guard = Self::begin(pool).await?;
        // set_config(.., true) is the bindable form of SET LOCAL.
        sqlx::query("SELECT set_config('statement_timeout', $1, true)")
            .bind(format!("{}ms", timeout.as_millis()))
            .execute(&mut *guard.transaction)
            .await
            .context("Failed to set statement timeout")?;
        Ok(guard)
    }

    /// Commit the transaction
    pub async fn commit(self) -> Result<()> {
        self.transaction
            .commit()
            .await
            .context("Failed to commit database transaction")
    }

    /// Rollback the transaction
    pub async fn rollback(self) -> Result<()> {
        self.transaction
            .rollback()
            .await
            .context("Failed to rollback database transaction")
    }
}

impl Deref for TransactionGuard {
    type Target = Transaction<'static, Postgres>;

    fn deref(&self) -> &Self::Target {
        &self.transaction
    }
}

impl DerefMut for TransactionGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.transaction
    }
}
