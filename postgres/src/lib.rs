//! `PostgreSQL` storage for Gatepass.
//!
//! Implements every repository trait and the [`StoreTx`] unit of work from
//! `gatepass-core` on top of a `sqlx` connection pool. Contended counters
//! (payment status, inventory, wallet balance, scan state) are only ever
//! changed by conditional `UPDATE ... WHERE guard RETURNING` statements, so
//! correctness never depends on an application-level lock.
//!
//! # Example
//!
//! ```ignore
//! use gatepass_postgres::PostgresStore;
//! use std::time::Duration;
//!
//! let store = PostgresStore::connect("postgres://localhost/gatepass", 10, Duration::from_secs(5)).await?;
//! store.migrate().await?;
//! ```
//!
//! [`StoreTx`]: gatepass_core::store::StoreTx

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod ops;
mod repositories;
mod rows;
mod tx;

pub use tx::PostgresTx;

use async_trait::async_trait;
use gatepass_core::error::StoreError;
use gatepass_core::store::{Store, StoreTx};
use rows::db_error;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

/// Pool-backed store.
#[derive(Clone, Debug)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect with a bounded pool.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backend`] if no connection can be established within
    /// `connect_timeout`.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        connect_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(connect_timeout)
            .connect(url)
            .await
            .map_err(db_error)?;

        tracing::info!(max_connections, "Connected to Postgres");
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the bundled migrations.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backend`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(format!("migration failed: {e}")))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let tx = self.pool.begin().await.map_err(db_error)?;
        Ok(Box::new(PostgresTx::new(tx)))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }
}
