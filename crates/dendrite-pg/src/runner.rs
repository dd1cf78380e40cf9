//! Query execution indirection: the RLS/transaction hook.
//!
//! Every statement the store issues goes through a [`QueryRunner`]. The
//! default [`PoolRunner`] runs directly on the pool, opening a transaction
//! only when the extension needs `SET LOCAL enable_seqscan = off` for HNSW
//! (pg_embedding). [`RlsQueryRunner`] additionally applies caller-bound
//! session settings via `set_config(key, value, true)` so that row-level
//! security policies can read them for the duration of the query; the
//! `true` makes every setting transaction-local, so pooled connections are
//! returned clean.
//!
//! The runner is wired at store construction — composition, not
//! subclassing.

use async_trait::async_trait;

use dendrite_core::DendriteError;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool};

use crate::scalar::{bind_values, SqlValue};

/// A fully assembled statement plus its execution requirements.
#[derive(Debug)]
pub struct StoreQuery<'a> {
    pub sql: &'a str,
    pub params: &'a [SqlValue],
    /// The query must run in a transaction that first issues
    /// `SET LOCAL enable_seqscan = off` (pg_embedding + HNSW).
    pub disable_seqscan: bool,
}

/// Executes store statements, optionally wrapping them in a transaction
/// with per-query session state.
#[async_trait]
pub trait QueryRunner: Send + Sync {
    async fn fetch(
        &self,
        pool: &PgPool,
        query: StoreQuery<'_>,
    ) -> Result<Vec<PgRow>, DendriteError>;

    async fn execute(&self, pool: &PgPool, query: StoreQuery<'_>) -> Result<(), DendriteError>;
}

fn db_err(context: &str, e: sqlx::Error) -> DendriteError {
    DendriteError::Database(format!("{context}: {e}"))
}

async fn disable_seqscan(conn: &mut PgConnection) -> Result<(), DendriteError> {
    sqlx::query("SET LOCAL enable_seqscan = off")
        .execute(conn)
        .await
        .map_err(|e| db_err("disable seqscan", e))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// PoolRunner
// ---------------------------------------------------------------------------

/// Default runner: no session state of its own.
#[derive(Debug, Default, Clone)]
pub struct PoolRunner;

#[async_trait]
impl QueryRunner for PoolRunner {
    async fn fetch(
        &self,
        pool: &PgPool,
        query: StoreQuery<'_>,
    ) -> Result<Vec<PgRow>, DendriteError> {
        if query.disable_seqscan {
            let mut tx = pool.begin().await.map_err(|e| db_err("begin", e))?;
            disable_seqscan(&mut tx).await?;
            let rows = bind_values(sqlx::query(query.sql), query.params)
                .fetch_all(&mut *tx)
                .await
                .map_err(|e| db_err("fetch", e))?;
            tx.commit().await.map_err(|e| db_err("commit", e))?;
            Ok(rows)
        } else {
            bind_values(sqlx::query(query.sql), query.params)
                .fetch_all(pool)
                .await
                .map_err(|e| db_err("fetch", e))
        }
    }

    async fn execute(&self, pool: &PgPool, query: StoreQuery<'_>) -> Result<(), DendriteError> {
        bind_values(sqlx::query(query.sql), query.params)
            .execute(pool)
            .await
            .map_err(|e| db_err("execute", e))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RlsQueryRunner
// ---------------------------------------------------------------------------

/// Runner that binds session settings (e.g. `request.jwt.claims`) inside a
/// transaction around every query, for Postgres row-level security.
///
/// The extension's `SET LOCAL enable_seqscan = off` (when required) is
/// issued inside the same transaction, after the settings, so there is a
/// single transactional scope per query.
#[derive(Debug, Default, Clone)]
pub struct RlsQueryRunner {
    settings: Vec<(String, String)>,
}

impl RlsQueryRunner {
    pub fn new(settings: Vec<(String, String)>) -> Self {
        Self { settings }
    }

    /// Add one `set_config` key/value pair.
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.push((key.into(), value.into()));
        self
    }

    pub fn settings(&self) -> &[(String, String)] {
        &self.settings
    }

    async fn apply_settings(&self, conn: &mut PgConnection) -> Result<(), DendriteError> {
        for (key, value) in &self.settings {
            sqlx::query("SELECT set_config($1, $2, true)")
                .bind(key)
                .bind(value)
                .execute(&mut *conn)
                .await
                .map_err(|e| db_err("set_config", e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl QueryRunner for RlsQueryRunner {
    async fn fetch(
        &self,
        pool: &PgPool,
        query: StoreQuery<'_>,
    ) -> Result<Vec<PgRow>, DendriteError> {
        let mut tx = pool.begin().await.map_err(|e| db_err("begin", e))?;
        self.apply_settings(&mut tx).await?;
        if query.disable_seqscan {
            disable_seqscan(&mut tx).await?;
        }
        let rows = bind_values(sqlx::query(query.sql), query.params)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| db_err("fetch", e))?;
        tx.commit().await.map_err(|e| db_err("commit", e))?;
        Ok(rows)
    }

    async fn execute(&self, pool: &PgPool, query: StoreQuery<'_>) -> Result<(), DendriteError> {
        let mut tx = pool.begin().await.map_err(|e| db_err("begin", e))?;
        self.apply_settings(&mut tx).await?;
        if query.disable_seqscan {
            disable_seqscan(&mut tx).await?;
        }
        bind_values(sqlx::query(query.sql), query.params)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("execute", e))?;
        tx.commit().await.map_err(|e| db_err("commit", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rls_runner_collects_settings() {
        let runner = RlsQueryRunner::default()
            .with_setting("request.jwt.claims", "{\"sub\":\"user-1\"}")
            .with_setting("app.tenant", "acme");
        assert_eq!(runner.settings().len(), 2);
        assert_eq!(runner.settings()[0].0, "request.jwt.claims");
        assert_eq!(runner.settings()[1].1, "acme");
    }
}
