//! SQLite transactions and connection selection for the gateways.

use std::ops::{Deref, DerefMut};

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, Transaction};

use super::pool::DbPool;
use crate::error::AppError;
use crate::repository::{Scope, Transactor};

/// Transaction handle carried by a SQLite [`Scope`].
///
/// Dropping it without committing rolls back.
pub type SqliteTx = Transaction<'static, Sqlite>;

/// Opens and commits transactions on the pool.
///
/// Every unit of work writes, so transactions start with `BEGIN IMMEDIATE`
/// and take the write lock up front. Concurrent units of work then wait on
/// the connection's busy timeout instead of failing when a deferred read
/// lock cannot be upgraded.
#[derive(Clone)]
pub struct SqliteTransactor {
    pool: DbPool,
}

impl SqliteTransactor {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Transactor for SqliteTransactor {
    type Tx = SqliteTx;

    async fn begin(&self) -> Result<SqliteTx, AppError> {
        self.pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(op_err("transaction.begin"))
    }

    async fn commit(&self, tx: SqliteTx) -> Result<(), AppError> {
        tx.commit().await.map_err(op_err("transaction.commit"))
    }
}

/// A connection to run one gateway call on.
///
/// Either the scope's open transaction or a connection checked out of the
/// pool for the duration of the call.
pub(crate) enum Conn<'a> {
    Scoped(&'a mut SqliteConnection),
    Pooled(PoolConnection<Sqlite>),
}

impl Deref for Conn<'_> {
    type Target = SqliteConnection;

    fn deref(&self) -> &SqliteConnection {
        match self {
            Conn::Scoped(conn) => conn,
            Conn::Pooled(conn) => conn,
        }
    }
}

impl DerefMut for Conn<'_> {
    fn deref_mut(&mut self) -> &mut SqliteConnection {
        match self {
            Conn::Scoped(conn) => conn,
            Conn::Pooled(conn) => conn,
        }
    }
}

/// The active transaction of `scope`, or a pooled connection when detached.
pub(crate) async fn acquire<'a>(
    pool: &DbPool,
    scope: &'a mut Scope<SqliteTx>,
) -> Result<Conn<'a>, AppError> {
    match scope.handle() {
        Some(tx) => Ok(Conn::Scoped(&mut **tx)),
        None => {
            let conn = pool.acquire().await.map_err(op_err("pool.acquire"))?;
            Ok(Conn::Pooled(conn))
        }
    }
}

/// Map a driver error to a database error labelled with `operation`.
pub(crate) fn op_err(operation: &'static str) -> impl Fn(sqlx::Error) -> AppError {
    move |err| AppError::from(err).with_operation(operation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::UnitOfWork;
    use tempfile::tempdir;

    async fn count_rows(pool: &DbPool) -> i64 {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM teams")
            .fetch_one(pool)
            .await
            .unwrap();
        row.0
    }

    #[tokio::test]
    async fn test_acquire_follows_the_scope() {
        let dir = tempdir().unwrap();
        let pool = crate::db::initialize(&dir.path().join("test.db")).await.unwrap();
        let transactor = SqliteTransactor::new(pool.clone());
        let mut scope = Scope::new();

        {
            let conn = acquire(&pool, &mut scope).await.unwrap();
            assert!(matches!(conn, Conn::Pooled(_)));
        }

        let mut uow = UnitOfWork::enter(&transactor, &mut scope).await.unwrap();
        {
            let mut conn = acquire(&pool, uow.scope()).await.unwrap();
            assert!(matches!(conn, Conn::Scoped(_)));
            sqlx::query("INSERT INTO teams (name) VALUES ('backend')")
                .execute(&mut *conn)
                .await
                .unwrap();
        }
        assert_eq!(count_rows(&pool).await, 0);

        uow.commit().await.unwrap();
        assert_eq!(count_rows(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_transaction_holds_write_lock_from_begin() {
        let dir = tempdir().unwrap();
        let pool = crate::db::initialize(&dir.path().join("test.db")).await.unwrap();
        let transactor = SqliteTransactor::new(pool.clone());

        let mut first = transactor.begin().await.unwrap();
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM teams")
            .fetch_one(&mut *first)
            .await
            .unwrap();
        assert_eq!(count.0, 0);

        // A second writer queues behind the first instead of failing.
        let second = tokio::spawn({
            let transactor = transactor.clone();
            async move {
                let mut tx = transactor.begin().await.unwrap();
                sqlx::query("INSERT INTO teams (name) VALUES ('frontend')")
                    .execute(&mut *tx)
                    .await
                    .unwrap();
                transactor.commit(tx).await.unwrap();
            }
        });

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        sqlx::query("INSERT INTO teams (name) VALUES ('backend')")
            .execute(&mut *first)
            .await
            .unwrap();
        transactor.commit(first).await.unwrap();

        second.await.unwrap();
        assert_eq!(count_rows(&pool).await, 2);
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let dir = tempdir().unwrap();
        let pool = crate::db::initialize(&dir.path().join("test.db")).await.unwrap();
        let transactor = SqliteTransactor::new(pool.clone());

        let mut tx = transactor.begin().await.unwrap();
        sqlx::query("INSERT INTO teams (name) VALUES ('backend')")
            .execute(&mut *tx)
            .await
            .unwrap();
        drop(tx);

        assert_eq!(count_rows(&pool).await, 0);
    }
}
