//! Explicit transaction scope shared by workflows and storage gateways.
//!
//! A [`Scope`] is owned by whoever starts a unit of work and is passed by
//! `&mut` into every gateway call. Gateways ask it for the active
//! transaction handle and fall back to their default connection when there
//! is none. [`UnitOfWork`] opens a transaction in a scope, or joins the one
//! already there, so workflows can call into each other without committing
//! twice.

use async_trait::async_trait;

use crate::error::AppError;

/// Request-scoped transaction handle.
///
/// Either detached (gateways use their default connection) or carrying an
/// open backend transaction of type `T`.
#[derive(Debug)]
pub struct Scope<T> {
    tx: Option<T>,
}

impl<T> Scope<T> {
    /// A detached scope with no transaction.
    pub fn new() -> Self {
        Self { tx: None }
    }

    /// Whether a transaction is currently open in this scope.
    pub fn is_active(&self) -> bool {
        self.tx.is_some()
    }

    /// The active transaction handle, if any.
    pub fn handle(&mut self) -> Option<&mut T> {
        self.tx.as_mut()
    }
}

impl<T> Default for Scope<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Backend capable of opening and committing transactions.
///
/// Dropping a `Tx` that was never committed must roll it back.
#[async_trait]
pub trait Transactor: Send + Sync {
    type Tx: Send + 'static;

    async fn begin(&self) -> Result<Self::Tx, AppError>;

    async fn commit(&self, tx: Self::Tx) -> Result<(), AppError>;
}

/// An atomic unit of work bound to a [`Scope`].
///
/// Obtained with [`UnitOfWork::enter`]. If the scope already carried a
/// transaction the unit joins it and [`commit`](Self::commit) does nothing;
/// the outermost owner decides. An owning unit that is dropped without
/// committing (early `?` return, panic, cancelled future) rolls back.
pub struct UnitOfWork<'s, T: Send + 'static> {
    transactor: &'s (dyn Transactor<Tx = T> + 's),
    scope: &'s mut Scope<T>,
    owner: bool,
}

impl<'s, T: Send + 'static> UnitOfWork<'s, T> {
    /// Start a unit of work, or join the one already open in `scope`.
    pub async fn enter(
        transactor: &'s (dyn Transactor<Tx = T> + 's),
        scope: &'s mut Scope<T>,
    ) -> Result<Self, AppError> {
        let owner = !scope.is_active();
        if owner {
            scope.tx = Some(transactor.begin().await?);
        }

        Ok(Self {
            transactor,
            scope,
            owner,
        })
    }

    /// The scope to hand to gateway calls inside this unit of work.
    pub fn scope(&mut self) -> &mut Scope<T> {
        self.scope
    }

    /// Whether this unit began the transaction (as opposed to joining one).
    pub fn is_owner(&self) -> bool {
        self.owner
    }

    /// Commit the transaction if this unit owns it.
    pub async fn commit(self) -> Result<(), AppError> {
        if !self.owner {
            return Ok(());
        }

        match self.scope.tx.take() {
            Some(tx) => self.transactor.commit(tx).await,
            None => Err(AppError::internal("transaction already finished")),
        }
    }
}

impl<T: Send + 'static> Drop for UnitOfWork<'_, T> {
    fn drop(&mut self) {
        if self.owner {
            if let Some(tx) = self.scope.tx.take() {
                log::debug!("[tx] rolling back uncommitted unit of work");
                drop(tx);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Counts begins, commits and rollbacks.
    #[derive(Default)]
    struct Counters {
        begun: AtomicUsize,
        committed: AtomicUsize,
        rolled_back: AtomicUsize,
    }

    struct CountingTx {
        counters: Arc<Counters>,
        committed: bool,
    }

    impl Drop for CountingTx {
        fn drop(&mut self) {
            if !self.committed {
                self.counters.rolled_back.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    struct CountingTransactor {
        counters: Arc<Counters>,
    }

    #[async_trait]
    impl Transactor for CountingTransactor {
        type Tx = CountingTx;

        async fn begin(&self) -> Result<CountingTx, AppError> {
            self.counters.begun.fetch_add(1, Ordering::SeqCst);
            Ok(CountingTx {
                counters: self.counters.clone(),
                committed: false,
            })
        }

        async fn commit(&self, mut tx: CountingTx) -> Result<(), AppError> {
            tx.committed = true;
            self.counters.committed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn transactor() -> (CountingTransactor, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        (
            CountingTransactor {
                counters: counters.clone(),
            },
            counters,
        )
    }

    #[tokio::test]
    async fn test_commit_owned_transaction() {
        let (transactor, counters) = transactor();
        let mut scope = Scope::new();

        let mut uow = UnitOfWork::enter(&transactor, &mut scope).await.unwrap();
        assert!(uow.is_owner());
        assert!(uow.scope().is_active());
        uow.commit().await.unwrap();

        assert!(!scope.is_active());
        assert_eq!(counters.begun.load(Ordering::SeqCst), 1);
        assert_eq!(counters.committed.load(Ordering::SeqCst), 1);
        assert_eq!(counters.rolled_back.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_drop_without_commit_rolls_back() {
        let (transactor, counters) = transactor();
        let mut scope = Scope::new();

        async fn step(fail: bool) -> Result<(), AppError> {
            if fail {
                return Err(AppError::no_candidate("pr-1"));
            }
            Ok(())
        }

        async fn run(
            transactor: &CountingTransactor,
            scope: &mut Scope<CountingTx>,
        ) -> Result<(), AppError> {
            let uow = UnitOfWork::enter(transactor, scope).await?;
            step(true).await?;
            uow.commit().await
        }

        let err = run(&transactor, &mut scope).await.unwrap_err();
        assert!(matches!(err, AppError::NoCandidate { .. }));
        assert!(!scope.is_active());
        assert_eq!(counters.committed.load(Ordering::SeqCst), 0);
        assert_eq!(counters.rolled_back.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_nested_unit_joins_outer_transaction() {
        let (transactor, counters) = transactor();
        let mut scope = Scope::new();

        let mut outer = UnitOfWork::enter(&transactor, &mut scope).await.unwrap();
        {
            let inner = UnitOfWork::enter(&transactor, outer.scope()).await.unwrap();
            assert!(!inner.is_owner());
            inner.commit().await.unwrap();
        }
        // The inner commit must not finish the outer transaction.
        assert!(outer.scope().is_active());
        assert_eq!(counters.committed.load(Ordering::SeqCst), 0);

        outer.commit().await.unwrap();
        assert_eq!(counters.begun.load(Ordering::SeqCst), 1);
        assert_eq!(counters.committed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dropped_inner_unit_leaves_outer_open() {
        let (transactor, counters) = transactor();
        let mut scope = Scope::new();

        let mut outer = UnitOfWork::enter(&transactor, &mut scope).await.unwrap();
        drop(UnitOfWork::enter(&transactor, outer.scope()).await.unwrap());

        assert!(outer.scope().is_active());
        assert_eq!(counters.rolled_back.load(Ordering::SeqCst), 0);
        drop(outer);
        assert_eq!(counters.rolled_back.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panic_inside_unit_rolls_back() {
        let (transactor, counters) = transactor();
        let transactor = Arc::new(transactor);

        let task_transactor = transactor.clone();
        let result = tokio::spawn(async move {
            let mut scope = Scope::new();
            let _uow = UnitOfWork::enter(task_transactor.as_ref(), &mut scope)
                .await
                .unwrap();
            panic!("operation aborted");
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counters.rolled_back.load(Ordering::SeqCst), 1);
        assert_eq!(counters.committed.load(Ordering::SeqCst), 0);
    }
}
