//! Optional multi-write atomicity.
//!
//! Not every deployment topology can provide multi-document transactions
//! (the in-memory backend never can; a PostgreSQL pool can lose the
//! capability when the probe fails). The coordinator probes the backend
//! once per operation and either opens a real session or hands out a
//! detached context. The degraded mode is a fully supported topology, not
//! an error path: writes still happen, they are just not atomic as a
//! group.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{KernelError, KernelResult};

/// An open transactional session on the backing store.
///
/// `commit` and `abort` consume the underlying transaction; `end` releases
/// whatever is left of the session and must be safe to call after either.
#[async_trait]
pub trait StoreSession: Send + Sync {
    async fn commit(&mut self) -> anyhow::Result<()>;

    async fn abort(&mut self) -> anyhow::Result<()>;

    async fn end(&mut self) -> anyhow::Result<()>;

    /// Downcast hook so a backend can recover its concrete session type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Capability probe and session factory for a storage backend.
#[async_trait]
pub trait TransactionBackend: Send + Sync {
    /// Whether the current topology supports multi-write atomicity.
    async fn supports_transactions(&self) -> bool;

    /// Open a session with a started transaction.
    async fn begin(&self) -> anyhow::Result<Box<dyn StoreSession>>;
}

/// Exclusive owner of one open session.
///
/// The async mutex serializes all access; the handle is shared between the
/// context clones of a single logical operation and never across
/// operations.
pub struct SessionHandle {
    inner: Mutex<Box<dyn StoreSession>>,
}

impl SessionHandle {
    fn new(session: Box<dyn StoreSession>) -> Self {
        Self {
            inner: Mutex::new(session),
        }
    }

    /// Lock the session for use.
    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, Box<dyn StoreSession>> {
        self.inner.lock().await
    }
}

/// Handle for one write operation's (possibly absent) transactional scope.
///
/// Cloning is cheap and shares the same session; the correlation id is
/// stable across clones and survives into logs even in degraded mode.
#[derive(Clone)]
pub struct TransactionContext {
    session: Option<Arc<SessionHandle>>,
    transaction_id: Uuid,
}

impl TransactionContext {
    /// A context with no transactional scope. Used when the topology
    /// cannot provide atomicity and for standalone single-record writes.
    pub fn detached() -> Self {
        Self {
            session: None,
            transaction_id: Uuid::now_v7(),
        }
    }

    fn with_session(session: Box<dyn StoreSession>) -> Self {
        Self {
            session: Some(Arc::new(SessionHandle::new(session))),
            transaction_id: Uuid::now_v7(),
        }
    }

    /// Correlation id for audit/log lines, meaningful in both modes.
    pub fn transaction_id(&self) -> Uuid {
        self.transaction_id
    }

    /// Whether writes through this context join a real transaction.
    pub fn using_transaction(&self) -> bool {
        self.session.is_some()
    }

    /// The underlying session, when one is open.
    pub fn session(&self) -> Option<&Arc<SessionHandle>> {
        self.session.as_ref()
    }
}

/// Coordinates optional transactional scopes over a backend.
#[derive(Clone)]
pub struct TransactionCoordinator {
    backend: Arc<dyn TransactionBackend>,
}

impl TransactionCoordinator {
    pub fn new(backend: Arc<dyn TransactionBackend>) -> Self {
        Self { backend }
    }

    /// Probe the backend and open a context.
    ///
    /// Any probe or begin failure degrades silently to a detached context;
    /// atomicity is an optimization here, not a requirement.
    pub async fn create_context(&self) -> TransactionContext {
        if self.backend.supports_transactions().await {
            match self.backend.begin().await {
                Ok(session) => return TransactionContext::with_session(session),
                Err(error) => {
                    debug!(error = %error, "transaction begin failed, continuing without atomicity");
                }
            }
        }

        TransactionContext::detached()
    }

    /// Commit the context's transaction. No-op without a session.
    pub async fn commit(&self, ctx: &TransactionContext) -> KernelResult<()> {
        if let Some(handle) = ctx.session() {
            handle
                .lock()
                .await
                .commit()
                .await
                .map_err(KernelError::Storage)?;
        }

        Ok(())
    }

    /// Abort the context's transaction. No-op without a session.
    ///
    /// Abort failures are logged and swallowed so they can never mask the
    /// error that triggered the abort.
    pub async fn abort(&self, ctx: &TransactionContext) {
        if let Some(handle) = ctx.session() {
            if let Err(error) = handle.lock().await.abort().await {
                warn!(
                    transaction_id = %ctx.transaction_id(),
                    error = %error,
                    "transaction abort failed"
                );
            }
        }
    }

    /// Release the context's session. Runs on every exit path; failures
    /// are logged, never propagated.
    pub async fn end_session(&self, ctx: &TransactionContext) {
        if let Some(handle) = ctx.session() {
            if let Err(error) = handle.lock().await.end().await {
                warn!(
                    transaction_id = %ctx.transaction_id(),
                    error = %error,
                    "failed to release session"
                );
            }
        }
    }

    /// Run `op` inside an optionally transactional scope.
    ///
    /// Commits on success and aborts on error; the session is always
    /// released afterwards, and the operation's original error is the one
    /// returned. The context's correlation id accompanies the value.
    pub async fn run_in_transaction<T, F, Fut>(&self, op: F) -> KernelResult<(T, Uuid)>
    where
        F: FnOnce(TransactionContext) -> Fut,
        Fut: Future<Output = KernelResult<T>>,
    {
        let ctx = self.create_context().await;
        let transaction_id = ctx.transaction_id();

        let outcome = match op(ctx.clone()).await {
            Ok(value) => self.commit(&ctx).await.map(|()| (value, transaction_id)),
            Err(error) => {
                self.abort(&ctx).await;
                Err(error)
            }
        };

        self.end_session(&ctx).await;
        outcome
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Records which session methods ran, in order.
    #[derive(Clone, Default)]
    struct CallLog {
        calls: Arc<parking_lot::Mutex<Vec<&'static str>>>,
        fail_abort: bool,
    }

    impl CallLog {
        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().clone()
        }
    }

    struct RecordingSession {
        log: CallLog,
    }

    #[async_trait]
    impl StoreSession for RecordingSession {
        async fn commit(&mut self) -> anyhow::Result<()> {
            self.log.calls.lock().push("commit");
            Ok(())
        }

        async fn abort(&mut self) -> anyhow::Result<()> {
            self.log.calls.lock().push("abort");
            if self.log.fail_abort {
                anyhow::bail!("abort failed");
            }
            Ok(())
        }

        async fn end(&mut self) -> anyhow::Result<()> {
            self.log.calls.lock().push("end");
            Ok(())
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    struct RecordingBackend {
        log: CallLog,
        supported: bool,
        begins: AtomicUsize,
    }

    impl RecordingBackend {
        fn new(log: CallLog, supported: bool) -> Self {
            Self {
                log,
                supported,
                begins: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TransactionBackend for RecordingBackend {
        async fn supports_transactions(&self) -> bool {
            self.supported
        }

        async fn begin(&self) -> anyhow::Result<Box<dyn StoreSession>> {
            self.begins.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(RecordingSession {
                log: self.log.clone(),
            }))
        }
    }

    #[tokio::test]
    async fn unsupported_backend_yields_detached_context() {
        let log = CallLog::default();
        let coordinator =
            TransactionCoordinator::new(Arc::new(RecordingBackend::new(log.clone(), false)));

        let ctx = coordinator.create_context().await;
        assert!(!ctx.using_transaction());
        assert!(ctx.session().is_none());

        // commit/abort/end are no-ops on a detached context
        coordinator.commit(&ctx).await.unwrap();
        coordinator.abort(&ctx).await;
        coordinator.end_session(&ctx).await;
        assert!(log.calls().is_empty());
    }

    #[tokio::test]
    async fn success_commits_then_ends() {
        let log = CallLog::default();
        let backend = Arc::new(RecordingBackend::new(log.clone(), true));
        let coordinator = TransactionCoordinator::new(backend.clone());

        let (value, transaction_id) = coordinator
            .run_in_transaction(|ctx| async move {
                assert!(ctx.using_transaction());
                Ok(42)
            })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert!(!transaction_id.is_nil());
        assert_eq!(log.calls(), vec!["commit", "end"]);
        // one probe, one session per operation
        assert_eq!(backend.begins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_aborts_ends_and_returns_original_error() {
        let log = CallLog::default();
        let coordinator =
            TransactionCoordinator::new(Arc::new(RecordingBackend::new(log.clone(), true)));

        let result: KernelResult<(u32, Uuid)> = coordinator
            .run_in_transaction(|_ctx| async move { Err(KernelError::NotFound) })
            .await;

        assert!(matches!(result, Err(KernelError::NotFound)));
        assert_eq!(log.calls(), vec!["abort", "end"]);
    }

    #[tokio::test]
    async fn abort_failure_does_not_mask_operation_error() {
        let log = CallLog {
            fail_abort: true,
            ..CallLog::default()
        };
        let coordinator =
            TransactionCoordinator::new(Arc::new(RecordingBackend::new(log.clone(), true)));

        let result: KernelResult<(u32, Uuid)> = coordinator
            .run_in_transaction(|_ctx| async move {
                Err(KernelError::validation(0, "bad block"))
            })
            .await;

        // The validation error survives; the abort failure is only logged.
        assert!(matches!(result, Err(KernelError::Validation { index: 0, .. })));
        assert_eq!(log.calls(), vec!["abort", "end"]);
    }

    #[tokio::test]
    async fn detached_contexts_still_carry_correlation_ids() {
        let a = TransactionContext::detached();
        let b = TransactionContext::detached();
        assert_ne!(a.transaction_id(), b.transaction_id());
    }
}
