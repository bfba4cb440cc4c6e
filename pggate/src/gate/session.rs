//! Session with the storage cluster.
//!
//! A session is shared by every statement issued on one logical
//! connection. Cloning it is cheap and only bumps a reference count;
//! the session stays alive for as long as any statement holds it.
//!
//! All mutable state (registered tables, dispatch sequence, transaction
//! context) lives behind the session's own lock. Statements never touch it
//! directly: they call [`Session::dispatch`], which is safe to call
//! concurrently from any number of statements.
//!
//! Closing the session cancels every write still waiting on the storage
//! tier. Those writes resolve with [`Error::Cancelled`].

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use fnv::FnvHashMap as HashMap;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::select;
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::{Error, ObjectId, TableDesc, WriteOp, WriteOutcome, WriteRequest};
use crate::config::config;
use crate::storage::Storage;
use crate::util::human_duration;

/// Receives write completions, e.g. to count them.
pub trait MetricsHook: Send + Sync {
    /// Write finished successfully.
    fn completed(&self, op: WriteOp, elapsed: Duration);
    /// Write failed.
    fn failed(&self, op: WriteOp, elapsed: Duration, error: &Error);
}

#[derive(Default, Debug)]
struct State {
    tables: HashMap<ObjectId, Arc<TableDesc>>,
    sequence: u64,
    in_flight: usize,
    dispatched: u64,
    txn: Option<u64>,
    txn_counter: u64,
    closed: bool,
}

struct Inner {
    id: Uuid,
    storage: Arc<dyn Storage>,
    metrics: Option<Arc<dyn MetricsHook>>,
    conditional_delete: bool,
    dispatch_timeout: Duration,
    cancel: CancellationToken,
    state: Mutex<State>,
}

/// Shared session handle.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("usable", &self.is_usable())
            .finish()
    }
}

/// Session builder.
pub struct Builder {
    storage: Arc<dyn Storage>,
    metrics: Option<Arc<dyn MetricsHook>>,
    conditional_delete: bool,
    dispatch_timeout: Duration,
}

impl Builder {
    /// Report write completions to this hook.
    pub fn metrics(mut self, metrics: Arc<dyn MetricsHook>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Allow DELETE to filter on non-key columns.
    pub fn conditional_delete(mut self, enabled: bool) -> Self {
        self.conditional_delete = enabled;
        self
    }

    /// How long to wait for the storage tier.
    pub fn dispatch_timeout(mut self, dispatch_timeout: Duration) -> Self {
        self.dispatch_timeout = dispatch_timeout;
        self
    }

    pub fn build(self) -> Session {
        let session = Session {
            inner: Arc::new(Inner {
                id: Uuid::new_v4(),
                storage: self.storage,
                metrics: self.metrics,
                conditional_delete: self.conditional_delete,
                dispatch_timeout: self.dispatch_timeout,
                cancel: CancellationToken::new(),
                state: Mutex::new(State::default()),
            }),
        };
        debug!("session {} opened", session.id());
        session
    }
}

impl Session {
    /// Session with settings from the current configuration.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::builder(storage).build()
    }

    /// Start building a session, with defaults from the current configuration.
    pub fn builder(storage: Arc<dyn Storage>) -> Builder {
        let general = &config().general;
        Builder {
            storage,
            metrics: None,
            conditional_delete: general.conditional_delete,
            dispatch_timeout: general.dispatch_timeout(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Session can accept new writes.
    pub fn is_usable(&self) -> bool {
        !self.inner.state.lock().closed && !self.inner.cancel.is_cancelled()
    }

    /// Close the session. Writes waiting on the storage tier are cancelled
    /// and an open transaction is rolled back in the background.
    pub fn close(&self) {
        let (in_flight, txn) = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            (state.in_flight, state.txn.take())
        };
        self.inner.cancel.cancel();
        debug!(
            "session {} closed [{} writes cancelled]",
            self.id(),
            in_flight
        );

        if let Some(txn) = txn {
            self.abandon(txn);
        }
    }

    fn abandon(&self, txn: u64) {
        let Ok(runtime) = Handle::try_current() else {
            warn!(
                "transaction {} left open, no runtime to roll it back [session: {}]",
                txn,
                self.id()
            );
            return;
        };

        let storage = self.inner.storage.clone();
        let id = self.id();
        runtime.spawn(async move {
            match storage.finish(txn, false).await {
                Ok(()) => debug!("transaction {} rolled back [session: {}]", txn, id),
                Err(err) => error!(
                    "transaction {} rollback failed: {} [session: {}]",
                    txn, err, id
                ),
            }
        });
    }

    /// DELETE may filter on non-key columns.
    pub fn conditional_delete(&self) -> bool {
        self.inner.conditional_delete
    }

    /// Register a table descriptor supplied by the catalog.
    ///
    /// Replaces any previous descriptor for the same table. Statements
    /// that already allocated their request keep the old one.
    pub fn register_table(&self, table: TableDesc) -> Result<(), Error> {
        if !table.id().is_valid() {
            return Err(Error::InvalidArgument(format!(
                "malformed table identifier \"{}\"",
                table.id()
            )));
        }

        if table.key_columns().is_empty() {
            return Err(Error::InvalidArgument(format!(
                "table \"{}\" has no primary key",
                table.id()
            )));
        }

        self.inner
            .state
            .lock()
            .tables
            .insert(table.id().clone(), Arc::new(table));
        Ok(())
    }

    /// Registered table descriptor.
    pub fn table(&self, id: &ObjectId) -> Option<Arc<TableDesc>> {
        self.inner.state.lock().tables.get(id).cloned()
    }

    /// Number of writes waiting on the storage tier.
    pub fn in_flight(&self) -> usize {
        self.inner.state.lock().in_flight
    }

    /// Number of writes handed to the storage tier so far.
    pub fn dispatched(&self) -> u64 {
        self.inner.state.lock().dispatched
    }

    /// Current transaction.
    pub fn txn(&self) -> Option<u64> {
        self.inner.state.lock().txn
    }

    pub fn in_transaction(&self) -> bool {
        self.txn().is_some()
    }

    /// Start a transaction. Writes dispatched until commit
    /// or rollback are tagged with its id.
    pub fn begin(&self) -> Result<u64, Error> {
        let mut state = self.inner.state.lock();
        if state.closed {
            return Err(Error::Cancelled);
        }
        if state.txn.is_some() {
            return Err(Error::TransactionInProgress);
        }
        state.txn_counter += 1;
        state.txn = Some(state.txn_counter);
        Ok(state.txn_counter)
    }

    /// Commit the current transaction.
    pub async fn commit(&self) -> Result<(), Error> {
        self.finish(true).await
    }

    /// Roll back the current transaction.
    pub async fn rollback(&self) -> Result<(), Error> {
        self.finish(false).await
    }

    /// Send a write request to the storage tier and wait for the result.
    ///
    /// Storage errors are returned as-is. Nothing is retried.
    pub async fn dispatch(&self, mut request: WriteRequest) -> Result<WriteOutcome, Error> {
        let op = request.op;
        {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(Error::Cancelled);
            }
            state.sequence += 1;
            state.dispatched += 1;
            state.in_flight += 1;
            request.sequence = Some(state.sequence);
            request.txn = state.txn;
        }

        let _in_flight = InFlight(&self.inner);
        let started = Instant::now();

        debug!(
            "dispatching {} on \"{}\" [session: {}, seq: {:?}]",
            op,
            request.table_id,
            self.id(),
            request.sequence,
        );

        let result = select! {
            biased;

            _ = self.inner.cancel.cancelled() => Err(Error::Cancelled),

            result = timeout(self.inner.dispatch_timeout, self.inner.storage.write(&request)) => {
                match result {
                    Ok(Ok(outcome)) => Ok(outcome),
                    Ok(Err(err)) => Err(Error::Storage(err)),
                    Err(_) => Err(Error::DispatchTimeout(self.inner.dispatch_timeout)),
                }
            }
        };

        let elapsed = started.elapsed();

        match result {
            Ok(ref outcome) => {
                debug!(
                    "{} on \"{}\" affected {} rows in {}",
                    op,
                    request.table_id,
                    outcome.rows_affected,
                    human_duration(elapsed)
                );
                if let Some(ref metrics) = self.inner.metrics {
                    metrics.completed(op, elapsed);
                }
            }

            Err(ref err) => {
                error!(
                    "{} on \"{}\" failed: {} [session: {}]",
                    op,
                    request.table_id,
                    err,
                    self.id()
                );
                if let Some(ref metrics) = self.inner.metrics {
                    metrics.failed(op, elapsed, err);
                }
            }
        }

        result
    }

    async fn finish(&self, commit: bool) -> Result<(), Error> {
        let txn = {
            let mut state = self.inner.state.lock();
            state.txn.take().ok_or(Error::NoTransaction)?
        };

        self.inner.storage.finish(txn, commit).await?;
        debug!(
            "transaction {} {} [session: {}]",
            txn,
            if commit { "committed" } else { "rolled back" },
            self.id()
        );

        Ok(())
    }
}

// Decrements the in-flight counter even if the dispatch
// future is dropped before it completes.
struct InFlight<'a>(&'a Inner);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.state.lock().in_flight -= 1;
    }
}
