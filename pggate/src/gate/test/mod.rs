//! Test helpers.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::{ObjectId, Session, TableDesc, WriteOutcome, WriteRequest};
use crate::storage::{Storage, StorageError};

/// app.users (id PRIMARY KEY, name NOT NULL, email)
pub(crate) fn users() -> TableDesc {
    TableDesc::new(ObjectId::new("app", "users"))
        .key_column("id")
        .column("name", false)
        .column("email", true)
}

/// app.orders (h, r, k, PRIMARY KEY (h, r))
pub(crate) fn orders() -> TableDesc {
    TableDesc::new(ObjectId::new("app", "orders"))
        .key_column("h")
        .key_column("r")
        .column("k", true)
}

/// Session over a scripted storage, with app.users registered.
pub(crate) fn session() -> (Session, Arc<ScriptedStorage>) {
    let storage = ScriptedStorage::new();
    let session = Session::builder(storage.clone())
        .conditional_delete(false)
        .build();
    session.register_table(users()).unwrap();
    (session, storage)
}

/// Storage that records requests and replies with queued responses.
///
/// Replies with an empty outcome when nothing is queued.
/// A stalled storage never replies.
#[derive(Default)]
pub(crate) struct ScriptedStorage {
    requests: Mutex<Vec<WriteRequest>>,
    responses: Mutex<VecDeque<Result<WriteOutcome, StorageError>>>,
    finished: Mutex<Vec<(u64, bool)>>,
    received: Notify,
    stalled: bool,
}

impl ScriptedStorage {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn stalled() -> Arc<Self> {
        Arc::new(Self {
            stalled: true,
            ..Default::default()
        })
    }

    /// Queue a response.
    pub(crate) fn respond(&self, response: Result<WriteOutcome, StorageError>) {
        self.responses.lock().push_back(response);
    }

    pub(crate) fn requests(&self) -> Vec<WriteRequest> {
        self.requests.lock().clone()
    }

    pub(crate) fn finished(&self) -> Vec<(u64, bool)> {
        self.finished.lock().clone()
    }

    /// Wait until the storage received at least `count` requests.
    pub(crate) async fn wait_for_requests(&self, count: usize) {
        loop {
            let received = self.received.notified();
            if self.requests.lock().len() >= count {
                return;
            }
            received.await;
        }
    }
}

#[async_trait]
impl Storage for ScriptedStorage {
    async fn write(&self, request: &WriteRequest) -> Result<WriteOutcome, StorageError> {
        self.requests.lock().push(request.clone());
        self.received.notify_waiters();

        if self.stalled {
            futures::future::pending::<()>().await;
        }

        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(WriteOutcome::default()))
    }

    async fn finish(&self, txn: u64, commit: bool) -> Result<(), StorageError> {
        self.finished.lock().push((txn, commit));
        Ok(())
    }
}
