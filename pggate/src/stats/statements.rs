//! Write statement counters.

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;

use super::registry::{Entry, Registry};
use super::Error;
use crate::gate::{self, MetricsHook, WriteOp};

static STATEMENT_METRICS: Lazy<Arc<StatementMetrics>> = Lazy::new(StatementMetrics::new);

/// One counter per write kind, plus one for failed writes.
#[derive(Debug)]
pub struct StatementMetrics {
    insert: Arc<Entry>,
    update: Arc<Entry>,
    delete: Arc<Entry>,
    errors: Arc<Entry>,
}

impl StatementMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            insert: Entry::new("insert_stmt"),
            update: Entry::new("update_stmt"),
            delete: Entry::new("delete_stmt"),
            errors: Entry::new("write_errors"),
        })
    }

    /// Counters shared by every session in the process.
    pub fn global() -> Arc<Self> {
        STATEMENT_METRICS.clone()
    }

    pub fn entry(&self, op: WriteOp) -> &Arc<Entry> {
        match op {
            WriteOp::Insert => &self.insert,
            WriteOp::Update => &self.update,
            WriteOp::Delete => &self.delete,
        }
    }

    pub fn errors(&self) -> &Arc<Entry> {
        &self.errors
    }

    pub fn entries(&self) -> Vec<Arc<Entry>> {
        vec![
            self.insert.clone(),
            self.update.clone(),
            self.delete.clone(),
            self.errors.clone(),
        ]
    }

    /// Make these counters the registry's table.
    pub fn register(&self, registry: &Registry, node_name: &str) -> Result<(), Error> {
        registry.register(self.entries(), node_name)
    }
}

impl MetricsHook for StatementMetrics {
    fn completed(&self, op: WriteOp, elapsed: Duration) {
        self.entry(op).record(elapsed);
    }

    fn failed(&self, _op: WriteOp, elapsed: Duration, _error: &gate::Error) {
        self.errors.record(elapsed);
    }
}
