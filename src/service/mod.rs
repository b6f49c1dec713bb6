//! The mutation pipeline.
//!
//! Every mutating call runs the same four steps:
//!
//! 1. Validate the batch and gather the rows it touches, checking the
//!    caller's role against each target's workspace. Nothing is written yet.
//! 2. Build the new rows (or the patches for delta updates) in memory.
//! 3. Apply every write inside one transaction. Any error rolls the whole
//!    batch back and nothing is published.
//! 4. After commit, publish one event per applied change, in request order.

mod access;
mod assert;
mod body_raw;
mod http;
mod key_value;
mod response;
mod run;

pub use access::Access;
pub use run::{AssertOutcome, ExecutionOutcome, Executor};

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::events::Streams;
use crate::store::{Membership, SqliteStore};
use crate::types::{Http, Id};

pub struct Service {
    store: Arc<SqliteStore>,
    streams: Arc<Streams>,
    executor: Option<Arc<dyn Executor>>,
}

impl Service {
    pub fn new(store: Arc<SqliteStore>, streams: Arc<Streams>) -> Self {
        Self {
            store,
            streams,
            executor: None,
        }
    }

    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn store(&self) -> &Arc<SqliteStore> {
        &self.store
    }

    pub fn streams(&self) -> &Arc<Streams> {
        &self.streams
    }

    pub fn membership(&self) -> &dyn Membership {
        self.store.as_ref()
    }

    fn access(&self, user_id: Id) -> Access<'_> {
        Access::new(self.store.as_ref(), user_id)
    }

    /// Workspaces whose rows a collection call returns.
    fn user_workspaces(&self, user_id: Id) -> Result<Vec<Id>> {
        self.store
            .read(|q| q.workspaces().list_user_workspace_ids(user_id))
    }

    fn get_http(&self, id: Id) -> Result<Http> {
        self.store
            .read(|q| q.http().get(id))?
            .ok_or_else(|| Error::not_found("http"))
    }

    /// The entry a base child is written under.
    fn get_base_http(&self, id: Id) -> Result<Http> {
        let http = self.get_http(id)?;
        if http.is_delta {
            return Err(Error::invalid("http entry is a delta, use the delta call"));
        }
        if http.is_snapshot {
            return Err(Error::invalid("snapshot entries are immutable"));
        }
        Ok(http)
    }

    /// The entry a delta child is written under.
    fn get_delta_http(&self, id: Id) -> Result<Http> {
        let http = self.get_http(id)?;
        if !http.is_delta {
            return Err(Error::NotDelta("http".into()));
        }
        Ok(http)
    }
}

fn require_items<T>(items: &[T]) -> Result<()> {
    if items.is_empty() {
        return Err(Error::invalid("request has no items"));
    }
    Ok(())
}
