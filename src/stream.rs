//! The per-call loop behind every `...Sync` RPC.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::events::{Topic, WorkspaceTopic};
use crate::store::Membership;
use crate::types::Id;

/// Workspaces the caller was found to belong to. Lives for one stream and
/// is never invalidated, so access revoked mid-stream takes effect on
/// reconnect.
pub struct MembershipCache {
    membership: Arc<dyn Membership>,
    user_id: Id,
    accepted: HashSet<Id>,
}

impl MembershipCache {
    pub fn new(membership: Arc<dyn Membership>, user_id: Id) -> Self {
        Self {
            membership,
            user_id,
            accepted: HashSet::new(),
        }
    }

    pub fn accepts(&mut self, topic: &WorkspaceTopic) -> bool {
        if self.accepted.contains(&topic.workspace_id) {
            return true;
        }
        match self
            .membership
            .check_user_belongs_to_workspace(self.user_id, topic.workspace_id)
        {
            Ok(true) => {
                self.accepted.insert(topic.workspace_id);
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!(workspace_id = %topic.workspace_id, error = %e, "membership check failed");
                false
            }
        }
    }
}

/// Forwards events of `topic` that pass `members` to `tx` until `cancel`
/// fires or the receiving side goes away.
///
/// `convert` turns an event into its wire message; `None` drops the event.
/// A conversion error is logged and the event skipped. A failed send ends
/// the stream with [`Error::StreamClosed`].
pub async fn drive<E, M, C>(
    family: &'static str,
    topic: &Topic<E>,
    cancel: CancellationToken,
    mut members: MembershipCache,
    mut convert: C,
    tx: mpsc::Sender<M>,
) -> Result<()>
where
    E: Send + Sync + 'static,
    C: FnMut(&E) -> Result<Option<M>>,
{
    let user_id = members.user_id;
    let mut sub = topic.subscribe(cancel.clone(), move |t| members.accepts(t));
    info!(family, user_id = %user_id, "stream opened");

    let result = loop {
        let envelope = match sub.recv().await {
            Ok(Some(envelope)) => envelope,
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        };

        let wire = match convert(&envelope.event) {
            Ok(Some(wire)) => wire,
            Ok(None) => continue,
            Err(e) => {
                warn!(family, error = %e, "dropping event that failed to convert");
                continue;
            }
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => break Ok(()),
            sent = tx.send(wire) => {
                if sent.is_err() {
                    break Err(Error::StreamClosed);
                }
                debug!(family, workspace_id = %envelope.topic.workspace_id, "event sent");
            }
        }
    };

    info!(family, user_id = %user_id, "stream closed");
    result
}
