//! Change events and the per-family topic registry.
//!
//! Every entity family has a base stream and a delta stream; a change to a
//! row is published on exactly one of them, according to its `is_delta`
//! flag. Topics are workspaces.

use tracing::debug;

use crate::config::StreamConfig;
use crate::patch::{AssertDeltaPatch, BodyRawDeltaPatch, HttpDeltaPatch, KeyValueDeltaPatch};
use crate::pubsub::Multiplexer;
use crate::types::{
    Http, HttpAssert, HttpBodyRaw, HttpKeyValue, HttpResponse, HttpResponseAssert,
    HttpResponseHeader, HttpVersion, Id, KeyValueKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkspaceTopic {
    pub workspace_id: Id,
}

impl WorkspaceTopic {
    #[must_use]
    pub const fn new(workspace_id: Id) -> Self {
        Self { workspace_id }
    }
}

/// One committed change. Updates on delta streams carry the patch that was
/// applied; deletes carry the row as it was before removal.
#[derive(Debug, Clone, PartialEq)]
pub enum Change<T, P = ()> {
    Insert(T),
    Update { entity: T, patch: P },
    Delete(T),
}

impl<T, P> Change<T, P> {
    #[must_use]
    pub fn entity(&self) -> &T {
        match self {
            Self::Insert(entity) | Self::Update { entity, .. } | Self::Delete(entity) => entity,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Insert(_) => "insert",
            Self::Update { .. } => "update",
            Self::Delete(_) => "delete",
        }
    }
}

pub type Topic<E> = Multiplexer<WorkspaceTopic, E>;

/// A batch of changes queued by one RPC, published only after its
/// transaction committed.
pub struct Pending<E> {
    changes: Vec<(WorkspaceTopic, E)>,
}

impl<E> Default for Pending<E> {
    fn default() -> Self {
        Self {
            changes: Vec::new(),
        }
    }
}

impl<E: Send + Sync + 'static> Pending<E> {
    pub fn push(&mut self, workspace_id: Id, change: E) {
        self.changes.push((WorkspaceTopic::new(workspace_id), change));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Publishes every queued change in order.
    pub fn publish(self, family: &str, topic: &Topic<E>) {
        let count = self.changes.len();
        for (workspace, change) in self.changes {
            topic.publish(workspace, [change]);
        }
        debug!(family, count, "published");
    }
}

/// All topics of the server.
pub struct Streams {
    pub http: Topic<Change<Http>>,
    pub http_delta: Topic<Change<Http, HttpDeltaPatch>>,
    key_values: [Topic<Change<HttpKeyValue>>; 4],
    key_value_deltas: [Topic<Change<HttpKeyValue, KeyValueDeltaPatch>>; 4],
    pub asserts: Topic<Change<HttpAssert>>,
    pub assert_deltas: Topic<Change<HttpAssert, AssertDeltaPatch>>,
    pub body_raw: Topic<Change<HttpBodyRaw>>,
    pub body_raw_deltas: Topic<Change<HttpBodyRaw, BodyRawDeltaPatch>>,
    pub responses: Topic<Change<HttpResponse>>,
    pub response_headers: Topic<Change<HttpResponseHeader>>,
    pub response_asserts: Topic<Change<HttpResponseAssert>>,
    pub versions: Topic<Change<HttpVersion>>,
}

impl Streams {
    #[must_use]
    pub fn new(config: &StreamConfig) -> Self {
        let capacity = config.capacity;
        let policy = config.lag_policy;
        Self {
            http: Multiplexer::new(capacity, policy),
            http_delta: Multiplexer::new(capacity, policy),
            key_values: std::array::from_fn(|_| Multiplexer::new(capacity, policy)),
            key_value_deltas: std::array::from_fn(|_| Multiplexer::new(capacity, policy)),
            asserts: Multiplexer::new(capacity, policy),
            assert_deltas: Multiplexer::new(capacity, policy),
            body_raw: Multiplexer::new(capacity, policy),
            body_raw_deltas: Multiplexer::new(capacity, policy),
            responses: Multiplexer::new(capacity, policy),
            response_headers: Multiplexer::new(capacity, policy),
            response_asserts: Multiplexer::new(capacity, policy),
            versions: Multiplexer::new(capacity, policy),
        }
    }

    #[must_use]
    pub fn key_values(&self, kind: KeyValueKind) -> &Topic<Change<HttpKeyValue>> {
        &self.key_values[kind.index()]
    }

    #[must_use]
    pub fn key_value_deltas(
        &self,
        kind: KeyValueKind,
    ) -> &Topic<Change<HttpKeyValue, KeyValueDeltaPatch>> {
        &self.key_value_deltas[kind.index()]
    }
}

impl Default for Streams {
    fn default() -> Self {
        Self::new(&StreamConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use tokio_util::sync::CancellationToken;

    use super::*;

    #[tokio::test]
    async fn test_pending_publishes_in_order() {
        let streams = Streams::default();
        let mut sub = streams
            .versions
            .subscribe(CancellationToken::new(), |_| true);

        let ws = Id::new();
        let mut pending = Pending::default();
        for name in ["first", "second"] {
            pending.push(
                ws,
                Change::Insert(HttpVersion {
                    id: Id::new(),
                    http_id: Id::new(),
                    name: name.into(),
                    description: String::new(),
                    is_active: false,
                    created_by: None,
                    created_at: 0,
                }),
            );
        }
        assert_eq!(pending.len(), 2);
        pending.publish("HttpVersion", &streams.versions);

        for expected in ["first", "second"] {
            let envelope = sub.recv().await.unwrap().unwrap();
            assert_eq!(envelope.topic.workspace_id, ws);
            assert_eq!(envelope.event.entity().name, expected);
            assert_eq!(envelope.event.kind(), "insert");
        }
    }

    #[test]
    fn test_key_value_topics_are_distinct() {
        let streams = Streams::default();
        let _sub = streams
            .key_values(KeyValueKind::Header)
            .subscribe(CancellationToken::new(), |_| true);
        assert_eq!(streams.key_values(KeyValueKind::Header).subscriber_count(), 1);
        assert_eq!(
            streams
                .key_values(KeyValueKind::SearchParam)
                .subscriber_count(),
            0
        );
        assert_eq!(
            streams
                .key_value_deltas(KeyValueKind::Header)
                .subscriber_count(),
            0
        );
    }
}
