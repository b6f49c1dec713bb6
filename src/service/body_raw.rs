use super::{Service, require_items};
use crate::error::{Error, Result};
use crate::events::{Change, Pending};
use crate::types::{HttpBodyRaw, Id, Permission, now_ms};
use crate::wire::{BodyRawDeltaInsert, BodyRawDeltaUpdate, BodyRawInsert, BodyRawUpdate};

const FAMILY: &str = "HttpBodyRaw";

impl Service {
    fn get_body_raw(&self, http_id: Id) -> Result<HttpBodyRaw> {
        self.store
            .read(|q| q.body_raw().get_by_http(http_id))?
            .ok_or_else(|| Error::not_found("http body raw"))
    }

    pub fn body_raw_collection(&self, user_id: Id) -> Result<Vec<HttpBodyRaw>> {
        let workspaces = self.user_workspaces(user_id)?;
        self.store.read(|q| {
            let mut out = Vec::new();
            for ws in &workspaces {
                out.extend(q.body_raw().get_by_workspace(*ws, false)?);
            }
            Ok(out)
        })
    }

    pub fn body_raw_delta_collection(&self, user_id: Id) -> Result<Vec<HttpBodyRaw>> {
        let workspaces = self.user_workspaces(user_id)?;
        self.store.read(|q| {
            let mut out = Vec::new();
            for ws in &workspaces {
                out.extend(q.body_raw().get_deltas_by_workspace(*ws)?);
            }
            Ok(out)
        })
    }

    pub fn body_raw_insert(&self, user_id: Id, items: Vec<BodyRawInsert>) -> Result<()> {
        require_items(&items)?;
        let mut access = self.access(user_id);
        let now = now_ms();

        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            let http = self.get_base_http(item.http_id)?;
            access.require(http.workspace_id, Permission::WRITE)?;
            let body = HttpBodyRaw {
                id: Id::new(),
                http_id: http.id,
                raw_data: item.data.into(),
                compression_type: item.compression_type,
                is_delta: false,
                parent_body_raw_id: None,
                delta_raw_data: None,
                created_at: now,
                updated_at: now,
            };
            rows.push((http.workspace_id, body));
        }

        let pending = self.store.transact(|q| {
            let mut pending = Pending::default();
            for (workspace_id, body) in rows {
                q.body_raw().create(&body)?;
                pending.push(workspace_id, Change::Insert(body));
            }
            Ok(pending)
        })?;
        pending.publish(FAMILY, &self.streams.body_raw);
        Ok(())
    }

    pub fn body_raw_update(&self, user_id: Id, items: Vec<BodyRawUpdate>) -> Result<()> {
        require_items(&items)?;
        let mut access = self.access(user_id);
        let now = now_ms();

        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            let http = self.get_base_http(item.http_id)?;
            access.require(http.workspace_id, Permission::WRITE)?;
            let mut body = self.get_body_raw(http.id)?;
            item.apply(&mut body);
            body.updated_at = now;
            rows.push((http.workspace_id, body));
        }

        let pending = self.store.transact(|q| {
            let mut pending = Pending::default();
            for (workspace_id, body) in rows {
                q.body_raw().update(&body)?;
                pending.push(
                    workspace_id,
                    Change::Update {
                        entity: body,
                        patch: (),
                    },
                );
            }
            Ok(pending)
        })?;
        pending.publish(FAMILY, &self.streams.body_raw);
        Ok(())
    }

    /// Deletes the bodies of the given base entries.
    pub fn body_raw_delete(&self, user_id: Id, http_ids: Vec<Id>) -> Result<()> {
        require_items(&http_ids)?;
        let mut access = self.access(user_id);

        let mut rows = Vec::with_capacity(http_ids.len());
        for http_id in http_ids {
            let http = self.get_base_http(http_id)?;
            access.require(http.workspace_id, Permission::DELETE)?;
            rows.push((http.workspace_id, self.get_body_raw(http.id)?));
        }

        let pending = self.store.transact(|q| {
            let mut pending = Pending::default();
            for (workspace_id, body) in rows {
                if q.body_raw().delete(body.id)? {
                    pending.push(workspace_id, Change::Delete(body));
                }
            }
            Ok(pending)
        })?;
        pending.publish(FAMILY, &self.streams.body_raw);
        Ok(())
    }

    /// Creates the delta body of a delta entry. The parent body, if the
    /// parent entry has one, is linked and its bytes copied.
    pub fn body_raw_delta_insert(&self, user_id: Id, items: Vec<BodyRawDeltaInsert>) -> Result<()> {
        require_items(&items)?;
        let mut access = self.access(user_id);
        let now = now_ms();

        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            let http = self.get_delta_http(item.http_id)?;
            access.require(http.workspace_id, Permission::WRITE)?;
            let parent = match http.parent_http_id {
                Some(parent_http_id) => self
                    .store
                    .read(|q| q.body_raw().get_by_http(parent_http_id))?,
                None => None,
            };
            let body = HttpBodyRaw {
                id: Id::new(),
                http_id: http.id,
                raw_data: parent.as_ref().map(|p| p.raw_data.clone()).unwrap_or_default(),
                compression_type: item.compression_type,
                is_delta: true,
                parent_body_raw_id: parent.map(|p| p.id),
                delta_raw_data: item.data.map(Vec::from),
                created_at: now,
                updated_at: now,
            };
            rows.push((http.workspace_id, body));
        }

        let pending = self.store.transact(|q| {
            let mut pending = Pending::default();
            for (workspace_id, body) in rows {
                q.body_raw().create(&body)?;
                pending.push(workspace_id, Change::Insert(body));
            }
            Ok(pending)
        })?;
        pending.publish(FAMILY, &self.streams.body_raw_deltas);
        Ok(())
    }

    pub fn body_raw_delta_update(&self, user_id: Id, items: Vec<BodyRawDeltaUpdate>) -> Result<()> {
        require_items(&items)?;
        let mut access = self.access(user_id);

        let mut prepared = Vec::with_capacity(items.len());
        for item in items {
            let http = self.get_delta_http(item.http_id)?;
            access.require(http.workspace_id, Permission::WRITE)?;
            prepared.push((http.workspace_id, item.http_id, item.patch()));
        }

        let pending = self.store.transact(|q| {
            let mut pending = Pending::default();
            for (workspace_id, http_id, patch) in prepared {
                let entity = q.body_raw().update_delta(http_id, &patch)?;
                pending.push(workspace_id, Change::Update { entity, patch });
            }
            Ok(pending)
        })?;
        pending.publish(FAMILY, &self.streams.body_raw_deltas);
        Ok(())
    }

    /// Deletes the delta bodies of the given delta entries, restoring
    /// inheritance from the parent body.
    pub fn body_raw_delta_delete(&self, user_id: Id, http_ids: Vec<Id>) -> Result<()> {
        require_items(&http_ids)?;
        let mut access = self.access(user_id);

        let mut rows = Vec::with_capacity(http_ids.len());
        for http_id in http_ids {
            let http = self.get_delta_http(http_id)?;
            access.require(http.workspace_id, Permission::DELETE)?;
            rows.push((http.workspace_id, self.get_body_raw(http.id)?));
        }

        let pending = self.store.transact(|q| {
            let mut pending = Pending::default();
            for (workspace_id, body) in rows {
                if q.body_raw().delete(body.id)? {
                    pending.push(workspace_id, Change::Delete(body));
                }
            }
            Ok(pending)
        })?;
        pending.publish(FAMILY, &self.streams.body_raw_deltas);
        Ok(())
    }
}
