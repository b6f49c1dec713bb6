use tracing::debug;

use super::{Service, require_items};
use crate::error::{Error, Result};
use crate::events::{Change, Pending};
use crate::patch::Patch;
use crate::types::{Http, Id, Permission, now_ms};
use crate::wire::{HttpDeltaInsert, HttpDeltaUpdate, HttpInsert, HttpUpdate};

impl Service {
    pub fn http_collection(&self, user_id: Id) -> Result<Vec<Http>> {
        let workspaces = self.user_workspaces(user_id)?;
        self.store.read(|q| {
            let mut out = Vec::new();
            for ws in &workspaces {
                out.extend(q.http().list_by_workspace(*ws)?);
            }
            Ok(out)
        })
    }

    pub fn http_delta_collection(&self, user_id: Id) -> Result<Vec<Http>> {
        let workspaces = self.user_workspaces(user_id)?;
        self.store.read(|q| {
            let mut out = Vec::new();
            for ws in &workspaces {
                out.extend(q.http().get_deltas_by_workspace(*ws)?);
            }
            Ok(out)
        })
    }

    pub fn http_insert(&self, user_id: Id, items: Vec<HttpInsert>) -> Result<()> {
        require_items(&items)?;
        let mut access = self.access(user_id);
        let now = now_ms();

        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            access.require(item.workspace_id, Permission::WRITE)?;
            rows.push(Http {
                id: item.http_id.unwrap_or_default(),
                workspace_id: item.workspace_id,
                folder_id: item.folder_id,
                name: item.name,
                url: item.url,
                method: item.method,
                description: item.description,
                body_kind: item.body_kind,
                is_delta: false,
                is_snapshot: false,
                parent_http_id: None,
                delta_name: None,
                delta_url: None,
                delta_method: None,
                created_at: now,
                updated_at: now,
            });
        }

        let pending = self.store.transact(|q| {
            let mut pending = Pending::default();
            for http in rows {
                q.http().create(&http)?;
                pending.push(http.workspace_id, Change::Insert(http));
            }
            Ok(pending)
        })?;
        pending.publish("Http", &self.streams.http);
        Ok(())
    }

    pub fn http_update(&self, user_id: Id, items: Vec<HttpUpdate>) -> Result<()> {
        require_items(&items)?;
        let mut access = self.access(user_id);
        let now = now_ms();

        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            let mut http = self.get_base_http(item.http_id)?;
            access.require(http.workspace_id, Permission::WRITE)?;
            item.apply(&mut http);
            http.updated_at = now;
            rows.push(http);
        }

        let pending = self.store.transact(|q| {
            let mut pending = Pending::default();
            for http in rows {
                q.http().update(&http)?;
                pending.push(
                    http.workspace_id,
                    Change::Update {
                        entity: http,
                        patch: (),
                    },
                );
            }
            Ok(pending)
        })?;
        pending.publish("Http", &self.streams.http);
        Ok(())
    }

    pub fn http_delete(&self, user_id: Id, ids: Vec<Id>) -> Result<()> {
        require_items(&ids)?;
        let mut access = self.access(user_id);

        let mut rows = Vec::with_capacity(ids.len());
        for id in ids {
            let http = self.get_http(id)?;
            if http.is_delta {
                return Err(Error::invalid("http entry is a delta, use the delta call"));
            }
            access.require(http.workspace_id, Permission::DELETE)?;
            rows.push(http);
        }

        let pending = self.store.transact(|q| {
            let mut pending = Pending::default();
            for http in rows {
                if q.http().delete(http.id)? {
                    pending.push(http.workspace_id, Change::Delete(http));
                }
            }
            Ok(pending)
        })?;
        pending.publish("Http", &self.streams.http);
        Ok(())
    }

    pub fn http_delta_insert(&self, user_id: Id, items: Vec<HttpDeltaInsert>) -> Result<()> {
        require_items(&items)?;
        let mut access = self.access(user_id);
        let now = now_ms();

        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            let parent = self.get_http(item.http_id)?;
            if !parent.is_base() {
                return Err(Error::Constraint(
                    "a delta parent must be a base entry".into(),
                ));
            }
            access.require(parent.workspace_id, Permission::WRITE)?;
            rows.push(Http {
                id: item.delta_http_id.unwrap_or_default(),
                is_delta: true,
                parent_http_id: Some(parent.id),
                delta_name: item.name,
                delta_url: item.url,
                delta_method: item.method,
                created_at: now,
                updated_at: now,
                ..parent
            });
        }

        let pending = self.store.transact(|q| {
            let mut pending = Pending::default();
            for http in rows {
                q.http().create(&http)?;
                pending.push(http.workspace_id, Change::Insert(http));
            }
            Ok(pending)
        })?;
        pending.publish("HttpDelta", &self.streams.http_delta);
        Ok(())
    }

    pub fn http_delta_update(&self, user_id: Id, items: Vec<HttpDeltaUpdate>) -> Result<()> {
        require_items(&items)?;
        let mut access = self.access(user_id);

        let mut prepared = Vec::with_capacity(items.len());
        for item in items {
            let http = self.get_delta_http(item.delta_http_id)?;
            access.require(http.workspace_id, Permission::WRITE)?;
            debug!(id = %http.id, fields = ?item.patch.fields(), "http delta update");
            prepared.push((http.workspace_id, item));
        }

        let pending = self.store.transact(|q| {
            let mut pending = Pending::default();
            for (workspace_id, item) in prepared {
                let entity = q.http().update_delta(item.delta_http_id, &item.patch)?;
                pending.push(
                    workspace_id,
                    Change::Update {
                        entity,
                        patch: item.patch,
                    },
                );
            }
            Ok(pending)
        })?;
        pending.publish("HttpDelta", &self.streams.http_delta);
        Ok(())
    }

    pub fn http_delta_delete(&self, user_id: Id, ids: Vec<Id>) -> Result<()> {
        require_items(&ids)?;
        let mut access = self.access(user_id);

        let mut rows = Vec::with_capacity(ids.len());
        for id in ids {
            let http = self.get_delta_http(id)?;
            access.require(http.workspace_id, Permission::DELETE)?;
            rows.push(http);
        }

        let pending = self.store.transact(|q| {
            let mut pending = Pending::default();
            for http in rows {
                if q.http().delete(http.id)? {
                    pending.push(http.workspace_id, Change::Delete(http));
                }
            }
            Ok(pending)
        })?;
        pending.publish("HttpDelta", &self.streams.http_delta);
        Ok(())
    }
}
