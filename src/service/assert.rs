use super::{Service, require_items};
use crate::error::{Error, Result};
use crate::events::{Change, Pending};
use crate::types::{HttpAssert, Id, Permission, now_ms};
use crate::wire::{AssertDeltaInsert, AssertDeltaUpdate, AssertInsert, AssertUpdate};

const FAMILY: &str = "HttpAssert";

impl Service {
    fn get_assert(&self, id: Id) -> Result<HttpAssert> {
        self.store
            .read(|q| q.asserts().get(id))?
            .ok_or_else(|| Error::not_found("http assert"))
    }

    /// A base assert row along with the workspace of its entry.
    fn get_base_assert(&self, id: Id) -> Result<(Id, HttpAssert)> {
        let assert = self.get_assert(id)?;
        if assert.is_delta {
            return Err(Error::invalid("http assert is a delta row, use the delta call"));
        }
        let http = self.get_base_http(assert.http_id)?;
        Ok((http.workspace_id, assert))
    }

    fn get_delta_assert(&self, id: Id) -> Result<(Id, HttpAssert)> {
        let assert = self.get_assert(id)?;
        if !assert.is_delta {
            return Err(Error::NotDelta("http assert".into()));
        }
        let http = self.get_http(assert.http_id)?;
        Ok((http.workspace_id, assert))
    }

    pub fn assert_collection(&self, user_id: Id) -> Result<Vec<HttpAssert>> {
        let workspaces = self.user_workspaces(user_id)?;
        self.store.read(|q| {
            let mut out = Vec::new();
            for ws in &workspaces {
                out.extend(q.asserts().get_by_workspace(*ws, false)?);
            }
            Ok(out)
        })
    }

    pub fn assert_delta_collection(&self, user_id: Id) -> Result<Vec<HttpAssert>> {
        let workspaces = self.user_workspaces(user_id)?;
        self.store.read(|q| {
            let mut out = Vec::new();
            for ws in &workspaces {
                out.extend(q.asserts().get_deltas_by_workspace(*ws)?);
            }
            Ok(out)
        })
    }

    pub fn assert_insert(&self, user_id: Id, items: Vec<AssertInsert>) -> Result<()> {
        require_items(&items)?;
        let mut access = self.access(user_id);
        let now = now_ms();

        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            let http = self.get_base_http(item.http_id)?;
            access.require(http.workspace_id, Permission::WRITE)?;
            let assert = HttpAssert {
                id: item.http_assert_id.unwrap_or_default(),
                http_id: http.id,
                value: item.value,
                enabled: item.enabled,
                description: item.description,
                display_order: item.display_order,
                is_delta: false,
                parent_id: None,
                delta_value: None,
                delta_enabled: None,
                delta_description: None,
                delta_display_order: None,
                created_at: now,
                updated_at: now,
            };
            rows.push((http.workspace_id, assert));
        }

        let pending = self.store.transact(|q| {
            let mut pending = Pending::default();
            for (workspace_id, assert) in rows {
                q.asserts().create(&assert)?;
                pending.push(workspace_id, Change::Insert(assert));
            }
            Ok(pending)
        })?;
        pending.publish(FAMILY, &self.streams.asserts);
        Ok(())
    }

    pub fn assert_update(&self, user_id: Id, items: Vec<AssertUpdate>) -> Result<()> {
        require_items(&items)?;
        let mut access = self.access(user_id);
        let now = now_ms();

        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            let (workspace_id, mut assert) = self.get_base_assert(item.http_assert_id)?;
            access.require(workspace_id, Permission::WRITE)?;
            item.apply(&mut assert);
            assert.updated_at = now;
            rows.push((workspace_id, assert));
        }

        let pending = self.store.transact(|q| {
            let mut pending = Pending::default();
            for (workspace_id, assert) in rows {
                q.asserts().update(&assert)?;
                pending.push(
                    workspace_id,
                    Change::Update {
                        entity: assert,
                        patch: (),
                    },
                );
            }
            Ok(pending)
        })?;
        pending.publish(FAMILY, &self.streams.asserts);
        Ok(())
    }

    pub fn assert_delete(&self, user_id: Id, ids: Vec<Id>) -> Result<()> {
        require_items(&ids)?;
        let mut access = self.access(user_id);

        let mut rows = Vec::with_capacity(ids.len());
        for id in ids {
            let (workspace_id, assert) = self.get_base_assert(id)?;
            access.require(workspace_id, Permission::DELETE)?;
            rows.push((workspace_id, assert));
        }

        let pending = self.store.transact(|q| {
            let mut pending = Pending::default();
            for (workspace_id, assert) in rows {
                if q.asserts().delete(assert.id)? {
                    pending.push(workspace_id, Change::Delete(assert));
                }
            }
            Ok(pending)
        })?;
        pending.publish(FAMILY, &self.streams.asserts);
        Ok(())
    }

    pub fn assert_delta_insert(&self, user_id: Id, items: Vec<AssertDeltaInsert>) -> Result<()> {
        require_items(&items)?;
        let mut access = self.access(user_id);
        let now = now_ms();

        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            let http = self.get_delta_http(item.http_id)?;
            access.require(http.workspace_id, Permission::WRITE)?;

            let mut assert = match item.http_assert_id {
                Some(parent_id) => {
                    let parent = self.get_assert(parent_id)?;
                    if parent.is_delta || Some(parent.http_id) != http.parent_http_id {
                        return Err(Error::Constraint(
                            "http assert parent must be a base row of the delta's parent entry"
                                .into(),
                        ));
                    }
                    HttpAssert {
                        parent_id: Some(parent.id),
                        ..parent
                    }
                }
                None => HttpAssert {
                    id: Id::default(),
                    http_id: http.id,
                    value: item.value.clone().unwrap_or_default(),
                    enabled: item.enabled.unwrap_or(true),
                    description: item.description.clone().unwrap_or_default(),
                    display_order: item.display_order.unwrap_or_default(),
                    is_delta: true,
                    parent_id: None,
                    delta_value: None,
                    delta_enabled: None,
                    delta_description: None,
                    delta_display_order: None,
                    created_at: now,
                    updated_at: now,
                },
            };
            assert.id = item.delta_http_assert_id.unwrap_or_default();
            assert.http_id = http.id;
            assert.is_delta = true;
            assert.delta_value = item.value;
            assert.delta_enabled = item.enabled;
            assert.delta_description = item.description;
            assert.delta_display_order = item.display_order;
            assert.created_at = now;
            assert.updated_at = now;
            rows.push((http.workspace_id, assert));
        }

        let pending = self.store.transact(|q| {
            let mut pending = Pending::default();
            for (workspace_id, assert) in rows {
                q.asserts().create(&assert)?;
                pending.push(workspace_id, Change::Insert(assert));
            }
            Ok(pending)
        })?;
        pending.publish(FAMILY, &self.streams.assert_deltas);
        Ok(())
    }

    pub fn assert_delta_update(&self, user_id: Id, items: Vec<AssertDeltaUpdate>) -> Result<()> {
        require_items(&items)?;
        let mut access = self.access(user_id);

        let mut prepared = Vec::with_capacity(items.len());
        for item in items {
            let (workspace_id, _) = self.get_delta_assert(item.delta_http_assert_id)?;
            access.require(workspace_id, Permission::WRITE)?;
            prepared.push((workspace_id, item));
        }

        let pending = self.store.transact(|q| {
            let mut pending = Pending::default();
            for (workspace_id, item) in prepared {
                let entity = q
                    .asserts()
                    .update_delta(item.delta_http_assert_id, &item.patch)?;
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
        pending.publish(FAMILY, &self.streams.assert_deltas);
        Ok(())
    }

    pub fn assert_delta_delete(&self, user_id: Id, ids: Vec<Id>) -> Result<()> {
        require_items(&ids)?;
        let mut access = self.access(user_id);

        let mut rows = Vec::with_capacity(ids.len());
        for id in ids {
            let (workspace_id, assert) = self.get_delta_assert(id)?;
            access.require(workspace_id, Permission::DELETE)?;
            rows.push((workspace_id, assert));
        }

        let pending = self.store.transact(|q| {
            let mut pending = Pending::default();
            for (workspace_id, assert) in rows {
                if q.asserts().delete(assert.id)? {
                    pending.push(workspace_id, Change::Delete(assert));
                }
            }
            Ok(pending)
        })?;
        pending.publish(FAMILY, &self.streams.assert_deltas);
        Ok(())
    }
}
