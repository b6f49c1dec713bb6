use super::{Service, require_items};
use crate::error::{Error, Result};
use crate::events::{Change, Pending};
use crate::types::{HttpKeyValue, Id, KeyValueKind, Permission, now_ms};
use crate::wire::{KeyValueDeltaInsert, KeyValueDeltaUpdate, KeyValueInsert, KeyValueUpdate};

impl Service {
    fn get_key_value(&self, kind: KeyValueKind, id: Id) -> Result<HttpKeyValue> {
        self.store
            .read(|q| q.key_values(kind).get(id))?
            .ok_or_else(|| Error::not_found(kind.family()))
    }

    pub fn key_value_collection(&self, kind: KeyValueKind, user_id: Id) -> Result<Vec<HttpKeyValue>> {
        let workspaces = self.user_workspaces(user_id)?;
        self.store.read(|q| {
            let mut out = Vec::new();
            for ws in &workspaces {
                out.extend(q.key_values(kind).get_by_workspace(*ws, false)?);
            }
            Ok(out)
        })
    }

    pub fn key_value_delta_collection(
        &self,
        kind: KeyValueKind,
        user_id: Id,
    ) -> Result<Vec<HttpKeyValue>> {
        let workspaces = self.user_workspaces(user_id)?;
        self.store.read(|q| {
            let mut out = Vec::new();
            for ws in &workspaces {
                out.extend(q.key_values(kind).get_deltas_by_workspace(*ws)?);
            }
            Ok(out)
        })
    }

    pub fn key_value_insert(
        &self,
        kind: KeyValueKind,
        user_id: Id,
        items: Vec<KeyValueInsert>,
    ) -> Result<()> {
        require_items(&items)?;
        let mut access = self.access(user_id);
        let now = now_ms();

        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            let http = self.get_base_http(item.http_id)?;
            access.require(http.workspace_id, Permission::WRITE)?;
            let kv = HttpKeyValue {
                id: item.id.unwrap_or_default(),
                http_id: http.id,
                key: item.key,
                value: item.value,
                enabled: item.enabled,
                description: item.description,
                display_order: item.display_order,
                is_delta: false,
                parent_id: None,
                delta_key: None,
                delta_value: None,
                delta_enabled: None,
                delta_description: None,
                delta_display_order: None,
                created_at: now,
                updated_at: now,
            };
            rows.push((http.workspace_id, kv));
        }

        let pending = self.store.transact(|q| {
            let mut pending = Pending::default();
            for (workspace_id, kv) in rows {
                q.key_values(kind).create(&kv)?;
                pending.push(workspace_id, Change::Insert(kv));
            }
            Ok(pending)
        })?;
        pending.publish(kind.family(), self.streams.key_values(kind));
        Ok(())
    }

    pub fn key_value_update(
        &self,
        kind: KeyValueKind,
        user_id: Id,
        items: Vec<KeyValueUpdate>,
    ) -> Result<()> {
        require_items(&items)?;
        let mut access = self.access(user_id);
        let now = now_ms();

        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            let mut kv = self.get_key_value(kind, item.id)?;
            if kv.is_delta {
                return Err(Error::invalid(format!(
                    "{} is a delta row, use the delta call",
                    kind.family()
                )));
            }
            let http = self.get_base_http(kv.http_id)?;
            access.require(http.workspace_id, Permission::WRITE)?;
            item.apply(&mut kv);
            kv.updated_at = now;
            rows.push((http.workspace_id, kv));
        }

        let pending = self.store.transact(|q| {
            let mut pending = Pending::default();
            for (workspace_id, kv) in rows {
                q.key_values(kind).update(&kv)?;
                pending.push(
                    workspace_id,
                    Change::Update {
                        entity: kv,
                        patch: (),
                    },
                );
            }
            Ok(pending)
        })?;
        pending.publish(kind.family(), self.streams.key_values(kind));
        Ok(())
    }

    pub fn key_value_delete(&self, kind: KeyValueKind, user_id: Id, ids: Vec<Id>) -> Result<()> {
        require_items(&ids)?;
        let mut access = self.access(user_id);

        let mut rows = Vec::with_capacity(ids.len());
        for id in ids {
            let kv = self.get_key_value(kind, id)?;
            if kv.is_delta {
                return Err(Error::invalid(format!(
                    "{} is a delta row, use the delta call",
                    kind.family()
                )));
            }
            let http = self.get_base_http(kv.http_id)?;
            access.require(http.workspace_id, Permission::DELETE)?;
            rows.push((http.workspace_id, kv));
        }

        let pending = self.store.transact(|q| {
            let mut pending = Pending::default();
            for (workspace_id, kv) in rows {
                if q.key_values(kind).delete(kv.id)? {
                    pending.push(workspace_id, Change::Delete(kv));
                }
            }
            Ok(pending)
        })?;
        pending.publish(kind.family(), self.streams.key_values(kind));
        Ok(())
    }

    pub fn key_value_delta_insert(
        &self,
        kind: KeyValueKind,
        user_id: Id,
        items: Vec<KeyValueDeltaInsert>,
    ) -> Result<()> {
        require_items(&items)?;
        let mut access = self.access(user_id);
        let now = now_ms();

        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            let http = self.get_delta_http(item.http_id)?;
            access.require(http.workspace_id, Permission::WRITE)?;

            let mut kv = match item.id {
                Some(parent_id) => {
                    let parent = self.get_key_value(kind, parent_id)?;
                    if parent.is_delta || Some(parent.http_id) != http.parent_http_id {
                        return Err(Error::Constraint(format!(
                            "{} parent must be a base row of the delta's parent entry",
                            kind.family()
                        )));
                    }
                    HttpKeyValue {
                        parent_id: Some(parent.id),
                        ..parent
                    }
                }
                None => HttpKeyValue {
                    id: Id::default(),
                    http_id: http.id,
                    key: item.key.clone().unwrap_or_default(),
                    value: item.value.clone().unwrap_or_default(),
                    enabled: item.enabled.unwrap_or(true),
                    description: item.description.clone().unwrap_or_default(),
                    display_order: item.display_order.unwrap_or_default(),
                    is_delta: true,
                    parent_id: None,
                    delta_key: None,
                    delta_value: None,
                    delta_enabled: None,
                    delta_description: None,
                    delta_display_order: None,
                    created_at: now,
                    updated_at: now,
                },
            };
            kv.id = item.delta_id.unwrap_or_default();
            kv.http_id = http.id;
            kv.is_delta = true;
            kv.delta_key = item.key;
            kv.delta_value = item.value;
            kv.delta_enabled = item.enabled;
            kv.delta_description = item.description;
            kv.delta_display_order = item.display_order;
            kv.created_at = now;
            kv.updated_at = now;
            rows.push((http.workspace_id, kv));
        }

        let pending = self.store.transact(|q| {
            let mut pending = Pending::default();
            for (workspace_id, kv) in rows {
                q.key_values(kind).create(&kv)?;
                pending.push(workspace_id, Change::Insert(kv));
            }
            Ok(pending)
        })?;
        pending.publish(kind.delta_family(), self.streams.key_value_deltas(kind));
        Ok(())
    }

    pub fn key_value_delta_update(
        &self,
        kind: KeyValueKind,
        user_id: Id,
        items: Vec<KeyValueDeltaUpdate>,
    ) -> Result<()> {
        require_items(&items)?;
        let mut access = self.access(user_id);

        let mut prepared = Vec::with_capacity(items.len());
        for item in items {
            let kv = self.get_key_value(kind, item.delta_id)?;
            if !kv.is_delta {
                return Err(Error::NotDelta(kind.family().into()));
            }
            let http = self.get_http(kv.http_id)?;
            access.require(http.workspace_id, Permission::WRITE)?;
            prepared.push((http.workspace_id, item));
        }

        let pending = self.store.transact(|q| {
            let mut pending = Pending::default();
            for (workspace_id, item) in prepared {
                let entity = q.key_values(kind).update_delta(item.delta_id, &item.patch)?;
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
        pending.publish(kind.delta_family(), self.streams.key_value_deltas(kind));
        Ok(())
    }

    pub fn key_value_delta_delete(
        &self,
        kind: KeyValueKind,
        user_id: Id,
        ids: Vec<Id>,
    ) -> Result<()> {
        require_items(&ids)?;
        let mut access = self.access(user_id);

        let mut rows = Vec::with_capacity(ids.len());
        for id in ids {
            let kv = self.get_key_value(kind, id)?;
            if !kv.is_delta {
                return Err(Error::NotDelta(kind.family().into()));
            }
            let http = self.get_http(kv.http_id)?;
            access.require(http.workspace_id, Permission::DELETE)?;
            rows.push((http.workspace_id, kv));
        }

        let pending = self.store.transact(|q| {
            let mut pending = Pending::default();
            for (workspace_id, kv) in rows {
                if q.key_values(kind).delete(kv.id)? {
                    pending.push(workspace_id, Change::Delete(kv));
                }
            }
            Ok(pending)
        })?;
        pending.publish(kind.delta_family(), self.streams.key_value_deltas(kind));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio_util::sync::CancellationToken;

    use super::super::test_support::*;
    use super::*;
    use crate::patch::{KeyValueDeltaPatch, PatchValue};
    use crate::store::test_support::{base_http, delta_http};

    struct Fixture {
        t: TestService,
        base_id: Id,
        delta_id: Id,
    }

    fn fixture() -> Fixture {
        let t = test_service();
        let base = base_http(t.workspace_id);
        let delta = delta_http(&base);
        t.service
            .store()
            .transact(|q| {
                q.http().create(&base)?;
                q.http().create(&delta)
            })
            .unwrap();
        Fixture {
            base_id: base.id,
            delta_id: delta.id,
            t,
        }
    }

    fn header(http_id: Id, id: Id) -> KeyValueInsert {
        KeyValueInsert {
            id: Some(id),
            http_id,
            key: "Authorization".into(),
            value: "Bearer aaa".into(),
            enabled: true,
            description: String::new(),
            display_order: 1.0,
        }
    }

    fn delta_insert(http_id: Id, parent: Option<Id>) -> KeyValueDeltaInsert {
        KeyValueDeltaInsert {
            delta_id: Some(Id::new()),
            id: parent,
            http_id,
            key: None,
            value: None,
            enabled: None,
            description: None,
            display_order: None,
        }
    }

    #[test]
    fn test_override_copies_parent_values() {
        let f = fixture();
        let header_id = Id::new();
        f.t.service
            .key_value_insert(
                KeyValueKind::Header,
                f.t.owner_id,
                vec![header(f.base_id, header_id)],
            )
            .unwrap();

        let item = KeyValueDeltaInsert {
            value: Some("Bearer zzz".into()),
            ..delta_insert(f.delta_id, Some(header_id))
        };
        let delta_id = item.delta_id.unwrap();
        f.t.service
            .key_value_delta_insert(KeyValueKind::Header, f.t.owner_id, vec![item])
            .unwrap();

        let rows = f
            .t
            .service
            .key_value_delta_collection(KeyValueKind::Header, f.t.owner_id)
            .unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.id, delta_id);
        assert_eq!(row.http_id, f.delta_id);
        assert_eq!(row.parent_id, Some(header_id));
        assert_eq!(row.key, "Authorization");
        assert_eq!(row.delta_value.as_deref(), Some("Bearer zzz"));
        assert_eq!(row.delta_key, None);

        let base_rows = f
            .t
            .service
            .key_value_collection(KeyValueKind::Header, f.t.owner_id)
            .unwrap();
        assert_eq!(base_rows.len(), 1);
        assert_eq!(base_rows[0].id, header_id);
    }

    #[test]
    fn test_override_of_foreign_row_is_constraint() {
        let f = fixture();
        let other = base_http(f.t.workspace_id);
        f.t.service
            .store()
            .transact(|q| q.http().create(&other))
            .unwrap();
        let foreign = Id::new();
        f.t.service
            .key_value_insert(
                KeyValueKind::Header,
                f.t.owner_id,
                vec![header(other.id, foreign)],
            )
            .unwrap();

        let result = f.t.service.key_value_delta_insert(
            KeyValueKind::Header,
            f.t.owner_id,
            vec![delta_insert(f.delta_id, Some(foreign))],
        );
        assert!(matches!(result, Err(Error::Constraint(_))));
    }

    #[test]
    fn test_delta_insert_on_base_entry_is_not_delta() {
        let f = fixture();
        let result = f.t.service.key_value_delta_insert(
            KeyValueKind::SearchParam,
            f.t.owner_id,
            vec![delta_insert(f.base_id, None)],
        );
        assert!(matches!(result, Err(Error::NotDelta(_))));
    }

    #[test]
    fn test_base_insert_on_delta_entry_is_invalid() {
        let f = fixture();
        let result = f.t.service.key_value_insert(
            KeyValueKind::BodyForm,
            f.t.owner_id,
            vec![header(f.delta_id, Id::new())],
        );
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_delta_update_publishes_on_delta_stream_only() {
        let f = fixture();
        let item = delta_insert(f.delta_id, None);
        let delta_id = item.delta_id.unwrap();
        f.t.service
            .key_value_delta_insert(KeyValueKind::Header, f.t.owner_id, vec![item])
            .unwrap();

        let cancel = CancellationToken::new();
        let streams = f.t.service.streams();
        let mut base_sub = streams
            .key_values(KeyValueKind::Header)
            .subscribe(cancel.clone(), |_| true);
        let mut delta_sub = streams
            .key_value_deltas(KeyValueKind::Header)
            .subscribe(cancel.clone(), |_| true);

        let patch = KeyValueDeltaPatch {
            value: Some(PatchValue::Unset),
            ..Default::default()
        };
        f.t.service
            .key_value_delta_update(
                KeyValueKind::Header,
                f.t.owner_id,
                vec![KeyValueDeltaUpdate {
                    delta_id,
                    patch: patch.clone(),
                }],
            )
            .unwrap();

        let envelope = delta_sub.recv().await.unwrap().unwrap();
        match &envelope.event {
            Change::Update { entity, patch: applied } => {
                assert_eq!(entity.id, delta_id);
                assert_eq!(entity.delta_value.as_deref(), Some(""));
                assert_eq!(applied, &patch);
            }
            other => panic!("unexpected change {other:?}"),
        }

        cancel.cancel();
        assert!(base_sub.recv().await.unwrap().is_none());
    }

    fn override_header(f: &Fixture) -> Id {
        let header_id = Id::new();
        f.t.service
            .key_value_insert(
                KeyValueKind::Header,
                f.t.owner_id,
                vec![header(f.base_id, header_id)],
            )
            .unwrap();
        let item = KeyValueDeltaInsert {
            value: Some("Bearer zzz".into()),
            ..delta_insert(f.delta_id, Some(header_id))
        };
        let delta_id = item.delta_id.unwrap();
        f.t.service
            .key_value_delta_insert(KeyValueKind::Header, f.t.owner_id, vec![item])
            .unwrap();
        delta_id
    }

    fn stored(f: &Fixture, id: Id) -> HttpKeyValue {
        f.t.service.get_key_value(KeyValueKind::Header, id).unwrap()
    }

    #[tokio::test]
    async fn test_repeated_delta_update_is_idempotent() {
        let f = fixture();
        let delta_id = override_header(&f);
        let update = KeyValueDeltaUpdate {
            delta_id,
            patch: KeyValueDeltaPatch {
                key: Some(PatchValue::Value("X-Api-Key".into())),
                enabled: Some(PatchValue::Unset),
                ..Default::default()
            },
        };

        f.t.service
            .key_value_delta_update(KeyValueKind::Header, f.t.owner_id, vec![update.clone()])
            .unwrap();
        let first = stored(&f, delta_id);

        let cancel = CancellationToken::new();
        let mut events = f
            .t
            .service
            .streams()
            .key_value_deltas(KeyValueKind::Header)
            .subscribe(cancel.clone(), |_| true);

        f.t.service
            .key_value_delta_update(KeyValueKind::Header, f.t.owner_id, vec![update.clone()])
            .unwrap();
        let second = stored(&f, delta_id);
        assert_eq!(
            second,
            HttpKeyValue {
                updated_at: second.updated_at,
                ..first
            }
        );

        let envelope = events.recv().await.unwrap().unwrap();
        match &envelope.event {
            Change::Update { entity, patch } => {
                assert_eq!(entity.id, delta_id);
                assert_eq!(patch, &update.patch);
            }
            other => panic!("unexpected change {other:?}"),
        }
        cancel.cancel();
        assert!(events.recv().await.unwrap().is_none());
    }

    #[test]
    fn test_all_unset_update_clears_to_zero_values() {
        let f = fixture();
        let delta_id = override_header(&f);

        f.t.service
            .key_value_delta_update(
                KeyValueKind::Header,
                f.t.owner_id,
                vec![KeyValueDeltaUpdate {
                    delta_id,
                    patch: KeyValueDeltaPatch {
                        key: Some(PatchValue::Unset),
                        value: Some(PatchValue::Unset),
                        enabled: Some(PatchValue::Unset),
                        description: Some(PatchValue::Unset),
                        display_order: Some(PatchValue::Unset),
                    },
                }],
            )
            .unwrap();

        let row = stored(&f, delta_id);
        assert_eq!(row.delta_key.as_deref(), Some(""));
        assert_eq!(row.delta_value.as_deref(), Some(""));
        assert_eq!(row.delta_enabled, Some(false));
        assert_eq!(row.delta_description.as_deref(), Some(""));
        assert_eq!(row.delta_display_order, Some(0.0));

        let resolved = f
            .t
            .service
            .store()
            .read(|q| crate::resolve::resolve_request(q, f.delta_id))
            .unwrap();
        assert_eq!(resolved.headers.len(), 1);
        let header = &resolved.headers[0];
        assert_eq!(header.key, "");
        assert_eq!(header.value, "");
        assert!(!header.enabled);
        assert!(resolved.enabled_headers().is_empty());
    }

    #[test]
    fn test_delete_on_delta_row_is_invalid() {
        let f = fixture();
        let item = delta_insert(f.delta_id, None);
        let delta_id = item.delta_id.unwrap();
        f.t.service
            .key_value_delta_insert(KeyValueKind::BodyUrlEncoded, f.t.owner_id, vec![item])
            .unwrap();

        let result =
            f.t.service
                .key_value_delete(KeyValueKind::BodyUrlEncoded, f.t.owner_id, vec![delta_id]);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));

        f.t.service
            .key_value_delta_delete(KeyValueKind::BodyUrlEncoded, f.t.owner_id, vec![delta_id])
            .unwrap();
    }
}
