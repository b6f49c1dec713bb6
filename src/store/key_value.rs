use rusqlite::{Connection, OptionalExtension, Row, params};

use super::collect;
use crate::error::{Error, Result};
use crate::patch::{KeyValueDeltaPatch, Patch};
use crate::types::{HttpKeyValue, Id, KeyValueKind, now_ms};

const COLUMNS: &str = "c.id, c.http_id, c.key, c.value, c.enabled, c.description, \
     c.display_order, c.is_delta, c.parent_id, c.delta_key, c.delta_value, c.delta_enabled, \
     c.delta_description, c.delta_display_order, c.created_at, c.updated_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<HttpKeyValue> {
    Ok(HttpKeyValue {
        id: row.get(0)?,
        http_id: row.get(1)?,
        key: row.get(2)?,
        value: row.get(3)?,
        enabled: row.get(4)?,
        description: row.get(5)?,
        display_order: row.get(6)?,
        is_delta: row.get(7)?,
        parent_id: row.get(8)?,
        delta_key: row.get(9)?,
        delta_value: row.get(10)?,
        delta_enabled: row.get(11)?,
        delta_description: row.get(12)?,
        delta_display_order: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

/// Queries over one of the key/value child tables.
pub struct KeyValueQueries<'c> {
    conn: &'c Connection,
    kind: KeyValueKind,
}

impl<'c> KeyValueQueries<'c> {
    pub(super) fn new(conn: &'c Connection, kind: KeyValueKind) -> Self {
        Self { conn, kind }
    }

    fn table(&self) -> &'static str {
        self.kind.table()
    }

    pub fn get(&self, id: Id) -> Result<Option<HttpKeyValue>> {
        self.conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM {} c WHERE c.id = ?1", self.table()),
                params![id],
                from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    /// Rows of one template ordered by display order, id as tiebreaker.
    pub fn get_by_http(&self, http_id: Id) -> Result<Vec<HttpKeyValue>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM {} c WHERE c.http_id = ?1 ORDER BY c.display_order, c.id",
            self.table()
        ))?;
        let rows = stmt.query_map(params![http_id], from_row)?;
        collect(rows)
    }

    pub fn get_by_workspace(&self, workspace_id: Id, is_delta: bool) -> Result<Vec<HttpKeyValue>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM {} c JOIN http h ON h.id = c.http_id
             WHERE h.workspace_id = ?1 AND c.is_delta = ?2
             ORDER BY c.http_id, c.display_order, c.id",
            self.table()
        ))?;
        let rows = stmt.query_map(params![workspace_id, is_delta], from_row)?;
        collect(rows)
    }

    pub fn get_deltas_by_workspace(&self, workspace_id: Id) -> Result<Vec<HttpKeyValue>> {
        self.get_by_workspace(workspace_id, true)
    }

    pub fn create(&self, kv: &HttpKeyValue) -> Result<()> {
        kv.validate()?;
        self.conn.execute(
            &format!(
                "INSERT INTO {} (id, http_id, key, value, enabled, description, display_order,
                     is_delta, parent_id, delta_key, delta_value, delta_enabled,
                     delta_description, delta_display_order, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                self.table()
            ),
            params![
                kv.id,
                kv.http_id,
                kv.key,
                kv.value,
                kv.enabled,
                kv.description,
                kv.display_order,
                kv.is_delta,
                kv.parent_id,
                kv.delta_key,
                kv.delta_value,
                kv.delta_enabled,
                kv.delta_description,
                kv.delta_display_order,
                kv.created_at,
                kv.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn update(&self, kv: &HttpKeyValue) -> Result<()> {
        let rows = self.conn.execute(
            &format!(
                "UPDATE {} SET key = ?1, value = ?2, enabled = ?3, description = ?4,
                     display_order = ?5, updated_at = ?6
                 WHERE id = ?7",
                self.table()
            ),
            params![
                kv.key,
                kv.value,
                kv.enabled,
                kv.description,
                kv.display_order,
                kv.updated_at,
                kv.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::not_found(self.kind.family()));
        }
        Ok(())
    }

    pub fn update_delta(&self, id: Id, patch: &KeyValueDeltaPatch) -> Result<HttpKeyValue> {
        let mut kv = self
            .get(id)?
            .ok_or_else(|| Error::not_found(self.kind.family()))?;
        if !kv.is_delta {
            return Err(Error::NotDelta(self.kind.family().into()));
        }
        patch.apply(&mut kv);
        kv.updated_at = now_ms();

        self.conn.execute(
            &format!(
                "UPDATE {} SET delta_key = ?1, delta_value = ?2, delta_enabled = ?3,
                     delta_description = ?4, delta_display_order = ?5, updated_at = ?6
                 WHERE id = ?7",
                self.table()
            ),
            params![
                kv.delta_key,
                kv.delta_value,
                kv.delta_enabled,
                kv.delta_description,
                kv.delta_display_order,
                kv.updated_at,
                kv.id,
            ],
        )?;
        Ok(kv)
    }

    pub fn delete(&self, id: Id) -> Result<bool> {
        let rows = self.conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", self.table()),
            params![id],
        )?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::patch::PatchValue;

    fn header(http_id: Id, key: &str, order: f64) -> HttpKeyValue {
        HttpKeyValue {
            id: Id::new(),
            http_id,
            key: key.into(),
            value: "v".into(),
            enabled: true,
            description: String::new(),
            display_order: order,
            is_delta: false,
            parent_id: None,
            delta_key: None,
            delta_value: None,
            delta_enabled: None,
            delta_description: None,
            delta_display_order: None,
            created_at: now_ms(),
            updated_at: now_ms(),
        }
    }

    #[test]
    fn test_rows_ordered_by_display_order() {
        let t = test_store();
        let http = base_http(t.workspace_id);
        t.store.transact(|q| q.http().create(&http)).unwrap();

        let headers = t.store.transact(|q| {
            let kvs = q.key_values(KeyValueKind::Header);
            let second = header(http.id, "B", 2.0);
            let first = header(http.id, "A", 1.0);
            let between = header(http.id, "AB", 1.5);
            kvs.create(&second)?;
            kvs.create(&first)?;
            kvs.create(&between)?;
            kvs.get_by_http(http.id)
        });

        let keys: Vec<_> = headers.unwrap().into_iter().map(|h| h.key).collect();
        assert_eq!(keys, vec!["A", "AB", "B"]);
    }

    #[test]
    fn test_kinds_are_isolated() {
        let t = test_store();
        let http = base_http(t.workspace_id);
        t.store.transact(|q| q.http().create(&http)).unwrap();

        t.store
            .transact(|q| {
                q.key_values(KeyValueKind::SearchParam)
                    .create(&header(http.id, "page", 1.0))
            })
            .unwrap();

        let headers = t
            .store
            .read(|q| q.key_values(KeyValueKind::Header).get_by_http(http.id))
            .unwrap();
        let params = t
            .store
            .read(|q| q.key_values(KeyValueKind::SearchParam).get_by_http(http.id))
            .unwrap();
        assert!(headers.is_empty());
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_delete_parent_header_with_delta_is_foreign_key() {
        let t = test_store();
        let base = base_http(t.workspace_id);
        let delta = delta_http(&base);
        let parent = header(base.id, "X-API-Key", 1.0);
        let child = HttpKeyValue {
            id: Id::new(),
            http_id: delta.id,
            is_delta: true,
            parent_id: Some(parent.id),
            delta_value: Some("zzz".into()),
            ..parent.clone()
        };
        t.store
            .transact(|q| {
                q.http().create(&base)?;
                q.http().create(&delta)?;
                let kvs = q.key_values(KeyValueKind::Header);
                kvs.create(&parent)?;
                kvs.create(&child)
            })
            .unwrap();

        let result = t
            .store
            .transact(|q| q.key_values(KeyValueKind::Header).delete(parent.id));
        assert!(matches!(result, Err(Error::ForeignKey)));

        let deltas = t
            .store
            .read(|q| {
                q.key_values(KeyValueKind::Header)
                    .get_deltas_by_workspace(t.workspace_id)
            })
            .unwrap();
        assert_eq!(deltas, vec![child.clone()]);

        let patch = KeyValueDeltaPatch {
            value: Some(PatchValue::Unset),
            ..Default::default()
        };
        let updated = t
            .store
            .transact(|q| q.key_values(KeyValueKind::Header).update_delta(child.id, &patch))
            .unwrap();
        assert_eq!(updated.delta_value, Some(String::new()));
    }
}
