use rusqlite::{Connection, OptionalExtension, Row, params};

use super::collect;
use crate::error::{Error, Result};
use crate::patch::{AssertDeltaPatch, Patch};
use crate::types::{HttpAssert, Id, now_ms};

const COLUMNS: &str = "a.id, a.http_id, a.value, a.enabled, a.description, a.display_order, \
     a.is_delta, a.parent_id, a.delta_value, a.delta_enabled, a.delta_description, \
     a.delta_display_order, a.created_at, a.updated_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<HttpAssert> {
    Ok(HttpAssert {
        id: row.get(0)?,
        http_id: row.get(1)?,
        value: row.get(2)?,
        enabled: row.get(3)?,
        description: row.get(4)?,
        display_order: row.get(5)?,
        is_delta: row.get(6)?,
        parent_id: row.get(7)?,
        delta_value: row.get(8)?,
        delta_enabled: row.get(9)?,
        delta_description: row.get(10)?,
        delta_display_order: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

pub struct AssertQueries<'c> {
    conn: &'c Connection,
}

impl<'c> AssertQueries<'c> {
    pub(super) fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn get(&self, id: Id) -> Result<Option<HttpAssert>> {
        self.conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM http_assert a WHERE a.id = ?1"),
                params![id],
                from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    pub fn get_by_http(&self, http_id: Id) -> Result<Vec<HttpAssert>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM http_assert a WHERE a.http_id = ?1
             ORDER BY a.display_order, a.id"
        ))?;
        let rows = stmt.query_map(params![http_id], from_row)?;
        collect(rows)
    }

    pub fn get_by_workspace(&self, workspace_id: Id, is_delta: bool) -> Result<Vec<HttpAssert>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM http_assert a JOIN http h ON h.id = a.http_id
             WHERE h.workspace_id = ?1 AND a.is_delta = ?2
             ORDER BY a.http_id, a.display_order, a.id"
        ))?;
        let rows = stmt.query_map(params![workspace_id, is_delta], from_row)?;
        collect(rows)
    }

    pub fn get_deltas_by_workspace(&self, workspace_id: Id) -> Result<Vec<HttpAssert>> {
        self.get_by_workspace(workspace_id, true)
    }

    pub fn create(&self, assert: &HttpAssert) -> Result<()> {
        assert.validate()?;
        self.conn.execute(
            "INSERT INTO http_assert (id, http_id, value, enabled, description, display_order,
                 is_delta, parent_id, delta_value, delta_enabled, delta_description,
                 delta_display_order, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                assert.id,
                assert.http_id,
                assert.value,
                assert.enabled,
                assert.description,
                assert.display_order,
                assert.is_delta,
                assert.parent_id,
                assert.delta_value,
                assert.delta_enabled,
                assert.delta_description,
                assert.delta_display_order,
                assert.created_at,
                assert.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn update(&self, assert: &HttpAssert) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE http_assert SET value = ?1, enabled = ?2, description = ?3,
                 display_order = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                assert.value,
                assert.enabled,
                assert.description,
                assert.display_order,
                assert.updated_at,
                assert.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::not_found("http assert"));
        }
        Ok(())
    }

    pub fn update_delta(&self, id: Id, patch: &AssertDeltaPatch) -> Result<HttpAssert> {
        let mut assert = self
            .get(id)?
            .ok_or_else(|| Error::not_found("http assert"))?;
        if !assert.is_delta {
            return Err(Error::NotDelta("http assert".into()));
        }
        patch.apply(&mut assert);
        assert.updated_at = now_ms();

        self.conn.execute(
            "UPDATE http_assert SET delta_value = ?1, delta_enabled = ?2,
                 delta_description = ?3, delta_display_order = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                assert.delta_value,
                assert.delta_enabled,
                assert.delta_description,
                assert.delta_display_order,
                assert.updated_at,
                assert.id,
            ],
        )?;
        Ok(assert)
    }

    pub fn delete(&self, id: Id) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM http_assert WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    fn assert_row(http_id: Id, value: &str) -> HttpAssert {
        HttpAssert {
            id: Id::new(),
            http_id,
            value: value.into(),
            enabled: true,
            description: String::new(),
            display_order: 1.0,
            is_delta: false,
            parent_id: None,
            delta_value: None,
            delta_enabled: None,
            delta_description: None,
            delta_display_order: None,
            created_at: now_ms(),
            updated_at: now_ms(),
        }
    }

    #[test]
    fn test_assert_crud_and_workspace_split() {
        let t = test_store();
        let base = base_http(t.workspace_id);
        let delta = delta_http(&base);
        let parent = assert_row(base.id, "status == 200");
        let child = HttpAssert {
            id: Id::new(),
            http_id: delta.id,
            is_delta: true,
            parent_id: Some(parent.id),
            ..parent.clone()
        };

        t.store
            .transact(|q| {
                q.http().create(&base)?;
                q.http().create(&delta)?;
                q.asserts().create(&parent)?;
                q.asserts().create(&child)
            })
            .unwrap();

        let bases = t
            .store
            .read(|q| q.asserts().get_by_workspace(t.workspace_id, false))
            .unwrap();
        let deltas = t
            .store
            .read(|q| q.asserts().get_deltas_by_workspace(t.workspace_id))
            .unwrap();
        assert_eq!(bases, vec![parent.clone()]);
        assert_eq!(deltas, vec![child.clone()]);

        let mut edited = parent.clone();
        edited.value = "status == 201".into();
        t.store.transact(|q| q.asserts().update(&edited)).unwrap();
        let fetched = t.store.read(|q| q.asserts().get(parent.id)).unwrap();
        assert_eq!(fetched.unwrap().value, "status == 201");

        let result = t.store.transact(|q| q.asserts().delete(parent.id));
        assert!(matches!(result, Err(Error::ForeignKey)));
    }

    #[test]
    fn test_update_delta_on_base_assert() {
        let t = test_store();
        let base = base_http(t.workspace_id);
        let row = assert_row(base.id, "body.ok");
        t.store
            .transact(|q| {
                q.http().create(&base)?;
                q.asserts().create(&row)
            })
            .unwrap();

        let result = t
            .store
            .transact(|q| q.asserts().update_delta(row.id, &AssertDeltaPatch::default()));
        assert!(matches!(result, Err(Error::NotDelta(_))));
    }
}
