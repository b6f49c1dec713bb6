use rusqlite::{Connection, OptionalExtension, Row, params};

use super::collect;
use crate::error::{Error, Result};
use crate::patch::{BodyRawDeltaPatch, Patch};
use crate::types::{HttpBodyRaw, Id, now_ms};

const COLUMNS: &str = "b.id, b.http_id, b.raw_data, b.compression_type, b.is_delta, \
     b.parent_body_raw_id, b.delta_raw_data, b.created_at, b.updated_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<HttpBodyRaw> {
    Ok(HttpBodyRaw {
        id: row.get(0)?,
        http_id: row.get(1)?,
        raw_data: row.get(2)?,
        compression_type: row.get(3)?,
        is_delta: row.get(4)?,
        parent_body_raw_id: row.get(5)?,
        delta_raw_data: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Raw bodies, keyed either by row id or by the owning HTTP entry.
pub struct BodyRawQueries<'c> {
    conn: &'c Connection,
}

impl<'c> BodyRawQueries<'c> {
    pub(super) fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn get(&self, id: Id) -> Result<Option<HttpBodyRaw>> {
        self.conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM http_body_raw b WHERE b.id = ?1"),
                params![id],
                from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    pub fn get_by_http(&self, http_id: Id) -> Result<Option<HttpBodyRaw>> {
        self.conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM http_body_raw b WHERE b.http_id = ?1"),
                params![http_id],
                from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    pub fn get_by_workspace(&self, workspace_id: Id, is_delta: bool) -> Result<Vec<HttpBodyRaw>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM http_body_raw b JOIN http h ON h.id = b.http_id
             WHERE h.workspace_id = ?1 AND b.is_delta = ?2
             ORDER BY b.http_id"
        ))?;
        let rows = stmt.query_map(params![workspace_id, is_delta], from_row)?;
        collect(rows)
    }

    pub fn get_deltas_by_workspace(&self, workspace_id: Id) -> Result<Vec<HttpBodyRaw>> {
        self.get_by_workspace(workspace_id, true)
    }

    pub fn create(&self, body: &HttpBodyRaw) -> Result<()> {
        body.validate()?;
        self.conn.execute(
            "INSERT INTO http_body_raw (id, http_id, raw_data, compression_type, is_delta,
                 parent_body_raw_id, delta_raw_data, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                body.id,
                body.http_id,
                body.raw_data,
                body.compression_type,
                body.is_delta,
                body.parent_body_raw_id,
                body.delta_raw_data,
                body.created_at,
                body.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn update(&self, body: &HttpBodyRaw) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE http_body_raw SET raw_data = ?1, compression_type = ?2, updated_at = ?3
             WHERE id = ?4",
            params![body.raw_data, body.compression_type, body.updated_at, body.id],
        )?;

        if rows == 0 {
            return Err(Error::not_found("http body raw"));
        }
        Ok(())
    }

    /// Applies `patch` to the delta body owned by the delta entry `http_id`.
    pub fn update_delta(&self, http_id: Id, patch: &BodyRawDeltaPatch) -> Result<HttpBodyRaw> {
        let mut body = self
            .get_by_http(http_id)?
            .ok_or_else(|| Error::not_found("http body raw"))?;
        if !body.is_delta {
            return Err(Error::NotDelta("http body raw".into()));
        }
        patch.apply(&mut body);
        body.updated_at = now_ms();

        self.conn.execute(
            "UPDATE http_body_raw SET delta_raw_data = ?1, updated_at = ?2 WHERE id = ?3",
            params![body.delta_raw_data, body.updated_at, body.id],
        )?;
        Ok(body)
    }

    pub fn delete(&self, id: Id) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM http_body_raw WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::patch::PatchValue;
    use crate::types::CompressionType;

    fn body(http_id: Id, data: &[u8]) -> HttpBodyRaw {
        HttpBodyRaw {
            id: Id::new(),
            http_id,
            raw_data: data.to_vec(),
            compression_type: CompressionType::None,
            is_delta: false,
            parent_body_raw_id: None,
            delta_raw_data: None,
            created_at: now_ms(),
            updated_at: now_ms(),
        }
    }

    #[test]
    fn test_one_body_per_http() {
        let t = test_store();
        let base = base_http(t.workspace_id);
        t.store
            .transact(|q| {
                q.http().create(&base)?;
                q.body_raw().create(&body(base.id, b"a"))
            })
            .unwrap();

        let result = t
            .store
            .transact(|q| q.body_raw().create(&body(base.id, b"b")));
        assert!(matches!(result, Err(Error::Constraint(_))));
    }

    #[test]
    fn test_empty_override_is_not_inherit() {
        let t = test_store();
        let base = base_http(t.workspace_id);
        let delta = delta_http(&base);
        let parent = body(base.id, &[1, 2]);
        let child = HttpBodyRaw {
            id: Id::new(),
            http_id: delta.id,
            is_delta: true,
            parent_body_raw_id: Some(parent.id),
            delta_raw_data: Some(b"Z".to_vec()),
            ..parent.clone()
        };
        t.store
            .transact(|q| {
                q.http().create(&base)?;
                q.http().create(&delta)?;
                q.body_raw().create(&parent)?;
                q.body_raw().create(&child)
            })
            .unwrap();

        let patch = BodyRawDeltaPatch {
            data: Some(PatchValue::Unset),
        };
        t.store
            .transact(|q| q.body_raw().update_delta(delta.id, &patch))
            .unwrap();

        let stored = t
            .store
            .read(|q| q.body_raw().get_by_http(delta.id))
            .unwrap()
            .unwrap();
        assert_eq!(stored.delta_raw_data, Some(Vec::new()));
        assert_eq!(stored.raw_data, vec![1, 2]);
    }

    #[test]
    fn test_update_delta_missing_body() {
        let t = test_store();
        let result = t
            .store
            .transact(|q| q.body_raw().update_delta(Id::new(), &BodyRawDeltaPatch::default()));
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
