use rusqlite::{Connection, OptionalExtension, Row, params};

use super::collect;
use crate::error::{Error, Result};
use crate::patch::{HttpDeltaPatch, Patch};
use crate::types::{Http, Id, now_ms};

const COLUMNS: &str = "id, workspace_id, folder_id, name, url, method, description, body_kind, \
     is_delta, is_snapshot, parent_http_id, delta_name, delta_url, delta_method, \
     created_at, updated_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Http> {
    Ok(Http {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        folder_id: row.get(2)?,
        name: row.get(3)?,
        url: row.get(4)?,
        method: row.get(5)?,
        description: row.get(6)?,
        body_kind: row.get(7)?,
        is_delta: row.get(8)?,
        is_snapshot: row.get(9)?,
        parent_http_id: row.get(10)?,
        delta_name: row.get(11)?,
        delta_url: row.get(12)?,
        delta_method: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

pub struct HttpQueries<'c> {
    conn: &'c Connection,
}

impl<'c> HttpQueries<'c> {
    pub(super) fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn get(&self, id: Id) -> Result<Option<Http>> {
        self.conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM http WHERE id = ?1"),
                params![id],
                from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    /// Base entries of a workspace (neither deltas nor snapshots).
    pub fn list_by_workspace(&self, workspace_id: Id) -> Result<Vec<Http>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM http
             WHERE workspace_id = ?1 AND is_delta = 0 AND is_snapshot = 0
             ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![workspace_id], from_row)?;
        collect(rows)
    }

    pub fn get_deltas_by_workspace(&self, workspace_id: Id) -> Result<Vec<Http>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM http WHERE workspace_id = ?1 AND is_delta = 1 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![workspace_id], from_row)?;
        collect(rows)
    }

    pub fn get_deltas_by_parent(&self, parent_http_id: Id) -> Result<Vec<Http>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM http WHERE parent_http_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![parent_http_id], from_row)?;
        collect(rows)
    }

    pub fn create(&self, http: &Http) -> Result<()> {
        http.validate()?;
        self.conn.execute(
            &format!(
                "INSERT INTO http ({COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
            ),
            params![
                http.id,
                http.workspace_id,
                http.folder_id,
                http.name,
                http.url,
                http.method,
                http.description,
                http.body_kind,
                http.is_delta,
                http.is_snapshot,
                http.parent_http_id,
                http.delta_name,
                http.delta_url,
                http.delta_method,
                http.created_at,
                http.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Writes the visible fields of an entry. Snapshots are immutable.
    pub fn update(&self, http: &Http) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE http SET folder_id = ?1, name = ?2, url = ?3, method = ?4,
                 description = ?5, body_kind = ?6, updated_at = ?7
             WHERE id = ?8 AND is_snapshot = 0",
            params![
                http.folder_id,
                http.name,
                http.url,
                http.method,
                http.description,
                http.body_kind,
                http.updated_at,
                http.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::not_found("http"));
        }
        Ok(())
    }

    /// Applies `patch` to the override columns of a delta entry and returns
    /// the stored result.
    pub fn update_delta(&self, id: Id, patch: &HttpDeltaPatch) -> Result<Http> {
        let mut http = self.get(id)?.ok_or_else(|| Error::not_found("http"))?;
        if !http.is_delta {
            return Err(Error::NotDelta("http".into()));
        }
        patch.apply(&mut http);
        http.updated_at = now_ms();

        self.conn.execute(
            "UPDATE http SET delta_name = ?1, delta_url = ?2, delta_method = ?3, updated_at = ?4
             WHERE id = ?5",
            params![
                http.delta_name,
                http.delta_url,
                http.delta_method,
                http.updated_at,
                http.id,
            ],
        )?;
        Ok(http)
    }

    pub fn delete(&self, id: Id) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM http WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }
}
