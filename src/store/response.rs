use rusqlite::{Connection, Row, params};

use super::collect;
use crate::error::Result;
use crate::types::{HttpResponse, HttpResponseAssert, HttpResponseHeader, HttpVersion, Id};

fn response_from_row(row: &Row<'_>) -> rusqlite::Result<HttpResponse> {
    Ok(HttpResponse {
        id: row.get(0)?,
        http_id: row.get(1)?,
        status: row.get(2)?,
        body: row.get(3)?,
        size: row.get(4)?,
        duration_ms: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn header_from_row(row: &Row<'_>) -> rusqlite::Result<HttpResponseHeader> {
    Ok(HttpResponseHeader {
        id: row.get(0)?,
        response_id: row.get(1)?,
        key: row.get(2)?,
        value: row.get(3)?,
    })
}

fn assert_from_row(row: &Row<'_>) -> rusqlite::Result<HttpResponseAssert> {
    Ok(HttpResponseAssert {
        id: row.get(0)?,
        response_id: row.get(1)?,
        value: row.get(2)?,
        success: row.get(3)?,
    })
}

fn version_from_row(row: &Row<'_>) -> rusqlite::Result<HttpVersion> {
    Ok(HttpVersion {
        id: row.get(0)?,
        http_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        is_active: row.get(4)?,
        created_by: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Recorded runs. Rows are insert-only.
pub struct ResponseQueries<'c> {
    conn: &'c Connection,
}

impl<'c> ResponseQueries<'c> {
    pub(super) fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn create_response(&self, response: &HttpResponse) -> Result<()> {
        self.conn.execute(
            "INSERT INTO http_response (id, http_id, status, body, size, duration_ms, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                response.id,
                response.http_id,
                response.status,
                response.body,
                response.size,
                response.duration_ms,
                response.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn create_header(&self, header: &HttpResponseHeader) -> Result<()> {
        self.conn.execute(
            "INSERT INTO http_response_header (id, response_id, key, value)
             VALUES (?1, ?2, ?3, ?4)",
            params![header.id, header.response_id, header.key, header.value],
        )?;
        Ok(())
    }

    pub fn create_assert(&self, assert: &HttpResponseAssert) -> Result<()> {
        self.conn.execute(
            "INSERT INTO http_response_assert (id, response_id, value, success)
             VALUES (?1, ?2, ?3, ?4)",
            params![assert.id, assert.response_id, assert.value, assert.success],
        )?;
        Ok(())
    }

    /// Records a version and makes it the only active one of its entry.
    /// Returns the versions it deactivated, as stored afterwards.
    pub fn create_version(&self, version: &HttpVersion) -> Result<Vec<HttpVersion>> {
        let mut deactivated = Vec::new();
        if version.is_active {
            let mut stmt = self.conn.prepare(
                "SELECT id, http_id, name, description, is_active, created_by, created_at
                 FROM http_version WHERE http_id = ?1 AND is_active = 1 ORDER BY id",
            )?;
            let rows = stmt.query_map(params![version.http_id], version_from_row)?;
            deactivated = collect(rows)?;
            self.conn.execute(
                "UPDATE http_version SET is_active = 0 WHERE http_id = ?1 AND is_active = 1",
                params![version.http_id],
            )?;
            for previous in &mut deactivated {
                previous.is_active = false;
            }
        }
        self.conn.execute(
            "INSERT INTO http_version (id, http_id, name, description, is_active, created_by,
                 created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                version.id,
                version.http_id,
                version.name,
                version.description,
                version.is_active,
                version.created_by,
                version.created_at,
            ],
        )?;
        Ok(deactivated)
    }

    pub fn list_responses(&self, workspace_id: Id) -> Result<Vec<HttpResponse>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.id, r.http_id, r.status, r.body, r.size, r.duration_ms, r.created_at
             FROM http_response r JOIN http h ON h.id = r.http_id
             WHERE h.workspace_id = ?1 ORDER BY r.id",
        )?;
        let rows = stmt.query_map(params![workspace_id], response_from_row)?;
        collect(rows)
    }

    pub fn list_headers(&self, workspace_id: Id) -> Result<Vec<HttpResponseHeader>> {
        let mut stmt = self.conn.prepare(
            "SELECT rh.id, rh.response_id, rh.key, rh.value
             FROM http_response_header rh
             JOIN http_response r ON r.id = rh.response_id
             JOIN http h ON h.id = r.http_id
             WHERE h.workspace_id = ?1 ORDER BY rh.response_id, rh.id",
        )?;
        let rows = stmt.query_map(params![workspace_id], header_from_row)?;
        collect(rows)
    }

    pub fn list_asserts(&self, workspace_id: Id) -> Result<Vec<HttpResponseAssert>> {
        let mut stmt = self.conn.prepare(
            "SELECT ra.id, ra.response_id, ra.value, ra.success
             FROM http_response_assert ra
             JOIN http_response r ON r.id = ra.response_id
             JOIN http h ON h.id = r.http_id
             WHERE h.workspace_id = ?1 ORDER BY ra.response_id, ra.id",
        )?;
        let rows = stmt.query_map(params![workspace_id], assert_from_row)?;
        collect(rows)
    }

    pub fn list_versions(&self, workspace_id: Id) -> Result<Vec<HttpVersion>> {
        let mut stmt = self.conn.prepare(
            "SELECT v.id, v.http_id, v.name, v.description, v.is_active, v.created_by,
                 v.created_at
             FROM http_version v JOIN http h ON h.id = v.http_id
             WHERE h.workspace_id = ?1 ORDER BY v.id",
        )?;
        let rows = stmt.query_map(params![workspace_id], version_from_row)?;
        collect(rows)
    }
}
