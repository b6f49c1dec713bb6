mod assert;
mod body_raw;
mod http;
mod key_value;
mod response;
mod schema;
mod workspace;

pub use assert::AssertQueries;
pub use body_raw::BodyRawQueries;
pub use http::HttpQueries;
pub use key_value::KeyValueQueries;
pub use response::ResponseQueries;
pub use workspace::WorkspaceQueries;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;

use crate::error::{Error, Result};
use crate::types::{Id, KeyValueKind, Role};
use schema::{KEY_VALUE_TABLE, SCHEMA};

/// Workspace membership lookups used for authorization and stream filtering.
pub trait Membership: Send + Sync {
    fn check_user_belongs_to_workspace(&self, user_id: Id, workspace_id: Id) -> Result<bool>;

    /// Role of the user in the workspace, or `Error::NotFound` for non-members.
    fn get_workspace_user_role(&self, workspace_id: Id, user_id: Id) -> Result<Role>;
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn initialize(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(SCHEMA)?;
        for kind in KeyValueKind::ALL {
            conn.execute_batch(&KEY_VALUE_TABLE.replace("{table}", kind.table()))?;
        }
        Ok(())
    }

    /// Runs `f` against the latest committed state.
    pub fn read<T>(&self, f: impl FnOnce(&Queries<'_>) -> Result<T>) -> Result<T> {
        let conn = self.conn();
        f(&Queries { conn: &conn })
    }

    /// Runs `f` inside a transaction. The transaction commits only when `f`
    /// returns `Ok`; any error rolls every write back.
    pub fn transact<T>(&self, f: impl FnOnce(&Queries<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let out = f(&Queries { conn: &tx })?;
        tx.commit()?;
        Ok(out)
    }
}

impl Membership for SqliteStore {
    fn check_user_belongs_to_workspace(&self, user_id: Id, workspace_id: Id) -> Result<bool> {
        self.read(|q| {
            q.workspaces()
                .get_role(workspace_id, user_id)
                .map(|role| role.is_some())
        })
    }

    fn get_workspace_user_role(&self, workspace_id: Id, user_id: Id) -> Result<Role> {
        self.read(|q| q.workspaces().get_role(workspace_id, user_id))?
            .ok_or_else(|| Error::not_found("workspace user"))
    }
}

/// Entity handles over one connection or one open transaction.
pub struct Queries<'c> {
    conn: &'c Connection,
}

impl<'c> Queries<'c> {
    #[must_use]
    pub fn workspaces(&self) -> WorkspaceQueries<'c> {
        WorkspaceQueries::new(self.conn)
    }

    #[must_use]
    pub fn http(&self) -> HttpQueries<'c> {
        HttpQueries::new(self.conn)
    }

    #[must_use]
    pub fn key_values(&self, kind: KeyValueKind) -> KeyValueQueries<'c> {
        KeyValueQueries::new(self.conn, kind)
    }

    #[must_use]
    pub fn asserts(&self) -> AssertQueries<'c> {
        AssertQueries::new(self.conn)
    }

    #[must_use]
    pub fn body_raw(&self) -> BodyRawQueries<'c> {
        BodyRawQueries::new(self.conn)
    }

    #[must_use]
    pub fn responses(&self) -> ResponseQueries<'c> {
        ResponseQueries::new(self.conn)
    }

    #[cfg(test)]
    pub(crate) fn conn_for_tests(&self) -> &'c Connection {
        self.conn
    }
}

fn collect<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
) -> Result<Vec<T>> {
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Error::from)
}
