use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::collect;
use crate::error::{Error, Result};
use crate::types::{Id, Role, Token, User, Workspace};

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

const TOKEN_COLUMNS: &str =
    "id, token_hash, token_lookup, user_id, created_at, expires_at, last_used_at";

fn token_from_row(row: &Row<'_>) -> rusqlite::Result<Token> {
    Ok(Token {
        id: row.get(0)?,
        token_hash: row.get(1)?,
        token_lookup: row.get(2)?,
        user_id: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
        expires_at: row.get::<_, Option<String>>(5)?.map(|s| parse_datetime(&s)),
        last_used_at: row.get::<_, Option<String>>(6)?.map(|s| parse_datetime(&s)),
    })
}

/// Users, workspaces, memberships and tokens.
pub struct WorkspaceQueries<'c> {
    conn: &'c Connection,
}

impl<'c> WorkspaceQueries<'c> {
    pub(super) fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    // User operations

    pub fn create_user(&self, user: &User) -> Result<()> {
        self.conn.execute(
            "INSERT INTO users (id, name, created_at) VALUES (?1, ?2, ?3)",
            params![user.id, user.name, user.created_at],
        )?;
        Ok(())
    }

    pub fn get_user(&self, id: Id) -> Result<Option<User>> {
        self.conn
            .query_row(
                "SELECT id, name, created_at FROM users WHERE id = ?1",
                params![id],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(Error::from)
    }

    pub fn get_user_by_name(&self, name: &str) -> Result<Option<User>> {
        self.conn
            .query_row(
                "SELECT id, name, created_at FROM users WHERE name = ?1",
                params![name],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(Error::from)
    }

    // Workspace operations

    pub fn create_workspace(&self, ws: &Workspace) -> Result<()> {
        self.conn.execute(
            "INSERT INTO workspaces (id, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![ws.id, ws.name, ws.created_at, ws.updated_at],
        )?;
        Ok(())
    }

    pub fn get_workspace(&self, id: Id) -> Result<Option<Workspace>> {
        self.conn
            .query_row(
                "SELECT id, name, created_at, updated_at FROM workspaces WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Workspace {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        created_at: row.get(2)?,
                        updated_at: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(Error::from)
    }

    pub fn delete_workspace(&self, id: Id) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM workspaces WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Membership operations

    pub fn add_member(&self, workspace_id: Id, user_id: Id, role: Role) -> Result<()> {
        self.conn.execute(
            "INSERT INTO workspace_users (workspace_id, user_id, role) VALUES (?1, ?2, ?3)
             ON CONFLICT (workspace_id, user_id) DO UPDATE SET role = excluded.role",
            params![workspace_id, user_id, role],
        )?;
        Ok(())
    }

    pub fn get_role(&self, workspace_id: Id, user_id: Id) -> Result<Option<Role>> {
        self.conn
            .query_row(
                "SELECT role FROM workspace_users WHERE workspace_id = ?1 AND user_id = ?2",
                params![workspace_id, user_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(Error::from)
    }

    /// Workspaces the user is a member of, in id order.
    pub fn list_user_workspace_ids(&self, user_id: Id) -> Result<Vec<Id>> {
        let mut stmt = self.conn.prepare(
            "SELECT workspace_id FROM workspace_users WHERE user_id = ?1 ORDER BY workspace_id",
        )?;
        let rows = stmt.query_map(params![user_id], |row| row.get(0))?;
        collect(rows)
    }

    // Token operations

    pub fn create_token(&self, token: &Token) -> Result<()> {
        let result = self.conn.execute(
            "INSERT INTO tokens (id, token_hash, token_lookup, user_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                token.id,
                token.token_hash,
                token.token_lookup,
                token.user_id,
                format_datetime(&token.created_at),
                token.expires_at.as_ref().map(format_datetime),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) => match Error::from(e) {
                Error::Constraint(_) => Err(Error::Constraint("token lookup collision".into())),
                other => Err(other),
            },
        }
    }

    pub fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>> {
        self.conn
            .query_row(
                &format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE token_lookup = ?1"),
                params![lookup],
                token_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    pub fn list_user_tokens(&self, user_id: Id) -> Result<Vec<Token>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens WHERE user_id = ?1 ORDER BY created_at DESC"
        ))?;
        let rows = stmt.query_map(params![user_id], token_from_row)?;
        collect(rows)
    }

    pub fn update_token_last_used(&self, id: Id) -> Result<()> {
        self.conn.execute(
            "UPDATE tokens SET last_used_at = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::test_store;
    use super::*;

    fn token(user_id: Id, lookup: &str) -> Token {
        Token {
            id: Id::new(),
            token_hash: "hash".into(),
            token_lookup: lookup.into(),
            user_id,
            created_at: Utc::now(),
            expires_at: None,
            last_used_at: None,
        }
    }

    #[test]
    fn test_token_lookup_collision() {
        let t = test_store();
        t.store
            .transact(|q| q.workspaces().create_token(&token(t.user_id, "lookup12")))
            .unwrap();

        let result = t
            .store
            .transact(|q| q.workspaces().create_token(&token(t.user_id, "lookup12")));
        assert!(matches!(result, Err(Error::Constraint(_))));
    }

    #[test]
    fn test_token_round_trip() {
        let t = test_store();
        let tok = token(t.user_id, "abcdefgh");
        t.store
            .transact(|q| q.workspaces().create_token(&tok))
            .unwrap();

        let fetched = t
            .store
            .read(|q| q.workspaces().get_token_by_lookup("abcdefgh"))
            .unwrap()
            .unwrap();
        assert_eq!(fetched.id, tok.id);
        assert_eq!(fetched.user_id, t.user_id);
        assert!(fetched.last_used_at.is_none());

        t.store
            .read(|q| q.workspaces().update_token_last_used(tok.id))
            .unwrap();
        let tokens = t
            .store
            .read(|q| q.workspaces().list_user_tokens(t.user_id))
            .unwrap();
        assert!(tokens[0].last_used_at.is_some());
    }

    #[test]
    fn test_member_role_upsert() {
        let t = test_store();
        t.store
            .transact(|q| q.workspaces().add_member(t.workspace_id, t.user_id, Role::User))
            .unwrap();
        let role = t
            .store
            .read(|q| q.workspaces().get_role(t.workspace_id, t.user_id))
            .unwrap();
        assert_eq!(role, Some(Role::User));

        let ids = t
            .store
            .read(|q| q.workspaces().list_user_workspace_ids(t.user_id))
            .unwrap();
        assert_eq!(ids, vec![t.workspace_id]);
    }
}
