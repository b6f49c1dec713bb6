pub const SCHEMA: &str = r#"
-- Users are the callers behind tokens
CREATE TABLE IF NOT EXISTS users (
    id BLOB PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    created_at INTEGER NOT NULL
);

-- Tokens are auth credentials for users
CREATE TABLE IF NOT EXISTS tokens (
    id BLOB PRIMARY KEY,
    token_hash TEXT NOT NULL,          -- argon2id hash with embedded salt
    token_lookup TEXT NOT NULL,        -- first 8 chars of a uuid for fast lookup
    user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at TEXT DEFAULT (datetime('now')),
    expires_at TEXT,                   -- NULL = never
    last_used_at TEXT
);

-- Workspaces own templates
CREATE TABLE IF NOT EXISTS workspaces (
    id BLOB PRIMARY KEY,
    name TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS workspace_users (
    workspace_id BLOB NOT NULL REFERENCES workspaces(id) ON DELETE CASCADE,
    user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    role INTEGER NOT NULL CHECK (role IN (1, 2, 3)),  -- 1 user, 2 admin, 3 owner
    PRIMARY KEY (workspace_id, user_id)
);

-- Request templates; deltas reference their base through parent_http_id
CREATE TABLE IF NOT EXISTS http (
    id BLOB PRIMARY KEY,
    workspace_id BLOB NOT NULL REFERENCES workspaces(id) ON DELETE CASCADE,
    folder_id BLOB,
    name TEXT NOT NULL DEFAULT '',
    url TEXT NOT NULL DEFAULT '',
    method INTEGER NOT NULL DEFAULT 0,
    description TEXT NOT NULL DEFAULT '',
    body_kind INTEGER NOT NULL DEFAULT 0,

    is_delta INTEGER NOT NULL DEFAULT 0,
    is_snapshot INTEGER NOT NULL DEFAULT 0,
    parent_http_id BLOB REFERENCES http(id),  -- no cascade: parents with deltas cannot go

    -- Overrides, NULL = inherit
    delta_name TEXT,
    delta_url TEXT,
    delta_method INTEGER,

    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,

    CHECK (NOT (is_delta = 1 AND is_snapshot = 1)),
    CHECK (is_delta = 0 OR parent_http_id IS NOT NULL),
    CHECK (is_delta = 1 OR (parent_http_id IS NULL
        AND delta_name IS NULL AND delta_url IS NULL AND delta_method IS NULL))
);

-- Raw body, one per template
CREATE TABLE IF NOT EXISTS http_body_raw (
    id BLOB PRIMARY KEY,
    http_id BLOB NOT NULL UNIQUE REFERENCES http(id) ON DELETE CASCADE,
    raw_data BLOB NOT NULL,
    compression_type INTEGER NOT NULL DEFAULT 0,
    is_delta INTEGER NOT NULL DEFAULT 0,
    parent_body_raw_id BLOB REFERENCES http_body_raw(id),
    delta_raw_data BLOB,  -- NULL = inherit, empty = explicit empty body
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,

    CHECK (is_delta = 1 OR (parent_body_raw_id IS NULL AND delta_raw_data IS NULL))
);

-- Assertions evaluated against responses
CREATE TABLE IF NOT EXISTS http_assert (
    id BLOB PRIMARY KEY,
    http_id BLOB NOT NULL REFERENCES http(id) ON DELETE CASCADE,
    value TEXT NOT NULL DEFAULT '',
    enabled INTEGER NOT NULL DEFAULT 1,
    description TEXT NOT NULL DEFAULT '',
    display_order REAL NOT NULL DEFAULT 0,
    is_delta INTEGER NOT NULL DEFAULT 0,
    parent_id BLOB REFERENCES http_assert(id),
    delta_value TEXT,
    delta_enabled INTEGER,
    delta_description TEXT,
    delta_display_order REAL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,

    CHECK (is_delta = 1 OR (parent_id IS NULL AND delta_value IS NULL
        AND delta_enabled IS NULL AND delta_description IS NULL
        AND delta_display_order IS NULL))
);

-- Recorded runs; immutable after insert
CREATE TABLE IF NOT EXISTS http_response (
    id BLOB PRIMARY KEY,
    http_id BLOB NOT NULL REFERENCES http(id) ON DELETE CASCADE,
    status INTEGER NOT NULL,
    body BLOB NOT NULL,
    size INTEGER NOT NULL,
    duration_ms INTEGER NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS http_response_header (
    id BLOB PRIMARY KEY,
    response_id BLOB NOT NULL REFERENCES http_response(id) ON DELETE CASCADE,
    key TEXT NOT NULL,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS http_response_assert (
    id BLOB PRIMARY KEY,
    response_id BLOB NOT NULL REFERENCES http_response(id) ON DELETE CASCADE,
    value TEXT NOT NULL,
    success INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS http_version (
    id BLOB PRIMARY KEY,
    http_id BLOB NOT NULL REFERENCES http(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    is_active INTEGER NOT NULL DEFAULT 0,
    created_by BLOB REFERENCES users(id) ON DELETE SET NULL,
    created_at INTEGER NOT NULL
);

-- Create indexes
CREATE UNIQUE INDEX IF NOT EXISTS idx_tokens_lookup ON tokens(token_lookup);
CREATE INDEX IF NOT EXISTS idx_tokens_user ON tokens(user_id);
CREATE INDEX IF NOT EXISTS idx_workspace_users_user ON workspace_users(user_id);
CREATE INDEX IF NOT EXISTS idx_http_workspace ON http(workspace_id, is_delta);
CREATE INDEX IF NOT EXISTS idx_http_parent ON http(parent_http_id);
CREATE INDEX IF NOT EXISTS idx_http_body_raw_parent ON http_body_raw(parent_body_raw_id);
CREATE INDEX IF NOT EXISTS idx_http_assert_http ON http_assert(http_id);
CREATE INDEX IF NOT EXISTS idx_http_assert_parent ON http_assert(parent_id);
CREATE INDEX IF NOT EXISTS idx_http_response_http ON http_response(http_id);
CREATE INDEX IF NOT EXISTS idx_http_response_header_response ON http_response_header(response_id);
CREATE INDEX IF NOT EXISTS idx_http_response_assert_response ON http_response_assert(response_id);
CREATE INDEX IF NOT EXISTS idx_http_version_http ON http_version(http_id);
"#;

/// Key/value child tables share one layout; `{table}` is substituted per kind.
pub const KEY_VALUE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS {table} (
    id BLOB PRIMARY KEY,
    http_id BLOB NOT NULL REFERENCES http(id) ON DELETE CASCADE,
    key TEXT NOT NULL DEFAULT '',
    value TEXT NOT NULL DEFAULT '',
    enabled INTEGER NOT NULL DEFAULT 1,
    description TEXT NOT NULL DEFAULT '',
    display_order REAL NOT NULL DEFAULT 0,
    is_delta INTEGER NOT NULL DEFAULT 0,
    parent_id BLOB REFERENCES {table}(id),
    delta_key TEXT,
    delta_value TEXT,
    delta_enabled INTEGER,
    delta_description TEXT,
    delta_display_order REAL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,

    CHECK (is_delta = 1 OR (parent_id IS NULL AND delta_key IS NULL
        AND delta_value IS NULL AND delta_enabled IS NULL
        AND delta_description IS NULL AND delta_display_order IS NULL))
);
CREATE INDEX IF NOT EXISTS idx_{table}_http ON {table}(http_id);
CREATE INDEX IF NOT EXISTS idx_{table}_parent ON {table}(parent_id);
"#;
