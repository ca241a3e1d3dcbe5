/// MIGRATION 0001: authentication identities, admin roles and bearer sessions.
pub const MIGRATION_0001: &str = r#"
-- Identities: one row per login, clients and admins alike.
CREATE TABLE IF NOT EXISTS identities (
    id TEXT PRIMARY KEY,
    login TEXT NOT NULL UNIQUE, -- username for clients, e-mail for admins
    email TEXT,
    password_hash TEXT NOT NULL, -- hex(salt):hex(scrypt key)
    display_name TEXT,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);

CREATE TABLE IF NOT EXISTS user_roles (
    identity_id TEXT NOT NULL,
    role TEXT NOT NULL,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    PRIMARY KEY (identity_id, role),
    FOREIGN KEY (identity_id) REFERENCES identities (id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS sessions (
    token TEXT PRIMARY KEY,
    identity_id TEXT NOT NULL,
    expires_at INTEGER NOT NULL,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    FOREIGN KEY (identity_id) REFERENCES identities (id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_sessions_identity_id ON sessions (identity_id);
"#;

/// MIGRATION 0002: portal records.
pub const MIGRATION_0002: &str = r#"
-- Client accounts. The id is shared with the owning identity.
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    contact TEXT,
    folder_path TEXT,
    selection_limit INTEGER NOT NULL CHECK (selection_limit > 0),
    is_finalized BOOLEAN NOT NULL DEFAULT 0,
    last_login INTEGER,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    FOREIGN KEY (id) REFERENCES identities (id) ON DELETE CASCADE
);

-- Photos are shared by every account; rows come from the ingestion side.
CREATE TABLE IF NOT EXISTS photos (
    id TEXT PRIMARY KEY,
    file_name TEXT NOT NULL,
    folder_path TEXT NOT NULL,
    full_url TEXT,
    thumbnail_url TEXT,
    file_size INTEGER,
    width INTEGER,
    height INTEGER,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);

CREATE TABLE IF NOT EXISTS selections (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    photo_id TEXT NOT NULL,
    category TEXT NOT NULL CHECK (category IN ('selected', 'later')),
    selected_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE,
    FOREIGN KEY (photo_id) REFERENCES photos (id) ON DELETE CASCADE,
    UNIQUE (user_id, photo_id)
);

CREATE TABLE IF NOT EXISTS feedback (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    overall_rating INTEGER NOT NULL CHECK (overall_rating BETWEEN 1 AND 5),
    selection_experience INTEGER NOT NULL CHECK (selection_experience BETWEEN 1 AND 5),
    photo_quality INTEGER NOT NULL CHECK (photo_quality BETWEEN 1 AND 5),
    comments TEXT,
    is_publishable BOOLEAN NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
);

-- Append-only audit trail; survives account deletion.
CREATE TABLE IF NOT EXISTS activity_logs (
    id TEXT PRIMARY KEY,
    user_id TEXT,
    action TEXT NOT NULL,
    details TEXT, -- JSON
    ip_address TEXT,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS site_settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL, -- JSON
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);

CREATE TABLE IF NOT EXISTS admin_settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL, -- JSON
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_users_created_at ON users (created_at);
CREATE INDEX IF NOT EXISTS idx_photos_folder_path ON photos (folder_path);
CREATE INDEX IF NOT EXISTS idx_selections_user_id ON selections (user_id);
CREATE INDEX IF NOT EXISTS idx_selections_category ON selections (user_id, category);
CREATE INDEX IF NOT EXISTS idx_feedback_user_id ON feedback (user_id);
CREATE INDEX IF NOT EXISTS idx_activity_logs_created_at ON activity_logs (created_at);
"#;
