use crate::config::AppPaths;
use crate::error::Result;
use crate::models::{
    Account, AccountFields, ActivityEntry, ActivityLog, Feedback, Identity, Photo, Selection,
    SelectionCategory, SelectionOverviewRow, SelectionWithPhoto, SettingRecord,
};
use crate::schema;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::time::Duration;
use uuid::Uuid;

pub type DbPool = r2d2::Pool<SqliteConnectionManager>;
pub type DbConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Initializes the database connection pool and runs migrations.
pub fn init_database(paths: &AppPaths) -> Result<DbPool> {
    log::info!("Database path: {}", paths.db_path.display());

    // Ensure the parent directory exists
    if let Some(parent) = paths.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let manager = SqliteConnectionManager::file(&paths.db_path).with_init(configure_connection);
    let pool = r2d2::Pool::new(manager)?;

    run_migrations(&pool.get()?)?;

    Ok(pool)
}

/// Single-connection in-memory pool; every checkout sees the same database.
#[cfg(test)]
pub fn memory_pool() -> DbPool {
    let manager = SqliteConnectionManager::memory().with_init(configure_connection);
    let pool = r2d2::Pool::builder()
        .max_size(1)
        .build(manager)
        .expect("in-memory pool");
    run_migrations(&pool.get().expect("connection")).expect("migrations");
    pool
}

fn configure_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")
}

/// Applies all pending database migrations.
fn run_migrations(connection: &DbConnection) -> Result<()> {
    let connection: &Connection = connection;

    log::info!("Running database migrations...");

    // Migration 0001: identities, roles, sessions
    connection.execute_batch(schema::MIGRATION_0001)?;
    // Migration 0002: portal records
    connection.execute_batch(schema::MIGRATION_0002)?;

    log::info!("Migrations applied successfully.");
    Ok(())
}

pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Opens a write transaction that takes the database write lock up front.
pub fn begin_immediate(conn: &Connection) -> Result<Transaction<'_>> {
    Ok(Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?)
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn json_column(raw: Option<String>) -> Option<serde_json::Value> {
    raw.and_then(|text| match serde_json::from_str(&text) {
        Ok(value) => Some(value),
        Err(err) => {
            log::warn!("Discarding malformed JSON column: {err}");
            None
        }
    })
}

// ---------------------------------------------------------------------------
// Identities, roles, sessions

const IDENTITY_COLUMNS: &str = "id, login, email, password_hash, display_name, created_at";

fn identity_from_row(row: &Row<'_>) -> rusqlite::Result<Identity> {
    Ok(Identity {
        id: row.get(0)?,
        login: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        display_name: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub fn insert_identity(
    conn: &Connection,
    login: &str,
    email: Option<&str>,
    password_hash: &str,
    display_name: Option<&str>,
) -> Result<Identity> {
    let identity = Identity {
        id: new_id(),
        login: login.to_string(),
        email: email.map(str::to_string),
        password_hash: password_hash.to_string(),
        display_name: display_name.map(str::to_string),
        created_at: unix_now(),
    };
    conn.execute(
        "INSERT INTO identities (id, login, email, password_hash, display_name, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            identity.id,
            identity.login,
            identity.email,
            identity.password_hash,
            identity.display_name,
            identity.created_at
        ],
    )?;
    Ok(identity)
}

pub fn find_identity_by_login(conn: &Connection, login: &str) -> Result<Option<Identity>> {
    let sql = format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE login = ?1");
    Ok(conn.query_row(&sql, params![login], identity_from_row).optional()?)
}

pub fn get_identity(conn: &Connection, id: &str) -> Result<Option<Identity>> {
    let sql = format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE id = ?1");
    Ok(conn.query_row(&sql, params![id], identity_from_row).optional()?)
}

pub fn update_identity_profile(
    conn: &Connection,
    id: &str,
    login: &str,
    display_name: Option<&str>,
) -> Result<()> {
    conn.execute(
        "UPDATE identities SET login = ?2, display_name = ?3, updated_at = ?4 WHERE id = ?1",
        params![id, login, display_name, unix_now()],
    )?;
    Ok(())
}

pub fn update_password_hash(conn: &Connection, id: &str, password_hash: &str) -> Result<()> {
    conn.execute(
        "UPDATE identities SET password_hash = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, password_hash, unix_now()],
    )?;
    Ok(())
}

pub fn delete_identity(conn: &Connection, id: &str) -> Result<bool> {
    let removed = conn.execute("DELETE FROM identities WHERE id = ?1", params![id])?;
    Ok(removed > 0)
}

pub fn grant_role(conn: &Connection, identity_id: &str, role: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO user_roles (identity_id, role) VALUES (?1, ?2)",
        params![identity_id, role],
    )?;
    Ok(())
}

pub fn has_role(conn: &Connection, identity_id: &str, role: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM user_roles WHERE identity_id = ?1 AND role = ?2",
            params![identity_id, role],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn insert_session(
    conn: &Connection,
    token: &str,
    identity_id: &str,
    expires_at: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO sessions (token, identity_id, expires_at, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![token, identity_id, expires_at, unix_now()],
    )?;
    Ok(())
}

/// Identity id behind a session token that has not expired at `now`.
pub fn find_session_identity(conn: &Connection, token: &str, now: i64) -> Result<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT identity_id FROM sessions WHERE token = ?1 AND expires_at > ?2",
            params![token, now],
            |row| row.get(0),
        )
        .optional()?)
}

pub fn delete_session(conn: &Connection, token: &str) -> Result<bool> {
    let removed = conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(removed > 0)
}

pub fn delete_sessions_for(conn: &Connection, identity_id: &str) -> Result<usize> {
    Ok(conn.execute("DELETE FROM sessions WHERE identity_id = ?1", params![identity_id])?)
}

pub fn purge_expired_sessions(conn: &Connection, now: i64) -> Result<usize> {
    Ok(conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now])?)
}

// ---------------------------------------------------------------------------
// Accounts

const ACCOUNT_COLUMNS: &str = "id, username, name, contact, folder_path, selection_limit, \
                               is_finalized, last_login, created_at, updated_at";

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        username: row.get(1)?,
        name: row.get(2)?,
        contact: row.get(3)?,
        folder_path: row.get(4)?,
        selection_limit: row.get(5)?,
        is_finalized: row.get(6)?,
        last_login: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

pub fn list_accounts(conn: &Connection) -> Result<Vec<Account>> {
    let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM users ORDER BY created_at DESC, rowid DESC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], account_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn get_account(conn: &Connection, id: &str) -> Result<Option<Account>> {
    let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM users WHERE id = ?1");
    Ok(conn.query_row(&sql, params![id], account_from_row).optional()?)
}

pub fn find_account_by_username(conn: &Connection, username: &str) -> Result<Option<Account>> {
    let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM users WHERE username = ?1");
    Ok(conn.query_row(&sql, params![username], account_from_row).optional()?)
}

pub fn insert_account(conn: &Connection, id: &str, fields: &AccountFields) -> Result<Account> {
    let now = unix_now();
    conn.execute(
        "INSERT INTO users (id, username, name, contact, folder_path, selection_limit, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            id,
            fields.username,
            fields.name,
            fields.contact,
            fields.folder_path,
            fields.selection_limit,
            now
        ],
    )?;
    Ok(Account {
        id: id.to_string(),
        username: fields.username.clone(),
        name: fields.name.clone(),
        contact: fields.contact.clone(),
        folder_path: fields.folder_path.clone(),
        selection_limit: fields.selection_limit,
        is_finalized: false,
        last_login: None,
        created_at: now,
        updated_at: now,
    })
}

/// Returns the updated account, or `None` when no account has this id.
pub fn update_account(conn: &Connection, id: &str, fields: &AccountFields) -> Result<Option<Account>> {
    let changed = conn.execute(
        "UPDATE users SET username = ?2, name = ?3, contact = ?4, folder_path = ?5,
                          selection_limit = ?6, updated_at = ?7
         WHERE id = ?1",
        params![
            id,
            fields.username,
            fields.name,
            fields.contact,
            fields.folder_path,
            fields.selection_limit,
            unix_now()
        ],
    )?;
    if changed == 0 {
        return Ok(None);
    }
    get_account(conn, id)
}

pub fn set_finalized(conn: &Connection, id: &str, finalized: bool) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE users SET is_finalized = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, finalized, unix_now()],
    )?;
    Ok(changed > 0)
}

pub fn is_finalized(conn: &Connection, id: &str) -> Result<bool> {
    let finalized: Option<bool> = conn
        .query_row(
            "SELECT is_finalized FROM users WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(finalized.unwrap_or(false))
}

/// Flips an open account to finalized. Returns false when it was already finalized.
pub fn claim_finalization(conn: &Connection, id: &str) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE users SET is_finalized = 1, updated_at = ?2 WHERE id = ?1 AND is_finalized = 0",
        params![id, unix_now()],
    )?;
    Ok(changed > 0)
}

pub fn touch_last_login(conn: &Connection, id: &str) -> Result<()> {
    conn.execute(
        "UPDATE users SET last_login = ?2 WHERE id = ?1",
        params![id, unix_now()],
    )?;
    Ok(())
}

pub fn delete_account(conn: &Connection, id: &str) -> Result<bool> {
    let removed = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
    Ok(removed > 0)
}

pub fn count_accounts(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
}

pub fn count_finalized_accounts(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM users WHERE is_finalized = 1",
        [],
        |row| row.get(0),
    )?)
}

// ---------------------------------------------------------------------------
// Photos

const PHOTO_COLUMNS: &str =
    "id, file_name, folder_path, full_url, thumbnail_url, file_size, width, height, created_at";

fn photo_from_row(row: &Row<'_>) -> rusqlite::Result<Photo> {
    photo_at(row, 0)
}

/// Reads the photo columns starting at column `at`, for joined queries.
fn photo_at(row: &Row<'_>, at: usize) -> rusqlite::Result<Photo> {
    Ok(Photo {
        id: row.get(at)?,
        file_name: row.get(at + 1)?,
        folder_path: row.get(at + 2)?,
        full_url: row.get(at + 3)?,
        thumbnail_url: row.get(at + 4)?,
        file_size: row.get(at + 5)?,
        width: row.get(at + 6)?,
        height: row.get(at + 7)?,
        created_at: row.get(at + 8)?,
    })
}

pub fn list_photos(conn: &Connection) -> Result<Vec<Photo>> {
    let sql = format!("SELECT {PHOTO_COLUMNS} FROM photos ORDER BY created_at DESC, rowid DESC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], photo_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn list_photos_in_folder(conn: &Connection, folder_path: &str) -> Result<Vec<Photo>> {
    let sql = format!(
        "SELECT {PHOTO_COLUMNS} FROM photos WHERE folder_path = ?1 ORDER BY file_name, rowid"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![folder_path], photo_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Whether the photo exists and, when `folder_path` is given, lives in that folder.
pub fn photo_visible(conn: &Connection, id: &str, folder_path: Option<&str>) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM photos WHERE id = ?1 AND (?2 IS NULL OR folder_path = ?2)",
            params![id, folder_path],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Registers a photo. A blank id gets a generated one; a missing timestamp means now.
pub fn insert_photo(conn: &Connection, photo: &Photo) -> Result<Photo> {
    let mut stored = photo.clone();
    if stored.id.is_empty() {
        stored.id = new_id();
    }
    let created_at = *stored.created_at.get_or_insert_with(unix_now);
    conn.execute(
        "INSERT INTO photos (id, file_name, folder_path, full_url, thumbnail_url, file_size, width, height, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            stored.id,
            stored.file_name,
            stored.folder_path,
            stored.full_url,
            stored.thumbnail_url,
            stored.file_size,
            stored.width,
            stored.height,
            created_at
        ],
    )?;
    Ok(stored)
}

// ---------------------------------------------------------------------------
// Selections

fn selection_from_row(row: &Row<'_>) -> rusqlite::Result<Selection> {
    Ok(Selection {
        id: row.get(0)?,
        user_id: row.get(1)?,
        photo_id: row.get(2)?,
        category: row.get(3)?,
        selected_at: row.get(4)?,
    })
}

pub fn list_selections(conn: &Connection, user_id: &str) -> Result<Vec<Selection>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, photo_id, category, selected_at FROM selections
         WHERE user_id = ?1 ORDER BY selected_at, rowid",
    )?;
    let rows = stmt.query_map(params![user_id], selection_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Inserts or recategorizes the single row for `(user_id, photo_id)`.
pub fn upsert_selection(
    conn: &Connection,
    user_id: &str,
    photo_id: &str,
    category: SelectionCategory,
) -> Result<Selection> {
    Ok(conn.query_row(
        "INSERT INTO selections (id, user_id, photo_id, category, selected_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT (user_id, photo_id)
         DO UPDATE SET category = excluded.category, selected_at = excluded.selected_at
         RETURNING id, user_id, photo_id, category, selected_at",
        params![new_id(), user_id, photo_id, category, unix_now()],
        selection_from_row,
    )?)
}

pub fn delete_selection(conn: &Connection, user_id: &str, photo_id: &str) -> Result<bool> {
    let removed = conn.execute(
        "DELETE FROM selections WHERE user_id = ?1 AND photo_id = ?2",
        params![user_id, photo_id],
    )?;
    Ok(removed > 0)
}

pub fn count_selections(
    conn: &Connection,
    user_id: &str,
    category: SelectionCategory,
) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM selections WHERE user_id = ?1 AND category = ?2",
        params![user_id, category],
        |row| row.get(0),
    )?)
}

/// Selected rows of the account other than `photo_id`.
pub fn count_selected_except(conn: &Connection, user_id: &str, photo_id: &str) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM selections WHERE user_id = ?1 AND category = ?2 AND photo_id <> ?3",
        params![user_id, SelectionCategory::Selected, photo_id],
        |row| row.get(0),
    )?)
}

pub fn count_all_selections(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM selections", [], |row| row.get(0))?)
}

/// The account's selections with their photos, oldest first.
pub fn list_selections_with_photos(
    conn: &Connection,
    user_id: &str,
) -> Result<Vec<SelectionWithPhoto>> {
    let mut stmt = conn.prepare(
        "SELECT s.photo_id, s.category, s.selected_at,
                p.id, p.file_name, p.folder_path, p.full_url, p.thumbnail_url,
                p.file_size, p.width, p.height, p.created_at
         FROM selections s
         JOIN photos p ON p.id = s.photo_id
         WHERE s.user_id = ?1
         ORDER BY s.selected_at, s.rowid",
    )?;
    let rows = stmt.query_map(params![user_id], |row| {
        Ok(SelectionWithPhoto {
            photo_id: row.get(0)?,
            category: row.get(1)?,
            selected_at: row.get(2)?,
            photo: photo_at(row, 3)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn list_selection_overview(conn: &Connection) -> Result<Vec<SelectionOverviewRow>> {
    let mut stmt = conn.prepare(
        "SELECT u.name, u.username, p.file_name, p.folder_path, s.category, s.selected_at
         FROM selections s
         JOIN users u ON u.id = s.user_id
         JOIN photos p ON p.id = s.photo_id
         ORDER BY u.username, s.selected_at, s.rowid",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(SelectionOverviewRow {
            user_name: row.get(0)?,
            username: row.get(1)?,
            photo_file: row.get(2)?,
            folder_path: row.get(3)?,
            category: row.get(4)?,
            selected_at: row.get(5)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

// ---------------------------------------------------------------------------
// Feedback

const FEEDBACK_COLUMNS: &str = "id, user_id, overall_rating, selection_experience, photo_quality, \
                                comments, is_publishable, created_at";

fn feedback_from_row(row: &Row<'_>) -> rusqlite::Result<Feedback> {
    Ok(Feedback {
        id: row.get(0)?,
        user_id: row.get(1)?,
        overall_rating: row.get(2)?,
        selection_experience: row.get(3)?,
        photo_quality: row.get(4)?,
        comments: row.get(5)?,
        is_publishable: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub fn insert_feedback(
    conn: &Connection,
    user_id: &str,
    ratings: [u8; 3],
    comments: Option<&str>,
) -> Result<Feedback> {
    let feedback = Feedback {
        id: new_id(),
        user_id: user_id.to_string(),
        overall_rating: ratings[0],
        selection_experience: ratings[1],
        photo_quality: ratings[2],
        comments: comments.map(str::to_string),
        is_publishable: false,
        created_at: unix_now(),
    };
    conn.execute(
        "INSERT INTO feedback (id, user_id, overall_rating, selection_experience, photo_quality,
                               comments, is_publishable, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            feedback.id,
            feedback.user_id,
            feedback.overall_rating,
            feedback.selection_experience,
            feedback.photo_quality,
            feedback.comments,
            feedback.is_publishable,
            feedback.created_at
        ],
    )?;
    Ok(feedback)
}

pub fn list_feedback(conn: &Connection) -> Result<Vec<Feedback>> {
    let sql =
        format!("SELECT {FEEDBACK_COLUMNS} FROM feedback ORDER BY created_at DESC, rowid DESC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], feedback_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn list_feedback_for(conn: &Connection, user_id: &str) -> Result<Vec<Feedback>> {
    let sql = format!(
        "SELECT {FEEDBACK_COLUMNS} FROM feedback WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![user_id], feedback_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn count_feedback(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM feedback", [], |row| row.get(0))?)
}

// ---------------------------------------------------------------------------
// Activity logs

pub fn insert_activity(conn: &Connection, entry: &ActivityEntry) -> Result<ActivityLog> {
    let log = ActivityLog {
        id: new_id(),
        user_id: entry.user_id.clone(),
        action: entry.action.clone(),
        details: entry.details.clone(),
        ip_address: entry.ip_address.clone(),
        created_at: unix_now(),
    };
    let details = log.details.as_ref().map(serde_json::to_string).transpose()?;
    conn.execute(
        "INSERT INTO activity_logs (id, user_id, action, details, ip_address, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![log.id, log.user_id, log.action, details, log.ip_address, log.created_at],
    )?;
    Ok(log)
}

pub fn list_activity(conn: &Connection) -> Result<Vec<ActivityLog>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, action, details, ip_address, created_at FROM activity_logs
         ORDER BY created_at DESC, rowid DESC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(ActivityLog {
            id: row.get(0)?,
            user_id: row.get(1)?,
            action: row.get(2)?,
            details: json_column(row.get(3)?),
            ip_address: row.get(4)?,
            created_at: row.get(5)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

// ---------------------------------------------------------------------------
// Keyed settings

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsTable {
    Site,
    Admin,
}

impl SettingsTable {
    fn name(self) -> &'static str {
        match self {
            SettingsTable::Site => "site_settings",
            SettingsTable::Admin => "admin_settings",
        }
    }
}

fn setting_from_row(row: &Row<'_>) -> rusqlite::Result<(String, String, i64)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn decode_setting((key, value, updated_at): (String, String, i64)) -> Result<SettingRecord> {
    Ok(SettingRecord {
        key,
        value: serde_json::from_str(&value)?,
        updated_at,
    })
}

pub fn get_setting(
    conn: &Connection,
    table: SettingsTable,
    key: &str,
) -> Result<Option<SettingRecord>> {
    let sql = format!("SELECT key, value, updated_at FROM {} WHERE key = ?1", table.name());
    conn.query_row(&sql, params![key], setting_from_row)
        .optional()?
        .map(decode_setting)
        .transpose()
}

pub fn set_setting(
    conn: &Connection,
    table: SettingsTable,
    key: &str,
    value: &serde_json::Value,
) -> Result<SettingRecord> {
    let sql = format!(
        "INSERT INTO {} (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        table.name()
    );
    let updated_at = unix_now();
    conn.execute(&sql, params![key, serde_json::to_string(value)?, updated_at])?;
    Ok(SettingRecord {
        key: key.to_string(),
        value: value.clone(),
        updated_at,
    })
}

pub fn list_settings(conn: &Connection, table: SettingsTable) -> Result<Vec<SettingRecord>> {
    let sql = format!("SELECT key, value, updated_at FROM {} ORDER BY key", table.name());
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], setting_from_row)?;
    rows.map(|row| decode_setting(row?)).collect()
}

#[cfg(test)]
pub mod fixtures {
    //! Seed helpers shared by the module tests.
    use super::*;

    pub fn account(conn: &Connection, username: &str, limit: i64) -> Account {
        let identity = insert_identity(conn, username, None, "salt:key", Some(username)).unwrap();
        insert_account(
            conn,
            &identity.id,
            &AccountFields {
                username: username.to_string(),
                name: username.to_uppercase(),
                contact: None,
                folder_path: Some(format!("/{username}")),
                selection_limit: limit,
            },
        )
        .unwrap()
    }

    pub fn photos(conn: &Connection, folder: &str, count: usize) -> Vec<Photo> {
        (0..count)
            .map(|i| {
                insert_photo(
                    conn,
                    &Photo {
                        file_name: format!("IMG_{i:04}.jpg"),
                        folder_path: folder.to_string(),
                        full_url: Some(format!("https://cdn.example/{folder}/{i}.jpg")),
                        thumbnail_url: Some(format!("https://cdn.example/{folder}/{i}_t.jpg")),
                        ..Default::default()
                    },
                )
                .unwrap()
            })
            .collect()
    }
}
