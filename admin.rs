use crate::db;
use crate::error::{is_constraint_violation, Error, Result};
use crate::models::{
    Account, ActivityEntry, ActivityLog, DashboardStats, Feedback, Photo, Selection,
    SelectionOverviewRow,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFilter {
    #[default]
    All,
    User,
    Admin,
}

impl LogFilter {
    pub fn matches(self, action: &str) -> bool {
        let action = action.to_lowercase();
        match self {
            LogFilter::All => true,
            LogFilter::User => action.contains("select") || action.contains("login"),
            LogFilter::Admin => action.contains("admin") || action.contains("setting"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountDetail {
    #[serde(flatten)]
    pub account: Account,
    pub selections: Vec<Selection>,
    pub feedback: Vec<Feedback>,
}

pub fn stats(conn: &Connection) -> Result<DashboardStats> {
    Ok(DashboardStats {
        total_users: db::count_accounts(conn)?,
        total_selections: db::count_all_selections(conn)?,
        total_feedbacks: db::count_feedback(conn)?,
        finalized: db::count_finalized_accounts(conn)?,
    })
}

pub fn list_accounts(conn: &Connection) -> Result<Vec<Account>> {
    db::list_accounts(conn)
}

pub fn account_detail(conn: &Connection, id: &str) -> Result<AccountDetail> {
    let account =
        db::get_account(conn, id)?.ok_or_else(|| Error::NotFound(format!("User {id}")))?;
    Ok(AccountDetail {
        selections: db::list_selections(conn, id)?,
        feedback: db::list_feedback_for(conn, id)?,
        account,
    })
}

/// Reopens a finalized account so the client can change the selection again.
/// Stored selections and feedback are kept.
pub fn reset_finalization(conn: &Connection, id: &str, origin: Option<String>) -> Result<Account> {
    if !db::set_finalized(conn, id, false)? {
        return Err(Error::NotFound(format!("User {id}")));
    }
    let account =
        db::get_account(conn, id)?.ok_or_else(|| Error::NotFound(format!("User {id}")))?;
    db::insert_activity(
        conn,
        &ActivityEntry::new("admin_user_reset")
            .details(serde_json::json!({ "user_id": id, "username": account.username }))
            .origin(origin),
    )?;
    log::info!("Selection of {} reopened", account.username);
    Ok(account)
}

/// A photo record handed over by the ingestion side. The files themselves live elsewhere.
#[derive(Debug, Clone, Deserialize)]
pub struct PhotoUpload {
    #[serde(default)]
    pub id: Option<String>,
    pub file_name: String,
    pub folder_path: String,
    #[serde(default)]
    pub full_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub file_size: Option<i64>,
    #[serde(default)]
    pub width: Option<i64>,
    #[serde(default)]
    pub height: Option<i64>,
}

impl PhotoUpload {
    fn into_photo(self) -> Result<Photo> {
        if self.file_name.trim().is_empty() || self.folder_path.trim().is_empty() {
            return Err(Error::Validation("file_name and folder_path are required".into()));
        }
        Ok(Photo {
            id: self.id.unwrap_or_default(),
            file_name: self.file_name,
            folder_path: self.folder_path,
            full_url: self.full_url,
            thumbnail_url: self.thumbnail_url,
            file_size: self.file_size,
            width: self.width,
            height: self.height,
            created_at: None,
        })
    }
}

pub fn list_photos(conn: &Connection) -> Result<Vec<Photo>> {
    db::list_photos(conn)
}

/// Registers a batch of photos; nothing is stored if any of them is rejected.
pub fn register_photos(
    conn: &Connection,
    uploads: Vec<PhotoUpload>,
    origin: Option<String>,
) -> Result<Vec<Photo>> {
    let photos = uploads
        .into_iter()
        .map(PhotoUpload::into_photo)
        .collect::<Result<Vec<_>>>()?;

    let tx = conn.unchecked_transaction()?;
    let mut stored = Vec::with_capacity(photos.len());
    for photo in &photos {
        let inserted = db::insert_photo(&tx, photo).map_err(|e| match &e {
            Error::Database(inner) if is_constraint_violation(inner) => {
                Error::Rejected(format!("Photo {} already exists", photo.id))
            }
            _ => e,
        })?;
        stored.push(inserted);
    }
    db::insert_activity(
        &tx,
        &ActivityEntry::new("admin_photos_registered")
            .details(serde_json::json!({ "count": stored.len() }))
            .origin(origin),
    )?;
    tx.commit()?;
    log::info!("Registered {} photos", stored.len());
    Ok(stored)
}

pub fn feedback(conn: &Connection) -> Result<Vec<Feedback>> {
    db::list_feedback(conn)
}

pub fn activity(conn: &Connection, filter: LogFilter) -> Result<Vec<ActivityLog>> {
    Ok(db::list_activity(conn)?
        .into_iter()
        .filter(|log| filter.matches(&log.action))
        .collect())
}

pub fn selection_overview(conn: &Connection) -> Result<Vec<SelectionOverviewRow>> {
    db::list_selection_overview(conn)
}
