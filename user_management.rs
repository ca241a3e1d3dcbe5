//! The one place where login identities are created, changed or removed.
//!
//! Callers must already be authenticated as an admin; see `api::user_management`.

use crate::auth::{self, Caller};
use crate::config::MAX_SELECTION_LIMIT;
use crate::db;
use crate::error::{is_constraint_violation, Error, Result};
use crate::models::{Account, AccountFields, ActivityEntry};
use crate::settings;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::fmt;

const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=32;
const MIN_PASSWORD_LEN: usize = 6;
const PLACEHOLDER_EMAIL_DOMAIN: &str = "placeholder.local";

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserAction {
    Create,
    Update,
    Delete,
}

impl fmt::Display for UserAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UserAction::Create => "create",
            UserAction::Update => "update",
            UserAction::Delete => "delete",
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserData {
    pub username: String,
    pub name: String,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub folder_path: Option<String>,
    #[serde(default)]
    pub selection_limit: Option<i64>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserManagementRequest {
    pub action: UserAction,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_data: Option<UserData>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserManagementResponse {
    pub success: bool,
    pub user_id: Option<String>,
}

impl UserManagementResponse {
    fn ok(user_id: Option<String>) -> Self {
        Self {
            success: true,
            user_id,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

fn validate_username(username: &str) -> Result<String> {
    let username = username.trim();
    if !USERNAME_LEN.contains(&username.chars().count()) {
        return Err(Error::Validation(format!(
            "Username must be {} to {} characters",
            USERNAME_LEN.start(),
            USERNAME_LEN.end()
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(Error::Validation(
            "Username may only contain letters, digits, '_', '.' and '-'".into(),
        ));
    }
    Ok(username.to_string())
}

fn validate_limit(limit: i64) -> Result<i64> {
    if !(1..=MAX_SELECTION_LIMIT).contains(&limit) {
        return Err(Error::Validation(format!(
            "Selection limit must be between 1 and {MAX_SELECTION_LIMIT}"
        )));
    }
    Ok(limit)
}

fn validate_password(password: &str) -> Result<&str> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(password)
}

fn validate_name(name: &str) -> Result<String> {
    non_blank(Some(name)).ok_or_else(|| Error::Validation("Name is required".into()))
}

/// Turns a constraint failure into a 400 with a readable message.
fn rejected(err: Error, message: impl FnOnce() -> String) -> Error {
    match &err {
        Error::Database(e) if is_constraint_violation(e) => Error::Rejected(message()),
        _ => err,
    }
}

pub fn handle(
    conn: &Connection,
    caller: &Caller,
    request: UserManagementRequest,
    default_limit: i64,
    origin: Option<String>,
) -> Result<UserManagementResponse> {
    if !caller.is_admin {
        return Err(Error::Forbidden);
    }
    log::info!(
        "Admin user management: {} {}",
        request.action,
        request.user_id.as_deref().unwrap_or("new user")
    );

    match request.action {
        UserAction::Create => {
            let data = request
                .user_data
                .filter(|d| d.password.is_some())
                .ok_or_else(|| Error::Validation("Missing required fields".into()))?;
            let account = create(conn, &data, default_limit, origin)?;
            Ok(UserManagementResponse::ok(Some(account.id)))
        }
        UserAction::Update => {
            let (Some(user_id), Some(data)) = (request.user_id, request.user_data) else {
                return Err(Error::Validation("Missing required fields".into()));
            };
            update(conn, &user_id, &data, origin)?;
            Ok(UserManagementResponse::ok(None))
        }
        UserAction::Delete => {
            let user_id = request
                .user_id
                .ok_or_else(|| Error::Validation("Missing userId".into()))?;
            delete(conn, &user_id, origin)?;
            Ok(UserManagementResponse::ok(None))
        }
    }
}

/// Provisions the login identity and then the account; the identity is removed
/// again if the account cannot be stored.
fn create(
    conn: &Connection,
    data: &UserData,
    default_limit: i64,
    origin: Option<String>,
) -> Result<Account> {
    let username = validate_username(&data.username)?;
    let name = validate_name(&data.name)?;
    let limit = match data.selection_limit {
        Some(limit) => validate_limit(limit)?,
        None => validate_limit(settings::default_selection_limit(conn, default_limit)?)?,
    };
    let password = validate_password(data.password.as_deref().unwrap_or_default())?;
    let contact = non_blank(data.contact.as_deref());
    let email = contact
        .clone()
        .unwrap_or_else(|| format!("{username}@{PLACEHOLDER_EMAIL_DOMAIN}"));

    if db::find_account_by_username(conn, &username)?.is_some() {
        return Err(Error::Rejected(format!("Username {username} is already taken")));
    }

    let password_hash = auth::hash_password(password)?;
    let identity = db::insert_identity(conn, &username, Some(&email), &password_hash, Some(&name))
        .map_err(|e| rejected(e, || format!("Username {username} is already taken")))?;

    let fields = AccountFields {
        username: username.clone(),
        name,
        contact,
        folder_path: non_blank(data.folder_path.as_deref()),
        selection_limit: limit,
    };
    let account = match db::insert_account(conn, &identity.id, &fields) {
        Ok(account) => account,
        Err(e) => {
            log::error!("Account insert failed for {username}, removing identity: {e}");
            db::delete_identity(conn, &identity.id)?;
            return Err(rejected(e, || format!("Username {username} is already taken")));
        }
    };

    db::insert_activity(
        conn,
        &ActivityEntry::new("admin_user_created")
            .details(serde_json::json!({ "user_id": account.id, "username": account.username }))
            .origin(origin),
    )?;
    Ok(account)
}

/// Fields left out of the payload keep their stored value.
fn update(
    conn: &Connection,
    user_id: &str,
    data: &UserData,
    origin: Option<String>,
) -> Result<Account> {
    let current = db::get_account(conn, user_id)?
        .ok_or_else(|| Error::NotFound(format!("User {user_id}")))?;

    let username = validate_username(&data.username)?;
    let name = validate_name(&data.name)?;
    let limit = match data.selection_limit {
        Some(limit) => validate_limit(limit)?,
        None => current.selection_limit,
    };
    let password_hash = match data.password.as_deref().filter(|p| !p.is_empty()) {
        Some(password) => Some(auth::hash_password(validate_password(password)?)?),
        None => None,
    };

    let fields = AccountFields {
        username: username.clone(),
        name: name.clone(),
        contact: data
            .contact
            .as_deref()
            .map_or(current.contact, |c| non_blank(Some(c))),
        folder_path: data
            .folder_path
            .as_deref()
            .map_or(current.folder_path, |f| non_blank(Some(f))),
        selection_limit: limit,
    };

    let tx = conn.unchecked_transaction()?;
    let account = db::update_account(&tx, user_id, &fields)
        .map_err(|e| rejected(e, || format!("Username {username} is already taken")))?
        .ok_or_else(|| Error::NotFound(format!("User {user_id}")))?;
    db::update_identity_profile(&tx, user_id, &username, Some(&name))
        .map_err(|e| rejected(e, || format!("Username {username} is already taken")))?;
    if let Some(hash) = &password_hash {
        db::update_password_hash(&tx, user_id, hash)?;
        let revoked = db::delete_sessions_for(&tx, user_id)?;
        log::info!("Password of {username} changed, {revoked} sessions revoked");
    }
    db::insert_activity(
        &tx,
        &ActivityEntry::new("admin_user_updated")
            .details(serde_json::json!({
                "user_id": user_id,
                "username": username,
                "password_changed": password_hash.is_some(),
            }))
            .origin(origin),
    )?;
    tx.commit()?;
    Ok(account)
}

fn delete(conn: &Connection, user_id: &str, origin: Option<String>) -> Result<()> {
    let account = db::get_account(conn, user_id)?
        .ok_or_else(|| Error::NotFound(format!("User {user_id}")))?;

    let tx = conn.unchecked_transaction()?;
    db::delete_account(&tx, user_id)?;
    db::delete_identity(&tx, user_id)?;
    db::insert_activity(
        &tx,
        &ActivityEntry::new("admin_user_deleted")
            .details(serde_json::json!({ "user_id": user_id, "username": account.username }))
            .origin(origin),
    )?;
    tx.commit()?;
    Ok(())
}
