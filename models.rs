use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::fmt;
use std::str::FromStr;

/// A client account. Its id is the id of the identity that signs in with it.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub name: String,
    pub contact: Option<String>,
    pub folder_path: Option<String>,
    pub selection_limit: i64,
    pub is_finalized: bool,
    pub last_login: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Account {
    pub fn quota(&self) -> usize {
        self.selection_limit.max(0) as usize
    }
}

/// Editable account fields, shared by insert and update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountFields {
    pub username: String,
    pub name: String,
    pub contact: Option<String>,
    pub folder_path: Option<String>,
    pub selection_limit: i64,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Photo {
    pub id: String,
    pub file_name: String,
    pub folder_path: String,
    pub full_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub file_size: Option<i64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub created_at: Option<i64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SelectionCategory {
    Selected,
    Later,
}

impl SelectionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionCategory::Selected => "selected",
            SelectionCategory::Later => "later",
        }
    }
}

impl fmt::Display for SelectionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelectionCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "selected" => Ok(SelectionCategory::Selected),
            "later" => Ok(SelectionCategory::Later),
            other => Err(format!("unknown selection category: {other}")),
        }
    }
}

impl ToSql for SelectionCategory {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for SelectionCategory {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Selection {
    pub id: String,
    pub user_id: String,
    pub photo_id: String,
    pub category: SelectionCategory,
    pub selected_at: i64,
}

/// A selection joined with the photo it points at, as shown on the review page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionWithPhoto {
    pub photo_id: String,
    pub category: SelectionCategory,
    pub selected_at: i64,
    pub photo: Photo,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Feedback {
    pub id: String,
    pub user_id: String,
    pub overall_rating: u8,
    pub selection_experience: u8,
    pub photo_quality: u8,
    pub comments: Option<String>,
    pub is_publishable: bool,
    pub created_at: i64,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityLog {
    pub id: String,
    pub user_id: Option<String>,
    pub action: String,
    pub details: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub created_at: i64,
}

/// An activity log row waiting to be appended.
#[derive(Debug, Clone, Default)]
pub struct ActivityEntry {
    pub user_id: Option<String>,
    pub action: String,
    pub details: Option<serde_json::Value>,
    pub ip_address: Option<String>,
}

impl ActivityEntry {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Default::default()
        }
    }

    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn origin(mut self, ip_address: Option<String>) -> Self {
        self.ip_address = ip_address;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SettingRecord {
    pub key: String,
    pub value: serde_json::Value,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_users: i64,
    pub total_selections: i64,
    pub total_feedbacks: i64,
    pub finalized: i64,
}

/// One row of the admin selections overview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionOverviewRow {
    pub user_name: String,
    pub username: String,
    pub photo_file: String,
    pub folder_path: String,
    pub category: SelectionCategory,
    pub selected_at: i64,
}

/// Authentication record behind an account or an admin login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub login: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub display_name: Option<String>,
    pub created_at: i64,
}
