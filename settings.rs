//! Keyed settings.
//!
//! Admin settings are a closed set of keys, each with its own payload shape.
//! Payload field names are camelCase, which is how the admin screens send them.
//! Site settings stay free-form JSON.

use crate::config::MAX_SELECTION_LIMIT;
use crate::db::{self, SettingsTable};
use crate::error::{Error, Result};
use crate::models::{ActivityEntry, SettingRecord};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;

const REVIEW_URL_BASE: &str = "https://search.google.com/local/writereview?placeid=";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "key", content = "value", rename_all = "snake_case")]
pub enum AdminSetting {
    Design(DesignSettings),
    LogoUrl(LogoUrl),
    Contacts(ContactSettings),
    GeneralSettings(GeneralSettings),
    DriveSettings(DriveSettings),
    EmailjsSettings(EmailjsSettings),
    GoogleWidget(GoogleWidget),
    EmailjsAdvanced(EmailjsAdvanced),
    GoogleDriveApi(GoogleDriveApi),
    FirebaseConfig(FirebaseConfig),
}

impl AdminSetting {
    pub const KEYS: [&'static str; 10] = [
        "design",
        "logo_url",
        "contacts",
        "general_settings",
        "drive_settings",
        "emailjs_settings",
        "google_widget",
        "emailjs_advanced",
        "google_drive_api",
        "firebase_config",
    ];

    pub fn key(&self) -> &'static str {
        match self {
            AdminSetting::Design(_) => "design",
            AdminSetting::LogoUrl(_) => "logo_url",
            AdminSetting::Contacts(_) => "contacts",
            AdminSetting::GeneralSettings(_) => "general_settings",
            AdminSetting::DriveSettings(_) => "drive_settings",
            AdminSetting::EmailjsSettings(_) => "emailjs_settings",
            AdminSetting::GoogleWidget(_) => "google_widget",
            AdminSetting::EmailjsAdvanced(_) => "emailjs_advanced",
            AdminSetting::GoogleDriveApi(_) => "google_drive_api",
            AdminSetting::FirebaseConfig(_) => "firebase_config",
        }
    }

    /// Payload a key holds before anyone has saved it.
    pub fn default_for(key: &str) -> Option<Self> {
        let setting = match key {
            "design" => AdminSetting::Design(Default::default()),
            "logo_url" => AdminSetting::LogoUrl(Default::default()),
            "contacts" => AdminSetting::Contacts(Default::default()),
            "general_settings" => AdminSetting::GeneralSettings(Default::default()),
            "drive_settings" => AdminSetting::DriveSettings(Default::default()),
            "emailjs_settings" => AdminSetting::EmailjsSettings(Default::default()),
            "google_widget" => AdminSetting::GoogleWidget(Default::default()),
            "emailjs_advanced" => AdminSetting::EmailjsAdvanced(Default::default()),
            "google_drive_api" => AdminSetting::GoogleDriveApi(Default::default()),
            "firebase_config" => AdminSetting::FirebaseConfig(Default::default()),
            _ => return None,
        };
        Some(setting)
    }

    /// Rebuilds a setting from its key and a stored or submitted payload.
    pub fn from_parts(key: &str, value: Value) -> Result<Self> {
        if !Self::KEYS.contains(&key) {
            return Err(unknown_key(key));
        }
        serde_json::from_value(serde_json::json!({ "key": key, "value": value }))
            .map_err(|e| Error::Validation(format!("Invalid {key} setting: {e}")))
    }

    /// The payload alone, as it is stored.
    pub fn value(&self) -> Result<Value> {
        let mut tagged = serde_json::to_value(self)?;
        Ok(tagged.get_mut("value").map(Value::take).unwrap_or(Value::Null))
    }

    fn validate(&self) -> Result<()> {
        if let AdminSetting::GeneralSettings(general) = self {
            if !(1..=MAX_SELECTION_LIMIT).contains(&general.global_selection_limit) {
                return Err(Error::Validation(format!(
                    "globalSelectionLimit must be between 1 and {MAX_SELECTION_LIMIT}"
                )));
            }
        }
        Ok(())
    }
}

fn unknown_key(key: &str) -> Error {
    Error::Validation(format!("Unknown setting key: {key}"))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DesignSettings {
    pub colors: DesignColors,
    pub fonts: DesignFonts,
    pub hero: HeroTexts,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct DesignColors {
    pub primary_color: String,
    pub text_color: String,
    pub background_color: String,
    pub secondary_color: String,
}

impl Default for DesignColors {
    fn default() -> Self {
        Self {
            primary_color: "#D4AF37".into(),
            text_color: "#1A1F2C".into(),
            background_color: "#FFFFFF".into(),
            secondary_color: "#F8F9FA".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct DesignFonts {
    pub heading_font: String,
    pub body_font: String,
}

impl Default for DesignFonts {
    fn default() -> Self {
        Self {
            heading_font: "Playfair Display".into(),
            body_font: "Inter".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct HeroTexts {
    pub hero_title: String,
    pub hero_subtitle: String,
    pub about_title: String,
    pub about_description: String,
}

impl Default for HeroTexts {
    fn default() -> Self {
        Self {
            hero_title: "Welcome to Your Gallery".into(),
            hero_subtitle: "Select your favorite moments".into(),
            about_title: "About Your Selection".into(),
            about_description: "Choose the photos that capture your special moments.".into(),
        }
    }
}

/// Studio logo, usually a data URL.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogoUrl {
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactSettings {
    pub whatsapp_number: String,
    pub primary_email: String,
    pub support_email: String,
    pub phone_number: String,
    pub google_review: GoogleReview,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct GoogleReview {
    pub enabled: bool,
    pub place_id: String,
    pub business_name: String,
}

impl Default for GoogleReview {
    fn default() -> Self {
        Self {
            enabled: true,
            place_id: String::new(),
            business_name: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneralSettings {
    pub global_selection_limit: i64,
    pub auto_finalize_enabled: bool,
    pub require_feedback: bool,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            global_selection_limit: crate::config::DEFAULT_SELECTION_LIMIT,
            auto_finalize_enabled: false,
            require_feedback: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct DriveSettings {
    pub drive_root_folder_id: String,
    pub auto_sync_enabled: bool,
}

impl Default for DriveSettings {
    fn default() -> Self {
        Self {
            drive_root_folder_id: String::new(),
            auto_sync_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct EmailjsSettings {
    pub emailjs_service_id: String,
    pub emailjs_template_id: String,
    pub emailjs_public_key: String,
    pub admin_email: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct GoogleWidget {
    pub place_id: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct EmailjsAdvanced {
    pub service_id: String,
    pub template_id: String,
    pub public_key: String,
    pub notification_email: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct GoogleDriveApi {
    pub api_key: String,
    pub client_id: String,
    pub client_secret: String,
    pub root_folder: String,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FirebaseConfig {
    pub api_key: String,
    pub auth_domain: String,
    pub project_id: String,
    pub storage_bucket: String,
    pub messaging_sender_id: String,
    pub app_id: String,
    pub service_account: String,
    /// Collection layout kept for export tooling; not interpreted here.
    pub collections: Option<Value>,
}

/// Current value of an admin setting, or its default when never saved.
/// A stored payload that no longer parses is reported and replaced by the default.
pub fn load(conn: &Connection, key: &str) -> Result<AdminSetting> {
    let default = AdminSetting::default_for(key).ok_or_else(|| unknown_key(key))?;
    match db::get_setting(conn, SettingsTable::Admin, key)? {
        Some(record) => AdminSetting::from_parts(key, record.value).or_else(|e| {
            log::warn!("Ignoring stored {key} setting: {e}");
            Ok(default)
        }),
        None => Ok(default),
    }
}

pub fn load_all(conn: &Connection) -> Result<Vec<AdminSetting>> {
    AdminSetting::KEYS.iter().map(|key| load(conn, key)).collect()
}

pub fn save(conn: &Connection, setting: &AdminSetting, origin: Option<String>) -> Result<SettingRecord> {
    setting.validate()?;
    let record = db::set_setting(conn, SettingsTable::Admin, setting.key(), &setting.value()?)?;
    db::insert_activity(
        conn,
        &ActivityEntry::new("setting_updated")
            .details(serde_json::json!({ "key": record.key, "scope": "admin" }))
            .origin(origin),
    )?;
    log::info!("Admin setting {} updated", record.key);
    Ok(record)
}

pub fn list_site(conn: &Connection) -> Result<Vec<SettingRecord>> {
    db::list_settings(conn, SettingsTable::Site)
}

pub fn get_site(conn: &Connection, key: &str) -> Result<SettingRecord> {
    db::get_setting(conn, SettingsTable::Site, key)?
        .ok_or_else(|| Error::NotFound(format!("Site setting {key}")))
}

pub fn save_site(
    conn: &Connection,
    key: &str,
    value: &Value,
    origin: Option<String>,
) -> Result<SettingRecord> {
    let key = key.trim();
    if key.is_empty() {
        return Err(Error::Validation("Setting key must not be empty".into()));
    }
    let record = db::set_setting(conn, SettingsTable::Site, key, value)?;
    db::insert_activity(
        conn,
        &ActivityEntry::new("setting_updated")
            .details(serde_json::json!({ "key": record.key, "scope": "site" }))
            .origin(origin),
    )?;
    Ok(record)
}

fn contacts(conn: &Connection) -> Result<ContactSettings> {
    match load(conn, "contacts")? {
        AdminSetting::Contacts(contacts) => Ok(contacts),
        _ => Ok(ContactSettings::default()),
    }
}

fn google_widget(conn: &Connection) -> Result<GoogleWidget> {
    match load(conn, "google_widget")? {
        AdminSetting::GoogleWidget(widget) => Ok(widget),
        _ => Ok(GoogleWidget::default()),
    }
}

/// Limit applied to new accounts that do not name their own.
/// A stored payload that no longer parses or holds an out-of-range limit yields `fallback`.
pub fn default_selection_limit(conn: &Connection, fallback: i64) -> Result<i64> {
    let Some(record) = db::get_setting(conn, SettingsTable::Admin, "general_settings")? else {
        return Ok(fallback);
    };
    match AdminSetting::from_parts("general_settings", record.value) {
        Ok(AdminSetting::GeneralSettings(general))
            if (1..=MAX_SELECTION_LIMIT).contains(&general.global_selection_limit) =>
        {
            Ok(general.global_selection_limit)
        }
        _ => {
            log::warn!("Stored general_settings has no usable selection limit, using {fallback}");
            Ok(fallback)
        }
    }
}

/// Where happy clients are sent to leave a public review.
pub fn review_url(conn: &Connection, fallback: Option<&str>) -> Result<Option<String>> {
    let review = contacts(conn)?.google_review;
    if review.enabled && !review.place_id.trim().is_empty() {
        return Ok(Some(format!("{REVIEW_URL_BASE}{}", review.place_id.trim())));
    }
    let widget = google_widget(conn)?;
    if widget.enabled && !widget.place_id.trim().is_empty() {
        return Ok(Some(format!("{REVIEW_URL_BASE}{}", widget.place_id.trim())));
    }
    Ok(fallback.map(str::to_string))
}

/// Public look-and-feel served before anyone signs in.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Branding {
    pub design: DesignSettings,
    pub logo_url: Option<String>,
    pub contacts: ContactSettings,
}

pub fn branding(conn: &Connection) -> Result<Branding> {
    let design = match load(conn, "design")? {
        AdminSetting::Design(design) => design,
        _ => DesignSettings::default(),
    };
    let logo_url = match load(conn, "logo_url")? {
        AdminSetting::LogoUrl(logo) if !logo.url.is_empty() => Some(logo.url),
        _ => None,
    };
    Ok(Branding {
        design,
        logo_url,
        contacts: contacts(conn)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use serde_json::json;

    #[test]
    fn settings_serialize_as_key_and_camel_case_value() {
        let setting = AdminSetting::GeneralSettings(GeneralSettings::default());
        let tagged = serde_json::to_value(&setting).unwrap();
        assert_eq!(tagged["key"], "general_settings");
        assert_eq!(tagged["value"]["globalSelectionLimit"], 150);
        assert_eq!(tagged["value"]["requireFeedback"], true);

        assert_eq!(setting.value().unwrap()["autoFinalizeEnabled"], false);
    }

    #[test]
    fn unknown_keys_and_bad_payloads_are_rejected() {
        assert!(matches!(
            AdminSetting::from_parts("theme", json!({})),
            Err(Error::Validation(msg)) if msg.contains("Unknown setting key")
        ));
        assert!(matches!(
            AdminSetting::from_parts("general_settings", json!({ "globalSelectionLimit": "lots" })),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn partial_payloads_fill_in_defaults() {
        let setting = AdminSetting::from_parts("design", json!({ "fonts": { "bodyFont": "Lato" } }))
            .unwrap();
        let AdminSetting::Design(design) = setting else {
            panic!("expected design");
        };
        assert_eq!(design.fonts.body_font, "Lato");
        assert_eq!(design.fonts.heading_font, "Playfair Display");
        assert_eq!(design.colors.primary_color, "#D4AF37");
    }

    #[test]
    fn save_then_load_and_log() {
        let pool = memory_pool();
        let conn = pool.get().unwrap();

        assert_eq!(
            load(&conn, "google_widget").unwrap(),
            AdminSetting::GoogleWidget(GoogleWidget::default())
        );

        let widget = AdminSetting::GoogleWidget(GoogleWidget {
            place_id: "ChIJ123".into(),
            enabled: true,
        });
        save(&conn, &widget, Some("10.0.0.1".into())).unwrap();

        assert_eq!(load(&conn, "google_widget").unwrap(), widget);
        let logs = db::list_activity(&conn).unwrap();
        assert_eq!(logs[0].action, "setting_updated");
        assert_eq!(logs[0].details.as_ref().unwrap()["key"], "google_widget");
        assert_eq!(load_all(&conn).unwrap().len(), AdminSetting::KEYS.len());
    }

    #[test]
    fn general_limit_is_range_checked() {
        let pool = memory_pool();
        let conn = pool.get().unwrap();
        let general = AdminSetting::GeneralSettings(GeneralSettings {
            global_selection_limit: 0,
            ..Default::default()
        });
        assert!(matches!(save(&conn, &general, None), Err(Error::Validation(_))));
        assert_eq!(default_selection_limit(&conn, 150).unwrap(), 150);

        let general = AdminSetting::GeneralSettings(GeneralSettings {
            global_selection_limit: 80,
            ..Default::default()
        });
        save(&conn, &general, None).unwrap();
        assert_eq!(default_selection_limit(&conn, 150).unwrap(), 80);

        // unreadable or out-of-range stored payloads fall back to the configured limit
        for stored in [
            serde_json::json!({ "globalSelectionLimit": "lots" }),
            serde_json::json!({ "globalSelectionLimit": 5000 }),
        ] {
            db::set_setting(&conn, SettingsTable::Admin, "general_settings", &stored).unwrap();
            assert_eq!(default_selection_limit(&conn, 42).unwrap(), 42);
        }
    }

    #[test]
    fn review_url_prefers_contacts_then_widget_then_fallback() {
        let pool = memory_pool();
        let conn = pool.get().unwrap();
        assert_eq!(review_url(&conn, None).unwrap(), None);
        assert_eq!(
            review_url(&conn, Some("https://g.page/studio")).unwrap().as_deref(),
            Some("https://g.page/studio")
        );

        save(
            &conn,
            &AdminSetting::GoogleWidget(GoogleWidget {
                place_id: "WIDGET".into(),
                enabled: true,
            }),
            None,
        )
        .unwrap();
        assert_eq!(
            review_url(&conn, Some("https://g.page/studio")).unwrap().as_deref(),
            Some("https://search.google.com/local/writereview?placeid=WIDGET")
        );

        let mut contacts = ContactSettings::default();
        contacts.google_review.place_id = "CONTACT".into();
        save(&conn, &AdminSetting::Contacts(contacts), None).unwrap();
        assert_eq!(
            review_url(&conn, None).unwrap().as_deref(),
            Some("https://search.google.com/local/writereview?placeid=CONTACT")
        );
    }

    #[test]
    fn site_settings_stay_free_form() {
        let pool = memory_pool();
        let conn = pool.get().unwrap();

        assert!(matches!(get_site(&conn, "banner"), Err(Error::NotFound(_))));
        save_site(&conn, "banner", &json!(["a", { "b": 1 }]), None).unwrap();
        assert_eq!(get_site(&conn, "banner").unwrap().value, json!(["a", { "b": 1 }]));
        assert_eq!(list_site(&conn).unwrap().len(), 1);
        assert!(matches!(save_site(&conn, "  ", &json!(1), None), Err(Error::Validation(_))));
    }

    #[test]
    fn branding_hides_an_empty_logo() {
        let pool = memory_pool();
        let conn = pool.get().unwrap();
        let branding = branding(&conn).unwrap();
        assert!(branding.logo_url.is_none());
        assert_eq!(branding.design, DesignSettings::default());

        save(
            &conn,
            &AdminSetting::LogoUrl(LogoUrl {
                url: "data:image/png;base64,AAAA".into(),
            }),
            None,
        )
        .unwrap();
        assert!(super::branding(&conn).unwrap().logo_url.is_some());
    }
}
