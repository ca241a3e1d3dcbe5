//! HTTP surface.
//!
//! Every handler authenticates from the `Authorization: Bearer` header before it
//! looks at the request body, then does its SQLite work through [`AppState::run`].

use crate::admin::{self, AccountDetail, LogFilter, PhotoUpload};
use crate::auth::{self, SignedIn};
use crate::db;
use crate::error::{Error, Result};
use crate::finalize::{self, FeedbackForm, FinalizeOutcome};
use crate::models::{
    Account, ActivityLog, DashboardStats, Feedback, Photo, SelectionCategory,
    SelectionOverviewRow, SelectionWithPhoto, SettingRecord,
};
use crate::settings::{self, AdminSetting, Branding};
use crate::tracker::{SelectionState, SelectionTracker, Toggle};
use crate::user_management::{self, UserManagementRequest, UserManagementResponse};
use crate::AppState;
use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, Method};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

type SharedState = Arc<AppState>;

pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/admin-login", post(admin_login))
        .route("/auth/logout", post(logout))
        .route("/branding", get(branding))
        .route("/gallery", get(gallery))
        .route("/selections", get(selections))
        .route("/selections/{photo_id}", delete(remove_selection))
        .route("/selections/{photo_id}/select", post(toggle_selected))
        .route("/selections/{photo_id}/later", post(toggle_later))
        .route("/selections/{photo_id}/move-to-selected", post(move_to_selected))
        .route("/review", get(review))
        .route("/finalize", post(finalize_selection))
        .route("/admin/stats", get(admin_stats))
        .route("/admin/users", get(admin_users))
        .route("/admin/users/{id}", get(admin_user))
        .route("/admin/users/{id}/reset", post(admin_reset_user))
        .route("/admin/user-management", post(user_management))
        .route("/admin/feedback", get(admin_feedback))
        .route("/admin/logs", get(admin_logs))
        .route("/admin/selections", get(admin_selections))
        .route("/admin/photos", get(admin_photos).post(register_photos))
        .route("/admin/settings", get(list_admin_settings).put(save_admin_settings))
        .route("/admin/settings/{key}", get(get_admin_setting).put(save_admin_setting))
        .route("/admin/site-settings", get(list_site_settings).put(save_site_settings))
        .route("/admin/site-settings/{key}", get(get_site_setting).put(save_site_setting))
        .layer(cors)
        .with_state(state)
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(auth::extract_bearer_token)
        .map(str::to_string)
}

/// Client address as reported by the fronting proxy.
fn origin(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn parse<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| Error::Validation(format!("Invalid request body: {e}")))
}

// ---------------------------------------------------------------------------
// Authentication

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct AdminLoginRequest {
    email: String,
    password: String,
}

async fn login(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SignedIn>> {
    let request: LoginRequest = parse(&body)?;
    let ttl = state.config.session_ttl_secs();
    let origin = origin(&headers);
    state
        .run(move |conn| {
            auth::sign_in_client(conn, &request.username, &request.password, ttl, origin)
        })
        .await
        .map(Json)
}

async fn admin_login(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SignedIn>> {
    let request: AdminLoginRequest = parse(&body)?;
    let ttl = state.config.session_ttl_secs();
    let origin = origin(&headers);
    state
        .run(move |conn| auth::sign_in_admin(conn, &request.email, &request.password, ttl, origin))
        .await
        .map(Json)
}

async fn logout(State(state): State<SharedState>, headers: HeaderMap) -> Result<Json<Value>> {
    let token = bearer(&headers);
    state
        .run(move |conn| {
            let caller = auth::authenticate(conn, token.as_deref())?;
            auth::sign_out(conn, &caller)
        })
        .await?;
    Ok(Json(json!({ "success": true })))
}

// ---------------------------------------------------------------------------
// Client

async fn branding(State(state): State<SharedState>) -> Result<Json<Branding>> {
    state.run(settings::branding).await.map(Json)
}

#[derive(Debug, Serialize)]
struct Gallery {
    account: Account,
    photos: Vec<Photo>,
    selection: SelectionState,
}

/// Photos in the account's folder, or every photo when it has none.
async fn gallery(State(state): State<SharedState>, headers: HeaderMap) -> Result<Json<Gallery>> {
    let token = bearer(&headers);
    state
        .run(move |conn| {
            let (_, account) = auth::require_client(conn, token.as_deref())?;
            let photos = match &account.folder_path {
                Some(folder) => db::list_photos_in_folder(conn, folder)?,
                None => db::list_photos(conn)?,
            };
            let selection = SelectionTracker::load(conn, &account)?.state();
            Ok(Gallery {
                account,
                photos,
                selection,
            })
        })
        .await
        .map(Json)
}

async fn selections(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<SelectionState>> {
    let token = bearer(&headers);
    state
        .run(move |conn| {
            let (_, account) = auth::require_client(conn, token.as_deref())?;
            Ok(SelectionTracker::load(conn, &account)?.state())
        })
        .await
        .map(Json)
}

#[derive(Debug, Serialize)]
struct ToggleResponse {
    action: Toggle,
    selection: SelectionState,
}

async fn toggle_selected(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(photo_id): Path<String>,
) -> Result<Json<ToggleResponse>> {
    let token = bearer(&headers);
    let origin = origin(&headers);
    state
        .run(move |conn| {
            let (_, account) = auth::require_client(conn, token.as_deref())?;
            let mut tracker = SelectionTracker::load(conn, &account)?;
            let action = tracker.toggle_selected(conn, &photo_id, origin)?;
            Ok(ToggleResponse {
                action,
                selection: tracker.state(),
            })
        })
        .await
        .map(Json)
}

async fn toggle_later(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(photo_id): Path<String>,
) -> Result<Json<ToggleResponse>> {
    let token = bearer(&headers);
    state
        .run(move |conn| {
            let (_, account) = auth::require_client(conn, token.as_deref())?;
            let mut tracker = SelectionTracker::load(conn, &account)?;
            let action = tracker.toggle_later(conn, &photo_id)?;
            Ok(ToggleResponse {
                action,
                selection: tracker.state(),
            })
        })
        .await
        .map(Json)
}

async fn move_to_selected(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(photo_id): Path<String>,
) -> Result<Json<SelectionState>> {
    let token = bearer(&headers);
    state
        .run(move |conn| {
            let (_, account) = auth::require_client(conn, token.as_deref())?;
            let mut tracker = SelectionTracker::load(conn, &account)?;
            tracker.move_to_selected(conn, &photo_id)?;
            Ok(tracker.state())
        })
        .await
        .map(Json)
}

async fn remove_selection(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(photo_id): Path<String>,
) -> Result<Json<SelectionState>> {
    let token = bearer(&headers);
    state
        .run(move |conn| {
            let (_, account) = auth::require_client(conn, token.as_deref())?;
            let mut tracker = SelectionTracker::load(conn, &account)?;
            tracker.remove_selection(conn, &photo_id)?;
            Ok(tracker.state())
        })
        .await
        .map(Json)
}

#[derive(Debug, Serialize)]
struct Review {
    selected: Vec<SelectionWithPhoto>,
    later: Vec<SelectionWithPhoto>,
    selection_limit: usize,
    is_finalized: bool,
}

async fn review(State(state): State<SharedState>, headers: HeaderMap) -> Result<Json<Review>> {
    let token = bearer(&headers);
    state
        .run(move |conn| {
            let (_, account) = auth::require_client(conn, token.as_deref())?;
            let (selected, later): (Vec<_>, Vec<_>) = db::list_selections_with_photos(conn, &account.id)?
                .into_iter()
                .partition(|row| row.category == SelectionCategory::Selected);
            Ok(Review {
                selected,
                later,
                selection_limit: account.quota(),
                is_finalized: account.is_finalized,
            })
        })
        .await
        .map(Json)
}

async fn finalize_selection(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<FinalizeOutcome>> {
    let token = bearer(&headers);
    let origin = origin(&headers);
    let fallback = state.config.review_url.clone();
    state
        .run(move |conn| {
            let (_, account) = auth::require_client(conn, token.as_deref())?;
            let form: FeedbackForm = parse(&body)?;
            finalize::finalize(conn, &account, &form, fallback.as_deref(), origin)
        })
        .await
        .map(Json)
}

// ---------------------------------------------------------------------------
// Admin

async fn admin_stats(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<DashboardStats>> {
    let token = bearer(&headers);
    state
        .run(move |conn| {
            auth::require_admin(conn, token.as_deref())?;
            admin::stats(conn)
        })
        .await
        .map(Json)
}

async fn admin_users(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Account>>> {
    let token = bearer(&headers);
    state
        .run(move |conn| {
            auth::require_admin(conn, token.as_deref())?;
            admin::list_accounts(conn)
        })
        .await
        .map(Json)
}

async fn admin_user(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<AccountDetail>> {
    let token = bearer(&headers);
    state
        .run(move |conn| {
            auth::require_admin(conn, token.as_deref())?;
            admin::account_detail(conn, &id)
        })
        .await
        .map(Json)
}

async fn admin_reset_user(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Account>> {
    let token = bearer(&headers);
    let origin = origin(&headers);
    state
        .run(move |conn| {
            auth::require_admin(conn, token.as_deref())?;
            admin::reset_finalization(conn, &id, origin)
        })
        .await
        .map(Json)
}

/// Order of checks: session (401), admin role (403), then the body (400).
async fn user_management(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UserManagementResponse>> {
    let token = bearer(&headers);
    let origin = origin(&headers);
    let default_limit = state.config.default_selection_limit;
    state
        .run(move |conn| {
            let caller = auth::require_admin(conn, token.as_deref())?;
            let request: UserManagementRequest = parse(&body)?;
            user_management::handle(conn, &caller, request, default_limit, origin)
        })
        .await
        .map(Json)
}

async fn admin_feedback(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Feedback>>> {
    let token = bearer(&headers);
    state
        .run(move |conn| {
            auth::require_admin(conn, token.as_deref())?;
            admin::feedback(conn)
        })
        .await
        .map(Json)
}

#[derive(Debug, Default, Deserialize)]
struct LogsQuery {
    #[serde(default)]
    filter: LogFilter,
}

async fn admin_logs(
    State(state): State<SharedState>,
    headers: HeaderMap,
    query: std::result::Result<Query<LogsQuery>, QueryRejection>,
) -> Result<Json<Vec<ActivityLog>>> {
    let token = bearer(&headers);
    state
        .run(move |conn| {
            auth::require_admin(conn, token.as_deref())?;
            let Query(query) = query.map_err(|e| Error::Validation(e.body_text()))?;
            admin::activity(conn, query.filter)
        })
        .await
        .map(Json)
}

async fn admin_selections(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<Vec<SelectionOverviewRow>>> {
    let token = bearer(&headers);
    state
        .run(move |conn| {
            auth::require_admin(conn, token.as_deref())?;
            admin::selection_overview(conn)
        })
        .await
        .map(Json)
}

async fn admin_photos(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Photo>>> {
    let token = bearer(&headers);
    state
        .run(move |conn| {
            auth::require_admin(conn, token.as_deref())?;
            admin::list_photos(conn)
        })
        .await
        .map(Json)
}

async fn register_photos(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Vec<Photo>>> {
    let token = bearer(&headers);
    let origin = origin(&headers);
    state
        .run(move |conn| {
            auth::require_admin(conn, token.as_deref())?;
            let uploads: Vec<PhotoUpload> = parse(&body)?;
            admin::register_photos(conn, uploads, origin)
        })
        .await
        .map(Json)
}

// ---------------------------------------------------------------------------
// Settings

async fn list_admin_settings(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<Vec<AdminSetting>>> {
    let token = bearer(&headers);
    state
        .run(move |conn| {
            auth::require_admin(conn, token.as_deref())?;
            settings::load_all(conn)
        })
        .await
        .map(Json)
}

/// Saves several `{ key, value }` settings at once; all or nothing.
async fn save_admin_settings(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Vec<SettingRecord>>> {
    let token = bearer(&headers);
    let origin = origin(&headers);
    state
        .run(move |conn| {
            auth::require_admin(conn, token.as_deref())?;
            let batch: Vec<AdminSetting> = parse(&body)?;
            let tx = conn.unchecked_transaction()?;
            let records = batch
                .iter()
                .map(|setting| settings::save(&tx, setting, origin.clone()))
                .collect::<Result<Vec<_>>>()?;
            tx.commit()?;
            Ok(records)
        })
        .await
        .map(Json)
}

async fn get_admin_setting(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(key): Path<String>,
) -> Result<Json<AdminSetting>> {
    let token = bearer(&headers);
    state
        .run(move |conn| {
            auth::require_admin(conn, token.as_deref())?;
            settings::load(conn, &key)
        })
        .await
        .map(Json)
}

async fn save_admin_setting(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(key): Path<String>,
    body: Bytes,
) -> Result<Json<SettingRecord>> {
    let token = bearer(&headers);
    let origin = origin(&headers);
    state
        .run(move |conn| {
            auth::require_admin(conn, token.as_deref())?;
            let setting = AdminSetting::from_parts(&key, parse(&body)?)?;
            settings::save(conn, &setting, origin)
        })
        .await
        .map(Json)
}

async fn list_site_settings(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<Vec<SettingRecord>>> {
    let token = bearer(&headers);
    state
        .run(move |conn| {
            auth::require_admin(conn, token.as_deref())?;
            settings::list_site(conn)
        })
        .await
        .map(Json)
}

/// Body is an object of key to value; every entry is stored.
async fn save_site_settings(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Vec<SettingRecord>>> {
    let token = bearer(&headers);
    let origin = origin(&headers);
    state
        .run(move |conn| {
            auth::require_admin(conn, token.as_deref())?;
            let entries: Map<String, Value> = parse(&body)?;
            let tx = conn.unchecked_transaction()?;
            let records = entries
                .iter()
                .map(|(key, value)| settings::save_site(&tx, key, value, origin.clone()))
                .collect::<Result<Vec<_>>>()?;
            tx.commit()?;
            Ok(records)
        })
        .await
        .map(Json)
}

async fn get_site_setting(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(key): Path<String>,
) -> Result<Json<SettingRecord>> {
    let token = bearer(&headers);
    state
        .run(move |conn| {
            auth::require_admin(conn, token.as_deref())?;
            settings::get_site(conn, &key)
        })
        .await
        .map(Json)
}

async fn save_site_setting(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(key): Path<String>,
    body: Bytes,
) -> Result<Json<SettingRecord>> {
    let token = bearer(&headers);
    let origin = origin(&headers);
    state
        .run(move |conn| {
            auth::require_admin(conn, token.as_deref())?;
            let value: Value = parse(&body)?;
            settings::save_site(conn, &key, &value, origin)
        })
        .await
        .map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PortalConfig;
    use crate::db::{fixtures, memory_pool, DbPool};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const ADMIN_EMAIL: &str = "studio@example.com";
    const ADMIN_PASSWORD: &str = "admin-password";

    fn app() -> (Router, DbPool) {
        let pool = memory_pool();
        {
            let conn = pool.get().unwrap();
            auth::ensure_admin(&conn, ADMIN_EMAIL, ADMIN_PASSWORD).unwrap();
            fixtures::photos(&conn, "/ana", 3);
        }
        let state = Arc::new(AppState {
            db: pool.clone(),
            config: PortalConfig {
                review_url: Some("https://g.page/studio".into()),
                ..PortalConfig::default()
            },
        });
        (router(state), pool)
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header("authorization", format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn admin_token(app: &Router) -> String {
        let (status, body) = send(
            app,
            "POST",
            "/auth/admin-login",
            None,
            Some(json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    async fn create_client(app: &Router, admin: &str, limit: i64) -> String {
        let (status, body) = send(
            app,
            "POST",
            "/admin/user-management",
            Some(admin),
            Some(json!({
                "action": "create",
                "userData": {
                    "username": "ana",
                    "name": "Ana",
                    "folder_path": "/ana",
                    "selection_limit": limit,
                    "password": "client-pass"
                }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["success"], true);
        body["userId"].as_str().unwrap().to_string()
    }

    async fn client_token(app: &Router) -> String {
        let (status, body) = send(
            app,
            "POST",
            "/auth/login",
            None,
            Some(json!({ "username": "ana", "password": "client-pass" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn selection_flow_from_gallery_to_finalize() {
        let (app, _pool) = app();
        let admin = admin_token(&app).await;
        let user_id = create_client(&app, &admin, 2).await;
        let client = client_token(&app).await;

        let (status, gallery) = send(&app, "GET", "/gallery", Some(&client), None).await;
        assert_eq!(status, StatusCode::OK);
        let photos: Vec<String> = gallery["photos"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(photos.len(), 3);
        assert_eq!(gallery["selection"]["selection_limit"], 2);

        let select = |id: &str| format!("/selections/{id}/select");
        let (_, first) = send(&app, "POST", &select(&photos[0]), Some(&client), None).await;
        assert_eq!(first["action"], "added");
        send(&app, "POST", &select(&photos[1]), Some(&client), None).await;
        let (status, over) = send(&app, "POST", &select(&photos[2]), Some(&client), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(over["error"], "Selection limit of 2 photos reached");

        let later = format!("/selections/{}/later", photos[2]);
        send(&app, "POST", &later, Some(&client), None).await;
        let (_, review) = send(&app, "GET", "/review", Some(&client), None).await;
        assert_eq!(review["selected"].as_array().unwrap().len(), 2);
        assert_eq!(review["later"][0]["photo"]["id"], photos[2].as_str());

        let (status, outcome) = send(
            &app,
            "POST",
            "/finalize",
            Some(&client),
            Some(json!({
                "overall_rating": 5,
                "selection_experience": 5,
                "photo_quality": 5,
                "comments": "Great"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{outcome}");
        assert_eq!(outcome["request_review"], true);
        assert_eq!(outcome["review_url"], "https://g.page/studio");
        assert_eq!(outcome["later_skipped"], 1);

        let remove = format!("/selections/{}", photos[0]);
        let (status, _) = send(&app, "DELETE", &remove, Some(&client), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, stats) = send(&app, "GET", "/admin/stats", Some(&admin), None).await;
        assert_eq!(stats["finalized"], 1);
        assert_eq!(stats["totalFeedbacks"], 1);

        let reset = format!("/admin/users/{user_id}/reset");
        let (status, account) = send(&app, "POST", &reset, Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(account["is_finalized"], false);
        let (status, _) = send(&app, "DELETE", &remove, Some(&client), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn privileged_endpoint_checks_session_then_role_then_body() {
        let (app, _pool) = app();
        let body = json!({ "action": "delete", "userId": "someone" });

        let (status, error) =
            send(&app, "POST", "/admin/user-management", None, Some(body.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error["error"], "Unauthorized");

        let admin = admin_token(&app).await;
        create_client(&app, &admin, 10).await;
        let client = client_token(&app).await;
        let (status, error) =
            send(&app, "POST", "/admin/user-management", Some(&client), Some(body)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(error["error"], "Forbidden - Admin access required");

        let (status, _) = send(
            &app,
            "POST",
            "/admin/user-management",
            Some(&admin),
            Some(json!({ "action": "rename" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn deleted_clients_cannot_sign_in_again() {
        let (app, pool) = app();
        let admin = admin_token(&app).await;
        let user_id = create_client(&app, &admin, 10).await;
        let client = client_token(&app).await;

        let (status, _) = send(
            &app,
            "POST",
            "/admin/user-management",
            Some(&admin),
            Some(json!({ "action": "delete", "userId": user_id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            &app,
            "POST",
            "/auth/login",
            None,
            Some(json!({ "username": "ana", "password": "client-pass" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = send(&app, "GET", "/gallery", Some(&client), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let conn = pool.get().unwrap();
        assert!(db::get_identity(&conn, &user_id).unwrap().is_none());
    }

    #[tokio::test]
    async fn logout_ends_the_session() {
        let (app, _pool) = app();
        let admin = admin_token(&app).await;

        let (status, _) = send(&app, "POST", "/auth/logout", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, "GET", "/admin/users", Some(&admin), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn clients_stay_out_of_admin_routes_and_admins_out_of_galleries() {
        let (app, _pool) = app();
        let admin = admin_token(&app).await;
        create_client(&app, &admin, 10).await;
        let client = client_token(&app).await;

        let (status, _) = send(&app, "GET", "/admin/logs", Some(&client), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = send(&app, "GET", "/gallery", Some(&admin), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, logs) = send(&app, "GET", "/admin/logs?filter=user", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        let actions: Vec<&str> = logs
            .as_array()
            .unwrap()
            .iter()
            .map(|log| log["action"].as_str().unwrap())
            .collect();
        assert!(actions.contains(&"login"));
        assert!(!actions.contains(&"admin_user_created"));

        let (status, _) = send(&app, "GET", "/admin/logs?filter=bogus", Some(&admin), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn settings_are_typed_and_branding_is_public() {
        let (app, _pool) = app();
        let admin = admin_token(&app).await;

        let (status, error) = send(
            &app,
            "PUT",
            "/admin/settings/theme",
            Some(&admin),
            Some(json!({ "dark": true })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["error"], "Unknown setting key: theme");

        let (status, _) = send(
            &app,
            "PUT",
            "/admin/settings/design",
            Some(&admin),
            Some(json!({ "colors": { "primaryColor": "#000000" } })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, branding) = send(&app, "GET", "/branding", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(branding["design"]["colors"]["primaryColor"], "#000000");
        assert_eq!(branding["design"]["fonts"]["headingFont"], "Playfair Display");

        let (_, all) = send(&app, "GET", "/admin/settings", Some(&admin), None).await;
        assert_eq!(all.as_array().unwrap().len(), AdminSetting::KEYS.len());

        let (status, saved) = send(
            &app,
            "PUT",
            "/admin/site-settings",
            Some(&admin),
            Some(json!({ "banner": "Spring offers", "maintenance": false })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(saved.as_array().unwrap().len(), 2);
        let (_, banner) =
            send(&app, "GET", "/admin/site-settings/banner", Some(&admin), None).await;
        assert_eq!(banner["value"], "Spring offers");
    }

    #[test]
    fn origin_prefers_the_first_forwarded_address() {
        let mut headers = HeaderMap::new();
        assert_eq!(origin(&headers), None);
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        assert_eq!(origin(&headers).as_deref(), Some("203.0.113.7"));
    }
}
