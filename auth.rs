//! Identities, password hashing and bearer sessions.
//!
//! Password hashes are stored as `hex(salt):hex(key)` where the key is a
//! 64-byte scrypt derivation of the password with the hex salt.

use crate::db::{self, unix_now};
use crate::error::{Error, Result};
use crate::models::{Account, ActivityEntry, Identity};
use rand::{Rng, RngCore};
use rusqlite::Connection;
use scrypt::{scrypt, Params};
use serde::Serialize;
use subtle::ConstantTimeEq;

pub const ADMIN_ROLE: &str = "admin";

const TOKEN_LENGTH: usize = 48;
const TOKEN_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789-_";
const KEY_LENGTH: usize = 64;

#[cfg(not(test))]
const SCRYPT_LOG_N: u8 = 14;
// Cheap parameters keep the test suite fast; hashes never leave the test process.
#[cfg(test)]
const SCRYPT_LOG_N: u8 = 4;

pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt_hex = hex::encode(salt_bytes);

    let key = derive_key(password, &salt_hex)?;
    Ok(format!("{}:{}", salt_hex, hex::encode(key)))
}

/// Checks `password` against a hash produced by [`hash_password`].
pub fn verify_password(hash: &str, password: &str) -> Result<bool> {
    let Some((salt, key_hex)) = hash.split_once(':') else {
        log::warn!("Stored password hash has an unexpected format");
        return Ok(false);
    };
    let Ok(expected) = hex::decode(key_hex) else {
        log::warn!("Stored password hash is not valid hex");
        return Ok(false);
    };
    let derived = derive_key(password, salt)?;
    Ok(derived.len() == expected.len() && derived.ct_eq(&expected).into())
}

fn derive_key(password: &str, salt: &str) -> Result<Vec<u8>> {
    let params = Params::new(SCRYPT_LOG_N, 16, 1, KEY_LENGTH)
        .map_err(|e| Error::Init(format!("Invalid scrypt params: {e}")))?;
    let mut output = vec![0u8; KEY_LENGTH];
    scrypt(password.as_bytes(), salt.as_bytes(), &params, &mut output)
        .map_err(|e| Error::Init(format!("scrypt failed: {e}")))?;
    Ok(output)
}

pub fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    (0..TOKEN_LENGTH)
        .map(|_| TOKEN_CHARSET[rng.gen_range(0..TOKEN_CHARSET.len())] as char)
        .collect()
}

/// Token from an `Authorization: Bearer <token>` header value.
pub fn extract_bearer_token(authorization: &str) -> Option<&str> {
    authorization
        .strip_prefix("Bearer ")
        .or_else(|| authorization.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// The authenticated side of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub identity_id: String,
    pub token: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignedIn {
    pub token: String,
    pub expires_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<Account>,
}

fn check_credentials(conn: &Connection, login: &str, password: &str) -> Result<Identity> {
    let identity = db::find_identity_by_login(conn, login)?.ok_or(Error::InvalidCredentials)?;
    if !verify_password(&identity.password_hash, password)? {
        return Err(Error::InvalidCredentials);
    }
    Ok(identity)
}

fn open_session(conn: &Connection, identity_id: &str, ttl_secs: i64) -> Result<(String, i64)> {
    let token = generate_token();
    let expires_at = unix_now().saturating_add(ttl_secs);
    db::insert_session(conn, &token, identity_id, expires_at)?;
    Ok((token, expires_at))
}

/// Client sign-in by username. Only identities that own an account may use it.
pub fn sign_in_client(
    conn: &Connection,
    username: &str,
    password: &str,
    ttl_secs: i64,
    origin: Option<String>,
) -> Result<SignedIn> {
    let identity = check_credentials(conn, username.trim(), password)?;
    let account = db::get_account(conn, &identity.id)?.ok_or(Error::InvalidCredentials)?;

    db::touch_last_login(conn, &account.id)?;
    let (token, expires_at) = open_session(conn, &identity.id, ttl_secs)?;
    db::insert_activity(
        conn,
        &ActivityEntry::new("login")
            .user(&account.id)
            .details(serde_json::json!({ "username": account.username }))
            .origin(origin),
    )?;
    log::info!("Client {} signed in", account.username);

    let account = db::get_account(conn, &identity.id)?;
    Ok(SignedIn {
        token,
        expires_at,
        account,
    })
}

/// Admin sign-in by e-mail. Valid credentials without the admin role are refused
/// and no session is opened.
pub fn sign_in_admin(
    conn: &Connection,
    email: &str,
    password: &str,
    ttl_secs: i64,
    origin: Option<String>,
) -> Result<SignedIn> {
    let identity = check_credentials(conn, email.trim(), password)?;
    if !db::has_role(conn, &identity.id, ADMIN_ROLE)? {
        log::warn!("Admin sign-in refused for {}", identity.login);
        return Err(Error::Forbidden);
    }

    let (token, expires_at) = open_session(conn, &identity.id, ttl_secs)?;
    db::insert_activity(
        conn,
        &ActivityEntry::new("admin_login")
            .details(serde_json::json!({ "email": identity.login }))
            .origin(origin),
    )?;
    log::info!("Admin {} signed in", identity.login);

    Ok(SignedIn {
        token,
        expires_at,
        account: None,
    })
}

pub fn sign_out(conn: &Connection, caller: &Caller) -> Result<()> {
    db::delete_session(conn, &caller.token)?;
    Ok(())
}

/// Resolves a bearer token to its caller, with the admin role looked up on the side.
pub fn authenticate(conn: &Connection, token: Option<&str>) -> Result<Caller> {
    let token = token.ok_or(Error::Unauthorized)?;
    let identity_id =
        db::find_session_identity(conn, token, unix_now())?.ok_or(Error::Unauthorized)?;
    let is_admin = db::has_role(conn, &identity_id, ADMIN_ROLE)?;
    Ok(Caller {
        identity_id,
        token: token.to_string(),
        is_admin,
    })
}

pub fn require_admin(conn: &Connection, token: Option<&str>) -> Result<Caller> {
    let caller = authenticate(conn, token)?;
    if !caller.is_admin {
        return Err(Error::Forbidden);
    }
    Ok(caller)
}

/// A signed-in client together with its account as currently stored.
pub fn require_client(conn: &Connection, token: Option<&str>) -> Result<(Caller, Account)> {
    let caller = authenticate(conn, token)?;
    let account = db::get_account(conn, &caller.identity_id)?.ok_or(Error::Forbidden)?;
    Ok((caller, account))
}

/// Makes sure an admin identity exists for `email`, resetting its password.
pub fn ensure_admin(conn: &Connection, email: &str, password: &str) -> Result<Identity> {
    let password_hash = hash_password(password)?;
    let identity = match db::find_identity_by_login(conn, email)? {
        Some(existing) => {
            db::update_password_hash(conn, &existing.id, &password_hash)?;
            existing
        }
        None => db::insert_identity(conn, email, Some(email), &password_hash, Some("Administrator"))?,
    };
    db::grant_role(conn, &identity.id, ADMIN_ROLE)?;
    log::info!("Admin identity {} is ready", identity.login);
    Ok(identity)
}
