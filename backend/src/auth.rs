use axum::http::{header, HeaderMap};
use chrono::Utc;
use uuid::Uuid;

use crate::{error::AppError, AppState};

pub const SESSION_COOKIE: &str = "planner_session";

const KEY_CONTEXT: &str = "planner 2025-06-01 session cookie v1";

pub struct AuthState {
    pub user_id: Uuid,
    pub username: String,
    pub is_admin: bool,
}

/// MAC key for session cookies, derived from `SECRET_KEY`.
#[derive(Clone)]
pub struct SessionKey([u8; 32]);

impl SessionKey {
    pub fn derive(secret: &str) -> Self {
        Self(blake3::derive_key(KEY_CONTEXT, secret.as_bytes()))
    }

    fn mac(&self, payload: &str) -> blake3::Hash {
        blake3::keyed_hash(&self.0, payload.as_bytes())
    }
}

/// Signed token `<user id>.<expiry unix seconds>.<mac hex>`.
pub fn create_session(user_id: Uuid, key: &SessionKey, now: i64, max_age_secs: i64) -> String {
    let payload = format!("{}.{}", user_id, now.saturating_add(max_age_secs));
    let mac = key.mac(&payload);
    format!("{}.{}", payload, mac.to_hex())
}

/// Returns the user id of a well-signed, unexpired token.
pub fn verify_token(token: &str, key: &SessionKey, now: i64) -> Option<Uuid> {
    let (payload, mac_hex) = token.rsplit_once('.')?;
    let (user_id, expiry) = payload.split_once('.')?;

    let presented = blake3::Hash::from_hex(mac_hex).ok()?;
    // blake3::Hash equality is constant time.
    if presented != key.mac(payload) {
        return None;
    }
    if expiry.parse::<i64>().ok()? <= now {
        return None;
    }
    Uuid::parse_str(user_id).ok()
}

/// `max_age_secs: None` yields a browser-session cookie.
pub fn session_cookie(token: &str, max_age_secs: Option<i64>, secure: bool) -> String {
    let mut cookie = format!("{}={}; HttpOnly; Path=/; SameSite=Strict", SESSION_COOKIE, token);
    if let Some(max_age) = max_age_secs {
        cookie.push_str(&format!("; Max-Age={}", max_age));
    }
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_session_cookie(secure: bool) -> String {
    session_cookie("", Some(0), secure)
}

pub fn extract_session_id(headers: &HeaderMap) -> Option<String> {
    let prefix = format!("{}=", SESSION_COOKIE);
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookie_str| cookie_str.split(';'))
        .map(str::trim)
        .find_map(|cookie| cookie.strip_prefix(prefix.as_str()))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Resolves the session cookie to a live user.
pub async fn verify_session(headers: &HeaderMap, state: &AppState) -> Result<AuthState, AppError> {
    let token = extract_session_id(headers).ok_or(AppError::Unauthorized)?;
    let user_id = verify_token(&token, &state.session_key, Utc::now().timestamp())
        .ok_or(AppError::Unauthorized)?;

    let user = state
        .store
        .find_user(user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    Ok(AuthState {
        user_id: user.id,
        is_admin: user.is_admin(),
        username: user.username,
    })
}

pub async fn require_admin(headers: &HeaderMap, state: &AppState) -> Result<AuthState, AppError> {
    let auth_state = verify_session(headers, state).await?;
    if !auth_state.is_admin {
        return Err(AppError::Forbidden);
    }
    Ok(auth_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn token_round_trips_until_expiry() {
        let key = SessionKey::derive("secret");
        let user = Uuid::new_v4();
        let token = create_session(user, &key, 1_000, 60);

        assert_eq!(verify_token(&token, &key, 1_000), Some(user));
        assert_eq!(verify_token(&token, &key, 1_059), Some(user));
        assert_eq!(verify_token(&token, &key, 1_060), None);
    }

    #[test]
    fn huge_lifetimes_do_not_wrap_into_the_past() {
        let key = SessionKey::derive("secret");
        let user = Uuid::new_v4();
        let token = create_session(user, &key, 1_000, i64::MAX);
        assert_eq!(verify_token(&token, &key, 1_000), Some(user));
    }

    #[test]
    fn tampered_or_foreign_tokens_are_rejected() {
        let key = SessionKey::derive("secret");
        let user = Uuid::new_v4();
        let token = create_session(user, &key, 1_000, 60);

        let other_key = SessionKey::derive("another secret");
        assert_eq!(verify_token(&token, &other_key, 1_000), None);

        let (_, mac) = token.rsplit_once('.').unwrap();
        let forged = format!("{}.{}.{}", Uuid::new_v4(), 1_060, mac);
        assert_eq!(verify_token(&forged, &key, 1_000), None);

        let (_, mac) = token.rsplit_once('.').unwrap();
        let extended = format!("{}.{}.{}", user, 9_999, mac);
        assert_eq!(verify_token(&extended, &key, 1_000), None);

        assert_eq!(verify_token("garbage", &key, 1_000), None);
    }

    #[test]
    fn extracts_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; planner_session=abc.def; other=1"),
        );
        assert_eq!(extract_session_id(&headers).as_deref(), Some("abc.def"));

        headers.insert(header::COOKIE, HeaderValue::from_static("planner_session="));
        assert_eq!(extract_session_id(&headers), None);
    }

    #[test]
    fn cookie_flags() {
        let cookie = session_cookie("tok", Some(86_400), true);
        assert!(cookie.starts_with("planner_session=tok;"));
        assert!(cookie.contains("Max-Age=86400"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.ends_with("; Secure"));
        assert!(clear_session_cookie(false).contains("Max-Age=0"));
        assert!(!session_cookie("tok", None, false).contains("Max-Age"));
    }
}
