use anyhow::{anyhow, Result};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::async_trait;
use axum::extract::{FromRequestParts, Query, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderValue;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Form;
use chrono::{DateTime, Duration, Utc};
use cookie::{Cookie, SameSite};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, info, warn};

use crate::core::error::{AppError, AppResult};
use crate::core::state::AppState;
use crate::models::{PasswordScheme, User};
use crate::theme::renderer::page_context;
use crate::utils::ensure_trailing_slash;

type HmacSha256 = Hmac<Sha256>;

/// 会话 cookie 名称
pub const SESSION_COOKIE: &str = "session";

fn hmac_hex(key: &str, data: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| anyhow!("无效的 HMAC 密钥: {}", e))?;
    mac.update(data);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// 密码哈希
///
/// 密码先用 `SECURITY_PASSWORD_SALT` 做 HMAC-SHA256，再交给 Argon2id。
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    salt: String,
    scheme: PasswordScheme,
}

impl Argon2Hasher {
    pub fn new(salt: impl Into<String>, scheme: PasswordScheme) -> Self {
        Self {
            salt: salt.into(),
            scheme,
        }
    }

    fn peppered(&self, password: &str) -> Result<String> {
        hmac_hex(&self.salt, password.as_bytes())
    }

    /// 生成 PHC 格式的哈希串
    pub fn hash(&self, password: &str) -> Result<String> {
        match self.scheme {
            PasswordScheme::Argon2 => {
                let peppered = self.peppered(password)?;
                let salt = SaltString::generate(&mut OsRng);
                let hash = Argon2::default()
                    .hash_password(peppered.as_bytes(), &salt)
                    .map_err(|e| anyhow!("密码哈希失败: {}", e))?;
                Ok(hash.to_string())
            }
        }
    }

    /// 校验密码，哈希串格式错误时返回错误
    pub fn verify(&self, password: &str, stored: &str) -> Result<bool> {
        let parsed = PasswordHash::new(stored).map_err(|e| anyhow!("无效的密码哈希: {}", e))?;
        let peppered = self.peppered(password)?;
        Ok(Argon2::default()
            .verify_password(peppered.as_bytes(), &parsed)
            .is_ok())
    }
}

/// 会话签名
///
/// cookie 值形如 `<user_id>.<expires>.<signature>`。
#[derive(Debug, Clone)]
pub struct SessionSigner {
    secret: String,
    ttl: Duration,
}

impl SessionSigner {
    pub fn new(secret: impl Into<String>, ttl_hours: i64) -> Self {
        Self {
            secret: secret.into(),
            ttl: Duration::hours(ttl_hours.max(1)),
        }
    }

    pub fn issue(&self, user_id: i64, now: DateTime<Utc>) -> Result<String> {
        let payload = format!("{}.{}", user_id, (now + self.ttl).timestamp());
        let signature = hmac_hex(&self.secret, payload.as_bytes())?;
        Ok(format!("{}.{}", payload, signature))
    }

    /// 签名有效且未过期时返回用户 id
    pub fn verify(&self, value: &str, now: DateTime<Utc>) -> Option<i64> {
        let (payload, signature) = value.rsplit_once('.')?;
        let (user_id, expires) = payload.split_once('.')?;
        let user_id: i64 = user_id.parse().ok()?;
        let expires: i64 = expires.parse().ok()?;

        let signature = hex::decode(signature).ok()?;
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes()).ok()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).ok()?;

        (expires > now.timestamp()).then_some(user_id)
    }

    pub fn cookie(&self, value: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .max_age(cookie::time::Duration::seconds(self.ttl.num_seconds()))
            .build()
    }

    pub fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::build((SESSION_COOKIE, "")).path("/").build();
        cookie.make_removal();
        cookie
    }
}

/// 从请求头中取出会话 cookie
fn session_value(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(|cookie| cookie.ok())
        .find(|cookie| cookie.name() == SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

async fn load_session_user(parts: &Parts, state: &AppState) -> Option<User> {
    let value = session_value(parts)?;
    let user_id = state.sessions.verify(&value, Utc::now())?;
    match state.repo.find_user(user_id).await {
        Ok(Some(user)) if user.active => Some(user),
        Ok(_) => None,
        Err(e) => {
            warn!("Failed to load session user {}: {}", user_id, e);
            None
        }
    }
}

/// 已登录的用户，未登录时重定向到登录页
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match load_session_user(parts, state).await {
            Some(user) => Ok(CurrentUser(user)),
            None => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str().to_string())
                    .unwrap_or_else(|| "/".to_string());
                debug!("Anonymous request to protected route {}", next);
                Err(AppError::Unauthorized { next })
            }
        }
    }
}

/// 可能已登录的访问者
#[derive(Debug, Clone)]
pub struct Viewer(pub Option<User>);

#[async_trait]
impl FromRequestParts<AppState> for Viewer {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(Viewer(load_session_user(parts, state).await))
    }
}

/// 只允许站内相对路径，避免开放重定向
fn safe_next(next: Option<&str>, fallback: &str) -> String {
    match next {
        Some(n) if n.starts_with('/') && !n.starts_with("//") && !n.contains('\\') => n.to_string(),
        _ => fallback.to_string(),
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

fn login_page(state: &AppState, next: &str, email: &str, error: Option<&str>) -> AppResult<Html<String>> {
    let mut context = page_context(None);
    context.insert("next", next);
    context.insert("email", email);
    context.insert("error", &error);
    state.render("security/login.html", &context)
}

pub async fn login_form(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
) -> AppResult<Html<String>> {
    let fallback = ensure_trailing_slash(&state.config.blog_prefix);
    let next = safe_next(query.next.as_deref(), &fallback);
    login_page(&state, &next, "", None)
}

pub async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> AppResult<Response> {
    let fallback = ensure_trailing_slash(&state.config.blog_prefix);
    let next = safe_next(form.next.as_deref(), &fallback);
    let email = form.email.trim();

    let user = state.repo.find_user_by_email(email).await?;
    let authenticated = match &user {
        Some(user) if user.active => state.hasher.verify(&form.password, &user.password)?,
        _ => false,
    };

    match user {
        Some(user) if authenticated => {
            let value = state.sessions.issue(user.id, Utc::now())?;
            let cookie = state.sessions.cookie(value);
            info!("User {} logged in", user.email);

            let mut response = Redirect::to(&next).into_response();
            let header = HeaderValue::from_str(&cookie.to_string())
                .map_err(|e| anyhow!("无效的 cookie: {}", e))?;
            response.headers_mut().append(SET_COOKIE, header);
            Ok(response)
        }
        _ => {
            warn!("Failed login attempt for {}", email);
            Ok(login_page(&state, &next, email, Some("Invalid email or password"))?.into_response())
        }
    }
}

pub async fn logout(State(state): State<AppState>) -> AppResult<Response> {
    let target = ensure_trailing_slash(&state.config.blog_prefix);
    let mut response = Redirect::to(&target).into_response();
    let header = HeaderValue::from_str(&state.sessions.removal_cookie().to_string())
        .map_err(|e| anyhow!("无效的 cookie: {}", e))?;
    response.headers_mut().append(SET_COOKIE, header);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trip_depends_on_salt() {
        let hasher = Argon2Hasher::new("pepper", PasswordScheme::Argon2);
        let hash = hasher.hash("hunter2").unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(hasher.verify("hunter2", &hash).unwrap());
        assert!(!hasher.verify("hunter3", &hash).unwrap());

        let other = Argon2Hasher::new("different", PasswordScheme::Argon2);
        assert!(!other.verify("hunter2", &hash).unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        let hasher = Argon2Hasher::new("pepper", PasswordScheme::Argon2);
        assert!(hasher.verify("x", "not-a-hash").is_err());
    }

    #[test]
    fn session_tokens_expire_and_resist_tampering() {
        let signer = SessionSigner::new("secret", 1);
        let now = Utc::now();
        let token = signer.issue(42, now).unwrap();

        assert_eq!(signer.verify(&token, now), Some(42));
        assert_eq!(signer.verify(&token, now + Duration::hours(2)), None);

        let forged = token.replacen("42", "43", 1);
        assert_eq!(signer.verify(&forged, now), None);
        assert_eq!(SessionSigner::new("other", 1).verify(&token, now), None);
        assert_eq!(signer.verify("garbage", now), None);
    }

    #[test]
    fn next_must_stay_on_site() {
        assert_eq!(safe_next(Some("/blog/create"), "/blog/"), "/blog/create");
        assert_eq!(safe_next(Some("//evil.example"), "/blog/"), "/blog/");
        assert_eq!(safe_next(Some("https://evil.example"), "/blog/"), "/blog/");
        assert_eq!(safe_next(None, "/blog/"), "/blog/");
    }
}
