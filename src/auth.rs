use crate::AppState;
use axum::{
    extract::{FromRequestParts, Json, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::env;
use std::future::Future;

const AUTH_COOKIE_NAME: &str = "auth_token";

#[derive(Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    user: UserProfile,
}

#[derive(Serialize, Clone)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub name: String,
    pub role: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: usize,
    username: String,
    name: String,
    role: String,
}

pub struct AuthenticatedUser {
    pub id: String,
    pub username: String,
    pub name: String,
    pub role: String,
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync + 'static,
{
    type Rejection = (StatusCode, String);

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let token = extract_token_from_headers(&parts.headers)
                .ok_or((StatusCode::UNAUTHORIZED, "Missing auth token".to_string()))?;
            let claims = validate_token_str(&token).map_err(|e| {
                tracing::error!("Token error: {}", e);
                (StatusCode::UNAUTHORIZED, "Invalid token".to_string())
            })?;

            Ok(AuthenticatedUser {
                id: claims.sub,
                username: claims.username,
                name: claims.name,
                role: claims.role,
            })
        }
    }
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> impl IntoResponse {
    let found = match crate::db::find_user_by_username(&state.db, &payload.username).await {
        Ok(found) => found,
        Err(e) => {
            tracing::error!("User lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    let Some((user, stored_hash)) = found else {
        return (StatusCode::UNAUTHORIZED, "Invalid credentials").into_response();
    };
    if hash_password(&payload.password) != stored_hash {
        return (StatusCode::UNAUTHORIZED, "Invalid credentials").into_response();
    }

    let profile = UserProfile {
        id: user.id,
        username: user.username,
        name: user.name,
        role: user.role,
    };
    match create_jwt(&profile) {
        Ok(token) => {
            let cookie = match HeaderValue::from_str(&build_auth_cookie(&token)) {
                Ok(value) => value,
                Err(e) => {
                    tracing::error!("Cookie encoding failed: {}", e);
                    return (StatusCode::INTERNAL_SERVER_ERROR, "failed to create session")
                        .into_response();
                }
            };
            let mut response = Json(AuthResponse { user: profile }).into_response();
            response.headers_mut().insert(header::SET_COOKIE, cookie);
            response
        }
        Err(e) => {
            tracing::error!("JWT creation failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to create token").into_response()
        }
    }
}

pub async fn logout() -> impl IntoResponse {
    let cookie = match HeaderValue::from_str(&clear_auth_cookie()) {
        Ok(value) => value,
        Err(e) => {
            tracing::error!("Cookie encoding failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "failed to clear session").into_response();
        }
    };
    let mut response = (StatusCode::OK, "OK").into_response();
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    response
}

pub async fn me(user: AuthenticatedUser) -> impl IntoResponse {
    Json(UserProfile {
        id: user.id,
        username: user.username,
        name: user.name,
        role: user.role,
    })
}

pub fn hash_password(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}

fn create_jwt(user: &UserProfile) -> anyhow::Result<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::days(1))
        .expect("valid timestamp")
        .timestamp();

    let claims = Claims {
        sub: user.id.clone(),
        exp: expiration as usize,
        username: user.username.clone(),
        name: user.name.clone(),
        role: user.role.clone(),
    };

    let secret = env::var("JWT_SECRET")
        .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable not set"))?;
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_ref()))?;
    Ok(token)
}

fn validate_token_str(token: &str) -> anyhow::Result<Claims> {
    let secret = env::var("JWT_SECRET")
        .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable not set"))?;
    let mut validation = Validation::default();
    validation.validate_exp = true;
    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_ref()), &validation)?;
    Ok(data.claims)
}

/// Used by both the extractor and the router-level auth middleware.
pub fn token_is_valid(token: &str) -> bool {
    validate_token_str(token).is_ok()
}

pub fn extract_token_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        if let Some(token) = auth_header.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }

    if let Some(cookie_header) = headers.get(header::COOKIE).and_then(|h| h.to_str().ok()) {
        for cookie in cookie_header.split(';') {
            let cookie = cookie.trim();
            if let Some((k, v)) = cookie.split_once('=') {
                if k == AUTH_COOKIE_NAME {
                    return Some(v.to_string());
                }
            }
        }
    }
    None
}

fn build_auth_cookie(token: &str) -> String {
    let secure = env::var("RUST_ENV").unwrap_or_else(|_| "development".to_string()) == "production";
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age=86400",
        AUTH_COOKIE_NAME, token
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn clear_auth_cookie() -> String {
    let secure = env::var("RUST_ENV").unwrap_or_else(|_| "development".to_string()) == "production";
    let mut cookie = format!(
        "{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0",
        AUTH_COOKIE_NAME
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_is_stable_hex() {
        let h = hash_password("hunter2");
        assert_eq!(h.len(), 64);
        assert_eq!(h, hash_password("hunter2"));
        assert_ne!(h, hash_password("hunter3"));
    }

    #[test]
    fn cookie_strings_are_valid_header_values() {
        assert!(HeaderValue::from_str(&build_auth_cookie("abc.def.ghi")).is_ok());
        assert!(HeaderValue::from_str(&clear_auth_cookie()).is_ok());
    }

    #[test]
    fn bearer_token_extracted_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(extract_token_from_headers(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn cookie_token_extracted_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; auth_token=tok123"),
        );
        assert_eq!(extract_token_from_headers(&headers).as_deref(), Some("tok123"));
    }
}
