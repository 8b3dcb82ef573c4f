use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::application::error::AppError;
use crate::bootstrap::app_context::AppContext;
use crate::bootstrap::config::Config;

/// Tokens are minted by the external identity provider; only `sub` is used.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

pub struct Bearer(pub String);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Bearer
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // 1) Prefer Authorization header if present
        if let Some(auth) = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
        {
            if let Some(t) = auth.strip_prefix("Bearer ") {
                return Ok(Bearer(t.trim().to_string()));
            }
        }

        // 2) Fallback to HttpOnly cookie `access_token`
        if let Some(cookie_hdr) = parts
            .headers
            .get(axum::http::header::COOKIE)
            .and_then(|v| v.to_str().ok())
        {
            if let Some(token) = get_cookie(cookie_hdr, "access_token") {
                return Ok(Bearer(token));
            }
        }

        Err(AppError::Unauthenticated)
    }
}

/// The authenticated owner of every entry a request touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub String);

#[axum::async_trait]
impl FromRequestParts<AppContext> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let bearer = Bearer::from_request_parts(parts, ctx).await?;
        validate_bearer(&ctx.cfg, &bearer.0).map(AuthUser)
    }
}

pub(crate) fn validate_bearer(cfg: &Config, token: &str) -> Result<String, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    if let Some(iss) = &cfg.jwt_issuer {
        validation.set_issuer(&[iss.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss"]);
    }
    let data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(cfg.jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|err| {
        tracing::debug!(error = %err, "bearer_rejected");
        AppError::Unauthenticated
    })?;
    let sub = data.claims.sub.trim();
    if sub.is_empty() {
        return Err(AppError::Unauthenticated);
    }
    Ok(sub.to_string())
}

fn get_cookie(cookie_header: &str, name: &str) -> Option<String> {
    for part in cookie_header.split(';') {
        let kv = part.trim();
        if let Some((k, v)) = kv.split_once('=') {
            if k.trim() == name {
                return Some(v.trim().to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use jsonwebtoken::{EncodingKey, Header};

    fn config(issuer: Option<&str>) -> Config {
        let mut vars = HashMap::new();
        vars.insert("JWT_SECRET".to_string(), "test-secret".to_string());
        if let Some(iss) = issuer {
            vars.insert("JWT_ISSUER".to_string(), iss.to_string());
        }
        Config::from_lookup(|k| vars.get(k).cloned()).unwrap()
    }

    fn token(secret: &str, sub: &str, iss: Option<&str>, ttl: i64) -> String {
        let claims = Claims {
            sub: sub.into(),
            exp: (chrono::Utc::now().timestamp() + ttl) as usize,
            iss: iss.map(str::to_string),
        };
        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn accepts_valid_tokens() {
        let cfg = config(None);
        let sub = validate_bearer(&cfg, &token("test-secret", "user_2abc", None, 600)).unwrap();
        assert_eq!(sub, "user_2abc");
    }

    #[test]
    fn rejects_wrong_secret_and_expired_tokens() {
        let cfg = config(None);
        assert!(matches!(
            validate_bearer(&cfg, &token("other", "u1", None, 600)),
            Err(AppError::Unauthenticated)
        ));
        assert!(matches!(
            validate_bearer(&cfg, &token("test-secret", "u1", None, -3600)),
            Err(AppError::Unauthenticated)
        ));
        assert!(validate_bearer(&cfg, "garbage").is_err());
        assert!(validate_bearer(&cfg, &token("test-secret", " ", None, 600)).is_err());
    }

    #[test]
    fn enforces_configured_issuer() {
        let cfg = config(Some("https://id.example.com"));
        assert!(
            validate_bearer(
                &cfg,
                &token("test-secret", "u1", Some("https://id.example.com"), 600)
            )
            .is_ok()
        );
        assert!(validate_bearer(&cfg, &token("test-secret", "u1", Some("evil"), 600)).is_err());
        assert!(validate_bearer(&cfg, &token("test-secret", "u1", None, 600)).is_err());
    }

    #[test]
    fn reads_cookie_values() {
        let hdr = "theme=dark; access_token=abc.def ; other=1";
        assert_eq!(get_cookie(hdr, "access_token").as_deref(), Some("abc.def"));
        assert_eq!(get_cookie(hdr, "missing"), None);
    }
}
