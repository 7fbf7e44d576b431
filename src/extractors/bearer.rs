//! Extract the token from the `Authorization` header, with or without a `Bearer ` prefix.

use crate::error::{AppError, AuthError};
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

/// Raw token string. Rejects with 401 when the header is missing or empty.
#[derive(Clone, Debug)]
pub struct BearerToken(pub String);

fn strip_scheme(value: &str) -> &str {
    let value = value.trim_start();
    match value.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        _ if value.trim_end().eq_ignore_ascii_case("bearer") => "",
        _ => value.trim_end(),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(strip_scheme)
            .filter(|s| !s.is_empty())
            .map(|s| BearerToken(s.to_string()))
            .ok_or(AppError::Auth(AuthError::MissingToken))
    }
}
