use std::collections::HashMap;

use axum::{
    async_trait,
    extract::{FromRef, FromRequest, FromRequestParts, Request},
    http::{header, request::Parts},
    Form, Json,
};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::auth::{repo_types::User, services::AuthService, validation::normalize_input};
use crate::error::AuthError;

/// Resolves `Authorization: Bearer <token>` to the user owning the token.
pub struct AuthUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AuthService: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthError::Unauthenticated)?;

        let token = bearer_token(auth_header).ok_or(AuthError::Unauthenticated)?;

        let user = AuthService::from_ref(state)
            .authenticate(token)
            .await
            .inspect_err(|e| {
                if matches!(e, AuthError::Unauthenticated) {
                    warn!("invalid or revoked token");
                }
            })?;

        Ok(AuthUser(user))
    }
}

fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Submitted form or JSON fields, normalized for validation.
///
/// A body that cannot be read as either is treated as empty so that the
/// validator reports the missing fields instead of the request failing early.
pub struct SubmittedFields(pub Map<String, Value>);

#[async_trait]
impl<S> FromRequest<S> for SubmittedFields
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

        let fields = if is_form {
            match Form::<HashMap<String, String>>::from_request(req, state).await {
                Ok(Form(map)) => map
                    .into_iter()
                    .map(|(k, v)| (k, Value::String(v)))
                    .collect(),
                Err(e) => {
                    debug!(error = %e, "unreadable form body");
                    Map::new()
                }
            }
        } else {
            match Json::<Map<String, Value>>::from_request(req, state).await {
                Ok(Json(map)) => map,
                Err(e) => {
                    debug!(error = %e, "unreadable json body");
                    Map::new()
                }
            }
        };

        Ok(SubmittedFields(normalize_input(fields)))
    }
}
