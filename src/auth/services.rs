use std::sync::Arc;

use axum::extract::FromRef;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::{
    auth::{
        password::{hash_password_blocking, verify_password_blocking},
        repo::{StoreError, UserStore},
        repo_types::{NewUser, User},
        tokens::TokenIssuer,
        validation::{check_register, validate_login},
    },
    error::AuthError,
    state::AppState,
};

/// A user together with a freshly issued plaintext token.
#[derive(Debug)]
pub struct AuthSession {
    pub user: User,
    pub token: String,
}

/// Orchestrates validation, the account store and the token issuer.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    issuer: TokenIssuer,
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.users.clone(), TokenIssuer::new(state.tokens.clone(), state.users.clone()))
    }
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, issuer: TokenIssuer) -> Self {
        Self { users, issuer }
    }

    pub async fn register(&self, input: &Map<String, Value>) -> Result<AuthSession, AuthError> {
        let mut check = check_register(input);
        if let Some(email) = check.email.clone() {
            if self.users.find_by_email(&email).await?.is_some() {
                warn!(email = %email, "email already registered");
                check.reject_email_taken();
            }
        }
        let creds = check.finish().map_err(AuthError::Validation)?;

        let password_hash = hash_password_blocking(creds.password).await?;
        let user = self
            .users
            .create(NewUser {
                name: creds.name,
                email: creds.email,
                password_hash,
            })
            .await
            .map_err(|e| {
                if matches!(e, StoreError::DuplicateEmail) {
                    warn!("registration lost the email uniqueness race");
                }
                AuthError::from(e)
            })?;

        let token = self.issuer.issue(&user, &user.email).await?;
        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(AuthSession { user, token })
    }

    /// Unknown email and wrong password fail identically.
    pub async fn login(&self, input: &Map<String, Value>) -> Result<AuthSession, AuthError> {
        let creds = validate_login(input).map_err(AuthError::Validation)?;

        let user = self.users.find_by_email(&creds.email).await?;
        let hash = user.as_ref().map(|u| u.password_hash.clone());
        let ok = verify_password_blocking(creds.password, hash).await?;

        let user = match user {
            Some(user) if ok => user,
            Some(user) => {
                warn!(email = %creds.email, user_id = %user.id, "login invalid password");
                return Err(AuthError::InvalidCredentials);
            }
            None => {
                warn!(email = %creds.email, "login unknown email");
                return Err(AuthError::InvalidCredentials);
            }
        };

        let token = self.issuer.issue(&user, &user.email).await?;
        info!(user_id = %user.id, email = %user.email, "user logged in");
        Ok(AuthSession { user, token })
    }

    pub async fn logout(&self, user: &User) -> Result<u64, AuthError> {
        let revoked = self.issuer.revoke_all(user).await?;
        info!(user_id = %user.id, revoked, "user logged out");
        Ok(revoked)
    }

    pub async fn authenticate(&self, token: &str) -> Result<User, AuthError> {
        self.issuer
            .authenticate(token)
            .await?
            .map(|(_, user)| user)
            .ok_or(AuthError::Unauthenticated)
    }
}
