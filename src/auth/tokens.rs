use std::sync::Arc;

use anyhow::Context;
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

use crate::auth::{
    repo::{StoreError, TokenStore, UserStore},
    repo_types::User,
};

const TOKEN_BYTES: usize = 32;

/// Create a new bearer token. The raw value is only returned to the client.
pub fn generate_token() -> anyhow::Result<String> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate access token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Digest stored in place of the token; lookups hash the presented value.
pub fn hash_token(token: &str) -> Vec<u8> {
    Sha256::digest(token.as_bytes()).to_vec()
}

#[derive(Debug, thiserror::Error)]
pub enum IssueError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Random(#[from] anyhow::Error),
}

/// Mints, resolves and revokes personal access tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    tokens: Arc<dyn TokenStore>,
    users: Arc<dyn UserStore>,
}

impl TokenIssuer {
    pub fn new(tokens: Arc<dyn TokenStore>, users: Arc<dyn UserStore>) -> Self {
        Self { tokens, users }
    }

    /// Returns the plaintext token. It cannot be recovered afterwards.
    pub async fn issue(&self, user: &User, name: &str) -> Result<String, IssueError> {
        let token = generate_token()?;
        let record = self
            .tokens
            .insert(user.id, name, &hash_token(&token))
            .await?;
        debug!(
            user_id = %user.id,
            token_id = %record.id,
            created_at = %record.created_at,
            "access token issued"
        );
        Ok(token)
    }

    /// Deletes every token of the user. Revoking with no tokens is not an error.
    pub async fn revoke_all(&self, user: &User) -> Result<u64, StoreError> {
        let revoked = self.tokens.delete_for_user(user.id).await?;
        debug!(user_id = %user.id, revoked, "access tokens revoked");
        Ok(revoked)
    }

    /// Resolves a presented token to its user, returning `None` for unknown tokens.
    pub async fn authenticate(&self, token: &str) -> Result<Option<(Uuid, User)>, StoreError> {
        let Some(record) = self.tokens.find_by_hash(&hash_token(token)).await? else {
            return Ok(None);
        };
        let Some(user) = self.users.find_by_id(record.user_id).await? else {
            return Ok(None);
        };
        self.tokens.touch(record.id).await?;
        debug!(
            user_id = %user.id,
            token_id = %record.id,
            token_name = %record.name,
            previously_used_at = ?record.last_used_at,
            "access token authenticated"
        );
        Ok(Some((record.id, user)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{
        memory::{MemoryTokenStore, MemoryUserStore},
        repo_types::NewUser,
    };

    async fn setup() -> (TokenIssuer, Arc<MemoryTokenStore>, User) {
        let users = Arc::new(MemoryUserStore::default());
        let tokens = Arc::new(MemoryTokenStore::default());
        let user = users
            .create(NewUser {
                name: "Ann".into(),
                email: "ann@x.com".into(),
                password_hash: "hash".into(),
            })
            .await
            .unwrap();
        (TokenIssuer::new(tokens.clone(), users), tokens, user)
    }

    #[test]
    fn generated_tokens_are_random_and_url_safe() {
        let a = generate_token().unwrap();
        let b = generate_token().unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn hash_is_sha256_digest() {
        assert_eq!(hash_token("abc").len(), 32);
        assert_eq!(hash_token("abc"), hash_token("abc"));
        assert_ne!(hash_token("abc"), hash_token("abd"));
    }

    #[tokio::test]
    async fn issued_token_authenticates_and_only_digest_is_stored() {
        let (issuer, tokens, user) = setup().await;
        let token = issuer.issue(&user, &user.email).await.unwrap();

        let stored = tokens.all().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].name, "ann@x.com");
        assert_ne!(stored[0].token_hash, token.as_bytes());

        let (token_id, found) = issuer.authenticate(&token).await.unwrap().unwrap();
        assert_eq!(token_id, stored[0].id);
        assert_eq!(found.id, user.id);
        assert!(issuer.authenticate("not-a-token").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn revoke_all_invalidates_every_token() {
        let (issuer, tokens, user) = setup().await;
        let first = issuer.issue(&user, "one").await.unwrap();
        let second = issuer.issue(&user, "two").await.unwrap();
        assert_ne!(first, second);

        assert_eq!(issuer.revoke_all(&user).await.unwrap(), 2);
        assert!(issuer.authenticate(&first).await.unwrap().is_none());
        assert!(issuer.authenticate(&second).await.unwrap().is_none());
        assert_eq!(tokens.count_for_user(user.id).await, 0);

        assert_eq!(issuer.revoke_all(&user).await.unwrap(), 0);
    }
}
