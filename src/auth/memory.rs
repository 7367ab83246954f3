//! In-memory stores used by tests in place of PostgreSQL.

use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::{
    repo::{StoreError, TokenStore, UserStore},
    repo_types::{NewUser, PersonalAccessToken, User},
};

#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let now = OffsetDateTime::now_utc();
        let created = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }
}

#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<HashMap<Uuid, PersonalAccessToken>>,
}

impl MemoryTokenStore {
    pub async fn count_for_user(&self, user_id: Uuid) -> usize {
        self.tokens
            .read()
            .await
            .values()
            .filter(|t| t.user_id == user_id)
            .count()
    }

    pub async fn all(&self) -> Vec<PersonalAccessToken> {
        self.tokens.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn insert(
        &self,
        user_id: Uuid,
        name: &str,
        token_hash: &[u8],
    ) -> Result<PersonalAccessToken, StoreError> {
        let token = PersonalAccessToken {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
            token_hash: token_hash.to_vec(),
            last_used_at: None,
            created_at: OffsetDateTime::now_utc(),
        };
        self.tokens.write().await.insert(token.id, token.clone());
        Ok(token)
    }

    async fn find_by_hash(
        &self,
        token_hash: &[u8],
    ) -> Result<Option<PersonalAccessToken>, StoreError> {
        let tokens = self.tokens.read().await;
        Ok(tokens.values().find(|t| t.token_hash == token_hash).cloned())
    }

    async fn touch(&self, id: Uuid) -> Result<(), StoreError> {
        if let Some(token) = self.tokens.write().await.get_mut(&id) {
            token.last_used_at = Some(OffsetDateTime::now_utc());
        }
        Ok(())
    }

    async fn delete_for_user(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, t| t.user_id != user_id);
        Ok((before - tokens.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Ann".into(),
            email: email.into(),
            password_hash: "hash".into(),
        }
    }

    #[tokio::test]
    async fn create_rejects_duplicate_email() {
        let store = MemoryUserStore::default();
        let first = store.create(new_user("ann@x.com")).await.expect("first insert");
        let err = store.create(new_user("ann@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));

        let found = store.find_by_email("ann@x.com").await.unwrap().unwrap();
        assert_eq!(found.id, first.id);
        assert_eq!(store.find_by_id(first.id).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn delete_for_user_only_removes_that_users_tokens() {
        let store = MemoryTokenStore::default();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        store.insert(a, "a", b"one").await.unwrap();
        store.insert(a, "a", b"two").await.unwrap();
        store.insert(b, "b", b"three").await.unwrap();

        assert_eq!(store.delete_for_user(a).await.unwrap(), 2);
        assert_eq!(store.delete_for_user(a).await.unwrap(), 0);
        assert_eq!(store.count_for_user(b).await, 1);
    }

    #[tokio::test]
    async fn touch_sets_last_used_at() {
        let store = MemoryTokenStore::default();
        let token = store.insert(Uuid::new_v4(), "t", b"digest").await.unwrap();
        assert!(token.last_used_at.is_none());

        store.touch(token.id).await.unwrap();
        let found = store.find_by_hash(b"digest").await.unwrap().unwrap();
        assert_eq!(found.created_at, token.created_at);
        assert!(found.last_used_at.is_some_and(|used| used >= found.created_at));
    }
}
