//! The persisted session tenant pointer.
//!
//! A generic per-user key/value store; the engine uses it for exactly one
//! thing: remembering the last-resolved tenant so the next request skips a
//! full resolution. The pointer is untrusted input; the resolver re-runs
//! the access check on every read and discards stale values.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::errors::AtriumResult;
use crate::panel::PanelId;
use crate::user::UserId;

/// Key under which the active-tenant pointer lives for a panel.
pub fn active_tenant_key(panel: &PanelId) -> String {
    format!("tenancy.active.{panel}")
}

/// A persisted, per-user key/value store (the application's session).
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, user: &UserId, key: &str) -> AtriumResult<Option<String>>;
    async fn set(&self, user: &UserId, key: &str, value: String) -> AtriumResult<()>;
    async fn remove(&self, user: &UserId, key: &str) -> AtriumResult<()>;
}

/// In-memory session backend for testing and development.
#[derive(Default)]
pub struct MemorySessionStore {
    values: Arc<RwLock<HashMap<(UserId, String), String>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, user: &UserId, key: &str) -> AtriumResult<Option<String>> {
        Ok(self
            .values
            .read()
            .get(&(user.clone(), key.to_string()))
            .cloned())
    }

    async fn set(&self, user: &UserId, key: &str, value: String) -> AtriumResult<()> {
        self.values
            .write()
            .insert((user.clone(), key.to_string()), value);
        Ok(())
    }

    async fn remove(&self, user: &UserId, key: &str) -> AtriumResult<()> {
        self.values.write().remove(&(user.clone(), key.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pointer_round_trip() {
        let store = MemorySessionStore::new();
        let user = UserId("u1".into());
        let key = active_tenant_key(&PanelId("admin".into()));
        assert_eq!(key, "tenancy.active.admin");

        store.set(&user, &key, "t1".into()).await.unwrap();
        assert_eq!(store.get(&user, &key).await.unwrap(), Some("t1".into()));

        store.remove(&user, &key).await.unwrap();
        assert_eq!(store.get(&user, &key).await.unwrap(), None);
    }
}
