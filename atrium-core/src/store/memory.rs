//! In-memory store backends for testing and development.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::errors::{AtriumError, AtriumResult};
use crate::membership::{MemberRole, Membership};
use crate::store::{MembershipStore, RecordStore, TenantStore, UserDirectory};
use crate::tenant::{Tenant, TenantId};
use crate::user::UserId;

/// Tenant records indexed by id; insertion order is not meaningful here
/// because tenants are always addressed directly.
#[derive(Default)]
pub struct MemoryTenantStore {
    tenants: Arc<RwLock<HashMap<TenantId, Tenant>>>,
}

impl MemoryTenantStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TenantStore for MemoryTenantStore {
    async fn insert(&self, tenant: Tenant) -> AtriumResult<Tenant> {
        self.tenants
            .write()
            .insert(tenant.id.clone(), tenant.clone());
        Ok(tenant)
    }

    async fn get(&self, id: &TenantId) -> AtriumResult<Option<Tenant>> {
        Ok(self.tenants.read().get(id).cloned())
    }

    async fn get_by_slug(&self, slug: &str) -> AtriumResult<Option<Tenant>> {
        Ok(self
            .tenants
            .read()
            .values()
            .find(|t| t.slug == slug)
            .cloned())
    }

    async fn update(&self, tenant: Tenant) -> AtriumResult<Tenant> {
        let mut tenants = self.tenants.write();
        if !tenants.contains_key(&tenant.id) {
            return Err(AtriumError::not_found(format!("Tenant not found: {}", tenant.id))
                .into_anyhow());
        }
        tenants.insert(tenant.id.clone(), tenant.clone());
        Ok(tenant)
    }

    async fn delete(&self, id: &TenantId) -> AtriumResult<()> {
        self.tenants.write().remove(id);
        Ok(())
    }

    async fn slug_exists(&self, slug: &str) -> AtriumResult<bool> {
        Ok(self.tenants.read().values().any(|t| t.slug == slug))
    }
}

/// Memberships kept as a Vec so enumeration order is stable insertion
/// (joined) order. Tests rely on that stability, not on its meaning.
#[derive(Default)]
pub struct MemoryMembershipStore {
    memberships: Arc<RwLock<Vec<Membership>>>,
}

impl MemoryMembershipStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MembershipStore for MemoryMembershipStore {
    async fn insert(&self, membership: Membership) -> AtriumResult<Membership> {
        let mut memberships = self.memberships.write();
        if memberships
            .iter()
            .any(|m| m.tenant_id == membership.tenant_id && m.user_id == membership.user_id)
        {
            return Err(AtriumError::conflict("Membership already exists").into_anyhow());
        }
        memberships.push(membership.clone());
        Ok(membership)
    }

    async fn get(&self, tenant: &TenantId, user: &UserId) -> AtriumResult<Option<Membership>> {
        Ok(self
            .memberships
            .read()
            .iter()
            .find(|m| &m.tenant_id == tenant && &m.user_id == user)
            .cloned())
    }

    async fn for_tenant(&self, tenant: &TenantId) -> AtriumResult<Vec<Membership>> {
        Ok(self
            .memberships
            .read()
            .iter()
            .filter(|m| &m.tenant_id == tenant)
            .cloned()
            .collect())
    }

    async fn for_user(&self, user: &UserId) -> AtriumResult<Vec<Membership>> {
        Ok(self
            .memberships
            .read()
            .iter()
            .filter(|m| &m.user_id == user)
            .cloned()
            .collect())
    }

    async fn update_role(
        &self,
        tenant: &TenantId,
        user: &UserId,
        role: MemberRole,
    ) -> AtriumResult<Membership> {
        let mut memberships = self.memberships.write();
        let found = memberships
            .iter_mut()
            .find(|m| &m.tenant_id == tenant && &m.user_id == user)
            .ok_or_else(|| AtriumError::not_found("Member not found").into_anyhow())?;
        found.role = role;
        Ok(found.clone())
    }

    async fn remove(&self, tenant: &TenantId, user: &UserId) -> AtriumResult<()> {
        self.memberships
            .write()
            .retain(|m| !(&m.tenant_id == tenant && &m.user_id == user));
        Ok(())
    }

    async fn remove_for_tenant(&self, tenant: &TenantId) -> AtriumResult<()> {
        self.memberships.write().retain(|m| &m.tenant_id != tenant);
        Ok(())
    }
}

/// Email → user lookup for invitations.
#[derive(Default)]
pub struct MemoryUserDirectory {
    users: Arc<RwLock<HashMap<String, UserId>>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, email: impl Into<String>, user: UserId) {
        self.users.write().insert(email.into().to_lowercase(), user);
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_email(&self, email: &str) -> AtriumResult<Option<UserId>> {
        Ok(self.users.read().get(&email.to_lowercase()).cloned())
    }
}

/// A single in-memory collection of JSON records.
///
/// Records are objects with a string `id`; one is generated when the caller
/// does not supply it.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: Arc<RwLock<Vec<Value>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn record_id(record: &Value) -> Option<&str> {
    record.get("id").and_then(|v| v.as_str())
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn find_all(&self) -> AtriumResult<Vec<Value>> {
        Ok(self.records.read().clone())
    }

    async fn get(&self, id: &str) -> AtriumResult<Option<Value>> {
        Ok(self
            .records
            .read()
            .iter()
            .find(|r| record_id(r) == Some(id))
            .cloned())
    }

    async fn insert(&self, mut record: Value) -> AtriumResult<Value> {
        if !record.is_object() {
            return Err(AtriumError::bad_request("Record must be a JSON object").into_anyhow());
        }
        if record_id(&record).is_none() {
            record["id"] = Value::String(uuid::Uuid::new_v4().to_string());
        }
        self.records.write().push(record.clone());
        Ok(record)
    }

    async fn update(&self, id: &str, mut record: Value) -> AtriumResult<Value> {
        if !record.is_object() {
            return Err(AtriumError::bad_request("Record must be a JSON object").into_anyhow());
        }
        let mut records = self.records.write();
        let found = records
            .iter_mut()
            .find(|r| record_id(r) == Some(id))
            .ok_or_else(|| AtriumError::not_found(format!("Record not found: {id}")).into_anyhow())?;
        record["id"] = Value::String(id.to_string());
        *found = record.clone();
        Ok(record)
    }

    async fn remove(&self, id: &str) -> AtriumResult<Value> {
        let mut records = self.records.write();
        let pos = records
            .iter()
            .position(|r| record_id(r) == Some(id))
            .ok_or_else(|| AtriumError::not_found(format!("Record not found: {id}")).into_anyhow())?;
        Ok(records.remove(pos))
    }
}
