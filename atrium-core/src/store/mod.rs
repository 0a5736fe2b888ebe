//! Storage seams for the tenancy engine.
//!
//! The engine never talks to a database directly; it goes through these
//! traits so applications can back them with whatever persistence they use.
//! The `memory` module provides the in-memory backends used in tests and
//! development.

pub mod memory;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::AtriumResult;
use crate::membership::{MemberRole, Membership};
use crate::tenant::{Tenant, TenantId};
use crate::user::UserId;

/// Persistence for tenant records.
#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn insert(&self, tenant: Tenant) -> AtriumResult<Tenant>;
    async fn get(&self, id: &TenantId) -> AtriumResult<Option<Tenant>>;
    async fn get_by_slug(&self, slug: &str) -> AtriumResult<Option<Tenant>>;
    async fn update(&self, tenant: Tenant) -> AtriumResult<Tenant>;
    /// Cascade deletion of tenant-scoped entities is the storage layer's
    /// job, not the engine's.
    async fn delete(&self, id: &TenantId) -> AtriumResult<()>;
    async fn slug_exists(&self, slug: &str) -> AtriumResult<bool>;
}

/// Persistence for user/tenant memberships.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn insert(&self, membership: Membership) -> AtriumResult<Membership>;
    async fn get(&self, tenant: &TenantId, user: &UserId) -> AtriumResult<Option<Membership>>;
    async fn for_tenant(&self, tenant: &TenantId) -> AtriumResult<Vec<Membership>>;
    /// Enumeration order is whatever the store provides. Callers must not
    /// read a business-meaningful order into it.
    async fn for_user(&self, user: &UserId) -> AtriumResult<Vec<Membership>>;
    async fn update_role(
        &self,
        tenant: &TenantId,
        user: &UserId,
        role: MemberRole,
    ) -> AtriumResult<Membership>;
    async fn remove(&self, tenant: &TenantId, user: &UserId) -> AtriumResult<()>;
    async fn remove_for_tenant(&self, tenant: &TenantId) -> AtriumResult<()>;
}

/// Lookup of users by contact identifier, used by member invitations.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> AtriumResult<Option<UserId>>;
}

/// A single collection/table of tenant-scoped records.
///
/// Records are JSON objects with a string `id` field. This store knows
/// nothing about tenancy; the scope strategies in [`crate::scope`] wrap it.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_all(&self) -> AtriumResult<Vec<Value>>;
    async fn get(&self, id: &str) -> AtriumResult<Option<Value>>;
    async fn insert(&self, record: Value) -> AtriumResult<Value>;
    async fn update(&self, id: &str, record: Value) -> AtriumResult<Value>;
    async fn remove(&self, id: &str) -> AtriumResult<Value>;
}
