//! User identity and tenancy capabilities.
//!
//! Capabilities are explicit traits rather than runtime probes: a user type
//! that can belong to tenants implements [`TenantAware`]; one that can name
//! a preferred tenant additionally implements [`DefaultTenantAware`]. A user
//! type that implements neither simply gets no tenancy for its requests;
//! the engine degrades to "no tenant" instead of erroring.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::AtriumResult;
use crate::panel::Panel;
use crate::store::{MembershipStore, TenantStore};
use crate::tenant::Tenant;

/// An opaque user identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The authenticated user as the tenancy engine sees it.
///
/// The capability accessors default to `None`; override them on user types
/// that participate in tenancy.
pub trait PanelUser: Send + Sync {
    fn id(&self) -> &UserId;

    fn tenant_aware(&self) -> Option<&dyn TenantAware> {
        None
    }

    fn default_tenant_aware(&self) -> Option<&dyn DefaultTenantAware> {
        None
    }
}

/// A user that can belong to tenants.
#[async_trait]
pub trait TenantAware: Send + Sync {
    /// The tenants this user may access, in whatever order the membership
    /// store enumerates them.
    async fn tenants(&self, panel: &Panel) -> AtriumResult<Vec<Tenant>>;

    async fn can_access_tenant(&self, tenant: &Tenant) -> AtriumResult<bool>;
}

/// A user that names a preferred tenant when nothing else picks one.
#[async_trait]
pub trait DefaultTenantAware: Send + Sync {
    async fn default_tenant(&self, panel: &Panel) -> AtriumResult<Option<Tenant>>;
}

/// The standard user: tenancy derived from the membership store.
///
/// Access is granted when the user owns the tenant (owner reference field)
/// or holds a membership row, checked in that order.
pub struct MembershipUser {
    id: UserId,
    tenants: Arc<dyn TenantStore>,
    memberships: Arc<dyn MembershipStore>,
}

impl MembershipUser {
    pub fn new(
        id: UserId,
        tenants: Arc<dyn TenantStore>,
        memberships: Arc<dyn MembershipStore>,
    ) -> Self {
        Self {
            id,
            tenants,
            memberships,
        }
    }
}

impl PanelUser for MembershipUser {
    fn id(&self) -> &UserId {
        &self.id
    }

    fn tenant_aware(&self) -> Option<&dyn TenantAware> {
        Some(self)
    }
}

#[async_trait]
impl TenantAware for MembershipUser {
    async fn tenants(&self, _panel: &Panel) -> AtriumResult<Vec<Tenant>> {
        let memberships = self.memberships.for_user(&self.id).await?;
        let mut tenants = Vec::with_capacity(memberships.len());
        for membership in memberships {
            // A membership pointing at a deleted tenant is skipped, not an error.
            if let Some(tenant) = self.tenants.get(&membership.tenant_id).await? {
                tenants.push(tenant);
            }
        }
        Ok(tenants)
    }

    async fn can_access_tenant(&self, tenant: &Tenant) -> AtriumResult<bool> {
        if tenant.owner_id.as_ref() == Some(&self.id) {
            return Ok(true);
        }
        Ok(self.memberships.get(&tenant.id, &self.id).await?.is_some())
    }
}
