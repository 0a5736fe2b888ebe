//! Per-request tenant resolution.
//!
//! Priority order:
//! 1. explicit tenant path segment on the route
//! 2. the persisted session pointer (validated, stale values discarded)
//! 3. the user's default-tenant capability
//! 4. first of the user's accessible tenants, in store enumeration order
//! 5. none; the caller redirects into the registration flow
//!
//! A route-named tenant is returned unconditionally; the caller owns the
//! access check for that case and persists the pointer afterwards via
//! [`TenantResolver::remember`]. Every other step verifies access here.

use std::sync::Arc;

use tracing::debug;

use crate::context::TenantContext;
use crate::errors::{AtriumError, AtriumResult};
use crate::panel::Panel;
use crate::session::{active_tenant_key, SessionStore};
use crate::store::TenantStore;
use crate::tenant::{Tenant, TenantId};
use crate::user::{PanelUser, UserId};

/// What the route contributes to resolution: the tenant-identifying path
/// segment, if the request carried one.
#[derive(Debug, Clone, Default)]
pub struct RouteHint {
    pub tenant_segment: Option<String>,
}

impl RouteHint {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn tenant(segment: impl Into<String>) -> Self {
        Self {
            tenant_segment: Some(segment.into()),
        }
    }

    /// Extract the tenant segment from a panel-relative request path.
    /// The engine's own `/tenant/...` routes carry no tenant segment.
    pub fn from_request_path(panel: &Panel, path: &str) -> Self {
        let prefix = panel.path.trim_end_matches('/');
        let rest = match path.strip_prefix(prefix) {
            Some(rest) => rest.trim_start_matches('/'),
            None => return Self::none(),
        };

        match rest.split('/').next() {
            Some(segment) if !segment.is_empty() && segment != "tenant" => {
                Self::tenant(segment)
            }
            _ => Self::none(),
        }
    }
}

/// Look a tenant up by its URL address: the panel's slug attribute first,
/// falling back to the opaque id.
pub async fn lookup_tenant(
    store: &dyn TenantStore,
    panel: &Panel,
    segment: &str,
) -> AtriumResult<Option<Tenant>> {
    if panel.slug_attribute().is_some() {
        if let Some(tenant) = store.get_by_slug(segment).await? {
            return Ok(Some(tenant));
        }
    }
    store.get(&TenantId(segment.to_string())).await
}

pub struct TenantResolver {
    panel: Panel,
    tenants: Arc<dyn TenantStore>,
    session: Arc<dyn SessionStore>,
}

impl TenantResolver {
    pub fn new(
        panel: Panel,
        tenants: Arc<dyn TenantStore>,
        session: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            panel,
            tenants,
            session,
        }
    }

    pub fn panel(&self) -> &Panel {
        &self.panel
    }

    /// Determine the active tenant for this request.
    pub async fn resolve(
        &self,
        route: &RouteHint,
        user: &dyn PanelUser,
    ) -> AtriumResult<TenantContext> {
        if !self.panel.tenancy_enabled() {
            return Ok(TenantContext::disabled(self.panel.id.clone()));
        }

        // Users without the tenancy capability get no tenant, not an error.
        let Some(aware) = user.tenant_aware() else {
            debug!(panel = %self.panel.id, user = %user.id(), "user has no tenancy capability");
            return Ok(TenantContext::disabled(self.panel.id.clone()));
        };

        if let Some(segment) = &route.tenant_segment {
            let tenant = lookup_tenant(self.tenants.as_ref(), &self.panel, segment)
                .await?
                .ok_or_else(|| {
                    AtriumError::not_found(format!("Tenant not found: {segment}")).into_anyhow()
                })?;
            debug!(panel = %self.panel.id, tenant = %tenant.id, step = "route", "resolved tenant");
            // Access check deferred to the caller; pointer persisted there too.
            return Ok(TenantContext::new(&self.panel, Some(tenant)));
        }

        let key = active_tenant_key(&self.panel.id);
        if let Some(pointer) = self.session.get(user.id(), &key).await? {
            let tenant = self.tenants.get(&TenantId(pointer)).await?;
            match tenant {
                Some(tenant) if aware.can_access_tenant(&tenant).await? => {
                    debug!(panel = %self.panel.id, tenant = %tenant.id, step = "session", "resolved tenant");
                    return self.finish(user.id(), tenant).await;
                }
                _ => {
                    // Stale pointer: tenant gone or no longer accessible.
                    // Discard silently and keep resolving.
                    debug!(panel = %self.panel.id, user = %user.id(), "discarding stale session tenant pointer");
                    self.session.remove(user.id(), &key).await?;
                }
            }
        }

        if let Some(default_aware) = user.default_tenant_aware() {
            if let Some(tenant) = default_aware.default_tenant(&self.panel).await? {
                debug!(panel = %self.panel.id, tenant = %tenant.id, step = "default", "resolved tenant");
                return self.finish(user.id(), tenant).await;
            }
        }

        let mut accessible = aware.tenants(&self.panel).await?;
        if !accessible.is_empty() {
            // First in store enumeration order; no business meaning implied.
            let tenant = accessible.remove(0);
            debug!(panel = %self.panel.id, tenant = %tenant.id, step = "first", "resolved tenant");
            return self.finish(user.id(), tenant).await;
        }

        debug!(panel = %self.panel.id, user = %user.id(), step = "none", "no tenant resolved");
        Ok(TenantContext::new(&self.panel, None))
    }

    /// Delegated access check. Users without the capability cannot access
    /// any tenant.
    pub async fn can_access(&self, user: &dyn PanelUser, tenant: &Tenant) -> AtriumResult<bool> {
        match user.tenant_aware() {
            Some(aware) => aware.can_access_tenant(tenant).await,
            None => Ok(false),
        }
    }

    /// Persist the resolved tenant as the session pointer.
    pub async fn remember(&self, user: &UserId, tenant: &Tenant) -> AtriumResult<()> {
        let key = active_tenant_key(&self.panel.id);
        self.session.set(user, &key, tenant.id.0.clone()).await
    }

    /// Clear the session pointer for this panel.
    pub async fn forget(&self, user: &UserId) -> AtriumResult<()> {
        let key = active_tenant_key(&self.panel.id);
        self.session.remove(user, &key).await
    }

    async fn finish(&self, user: &UserId, tenant: Tenant) -> AtriumResult<TenantContext> {
        self.remember(user, &tenant).await?;
        Ok(TenantContext::new(&self.panel, Some(tenant)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::{MemberRole, Membership};
    use crate::panel::TenancyConfig;
    use crate::store::memory::{MemoryMembershipStore, MemoryTenantStore};
    use crate::store::{MembershipStore, TenantStore};
    use crate::user::MembershipUser;

    struct PlainUser(UserId);

    impl PanelUser for PlainUser {
        fn id(&self) -> &UserId {
            &self.0
        }
    }

    fn panel() -> Panel {
        Panel::new("admin", "/admin").with_tenancy(TenancyConfig::new())
    }

    async fn seed(
        tenants: &MemoryTenantStore,
        memberships: &MemoryMembershipStore,
        name: &str,
        slug: &str,
        user: &UserId,
    ) -> Tenant {
        let tenant = tenants
            .insert(Tenant::new(name, slug, Some(user.clone())))
            .await
            .unwrap();
        memberships
            .insert(Membership::new(tenant.id.clone(), user.clone(), MemberRole::Owner))
            .await
            .unwrap();
        tenant
    }

    #[test]
    fn route_hint_extraction() {
        let panel = panel();
        assert_eq!(
            RouteHint::from_request_path(&panel, "/admin/acme/posts").tenant_segment,
            Some("acme".to_string())
        );
        assert_eq!(
            RouteHint::from_request_path(&panel, "/admin/tenant/switch").tenant_segment,
            None
        );
        assert_eq!(RouteHint::from_request_path(&panel, "/admin").tenant_segment, None);
        assert_eq!(RouteHint::from_request_path(&panel, "/other").tenant_segment, None);
    }

    #[tokio::test]
    async fn stale_pointer_is_discarded_and_resolution_continues() {
        let tenants = Arc::new(MemoryTenantStore::new());
        let memberships = Arc::new(MemoryMembershipStore::new());
        let session = Arc::new(crate::session::MemorySessionStore::new());
        let user_id = UserId("u1".into());

        let mine = seed(&tenants, &memberships, "Mine", "mine", &user_id).await;
        let other = tenants
            .insert(Tenant::new("Other", "other", Some(UserId("u2".into()))))
            .await
            .unwrap();

        // Pointer names a tenant the user cannot access.
        let key = active_tenant_key(&panel().id);
        session.set(&user_id, &key, other.id.0.clone()).await.unwrap();

        let resolver = TenantResolver::new(panel(), tenants.clone(), session.clone());
        let user = MembershipUser::new(user_id.clone(), tenants, memberships);

        let ctx = resolver.resolve(&RouteHint::none(), &user).await.unwrap();
        assert_eq!(ctx.active_id(), Some(&mine.id));

        // Pointer was repaired to the resolved tenant.
        assert_eq!(
            session.get(&user_id, &key).await.unwrap(),
            Some(mine.id.0.clone())
        );
    }

    #[tokio::test]
    async fn resolution_is_idempotent() {
        let tenants = Arc::new(MemoryTenantStore::new());
        let memberships = Arc::new(MemoryMembershipStore::new());
        let session = Arc::new(crate::session::MemorySessionStore::new());
        let user_id = UserId("u1".into());

        seed(&tenants, &memberships, "First", "first", &user_id).await;
        seed(&tenants, &memberships, "Second", "second", &user_id).await;

        let resolver = TenantResolver::new(panel(), tenants.clone(), session);
        let user = MembershipUser::new(user_id, tenants, memberships);

        let first = resolver.resolve(&RouteHint::none(), &user).await.unwrap();
        let second = resolver.resolve(&RouteHint::none(), &user).await.unwrap();
        assert_eq!(first.active_id(), second.active_id());
    }

    #[tokio::test]
    async fn user_without_capability_degrades_to_no_tenant() {
        let tenants = Arc::new(MemoryTenantStore::new());
        let session = Arc::new(crate::session::MemorySessionStore::new());
        let resolver = TenantResolver::new(panel(), tenants, session);

        let user = PlainUser(UserId("u1".into()));
        let ctx = resolver.resolve(&RouteHint::none(), &user).await.unwrap();
        assert!(!ctx.tenancy_enabled());
        assert!(ctx.active().is_none());
    }

    #[tokio::test]
    async fn zero_tenants_resolves_to_none() {
        let tenants = Arc::new(MemoryTenantStore::new());
        let memberships = Arc::new(MemoryMembershipStore::new());
        let session = Arc::new(crate::session::MemorySessionStore::new());

        let resolver = TenantResolver::new(panel(), tenants.clone(), session);
        let user = MembershipUser::new(UserId("u1".into()), tenants, memberships);

        let ctx = resolver.resolve(&RouteHint::none(), &user).await.unwrap();
        assert!(ctx.tenancy_enabled());
        assert!(ctx.active().is_none());
    }
}
