use std::sync::Arc;

use atrium_core::{
    MembershipStore, MembershipUser, Panel, SessionStore, TenancyService, TenantResolver,
    TenantStore, UserDirectory, UserId,
};

/// Router state for one panel's tenancy surface.
pub struct TenancyState {
    pub panel: Panel,
    pub service: Arc<TenancyService>,
    pub resolver: Arc<TenantResolver>,
    tenants: Arc<dyn TenantStore>,
    memberships: Arc<dyn MembershipStore>,
}

impl Clone for TenancyState {
    fn clone(&self) -> Self {
        Self {
            panel: self.panel.clone(),
            service: Arc::clone(&self.service),
            resolver: Arc::clone(&self.resolver),
            tenants: Arc::clone(&self.tenants),
            memberships: Arc::clone(&self.memberships),
        }
    }
}

impl TenancyState {
    pub fn new(
        panel: Panel,
        tenants: Arc<dyn TenantStore>,
        memberships: Arc<dyn MembershipStore>,
        directory: Arc<dyn UserDirectory>,
        session: Arc<dyn SessionStore>,
    ) -> Self {
        let service = Arc::new(TenancyService::new(
            panel.clone(),
            Arc::clone(&tenants),
            Arc::clone(&memberships),
            directory,
            Arc::clone(&session),
        ));
        let resolver = Arc::new(TenantResolver::new(
            panel.clone(),
            Arc::clone(&tenants),
            session,
        ));

        Self {
            panel,
            service,
            resolver,
            tenants,
            memberships,
        }
    }

    /// The standard membership-backed user for a session identity.
    pub fn user(&self, id: UserId) -> MembershipUser {
        MembershipUser::new(id, Arc::clone(&self.tenants), Arc::clone(&self.memberships))
    }
}
