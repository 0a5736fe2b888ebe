//! Tenant lifecycle operations: create, switch, list, rename, membership
//! management, delete.
//!
//! Validation and authorization failures come back as field-attached
//! `Unprocessable`/`Forbidden`/`NotFound` errors so transports can surface
//! them next to the relevant input with prior page state preserved. No
//! operation mutates state before its checks pass.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::context::TenantContext;
use crate::errors::{AtriumError, AtriumResult};
use crate::membership::{MemberRole, Membership};
use crate::panel::Panel;
use crate::resolver::lookup_tenant;
use crate::session::{active_tenant_key, SessionStore};
use crate::store::{MembershipStore, TenantStore, UserDirectory};
use crate::tenant::{slugify, Tenant, TenantId, TenantSummary};
use crate::user::{PanelUser, UserId};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTenant {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenameTenant {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InviteMember {
    pub email: String,
    pub role: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateMemberRole {
    pub role: String,
}

/// Result of the list operation: which tenant is active, plus everything
/// the user can switch to.
#[derive(Debug, Clone, Serialize)]
pub struct TenantList {
    pub current: Option<TenantSummary>,
    pub tenants: Vec<TenantSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberView {
    pub user_id: UserId,
    pub role: MemberRole,
    pub is_owner: bool,
    pub joined_at: DateTime<Utc>,
}

/// Flags the settings view renders; all owner-gated today.
#[derive(Debug, Clone, Serialize)]
pub struct SettingsPermissions {
    pub can_rename: bool,
    pub can_invite: bool,
    pub can_manage_members: bool,
    pub can_delete: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TenantSettings {
    pub tenant: TenantSummary,
    pub members: Vec<MemberView>,
    pub permissions: SettingsPermissions,
}

#[derive(Debug, Clone)]
pub struct RemovedMember {
    pub user_id: UserId,
    /// The member removed themself; the caller redirects them away and the
    /// session pointer has already been cleared.
    pub removed_self: bool,
}

/// The tenant lifecycle controller.
pub struct TenancyService {
    panel: Panel,
    tenants: Arc<dyn TenantStore>,
    memberships: Arc<dyn MembershipStore>,
    directory: Arc<dyn UserDirectory>,
    session: Arc<dyn SessionStore>,
}

impl TenancyService {
    pub fn new(
        panel: Panel,
        tenants: Arc<dyn TenantStore>,
        memberships: Arc<dyn MembershipStore>,
        directory: Arc<dyn UserDirectory>,
        session: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            panel,
            tenants,
            memberships,
            directory,
            session,
        }
    }

    pub fn panel(&self) -> &Panel {
        &self.panel
    }

    /// Create a tenant, attach the creator as owner, and activate it.
    pub async fn create(
        &self,
        user: &dyn PanelUser,
        input: CreateTenant,
    ) -> AtriumResult<(Tenant, TenantContext)> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(AtriumError::unprocessable("A team name is required")
                .field_error("name", "required")
                .into_anyhow());
        }

        let base = match input.slug.as_deref().map(str::trim) {
            Some(slug) if !slug.is_empty() => {
                if slugify(slug) != slug {
                    return Err(AtriumError::unprocessable("Invalid slug")
                        .field_error(
                            "slug",
                            "may only contain lowercase letters, numbers and hyphens",
                        )
                        .into_anyhow());
                }
                slug.to_string()
            }
            _ => slugify(name),
        };

        let slug = self.unique_slug(&base).await?;
        let tenant = self
            .tenants
            .insert(Tenant::new(name, slug, Some(user.id().clone())))
            .await?;

        // Owner is recorded both ways: the owner reference above and an
        // explicit owner membership row.
        self.memberships
            .insert(Membership::new(
                tenant.id.clone(),
                user.id().clone(),
                MemberRole::Owner,
            ))
            .await?;

        self.set_pointer(user.id(), &tenant).await?;
        info!(panel = %self.panel.id, tenant = %tenant.id, slug = %tenant.slug, "tenant created");

        let ctx = TenantContext::new(&self.panel, Some(tenant.clone()));
        Ok((tenant, ctx))
    }

    /// Switch the active tenant. Rejected without membership; the current
    /// context is left untouched in that case.
    pub async fn switch(
        &self,
        user: &dyn PanelUser,
        target: &str,
    ) -> AtriumResult<TenantContext> {
        let tenant = lookup_tenant(self.tenants.as_ref(), &self.panel, target)
            .await?
            .ok_or_else(|| {
                AtriumError::not_found("Team not found")
                    .field_error("tenant", "not found")
                    .into_anyhow()
            })?;

        if !self.user_can_access(user, &tenant).await? {
            return Err(AtriumError::forbidden("You do not have access to this team")
                .field_error("tenant", "You do not have access to this team")
                .into_anyhow());
        }

        self.set_pointer(user.id(), &tenant).await?;
        info!(panel = %self.panel.id, tenant = %tenant.id, user = %user.id(), "tenant switched");
        Ok(TenantContext::new(&self.panel, Some(tenant)))
    }

    /// All tenants accessible to the user, plus which one is active.
    /// Read-only; no side effects.
    pub async fn list(
        &self,
        user: &dyn PanelUser,
        active: Option<&TenantId>,
    ) -> AtriumResult<TenantList> {
        let accessible = match user.tenant_aware() {
            Some(aware) => aware.tenants(&self.panel).await?,
            None => Vec::new(),
        };

        let tenants: Vec<TenantSummary> = accessible
            .iter()
            .map(|t| TenantSummary::from_tenant(t, &self.panel.path, Some(&t.id) == active))
            .collect();
        let current = tenants.iter().find(|t| t.is_current).cloned();

        Ok(TenantList { current, tenants })
    }

    /// Settings view for the active tenant: team info, members, what the
    /// caller may do.
    pub async fn settings(
        &self,
        user: &dyn PanelUser,
        tenant_id: &TenantId,
    ) -> AtriumResult<TenantSettings> {
        let tenant = self.load(tenant_id).await?;
        let is_owner = self.is_owner(&tenant, user.id()).await?;

        let mut members = Vec::new();
        for membership in self.memberships.for_tenant(&tenant.id).await? {
            let member_is_owner = self.is_owner(&tenant, &membership.user_id).await?;
            members.push(MemberView {
                user_id: membership.user_id,
                role: membership.role,
                is_owner: member_is_owner,
                joined_at: membership.joined_at,
            });
        }

        Ok(TenantSettings {
            tenant: TenantSummary::from_tenant(&tenant, &self.panel.path, true),
            members,
            permissions: SettingsPermissions {
                can_rename: is_owner,
                can_invite: is_owner,
                can_manage_members: is_owner,
                can_delete: is_owner,
            },
        })
    }

    /// Rename the tenant. Owner only.
    pub async fn rename(
        &self,
        user: &dyn PanelUser,
        tenant_id: &TenantId,
        input: RenameTenant,
    ) -> AtriumResult<Tenant> {
        let mut tenant = self.load(tenant_id).await?;
        self.require_owner(&tenant, user.id()).await?;

        let name = input.name.trim();
        if name.is_empty() {
            return Err(AtriumError::unprocessable("A team name is required")
                .field_error("name", "required")
                .into_anyhow());
        }

        tenant.name = name.to_string();
        let tenant = self.tenants.update(tenant).await?;
        info!(panel = %self.panel.id, tenant = %tenant.id, "tenant renamed");
        Ok(tenant)
    }

    /// Invite a user by contact identifier. Owner only.
    pub async fn invite(
        &self,
        user: &dyn PanelUser,
        tenant_id: &TenantId,
        input: InviteMember,
    ) -> AtriumResult<Membership> {
        let tenant = self.load(tenant_id).await?;
        self.require_owner(&tenant, user.id()).await?;

        let email = input.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(AtriumError::unprocessable("A valid email address is required")
                .field_error("email", "must be a valid email address")
                .into_anyhow());
        }

        let role = MemberRole::parse(&input.role).ok_or_else(|| {
            AtriumError::unprocessable(format!("Unknown role: {}", input.role))
                .field_error("role", "unknown role")
                .into_anyhow()
        })?;
        if role == MemberRole::Owner {
            return Err(AtriumError::unprocessable("A team already has an owner")
                .field_error("role", "a team already has an owner")
                .into_anyhow());
        }

        let invited = self
            .directory
            .find_by_email(email)
            .await?
            .ok_or_else(|| {
                AtriumError::not_found("No user with that email address")
                    .field_error("email", "no user with that email address")
                    .into_anyhow()
            })?;

        if self.is_owner(&tenant, &invited).await?
            || self.memberships.get(&tenant.id, &invited).await?.is_some()
        {
            return Err(AtriumError::conflict("Already a member of this team")
                .field_error("email", "already a member of this team")
                .into_anyhow());
        }

        let membership = self
            .memberships
            .insert(Membership::new(tenant.id.clone(), invited, role))
            .await?;
        info!(panel = %self.panel.id, tenant = %tenant.id, member = %membership.user_id, role = membership.role.as_str(), "member invited");
        Ok(membership)
    }

    /// Change a member's role. Owner only; the owner's own role is fixed.
    pub async fn update_member_role(
        &self,
        user: &dyn PanelUser,
        tenant_id: &TenantId,
        member: &UserId,
        input: UpdateMemberRole,
    ) -> AtriumResult<Membership> {
        let tenant = self.load(tenant_id).await?;
        self.require_owner(&tenant, user.id()).await?;

        if self.memberships.get(&tenant.id, member).await?.is_none() {
            return Err(AtriumError::not_found("Member not found")
                .field_error("member", "not found")
                .into_anyhow());
        }
        if self.is_owner(&tenant, member).await? {
            return Err(AtriumError::forbidden("The team owner's role cannot be changed")
                .field_error("member", "the team owner's role cannot be changed")
                .into_anyhow());
        }

        let role = MemberRole::parse(&input.role).ok_or_else(|| {
            AtriumError::unprocessable(format!("Unknown role: {}", input.role))
                .field_error("role", "unknown role")
                .into_anyhow()
        })?;
        if role == MemberRole::Owner {
            return Err(AtriumError::unprocessable("A team already has an owner")
                .field_error("role", "a team already has an owner")
                .into_anyhow());
        }

        let membership = self.memberships.update_role(&tenant.id, member, role).await?;
        info!(panel = %self.panel.id, tenant = %tenant.id, member = %member, role = role.as_str(), "member role updated");
        Ok(membership)
    }

    /// Remove a member: the owner may remove anyone but themself; a member
    /// may remove themself. Removing the owner is always rejected.
    pub async fn remove_member(
        &self,
        user: &dyn PanelUser,
        tenant_id: &TenantId,
        member: &UserId,
    ) -> AtriumResult<RemovedMember> {
        let tenant = self.load(tenant_id).await?;

        if self.is_owner(&tenant, member).await? {
            return Err(AtriumError::forbidden("The team owner cannot be removed")
                .field_error("member", "the team owner cannot be removed")
                .into_anyhow());
        }

        let removing_self = user.id() == member;
        if !removing_self {
            self.require_owner(&tenant, user.id()).await?;
        }

        if self.memberships.get(&tenant.id, member).await?.is_none() {
            return Err(AtriumError::not_found("Member not found")
                .field_error("member", "not found")
                .into_anyhow());
        }

        self.memberships.remove(&tenant.id, member).await?;
        if removing_self {
            self.clear_pointer(member).await?;
        }
        info!(panel = %self.panel.id, tenant = %tenant.id, member = %member, removed_self = removing_self, "member removed");

        Ok(RemovedMember {
            user_id: member.clone(),
            removed_self: removing_self,
        })
    }

    /// Delete the tenant. Owner only. The session pointer is cleared before
    /// the record goes away; cascade deletion of tenant-scoped entities is
    /// the storage layer's own responsibility.
    pub async fn delete(&self, user: &dyn PanelUser, tenant_id: &TenantId) -> AtriumResult<()> {
        let tenant = self.load(tenant_id).await?;
        self.require_owner(&tenant, user.id()).await?;

        self.clear_pointer(user.id()).await?;
        self.memberships.remove_for_tenant(&tenant.id).await?;
        self.tenants.delete(&tenant.id).await?;
        info!(panel = %self.panel.id, tenant = %tenant.id, "tenant deleted");
        Ok(())
    }

    // ---- internals ----

    async fn load(&self, id: &TenantId) -> AtriumResult<Tenant> {
        self.tenants
            .get(id)
            .await?
            .ok_or_else(|| AtriumError::not_found("Team not found").into_anyhow())
    }

    /// Owner check: the owner reference field wins; an `Owner` membership
    /// role is the fallback representation.
    async fn is_owner(&self, tenant: &Tenant, user: &UserId) -> AtriumResult<bool> {
        if let Some(owner) = &tenant.owner_id {
            return Ok(owner == user);
        }
        Ok(self
            .memberships
            .get(&tenant.id, user)
            .await?
            .map(|m| m.role == MemberRole::Owner)
            .unwrap_or(false))
    }

    async fn require_owner(&self, tenant: &Tenant, user: &UserId) -> AtriumResult<()> {
        if self.is_owner(tenant, user).await? {
            Ok(())
        } else {
            Err(AtriumError::forbidden("Only the team owner can do this").into_anyhow())
        }
    }

    async fn user_can_access(
        &self,
        user: &dyn PanelUser,
        tenant: &Tenant,
    ) -> AtriumResult<bool> {
        match user.tenant_aware() {
            Some(aware) => aware.can_access_tenant(tenant).await,
            None => Ok(false),
        }
    }

    async fn unique_slug(&self, base: &str) -> AtriumResult<String> {
        if !self.tenants.slug_exists(base).await? {
            return Ok(base.to_string());
        }
        let mut suffix = 1u32;
        loop {
            let candidate = format!("{base}-{suffix}");
            if !self.tenants.slug_exists(&candidate).await? {
                return Ok(candidate);
            }
            suffix += 1;
        }
    }

    async fn set_pointer(&self, user: &UserId, tenant: &Tenant) -> AtriumResult<()> {
        let key = active_tenant_key(&self.panel.id);
        self.session.set(user, &key, tenant.id.0.clone()).await
    }

    async fn clear_pointer(&self, user: &UserId) -> AtriumResult<()> {
        let key = active_tenant_key(&self.panel.id);
        self.session.remove(user, &key).await
    }
}
