//! The request-scoped tenant context.
//!
//! A `TenantContext` is built once per request by the resolver and passed
//! by reference to everything that needs it. It is an owned, request-lifetime
//! value, never a long-lived singleton that has to be reset between
//! requests.

use crate::errors::{AtriumError, AtriumResult};
use crate::panel::{Panel, PanelId, TenancyMode};
use crate::tenant::{Tenant, TenantId};

/// Exactly one active tenant, or none, for the current request.
#[derive(Debug, Clone)]
pub struct TenantContext {
    panel_id: PanelId,
    mode: TenancyMode,
    enabled: bool,
    tenant: Option<Tenant>,
}

impl TenantContext {
    /// Context for a panel with tenancy enabled and the given resolution
    /// result.
    pub fn new(panel: &Panel, tenant: Option<Tenant>) -> Self {
        Self {
            panel_id: panel.id.clone(),
            mode: panel.tenancy_mode(),
            enabled: panel.tenancy_enabled(),
            tenant,
        }
    }

    /// Context for a request where tenancy does not apply: the panel has it
    /// disabled, or the user type has no tenancy capability.
    pub fn disabled(panel_id: PanelId) -> Self {
        Self {
            panel_id,
            mode: TenancyMode::default(),
            enabled: false,
            tenant: None,
        }
    }

    pub fn panel_id(&self) -> &PanelId {
        &self.panel_id
    }

    pub fn mode(&self) -> TenancyMode {
        self.mode
    }

    pub fn tenancy_enabled(&self) -> bool {
        self.enabled
    }

    pub fn active(&self) -> Option<&Tenant> {
        self.tenant.as_ref()
    }

    pub fn active_id(&self) -> Option<&TenantId> {
        self.tenant.as_ref().map(|t| &t.id)
    }

    /// The active tenant, or the fatal isolation error when a tenant-scoped
    /// operation runs without one. Callers must not guess a default.
    pub fn require_active(&self) -> AtriumResult<&Tenant> {
        self.tenant.as_ref().ok_or_else(|| {
            AtriumError::isolation_missing(format!(
                "No active tenant for panel '{}'; refusing tenant-scoped operation",
                self.panel_id
            ))
            .into_anyhow()
        })
    }
}
