//! Panels and their tenancy configuration.
//!
//! An application may expose more than one administrative surface. Each
//! `Panel` owns its tenancy configuration as a separate composed value
//! rather than mixing every concern into one object. The `PanelRegistry`
//! is an explicit value constructed at startup and passed as a parameter;
//! there is no ambient global to reset between requests.

use serde::{Deserialize, Serialize};

/// Identifies a configured panel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PanelId(pub String);

impl PanelId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PanelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How tenant isolation is applied for a panel.
///
/// `RowScoped`: all tenants share one storage schema; every query against a
/// tenant-scoped entity gains an implicit `tenant_id` equality filter, and
/// creations have the column injected.
///
/// `ConnectionSwitched`: each tenant's data lives behind its own storage
/// endpoint; isolation is routing, not filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenancyMode {
    #[default]
    RowScoped,
    ConnectionSwitched,
}

/// Per-panel tenancy configuration.
#[derive(Debug, Clone)]
pub struct TenancyConfig {
    pub mode: TenancyMode,
    /// The attribute tenants are addressed by in URLs. `None` means tenants
    /// are addressed by their opaque id only.
    pub slug_attribute: Option<String>,
    /// Name of the ownership relationship on the tenant model.
    pub ownership_relationship: String,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            mode: TenancyMode::default(),
            slug_attribute: Some("slug".to_string()),
            ownership_relationship: "owner".to_string(),
        }
    }
}

impl TenancyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(mut self, mode: TenancyMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn slug_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.slug_attribute = Some(attribute.into());
        self
    }

    /// Address tenants by id instead of a human-readable slug.
    pub fn address_by_id(mut self) -> Self {
        self.slug_attribute = None;
        self
    }

    pub fn ownership_relationship(mut self, name: impl Into<String>) -> Self {
        self.ownership_relationship = name.into();
        self
    }
}

/// A configured panel: identifier, URL path prefix, optional tenancy.
#[derive(Debug, Clone)]
pub struct Panel {
    pub id: PanelId,
    /// URL path prefix, e.g. "/admin".
    pub path: String,
    pub tenancy: Option<TenancyConfig>,
}

impl Panel {
    pub fn new(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: PanelId(id.into()),
            path: path.into(),
            tenancy: None,
        }
    }

    pub fn with_tenancy(mut self, config: TenancyConfig) -> Self {
        self.tenancy = Some(config);
        self
    }

    pub fn tenancy_enabled(&self) -> bool {
        self.tenancy.is_some()
    }

    /// The isolation mode for this panel. A missing configuration value
    /// defaults deterministically to row-scoped.
    pub fn tenancy_mode(&self) -> TenancyMode {
        self.tenancy
            .as_ref()
            .map(|t| t.mode)
            .unwrap_or_default()
    }

    pub fn slug_attribute(&self) -> Option<&str> {
        self.tenancy
            .as_ref()
            .and_then(|t| t.slug_attribute.as_deref())
    }
}

/// Holds the set of configured panels. Pure configuration store; no request
/// logic lives here.
#[derive(Default)]
pub struct PanelRegistry {
    panels: Vec<Panel>,
}

impl PanelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, panel: Panel) -> Self {
        self.panels.push(panel);
        self
    }

    pub fn get(&self, id: &PanelId) -> Option<&Panel> {
        self.panels.iter().find(|p| &p.id == id)
    }

    /// Identify the active panel for a request path: the registered panel
    /// with the longest matching path prefix.
    pub fn panel_for_path(&self, path: &str) -> Option<&Panel> {
        self.panels
            .iter()
            .filter(|p| {
                let prefix = p.path.trim_end_matches('/');
                path == prefix || path.starts_with(&format!("{prefix}/"))
            })
            .max_by_key(|p| p.path.trim_end_matches('/').len())
    }

    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_defaults_to_row_scoped() {
        let panel = Panel::new("admin", "/admin");
        assert!(!panel.tenancy_enabled());
        assert_eq!(panel.tenancy_mode(), TenancyMode::RowScoped);

        let panel = panel.with_tenancy(TenancyConfig::new());
        assert!(panel.tenancy_enabled());
        assert_eq!(panel.tenancy_mode(), TenancyMode::RowScoped);
    }

    #[test]
    fn tenancy_config_builder() {
        let cfg = TenancyConfig::new()
            .mode(TenancyMode::ConnectionSwitched)
            .slug_attribute("domain")
            .ownership_relationship("account");
        assert_eq!(cfg.mode, TenancyMode::ConnectionSwitched);
        assert_eq!(cfg.slug_attribute.as_deref(), Some("domain"));
        assert_eq!(cfg.ownership_relationship, "account");

        let cfg = TenancyConfig::new().address_by_id();
        assert!(cfg.slug_attribute.is_none());
    }

    #[test]
    fn registry_matches_longest_prefix() {
        let registry = PanelRegistry::new()
            .register(Panel::new("admin", "/admin"))
            .register(Panel::new("ops", "/admin/ops"));

        assert_eq!(
            registry.panel_for_path("/admin/ops/tenant").unwrap().id,
            PanelId("ops".into())
        );
        assert_eq!(
            registry.panel_for_path("/admin/tenant").unwrap().id,
            PanelId("admin".into())
        );
        assert!(registry.panel_for_path("/app").is_none());
    }
}
