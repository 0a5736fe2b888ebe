//! Core tenant types for atrium.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::user::UserId;

/// An opaque, unique tenant identifier (UUID v4 text).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub String);

impl TenantId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An isolated customer/organization unit.
///
/// The owner is structurally distinguished two ways: the `owner_id` field
/// here, or an `Owner` membership role. `owner_id` wins when both are set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    /// Unique within the tenant store; how a tenant is addressed in URLs.
    pub slug: String,
    pub owner_id: Option<UserId>,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    pub fn new(name: impl Into<String>, slug: impl Into<String>, owner: Option<UserId>) -> Self {
        Self {
            id: TenantId::generate(),
            name: name.into(),
            slug: slug.into(),
            owner_id: owner,
            avatar: None,
            created_at: Utc::now(),
        }
    }
}

/// Wire shape for the tenant list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantSummary {
    pub id: TenantId,
    pub name: String,
    pub slug: String,
    pub avatar: Option<String>,
    pub url: String,
    pub is_current: bool,
}

impl TenantSummary {
    pub fn from_tenant(tenant: &Tenant, panel_path: &str, is_current: bool) -> Self {
        Self {
            id: tenant.id.clone(),
            name: tenant.name.clone(),
            slug: tenant.slug.clone(),
            avatar: tenant.avatar.clone(),
            url: format!("{}/{}", panel_path.trim_end_matches('/'), tenant.slug),
            is_current,
        }
    }
}

/// Derive a URL slug from a display name: lowercase, alphanumeric runs
/// joined by single hyphens. Falls back to "tenant" for names with no
/// usable characters so the numeric-suffix pass always has a base.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_hyphen = true;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_hyphen = false;
        } else if !last_hyphen {
            slug.push('-');
            last_hyphen = true;
        }
    }

    while slug.ends_with('-') {
        slug.pop();
    }

    if slug.is_empty() {
        "tenant".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_basic() {
        assert_eq!(slugify("Acme"), "acme");
        assert_eq!(slugify("Acme Corp"), "acme-corp");
        assert_eq!(slugify("  Acme -- Corp!  "), "acme-corp");
    }

    #[test]
    fn slugify_degenerate_names_fall_back() {
        assert_eq!(slugify("!!!"), "tenant");
        assert_eq!(slugify(""), "tenant");
    }

    #[test]
    fn summary_url_joins_panel_path_and_slug() {
        let t = Tenant::new("Acme", "acme", None);
        let s = TenantSummary::from_tenant(&t, "/admin/", true);
        assert_eq!(s.url, "/admin/acme");
        assert!(s.is_current);
    }
}
