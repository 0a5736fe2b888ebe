//! Membership: the association of a user to a tenant, carrying a role.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tenant::TenantId;
use crate::user::UserId;

/// The role a membership carries.
///
/// `Owner` is special: exclusive rights to rename, delete, and manage
/// membership of a tenant, and it can never be removed through the member
/// removal operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Owner,
    Admin,
    Editor,
    Member,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Owner => "owner",
            MemberRole::Admin => "admin",
            MemberRole::Editor => "editor",
            MemberRole::Member => "member",
        }
    }

    /// Parse a role from wire input. Unknown values are a validation error
    /// at the caller, so this returns `None` rather than defaulting.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "owner" => Some(MemberRole::Owner),
            "admin" => Some(MemberRole::Admin),
            "editor" => Some(MemberRole::Editor),
            "member" => Some(MemberRole::Member),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

impl Membership {
    pub fn new(tenant_id: TenantId, user_id: UserId, role: MemberRole) -> Self {
        Self {
            tenant_id,
            user_id,
            role,
            joined_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parse_is_case_insensitive() {
        assert_eq!(MemberRole::parse("Editor"), Some(MemberRole::Editor));
        assert_eq!(MemberRole::parse(" OWNER "), Some(MemberRole::Owner));
        assert_eq!(MemberRole::parse("superuser"), None);
    }
}
