//! atrium-core: framework-agnostic multi-tenancy engine for Atrium panels.
//!
//! For every request the engine determines which tenant the request belongs
//! to, publishes it as a request-scoped [`TenantContext`], and confines all
//! tenant-scoped reads and writes to that tenant's data, behind one
//! [`ScopedStore`] API covering both isolation strategies (shared-schema
//! row scoping and per-tenant connection switching).

pub mod context;
pub mod errors;
pub mod lifecycle;
pub mod membership;
pub mod panel;
pub mod resolver;
pub mod scope;
pub mod session;
pub mod store;
pub mod tenant;
pub mod user;

pub use context::TenantContext;
pub use errors::{AtriumError, AtriumResult, ErrorKind};
pub use lifecycle::{
    CreateTenant, InviteMember, MemberView, RemovedMember, RenameTenant, SettingsPermissions,
    TenancyService, TenantList, TenantSettings, UpdateMemberRole,
};
pub use membership::{MemberRole, Membership};
pub use panel::{Panel, PanelId, PanelRegistry, TenancyConfig, TenancyMode};
pub use resolver::{lookup_tenant, RouteHint, TenantResolver};
pub use scope::{
    ConnectionSwitchedStore, EndpointRegistry, RowScopedStore, ScopedStore, TENANT_FIELD,
};
pub use session::{active_tenant_key, MemorySessionStore, SessionStore};
pub use store::{MembershipStore, RecordStore, TenantStore, UserDirectory};
pub use tenant::{slugify, Tenant, TenantId, TenantSummary};
pub use user::{DefaultTenantAware, MembershipUser, PanelUser, TenantAware, UserId};
