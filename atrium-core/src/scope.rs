//! Data access scoping for tenant-scoped entities.
//!
//! One `ScopedStore` API, two strategies selected by the panel's tenancy
//! mode:
//!
//! - [`RowScopedStore`]: all tenants share one record store; every read
//!   gains an implicit `tenant_id` equality filter and creations have the
//!   column injected when absent.
//! - [`ConnectionSwitchedStore`]: each tenant's records live behind a
//!   distinct endpoint; operations route to the active tenant's endpoint
//!   and carry no filter. Other tenants' data is not reachable through
//!   that endpoint at all.
//!
//! Both strategies fail fast with `IsolationContextMissing` when the panel
//! has tenancy enabled but no tenant is active. There is no silent fallback
//! to a default or shared endpoint.
//!
//! `find_unscoped` is the explicit escape hatch for cross-tenant admin
//! tooling; it is never the default path.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::warn;

use crate::context::TenantContext;
use crate::errors::{AtriumError, AtriumResult};
use crate::store::RecordStore;
use crate::tenant::{Tenant, TenantId};

/// The tenant-identifier column on row-scoped entities.
pub const TENANT_FIELD: &str = "tenant_id";

/// Read/write surface for one tenant-scoped entity type.
#[async_trait]
pub trait ScopedStore: Send + Sync {
    async fn find(&self, ctx: &TenantContext) -> AtriumResult<Vec<Value>>;
    async fn get(&self, ctx: &TenantContext, id: &str) -> AtriumResult<Value>;
    async fn create(&self, ctx: &TenantContext, data: Value) -> AtriumResult<Value>;
    async fn update(&self, ctx: &TenantContext, id: &str, data: Value) -> AtriumResult<Value>;
    async fn remove(&self, ctx: &TenantContext, id: &str) -> AtriumResult<Value>;

    /// Cross-tenant read for administrative tooling. Explicit by name;
    /// never the default.
    async fn find_unscoped(&self) -> AtriumResult<Vec<Value>>;
}

fn record_tenant(record: &Value) -> Option<&str> {
    record.get(TENANT_FIELD).and_then(|v| v.as_str())
}

/// Shared-schema strategy: implicit `tenant_id` filter + default-value
/// injection.
pub struct RowScopedStore {
    records: Arc<dyn RecordStore>,
}

impl RowScopedStore {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self { records }
    }

    /// The tenant to scope by, or `None` when the panel has tenancy
    /// disabled (pass-through). Tenancy enabled with nothing resolved is
    /// the fatal case.
    fn scope<'a>(&self, ctx: &'a TenantContext) -> AtriumResult<Option<&'a Tenant>> {
        if !ctx.tenancy_enabled() {
            return Ok(None);
        }
        ctx.require_active().map(Some)
    }

    fn owned_by(record: &Value, tenant: &Tenant) -> bool {
        record_tenant(record) == Some(tenant.id.as_str())
    }
}

#[async_trait]
impl ScopedStore for RowScopedStore {
    async fn find(&self, ctx: &TenantContext) -> AtriumResult<Vec<Value>> {
        let records = self.records.find_all().await?;
        match self.scope(ctx)? {
            Some(tenant) => Ok(records
                .into_iter()
                .filter(|r| Self::owned_by(r, tenant))
                .collect()),
            None => Ok(records),
        }
    }

    async fn get(&self, ctx: &TenantContext, id: &str) -> AtriumResult<Value> {
        let record = self
            .records
            .get(id)
            .await?
            .ok_or_else(|| AtriumError::not_found(format!("Record not found: {id}")).into_anyhow())?;

        if let Some(tenant) = self.scope(ctx)? {
            // Another tenant's record is indistinguishable from a missing one.
            if !Self::owned_by(&record, tenant) {
                return Err(
                    AtriumError::not_found(format!("Record not found: {id}")).into_anyhow()
                );
            }
        }
        Ok(record)
    }

    async fn create(&self, ctx: &TenantContext, mut data: Value) -> AtriumResult<Value> {
        if !data.is_object() {
            return Err(AtriumError::bad_request("Record must be a JSON object").into_anyhow());
        }
        if let Some(tenant) = self.scope(ctx)? {
            // Inject the column only when the caller supplied no value.
            let missing = data
                .get(TENANT_FIELD)
                .map(Value::is_null)
                .unwrap_or(true);
            if missing {
                data[TENANT_FIELD] = Value::String(tenant.id.0.clone());
            }
        }
        self.records.insert(data).await
    }

    async fn update(&self, ctx: &TenantContext, id: &str, mut data: Value) -> AtriumResult<Value> {
        if !data.is_object() {
            return Err(AtriumError::bad_request("Record must be a JSON object").into_anyhow());
        }
        let existing = self.get(ctx, id).await?;
        // A record never moves between tenants: the stored association wins
        // over whatever the caller sent.
        if let Some(owner) = record_tenant(&existing) {
            data[TENANT_FIELD] = Value::String(owner.to_string());
        }
        self.records.update(id, data).await
    }

    async fn remove(&self, ctx: &TenantContext, id: &str) -> AtriumResult<Value> {
        // Scoped get first, so a foreign record reads as NotFound.
        self.get(ctx, id).await?;
        self.records.remove(id).await
    }

    async fn find_unscoped(&self) -> AtriumResult<Vec<Value>> {
        self.records.find_all().await
    }
}

/// Maps tenants to their dedicated storage endpoints.
#[derive(Default)]
pub struct EndpointRegistry {
    endpoints: RwLock<Vec<(TenantId, Arc<dyn RecordStore>)>>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, tenant: TenantId, endpoint: Arc<dyn RecordStore>) {
        self.endpoints.write().push((tenant, endpoint));
    }

    pub fn endpoint_for(&self, tenant: &TenantId) -> Option<Arc<dyn RecordStore>> {
        self.endpoints
            .read()
            .iter()
            .find(|(id, _)| id == tenant)
            .map(|(_, ep)| Arc::clone(ep))
    }

    pub fn all(&self) -> Vec<Arc<dyn RecordStore>> {
        self.endpoints
            .read()
            .iter()
            .map(|(_, ep)| Arc::clone(ep))
            .collect()
    }
}

/// Per-tenant endpoint strategy: isolation by routing, not filtering.
pub struct ConnectionSwitchedStore {
    endpoints: Arc<EndpointRegistry>,
}

impl ConnectionSwitchedStore {
    pub fn new(endpoints: Arc<EndpointRegistry>) -> Self {
        Self { endpoints }
    }

    fn endpoint(&self, ctx: &TenantContext) -> AtriumResult<Arc<dyn RecordStore>> {
        let tenant = match ctx.active() {
            Some(tenant) => tenant,
            None => {
                warn!(panel = %ctx.panel_id(), "tenant-scoped operation without an active tenant");
                return Err(AtriumError::isolation_missing(format!(
                    "No active tenant for panel '{}'; refusing tenant-scoped operation",
                    ctx.panel_id()
                ))
                .into_anyhow());
            }
        };

        self.endpoints.endpoint_for(&tenant.id).ok_or_else(|| {
            AtriumError::general_error(format!(
                "No storage endpoint registered for tenant '{}'",
                tenant.id
            ))
            .into_anyhow()
        })
    }
}

#[async_trait]
impl ScopedStore for ConnectionSwitchedStore {
    async fn find(&self, ctx: &TenantContext) -> AtriumResult<Vec<Value>> {
        self.endpoint(ctx)?.find_all().await
    }

    async fn get(&self, ctx: &TenantContext, id: &str) -> AtriumResult<Value> {
        self.endpoint(ctx)?
            .get(id)
            .await?
            .ok_or_else(|| AtriumError::not_found(format!("Record not found: {id}")).into_anyhow())
    }

    async fn create(&self, ctx: &TenantContext, data: Value) -> AtriumResult<Value> {
        // No column injection here: the endpoint binding is the isolation.
        self.endpoint(ctx)?.insert(data).await
    }

    async fn update(&self, ctx: &TenantContext, id: &str, data: Value) -> AtriumResult<Value> {
        self.endpoint(ctx)?.update(id, data).await
    }

    async fn remove(&self, ctx: &TenantContext, id: &str) -> AtriumResult<Value> {
        self.endpoint(ctx)?.remove(id).await
    }

    async fn find_unscoped(&self) -> AtriumResult<Vec<Value>> {
        let mut out = Vec::new();
        for endpoint in self.endpoints.all() {
            out.extend(endpoint.find_all().await?);
        }
        Ok(out)
    }
}
