//! The tenant routes for one panel, plus the per-request resolution helper
//! application routes use for tenant-scoped pages.

use axum::{
    extract::rejection::JsonRejection,
    extract::{Path, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
    routing, Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use atrium_core::{
    AtriumError, CreateTenant, InviteMember, MembershipUser, Panel, PanelRegistry, PanelUser,
    RenameTenant, RouteHint, Tenant, TenantContext, TenantSummary, UpdateMemberRole, UserId,
};

use crate::{AtriumAxumError, TenancyState};

fn map_json_rejection(rejection: JsonRejection) -> AtriumAxumError {
    AtriumError::bad_request("Failed to parse the request body as JSON")
        .with_errors(json!({"_schema": [rejection.to_string()]}))
        .into_anyhow()
        .into()
}

/// The session identity, from the `x-user-id` header the application's auth
/// layer sets once a user is authenticated.
fn session_user(state: &TenancyState, headers: &HeaderMap) -> Result<MembershipUser, AtriumAxumError> {
    let id = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AtriumAxumError(AtriumError::not_authenticated("Not authenticated").into_anyhow()))?;
    Ok(state.user(UserId(id.to_string())))
}

fn panel_root(state: &TenancyState) -> String {
    let root = state.panel.path.trim_end_matches('/');
    if root.is_empty() {
        "/".to_string()
    } else {
        root.to_string()
    }
}

fn register_url(state: &TenancyState) -> String {
    format!("{}/tenant/register", state.panel.path.trim_end_matches('/'))
}

fn settings_url(state: &TenancyState) -> String {
    format!("{}/tenant/settings", state.panel.path.trim_end_matches('/'))
}

/// How a tenant is addressed in URLs for this panel: the slug attribute
/// when configured, the opaque id otherwise.
fn tenant_address<'a>(state: &TenancyState, tenant: &'a Tenant) -> &'a str {
    if state.panel.slug_attribute().is_some() {
        &tenant.slug
    } else {
        tenant.id.as_str()
    }
}

/// Resolve the active tenant for an application request.
///
/// Resolution returns route-named tenants unconditionally; the access check
/// for them is performed here, and the session pointer is only refreshed
/// once that check passes.
pub async fn resolve_request(
    state: &TenancyState,
    headers: &HeaderMap,
    path: &str,
) -> Result<(MembershipUser, TenantContext), AtriumAxumError> {
    let user = session_user(state, headers)?;
    let hint = RouteHint::from_request_path(&state.panel, path);
    let route_named = hint.tenant_segment.is_some();

    let ctx = state.resolver.resolve(&hint, &user).await?;

    if route_named {
        if let Some(tenant) = ctx.active() {
            if !state.resolver.can_access(&user, tenant).await? {
                tracing::debug!(panel = %state.panel.id, tenant = %tenant.id, user = %user.id(), "route-named tenant denied");
                return Err(AtriumAxumError(
                    AtriumError::forbidden("You do not have access to this team")
                        .field_error("tenant", "You do not have access to this team")
                        .into_anyhow(),
                ));
            }
            state.resolver.remember(user.id(), tenant).await?;
        }
    }

    Ok((user, ctx))
}

/// The active tenant for an engine route, or the error the mutation surfaces
/// when the user has none yet.
async fn active_tenant(
    state: &TenancyState,
    user: &MembershipUser,
) -> Result<Option<Tenant>, AtriumAxumError> {
    let ctx = state.resolver.resolve(&RouteHint::none(), user).await?;
    Ok(ctx.active().cloned())
}

fn no_active_team() -> AtriumAxumError {
    AtriumAxumError(
        AtriumError::not_found("No active team")
            .field_error("tenant", "no active team")
            .into_anyhow(),
    )
}

// ---- handlers ----

/// A tenant's landing page, addressed by slug or id. The panel root
/// redirect lands here; the application's tenant-scoped pages hang off
/// this path and resolve the same way.
async fn tenant_home(
    State(state): State<TenancyState>,
    headers: HeaderMap,
    Path(segment): Path<String>,
) -> Result<Response, AtriumAxumError> {
    let path = format!("{}/{}", state.panel.path.trim_end_matches('/'), segment);
    let (_user, ctx) = resolve_request(&state, &headers, &path).await?;

    let tenant = ctx.active().ok_or_else(no_active_team)?;
    Ok(Json(json!({
        "panel": state.panel.id.as_str(),
        "tenant": TenantSummary::from_tenant(tenant, &state.panel.path, true),
    }))
    .into_response())
}

/// Panel root: send the user to their active tenant, or into registration
/// when they have none. Access to registration itself never requires a
/// resolved tenant.
async fn entry(
    State(state): State<TenancyState>,
    headers: HeaderMap,
) -> Result<Response, AtriumAxumError> {
    if !state.panel.tenancy_enabled() {
        return Ok(Json(json!({"panel": state.panel.id.as_str(), "tenant": null})).into_response());
    }

    let user = session_user(&state, &headers)?;
    let ctx = state.resolver.resolve(&RouteHint::none(), &user).await?;

    match ctx.active() {
        Some(tenant) => {
            let url = format!("{}/{}", panel_root(&state), tenant_address(&state, tenant));
            Ok(Redirect::to(&url).into_response())
        }
        None => Ok(Redirect::to(&register_url(&state)).into_response()),
    }
}

async fn list_tenants(
    State(state): State<TenancyState>,
    headers: HeaderMap,
) -> Result<Response, AtriumAxumError> {
    let user = session_user(&state, &headers)?;
    let ctx = state.resolver.resolve(&RouteHint::none(), &user).await?;
    let list = state.service.list(&user, ctx.active_id()).await?;
    Ok(Json(list).into_response())
}

#[derive(Debug, Deserialize)]
struct SwitchBody {
    tenant: String,
}

async fn switch_tenant(
    State(state): State<TenancyState>,
    headers: HeaderMap,
    body: Result<Json<SwitchBody>, JsonRejection>,
) -> Result<Response, AtriumAxumError> {
    let user = session_user(&state, &headers)?;
    let Json(body) = body.map_err(map_json_rejection)?;

    state.service.switch(&user, &body.tenant).await?;
    Ok(Redirect::to(&panel_root(&state)).into_response())
}

/// Registration form descriptor. The panel shell renders it; the engine
/// only says which fields exist.
async fn register_form(State(state): State<TenancyState>) -> Response {
    Json(json!({
        "action": register_url(&state),
        "fields": {
            "name": {"type": "text", "required": true},
            "slug": {"type": "text", "required": false},
        },
    }))
    .into_response()
}

async fn register_tenant(
    State(state): State<TenancyState>,
    headers: HeaderMap,
    body: Result<Json<CreateTenant>, JsonRejection>,
) -> Result<Response, AtriumAxumError> {
    let user = session_user(&state, &headers)?;
    let Json(body) = body.map_err(map_json_rejection)?;

    state.service.create(&user, body).await?;
    Ok(Redirect::to(&panel_root(&state)).into_response())
}

async fn settings(
    State(state): State<TenancyState>,
    headers: HeaderMap,
) -> Result<Response, AtriumAxumError> {
    let user = session_user(&state, &headers)?;
    match active_tenant(&state, &user).await? {
        Some(tenant) => {
            let settings = state.service.settings(&user, &tenant.id).await?;
            Ok(Json(settings).into_response())
        }
        None => Ok(Redirect::to(&register_url(&state)).into_response()),
    }
}

async fn rename_tenant(
    State(state): State<TenancyState>,
    headers: HeaderMap,
    body: Result<Json<RenameTenant>, JsonRejection>,
) -> Result<Response, AtriumAxumError> {
    let user = session_user(&state, &headers)?;
    let Json(body) = body.map_err(map_json_rejection)?;

    let tenant = active_tenant(&state, &user).await?.ok_or_else(no_active_team)?;
    state.service.rename(&user, &tenant.id, body).await?;
    Ok(Redirect::to(&settings_url(&state)).into_response())
}

async fn invite_member(
    State(state): State<TenancyState>,
    headers: HeaderMap,
    body: Result<Json<InviteMember>, JsonRejection>,
) -> Result<Response, AtriumAxumError> {
    let user = session_user(&state, &headers)?;
    let Json(body) = body.map_err(map_json_rejection)?;

    let tenant = active_tenant(&state, &user).await?.ok_or_else(no_active_team)?;
    state.service.invite(&user, &tenant.id, body).await?;
    Ok(Redirect::to(&settings_url(&state)).into_response())
}

async fn update_member_role(
    State(state): State<TenancyState>,
    headers: HeaderMap,
    Path(member): Path<String>,
    body: Result<Json<UpdateMemberRole>, JsonRejection>,
) -> Result<Response, AtriumAxumError> {
    let user = session_user(&state, &headers)?;
    let Json(body) = body.map_err(map_json_rejection)?;

    let tenant = active_tenant(&state, &user).await?.ok_or_else(no_active_team)?;
    state
        .service
        .update_member_role(&user, &tenant.id, &UserId(member), body)
        .await?;
    Ok(Redirect::to(&settings_url(&state)).into_response())
}

async fn remove_member(
    State(state): State<TenancyState>,
    headers: HeaderMap,
    Path(member): Path<String>,
) -> Result<Response, AtriumAxumError> {
    let user = session_user(&state, &headers)?;

    let tenant = active_tenant(&state, &user).await?.ok_or_else(no_active_team)?;
    let removed = state
        .service
        .remove_member(&user, &tenant.id, &UserId(member))
        .await?;

    // Someone who removed themself is sent back to the panel root, which
    // re-resolves (and redirects into registration if nothing is left).
    let target = if removed.removed_self {
        panel_root(&state)
    } else {
        settings_url(&state)
    };
    Ok(Redirect::to(&target).into_response())
}

async fn delete_tenant(
    State(state): State<TenancyState>,
    headers: HeaderMap,
) -> Result<Response, AtriumAxumError> {
    let user = session_user(&state, &headers)?;

    let tenant = active_tenant(&state, &user).await?.ok_or_else(no_active_team)?;
    state.service.delete(&user, &tenant.id).await?;
    Ok(Redirect::to(&panel_root(&state)).into_response())
}

// ---- assembly ----

/// The panel's tenancy routes, rooted at the panel path.
pub fn panel_router(state: TenancyState) -> Router<()> {
    Router::new()
        .route("/", routing::get(entry))
        .route("/tenant", routing::get(list_tenants))
        .route("/tenant/switch", routing::post(switch_tenant))
        .route(
            "/tenant/register",
            routing::get(register_form).post(register_tenant),
        )
        .route(
            "/tenant/settings",
            routing::get(settings)
                .patch(rename_tenant)
                .delete(delete_tenant),
        )
        .route("/tenant/settings/members", routing::post(invite_member))
        .route(
            "/tenant/settings/members/{id}",
            routing::patch(update_member_role).delete(remove_member),
        )
        // Matched after the static /tenant routes above.
        .route("/{tenant}", routing::get(tenant_home))
        .with_state(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// The panel router nested under the panel's URL path prefix.
pub fn mount(state: TenancyState) -> Router<()> {
    let path = state.panel.path.trim_end_matches('/').to_string();
    if path.is_empty() {
        panel_router(state)
    } else {
        Router::new().nest(&path, panel_router(state))
    }
}

/// Mount every panel in a registry, each under its own URL path prefix.
/// `state_for` builds the per-panel state (service, resolver, stores).
pub fn mount_panels<F>(registry: &PanelRegistry, mut state_for: F) -> Router<()>
where
    F: FnMut(&Panel) -> TenancyState,
{
    registry
        .panels()
        .iter()
        .fold(Router::new(), |router, panel| {
            router.merge(mount(state_for(panel)))
        })
}

/// Bind and serve a router.
pub async fn listen<A>(router: Router<()>, addr: A) -> anyhow::Result<()>
where
    A: tokio::net::ToSocketAddrs,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
