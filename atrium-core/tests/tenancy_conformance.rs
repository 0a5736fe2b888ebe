//! End-to-end conformance tests for the tenancy engine against the memory
//! backends: resolution, isolation, and lifecycle behave as one system.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use atrium_core::store::memory::{
    MemoryMembershipStore, MemoryRecordStore, MemoryTenantStore, MemoryUserDirectory,
};
use atrium_core::{
    active_tenant_key, AtriumError, AtriumResult, ConnectionSwitchedStore, CreateTenant,
    DefaultTenantAware, EndpointRegistry, ErrorKind, MemorySessionStore, MembershipUser, Panel,
    PanelUser, RouteHint, RowScopedStore, ScopedStore, SessionStore, TenancyConfig,
    TenancyMode, TenancyService, Tenant, TenantAware, TenantResolver, TenantStore, UserId,
    TENANT_FIELD,
};

struct World {
    panel: Panel,
    tenants: Arc<MemoryTenantStore>,
    memberships: Arc<MemoryMembershipStore>,
    directory: Arc<MemoryUserDirectory>,
    session: Arc<MemorySessionStore>,
}

impl World {
    fn new(mode: TenancyMode) -> Self {
        Self {
            panel: Panel::new("admin", "/admin").with_tenancy(TenancyConfig::new().mode(mode)),
            tenants: Arc::new(MemoryTenantStore::new()),
            memberships: Arc::new(MemoryMembershipStore::new()),
            directory: Arc::new(MemoryUserDirectory::new()),
            session: Arc::new(MemorySessionStore::new()),
        }
    }

    fn service(&self) -> TenancyService {
        TenancyService::new(
            self.panel.clone(),
            self.tenants.clone(),
            self.memberships.clone(),
            self.directory.clone(),
            self.session.clone(),
        )
    }

    fn resolver(&self) -> TenantResolver {
        TenantResolver::new(self.panel.clone(), self.tenants.clone(), self.session.clone())
    }

    fn user(&self, id: &str) -> MembershipUser {
        MembershipUser::new(
            UserId(id.into()),
            self.tenants.clone(),
            self.memberships.clone(),
        )
    }
}

fn named(name: &str) -> CreateTenant {
    CreateTenant {
        name: name.into(),
        slug: None,
    }
}

#[tokio::test]
async fn inaccessible_tenant_is_never_resolved_even_from_session_pointer() {
    let world = World::new(TenancyMode::RowScoped);
    let service = world.service();

    let alice = world.user("alice");
    let mallory = world.user("mallory");
    let (acme, _) = service.create(&alice, named("Acme")).await.unwrap();

    // Forge mallory's pointer at acme.
    let key = active_tenant_key(&world.panel.id);
    world
        .session
        .set(&UserId("mallory".into()), &key, acme.id.0.clone())
        .await
        .unwrap();

    let ctx = world
        .resolver()
        .resolve(&RouteHint::none(), &mallory)
        .await
        .unwrap();
    assert_eq!(ctx.active_id(), None);

    // The forged pointer was discarded.
    assert_eq!(
        world.session.get(&UserId("mallory".into()), &key).await.unwrap(),
        None
    );
}

#[tokio::test]
async fn switch_then_resolve_round_trips() {
    let world = World::new(TenancyMode::RowScoped);
    let service = world.service();
    let alice = world.user("alice");

    let (_first, _) = service.create(&alice, named("First")).await.unwrap();
    let (second, _) = service.create(&alice, named("Second")).await.unwrap();

    service.switch(&alice, "second").await.unwrap();

    // Same "request" and a subsequent one both resolve to the switched tenant.
    for _ in 0..2 {
        let ctx = world
            .resolver()
            .resolve(&RouteHint::none(), &alice)
            .await
            .unwrap();
        assert_eq!(ctx.active_id(), Some(&second.id));
    }
}

#[tokio::test]
async fn route_segment_wins_over_session_pointer() {
    let world = World::new(TenancyMode::RowScoped);
    let service = world.service();
    let alice = world.user("alice");

    let (first, _) = service.create(&alice, named("First")).await.unwrap();
    let (second, _) = service.create(&alice, named("Second")).await.unwrap();
    service.switch(&alice, "second").await.unwrap();

    let hint = RouteHint::from_request_path(&world.panel, "/admin/first/posts");
    let ctx = world.resolver().resolve(&hint, &alice).await.unwrap();
    assert_eq!(ctx.active_id(), Some(&first.id));

    // The route step does not touch the pointer; that happens only after
    // the caller's access check.
    let key = active_tenant_key(&world.panel.id);
    assert_eq!(
        world.session.get(&UserId("alice".into()), &key).await.unwrap(),
        Some(second.id.0.clone())
    );
}

#[tokio::test]
async fn default_tenant_capability_is_consulted_before_enumeration() {
    struct PreferringUser {
        inner: MembershipUser,
        preferred: Tenant,
    }

    impl PanelUser for PreferringUser {
        fn id(&self) -> &UserId {
            self.inner.id()
        }
        fn tenant_aware(&self) -> Option<&dyn TenantAware> {
            self.inner.tenant_aware()
        }
        fn default_tenant_aware(&self) -> Option<&dyn DefaultTenantAware> {
            Some(self)
        }
    }

    #[async_trait]
    impl DefaultTenantAware for PreferringUser {
        async fn default_tenant(&self, _panel: &Panel) -> AtriumResult<Option<Tenant>> {
            Ok(Some(self.preferred.clone()))
        }
    }

    let world = World::new(TenancyMode::RowScoped);
    let service = world.service();
    let alice = world.user("alice");

    let (_first, _) = service.create(&alice, named("First")).await.unwrap();
    let (second, _) = service.create(&alice, named("Second")).await.unwrap();

    // Clear the pointer so resolution falls past step 2.
    let key = active_tenant_key(&world.panel.id);
    world
        .session
        .remove(&UserId("alice".into()), &key)
        .await
        .unwrap();

    let user = PreferringUser {
        inner: world.user("alice"),
        preferred: second.clone(),
    };
    let ctx = world
        .resolver()
        .resolve(&RouteHint::none(), &user)
        .await
        .unwrap();
    assert_eq!(ctx.active_id(), Some(&second.id));
}

#[tokio::test]
async fn row_scoped_creation_stamps_the_active_tenant() {
    let world = World::new(TenancyMode::RowScoped);
    let service = world.service();
    let alice = world.user("alice");

    let (tenant, ctx) = service.create(&alice, named("Acme")).await.unwrap();
    let posts = RowScopedStore::new(Arc::new(MemoryRecordStore::new()));

    let record = posts.create(&ctx, json!({"title": "hello"})).await.unwrap();
    assert_eq!(record[TENANT_FIELD], tenant.id.0);
}

#[tokio::test]
async fn connection_switched_reads_never_cross_tenants() {
    let world = World::new(TenancyMode::ConnectionSwitched);
    let service = world.service();
    let alice = world.user("alice");
    let bob = world.user("bob");

    let (acme, ctx_acme) = service.create(&alice, named("Acme")).await.unwrap();
    let (globex, ctx_globex) = service.create(&bob, named("Globex")).await.unwrap();

    let registry = Arc::new(EndpointRegistry::new());
    registry.register(acme.id.clone(), Arc::new(MemoryRecordStore::new()));
    registry.register(globex.id.clone(), Arc::new(MemoryRecordStore::new()));
    let posts = ConnectionSwitchedStore::new(registry);

    posts
        .create(&ctx_acme, json!({"title": "acme secret"}))
        .await
        .unwrap();

    let seen = posts.find(&ctx_globex).await.unwrap();
    assert!(seen.is_empty());

    // And with no active tenant the operation aborts outright.
    let empty_ctx = world
        .resolver()
        .resolve(&RouteHint::none(), &world.user("nobody"))
        .await
        .unwrap();
    let err = AtriumError::normalize(
        posts.create(&empty_ctx, json!({"x": 1})).await.unwrap_err(),
    );
    assert_eq!(err.kind, ErrorKind::IsolationMissing);
}

#[tokio::test]
async fn fresh_user_registration_scenario() {
    let world = World::new(TenancyMode::RowScoped);
    let service = world.service();
    let alice = world.user("alice");

    // No memberships: resolution yields none, so the caller redirects into
    // the registration flow.
    let ctx = world
        .resolver()
        .resolve(&RouteHint::none(), &alice)
        .await
        .unwrap();
    assert!(ctx.tenancy_enabled());
    assert!(ctx.active().is_none());

    // Registration posts a name.
    let (tenant, ctx) = service.create(&alice, named("Acme")).await.unwrap();
    assert_eq!(tenant.name, "Acme");
    assert_eq!(tenant.slug, "acme");
    assert_eq!(tenant.owner_id, Some(UserId("alice".into())));
    assert_eq!(ctx.active_id(), Some(&tenant.id));

    // And subsequent resolution lands on the new tenant.
    let ctx = world
        .resolver()
        .resolve(&RouteHint::none(), &alice)
        .await
        .unwrap();
    assert_eq!(ctx.active_id(), Some(&tenant.id));

    assert!(world.tenants.get(&tenant.id).await.unwrap().is_some());
}

#[tokio::test]
async fn multi_tenant_tie_break_is_store_enumeration_order() {
    let world = World::new(TenancyMode::RowScoped);
    let service = world.service();
    let alice = world.user("alice");

    let (first, _) = service.create(&alice, named("Zeta")).await.unwrap();
    let (_second, _) = service.create(&alice, named("Alpha")).await.unwrap();

    let key = active_tenant_key(&world.panel.id);
    world
        .session
        .remove(&UserId("alice".into()), &key)
        .await
        .unwrap();

    // First joined wins here because the memory store enumerates insertion
    // order — not because the engine promises "oldest" or "alphabetical".
    let ctx = world
        .resolver()
        .resolve(&RouteHint::none(), &alice)
        .await
        .unwrap();
    assert_eq!(ctx.active_id(), Some(&first.id));
}
