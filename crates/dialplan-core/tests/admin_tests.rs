//! Integration tests for route and dialplan administration

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use rvoip_dialplan_core::engine::EMERGENCY_PLAN_ID;
use rvoip_dialplan_core::identity::CacheLookup;
use rvoip_dialplan_core::prelude::*;

fn create_admin() -> (AdminService, InMemoryDialplanStore) {
    let store = InMemoryDialplanStore::with_reserved_plans(&ResolutionConfig::default());
    let admin = AdminService::new(Arc::new(store.clone()), ResolutionConfig::default());
    (admin, store)
}

fn route(phone: &str, tenant: &str) -> RoutingRecord {
    RoutingRecord {
        phone_number: phone.to_string(),
        tenant_id: tenant.to_string(),
        active_plan_id: None,
        off_hours_plan_id: None,
        failsafe_plan_id: None,
        is_maintenance_mode: false,
        default_language_code: "tr".to_string(),
    }
}

fn plan(id: &str, tenant: &str) -> Plan {
    let mut action_parameters = BTreeMap::new();
    action_parameters.insert("menu_id".to_string(), "MAIN".to_string());
    Plan {
        id: id.to_string(),
        tenant_id: tenant.to_string(),
        description: "Main IVR".to_string(),
        action: "RUN_IVR".to_string(),
        action_parameters,
    }
}

#[tokio::test]
async fn test_route_lifecycle_uses_canonical_numbers() {
    let (admin, store) = create_admin();

    let created = admin.create_route(route("0850 111 22 33", "acme")).await.unwrap();
    assert_eq!(created.phone_number, "908501112233");
    assert!(store.find_route("908501112233").await.unwrap().is_some());

    let fetched = admin.get_route("sip:08501112233@pbx.local").await.unwrap();
    assert_eq!(fetched.tenant_id, "acme");

    let mut changed = route("+90 850 111 22 33", "acme");
    changed.is_maintenance_mode = true;
    admin.update_route(changed).await.unwrap();
    assert!(admin.get_route("908501112233").await.unwrap().is_maintenance_mode);

    admin.delete_route("08501112233").await.unwrap();
    assert!(matches!(
        admin.get_route("908501112233").await,
        Err(DialplanError::NotFound(_))
    ));

    // Deleting again is not an error
    admin.delete_route("08501112233").await.unwrap();
}

#[tokio::test]
async fn test_duplicate_route_is_a_conflict() {
    let (admin, _) = create_admin();
    admin.create_route(route("908501112233", "acme")).await.unwrap();

    let err = admin.create_route(route("08501112233", "other")).await.unwrap_err();
    assert!(matches!(err, DialplanError::Conflict(_)));
}

#[tokio::test]
async fn test_updating_unknown_route_is_not_found() {
    let (admin, _) = create_admin();
    let err = admin.update_route(route("908501112233", "acme")).await.unwrap_err();
    assert!(matches!(err, DialplanError::NotFound(_)));
}

#[tokio::test]
async fn test_invalid_routes_are_rejected() {
    let (admin, _) = create_admin();

    let err = admin.create_route(route("not-a-number", "acme")).await.unwrap_err();
    assert!(matches!(err, DialplanError::InvalidArgument(_)));

    let err = admin.create_route(route("908501112233", "")).await.unwrap_err();
    assert!(matches!(err, DialplanError::InvalidArgument(_)));

    let mut bad_ref = route("908501112233", "acme");
    bad_ref.active_plan_id = Some("lower case".to_string());
    let err = admin.create_route(bad_ref).await.unwrap_err();
    assert!(matches!(err, DialplanError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_empty_plan_references_are_stored_as_absent() {
    let (admin, _) = create_admin();
    let mut record = route("908501112233", "acme");
    record.active_plan_id = Some(String::new());

    let created = admin.create_route(record).await.unwrap();
    assert!(created.active_plan_id.is_none());
}

#[tokio::test]
async fn test_route_listing_is_paginated_per_tenant() {
    let (admin, _) = create_admin();
    for i in 0..12 {
        admin.create_route(route(&format!("90850111{:04}", i), "acme")).await.unwrap();
    }
    admin.create_route(route("908509990000", "other")).await.unwrap();

    let request = ListRequest {
        tenant_id: Some("acme".to_string()),
        page: 2,
        page_size: 5,
    };
    let page = admin.list_routes(&request).await.unwrap();
    assert_eq!(page.total_count, 12);
    assert_eq!(page.page, 2);
    assert_eq!(page.page_size, 5);
    assert_eq!(page.items.len(), 5);
    assert_eq!(page.items[0].phone_number, "908501110005");

    // Out-of-range paging falls back to defaults
    let page = admin.list_routes(&ListRequest::default()).await.unwrap();
    assert_eq!(page.page, 1);
    assert_eq!(page.page_size, 10);
    assert_eq!(page.total_count, 13);
    assert_eq!(page.items.len(), 10);
}

#[tokio::test]
async fn test_plan_lifecycle() {
    let (admin, _) = create_admin();

    admin.create_plan(plan("DP_ACME_IVR", "acme")).await.unwrap();
    let fetched = admin.get_plan("DP_ACME_IVR").await.unwrap();
    assert_eq!(fetched.action_parameters.get("menu_id").map(String::as_str), Some("MAIN"));

    let mut changed = plan("DP_ACME_IVR", "acme");
    changed.action = "START_AI_CONVERSATION".to_string();
    admin.update_plan(changed).await.unwrap();
    assert_eq!(admin.get_plan("DP_ACME_IVR").await.unwrap().action, "START_AI_CONVERSATION");

    let err = admin.create_plan(plan("DP_ACME_IVR", "acme")).await.unwrap_err();
    assert!(matches!(err, DialplanError::Conflict(_)));

    admin.delete_plan("DP_ACME_IVR").await.unwrap();
    assert!(matches!(admin.get_plan("DP_ACME_IVR").await, Err(DialplanError::NotFound(_))));
    assert!(matches!(
        admin.update_plan(plan("DP_ACME_IVR", "acme")).await,
        Err(DialplanError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_invalid_plans_are_rejected() {
    let (admin, _) = create_admin();

    let err = admin.create_plan(plan("", "acme")).await.unwrap_err();
    assert!(matches!(err, DialplanError::InvalidArgument(_)));

    let err = admin.create_plan(plan("dp-lowercase", "acme")).await.unwrap_err();
    assert!(matches!(err, DialplanError::InvalidArgument(_)));

    let mut no_action = plan("DP_NO_ACTION", "acme");
    no_action.action = String::new();
    let err = admin.create_plan(no_action).await.unwrap_err();
    assert!(matches!(err, DialplanError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_emergency_plan_id_cannot_be_stored_or_referenced() {
    let (admin, store) = create_admin();

    let err = admin.create_plan(plan(EMERGENCY_PLAN_ID, "acme")).await.unwrap_err();
    assert!(matches!(err, DialplanError::InvalidArgument(_)));
    assert!(store.find_plan(EMERGENCY_PLAN_ID).await.unwrap().is_none());

    let mut maintenance = route("908501112233", "acme");
    maintenance.is_maintenance_mode = true;
    maintenance.failsafe_plan_id = Some(EMERGENCY_PLAN_ID.to_string());
    let err = admin.create_route(maintenance).await.unwrap_err();
    assert!(matches!(err, DialplanError::InvalidArgument(_)));
    assert!(store.find_route("908501112233").await.unwrap().is_none());
}

#[tokio::test]
async fn test_reserved_plans_cannot_be_deleted() {
    let (admin, store) = create_admin();

    for id in ["DP_SYSTEM_FAILSAFE", "DP_GUEST_ENTRY", "DP_DEFAULT_USER"] {
        let err = admin.delete_plan(id).await.unwrap_err();
        assert!(matches!(err, DialplanError::InvalidArgument(_)));
        assert!(store.find_plan(id).await.unwrap().is_some());
    }
}

#[tokio::test]
async fn test_plan_listing_filters_by_tenant() {
    let (admin, _) = create_admin();
    admin.create_plan(plan("DP_ACME_A", "acme")).await.unwrap();
    admin.create_plan(plan("DP_ACME_B", "acme")).await.unwrap();

    let request = ListRequest {
        tenant_id: Some("acme".to_string()),
        page: 1,
        page_size: 1000,
    };
    let page = admin.list_plans(&request).await.unwrap();
    assert_eq!(page.total_count, 2);
    assert_eq!(page.page_size, 100);

    let system = ListRequest {
        tenant_id: Some("system".to_string()),
        ..Default::default()
    };
    assert_eq!(admin.list_plans(&system).await.unwrap().total_count, 3);
}

#[tokio::test]
async fn test_store_outage_surfaces_as_unavailable() {
    let (admin, store) = create_admin();
    store.set_unavailable(true);

    let err = admin.get_route("908501112233").await.unwrap_err();
    assert!(matches!(err, DialplanError::BackingStoreUnavailable(_)));
    assert_eq!(err.status_code(), 503);
}

#[tokio::test]
async fn test_invalidate_caller_evicts_cached_profile() {
    let store = InMemoryDialplanStore::new();
    let cache = Arc::new(MokaIdentityCache::new(Duration::from_secs(60), 100));
    let admin = AdminService::new(Arc::new(store), ResolutionConfig::default()).with_identity_cache(cache.clone());

    let profile = CallerProfile {
        id: "user-42".to_string(),
        display_name: None,
        tenant_id: "acme".to_string(),
        user_type: "customer".to_string(),
        contacts: Vec::new(),
    };
    cache.set("905551234567", &profile).await.unwrap();

    admin.invalidate_caller("0555 123 45 67").await.unwrap();
    assert_eq!(cache.get("905551234567").await, CacheLookup::Miss);
}
