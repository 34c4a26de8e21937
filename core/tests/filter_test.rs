mod common;

use common::{web_map, PARCELS, ROADS};
use weft_core::{Access, FilterState, ServiceFilter, ServiceRegistry, WeftError};

fn registry() -> ServiceRegistry {
    let mut registry = ServiceRegistry::new();
    let public = web_map("a", Access::Public, "alice", 10);
    let private = web_map("b", Access::Private, "bob", 20);
    registry.record_service_use(PARCELS, &public).unwrap();
    registry.record_service_use(PARCELS, &private).unwrap();
    registry.record_service_use(ROADS, &private).unwrap();
    registry
        .record_service_use(
            "https://gis.acme.example/arcgis/rest/services/Zoning/MapServer",
            &public,
        )
        .unwrap();
    registry
}

#[test]
fn only_one_filter_at_a_time() {
    let err = ServiceFilter::from_parts(Some(Access::Public), Some("alice".into()), None)
        .unwrap_err();
    assert!(matches!(err, WeftError::ConfigError(_)));

    assert_eq!(
        ServiceFilter::from_parts(None, Some(String::new()), Some("https://x".into())).unwrap(),
        ServiceFilter::ByServer("https://x".into())
    );
    assert_eq!(
        ServiceFilter::from_parts(None, None, None).unwrap(),
        ServiceFilter::None
    );
}

#[test]
fn filters_select_rows_from_their_index() {
    let registry = registry();

    let all = ServiceFilter::None.apply(&registry);
    assert_eq!(all.rows.len(), 3);
    assert_eq!(all.count_label(), "3");

    let public = ServiceFilter::ByAccess(Access::Public).apply(&registry);
    assert_eq!(public.rows.len(), 2);
    assert_eq!(public.count_label(), "2 of 3");

    let bob = ServiceFilter::ByOwner("bob".into()).apply(&registry);
    assert_eq!(bob.rows.len(), 1);
    assert_eq!(bob.rows[0].url, ROADS);

    let acme = ServiceFilter::ByServer("https://gis.acme.example".into()).apply(&registry);
    assert_eq!(acme.rows.len(), 2);

    let nobody = ServiceFilter::ByOwner("nobody".into()).apply(&registry);
    assert!(nobody.rows.is_empty());
    assert_eq!(nobody.count_label(), "0 of 3");
}

#[test]
fn server_filter_does_not_narrow_related_items() {
    let private = web_map("b", Access::Private, "bob", 20);
    assert!(ServiceFilter::ByServer("https://elsewhere".into()).matches_item(&private));
    assert!(ServiceFilter::ByAccess(Access::Private).matches_item(&private));
    assert!(!ServiceFilter::ByAccess(Access::Public).matches_item(&private));
    assert!(!ServiceFilter::ByOwner("alice".into()).matches_item(&private));
}

#[test]
fn changing_filters_clears_the_selected_service() {
    let mut state = FilterState::new();
    state.select_service(PARCELS);
    assert_eq!(state.selected_service(), Some(PARCELS));

    state.select_access(Some(Access::Org));
    assert_eq!(state.active(), &ServiceFilter::ByAccess(Access::Org));
    assert!(state.selected_service().is_none());

    state.select_service(PARCELS);
    state.select_owner(Some("alice".into()));
    assert_eq!(state.active(), &ServiceFilter::ByOwner("alice".into()));
    assert!(state.selected_service().is_none());

    state.select_server(None);
    assert_eq!(state.active(), &ServiceFilter::None);

    state.select_server(Some("https://gis.acme.example".into()));
    state.select_service(ROADS);
    state.clear_related();
    assert!(state.selected_service().is_none());
    assert!(state.active().is_active());

    state.clear();
    assert!(!state.active().is_active());
}

#[test]
fn filter_serializes_with_kind_tag() {
    let json = serde_json::to_value(ServiceFilter::ByAccess(Access::Shared)).unwrap();
    assert_eq!(json, serde_json::json!({ "kind": "by_access", "value": "shared" }));
    let none = serde_json::to_value(ServiceFilter::None).unwrap();
    assert_eq!(none, serde_json::json!({ "kind": "none" }));
}

#[test]
fn service_links_carry_the_active_filter() {
    let mut state = FilterState::new();
    assert_eq!(
        state.service_link(PARCELS),
        format!("?service={}", urlencoding::encode(PARCELS))
    );

    state.select(ServiceFilter::ByOwner("Ann Lee".into()));
    assert_eq!(
        state.service_link(ROADS),
        format!("?owner=Ann%20Lee&service={}", urlencoding::encode(ROADS))
    );

    state.select_server(Some("http://legacy.acme.example:6080".into()));
    assert!(state
        .service_link(ROADS)
        .starts_with("?server=http%3A%2F%2Flegacy.acme.example%3A6080&service="));

    assert_eq!(
        ServiceFilter::ByAccess(Access::Shared).query_param(),
        Some(("access", "shared"))
    );
    assert_eq!(ServiceFilter::None.query_param(), None);
}
