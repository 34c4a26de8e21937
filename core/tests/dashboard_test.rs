mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum_test::TestServer;
use common::{org_user, web_app, web_map, FakePortal, BASEMAP, PARCELS, ROADS};
use serde_json::Value;
use weft_core::{
    Access, CrawlEvent, CrawlEventType, DashboardConfig, DashboardServer, EventBroadcaster,
    OrgDirectory, ServiceRegistry, Session,
};

async fn dashboard() -> DashboardServer {
    let mut registry = ServiceRegistry::with_warning_threshold(2);
    let map = web_map("map1", Access::Org, "alice", 10);
    let app = web_app("app1", Access::Public, "partner", 500);
    let private = web_map("map2", Access::Private, "alice", 3);
    registry.record_service_uses(PARCELS, &[Some(&map), Some(&app)]).unwrap();
    registry.record_service_uses(BASEMAP, &[Some(&app)]).unwrap();
    registry.record_service_uses(BASEMAP, &[Some(&private)]).unwrap();
    registry.record_service_uses(BASEMAP, &[Some(&map)]).unwrap();
    registry.record_service_uses(ROADS, &[Some(&private)]).unwrap();

    let portal = FakePortal::new().signed_in("dana");
    let session = Session::establish(&portal).await.unwrap();
    let directory = OrgDirectory::new();
    directory.register(org_user("alice", "Alice Able", "alice@acme.example"));

    DashboardServer::new(
        DashboardConfig::default(),
        registry.shared(),
        Arc::new(directory),
        session,
        "https://www.arcgis.com",
    )
}

async fn server() -> TestServer {
    TestServer::new(dashboard().await.router()).unwrap()
}

#[tokio::test]
async fn summary_counts_services() {
    let server = server().await;
    let res = server.get("/api/summary").await;
    res.assert_status_ok();
    let body: Value = res.json();

    assert_eq!(body["service_count"], 3);
    assert_eq!(body["insecure_count"], 1);
    assert_eq!(body["signed_in_user"], "dana");
    assert_eq!(body["home_url"], "https://acme.maps.arcgis.com");
    let access = body["access"].as_array().unwrap();
    assert_eq!(access.len(), 4);
    assert_eq!(access[0]["access"], "public");
    assert_eq!(access[0]["count"], 1);
}

#[tokio::test]
async fn services_honour_the_filter() {
    let server = server().await;

    let all: Value = server.get("/api/services").await.json();
    assert_eq!(all["label"], "3");
    assert_eq!(all["rows"][0]["url"], PARCELS);

    let private: Value = server
        .get("/api/services")
        .add_query_param("access", "private")
        .await
        .json();
    assert_eq!(private["label"], "1 of 3");
    assert_eq!(private["rows"][0]["url"], ROADS);
    assert_eq!(private["rows"][0]["secure"], false);
    assert_eq!(private["filter"]["kind"], "by_access");

    let basemap: Value = server
        .get("/api/services")
        .add_query_param("server", "https://services.arcgisonline.com")
        .await
        .json();
    assert_eq!(basemap["rows"][0]["badge"], "warning");
}

#[tokio::test]
async fn conflicting_or_bad_filters_are_rejected() {
    let server = server().await;

    let res = server
        .get("/api/services")
        .add_query_param("access", "public")
        .add_query_param("owner", "alice")
        .await;
    res.assert_status(StatusCode::BAD_REQUEST);

    let res = server
        .get("/api/services")
        .add_query_param("access", "everyone")
        .await;
    res.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn related_items_are_sorted_and_linked() {
    let server = server().await;
    let res = server
        .get("/api/services/related")
        .add_query_param("url", BASEMAP)
        .await;
    res.assert_status_ok();
    let body: Value = res.json();

    assert_eq!(body["related_count"], 3);
    let items = body["items"].as_array().unwrap();
    let ids: Vec<&str> = items.iter().map(|i| i["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["app1", "map1", "map2"]);

    assert_eq!(
        items[0]["item_url"],
        "https://acme.maps.arcgis.com/home/item.html?id=app1"
    );
    assert_eq!(items[0]["views"], "500");
    // Outside owner has no contact link
    assert!(items[0]["owner_mailto"].is_null());
    let mailto = items[1]["owner_mailto"].as_str().unwrap();
    assert!(mailto.starts_with("mailto:alice@acme.example?cc=dana@acme.example&subject="));

    let filtered: Value = server
        .get("/api/services/related")
        .add_query_param("url", BASEMAP)
        .add_query_param("owner", "alice")
        .await
        .json();
    assert_eq!(filtered["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn unknown_service_is_not_found() {
    let server = server().await;
    server
        .get("/api/services/related")
        .add_query_param("url", "https://nowhere.example/MapServer")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn filters_list_owner_and_server_choices() {
    let server = server().await;
    let body: Value = server.get("/api/filters").await.json();

    assert_eq!(body["owners"]["in_org"][0]["username"], "alice");
    assert_eq!(body["owners"]["outside"], serde_json::json!(["partner"]));
    let servers = body["servers"].as_array().unwrap();
    assert_eq!(servers.len(), 3);
    assert!(servers
        .iter()
        .any(|s| s["origin"] == "http://legacy.acme.example:6080" && s["secure"] == false));
}

#[tokio::test]
async fn graph_and_lineage() {
    let server = server().await;
    let graph: Value = server.get("/api/graph").await.json();
    assert!(!graph["nodes"].as_array().unwrap().is_empty());

    let lineage: Value = server
        .get("/api/graph/lineage")
        .add_query_param("id", "map2")
        .await
        .json();
    let lineage: Vec<&str> = lineage
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(lineage[0], "map2");
    assert!(lineage.contains(&ROADS));
    assert!(lineage.contains(&BASEMAP));

    server
        .get("/api/graph/lineage")
        .add_query_param("id", "missing")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn index_page_renders_selected_service() {
    let server = server().await;
    let res = server
        .get("/")
        .add_query_param("service", PARCELS)
        .await;
    res.assert_status_ok();
    let html = res.text();

    assert!(html.contains("<p id=\"items-count\">Services: 3</p>"));
    assert!(html.contains("Related items of"));
    assert!(html.contains("Item app1"));
    assert!(html.contains("Using a non-secure protocol"));
}

#[tokio::test]
async fn index_page_keeps_the_filter_on_service_links() {
    let server = server().await;
    let html = server
        .get("/")
        .add_query_param("access", "private")
        .await
        .text();

    let link = format!(
        "href=\"?access=private&amp;service={}\"",
        urlencoding::encode(ROADS)
    );
    assert!(html.contains(&link));
    assert!(html.contains("<p id=\"items-count\">Services: 1 of 3</p>"));
    assert_eq!(html.matches("<select").count(), 3);
    assert!(html.contains("<option value=\"private\" selected>"));
    assert!(html.contains("<option value=\"alice\">Alice Able</option>"));
    assert!(html.contains("<option value=\"partner\">partner</option>"));
    assert!(html.contains("id=\"clear-filters\" href=\"/\""));
}

#[tokio::test]
async fn selected_service_under_a_filter_shows_filtered_related_items() {
    let server = server().await;
    let html = server
        .get("/")
        .add_query_param("owner", "alice")
        .add_query_param("service", PARCELS)
        .await
        .text();

    assert!(html.contains("<option value=\"alice\" selected>Alice Able</option>"));
    assert!(html.contains("class=\"service-node selected\""));
    assert!(html.contains("Item map1"));
    // app1 belongs to an outside owner
    assert!(!html.contains("Item app1"));
}

#[tokio::test]
async fn event_stream_delivers_broadcast_events() {
    let dashboard = dashboard().await;
    let broadcaster = dashboard.broadcaster();
    let router = dashboard.router();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await });

    let mut res = reqwest::get(format!("http://{addr}/api/events/stream"))
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::OK);
    let content_type = res.headers()[reqwest::header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("text/event-stream"));

    // The handler subscribed before the headers were sent
    broadcaster.broadcast(
        CrawlEvent::new(CrawlEventType::ServiceAdded, 1)
            .with_url(PARCELS)
            .with_item("map1"),
    );

    let body = tokio::time::timeout(Duration::from_secs(5), async {
        let mut body = String::new();
        while let Some(chunk) = res.chunk().await.unwrap() {
            body.push_str(&String::from_utf8_lossy(&chunk));
            if body.contains("\n\n") {
                break;
            }
        }
        body
    })
    .await
    .expect("event should arrive on the stream");

    let data = body
        .lines()
        .find_map(|line| line.strip_prefix("data:"))
        .expect("stream should carry a data line");
    let event: Value = serde_json::from_str(data.trim()).unwrap();
    assert_eq!(event["event_type"], "service_added");
    assert_eq!(event["url"], PARCELS);
    assert_eq!(event["item_id"], "map1");
}

#[test]
fn broadcaster_fans_out_crawl_events() {
    let broadcaster = EventBroadcaster::new(8);
    let mut r1 = broadcaster.subscribe();
    let mut r2 = broadcaster.subscribe();
    assert_eq!(broadcaster.subscriber_count(), 2);

    broadcaster.broadcast(
        CrawlEvent::new(CrawlEventType::ServiceAdded, 1)
            .with_url(PARCELS)
            .with_item("map1"),
    );

    let e1 = r1.try_recv().expect("receiver 1 should get event");
    let e2 = r2.try_recv().expect("receiver 2 should get event");
    assert_eq!(e1.url.as_deref(), Some(PARCELS));
    assert_eq!(e2.item_id.as_deref(), Some("map1"));
}
