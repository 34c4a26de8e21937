// Dashboard HTTP API server
//
// Provides REST endpoints and SSE streaming for the Dashboard UI

use crate::dashboard::event_stream::EventBroadcaster;
use crate::dashboard::DashboardConfig;
use crate::directory::{OrgDirectory, OwnerOptions};
use crate::filter::{FilterState, ServiceFilter};
use crate::graph::RelationshipGraph;
use crate::portal::{Access, PortalUser};
use crate::registry::{Badge, SharedRegistry};
use crate::report::{self, FilterChoices, RelatedItemRow, ReportContext, ServicesReport};
use crate::session::Session;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive},
        Html, Sse,
    },
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

type ApiError = (StatusCode, String);

/// Dashboard server state
#[derive(Clone)]
struct DashboardState {
    registry: SharedRegistry,
    directory: Arc<OrgDirectory>,
    session: Arc<Session>,
    home_url: String,
    title: String,
    broadcaster: EventBroadcaster,
}

impl DashboardState {
    fn user(&self) -> Option<&PortalUser> {
        self.session.user()
    }
}

/// Dashboard HTTP server
pub struct DashboardServer {
    config: DashboardConfig,
    state: DashboardState,
}

impl DashboardServer {
    pub fn new(
        config: DashboardConfig,
        registry: SharedRegistry,
        directory: Arc<OrgDirectory>,
        session: Session,
        portal_url: &str,
    ) -> Self {
        let state = DashboardState {
            registry,
            directory,
            home_url: session.home_url(portal_url),
            session: Arc::new(session),
            title: config.title.clone(),
            broadcaster: EventBroadcaster::default(),
        };
        Self { config, state }
    }

    pub fn with_broadcaster(mut self, broadcaster: EventBroadcaster) -> Self {
        self.state.broadcaster = broadcaster;
        self
    }

    /// Broadcaster whose events are streamed to SSE clients
    pub fn broadcaster(&self) -> EventBroadcaster {
        self.state.broadcaster.clone()
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(index_handler))
            .route("/api/summary", get(summary_handler))
            .route("/api/services", get(services_handler))
            .route("/api/services/related", get(related_handler))
            .route("/api/filters", get(filters_handler))
            .route("/api/graph", get(graph_handler))
            .route("/api/graph/lineage", get(lineage_handler))
            .route("/api/events/stream", get(event_stream_handler))
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .with_state(self.state.clone())
    }

    /// Start the Dashboard server
    pub async fn serve(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = self.config.addr();
        info!(
            target: "dashboard",
            addr = %addr,
            "Starting Dashboard server"
        );

        let app = self.router();
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!(
            target: "dashboard",
            url = %format!("http://{}", addr),
            "Dashboard server ready"
        );

        axum::serve(listener, app).await?;

        Ok(())
    }
}

/// Filter query parameters; at most one of access, owner, server
#[derive(Debug, Default, Deserialize)]
struct FilterQuery {
    access: Option<String>,
    owner: Option<String>,
    server: Option<String>,
    /// Service whose related items are shown (page only)
    service: Option<String>,
}

impl FilterQuery {
    fn filter(&self) -> Result<ServiceFilter, ApiError> {
        let access = match self.access.as_deref().filter(|a| !a.is_empty()) {
            Some(a) => Some(
                a.parse::<Access>()
                    .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?,
            ),
            None => None,
        };
        ServiceFilter::from_parts(access, self.owner.clone(), self.server.clone())
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))
    }
}

/// Serve the server-rendered page
async fn index_handler(
    State(state): State<DashboardState>,
    Query(query): Query<FilterQuery>,
) -> Result<Html<String>, ApiError> {
    let mut page = FilterState::new();
    page.select(query.filter()?);

    let registry = state.registry.read().await;
    let view = page.active().apply(&registry);
    let services = ServicesReport::new(page.active(), &view, registry.warning_threshold());
    let choices = FilterChoices::new(&registry, &state.directory);

    let ctx = ReportContext {
        home_url: state.home_url.clone(),
        directory: &state.directory,
        user: state.user(),
        warning_threshold: registry.warning_threshold(),
    };
    let related = match query.service.as_deref().and_then(|url| registry.get(url)) {
        Some(info) => {
            page.select_service(info.url.clone());
            Some(report::related_rows(info, page.active(), &ctx))
        }
        None => None,
    };

    let html = report::render_html_page(
        &state.title,
        &services,
        &page,
        &choices,
        related.as_deref(),
    );
    Ok(Html(html))
}

#[derive(Serialize)]
struct AccessCount {
    access: Access,
    count: usize,
}

#[derive(Serialize)]
struct ServerCount {
    origin: String,
    secure: bool,
    count: usize,
}

#[derive(Serialize)]
struct SummaryResponse {
    portal: String,
    home_url: String,
    signed_in_user: Option<String>,
    service_count: usize,
    insecure_count: usize,
    access: Vec<AccessCount>,
    owner_count: usize,
    server_count: usize,
}

/// Service totals
async fn summary_handler(State(state): State<DashboardState>) -> Json<SummaryResponse> {
    let registry = state.registry.read().await;
    Json(SummaryResponse {
        portal: state.session.portal().name.clone(),
        home_url: state.home_url.clone(),
        signed_in_user: state.user().map(|u| u.username.clone()),
        service_count: registry.len(),
        insecure_count: registry.iter().filter(|s| !s.secure).count(),
        access: access_counts(&registry),
        owner_count: registry.owners().len(),
        server_count: registry.servers().len(),
    })
}

fn access_counts(registry: &crate::registry::ServiceRegistry) -> Vec<AccessCount> {
    registry
        .access_counts()
        .into_iter()
        .map(|(access, count)| AccessCount { access, count })
        .collect()
}

/// Service rows under the requested filter
async fn services_handler(
    State(state): State<DashboardState>,
    Query(query): Query<FilterQuery>,
) -> Result<Json<ServicesReport>, ApiError> {
    let filter = query.filter()?;
    let registry = state.registry.read().await;
    let view = filter.apply(&registry);
    Ok(Json(ServicesReport::new(
        &filter,
        &view,
        registry.warning_threshold(),
    )))
}

#[derive(Debug, Deserialize)]
struct RelatedQuery {
    url: String,
    access: Option<String>,
    owner: Option<String>,
}

#[derive(Serialize)]
struct RelatedResponse {
    url: String,
    secure: bool,
    related_count: usize,
    badge: Badge,
    items: Vec<RelatedItemRow>,
}

/// Related items of one service, filtered by access or owner
async fn related_handler(
    State(state): State<DashboardState>,
    Query(query): Query<RelatedQuery>,
) -> Result<Json<RelatedResponse>, ApiError> {
    let filter = FilterQuery {
        access: query.access,
        owner: query.owner,
        ..Default::default()
    }
    .filter()?;

    let registry = state.registry.read().await;
    let info = registry
        .get(&query.url)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Unknown service: {}", query.url)))?;

    let ctx = ReportContext {
        home_url: state.home_url.clone(),
        directory: &state.directory,
        user: state.user(),
        warning_threshold: registry.warning_threshold(),
    };
    Ok(Json(RelatedResponse {
        url: info.url.clone(),
        secure: info.secure,
        related_count: info.related_count(),
        badge: info.badge(registry.warning_threshold()),
        items: report::related_rows(info, &filter, &ctx),
    }))
}

#[derive(Serialize)]
struct FiltersResponse {
    access: Vec<AccessCount>,
    owners: OwnerOptions,
    servers: Vec<ServerCount>,
}

/// Choices for the three filter controls
async fn filters_handler(State(state): State<DashboardState>) -> Json<FiltersResponse> {
    let registry = state.registry.read().await;
    Json(FiltersResponse {
        access: access_counts(&registry),
        owners: state.directory.owner_options(registry.owners()),
        servers: registry
            .servers()
            .into_iter()
            .map(|(origin, count)| ServerCount {
                origin: origin.to_string(),
                secure: origin.starts_with("https://"),
                count,
            })
            .collect(),
    })
}

/// Get current relationship graph snapshot
async fn graph_handler(State(state): State<DashboardState>) -> Json<RelationshipGraph> {
    let registry = state.registry.read().await;
    Json(RelationshipGraph::from_registry(&registry))
}

#[derive(Debug, Deserialize)]
struct LineageQuery {
    id: String,
}

/// Node ids connected to one graph node, consumers first
async fn lineage_handler(
    State(state): State<DashboardState>,
    Query(query): Query<LineageQuery>,
) -> Result<Json<Vec<String>>, ApiError> {
    let registry = state.registry.read().await;
    let lineage = RelationshipGraph::from_registry(&registry).lineage(&query.id);
    if lineage.is_empty() {
        return Err((StatusCode::NOT_FOUND, format!("Unknown node: {}", query.id)));
    }
    Ok(Json(lineage))
}

/// SSE endpoint for crawl progress
async fn event_stream_handler(
    State(state): State<DashboardState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    info!(target: "dashboard", "New SSE client connected");

    let rx = state.broadcaster.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => match serde_json::to_string(&event) {
            Ok(json) => Some(Ok(Event::default().data(json))),
            Err(e) => {
                warn!(target: "dashboard", error = %e, "Failed to serialize event");
                None
            }
        },
        Err(e) => {
            warn!(target: "dashboard", error = %e, "Broadcast error");
            None
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
