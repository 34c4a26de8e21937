// Item crawler
//
// Pages through the organization's service items and map/app items. Each page is
// fully inspected before the next one is requested; the two queries run side by side
// and the crawl completes when both have settled.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::dashboard::{CrawlEvent, CrawlEventType, EventBroadcaster};
use crate::inspector::{Inspection, ItemInspector};
use crate::portal::{PortalClient, PortalInfo, SearchParams, SortOrder};
use crate::registry::SharedRegistry;
use crate::{Result, WeftError};

/// Hosted services, excluding data-only items
pub const SERVICES_QUERY: &str = r#"(typekeywords:"Service" AND typekeywords:"-Data")"#;

/// Maps, scenes and apps, excluding CityEngine scenes
pub const MAPS_QUERY: &str = r#"((type:"Web Map" OR type:"Web Scene" OR type:"Web Mapping Application") AND (-type:"CityEngine Web Scene"))"#;

/// Search settings shared by both queries
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CrawlConfig {
    pub page_size: u32,
    pub sort_field: String,
    pub sort_order: SortOrder,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            page_size: std::env::var("WEFT_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(100),
            sort_field: "numViews".to_string(),
            sort_order: SortOrder::Desc,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    Services,
    Maps,
}

impl QueryKind {
    fn label(&self) -> &'static str {
        match self {
            QueryKind::Services => "services",
            QueryKind::Maps => "maps",
        }
    }
}

/// Outcome of paging through one query
#[derive(Clone, Debug, Serialize)]
pub struct QueryReport {
    pub kind: QueryKind,
    pub query: String,
    pub pages: usize,
    pub items: usize,
    pub inspection: Inspection,
    /// Set when a search page request failed and paging stopped early
    pub error: Option<String>,
}

impl QueryReport {
    fn new(kind: QueryKind, query: &str) -> Self {
        Self {
            kind,
            query: query.to_string(),
            pages: 0,
            items: 0,
            inspection: Inspection::default(),
            error: None,
        }
    }
}

/// Outcome of a full crawl
#[derive(Clone, Debug, Serialize)]
pub struct CrawlReport {
    pub services: QueryReport,
    pub maps: QueryReport,
    pub service_count: usize,
    pub elapsed_ms: u64,
}

impl CrawlReport {
    pub fn failure_count(&self) -> usize {
        self.services.inspection.failures.len() + self.maps.inspection.failures.len()
    }

    pub fn is_complete(&self) -> bool {
        self.services.error.is_none() && self.maps.error.is_none()
    }
}

/// Drives the paged searches and hands results to the inspector
pub struct ItemCrawler<C: ?Sized> {
    client: Arc<C>,
    inspector: ItemInspector<C>,
    config: CrawlConfig,
    broadcaster: Option<EventBroadcaster>,
}

impl<C: PortalClient + ?Sized> ItemCrawler<C> {
    pub fn new(client: Arc<C>, registry: SharedRegistry) -> Self {
        let inspector = ItemInspector::new(Arc::clone(&client), registry);
        Self {
            client,
            inspector,
            config: CrawlConfig::default(),
            broadcaster: None,
        }
    }

    pub fn with_config(mut self, config: CrawlConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_broadcaster(mut self, broadcaster: EventBroadcaster) -> Self {
        self.inspector = self.inspector.clone().with_broadcaster(broadcaster.clone());
        self.broadcaster = Some(broadcaster);
        self
    }

    pub fn registry(&self) -> &SharedRegistry {
        self.inspector.registry()
    }

    /// Search parameters for the org's service items and map/app items
    pub fn org_queries(&self, org_id: &str) -> (SearchParams, SearchParams) {
        let org = format!("(orgid:{})", org_id);
        let build = |clause: &str| {
            SearchParams::new(format!("{} AND {}", org, clause))
                .sorted_by(self.config.sort_field.clone(), self.config.sort_order)
                .page_size(self.config.page_size)
        };
        (build(SERVICES_QUERY), build(MAPS_QUERY))
    }

    /// Crawl both queries of the portal's organization
    pub async fn crawl(&self, portal: &PortalInfo) -> Result<CrawlReport> {
        let org_id = portal.org_id().ok_or(WeftError::MissingOrganization)?;
        let (services_params, maps_params) = self.org_queries(org_id);
        let started = Instant::now();

        info!(target: "crawler", org_id = %org_id, portal = %portal.name, "Starting crawl");

        let (services, maps) = tokio::join!(
            self.crawl_query(services_params, QueryKind::Services),
            self.crawl_query(maps_params, QueryKind::Maps),
        );

        let service_count = self.registry().read().await.len();
        let report = CrawlReport {
            services,
            maps,
            service_count,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            target: "crawler",
            service_count,
            failures = report.failure_count(),
            elapsed_ms = report.elapsed_ms,
            "Crawl completed"
        );
        self.emit(
            CrawlEvent::new(CrawlEventType::CrawlCompleted, service_count).with_message(format!(
                "{} services, {} failed branches",
                service_count,
                report.failure_count()
            )),
        );
        Ok(report)
    }

    /// Page through one query until the portal reports no further page
    pub async fn crawl_query(&self, params: SearchParams, kind: QueryKind) -> QueryReport {
        let mut report = QueryReport::new(kind, &params.query);
        let mut next = Some(params);

        while let Some(current) = next.take() {
            let page = match self.client.query_items(&current).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(
                        target: "crawler",
                        query = kind.label(),
                        start = current.start,
                        error = %e,
                        "Search page failed; stopping this query"
                    );
                    report.error = Some(e.to_string());
                    break;
                }
            };

            report.pages += 1;
            report.items += page.results.len();

            let inspection: Inspection = match kind {
                QueryKind::Services => {
                    join_all(page.results.iter().map(|item| self.inspector.inspect_service_item(item)))
                        .await
                        .into_iter()
                        .collect()
                }
                QueryKind::Maps => {
                    join_all(page.results.iter().map(|item| self.inspector.inspect(item)))
                        .await
                        .into_iter()
                        .collect()
                }
            };
            report.inspection.merge(inspection);

            let service_count = self.registry().read().await.len();
            info!(
                target: "crawler",
                query = kind.label(),
                page = report.pages,
                items = page.results.len(),
                service_count,
                "Page inspected"
            );
            self.emit(
                CrawlEvent::new(CrawlEventType::PageInspected, service_count)
                    .with_message(format!("{} page {}", kind.label(), report.pages)),
            );

            next = page.next_params(&current);
        }

        report
    }

    fn emit(&self, event: CrawlEvent) {
        if let Some(broadcaster) = &self.broadcaster {
            broadcaster.broadcast(event);
        }
    }
}
