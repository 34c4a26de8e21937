// Item inspector
//
// Walks map, scene and app item definitions down to the service URLs their layers
// consume. Recursion is fixed at app -> map -> layer item. Sibling layers and story
// sections are fetched concurrently and joined; a failing branch is recorded in the
// returned `Inspection` and never aborts its siblings.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::dashboard::{CrawlEvent, CrawlEventType, EventBroadcaster};
use crate::portal::{AppData, ItemKind, LayerReference, PortalClient, PortalItem, WebMapData};
use crate::registry::{RecordOutcome, SharedRegistry};

/// A branch of the crawl that could not be completed
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BranchFailure {
    pub item_id: String,
    pub reason: String,
}

/// Tally of one inspection subtree
#[derive(Clone, Debug, Default, Serialize)]
pub struct Inspection {
    /// Items whose data was fetched and walked
    pub items_inspected: usize,
    /// Successful (url, items) recordings
    pub service_uses: usize,
    /// Items, sections or apps skipped as not applicable
    pub skipped: usize,
    pub failures: Vec<BranchFailure>,
}

impl Inspection {
    fn skipped() -> Self {
        Self {
            skipped: 1,
            ..Default::default()
        }
    }

    fn failed(item_id: &str, reason: impl Into<String>) -> Self {
        Self {
            failures: vec![BranchFailure {
                item_id: item_id.to_string(),
                reason: reason.into(),
            }],
            ..Default::default()
        }
    }

    pub fn merge(&mut self, other: Inspection) {
        self.items_inspected += other.items_inspected;
        self.service_uses += other.service_uses;
        self.skipped += other.skipped;
        self.failures.extend(other.failures);
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl FromIterator<Inspection> for Inspection {
    fn from_iter<I: IntoIterator<Item = Inspection>>(iter: I) -> Self {
        let mut total = Inspection::default();
        for part in iter {
            total.merge(part);
        }
        total
    }
}

/// Resolves items into service URL usage and records it in the registry
pub struct ItemInspector<C: ?Sized> {
    client: Arc<C>,
    registry: SharedRegistry,
    broadcaster: Option<EventBroadcaster>,
}

impl<C: ?Sized> Clone for ItemInspector<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            registry: Arc::clone(&self.registry),
            broadcaster: self.broadcaster.clone(),
        }
    }
}

impl<C: PortalClient + ?Sized> ItemInspector<C> {
    pub fn new(client: Arc<C>, registry: SharedRegistry) -> Self {
        Self {
            client,
            registry,
            broadcaster: None,
        }
    }

    pub fn with_broadcaster(mut self, broadcaster: EventBroadcaster) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// Dispatch a map, scene or app search result
    pub async fn inspect(&self, item: &PortalItem) -> Inspection {
        match item.kind() {
            ItemKind::WebMappingApplication => self.inspect_app(item).await,
            ItemKind::WebMap | ItemKind::WebScene => self.inspect_map(item, None).await,
            ItemKind::Other => {
                warn!(
                    target: "inspector",
                    item_id = %item.id,
                    item_type = %item.item_type,
                    title = %item.title,
                    "Unknown map type; skipping"
                );
                Inspection::skipped()
            }
        }
    }

    /// A service item consumes its own URL
    pub async fn inspect_service_item(&self, item: &PortalItem) -> Inspection {
        match item.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
            Some(url) => self.record(url, &[Some(item)], &item.id).await,
            None => {
                debug!(target: "inspector", item_id = %item.id, "Service item has no URL; skipping");
                Inspection::skipped()
            }
        }
    }

    /// Walk the base-map and operational layers of a web map or web scene
    pub async fn inspect_map(&self, map: &PortalItem, related: Option<&PortalItem>) -> Inspection {
        let value = match self.client.fetch_item_data(&map.id).await {
            Ok(value) => value,
            Err(e) => return self.fail(&map.id, format!("Failed to fetch map data: {e}")).await,
        };
        let data: WebMapData = match serde_json::from_value(value) {
            Ok(data) => data,
            Err(e) => return self.fail(&map.id, format!("Unreadable map definition: {e}")).await,
        };

        let branches = data
            .layers()
            .into_iter()
            .filter(|layer| layer.service_url().is_some())
            .map(|layer| self.inspect_layer(layer, map, related));

        let mut inspection: Inspection = join_all(branches).await.into_iter().collect();
        inspection.items_inspected += 1;
        debug!(
            target: "inspector",
            map_id = %map.id,
            service_uses = inspection.service_uses,
            "Map inspected"
        );
        inspection
    }

    async fn inspect_layer(
        &self,
        layer: &LayerReference,
        map: &PortalItem,
        related: Option<&PortalItem>,
    ) -> Inspection {
        let Some(url) = layer.service_url() else {
            return Inspection::default();
        };
        match layer.layer_item_id() {
            Some(layer_item_id) => match self.client.fetch_item(layer_item_id).await {
                Ok(layer_item) => {
                    self.record(url, &[Some(&layer_item), Some(map), related], &map.id)
                        .await
                }
                Err(e) => {
                    self.fail(
                        layer_item_id,
                        format!("Failed to load layer item of map {}: {e}", map.id),
                    )
                    .await
                }
            },
            None => self.record(url, &[Some(map), related], &map.id).await,
        }
    }

    /// Resolve the map, scene or story maps an app is built on
    pub async fn inspect_app(&self, app: &PortalItem) -> Inspection {
        let value = match self.client.fetch_item_data(&app.id).await {
            Ok(value) => value,
            Err(e) => return self.fail(&app.id, format!("Failed to fetch app data: {e}")).await,
        };
        let data: AppData = match serde_json::from_value(value) {
            Ok(data) => data,
            Err(e) => return self.fail(&app.id, format!("Unreadable app configuration: {e}")).await,
        };

        let mut inspection = if let Some(map_id) = data.values.map_id() {
            self.inspect_referenced_map(map_id, app).await
        } else if let Some(story) = &data.values.story {
            match story.sections() {
                Some(sections) => {
                    let branches = sections.iter().map(|section| async move {
                        match section.webmap_id() {
                            Some(map_id) => self.inspect_referenced_map(map_id, app).await,
                            None => {
                                info!(
                                    target: "inspector",
                                    app_id = %app.id,
                                    media_type = %section.media.media_type,
                                    "Story map section is not a web map"
                                );
                                Inspection::skipped()
                            }
                        }
                    });
                    join_all(branches).await.into_iter().collect()
                }
                None => {
                    warn!(
                        target: "inspector",
                        app_id = %app.id,
                        title = %app.title,
                        "Story map app without sections or entries; skipping"
                    );
                    Inspection::skipped()
                }
            }
        } else {
            warn!(
                target: "inspector",
                app_id = %app.id,
                title = %app.title,
                "Could not find the map behind app; skipping"
            );
            Inspection::skipped()
        };
        inspection.items_inspected += 1;
        inspection
    }

    async fn inspect_referenced_map(&self, map_id: &str, app: &PortalItem) -> Inspection {
        match self.client.fetch_item(map_id).await {
            Ok(map) => self.inspect_map(&map, Some(app)).await,
            Err(e) => {
                self.fail(
                    map_id,
                    format!("Failed to load map referenced by app {}: {e}", app.id),
                )
                .await
            }
        }
    }

    async fn record(&self, url: &str, items: &[Option<&PortalItem>], origin_id: &str) -> Inspection {
        let mut registry = self.registry.write().await;
        let outcomes = match registry.record_service_uses(url, items) {
            Ok(outcomes) => outcomes,
            Err(e) => {
                drop(registry);
                return self.fail(origin_id, e.to_string()).await;
            }
        };

        if let Some(broadcaster) = &self.broadcaster {
            let service_count = registry.len();
            for (outcome, item) in outcomes.iter().zip(items.iter().flatten()) {
                let event = match outcome {
                    RecordOutcome::Added => CrawlEvent::new(CrawlEventType::ServiceAdded, service_count)
                        .with_related_count(1),
                    RecordOutcome::Related { count } => {
                        CrawlEvent::new(CrawlEventType::RelatedItemAdded, service_count)
                            .with_related_count(*count)
                    }
                    RecordOutcome::Unchanged => continue,
                };
                broadcaster.broadcast(event.with_url(url).with_item(item.id.clone()));
            }
        }

        Inspection {
            service_uses: 1,
            ..Default::default()
        }
    }

    async fn fail(&self, item_id: &str, reason: String) -> Inspection {
        warn!(target: "inspector", item_id = %item_id, reason = %reason, "Branch failed; continuing");
        if let Some(broadcaster) = &self.broadcaster {
            let service_count = self.registry.read().await.len();
            broadcaster.broadcast(
                CrawlEvent::new(CrawlEventType::BranchFailed, service_count)
                    .with_item(item_id)
                    .with_message(reason.clone()),
            );
        }
        Inspection::failed(item_id, reason)
    }
}
