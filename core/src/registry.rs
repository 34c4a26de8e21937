// Service registry
//
// Deduplicates discovered service URLs and keeps, per URL, every portal item that
// consumes it. Three secondary indices (access, owner, server origin) are maintained
// on insert; each registered URL appears in exactly one bucket of each index.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use url::Url;

use crate::filter::ServiceFilter;
use crate::portal::{Access, PortalItem};
use crate::{Result, WeftError};

/// Related-item count above which a service is flagged
pub const DEFAULT_RELATED_WARNING: usize = 25;

pub type SharedRegistry = Arc<RwLock<ServiceRegistry>>;

/// Parsed and classified service endpoint
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ServiceUrl {
    pub url: String,
    /// scheme://host[:port]
    pub origin: String,
    pub secure: bool,
}

impl ServiceUrl {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        // Protocol-relative layer URLs are common in older web maps
        let parsed = if raw.starts_with("//") {
            Url::parse(&format!("https:{raw}"))
        } else {
            Url::parse(raw)
        }
        .map_err(|e| WeftError::InvalidServiceUrl(format!("{raw}: {e}")))?;

        let secure = match parsed.scheme() {
            "https" => true,
            "http" => false,
            other => {
                return Err(WeftError::InvalidServiceUrl(format!(
                    "{raw}: unsupported scheme {other}"
                )))
            }
        };

        Ok(Self {
            url: raw.to_string(),
            origin: parsed.origin().ascii_serialization(),
            secure,
        })
    }
}

/// Display style of the related-items count
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Badge {
    Info,
    Warning,
}

/// What a single `record_service_use` call changed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordOutcome {
    /// First sighting of the URL
    Added,
    /// Item newly related to a known URL; carries the new related count
    Related { count: usize },
    /// Item was already related to the URL
    Unchanged,
}

/// A service URL and the items that use it
#[derive(Clone, Debug, Serialize)]
pub struct ServiceUrlInfo {
    pub url: String,
    pub origin: String,
    pub secure: bool,
    /// Access of the item that first referenced the URL
    pub access: Access,
    /// Owner of the item that first referenced the URL
    pub owner: String,
    /// Discovery order
    pub sequence: usize,
    #[serde(skip)]
    related_items: Vec<PortalItem>,
    #[serde(skip)]
    related_ids: HashSet<String>,
    /// Item id paths as recorded, e.g. [layer item, map, app]
    #[serde(skip)]
    chains: Vec<Vec<String>>,
}

impl ServiceUrlInfo {
    fn new(service: ServiceUrl, item: &PortalItem, sequence: usize) -> Self {
        let mut info = Self {
            url: service.url,
            origin: service.origin,
            secure: service.secure,
            access: item.access,
            owner: item.owner.clone(),
            sequence,
            related_items: Vec::new(),
            related_ids: HashSet::new(),
            chains: Vec::new(),
        };
        info.relate(item);
        info
    }

    fn relate(&mut self, item: &PortalItem) -> bool {
        if !self.related_ids.insert(item.id.clone()) {
            return false;
        }
        self.related_items.push(item.clone());
        true
    }

    fn add_chain(&mut self, chain: Vec<String>) {
        if !chain.is_empty() && !self.chains.contains(&chain) {
            self.chains.push(chain);
        }
    }

    pub fn related_count(&self) -> usize {
        self.related_items.len()
    }

    /// Related items in the order they were first seen
    pub fn related_items(&self) -> &[PortalItem] {
        &self.related_items
    }

    pub fn is_related(&self, item_id: &str) -> bool {
        self.related_ids.contains(item_id)
    }

    pub fn chains(&self) -> &[Vec<String>] {
        &self.chains
    }

    pub fn badge(&self, warning_threshold: usize) -> Badge {
        if self.related_count() > warning_threshold {
            Badge::Warning
        } else {
            Badge::Info
        }
    }

    /// Path after `/rest/services/`, or the whole path when absent
    pub fn service_name(&self) -> String {
        let path = Url::parse(&self.url)
            .or_else(|_| Url::parse(&format!("https:{}", self.url)))
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| self.url.clone());
        const REST_SERVICES: &str = "/rest/services/";
        match path.find(REST_SERVICES) {
            Some(idx) => path[idx + REST_SERVICES.len()..].to_string(),
            None => path,
        }
    }
}

/// Registry of every service URL seen during a crawl
#[derive(Debug)]
pub struct ServiceRegistry {
    services: HashMap<String, ServiceUrlInfo>,
    order: Vec<String>,
    by_access: BTreeMap<Access, Vec<String>>,
    by_owner: BTreeMap<String, Vec<String>>,
    by_server: BTreeMap<String, Vec<String>>,
    warning_threshold: usize,
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::with_warning_threshold(DEFAULT_RELATED_WARNING)
    }

    pub fn with_warning_threshold(warning_threshold: usize) -> Self {
        Self {
            services: HashMap::new(),
            order: Vec::new(),
            by_access: Access::ALL.iter().map(|a| (*a, Vec::new())).collect(),
            by_owner: BTreeMap::new(),
            by_server: BTreeMap::new(),
            warning_threshold,
        }
    }

    pub fn shared(self) -> SharedRegistry {
        Arc::new(RwLock::new(self))
    }

    pub fn warning_threshold(&self) -> usize {
        self.warning_threshold
    }

    /// Record that `item` consumes `url`
    pub fn record_service_use(&mut self, url: &str, item: &PortalItem) -> Result<RecordOutcome> {
        let key = url.trim();
        if let Some(info) = self.services.get_mut(key) {
            info.add_chain(vec![item.id.clone()]);
            if info.relate(item) {
                return Ok(RecordOutcome::Related {
                    count: info.related_count(),
                });
            }
            return Ok(RecordOutcome::Unchanged);
        }

        let service = ServiceUrl::parse(key)?;
        let mut info = ServiceUrlInfo::new(service, item, self.order.len());
        info.add_chain(vec![item.id.clone()]);
        self.insert(info);
        Ok(RecordOutcome::Added)
    }

    /// Record a chain of items (layer item, map, app) that reach `url`
    ///
    /// Absent entries are skipped; the first present item classifies a new URL.
    pub fn record_service_uses(
        &mut self,
        url: &str,
        items: &[Option<&PortalItem>],
    ) -> Result<Vec<RecordOutcome>> {
        let present: Vec<&PortalItem> = items.iter().flatten().copied().collect();
        let Some(first) = present.first() else {
            return Ok(Vec::new());
        };

        let key = url.trim();
        let mut outcomes = Vec::with_capacity(present.len());
        if !self.services.contains_key(key) {
            let service = ServiceUrl::parse(key)?;
            self.insert(ServiceUrlInfo::new(service, first, self.order.len()));
            outcomes.push(RecordOutcome::Added);
        } else {
            outcomes.push(self.relate_existing(key, first));
        }
        for item in &present[1..] {
            outcomes.push(self.relate_existing(key, item));
        }

        if let Some(info) = self.services.get_mut(key) {
            info.add_chain(present.iter().map(|i| i.id.clone()).collect());
        }
        Ok(outcomes)
    }

    fn relate_existing(&mut self, key: &str, item: &PortalItem) -> RecordOutcome {
        match self.services.get_mut(key) {
            Some(info) => {
                if info.relate(item) {
                    RecordOutcome::Related {
                        count: info.related_count(),
                    }
                } else {
                    RecordOutcome::Unchanged
                }
            }
            None => RecordOutcome::Unchanged,
        }
    }

    fn insert(&mut self, info: ServiceUrlInfo) {
        let url = info.url.clone();
        self.by_access.entry(info.access).or_default().push(url.clone());
        self.by_owner
            .entry(info.owner.clone())
            .or_default()
            .push(url.clone());
        self.by_server
            .entry(info.origin.clone())
            .or_default()
            .push(url.clone());
        self.order.push(url.clone());
        self.services.insert(url, info);
    }

    pub fn get(&self, url: &str) -> Option<&ServiceUrlInfo> {
        self.services.get(url.trim())
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// All services in discovery order
    pub fn iter(&self) -> impl Iterator<Item = &ServiceUrlInfo> {
        self.order.iter().filter_map(|url| self.services.get(url))
    }

    pub fn by_access(&self, access: Access) -> Vec<&ServiceUrlInfo> {
        self.lookup(self.by_access.get(&access))
    }

    pub fn by_owner(&self, owner: &str) -> Vec<&ServiceUrlInfo> {
        self.lookup(self.by_owner.get(owner))
    }

    pub fn by_server(&self, origin: &str) -> Vec<&ServiceUrlInfo> {
        self.lookup(self.by_server.get(origin))
    }

    fn lookup(&self, urls: Option<&Vec<String>>) -> Vec<&ServiceUrlInfo> {
        urls.map(|urls| urls.iter().filter_map(|u| self.services.get(u)).collect())
            .unwrap_or_default()
    }

    /// Service count per access level, all four levels present
    pub fn access_counts(&self) -> Vec<(Access, usize)> {
        self.by_access.iter().map(|(a, urls)| (*a, urls.len())).collect()
    }

    /// Owners of the items that introduced each service, sorted
    pub fn owners(&self) -> Vec<&str> {
        self.by_owner.keys().map(String::as_str).collect()
    }

    /// Server origins with their service count, sorted
    pub fn servers(&self) -> Vec<(&str, usize)> {
        self.by_server
            .iter()
            .map(|(origin, urls)| (origin.as_str(), urls.len()))
            .collect()
    }
}

/// Related items of a service that pass the item filter, ordered by access
/// precedence (public, org, shared, private) then by descending view count
pub fn filter_and_sort<'a>(info: &'a ServiceUrlInfo, filter: &ServiceFilter) -> Vec<&'a PortalItem> {
    let mut items: Vec<&PortalItem> = info
        .related_items()
        .iter()
        .filter(|item| filter.matches_item(item))
        .collect();
    items.sort_by(|a, b| {
        a.access
            .cmp(&b.access)
            .then_with(|| b.num_views.cmp(&a.num_views))
    });
    items
}
