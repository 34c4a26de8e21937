// Service filters
//
// At most one filter is active at a time. The access and owner filters also narrow
// the related-items panel; the server filter only narrows the service rows.

use serde::{Deserialize, Serialize};

use crate::portal::{Access, PortalItem};
use crate::registry::{ServiceRegistry, ServiceUrlInfo};
use crate::report::format_thousands;
use crate::{Result, WeftError};

/// The active service filter
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ServiceFilter {
    #[default]
    None,
    ByAccess(Access),
    ByOwner(String),
    ByServer(String),
}

impl ServiceFilter {
    /// Build a filter from optional request parameters; more than one is rejected
    pub fn from_parts(
        access: Option<Access>,
        owner: Option<String>,
        server: Option<String>,
    ) -> Result<Self> {
        let owner = owner.filter(|o| !o.is_empty());
        let server = server.filter(|s| !s.is_empty());
        match (access, owner, server) {
            (None, None, None) => Ok(ServiceFilter::None),
            (Some(a), None, None) => Ok(ServiceFilter::ByAccess(a)),
            (None, Some(o), None) => Ok(ServiceFilter::ByOwner(o)),
            (None, None, Some(s)) => Ok(ServiceFilter::ByServer(s)),
            _ => Err(WeftError::ConfigError(
                "Only one of access, owner or server may be filtered at a time".to_string(),
            )),
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, ServiceFilter::None)
    }

    /// Query parameter that selects this filter on the dashboard page
    pub fn query_param(&self) -> Option<(&'static str, &str)> {
        match self {
            ServiceFilter::None => None,
            ServiceFilter::ByAccess(access) => Some(("access", access.as_str())),
            ServiceFilter::ByOwner(owner) => Some(("owner", owner)),
            ServiceFilter::ByServer(origin) => Some(("server", origin)),
        }
    }

    /// Predicate applied to related items
    pub fn matches_item(&self, item: &PortalItem) -> bool {
        match self {
            ServiceFilter::ByAccess(access) => item.access == *access,
            ServiceFilter::ByOwner(owner) => item.owner == *owner,
            ServiceFilter::None | ServiceFilter::ByServer(_) => true,
        }
    }

    /// Service rows visible under this filter
    pub fn apply<'a>(&self, registry: &'a ServiceRegistry) -> FilteredServices<'a> {
        let rows = match self {
            ServiceFilter::None => registry.iter().collect(),
            ServiceFilter::ByAccess(access) => registry.by_access(*access),
            ServiceFilter::ByOwner(owner) => registry.by_owner(owner),
            ServiceFilter::ByServer(origin) => registry.by_server(origin),
        };
        FilteredServices {
            rows,
            total: registry.len(),
            filtered: self.is_active(),
        }
    }
}

/// Result of applying a filter to the registry
#[derive(Debug)]
pub struct FilteredServices<'a> {
    pub rows: Vec<&'a ServiceUrlInfo>,
    pub total: usize,
    pub filtered: bool,
}

impl FilteredServices<'_> {
    /// "12 of 1,024" while filtered, "1,024" otherwise
    pub fn count_label(&self) -> String {
        if self.filtered {
            format!(
                "{} of {}",
                self.rows.len(),
                format_thousands(self.total as u64)
            )
        } else {
            format_thousands(self.total as u64)
        }
    }
}

/// Filter selection plus the service whose related items are on display
#[derive(Clone, Debug, Default)]
pub struct FilterState {
    active: ServiceFilter,
    selected_service: Option<String>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> &ServiceFilter {
        &self.active
    }

    pub fn selected_service(&self) -> Option<&str> {
        self.selected_service.as_deref()
    }

    /// `None` is the "no access filter" choice
    pub fn select_access(&mut self, access: Option<Access>) {
        self.set(access.map(ServiceFilter::ByAccess));
    }

    pub fn select_owner(&mut self, owner: Option<String>) {
        self.set(owner.map(ServiceFilter::ByOwner));
    }

    pub fn select_server(&mut self, origin: Option<String>) {
        self.set(origin.map(ServiceFilter::ByServer));
    }

    /// Reset every filter and the related-items panel
    pub fn clear(&mut self) {
        self.set(None);
    }

    /// Replace the active filter with any filter value
    pub fn select(&mut self, filter: ServiceFilter) {
        self.active = filter;
        self.selected_service = None;
    }

    /// Page link that shows a service's related items under the active filter
    pub fn service_link(&self, url: &str) -> String {
        let mut link = String::from("?");
        if let Some((key, value)) = self.active.query_param() {
            link.push_str(key);
            link.push('=');
            link.push_str(&urlencoding::encode(value));
            link.push('&');
        }
        link.push_str("service=");
        link.push_str(&urlencoding::encode(url));
        link
    }

    pub fn select_service(&mut self, url: impl Into<String>) {
        self.selected_service = Some(url.into());
    }

    pub fn clear_related(&mut self) {
        self.selected_service = None;
    }

    fn set(&mut self, filter: Option<ServiceFilter>) {
        self.select(filter.unwrap_or_default());
    }
}
