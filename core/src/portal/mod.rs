// Portal module - content portal REST seam
//
// The crawler only talks to the portal through `PortalClient`, so tests can swap in
// an in-memory portal and the binary uses the reqwest-backed `RestPortalClient`.

mod data;
mod rest;
mod types;

pub use data::{AppData, AppValues, BaseMap, LayerReference, StoryData, StorySection, WebMapData};
pub use rest::RestPortalClient;
pub use types::{
    Access, ItemKind, OrgUser, PortalInfo, PortalItem, PortalUser, SearchPage, SearchParams,
    SortOrder, UserPage,
};

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Operations the crawler needs from a content portal
#[async_trait]
pub trait PortalClient: Send + Sync {
    /// Portal metadata, including the signed-in user when the credentials are valid
    async fn portal_self(&self) -> Result<PortalInfo>;

    /// One page of an item search
    async fn query_items(&self, params: &SearchParams) -> Result<SearchPage>;

    /// Item metadata by id
    async fn fetch_item(&self, id: &str) -> Result<PortalItem>;

    /// Item JSON payload (web map definition, app configuration, ...)
    async fn fetch_item_data(&self, id: &str) -> Result<serde_json::Value>;

    /// One page of the organization user list
    async fn org_users(&self, start: u32, num: u32) -> Result<UserPage>;
}

/// Configuration for the portal REST client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Portal base URL, e.g. https://www.arcgis.com or https://gis.example.com/portal
    pub portal_url: String,
    /// Timeout for API requests in milliseconds
    pub request_timeout_ms: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            portal_url: std::env::var("WEFT_PORTAL_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "https://www.arcgis.com".to_string()),
            request_timeout_ms: std::env::var("WEFT_REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30_000),
            user_agent: "weft/0.1".to_string(),
        }
    }
}
