use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::WeftError;

/// Item sharing level
///
/// Variant order is the display precedence: public, org, shared, private.
/// Unrecognized values are treated as private.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Public,
    Org,
    Shared,
    #[serde(other)]
    Private,
}

impl Access {
    pub const ALL: [Access; 4] = [Access::Public, Access::Org, Access::Shared, Access::Private];

    pub fn as_str(&self) -> &'static str {
        match self {
            Access::Public => "public",
            Access::Org => "org",
            Access::Shared => "shared",
            Access::Private => "private",
        }
    }
}

impl Default for Access {
    fn default() -> Self {
        Access::Private
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Access {
    type Err = WeftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "public" => Ok(Access::Public),
            "org" => Ok(Access::Org),
            "shared" => Ok(Access::Shared),
            "private" => Ok(Access::Private),
            other => Err(WeftError::ConfigError(format!(
                "Unknown access level: {other} (expected public, org, shared or private)"
            ))),
        }
    }
}

/// Item types the inspector knows how to walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    WebMap,
    WebScene,
    WebMappingApplication,
    Other,
}

impl ItemKind {
    pub fn is_map(&self) -> bool {
        matches!(self, ItemKind::WebMap | ItemKind::WebScene)
    }
}

/// Portal content item snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalItem {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default)]
    pub item_type: String,
    #[serde(default)]
    pub access: Access,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub num_views: u64,
    /// Last modification, epoch milliseconds
    #[serde(default)]
    pub modified: i64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub icon_url: Option<String>,
    #[serde(default)]
    pub type_keywords: Vec<String>,
}

impl PortalItem {
    pub fn kind(&self) -> ItemKind {
        match self.item_type.as_str() {
            "Web Map" => ItemKind::WebMap,
            "Web Scene" => ItemKind::WebScene,
            "Web Mapping Application" => ItemKind::WebMappingApplication,
            _ => ItemKind::Other,
        }
    }

    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.modified).single()
    }

    /// Item details page on the portal
    pub fn page_url(&self, portal_home: &str) -> String {
        format!(
            "{}/home/item.html?id={}",
            portal_home.trim_end_matches('/'),
            self.id
        )
    }
}

/// Signed-in portal user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalUser {
    pub username: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

/// Response of `portals/self`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url_key: Option<String>,
    #[serde(default)]
    pub custom_base_url: Option<String>,
    #[serde(default)]
    pub user: Option<PortalUser>,
}

impl PortalInfo {
    /// Base URL used to build item page links
    pub fn home_url(&self, portal_url: &str) -> String {
        match (&self.url_key, &self.custom_base_url) {
            (Some(key), Some(base)) if !key.is_empty() && !base.is_empty() => {
                format!("https://{}.{}", key, base)
            }
            _ => portal_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn org_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Member of the organization user directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgUser {
    pub username: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub level: String,
}

impl OrgUser {
    /// Greeting name used in owner emails
    pub fn first_name(&self) -> &str {
        self.full_name.split(' ').next().unwrap_or_default()
    }
}

/// Response of `portals/self/users`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPage {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub start: i64,
    #[serde(default)]
    pub num: u32,
    #[serde(default = "no_next_page")]
    pub next_start: i64,
    #[serde(default)]
    pub users: Vec<OrgUser>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Paged item search request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    pub query: String,
    pub sort_field: String,
    pub sort_order: SortOrder,
    pub num: u32,
    /// 1-based index of the first result
    pub start: i64,
}

impl SearchParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            sort_field: "numViews".to_string(),
            sort_order: SortOrder::Desc,
            num: 100,
            start: 1,
        }
    }

    pub fn sorted_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort_field = field.into();
        self.sort_order = order;
        self
    }

    pub fn page_size(mut self, num: u32) -> Self {
        self.num = num.max(1);
        self
    }
}

/// One page of search results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub start: i64,
    #[serde(default)]
    pub num: u32,
    #[serde(default = "no_next_page")]
    pub next_start: i64,
    #[serde(default)]
    pub results: Vec<PortalItem>,
}

impl SearchPage {
    /// Parameters for the following page, or `None` when the portal reports no further page
    pub fn next_params(&self, current: &SearchParams) -> Option<SearchParams> {
        // A non-advancing cursor would page forever
        if self.next_start < 1 || self.next_start <= current.start {
            return None;
        }
        Some(SearchParams {
            start: self.next_start,
            ..current.clone()
        })
    }
}

fn no_next_page() -> i64 {
    -1
}
