// In-memory portal used by the integration tests
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{json, Value};
use weft_core::{
    Access, OrgUser, PortalClient, PortalInfo, PortalItem, PortalUser, Result, SearchPage,
    SearchParams, UserPage, WeftError,
};

pub const ORG_ID: &str = "org123";

#[derive(Default)]
pub struct FakePortal {
    pub info: PortalInfo,
    items: HashMap<String, PortalItem>,
    data: HashMap<String, Value>,
    services: Vec<PortalItem>,
    maps: Vec<PortalItem>,
    users: Vec<OrgUser>,
    failing: HashSet<String>,
    pub search_calls: AtomicUsize,
    pub user_calls: AtomicUsize,
}

impl FakePortal {
    pub fn new() -> Self {
        Self {
            info: PortalInfo {
                id: Some(ORG_ID.into()),
                name: "Acme GIS".into(),
                url_key: Some("acme".into()),
                custom_base_url: Some("maps.arcgis.com".into()),
                user: None,
            },
            ..Default::default()
        }
    }

    pub fn signed_in(mut self, username: &str) -> Self {
        self.info.user = Some(PortalUser {
            username: username.into(),
            full_name: "Dana Scully".into(),
            email: format!("{username}@acme.example"),
            thumbnail: None,
        });
        self
    }

    /// Item reachable through `fetch_item` only
    pub fn with_item(mut self, item: PortalItem) -> Self {
        self.items.insert(item.id.clone(), item);
        self
    }

    pub fn with_data(mut self, id: &str, data: Value) -> Self {
        self.data.insert(id.into(), data);
        self
    }

    /// Returned by the services query
    pub fn with_service(mut self, item: PortalItem) -> Self {
        self.items.insert(item.id.clone(), item.clone());
        self.services.push(item);
        self
    }

    /// Returned by the maps query
    pub fn with_map(mut self, item: PortalItem, data: Value) -> Self {
        self.items.insert(item.id.clone(), item.clone());
        self.data.insert(item.id.clone(), data);
        self.maps.push(item);
        self
    }

    pub fn with_user(mut self, user: OrgUser) -> Self {
        self.users.push(user);
        self
    }

    /// Every request for this id fails
    pub fn failing(mut self, id: &str) -> Self {
        self.failing.insert(id.into());
        self
    }

    fn check(&self, id: &str) -> Result<()> {
        if self.failing.contains(id) {
            return Err(WeftError::PortalError {
                code: 500,
                message: format!("Item {id} is unavailable"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PortalClient for FakePortal {
    async fn portal_self(&self) -> Result<PortalInfo> {
        Ok(self.info.clone())
    }

    async fn query_items(&self, params: &SearchParams) -> Result<SearchPage> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let all = if params.query.contains("typekeywords") {
            &self.services
        } else {
            &self.maps
        };
        let first = (params.start.max(1) - 1) as usize;
        let results: Vec<PortalItem> = all
            .iter()
            .skip(first)
            .take(params.num as usize)
            .cloned()
            .collect();
        let end = first + results.len();
        Ok(SearchPage {
            total: all.len() as u64,
            start: params.start,
            num: results.len() as u32,
            next_start: if end < all.len() { end as i64 + 1 } else { -1 },
            results,
        })
    }

    async fn fetch_item(&self, id: &str) -> Result<PortalItem> {
        self.check(id)?;
        self.items.get(id).cloned().ok_or_else(|| WeftError::PortalError {
            code: 400,
            message: format!("Item does not exist or is inaccessible: {id}"),
        })
    }

    async fn fetch_item_data(&self, id: &str) -> Result<Value> {
        self.check(id)?;
        Ok(self.data.get(id).cloned().unwrap_or_else(|| json!({})))
    }

    async fn org_users(&self, start: u32, num: u32) -> Result<UserPage> {
        self.user_calls.fetch_add(1, Ordering::SeqCst);
        let users: Vec<OrgUser> = self
            .users
            .iter()
            .skip(start.saturating_sub(1) as usize)
            .take(num as usize)
            .cloned()
            .collect();
        Ok(UserPage {
            total: self.users.len() as u64,
            start: start as i64,
            num: users.len() as u32,
            next_start: -1,
            users,
        })
    }
}

pub fn item(id: &str, item_type: &str, access: Access, owner: &str, num_views: u64) -> PortalItem {
    PortalItem {
        id: id.into(),
        title: format!("Item {id}"),
        item_type: item_type.into(),
        access,
        owner: owner.into(),
        num_views,
        // 2018-03-05T12:00:00Z
        modified: 1_520_251_200_000,
        url: None,
        icon_url: None,
        type_keywords: Vec::new(),
    }
}

pub fn service_item(id: &str, url: &str, access: Access, owner: &str) -> PortalItem {
    PortalItem {
        url: Some(url.into()),
        type_keywords: vec!["Service".into()],
        ..item(id, "Map Service", access, owner, 0)
    }
}

pub fn web_map(id: &str, access: Access, owner: &str, num_views: u64) -> PortalItem {
    item(id, "Web Map", access, owner, num_views)
}

pub fn web_app(id: &str, access: Access, owner: &str, num_views: u64) -> PortalItem {
    item(id, "Web Mapping Application", access, owner, num_views)
}

/// Web map definition with one basemap layer and the given operational layer URLs
pub fn map_data(basemap: &str, operational: &[&str]) -> Value {
    json!({
        "baseMap": { "baseMapLayers": [ { "url": basemap } ] },
        "operationalLayers": operational.iter().map(|u| json!({ "url": u })).collect::<Vec<_>>(),
    })
}

pub fn org_user(username: &str, full_name: &str, email: &str) -> OrgUser {
    OrgUser {
        username: username.into(),
        full_name: full_name.into(),
        email: email.into(),
        role: "org_user".into(),
        level: "2".into(),
    }
}

pub const BASEMAP: &str = "https://services.arcgisonline.com/ArcGIS/rest/services/World_Topo_Map/MapServer";
pub const PARCELS: &str = "https://gis.acme.example/arcgis/rest/services/Parcels/MapServer";
pub const ROADS: &str = "http://legacy.acme.example:6080/arcgis/rest/services/Roads/MapServer";
