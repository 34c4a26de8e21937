//! Portal REST client
//!
//! Talks to the `sharing/rest` API of an ArcGIS-style portal. Every call asks for
//! `f=json` and carries the session token when one is set.

use super::types::{PortalInfo, PortalItem, SearchPage, SearchParams, UserPage};
use super::{PortalClient, PortalConfig};
use crate::{Result, WeftError};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

/// reqwest-backed portal client
#[derive(Clone)]
pub struct RestPortalClient {
    config: PortalConfig,
    token: Option<String>,
    http: Client,
}

impl RestPortalClient {
    pub fn new(config: PortalConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| WeftError::HttpError(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            config,
            token: None,
            http,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(PortalConfig::default())
    }

    /// Attach an identity token issued by the portal
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.token = if token.is_empty() { None } else { Some(token) };
        self
    }

    pub fn portal_url(&self) -> &str {
        self.config.portal_url.trim_end_matches('/')
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/sharing/rest/{}", self.portal_url(), path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = self.endpoint(path);
        debug!(target: "portal", url = %url, "GET");

        let mut req = self.http.get(&url).query(&[("f", "json")]).query(query);
        if let Some(token) = &self.token {
            req = req.query(&[("token", token.as_str())]);
        }

        let response = req.send().await.map_err(|e| {
            warn!(target: "portal", error = %e, url = %url, "Portal request failed");
            WeftError::HttpError(format!("Request to {} failed: {}", url, e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            warn!(target: "portal", status = %status, url = %url, "Portal returned error status");
            return Err(WeftError::HttpError(format!(
                "Portal returned status {} for {}",
                status, url
            )));
        }

        let value: serde_json::Value = response.json().await.map_err(|e| {
            warn!(target: "portal", error = %e, url = %url, "Failed to parse portal response");
            WeftError::HttpError(format!("Failed to parse response from {}: {}", url, e))
        })?;

        check_portal_error(&value)?;
        Ok(serde_json::from_value(value)?)
    }
}

/// The portal reports failures as HTTP 200 with an `error` object
pub(crate) fn check_portal_error(value: &serde_json::Value) -> Result<()> {
    let Some(error) = value.get("error") else {
        return Ok(());
    };
    let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(0);
    let message = error
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("unknown portal error")
        .to_string();
    warn!(target: "portal", code, message = %message, "Portal error response");
    Err(WeftError::PortalError { code, message })
}

#[async_trait]
impl PortalClient for RestPortalClient {
    async fn portal_self(&self) -> Result<PortalInfo> {
        self.get_json("portals/self", &[]).await
    }

    async fn query_items(&self, params: &SearchParams) -> Result<SearchPage> {
        self.get_json(
            "search",
            &[
                ("q", params.query.clone()),
                ("sortField", params.sort_field.clone()),
                ("sortOrder", params.sort_order.as_str().to_string()),
                ("num", params.num.to_string()),
                ("start", params.start.to_string()),
            ],
        )
        .await
    }

    async fn fetch_item(&self, id: &str) -> Result<PortalItem> {
        self.get_json(&format!("content/items/{}", id), &[]).await
    }

    async fn fetch_item_data(&self, id: &str) -> Result<serde_json::Value> {
        self.get_json(&format!("content/items/{}/data", id), &[])
            .await
    }

    async fn org_users(&self, start: u32, num: u32) -> Result<UserPage> {
        self.get_json(
            "portals/self/users",
            &[("start", start.to_string()), ("num", num.to_string())],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_portal_error_body() {
        let err = check_portal_error(&json!({
            "error": { "code": 498, "message": "Invalid token.", "details": [] }
        }))
        .unwrap_err();
        match err {
            WeftError::PortalError { code, message } => {
                assert_eq!(code, 498);
                assert_eq!(message, "Invalid token.");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(check_portal_error(&json!({ "id": "x" })).is_ok());
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = RestPortalClient::new(PortalConfig {
            portal_url: "https://gis.example.com/portal/".into(),
            request_timeout_ms: 1_000,
            user_agent: "test".into(),
        })
        .unwrap()
        .with_token("");
        assert_eq!(
            client.endpoint("portals/self"),
            "https://gis.example.com/portal/sharing/rest/portals/self"
        );
        assert!(!client.has_token());
    }
}
