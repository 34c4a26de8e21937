// Dashboard module - Service usage browser
//
// Provides a simple HTTP server with JSON endpoints, a server-rendered page, and SSE
// for streaming crawl progress to the web UI.

mod api;
mod event_stream;

pub use api::DashboardServer;
pub use event_stream::{CrawlEvent, CrawlEventType, EventBroadcaster};

use serde::{Deserialize, Serialize};

/// Dashboard configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DashboardConfig {
    pub port: u16,
    pub host: String,
    pub title: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            port: 3030,
            host: "127.0.0.1".to_string(),
            title: "Organization Services".to_string(),
        }
    }
}

impl DashboardConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: std::env::var("WEFT_DASHBOARD_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            host: std::env::var("WEFT_DASHBOARD_HOST").unwrap_or(defaults.host),
            title: std::env::var("WEFT_DASHBOARD_TITLE").unwrap_or(defaults.title),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
