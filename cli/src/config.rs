use std::fs;
use std::path::{Path, PathBuf};

use weft_core::portal::PortalConfig;
use weft_core::registry::DEFAULT_RELATED_WARNING;
use weft_core::{CrawlConfig, DashboardConfig, SortOrder};

/// Everything the `weft` binary needs to reach a portal, crawl it and serve results
#[derive(Clone, Debug)]
pub struct WeftConfig {
    pub portal: PortalConfig,
    pub crawl: CrawlConfig,
    pub dashboard: DashboardConfig,
    /// Token from the environment; takes precedence over the stored session
    pub token: Option<String>,
    pub session_file: PathBuf,
    /// Related-item count above which a service is flagged
    pub related_warning: usize,
}

impl Default for WeftConfig {
    fn default() -> Self {
        Self {
            portal: PortalConfig::default(),
            crawl: CrawlConfig::default(),
            dashboard: DashboardConfig::from_env(),
            token: std::env::var("WEFT_TOKEN").ok().filter(|s| !s.is_empty()),
            session_file: std::env::var("WEFT_SESSION_FILE")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(default_session_file),
            related_warning: std::env::var("WEFT_RELATED_WARNING")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(DEFAULT_RELATED_WARNING),
        }
    }
}

fn default_session_file() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("weft").join("session.json"))
        .unwrap_or_else(|| PathBuf::from(".weft-session.json"))
}

impl WeftConfig {
    /// Load configuration from a TOML file (path via WEFT_CONFIG or ./weft.toml),
    /// overlaying values onto env-driven defaults.
    pub fn load() -> Self {
        let default = Self::default();
        let path = std::env::var("WEFT_CONFIG").unwrap_or_else(|_| "weft.toml".into());
        let p = Path::new(&path);
        if !p.exists() {
            tracing::debug!(target: "weft", path = %path, "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(p) {
            Ok(s) => match Self::overlay_toml(&s, default.clone()) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!(target: "weft", error = %e, "Failed to parse TOML; using defaults");
                    default
                }
            },
            Err(e) => {
                tracing::warn!(target: "weft", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }

    pub fn overlay_toml(s: &str, base: Self) -> Result<Self, toml::de::Error> {
        Ok(toml::from_str::<WeftToml>(s)?.overlay(base))
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct WeftToml {
    pub token: Option<String>,
    pub session_file: Option<PathBuf>,
    pub related_warning: Option<usize>,
    pub portal: Option<PortalToml>,
    pub crawl: Option<CrawlToml>,
    pub dashboard: Option<DashboardToml>,
}

impl WeftToml {
    fn overlay(self, mut base: WeftConfig) -> WeftConfig {
        if let Some(t) = self.token.filter(|t| !t.is_empty()) {
            base.token = Some(t);
        }
        if let Some(p) = self.session_file {
            base.session_file = p;
        }
        if let Some(n) = self.related_warning {
            base.related_warning = n;
        }
        if let Some(p) = self.portal {
            p.apply(&mut base.portal);
        }
        if let Some(c) = self.crawl {
            c.apply(&mut base.crawl);
        }
        if let Some(d) = self.dashboard {
            d.apply(&mut base.dashboard);
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct PortalToml {
    pub url: Option<String>,
    pub request_timeout_ms: Option<u64>,
    pub user_agent: Option<String>,
}
impl PortalToml {
    fn apply(self, p: &mut PortalConfig) {
        if let Some(v) = self.url {
            p.portal_url = v;
        }
        if let Some(v) = self.request_timeout_ms {
            p.request_timeout_ms = v;
        }
        if let Some(v) = self.user_agent {
            p.user_agent = v;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct CrawlToml {
    pub page_size: Option<u32>,
    pub sort_field: Option<String>,
    pub sort_order: Option<SortOrder>,
}
impl CrawlToml {
    fn apply(self, c: &mut CrawlConfig) {
        if let Some(v) = self.page_size {
            c.page_size = v.max(1);
        }
        if let Some(v) = self.sort_field {
            c.sort_field = v;
        }
        if let Some(v) = self.sort_order {
            c.sort_order = v;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct DashboardToml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub title: Option<String>,
}
impl DashboardToml {
    fn apply(self, d: &mut DashboardConfig) {
        if let Some(v) = self.host {
            d.host = v;
        }
        if let Some(v) = self.port {
            d.port = v;
        }
        if let Some(v) = self.title {
            d.title = v;
        }
    }
}
