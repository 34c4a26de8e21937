// Subcommand implementations
//
// Every command that talks to the portal builds one `RestPortalClient`, carrying the
// token from WEFT_TOKEN or the stored session when one exists for the portal.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};
use weft_core::report::{self, FilterChoices, RelatedItemRow, ReportContext, ServicesReport};
use weft_core::{
    CrawlReport, DashboardServer, EventBroadcaster, FilterState, ItemCrawler, OrgDirectory,
    RestPortalClient, ServiceFilter, ServiceRegistry, Session, SessionStore, SharedRegistry,
    StoredCredentials,
};

use crate::config::WeftConfig;

pub type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Html,
}

fn store(cfg: &WeftConfig) -> SessionStore {
    SessionStore::new(cfg.session_file.clone())
}

/// Client carrying the env token, else the stored token for this portal, else none
fn portal_client(cfg: &WeftConfig) -> CliResult<RestPortalClient> {
    let client = RestPortalClient::new(cfg.portal.clone())?;
    if let Some(token) = &cfg.token {
        return Ok(client.with_token(token.clone()));
    }
    match Session::restore(&store(cfg), &cfg.portal.portal_url)? {
        Some(token) => Ok(client.with_token(token)),
        None => Ok(client),
    }
}

pub async fn sign_in(cfg: &WeftConfig, token: Option<String>) -> CliResult<()> {
    let token = token
        .or_else(|| cfg.token.clone())
        .ok_or("No token given; pass --token or set WEFT_TOKEN")?;
    let client = RestPortalClient::new(cfg.portal.clone())?.with_token(token.clone());
    let credentials = StoredCredentials::new(cfg.portal.portal_url.clone(), token);

    let session = Session::sign_in(&client, &store(cfg), credentials).await?;
    if let Some(user) = session.user() {
        println!(
            "Signed in to {} as {} ({})",
            session.portal().name,
            user.username,
            user.full_name
        );
    }
    Ok(())
}

pub fn sign_out(cfg: &WeftConfig) -> CliResult<()> {
    Session::sign_out(&store(cfg))?;
    println!("Signed out");
    Ok(())
}

pub async fn whoami(cfg: &WeftConfig) -> CliResult<()> {
    let client = portal_client(cfg)?;
    let session = Session::establish(&client).await?;
    match session.user() {
        Some(user) => println!(
            "{} ({}) on {}",
            user.username,
            user.full_name,
            session.portal().name
        ),
        None => println!("Anonymous on {}", session.portal().name),
    }
    Ok(())
}

/// Session, org directory and empty registry for a crawl
async fn prepare(
    cfg: &WeftConfig,
) -> CliResult<(Arc<RestPortalClient>, Session, OrgDirectory, SharedRegistry)> {
    let client = Arc::new(portal_client(cfg)?);
    let session = Session::establish(client.as_ref()).await?;
    let directory = match OrgDirectory::load(client.as_ref(), &session).await {
        Ok(directory) => directory,
        Err(e) => {
            warn!(target: "weft", error = %e, "Could not load org users; owner contacts disabled");
            OrgDirectory::new()
        }
    };
    let registry = ServiceRegistry::with_warning_threshold(cfg.related_warning).shared();
    Ok((client, session, directory, registry))
}

#[derive(Serialize)]
struct ScanOutput<'a> {
    crawl: &'a CrawlReport,
    services: ServicesReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    related: Option<Vec<RelatedItemRow>>,
}

pub async fn scan(
    cfg: &WeftConfig,
    filter: ServiceFilter,
    related: Option<String>,
    format: OutputFormat,
) -> CliResult<()> {
    let (client, session, directory, registry) = prepare(cfg).await?;
    let crawler =
        ItemCrawler::new(Arc::clone(&client), Arc::clone(&registry)).with_config(cfg.crawl.clone());
    let crawl = crawler.crawl(session.portal()).await?;

    if !crawl.is_complete() {
        warn!(target: "weft", "Some search pages failed; results are partial");
    }
    for failure in crawl
        .services
        .inspection
        .failures
        .iter()
        .chain(&crawl.maps.inspection.failures)
    {
        warn!(target: "weft", item_id = %failure.item_id, reason = %failure.reason, "Skipped branch");
    }

    let registry = registry.read().await;
    let view = filter.apply(&registry);
    let services = ServicesReport::new(&filter, &view, registry.warning_threshold());

    let ctx = ReportContext {
        home_url: session.home_url(client.portal_url()),
        directory: &directory,
        user: session.user(),
        warning_threshold: registry.warning_threshold(),
    };
    let related = match related.as_deref() {
        Some(url) => {
            let info = registry
                .get(url)
                .ok_or_else(|| format!("Service not found in crawl: {url}"))?;
            Some((info.url.clone(), report::related_rows(info, &filter, &ctx)))
        }
        None => None,
    };

    match format {
        OutputFormat::Text => {
            print!("{}", report::render_services_text(&services));
            if let Some((url, rows)) = &related {
                println!();
                print!("{}", report::render_related_text(url, rows));
            }
        }
        OutputFormat::Json => {
            let output = ScanOutput {
                crawl: &crawl,
                services,
                related: related.map(|(_, rows)| rows),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Html => {
            let title = format!("{} services", session.portal().name);
            let mut page = FilterState::new();
            page.select(filter.clone());
            if let Some((url, _)) = &related {
                page.select_service(url.clone());
            }
            let choices = FilterChoices::new(&registry, &directory);
            let rows = related.as_ref().map(|(_, rows)| rows.as_slice());
            println!(
                "{}",
                report::render_html_page(&title, &services, &page, &choices, rows)
            );
        }
    }
    Ok(())
}

/// Crawl in the background while serving the dashboard
pub async fn serve(cfg: &WeftConfig) -> CliResult<()> {
    let (client, session, directory, registry) = prepare(cfg).await?;
    let broadcaster = EventBroadcaster::default();

    let crawler = ItemCrawler::new(Arc::clone(&client), Arc::clone(&registry))
        .with_config(cfg.crawl.clone())
        .with_broadcaster(broadcaster.clone());
    let portal = session.portal().clone();
    let crawl_handle = tokio::spawn(async move {
        match crawler.crawl(&portal).await {
            Ok(report) => info!(
                target: "weft",
                services = report.service_count,
                failures = report.failure_count(),
                "Background crawl finished"
            ),
            Err(e) => error!(target: "weft", error = %e, "Background crawl failed"),
        }
    });

    let server = DashboardServer::new(
        cfg.dashboard.clone(),
        registry,
        Arc::new(directory),
        session,
        client.portal_url(),
    )
    .with_broadcaster(broadcaster);

    tokio::select! {
        res = server.serve() => res?,
        _ = tokio::signal::ctrl_c() => {
            info!(target: "weft", "Received Ctrl+C, shutting down");
        }
    }
    crawl_handle.abort();
    Ok(())
}
