// Weft Core Library
// Crawls a GIS portal organization and maps which items consume which service URLs

pub mod crawler;
pub mod dashboard;
pub mod directory;
pub mod filter;
pub mod graph;
pub mod inspector;
pub mod portal;
pub mod registry;
pub mod report;
pub mod session;

// Export core types
pub use dashboard::{CrawlEvent, CrawlEventType, DashboardConfig, DashboardServer, EventBroadcaster};
pub use crawler::{CrawlConfig, CrawlReport, ItemCrawler, QueryKind, QueryReport};
pub use directory::{OrgDirectory, OwnerOptions};
pub use filter::{FilterState, FilteredServices, ServiceFilter};
pub use graph::{GraphLink, GraphNode, GraphNodeType, RelationshipGraph};
pub use inspector::{BranchFailure, Inspection, ItemInspector};
pub use portal::{
    Access, ItemKind, OrgUser, PortalClient, PortalConfig, PortalInfo, PortalItem, PortalUser,
    RestPortalClient, SearchPage, SearchParams, SortOrder, UserPage,
};
pub use registry::{
    filter_and_sort, Badge, RecordOutcome, ServiceRegistry, ServiceUrl, ServiceUrlInfo,
    SharedRegistry,
};
pub use session::{Session, SessionState, SessionStore, StoredCredentials};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WeftError {
    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Portal error {code}: {message}")]
    PortalError { code: i64, message: String },

    #[error("Invalid service URL: {0}")]
    InvalidServiceUrl(String),

    #[error("Portal has no organization id; sign in to an organization first")]
    MissingOrganization,

    #[error("Not signed in")]
    NotSignedIn,

    #[error("Session error: {0}")]
    SessionError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
pub type Result<T> = std::result::Result<T, WeftError>;
