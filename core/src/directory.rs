use dashmap::DashMap;
use serde::Serialize;
use tracing::info;

use crate::portal::{OrgUser, PortalClient};
use crate::session::Session;
use crate::Result;

/// Org users are fetched with a single page of this size
pub const ORG_USERS_PAGE_SIZE: u32 = 100;

/// Owner choices for the owner filter: org members first, then outside owners
#[derive(Debug, Clone, Default, Serialize)]
pub struct OwnerOptions {
    pub organization: String,
    pub in_org: Vec<OrgUser>,
    pub outside: Vec<String>,
}

/// In-memory directory of organization users
#[derive(Debug, Default)]
pub struct OrgDirectory {
    organization: String,
    users: DashMap<String, OrgUser>, // username -> user
}

impl OrgDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the org users visible to the signed-in user; anonymous sessions get an empty directory
    pub async fn load<C: PortalClient + ?Sized>(client: &C, session: &Session) -> Result<Self> {
        let directory = Self {
            organization: session.portal().name.clone(),
            users: DashMap::new(),
        };
        if !session.is_signed_in() {
            return Ok(directory);
        }

        let page = client.org_users(1, ORG_USERS_PAGE_SIZE).await?;
        for user in page.users {
            directory.register(user);
        }
        info!(
            target: "directory",
            organization = %directory.organization,
            users = directory.len(),
            total = page.total,
            "Org users loaded"
        );
        Ok(directory)
    }

    pub fn register(&self, user: OrgUser) {
        self.users.insert(user.username.clone(), user);
    }

    pub fn find(&self, username: &str) -> Option<OrgUser> {
        self.users.get(username).map(|e| e.clone())
    }

    pub fn contains(&self, username: &str) -> bool {
        self.users.contains_key(username)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// All users sorted by username
    pub fn all(&self) -> Vec<OrgUser> {
        let mut users: Vec<OrgUser> = self.users.iter().map(|e| e.clone()).collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        users
    }

    /// Owner filter options given the owners seen in the registry
    pub fn owner_options<'a>(&self, owners: impl IntoIterator<Item = &'a str>) -> OwnerOptions {
        let mut outside: Vec<String> = owners
            .into_iter()
            .filter(|owner| !self.contains(owner))
            .map(str::to_string)
            .collect();
        outside.sort();
        outside.dedup();
        OwnerOptions {
            organization: self.organization.clone(),
            in_org: self.all(),
            outside,
        }
    }
}
