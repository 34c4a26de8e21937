// Session manager
//
// Weft never runs the interactive sign-in itself. It takes a token issued by the
// portal's identity provider, validates it against `portals/self`, and keeps it in a
// small JSON file so later runs start signed in.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::portal::{PortalClient, PortalInfo, PortalUser};
use crate::{Result, WeftError};

/// Token persisted between runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub portal_url: String,
    pub token: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub saved_at: Option<String>,
}

impl StoredCredentials {
    pub fn new(portal_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            portal_url: portal_url.into(),
            token: token.into(),
            username: None,
            saved_at: None,
        }
    }

    /// Token when it was issued for `portal_url`
    pub fn token_for(&self, portal_url: &str) -> Option<&str> {
        let same_portal =
            self.portal_url.trim_end_matches('/') == portal_url.trim_end_matches('/');
        (same_portal && !self.token.is_empty()).then_some(self.token.as_str())
    }
}

/// File-backed credential store
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<StoredCredentials>> {
        match fs::read_to_string(&self.path) {
            Ok(s) => serde_json::from_str(&s).map(Some).map_err(|e| {
                WeftError::SessionError(format!(
                    "Corrupt session file {}: {}",
                    self.path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, credentials: &StoredCredentials) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        std::os::unix::fs::OpenOptionsExt::mode(&mut options, 0o600);

        let mut file = options.open(&self.path)?;
        // `mode` only applies on creation; tighten a file left by an older save
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))?;
        }
        file.write_all(&serde_json::to_vec_pretty(credentials)?)?;
        debug!(target: "session", path = %self.path.display(), "Credentials saved");
        Ok(())
    }

    /// Remove persisted credentials; returns whether anything was removed
    pub fn destroy(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Anonymous,
    SignedIn(PortalUser),
}

/// Portal metadata plus who, if anyone, is signed in
#[derive(Debug, Clone)]
pub struct Session {
    portal: PortalInfo,
    state: SessionState,
}

impl Session {
    pub fn anonymous(portal: PortalInfo) -> Self {
        Self {
            portal: PortalInfo {
                user: None,
                ..portal
            },
            state: SessionState::Anonymous,
        }
    }

    fn from_portal(portal: PortalInfo) -> Self {
        let state = match &portal.user {
            Some(user) => SessionState::SignedIn(user.clone()),
            None => SessionState::Anonymous,
        };
        Self { portal, state }
    }

    /// Load portal metadata and report whether the client's credentials sign a user in
    pub async fn establish<C: PortalClient + ?Sized>(client: &C) -> Result<Self> {
        let session = Self::from_portal(client.portal_self().await?);
        match &session.state {
            SessionState::SignedIn(user) => {
                info!(target: "session", username = %user.username, portal = %session.portal.name, "Signed in")
            }
            SessionState::Anonymous => {
                info!(target: "session", portal = %session.portal.name, "Browsing anonymously")
            }
        }
        Ok(session)
    }

    /// Validate the client's token and persist it on success
    pub async fn sign_in<C: PortalClient + ?Sized>(
        client: &C,
        store: &SessionStore,
        mut credentials: StoredCredentials,
    ) -> Result<Self> {
        let session = Self::establish(client).await?;
        let Some(user) = session.user() else {
            warn!(target: "session", "Portal accepted the request but reported no user");
            return Err(WeftError::NotSignedIn);
        };
        credentials.username = Some(user.username.clone());
        credentials.saved_at = Some(chrono::Utc::now().to_rfc3339());
        store.save(&credentials)?;
        Ok(session)
    }

    /// Token stored by an earlier sign-in to `portal_url`
    pub fn restore(store: &SessionStore, portal_url: &str) -> Result<Option<String>> {
        let token = store
            .load()?
            .and_then(|creds| creds.token_for(portal_url).map(str::to_string));
        if token.is_some() {
            debug!(target: "session", path = %store.path().display(), "Restored stored token");
        }
        Ok(token)
    }

    /// Destroy persisted credentials
    pub fn sign_out(store: &SessionStore) -> Result<()> {
        if store.destroy()? {
            info!(target: "session", path = %store.path().display(), "Signed out");
        } else {
            debug!(target: "session", "No stored credentials to remove");
        }
        Ok(())
    }

    pub fn portal(&self) -> &PortalInfo {
        &self.portal
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn user(&self) -> Option<&PortalUser> {
        match &self.state {
            SessionState::SignedIn(user) => Some(user),
            SessionState::Anonymous => None,
        }
    }

    pub fn is_signed_in(&self) -> bool {
        matches!(self.state, SessionState::SignedIn(_))
    }

    pub fn home_url(&self, portal_url: &str) -> String {
        self.portal.home_url(portal_url)
    }
}
