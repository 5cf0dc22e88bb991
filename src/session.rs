//! Cached login session.
//!
//! The platform authenticates with a server-set session cookie. The cookie
//! and the identity it resolved to are cached at `~/.botdesk/session.json`
//! so commands can run without re-entering credentials. The cache is
//! invalidated explicitly by `logout` and refreshed by every role-gated
//! command.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::api::ApiClient;
use crate::api::types::Me;

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Client,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Client => "client",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "admin" => Some(Role::Admin),
            "client" => Some(Role::Client),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Cache file
// ---------------------------------------------------------------------------

/// Contents of `~/.botdesk/session.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionCache {
    pub role: Option<String>,
    pub email: Option<String>,
    pub client_id: Option<String>,
    pub cookie: Option<String>,
}

impl SessionCache {
    /// Load the cached session, or an empty cache if none exists.
    pub fn load() -> SessionCache {
        let Some(path) = session_path() else {
            return SessionCache::default();
        };
        let Ok(content) = fs::read_to_string(path) else {
            return SessionCache::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    pub fn save(&self) -> Result<()> {
        let path = session_path().context("could not determine home directory")?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("failed to create ~/.botdesk/ directory")?;
        }
        let json = serde_json::to_string_pretty(self).context("failed to serialize session")?;
        fs::write(&path, json).context("failed to write session cache")?;
        Ok(())
    }

    /// Remove the cache file. Missing file is not an error.
    pub fn clear() -> Result<()> {
        let Some(path) = session_path() else {
            return Ok(());
        };
        if path.exists() {
            fs::remove_file(&path).context("failed to remove session cache")?;
        }
        Ok(())
    }

    /// Overwrite the identity fields from a fresh `/api/me` response,
    /// keeping the cookie.
    pub fn refresh_identity(&mut self, me: &Me) {
        self.role = Some(me.role.clone());
        self.email = me.email.clone();
        self.client_id = me.client_id.clone();
    }
}

/// Path to the session cache: `~/.botdesk/session.json`.
pub fn session_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".botdesk").join("session.json"))
}

// ---------------------------------------------------------------------------
// Session gate
// ---------------------------------------------------------------------------

/// Verify the cached session against the server before a role-scoped
/// command runs.
///
/// Calls `GET /api/me` with the cached cookie. A failed call, an
/// unparseable body, or a role mismatch aborts with a "please log in"
/// error. On success the cached identity is refreshed.
pub fn require_role(api: &ApiClient, required: Role) -> Result<Me> {
    let me: Me = api
        .get_json("/api/me")
        .context("not logged in. Run `botdesk login` first")?;

    if me.role != required.as_str() {
        bail!(
            "this command requires the {} role (logged in as {})",
            required.as_str(),
            me.role
        );
    }

    // Best-effort cache refresh; an unwritable cache must not block the
    // command itself.
    let mut cache = SessionCache::load();
    cache.refresh_identity(&me);
    let _ = cache.save();

    Ok(me)
}

/// Verify the session without constraining the role.
pub fn require_login(api: &ApiClient) -> Result<Me> {
    let me: Me = api
        .get_json("/api/me")
        .context("not logged in. Run `botdesk login` first")?;

    let mut cache = SessionCache::load();
    cache.refresh_identity(&me);
    let _ = cache.save();

    Ok(me)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_known_values_only() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("client"), Some(Role::Client));
        assert_eq!(Role::parse("superuser"), None);
        assert_eq!(Role::parse(""), None);
    }

    #[test]
    fn cache_round_trips_through_json() {
        let cache = SessionCache {
            role: Some("client".to_string()),
            email: Some("a@b.c".to_string()),
            client_id: Some("c1".to_string()),
            cookie: Some("sid=abc123".to_string()),
        };
        let json = serde_json::to_string(&cache).unwrap();
        let parsed: SessionCache = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.cookie.as_deref(), Some("sid=abc123"));
        assert_eq!(parsed.client_id.as_deref(), Some("c1"));
    }

    #[test]
    fn refresh_identity_keeps_cookie() {
        let mut cache = SessionCache {
            cookie: Some("sid=abc".to_string()),
            ..Default::default()
        };
        let me = Me {
            role: "admin".to_string(),
            email: Some("admin@x.y".to_string()),
            client_id: None,
        };
        cache.refresh_identity(&me);
        assert_eq!(cache.role.as_deref(), Some("admin"));
        assert_eq!(cache.cookie.as_deref(), Some("sid=abc"));
    }
}
